//! In-memory landscape storage: the persistent backend edit caches read from
//! and write to.
//!
//! The lattice is split into square components of `N` quads, each holding a
//! dense `(N+1)^2` raster per data kind. Neighbouring components duplicate
//! their shared edge vertices, and every write updates all owners so the
//! seams never tear. Derived data (height bounds, collision revision, the
//! terrain-wide revision counter) is refreshed by [`TerrainData::commit`].
//!
//! While a transaction is open, the first modification of a component (or
//! of the selection state) snapshots it so the stroke can be undone.

use std::collections::{HashMap, HashSet};
use std::mem;

use glam::{Vec2, Vec3};

use crate::grid::{owners_of, ComponentCoord, GridCoord, Region};
use crate::settings::PaintingRestriction;

/// World-local height units per raw height step.
pub const LANDSCAPE_ZSCALE: f32 = 1.0 / 128.0;
/// Raw height steps per world-local height unit.
pub const LANDSCAPE_INV_ZSCALE: f32 = 128.0;
/// Raw height value that maps to world-local height zero.
pub const HEIGHT_MID: u16 = 32768;

/// Opaque identity of a weight layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(u32);

#[derive(Clone, Debug)]
pub struct LayerInfo {
    pub id: LayerId,
    pub name: String,
    /// Layers that do not take part in weight normalization.
    pub no_weight_blend: bool,
}

/// Data kinds tracked separately for flushing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataKind {
    Height,
    Weight,
    Visibility,
    Selection,
    XyOffset,
}

#[derive(Clone, Debug)]
struct WeightAllocation {
    layer: LayerId,
    data: Vec<u8>,
}

/// One square block of the landscape.
#[derive(Clone, Debug)]
pub struct LandscapeComponent {
    coord: ComponentCoord,
    size_quads: i32,
    heights: Vec<u16>,
    weights: Vec<WeightAllocation>,
    visibility: Option<Vec<u8>>,
    select: Option<Vec<u8>>,
    xy_offsets: Option<Vec<Vec2>>,
    height_bounds: (u16, u16),
    collision_revision: u32,
}

impl LandscapeComponent {
    fn new(coord: ComponentCoord, size_quads: i32, height: u16) -> Self {
        let verts = ((size_quads + 1) * (size_quads + 1)) as usize;
        Self {
            coord,
            size_quads,
            heights: vec![height; verts],
            weights: Vec::new(),
            visibility: None,
            select: None,
            xy_offsets: None,
            height_bounds: (height, height),
            collision_revision: 0,
        }
    }

    pub fn coord(&self) -> ComponentCoord {
        self.coord
    }

    pub fn vertex_region(&self) -> Region {
        self.coord.vertex_region(self.size_quads)
    }

    fn local_index(&self, coord: GridCoord) -> Option<usize> {
        let lx = coord.x - self.coord.x * self.size_quads;
        let ly = coord.y - self.coord.y * self.size_quads;
        let n = self.size_quads;
        if lx < 0 || ly < 0 || lx > n || ly > n {
            return None;
        }
        Some((lx + ly * (n + 1)) as usize)
    }

    pub fn height(&self, coord: GridCoord) -> Option<u16> {
        self.local_index(coord).map(|i| self.heights[i])
    }

    /// Weight of `layer` at `coord`; zero when the layer is not allocated here.
    pub fn weight(&self, layer: LayerId, coord: GridCoord) -> Option<u8> {
        let i = self.local_index(coord)?;
        Some(
            self.weights
                .iter()
                .find(|a| a.layer == layer)
                .map_or(0, |a| a.data[i]),
        )
    }

    pub fn visibility(&self, coord: GridCoord) -> Option<u8> {
        let i = self.local_index(coord)?;
        Some(self.visibility.as_ref().map_or(0, |v| v[i]))
    }

    pub fn select_value(&self, coord: GridCoord) -> Option<u8> {
        let i = self.local_index(coord)?;
        Some(self.select.as_ref().map_or(0, |v| v[i]))
    }

    pub fn xy_offset(&self, coord: GridCoord) -> Option<Vec2> {
        let i = self.local_index(coord)?;
        Some(self.xy_offsets.as_ref().map_or(Vec2::ZERO, |v| v[i]))
    }

    pub fn has_layer(&self, layer: LayerId) -> bool {
        self.weights.iter().any(|a| a.layer == layer)
    }

    /// Number of weight layers allocated in this component.
    pub fn layer_count(&self) -> usize {
        self.weights.len()
    }

    /// `(min, max)` raw heights as of the last height commit.
    pub fn height_bounds(&self) -> (u16, u16) {
        self.height_bounds
    }

    /// Bumped whenever a weight commit touches this component.
    pub fn collision_revision(&self) -> u32 {
        self.collision_revision
    }

    fn recompute_bounds(&mut self) {
        let min = self.heights.iter().copied().min().unwrap_or(0);
        let max = self.heights.iter().copied().max().unwrap_or(0);
        self.height_bounds = (min, max);
    }

    fn allocation_index(&mut self, layer: LayerId) -> usize {
        if let Some(i) = self.weights.iter().position(|a| a.layer == layer) {
            return i;
        }
        let verts = self.heights.len();
        self.weights.push(WeightAllocation {
            layer,
            data: vec![0; verts],
        });
        self.weights.len() - 1
    }

    /// Set one layer's weight at a vertex, rescaling the other blended
    /// layers so the blended total stays at 255 when they carry weight.
    fn set_weight(&mut self, i: usize, layer: LayerId, value: u8, no_blend: &HashSet<LayerId>) {
        let slot = self.allocation_index(layer);
        self.weights[slot].data[i] = value;
        if no_blend.contains(&layer) {
            return;
        }

        let others: Vec<usize> = (0..self.weights.len())
            .filter(|&j| j != slot && !no_blend.contains(&self.weights[j].layer))
            .collect();
        let other_sum: u32 = others.iter().map(|&j| self.weights[j].data[i] as u32).sum();
        if other_sum == 0 {
            return;
        }

        let remaining = 255 - value as u32;
        let mut assigned = 0u32;
        let mut largest: Option<usize> = None;
        for &j in &others {
            let old = self.weights[j].data[i] as u32;
            let new = ((old * remaining) as f32 / other_sum as f32).round() as u32;
            self.weights[j].data[i] = new.min(255) as u8;
            assigned += new.min(255);
            if largest.map_or(true, |l| self.weights[l].data[i] < new as u8) {
                largest = Some(j);
            }
        }
        // Rounding drift goes to the heaviest remaining layer.
        if let Some(l) = largest {
            let fixed = self.weights[l].data[i] as i32 + remaining as i32 - assigned as i32;
            self.weights[l].data[i] = fixed.clamp(0, 255) as u8;
        }
    }
}

/// A decoration instance placed on the surface (foliage, props).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AttachedInstance {
    pub x: f32,
    pub y: f32,
    /// World-local height.
    pub z: f32,
}

/// Component and selection snapshots captured during one stroke.
#[derive(Clone, Debug, Default)]
pub struct Transaction {
    pub description: String,
    components: HashMap<ComponentCoord, LandscapeComponent>,
    selected_region: Option<HashMap<GridCoord, f32>>,
    selected_components: Option<HashSet<ComponentCoord>>,
    instances: Option<Vec<AttachedInstance>>,
}

impl Transaction {
    fn new(description: &str) -> Self {
        Self {
            description: description.to_string(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
            && self.selected_region.is_none()
            && self.selected_components.is_none()
            && self.instances.is_none()
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }
}

/// The landscape being edited.
#[derive(Clone, Debug)]
pub struct TerrainData {
    component_size_quads: i32,
    draw_scale: Vec3,
    components: HashMap<ComponentCoord, LandscapeComponent>,
    layers: Vec<LayerInfo>,
    next_layer_id: u32,
    max_layers_per_component: usize,
    selected_region: HashMap<GridCoord, f32>,
    selected_components: HashSet<ComponentCoord>,
    instances: Vec<AttachedInstance>,
    dirty: HashMap<DataKind, HashSet<ComponentCoord>>,
    revision: u64,
    transaction: Option<Transaction>,
}

impl TerrainData {
    pub fn new(component_size_quads: i32) -> Self {
        Self {
            component_size_quads: component_size_quads.max(1),
            draw_scale: Vec3::ONE,
            components: HashMap::new(),
            layers: Vec::new(),
            next_layer_id: 0,
            max_layers_per_component: 0,
            selected_region: HashMap::new(),
            selected_components: HashSet::new(),
            instances: Vec::new(),
            dirty: HashMap::new(),
            revision: 0,
            transaction: None,
        }
    }

    /// A `components_x` by `components_y` block of components at a constant raw height.
    pub fn flat(components_x: i32, components_y: i32, component_size_quads: i32, height: u16) -> Self {
        let mut terrain = Self::new(component_size_quads);
        for cy in 0..components_y {
            for cx in 0..components_x {
                terrain.add_component(ComponentCoord::new(cx, cy), height);
            }
        }
        terrain
    }

    pub fn add_component(&mut self, coord: ComponentCoord, height: u16) {
        let n = self.component_size_quads;
        self.components
            .entry(coord)
            .or_insert_with(|| LandscapeComponent::new(coord, n, height));
    }

    pub fn component_size_quads(&self) -> i32 {
        self.component_size_quads
    }

    pub fn draw_scale(&self) -> Vec3 {
        self.draw_scale
    }

    pub fn set_draw_scale(&mut self, scale: Vec3) {
        self.draw_scale = scale;
    }

    pub fn max_layers_per_component(&self) -> usize {
        self.max_layers_per_component
    }

    /// Zero means unlimited.
    pub fn set_max_layers_per_component(&mut self, max: usize) {
        self.max_layers_per_component = max;
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    // Height units

    /// Raw height sample to world-local height.
    pub fn world_height(&self, raw: f32) -> f32 {
        (raw - HEIGHT_MID as f32) * LANDSCAPE_ZSCALE * self.draw_scale.z
    }

    /// World-local height to (unclamped) raw height.
    pub fn raw_height(&self, world: f32) -> f32 {
        world / (LANDSCAPE_ZSCALE * self.draw_scale.z) + HEIGHT_MID as f32
    }

    // Layers

    pub fn add_layer(&mut self, name: &str, no_weight_blend: bool) -> LayerId {
        let id = LayerId(self.next_layer_id);
        self.next_layer_id += 1;
        self.layers.push(LayerInfo {
            id,
            name: name.to_string(),
            no_weight_blend,
        });
        id
    }

    pub fn layers(&self) -> &[LayerInfo] {
        &self.layers
    }

    pub fn layer_info(&self, layer: LayerId) -> Option<&LayerInfo> {
        self.layers.iter().find(|l| l.id == layer)
    }

    pub fn layer_by_name(&self, name: &str) -> Option<LayerId> {
        self.layers.iter().find(|l| l.name == name).map(|l| l.id)
    }

    // Components

    pub fn component(&self, coord: ComponentCoord) -> Option<&LandscapeComponent> {
        self.components.get(&coord)
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Existing components whose vertices overlap `region`, in row-major order.
    pub fn components_in_region(&self, region: Region) -> Vec<ComponentCoord> {
        if region.is_empty() {
            return Vec::new();
        }
        let n = self.component_size_quads;
        let mut out = Vec::new();
        for cy in (region.y1 - 1).div_euclid(n)..=region.y2.div_euclid(n) {
            for cx in (region.x1 - 1).div_euclid(n)..=region.x2.div_euclid(n) {
                let cc = ComponentCoord::new(cx, cy);
                if self.components.contains_key(&cc)
                    && !cc.vertex_region(n).intersect(&region).is_empty()
                {
                    out.push(cc);
                }
            }
        }
        out
    }

    /// Bounding vertex rectangle of every component (empty without components).
    pub fn extent(&self) -> Region {
        let n = self.component_size_quads;
        self.components
            .keys()
            .fold(Region::EMPTY, |acc, cc| acc.union(&cc.vertex_region(n)))
    }

    pub fn has_vertex(&self, coord: GridCoord) -> bool {
        owners_of(coord, self.component_size_quads).any(|cc| self.components.contains_key(&cc))
    }

    fn sample_vertex<T>(
        &self,
        coord: GridCoord,
        sample: &impl Fn(&LandscapeComponent, GridCoord) -> Option<T>,
    ) -> Option<T> {
        owners_of(coord, self.component_size_quads)
            .find_map(|cc| self.components.get(&cc).and_then(|c| sample(c, coord)))
    }

    fn read_exact<T>(
        &self,
        region: Region,
        out: &mut HashMap<GridCoord, T>,
        sample: impl Fn(&LandscapeComponent, GridCoord) -> Option<T>,
    ) {
        for coord in region.iter() {
            if let Some(v) = self.sample_vertex(coord, &sample) {
                out.insert(coord, v);
            }
        }
    }

    /// Interpolated read: clamps `region` to the terrain extent and fills
    /// holes (missing components inside the extent) from the nearest stored
    /// vertices along the row and column. With no overlap the region is left
    /// as requested and nothing is read.
    fn read_interp<T>(
        &self,
        region: &mut Region,
        out: &mut HashMap<GridCoord, T>,
        sample: impl Fn(&LandscapeComponent, GridCoord) -> Option<f32>,
        convert: impl Fn(f32) -> T,
    ) {
        let extent = self.extent();
        let valid = region.intersect(&extent);
        if valid.is_empty() {
            return;
        }
        *region = valid;
        for coord in valid.iter() {
            let value = self
                .sample_vertex(coord, &sample)
                .or_else(|| self.fill_hole(coord, &extent, &sample));
            if let Some(v) = value {
                out.insert(coord, convert(v));
            }
        }
    }

    fn fill_hole(
        &self,
        coord: GridCoord,
        extent: &Region,
        sample: &impl Fn(&LandscapeComponent, GridCoord) -> Option<f32>,
    ) -> Option<f32> {
        let mut total = 0.0;
        let mut weight_sum = 0.0;
        for (dx, dy) in [(-1, 0), (1, 0), (0, -1), (0, 1)] {
            let mut step = 1;
            loop {
                let probe = coord.offset(dx * step, dy * step);
                if !extent.contains(probe) {
                    break;
                }
                if let Some(v) = self.sample_vertex(probe, sample) {
                    let w = 1.0 / step as f32;
                    total += v * w;
                    weight_sum += w;
                    break;
                }
                step += 1;
            }
        }
        (weight_sum > 0.0).then(|| total / weight_sum)
    }

    fn mark_dirty(&mut self, kind: DataKind, coord: ComponentCoord) {
        self.dirty.entry(kind).or_default().insert(coord);
    }

    /// Components written since the last commit of `kind`.
    pub fn pending_changes(&self, kind: DataKind) -> usize {
        self.dirty.get(&kind).map_or(0, |s| s.len())
    }

    /// Commit pending writes of one kind: recompute height bounds, bump the
    /// collision revision of weight-edited components, and advance the
    /// terrain revision. Returns the number of components committed.
    pub fn commit(&mut self, kind: DataKind) -> usize {
        let Some(pending) = self.dirty.remove(&kind) else {
            return 0;
        };
        for cc in &pending {
            let Some(comp) = self.components.get_mut(cc) else {
                continue;
            };
            match kind {
                DataKind::Height | DataKind::XyOffset => comp.recompute_bounds(),
                DataKind::Weight => {
                    comp.weights.retain(|a| a.data.iter().any(|&w| w > 0));
                    comp.collision_revision += 1;
                }
                DataKind::Visibility | DataKind::Selection => {}
            }
        }
        if !pending.is_empty() {
            self.revision += 1;
        }
        log::debug!("Committed {:?} for {} components", kind, pending.len());
        pending.len()
    }

    // Heights

    pub fn height_at(&self, coord: GridCoord) -> Option<u16> {
        self.sample_vertex(coord, &|c: &LandscapeComponent, p| c.height(p))
    }

    /// Bilinear height at a fractional position over whichever corners exist.
    pub fn sample_height(&self, x: f32, y: f32) -> Option<f32> {
        let x0 = x.floor() as i32;
        let y0 = y.floor() as i32;
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;
        let mut total = 0.0;
        let mut weight_sum = 0.0;
        for (dx, dy, w) in [
            (0, 0, (1.0 - fx) * (1.0 - fy)),
            (1, 0, fx * (1.0 - fy)),
            (0, 1, (1.0 - fx) * fy),
            (1, 1, fx * fy),
        ] {
            if let Some(h) = self.height_at(GridCoord::new(x0 + dx, y0 + dy)) {
                total += h as f32 * w;
                weight_sum += w;
            }
        }
        if weight_sum > 0.0 {
            Some(total / weight_sum)
        } else {
            None
        }
    }

    pub fn read_heights(&self, region: Region, out: &mut HashMap<GridCoord, u16>) {
        self.read_exact(region, out, |c, p| c.height(p));
    }

    pub fn read_heights_interp(&self, region: &mut Region, out: &mut HashMap<GridCoord, u16>) {
        self.read_interp(
            region,
            out,
            |c, p| c.height(p).map(|h| h as f32),
            |v| v.round().clamp(0.0, 65535.0) as u16,
        );
    }

    /// Write a row-major block of heights to every owning component and
    /// re-snap decorations standing on it.
    pub fn write_heights(&mut self, region: Region, data: &[u16]) {
        if !self.check_block(region, data.len()) {
            return;
        }
        for cc in self.components_in_region(region) {
            self.capture_component(cc);
            let Some(comp) = self.components.get_mut(&cc) else {
                continue;
            };
            for coord in region.intersect(&comp.vertex_region()).iter() {
                if let Some(i) = comp.local_index(coord) {
                    comp.heights[i] = data[region.index_of(coord)];
                }
            }
            self.mark_dirty(DataKind::Height, cc);
        }
        self.snap_instances(region);
    }

    fn check_block(&self, region: Region, len: usize) -> bool {
        if region.is_empty() {
            return false;
        }
        if len < region.len() {
            log::warn!(
                "Ignoring write of {} values to {} ({} cells)",
                len,
                region,
                region.len()
            );
            return false;
        }
        true
    }

    // Weights

    fn no_blend_layers(&self) -> HashSet<LayerId> {
        self.layers
            .iter()
            .filter(|l| l.no_weight_blend)
            .map(|l| l.id)
            .collect()
    }

    /// Whether `restriction` lets `layer` be painted in `component`.
    pub fn can_paint_layer(
        &self,
        component: ComponentCoord,
        layer: LayerId,
        restriction: PaintingRestriction,
    ) -> bool {
        let Some(comp) = self.components.get(&component) else {
            return false;
        };
        if comp.has_layer(layer) {
            return true;
        }
        match restriction {
            PaintingRestriction::None => true,
            PaintingRestriction::ExistingOnly => false,
            PaintingRestriction::UseMaxLayers => {
                self.max_layers_per_component == 0
                    || comp.layer_count() < self.max_layers_per_component
            }
        }
    }

    pub fn weight_at(&self, layer: LayerId, coord: GridCoord) -> Option<u8> {
        self.sample_vertex(coord, &|c: &LandscapeComponent, p| c.weight(layer, p))
    }

    pub fn read_weights(&self, layer: LayerId, region: Region, out: &mut HashMap<GridCoord, u8>) {
        self.read_exact(region, out, |c, p| c.weight(layer, p));
    }

    pub fn read_weights_interp(
        &self,
        layer: LayerId,
        region: &mut Region,
        out: &mut HashMap<GridCoord, u8>,
    ) {
        self.read_interp(
            region,
            out,
            |c, p| c.weight(layer, p).map(|w| w as f32),
            |v| v.round().clamp(0.0, 255.0) as u8,
        );
    }

    /// Write a row-major block of one layer's weights. Components the
    /// restriction forbids from allocating the layer are left untouched.
    pub fn write_weights(
        &mut self,
        layer: LayerId,
        region: Region,
        data: &[u8],
        restriction: PaintingRestriction,
    ) {
        if self.layer_info(layer).is_none() {
            log::warn!("Ignoring weight write for unknown layer {:?}", layer);
            return;
        }
        if !self.check_block(region, data.len()) {
            return;
        }
        let no_blend = self.no_blend_layers();
        for cc in self.components_in_region(region) {
            let Some(comp) = self.components.get(&cc) else {
                continue;
            };
            let overlap = region.intersect(&comp.vertex_region());
            if !comp.has_layer(layer) {
                if overlap.iter().all(|p| data[region.index_of(p)] == 0) {
                    continue;
                }
                if !self.can_paint_layer(cc, layer, restriction) {
                    log::debug!("Painting restriction blocks {:?} in {:?}", layer, cc);
                    continue;
                }
            }
            self.capture_component(cc);
            let Some(comp) = self.components.get_mut(&cc) else {
                continue;
            };
            for coord in overlap.iter() {
                if let Some(i) = comp.local_index(coord) {
                    comp.set_weight(i, layer, data[region.index_of(coord)], &no_blend);
                }
            }
            self.mark_dirty(DataKind::Weight, cc);
        }
    }

    /// Every layer's weight per vertex, ordered as [`TerrainData::layers`].
    pub fn read_all_weights(&self, region: Region, out: &mut HashMap<GridCoord, Vec<u8>>) {
        let layers: Vec<LayerId> = self.layers.iter().map(|l| l.id).collect();
        self.read_exact(region, out, |c, p| {
            layers.iter().map(|&l| c.weight(l, p)).collect()
        });
    }

    /// Write full weight vectors for the given layers without renormalizing;
    /// the caller supplies a complete blend per vertex.
    pub fn write_all_weights(
        &mut self,
        dirty_layers: &[LayerId],
        region: Region,
        data: &[Vec<u8>],
        restriction: PaintingRestriction,
    ) {
        if !self.check_block(region, data.len()) {
            return;
        }
        let slots: Vec<(usize, LayerId)> = dirty_layers
            .iter()
            .filter_map(|&l| self.layers.iter().position(|info| info.id == l).map(|i| (i, l)))
            .collect();
        for cc in self.components_in_region(region) {
            for &(slot, layer) in &slots {
                let Some(comp) = self.components.get(&cc) else {
                    continue;
                };
                let overlap = region.intersect(&comp.vertex_region());
                let value_at =
                    |p: GridCoord| data[region.index_of(p)].get(slot).copied().unwrap_or(0);
                if !comp.has_layer(layer) {
                    if overlap.iter().all(|p| value_at(p) == 0)
                        || !self.can_paint_layer(cc, layer, restriction)
                    {
                        continue;
                    }
                }
                self.capture_component(cc);
                let Some(comp) = self.components.get_mut(&cc) else {
                    continue;
                };
                let a = comp.allocation_index(layer);
                for coord in overlap.iter() {
                    if let Some(i) = comp.local_index(coord) {
                        comp.weights[a].data[i] = value_at(coord);
                    }
                }
                self.mark_dirty(DataKind::Weight, cc);
            }
        }
    }

    // Visibility and selection bytes

    pub fn read_visibility(&self, region: Region, out: &mut HashMap<GridCoord, u8>) {
        self.read_exact(region, out, |c, p| c.visibility(p));
    }

    pub fn write_visibility(&mut self, region: Region, data: &[u8]) {
        self.write_byte_plane(DataKind::Visibility, region, data);
    }

    pub fn read_select(&self, region: Region, out: &mut HashMap<GridCoord, u8>) {
        self.read_exact(region, out, |c, p| c.select_value(p));
    }

    pub fn write_select(&mut self, region: Region, data: &[u8]) {
        self.write_byte_plane(DataKind::Selection, region, data);
    }

    fn write_byte_plane(&mut self, kind: DataKind, region: Region, data: &[u8]) {
        if !self.check_block(region, data.len()) {
            return;
        }
        for cc in self.components_in_region(region) {
            let Some(comp) = self.components.get(&cc) else {
                continue;
            };
            let overlap = region.intersect(&comp.vertex_region());
            let allocated = match kind {
                DataKind::Visibility => comp.visibility.is_some(),
                _ => comp.select.is_some(),
            };
            if !allocated && overlap.iter().all(|p| data[region.index_of(p)] == 0) {
                continue;
            }
            self.capture_component(cc);
            let Some(comp) = self.components.get_mut(&cc) else {
                continue;
            };
            let verts = comp.heights.len();
            let plane = match kind {
                DataKind::Visibility => comp.visibility.get_or_insert_with(|| vec![0; verts]),
                _ => comp.select.get_or_insert_with(|| vec![0; verts]),
            };
            for coord in overlap.iter() {
                let lx = coord.x - cc.x * comp.size_quads;
                let ly = coord.y - cc.y * comp.size_quads;
                plane[(lx + ly * (comp.size_quads + 1)) as usize] = data[region.index_of(coord)];
            }
            self.mark_dirty(kind, cc);
        }
    }

    // XY offsets

    /// Offsets with the vertex's world-local height in `z`.
    pub fn read_xy_offsets(&self, region: Region, out: &mut HashMap<GridCoord, Vec3>) {
        let zscale = LANDSCAPE_ZSCALE * self.draw_scale.z;
        self.read_exact(region, out, |c, p| {
            let offset = c.xy_offset(p)?;
            let h = c.height(p)?;
            Some(offset.extend((h as f32 - HEIGHT_MID as f32) * zscale))
        });
    }

    /// Write offsets and the heights encoded in `z` (clamped to the raw range).
    pub fn write_xy_offsets(&mut self, region: Region, data: &[Vec3]) {
        if !self.check_block(region, data.len()) {
            return;
        }
        for cc in self.components_in_region(region) {
            self.capture_component(cc);
            let Some(comp) = self.components.get_mut(&cc) else {
                continue;
            };
            let verts = comp.heights.len();
            let overlap = region.intersect(&comp.vertex_region());
            for coord in overlap.iter() {
                if let Some(i) = comp.local_index(coord) {
                    let v = data[region.index_of(coord)];
                    comp.xy_offsets.get_or_insert_with(|| vec![Vec2::ZERO; verts])[i] = v.truncate();
                }
            }
            self.mark_dirty(DataKind::XyOffset, cc);
        }
        let heights: Vec<u16> = data
            .iter()
            .map(|v| self.raw_height(v.z).round().clamp(0.0, 65535.0) as u16)
            .collect();
        self.write_heights(region, &heights);
    }

    // Selection state

    /// Selection mask value at a vertex (0 when unselected).
    pub fn selected_region(&self, coord: GridCoord) -> f32 {
        self.selected_region.get(&coord).copied().unwrap_or(0.0)
    }

    pub fn has_selected_region(&self) -> bool {
        !self.selected_region.is_empty()
    }

    pub fn selected_region_map(&self) -> &HashMap<GridCoord, f32> {
        &self.selected_region
    }

    /// Set a vertex's selection value; values at or below zero deselect it.
    pub fn set_selected_region(&mut self, coord: GridCoord, value: f32) {
        self.capture_selection();
        if value <= 0.0 {
            self.selected_region.remove(&coord);
        } else {
            self.selected_region.insert(coord, value.min(1.0));
        }
    }

    pub fn selected_components(&self) -> &HashSet<ComponentCoord> {
        &self.selected_components
    }

    pub fn is_component_selected(&self, coord: ComponentCoord) -> bool {
        self.selected_components.contains(&coord)
    }

    pub fn set_component_selected(&mut self, coord: ComponentCoord, selected: bool) {
        if !self.components.contains_key(&coord) {
            return;
        }
        self.capture_selection();
        if selected {
            self.selected_components.insert(coord);
        } else {
            self.selected_components.remove(&coord);
        }
    }

    pub fn clear_selection(&mut self) {
        self.capture_selection();
        self.selected_region.clear();
        self.selected_components.clear();
    }

    // Attached decorations

    pub fn add_instance(&mut self, x: f32, y: f32) {
        let z = self
            .sample_height(x, y)
            .map_or(0.0, |raw| self.world_height(raw));
        self.instances.push(AttachedInstance { x, y, z });
    }

    pub fn instances(&self) -> &[AttachedInstance] {
        &self.instances
    }

    fn snap_instances(&mut self, region: Region) {
        let touched: Vec<usize> = self
            .instances
            .iter()
            .enumerate()
            .filter(|(_, inst)| {
                inst.x >= region.x1 as f32 - 1.0
                    && inst.x <= region.x2 as f32 + 1.0
                    && inst.y >= region.y1 as f32 - 1.0
                    && inst.y <= region.y2 as f32 + 1.0
            })
            .map(|(i, _)| i)
            .collect();
        if touched.is_empty() {
            return;
        }
        if let Some(tx) = self.transaction.as_mut() {
            if tx.instances.is_none() {
                tx.instances = Some(self.instances.clone());
            }
        }
        for i in touched {
            let inst = self.instances[i];
            if let Some(raw) = self.sample_height(inst.x, inst.y) {
                self.instances[i].z = self.world_height(raw);
            }
        }
    }

    // Transactions

    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    pub fn begin_transaction(&mut self, description: &str) {
        if let Some(open) = &self.transaction {
            log::warn!(
                "Transaction '{}' already open, ignoring '{}'",
                open.description,
                description
            );
            return;
        }
        self.transaction = Some(Transaction::new(description));
    }

    /// Close the open transaction; `None` if nothing was modified.
    pub fn end_transaction(&mut self) -> Option<Transaction> {
        self.transaction.take().filter(|tx| !tx.is_empty())
    }

    /// Swap a transaction's snapshots into the terrain and return the
    /// snapshots it replaced, ready to re-apply in the other direction.
    pub fn restore(&mut self, transaction: Transaction) -> Transaction {
        let mut inverse = Transaction::new(&transaction.description);
        for (cc, mut comp) in transaction.components {
            comp.recompute_bounds();
            comp.collision_revision += 1;
            if let Some(current) = self.components.insert(cc, comp) {
                inverse.components.insert(cc, current);
            }
        }
        if let Some(region) = transaction.selected_region {
            inverse.selected_region = Some(mem::replace(&mut self.selected_region, region));
        }
        if let Some(selected) = transaction.selected_components {
            inverse.selected_components =
                Some(mem::replace(&mut self.selected_components, selected));
        }
        if let Some(instances) = transaction.instances {
            inverse.instances = Some(mem::replace(&mut self.instances, instances));
        }
        self.revision += 1;
        inverse
    }

    fn capture_component(&mut self, cc: ComponentCoord) {
        if let Some(tx) = self.transaction.as_mut() {
            if !tx.components.contains_key(&cc) {
                if let Some(comp) = self.components.get(&cc) {
                    tx.components.insert(cc, comp.clone());
                }
            }
        }
    }

    fn capture_selection(&mut self) {
        if let Some(tx) = self.transaction.as_mut() {
            if tx.selected_region.is_none() {
                tx.selected_region = Some(self.selected_region.clone());
                tx.selected_components = Some(self.selected_components.clone());
            }
        }
    }
}
