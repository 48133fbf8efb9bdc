//! Copy/paste region.
//!
//! The gizmo is a rotated rectangle over the landscape with its own sparse
//! grid of copied samples. Copy rasterizes terrain data into the grid;
//! paste reads it back through [`LandscapeGizmo::sample_at`] and
//! [`LandscapeGizmo::blend_at`], optionally after the rectangle was moved,
//! turned, resized or mirrored.

use std::collections::HashMap;

use glam::Vec2;

use crate::grid::{GridCoord, Region};
use crate::terrain_data::LayerId;

/// Which copied value to read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GizmoChannel {
    /// Raw height samples.
    Height,
    Weight(LayerId),
}

/// One copied cell. `ratio` is how much of the copy the selection allowed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GizmoSelectData {
    pub ratio: f32,
    pub height: f32,
    pub weights: HashMap<LayerId, f32>,
}

impl GizmoSelectData {
    fn value(&self, channel: GizmoChannel) -> f32 {
        match channel {
            GizmoChannel::Height => self.height,
            GizmoChannel::Weight(layer) => self.weights.get(&layer).copied().unwrap_or(0.0),
        }
    }
}

/// Blended gizmo value at a landscape position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GizmoSample {
    /// Ratio-weighted mean of the copied values around the point.
    pub value: f32,
    /// How strongly the copy overrides the terrain there, 0..=1.
    pub weight: f32,
}

#[derive(Clone, Debug)]
pub struct LandscapeGizmo {
    /// Centre in landscape cells.
    pub location: Vec2,
    pub yaw_degrees: f32,
    /// Extent along the gizmo's local X, in world units.
    pub width: f32,
    /// Extent along the gizmo's local Y, in world units.
    pub height: f32,
    pub flip_x: bool,
    pub flip_y: bool,
    cached_width: f32,
    cached_height: f32,
    cached_scale_xy: f32,
    selected_data: HashMap<GridCoord, GizmoSelectData>,
    layers: Vec<LayerId>,
    has_height: bool,
    has_weight: bool,
}

impl Default for LandscapeGizmo {
    fn default() -> Self {
        Self::new(Vec2::ZERO, 0.0, 0.0)
    }
}

impl LandscapeGizmo {
    pub fn new(location: Vec2, width: f32, height: f32) -> Self {
        Self {
            location,
            yaw_degrees: 0.0,
            width,
            height,
            flip_x: false,
            flip_y: false,
            cached_width: width,
            cached_height: height,
            cached_scale_xy: 1.0,
            selected_data: HashMap::new(),
            layers: Vec::new(),
            has_height: false,
            has_weight: false,
        }
    }

    /// Width and height in landscape cells.
    pub fn size_in_cells(&self, scale_xy: f32) -> Vec2 {
        let s = scale_xy.max(f32::EPSILON);
        Vec2::new(self.width / s, self.height / s)
    }

    fn rotation(&self) -> Vec2 {
        Vec2::from_angle(self.yaw_degrees.to_radians())
    }

    /// Landscape position of a copy-grid cell, for the current size.
    pub fn copy_cell_to_landscape(&self, cell: GridCoord, scale_xy: f32) -> Vec2 {
        let size = self.size_in_cells(scale_xy);
        let half = (size - Vec2::ONE) * 0.5;
        let local = Vec2::new(cell.x as f32, cell.y as f32) - half;
        self.rotation().rotate(local) + self.location
    }

    /// Position of a landscape point inside the rectangle, where the
    /// interior is `0 < x < width`, `0 < y < height` (cells).
    pub fn landscape_to_local(&self, x: f32, y: f32, scale_xy: f32) -> Vec2 {
        let size = self.size_in_cells(scale_xy);
        let inv = Vec2::from_angle(-self.yaw_degrees.to_radians());
        inv.rotate(Vec2::new(x, y) - self.location) + size * 0.5 - Vec2::splat(0.5)
    }

    /// Copy-grid position of a landscape point, accounting for resizing and
    /// mirroring since the copy.
    pub fn landscape_to_copy(&self, x: f32, y: f32, scale_xy: f32) -> Vec2 {
        let sign = Vec2::new(
            if self.flip_x { -1.0 } else { 1.0 },
            if self.flip_y { -1.0 } else { 1.0 },
        );
        let size = self.size_in_cells(scale_xy);
        let inv = Vec2::from_angle(-self.yaw_degrees.to_radians());
        // Mirroring is about the rectangle's centre.
        let local =
            inv.rotate(Vec2::new(x, y) - self.location) * sign + size * 0.5 - Vec2::splat(0.5);
        let rescale = Vec2::new(
            ratio(self.cached_width, self.width) * scale_xy / self.cached_scale_xy,
            ratio(self.cached_height, self.height) * scale_xy / self.cached_scale_xy,
        );
        local * rescale
    }

    /// Landscape cells covered by the rectangle, unclipped.
    pub fn landscape_bounds(&self, scale_xy: f32) -> Region {
        let size = self.size_in_cells(scale_xy);
        if size.x <= 0.0 || size.y <= 0.0 {
            return Region::EMPTY;
        }
        let offset = size * 0.5 - Vec2::splat(0.5);
        let rot = self.rotation();
        let corners = [
            Vec2::ZERO,
            Vec2::new(size.x, 0.0),
            Vec2::new(0.0, size.y),
            size,
        ];
        let mut min = Vec2::splat(f32::MAX);
        let mut max = Vec2::splat(f32::MIN);
        for corner in corners {
            let p = rot.rotate(corner - offset) + self.location;
            min = min.min(p);
            max = max.max(p);
        }
        Region::new(
            min.x.floor() as i32,
            min.y.floor() as i32,
            max.x.ceil() as i32,
            max.y.ceil() as i32,
        )
    }

    /// Dimensions of the copy grid for the current size.
    pub fn copy_grid_size(&self, scale_xy: f32) -> (i32, i32) {
        let size = self.size_in_cells(scale_xy);
        (size.x.ceil() as i32, size.y.ceil() as i32)
    }

    /// Drop copied data and remember the size it will be copied at.
    pub fn begin_copy(&mut self, scale_xy: f32) {
        self.selected_data.clear();
        self.cached_width = self.width;
        self.cached_height = self.height;
        self.cached_scale_xy = scale_xy.max(f32::EPSILON);
    }

    pub fn clear_data(&mut self) {
        self.selected_data.clear();
        self.layers.clear();
        self.has_height = false;
        self.has_weight = false;
    }

    /// Store one copied value. A cell keeps the ratio it was first stored with.
    pub fn store(&mut self, cell: GridCoord, ratio: f32, channel: GizmoChannel, value: f32) {
        let data = self
            .selected_data
            .entry(cell)
            .or_insert_with(|| GizmoSelectData {
                ratio,
                ..Default::default()
            });
        match channel {
            GizmoChannel::Height => data.height = value,
            GizmoChannel::Weight(layer) => {
                data.weights.insert(layer, value);
            }
        }
    }

    pub fn mark_copied(&mut self, height: bool, weight: bool) {
        self.has_height |= height;
        self.has_weight |= weight;
    }

    pub fn add_layer(&mut self, layer: LayerId) {
        if !self.layers.contains(&layer) {
            self.layers.push(layer);
        }
    }

    pub fn layers(&self) -> &[LayerId] {
        &self.layers
    }

    pub fn has_height(&self) -> bool {
        self.has_height
    }

    pub fn has_weight(&self) -> bool {
        self.has_weight
    }

    pub fn has_data(&self) -> bool {
        !self.selected_data.is_empty()
    }

    pub fn data_len(&self) -> usize {
        self.selected_data.len()
    }

    pub fn cell(&self, cell: GridCoord) -> Option<&GizmoSelectData> {
        self.selected_data.get(&cell)
    }

    /// Bilinear read of the copy at a landscape position. `None` when no
    /// copied cell surrounds the point.
    pub fn sample_at(&self, x: f32, y: f32, channel: GizmoChannel, scale_xy: f32) -> Option<GizmoSample> {
        let p = self.landscape_to_copy(x, y, scale_xy);
        let lx = p.x.floor();
        let ly = p.y.floor();
        let (fx, fy) = (p.x - lx, p.y - ly);
        let base = GridCoord::new(lx as i32, ly as i32);
        let corners = [
            (base, (1.0 - fx) * (1.0 - fy)),
            (base.offset(1, 0), fx * (1.0 - fy)),
            (base.offset(0, 1), (1.0 - fx) * fy),
            (base.offset(1, 1), fx * fy),
        ];
        let mut found = false;
        let mut weight = 0.0;
        let mut weighted = 0.0;
        for (cell, b) in corners {
            if let Some(data) = self.selected_data.get(&cell) {
                found = true;
                weight += b * data.ratio;
                weighted += b * data.ratio * data.value(channel);
            }
        }
        if !found {
            return None;
        }
        let value = if weight > 0.0 { weighted / weight } else { 0.0 };
        Some(GizmoSample { value, weight })
    }

    /// `original` with each surrounding copied cell lerped in by its ratio,
    /// then blended bilinearly. Missing cells keep `original`.
    pub fn blend_at(&self, x: f32, y: f32, channel: GizmoChannel, original: f32, scale_xy: f32) -> f32 {
        match self.sample_at(x, y, channel, scale_xy) {
            Some(sample) => original + (sample.value - original) * sample.weight,
            None => original,
        }
    }
}

fn ratio(cached: f32, current: f32) -> f32 {
    if current.abs() <= f32::EPSILON {
        1.0
    } else {
        cached / current
    }
}
