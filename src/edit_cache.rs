//! Per-stroke sparse cache over one accessor.
//!
//! The cache keeps two maps: `current`, the working copy strokes read and
//! write, and `original`, the first value ever fetched for each coordinate.
//! Growing the cached rectangle only fetches the new strips around the old
//! one, so neither map is ever refetched or overwritten by a later fetch.

use std::collections::HashMap;

use glam::Vec3;

use crate::accessor::{Accessor, FullWeightAccessor};
use crate::error::{EditError, EditResult};
use crate::grid::{GridCoord, Region};
use crate::settings::PaintingRestriction;
use crate::terrain_data::{LayerId, TerrainData};

/// Numeric cache values that strokes blend as `f32`.
pub trait ScalarValue: Copy + Default {
    /// Largest storable value.
    const MAX: f32;

    fn to_f32(self) -> f32;

    /// Round and clamp into the storable range.
    fn clamp_from(value: f32) -> Self;
}

impl ScalarValue for u16 {
    const MAX: f32 = 65535.0;

    fn to_f32(self) -> f32 {
        self as f32
    }

    fn clamp_from(value: f32) -> Self {
        value.round().clamp(0.0, 65535.0) as u16
    }
}

impl ScalarValue for u8 {
    const MAX: f32 = 255.0;

    fn to_f32(self) -> f32 {
        self as f32
    }

    fn clamp_from(value: f32) -> Self {
        value.round().clamp(0.0, 255.0) as u8
    }
}

pub struct EditCache<A: Accessor> {
    accessor: A,
    current: HashMap<GridCoord, A::Value>,
    original: HashMap<GridCoord, A::Value>,
    /// Rectangle fully fetched so far.
    cached: Region,
    /// Part of `cached` backed by real data (interpolating accessors only).
    valid: Region,
    is_valid: bool,
}

impl<A: Accessor> EditCache<A> {
    pub fn new(accessor: A) -> Self {
        Self {
            accessor,
            current: HashMap::new(),
            original: HashMap::new(),
            cached: Region::EMPTY,
            valid: Region::EMPTY,
            is_valid: false,
        }
    }

    pub fn accessor(&self) -> &A {
        &self.accessor
    }

    pub fn accessor_mut(&mut self) -> &mut A {
        &mut self.accessor
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn cached_region(&self) -> Region {
        self.cached
    }

    pub fn valid_region(&self) -> Region {
        self.valid
    }

    pub fn current(&self, coord: GridCoord) -> Option<&A::Value> {
        self.current.get(&coord)
    }

    pub fn original(&self, coord: GridCoord) -> Option<&A::Value> {
        self.original.get(&coord)
    }

    pub fn current_len(&self) -> usize {
        self.current.len()
    }

    pub fn original_len(&self) -> usize {
        self.original.len()
    }

    /// Make sure every coordinate of `region` has been fetched.
    pub fn cache_data(&mut self, terrain: &TerrainData, region: Region) -> EditResult<()> {
        if region.is_empty() {
            return Ok(());
        }

        if !self.is_valid {
            let valid = self.fetch(terrain, region)?;
            self.cached = region;
            self.valid = valid.unwrap_or(region);
            self.is_valid = true;
            return Ok(());
        }

        if self.cached.contains_region(&region) {
            return Ok(());
        }

        let old = self.cached;
        let y1 = region.y1.min(old.y1);
        let y2 = region.y2.max(old.y2);
        let x1 = region.x1.min(old.x1);
        let x2 = region.x2.max(old.x2);

        let mut strips = Vec::with_capacity(4);
        if region.x1 < old.x1 {
            strips.push(Region::new(region.x1, y1, old.x1 - 1, y2));
        }
        if region.x2 > old.x2 {
            strips.push(Region::new(old.x2 + 1, y1, region.x2, y2));
        }
        if region.y1 < old.y1 {
            strips.push(Region::new(old.x1, region.y1, old.x2, old.y1 - 1));
        }
        if region.y2 > old.y2 {
            strips.push(Region::new(old.x1, old.y2 + 1, old.x2, region.y2));
        }

        for strip in strips {
            if let Some(valid) = self.fetch(terrain, strip)? {
                self.valid = self.valid.union(&valid);
            }
        }
        self.cached = Region::new(x1, y1, x2, y2);
        Ok(())
    }

    /// Fetch one rectangle and merge it without touching existing entries.
    /// Returns the valid sub-rectangle when data came back.
    fn fetch(&mut self, terrain: &TerrainData, region: Region) -> EditResult<Option<Region>> {
        let mut fetched = HashMap::new();
        let mut valid = region;
        if A::USE_INTERP {
            self.accessor.get_data(terrain, &mut valid, &mut fetched);
            if valid.is_empty() {
                log::error!("Invalid cache area: {} after requesting {}", valid, region);
                debug_assert!(false, "invalid cache area {valid} after requesting {region}");
                return Err(EditError::InvalidCacheArea {
                    valid,
                    requested: region,
                });
            }
        } else {
            self.accessor.get_data_fast(terrain, region, &mut fetched);
        }

        if fetched.is_empty() {
            return Ok(None);
        }
        for (coord, value) in fetched {
            self.original.entry(coord).or_insert_with(|| value.clone());
            self.current.entry(coord).or_insert(value);
        }
        Ok(Some(valid))
    }

    /// Row-major copy of `current` over `region`; missing cells read as default.
    pub fn get_cached_data(&self, region: Region) -> Vec<A::Value> {
        region
            .iter()
            .map(|c| self.current.get(&c).cloned().unwrap_or_default())
            .collect()
    }

    /// Row-major copy of `original` over `region`.
    pub fn get_original_data(&self, region: Region) -> Vec<A::Value> {
        region
            .iter()
            .map(|c| self.original.get(&c).cloned().unwrap_or_default())
            .collect()
    }

    /// Write a row-major block into `current` and through to storage.
    /// Cells with no backing storage are not materialized.
    pub fn set_cached_data(
        &mut self,
        terrain: &mut TerrainData,
        region: Region,
        data: &[A::Value],
        restriction: PaintingRestriction,
    ) {
        if region.is_empty() || data.len() < region.len() {
            return;
        }
        for (coord, value) in region.iter().zip(data) {
            if let Some(slot) = self.current.get_mut(&coord) {
                *slot = value.clone();
            }
        }
        self.accessor.set_data(terrain, region, data, restriction);
    }

    /// Commit everything written through this cache.
    pub fn flush(&mut self, terrain: &mut TerrainData) {
        self.accessor.flush(terrain);
    }
}

impl<A: Accessor> EditCache<A>
where
    A::Value: ScalarValue,
{
    fn sample(&self, x: i32, y: i32) -> Option<f32> {
        self.current.get(&GridCoord::new(x, y)).map(|v| v.to_f32())
    }

    /// The 2x2 neighbourhood at `(x, y)`, missing corners substituted by
    /// the opposite diagonal, then the X neighbour, then the Y neighbour.
    fn corners(&self, x: i32, y: i32) -> Option<[f32; 4]> {
        let p00 = self.sample(x, y);
        let p10 = self.sample(x + 1, y);
        let p01 = self.sample(x, y + 1);
        let p11 = self.sample(x + 1, y + 1);
        if p00.is_none() && p10.is_none() && p01.is_none() && p11.is_none() {
            return None;
        }
        let v00 = p00.or(p11).or(p10).or(p01)?;
        let v10 = p10.or(p01).or(p00).or(p11)?;
        let v01 = p01.or(p10).or(p11).or(p00)?;
        let v11 = p11.or(p00).or(p01).or(p10)?;
        Some([v00, v10, v01, v11])
    }

    /// Bilinear value at a fractional position; zero only if all four
    /// surrounding samples are missing.
    pub fn get_value(&self, x: f32, y: f32) -> f32 {
        let x0 = x.floor();
        let y0 = y.floor();
        let Some([v00, v10, v01, v11]) = self.corners(x0 as i32, y0 as i32) else {
            return 0.0;
        };
        let fx = x - x0;
        let fy = y - y0;
        let top = v00 + (v10 - v00) * fx;
        let bottom = v01 + (v11 - v01) * fx;
        top + (bottom - top) * fy
    }

    /// Unit normal of the quad at `(x, y)` in raw value units.
    pub fn get_normal(&self, x: i32, y: i32) -> Vec3 {
        self.get_normal_scaled(x, y, 1.0)
    }

    /// Unit normal with values multiplied by `z_scale` (value units per cell).
    pub fn get_normal_scaled(&self, x: i32, y: i32, z_scale: f32) -> Vec3 {
        let Some([v00, v10, v01, v11]) = self.corners(x, y) else {
            return Vec3::Z;
        };
        let vert00 = Vec3::new(0.0, 0.0, v00 * z_scale);
        let vert01 = Vec3::new(0.0, 1.0, v01 * z_scale);
        let vert10 = Vec3::new(1.0, 0.0, v10 * z_scale);
        let vert11 = Vec3::new(1.0, 1.0, v11 * z_scale);

        let face1 = (vert00 - vert10).cross(vert10 - vert11).normalize_or_zero();
        let face2 = (vert11 - vert01).cross(vert01 - vert00).normalize_or_zero();
        let normal = (face1 + face2).normalize_or_zero();
        if normal == Vec3::ZERO {
            Vec3::Z
        } else {
            normal
        }
    }
}

impl EditCache<FullWeightAccessor> {
    pub fn add_dirty_layer(&mut self, layer: LayerId) {
        self.accessor.add_dirty_layer(layer);
    }

    /// Flattened `region.len() * layer_count` bytes, layer-minor.
    pub fn get_cached_layers(&self, region: Region, layer_count: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(region.len() * layer_count);
        for coord in region.iter() {
            let cell = self.current.get(&coord);
            for layer in 0..layer_count {
                out.push(cell.and_then(|v| v.get(layer)).copied().unwrap_or(0));
            }
        }
        out
    }

    pub fn set_cached_layers(
        &mut self,
        terrain: &mut TerrainData,
        region: Region,
        data: &[u8],
        layer_count: usize,
        restriction: PaintingRestriction,
    ) {
        if layer_count == 0 {
            return;
        }
        let cells: Vec<Vec<u8>> = data.chunks(layer_count).map(|c| c.to_vec()).collect();
        self.set_cached_data(terrain, region, &cells, restriction);
    }
}
