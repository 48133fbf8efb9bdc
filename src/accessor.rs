//! Per-data-kind read/write paths between edit caches and [`TerrainData`].
//!
//! An accessor is created with its stroke and is the only thing that reads
//! or writes the raster of its kind. Interpolating accessors may widen or
//! clamp a requested rectangle and report the part that holds real data;
//! exact accessors read precisely what was asked for.

use std::collections::HashMap;

use glam::Vec3;

use crate::grid::{GridCoord, Region};
use crate::settings::PaintingRestriction;
use crate::terrain_data::{DataKind, LayerId, TerrainData};

pub trait Accessor {
    type Value: Clone + Default;

    /// Whether caches should use [`Accessor::get_data`] and track valid bounds.
    const USE_INTERP: bool;

    /// Kind committed by [`Accessor::flush`].
    const KIND: DataKind;

    /// Interpolated read. May shrink or move `region` to the sub-rectangle
    /// that actually holds data.
    fn get_data(
        &mut self,
        terrain: &TerrainData,
        region: &mut Region,
        out: &mut HashMap<GridCoord, Self::Value>,
    ) {
        self.get_data_fast(terrain, *region, out);
    }

    /// Exact read of `region`; cells without storage are left out.
    fn get_data_fast(
        &mut self,
        terrain: &TerrainData,
        region: Region,
        out: &mut HashMap<GridCoord, Self::Value>,
    );

    /// Write a row-major block covering `region`.
    fn set_data(
        &mut self,
        terrain: &mut TerrainData,
        region: Region,
        data: &[Self::Value],
        restriction: PaintingRestriction,
    );

    /// Commit pending writes and refresh derived data.
    fn flush(&mut self, terrain: &mut TerrainData) {
        terrain.commit(Self::KIND);
    }
}

/// Raw 16-bit heights.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeightAccessor;

impl Accessor for HeightAccessor {
    type Value = u16;
    const USE_INTERP: bool = true;
    const KIND: DataKind = DataKind::Height;

    fn get_data(
        &mut self,
        terrain: &TerrainData,
        region: &mut Region,
        out: &mut HashMap<GridCoord, u16>,
    ) {
        terrain.read_heights_interp(region, out);
    }

    fn get_data_fast(&mut self, terrain: &TerrainData, region: Region, out: &mut HashMap<GridCoord, u16>) {
        terrain.read_heights(region, out);
    }

    fn set_data(
        &mut self,
        terrain: &mut TerrainData,
        region: Region,
        data: &[u16],
        _restriction: PaintingRestriction,
    ) {
        terrain.write_heights(region, data);
    }
}

/// XY displacement with the world-local height in `z`.
#[derive(Clone, Copy, Debug, Default)]
pub struct XyOffsetAccessor;

impl Accessor for XyOffsetAccessor {
    type Value = Vec3;
    const USE_INTERP: bool = true;
    const KIND: DataKind = DataKind::XyOffset;

    fn get_data(
        &mut self,
        terrain: &TerrainData,
        region: &mut Region,
        out: &mut HashMap<GridCoord, Vec3>,
    ) {
        let valid = region.intersect(&terrain.extent());
        if valid.is_empty() {
            return;
        }
        *region = valid;
        terrain.read_xy_offsets(valid, out);
    }

    fn get_data_fast(&mut self, terrain: &TerrainData, region: Region, out: &mut HashMap<GridCoord, Vec3>) {
        terrain.read_xy_offsets(region, out);
    }

    fn set_data(
        &mut self,
        terrain: &mut TerrainData,
        region: Region,
        data: &[Vec3],
        _restriction: PaintingRestriction,
    ) {
        terrain.write_xy_offsets(region, data);
    }

    fn flush(&mut self, terrain: &mut TerrainData) {
        terrain.commit(DataKind::XyOffset);
        terrain.commit(DataKind::Height);
    }
}

/// One weight layer.
#[derive(Clone, Copy, Debug)]
pub struct AlphaAccessor {
    layer: LayerId,
}

impl AlphaAccessor {
    pub fn new(layer: LayerId) -> Self {
        Self { layer }
    }

    pub fn layer(&self) -> LayerId {
        self.layer
    }
}

impl Accessor for AlphaAccessor {
    type Value = u8;
    const USE_INTERP: bool = true;
    const KIND: DataKind = DataKind::Weight;

    fn get_data(&mut self, terrain: &TerrainData, region: &mut Region, out: &mut HashMap<GridCoord, u8>) {
        terrain.read_weights_interp(self.layer, region, out);
    }

    fn get_data_fast(&mut self, terrain: &TerrainData, region: Region, out: &mut HashMap<GridCoord, u8>) {
        terrain.read_weights(self.layer, region, out);
    }

    fn set_data(
        &mut self,
        terrain: &mut TerrainData,
        region: Region,
        data: &[u8],
        restriction: PaintingRestriction,
    ) {
        terrain.write_weights(self.layer, region, data, restriction);
    }
}

/// Visibility mask: 255 hides a quad, 0 shows it.
#[derive(Clone, Copy, Debug, Default)]
pub struct VisibilityAccessor;

impl Accessor for VisibilityAccessor {
    type Value = u8;
    const USE_INTERP: bool = false;
    const KIND: DataKind = DataKind::Visibility;

    fn get_data_fast(&mut self, terrain: &TerrainData, region: Region, out: &mut HashMap<GridCoord, u8>) {
        terrain.read_visibility(region, out);
    }

    fn set_data(
        &mut self,
        terrain: &mut TerrainData,
        region: Region,
        data: &[u8],
        _restriction: PaintingRestriction,
    ) {
        terrain.write_visibility(region, data);
    }
}

/// Selection bytes mirrored from the selection mask for display.
#[derive(Clone, Copy, Debug, Default)]
pub struct SelectionAccessor;

impl Accessor for SelectionAccessor {
    type Value = u8;
    const USE_INTERP: bool = false;
    const KIND: DataKind = DataKind::Selection;

    fn get_data_fast(&mut self, terrain: &TerrainData, region: Region, out: &mut HashMap<GridCoord, u8>) {
        terrain.read_select(region, out);
    }

    fn set_data(
        &mut self,
        terrain: &mut TerrainData,
        region: Region,
        data: &[u8],
        _restriction: PaintingRestriction,
    ) {
        terrain.write_select(region, data);
    }
}

/// Every layer at once: one byte per registered layer, in layer order.
/// Writes only touch the layers marked dirty.
#[derive(Clone, Debug, Default)]
pub struct FullWeightAccessor {
    dirty_layers: Vec<LayerId>,
}

impl FullWeightAccessor {
    pub fn add_dirty_layer(&mut self, layer: LayerId) {
        if !self.dirty_layers.contains(&layer) {
            self.dirty_layers.push(layer);
        }
    }

    pub fn dirty_layers(&self) -> &[LayerId] {
        &self.dirty_layers
    }
}

impl Accessor for FullWeightAccessor {
    type Value = Vec<u8>;
    const USE_INTERP: bool = false;
    const KIND: DataKind = DataKind::Weight;

    fn get_data_fast(&mut self, terrain: &TerrainData, region: Region, out: &mut HashMap<GridCoord, Vec<u8>>) {
        terrain.read_all_weights(region, out);
    }

    fn set_data(
        &mut self,
        terrain: &mut TerrainData,
        region: Region,
        data: &[Vec<u8>],
        restriction: PaintingRestriction,
    ) {
        terrain.write_all_weights(&self.dirty_layers, region, data, restriction);
    }
}
