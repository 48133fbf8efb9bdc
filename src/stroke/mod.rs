//! Stroke algorithms.
//!
//! A stroke lives from mouse-down to mouse-up. Each `apply` asks the brush
//! for weights, grows the brush rectangle by one cell so normals at the rim
//! see their neighbours, caches that rectangle, blends new values in, writes
//! them back and flushes.

pub mod copy_paste;
pub mod flatten;
pub mod noise;
pub mod paint;
pub mod select;
pub mod smooth;
pub mod visibility;

use std::marker::PhantomData;

use crate::accessor::{Accessor, AlphaAccessor, HeightAccessor};
use crate::brush::{Brush, BrushContext, BrushWeights, CursorSample};
use crate::edit_cache::{EditCache, ScalarValue};
use crate::error::{EditError, EditResult};
use crate::gizmo::LandscapeGizmo;
use crate::grid::Region;
use crate::settings::EditorSettings;
use crate::terrain_data::{LayerId, TerrainData, LANDSCAPE_INV_ZSCALE};

pub use copy_paste::{CopyStroke, PasteStroke};
pub use flatten::FlattenStroke;
pub use noise::NoiseStroke;
pub use paint::PaintStroke;
pub use select::SelectStroke;
pub use smooth::SmoothStroke;
pub use visibility::VisibilityStroke;

/// Raster a tool edits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditTarget {
    Heightmap,
    Weightmap(LayerId),
}

impl EditTarget {
    pub fn layer(self) -> Option<LayerId> {
        match self {
            EditTarget::Heightmap => None,
            EditTarget::Weightmap(layer) => Some(layer),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EditTarget::Heightmap => "heightmap",
            EditTarget::Weightmap(_) => "weightmap",
        }
    }
}

/// Everything a stroke may read or write during one apply.
pub struct StrokeContext<'a> {
    pub terrain: &'a mut TerrainData,
    pub settings: &'a EditorSettings,
    pub gizmo: &'a mut LandscapeGizmo,
    pub target: EditTarget,
    pub tool_is_mask: bool,
}

impl<'a> StrokeContext<'a> {
    pub fn brush_context(&self) -> BrushContext<'_> {
        BrushContext {
            terrain: &*self.terrain,
            settings: self.settings,
            gizmo: &*self.gizmo,
            tool_is_mask: self.tool_is_mask,
            target_layer: self.target.layer(),
        }
    }

    /// Brush weights for `samples`, or `None` when the brush has no effect.
    pub fn brush_weights(
        &self,
        brush: &mut dyn Brush,
        samples: &[CursorSample],
    ) -> Option<BrushWeights> {
        let weights = brush.apply_brush(&self.brush_context(), samples)?;
        if weights.is_empty() {
            return None;
        }
        Some(weights)
    }
}

pub trait Stroke {
    fn apply(&mut self, ctx: &mut StrokeContext<'_>, brush: &mut dyn Brush, samples: &[CursorSample]);

    /// Last call of the stroke, after the remaining samples were applied.
    fn finish(&mut self, _terrain: &mut TerrainData) {}
}

/// Scalar raster a generic stroke edits, with its strength scaling.
pub trait ToolTarget {
    type Value: ScalarValue;
    type Access: Accessor<Value = Self::Value>;

    const IS_HEIGHT: bool;

    fn accessor(target: EditTarget) -> EditResult<Self::Access>;

    /// Value change that a full-strength, full-weight pass applies.
    fn strength_multiplier(terrain: &TerrainData, brush_radius: f32) -> f32;
}

/// Raw 16-bit heights. Strength 1 raises by one brush radius.
pub struct HeightTarget;

impl ToolTarget for HeightTarget {
    type Value = u16;
    type Access = HeightAccessor;

    const IS_HEIGHT: bool = true;

    fn accessor(target: EditTarget) -> EditResult<HeightAccessor> {
        match target {
            EditTarget::Heightmap => Ok(HeightAccessor),
            EditTarget::Weightmap(_) => Err(EditError::InvalidTarget {
                tool: "height stroke",
                target: target.name(),
            }),
        }
    }

    fn strength_multiplier(terrain: &TerrainData, brush_radius: f32) -> f32 {
        brush_radius * LANDSCAPE_INV_ZSCALE / terrain.draw_scale().z.max(f32::EPSILON)
    }
}

/// One weight layer, 0..=255.
pub struct WeightTarget;

impl ToolTarget for WeightTarget {
    type Value = u8;
    type Access = AlphaAccessor;

    const IS_HEIGHT: bool = false;

    fn accessor(target: EditTarget) -> EditResult<AlphaAccessor> {
        match target {
            EditTarget::Weightmap(layer) => Ok(AlphaAccessor::new(layer)),
            EditTarget::Heightmap => Err(EditError::InvalidTarget {
                tool: "weight stroke",
                target: target.name(),
            }),
        }
    }

    fn strength_multiplier(_terrain: &TerrainData, _brush_radius: f32) -> f32 {
        255.0
    }
}

/// Cache for one scalar target, shared by the generic strokes.
pub(crate) struct TargetCache<T: ToolTarget> {
    pub cache: EditCache<T::Access>,
    _target: PhantomData<T>,
}

impl<T: ToolTarget> TargetCache<T> {
    pub fn new(target: EditTarget) -> EditResult<Self> {
        Ok(Self {
            cache: EditCache::new(T::accessor(target)?),
            _target: PhantomData,
        })
    }

    /// Cache the grown brush rectangle. Returns the cached rectangle, or
    /// `None` when the backend broke its contract and the apply must stop.
    pub fn prepare(&mut self, terrain: &TerrainData, weights: &BrushWeights) -> Option<Region> {
        let region = weights.region.grown(1);
        match self.cache.cache_data(terrain, region) {
            Ok(()) => Some(region),
            Err(err) => {
                log::error!("Skipping apply: {err}");
                None
            }
        }
    }

    pub fn read(&self, region: Region) -> Vec<f32> {
        self.cache
            .get_cached_data(region)
            .into_iter()
            .map(ScalarValue::to_f32)
            .collect()
    }

    pub fn read_original(&self, region: Region) -> Vec<f32> {
        self.cache
            .get_original_data(region)
            .into_iter()
            .map(ScalarValue::to_f32)
            .collect()
    }

    /// Clamp, write back and flush.
    pub fn write(&mut self, ctx: &mut StrokeContext<'_>, region: Region, data: &[f32]) {
        let values: Vec<T::Value> = data.iter().map(|&v| T::Value::clamp_from(v)).collect();
        self.cache
            .set_cached_data(ctx.terrain, region, &values, ctx.settings.painting_restriction);
        self.cache.flush(ctx.terrain);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::brush::{BrushKind, CursorSample};

    /// Terrain, settings and gizmo bundled so tests can build contexts.
    pub struct Fixture {
        pub terrain: TerrainData,
        pub settings: EditorSettings,
        pub gizmo: LandscapeGizmo,
        pub brush: Box<dyn Brush>,
    }

    impl Fixture {
        pub fn flat(components: i32, size: i32, height: u16) -> Self {
            Self {
                terrain: TerrainData::flat(components, components, size, height),
                settings: EditorSettings::default(),
                gizmo: LandscapeGizmo::default(),
                brush: BrushKind::CircleSmooth.create(),
            }
        }

        pub fn apply(&mut self, stroke: &mut dyn Stroke, target: EditTarget, samples: &[CursorSample]) {
            self.apply_as(stroke, target, false, samples);
        }

        pub fn apply_as(
            &mut self,
            stroke: &mut dyn Stroke,
            target: EditTarget,
            tool_is_mask: bool,
            samples: &[CursorSample],
        ) {
            let mut ctx = StrokeContext {
                terrain: &mut self.terrain,
                settings: &self.settings,
                gizmo: &mut self.gizmo,
                target,
                tool_is_mask,
            };
            stroke.apply(&mut ctx, self.brush.as_mut(), samples);
        }

        pub fn height(&self, x: i32, y: i32) -> u16 {
            self.terrain
                .height_at(crate::grid::GridCoord::new(x, y))
                .unwrap_or_default()
        }
    }

    pub fn at(x: f32, y: f32) -> [CursorSample; 1] {
        [CursorSample::new(x, y, false)]
    }

    pub fn at_shift(x: f32, y: f32) -> [CursorSample; 1] {
        [CursorSample::new(x, y, true)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strength_multipliers() {
        let mut terrain = TerrainData::new(4);
        assert!((HeightTarget::strength_multiplier(&terrain, 10.0) - 1280.0).abs() < 1e-3);
        terrain.set_draw_scale(glam::Vec3::new(1.0, 1.0, 2.0));
        assert!((HeightTarget::strength_multiplier(&terrain, 10.0) - 640.0).abs() < 1e-3);
        assert_eq!(WeightTarget::strength_multiplier(&terrain, 10.0), 255.0);
    }

    #[test]
    fn test_target_accessor_checks_kind() {
        let mut terrain = TerrainData::new(4);
        let layer = terrain.add_layer("dirt", false);
        assert!(HeightTarget::accessor(EditTarget::Heightmap).is_ok());
        assert!(HeightTarget::accessor(EditTarget::Weightmap(layer)).is_err());
        let acc = WeightTarget::accessor(EditTarget::Weightmap(layer)).expect("weight accessor");
        assert_eq!(acc.layer(), layer);
        assert!(matches!(
            WeightTarget::accessor(EditTarget::Heightmap),
            Err(EditError::InvalidTarget { .. })
        ));
    }
}
