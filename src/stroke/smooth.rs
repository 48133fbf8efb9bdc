use super::{EditTarget, Stroke, StrokeContext, TargetCache, ToolTarget};
use crate::brush::{Brush, CursorSample};
use crate::error::EditResult;
use crate::filters::{box_filter, low_pass_filter, MAX_FILTER_RADIUS};
use crate::terrain_data::TerrainData;

/// Box-filter smoothing, or detail-preserving low-pass smoothing when
/// `detail_smooth` is set.
pub struct SmoothStroke<T: ToolTarget> {
    target: TargetCache<T>,
    warned_no_fft: bool,
}

impl<T: ToolTarget> SmoothStroke<T> {
    pub fn new(target: EditTarget) -> EditResult<Self> {
        Ok(Self {
            target: TargetCache::new(target)?,
            warned_no_fft: false,
        })
    }
}

/// Box radius from the larger side of the brush rectangle.
pub fn filter_radius(brush_width: usize, brush_height: usize, kernel_scale: f32) -> i32 {
    let size = brush_width.max(brush_height) as f32;
    ((kernel_scale * size / 4.0).round() as i32).clamp(1, MAX_FILTER_RADIUS)
}

impl<T: ToolTarget> Stroke for SmoothStroke<T> {
    fn apply(&mut self, ctx: &mut StrokeContext<'_>, brush: &mut dyn Brush, samples: &[CursorSample]) {
        let Some(weights) = ctx.brush_weights(brush, samples) else {
            return;
        };
        let Some(region) = self.target.prepare(ctx.terrain, &weights) else {
            return;
        };
        let settings = ctx.settings;
        let strength = settings.tool_strength.clamp(0.0, 1.0);
        let mut data = self.target.read(region);

        let mut filtered = false;
        if settings.detail_smooth {
            filtered = low_pass_filter(
                region,
                &weights.weights,
                &mut data,
                settings.detail_scale,
                strength,
            );
            if !filtered && !self.warned_no_fft {
                log::warn!("Detail smoothing unavailable without the fft feature, using box filter");
                self.warned_no_fft = true;
            }
        }
        if !filtered {
            let radius = filter_radius(
                weights.region.width(),
                weights.region.height(),
                settings.smooth_filter_kernel_scale,
            );
            box_filter(region, &weights.weights, &mut data, radius, strength);
        }

        self.target.write(ctx, region, &data);
    }

    fn finish(&mut self, terrain: &mut TerrainData) {
        self.target.cache.flush(terrain);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{GridCoord, Region};
    use crate::stroke::test_support::{at, Fixture};
    use crate::stroke::HeightTarget;

    #[test]
    fn test_filter_radius_uses_larger_side() {
        assert_eq!(filter_radius(8, 20, 1.0), 5);
        assert_eq!(filter_radius(1, 1, 1.0), 1, "Never below one");
        assert_eq!(filter_radius(2000, 10, 1.0), MAX_FILTER_RADIUS);
        assert_eq!(filter_radius(20, 8, 2.0), 10);
    }

    #[test]
    fn test_smooth_flattens_a_spike() {
        let mut f = Fixture::flat(2, 15, 1000);
        f.settings.brush_radius = 5.0;
        f.settings.brush_falloff = 0.0;
        f.settings.tool_strength = 1.0;
        let spike = Region::from_coord(GridCoord::new(15, 15));
        f.terrain.write_heights(spike, &[9000]);
        f.terrain.commit(crate::terrain_data::DataKind::Height);

        let mut stroke = SmoothStroke::<HeightTarget>::new(EditTarget::Heightmap).expect("stroke");
        f.apply(&mut stroke, EditTarget::Heightmap, &at(15.0, 15.0));

        let peak = f.height(15, 15);
        let neighbour = f.height(16, 15);
        assert!(peak < 9000, "Spike should drop, got {peak}");
        assert!(neighbour > 1000, "Neighbour should rise, got {neighbour}");
        assert_eq!(f.height(2, 2), 1000, "Outside the brush nothing moves");
    }

    #[test]
    fn test_zero_weight_brush_is_noop() {
        let mut f = Fixture::flat(2, 15, 1000);
        f.terrain.write_heights(Region::from_coord(GridCoord::new(15, 15)), &[9000]);
        f.terrain.commit(crate::terrain_data::DataKind::Height);
        f.brush = crate::brush::BrushKind::Pattern.create();
        let before = f.terrain.revision();

        let mut stroke = SmoothStroke::<HeightTarget>::new(EditTarget::Heightmap).expect("stroke");
        f.apply(&mut stroke, EditTarget::Heightmap, &at(15.0, 15.0));
        assert_eq!(f.terrain.revision(), before);
        assert_eq!(f.height(15, 15), 9000);
        assert_eq!(stroke.target.cache.current_len(), 0);
        assert_eq!(stroke.target.cache.original_len(), 0);
    }

    #[test]
    fn test_smooth_on_flat_terrain_keeps_values() {
        let mut f = Fixture::flat(2, 15, 1234);
        f.settings.tool_strength = 1.0;
        f.settings.detail_smooth = true;
        let mut stroke = SmoothStroke::<HeightTarget>::new(EditTarget::Heightmap).expect("stroke");
        f.apply(&mut stroke, EditTarget::Heightmap, &at(15.0, 15.0));
        for coord in Region::around(15.0, 15.0, 4.0).iter() {
            assert_eq!(f.height(coord.x, coord.y), 1234, "Changed at {coord:?}");
        }
    }
}
