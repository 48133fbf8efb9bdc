use glam::Vec3;

use super::{EditTarget, Stroke, StrokeContext, TargetCache, ToolTarget};
use crate::brush::{Brush, CursorSample};
use crate::error::EditResult;
use crate::settings::FlattenMode;
use crate::terrain_data::TerrainData;

/// Pulls values toward a level picked under the first sample, a fixed
/// world height, or the tangent plane at the pick point.
pub struct FlattenStroke<T: ToolTarget> {
    target: TargetCache<T>,
    /// Picked level; `None` until the first apply.
    flatten_value: Option<f32>,
    /// Plane `normal . p + dist = 0` in raw value units.
    plane: Option<(Vec3, f32)>,
}

impl<T: ToolTarget> FlattenStroke<T> {
    pub fn new(target: EditTarget) -> EditResult<Self> {
        Ok(Self {
            target: TargetCache::new(target)?,
            flatten_value: None,
            plane: None,
        })
    }

    pub fn flatten_value(&self) -> Option<f32> {
        self.flatten_value
    }
}

fn allowed(mode: FlattenMode, delta: f32) -> bool {
    match mode {
        FlattenMode::Both => true,
        FlattenMode::Raise => delta < 0.0,
        FlattenMode::Lower => delta > 0.0,
    }
}

impl<T: ToolTarget> Stroke for FlattenStroke<T> {
    fn apply(&mut self, ctx: &mut StrokeContext<'_>, brush: &mut dyn Brush, samples: &[CursorSample]) {
        let Some(first) = samples.first().copied() else {
            return;
        };
        let Some(weights) = ctx.brush_weights(brush, samples) else {
            return;
        };
        let Some(region) = self.target.prepare(ctx.terrain, &weights) else {
            return;
        };
        let settings = ctx.settings;
        let slope = T::IS_HEIGHT && settings.use_slope_flatten;

        if self.flatten_value.is_none() || (T::IS_HEIGHT && settings.pick_value_per_apply) {
            let picked = self.target.cache.get_value(first.x, first.y);
            self.flatten_value = Some(picked);
            if slope {
                let normal = self
                    .target
                    .cache
                    .get_normal(first.x.floor() as i32, first.y.floor() as i32);
                let dist = -normal.dot(Vec3::new(first.x, first.y, picked));
                self.plane = Some((normal, dist));
            }
            log::debug!("Flatten level picked: {picked}");
        }
        if T::IS_HEIGHT && settings.use_flatten_target {
            self.flatten_value = Some(ctx.terrain.raw_height(settings.flatten_target));
        }
        let Some(level) = self.flatten_value else {
            return;
        };

        let mut data = self.target.read(region);
        for (&coord, &w) in &weights.weights {
            if w <= 0.0 || !region.contains(coord) {
                continue;
            }
            let i = region.index_of(coord);
            let strength = (w * settings.tool_strength).clamp(0.0, 1.0);
            let current = data[i];
            match self.plane.filter(|(n, _)| slope && n.z.abs() > f32::EPSILON) {
                Some((normal, dist)) => {
                    let dest = -(normal.x * coord.x as f32 + normal.y * coord.y as f32 + dist) / normal.z;
                    let plane_dist = current - dest;
                    if allowed(settings.flatten_mode, plane_dist) {
                        data[i] = current - plane_dist * strength;
                    }
                }
                None => {
                    if allowed(settings.flatten_mode, current - level) {
                        data[i] = current + (level - current) * strength;
                    }
                }
            }
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
    use crate::grid::Region;
    use crate::stroke::test_support::{at, Fixture};
    use crate::stroke::HeightTarget;
    use crate::terrain_data::DataKind;

    /// Flat 500 with an 800 plateau around (30, 30).
    fn plateau() -> Fixture {
        let mut f = Fixture::flat(3, 15, 500);
        let hill = Region::new(26, 26, 34, 34);
        f.terrain.write_heights(hill, &vec![800; hill.len()]);
        f.terrain.commit(DataKind::Height);
        f.settings.brush_radius = 3.0;
        f.settings.brush_falloff = 0.0;
        f.settings.tool_strength = 1.0;
        f
    }

    fn flatten_twice(mode: FlattenMode) -> u16 {
        let mut f = plateau();
        f.settings.flatten_mode = mode;
        let mut stroke = FlattenStroke::<HeightTarget>::new(EditTarget::Heightmap).expect("stroke");
        f.apply(&mut stroke, EditTarget::Heightmap, &at(8.0, 8.0));
        assert_eq!(stroke.flatten_value(), Some(500.0));
        f.apply(&mut stroke, EditTarget::Heightmap, &at(30.0, 30.0));
        f.height(30, 30)
    }

    #[test]
    fn test_zero_weight_brush_is_noop() {
        let mut f = plateau();
        f.brush = crate::brush::BrushKind::Pattern.create();
        let before = f.terrain.revision();
        let mut stroke = FlattenStroke::<HeightTarget>::new(EditTarget::Heightmap).expect("stroke");
        f.apply(&mut stroke, EditTarget::Heightmap, &at(30.0, 30.0));

        assert_eq!(f.terrain.revision(), before);
        assert_eq!(f.height(30, 30), 800);
        assert_eq!(stroke.flatten_value(), None, "No level is picked without weights");
        assert_eq!(stroke.target.cache.current_len(), 0);
        assert_eq!(stroke.target.cache.original_len(), 0);
    }

    #[test]
    fn test_flatten_lower_pulls_down_to_picked_level() {
        assert_eq!(flatten_twice(FlattenMode::Lower), 500);
        assert_eq!(flatten_twice(FlattenMode::Both), 500);
    }

    #[test]
    fn test_flatten_raise_leaves_higher_cells() {
        assert_eq!(flatten_twice(FlattenMode::Raise), 800);
    }

    #[test]
    fn test_pick_value_per_apply_repicks() {
        let mut f = plateau();
        f.settings.pick_value_per_apply = true;
        let mut stroke = FlattenStroke::<HeightTarget>::new(EditTarget::Heightmap).expect("stroke");
        f.apply(&mut stroke, EditTarget::Heightmap, &at(8.0, 8.0));
        f.apply(&mut stroke, EditTarget::Heightmap, &at(30.0, 30.0));
        assert_eq!(stroke.flatten_value(), Some(800.0));
        assert_eq!(f.height(30, 30), 800);
    }

    #[test]
    fn test_flatten_target_uses_world_height() {
        let mut f = plateau();
        f.settings.use_flatten_target = true;
        f.settings.flatten_target = f.terrain.world_height(640.0);
        let mut stroke = FlattenStroke::<HeightTarget>::new(EditTarget::Heightmap).expect("stroke");
        f.apply(&mut stroke, EditTarget::Heightmap, &at(30.0, 30.0));
        assert_eq!(f.height(30, 30), 640);
    }

    #[test]
    fn test_slope_flatten_on_flat_ground_is_stable() {
        let mut f = Fixture::flat(2, 15, 700);
        f.settings.use_slope_flatten = true;
        f.settings.tool_strength = 1.0;
        let mut stroke = FlattenStroke::<HeightTarget>::new(EditTarget::Heightmap).expect("stroke");
        f.apply(&mut stroke, EditTarget::Heightmap, &at(15.0, 15.0));
        assert_eq!(f.height(15, 15), 700);
        assert_eq!(f.height(14, 16), 700);
    }
}
