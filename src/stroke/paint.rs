use std::collections::HashMap;

use glam::Vec3;

use super::{EditTarget, Stroke, StrokeContext, TargetCache, ToolTarget};
use crate::brush::{Brush, BrushWeights, CursorSample};
use crate::error::EditResult;
use crate::grid::{GridCoord, Region};
use crate::terrain_data::{TerrainData, LANDSCAPE_ZSCALE};

/// Raising/lowering heights (sculpt) or painting a weight layer.
///
/// Weight painting without a target value blends from a source that drifts
/// toward the current value as the same cells are painted again, so repeated
/// passes accumulate without overshooting the first pass.
pub struct PaintStroke<T: ToolTarget> {
    target: TargetCache<T>,
    /// Accumulated brush weight per cell over the whole stroke.
    influence: HashMap<GridCoord, f32>,
}

impl<T: ToolTarget> PaintStroke<T> {
    pub fn new(target: EditTarget) -> EditResult<Self> {
        Ok(Self {
            target: TargetCache::new(target)?,
            influence: HashMap::new(),
        })
    }

    pub fn influence(&self, coord: GridCoord) -> f32 {
        self.influence.get(&coord).copied().unwrap_or(0.0)
    }

    /// Brush plane from the weighted mean position and normal, in cell units.
    fn clay_plane(
        &self,
        weights: &BrushWeights,
        region: Region,
        data: &[f32],
        z_scale: f32,
    ) -> Option<(Vec3, Vec3)> {
        let mut center = Vec3::ZERO;
        let mut normal = Vec3::ZERO;
        let mut total = 0.0;
        for (&coord, &w) in &weights.weights {
            if w <= 0.0 || !region.contains(coord) {
                continue;
            }
            let h = data[region.index_of(coord)];
            center += Vec3::new(coord.x as f32, coord.y as f32, h * z_scale) * w;
            normal += self.target.cache.get_normal_scaled(coord.x, coord.y, z_scale) * w;
            total += w;
        }
        if total <= 0.0 {
            return None;
        }
        let normal = normal.normalize_or_zero();
        if normal.z.abs() <= f32::EPSILON {
            return None;
        }
        Some((center / total, normal))
    }

    fn apply_clay(
        &self,
        terrain: &TerrainData,
        weights: &BrushWeights,
        region: Region,
        data: &mut [f32],
        strength: f32,
        offset: f32,
        invert: bool,
    ) {
        let scale = terrain.draw_scale();
        let z_scale = LANDSCAPE_ZSCALE * scale.z / scale.x.max(f32::EPSILON);
        let Some((center, normal)) = self.clay_plane(weights, region, data, z_scale) else {
            return;
        };
        let offset = if invert { -offset } else { offset };
        let origin = center + normal * (offset * z_scale);
        for (&coord, &w) in &weights.weights {
            if w <= 0.0 || !region.contains(coord) {
                continue;
            }
            let plane_z = origin.z
                - (normal.x * (coord.x as f32 - origin.x) + normal.y * (coord.y as f32 - origin.y))
                    / normal.z;
            let dest = plane_z / z_scale;
            let i = region.index_of(coord);
            let current = data[i];
            if (!invert && dest <= current) || (invert && dest >= current) {
                continue;
            }
            data[i] = current + (dest - current) * (w * strength).clamp(0.0, 1.0);
        }
    }
}

impl<T: ToolTarget> Stroke for PaintStroke<T> {
    fn apply(&mut self, ctx: &mut StrokeContext<'_>, brush: &mut dyn Brush, samples: &[CursorSample]) {
        let Some(weights) = ctx.brush_weights(brush, samples) else {
            return;
        };
        let Some(region) = self.target.prepare(ctx.terrain, &weights) else {
            return;
        };
        let invert = samples.last().is_some_and(|s| s.shift_down);
        let settings = ctx.settings;
        let use_target_value = !T::IS_HEIGHT && settings.use_weight_target_value;

        let mut data = self.target.read(region);
        let source = if !T::IS_HEIGHT && !use_target_value {
            let mut original = self.target.read_original(region);
            for coord in region.iter() {
                let i = region.index_of(coord);
                let t = (self.influence(coord) * 0.05).min(1.0);
                original[i] += (data[i] - original[i]) * t;
            }
            original
        } else {
            data.clone()
        };

        let adjusted = T::strength_multiplier(ctx.terrain, settings.brush_radius);
        let mut strength = settings.tool_strength * adjusted;
        if strength <= 0.0 {
            return;
        }
        if T::IS_HEIGHT {
            strength = strength.max(1.0);
        }

        for (&coord, &w) in &weights.weights {
            if w <= 0.0 {
                continue;
            }
            *self.influence.entry(coord).or_insert(0.0) += w;
        }

        if T::IS_HEIGHT && settings.use_clay_brush {
            self.apply_clay(
                ctx.terrain,
                &weights,
                region,
                &mut data,
                settings.tool_strength,
                strength,
                invert,
            );
        } else {
            let dest = 255.0 * settings.weight_target_value;
            for (&coord, &w) in &weights.weights {
                if w <= 0.0 || !region.contains(coord) {
                    continue;
                }
                let i = region.index_of(coord);
                let amount = w * strength;
                let current = data[i];
                data[i] = if use_target_value {
                    let goal = if invert { 0.0 } else { dest };
                    current + (goal - current) * (amount / adjusted).min(1.0)
                } else if invert {
                    (source[i] - amount.round()).min(current)
                } else {
                    (source[i] + amount.round()).max(current)
                };
            }
        }

        self.target.write(ctx, region, &data);
        log::trace!("Paint applied over {} cells", weights.weights.len());
    }

    fn finish(&mut self, terrain: &mut TerrainData) {
        self.target.cache.flush(terrain);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brush::{BrushKind, Falloff};
    use crate::stroke::test_support::{at, at_shift, Fixture};
    use crate::stroke::{HeightTarget, WeightTarget};

    fn sculpt_fixture() -> Fixture {
        let mut f = Fixture::flat(4, 31, 1000);
        f.settings.brush_radius = 10.0;
        f.settings.brush_falloff = 0.0;
        f.settings.tool_strength = 1.0;
        f
    }

    #[test]
    fn test_sculpt_raises_inside_radius_only() {
        let mut f = sculpt_fixture();
        let mut stroke = PaintStroke::<HeightTarget>::new(EditTarget::Heightmap).expect("stroke");
        f.apply(&mut stroke, EditTarget::Heightmap, &at(50.0, 50.0));

        // radius 10 * 128 / scale_z 1
        assert_eq!(f.height(50, 50), 1000 + 1280);
        assert_eq!(f.height(56, 58), 1000 + 1280, "Cell at distance 10 is inside");
        assert_eq!(f.height(61, 50), 1000, "Cell outside the radius must not move");
        assert_eq!(f.height(20, 20), 1000);
    }

    #[test]
    fn test_sculpt_shift_lowers() {
        let mut f = sculpt_fixture();
        let mut stroke = PaintStroke::<HeightTarget>::new(EditTarget::Heightmap).expect("stroke");
        f.apply(&mut stroke, EditTarget::Heightmap, &at_shift(50.0, 50.0));
        assert_eq!(f.height(50, 50), 0, "1000 - 1280 clamps at zero");
    }

    #[test]
    fn test_sculpt_is_undoable_through_transaction() {
        let mut f = sculpt_fixture();
        f.terrain.begin_transaction("Sculpt");
        let mut stroke = PaintStroke::<HeightTarget>::new(EditTarget::Heightmap).expect("stroke");
        f.apply(&mut stroke, EditTarget::Heightmap, &at(50.0, 50.0));
        let tx = f.terrain.end_transaction().expect("transaction");
        assert!(!tx.is_empty());
        f.terrain.restore(tx);
        assert_eq!(f.height(50, 50), 1000);
    }

    #[test]
    fn test_influence_is_monotonic() {
        let mut f = Fixture::flat(2, 15, 0);
        f.settings.brush_radius = 4.0;
        let layer = f.terrain.add_layer("grass", false);
        let target = EditTarget::Weightmap(layer);
        let mut stroke = PaintStroke::<WeightTarget>::new(target).expect("stroke");
        let coord = GridCoord::new(10, 10);
        let mut last = 0.0;
        for _ in 0..3 {
            f.apply(&mut stroke, target, &at(10.0, 10.0));
            let now = stroke.influence(coord);
            assert!(now > last, "Influence must grow, {last} -> {now}");
            last = now;
        }
    }

    #[test]
    fn test_weight_paint_accumulates_and_is_capped() {
        let mut f = Fixture::flat(2, 15, 0);
        f.settings.brush_radius = 4.0;
        f.settings.brush_falloff = 0.0;
        f.settings.tool_strength = 0.2;
        let layer = f.terrain.add_layer("grass", false);
        let target = EditTarget::Weightmap(layer);
        let mut stroke = PaintStroke::<WeightTarget>::new(target).expect("stroke");
        let coord = GridCoord::new(10, 10);

        f.apply(&mut stroke, target, &at(10.0, 10.0));
        let first = f.terrain.weight_at(layer, coord).unwrap_or(0);
        assert_eq!(first, 51, "0.2 * 255 rounded");
        for _ in 0..40 {
            f.apply(&mut stroke, target, &at(10.0, 10.0));
        }
        let later = f.terrain.weight_at(layer, coord).unwrap_or(0);
        assert!(later > first, "Repeated passes should accumulate");
        assert!(later <= 255);
    }

    #[test]
    fn test_weight_target_value_moves_toward_goal() {
        let mut f = Fixture::flat(2, 15, 0);
        f.settings.brush_radius = 4.0;
        f.settings.brush_falloff = 0.0;
        f.settings.tool_strength = 1.0;
        f.settings.use_weight_target_value = true;
        f.settings.weight_target_value = 0.5;
        let layer = f.terrain.add_layer("sand", false);
        let target = EditTarget::Weightmap(layer);
        let mut stroke = PaintStroke::<WeightTarget>::new(target).expect("stroke");
        f.apply(&mut stroke, target, &at(10.0, 10.0));
        let w = f.terrain.weight_at(layer, GridCoord::new(10, 10)).unwrap_or(0);
        assert!((127..=128).contains(&w), "Expected about half weight, got {w}");
    }

    #[test]
    fn test_zero_weight_brush_is_noop() {
        let mut f = sculpt_fixture();
        f.brush = BrushKind::Pattern.create();
        let mut stroke = PaintStroke::<HeightTarget>::new(EditTarget::Heightmap).expect("stroke");
        let before = f.terrain.revision();
        f.apply(&mut stroke, EditTarget::Heightmap, &at(50.0, 50.0));
        assert_eq!(f.terrain.revision(), before, "A brush without a texture changes nothing");
        assert_eq!(f.height(50, 50), 1000);
        assert_eq!(stroke.influence(GridCoord::new(50, 50)), 0.0);
        assert_eq!(stroke.target.cache.current_len(), 0, "Nothing cached");
        assert_eq!(stroke.target.cache.original_len(), 0);
    }

    #[test]
    fn test_zero_weight_brush_keeps_weight_influence() {
        let mut f = Fixture::flat(2, 15, 0);
        let layer = f.terrain.add_layer("grass", false);
        let target = EditTarget::Weightmap(layer);
        let mut stroke = PaintStroke::<WeightTarget>::new(target).expect("stroke");
        f.apply(&mut stroke, target, &at(10.0, 10.0));
        let touched = stroke.influence(GridCoord::new(10, 10));
        assert!(touched > 0.0);
        let cached = stroke.target.cache.current_len();

        f.brush = BrushKind::Pattern.create();
        f.apply(&mut stroke, target, &at(10.0, 10.0));
        assert_eq!(stroke.influence(GridCoord::new(10, 10)), touched);
        assert_eq!(stroke.target.cache.current_len(), cached);
        assert_eq!(stroke.target.cache.original_len(), cached);
    }

    #[test]
    fn test_clay_moves_toward_offset_plane() {
        let mut f = sculpt_fixture();
        f.settings.use_clay_brush = true;
        f.settings.tool_strength = 0.5;
        f.brush = Box::new(crate::brush::CircleBrush::new(Falloff::Linear));
        let mut stroke = PaintStroke::<HeightTarget>::new(EditTarget::Heightmap).expect("stroke");
        f.apply(&mut stroke, EditTarget::Heightmap, &at(50.0, 50.0));
        let h = f.height(50, 50);
        // Plane sits 0.5 * 1280 above the flat surface; half the gap is covered.
        assert!(h > 1000 && h <= 1000 + 640, "Clay should rise without overshoot, got {h}");
    }
}
