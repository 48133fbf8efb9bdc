use super::{EditTarget, Stroke, StrokeContext, TargetCache, ToolTarget};
use crate::brush::{Brush, CursorSample};
use crate::error::EditResult;
use crate::noise_param::{noise_mode_conversion, NoiseParameter};
use crate::settings::NoiseMode;
use crate::terrain_data::TerrainData;

/// Adds deterministic Perlin noise scaled by brush weight.
pub struct NoiseStroke<T: ToolTarget> {
    target: TargetCache<T>,
}

impl<T: ToolTarget> NoiseStroke<T> {
    pub fn new(target: EditTarget) -> EditResult<Self> {
        Ok(Self {
            target: TargetCache::new(target)?,
        })
    }
}

impl<T: ToolTarget> Stroke for NoiseStroke<T> {
    fn apply(&mut self, ctx: &mut StrokeContext<'_>, brush: &mut dyn Brush, samples: &[CursorSample]) {
        let Some(weights) = ctx.brush_weights(brush, samples) else {
            return;
        };
        let Some(region) = self.target.prepare(ctx.terrain, &weights) else {
            return;
        };
        let settings = ctx.settings;
        let size_adjust = if T::IS_HEIGHT && settings.brush_radius < settings.maximum_value_radius {
            settings.brush_radius / settings.maximum_value_radius
        } else {
            1.0
        };
        let use_target_value = !T::IS_HEIGHT && settings.use_weight_target_value;
        let multiplier = T::strength_multiplier(ctx.terrain, settings.brush_radius);

        let half_weight = 255.0 / 2.0;
        let noise = NoiseParameter::new(0.0, settings.noise_scale, half_weight);

        let mut data = self.target.read(region);
        for (&coord, &w) in &weights.weights {
            if w <= 0.0 || !region.contains(coord) {
                continue;
            }
            let i = region.index_of(coord);
            let original = data[i];
            if use_target_value {
                let target = settings.weight_target_value;
                let mut dest = noise_mode_conversion(
                    NoiseMode::Add,
                    half_weight,
                    noise.sample(coord.x, coord.y),
                ) * target;
                match settings.noise_mode {
                    NoiseMode::Add if original >= dest => continue,
                    NoiseMode::Sub => {
                        dest += (1.0 - target) * half_weight;
                        if original <= dest {
                            continue;
                        }
                    }
                    _ => {}
                }
                data[i] = (original + (dest - original) * w * settings.tool_strength).round();
            } else {
                let total = w * settings.tool_strength * multiplier * size_adjust;
                let amount = noise_mode_conversion(
                    settings.noise_mode,
                    total,
                    noise.sample_with_amount(coord.x, coord.y, total),
                );
                data[i] = original + amount;
            }
        }

        self.target.write(ctx, region, &data);
    }

    fn finish(&mut self, terrain: &mut TerrainData) {
        self.target.cache.flush(terrain);
    }
}
