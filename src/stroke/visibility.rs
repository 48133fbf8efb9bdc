use super::{Stroke, StrokeContext};
use crate::accessor::VisibilityAccessor;
use crate::brush::{Brush, CursorSample};
use crate::edit_cache::EditCache;
use crate::terrain_data::TerrainData;

/// Hides quads under the brush, or shows them again with shift held.
pub struct VisibilityStroke {
    cache: EditCache<VisibilityAccessor>,
}

impl VisibilityStroke {
    pub const HIDDEN: u8 = 255;
    pub const VISIBLE: u8 = 0;

    pub fn new() -> Self {
        Self {
            cache: EditCache::new(VisibilityAccessor),
        }
    }
}

impl Default for VisibilityStroke {
    fn default() -> Self {
        Self::new()
    }
}

impl Stroke for VisibilityStroke {
    fn apply(&mut self, ctx: &mut StrokeContext<'_>, brush: &mut dyn Brush, samples: &[CursorSample]) {
        let Some(weights) = ctx.brush_weights(brush, samples) else {
            return;
        };
        let region = weights.region.grown(1);
        if let Err(err) = self.cache.cache_data(ctx.terrain, region) {
            log::error!("Skipping visibility paint: {err}");
            return;
        }
        let value = if samples.last().is_some_and(|s| s.shift_down) {
            Self::VISIBLE
        } else {
            Self::HIDDEN
        };

        let mut data = self.cache.get_cached_data(region);
        for (&coord, &w) in &weights.weights {
            if w > 0.0 && region.contains(coord) {
                data[region.index_of(coord)] = value;
            }
        }
        self.cache
            .set_cached_data(ctx.terrain, region, &data, ctx.settings.painting_restriction);
        self.cache.flush(ctx.terrain);
    }

    fn finish(&mut self, terrain: &mut TerrainData) {
        self.cache.flush(terrain);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{ComponentCoord, GridCoord};
    use crate::stroke::test_support::{at, at_shift, Fixture};
    use crate::stroke::EditTarget;

    fn visibility(f: &Fixture, x: i32, y: i32) -> Option<u8> {
        f.terrain
            .component(ComponentCoord::new(0, 0))
            .and_then(|c| c.visibility(GridCoord::new(x, y)))
    }

    #[test]
    fn test_paint_hides_then_shift_shows() {
        let mut f = Fixture::flat(1, 31, 0);
        f.settings.brush_radius = 4.0;
        f.settings.brush_falloff = 0.0;

        let mut stroke = VisibilityStroke::new();
        f.apply(&mut stroke, EditTarget::Heightmap, &at(15.0, 15.0));
        assert_eq!(visibility(&f, 15, 15), Some(VisibilityStroke::HIDDEN));
        assert_eq!(visibility(&f, 1, 1), Some(VisibilityStroke::VISIBLE));

        f.apply(&mut stroke, EditTarget::Heightmap, &at_shift(15.0, 15.0));
        assert_eq!(visibility(&f, 15, 15), Some(VisibilityStroke::VISIBLE));
    }

    #[test]
    fn test_visibility_ignores_strength() {
        let mut f = Fixture::flat(1, 31, 0);
        f.settings.tool_strength = 0.01;
        let mut stroke = VisibilityStroke::new();
        f.apply(&mut stroke, EditTarget::Heightmap, &at(15.0, 15.0));
        assert_eq!(visibility(&f, 15, 15), Some(VisibilityStroke::HIDDEN));
    }
}
