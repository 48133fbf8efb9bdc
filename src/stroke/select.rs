use std::collections::HashSet;

use super::{Stroke, StrokeContext};
use crate::accessor::SelectionAccessor;
use crate::brush::{Brush, BrushType, BrushWeights, CursorSample};
use crate::edit_cache::EditCache;
use crate::grid::{ComponentCoord, GridCoord};
use crate::terrain_data::TerrainData;

/// Component selection with the component brush, otherwise painting the
/// soft per-vertex selection mask. Shared by the select and mask tools.
pub struct SelectStroke {
    cache: EditCache<SelectionAccessor>,
    /// Decided once per stroke from the component under the first sample.
    component_invert: Option<bool>,
}

impl SelectStroke {
    pub fn new() -> Self {
        Self {
            cache: EditCache::new(SelectionAccessor),
            component_invert: None,
        }
    }

    fn select_components(&mut self, ctx: &mut StrokeContext<'_>, weights: &BrushWeights, first: CursorSample) {
        let invert = *self.component_invert.get_or_insert_with(|| {
            let under = ComponentCoord::containing(
                GridCoord::new(first.x.floor() as i32, first.y.floor() as i32),
                ctx.terrain.component_size_quads(),
            );
            ctx.terrain.component(under).is_some() && ctx.terrain.is_component_selected(under)
        });
        let picked: HashSet<ComponentCoord> = weights.components.iter().copied().collect();
        for cc in picked {
            ctx.terrain.set_component_selected(cc, !invert);
        }
        log::debug!(
            "{} components selected",
            ctx.terrain.selected_components().len()
        );
    }

    fn paint_region(&mut self, ctx: &mut StrokeContext<'_>, weights: &BrushWeights, invert: bool) {
        let region = weights.region.grown(1);
        if let Err(err) = self.cache.cache_data(ctx.terrain, region) {
            log::error!("Skipping selection paint: {err}");
            return;
        }
        if !ctx.terrain.selected_components().is_empty() {
            let selected: Vec<ComponentCoord> = ctx.terrain.selected_components().iter().copied().collect();
            for cc in selected {
                ctx.terrain.set_component_selected(cc, false);
            }
        }

        let mut data = self.cache.get_cached_data(region);
        let strength = ctx.settings.tool_strength;
        for (&coord, &w) in &weights.weights {
            if w <= 0.0 || !region.contains(coord) || !ctx.terrain.has_vertex(coord) {
                continue;
            }
            let paint = w * strength;
            let value = ctx.terrain.selected_region(coord);
            let next = if invert {
                (value - paint).max(0.0)
            } else {
                (value + paint).min(1.0)
            };
            ctx.terrain.set_selected_region(coord, next);
            data[region.index_of(coord)] = selection_byte(ctx.terrain, coord);
        }

        self.cache
            .set_cached_data(ctx.terrain, region, &data, ctx.settings.painting_restriction);
        self.cache.flush(ctx.terrain);
    }
}

impl Default for SelectStroke {
    fn default() -> Self {
        Self::new()
    }
}

fn selection_byte(terrain: &TerrainData, coord: GridCoord) -> u8 {
    (terrain.selected_region(coord) * 255.0).round().clamp(0.0, 255.0) as u8
}

impl Stroke for SelectStroke {
    fn apply(&mut self, ctx: &mut StrokeContext<'_>, brush: &mut dyn Brush, samples: &[CursorSample]) {
        let (Some(first), Some(last)) = (samples.first().copied(), samples.last().copied()) else {
            return;
        };
        let component_mode = brush.brush_type() == BrushType::Component;
        let Some(weights) = ctx.brush_weights(brush, samples) else {
            return;
        };
        if component_mode {
            self.select_components(ctx, &weights, first);
        } else {
            self.paint_region(ctx, &weights, last.shift_down);
        }
    }

    fn finish(&mut self, terrain: &mut TerrainData) {
        self.cache.flush(terrain);
    }
}
