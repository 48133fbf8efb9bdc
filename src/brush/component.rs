use glam::Vec2;

use super::{Brush, BrushContext, BrushPreview, BrushType, BrushWeights, CursorSample};
use crate::grid::{ComponentCoord, GridCoord, Region};

/// Selects whole components in a `brush_component_size` wide block around
/// the cursor. Every vertex of a picked component weighs 1 before masking.
pub struct ComponentBrush {
    last_mouse: Vec2,
    preview: Option<BrushPreview>,
}

impl ComponentBrush {
    pub fn new() -> Self {
        Self {
            last_mouse: Vec2::ZERO,
            preview: None,
        }
    }

    /// Existing components in the block centred on the component under `(x, y)`.
    pub fn components_at(ctx: &BrushContext<'_>, x: f32, y: f32) -> Vec<ComponentCoord> {
        let n = ctx.terrain.component_size_quads();
        let center = ComponentCoord::containing(GridCoord::new(x.floor() as i32, y.floor() as i32), n);
        let size = (ctx.settings.brush_component_size - 1).max(0);
        let lo = -(size >> 1);
        let hi = (size >> 1) + size % 2;
        let mut out = Vec::new();
        for dy in lo..=hi {
            for dx in lo..=hi {
                let cc = ComponentCoord::new(center.x + dx, center.y + dy);
                if ctx.terrain.component(cc).is_some() {
                    out.push(cc);
                }
            }
        }
        out
    }
}

impl Default for ComponentBrush {
    fn default() -> Self {
        Self::new()
    }
}

impl Brush for ComponentBrush {
    fn name(&self) -> &'static str {
        "Component"
    }

    fn brush_type(&self) -> BrushType {
        BrushType::Component
    }

    fn leave_brush(&mut self) {
        self.preview = None;
    }

    fn mouse_move(&mut self, x: f32, y: f32) {
        self.last_mouse = Vec2::new(x, y);
    }

    fn tick(&mut self, ctx: &BrushContext<'_>, _dt: f32) {
        let components = Self::components_at(ctx, self.last_mouse.x, self.last_mouse.y);
        let n = ctx.terrain.component_size_quads();
        let region = components
            .iter()
            .fold(Region::EMPTY, |acc, cc| acc.union(&cc.vertex_region(n)));
        self.preview = Some(BrushPreview {
            region,
            components,
            can_paint: true,
        });
    }

    fn preview(&self) -> Option<&BrushPreview> {
        self.preview.as_ref()
    }

    fn apply_brush(
        &mut self,
        ctx: &BrushContext<'_>,
        samples: &[CursorSample],
    ) -> Option<BrushWeights> {
        let (x, y) = samples
            .last()
            .map_or((self.last_mouse.x, self.last_mouse.y), |s| (s.x, s.y));
        let components = Self::components_at(ctx, x, y);
        if components.is_empty() {
            return None;
        }
        let n = ctx.terrain.component_size_quads();
        let mut out = BrushWeights::new();
        for cc in &components {
            let region = cc.vertex_region(n);
            out.region = out.region.union(&region);
            for coord in region.iter() {
                out.weights.insert(coord, ctx.mask(coord));
            }
        }
        out.components = components;
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brush::test_support::context;
    use crate::gizmo::LandscapeGizmo;
    use crate::settings::EditorSettings;
    use crate::terrain_data::TerrainData;

    #[test]
    fn test_single_component_under_cursor() {
        let terrain = TerrainData::flat(3, 3, 7, 0);
        let settings = EditorSettings::default();
        let gizmo = LandscapeGizmo::default();
        let ctx = context(&terrain, &settings, &gizmo);
        let w = ComponentBrush::new()
            .apply_brush(&ctx, &[CursorSample::new(10.5, 3.0, false)])
            .expect("weights");
        assert_eq!(w.components, vec![ComponentCoord::new(1, 0)]);
        assert_eq!(w.region, Region::new(7, 0, 14, 7));
        assert_eq!(w.weights.len(), 64);
        assert_eq!(w.get(GridCoord::new(7, 7)), 1.0);
    }

    #[test]
    fn test_block_size_and_missing_components() {
        let terrain = TerrainData::flat(2, 2, 4, 0);
        let settings = EditorSettings {
            brush_component_size: 3,
            ..Default::default()
        };
        let gizmo = LandscapeGizmo::default();
        let ctx = context(&terrain, &settings, &gizmo);
        let comps = ComponentBrush::components_at(&ctx, 1.0, 1.0);
        // Block -1..=1 around (0, 0); only the four existing components remain.
        assert_eq!(comps.len(), 4);

        let outside = ComponentBrush::new().apply_brush(&ctx, &[CursorSample::new(-20.0, -20.0, false)]);
        assert!(outside.is_none());
    }

    #[test]
    fn test_even_block_extends_toward_positive() {
        let terrain = TerrainData::flat(3, 1, 4, 0);
        let settings = EditorSettings {
            brush_component_size: 2,
            ..Default::default()
        };
        let gizmo = LandscapeGizmo::default();
        let ctx = context(&terrain, &settings, &gizmo);
        let comps = ComponentBrush::components_at(&ctx, 5.0, 1.0);
        assert_eq!(comps, vec![ComponentCoord::new(1, 0), ComponentCoord::new(2, 0)]);
    }
}
