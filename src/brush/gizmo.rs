use glam::Vec2;

use super::{Brush, BrushContext, BrushPreview, BrushType, BrushWeights, CursorSample};

/// Weights every cell inside the gizmo rectangle, ignoring the cursor.
/// With `smooth_gizmo_brush` set, the edges fade out over the brush falloff.
pub struct GizmoBrush {
    last_mouse: Vec2,
    preview: Option<BrushPreview>,
}

impl GizmoBrush {
    pub fn new() -> Self {
        Self {
            last_mouse: Vec2::ZERO,
            preview: None,
        }
    }
}

impl Default for GizmoBrush {
    fn default() -> Self {
        Self::new()
    }
}

/// Rounded-rectangle edge fade for a point `local` inside a `size` box.
fn edge_falloff(local: Vec2, size: Vec2, falloff_fraction: f32) -> f32 {
    let half = size * 0.5;
    let p = Vec2::new(
        (local.x - half.x).abs(),
        (local.y - half.y).abs() * (size.x / size.y),
    );
    let falloff_radius = half.x * falloff_fraction;
    let square_radius = half.x - falloff_radius;
    let len = p.length();
    if len <= square_radius || len <= f32::EPSILON {
        return 1.0;
    }
    let (cos, sin) = (p.x / len, p.y / len);
    let fade = |d: f32, r: f32| {
        if falloff_radius > 0.0 {
            1.0 - ((d - r) / falloff_radius).clamp(0.0, 1.0)
        } else {
            1.0
        }
    };
    let t = fade(p.x, cos * square_radius) * fade(p.y, sin * square_radius);
    t * t * (3.0 - 2.0 * t)
}

impl Brush for GizmoBrush {
    fn name(&self) -> &'static str {
        "Gizmo"
    }

    fn brush_type(&self) -> BrushType {
        BrushType::Gizmo
    }

    fn leave_brush(&mut self) {
        self.preview = None;
    }

    fn mouse_move(&mut self, x: f32, y: f32) {
        self.last_mouse = Vec2::new(x, y);
    }

    fn tick(&mut self, ctx: &BrushContext<'_>, _dt: f32) {
        let scale_xy = ctx.terrain.draw_scale().x;
        let region = ctx.gizmo.landscape_bounds(scale_xy).intersect(&ctx.terrain.extent());
        self.preview = Some(BrushPreview {
            region,
            components: ctx.terrain.components_in_region(region),
            can_paint: true,
        });
    }

    fn preview(&self) -> Option<&BrushPreview> {
        self.preview.as_ref()
    }

    fn apply_brush(
        &mut self,
        ctx: &BrushContext<'_>,
        _samples: &[CursorSample],
    ) -> Option<BrushWeights> {
        let scale_xy = ctx.terrain.draw_scale().x.max(f32::EPSILON);
        let region = ctx
            .gizmo
            .landscape_bounds(scale_xy)
            .intersect(&ctx.terrain.extent());
        if region.is_empty() {
            return None;
        }
        let size = ctx.gizmo.size_in_cells(scale_xy);
        let mut out = BrushWeights::new();
        out.region = region;
        for coord in region.iter() {
            let local = ctx
                .gizmo
                .landscape_to_local(coord.x as f32, coord.y as f32, scale_xy);
            if !(local.x > 0.0 && local.x < size.x && local.y > 0.0 && local.y < size.y) {
                continue;
            }
            let mut w = if ctx.settings.smooth_gizmo_brush {
                edge_falloff(local, size, ctx.settings.brush_falloff)
            } else {
                1.0
            };
            if w > 0.0 {
                w *= ctx.mask(coord);
                out.weights.insert(coord, w);
            }
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brush::test_support::context;
    use crate::gizmo::LandscapeGizmo;
    use crate::grid::GridCoord;
    use crate::settings::EditorSettings;
    use crate::terrain_data::TerrainData;

    #[test]
    fn test_hard_gizmo_covers_interior() {
        let terrain = TerrainData::flat(1, 1, 31, 0);
        let settings = EditorSettings {
            smooth_gizmo_brush: false,
            ..Default::default()
        };
        let gizmo = LandscapeGizmo::new(Vec2::new(10.0, 10.0), 4.0, 4.0);
        let ctx = context(&terrain, &settings, &gizmo);
        let w = GizmoBrush::new().apply_brush(&ctx, &[]).expect("weights");
        // Local x = cell - 10 + 1.5 must lie strictly inside (0, 4).
        for x in 9..=12 {
            assert_eq!(w.get(GridCoord::new(x, 10)), 1.0, "x = {x}");
        }
        assert_eq!(w.get(GridCoord::new(8, 10)), 0.0);
        assert_eq!(w.get(GridCoord::new(13, 10)), 0.0);
        assert_eq!(w.weights.len(), 16);
    }

    #[test]
    fn test_smooth_gizmo_fades_edges() {
        let terrain = TerrainData::flat(1, 1, 63, 0);
        let settings = EditorSettings {
            brush_falloff: 0.5,
            ..Default::default()
        };
        let gizmo = LandscapeGizmo::new(Vec2::new(30.0, 30.0), 20.0, 20.0);
        let ctx = context(&terrain, &settings, &gizmo);
        let w = GizmoBrush::new().apply_brush(&ctx, &[]).expect("weights");
        let centre = w.get(GridCoord::new(30, 30));
        let edge = w.get(GridCoord::new(39, 30));
        assert_eq!(centre, 1.0);
        assert!(edge > 0.0 && edge < centre, "Edge should fade, got {edge}");
    }

    #[test]
    fn test_gizmo_off_terrain_is_no_effect() {
        let terrain = TerrainData::flat(1, 1, 7, 0);
        let settings = EditorSettings::default();
        let gizmo = LandscapeGizmo::new(Vec2::new(100.0, 100.0), 4.0, 4.0);
        let ctx = context(&terrain, &settings, &gizmo);
        assert!(GizmoBrush::new().apply_brush(&ctx, &[]).is_none());
        let empty = LandscapeGizmo::default();
        let ctx = context(&terrain, &settings, &empty);
        assert!(GizmoBrush::new().apply_brush(&ctx, &[]).is_none());
    }
}
