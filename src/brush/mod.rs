//! Brushes turn a batch of cursor samples into a per-cell weight map.
//!
//! Every brush follows the same lifecycle: `enter_brush` when it becomes
//! the active brush, any number of `mouse_move`/`tick` calls while hovering,
//! `begin_stroke`, one `apply_brush` per tick while the stroke is active,
//! `end_stroke`, and finally `leave_brush` when another brush is picked.

pub mod alpha;
pub mod circle;
pub mod component;
pub mod gizmo;

use std::collections::HashMap;

use crate::gizmo::LandscapeGizmo;
use crate::grid::{ComponentCoord, GridCoord, Region};
use crate::settings::EditorSettings;
use crate::terrain_data::{LayerId, TerrainData};

pub use alpha::{AlphaBrush, AlphaTexture, PatternBrush};
pub use circle::{CircleBrush, Falloff};
pub use component::ComponentBrush;
pub use gizmo::GizmoBrush;

/// One buffered cursor position in landscape space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CursorSample {
    pub x: f32,
    pub y: f32,
    pub shift_down: bool,
}

impl CursorSample {
    pub fn new(x: f32, y: f32, shift_down: bool) -> Self {
        Self { x, y, shift_down }
    }
}

/// Broad brush family, used by tools that behave differently per family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BrushType {
    Normal,
    Alpha,
    Component,
    Gizmo,
}

/// Result of one `apply_brush`: weights in `0..=1` keyed by cell, and the
/// rectangle the brush considered. Cells missing from `weights` weigh 0.
#[derive(Clone, Debug, Default)]
pub struct BrushWeights {
    pub region: Region,
    pub weights: HashMap<GridCoord, f32>,
    /// Whole components picked by a component brush; empty otherwise.
    pub components: Vec<ComponentCoord>,
}

impl BrushWeights {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, coord: GridCoord) -> f32 {
        self.weights.get(&coord).copied().unwrap_or(0.0)
    }

    /// Store `weight` unless the cell already holds a larger one.
    pub fn insert_max(&mut self, coord: GridCoord, weight: f32) {
        let slot = self.weights.entry(coord).or_insert(0.0);
        if weight > *slot {
            *slot = weight;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.region.is_empty()
    }
}

/// Hover state computed by `tick`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BrushPreview {
    pub region: Region,
    pub components: Vec<ComponentCoord>,
    /// False when the painting restriction would refuse the current layer
    /// in the component under the cursor.
    pub can_paint: bool,
}

/// Read-only view of everything a brush may consult.
pub struct BrushContext<'a> {
    pub terrain: &'a TerrainData,
    pub settings: &'a EditorSettings,
    pub gizmo: &'a LandscapeGizmo,
    /// The mask tool edits the selection, so it is never masked by it.
    pub tool_is_mask: bool,
    pub target_layer: Option<LayerId>,
}

impl<'a> BrushContext<'a> {
    /// Inner radius and falloff width in landscape cells.
    pub fn radii(&self) -> (f32, f32) {
        let scale_xy = self.terrain.draw_scale().x.max(f32::EPSILON);
        let falloff = self.settings.brush_falloff.clamp(0.0, 1.0);
        let radius = (1.0 - falloff) * self.settings.brush_radius / scale_xy;
        (radius, falloff * self.settings.brush_radius / scale_xy)
    }

    /// Selection mask factor for `coord`, or 1 when masking is off.
    pub fn mask(&self, coord: GridCoord) -> f32 {
        if self.tool_is_mask || !self.settings.use_selected_region {
            return 1.0;
        }
        let value = self.terrain.selected_region(coord);
        if self.settings.use_negative_mask {
            1.0 - value
        } else {
            value
        }
    }

    /// Preview for a brush of the given half extent hovering at `(x, y)`.
    pub fn hover_preview(&self, x: f32, y: f32, extent: f32) -> BrushPreview {
        let region = Region::around(x, y, extent).intersect(&self.terrain.extent());
        let components = self.terrain.components_in_region(region);
        let under = ComponentCoord::containing(
            GridCoord::new(x.floor() as i32, y.floor() as i32),
            self.terrain.component_size_quads(),
        );
        let can_paint = match self.target_layer {
            Some(layer) => {
                self.terrain
                    .can_paint_layer(under, layer, self.settings.painting_restriction)
            }
            None => true,
        };
        BrushPreview {
            region,
            components,
            can_paint,
        }
    }
}

pub trait Brush {
    fn name(&self) -> &'static str;

    fn brush_type(&self) -> BrushType {
        BrushType::Normal
    }

    fn enter_brush(&mut self) {}

    fn leave_brush(&mut self) {}

    fn begin_stroke(&mut self, x: f32, y: f32) {
        self.mouse_move(x, y);
    }

    fn end_stroke(&mut self) {}

    fn mouse_move(&mut self, x: f32, y: f32);

    fn tick(&mut self, _ctx: &BrushContext<'_>, _dt: f32) {}

    fn preview(&self) -> Option<&BrushPreview> {
        None
    }

    /// Weights for a batch of samples, or `None` when the brush has no
    /// effect this tick.
    fn apply_brush(
        &mut self,
        ctx: &BrushContext<'_>,
        samples: &[CursorSample],
    ) -> Option<BrushWeights>;
}

/// Every brush the editor offers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BrushKind {
    CircleSmooth,
    CircleLinear,
    CircleSpherical,
    CircleTip,
    Alpha,
    Pattern,
    Component,
    Gizmo,
}

impl BrushKind {
    pub const ALL: [BrushKind; 8] = [
        BrushKind::CircleSmooth,
        BrushKind::CircleLinear,
        BrushKind::CircleSpherical,
        BrushKind::CircleTip,
        BrushKind::Alpha,
        BrushKind::Pattern,
        BrushKind::Component,
        BrushKind::Gizmo,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BrushKind::CircleSmooth => "Circle_Smooth",
            BrushKind::CircleLinear => "Circle_Linear",
            BrushKind::CircleSpherical => "Circle_Spherical",
            BrushKind::CircleTip => "Circle_Tip",
            BrushKind::Alpha => "Alpha",
            BrushKind::Pattern => "Pattern",
            BrushKind::Component => "Component",
            BrushKind::Gizmo => "Gizmo",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
    }

    pub fn create(self) -> Box<dyn Brush> {
        match self {
            BrushKind::CircleSmooth => Box::new(CircleBrush::new(Falloff::Smooth)),
            BrushKind::CircleLinear => Box::new(CircleBrush::new(Falloff::Linear)),
            BrushKind::CircleSpherical => Box::new(CircleBrush::new(Falloff::Spherical)),
            BrushKind::CircleTip => Box::new(CircleBrush::new(Falloff::Tip)),
            BrushKind::Alpha => Box::new(AlphaBrush::new()),
            BrushKind::Pattern => Box::new(PatternBrush::new()),
            BrushKind::Component => Box::new(ComponentBrush::new()),
            BrushKind::Gizmo => Box::new(GizmoBrush::new()),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::context;
    use super::*;

    #[test]
    fn test_brush_kind_names_round_trip() {
        for kind in BrushKind::ALL {
            assert_eq!(BrushKind::from_name(kind.name()), Some(kind));
            assert_eq!(kind.create().name(), kind.name());
        }
        assert_eq!(BrushKind::from_name("circle_tip"), Some(BrushKind::CircleTip));
        assert_eq!(BrushKind::from_name("Splines"), None);
    }

    #[test]
    fn test_insert_max_keeps_largest() {
        let mut w = BrushWeights::new();
        let c = GridCoord::new(1, 1);
        w.insert_max(c, 0.4);
        w.insert_max(c, 0.2);
        assert_eq!(w.get(c), 0.4);
        w.insert_max(c, 0.9);
        assert_eq!(w.get(c), 0.9);
        assert_eq!(w.get(GridCoord::new(5, 5)), 0.0);
    }

    #[test]
    fn test_radii_split_by_falloff() {
        let terrain = TerrainData::flat(1, 1, 7, 0);
        let settings = EditorSettings {
            brush_radius: 10.0,
            brush_falloff: 0.25,
            ..Default::default()
        };
        let gizmo = LandscapeGizmo::default();
        let (r, f) = context(&terrain, &settings, &gizmo).radii();
        assert!((r - 7.5).abs() < 1e-5);
        assert!((f - 2.5).abs() < 1e-5);
    }

    #[test]
    fn test_mask_respects_negative_and_mask_tool() {
        let mut terrain = TerrainData::flat(1, 1, 7, 0);
        let c = GridCoord::new(2, 2);
        terrain.set_selected_region(c, 0.25);
        let mut settings = EditorSettings {
            use_selected_region: true,
            ..Default::default()
        };
        let gizmo = LandscapeGizmo::default();
        assert_eq!(context(&terrain, &settings, &gizmo).mask(c), 0.25);
        settings.use_negative_mask = true;
        let mut ctx = context(&terrain, &settings, &gizmo);
        assert_eq!(ctx.mask(c), 0.75);
        ctx.tool_is_mask = true;
        assert_eq!(ctx.mask(c), 1.0, "Mask tool is never masked");
    }

    #[test]
    fn test_hover_preview_reports_restriction() {
        let mut terrain = TerrainData::flat(2, 1, 7, 0);
        let layer = terrain.add_layer("grass", false);
        let settings = EditorSettings {
            painting_restriction: crate::settings::PaintingRestriction::ExistingOnly,
            ..Default::default()
        };
        let gizmo = LandscapeGizmo::default();
        let mut ctx = context(&terrain, &settings, &gizmo);
        ctx.target_layer = Some(layer);
        let preview = ctx.hover_preview(3.0, 3.0, 2.0);
        assert!(!preview.can_paint, "No component holds the layer yet");
        assert_eq!(preview.components, vec![ComponentCoord::new(0, 0)]);
        ctx.target_layer = None;
        assert!(ctx.hover_preview(3.0, 3.0, 2.0).can_paint);
    }
}
