//! Tools and the edit session.
//!
//! A [`LandscapeTool`] owns at most one live stroke. Cursor samples are
//! buffered between ticks and handed to the stroke as one batch per tick.
//! [`EditSession`] holds everything a stroke needs (terrain, settings,
//! gizmo, brushes, target) and wraps each stroke in an undo transaction.

use std::collections::HashMap;

use crate::brush::{Brush, BrushKind, BrushPreview, CursorSample, GizmoBrush};
use crate::error::{EditError, EditResult};
use crate::gizmo::LandscapeGizmo;
use crate::settings::EditorSettings;
use crate::stroke::{
    CopyStroke, EditTarget, FlattenStroke, HeightTarget, NoiseStroke, PaintStroke, PasteStroke,
    SelectStroke, SmoothStroke, Stroke, StrokeContext, VisibilityStroke, WeightTarget,
};
use crate::terrain_data::TerrainData;
use crate::undo::UndoHistory;

/// Default number of strokes kept for undo.
pub const UNDO_LIMIT: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Sculpt,
    Paint,
    Smooth,
    Flatten,
    Noise,
    Select,
    Mask,
    Visibility,
    Copy,
    Paste,
}

impl ToolKind {
    pub const ALL: [ToolKind; 10] = [
        ToolKind::Sculpt,
        ToolKind::Paint,
        ToolKind::Smooth,
        ToolKind::Flatten,
        ToolKind::Noise,
        ToolKind::Select,
        ToolKind::Mask,
        ToolKind::Visibility,
        ToolKind::Copy,
        ToolKind::Paste,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::Sculpt => "Sculpt",
            ToolKind::Paint => "Paint",
            ToolKind::Smooth => "Smooth",
            ToolKind::Flatten => "Flatten",
            ToolKind::Noise => "Noise",
            ToolKind::Select => "Select",
            ToolKind::Mask => "Mask",
            ToolKind::Visibility => "Visibility",
            ToolKind::Copy => "Copy",
            ToolKind::Paste => "Paste",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
    }

    /// Selection tools edit the mask itself, so brushes skip masking.
    pub fn is_mask(self) -> bool {
        matches!(self, ToolKind::Select | ToolKind::Mask)
    }

    /// Copy always reads through the gizmo rectangle.
    pub fn uses_gizmo_brush(self) -> bool {
        self == ToolKind::Copy
    }

    /// Whether the tool can run against `target`. Targetless tools accept any.
    pub fn supports(self, target: EditTarget) -> bool {
        match self {
            ToolKind::Sculpt => target == EditTarget::Heightmap,
            ToolKind::Paint => matches!(target, EditTarget::Weightmap(_)),
            _ => true,
        }
    }

    pub fn create_stroke(self, target: EditTarget) -> EditResult<Box<dyn Stroke>> {
        if !self.supports(target) {
            return Err(EditError::InvalidTarget {
                tool: self.name(),
                target: target.name(),
            });
        }
        let height = target == EditTarget::Heightmap;
        Ok(match self {
            ToolKind::Sculpt => Box::new(PaintStroke::<HeightTarget>::new(target)?),
            ToolKind::Paint => Box::new(PaintStroke::<WeightTarget>::new(target)?),
            ToolKind::Smooth if height => Box::new(SmoothStroke::<HeightTarget>::new(target)?),
            ToolKind::Smooth => Box::new(SmoothStroke::<WeightTarget>::new(target)?),
            ToolKind::Flatten if height => Box::new(FlattenStroke::<HeightTarget>::new(target)?),
            ToolKind::Flatten => Box::new(FlattenStroke::<WeightTarget>::new(target)?),
            ToolKind::Noise if height => Box::new(NoiseStroke::<HeightTarget>::new(target)?),
            ToolKind::Noise => Box::new(NoiseStroke::<WeightTarget>::new(target)?),
            ToolKind::Select | ToolKind::Mask => Box::new(SelectStroke::new()),
            ToolKind::Visibility => Box::new(VisibilityStroke::new()),
            ToolKind::Copy => Box::new(CopyStroke::new(target)),
            ToolKind::Paste => Box::new(PasteStroke::new(target)),
        })
    }
}

/// Stroke lifecycle for one tool.
pub struct LandscapeTool {
    kind: ToolKind,
    stroke: Option<Box<dyn Stroke>>,
    samples: Vec<CursorSample>,
}

impl LandscapeTool {
    pub fn new(kind: ToolKind) -> Self {
        Self {
            kind,
            stroke: None,
            samples: Vec::new(),
        }
    }

    pub fn kind(&self) -> ToolKind {
        self.kind
    }

    pub fn is_active(&self) -> bool {
        self.stroke.is_some()
    }

    pub fn pending_samples(&self) -> usize {
        self.samples.len()
    }

    /// Create the stroke and apply the hit sample immediately.
    pub fn begin(
        &mut self,
        ctx: &mut StrokeContext<'_>,
        brush: &mut dyn Brush,
        sample: CursorSample,
    ) -> EditResult<()> {
        let mut stroke = self.kind.create_stroke(ctx.target)?;
        brush.begin_stroke(sample.x, sample.y);
        self.samples.clear();
        self.samples.push(sample);
        stroke.apply(ctx, brush, &self.samples);
        self.samples.clear();
        self.stroke = Some(stroke);
        log::debug!("{} stroke begun at ({}, {})", self.kind.name(), sample.x, sample.y);
        Ok(())
    }

    pub fn mouse_move(&mut self, brush: &mut dyn Brush, sample: CursorSample) {
        brush.mouse_move(sample.x, sample.y);
        if self.is_active() {
            self.samples.push(sample);
        }
    }

    /// Advance the brush and flush buffered samples into one apply.
    pub fn tick(&mut self, ctx: &mut StrokeContext<'_>, brush: &mut dyn Brush, dt: f32) {
        brush.tick(&ctx.brush_context(), dt);
        if let Some(stroke) = self.stroke.as_mut() {
            if !self.samples.is_empty() {
                stroke.apply(ctx, brush, &self.samples);
                self.samples.clear();
            }
        }
    }

    /// Apply what is left, finish and drop the stroke.
    pub fn end(&mut self, ctx: &mut StrokeContext<'_>, brush: &mut dyn Brush) {
        if let Some(mut stroke) = self.stroke.take() {
            if !self.samples.is_empty() {
                stroke.apply(ctx, brush, &self.samples);
            }
            stroke.finish(ctx.terrain);
            log::debug!("{} stroke ended", self.kind.name());
        }
        self.samples.clear();
        brush.end_stroke();
    }
}

/// Everything the editor keeps between strokes.
pub struct EditSession {
    terrain: TerrainData,
    settings: EditorSettings,
    gizmo: LandscapeGizmo,
    brushes: HashMap<BrushKind, Box<dyn Brush>>,
    current_brush: BrushKind,
    gizmo_brush: GizmoBrush,
    tool: LandscapeTool,
    target: EditTarget,
    history: UndoHistory,
}

impl EditSession {
    pub fn new(terrain: TerrainData, settings: EditorSettings) -> Self {
        let brushes = BrushKind::ALL
            .into_iter()
            .map(|kind| (kind, kind.create()))
            .collect();
        Self {
            terrain,
            settings,
            gizmo: LandscapeGizmo::default(),
            brushes,
            current_brush: BrushKind::CircleSmooth,
            gizmo_brush: GizmoBrush::new(),
            tool: LandscapeTool::new(ToolKind::Sculpt),
            target: EditTarget::Heightmap,
            history: UndoHistory::new(UNDO_LIMIT),
        }
    }

    pub fn terrain(&self) -> &TerrainData {
        &self.terrain
    }

    pub fn terrain_mut(&mut self) -> &mut TerrainData {
        &mut self.terrain
    }

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    /// Settings change between strokes only.
    pub fn settings_mut(&mut self) -> &mut EditorSettings {
        &mut self.settings
    }

    pub fn gizmo(&self) -> &LandscapeGizmo {
        &self.gizmo
    }

    pub fn gizmo_mut(&mut self) -> &mut LandscapeGizmo {
        &mut self.gizmo
    }

    pub fn tool(&self) -> ToolKind {
        self.tool.kind()
    }

    pub fn brush(&self) -> BrushKind {
        self.current_brush
    }

    pub fn target(&self) -> EditTarget {
        self.target
    }

    pub fn is_stroke_active(&self) -> bool {
        self.tool.is_active()
    }

    pub fn set_tool(&mut self, kind: ToolKind) {
        if self.tool.kind() == kind {
            return;
        }
        self.end_stroke();
        self.tool = LandscapeTool::new(kind);
        log::info!("Tool: {}", kind.name());
    }

    pub fn set_brush(&mut self, kind: BrushKind) {
        if self.current_brush == kind {
            return;
        }
        self.end_stroke();
        if let Some(old) = self.brushes.get_mut(&self.current_brush) {
            old.leave_brush();
        }
        self.current_brush = kind;
        self.brushes
            .entry(kind)
            .or_insert_with(|| kind.create())
            .enter_brush();
        log::info!("Brush: {}", kind.name());
    }

    pub fn set_target(&mut self, target: EditTarget) -> EditResult<()> {
        if let EditTarget::Weightmap(layer) = target {
            if self.terrain.layer_info(layer).is_none() {
                return Err(EditError::UnknownLayer(layer));
            }
        }
        self.end_stroke();
        self.target = target;
        Ok(())
    }

    /// Split borrows so the tool can run against the rest of the session.
    fn with_tool<R>(
        &mut self,
        f: impl FnOnce(&mut LandscapeTool, &mut StrokeContext<'_>, &mut dyn Brush) -> R,
    ) -> R {
        let Self {
            terrain,
            settings,
            gizmo,
            brushes,
            current_brush,
            gizmo_brush,
            tool,
            target,
            ..
        } = self;
        let kind = tool.kind();
        let brush: &mut dyn Brush = if kind.uses_gizmo_brush() {
            gizmo_brush
        } else {
            brushes
                .entry(*current_brush)
                .or_insert_with(|| current_brush.create())
                .as_mut()
        };
        let mut ctx = StrokeContext {
            terrain,
            settings,
            gizmo,
            target: *target,
            tool_is_mask: kind.is_mask(),
        };
        f(tool, &mut ctx, brush)
    }

    /// Mouse down at a terrain-space position.
    pub fn begin_stroke(&mut self, x: f32, y: f32, shift_down: bool) -> EditResult<()> {
        self.end_stroke();
        let description = self.tool.kind().name();
        self.terrain.begin_transaction(description);
        let result = self.with_tool(|tool, ctx, brush| {
            tool.begin(ctx, brush, CursorSample::new(x, y, shift_down))
        });
        if let Err(err) = result {
            self.terrain.end_transaction();
            log::warn!("Cannot begin {description} stroke: {err}");
            return Err(err);
        }
        Ok(())
    }

    pub fn mouse_move(&mut self, x: f32, y: f32, shift_down: bool) {
        self.with_tool(|tool, _ctx, brush| {
            tool.mouse_move(brush, CursorSample::new(x, y, shift_down))
        });
    }

    /// Engine tick: advance brushes and apply buffered samples.
    pub fn tick(&mut self, dt: f32) {
        self.with_tool(|tool, ctx, brush| tool.tick(ctx, brush, dt));
    }

    /// Mouse up. Records the stroke for undo if it changed anything.
    pub fn end_stroke(&mut self) {
        if !self.tool.is_active() {
            return;
        }
        self.with_tool(|tool, ctx, brush| tool.end(ctx, brush));
        if let Some(transaction) = self.terrain.end_transaction() {
            log::debug!(
                "Recorded '{}' touching {} components",
                transaction.description,
                transaction.component_count()
            );
            self.history.push(transaction);
        }
    }

    pub fn undo(&mut self) -> Option<String> {
        self.end_stroke();
        self.history.undo(&mut self.terrain)
    }

    pub fn redo(&mut self) -> Option<String> {
        self.end_stroke();
        self.history.redo(&mut self.terrain)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Hover preview of the brush the current tool uses.
    pub fn brush_preview(&self) -> Option<&BrushPreview> {
        if self.tool.kind().uses_gizmo_brush() {
            return self.gizmo_brush.preview();
        }
        self.brushes.get(&self.current_brush)?.preview()
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::grid::{ComponentCoord, GridCoord};

    fn session() -> EditSession {
        let mut settings = EditorSettings::default();
        settings.brush_radius = 10.0;
        settings.brush_falloff = 0.0;
        settings.tool_strength = 1.0;
        EditSession::new(TerrainData::flat(4, 4, 31, 1000), settings)
    }

    fn height(s: &EditSession, x: i32, y: i32) -> u16 {
        s.terrain().height_at(GridCoord::new(x, y)).unwrap_or_default()
    }

    #[test]
    fn test_tool_names_roundtrip() {
        for kind in ToolKind::ALL {
            assert_eq!(ToolKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ToolKind::from_name("flatten"), Some(ToolKind::Flatten));
        assert_eq!(ToolKind::from_name("ramp"), None);
    }

    #[test]
    fn test_tool_target_support() {
        let mut terrain = TerrainData::new(4);
        let layer = terrain.add_layer("grass", false);
        assert!(ToolKind::Sculpt.create_stroke(EditTarget::Heightmap).is_ok());
        assert!(ToolKind::Sculpt.create_stroke(EditTarget::Weightmap(layer)).is_err());
        assert!(ToolKind::Paint.create_stroke(EditTarget::Heightmap).is_err());
        assert!(ToolKind::Smooth.create_stroke(EditTarget::Weightmap(layer)).is_ok());
        assert!(ToolKind::Visibility.create_stroke(EditTarget::Heightmap).is_ok());
        assert!(ToolKind::Select.is_mask() && ToolKind::Mask.is_mask());
        assert!(!ToolKind::Paint.is_mask());
    }

    #[test]
    fn test_begin_applies_hit_sample() {
        let mut s = session();
        s.begin_stroke(50.0, 50.0, false).expect("begin");
        assert!(s.is_stroke_active());
        assert_eq!(height(&s, 50, 50), 2280);
        s.end_stroke();
        assert!(!s.is_stroke_active());
        assert!(s.can_undo());
    }

    #[test]
    fn test_moves_are_buffered_until_tick() {
        let mut s = session();
        s.begin_stroke(20.0, 20.0, false).expect("begin");
        s.mouse_move(80.0, 80.0, false);
        assert_eq!(height(&s, 80, 80), 1000, "Nothing happens before the tick");
        s.tick(0.016);
        assert_eq!(height(&s, 80, 80), 2280);
        s.end_stroke();
    }

    #[test]
    fn test_end_applies_remaining_samples() {
        let mut s = session();
        s.begin_stroke(20.0, 20.0, false).expect("begin");
        s.mouse_move(80.0, 80.0, false);
        s.end_stroke();
        assert_eq!(height(&s, 80, 80), 2280);
    }

    #[test]
    fn test_moves_without_stroke_are_not_buffered() {
        let mut s = session();
        s.mouse_move(50.0, 50.0, false);
        s.tick(0.016);
        assert_eq!(height(&s, 50, 50), 1000);
    }

    #[test]
    fn test_stroke_is_one_undo_step() {
        let mut s = session();
        s.begin_stroke(20.0, 20.0, false).expect("begin");
        s.mouse_move(80.0, 80.0, false);
        s.tick(0.016);
        s.end_stroke();
        assert_eq!(s.undo().as_deref(), Some("Sculpt"));
        assert_eq!(height(&s, 20, 20), 1000);
        assert_eq!(height(&s, 80, 80), 1000);
        assert!(!s.can_undo());
        s.redo();
        assert_eq!(height(&s, 20, 20), 2280);
        assert_eq!(height(&s, 80, 80), 2280);
    }

    #[test]
    fn test_invalid_target_refuses_to_begin() {
        let mut s = session();
        s.set_tool(ToolKind::Paint);
        assert!(matches!(
            s.begin_stroke(10.0, 10.0, false),
            Err(EditError::InvalidTarget { .. })
        ));
        assert!(!s.is_stroke_active());
        assert!(!s.terrain().in_transaction());
    }

    #[test]
    fn test_set_target_checks_layer() {
        let mut s = session();
        let mut other = TerrainData::new(4);
        let foreign = other.add_layer("x", false);
        assert!(matches!(
            s.set_target(EditTarget::Weightmap(foreign)),
            Err(EditError::UnknownLayer(_))
        ));
        assert_eq!(s.target(), EditTarget::Heightmap);

        let layer = s.terrain_mut().add_layer("grass", false);
        s.set_target(EditTarget::Weightmap(layer)).expect("known layer");
        assert_eq!(s.target(), EditTarget::Weightmap(layer));
    }

    #[test]
    fn test_visibility_through_session() {
        let mut s = session();
        s.set_tool(ToolKind::Visibility);
        s.begin_stroke(50.0, 50.0, false).expect("begin");
        s.end_stroke();
        let vis = s
            .terrain()
            .component(ComponentCoord::new(1, 1))
            .and_then(|c| c.visibility(GridCoord::new(50, 50)));
        assert_eq!(vis, Some(255));
    }

    #[test]
    fn test_copy_uses_gizmo_brush() {
        let mut s = session();
        s.settings_mut().smooth_gizmo_brush = false;
        s.settings_mut().apply_to_all_targets = false;
        *s.gizmo_mut() = LandscapeGizmo::new(Vec2::new(40.0, 40.0), 4.0, 4.0);
        s.set_tool(ToolKind::Copy);
        // Cursor position is irrelevant to the gizmo brush.
        s.begin_stroke(0.0, 0.0, false).expect("begin");
        s.end_stroke();
        assert!(s.gizmo().has_height());
        assert!(!s.can_undo(), "Copying does not modify the terrain");
    }

    #[test]
    fn test_switching_tool_ends_stroke() {
        let mut s = session();
        s.begin_stroke(50.0, 50.0, false).expect("begin");
        s.set_tool(ToolKind::Smooth);
        assert!(!s.is_stroke_active());
        assert!(s.can_undo());
    }
}
