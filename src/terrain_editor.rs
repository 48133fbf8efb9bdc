use glam::Vec3;
use godot::classes::{INode3D, Node3D};
use godot::prelude::*;
use log::LevelFilter;

use crate::brush::BrushKind;
use crate::debug_log;
use crate::grid::GridCoord;
use crate::settings::EditorSettings;
use crate::stroke::EditTarget;
use crate::terrain_data::{TerrainData, HEIGHT_MID};
use crate::tool::{EditSession, ToolKind};

/// Landscape editing node. Owns a flat terrain and the edit session;
/// cursor positions are in landscape vertex space.
#[derive(GodotClass)]
#[class(base=Node3D, init, tool)]
pub struct PixyTerrainEditor {
    base: Base<Node3D>,

    /// Components along X and Y
    #[export]
    #[init(val = Vector2i::new(2, 2))]
    components: Vector2i,

    /// Quads per component side
    #[export]
    #[init(val = 63)]
    component_size_quads: i32,

    #[export]
    #[init(val = Vector3::new(100.0, 100.0, 100.0))]
    draw_scale: Vector3,

    /// Optional JSON settings file loaded on ready
    #[export]
    settings_path: GString,

    /// Mirror log output into debug_terrain_edit.log
    #[export]
    #[init(val = false)]
    write_debug_log: bool,

    #[export]
    #[init(val = false)]
    verbose_logging: bool,

    #[init(val = None)]
    session: Option<EditSession>,

    /// Terrain revision seen on the previous tick
    #[init(val = 0)]
    last_revision: u64,
}

#[godot_api]
impl INode3D for PixyTerrainEditor {
    fn ready(&mut self) {
        let level = if self.verbose_logging {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        };
        debug_log::init_logger(level);
        if self.write_debug_log {
            if let Err(err) = debug_log::init_debug_log() {
                godot_warn!("PixyTerrainEditor: cannot open debug log: {}", err);
            }
        }
        self.rebuild_terrain();
    }

    fn process(&mut self, delta: f64) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.tick(delta as f32);
        let revision = session.terrain().revision();
        if revision != self.last_revision {
            self.last_revision = revision;
            self.base_mut()
                .emit_signal("terrain_changed", &[(revision as i64).to_variant()]);
        }
    }

    fn exit_tree(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.end_stroke();
        }
        debug_log::close_debug_log();
    }
}

#[godot_api]
impl PixyTerrainEditor {
    /// Emitted from `process` whenever edits changed the terrain.
    #[signal]
    fn terrain_changed(revision: i64);

    /// Replace the terrain with a flat one at height 0 and reset history.
    #[func]
    fn rebuild_terrain(&mut self) {
        let mut terrain = TerrainData::flat(
            self.components.x.max(1),
            self.components.y.max(1),
            self.component_size_quads.max(1),
            HEIGHT_MID,
        );
        let s = self.draw_scale;
        terrain.set_draw_scale(Vec3::new(s.x, s.y, s.z));

        let settings = self.load_settings();
        self.last_revision = terrain.revision();
        log::info!(
            "PixyTerrainEditor: {}x{} components of {} quads",
            self.components.x,
            self.components.y,
            self.component_size_quads
        );
        self.session = Some(EditSession::new(terrain, settings));
    }

    fn load_settings(&self) -> EditorSettings {
        if self.settings_path.is_empty() {
            return EditorSettings::default();
        }
        let path = self.settings_path.to_string();
        EditorSettings::load(&path).unwrap_or_else(|err| {
            log::warn!("Using default settings, cannot load {path}: {err}");
            EditorSettings::default()
        })
    }

    #[func]
    fn save_settings(&self, path: GString) -> bool {
        let Some(session) = self.session.as_ref() else {
            return false;
        };
        match session.settings().save(path.to_string()) {
            Ok(()) => true,
            Err(err) => {
                log::error!("Cannot save settings: {err}");
                false
            }
        }
    }

    #[func]
    fn set_tool(&mut self, name: GString) -> bool {
        let Some(kind) = ToolKind::from_name(&name.to_string()) else {
            log::warn!("Unknown tool '{name}'");
            return false;
        };
        match self.session.as_mut() {
            Some(session) => {
                session.set_tool(kind);
                true
            }
            None => false,
        }
    }

    #[func]
    fn get_tool(&self) -> GString {
        self.session
            .as_ref()
            .map_or("", |s| s.tool().name())
            .into()
    }

    #[func]
    fn set_brush(&mut self, name: GString) -> bool {
        let Some(kind) = BrushKind::from_name(&name.to_string()) else {
            log::warn!("Unknown brush '{name}'");
            return false;
        };
        match self.session.as_mut() {
            Some(session) => {
                session.set_brush(kind);
                true
            }
            None => false,
        }
    }

    /// Register a weight layer. Existing names are reused.
    #[func]
    fn add_layer(&mut self, name: GString, no_weight_blend: bool) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let name = name.to_string();
        if session.terrain().layer_by_name(&name).is_none() {
            session.terrain_mut().add_layer(&name, no_weight_blend);
        }
    }

    /// Edit heights, or the named weight layer when `layer` is non-empty.
    #[func]
    fn set_target(&mut self, layer: GString) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        let target = if layer.is_empty() {
            EditTarget::Heightmap
        } else {
            match session.terrain().layer_by_name(&layer.to_string()) {
                Some(id) => EditTarget::Weightmap(id),
                None => {
                    log::warn!("Unknown layer '{layer}'");
                    return false;
                }
            }
        };
        session.set_target(target).is_ok()
    }

    #[func]
    fn set_tool_strength(&mut self, strength: f32) {
        if let Some(session) = self.session.as_mut() {
            session.settings_mut().tool_strength = strength.clamp(0.0, 10.0);
        }
    }

    #[func]
    fn set_brush_radius(&mut self, radius: f32) {
        if let Some(session) = self.session.as_mut() {
            session.settings_mut().brush_radius = radius.max(0.0);
        }
    }

    #[func]
    fn set_brush_falloff(&mut self, falloff: f32) {
        if let Some(session) = self.session.as_mut() {
            session.settings_mut().brush_falloff = falloff.clamp(0.0, 1.0);
        }
    }

    #[func]
    fn begin_stroke(&mut self, position: Vector2, shift_down: bool) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        session.begin_stroke(position.x, position.y, shift_down).is_ok()
    }

    #[func]
    fn move_cursor(&mut self, position: Vector2, shift_down: bool) {
        if let Some(session) = self.session.as_mut() {
            session.mouse_move(position.x, position.y, shift_down);
        }
    }

    #[func]
    fn end_stroke(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.end_stroke();
        }
    }

    #[func]
    fn is_stroke_active(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_stroke_active())
    }

    #[func]
    fn undo(&mut self) -> bool {
        self.session.as_mut().and_then(|s| s.undo()).is_some()
    }

    #[func]
    fn redo(&mut self) -> bool {
        self.session.as_mut().and_then(|s| s.redo()).is_some()
    }

    #[func]
    fn can_undo(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.can_undo())
    }

    #[func]
    fn can_redo(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.can_redo())
    }

    /// World-local height at a vertex, or NAN outside the terrain.
    #[func]
    fn get_height(&self, x: i32, y: i32) -> f32 {
        let Some(session) = self.session.as_ref() else {
            return f32::NAN;
        };
        let terrain = session.terrain();
        terrain
            .height_at(GridCoord::new(x, y))
            .map_or(f32::NAN, |raw| terrain.world_height(raw as f32))
    }

    /// Weight (0..255) of the named layer at a vertex, or -1.
    #[func]
    fn get_weight(&self, layer: GString, x: i32, y: i32) -> i32 {
        let Some(session) = self.session.as_ref() else {
            return -1;
        };
        let terrain = session.terrain();
        terrain
            .layer_by_name(&layer.to_string())
            .and_then(|id| terrain.weight_at(id, GridCoord::new(x, y)))
            .map_or(-1, i32::from)
    }

    #[func]
    fn get_revision(&self) -> i64 {
        self.session
            .as_ref()
            .map_or(0, |s| s.terrain().revision() as i64)
    }
}
