use godot::prelude::*;

pub mod accessor;
pub mod brush;
pub mod debug_log;
pub mod edit_cache;
pub mod error;
pub mod filters;
pub mod gizmo;
pub mod grid;
pub mod noise_param;
pub mod settings;
pub mod stroke;
pub mod terrain_data;
pub mod terrain_editor;
pub mod tool;
pub mod undo;

struct PixyLandscapeExtension;

#[gdextension]
unsafe impl ExtensionLibrary for PixyLandscapeExtension {}
