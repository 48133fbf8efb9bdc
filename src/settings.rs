//! Tool settings shared by every brush and stroke.
//!
//! The editing core only ever reads these. The host (Godot node or tests)
//! owns the instance and may persist it as JSON between sessions.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::brush::alpha::AlphaTexture;
use crate::error::EditResult;

/// Policy applied when a weight write would add a new layer to a component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PaintingRestriction {
    /// Layers are allocated on demand.
    #[default]
    None,
    /// Refuse new allocations once a component holds the terrain's maximum.
    UseMaxLayers,
    /// Only paint layers a component already has.
    ExistingOnly,
}

/// Which direction flatten is allowed to move a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FlattenMode {
    #[default]
    Both,
    /// Only raise cells below the target.
    Raise,
    /// Only lower cells above the target.
    Lower,
}

/// Noise and paste blending direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NoiseMode {
    #[default]
    Both,
    Add,
    Sub,
}

/// Channel of an RGBA stamp texture used by the alpha and pattern brushes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AlphaChannel {
    #[default]
    Red,
    Green,
    Blue,
    Alpha,
}

impl AlphaChannel {
    pub fn offset(self) -> usize {
        match self {
            AlphaChannel::Red => 0,
            AlphaChannel::Green => 1,
            AlphaChannel::Blue => 2,
            AlphaChannel::Alpha => 3,
        }
    }
}

/// Editor tool settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    /// Overall tool strength, 0..=10 (values above 1 only matter for sculpt).
    pub tool_strength: f32,
    /// Brush radius in world units.
    pub brush_radius: f32,
    /// Fraction of the radius used as falloff band (0..=1).
    pub brush_falloff: f32,
    /// Width of the component brush in components.
    pub brush_component_size: i32,

    pub use_selected_region: bool,
    pub use_negative_mask: bool,

    pub painting_restriction: PaintingRestriction,
    pub use_weight_target_value: bool,
    /// Target weight (0..=1) when painting toward a value.
    pub weight_target_value: f32,

    pub use_clay_brush: bool,

    pub smooth_filter_kernel_scale: f32,
    pub detail_smooth: bool,
    /// 0 keeps everything, 1 removes all detail.
    pub detail_scale: f32,

    pub flatten_mode: FlattenMode,
    pub use_slope_flatten: bool,
    pub pick_value_per_apply: bool,
    pub use_flatten_target: bool,
    /// Flatten target in world-local height units.
    pub flatten_target: f32,

    pub noise_mode: NoiseMode,
    pub noise_scale: f32,
    /// Brushes smaller than this radius get proportionally weaker noise.
    pub maximum_value_radius: f32,

    pub alpha_brush_scale: f32,
    /// Degrees.
    pub alpha_brush_rotation: f32,
    pub alpha_brush_pan_u: f32,
    pub alpha_brush_pan_v: f32,
    pub alpha_brush_auto_rotate: bool,
    pub alpha_texture_channel: AlphaChannel,
    #[serde(skip)]
    pub alpha_texture: Option<AlphaTexture>,

    pub smooth_gizmo_brush: bool,
    pub paste_mode: NoiseMode,
    pub apply_to_all_targets: bool,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            tool_strength: 0.3,
            brush_radius: 8.0,
            brush_falloff: 0.5,
            brush_component_size: 1,
            use_selected_region: false,
            use_negative_mask: false,
            painting_restriction: PaintingRestriction::None,
            use_weight_target_value: false,
            weight_target_value: 1.0,
            use_clay_brush: false,
            smooth_filter_kernel_scale: 1.0,
            detail_smooth: false,
            detail_scale: 0.3,
            flatten_mode: FlattenMode::Both,
            use_slope_flatten: false,
            pick_value_per_apply: false,
            use_flatten_target: false,
            flatten_target: 0.0,
            noise_mode: NoiseMode::Both,
            noise_scale: 128.0,
            maximum_value_radius: 100.0,
            alpha_brush_scale: 0.5,
            alpha_brush_rotation: 0.0,
            alpha_brush_pan_u: 0.0,
            alpha_brush_pan_v: 0.0,
            alpha_brush_auto_rotate: true,
            alpha_texture_channel: AlphaChannel::Red,
            alpha_texture: None,
            smooth_gizmo_brush: true,
            paste_mode: NoiseMode::Both,
            apply_to_all_targets: true,
        }
    }
}

impl EditorSettings {
    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> EditResult<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let settings: EditorSettings = serde_json::from_str(&text)?;
        log::info!("Loaded editor settings from {}", path.as_ref().display());
        Ok(settings)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> EditResult<()> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), text)?;
        log::info!("Saved editor settings to {}", path.as_ref().display());
        Ok(())
    }

    /// Set the stamp texture from RGBA8 pixels, extracting the configured channel.
    pub fn set_alpha_texture_rgba(
        &mut self,
        width: usize,
        height: usize,
        rgba: &[u8],
    ) -> EditResult<()> {
        self.alpha_texture = Some(AlphaTexture::from_rgba(
            width,
            height,
            rgba,
            self.alpha_texture_channel,
        )?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_editor() {
        let s = EditorSettings::default();
        assert!((s.tool_strength - 0.3).abs() < 0.001);
        assert!((s.brush_falloff - 0.5).abs() < 0.001);
        assert_eq!(s.flatten_mode, FlattenMode::Both);
        assert_eq!(s.painting_restriction, PaintingRestriction::None);
        assert!(s.alpha_texture.is_none());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let s: EditorSettings =
            serde_json::from_str(r#"{ "tool_strength": 1.0, "noise_mode": "Sub" }"#).unwrap();
        assert!((s.tool_strength - 1.0).abs() < 0.001);
        assert_eq!(s.noise_mode, NoiseMode::Sub);
        assert!((s.noise_scale - 128.0).abs() < 0.001, "Unset fields keep defaults");
    }

    #[test]
    fn test_save_load_file() {
        let path = std::env::temp_dir().join("pixy_landscape_settings_test.json");
        let mut s = EditorSettings::default();
        s.detail_scale = 0.75;
        s.flatten_mode = FlattenMode::Lower;
        s.save(&path).unwrap();

        let loaded = EditorSettings::load(&path).unwrap();
        assert!((loaded.detail_scale - 0.75).abs() < 0.001);
        assert_eq!(loaded.flatten_mode, FlattenMode::Lower);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = EditorSettings::load("/nonexistent/pixy/settings.json");
        assert!(matches!(result, Err(crate::error::EditError::Io(_))));
    }

    #[test]
    fn test_alpha_texture_channel_extraction() {
        let mut s = EditorSettings::default();
        s.alpha_texture_channel = AlphaChannel::Green;
        let rgba = [1, 2, 3, 4, 5, 6, 7, 8];
        s.set_alpha_texture_rgba(2, 1, &rgba).unwrap();
        let tex = s.alpha_texture.as_ref().unwrap();
        assert_eq!(tex.data(), &[2, 6]);
    }
}
