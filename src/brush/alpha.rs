//! Stamp-textured brushes.
//!
//! Both brushes start from the smooth circle falloff and multiply it by a
//! bilinear sample of a single-channel texture. The pattern brush tiles the
//! texture across the landscape; the alpha brush places one stamp under the
//! cursor and turns it to follow the stroke.

use glam::Vec2;

use super::circle::{circle_weights, Falloff};
use super::{Brush, BrushContext, BrushPreview, BrushType, BrushWeights, CursorSample};
use crate::error::{EditError, EditResult};
use crate::settings::AlphaChannel;

/// Minimum cursor travel, in cells, before the alpha brush re-aims.
const ROTATE_MIN_TRAVEL: f32 = 0.5;

/// Single-channel stamp texture, row-major bytes.
#[derive(Clone, Debug, PartialEq)]
pub struct AlphaTexture {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl AlphaTexture {
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> EditResult<Self> {
        if width == 0 || height == 0 || data.len() != width * height {
            return Err(EditError::AlphaTextureSize {
                width,
                height,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Extract one channel of RGBA8 pixels.
    pub fn from_rgba(
        width: usize,
        height: usize,
        rgba: &[u8],
        channel: AlphaChannel,
    ) -> EditResult<Self> {
        if rgba.len() != width * height * 4 {
            return Err(EditError::AlphaTextureSize {
                width,
                height,
                actual: rgba.len() / 4,
            });
        }
        let data = rgba
            .chunks_exact(4)
            .map(|px| px[channel.offset()])
            .collect();
        Self::new(width, height, data)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn texel(&self, x: i64, y: i64) -> f32 {
        let x = x.rem_euclid(self.width as i64) as usize;
        let y = y.rem_euclid(self.height as i64) as usize;
        self.data[x + y * self.width] as f32 / 255.0
    }

    /// Bilinear sample in texel units, wrapping at the edges. Returns 0..=1.
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        let x0 = x.floor();
        let y0 = y.floor();
        let (fx, fy) = (x - x0, y - y0);
        let (x0, y0) = (x0 as i64, y0 as i64);
        let a00 = self.texel(x0, y0);
        let a10 = self.texel(x0 + 1, y0);
        let a01 = self.texel(x0, y0 + 1);
        let a11 = self.texel(x0 + 1, y0 + 1);
        let top = a00 + (a10 - a00) * fx;
        let bottom = a01 + (a11 - a01) * fx;
        top + (bottom - top) * fy
    }
}

/// Texture tiled in landscape space with scale, rotation and pan.
pub struct PatternBrush {
    last_mouse: Vec2,
    preview: Option<BrushPreview>,
}

impl PatternBrush {
    pub fn new() -> Self {
        Self {
            last_mouse: Vec2::ZERO,
            preview: None,
        }
    }
}

impl Default for PatternBrush {
    fn default() -> Self {
        Self::new()
    }
}

impl Brush for PatternBrush {
    fn name(&self) -> &'static str {
        "Pattern"
    }

    fn brush_type(&self) -> BrushType {
        BrushType::Alpha
    }

    fn leave_brush(&mut self) {
        self.preview = None;
    }

    fn mouse_move(&mut self, x: f32, y: f32) {
        self.last_mouse = Vec2::new(x, y);
    }

    fn tick(&mut self, ctx: &BrushContext<'_>, _dt: f32) {
        let (r, f) = ctx.radii();
        self.preview = Some(ctx.hover_preview(self.last_mouse.x, self.last_mouse.y, r + f));
    }

    fn preview(&self) -> Option<&BrushPreview> {
        self.preview.as_ref()
    }

    fn apply_brush(
        &mut self,
        ctx: &BrushContext<'_>,
        samples: &[CursorSample],
    ) -> Option<BrushWeights> {
        let Some(texture) = ctx.settings.alpha_texture.as_ref() else {
            log::debug!("Pattern brush has no texture");
            return None;
        };
        let settings = ctx.settings;
        let scale = settings.alpha_brush_scale.max(f32::EPSILON);
        let (size_x, size_y) = (texture.width() as f32, texture.height() as f32);
        let (sin, cos) = settings.alpha_brush_rotation.to_radians().sin_cos();

        circle_weights(ctx, samples, Falloff::Smooth, |x, y| {
            let sx = x as f32 / scale + size_x * settings.alpha_brush_pan_u;
            let sy = y as f32 / scale + size_y * settings.alpha_brush_pan_v;
            let u = (sx * cos - sy * sin).rem_euclid(size_x);
            let v = (sy * cos + sx * sin).rem_euclid(size_y);
            texture.sample(u, v)
        })
    }
}

/// One texture stamp inscribed in the brush circle, turned toward the
/// direction of travel.
pub struct AlphaBrush {
    last_mouse: Vec2,
    /// Last position the angle was aimed from.
    old_mouse: Option<Vec2>,
    angle: f32,
    clock: f64,
    last_sample_time: f64,
    preview: Option<BrushPreview>,
}

impl AlphaBrush {
    pub fn new() -> Self {
        Self {
            last_mouse: Vec2::ZERO,
            old_mouse: None,
            angle: 0.0,
            clock: 0.0,
            last_sample_time: 0.0,
            preview: None,
        }
    }

    /// Smoothed travel angle in radians.
    pub fn angle(&self) -> f32 {
        self.angle
    }
}

impl Default for AlphaBrush {
    fn default() -> Self {
        Self::new()
    }
}

impl Brush for AlphaBrush {
    fn name(&self) -> &'static str {
        "Alpha"
    }

    fn brush_type(&self) -> BrushType {
        BrushType::Alpha
    }

    fn leave_brush(&mut self) {
        self.preview = None;
    }

    fn mouse_move(&mut self, x: f32, y: f32) {
        self.last_mouse = Vec2::new(x, y);
        let Some(old) = self.old_mouse else {
            self.old_mouse = Some(self.last_mouse);
            self.last_sample_time = self.clock;
            return;
        };
        let delta = self.last_mouse - old;
        if delta.length_squared() < ROTATE_MIN_TRAVEL * ROTATE_MIN_TRAVEL {
            return;
        }
        let dt = (self.clock - self.last_sample_time) as f32;
        let dir = delta.normalize_or_zero();
        let target = (-dir.y).atan2(dir.x);
        // Lerp over roughly 100ms.
        self.angle += (target - self.angle) * (10.0 * dt).min(1.0);
        self.last_sample_time = self.clock;
        self.old_mouse = Some(self.last_mouse);
    }

    fn tick(&mut self, ctx: &BrushContext<'_>, dt: f32) {
        self.clock += dt as f64;
        let (r, f) = ctx.radii();
        self.preview = Some(ctx.hover_preview(self.last_mouse.x, self.last_mouse.y, r + f));
    }

    fn preview(&self) -> Option<&BrushPreview> {
        self.preview.as_ref()
    }

    fn apply_brush(
        &mut self,
        ctx: &BrushContext<'_>,
        samples: &[CursorSample],
    ) -> Option<BrushWeights> {
        let texture = ctx.settings.alpha_texture.as_ref()?;
        let center = samples.last()?;
        if self.old_mouse.is_none() {
            self.old_mouse = Some(Vec2::new(center.x, center.y));
            self.angle = 0.0;
            self.last_sample_time = self.clock;
            return None;
        }

        let (r, f) = ctx.radii();
        let radius = r + f;
        let max_size = 2.0 * (radius * radius / 2.0).sqrt();
        let (size_x, size_y) = (texture.width() as f32, texture.height() as f32);
        let stamp_scale = (max_size / size_x.max(size_y)).max(f32::EPSILON);
        let angle = if ctx.settings.alpha_brush_auto_rotate {
            self.angle
        } else {
            ctx.settings.alpha_brush_rotation.to_radians()
        };
        let (sin, cos) = angle.sin_cos();

        circle_weights(ctx, std::slice::from_ref(center), Falloff::Smooth, |x, y| {
            let lx = (x as f32 - center.x) / stamp_scale;
            let ly = (y as f32 - center.y) / stamp_scale;
            let u = lx * cos - ly * sin + size_x * 0.5;
            let v = ly * cos + lx * sin + size_y * 0.5;
            if (0.0..size_x).contains(&u) && (0.0..size_y).contains(&v) {
                texture.sample(u, v)
            } else {
                0.0
            }
        })
    }
}
