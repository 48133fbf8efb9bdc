use glam::Vec2;

use super::{Brush, BrushContext, BrushPreview, BrushWeights, CursorSample};
use crate::grid::Region;

/// Distance-to-weight curve of a circular brush.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Falloff {
    Linear,
    #[default]
    Smooth,
    Spherical,
    /// Inverse spherical: sharp shoulder, soft tail.
    Tip,
}

impl Falloff {
    /// Weight at distance `d` for inner radius `r` and falloff width `f`.
    pub fn weight(self, d: f32, r: f32, f: f32) -> f32 {
        match self {
            Falloff::Linear => linear(d, r, f),
            Falloff::Smooth => {
                let t = linear(d, r, f);
                t * t * (3.0 - 2.0 * t)
            }
            Falloff::Spherical => {
                if d <= r {
                    1.0
                } else if d > r + f {
                    0.0
                } else {
                    let t = (d - r) / f;
                    (1.0 - t * t).max(0.0).sqrt()
                }
            }
            Falloff::Tip => {
                if d <= r {
                    1.0
                } else if d > r + f {
                    0.0
                } else {
                    let t = (f + r - d) / f;
                    1.0 - (1.0 - t * t).max(0.0).sqrt()
                }
            }
        }
    }
}

fn linear(d: f32, r: f32, f: f32) -> f32 {
    if d <= r {
        1.0
    } else if f > 0.0 {
        (1.0 - (d - r) / f).max(0.0)
    } else {
        0.0
    }
}

/// Round brush with a selectable falloff curve.
pub struct CircleBrush {
    falloff: Falloff,
    last_mouse: Vec2,
    preview: Option<BrushPreview>,
}

impl CircleBrush {
    pub fn new(falloff: Falloff) -> Self {
        Self {
            falloff,
            last_mouse: Vec2::ZERO,
            preview: None,
        }
    }

    pub fn falloff(&self) -> Falloff {
        self.falloff
    }
}

/// Shared body of the circle-based brushes: max-composed falloff weights
/// over the union of each sample's bounding square, scaled per cell.
pub(crate) fn circle_weights(
    ctx: &BrushContext<'_>,
    samples: &[CursorSample],
    falloff: Falloff,
    mut scale: impl FnMut(i32, i32) -> f32,
) -> Option<BrushWeights> {
    if samples.is_empty() {
        return None;
    }
    let (radius, width) = ctx.radii();
    let mut out = BrushWeights::new();
    for sample in samples {
        let rect = Region::around(sample.x, sample.y, radius + width);
        out.region = out.region.union(&rect);
        for coord in rect.iter() {
            let prev = out.get(coord);
            if prev >= 1.0 {
                continue;
            }
            let d = coord.dist_sq_to(sample.x, sample.y).sqrt();
            let mut w = falloff.weight(d, radius, width);
            if w <= 0.0 {
                continue;
            }
            w *= scale(coord.x, coord.y);
            if w <= 0.0 {
                continue;
            }
            w *= ctx.mask(coord);
            if w > prev {
                out.insert_max(coord, w);
            }
        }
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

impl Brush for CircleBrush {
    fn name(&self) -> &'static str {
        match self.falloff {
            Falloff::Linear => "Circle_Linear",
            Falloff::Smooth => "Circle_Smooth",
            Falloff::Spherical => "Circle_Spherical",
            Falloff::Tip => "Circle_Tip",
        }
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
        circle_weights(ctx, samples, self.falloff, |_, _| 1.0)
    }
}
