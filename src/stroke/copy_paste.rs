//! Gizmo copy and paste.
//!
//! Copy rasterizes the gizmo rectangle into its copy grid: every copy cell
//! maps to a landscape position, the four surrounding vertices are looked up
//! (clamped into the cached rectangle) and the value and selection ratio are
//! blended bilinearly. Paste runs the inverse mapping for every brush-weighted
//! vertex and blends the stored data back in.

use super::{EditTarget, Stroke, StrokeContext};
use crate::accessor::{AlphaAccessor, FullWeightAccessor, HeightAccessor};
use crate::brush::{Brush, BrushType, CursorSample};
use crate::edit_cache::{EditCache, ScalarValue};
use crate::error::{EditError, EditResult};
use crate::gizmo::GizmoChannel;
use crate::grid::{GridCoord, Region};
use crate::settings::{NoiseMode, PaintingRestriction};
use crate::terrain_data::{LayerId, TerrainData};

fn bilerp(v: [f32; 4], fx: f32, fy: f32) -> f32 {
    let top = v[0] + (v[1] - v[0]) * fx;
    let bottom = v[2] + (v[3] - v[2]) * fx;
    top + (bottom - top) * fy
}

fn to_f32<T: ScalarValue>(values: Vec<T>) -> Vec<f32> {
    values.into_iter().map(ScalarValue::to_f32).collect()
}

/// Split a layer-minor block into one plane per layer.
fn split_layers(flat: &[u8], layers: usize) -> Vec<Vec<f32>> {
    (0..layers)
        .map(|i| flat.iter().skip(i).step_by(layers).map(|&b| b as f32).collect())
        .collect()
}

fn all_layers(terrain: &TerrainData) -> Vec<LayerId> {
    terrain.layers().iter().map(|l| l.id).collect()
}

/// Caches both strokes need: the single target, plus height and every
/// weight layer for apply-to-all.
struct GizmoCaches {
    target: EditTarget,
    heights: EditCache<HeightAccessor>,
    weights: EditCache<FullWeightAccessor>,
    alpha: Option<EditCache<AlphaAccessor>>,
}

impl GizmoCaches {
    fn new(target: EditTarget) -> Self {
        Self {
            target,
            heights: EditCache::new(HeightAccessor),
            weights: EditCache::new(FullWeightAccessor::default()),
            alpha: target.layer().map(|l| EditCache::new(AlphaAccessor::new(l))),
        }
    }

    fn alpha(&mut self) -> EditResult<&mut EditCache<AlphaAccessor>> {
        let target = self.target;
        self.alpha.as_mut().ok_or(EditError::InvalidTarget {
            tool: "gizmo",
            target: target.name(),
        })
    }

    /// Cached planes over `region`, one per channel.
    fn read(
        &mut self,
        terrain: &TerrainData,
        region: Region,
        apply_to_all: bool,
        layers: &[LayerId],
    ) -> EditResult<Vec<(GizmoChannel, Vec<f32>)>> {
        let mut planes = Vec::new();
        if apply_to_all {
            self.heights.cache_data(terrain, region)?;
            planes.push((GizmoChannel::Height, to_f32(self.heights.get_cached_data(region))));
            if !layers.is_empty() {
                self.weights.cache_data(terrain, region)?;
                let flat = self.weights.get_cached_layers(region, layers.len());
                for (layer, plane) in layers.iter().zip(split_layers(&flat, layers.len())) {
                    planes.push((GizmoChannel::Weight(*layer), plane));
                }
            }
            return Ok(planes);
        }
        match self.target {
            EditTarget::Heightmap => {
                self.heights.cache_data(terrain, region)?;
                planes.push((GizmoChannel::Height, to_f32(self.heights.get_cached_data(region))));
            }
            EditTarget::Weightmap(layer) => {
                let alpha = self.alpha()?;
                alpha.cache_data(terrain, region)?;
                planes.push((GizmoChannel::Weight(layer), to_f32(alpha.get_cached_data(region))));
            }
        }
        Ok(planes)
    }

    fn flush(&mut self, terrain: &mut TerrainData) {
        self.heights.flush(terrain);
        self.weights.flush(terrain);
        if let Some(alpha) = self.alpha.as_mut() {
            alpha.flush(terrain);
        }
    }
}

/// Fills the gizmo from the landscape under it.
pub struct CopyStroke {
    caches: GizmoCaches,
}

impl CopyStroke {
    pub fn new(target: EditTarget) -> Self {
        Self {
            caches: GizmoCaches::new(target),
        }
    }
}

impl Stroke for CopyStroke {
    fn apply(&mut self, ctx: &mut StrokeContext<'_>, brush: &mut dyn Brush, samples: &[CursorSample]) {
        let Some(weights) = ctx.brush_weights(brush, samples) else {
            return;
        };
        let scale_xy = ctx.terrain.draw_scale().x.max(f32::EPSILON);
        ctx.gizmo.clear_data();
        ctx.gizmo.begin_copy(scale_xy);

        let region = weights.region.grown(1);
        let apply_to_all = ctx.settings.apply_to_all_targets;
        let layers = if apply_to_all { all_layers(ctx.terrain) } else { Vec::new() };
        let planes = match self.caches.read(ctx.terrain, region, apply_to_all, &layers) {
            Ok(planes) => planes,
            Err(err) => {
                log::error!("Skipping copy: {err}");
                return;
            }
        };

        let full_copy = !ctx.settings.use_selected_region || !ctx.terrain.has_selected_region();
        let (size_x, size_y) = ctx.gizmo.copy_grid_size(scale_xy);
        let mut did_copy = false;
        let mut copied_layers: Vec<LayerId> = Vec::new();

        for y in 0..size_y {
            for x in 0..size_x {
                let cell = GridCoord::new(x, y);
                let p = ctx.gizmo.copy_cell_to_landscape(cell, scale_xy);
                let (lx, ly) = (p.x.floor() as i32, p.y.floor() as i32);
                let (fx, fy) = (p.x - lx as f32, p.y - ly as f32);
                let corners = [(0, 0), (1, 0), (0, 1), (1, 1)].map(|(dx, dy)| {
                    GridCoord::new(
                        (lx + dx).clamp(region.x1, region.x2),
                        (ly + dy).clamp(region.y1, region.y2),
                    )
                });
                let ratio = if full_copy {
                    1.0
                } else {
                    bilerp(corners.map(|c| ctx.terrain.selected_region(c)), fx, fy)
                };
                if ratio > 0.0 {
                    did_copy = true;
                }
                for (channel, plane) in &planes {
                    let value = bilerp(corners.map(|c| plane[region.index_of(c)]), fx, fy);
                    if value <= 0.0 {
                        continue;
                    }
                    if let GizmoChannel::Weight(layer) = channel {
                        if !copied_layers.contains(layer) {
                            copied_layers.push(*layer);
                        }
                    }
                    ctx.gizmo.store(cell, ratio, *channel, value);
                }
            }
        }

        if did_copy {
            let (height, weight) = if apply_to_all {
                (true, !layers.is_empty())
            } else {
                (ctx.target == EditTarget::Heightmap, ctx.target != EditTarget::Heightmap)
            };
            ctx.gizmo.mark_copied(height, weight);
            for layer in copied_layers {
                ctx.gizmo.add_layer(layer);
            }
        }
        log::debug!("Copied {} gizmo cells", ctx.gizmo.data_len());
    }
}

/// Blends the gizmo's data back onto the landscape under the brush.
pub struct PasteStroke {
    caches: GizmoCaches,
}

impl PasteStroke {
    pub fn new(target: EditTarget) -> Self {
        Self {
            caches: GizmoCaches::new(target),
        }
    }
}

impl Stroke for PasteStroke {
    fn apply(&mut self, ctx: &mut StrokeContext<'_>, brush: &mut dyn Brush, samples: &[CursorSample]) {
        if !ctx.gizmo.has_data() {
            return;
        }
        let gizmo_brush = brush.brush_type() == BrushType::Gizmo;
        let Some(weights) = ctx.brush_weights(brush, samples) else {
            return;
        };
        let scale_xy = ctx.terrain.draw_scale().x.max(f32::EPSILON);
        let region = weights.region.grown(1);
        let apply_to_all = ctx.settings.apply_to_all_targets;
        let layers = if apply_to_all && !ctx.gizmo.layers().is_empty() {
            all_layers(ctx.terrain)
        } else {
            Vec::new()
        };
        let mut planes = match self.caches.read(ctx.terrain, region, apply_to_all, &layers) {
            Ok(planes) => planes,
            Err(err) => {
                log::error!("Skipping paste: {err}");
                return;
            }
        };

        let strength = ctx.settings.tool_strength;
        let paste_mode = ctx.settings.paste_mode;
        for (&coord, &w) in &weights.weights {
            if w <= 0.0 || !region.contains(coord) {
                continue;
            }
            let i = region.index_of(coord);
            let (x, y) = (coord.x as f32, coord.y as f32);
            let paint = if gizmo_brush { w } else { w * strength };
            for (channel, plane) in planes.iter_mut() {
                let original = plane[i];
                let blended = ctx.gizmo.blend_at(x, y, *channel, original, scale_xy);
                let mut amount = paint;
                let dest = match channel {
                    GizmoChannel::Height => {
                        let dest = blended.round().clamp(0.0, 65535.0);
                        let keep = match paste_mode {
                            NoiseMode::Add => original < dest,
                            NoiseMode::Sub => original > dest,
                            NoiseMode::Both => true,
                        };
                        if !keep {
                            amount = 0.0;
                        }
                        dest
                    }
                    GizmoChannel::Weight(_) => blended.round().clamp(0.0, 255.0),
                };
                plane[i] = original + (dest - original) * amount;
            }
        }

        let restriction = PaintingRestriction::None;
        let mut layer_planes: Vec<Vec<f32>> = Vec::new();
        for (channel, plane) in planes {
            match channel {
                GizmoChannel::Height => {
                    let data: Vec<u16> = plane.iter().map(|&v| u16::clamp_from(v)).collect();
                    self.caches.heights.set_cached_data(ctx.terrain, region, &data, restriction);
                    self.caches.heights.flush(ctx.terrain);
                }
                GizmoChannel::Weight(_) if apply_to_all => layer_planes.push(plane),
                GizmoChannel::Weight(_) => {
                    let data: Vec<u8> = plane.iter().map(|&v| u8::clamp_from(v)).collect();
                    if let Ok(alpha) = self.caches.alpha() {
                        alpha.set_cached_data(ctx.terrain, region, &data, restriction);
                        alpha.flush(ctx.terrain);
                    }
                }
            }
        }

        if !layer_planes.is_empty() {
            for &layer in ctx.gizmo.layers() {
                self.caches.weights.add_dirty_layer(layer);
            }
            let mut flat = Vec::with_capacity(region.len() * layer_planes.len());
            for cell in 0..region.len() {
                flat.extend(layer_planes.iter().map(|plane| u8::clamp_from(plane[cell])));
            }
            self.caches
                .weights
                .set_cached_layers(ctx.terrain, region, &flat, layer_planes.len(), restriction);
            self.caches.weights.flush(ctx.terrain);
        }
    }

    fn finish(&mut self, terrain: &mut TerrainData) {
        self.caches.flush(terrain);
    }
}
