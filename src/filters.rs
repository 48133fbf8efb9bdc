//! Smoothing filters over a row-major block of cached values.
//!
//! Both filters only write cells the brush weighted, blending toward the
//! filtered value by `weight * strength`.

use std::collections::HashMap;

use crate::grid::{GridCoord, Region};

/// Largest box filter radius in cells.
pub const MAX_FILTER_RADIUS: i32 = 127;

/// Box filter averaging, for every weighted cell, the weighted cells within
/// `radius` of it.
pub fn box_filter(
    region: Region,
    weights: &HashMap<GridCoord, f32>,
    data: &mut [f32],
    radius: i32,
    strength: f32,
) {
    if region.is_empty() || data.len() < region.len() {
        return;
    }
    let radius = radius.clamp(1, MAX_FILTER_RADIUS);
    let w = region.width();
    let h = region.height();

    // Summed-area tables of masked values and of the mask, one row/column of padding.
    let mut sum = vec![0.0f64; (w + 1) * (h + 1)];
    let mut count = vec![0u32; (w + 1) * (h + 1)];
    for y in 0..h {
        for x in 0..w {
            let coord = GridCoord::new(region.x1 + x as i32, region.y1 + y as i32);
            let inside = weights.contains_key(&coord);
            let (v, c) = if inside { (data[x + y * w] as f64, 1) } else { (0.0, 0) };
            let i = (x + 1) + (y + 1) * (w + 1);
            sum[i] = v + sum[i - 1] + sum[i - (w + 1)] - sum[i - (w + 1) - 1];
            count[i] = c + count[i - 1] + count[i - (w + 1)] - count[i - (w + 1) - 1];
        }
    }
    let rect = |table: &dyn Fn(usize) -> f64, x0: usize, y0: usize, x1: usize, y1: usize| -> f64 {
        table(x1 + y1 * (w + 1)) - table(x0 + y1 * (w + 1)) - table(x1 + y0 * (w + 1))
            + table(x0 + y0 * (w + 1))
    };

    let source = data.to_vec();
    for (&coord, &weight) in weights {
        if weight <= 0.0 || !region.contains(coord) {
            continue;
        }
        let lx = (coord.x - region.x1) as usize;
        let ly = (coord.y - region.y1) as usize;
        let r = radius as usize;
        let x0 = lx.saturating_sub(r);
        let y0 = ly.saturating_sub(r);
        let x1 = (lx + r + 1).min(w);
        let y1 = (ly + r + 1).min(h);
        let n = rect(&|i: usize| count[i] as f64, x0, y0, x1, y1);
        if n <= 0.0 {
            continue;
        }
        let average = rect(&|i: usize| sum[i], x0, y0, x1, y1) / n;
        let i = lx + ly * w;
        let t = (weight * strength).clamp(0.0, 1.0);
        data[i] = source[i] + (average as f32 - source[i]) * t;
    }
}

/// Frequency-domain low-pass over the interior of `region` (one cell in
/// from each edge, trimmed to even dimensions). Returns `false` when the
/// crate was built without the `fft` feature and nothing was done.
#[cfg(feature = "fft")]
pub fn low_pass_filter(
    region: Region,
    weights: &HashMap<GridCoord, f32>,
    data: &mut [f32],
    detail_scale: f32,
    apply_ratio: f32,
) -> bool {
    use rustfft::num_complex::Complex;

    if region.is_empty() || data.len() < region.len() {
        return true;
    }
    let fft_w = region.width() as i32 - 2;
    let fft_h = region.height() as i32 - 2;
    if fft_w < 2 || fft_h < 2 {
        return true;
    }
    let dim_w = (fft_w - fft_w % 2) as usize;
    let dim_h = (fft_h - fft_h % 2) as usize;
    let stride = region.width();

    let mut buf: Vec<Complex<f32>> = (0..dim_w * dim_h)
        .map(|i| {
            let (x, y) = (i % dim_w, i / dim_w);
            Complex::new(data[(x + 1) + (y + 1) * stride], 0.0)
        })
        .collect();

    fft_2d(&mut buf, dim_w, dim_h, false);

    let ratio = 1.0 - detail_scale;
    let cutoff = ((dim_h as f32 * ratio).powi(2))
        .min((dim_w as f32 * ratio).powi(2))
        .max(f32::EPSILON);
    let (center_x, center_y) = (dim_w / 2, dim_h / 2);
    for y in 0..dim_h {
        let dy = if y < center_y { y as f32 } else { y as f32 - dim_h as f32 };
        for x in 0..dim_w {
            let dx = if x < center_x { x as f32 } else { x as f32 - dim_w as f32 };
            let filter = 1.0 / (1.0 + (dx * dx + dy * dy) / cutoff);
            buf[x + y * dim_w] *= filter;
        }
    }

    fft_2d(&mut buf, dim_w, dim_h, true);

    let scale = (dim_w * dim_h) as f32;
    for (&coord, &weight) in weights {
        if weight <= 0.0 {
            continue;
        }
        let lx = coord.x - region.x1 - 1;
        let ly = coord.y - region.y1 - 1;
        if lx < 0 || ly < 0 || lx as usize >= dim_w || ly as usize >= dim_h {
            continue;
        }
        let filtered = buf[lx as usize + ly as usize * dim_w].re / scale;
        let i = region.index_of(coord);
        let t = (weight * apply_ratio).clamp(0.0, 1.0);
        data[i] += (filtered - data[i]) * t;
    }
    true
}

#[cfg(not(feature = "fft"))]
pub fn low_pass_filter(
    _region: Region,
    _weights: &HashMap<GridCoord, f32>,
    _data: &mut [f32],
    _detail_scale: f32,
    _apply_ratio: f32,
) -> bool {
    false
}

/// In-place 2D transform: every row, then every column.
#[cfg(feature = "fft")]
fn fft_2d(buf: &mut [rustfft::num_complex::Complex<f32>], width: usize, height: usize, inverse: bool) {
    use rustfft::num_complex::Complex;
    use rustfft::FftPlanner;

    let mut planner = FftPlanner::<f32>::new();
    let (rows, cols) = if inverse {
        (planner.plan_fft_inverse(width), planner.plan_fft_inverse(height))
    } else {
        (planner.plan_fft_forward(width), planner.plan_fft_forward(height))
    };
    rows.process(buf);

    let mut column = vec![Complex::new(0.0f32, 0.0); height];
    for x in 0..width {
        for (y, c) in column.iter_mut().enumerate() {
            *c = buf[x + y * width];
        }
        cols.process(&mut column);
        for (y, c) in column.iter().enumerate() {
            buf[x + y * width] = *c;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_weights(region: Region, w: f32) -> HashMap<GridCoord, f32> {
        region.iter().map(|c| (c, w)).collect()
    }

    fn spike(region: Region, at: GridCoord, height: f32) -> Vec<f32> {
        region
            .iter()
            .map(|c| if c == at { height } else { 0.0 })
            .collect()
    }

    #[test]
    fn test_box_filter_spreads_spike() {
        let region = Region::new(0, 0, 8, 8);
        let center = GridCoord::new(4, 4);
        let mut data = spike(region, center, 90.0);
        box_filter(region, &full_weights(region, 1.0), &mut data, 1, 1.0);
        assert!((data[region.index_of(center)] - 10.0).abs() < 0.001);
        assert!((data[region.index_of(GridCoord::new(5, 5))] - 10.0).abs() < 0.001);
        assert_eq!(data[region.index_of(GridCoord::new(7, 7))], 0.0);
    }

    #[test]
    fn test_box_filter_only_averages_weighted_cells() {
        let region = Region::new(0, 0, 2, 0);
        let mut data = vec![0.0, 30.0, 1000.0];
        let mut weights = HashMap::new();
        weights.insert(GridCoord::new(0, 0), 1.0);
        weights.insert(GridCoord::new(1, 0), 1.0);
        box_filter(region, &weights, &mut data, 1, 1.0);
        assert!((data[0] - 15.0).abs() < 0.001);
        assert!((data[1] - 15.0).abs() < 0.001);
        assert_eq!(data[2], 1000.0, "Unweighted cell is neither read nor written");
    }

    #[test]
    fn test_box_filter_strength_scales_blend() {
        let region = Region::new(0, 0, 2, 0);
        let mut data = vec![0.0, 30.0, 0.0];
        box_filter(region, &full_weights(region, 0.5), &mut data, 1, 0.5);
        // Average at the middle is 10, blended by 0.25.
        assert!((data[1] - 25.0).abs() < 0.001);
    }

    #[cfg(feature = "fft")]
    #[test]
    fn test_low_pass_keeps_constant_field() {
        let region = Region::new(0, 0, 11, 11);
        let mut data = vec![50.0; region.len()];
        assert!(low_pass_filter(region, &full_weights(region, 1.0), &mut data, 0.5, 1.0));
        for v in &data {
            assert!((v - 50.0).abs() < 0.01, "Constant field must be preserved, got {v}");
        }
    }

    #[cfg(feature = "fft")]
    #[test]
    fn test_low_pass_damps_spike() {
        let region = Region::new(0, 0, 17, 17);
        let center = GridCoord::new(8, 8);
        let mut data = spike(region, center, 100.0);
        low_pass_filter(region, &full_weights(region, 1.0), &mut data, 0.8, 1.0);
        let after = data[region.index_of(center)];
        assert!(after < 100.0 && after > 0.0, "Spike should be damped, got {after}");
        assert!(data[region.index_of(GridCoord::new(9, 8))] > 0.0, "Energy spreads to neighbours");
        assert_eq!(data[region.index_of(GridCoord::new(0, 0))], 0.0, "Border is outside the transform");
    }

    #[cfg(not(feature = "fft"))]
    #[test]
    fn test_low_pass_unavailable_without_fft() {
        let region = Region::new(0, 0, 5, 5);
        let mut data = vec![1.0; region.len()];
        assert!(!low_pass_filter(region, &HashMap::new(), &mut data, 0.5, 1.0));
    }
}
