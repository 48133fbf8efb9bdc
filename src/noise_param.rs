use noise::{NoiseFn, Perlin};

use crate::settings::NoiseMode;

/// Number of Perlin octaves summed per sample.
pub const NOISE_OCTAVES: u32 = 4;

/// Four-octave Perlin noise around a base value.
///
/// Octave `o` runs at frequency `2^o / noise_scale` with amplitude `1 / 2^o`.
/// Coordinates are mirrored about zero so the pattern is identical in every
/// quadrant.
pub struct NoiseParameter {
    base: f32,
    noise_scale: f32,
    noise_amount: f32,
    perlin: Perlin,
}

impl NoiseParameter {
    pub fn new(base: f32, noise_scale: f32, noise_amount: f32) -> Self {
        Self {
            base,
            noise_scale,
            noise_amount,
            perlin: Perlin::new(Perlin::DEFAULT_SEED),
        }
    }

    pub fn sample(&self, x: i32, y: i32) -> f32 {
        self.sample_with_amount(x, y, self.noise_amount)
    }

    /// `sample` with a per-call amplitude, so one table serves a whole apply.
    pub fn sample_with_amount(&self, x: i32, y: i32, noise_amount: f32) -> f32 {
        let x = x.unsigned_abs() as f64;
        let y = y.unsigned_abs() as f64;
        let mut noise = 0.0f64;
        if self.noise_scale > f32::EPSILON {
            for octave in 0..NOISE_OCTAVES {
                let shift = (1u32 << octave) as f64;
                let scale = shift / self.noise_scale as f64;
                noise += self.perlin.get([x * scale, y * scale]) / shift;
            }
        }
        self.base + noise as f32 * noise_amount
    }
}

/// Map a raw noise sample into add-only, subtract-only or signed form.
pub fn noise_mode_conversion(mode: NoiseMode, noise_amount: f32, noise_value: f32) -> f32 {
    match mode {
        NoiseMode::Add => 0.5 * (noise_value + noise_amount),
        NoiseMode::Sub => 0.5 * (noise_value - noise_amount),
        NoiseMode::Both => noise_value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_scale_returns_base() {
        let p = NoiseParameter::new(5.0, 0.0, 100.0);
        assert_eq!(p.sample(13, 7), 5.0);
    }

    #[test]
    fn test_sample_is_mirrored() {
        let p = NoiseParameter::new(0.0, 16.0, 1.0);
        assert_eq!(p.sample(5, 9), p.sample(-5, -9));
        assert_eq!(p.sample(3, -2), p.sample(-3, 2));
    }

    #[test]
    fn test_sample_is_bounded_and_varies() {
        let p = NoiseParameter::new(0.0, 16.0, 10.0);
        let mut distinct = false;
        let first = p.sample(1, 1);
        for x in 0..64 {
            let v = p.sample(x, 3 * x + 1);
            assert!(v.abs() <= 20.0, "Four octaves stay within twice the amount, got {v}");
            if (v - first).abs() > 0.001 {
                distinct = true;
            }
        }
        assert!(distinct, "Noise should not be constant");
    }

    #[test]
    fn test_sample_with_amount_scales_linearly() {
        let unit = NoiseParameter::new(0.0, 8.0, 1.0);
        for x in 0..20 {
            let scaled = NoiseParameter::new(0.0, 8.0, 4.0).sample(x, x / 2);
            assert!((unit.sample_with_amount(x, x / 2, 4.0) - scaled).abs() < 1e-4);
        }
        let based = NoiseParameter::new(3.0, 0.0, 1.0);
        assert_eq!(based.sample_with_amount(4, 4, 50.0), 3.0);
    }

    #[test]
    fn test_noise_mode_conversion() {
        assert!((noise_mode_conversion(NoiseMode::Add, 2.0, -2.0)).abs() < 0.001);
        assert!((noise_mode_conversion(NoiseMode::Add, 2.0, 2.0) - 2.0).abs() < 0.001);
        assert!((noise_mode_conversion(NoiseMode::Sub, 2.0, 2.0)).abs() < 0.001);
        assert!((noise_mode_conversion(NoiseMode::Both, 2.0, 1.5) - 1.5).abs() < 0.001);
    }
}
