//! Normal distribution curve for the explorer.

use std::f64::consts::PI;

/// Plot domain of the explorer, fixed so changes in shape stay visible.
pub const DOMAIN: (f64, f64) = (-10.0, 10.0);
pub const SAMPLES: usize = 101;

pub const MEAN_RANGE: (f64, f64) = (-5.0, 5.0);
pub const SD_RANGE: (f64, f64) = (0.5, 3.0);
pub const STEP: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normal {
    mean: f64,
    sd: f64,
}

impl Default for Normal {
    fn default() -> Self {
        Self { mean: 0.0, sd: 1.0 }
    }
}

impl Normal {
    /// Parameters are clamped to the slider ranges.
    pub fn new(mean: f64, sd: f64) -> Self {
        Self {
            mean: snap(mean.clamp(MEAN_RANGE.0, MEAN_RANGE.1)),
            sd: snap(sd.clamp(SD_RANGE.0, SD_RANGE.1)),
        }
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn sd(&self) -> f64 {
        self.sd
    }

    pub fn pdf(&self, x: f64) -> f64 {
        let z = (x - self.mean) / self.sd;
        (-0.5 * z * z).exp() / (self.sd * (2.0 * PI).sqrt())
    }

    /// `(x, density)` pairs across [`DOMAIN`] in equal steps.
    pub fn curve(&self) -> Vec<(f64, f64)> {
        let (lo, hi) = DOMAIN;
        let step = (hi - lo) / (SAMPLES - 1) as f64;
        (0..SAMPLES)
            .map(|i| {
                let x = snap(lo + step * i as f64);
                (x, self.pdf(x))
            })
            .collect()
    }

    pub fn shift_mean(&self, steps: i32) -> Self {
        Self::new(self.mean + STEP * steps as f64, self.sd)
    }

    pub fn shift_sd(&self, steps: i32) -> Self {
        Self::new(self.mean, self.sd + STEP * steps as f64)
    }
}

/// Round to the slider resolution so repeated steps don't drift.
fn snap(v: f64) -> f64 {
    (v / STEP).round() * STEP
}
