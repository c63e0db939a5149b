use crate::error::{Error, Result};
use num_complex::Complex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Configuration for a square or cubic Gaussian random field with a
/// negative power law as power spectrum.
///
/// In 3D with power -2 this produces a roughly scale invariant spectrum,
/// physically similar to quantum fluctuations, and so works as a field
/// based cosmological initial condition. N-body solvers can use it too,
/// followed by the Zel'dovich approximation to turn density variations
/// into particle position offsets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Grid points per axis.
    pub size: usize,
    /// 2 or 3.
    pub dimensions: usize,
    /// Spectral index; must be negative.
    pub power: f64,
    pub seed: u64,
}

/// A realization of the field, row-major with `size^dimensions` samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RandomField {
    pub size: usize,
    pub dimensions: usize,
    pub data: Vec<f64>,
}

/// Integer FFT frequency for a given index, in transform ordering.
fn frequency(index: usize, size: usize) -> f64 {
    if 2 * index < size {
        index as f64
    } else {
        index as f64 - size as f64
    }
}

/// Applies an inverse FFT along one axis of a row-major hypercube.
fn transform_axis(data: &mut [Complex<f64>], size: usize, stride: usize, fft: &Arc<dyn Fft<f64>>) {
    let mut line = vec![Complex::new(0.0, 0.0); size];
    let block = size * stride;
    let mut base = 0;
    while base < data.len() {
        for inner in 0..stride {
            let start = base + inner;
            for (t, slot) in line.iter_mut().enumerate() {
                *slot = data[start + t * stride];
            }
            fft.process(&mut line);
            for (t, value) in line.iter().enumerate() {
                data[start + t * stride] = *value;
            }
        }
        base += block;
    }
}

/// Generates the field: complex white noise filtered by `|k|^power` in
/// frequency space, inverse transformed, real part kept. The k = 0 mode is
/// zeroed, so the field has no mean component.
pub fn gaussian_random_field(config: &FieldConfig) -> Result<RandomField> {
    if config.size < 2 {
        return Err(Error::Configuration(format!(
            "field size must be at least 2, got {}",
            config.size
        )));
    }
    if config.dimensions != 2 && config.dimensions != 3 {
        return Err(Error::Configuration(format!(
            "field must be 2 or 3 dimensional, got {}",
            config.dimensions
        )));
    }
    if !(config.power < 0.0 && config.power.is_finite()) {
        return Err(Error::Configuration(format!(
            "spectral power must be negative and finite, got {}",
            config.power
        )));
    }

    let size = config.size;
    let total = size.pow(config.dimensions as u32);
    let mut rng = StdRng::seed_from_u64(config.seed);

    let mut spectrum = Vec::with_capacity(total);
    for index in 0..total {
        let k_squared: f64 = match config.dimensions {
            2 => {
                let ki = frequency(index / size, size);
                let kj = frequency(index % size, size);
                ki * ki + kj * kj
            }
            _ => {
                let ki = frequency(index / (size * size), size);
                let kj = frequency(index / size % size, size);
                let kk = frequency(index % size, size);
                ki * ki + kj * kj + kk * kk
            }
        };
        let amplitude = if k_squared == 0.0 {
            0.0
        } else {
            k_squared.powf(0.5 * config.power)
        };
        let re: f64 = rng.sample(StandardNormal);
        let im: f64 = rng.sample(StandardNormal);
        spectrum.push(Complex::new(re, im) * amplitude);
    }

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_inverse(size);
    for axis in 0..config.dimensions {
        let stride = size.pow((config.dimensions - 1 - axis) as u32);
        transform_axis(&mut spectrum, size, stride, &fft);
    }

    // rustfft leaves the inverse transform unnormalized.
    let scale = 1.0 / total as f64;
    let data = spectrum.iter().map(|c| c.re * scale).collect();

    Ok(RandomField {
        size,
        dimensions: config.dimensions,
        data,
    })
}
