use crate::error::{Error, Result};
use crate::model::KingParameters;
use crate::potential::PotentialTable;
use rand::Rng;
use serde::Serialize;
use std::f64::consts::TAU;

/// Accepted (radius, speed) pairs plus the attempt counter.
///
/// The counter is an observability signal only; it never feeds back into
/// control flow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseSamples {
    pub radii: Vec<f64>,
    pub speeds: Vec<f64>,
    pub attempts: u64,
}

impl PhaseSamples {
    pub fn len(&self) -> usize {
        self.radii.len()
    }

    pub fn is_empty(&self) -> bool {
        self.radii.is_empty()
    }

    /// Fraction of proposals that were accepted.
    pub fn efficiency(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.radii.len() as f64 / self.attempts as f64
        }
    }
}

/// Rejection-samples `n` (radius, speed) pairs from the King phase space
/// distribution on `[0, r0] x [0, v_esc(r)]`.
///
/// The radial draw is simple, but the speed envelope depends on the radius
/// that was just drawn: stars far from the center sit high in the potential
/// and must be slow to stay bound. That coupling is why the distribution is
/// not separable and rejection sampling is used. Since the distribution is
/// only known through the tabulated potential, rejection sampling is also
/// about as accurate as one can get here.
///
/// The loop is bounded by `max_attempts`; exceeding it fails with
/// [`Error::SamplingExhausted`] so that pathological parameter choices with
/// vanishing acceptance cannot run forever.
pub fn sample_phase_space(
    table: &PotentialTable,
    r0: f64,
    params: &KingParameters,
    n: usize,
    max_attempts: u64,
    rng: &mut impl Rng,
) -> Result<PhaseSamples> {
    if !(r0 > 0.0 && r0.is_finite()) {
        return Err(Error::Configuration(format!(
            "boundary radius must be positive and finite, got {r0}"
        )));
    }
    if max_attempts == 0 {
        return Err(Error::Configuration(
            "max_attempts must be at least 1".into(),
        ));
    }

    let mut radii = Vec::with_capacity(n);
    let mut speeds = Vec::with_capacity(n);
    let mut attempts = 0u64;

    let j2 = params.j * params.j;
    let p_cap = (-2.0f64).exp();

    while radii.len() < n {
        if attempts >= max_attempts {
            return Err(Error::SamplingExhausted {
                attempts,
                accepted: radii.len(),
                requested: n,
            });
        }
        attempts += 1;

        let r = rng.gen_range(0.0..r0);
        let potential = table.value_at(r);
        let v_escape = (-2.0 * potential).sqrt();
        if !(v_escape > 0.0) {
            // Right at the boundary the envelope collapses to zero width.
            continue;
        }
        let v = rng.gen_range(0.0..v_escape);
        let p = rng.gen_range(0.0..p_cap);

        // Floating point cancellation can push the density weight slightly
        // negative near the boundary; p >= 0 then rejects as it must.
        let weight = r * r * v * v
            * (-2.0 * j2 * (potential - params.v0)).exp()
            * ((-j2 * v * v).exp() - (2.0 * j2 * potential).exp());
        if p < weight {
            radii.push(r);
            speeds.push(v);
        }
    }

    Ok(PhaseSamples {
        radii,
        speeds,
        attempts,
    })
}

/// Isotropic direction angles for positions and velocities, drawn
/// independently of each other and of the (radius, speed) samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IsotropicAngles {
    pub position_polar: Vec<f64>,
    pub velocity_polar: Vec<f64>,
    pub position_azimuthal: Vec<f64>,
    pub velocity_azimuthal: Vec<f64>,
}

/// Draws `n` angles for each of the four direction components.
///
/// Polar angles are arccos of a uniform draw on [-1, 1], which is uniform on
/// the sphere. Drawing the polar angle itself uniformly on [0, pi] would
/// pile samples up at the poles.
pub fn draw_angles(n: usize, rng: &mut impl Rng) -> IsotropicAngles {
    let position_polar: Vec<f64> = (0..n).map(|_| rng.gen_range(-1.0..1.0f64).acos()).collect();
    let velocity_polar: Vec<f64> = (0..n).map(|_| rng.gen_range(-1.0..1.0f64).acos()).collect();
    let position_azimuthal: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..TAU)).collect();
    let velocity_azimuthal: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..TAU)).collect();

    IsotropicAngles {
        position_polar,
        velocity_polar,
        position_azimuthal,
        velocity_azimuthal,
    }
}
