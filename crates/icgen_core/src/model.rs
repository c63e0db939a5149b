use crate::error::{Error, Result};
use crate::traits::OdeSystem;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Physical constants of the King (1966) cluster model.
///
/// Variable names follow the paper: `k` scales the density, `j` is the
/// inverse velocity dispersion, `v0` the (negative) central potential and
/// `g` the gravitational constant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KingParameters {
    pub k: f64,
    pub j: f64,
    pub v0: f64,
    pub g: f64,
}

impl KingParameters {
    pub fn new(k: f64, j: f64, v0: f64, g: f64) -> Result<Self> {
        if !(k > 0.0 && k.is_finite()) {
            return Err(Error::Configuration(format!(
                "density scale k must be positive and finite, got {k}"
            )));
        }
        if !(j > 0.0 && j.is_finite()) {
            return Err(Error::Configuration(format!(
                "velocity dispersion scale j must be positive and finite, got {j}"
            )));
        }
        if !(v0 < 0.0 && v0.is_finite()) {
            return Err(Error::Configuration(format!(
                "central potential V0 must be negative and finite, got {v0}"
            )));
        }
        if !(g > 0.0 && g.is_finite()) {
            return Err(Error::Configuration(format!(
                "gravitational constant G must be positive and finite, got {g}"
            )));
        }
        Ok(Self { k, j, v0, g })
    }

    /// Mass density as a function of potential.
    ///
    /// The density is genuinely discontinuous at V = 0: galactic tidal forces
    /// carry away stars that wander beyond the cluster radius, so the
    /// distribution has compact support. King solves this relation
    /// numerically; it reduces to the error function.
    pub fn density(&self, v: f64) -> f64 {
        if v > 0.0 {
            return 0.0;
        }
        let j2 = self.j * self.j;
        let speed = (-2.0 * v).sqrt();
        let bound = PI.powi(3).sqrt() * self.k / (j2 * self.j)
            * (2.0 * j2 * (self.v0 - v)).exp()
            * libm::erf(self.j * speed);
        let tail = 2.0 * PI * self.k * speed * (2.0 * j2 * self.v0).exp()
            * (1.0 / j2 - 4.0 / 3.0 * v);
        bound - tail
    }
}

/// Gauss's law for gravity in radial coordinates under spherical symmetry,
/// reduced to a first order system in (V, V').
pub struct PoissonSystem {
    params: KingParameters,
}

impl PoissonSystem {
    pub fn new(params: KingParameters) -> Self {
        Self { params }
    }
}

impl OdeSystem<f64> for PoissonSystem {
    fn dimension(&self) -> usize {
        2
    }

    fn apply(&self, r: f64, y: &[f64], out: &mut [f64]) {
        let mut accel = 4.0 * PI * self.params.g * self.params.density(y[0]);
        // An inverse square field has zero potential gradient at the origin,
        // which removes the coordinate singularity of the 2V'/r term.
        if r != 0.0 {
            accel -= 2.0 * y[1] / r;
        }
        out[0] = y[1];
        out[1] = accel;
    }
}

#[cfg(test)]
mod tests {
    use super::{KingParameters, PoissonSystem};
    use crate::error::Error;
    use crate::traits::OdeSystem;

    fn reference_parameters() -> KingParameters {
        KingParameters::new(0.1, 1.0, -1.0, 1.0).expect("valid parameters")
    }

    #[test]
    fn rejects_out_of_range_constants() {
        for (k, j, v0, g) in [
            (0.0, 1.0, -1.0, 1.0),
            (-0.1, 1.0, -1.0, 1.0),
            (0.1, 0.0, -1.0, 1.0),
            (0.1, 1.0, 0.0, 1.0),
            (0.1, 1.0, 1.0, 1.0),
            (0.1, 1.0, -1.0, 0.0),
            (f64::NAN, 1.0, -1.0, 1.0),
        ] {
            match KingParameters::new(k, j, v0, g) {
                Err(Error::Configuration(_)) => {}
                other => panic!("expected configuration error, got {other:?}"),
            }
        }
    }

    #[test]
    fn density_vanishes_beyond_the_edge() {
        let params = reference_parameters();
        assert_eq!(params.density(1e-12), 0.0);
        assert_eq!(params.density(5.0), 0.0);
        // erf(0) = 0 and sqrt(-2V) = 0, so the density is continuous from
        // inside at exactly V = 0 even though its derivative is not.
        assert_eq!(params.density(0.0), 0.0);
    }

    #[test]
    fn density_is_positive_and_decreasing_toward_the_edge() {
        let params = reference_parameters();
        let center = params.density(params.v0);
        let mid = params.density(0.5 * params.v0);
        let edge = params.density(0.01 * params.v0);
        assert!(center > 0.0);
        assert!(mid > 0.0);
        assert!(center > mid && mid > edge);
    }

    #[test]
    fn poisson_rhs_is_regular_at_the_origin() {
        let system = PoissonSystem::new(reference_parameters());
        let mut out = [0.0; 2];
        system.apply(0.0, &[-1.0, 0.0], &mut out);
        assert_eq!(out[0], 0.0);
        assert!(out[1].is_finite() && out[1] > 0.0);
    }

    #[test]
    fn poisson_rhs_includes_geometric_damping_off_origin() {
        let params = reference_parameters();
        let system = PoissonSystem::new(params);
        let mut at_origin = [0.0; 2];
        let mut off_origin = [0.0; 2];
        system.apply(0.0, &[-1.0, 0.5], &mut at_origin);
        system.apply(2.0, &[-1.0, 0.5], &mut off_origin);
        assert!((at_origin[1] - off_origin[1] - 0.5).abs() < 1e-12);
    }
}
