use crate::error::{Error, Result};
use crate::model::KingParameters;
use crate::potential::{locate_boundary, solve_potential, Boundary};
use crate::sampler::{draw_angles, sample_phase_space};
use crate::storage::OutputSink;
use crate::transform::{assemble_particles, Particle};
use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Complete configuration of a cluster realization. Immutable once built;
/// `generate` validates every field before any stage runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Density scale k of the King model.
    pub k: f64,
    /// Inverse velocity dispersion scale j.
    pub j: f64,
    /// Central potential V0, negative.
    pub v0: f64,
    /// Gravitational constant.
    pub g: f64,
    /// Outer bound of the integration domain. The physical constants fix
    /// where the potential hits zero; r_max merely has to reach past it.
    pub r_max: f64,
    /// Number of tabulation points for the potential table.
    pub n_points: usize,
    /// Number of stars to sample.
    pub n_particles: usize,
    /// Random generator seed; fixes the realization bit for bit.
    pub seed: u64,
    /// Minimum acceptable number of tabulation steps to the boundary before
    /// the interpolation is flagged as low resolution.
    pub threshold_steps: usize,
    /// Upper bound on rejection sampling proposals.
    pub max_attempts: u64,
    /// Boundary condition V'(0). King derives a value from experimental
    /// data, but the equation is stable enough under this condition that 0
    /// serves as the default.
    pub initial_slope: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            k: 0.1,
            j: 1.0,
            v0: -1.0,
            g: 1.0,
            r_max: 10.0,
            n_points: 512,
            n_particles: 16,
            seed: 0,
            threshold_steps: 128,
            max_attempts: 100_000_000,
            initial_slope: 0.0,
        }
    }
}

impl ClusterConfig {
    pub fn validate(&self) -> Result<()> {
        KingParameters::new(self.k, self.j, self.v0, self.g)?;
        if !(self.r_max > 0.0 && self.r_max.is_finite()) {
            return Err(Error::Configuration(format!(
                "r_max must be positive and finite, got {}",
                self.r_max
            )));
        }
        if self.n_points < 2 {
            return Err(Error::Configuration(format!(
                "n_points must be at least 2, got {}",
                self.n_points
            )));
        }
        if self.max_attempts == 0 {
            return Err(Error::Configuration(
                "max_attempts must be at least 1".into(),
            ));
        }
        if !self.initial_slope.is_finite() {
            return Err(Error::Configuration(format!(
                "initial slope must be finite, got {}",
                self.initial_slope
            )));
        }
        Ok(())
    }
}

/// The generated initial condition plus the diagnostics worth reporting.
#[derive(Debug, Clone)]
pub struct Realization {
    pub boundary: Boundary,
    pub particles: Vec<Particle>,
    pub attempts: u64,
    pub efficiency: f64,
}

/// Runs the full sampling pipeline: potential table, boundary, phase space
/// samples, direction angles, Cartesian assembly. Deterministic for a fixed
/// seed; the generator is local to this call, so concurrent or repeated
/// runs in one process cannot interfere.
pub fn generate(config: &ClusterConfig) -> Result<Realization> {
    config.validate()?;
    let params = KingParameters::new(config.k, config.j, config.v0, config.g)?;

    let table = solve_potential(&params, config.r_max, config.n_points, config.initial_slope)?;
    let boundary = locate_boundary(&table, config.threshold_steps)?;
    log::info!(
        "boundary at {:.2} of {:.2} ({} of {} steps)",
        boundary.r0,
        config.r_max,
        boundary.steps_to_boundary,
        config.n_points
    );

    let mut rng = StdRng::seed_from_u64(config.seed);
    let samples = sample_phase_space(
        &table,
        boundary.r0,
        &params,
        config.n_particles,
        config.max_attempts,
        &mut rng,
    )?;
    log::info!(
        "{:.2}% sampling efficiency ({} attempts)",
        samples.efficiency() * 100.0,
        samples.attempts
    );

    let angles = draw_angles(config.n_particles, &mut rng);
    let particles = assemble_particles(&samples, &angles);

    Ok(Realization {
        boundary,
        particles,
        attempts: samples.attempts,
        efficiency: samples.efficiency(),
    })
}

/// Hands a realization to an output sink as a single time step. The sink is
/// closed on every exit path so the container is finalized even when the
/// write fails.
pub fn write_realization(
    realization: &Realization,
    sink: &mut dyn OutputSink,
    time: f64,
) -> Result<()> {
    let positions: Vec<Vector3<f64>> = realization
        .particles
        .iter()
        .map(|p| p.position)
        .collect();
    let velocities: Vec<Vector3<f64>> = realization
        .particles
        .iter()
        .map(|p| p.velocity)
        .collect();

    let written = sink.write_step(&positions, Some(velocities.as_slice()), time);
    let closed = sink.close();
    written.and(closed)
}

#[cfg(test)]
mod tests {
    use super::{generate, write_realization, ClusterConfig};
    use crate::error::{Error, Result};
    use crate::storage::OutputSink;
    use nalgebra::Vector3;

    #[derive(Default)]
    struct RecordingSink {
        steps: Vec<(usize, bool, f64)>,
        closed: bool,
        fail_write: bool,
    }

    impl OutputSink for RecordingSink {
        fn write_step(
            &mut self,
            positions: &[Vector3<f64>],
            velocities: Option<&[Vector3<f64>]>,
            time: f64,
        ) -> Result<()> {
            if self.fail_write {
                return Err(Error::ShapeMismatch("forced failure".into()));
            }
            self.steps.push((positions.len(), velocities.is_some(), time));
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            self.closed = true;
            Ok(())
        }
    }

    fn test_config() -> ClusterConfig {
        ClusterConfig {
            n_points: 2048,
            n_particles: 32,
            threshold_steps: 16,
            ..ClusterConfig::default()
        }
    }

    #[test]
    fn default_configuration_validates() {
        ClusterConfig::default().validate().expect("default is valid");
    }

    #[test]
    fn invalid_configurations_fail_before_running() {
        for config in [
            ClusterConfig {
                r_max: 0.0,
                ..ClusterConfig::default()
            },
            ClusterConfig {
                n_points: 1,
                ..ClusterConfig::default()
            },
            ClusterConfig {
                v0: 1.0,
                ..ClusterConfig::default()
            },
            ClusterConfig {
                max_attempts: 0,
                ..ClusterConfig::default()
            },
        ] {
            assert!(matches!(generate(&config), Err(Error::Configuration(_))));
        }
    }

    #[test]
    fn generates_the_requested_number_of_bound_particles() {
        let config = test_config();
        let realization = generate(&config).expect("generation should succeed");
        assert_eq!(realization.particles.len(), 32);
        assert!(realization.boundary.r0 > 0.0 && realization.boundary.r0 < config.r_max);
        assert!(realization.attempts >= 32);
        assert!(realization.efficiency > 0.0 && realization.efficiency <= 1.0);
        for particle in &realization.particles {
            assert!(particle.position.norm() <= realization.boundary.r0 + 1e-12);
            assert!(particle.velocity.norm().is_finite());
        }
    }

    #[test]
    fn realizations_are_reproducible_per_seed() {
        let config = test_config();
        let a = generate(&config).expect("generation");
        let b = generate(&config).expect("generation");
        assert_eq!(a.boundary, b.boundary);
        assert_eq!(a.particles, b.particles);
        assert_eq!(a.attempts, b.attempts);

        let c = generate(&ClusterConfig {
            seed: 1,
            ..config
        })
        .expect("generation");
        assert_ne!(a.particles, c.particles);
    }

    #[test]
    fn too_small_domain_reports_boundary_not_found() {
        let config = ClusterConfig {
            r_max: 0.5,
            ..test_config()
        };
        match generate(&config) {
            Err(Error::BoundaryNotFound { r_max }) => assert_eq!(r_max, 0.5),
            other => panic!("expected BoundaryNotFound, got {other:?}"),
        }
    }

    #[test]
    fn realization_is_written_as_one_step_and_closed() {
        let realization = generate(&test_config()).expect("generation");
        let mut sink = RecordingSink::default();
        write_realization(&realization, &mut sink, 0.0).expect("write should succeed");
        assert_eq!(sink.steps, vec![(32, true, 0.0)]);
        assert!(sink.closed);
    }

    #[test]
    fn sink_is_closed_even_when_the_write_fails() {
        let realization = generate(&test_config()).expect("generation");
        let mut sink = RecordingSink {
            fail_write: true,
            ..RecordingSink::default()
        };
        assert!(write_realization(&realization, &mut sink, 0.0).is_err());
        assert!(sink.closed);
    }
}
