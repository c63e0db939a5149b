use crate::error::{Error, Result};
use crate::model::{KingParameters, PoissonSystem};
use crate::solvers::{integrate_grid, IntegrationSettings, SolverError};
use serde::Serialize;

/// Tabulated solution of the potential equation on an evenly spaced radial
/// grid, sorted by strictly increasing radius. Read-only after creation.
#[derive(Debug, Clone, Serialize)]
pub struct PotentialTable {
    radii: Vec<f64>,
    potential: Vec<f64>,
    derivative: Vec<f64>,
}

impl PotentialTable {
    pub fn len(&self) -> usize {
        self.radii.len()
    }

    pub fn is_empty(&self) -> bool {
        self.radii.is_empty()
    }

    pub fn radii(&self) -> &[f64] {
        &self.radii
    }

    pub fn potential(&self) -> &[f64] {
        &self.potential
    }

    pub fn derivative(&self) -> &[f64] {
        &self.derivative
    }

    /// Potential at radius `r` by linear interpolation.
    ///
    /// Linear on purpose: anything smoother would round off the cluster
    /// boundary, which is physically sharp, and would disagree with the
    /// boundary radius computed in [`locate_boundary`].
    pub fn value_at(&self, r: f64) -> f64 {
        let first = self.radii[0];
        let last = self.radii[self.radii.len() - 1];
        if r <= first {
            return self.potential[0];
        }
        if r >= last {
            return self.potential[self.potential.len() - 1];
        }
        // Evenly spaced grid, so the bracketing index is direct.
        let spacing = (last - first) / (self.radii.len() - 1) as f64;
        let i = (((r - first) / spacing) as usize).min(self.radii.len() - 2);
        let frac = (r - self.radii[i]) / (self.radii[i + 1] - self.radii[i]);
        self.potential[i] + frac * (self.potential[i + 1] - self.potential[i])
    }
}

/// Integrates the Poisson equation from the cluster center out to `r_max`,
/// tabulating the potential and its derivative at `n_points` evenly spaced
/// radii.
///
/// `initial_slope` is the inner boundary condition on V'. King derives a
/// value from experimental data; the equation is so stable under this
/// condition that any remotely reasonable value gives indistinguishable
/// results, so the default is simply 0. It stays configurable for callers
/// that want to reproduce the original boundary condition; a nonzero value
/// is imposed at the first grid radius, since the equation only admits
/// V'(0) = 0 at the center itself.
pub fn solve_potential(
    params: &KingParameters,
    r_max: f64,
    n_points: usize,
    initial_slope: f64,
) -> Result<PotentialTable> {
    if !(r_max > 0.0 && r_max.is_finite()) {
        return Err(Error::Configuration(format!(
            "r_max must be positive and finite, got {r_max}"
        )));
    }
    if n_points < 2 {
        return Err(Error::Configuration(format!(
            "potential table needs at least 2 points, got {n_points}"
        )));
    }
    if !initial_slope.is_finite() {
        return Err(Error::Configuration(format!(
            "initial slope V'(0) must be finite, got {initial_slope}"
        )));
    }
    if initial_slope != 0.0 && n_points < 3 {
        return Err(Error::Configuration(format!(
            "a nonzero initial slope needs at least 3 table points, got {n_points}"
        )));
    }

    let system = PoissonSystem::new(*params);
    let settings = IntegrationSettings::default();
    let map_solver = |e: SolverError| match e {
        SolverError::InvalidInput(msg) => Error::Configuration(msg.to_string()),
        other => Error::NumericalDivergence(other),
    };

    let mut radii;
    let mut potential = Vec::with_capacity(n_points);
    let mut derivative = Vec::with_capacity(n_points);
    if initial_slope == 0.0 {
        let solution = integrate_grid(
            &system,
            (0.0, r_max),
            &[params.v0, 0.0],
            n_points,
            settings,
        )
        .map_err(map_solver)?;
        radii = solution.points;
        for state in &solution.states {
            potential.push(state[0]);
            derivative.push(state[1]);
        }
    } else {
        // With V'(0) != 0 the damping term 2V'/r diverges at the center and
        // no solution passes through r = 0, so the condition is imposed one
        // grid spacing out instead. The first cell is bridged with a series
        // step that keeps the regular part of the acceleration.
        let spacing = r_max / (n_points - 1) as f64;
        let accel = 4.0 * std::f64::consts::PI * params.g * params.density(params.v0);
        let v1 = params.v0 + initial_slope * spacing + 0.5 * accel * spacing * spacing;
        let q1 = initial_slope + accel * spacing;
        let tail = integrate_grid(&system, (spacing, r_max), &[v1, q1], n_points - 1, settings)
            .map_err(map_solver)?;
        radii = Vec::with_capacity(n_points);
        radii.push(0.0);
        potential.push(params.v0);
        derivative.push(initial_slope);
        radii.extend_from_slice(&tail.points);
        for state in &tail.states {
            potential.push(state[0]);
            derivative.push(state[1]);
        }
    }

    Ok(PotentialTable {
        radii,
        potential,
        derivative,
    })
}

/// Boundary of the cluster: the radius where the potential crosses zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Boundary {
    pub r0: f64,
    /// Number of tabulation steps from the center to the crossing.
    pub steps_to_boundary: usize,
    /// Set when the crossing was resolved with fewer steps than the caller's
    /// threshold, meaning the interpolated r0 may carry significant error.
    /// Not fatal; callers decide whether to proceed.
    pub low_resolution: bool,
}

/// Scans the table for the first non-negative potential sample and linearly
/// interpolates the exact zero crossing.
pub fn locate_boundary(table: &PotentialTable, threshold_steps: usize) -> Result<Boundary> {
    let potential = table.potential();
    let radii = table.radii();

    if potential[0] >= 0.0 {
        return Err(Error::Configuration(
            "potential must be negative at the cluster center".into(),
        ));
    }

    let i = match potential.iter().position(|&v| v >= 0.0) {
        Some(i) => i,
        None => {
            return Err(Error::BoundaryNotFound {
                r_max: radii[radii.len() - 1],
            })
        }
    };

    let r0 = radii[i - 1]
        - potential[i - 1] * (radii[i] - radii[i - 1]) / (potential[i] - potential[i - 1]);

    let low_resolution = i < threshold_steps;
    if low_resolution {
        log::warn!(
            "boundary resolved in only {i} of {} tabulation steps (threshold {threshold_steps}); \
             reduce r_max and/or increase the table resolution",
            table.len()
        );
    }

    Ok(Boundary {
        r0,
        steps_to_boundary: i,
        low_resolution,
    })
}
