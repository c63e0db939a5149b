use crate::sampler::{IsotropicAngles, PhaseSamples};
use nalgebra::Vector3;

/// One star in Cartesian coordinates, ready for storage and direct use by
/// the n-body solvers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
}

/// Maps spherical coordinates (radius, polar, azimuthal) to Cartesian.
pub fn spherical_to_cartesian(r: f64, polar: f64, azimuthal: f64) -> Vector3<f64> {
    Vector3::new(
        r * polar.sin() * azimuthal.cos(),
        r * polar.sin() * azimuthal.sin(),
        r * polar.cos(),
    )
}

/// Combines the (radius, speed) samples with their direction angles into an
/// array of Cartesian particle records. Sampling naturally produces a struct
/// of arrays; the solvers want an array of structs with x, y, z together.
pub fn assemble_particles(samples: &PhaseSamples, angles: &IsotropicAngles) -> Vec<Particle> {
    let n = samples.len();
    debug_assert_eq!(angles.position_polar.len(), n);
    debug_assert_eq!(angles.velocity_polar.len(), n);

    (0..n)
        .map(|i| Particle {
            position: spherical_to_cartesian(
                samples.radii[i],
                angles.position_polar[i],
                angles.position_azimuthal[i],
            ),
            velocity: spherical_to_cartesian(
                samples.speeds[i],
                angles.velocity_polar[i],
                angles.velocity_azimuthal[i],
            ),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{assemble_particles, spherical_to_cartesian};
    use crate::sampler::{IsotropicAngles, PhaseSamples};
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn axes_map_to_the_expected_directions() {
        let north = spherical_to_cartesian(2.0, 0.0, 0.0);
        assert!((north.x).abs() < 1e-15);
        assert!((north.y).abs() < 1e-15);
        assert!((north.z - 2.0).abs() < 1e-15);

        let x_axis = spherical_to_cartesian(1.0, FRAC_PI_2, 0.0);
        assert!((x_axis.x - 1.0).abs() < 1e-15);
        assert!((x_axis.y).abs() < 1e-15);
        assert!((x_axis.z).abs() < 1e-12);

        let y_axis = spherical_to_cartesian(1.0, FRAC_PI_2, FRAC_PI_2);
        assert!((y_axis.x).abs() < 1e-12);
        assert!((y_axis.y - 1.0).abs() < 1e-15);
    }

    #[test]
    fn radius_survives_the_round_trip() {
        for (r, polar, azimuthal) in [
            (0.5, 0.3, 1.1),
            (3.0, 2.9, 4.0),
            (1e-3, PI / 3.0, 5.5),
            (7.7, 1.0, 0.0),
        ] {
            let v = spherical_to_cartesian(r, polar, azimuthal);
            assert!((v.norm() - r).abs() < 1e-12 * r.max(1.0));
            // And the angles reconstruct too.
            assert!(((v.z / v.norm()).acos() - polar).abs() < 1e-12);
        }
    }

    #[test]
    fn assembly_pairs_samples_with_their_angles() {
        let samples = PhaseSamples {
            radii: vec![1.0, 2.0],
            speeds: vec![0.5, 0.25],
            attempts: 4,
        };
        let angles = IsotropicAngles {
            position_polar: vec![FRAC_PI_2, 0.0],
            velocity_polar: vec![0.0, FRAC_PI_2],
            position_azimuthal: vec![0.0, 1.0],
            velocity_azimuthal: vec![2.0, 0.0],
        };
        let particles = assemble_particles(&samples, &angles);
        assert_eq!(particles.len(), 2);
        assert!((particles[0].position.norm() - 1.0).abs() < 1e-12);
        assert!((particles[0].velocity.z - 0.5).abs() < 1e-12);
        assert!((particles[1].position.z - 2.0).abs() < 1e-12);
        assert!((particles[1].velocity.x - 0.25).abs() < 1e-12);
    }
}
