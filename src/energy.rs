use crate::comm::{Communicator, ROOT};
use nalgebra::Vector3;

/// Unitless Lennard-Jones pair energy for a squared separation (sigma = epsilon = 1).
#[inline]
pub fn lj_pair(rij2: f64) -> f64 {
    let inv_r6 = (1.0 / rij2).powi(3);
    let inv_r12 = inv_r6 * inv_r6;
    4.0 * (inv_r12 - inv_r6)
}

/// Squared minimum-image separation between two positions in a cubic box.
#[inline]
pub fn minimum_image_distance2(r_i: Vector3<f64>, r_j: Vector3<f64>, box_length: f64) -> f64 {
    let mut rij = r_i - r_j;
    for k in 0..3 {
        rij[k] -= box_length * (rij[k] / box_length).round();
    }
    rij.norm_squared()
}

/// Interaction energy of one particle with every other, split across the group.
///
/// Each rank accumulates over the interleaved stride {rank, rank+P, ...},
/// skipping the target itself, then joins a single sum-reduction. The call is
/// collective: every rank must invoke it exactly once per evaluation, in the
/// same relative order, and the returned total is meaningful only at the
/// coordinating rank.
pub fn particle_energy<C: Communicator>(
    positions: &[Vector3<f64>],
    box_length: f64,
    i_particle: usize,
    cutoff2: f64,
    comm: &C,
) -> f64 {
    let i_position = positions[i_particle];
    let mut e_local = 0.0;

    let mut j = comm.rank();
    while j < positions.len() {
        if j != i_particle {
            let rij2 = minimum_image_distance2(i_position, positions[j], box_length);
            if rij2 < cutoff2 {
                e_local += lj_pair(rij2);
            }
        }
        j += comm.size();
    }

    comm.reduce_sum(e_local, ROOT)
}

/// Full pairwise energy by the direct O(N^2) sum, no communication.
///
/// Used once at startup to seed the incremental accumulator and in tests as
/// the reference against the distributed evaluator.
pub fn total_pair_energy(positions: &[Vector3<f64>], box_length: f64, cutoff2: f64) -> f64 {
    let mut e_total = 0.0;
    for i in 0..positions.len() {
        for j in 0..i {
            let rij2 = minimum_image_distance2(positions[i], positions[j], box_length);
            if rij2 < cutoff2 {
                e_total += lj_pair(rij2);
            }
        }
    }
    e_total
}

/// Analytic tail correction for truncating the potential at `cutoff`,
/// assuming uniform density beyond it.
pub fn tail_correction(box_length: f64, cutoff: f64, num_particles: usize) -> f64 {
    let volume = box_length.powi(3);
    let sig_by_cutoff3 = (1.0 / cutoff).powi(3);
    let sig_by_cutoff9 = sig_by_cutoff3.powi(3);
    let n = num_particles as f64;
    (sig_by_cutoff9 - 3.0 * sig_by_cutoff3) * 8.0 / 9.0 * std::f64::consts::PI * n * n / volume
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::{CommGroup, SelfComm};
    use crate::system::ParticleSystem;
    use approx::assert_relative_eq;
    use std::thread;

    /// Direct reference sum over j != i, same minimum-image rule.
    fn reference_particle_energy(
        positions: &[Vector3<f64>],
        box_length: f64,
        i_particle: usize,
        cutoff2: f64,
    ) -> f64 {
        let mut e = 0.0;
        for (j, &pos) in positions.iter().enumerate() {
            if j == i_particle {
                continue;
            }
            let rij2 = minimum_image_distance2(positions[i_particle], pos, box_length);
            if rij2 < cutoff2 {
                e += lj_pair(rij2);
            }
        }
        e
    }

    #[test]
    fn test_lj_pair_at_minimum() {
        // The LJ well sits at r = 2^(1/6) with depth -1 in reduced units.
        let r_min2 = 2.0_f64.powf(1.0 / 3.0);
        assert_relative_eq!(lj_pair(r_min2), -1.0, epsilon = 1e-12);
        // The potential crosses zero at r = 1.
        assert_relative_eq!(lj_pair(1.0), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_single_rank_matches_reference() {
        let system = ParticleSystem::random(60, 6.0, 5);
        let cutoff2 = 9.0;
        for i in [0, 17, 59] {
            let distributed =
                particle_energy(&system.positions, system.box_length, i, cutoff2, &SelfComm);
            let reference =
                reference_particle_energy(&system.positions, system.box_length, i, cutoff2);
            assert_relative_eq!(distributed, reference, max_relative = 1e-9);
        }
    }

    #[test]
    fn test_three_ranks_match_reference() {
        let system = ParticleSystem::random(50, 6.0, 9);
        let cutoff2 = 9.0;
        let i_particle = 13;
        let reference =
            reference_particle_energy(&system.positions, system.box_length, i_particle, cutoff2);

        let comms = CommGroup::new(3);
        thread::scope(|s| {
            for comm in comms {
                let positions = system.positions.clone();
                s.spawn(move || {
                    let e = particle_energy(
                        &positions,
                        system.box_length,
                        i_particle,
                        cutoff2,
                        &comm,
                    );
                    if comm.rank() == 0 {
                        assert_relative_eq!(e, reference, max_relative = 1e-9);
                    } else {
                        assert_relative_eq!(e, 0.0);
                    }
                });
            }
        });
    }

    #[test]
    fn test_translation_by_box_length_is_invariant() {
        let mut system = ParticleSystem::random(30, 5.0, 21);
        let cutoff2 = 6.25;
        let before = total_pair_energy(&system.positions, system.box_length, cutoff2);

        // Shift one particle by integer multiples of the box on each axis.
        system.positions[7] += Vector3::new(5.0, -10.0, 15.0);
        let after = total_pair_energy(&system.positions, system.box_length, cutoff2);

        assert_relative_eq!(before, after, max_relative = 1e-9);
    }

    #[test]
    fn test_two_distant_particles_have_zero_energy() {
        // Separation beyond the cutoff: no pair contribution at all.
        let positions = vec![Vector3::new(-5.0, 0.0, 0.0), Vector3::new(5.0, 0.0, 0.0)];
        let box_length = 20.0;
        let cutoff2 = 9.0;

        assert_relative_eq!(total_pair_energy(&positions, box_length, cutoff2), 0.0);
        assert_relative_eq!(
            particle_energy(&positions, box_length, 0, cutoff2, &SelfComm),
            0.0
        );
    }

    #[test]
    fn test_tail_correction_closed_form() {
        let box_length: f64 = 20.0;
        let cutoff: f64 = 3.0;
        let n = 2;

        let volume = box_length.powi(3);
        let expected = 8.0 / 9.0 * std::f64::consts::PI * (n as f64).powi(2) / volume
            * (cutoff.powi(-9) - 3.0 * cutoff.powi(-3));

        assert_relative_eq!(
            tail_correction(box_length, cutoff, n),
            expected,
            max_relative = 1e-12
        );
    }
}
