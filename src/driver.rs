use crate::comm::{Communicator, ROOT};
use crate::config::ReducedParameters;
use crate::energy::{particle_energy, tail_correction, total_pair_energy};
use crate::metropolis::{accept_move, AcceptanceTracker};
use crate::system::ParticleSystem;
use crate::tuner::adjust_displacement;
use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant};
use tracing::info;

/// Running energy bookkeeping on the coordinating rank.
///
/// `total_pair_energy` is seeded once from the full O(N^2) sum and thereafter
/// updated only by accepted deltas, never recomputed mid-run. The tail
/// correction is constant for the whole run.
#[derive(Debug, Clone, Copy)]
pub struct EnergyState {
    pub total_pair_energy: f64,
    pub tail_correction: f64,
}

/// One trial move, created and discarded every step.
#[derive(Debug, Clone, Copy)]
pub struct TrialMove {
    pub particle: usize,
    pub displacement: Vector3<f64>,
    pub current_energy: f64,
    pub proposed_energy: f64,
    pub accepted: bool,
}

impl TrialMove {
    fn placeholder() -> Self {
        Self {
            particle: 0,
            displacement: Vector3::zeros(),
            current_energy: 0.0,
            proposed_energy: 0.0,
            accepted: false,
        }
    }
}

/// Wall-clock accounting and the emitted observables of one run.
///
/// Only the coordinating rank carries meaningful energies; replicas report
/// their own timings and an empty sample list.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub total_time: Duration,
    pub energy_time: Duration,
    pub decision_time: Duration,
    /// Reduced energy per particle, one entry per reporting interval.
    pub reduced_energies: Vec<f64>,
    pub final_reduced_energy: f64,
    pub n_steps: usize,
}

impl RunSummary {
    pub fn log(&self) {
        info!(
            "Total simulation time: {:.6} s",
            self.total_time.as_secs_f64()
        );
        info!(
            "    Energy time:       {:.6} s",
            self.energy_time.as_secs_f64()
        );
        info!(
            "    Decision time:     {:.6} s",
            self.decision_time.as_secs_f64()
        );
    }
}

/// Lockstep Metropolis Monte Carlo driver.
///
/// Every member of the group constructs one `Simulation` with its own
/// communicator handle and calls [`Simulation::run`]; the fixed per-step
/// collective sequence (trial-move broadcast, configuration broadcast, two
/// energy reductions) keeps the group synchronized. Deviating from that
/// sequence on any rank stalls the whole group with no timeout.
pub struct Simulation<C: Communicator> {
    params: ReducedParameters,
    comm: C,
    system: ParticleSystem,
    rng: StdRng,
    energy: EnergyState,
    tracker: AcceptanceTracker,
    /// Flat 3N buffer reused for the per-step configuration broadcast.
    scratch: Vec<f64>,
}

impl<C: Communicator> Simulation<C> {
    /// Set up one participant.
    ///
    /// The coordinating rank must supply the initial configuration; every
    /// other rank passes `None` and receives a same-shaped buffer that the
    /// first step's broadcast fills. The seed matters only at the coordinator,
    /// which owns the run's single random stream.
    pub fn new(params: ReducedParameters, initial: Option<ParticleSystem>, seed: u64, comm: C) -> Self {
        let is_root = comm.rank() == ROOT;
        let system = if is_root {
            let system = initial.expect("coordinating rank requires an initial configuration");
            assert_eq!(
                system.n_particles(),
                params.num_particles,
                "initial configuration does not match num_particles"
            );
            system
        } else {
            ParticleSystem::empty(params.num_particles, params.box_length)
        };

        let pair_energy = if is_root {
            total_pair_energy(&system.positions, params.box_length, params.cutoff2)
        } else {
            0.0
        };
        let energy = EnergyState {
            total_pair_energy: pair_energy,
            tail_correction: tail_correction(params.box_length, params.cutoff, params.num_particles),
        };

        let scratch = vec![0.0; 3 * params.num_particles];
        Self {
            params,
            comm,
            system,
            rng: StdRng::seed_from_u64(seed),
            energy,
            tracker: AcceptanceTracker::new(),
            scratch,
        }
    }

    /// Coordinator-only: sample the trial move for this step.
    fn propose(&mut self) -> TrialMove {
        let mut mv = TrialMove::placeholder();
        if self.comm.rank() == ROOT {
            self.tracker.n_trials += 1;
            mv.particle = self.rng.gen_range(0..self.params.num_particles);
            let d_max = self.params.max_displacement;
            mv.displacement = Vector3::new(
                (2.0 * self.rng.gen::<f64>() - 1.0) * d_max,
                (2.0 * self.rng.gen::<f64>() - 1.0) * d_max,
                (2.0 * self.rng.gen::<f64>() - 1.0) * d_max,
            );
        }
        mv
    }

    /// Coordinator-only: accept or reject and commit an accepted move.
    fn decide(&mut self, mv: &mut TrialMove) {
        let delta_e = mv.proposed_energy - mv.current_energy;
        mv.accepted = accept_move(delta_e, self.params.beta, &mut self.rng);
        if mv.accepted {
            self.energy.total_pair_energy += delta_e;
            self.tracker.n_accept += 1;
            self.system.displace(mv.particle, mv.displacement);
        }
    }

    fn reduced_energy(&self) -> f64 {
        (self.energy.total_pair_energy + self.energy.tail_correction)
            / self.params.num_particles as f64
    }

    /// Run the full Monte Carlo loop.
    ///
    /// Per step, identical program order on every rank:
    /// 1. coordinator samples target index and displacement;
    /// 2. both are broadcast from the coordinator;
    /// 3. the full current configuration is broadcast, re-establishing shared
    ///    state before any energy work;
    /// 4. collective energy evaluation of the current configuration;
    /// 5. the proposed configuration is built locally (shift + re-wrap);
    /// 6. collective energy evaluation of the proposed configuration;
    /// 7. the coordinator decides and commits; replicas idle;
    /// 8. every `freq` steps the coordinator emits the reduced energy and,
    ///    if enabled, retunes the maximum displacement.
    pub fn run(&mut self) -> RunSummary {
        let run_start = Instant::now();
        let mut energy_time = Duration::ZERO;
        let mut decision_time = Duration::ZERO;
        let is_root = self.comm.rank() == ROOT;
        let mut reduced_energies = Vec::new();

        for step in 0..self.params.n_steps {
            let mut mv = self.propose();

            self.comm.broadcast_index(&mut mv.particle, ROOT);
            let mut disp = [mv.displacement.x, mv.displacement.y, mv.displacement.z];
            self.comm.broadcast(&mut disp, ROOT);
            mv.displacement = Vector3::new(disp[0], disp[1], disp[2]);

            // Re-broadcast the entire configuration even when it did not
            // change last step; this guards against silent per-rank drift and
            // is part of the protocol's consistency guarantee.
            self.system.write_flat(&mut self.scratch);
            self.comm.broadcast(&mut self.scratch, ROOT);
            if !is_root {
                self.system.read_flat(&self.scratch);
            }

            let clock = Instant::now();
            mv.current_energy = particle_energy(
                &self.system.positions,
                self.params.box_length,
                mv.particle,
                self.params.cutoff2,
                &self.comm,
            );
            energy_time += clock.elapsed();

            let mut proposed = self.system.clone();
            proposed.displace(mv.particle, mv.displacement);

            let clock = Instant::now();
            mv.proposed_energy = particle_energy(
                &proposed.positions,
                self.params.box_length,
                mv.particle,
                self.params.cutoff2,
                &self.comm,
            );
            energy_time += clock.elapsed();

            if is_root {
                let clock = Instant::now();
                self.decide(&mut mv);

                if (step + 1) % self.params.freq == 0 {
                    let reduced = self.reduced_energy();
                    info!("step {:>6}  u* = {:.8}", step + 1, reduced);
                    reduced_energies.push(reduced);

                    if self.params.tune_displacement {
                        self.params.max_displacement =
                            adjust_displacement(&mut self.tracker, self.params.max_displacement);
                    }
                }
                decision_time += clock.elapsed();
            }
        }

        RunSummary {
            total_time: run_start.elapsed(),
            energy_time,
            decision_time,
            reduced_energies,
            final_reduced_energy: if is_root { self.reduced_energy() } else { 0.0 },
            n_steps: self.params.n_steps,
        }
    }

    pub fn system(&self) -> &ParticleSystem {
        &self.system
    }

    pub fn energy(&self) -> &EnergyState {
        &self.energy
    }

    pub fn max_displacement(&self) -> f64 {
        self.params.max_displacement
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::SelfComm;
    use crate::config::McConfig;
    use approx::assert_relative_eq;

    /// Dilute parameters with a simple-cubic start, so the initial energies
    /// are O(1) and the incremental ledger comparison is not dominated by
    /// cancellation between huge overlap energies.
    fn small_params(n_steps: usize, tune: bool) -> (ReducedParameters, ParticleSystem) {
        let mut config = McConfig::default();
        config.num_particles = 24;
        config.density = 300.0;
        config.n_steps = n_steps;
        config.freq = 10;
        config.tune_displacement = tune;
        let params = config.reduced();
        let system = lattice_system(&params);
        (params, system)
    }

    fn lattice_system(params: &ReducedParameters) -> ParticleSystem {
        let n = params.num_particles;
        let n_side = (n as f64).cbrt().ceil() as usize;
        let spacing = params.box_length / n_side as f64;
        let mut positions = Vec::with_capacity(n);
        'fill: for i in 0..n_side {
            for j in 0..n_side {
                for k in 0..n_side {
                    if positions.len() == n {
                        break 'fill;
                    }
                    positions.push(Vector3::new(
                        (i as f64 + 0.5) * spacing - params.box_length / 2.0,
                        (j as f64 + 0.5) * spacing - params.box_length / 2.0,
                        (k as f64 + 0.5) * spacing - params.box_length / 2.0,
                    ));
                }
            }
        }
        ParticleSystem {
            positions,
            box_length: params.box_length,
        }
    }

    #[test]
    fn test_initial_energy_matches_reference() {
        let (params, system) = small_params(1, false);
        let reference =
            total_pair_energy(&system.positions, params.box_length, params.cutoff2);
        let sim = Simulation::new(params, Some(system), 1, SelfComm);
        assert_relative_eq!(sim.energy().total_pair_energy, reference, max_relative = 1e-12);
    }

    #[test]
    fn test_incremental_energy_ledger_stays_consistent() {
        let (params, system) = small_params(400, false);
        let mut sim = Simulation::new(params.clone(), Some(system), 3, SelfComm);
        sim.run();

        // Initial energy plus all accepted deltas must reproduce a fresh
        // full pairwise sum over the final configuration.
        let recomputed = total_pair_energy(
            &sim.system().positions,
            params.box_length,
            params.cutoff2,
        );
        assert_relative_eq!(
            sim.energy().total_pair_energy,
            recomputed,
            epsilon = 1e-8,
            max_relative = 1e-8
        );
    }

    #[test]
    fn test_positions_stay_wrapped_after_run() {
        let (params, system) = small_params(300, true);
        let half = params.box_length / 2.0;
        let mut sim = Simulation::new(params, Some(system), 5, SelfComm);
        sim.run();
        for pos in &sim.system().positions {
            for k in 0..3 {
                assert!(pos[k] >= -half && pos[k] < half);
            }
        }
    }

    #[test]
    fn test_fixed_seed_is_bit_reproducible() {
        let run = || {
            let mut config = McConfig::default();
            config.n_steps = 200;
            let params = config.reduced();
            let system = config.build_system(&params).unwrap();
            let mut sim = Simulation::new(params, Some(system), config.seed, SelfComm);
            sim.run()
        };

        let a = run();
        let b = run();
        assert_eq!(a.reduced_energies.len(), b.reduced_energies.len());
        for (x, y) in a.reduced_energies.iter().zip(&b.reduced_energies) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
        assert_eq!(
            a.final_reduced_energy.to_bits(),
            b.final_reduced_energy.to_bits()
        );
    }

    #[test]
    fn test_tuning_disabled_keeps_displacement() {
        let (params, system) = small_params(100, false);
        let d0 = params.max_displacement;
        let mut sim = Simulation::new(params, Some(system), 9, SelfComm);
        sim.run();
        assert_relative_eq!(sim.max_displacement(), d0);
    }
}
