//! Parallel Metropolis Monte Carlo of a Lennard-Jones fluid.
//!
//! The per-step energy evaluation is partitioned across a fixed group of
//! cooperating participants and combined by a sum-reduction; the coordinating
//! rank owns the configuration, the random stream, and the accept/reject
//! decision, and re-broadcasts its state to the group every step.

pub mod comm;
pub mod config;
pub mod driver;
pub mod energy;
pub mod metropolis;
pub mod system;
pub mod tuner;

pub use comm::{CommGroup, Communicator, SelfComm, ThreadComm, ROOT};
pub use config::{InitialState, McConfig, ReducedParameters};
pub use driver::{EnergyState, RunSummary, Simulation, TrialMove};
pub use metropolis::AcceptanceTracker;
pub use system::ParticleSystem;
