use rand::rngs::StdRng;
use rand::Rng;

/// Counters for trial moves since the last tuning pass.
///
/// `n_trials` is bumped once per step before the decision; `n_accept` only on
/// acceptance. Both are reset by the displacement tuner.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptanceTracker {
    pub n_trials: u64,
    pub n_accept: u64,
}

impl AcceptanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.n_trials = 0;
        self.n_accept = 0;
    }

    /// Fraction of trials accepted. Caller must guarantee n_trials > 0.
    pub fn acceptance_rate(&self) -> f64 {
        assert!(self.n_trials > 0, "acceptance rate requires at least one trial");
        self.n_accept as f64 / self.n_trials as f64
    }
}

/// Metropolis acceptance criterion.
///
/// Downhill moves are accepted unconditionally; uphill moves are accepted
/// with probability exp(-beta * delta_e). When the exponential underflows to
/// zero the draw u in [0, 1) can never fall below it, so the move is
/// rejected without any special-casing.
pub fn accept_move(delta_e: f64, beta: f64, rng: &mut StdRng) -> bool {
    if delta_e < 0.0 {
        true
    } else {
        rng.gen::<f64>() < (-beta * delta_e).exp()
    }
}
