use crate::metropolis::AcceptanceTracker;

/// Acceptance-rate band the tuner steers toward.
const RATE_LOW: f64 = 0.38;
const RATE_HIGH: f64 = 0.42;
const SHRINK: f64 = 0.8;
const GROW: f64 = 1.2;

/// Adjust the maximum trial displacement from the observed acceptance rate.
///
/// Below the band the step is too bold and the displacement shrinks; above it
/// the step is too timid and the displacement grows. Metropolis sampling is
/// most efficient near ~40% acceptance, which the band brackets. The counters
/// are reset on every invocation regardless of which branch fired.
///
/// Calling this with zero trials is a caller error and panics.
pub fn adjust_displacement(tracker: &mut AcceptanceTracker, max_displacement: f64) -> f64 {
    let rate = tracker.acceptance_rate();
    let adjusted = if rate < RATE_LOW {
        max_displacement * SHRINK
    } else if rate > RATE_HIGH {
        max_displacement * GROW
    } else {
        max_displacement
    };
    tracker.reset();
    adjusted
}
