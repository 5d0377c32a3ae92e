//! Baseline policies driving the episode engine.

pub mod qlearn;
pub mod random;

use crate::episode::Observation;

/// Capability contract for a policy.
///
/// `observe` is the learning hook; non-learning agents keep the default
/// no-op.
pub trait Agent {
    /// Choose an action index for the current observation.
    fn act(&mut self, obs: &Observation) -> usize;

    /// Digest one transition.
    fn observe(
        &mut self,
        _obs: &Observation,
        _action: usize,
        _reward: f64,
        _next_obs: &Observation,
        _done: bool,
    ) {
    }
}
