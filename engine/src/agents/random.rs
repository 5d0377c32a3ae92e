//! Uniform random policy.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::agents::Agent;
use crate::episode::Observation;

pub struct RandomAgent {
    rng: StdRng,
}

impl RandomAgent {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Agent for RandomAgent {
    fn act(&mut self, obs: &Observation) -> usize {
        self.rng.gen_range(0..obs.action_size)
    }
}
