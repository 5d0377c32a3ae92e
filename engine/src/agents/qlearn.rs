//! Tabular Q-learning over a coarse bucketing of the observation.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::agents::Agent;
use crate::episode::Observation;

/// Q-learning hyperparameters.
#[derive(Debug, Clone, Copy)]
pub struct QLearnConfig {
    /// Learning rate.
    pub alpha: f64,
    /// Discount factor.
    pub gamma: f64,
    /// Exploration probability.
    pub epsilon: f64,
    pub seed: u64,
}

impl Default for QLearnConfig {
    fn default() -> Self {
        Self {
            alpha: 0.2,
            gamma: 0.95,
            epsilon: 0.2,
            seed: 0,
        }
    }
}

/// (best-pass bucket, steps-left bucket, tool-calls bucket)
type StateKey = (u8, u8, u8);

pub struct QLearningAgent {
    action_size: usize,
    config: QLearnConfig,
    rng: StdRng,
    q: HashMap<StateKey, Vec<f64>>,
    prev: Option<(StateKey, usize)>,
}

fn pass_bucket(rate: f64) -> u8 {
    if rate >= 0.999 {
        3
    } else if rate >= 0.66 {
        2
    } else if rate >= 0.33 {
        1
    } else {
        0
    }
}

fn state_key(obs: &Observation) -> StateKey {
    let best = pass_bucket(obs.best_pass_rate);
    let steps_left = obs.max_steps.saturating_sub(obs.step);
    let steps_bucket = if steps_left >= 6 {
        2
    } else if steps_left >= 3 {
        1
    } else {
        0
    };
    let tool_bucket = if obs.tool_calls >= 6 {
        2
    } else if obs.tool_calls >= 3 {
        1
    } else {
        0
    };
    (best, steps_bucket, tool_bucket)
}

impl QLearningAgent {
    pub fn new(action_size: usize, config: QLearnConfig) -> Self {
        Self {
            action_size,
            config,
            rng: StdRng::seed_from_u64(config.seed),
            q: HashMap::new(),
            prev: None,
        }
    }

    fn row(&mut self, key: StateKey) -> &mut Vec<f64> {
        let action_size = self.action_size;
        self.q.entry(key).or_insert_with(|| vec![0.0; action_size])
    }

    fn greedy(&mut self, key: StateKey) -> usize {
        let row = self.row(key);
        (0..row.len())
            .max_by(|a, b| row[*a].total_cmp(&row[*b]))
            .unwrap_or(0)
    }
}

impl Agent for QLearningAgent {
    fn act(&mut self, obs: &Observation) -> usize {
        let key = state_key(obs);
        let action = if self.rng.gen_range(0.0..1.0) < self.config.epsilon {
            self.rng.gen_range(0..self.action_size)
        } else {
            self.greedy(key)
        };
        self.prev = Some((key, action));
        action
    }

    fn observe(
        &mut self,
        _obs: &Observation,
        _action: usize,
        reward: f64,
        next_obs: &Observation,
        done: bool,
    ) {
        let Some((key, action)) = self.prev else {
            return;
        };
        let next_key = state_key(next_obs);
        let max_next = self
            .row(next_key)
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        let target = reward + if done { 0.0 } else { self.config.gamma * max_next };
        let alpha = self.config.alpha;
        let row = self.row(key);
        row[action] = (1.0 - alpha) * row[action] + alpha * target;
        if done {
            self.prev = None;
        }
    }
}
