//! Configuration of [SimpleReplayBuffer](super::SimpleReplayBuffer).
use serde::{Deserialize, Serialize};
use std::default::Default;

/// Configuration of [SimpleReplayBuffer](super::SimpleReplayBuffer).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct SimpleReplayBufferConfig {
    pub(super) capacity: usize,
    pub(super) obs_dim: usize,
    pub(super) n_actions: usize,
    pub(super) seed: u64,
}

impl Default for SimpleReplayBufferConfig {
    fn default() -> Self {
        Self {
            capacity: 10000,
            obs_dim: 0,
            n_actions: 0,
            seed: 42,
        }
    }
}

impl SimpleReplayBufferConfig {
    /// Sets the capacity of the replay buffer.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the dimension of observations.
    pub fn obs_dim(mut self, obs_dim: usize) -> Self {
        self.obs_dim = obs_dim;
        self
    }

    /// Sets the number of actions.
    pub fn n_actions(mut self, n_actions: usize) -> Self {
        self.n_actions = n_actions;
        self
    }

    /// Sets the random seed for sampling.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Returns the capacity.
    pub fn get_capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the random seed.
    pub fn get_seed(&self) -> u64 {
        self.seed
    }
}
