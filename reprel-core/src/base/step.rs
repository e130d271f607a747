//! Environment step.
use super::Obs;
use std::collections::HashMap;

/// Additional information returned by an environment step.
pub type Info = HashMap<String, f32>;

/// Represents the outcome `(o_t+1, r_t, terminated, truncated, info)` of applying
/// an action to an environment.
#[derive(Clone, Debug)]
pub struct Step {
    /// Next observation.
    pub obs: Obs,

    /// Extrinsic reward.
    pub reward: f32,

    /// Flag denoting if episode is terminated.
    pub is_terminated: bool,

    /// Flag denoting if episode is truncated.
    pub is_truncated: bool,

    /// Information defined by the environment.
    pub info: Info,
}

impl Step {
    /// Constructs a [`Step`] object with empty info.
    pub fn new(obs: Obs, reward: f32, is_terminated: bool, is_truncated: bool) -> Self {
        Step {
            obs,
            reward,
            is_terminated,
            is_truncated,
            info: Info::new(),
        }
    }

    #[inline]
    /// Terminated or truncated.
    pub fn is_done(&self) -> bool {
        self.is_terminated || self.is_truncated
    }
}
