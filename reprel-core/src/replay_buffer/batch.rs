//! Transitions and batches of transitions.
use crate::Info;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// A transition `(o_t, a_t, r_t, o_t+1, terminal_t, info_t)`.
///
/// For operator buffers `reward` is the shaped reward and `is_terminated` the
/// operator-level terminal flag. For the meta-controller buffer `act` is the index
/// of the selected operator and `reward` the extrinsic reward accumulated while it ran.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Transition {
    /// Observation.
    pub obs: Vec<f32>,

    /// Action.
    pub act: usize,

    /// Reward.
    pub reward: f32,

    /// Next observation.
    pub next_obs: Vec<f32>,

    /// Terminal flag used for bootstrapping.
    pub is_terminated: bool,

    /// Additional information.
    pub info: Info,
}

impl Transition {
    /// Constructs a transition with empty info.
    pub fn new(obs: Vec<f32>, act: usize, reward: f32, next_obs: Vec<f32>, is_terminated: bool) -> Self {
        Self {
            obs,
            act,
            reward,
            next_obs,
            is_terminated,
            info: Info::new(),
        }
    }
}

/// A batch of transitions stacked column-wise.
#[derive(Clone, Debug)]
pub struct TransitionBatch {
    /// Observations, shape `[batch_size, obs_dim]`.
    pub obs: Array2<f32>,

    /// Actions.
    pub act: Vec<usize>,

    /// Rewards.
    pub reward: Vec<f32>,

    /// Next observations, shape `[batch_size, obs_dim]`.
    pub next_obs: Array2<f32>,

    /// Terminal flags.
    pub is_terminated: Vec<i8>,

    /// Indices of the sampled transitions in the buffer.
    pub ix_sample: Vec<usize>,
}

impl TransitionBatch {
    /// The number of transitions in the batch.
    pub fn len(&self) -> usize {
        self.reward.len()
    }

    /// Returns `true` if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.reward.is_empty()
    }
}
