//! Simple circular replay buffer.
use super::{SimpleReplayBufferConfig, Transition, TransitionBatch};
use crate::{error::HrlError, ExperienceBufferBase, Info, ReplayBufferBase};
use anyhow::Result;
use ndarray::{Array2, Axis};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// A fixed-capacity replay buffer of transitions.
///
/// Transitions are written at the cursor `i`, which advances modulo the capacity,
/// so the oldest transition is overwritten once the buffer is full.
/// `size` is `min(number of pushed transitions, capacity)`.
pub struct SimpleReplayBuffer {
    capacity: usize,
    obs_dim: usize,
    n_actions: usize,
    i: usize,
    size: usize,
    obs: Array2<f32>,
    act: Vec<usize>,
    reward: Vec<f32>,
    next_obs: Array2<f32>,
    is_terminated: Vec<i8>,
    info: Vec<Info>,
    rng: StdRng,

    // Label attached to errors raised by this buffer.
    name: String,
}

/// Contents of a [`SimpleReplayBuffer`] in chronological order, used in snapshots.
#[derive(Debug, Deserialize, Serialize)]
pub struct ReplayBufferState {
    /// Configuration of the buffer.
    pub config: SimpleReplayBufferConfig,

    /// Stored transitions, oldest first.
    pub transitions: Vec<Transition>,
}

impl SimpleReplayBuffer {
    /// Sets the name used in error messages, typically the operator identifier.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Capacity of the buffer.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Index at which the next transition will be written.
    pub fn top(&self) -> usize {
        self.i
    }

    /// Dimension of observations.
    pub fn obs_dim(&self) -> usize {
        self.obs_dim
    }

    /// The number of actions.
    pub fn n_actions(&self) -> usize {
        self.n_actions
    }

    /// Returns the transition stored at slot `ix`.
    pub fn get(&self, ix: usize) -> Option<Transition> {
        if ix >= self.size {
            return None;
        }
        Some(Transition {
            obs: self.obs.row(ix).to_vec(),
            act: self.act[ix],
            reward: self.reward[ix],
            next_obs: self.next_obs.row(ix).to_vec(),
            is_terminated: self.is_terminated[ix] == 1,
            info: self.info[ix].clone(),
        })
    }

    /// Returns the stored transitions, oldest first.
    pub fn transitions(&self) -> Vec<Transition> {
        let ixs: Vec<usize> = if self.size < self.capacity {
            (0..self.size).collect()
        } else {
            (self.i..self.capacity).chain(0..self.i).collect()
        };
        ixs.into_iter().filter_map(|ix| self.get(ix)).collect()
    }

    /// Returns the sum of all rewards in the buffer.
    pub fn sum_rewards(&self) -> f32 {
        self.reward[..self.size].iter().sum()
    }

    /// Returns the number of terminal flags in the buffer.
    pub fn num_terminated_flags(&self) -> usize {
        self.is_terminated[..self.size]
            .iter()
            .map(|&d| d as usize)
            .sum()
    }

    /// Returns the contents of the buffer for serialization.
    pub fn state(&self, config: &SimpleReplayBufferConfig) -> ReplayBufferState {
        ReplayBufferState {
            config: config.clone(),
            transitions: self.transitions(),
        }
    }

    /// Rebuilds a buffer from serialized contents.
    pub fn from_state(state: ReplayBufferState) -> Result<Self> {
        let mut buffer = Self::build(&state.config);
        for tr in state.transitions.into_iter() {
            buffer.push(tr)?;
        }
        Ok(buffer)
    }

    fn check(&self, tr: &Transition) -> Result<()> {
        if tr.obs.len() != self.obs_dim || tr.next_obs.len() != self.obs_dim {
            return Err(HrlError::Configuration(format!(
                "observation of dimension {} pushed into buffer {:?} of dimension {}",
                tr.obs.len(),
                self.name,
                self.obs_dim
            ))
            .into());
        }
        if tr.act >= self.n_actions {
            return Err(HrlError::Configuration(format!(
                "action {} pushed into buffer {:?} with {} actions",
                tr.act, self.name, self.n_actions
            ))
            .into());
        }
        Ok(())
    }
}

impl ExperienceBufferBase for SimpleReplayBuffer {
    type Item = Transition;

    fn len(&self) -> usize {
        self.size
    }

    fn push(&mut self, tr: Self::Item) -> Result<()> {
        self.check(&tr)?;
        let i = self.i;
        self.obs
            .row_mut(i)
            .assign(&ndarray::ArrayView1::from(tr.obs.as_slice()));
        self.next_obs
            .row_mut(i)
            .assign(&ndarray::ArrayView1::from(tr.next_obs.as_slice()));
        self.act[i] = tr.act;
        self.reward[i] = tr.reward;
        self.is_terminated[i] = tr.is_terminated as i8;
        self.info[i] = tr.info;

        self.i = (self.i + 1) % self.capacity;
        if self.size < self.capacity {
            self.size += 1;
        }

        Ok(())
    }
}

impl ReplayBufferBase for SimpleReplayBuffer {
    type Config = SimpleReplayBufferConfig;
    type Batch = TransitionBatch;

    fn build(config: &Self::Config) -> Self {
        let capacity = config.capacity.max(1);
        let obs_dim = config.obs_dim;

        Self {
            capacity,
            obs_dim,
            n_actions: config.n_actions,
            i: 0,
            size: 0,
            obs: Array2::zeros((capacity, obs_dim)),
            act: vec![0; capacity],
            reward: vec![0.; capacity],
            next_obs: Array2::zeros((capacity, obs_dim)),
            is_terminated: vec![0; capacity],
            info: vec![Info::new(); capacity],
            rng: StdRng::seed_from_u64(config.seed),
            name: String::new(),
        }
    }

    fn batch(&mut self, size: usize) -> Result<Self::Batch> {
        if self.size < size {
            return Err(HrlError::InsufficientData {
                operator: self.name.clone(),
                requested: size,
                available: self.size,
            }
            .into());
        }

        let ixs = (0..size)
            .map(|_| self.rng.gen_range(0..self.size))
            .collect::<Vec<_>>();

        Ok(TransitionBatch {
            obs: self.obs.select(Axis(0), &ixs),
            act: ixs.iter().map(|&ix| self.act[ix]).collect(),
            reward: ixs.iter().map(|&ix| self.reward[ix]).collect(),
            next_obs: self.next_obs.select(Axis(0), &ixs),
            is_terminated: ixs.iter().map(|&ix| self.is_terminated[ix]).collect(),
            ix_sample: ixs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(capacity: usize) -> SimpleReplayBufferConfig {
        SimpleReplayBufferConfig::default()
            .capacity(capacity)
            .obs_dim(2)
            .n_actions(3)
    }

    fn tr(k: usize) -> Transition {
        let x = k as f32;
        Transition::new(vec![x, -x], k % 3, x, vec![x + 1., -x - 1.], k % 2 == 0)
    }

    #[test]
    fn test_overwrites_oldest_first() -> Result<()> {
        let mut buffer = SimpleReplayBuffer::build(&config(5));
        for k in 0..12 {
            buffer.push(tr(k))?;
        }
        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer.top(), 12 % 5);
        let rewards: Vec<f32> = buffer.transitions().iter().map(|t| t.reward).collect();
        assert_eq!(rewards, vec![7., 8., 9., 10., 11.]);
        Ok(())
    }

    #[test]
    fn test_size_before_full() -> Result<()> {
        let mut buffer = SimpleReplayBuffer::build(&config(10));
        for k in 0..4 {
            buffer.push(tr(k))?;
        }
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.transitions(), (0..4).map(tr).collect::<Vec<_>>());
        Ok(())
    }

    #[test]
    fn test_batch_shapes() -> Result<()> {
        let mut buffer = SimpleReplayBuffer::build(&config(10));
        for k in 0..6 {
            buffer.push(tr(k))?;
        }
        let batch = buffer.batch(6)?;
        assert_eq!(batch.len(), 6);
        assert_eq!(batch.obs.shape(), &[6, 2]);
        assert_eq!(batch.next_obs.shape(), &[6, 2]);
        assert_eq!(batch.act.len(), 6);
        assert_eq!(batch.is_terminated.len(), 6);
        for (row, &ix) in batch.ix_sample.iter().enumerate() {
            assert!(ix < 6);
            assert_eq!(batch.obs[[row, 0]], ix as f32);
            assert_eq!(batch.reward[row], ix as f32);
            assert!(batch.act[row] < 3);
        }
        Ok(())
    }

    #[test]
    fn test_batch_insufficient_data() -> Result<()> {
        let mut buffer = SimpleReplayBuffer::build(&config(10)).with_name("get_mail");
        for k in 0..3 {
            buffer.push(tr(k))?;
        }
        let err = buffer.batch(4).unwrap_err();
        assert_eq!(
            err.downcast_ref::<HrlError>(),
            Some(&HrlError::InsufficientData {
                operator: "get_mail".to_string(),
                requested: 4,
                available: 3
            })
        );
        Ok(())
    }

    #[test]
    fn test_rejects_mismatched_dims() {
        let mut buffer = SimpleReplayBuffer::build(&config(10));
        let bad_obs = Transition::new(vec![0.; 3], 0, 0., vec![0.; 3], false);
        assert!(buffer.push(bad_obs).is_err());
        let bad_act = Transition::new(vec![0.; 2], 3, 0., vec![0.; 2], false);
        assert!(buffer.push(bad_act).is_err());
        assert_eq!(buffer.len(), 0);
    }

    #[test]
    fn test_state_roundtrip_keeps_order() -> Result<()> {
        let config = config(4);
        let mut buffer = SimpleReplayBuffer::build(&config);
        for k in 0..7 {
            buffer.push(tr(k))?;
        }
        let restored = SimpleReplayBuffer::from_state(buffer.state(&config))?;
        assert_eq!(restored.transitions(), buffer.transitions());
        Ok(())
    }
}
