//! Per-operator circular replay buffer.
mod base;
mod batch;
mod config;
pub use base::{ReplayBufferState, SimpleReplayBuffer};
pub use batch::{Transition, TransitionBatch};
pub use config::SimpleReplayBufferConfig;
