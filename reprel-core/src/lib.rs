#![warn(missing_docs)]
//! Hierarchical reinforcement learning with operators.
//!
//! An [`OperatorBank`](operator::OperatorBank) holds one value function, target value
//! function and replay buffer per operator, plus an optional meta-controller choosing
//! among the operators. Path collectors drive an environment with the bank, the
//! [`Trainer`](trainer::Trainer) updates every operator independently and the
//! [`Algorithm`](algorithm::Algorithm) runs the epochs.
pub mod algorithm;
pub mod collector;
pub mod critic;
pub mod dummy;
pub mod error;
pub mod exploration;
pub mod operator;
pub mod policy;
pub mod record;
pub mod replay_buffer;
pub mod snapshot;
pub mod trainer;
pub mod transfer;

mod base;
pub use base::{
    Env, ExperienceBufferBase, Info, Obs, Planner, Policy, ReplayBufferBase, Step, ValueFunction,
};
