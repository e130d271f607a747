//! Environment.
use super::Step;
use crate::critic::FactLayout;
use anyhow::Result;

/// Observation of an environment, a flat vector of features.
///
/// Symbolic facts, if any, are embedded in the vector at the positions
/// described by [`Env::fact_layout`].
pub type Obs = Vec<f32>;

/// Represents an environment with a discrete action space, typically an MDP.
pub trait Env {
    /// Configurations.
    type Config: Clone;

    /// Builds an environment with a given random seed.
    fn build(config: &Self::Config, seed: i64) -> Result<Self>
    where
        Self: Sized;

    /// Performes an environment step.
    ///
    /// An error aborts the path being collected; see
    /// [`HrlError::Environment`](crate::error::HrlError::Environment).
    fn step(&mut self, act: usize) -> Result<Step>;

    /// Resets the environment and returns the initial observation.
    fn reset(&mut self) -> Result<Obs>;

    /// Resets the environment with a given index.
    ///
    /// The index is used in an arbitrary way, e.g., as a random seed for reproducible
    /// evaluation. The default implementation ignores the index.
    fn reset_with_index(&mut self, _ix: usize) -> Result<Obs> {
        self.reset()
    }

    /// Dimension of observations.
    fn obs_dim(&self) -> usize;

    /// The number of discrete actions.
    fn n_actions(&self) -> usize;

    /// Layout of the symbolic facts embedded in observations.
    ///
    /// Environments without symbolic facts return `None`.
    fn fact_layout(&self) -> Option<FactLayout> {
        None
    }
}
