//! Policy.
use anyhow::Result;

/// A policy on a discrete action space.
///
/// Policy is a mapping from action values to an action index.
/// The mapping can be either of deterministic or stochastic.
pub trait Policy {
    /// Chooses an action given the action values of the current observation.
    fn get_action(&mut self, q_values: &[f32]) -> Result<usize>;
}
