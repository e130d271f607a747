//! Symbolic planner.
use std::collections::HashMap;

/// An external symbolic planner, which decomposes a task into a sequence of operators.
///
/// The planner is consulted at every step of a rollout in
/// [`PlannerPathCollector`](crate::collector::PlannerPathCollector).
pub trait Planner {
    /// Returns the ordered set of operators the planner may produce.
    fn operators(&self) -> Vec<String>;

    /// Returns `(observation_dim, action_dim)` for each operator.
    fn dims(&self) -> HashMap<String, (usize, usize)>;

    /// Replans from the initial observation of an episode.
    fn reset(&mut self, obs: &[f32]);

    /// Returns the operator applicable in the given observation, or `None`
    /// when the overall task is solved.
    fn current_operator(&mut self, obs: &[f32]) -> Option<String>;

    /// Maps an observation to the input of the given operator's value function.
    fn abstract_obs(&self, _operator: &str, obs: &[f32]) -> Vec<f32> {
        obs.to_vec()
    }
}
