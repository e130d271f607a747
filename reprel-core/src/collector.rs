//! Path collectors, the rollout engines of training.
//!
//! A path collector drives an environment with the value functions of an
//! [`OperatorBank`] and returns [`Path`]s. It never writes into replay buffers itself;
//! the [`Algorithm`](crate::algorithm::Algorithm) pushes exploration paths into the bank
//! with [`Path::push_into`] and only summarizes evaluation paths.
//!
//! * [`HrlPathCollector`] - operators chosen by the meta-controller, terminated by an
//!   [`IntrinsicCritic`](crate::critic::IntrinsicCritic).
//! * [`PlannerPathCollector`] - operators chosen by a [`Planner`](crate::Planner) at every step.
//! * [`FlatPathCollector`] - a single operator acting on the raw environment reward.
mod flat;
mod hrl;
mod path;
mod planner;
mod stats;
pub use flat::FlatPathCollector;
pub use hrl::HrlPathCollector;
pub use path::{Path, PathStep, TerminationReason};
pub(crate) use path::collect_paths;
pub use planner::PlannerPathCollector;
pub use stats::PathStatistics;

use crate::{exploration::Explorer, operator::OperatorBank, record::Record, ValueFunction};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Persisted exploration state of a path collector.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ExplorationState {
    /// Explorer of the low-level actions.
    pub explorer: Explorer,

    /// Explorer of the meta-controller, if any.
    pub meta_explorer: Option<Explorer>,
}

/// Collects paths with the value functions of an operator bank.
pub trait PathCollector<Q: ValueFunction> {
    /// Checks that the bank fits the environment and the operator source of the collector.
    fn validate(&self, bank: &OperatorBank<Q>) -> Result<()>;

    /// Collects paths totalling at most `num_steps` environment steps.
    ///
    /// An environment error aborts the current path, which is returned with
    /// [`TerminationReason::Aborted`] as the last element.
    fn collect_new_paths(
        &mut self,
        bank: &OperatorBank<Q>,
        max_path_length: usize,
        num_steps: usize,
        discard_incomplete_paths: bool,
    ) -> Result<Vec<Path>>;

    /// Called at the end of every epoch.
    fn end_epoch(&mut self, epoch: usize);

    /// Statistics of the paths collected in the current epoch.
    fn diagnostics(&self) -> Record;

    /// Returns the exploration state.
    fn exploration_state(&self) -> ExplorationState;

    /// Restores the exploration state.
    fn restore_exploration_state(&mut self, state: ExplorationState);
}
