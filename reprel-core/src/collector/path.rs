//! Rollout trajectories.
use crate::{
    operator::{OperatorBank, OperatorKey},
    replay_buffer::Transition,
    ExperienceBufferBase, ValueFunction,
};
use anyhow::Result;

/// Why a path ended.
#[derive(Clone, Debug, PartialEq)]
pub enum TerminationReason {
    /// The environment signaled a terminal state.
    EnvTerminal,

    /// The environment truncated the episode.
    EnvTruncated,

    /// The path reached its maximum length.
    MaxPathLength,

    /// The planner found the overall task solved.
    TaskSolved,

    /// The environment raised an error. The message is kept for reporting.
    Aborted(String),
}

/// One environment step of a path, labeled with the operator that acted.
#[derive(Clone, Debug)]
pub struct PathStep {
    /// Operator active at this step.
    pub operator: OperatorKey,

    /// Transition recorded for the operator.
    pub transition: Transition,

    /// The operator reached its sub-goal on this step.
    pub operator_terminal: bool,
}

/// A rollout from reset to termination.
#[derive(Clone, Debug)]
pub struct Path {
    /// Low-level steps in order.
    pub steps: Vec<PathStep>,

    /// Transitions of the meta-controller, whose actions are operator indices.
    pub meta_transitions: Vec<Transition>,

    /// Sum of the extrinsic rewards.
    pub total_return: f32,

    /// Why the path ended.
    pub termination: TerminationReason,
}

impl Path {
    pub(crate) fn new() -> Self {
        Self {
            steps: vec![],
            meta_transitions: vec![],
            total_return: 0.0,
            termination: TerminationReason::MaxPathLength,
        }
    }

    /// The number of environment steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` if the path has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns `true` if the path was aborted by an environment error.
    pub fn is_aborted(&self) -> bool {
        matches!(self.termination, TerminationReason::Aborted(_))
    }

    /// Returns `true` unless the path was cut by the step budget before `max_path_length`.
    pub fn is_complete(&self, max_path_length: usize) -> bool {
        match self.termination {
            TerminationReason::MaxPathLength => self.len() == max_path_length,
            TerminationReason::Aborted(_) => false,
            _ => true,
        }
    }

    /// Labels of the operators in order of the steps.
    pub fn operator_labels(&self) -> Vec<OperatorKey> {
        self.steps.iter().map(|s| s.operator).collect()
    }

    /// Counts sub-goal completions per operator index.
    pub fn completions(&self, n_operators: usize) -> Vec<usize> {
        let mut counts = vec![0; n_operators];
        for step in self.steps.iter().filter(|s| s.operator_terminal) {
            if let OperatorKey::Operator(i) = step.operator {
                if i < n_operators {
                    counts[i] += 1;
                }
            }
        }
        counts
    }

    /// Pushes the transitions of the path into the buffers of the bank.
    ///
    /// Low-level transitions go to the buffer of their operator, meta transitions to
    /// the buffer of the meta-controller.
    pub fn push_into<Q: ValueFunction>(&self, bank: &mut OperatorBank<Q>) -> Result<()> {
        for step in self.steps.iter() {
            bank.slot_mut(step.operator)?
                .buffer_mut()
                .push(step.transition.clone())?;
        }
        if !self.meta_transitions.is_empty() {
            let meta = bank.slot_mut(OperatorKey::MetaController)?;
            for tr in self.meta_transitions.iter() {
                meta.buffer_mut().push(tr.clone())?;
            }
        }
        Ok(())
    }
}

/// Runs rollouts until `num_steps` environment steps are collected.
///
/// Each rollout gets at most `min(max_path_length, remaining steps)` steps.
/// If `discard_incomplete_paths` is `true`, a path cut short by the remaining budget is
/// dropped and collection stops. An aborted path is always returned and stops collection.
pub(crate) fn collect_paths<F>(
    max_path_length: usize,
    num_steps: usize,
    discard_incomplete_paths: bool,
    mut rollout: F,
) -> Result<Vec<Path>>
where
    F: FnMut(usize) -> Result<Path>,
{
    let mut paths = vec![];
    let mut num_steps_collected = 0;

    while num_steps_collected < num_steps {
        let max_len = max_path_length.min(num_steps - num_steps_collected);
        let path = rollout(max_len)?;

        if path.is_aborted() {
            paths.push(path);
            break;
        }
        if discard_incomplete_paths && !path.is_complete(max_path_length) {
            break;
        }
        if path.is_empty() {
            // A rollout without steps would never exhaust the budget.
            paths.push(path);
            break;
        }
        num_steps_collected += path.len();
        paths.push(path);
    }

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(len: usize, termination: TerminationReason) -> Path {
        let mut p = Path::new();
        for i in 0..len {
            p.steps.push(PathStep {
                operator: OperatorKey::Operator(i % 2),
                transition: Transition::new(vec![0.], 0, 1., vec![0.], false),
                operator_terminal: i == 0,
            });
        }
        p.total_return = len as f32;
        p.termination = termination;
        p
    }

    #[test]
    fn test_last_path_truncated_to_budget() -> Result<()> {
        let mut requested = vec![];
        let paths = collect_paths(4, 10, false, |max_len| {
            requested.push(max_len);
            Ok(path(max_len, TerminationReason::MaxPathLength))
        })?;
        assert_eq!(requested, vec![4, 4, 2]);
        assert_eq!(paths.iter().map(|p| p.len()).sum::<usize>(), 10);
        Ok(())
    }

    #[test]
    fn test_discard_incomplete() -> Result<()> {
        let paths = collect_paths(4, 10, true, |max_len| {
            Ok(path(max_len, TerminationReason::MaxPathLength))
        })?;
        assert_eq!(paths.len(), 2);

        let paths = collect_paths(4, 10, true, |max_len| {
            Ok(path(max_len.min(3), TerminationReason::EnvTerminal))
        })?;
        assert_eq!(paths.iter().map(|p| p.len()).sum::<usize>(), 10);
        Ok(())
    }

    #[test]
    fn test_aborted_path_stops_collection() -> Result<()> {
        let mut n = 0;
        let paths = collect_paths(4, 100, true, |_| {
            n += 1;
            match n {
                1 => Ok(path(4, TerminationReason::MaxPathLength)),
                _ => Ok(path(1, TerminationReason::Aborted("boom".into()))),
            }
        })?;
        assert_eq!(paths.len(), 2);
        assert!(paths[1].is_aborted());
        Ok(())
    }

    #[test]
    fn test_completions() {
        let p = path(3, TerminationReason::EnvTerminal);
        assert_eq!(p.completions(2), vec![1, 0]);
        assert_eq!(
            p.operator_labels(),
            vec![
                OperatorKey::Operator(0),
                OperatorKey::Operator(1),
                OperatorKey::Operator(0)
            ]
        );
    }
}
