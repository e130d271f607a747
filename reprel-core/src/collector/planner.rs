use super::{collect_paths, ExplorationState, Path, PathCollector, PathStatistics, PathStep, TerminationReason};
use crate::{
    error::HrlError,
    exploration::{ExplorationStrategy, Explorer},
    operator::OperatorBank,
    policy::ArgmaxDiscretePolicy,
    record::{Record, RecordValue},
    replay_buffer::Transition,
    Env, Planner, Policy, ValueFunction,
};
use anyhow::Result;
use log::{debug, warn};
use rand::{rngs::StdRng, SeedableRng};

/// Collects paths with operators chosen by a symbolic planner.
///
/// The planner is consulted on every observation. An operator's transition is terminal
/// when the planner moves on to a different operator on the next observation, or when the
/// environment terminates. When the planner reports the task solved, `task_terminal_reward`
/// is added to the reward of the last transition and the path ends.
///
/// Operators see observations through [`Planner::abstract_obs`]. There is no meta-controller.
pub struct PlannerPathCollector<E, P> {
    env: E,
    planner: P,
    policy: ArgmaxDiscretePolicy,
    explorer: Explorer,
    rng: StdRng,
    task_terminal_reward: f32,
    stats: PathStatistics,
}

impl<E, P> PlannerPathCollector<E, P>
where
    E: Env,
    P: Planner,
{
    /// Constructs a greedy collector without task terminal reward.
    pub fn new(env: E, planner: P, seed: u64) -> Self {
        Self {
            env,
            planner,
            policy: ArgmaxDiscretePolicy::new(seed),
            explorer: Explorer::Greedy,
            rng: StdRng::seed_from_u64(seed.wrapping_add(1)),
            task_terminal_reward: 0.0,
            stats: PathStatistics::default(),
        }
    }

    /// Sets the explorer of the low-level actions.
    pub fn explorer(mut self, explorer: Explorer) -> Self {
        self.explorer = explorer;
        self
    }

    /// Sets the reward added when the task is solved.
    pub fn task_terminal_reward(mut self, v: f32) -> Self {
        self.task_terminal_reward = v;
        self
    }

    /// The planner.
    pub fn planner(&self) -> &P {
        &self.planner
    }

    fn rollout<Q: ValueFunction>(&mut self, bank: &OperatorBank<Q>, max_len: usize) -> Result<Path> {
        let mut path = Path::new();
        let mut obs = match self.env.reset() {
            Ok(obs) => obs,
            Err(e) => {
                warn!("Failed to reset the environment: {}", e);
                path.termination = TerminationReason::Aborted(e.to_string());
                return Ok(path);
            }
        };
        self.planner.reset(&obs);
        let mut operator = self.planner.current_operator(&obs);

        while path.len() < max_len {
            let name = match operator.take() {
                Some(name) => name,
                None => {
                    path.termination = TerminationReason::TaskSolved;
                    return Ok(path);
                }
            };
            let key = bank.key(&name)?;
            let slot = bank.slot(key)?;

            let abs_obs = self.planner.abstract_obs(&name, &obs);
            let q = slot.qf().forward_one(&abs_obs)?;
            let act = self.policy.get_action(&q)?;
            let act = self.explorer.select(act, slot.n_actions(), &mut self.rng);

            let step = match self.env.step(act) {
                Ok(step) => step,
                Err(e) => {
                    warn!("Path aborted after {} steps: {}", path.len(), e);
                    path.termination = TerminationReason::Aborted(e.to_string());
                    return Ok(path);
                }
            };

            let next_operator = self.planner.current_operator(&step.obs);
            let solved = next_operator.is_none();
            let operator_terminal = next_operator.as_deref() != Some(name.as_str());
            let reward = match solved {
                true => step.reward + self.task_terminal_reward,
                false => step.reward,
            };
            let mut transition = Transition::new(
                abs_obs,
                act,
                reward,
                self.planner.abstract_obs(&name, &step.obs),
                operator_terminal || step.is_terminated,
            );
            transition.info = step.info;
            path.steps.push(PathStep {
                operator: key,
                transition,
                operator_terminal,
            });
            path.total_return += step.reward;

            obs = step.obs;
            operator = next_operator;
            if step.is_terminated {
                path.termination = TerminationReason::EnvTerminal;
                return Ok(path);
            }
            if step.is_truncated {
                path.termination = TerminationReason::EnvTruncated;
                return Ok(path);
            }
            if solved {
                path.termination = TerminationReason::TaskSolved;
                return Ok(path);
            }
        }

        path.termination = TerminationReason::MaxPathLength;
        Ok(path)
    }
}

impl<E, P, Q> PathCollector<Q> for PlannerPathCollector<E, P>
where
    E: Env,
    P: Planner,
    Q: ValueFunction,
{
    fn validate(&self, bank: &OperatorBank<Q>) -> Result<()> {
        if bank.has_meta() {
            warn!("The meta-controller is not used by planner-driven collection");
        }
        let dims = self.planner.dims();
        let keys = self
            .planner
            .operators()
            .into_iter()
            .map(|name| bank.key(&name).map(|key| (name, key)))
            .collect::<Result<Vec<_>>>()?;
        for (name, key) in keys.iter() {
            let slot = bank.slot(*key)?;
            let (obs_dim, n_actions) = dims.get(name).copied().ok_or_else(|| {
                HrlError::Configuration(format!("planner has no dimensions for {:?}", name))
            })?;
            if slot.obs_dim() != obs_dim || slot.n_actions() != n_actions {
                return Err(HrlError::Configuration(format!(
                    "operator {:?} has dimensions ({}, {}), planner declares ({}, {})",
                    name,
                    slot.obs_dim(),
                    slot.n_actions(),
                    obs_dim,
                    n_actions
                ))
                .into());
            }
            if n_actions > self.env.n_actions() {
                return Err(HrlError::Configuration(format!(
                    "operator {:?} has {} actions, environment has {}",
                    name,
                    n_actions,
                    self.env.n_actions()
                ))
                .into());
            }
        }
        Ok(())
    }

    fn collect_new_paths(
        &mut self,
        bank: &OperatorBank<Q>,
        max_path_length: usize,
        num_steps: usize,
        discard_incomplete_paths: bool,
    ) -> Result<Vec<Path>> {
        let paths = collect_paths(max_path_length, num_steps, discard_incomplete_paths, |max_len| {
            self.rollout(bank, max_len)
        })?;
        self.stats.update(&paths, &bank.operator_names());
        debug!(
            "Collected {} paths, {} steps",
            paths.len(),
            paths.iter().map(|p| p.len()).sum::<usize>()
        );
        Ok(paths)
    }

    fn end_epoch(&mut self, epoch: usize) {
        self.explorer.on_epoch_end(epoch);
        self.stats.end_epoch();
    }

    fn diagnostics(&self) -> Record {
        let mut record = self.stats.record();
        record.insert("epsilon", RecordValue::Scalar(self.explorer.epsilon() as f32));
        record
    }

    fn exploration_state(&self) -> ExplorationState {
        ExplorationState {
            explorer: self.explorer.clone(),
            meta_explorer: None,
        }
    }

    fn restore_exploration_state(&mut self, state: ExplorationState) {
        self.explorer = state.explorer;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dummy::{ChainEnv, ChainEnvConfig, ChainPlanner, LinearQ, LinearQConfig},
        exploration::EpsilonGreedy,
        operator::OperatorKey,
        replay_buffer::SimpleReplayBufferConfig,
    };

    fn bank(planner: &ChainPlanner) -> Result<OperatorBank<LinearQ>> {
        let dims = planner.dims();
        let dims = planner
            .operators()
            .into_iter()
            .map(|op| {
                let d = dims[&op];
                (op, d)
            })
            .collect::<Vec<_>>();
        OperatorBank::build(
            &dims,
            None,
            &LinearQConfig::default(),
            &SimpleReplayBufferConfig::default(),
        )
    }

    #[test]
    fn test_operator_follows_planner() -> Result<()> {
        let env = ChainEnv::build(&ChainEnvConfig::default(), 0)?;
        let planner = ChainPlanner::new(2);
        let bank = bank(&planner)?;
        let mut collector = PlannerPathCollector::new(env, planner, 3)
            .explorer(Explorer::EpsilonGreedy(EpsilonGreedy::default().eps(1.0)))
            .task_terminal_reward(30.0);
        PathCollector::<LinearQ>::validate(&collector, &bank)?;

        let paths = collector.collect_new_paths(&bank, 20, 100, false)?;
        for path in paths.iter() {
            for step in path.steps.iter() {
                let tr = &step.transition;
                // set_fact_0 acts until fact_0 is true, then set_fact_1.
                let expected = if tr.obs[2] > 0.5 { 1 } else { 0 };
                assert_eq!(step.operator, OperatorKey::Operator(expected));
                assert_eq!(step.operator_terminal, tr.is_terminated);
            }
            if path.termination == TerminationReason::EnvTerminal {
                let last = &path.steps[path.len() - 1].transition;
                assert_eq!(last.reward, 31.0);
                assert_eq!(path.total_return, 1.0);
            }
            assert!(path.meta_transitions.is_empty());
        }
        Ok(())
    }

    #[test]
    fn test_unknown_planner_operator() -> Result<()> {
        let env = ChainEnv::build(&ChainEnvConfig::default().n_facts(3), 0)?;
        let planner = ChainPlanner::new(3);
        let small = ChainPlanner::new(2);
        let bank = bank(&small)?;
        let collector = PlannerPathCollector::new(env, planner, 0);
        let err = PathCollector::<LinearQ>::validate(&collector, &bank).unwrap_err();
        assert_eq!(
            err.downcast_ref::<HrlError>(),
            Some(&HrlError::UnknownOperator("set_fact_2".to_string()))
        );
        Ok(())
    }
}
