use super::{collect_paths, ExplorationState, Path, PathCollector, PathStatistics, PathStep, TerminationReason};
use crate::{
    error::HrlError,
    exploration::{ExplorationStrategy, Explorer},
    operator::{OperatorBank, OperatorKey},
    policy::ArgmaxDiscretePolicy,
    record::{Record, RecordValue},
    replay_buffer::Transition,
    Env, Policy, ValueFunction,
};
use anyhow::Result;
use log::{debug, warn};
use rand::{rngs::StdRng, SeedableRng};

/// Collects paths with the single operator of a bank, like plain DQN.
///
/// Transitions carry the extrinsic reward and the terminal flag of the environment.
pub struct FlatPathCollector<E> {
    env: E,
    policy: ArgmaxDiscretePolicy,
    explorer: Explorer,
    rng: StdRng,
    stats: PathStatistics,
}

impl<E: Env> FlatPathCollector<E> {
    /// Constructs a greedy collector.
    pub fn new(env: E, seed: u64) -> Self {
        Self {
            env,
            policy: ArgmaxDiscretePolicy::new(seed),
            explorer: Explorer::Greedy,
            rng: StdRng::seed_from_u64(seed.wrapping_add(1)),
            stats: PathStatistics::default(),
        }
    }

    /// Sets the explorer.
    pub fn explorer(mut self, explorer: Explorer) -> Self {
        self.explorer = explorer;
        self
    }

    fn rollout<Q: ValueFunction>(&mut self, bank: &OperatorBank<Q>, max_len: usize) -> Result<Path> {
        let mut path = Path::new();
        let key = OperatorKey::Operator(0);
        let slot = bank.slot(key)?;
        let mut obs = match self.env.reset() {
            Ok(obs) => obs,
            Err(e) => {
                warn!("Failed to reset the environment: {}", e);
                path.termination = TerminationReason::Aborted(e.to_string());
                return Ok(path);
            }
        };

        while path.len() < max_len {
            let q = slot.qf().forward_one(&obs)?;
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
            let mut transition =
                Transition::new(obs, act, step.reward, step.obs.clone(), step.is_terminated);
            transition.info = step.info;
            path.steps.push(PathStep {
                operator: key,
                transition,
                operator_terminal: step.is_terminated,
            });
            path.total_return += step.reward;

            obs = step.obs;
            if step.is_terminated {
                path.termination = TerminationReason::EnvTerminal;
                return Ok(path);
            }
            if step.is_truncated {
                path.termination = TerminationReason::EnvTruncated;
                return Ok(path);
            }
        }

        path.termination = TerminationReason::MaxPathLength;
        Ok(path)
    }
}

impl<E, Q> PathCollector<Q> for FlatPathCollector<E>
where
    E: Env,
    Q: ValueFunction,
{
    fn validate(&self, bank: &OperatorBank<Q>) -> Result<()> {
        if bank.n_operators() != 1 || bank.has_meta() {
            return Err(HrlError::Configuration(format!(
                "flat collection needs exactly one operator, got {:?}",
                bank.operator_names()
            ))
            .into());
        }
        let slot = bank.slot(OperatorKey::Operator(0))?;
        if slot.obs_dim() != self.env.obs_dim() || slot.n_actions() != self.env.n_actions() {
            return Err(HrlError::Configuration(format!(
                "operator {:?} has dimensions ({}, {}), environment has ({}, {})",
                slot.name(),
                slot.obs_dim(),
                slot.n_actions(),
                self.env.obs_dim(),
                self.env.n_actions()
            ))
            .into());
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
        debug!("Collected {} paths", paths.len());
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
