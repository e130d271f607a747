use super::{collect_paths, ExplorationState, Path, PathCollector, PathStatistics, PathStep, TerminationReason};
use crate::{
    critic::IntrinsicCritic,
    error::HrlError,
    exploration::{ExplorationStrategy, Explorer},
    operator::{OperatorBank, OperatorKey},
    policy::ArgmaxDiscretePolicy,
    record::{Record, RecordValue},
    replay_buffer::Transition,
    Env, Obs, Policy, ValueFunction,
};
use anyhow::Result;
use log::{debug, trace, warn};
use rand::{rngs::StdRng, SeedableRng};

struct ActiveOperator {
    ix: usize,
    start_obs: Obs,
    reward: f32,
    steps: usize,
}

/// Collects paths with operators chosen by the meta-controller.
///
/// At the start of a path, and whenever the active operator ends, the meta-controller's
/// value function picks an operator (argmax wrapped by the meta explorer). The operator then
/// acts until the intrinsic critic signals its sub-goal, it runs for `max_operator_steps`,
/// or the path ends.
///
/// Each low-level transition carries the shaped reward and the flag
/// `operator_terminal || env_terminated`. When an operator ends, one meta transition
/// `(start obs, operator index, extrinsic reward since start, end obs, env_terminated)`
/// is added to the path.
pub struct HrlPathCollector<E, C> {
    env: E,
    critic: C,
    policy: ArgmaxDiscretePolicy,
    explorer: Explorer,
    meta_explorer: Explorer,
    rng: StdRng,
    max_operator_steps: Option<usize>,
    stats: PathStatistics,
}

impl<E, C> HrlPathCollector<E, C>
where
    E: Env,
    C: IntrinsicCritic,
{
    /// Constructs a greedy collector.
    pub fn new(env: E, critic: C, seed: u64) -> Self {
        Self {
            env,
            critic,
            policy: ArgmaxDiscretePolicy::new(seed),
            explorer: Explorer::Greedy,
            meta_explorer: Explorer::Greedy,
            rng: StdRng::seed_from_u64(seed.wrapping_add(1)),
            max_operator_steps: None,
            stats: PathStatistics::default(),
        }
    }

    /// Sets the explorer of the low-level actions.
    pub fn explorer(mut self, explorer: Explorer) -> Self {
        self.explorer = explorer;
        self
    }

    /// Sets the explorer of the meta-controller.
    pub fn meta_explorer(mut self, explorer: Explorer) -> Self {
        self.meta_explorer = explorer;
        self
    }

    /// Sets the maximum number of steps of one operator execution.
    pub fn max_operator_steps(mut self, v: usize) -> Self {
        self.max_operator_steps = Some(v);
        self
    }

    /// The environment.
    pub fn env(&self) -> &E {
        &self.env
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
        let meta = bank.slot(OperatorKey::MetaController)?;
        let mut active: Option<ActiveOperator> = None;

        while path.len() < max_len {
            let mut current = match active.take() {
                Some(current) => current,
                None => {
                    let q = meta.qf().forward_one(&obs)?;
                    let ix = self.policy.get_action(&q)?;
                    let ix = self
                        .meta_explorer
                        .select(ix, bank.n_operators(), &mut self.rng);
                    ActiveOperator {
                        ix,
                        start_obs: obs.clone(),
                        reward: 0.0,
                        steps: 0,
                    }
                }
            };
            let key = OperatorKey::Operator(current.ix);
            let slot = bank.slot(key)?;

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

            let (operator_terminal, shaped_reward) =
                self.critic
                    .evaluate(&obs, act, &step.obs, slot.name(), step.reward);
            let mut transition = Transition::new(
                obs,
                act,
                shaped_reward,
                step.obs.clone(),
                operator_terminal || step.is_terminated,
            );
            transition.info = step.info;
            path.steps.push(PathStep {
                operator: key,
                transition,
                operator_terminal,
            });
            path.total_return += step.reward;
            current.reward += step.reward;
            current.steps += 1;

            let path_end = step.is_terminated || step.is_truncated || path.len() >= max_len;
            let exhausted = self
                .max_operator_steps
                .map_or(false, |max| current.steps >= max);
            if operator_terminal || exhausted || path_end {
                trace!(
                    "Operator {:?} ended after {} steps (sub-goal: {})",
                    slot.name(),
                    current.steps,
                    operator_terminal
                );
                path.meta_transitions.push(Transition::new(
                    current.start_obs,
                    current.ix,
                    current.reward,
                    step.obs.clone(),
                    step.is_terminated,
                ));
            } else {
                active = Some(current);
            }

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

impl<E, C, Q> PathCollector<Q> for HrlPathCollector<E, C>
where
    E: Env,
    C: IntrinsicCritic,
    Q: ValueFunction,
{
    fn validate(&self, bank: &OperatorBank<Q>) -> Result<()> {
        let (obs_dim, n_actions) = (self.env.obs_dim(), self.env.n_actions());
        let meta = bank.slot(OperatorKey::MetaController).map_err(|_| {
            HrlError::Configuration("the operator bank has no meta-controller".to_string())
        })?;
        if meta.obs_dim() != obs_dim {
            return Err(HrlError::Configuration(format!(
                "meta-controller takes observations of dimension {}, environment provides {}",
                meta.obs_dim(),
                obs_dim
            ))
            .into());
        }
        for slot in bank.slots().filter(|s| s.name() != meta.name()) {
            if slot.obs_dim() != obs_dim || slot.n_actions() != n_actions {
                return Err(HrlError::Configuration(format!(
                    "operator {:?} has dimensions ({}, {}), environment has ({}, {})",
                    slot.name(),
                    slot.obs_dim(),
                    slot.n_actions(),
                    obs_dim,
                    n_actions
                ))
                .into());
            }
        }
        self.critic.validate(
            self.env.fact_layout().as_ref(),
            obs_dim,
            &bank.operator_names(),
        )
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
        self.meta_explorer.on_epoch_end(epoch);
        self.stats.end_epoch();
    }

    fn diagnostics(&self) -> Record {
        let mut record = self.stats.record();
        record.insert("epsilon", RecordValue::Scalar(self.explorer.epsilon() as f32));
        record.insert(
            "meta_epsilon",
            RecordValue::Scalar(self.meta_explorer.epsilon() as f32),
        );
        record
    }

    fn exploration_state(&self) -> ExplorationState {
        ExplorationState {
            explorer: self.explorer.clone(),
            meta_explorer: Some(self.meta_explorer.clone()),
        }
    }

    fn restore_exploration_state(&mut self, state: ExplorationState) {
        self.explorer = state.explorer;
        if let Some(meta_explorer) = state.meta_explorer {
            self.meta_explorer = meta_explorer;
        }
    }
}
