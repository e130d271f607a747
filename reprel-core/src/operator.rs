//! Operators and the meta-controller.
//!
//! An [`OperatorBank`] is built once from a fixed operator list and never grows or
//! shrinks during a run. Each slot owns an online value function, its target copy and a
//! private replay buffer. The meta-controller is a distinguished slot whose actions are
//! the indices of the operators.
use crate::{
    error::HrlError,
    replay_buffer::{SimpleReplayBuffer, SimpleReplayBufferConfig},
    ExperienceBufferBase, ReplayBufferBase, ValueFunction,
};
use anyhow::Result;
use log::info;
use std::collections::HashSet;

/// Identifier of the meta-controller pseudo-operator.
pub const METACONTROLLER: &str = "metacontroller";

/// Resolved handle of a slot in an [`OperatorBank`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperatorKey {
    /// The operator at the given index of the operator list.
    Operator(usize),

    /// The meta-controller.
    MetaController,
}

/// Value functions and replay buffer of one operator.
pub struct OperatorSlot<Q> {
    name: String,
    qf: Q,
    target_qf: Q,
    buffer: SimpleReplayBuffer,
    buffer_config: SimpleReplayBufferConfig,
}

impl<Q: ValueFunction> OperatorSlot<Q> {
    /// Builds a slot with freshly initialized value functions.
    ///
    /// The target value function starts as a copy of the online one.
    pub fn build(
        name: impl Into<String>,
        qf_config: &Q::Config,
        obs_dim: usize,
        n_actions: usize,
        buffer_config: &SimpleReplayBufferConfig,
    ) -> Result<Self> {
        let name = name.into();
        if obs_dim == 0 || n_actions == 0 {
            return Err(HrlError::Configuration(format!(
                "operator {:?} has invalid dimensions ({}, {})",
                name, obs_dim, n_actions
            ))
            .into());
        }
        let qf = Q::build(qf_config, obs_dim, n_actions)?;
        let mut target_qf = Q::build(qf_config, obs_dim, n_actions)?;
        target_qf.copy_from(&qf)?;
        Self::from_parts(name, qf, target_qf, buffer_config)
    }

    /// Builds a slot from existing value functions with an empty replay buffer.
    pub fn from_parts(
        name: impl Into<String>,
        qf: Q,
        target_qf: Q,
        buffer_config: &SimpleReplayBufferConfig,
    ) -> Result<Self> {
        let name = name.into();
        if qf.in_dim() != target_qf.in_dim() || qf.out_dim() != target_qf.out_dim() {
            return Err(HrlError::Configuration(format!(
                "online ({}, {}) and target ({}, {}) value functions of {:?} differ in shape",
                qf.in_dim(),
                qf.out_dim(),
                target_qf.in_dim(),
                target_qf.out_dim(),
                name
            ))
            .into());
        }
        let buffer_config = buffer_config
            .clone()
            .obs_dim(qf.in_dim())
            .n_actions(qf.out_dim());
        let buffer = SimpleReplayBuffer::build(&buffer_config).with_name(name.clone());

        Ok(Self {
            name,
            qf,
            target_qf,
            buffer,
            buffer_config,
        })
    }

    /// Replaces the replay buffer.
    pub fn set_buffer(&mut self, buffer: SimpleReplayBuffer) -> Result<()> {
        if buffer.obs_dim() != self.obs_dim() || buffer.n_actions() != self.n_actions() {
            return Err(HrlError::Configuration(format!(
                "replay buffer ({}, {}) does not match operator {:?} ({}, {})",
                buffer.obs_dim(),
                buffer.n_actions(),
                self.name,
                self.obs_dim(),
                self.n_actions()
            ))
            .into());
        }
        self.buffer = buffer.with_name(self.name.clone());
        Ok(())
    }

    /// Identifier of the operator.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Observation dimension of the operator.
    pub fn obs_dim(&self) -> usize {
        self.qf.in_dim()
    }

    /// The number of actions of the operator.
    pub fn n_actions(&self) -> usize {
        self.qf.out_dim()
    }

    /// Online value function.
    pub fn qf(&self) -> &Q {
        &self.qf
    }

    /// Target value function.
    pub fn target_qf(&self) -> &Q {
        &self.target_qf
    }

    /// Replay buffer.
    pub fn buffer(&self) -> &SimpleReplayBuffer {
        &self.buffer
    }

    /// Mutable replay buffer.
    pub fn buffer_mut(&mut self) -> &mut SimpleReplayBuffer {
        &mut self.buffer
    }

    /// Configuration of the replay buffer.
    pub fn buffer_config(&self) -> &SimpleReplayBufferConfig {
        &self.buffer_config
    }

    /// Borrows the online value function, the target and the buffer at once.
    pub fn parts_mut(&mut self) -> (&mut Q, &Q, &mut SimpleReplayBuffer) {
        (&mut self.qf, &self.target_qf, &mut self.buffer)
    }

    /// Copies the online weights into the target.
    pub fn sync_target(&mut self) -> Result<()> {
        self.target_qf.copy_from(&self.qf)
    }

    /// Returns the slot as its parts, consuming it.
    pub fn into_parts(self) -> (String, Q, Q) {
        (self.name, self.qf, self.target_qf)
    }
}

/// Fixed collection of operators plus an optional meta-controller.
pub struct OperatorBank<Q> {
    operators: Vec<OperatorSlot<Q>>,
    meta: Option<OperatorSlot<Q>>,
}

impl<Q: ValueFunction> OperatorBank<Q> {
    /// Builds a bank with fresh value functions.
    ///
    /// * `operators` - operator identifiers with their `(obs_dim, n_actions)`.
    /// * `meta_obs_dim` - observation dimension of the meta-controller, `None` for banks
    ///   driven by a planner.
    pub fn build(
        operators: &[(String, (usize, usize))],
        meta_obs_dim: Option<usize>,
        qf_config: &Q::Config,
        buffer_config: &SimpleReplayBufferConfig,
    ) -> Result<Self> {
        let slots = operators
            .iter()
            .enumerate()
            .map(|(i, (name, (obs_dim, n_actions)))| {
                let buffer_config = buffer_config.clone().seed(buffer_config.get_seed() + i as u64);
                OperatorSlot::build(name.as_str(), qf_config, *obs_dim, *n_actions, &buffer_config)
            })
            .collect::<Result<Vec<_>>>()?;
        let meta = match meta_obs_dim {
            Some(obs_dim) => {
                let buffer_config = buffer_config
                    .clone()
                    .seed(buffer_config.get_seed() + operators.len() as u64);
                Some(OperatorSlot::build(
                    METACONTROLLER,
                    qf_config,
                    obs_dim,
                    operators.len(),
                    &buffer_config,
                )?)
            }
            None => None,
        };
        Self::from_slots(slots, meta)
    }

    /// Builds a bank from prepared slots.
    pub fn from_slots(
        operators: Vec<OperatorSlot<Q>>,
        meta: Option<OperatorSlot<Q>>,
    ) -> Result<Self> {
        if operators.is_empty() {
            return Err(HrlError::Configuration("empty operator list".to_string()).into());
        }
        let mut names = HashSet::new();
        for slot in operators.iter() {
            if slot.name == METACONTROLLER {
                return Err(HrlError::Configuration(format!(
                    "{:?} is reserved for the meta-controller",
                    METACONTROLLER
                ))
                .into());
            }
            if !names.insert(slot.name.as_str()) {
                return Err(HrlError::Configuration(format!(
                    "duplicate operator {:?}",
                    slot.name
                ))
                .into());
            }
        }
        if let Some(meta) = meta.as_ref() {
            if meta.n_actions() != operators.len() {
                return Err(HrlError::Configuration(format!(
                    "meta-controller has {} actions for {} operators",
                    meta.n_actions(),
                    operators.len()
                ))
                .into());
            }
        }

        Ok(Self { operators, meta })
    }

    /// Resolves an operator identifier.
    pub fn key(&self, name: &str) -> Result<OperatorKey> {
        if name == METACONTROLLER && self.meta.is_some() {
            return Ok(OperatorKey::MetaController);
        }
        self.operators
            .iter()
            .position(|slot| slot.name == name)
            .map(OperatorKey::Operator)
            .ok_or_else(|| HrlError::UnknownOperator(name.to_string()).into())
    }

    /// Keys of all slots, operators first, the meta-controller last.
    pub fn keys(&self) -> Vec<OperatorKey> {
        let mut keys = (0..self.operators.len())
            .map(OperatorKey::Operator)
            .collect::<Vec<_>>();
        if self.meta.is_some() {
            keys.push(OperatorKey::MetaController);
        }
        keys
    }

    /// Identifiers of the operators, excluding the meta-controller.
    pub fn operator_names(&self) -> Vec<String> {
        self.operators.iter().map(|slot| slot.name.clone()).collect()
    }

    /// The number of operators, excluding the meta-controller.
    pub fn n_operators(&self) -> usize {
        self.operators.len()
    }

    /// Returns `true` if the bank has a meta-controller.
    pub fn has_meta(&self) -> bool {
        self.meta.is_some()
    }

    /// Returns the slot of a key.
    pub fn slot(&self, key: OperatorKey) -> Result<&OperatorSlot<Q>> {
        match key {
            OperatorKey::Operator(i) => self.operators.get(i),
            OperatorKey::MetaController => self.meta.as_ref(),
        }
        .ok_or_else(|| HrlError::UnknownOperator(format!("{:?}", key)).into())
    }

    /// Returns the mutable slot of a key.
    pub fn slot_mut(&mut self, key: OperatorKey) -> Result<&mut OperatorSlot<Q>> {
        match key {
            OperatorKey::Operator(i) => self.operators.get_mut(i),
            OperatorKey::MetaController => self.meta.as_mut(),
        }
        .ok_or_else(|| HrlError::UnknownOperator(format!("{:?}", key)).into())
    }

    /// Slots of the operators.
    pub fn operators(&self) -> &[OperatorSlot<Q>] {
        &self.operators
    }

    /// Slot of the meta-controller, if any.
    pub fn meta(&self) -> Option<&OperatorSlot<Q>> {
        self.meta.as_ref()
    }

    /// Iterates over all slots in the order of [`OperatorBank::keys`].
    pub fn slots(&self) -> impl Iterator<Item = &OperatorSlot<Q>> {
        self.operators.iter().chain(self.meta.iter())
    }

    /// Copies online weights into the targets of every slot.
    pub fn sync_targets(&mut self) -> Result<()> {
        for slot in self.operators.iter_mut().chain(self.meta.iter_mut()) {
            slot.sync_target()?;
        }
        info!("Synchronized target value functions");
        Ok(())
    }

    /// Returns the slots whose buffers hold fewer than `batch_size` transitions.
    pub fn pending(&self, batch_size: usize) -> Vec<(String, usize)> {
        self.slots()
            .filter(|slot| slot.buffer.len() < batch_size)
            .map(|slot| (slot.name.clone(), slot.buffer.len()))
            .collect()
    }

    /// Returns `true` if every buffer can provide a batch of `batch_size`.
    pub fn is_ready(&self, batch_size: usize) -> bool {
        self.pending(batch_size).is_empty()
    }

    /// Total number of transitions stored in all buffers.
    pub fn num_transitions(&self) -> usize {
        self.slots().map(|slot| slot.buffer.len()).sum()
    }

    /// Removes the meta-controller, returning it.
    pub fn take_meta(&mut self) -> Option<OperatorSlot<Q>> {
        self.meta.take()
    }

    /// Returns the slots, consuming the bank.
    pub fn into_slots(self) -> (Vec<OperatorSlot<Q>>, Option<OperatorSlot<Q>>) {
        (self.operators, self.meta)
    }
}
