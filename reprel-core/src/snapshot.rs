//! Epoch snapshots of a training run.
//!
//! A snapshot of epoch `k` lives in `<snapshot_dir>/itr_<k>/`:
//!
//! ```text
//! itr_<k>/
//! ├── snapshot.yaml                          # EpochSnapshot
//! ├── trainer/operator_qfs/<operator>.<ext>
//! ├── trainer/operator_target_qfs/<operator>.<ext>
//! └── replay_buffer/<operator>.bin           # optional
//! ```
//!
//! The meta-controller, if any, is stored under the identifier
//! [`METACONTROLLER`](crate::operator::METACONTROLLER).
use crate::{
    collector::ExplorationState,
    error::HrlError,
    operator::{OperatorBank, OperatorSlot},
    replay_buffer::{ReplayBufferState, SimpleReplayBuffer, SimpleReplayBufferConfig},
    trainer::TrainerConfig,
    ValueFunction,
};
use anyhow::{Context, Result};
use chrono::Local;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

/// Name of the manifest file in a snapshot directory.
pub const MANIFEST: &str = "snapshot.yaml";

/// Directory of the online value functions.
pub const OPERATOR_QFS: &str = "trainer/operator_qfs";

/// Directory of the target value functions.
pub const OPERATOR_TARGET_QFS: &str = "trainer/operator_target_qfs";

/// Directory of the replay buffers.
pub const REPLAY_BUFFER: &str = "replay_buffer";

/// Identifier and dimensions of a stored value function.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct OperatorEntry {
    /// Identifier of the operator.
    pub name: String,

    /// Observation dimension.
    pub obs_dim: usize,

    /// The number of actions.
    pub n_actions: usize,
}

/// Persistable state of a training run at an epoch boundary.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct EpochSnapshot {
    /// Index of the finished epoch.
    pub epoch: usize,

    /// Creation time.
    pub created_at: String,

    /// Operators in the order of the bank.
    pub operators: Vec<OperatorEntry>,

    /// The meta-controller, if any.
    pub meta: Option<OperatorEntry>,

    /// Configuration of the trainer.
    pub trainer: TrainerConfig,

    /// Training steps done so far.
    pub n_train_steps: usize,

    /// Exploration environment steps done so far.
    pub n_env_steps: usize,

    /// Exploration state of the exploration path collector.
    pub exploration: ExplorationState,

    /// Replay buffers are stored in the snapshot.
    pub has_replay_buffers: bool,
}

/// Returns the directory of the snapshot of an epoch.
pub fn epoch_dir(snapshot_dir: &Path, epoch: usize) -> PathBuf {
    snapshot_dir.join(format!("itr_{}", epoch))
}

fn weights_path<Q: ValueFunction>(dir: &Path, sub: &str, name: &str) -> PathBuf {
    dir.join(sub).join(format!("{}.{}", name, Q::WEIGHTS_EXTENSION))
}

fn entry<Q: ValueFunction>(slot: &OperatorSlot<Q>) -> OperatorEntry {
    OperatorEntry {
        name: slot.name().to_string(),
        obs_dim: slot.obs_dim(),
        n_actions: slot.n_actions(),
    }
}

impl EpochSnapshot {
    /// Describes the bank and the training state.
    pub fn new<Q: ValueFunction>(
        epoch: usize,
        bank: &OperatorBank<Q>,
        trainer: TrainerConfig,
        n_train_steps: usize,
        n_env_steps: usize,
        exploration: ExplorationState,
        has_replay_buffers: bool,
    ) -> Self {
        let operators = bank.operators().iter().map(entry).collect();
        let meta = bank.meta().map(entry);
        Self {
            epoch,
            created_at: Local::now().to_rfc3339(),
            operators,
            meta,
            trainer,
            n_train_steps,
            n_env_steps,
            exploration,
            has_replay_buffers,
        }
    }

    /// Writes the manifest, the value functions and optionally the replay buffers into `dir`.
    pub fn save<Q: ValueFunction>(&self, dir: &Path, bank: &OperatorBank<Q>) -> Result<()> {
        fs::create_dir_all(dir.join(OPERATOR_QFS))?;
        fs::create_dir_all(dir.join(OPERATOR_TARGET_QFS))?;
        if self.has_replay_buffers {
            fs::create_dir_all(dir.join(REPLAY_BUFFER))?;
        }

        for slot in bank.slots() {
            slot.qf()
                .save(&weights_path::<Q>(dir, OPERATOR_QFS, slot.name()))?;
            slot.target_qf()
                .save(&weights_path::<Q>(dir, OPERATOR_TARGET_QFS, slot.name()))?;
            if self.has_replay_buffers {
                let path = dir.join(REPLAY_BUFFER).join(format!("{}.bin", slot.name()));
                let file = BufWriter::new(File::create(path)?);
                bincode::serialize_into(file, &slot.buffer().state(slot.buffer_config()))?;
            }
        }

        let mut file = File::create(dir.join(MANIFEST))?;
        file.write_all(serde_yaml::to_string(self)?.as_bytes())?;
        info!("Saved snapshot of epoch {} in {:?}", self.epoch, dir);
        Ok(())
    }

    /// Reads the manifest in `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST);
        let file = File::open(&path)
            .map_err(|e| HrlError::Snapshot(format!("cannot open {:?}: {}", path, e)))?;
        let snapshot = serde_yaml::from_reader(BufReader::new(file))
            .map_err(|e| HrlError::Snapshot(format!("malformed {:?}: {}", path, e)))?;
        Ok(snapshot)
    }

    /// Identifiers of the operators, excluding the meta-controller.
    pub fn operator_names(&self) -> Vec<String> {
        self.operators.iter().map(|e| e.name.clone()).collect()
    }

    /// Rebuilds the operator bank from the value functions in `dir`.
    ///
    /// The replay buffers are restored if `restore_buffers` is `true` and the snapshot holds
    /// them; otherwise they are empty.
    pub fn load_bank<Q: ValueFunction>(
        &self,
        dir: &Path,
        qf_config: &Q::Config,
        buffer_config: &SimpleReplayBufferConfig,
        restore_buffers: bool,
    ) -> Result<OperatorBank<Q>> {
        let load_slot = |entry: &OperatorEntry| -> Result<OperatorSlot<Q>> {
            let mut qf = Q::build(qf_config, entry.obs_dim, entry.n_actions)?;
            let mut target_qf = Q::build(qf_config, entry.obs_dim, entry.n_actions)?;
            let path = weights_path::<Q>(dir, OPERATOR_QFS, &entry.name);
            qf.load(&path)
                .with_context(|| HrlError::Snapshot(format!("cannot load {:?}", path)))?;
            let path = weights_path::<Q>(dir, OPERATOR_TARGET_QFS, &entry.name);
            target_qf
                .load(&path)
                .with_context(|| HrlError::Snapshot(format!("cannot load {:?}", path)))?;
            if qf.in_dim() != entry.obs_dim || qf.out_dim() != entry.n_actions {
                return Err(HrlError::Snapshot(format!(
                    "value function of {:?} has shape ({}, {}), manifest says ({}, {})",
                    entry.name,
                    qf.in_dim(),
                    qf.out_dim(),
                    entry.obs_dim,
                    entry.n_actions
                ))
                .into());
            }

            let mut slot = OperatorSlot::from_parts(entry.name.as_str(), qf, target_qf, buffer_config)?;
            if restore_buffers && self.has_replay_buffers {
                let path = dir.join(REPLAY_BUFFER).join(format!("{}.bin", entry.name));
                let file = BufReader::new(File::open(path)?);
                let state: ReplayBufferState = bincode::deserialize_from(file)?;
                slot.set_buffer(SimpleReplayBuffer::from_state(state)?)?;
            }
            Ok(slot)
        };

        let operators = self
            .operators
            .iter()
            .map(load_slot)
            .collect::<Result<Vec<_>>>()?;
        let meta = self.meta.as_ref().map(load_slot).transpose()?;
        OperatorBank::from_slots(operators, meta)
    }
}

/// Returns the directory of the latest snapshot under `snapshot_dir`, if any.
pub fn latest(snapshot_dir: &Path) -> Result<Option<PathBuf>> {
    if !snapshot_dir.is_dir() {
        return Ok(None);
    }
    let mut latest: Option<(usize, PathBuf)> = None;
    for entry in fs::read_dir(snapshot_dir)? {
        let path = entry?.path();
        let epoch = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix("itr_"))
            .and_then(|n| n.parse::<usize>().ok());
        if let Some(epoch) = epoch {
            if path.join(MANIFEST).is_file() && latest.as_ref().map_or(true, |(e, _)| epoch > *e) {
                latest = Some((epoch, path));
            }
        }
    }
    Ok(latest.map(|(_, path)| path))
}

/// When to take snapshots.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub enum SnapshotMode {
    /// Never.
    None,

    /// Every epoch.
    All,

    /// The final epoch only.
    Last,

    /// Every `gap` epochs and the final epoch.
    GapAndLast(usize),
}

impl SnapshotMode {
    /// Returns `true` if a snapshot is due after `epoch` of `num_epochs`.
    pub fn is_due(&self, epoch: usize, num_epochs: usize) -> bool {
        let last = epoch + 1 == num_epochs;
        match *self {
            Self::None => false,
            Self::All => true,
            Self::Last => last,
            Self::GapAndLast(gap) => last || (gap > 0 && epoch % gap == 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dummy::{LinearQ, LinearQConfig},
        exploration::Explorer,
        operator::METACONTROLLER,
        replay_buffer::Transition,
        ExperienceBufferBase,
    };
    use ndarray::Array2;
    use tempdir::TempDir;

    fn bank() -> Result<OperatorBank<LinearQ>> {
        let dims = vec![("a".to_string(), (3, 2)), ("b".to_string(), (3, 4))];
        let config = LinearQConfig {
            learning_rate: 0.1,
            init_bias: 0.5,
        };
        OperatorBank::build(&dims, Some(3), &config, &SimpleReplayBufferConfig::default())
    }

    fn snapshot(bank: &OperatorBank<LinearQ>, buffers: bool) -> EpochSnapshot {
        EpochSnapshot::new(
            4,
            bank,
            TrainerConfig::default(),
            10,
            100,
            ExplorationState {
                explorer: Explorer::default(),
                meta_explorer: None,
            },
            buffers,
        )
    }

    #[test]
    fn test_gap_and_last() {
        let mode = SnapshotMode::GapAndLast(20);
        let due = (0..45).filter(|&e| mode.is_due(e, 45)).collect::<Vec<_>>();
        assert_eq!(due, vec![0, 20, 40, 44]);
        assert!(!SnapshotMode::None.is_due(44, 45));
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let dir = TempDir::new("snapshot")?;
        let mut bank = bank()?;
        let key = bank.key("b")?;
        bank.slot_mut(key)?
            .buffer_mut()
            .push(Transition::new(vec![1., 2., 3.], 3, 1.0, vec![0.; 3], false))?;
        let obs = Array2::from_shape_vec((1, 3), vec![1., 0., 0.])?;
        bank.slot_mut(key)?.parts_mut().0.fit(&obs, &[2], &[3.0])?;

        let snapshot = snapshot(&bank, true);
        assert_eq!(snapshot.operator_names(), vec!["a", "b"]);
        assert_eq!(snapshot.meta.as_ref().map(|m| m.name.as_str()), Some(METACONTROLLER));

        let itr = epoch_dir(dir.path(), 4);
        snapshot.save(&itr, &bank)?;
        assert!(itr.join("trainer/operator_qfs/b.bin").is_file());
        assert!(itr.join("trainer/operator_target_qfs/metacontroller.bin").is_file());
        assert_eq!(latest(dir.path())?, Some(itr.clone()));

        let loaded = EpochSnapshot::load(&itr)?;
        assert_eq!(loaded, snapshot);
        let restored: OperatorBank<LinearQ> = loaded.load_bank(
            &itr,
            &LinearQConfig::default(),
            &SimpleReplayBufferConfig::default(),
            true,
        )?;
        assert_eq!(restored.operator_names(), bank.operator_names());
        let slot = restored.slot(restored.key("b")?)?;
        assert_eq!(slot.n_actions(), 4);
        assert_eq!(slot.buffer().len(), 1);
        assert_eq!(
            slot.qf().forward(&obs)?,
            bank.slot(key)?.qf().forward(&obs)?
        );
        Ok(())
    }

    #[test]
    fn test_missing_manifest() {
        let dir = TempDir::new("snapshot").unwrap();
        let err = EpochSnapshot::load(dir.path()).unwrap_err();
        assert!(matches!(err.downcast_ref::<HrlError>(), Some(HrlError::Snapshot(_))));
    }
}
