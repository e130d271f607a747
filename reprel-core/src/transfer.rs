//! Warm-starting a run from the value functions of a previous run.
use crate::{
    error::HrlError,
    operator::OperatorBank,
    replay_buffer::SimpleReplayBufferConfig,
    snapshot::{self, EpochSnapshot, MANIFEST},
    ValueFunction,
};
use anyhow::Result;
use log::info;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

/// Pretrained value functions found in a snapshot.
///
/// Only the weights are transferred. Replay buffers, trainer counters and exploration
/// state start from scratch in the new run.
pub struct Transfer {
    dir: PathBuf,
    snapshot: EpochSnapshot,
}

impl Transfer {
    /// Opens a snapshot.
    ///
    /// `path` is either a snapshot directory (`.../itr_<k>`) or a directory of snapshots,
    /// in which case the latest one is used.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let dir = match path.join(MANIFEST).is_file() {
            true => path.to_path_buf(),
            false => snapshot::latest(path)?.ok_or_else(|| {
                HrlError::Snapshot(format!("no snapshot found in {:?}", path))
            })?,
        };
        let snapshot = EpochSnapshot::load(&dir)?;
        info!(
            "Transfer from {:?} (epoch {}, operators {:?})",
            dir,
            snapshot.epoch,
            snapshot.operator_names()
        );
        Ok(Self { dir, snapshot })
    }

    /// Directory of the snapshot.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Manifest of the snapshot.
    pub fn snapshot(&self) -> &EpochSnapshot {
        &self.snapshot
    }

    /// Identifiers of the pretrained operators, excluding the meta-controller.
    pub fn operators(&self) -> Vec<String> {
        self.snapshot.operator_names()
    }

    /// `(obs_dim, n_actions)` of the pretrained operators.
    pub fn dims(&self) -> HashMap<String, (usize, usize)> {
        self.snapshot
            .operators
            .iter()
            .map(|e| (e.name.clone(), (e.obs_dim, e.n_actions)))
            .collect()
    }

    /// Returns `true` if the snapshot holds a meta-controller.
    pub fn has_meta(&self) -> bool {
        self.snapshot.meta.is_some()
    }

    /// Loads the pretrained bank with empty replay buffers.
    ///
    /// The meta-controller is loaded too if the snapshot has one.
    pub fn load_bank<Q: ValueFunction>(
        &self,
        qf_config: &Q::Config,
        buffer_config: &SimpleReplayBufferConfig,
    ) -> Result<OperatorBank<Q>> {
        self.snapshot
            .load_bank(&self.dir, qf_config, buffer_config, false)
    }

    /// Loads the pretrained bank without the meta-controller.
    pub fn load_operators<Q: ValueFunction>(
        &self,
        qf_config: &Q::Config,
        buffer_config: &SimpleReplayBufferConfig,
    ) -> Result<OperatorBank<Q>> {
        let mut bank = self.load_bank(qf_config, buffer_config)?;
        bank.take_meta();
        Ok(bank)
    }
}
