//! Configuration of [`Algorithm`](super::Algorithm).
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Algorithm`](super::Algorithm).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct AlgorithmConfig {
    /// The number of epochs.
    pub num_epochs: usize,

    /// Environment steps of evaluation at the end of every epoch.
    pub num_eval_steps_per_epoch: usize,

    /// Training steps in every train loop.
    pub num_trains_per_train_loop: usize,

    /// Exploration steps in every train loop.
    pub num_expl_steps_per_train_loop: usize,

    /// Train loops in every epoch.
    pub num_train_loops_per_epoch: usize,

    /// Exploration steps collected before the first training step.
    pub min_num_steps_before_training: usize,

    /// Upper bound of the warmup in exploration steps.
    ///
    /// Warmup continues past `min_num_steps_before_training` until every replay buffer
    /// can provide a batch, and fails when this bound is reached first.
    pub max_warmup_steps: usize,

    /// The maximum length of a path.
    pub max_path_length: usize,

    /// Where snapshots are saved. `None` disables snapshots.
    pub snapshot_dir: Option<String>,

    /// Interval of snapshots in epochs. The final epoch is always saved.
    pub snapshot_gap: usize,

    /// Replay buffers are saved in snapshots.
    pub save_replay_buffers: bool,

    /// An environment error terminates the run instead of skipping the rest of the epoch.
    pub strict_env_errors: bool,
}

impl Default for AlgorithmConfig {
    fn default() -> Self {
        Self {
            num_epochs: 100,
            num_eval_steps_per_epoch: 1000,
            num_trains_per_train_loop: 1000,
            num_expl_steps_per_train_loop: 1000,
            num_train_loops_per_epoch: 1,
            min_num_steps_before_training: 1000,
            max_warmup_steps: 100_000,
            max_path_length: 1000,
            snapshot_dir: None,
            snapshot_gap: 20,
            save_replay_buffers: false,
            strict_env_errors: false,
        }
    }
}

impl AlgorithmConfig {
    /// Sets the number of epochs.
    pub fn num_epochs(mut self, v: usize) -> Self {
        self.num_epochs = v;
        self
    }

    /// Sets the number of evaluation steps per epoch.
    pub fn num_eval_steps_per_epoch(mut self, v: usize) -> Self {
        self.num_eval_steps_per_epoch = v;
        self
    }

    /// Sets the number of training steps per train loop.
    pub fn num_trains_per_train_loop(mut self, v: usize) -> Self {
        self.num_trains_per_train_loop = v;
        self
    }

    /// Sets the number of exploration steps per train loop.
    pub fn num_expl_steps_per_train_loop(mut self, v: usize) -> Self {
        self.num_expl_steps_per_train_loop = v;
        self
    }

    /// Sets the number of train loops per epoch.
    pub fn num_train_loops_per_epoch(mut self, v: usize) -> Self {
        self.num_train_loops_per_epoch = v;
        self
    }

    /// Sets the number of exploration steps before training.
    pub fn min_num_steps_before_training(mut self, v: usize) -> Self {
        self.min_num_steps_before_training = v;
        self
    }

    /// Sets the upper bound of the warmup.
    pub fn max_warmup_steps(mut self, v: usize) -> Self {
        self.max_warmup_steps = v;
        self
    }

    /// Sets the maximum length of a path.
    pub fn max_path_length(mut self, v: usize) -> Self {
        self.max_path_length = v;
        self
    }

    /// Sets the directory of snapshots.
    pub fn snapshot_dir(mut self, v: impl Into<String>) -> Self {
        self.snapshot_dir = Some(v.into());
        self
    }

    /// Sets the interval of snapshots in epochs.
    pub fn snapshot_gap(mut self, v: usize) -> Self {
        self.snapshot_gap = v;
        self
    }

    /// Saves replay buffers in snapshots.
    pub fn save_replay_buffers(mut self, v: bool) -> Self {
        self.save_replay_buffers = v;
        self
    }

    /// Makes environment errors fatal.
    pub fn strict_env_errors(mut self, v: bool) -> Self {
        self.strict_env_errors = v;
        self
    }

    /// Constructs [`AlgorithmConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`AlgorithmConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_algorithm_config() -> Result<()> {
        let config = AlgorithmConfig::default()
            .num_epochs(3)
            .snapshot_dir("snapshots")
            .strict_env_errors(true);

        let dir = TempDir::new("algorithm_config")?;
        let path = dir.path().join("algorithm_config.yaml");
        config.save(&path)?;
        let config_ = AlgorithmConfig::load(&path)?;
        assert_eq!(config, config_);
        Ok(())
    }
}
