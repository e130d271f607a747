//! The outer training loop.
mod config;
use crate::{
    collector::{Path, PathCollector, TerminationReason},
    error::HrlError,
    operator::OperatorBank,
    record::{Record, RecordValue::Scalar, Recorder},
    replay_buffer::SimpleReplayBufferConfig,
    snapshot::{self, EpochSnapshot, SnapshotMode},
    trainer::Trainer,
    ValueFunction,
};
use anyhow::Result;
pub use config::AlgorithmConfig;
use log::{debug, info, warn};
use std::{path::Path as FsPath, time::SystemTime};

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Alternates exploration, training and evaluation over a fixed number of epochs.
///
/// # Training loop
///
/// 0. Given an [`OperatorBank`], a [`Trainer`], an exploration and an evaluation
///    [`PathCollector`], each driving its own environment instance.
/// 1. Warmup: collect `min_num_steps_before_training` exploration steps. If some replay
///    buffer still cannot provide a batch of `batch_size`, keep collecting paths until
///    all of them can, or fail with [`HrlError::InsufficientData`] after
///    `max_warmup_steps` steps.
/// 2. For `num_train_loops_per_epoch` times:
///     1. Collect `num_expl_steps_per_train_loop` exploration steps and push the paths
///        into the replay buffers of the bank.
///     2. Do `num_trains_per_train_loop` training steps.
/// 3. Collect `num_eval_steps_per_epoch` evaluation steps, discarding incomplete paths.
///    Evaluation paths are not stored.
/// 4. Call `end_epoch()` of both collectors, which updates the exploration rates,
///    and flush the diagnostics of the epoch to the recorder.
/// 5. Save a snapshot every `snapshot_gap` epochs and at the final epoch.
/// 6. Back to step 2 until `num_epochs` epochs are done.
///
/// An environment error aborts the path being collected. Transitions of the aborted
/// path are kept. If `strict_env_errors` is set the run fails with
/// [`HrlError::Environment`]; otherwise the rest of the epoch is skipped.
///
/// # Interaction of objects
///
/// ```mermaid
/// graph LR
///     A[OperatorBank]-->|value functions|B[PathCollector]
///     B -->|Path|C[Algorithm]
///     C -->|Path::push_into|A
///     A -->|TransitionBatch|D[Trainer]
///     D -->|gradient step|A
/// ```
pub struct Algorithm<Q, C1, C2>
where
    Q: ValueFunction,
    C1: PathCollector<Q>,
    C2: PathCollector<Q>,
{
    config: AlgorithmConfig,
    trainer: Trainer,
    bank: OperatorBank<Q>,
    expl_collector: C1,
    eval_collector: C2,

    /// Index of the next epoch.
    epoch: usize,

    /// Exploration environment steps so far, warmup included.
    n_env_steps: usize,
}

impl<Q, C1, C2> Algorithm<Q, C1, C2>
where
    Q: ValueFunction,
    C1: PathCollector<Q>,
    C2: PathCollector<Q>,
{
    /// Constructs the algorithm, checking the bank against both collectors.
    pub fn build(
        config: AlgorithmConfig,
        trainer: Trainer,
        bank: OperatorBank<Q>,
        expl_collector: C1,
        eval_collector: C2,
    ) -> Result<Self> {
        if config.max_path_length == 0 {
            return Err(
                HrlError::Configuration("max_path_length must be positive".to_string()).into(),
            );
        }
        expl_collector.validate(&bank)?;
        eval_collector.validate(&bank)?;

        Ok(Self {
            config,
            trainer,
            bank,
            expl_collector,
            eval_collector,
            epoch: 0,
            n_env_steps: 0,
        })
    }

    /// Configuration of the algorithm.
    pub fn config(&self) -> &AlgorithmConfig {
        &self.config
    }

    /// The operator bank.
    pub fn bank(&self) -> &OperatorBank<Q> {
        &self.bank
    }

    /// The trainer.
    pub fn trainer(&self) -> &Trainer {
        &self.trainer
    }

    /// The exploration path collector.
    pub fn expl_collector(&self) -> &C1 {
        &self.expl_collector
    }

    /// The evaluation path collector.
    pub fn eval_collector(&self) -> &C2 {
        &self.eval_collector
    }

    /// Index of the next epoch.
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    /// Exploration environment steps so far.
    pub fn n_env_steps(&self) -> usize {
        self.n_env_steps
    }

    /// Returns the bank, consuming the algorithm.
    pub fn into_bank(self) -> OperatorBank<Q> {
        self.bank
    }

    /// Resumes from a snapshot directory (`.../itr_<k>`).
    ///
    /// The value functions, trainer counters and exploration state are restored,
    /// replay buffers too if the snapshot holds them. Training continues at epoch `k + 1`.
    ///
    /// Random generators are not saved. Buffers are re-seeded from their saved seed and the
    /// collectors keep their construction seeds, so resuming twice gives the same run.
    pub fn restore(
        &mut self,
        dir: impl AsRef<FsPath>,
        qf_config: &Q::Config,
        buffer_config: &SimpleReplayBufferConfig,
    ) -> Result<()> {
        let dir = dir.as_ref();
        let snapshot = EpochSnapshot::load(dir)?;
        let bank = snapshot.load_bank(dir, qf_config, buffer_config, true)?;
        self.expl_collector.validate(&bank)?;
        self.eval_collector.validate(&bank)?;

        self.bank = bank;
        self.trainer.set_n_train_steps(snapshot.n_train_steps);
        self.expl_collector
            .restore_exploration_state(snapshot.exploration.clone());
        self.n_env_steps = snapshot.n_env_steps;
        self.epoch = snapshot.epoch + 1;
        info!("Resumed from {:?} at epoch {}", dir, self.epoch);
        Ok(())
    }

    /// Returns the snapshot of the current state after `epoch`.
    pub fn snapshot(&self, epoch: usize) -> EpochSnapshot {
        EpochSnapshot::new(
            epoch,
            &self.bank,
            self.trainer.config().clone(),
            self.trainer.n_train_steps(),
            self.n_env_steps,
            self.expl_collector.exploration_state(),
            self.config.save_replay_buffers,
        )
    }

    fn snapshot_mode(&self) -> SnapshotMode {
        match self.config.snapshot_dir {
            None => SnapshotMode::None,
            Some(_) => SnapshotMode::GapAndLast(self.config.snapshot_gap),
        }
    }

    fn save_snapshot(&self, epoch: usize) -> Result<()> {
        if let Some(dir) = self.config.snapshot_dir.as_ref() {
            let dir = snapshot::epoch_dir(FsPath::new(dir), epoch);
            self.snapshot(epoch).save(&dir, &self.bank)?;
        }
        Ok(())
    }

    /// Returns the reason of the aborted path, if any.
    fn aborted(paths: &[Path]) -> Option<String> {
        paths.iter().find_map(|p| match &p.termination {
            TerminationReason::Aborted(reason) => Some(reason.clone()),
            _ => None,
        })
    }

    /// Collects exploration paths and pushes them into the bank.
    ///
    /// Returns the number of collected steps and the reason of an abort.
    fn explore(&mut self, num_steps: usize) -> Result<(usize, Option<String>)> {
        let paths = self.expl_collector.collect_new_paths(
            &self.bank,
            self.config.max_path_length,
            num_steps,
            false,
        )?;
        let mut n_steps = 0;
        for path in paths.iter() {
            path.push_into(&mut self.bank)?;
            n_steps += path.len();
        }
        self.n_env_steps += n_steps;

        let aborted = Self::aborted(&paths);
        if let Some(reason) = aborted.as_ref() {
            if self.config.strict_env_errors {
                return Err(HrlError::Environment(reason.clone()).into());
            }
        }
        Ok((n_steps, aborted))
    }

    /// Fills the replay buffers before the first training step.
    pub fn warmup(&mut self) -> Result<()> {
        let batch_size = self.trainer.config().batch_size;
        let mut n_warmup = 0;

        if self.n_env_steps < self.config.min_num_steps_before_training {
            let n = self.config.min_num_steps_before_training - self.n_env_steps;
            info!("Warmup with {} exploration steps", n);
            while n_warmup < n {
                let (n_steps, aborted) = self.explore(n - n_warmup)?;
                if let Some(reason) = aborted {
                    warn!("Path aborted in warmup: {}", reason);
                }
                if n_steps == 0 {
                    return Err(HrlError::Environment("no step collected in warmup".to_string()).into());
                }
                n_warmup += n_steps;
            }
        }

        loop {
            let pending = self.bank.pending(batch_size);
            let (name, available) = match pending.first() {
                None => break,
                Some(p) => p.clone(),
            };
            if n_warmup >= self.config.max_warmup_steps {
                return Err(HrlError::InsufficientData {
                    operator: name,
                    requested: batch_size,
                    available,
                }
                .into());
            }
            debug!("Replay buffers with less than {} transitions: {:?}", batch_size, pending);

            let chunk = self
                .config
                .max_path_length
                .min(self.config.max_warmup_steps - n_warmup);
            let (n_steps, aborted) = self.explore(chunk)?;
            if let Some(reason) = aborted {
                warn!("Path aborted in warmup: {}", reason);
            }
            if n_steps == 0 {
                return Err(HrlError::Environment("no step collected in warmup".to_string()).into());
            }
            n_warmup += n_steps;
        }

        if n_warmup > 0 {
            info!(
                "Warmup done with {} steps, {} transitions stored",
                n_warmup,
                self.bank.num_transitions()
            );
        }
        Ok(())
    }

    /// Runs one epoch and returns its diagnostics.
    fn run_epoch(&mut self, recorder: &mut dyn Recorder) -> Result<Record> {
        let epoch = self.epoch;
        let timer = SystemTime::now();
        let mut skipped = false;

        for _ in 0..self.config.num_train_loops_per_epoch {
            let (_, aborted) = self.explore(self.config.num_expl_steps_per_train_loop)?;
            if let Some(reason) = aborted {
                warn!("Skipped the rest of epoch {}: {}", epoch, reason);
                skipped = true;
                break;
            }

            for _ in 0..self.config.num_trains_per_train_loop {
                let record = self.trainer.train_step(&mut self.bank)?;
                recorder.store(record.with_prefix("trainer"));
            }
        }

        let mut record = Record::empty();
        if !skipped {
            let paths = self.eval_collector.collect_new_paths(
                &self.bank,
                self.config.max_path_length,
                self.config.num_eval_steps_per_epoch,
                true,
            )?;
            if let Some(reason) = Self::aborted(&paths) {
                if self.config.strict_env_errors {
                    return Err(HrlError::Environment(reason).into());
                }
                warn!("Evaluation path aborted in epoch {}: {}", epoch, reason);
            }
            record.merge_inplace(self.eval_collector.diagnostics().with_prefix("evaluation"));
        }
        record.merge_inplace(self.expl_collector.diagnostics().with_prefix("exploration"));

        record.insert("epoch", Scalar(epoch as f32));
        record.insert("skipped", Scalar(if skipped { 1.0 } else { 0.0 }));
        record.insert("trainer/num_train_steps", Scalar(self.trainer.n_train_steps() as f32));
        record.insert("num_env_steps_total", Scalar(self.n_env_steps as f32));
        record.insert("epoch_time", Scalar(timer.elapsed()?.as_secs_f32()));
        Ok(record)
    }

    /// Trains until `num_epochs` epochs are done.
    pub fn train(&mut self, recorder: &mut dyn Recorder) -> Result<()> {
        self.warmup()?;
        let num_epochs = self.config.num_epochs;
        let mode = self.snapshot_mode();

        while self.epoch < num_epochs {
            let epoch = self.epoch;
            let record = self.run_epoch(recorder)?;
            if let Ok(ret) = record.get_scalar("evaluation/returns_mean") {
                info!("Epoch {}: evaluation return {}", epoch, ret);
            } else {
                info!("Epoch {} done", epoch);
            }
            recorder.store(record);
            recorder.flush(epoch as _);

            self.expl_collector.end_epoch(epoch);
            self.eval_collector.end_epoch(epoch);
            if mode.is_due(epoch, num_epochs) {
                self.save_snapshot(epoch)?;
            }
            self.epoch += 1;
        }

        Ok(())
    }
}
