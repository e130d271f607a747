//! Q-learning updates of every operator of a bank.
mod config;
use crate::{
    error::HrlError,
    operator::{OperatorBank, OperatorKey},
    record::{Record, RecordValue},
    ReplayBufferBase, ValueFunction,
};
use anyhow::Result;
pub use config::TrainerConfig;
use log::trace;

/// Performs DQN updates on the operators of an [`OperatorBank`].
///
/// For each operator, including the meta-controller, a training step samples a batch
/// from the operator's buffer, computes the targets
///
/// ```text
/// y = r + discount * (1 - terminal) * max_a target_qf(o')[a]
/// ```
///
/// and takes one gradient step on `(qf(o)[a] - y)^2`. Operators share nothing.
/// Every `target_update_period` training steps the online weights of all operators are
/// copied into their targets.
pub struct Trainer {
    config: TrainerConfig,
    n_train_steps: usize,
}

impl Trainer {
    /// Constructs a trainer.
    pub fn build(config: TrainerConfig) -> Result<Self> {
        if config.batch_size == 0 || config.target_update_period == 0 {
            return Err(HrlError::Configuration(format!(
                "batch size and target update period must be positive: {:?}",
                config
            ))
            .into());
        }
        Ok(Self {
            config,
            n_train_steps: 0,
        })
    }

    /// Configuration of the trainer.
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// The number of training steps done so far.
    pub fn n_train_steps(&self) -> usize {
        self.n_train_steps
    }

    /// Sets the number of training steps, used when resuming from a snapshot.
    pub fn set_n_train_steps(&mut self, v: usize) {
        self.n_train_steps = v;
    }

    /// Performs one update of a single operator and returns the loss.
    ///
    /// Fails with [`HrlError::InsufficientData`] if the operator's buffer holds fewer
    /// than `batch_size` transitions.
    pub fn train_operator<Q: ValueFunction>(
        &self,
        bank: &mut OperatorBank<Q>,
        key: OperatorKey,
    ) -> Result<f32> {
        let discount = self.config.discount;
        let (qf, target_qf, buffer) = bank.slot_mut(key)?.parts_mut();
        let batch = buffer.batch(self.config.batch_size)?;

        let next_q = target_qf.forward(&batch.next_obs)?;
        let targets = next_q
            .outer_iter()
            .zip(batch.reward.iter().zip(batch.is_terminated.iter()))
            .map(|(q, (&r, &d))| {
                let max_q = q.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
                r + discount * (1 - d) as f32 * max_q
            })
            .collect::<Vec<_>>();

        qf.fit(&batch.obs, &batch.act, &targets)
    }

    /// Performs one update of every operator of the bank.
    ///
    /// The returned record holds the loss of each operator under `loss/<operator>`.
    pub fn train_step<Q: ValueFunction>(&mut self, bank: &mut OperatorBank<Q>) -> Result<Record> {
        let mut record = Record::empty();

        for key in bank.keys() {
            let loss = self.train_operator(bank, key)?;
            let name = bank.slot(key)?.name().to_string();
            trace!("Loss of {:?}: {}", name, loss);
            record.insert(format!("loss/{}", name), RecordValue::Scalar(loss));
        }

        self.n_train_steps += 1;
        if self.n_train_steps % self.config.target_update_period == 0 {
            bank.sync_targets()?;
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dummy::{LinearQ, LinearQConfig},
        operator::METACONTROLLER,
        replay_buffer::{SimpleReplayBufferConfig, Transition},
        ExperienceBufferBase,
    };
    use ndarray::Array2;

    fn bank() -> Result<OperatorBank<LinearQ>> {
        let dims = vec![("a".to_string(), (2, 2)), ("b".to_string(), (2, 2))];
        let config = LinearQConfig {
            learning_rate: 0.5,
            init_bias: 0.0,
        };
        OperatorBank::build(&dims, Some(2), &config, &SimpleReplayBufferConfig::default())
    }

    fn fill(bank: &mut OperatorBank<LinearQ>, n: usize) -> Result<()> {
        for key in bank.keys() {
            let buffer = bank.slot_mut(key)?.buffer_mut();
            for _ in 0..n {
                buffer.push(Transition::new(vec![1., 0.], 1, 1.0, vec![0., 1.], true))?;
            }
        }
        Ok(())
    }

    #[test]
    fn test_insufficient_data_for_every_operator() -> Result<()> {
        let mut bank = bank()?;
        let trainer = Trainer::build(TrainerConfig::default().batch_size(4))?;
        for key in bank.keys() {
            let err = trainer.train_operator(&mut bank, key).unwrap_err();
            let name = bank.slot(key)?.name().to_string();
            assert_eq!(
                err.downcast_ref::<HrlError>(),
                Some(&HrlError::InsufficientData {
                    operator: name,
                    requested: 4,
                    available: 0
                })
            );
        }
        Ok(())
    }

    #[test]
    fn test_terminal_targets_converge_to_reward() -> Result<()> {
        let mut bank = bank()?;
        fill(&mut bank, 8)?;
        let mut trainer = Trainer::build(
            TrainerConfig::default()
                .batch_size(4)
                .target_update_period(1000),
        )?;
        for _ in 0..200 {
            trainer.train_step(&mut bank)?;
        }
        let obs = Array2::from_shape_vec((1, 2), vec![1., 0.])?;
        let q = bank.slot(bank.key("a")?)?.qf().forward(&obs)?;
        assert!((q[[0, 1]] - 1.0).abs() < 1e-2);
        assert_eq!(trainer.n_train_steps(), 200);

        let record = trainer.train_step(&mut bank)?;
        assert!(record.get_scalar("loss/a").is_ok());
        assert!(record.get_scalar(&format!("loss/{}", METACONTROLLER)).is_ok());
        Ok(())
    }

    #[test]
    fn test_target_sync_period() -> Result<()> {
        let mut bank = bank()?;
        fill(&mut bank, 8)?;
        let mut trainer =
            Trainer::build(TrainerConfig::default().batch_size(4).target_update_period(3))?;
        let obs = Array2::from_shape_vec((1, 2), vec![1., 0.])?;
        let key = bank.key("b")?;

        trainer.train_step(&mut bank)?;
        trainer.train_step(&mut bank)?;
        let slot = bank.slot(key)?;
        assert_ne!(slot.qf().forward(&obs)?, slot.target_qf().forward(&obs)?);

        trainer.train_step(&mut bank)?;
        let slot = bank.slot(key)?;
        assert_eq!(slot.qf().forward(&obs)?, slot.target_qf().forward(&obs)?);
        Ok(())
    }
}
