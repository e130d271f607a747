use anyhow::Result;
use clap::Parser;
use reprel_candle_agent::{Device, QNet, QNetConfig};
use reprel_core::{
    algorithm::{Algorithm, AlgorithmConfig},
    collector::PlannerPathCollector,
    exploration::Explorer,
    operator::OperatorBank,
    replay_buffer::SimpleReplayBufferConfig,
    trainer::{Trainer, TrainerConfig},
    Env as _, Planner,
};
use reprel_office_env::{OfficeEnv, OfficeEnvConfig, OfficePlanner, OfficeTask};
use reprel_tensorboard::TensorboardRecorder;
use std::{fs, path::Path};

const TERMINAL_REWARD: f32 = 30.0;
const DISCOUNT_FACTOR: f32 = 0.99;
const TARGET_UPDATE_PERIOD: usize = 100;
const NUM_STEPS_PER_EPOCH: usize = 1000;
const SNAPSHOT_GAP: usize = 20;
const MODEL_DIR: &str = "./reprel/examples/office/model/office_reprel";

/// Train the operators chosen by the symbolic planner in the office world
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Task of the office world
    #[arg(long, alias = "env", default_value = "deliver-coffee-and-mail")]
    task: OfficeTask,

    /// The number of epochs
    #[arg(long, default_value_t = 100)]
    total_epochs: usize,

    #[arg(long, default_value_t = 2)]
    num_hidden_layers: usize,

    #[arg(long, default_value_t = 256)]
    num_hidden_units: usize,

    /// Capacity of the replay buffer of every operator
    #[arg(long, default_value_t = 1_000_000)]
    buffer_size: usize,

    #[arg(long, default_value_t = 3e-4)]
    learning_rate: f64,

    #[arg(long, default_value_t = 1000)]
    max_episode_length: usize,

    #[arg(long, default_value_t = 128)]
    batch_size: usize,

    /// Decay epsilon linearly over the epochs
    #[arg(long, default_value_t = false)]
    decay_epsilon: bool,

    /// Ordinal of the GPU, CPU if not given
    #[arg(long)]
    cuda: Option<usize>,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Directory of snapshots and TFRecord
    #[arg(long, default_value = MODEL_DIR)]
    model_dir: String,
}

mod config {
    use super::*;

    pub fn create_qf_config(args: &Args) -> QNetConfig {
        let device = match args.cuda {
            Some(n) => Device::Cuda(n),
            None => Device::Cpu,
        };
        QNetConfig::default()
            .hidden_layers(args.num_hidden_layers, args.num_hidden_units)
            .learning_rate(args.learning_rate)
            .device(device)
    }

    pub fn create_algorithm_config(args: &Args, num_steps: usize) -> AlgorithmConfig {
        AlgorithmConfig::default()
            .num_epochs(args.total_epochs)
            .num_eval_steps_per_epoch(num_steps)
            .num_trains_per_train_loop(num_steps)
            .num_expl_steps_per_train_loop(num_steps)
            .min_num_steps_before_training(num_steps)
            .max_path_length(args.max_episode_length)
            .snapshot_dir(args.model_dir.as_str())
            .snapshot_gap(SNAPSHOT_GAP)
    }

    pub fn create_trainer_config(args: &Args) -> TrainerConfig {
        TrainerConfig::default()
            .discount(DISCOUNT_FACTOR)
            .batch_size(args.batch_size)
            .target_update_period(TARGET_UPDATE_PERIOD)
    }
}

use config::{create_algorithm_config, create_qf_config, create_trainer_config};

fn train(args: &Args, env_config: OfficeEnvConfig, num_steps: usize) -> Result<()> {
    let model_dir = Path::new(&args.model_dir);
    fs::create_dir_all(model_dir)?;

    let config = create_algorithm_config(args, num_steps);
    let qf_config = create_qf_config(args);
    config.save(model_dir.join("algorithm.yaml"))?;
    qf_config.save(model_dir.join("qnet.yaml"))?;

    // Operators get their own observations from the planner.
    let planner = OfficePlanner::new(args.task)?;
    let bank = {
        let dims = planner.dims();
        let dims = planner
            .operators()
            .into_iter()
            .filter_map(|op| dims.get(&op).map(|&d| (op, d)))
            .collect::<Vec<_>>();
        let buffer_config = SimpleReplayBufferConfig::default()
            .capacity(args.buffer_size)
            .seed(args.seed);
        OperatorBank::<QNet>::build(&dims, None, &qf_config, &buffer_config)?
    };

    let expl_collector = {
        let env = OfficeEnv::build(&env_config, args.seed as i64)?;
        PlannerPathCollector::new(env, planner, args.seed)
            .explorer(Explorer::epsilon_greedy(args.decay_epsilon, args.total_epochs))
            .task_terminal_reward(TERMINAL_REWARD)
    };
    let eval_collector = {
        let env = OfficeEnv::build(&env_config, args.seed as i64 + 1)?;
        PlannerPathCollector::new(env, OfficePlanner::new(args.task)?, args.seed + 1)
    };

    let trainer = Trainer::build(create_trainer_config(args))?;
    let mut recorder = TensorboardRecorder::new(model_dir);
    let mut algo = Algorithm::build(config, trainer, bank, expl_collector, eval_collector)?;
    algo.train(&mut recorder)?;

    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let env_config = OfficeEnvConfig::default().task(args.task);
    train(&args, env_config, NUM_STEPS_PER_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_office_reprel() -> Result<()> {
        let tmp_dir = TempDir::new("office_reprel")?;
        let args = Args {
            task: OfficeTask::DeliverCoffeeAndMail,
            total_epochs: 2,
            num_hidden_layers: 1,
            num_hidden_units: 8,
            buffer_size: 1000,
            learning_rate: 1e-3,
            max_episode_length: 20,
            batch_size: 4,
            decay_epsilon: true,
            cuda: None,
            seed: 0,
            model_dir: tmp_dir.path().to_string_lossy().to_string(),
        };
        // S C M
        // . . O
        let env_config = OfficeEnvConfig::default()
            .task(args.task)
            .size(3, 2)
            .start((0, 1))
            .coffee(vec![(1, 1)])
            .mail(vec![(2, 1)])
            .office((2, 0))
            .decorations(vec![]);
        train(&args, env_config, 40)?;

        assert!(tmp_dir.path().join("itr_1").join("snapshot.yaml").is_file());
        Ok(())
    }
}
