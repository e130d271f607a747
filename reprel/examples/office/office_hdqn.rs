use anyhow::Result;
use clap::Parser;
use reprel_candle_agent::{Device, QNet, QNetConfig};
use reprel_core::{
    algorithm::{Algorithm, AlgorithmConfig},
    collector::HrlPathCollector,
    critic::SubgoalCritic,
    exploration::Explorer,
    operator::OperatorBank,
    replay_buffer::SimpleReplayBufferConfig,
    trainer::{Trainer, TrainerConfig},
    Env as _,
};
use reprel_office_env::{office_critic, OfficeEnv, OfficeEnvConfig, OfficeTask, OPERATORS};
use reprel_tensorboard::TensorboardRecorder;
use std::{fs, path::Path};

const INTRINSIC_REWARD: f32 = 30.0;
const INTRINSIC_COST: f32 = -0.1;
const DISCOUNT_FACTOR: f32 = 0.99;
const TARGET_UPDATE_PERIOD: usize = 100;
const NUM_STEPS_PER_EPOCH: usize = 1000;
const SNAPSHOT_GAP: usize = 20;
const MODEL_DIR: &str = "./reprel/examples/office/model/office_hdqn";

/// Train hierarchical DQN in the office world
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Task of the office world
    #[arg(long, alias = "env", default_value = "deliver-mail")]
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

fn create_qf_config(args: &Args) -> QNetConfig {
    let device = match args.cuda {
        Some(n) => Device::Cuda(n),
        None => Device::Cpu,
    };
    QNetConfig::default()
        .hidden_layers(args.num_hidden_layers, args.num_hidden_units)
        .learning_rate(args.learning_rate)
        .device(device)
}

fn create_algorithm_config(args: &Args, num_steps: usize) -> AlgorithmConfig {
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

fn create_collector(
    env_config: &OfficeEnvConfig,
    explorer: Option<Explorer>,
    seed: u64,
) -> Result<HrlPathCollector<OfficeEnv, SubgoalCritic>> {
    let env = OfficeEnv::build(env_config, seed as i64)?;
    let collector = HrlPathCollector::new(env, office_critic(INTRINSIC_REWARD, INTRINSIC_COST)?, seed);
    Ok(match explorer {
        Some(explorer) => collector.explorer(explorer.clone()).meta_explorer(explorer),
        None => collector,
    })
}

fn train(args: &Args, env_config: OfficeEnvConfig, num_steps: usize) -> Result<()> {
    let model_dir = Path::new(&args.model_dir);
    fs::create_dir_all(model_dir)?;

    let config = create_algorithm_config(args, num_steps);
    let qf_config = create_qf_config(args);
    config.save(model_dir.join("algorithm.yaml"))?;
    qf_config.save(model_dir.join("qnet.yaml"))?;

    let expl_collector = create_collector(
        &env_config,
        Some(Explorer::epsilon_greedy(args.decay_epsilon, args.total_epochs)),
        args.seed,
    )?;
    let eval_collector = create_collector(&env_config, None, args.seed + 1)?;

    let bank = {
        let env = expl_collector.env();
        let (obs_dim, n_actions) = (env.obs_dim(), env.n_actions());
        let dims = OPERATORS
            .iter()
            .map(|op| (op.to_string(), (obs_dim, n_actions)))
            .collect::<Vec<_>>();
        let buffer_config = SimpleReplayBufferConfig::default()
            .capacity(args.buffer_size)
            .seed(args.seed);
        OperatorBank::<QNet>::build(&dims, Some(obs_dim), &qf_config, &buffer_config)?
    };
    let trainer = Trainer::build(
        TrainerConfig::default()
            .discount(DISCOUNT_FACTOR)
            .batch_size(args.batch_size)
            .target_update_period(TARGET_UPDATE_PERIOD),
    )?;

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
    fn test_office_hdqn() -> Result<()> {
        let tmp_dir = TempDir::new("office_hdqn")?;
        let args = Args {
            task: OfficeTask::DeliverMail,
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

        assert!(tmp_dir.path().join("algorithm.yaml").is_file());
        assert!(tmp_dir.path().join("itr_0").is_dir());
        assert!(tmp_dir.path().join("itr_1").is_dir());
        Ok(())
    }
}
