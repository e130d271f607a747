use anyhow::Result;
use clap::Parser;
use log::info;
use reprel_candle_agent::{Device, QNet, QNetConfig};
use reprel_core::{
    algorithm::{Algorithm, AlgorithmConfig},
    collector::HrlPathCollector,
    critic::SubgoalCritic,
    exploration::Explorer,
    operator::{OperatorBank, OperatorSlot, METACONTROLLER},
    replay_buffer::SimpleReplayBufferConfig,
    trainer::{Trainer, TrainerConfig},
    transfer::Transfer,
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
const MODEL_DIR: &str = "./reprel/examples/office/model/office_transfer_hdqn";

/// Train hierarchical DQN in the office world starting from pretrained operators
///
/// The meta-controller of the snapshot is kept as well. Without `--transfer`, every value
/// function is trained from scratch.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Task of the office world
    #[arg(long, alias = "env", default_value = "deliver-coffee-and-mail")]
    task: OfficeTask,

    /// Snapshot directory of the pretrained operators, the latest snapshot is used
    /// if it holds `itr_<epoch>` directories
    #[arg(long)]
    transfer: Option<String>,

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

    pub fn create_buffer_config(args: &Args) -> SimpleReplayBufferConfig {
        SimpleReplayBufferConfig::default()
            .capacity(args.buffer_size)
            .seed(args.seed)
    }
}

use config::{create_algorithm_config, create_buffer_config, create_qf_config};

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

/// Pretrained operators and meta-controller, or a fresh bank.
///
/// A new meta-controller is attached only when the snapshot holds none.
fn create_bank(args: &Args, obs_dim: usize, n_actions: usize) -> Result<OperatorBank<QNet>> {
    let qf_config = create_qf_config(args);
    let buffer_config = create_buffer_config(args);

    match args.transfer.as_ref() {
        Some(dir) => {
            let transfer = Transfer::open(dir)?;
            info!(
                "Transfer operators {:?} from {:?}",
                transfer.operators(),
                transfer.dir()
            );
            let bank = transfer.load_bank::<QNet>(&qf_config, &buffer_config)?;
            if bank.has_meta() {
                return Ok(bank);
            }
            info!("No meta-controller in the snapshot, starting a new one");
            let (operators, _) = bank.into_slots();
            let meta = OperatorSlot::build(
                METACONTROLLER,
                &qf_config,
                obs_dim,
                operators.len(),
                &buffer_config.clone().seed(args.seed + operators.len() as u64),
            )?;
            OperatorBank::from_slots(operators, Some(meta))
        }
        None => {
            let dims = OPERATORS
                .iter()
                .map(|op| (op.to_string(), (obs_dim, n_actions)))
                .collect::<Vec<_>>();
            OperatorBank::build(&dims, Some(obs_dim), &qf_config, &buffer_config)
        }
    }
}

fn train(args: &Args, env_config: OfficeEnvConfig, num_steps: usize) -> Result<()> {
    let model_dir = Path::new(&args.model_dir);
    fs::create_dir_all(model_dir)?;

    let config = create_algorithm_config(args, num_steps);
    config.save(model_dir.join("algorithm.yaml"))?;
    create_qf_config(args).save(model_dir.join("qnet.yaml"))?;

    let expl_collector = create_collector(
        &env_config,
        Some(Explorer::epsilon_greedy(args.decay_epsilon, args.total_epochs)),
        args.seed,
    )?;
    let eval_collector = create_collector(&env_config, None, args.seed + 1)?;
    let bank = {
        let env = expl_collector.env();
        create_bank(args, env.obs_dim(), env.n_actions())?
    };
    let trainer = Trainer::build(
        TrainerConfig::default()
            .discount(DISCOUNT_FACTOR)
            .batch_size(args.batch_size)
            .target_update_period(TARGET_UPDATE_PERIOD),
    )?;

    // Dimensions of the pretrained operators are checked against the environment here.
    let mut algo = Algorithm::build(config, trainer, bank, expl_collector, eval_collector)?;
    let mut recorder = TensorboardRecorder::new(model_dir);
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
    use reprel_core::{
        snapshot::{self, OPERATOR_QFS},
        ValueFunction,
    };
    use tempdir::TempDir;

    fn args(task: OfficeTask, transfer: Option<String>, model_dir: &Path) -> Args {
        Args {
            task,
            transfer,
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
            model_dir: model_dir.to_string_lossy().to_string(),
        }
    }

    fn env_config(task: OfficeTask) -> OfficeEnvConfig {
        // S C M
        // . . O
        OfficeEnvConfig::default()
            .task(task)
            .size(3, 2)
            .start((0, 1))
            .coffee(vec![(1, 1)])
            .mail(vec![(2, 1)])
            .office((2, 0))
            .decorations(vec![])
    }

    #[test]
    fn test_office_transfer_hdqn() -> Result<()> {
        let tmp_dir = TempDir::new("office_transfer_hdqn")?;
        let pretrain_dir = tmp_dir.path().join("pretrain");
        let transfer_dir = tmp_dir.path().join("transfer");

        let task = OfficeTask::DeliverMail;
        train(&args(task, None, &pretrain_dir), env_config(task), 40)?;

        let task = OfficeTask::DeliverCoffeeAndMail;
        let pretrained = Some(pretrain_dir.to_string_lossy().to_string());

        // The meta-controller comes from the snapshot with an empty buffer.
        let bank = create_bank(&args(task, pretrained.clone(), &transfer_dir), 5, 4)?;
        let meta = bank.meta().expect("meta-controller");
        let mut saved = QNet::build(&create_qf_config(&args(task, None, &transfer_dir)), 5, 3)?;
        let weights = snapshot::latest(&pretrain_dir)?
            .expect("pretrained snapshot")
            .join(OPERATOR_QFS)
            .join(format!("{}.{}", METACONTROLLER, QNet::WEIGHTS_EXTENSION));
        ValueFunction::load(&mut saved, &weights)?;
        for obs in [[0.0f32, 1.0, 0.0, 0.0, 0.0], [2.0, 1.0, 0.0, 1.0, 1.0]] {
            assert_eq!(meta.qf().forward_one(&obs)?, saved.forward_one(&obs)?);
        }
        assert_eq!(bank.num_transitions(), 0);

        train(&args(task, pretrained, &transfer_dir), env_config(task), 40)?;
        assert!(transfer_dir.join("itr_1").is_dir());

        // Pretrained weights of another architecture are rejected.
        let mut args = args(task, Some(pretrain_dir.to_string_lossy().to_string()), &transfer_dir);
        args.num_hidden_units = 16;
        assert!(train(&args, env_config(task), 40).is_err());
        Ok(())
    }
}
