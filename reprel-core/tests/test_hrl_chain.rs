use anyhow::Result;
use reprel_core::{
    algorithm::{Algorithm, AlgorithmConfig},
    collector::{HrlPathCollector, PathCollector, PlannerPathCollector, TerminationReason},
    critic::{IntrinsicCritic, SubgoalCritic},
    dummy::{ChainEnv, ChainEnvConfig, ChainPlanner, LinearQ, LinearQConfig},
    error::HrlError,
    exploration::{EpsilonGreedy, ExplorationStrategy, Explorer},
    operator::OperatorBank,
    record::BufferedRecorder,
    replay_buffer::SimpleReplayBufferConfig,
    snapshot::EpochSnapshot,
    trainer::{Trainer, TrainerConfig},
    transfer::Transfer,
    Env, Planner, ValueFunction,
};
use tempdir::TempDir;

const N_FACTS: usize = 3;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn critic() -> Result<SubgoalCritic> {
    ChainEnv::critic(N_FACTS, 30.0, -0.1)
}

fn env(seed: i64) -> Result<ChainEnv> {
    ChainEnv::build(&ChainEnvConfig::default().n_facts(N_FACTS), seed)
}

fn bank(obs_dim: usize, n_actions: usize) -> Result<OperatorBank<LinearQ>> {
    let dims = ChainEnv::operator_names(N_FACTS)
        .into_iter()
        .map(|op| (op, (obs_dim, n_actions)))
        .collect::<Vec<_>>();
    OperatorBank::build(
        &dims,
        Some(obs_dim),
        &LinearQConfig::default(),
        &SimpleReplayBufferConfig::default().capacity(10_000),
    )
}

fn collector(seed: i64, explore: bool) -> Result<HrlPathCollector<ChainEnv, SubgoalCritic>> {
    let collector = HrlPathCollector::new(env(seed)?, critic()?, seed as u64);
    Ok(match explore {
        true => collector
            .explorer(Explorer::epsilon_greedy(true, 4))
            .meta_explorer(Explorer::epsilon_greedy(true, 4)),
        false => collector,
    })
}

#[test]
fn test_shaped_reward_of_fact_flip() -> Result<()> {
    let critic = critic()?;
    let s = vec![0., 0., 0., 0., 0.];
    let s_next = vec![1., 0., 1., 0., 0.];

    assert!(critic.is_terminal(&s, 0, &s_next, "set_fact_0"));
    assert_eq!(critic.shaped_reward(&s, 0, &s_next, "set_fact_0", 0.5), 30.5);
    assert!(!critic.is_terminal(&s, 0, &s_next, "set_fact_1"));
    assert_eq!(critic.shaped_reward(&s, 0, &s_next, "set_fact_1", 0.5), 0.4);
    Ok(())
}

#[test]
fn test_insufficient_data_names_every_operator() -> Result<()> {
    let env = env(0)?;
    let mut bank = bank(env.obs_dim(), env.n_actions())?;
    let trainer = Trainer::build(TrainerConfig::default().batch_size(8))?;

    for key in bank.keys() {
        let err = trainer.train_operator(&mut bank, key).unwrap_err();
        match err.downcast_ref::<HrlError>() {
            Some(HrlError::InsufficientData {
                operator,
                requested,
                available,
            }) => {
                assert_eq!(operator, bank.slot(key)?.name());
                assert_eq!(*requested, 8);
                assert_eq!(*available, 0);
            }
            e => panic!("unexpected error {:?}", e),
        }
    }
    Ok(())
}

#[test]
fn test_epsilon_is_monotone_over_epochs() {
    let mut explorer = Explorer::epsilon_greedy(true, 10);
    let mut prev = explorer.epsilon();
    for epoch in 0..10 {
        explorer.on_epoch_end(epoch);
        assert!(explorer.epsilon() <= prev);
        assert!(explorer.epsilon() >= 0.1 - 1e-9);
        prev = explorer.epsilon();
    }

    let mut explorer = Explorer::EpsilonGreedy(EpsilonGreedy::default());
    for epoch in 0..10 {
        explorer.on_epoch_end(epoch);
        assert_eq!(explorer.epsilon(), 0.1);
    }
}

#[test]
fn test_train_then_transfer() -> Result<()> {
    init();
    let dir = TempDir::new("test_hrl_chain")?;
    let snapshot_dir = dir.path().join("snapshots");
    let (obs_dim, n_actions) = {
        let env = env(0)?;
        (env.obs_dim(), env.n_actions())
    };

    let config = AlgorithmConfig::default()
        .num_epochs(4)
        .num_eval_steps_per_epoch(30)
        .num_trains_per_train_loop(10)
        .num_expl_steps_per_train_loop(30)
        .min_num_steps_before_training(30)
        .max_path_length(15)
        .snapshot_dir(snapshot_dir.to_string_lossy())
        .snapshot_gap(20);
    let trainer = Trainer::build(TrainerConfig::default().batch_size(4).target_update_period(5))?;
    let mut algo = Algorithm::build(
        config,
        trainer,
        bank(obs_dim, n_actions)?,
        collector(0, true)?,
        collector(1, false)?,
    )?;
    let mut recorder = BufferedRecorder::new();
    algo.train(&mut recorder)?;

    assert_eq!(recorder.len(), 4);
    for record in recorder.iter() {
        assert!(record.get_scalar("exploration/epsilon").is_ok());
        assert!(record.get_scalar("exploration/meta_epsilon").is_ok());
        assert!(record.get_scalar("trainer/num_train_steps").is_ok());
    }
    // Snapshots at the first and the last epoch.
    assert!(snapshot_dir.join("itr_0").is_dir());
    assert!(snapshot_dir.join("itr_3").is_dir());

    let snapshot = EpochSnapshot::load(&snapshot_dir.join("itr_3"))?;
    assert_eq!(snapshot.epoch, 3);
    assert_eq!(snapshot.n_train_steps, 40);
    assert!(snapshot.exploration.explorer.epsilon() < 1.0);

    // Pretrained operators with fresh buffers keep identifiers and dimensions.
    let transfer = Transfer::open(&snapshot_dir)?;
    let pretrained: OperatorBank<LinearQ> = transfer.load_bank(
        &LinearQConfig::default(),
        &SimpleReplayBufferConfig::default(),
    )?;
    assert_eq!(pretrained.operator_names(), algo.bank().operator_names());
    assert_eq!(pretrained.num_transitions(), 0);
    for (a, b) in pretrained.slots().zip(algo.bank().slots()) {
        assert_eq!(a.name(), b.name());
        assert_eq!(a.obs_dim(), b.obs_dim());
        assert_eq!(a.n_actions(), b.n_actions());
        assert_eq!(a.qf().forward_one(&vec![1.0; obs_dim])?, b.qf().forward_one(&vec![1.0; obs_dim])?);
    }

    let mut algo = Algorithm::build(
        AlgorithmConfig::default()
            .num_epochs(1)
            .num_eval_steps_per_epoch(15)
            .num_trains_per_train_loop(2)
            .num_expl_steps_per_train_loop(15)
            .min_num_steps_before_training(15)
            .max_path_length(15),
        Trainer::build(TrainerConfig::default().batch_size(2))?,
        pretrained,
        collector(2, true)?,
        collector(3, false)?,
    )?;
    algo.train(&mut BufferedRecorder::new())?;
    assert_eq!(algo.trainer().n_train_steps(), 2);
    Ok(())
}

#[test]
fn test_planner_collection_solves_chain() -> Result<()> {
    let env = env(0)?;
    let planner = ChainPlanner::new(N_FACTS);
    let dims = planner.dims();
    let dims = planner
        .operators()
        .into_iter()
        .map(|op| {
            let d = dims[&op];
            (op, d)
        })
        .collect::<Vec<_>>();
    let bank: OperatorBank<LinearQ> = OperatorBank::build(
        &dims,
        None,
        &LinearQConfig::default(),
        &SimpleReplayBufferConfig::default(),
    )?;

    let mut collector = PlannerPathCollector::new(env, planner, 0)
        .explorer(Explorer::EpsilonGreedy(EpsilonGreedy::default().eps(1.0)))
        .task_terminal_reward(30.0);
    PathCollector::<LinearQ>::validate(&collector, &bank)?;
    let paths = collector.collect_new_paths(&bank, 50, 200, false)?;
    assert!(paths
        .iter()
        .any(|p| p.termination == TerminationReason::EnvTerminal));
    Ok(())
}
