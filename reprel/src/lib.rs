//! Hierarchical reinforcement learning with operator-level Q-learning in Rust.
//!
//! Reprel consists of the following crates:
//!
//! * [reprel-core](reprel_core) provides the contracts of environments, planners and
//!   value functions, the operator bank with its replay buffers, path collectors, the
//!   Q-learning trainer, the epoch loop, snapshots and transfer of pretrained operators.
//! * [reprel-candle-agent](reprel_candle_agent) implements Q-networks based on
//!   [candle](https://crates.io/crates/candle-core).
//! * [reprel-office-env](reprel_office_env) is an office grid world with the operators
//!   `get_mail`, `get_coffee` and `visit_office`, their critic and a symbolic planner.
//! * [reprel-tensorboard](reprel_tensorboard) has `TensorboardRecorder` to write records
//!   which can be shown in Tensorboard.
//!
//! This crate re-exports them and holds the examples:
//!
//! * `office_hdqn` - hierarchical DQN, operators chosen by a meta-controller.
//! * `office_reprel` - operators chosen by the planner.
//! * `office_transfer_hdqn` - hierarchical DQN starting from pretrained operators.
pub use reprel_candle_agent;
pub use reprel_core;
pub use reprel_office_env;
pub use reprel_tensorboard;
