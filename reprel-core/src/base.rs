//! Core functionalities.
mod env;
mod planner;
mod policy;
mod replay_buffer;
mod step;
mod value_function;
pub use env::{Env, Obs};
pub use planner::Planner;
pub use policy::Policy;
pub use replay_buffer::{ExperienceBufferBase, ReplayBufferBase};
pub use step::{Info, Step};
pub use value_function::ValueFunction;
