//! The office world: a grid where an agent fetches coffee and mail and brings them
//! to the office.
//!
//! It provides the environment, the critic of the operators `get_mail`, `get_coffee`
//! and `visit_office`, and a symbolic planner over the same operators.
mod critic;
mod env;
mod planner;
pub use critic::{office_critic, OPERATORS};
pub use env::{OfficeAct, OfficeEnv, OfficeEnvConfig, OfficeTask, FACTS, FACT_OFFSET};
pub use planner::OfficePlanner;
