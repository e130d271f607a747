use crate::env::OfficeEnv;
use anyhow::Result;
use reprel_core::critic::{SubgoalCritic, TerminationRule::Achieve};

/// Operators of the office world.
pub const OPERATORS: [&str; 3] = ["get_mail", "get_coffee", "visit_office"];

/// Critic of the office operators.
///
/// `get_coffee`, `get_mail` and `visit_office` terminate when `has_coffee`, `has_mail` and
/// `visited_office` become true, respectively.
pub fn office_critic(intrinsic_reward: f32, step_cost: f32) -> Result<SubgoalCritic> {
    SubgoalCritic::new(OfficeEnv::layout(), intrinsic_reward, step_cost)
        .rule("get_coffee", Achieve("has_coffee".into()))?
        .rule("get_mail", Achieve("has_mail".into()))?
        .rule("visit_office", Achieve("visited_office".into()))
}
