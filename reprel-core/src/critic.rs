//! Option termination and intrinsic reward shaping.
//!
//! An [`IntrinsicCritic`] looks at a raw environment transition together with the
//! active operator and decides whether the operator has reached its sub-goal.
//! [`SubgoalCritic`] implements the common case where every operator is
//! associated with a symbolic fact embedded in the observation, e.g.,
//! `get_coffee` terminates when `has_coffee` flips from false to true.
mod fact_layout;
pub use fact_layout::FactLayout;

use crate::error::HrlError;
use anyhow::Result;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Decides operator termination and computes shaped rewards.
///
/// Implementations must be pure: identical arguments give identical outputs.
pub trait IntrinsicCritic {
    /// Returns `true` if `operator` reached its sub-goal on the transition.
    fn is_terminal(&self, state: &[f32], action: usize, next_state: &[f32], operator: &str) -> bool;

    /// Returns the shaped reward of the transition for `operator`.
    fn shaped_reward(
        &self,
        state: &[f32],
        action: usize,
        next_state: &[f32],
        operator: &str,
        extrinsic_reward: f32,
    ) -> f32;

    /// Evaluates termination and shaped reward on the same transition.
    fn evaluate(
        &self,
        state: &[f32],
        action: usize,
        next_state: &[f32],
        operator: &str,
        extrinsic_reward: f32,
    ) -> (bool, f32) {
        (
            self.is_terminal(state, action, next_state, operator),
            self.shaped_reward(state, action, next_state, operator, extrinsic_reward),
        )
    }

    /// Checks the critic against an environment and an operator list at setup.
    fn validate(
        &self,
        _env_layout: Option<&FactLayout>,
        _obs_dim: usize,
        _operators: &[String],
    ) -> Result<()> {
        Ok(())
    }
}

/// Termination condition of an operator over a named fact.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub enum TerminationRule {
    /// The fact is false in the state and true in the next state.
    Achieve(String),

    /// The fact is true in the state and false in the next state.
    Clear(String),
}

impl TerminationRule {
    fn fact(&self) -> &str {
        match self {
            Self::Achieve(fact) | Self::Clear(fact) => fact,
        }
    }
}

#[derive(Clone, Debug)]
struct ResolvedRule {
    ix: usize,
    achieve: bool,
}

/// Operator-indexed critic over symbolic facts.
///
/// Rules are enumerated explicitly per operator. An operator without a rule
/// never terminates by the critic; it can still end by the sub-episode length limit.
///
/// The shaped reward is `intrinsic_reward + r` on termination and `step_cost + r` otherwise,
/// where `r` is the extrinsic reward.
#[derive(Clone, Debug)]
pub struct SubgoalCritic {
    layout: FactLayout,
    rules: BTreeMap<String, ResolvedRule>,
    intrinsic_reward: f32,
    step_cost: f32,
}

impl SubgoalCritic {
    /// Constructs a critic without rules.
    pub fn new(layout: FactLayout, intrinsic_reward: f32, step_cost: f32) -> Self {
        Self {
            layout,
            rules: BTreeMap::new(),
            intrinsic_reward,
            step_cost,
        }
    }

    /// Adds the termination rule of an operator.
    ///
    /// Fails if the fact is not in the layout.
    pub fn rule(mut self, operator: impl Into<String>, rule: TerminationRule) -> Result<Self> {
        let operator = operator.into();
        let ix = self.layout.index_of(rule.fact()).ok_or_else(|| {
            HrlError::Configuration(format!(
                "fact {:?} of operator {:?} is not in the fact layout {:?}",
                rule.fact(),
                operator,
                self.layout.names()
            ))
        })?;
        let achieve = matches!(rule, TerminationRule::Achieve(_));
        self.rules.insert(operator, ResolvedRule { ix, achieve });
        Ok(self)
    }

    /// Fact layout the rules refer to.
    pub fn layout(&self) -> &FactLayout {
        &self.layout
    }

    /// Returns `true` if the operator has a termination rule.
    pub fn has_rule(&self, operator: &str) -> bool {
        self.rules.contains_key(operator)
    }
}

impl IntrinsicCritic for SubgoalCritic {
    /// Checks the critic against an environment and an operator list.
    ///
    /// The fact layout declared by the environment must be identical to the one the rules
    /// were written against. Operators without a rule are reported with a warning.
    fn validate(
        &self,
        env_layout: Option<&FactLayout>,
        obs_dim: usize,
        operators: &[String],
    ) -> Result<()> {
        match env_layout {
            None => {
                return Err(HrlError::Configuration(
                    "environment does not declare a fact layout".to_string(),
                )
                .into())
            }
            Some(layout) if layout != &self.layout => {
                return Err(HrlError::Configuration(format!(
                    "fact layout mismatch: environment {:?}, critic {:?}",
                    layout, self.layout
                ))
                .into())
            }
            _ => {}
        }
        self.layout.validate(obs_dim)?;

        for operator in operators.iter() {
            if !self.has_rule(operator) {
                warn!(
                    "No termination rule for operator {:?}; it is treated as non-terminal",
                    operator
                );
            }
        }

        Ok(())
    }

    fn is_terminal(&self, state: &[f32], _action: usize, next_state: &[f32], operator: &str) -> bool {
        match self.rules.get(operator) {
            Some(rule) => {
                let before = self.layout.fact(state, rule.ix);
                let after = self.layout.fact(next_state, rule.ix);
                if rule.achieve {
                    !before && after
                } else {
                    before && !after
                }
            }
            None => {
                debug!("Termination of unknown operator {:?} is ambiguous", operator);
                false
            }
        }
    }

    fn shaped_reward(
        &self,
        state: &[f32],
        action: usize,
        next_state: &[f32],
        operator: &str,
        extrinsic_reward: f32,
    ) -> f32 {
        if self.is_terminal(state, action, next_state, operator) {
            self.intrinsic_reward + extrinsic_reward
        } else {
            self.step_cost + extrinsic_reward
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn office() -> Result<SubgoalCritic> {
        let layout = FactLayout::new(2, ["has_coffee", "has_mail", "visited_office"]);
        SubgoalCritic::new(layout, 30., -0.1)
            .rule("get_coffee", TerminationRule::Achieve("has_coffee".into()))?
            .rule("get_mail", TerminationRule::Achieve("has_mail".into()))?
            .rule("visit_office", TerminationRule::Achieve("visited_office".into()))
    }

    #[test]
    fn test_shaped_reward_on_fact_flip() -> Result<()> {
        let critic = office()?;
        let s = [1., 1., 0., 0., 0.];
        let s_next = [1., 2., 0., 1., 0.];

        assert!(critic.is_terminal(&s, 0, &s_next, "get_mail"));
        assert_eq!(critic.shaped_reward(&s, 0, &s_next, "get_mail", 0.5), 30.5);

        assert!(!critic.is_terminal(&s, 0, &s_next, "get_coffee"));
        assert_eq!(critic.shaped_reward(&s, 0, &s_next, "get_coffee", 0.5), -0.1 + 0.5);
        Ok(())
    }

    #[test]
    fn test_fact_already_true_is_not_terminal() -> Result<()> {
        let critic = office()?;
        let s = [0., 0., 1., 0., 0.];
        let s_next = [0., 1., 1., 0., 0.];
        assert!(!critic.is_terminal(&s, 3, &s_next, "get_coffee"));
        Ok(())
    }

    #[test]
    fn test_deterministic() -> Result<()> {
        let critic = office()?;
        let s = [0., 0., 0., 0., 0.];
        let s_next = [0., 0., 0., 0., 1.];
        let first = critic.evaluate(&s, 1, &s_next, "visit_office", -1.);
        for _ in 0..10 {
            assert_eq!(critic.evaluate(&s, 1, &s_next, "visit_office", -1.), first);
        }
        assert_eq!(first, (true, 29.));
        Ok(())
    }

    #[test]
    fn test_unknown_operator_is_non_terminal() -> Result<()> {
        let critic = office()?;
        let s = [0., 0., 0., 0., 0.];
        let s_next = [0., 0., 1., 1., 1.];
        assert!(!critic.is_terminal(&s, 0, &s_next, "go_to_office"));
        assert_eq!(critic.shaped_reward(&s, 0, &s_next, "go_to_office", 0.), -0.1);
        Ok(())
    }

    #[test]
    fn test_rule_with_unknown_fact_fails() {
        let layout = FactLayout::new(2, ["has_coffee"]);
        let critic = SubgoalCritic::new(layout, 1., 0.)
            .rule("get_mail", TerminationRule::Achieve("has_mail".into()));
        assert!(critic.is_err());
    }

    #[test]
    fn test_validate_layout() -> Result<()> {
        let critic = office()?;
        let operators = vec!["get_coffee".to_string(), "teleport".to_string()];
        assert!(critic
            .validate(Some(critic.layout()), 5, &operators)
            .is_ok());
        let other = FactLayout::new(2, ["has_mail", "has_coffee", "visited_office"]);
        assert!(critic.validate(Some(&other), 5, &operators).is_err());
        assert!(critic.validate(None, 5, &operators).is_err());
        assert!(critic.validate(Some(critic.layout()), 4, &operators).is_err());
        Ok(())
    }
}
