use crate::{critic::OPERATORS, env::{OfficeEnv, OfficeTask}};
use anyhow::Result;
use reprel_core::{critic::FactLayout, error::HrlError, Planner};
use std::collections::HashMap;

/// Symbolic planner of the office tasks.
///
/// Fetches the missing items, coffee first, then visits the office.
/// Only the operators the task needs are provided. Each operator sees the position
/// of the agent and its own fact only, `[x, y, fact]`.
pub struct OfficePlanner {
    task: OfficeTask,
    layout: FactLayout,
    has_coffee: usize,
    has_mail: usize,
    visited_office: usize,
}

impl OfficePlanner {
    /// Constructs a planner for the task.
    ///
    /// Facts are resolved by name in the layout of [`OfficeEnv`].
    pub fn new(task: OfficeTask) -> Result<Self> {
        let layout = OfficeEnv::layout();
        let index_of = |name: &str| {
            layout.index_of(name).ok_or_else(|| {
                HrlError::Configuration(format!("fact {:?} not in {:?}", name, layout))
            })
        };
        Ok(Self {
            task,
            has_coffee: index_of("has_coffee")?,
            has_mail: index_of("has_mail")?,
            visited_office: index_of("visited_office")?,
            layout,
        })
    }

    fn fact_of(&self, operator: &str) -> Option<usize> {
        match operator {
            "get_coffee" => Some(self.has_coffee),
            "get_mail" => Some(self.has_mail),
            "visit_office" => Some(self.visited_office),
            _ => None,
        }
    }
}

impl Planner for OfficePlanner {
    fn operators(&self) -> Vec<String> {
        OPERATORS
            .iter()
            .filter(|&&op| match op {
                "get_coffee" => self.task.needs_coffee(),
                "get_mail" => self.task.needs_mail(),
                _ => true,
            })
            .map(|op| op.to_string())
            .collect()
    }

    fn dims(&self) -> HashMap<String, (usize, usize)> {
        let obs_dim = self.layout.offset() + 1;
        self.operators().into_iter().map(|op| (op, (obs_dim, 4))).collect()
    }

    fn reset(&mut self, _obs: &[f32]) {}

    fn current_operator(&mut self, obs: &[f32]) -> Option<String> {
        let fact = |ix| self.layout.fact(obs, ix);
        let op = if self.task.needs_coffee() && !fact(self.has_coffee) {
            "get_coffee"
        } else if self.task.needs_mail() && !fact(self.has_mail) {
            "get_mail"
        } else if !fact(self.visited_office) {
            "visit_office"
        } else {
            return None;
        };
        Some(op.to_string())
    }

    fn abstract_obs(&self, operator: &str, obs: &[f32]) -> Vec<f32> {
        let mut abs = obs.iter().take(self.layout.offset()).copied().collect::<Vec<_>>();
        let f = self.fact_of(operator).map_or(false, |ix| self.layout.fact(obs, ix));
        abs.push(f as u8 as f32);
        abs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_of_deliver_coffee_and_mail() {
        let mut planner = OfficePlanner::new(OfficeTask::DeliverCoffeeAndMail).unwrap();
        let op = |planner: &mut OfficePlanner, obs: [f32; 5]| planner.current_operator(&obs);

        assert_eq!(op(&mut planner, [0., 0., 0., 0., 1.]).as_deref(), Some("get_coffee"));
        assert_eq!(op(&mut planner, [0., 0., 1., 0., 0.]).as_deref(), Some("get_mail"));
        assert_eq!(op(&mut planner, [0., 0., 1., 1., 0.]).as_deref(), Some("visit_office"));
        assert_eq!(op(&mut planner, [0., 0., 1., 1., 1.]), None);
    }

    #[test]
    fn test_plan_of_deliver_mail_ignores_coffee() {
        let mut planner = OfficePlanner::new(OfficeTask::DeliverMail).unwrap();
        assert_eq!(
            planner.current_operator(&[0., 0., 0., 0., 0.]).as_deref(),
            Some("get_mail")
        );
        assert_eq!(planner.current_operator(&[0., 0., 0., 1., 1.]), None);
    }

    #[test]
    fn test_facts_resolved_by_name() -> Result<()> {
        let planner = OfficePlanner::new(OfficeTask::DeliverCoffeeAndMail)?;
        let position = |name: &str| crate::FACTS.iter().position(|&f| f == name);
        assert_eq!(Some(planner.has_coffee), position("has_coffee"));
        assert_eq!(Some(planner.has_mail), position("has_mail"));
        assert_eq!(Some(planner.visited_office), position("visited_office"));

        // Each operator reads its own fact from the shared layout.
        let layout = OfficeEnv::layout();
        let mut obs = vec![0.0; layout.offset() + layout.len()];
        obs[layout.offset() + layout.index_of("has_mail").unwrap()] = 1.0;
        assert_eq!(planner.abstract_obs("get_mail", &obs)[2], 1.0);
        assert_eq!(planner.abstract_obs("get_coffee", &obs)[2], 0.0);
        assert_eq!(planner.abstract_obs("visit_office", &obs)[2], 0.0);
        Ok(())
    }

    #[test]
    fn test_abstract_obs() {
        let planner = OfficePlanner::new(OfficeTask::DeliverMail).unwrap();
        let obs = [3., 4., 1., 0., 0.];
        assert_eq!(planner.abstract_obs("get_coffee", &obs), vec![3., 4., 1.]);
        assert_eq!(planner.abstract_obs("get_mail", &obs), vec![3., 4., 0.]);
        assert_eq!(planner.dims()["visit_office"], (3, 4));
        assert_eq!(planner.operators(), vec!["get_mail", "visit_office"]);
        assert_eq!(
            OfficePlanner::new(OfficeTask::DeliverCoffeeAndMail)
                .unwrap()
                .operators(),
            OPERATORS.to_vec()
        );
    }
}
