//! Small deterministic components used in tests.
//!
//! * [`LinearQ`] - a linear value function trained by plain SGD.
//! * [`ChainEnv`] - an environment where action `k` sets fact `k`; the episode ends when every
//!   fact is true.
//! * [`ChainPlanner`] - a planner choosing the operator of the first false fact.
use crate::{
    critic::{FactLayout, SubgoalCritic, TerminationRule},
    error::HrlError,
    Env, Obs, Planner, Step, ValueFunction,
};
use anyhow::Result;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

/// Configuration of [`LinearQ`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct LinearQConfig {
    /// Step size of SGD.
    pub learning_rate: f32,

    /// Initial value of the bias.
    pub init_bias: f32,
}

impl Default for LinearQConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.01,
            init_bias: 0.0,
        }
    }
}

/// Linear action values `Q(o) = W o + b`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LinearQ {
    w: Array2<f32>,
    b: Array1<f32>,
    learning_rate: f32,
}

impl LinearQ {
    /// Bias vector.
    pub fn bias(&self) -> &Array1<f32> {
        &self.b
    }
}

impl ValueFunction for LinearQ {
    type Config = LinearQConfig;

    fn build(config: &Self::Config, in_dim: usize, out_dim: usize) -> Result<Self> {
        Ok(Self {
            w: Array2::zeros((out_dim, in_dim)),
            b: Array1::from_elem(out_dim, config.init_bias),
            learning_rate: config.learning_rate,
        })
    }

    fn in_dim(&self) -> usize {
        self.w.ncols()
    }

    fn out_dim(&self) -> usize {
        self.w.nrows()
    }

    fn forward(&self, obs: &Array2<f32>) -> Result<Array2<f32>> {
        if obs.ncols() != self.in_dim() {
            return Err(HrlError::Configuration(format!(
                "input of dimension {} to a value function of dimension {}",
                obs.ncols(),
                self.in_dim()
            ))
            .into());
        }
        Ok(obs.dot(&self.w.t()) + &self.b.view().insert_axis(Axis(0)))
    }

    fn fit(&mut self, obs: &Array2<f32>, act: &[usize], targets: &[f32]) -> Result<f32> {
        let q = self.forward(obs)?;
        let n = targets.len().max(1) as f32;
        let mut loss = 0.0;
        let mut grad_w = Array2::<f32>::zeros(self.w.raw_dim());
        let mut grad_b = Array1::<f32>::zeros(self.b.raw_dim());

        for (i, (&a, &y)) in act.iter().zip(targets.iter()).enumerate() {
            let err = q[[i, a]] - y;
            loss += err * err;
            grad_w.row_mut(a).scaled_add(err, &obs.row(i));
            grad_b[a] += err;
        }
        self.w.scaled_add(-self.learning_rate / n, &grad_w);
        self.b.scaled_add(-self.learning_rate / n, &grad_b);

        Ok(loss / n)
    }

    fn copy_from(&mut self, src: &Self) -> Result<()> {
        self.w.assign(&src.w);
        self.b.assign(&src.b);
        Ok(())
    }

    fn save(&self, path: &Path) -> Result<()> {
        let file = BufWriter::new(File::create(path)?);
        bincode::serialize_into(file, self)?;
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let file = BufReader::new(File::open(path)?);
        let loaded: Self = bincode::deserialize_from(file)?;
        if loaded.w.raw_dim() != self.w.raw_dim() {
            return Err(HrlError::Snapshot(format!(
                "weights of shape {:?} loaded into a value function of shape {:?}",
                loaded.w.shape(),
                self.w.shape()
            ))
            .into());
        }
        *self = loaded;
        Ok(())
    }
}

/// Configuration of [`ChainEnv`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ChainEnvConfig {
    /// The number of facts.
    pub n_facts: usize,

    /// Reward when every fact is true.
    pub goal_reward: f32,

    /// The environment fails on this step, counted from construction.
    pub fail_at_step: Option<usize>,
}

impl Default for ChainEnvConfig {
    fn default() -> Self {
        Self {
            n_facts: 2,
            goal_reward: 1.0,
            fail_at_step: None,
        }
    }
}

impl ChainEnvConfig {
    /// Sets the number of facts.
    pub fn n_facts(mut self, v: usize) -> Self {
        self.n_facts = v;
        self
    }

    /// Makes the environment fail on the given step.
    pub fn fail_at_step(mut self, v: usize) -> Self {
        self.fail_at_step = Some(v);
        self
    }
}

/// Environment with `n_facts + 1` actions where action `k < n_facts` sets fact `k`.
///
/// The observation is `[number of true facts, 0, fact_0, ..., fact_{n-1}]`.
pub struct ChainEnv {
    config: ChainEnvConfig,
    facts: Vec<bool>,
    total_steps: usize,
}

impl ChainEnv {
    /// Names of the facts, `fact_0`, `fact_1`, ...
    pub fn fact_names(n_facts: usize) -> Vec<String> {
        (0..n_facts).map(|k| format!("fact_{}", k)).collect()
    }

    /// Names of the operators, `set_fact_0`, `set_fact_1`, ...
    pub fn operator_names(n_facts: usize) -> Vec<String> {
        (0..n_facts).map(|k| format!("set_fact_{}", k)).collect()
    }

    /// Critic terminating `set_fact_k` when `fact_k` becomes true.
    pub fn critic(n_facts: usize, intrinsic_reward: f32, step_cost: f32) -> Result<SubgoalCritic> {
        let layout = FactLayout::new(2, Self::fact_names(n_facts));
        Self::operator_names(n_facts)
            .into_iter()
            .zip(Self::fact_names(n_facts))
            .try_fold(
                SubgoalCritic::new(layout, intrinsic_reward, step_cost),
                |critic, (op, fact)| critic.rule(op, TerminationRule::Achieve(fact)),
            )
    }

    fn obs(&self) -> Obs {
        let n_true = self.facts.iter().filter(|&&f| f).count();
        let mut obs = vec![n_true as f32, 0.0];
        obs.extend(self.facts.iter().map(|&f| f as u8 as f32));
        obs
    }
}

impl Env for ChainEnv {
    type Config = ChainEnvConfig;

    fn build(config: &Self::Config, _seed: i64) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            facts: vec![false; config.n_facts],
            total_steps: 0,
        })
    }

    fn step(&mut self, act: usize) -> Result<Step> {
        self.total_steps += 1;
        if self.config.fail_at_step == Some(self.total_steps) {
            return Err(HrlError::Environment(format!(
                "scripted failure at step {}",
                self.total_steps
            ))
            .into());
        }
        if act < self.facts.len() {
            self.facts[act] = true;
        }
        let solved = self.facts.iter().all(|&f| f);
        let reward = if solved { self.config.goal_reward } else { 0.0 };
        Ok(Step::new(self.obs(), reward, solved, false))
    }

    fn reset(&mut self) -> Result<Obs> {
        self.facts.iter_mut().for_each(|f| *f = false);
        Ok(self.obs())
    }

    fn obs_dim(&self) -> usize {
        2 + self.config.n_facts
    }

    fn n_actions(&self) -> usize {
        self.config.n_facts + 1
    }

    fn fact_layout(&self) -> Option<FactLayout> {
        Some(FactLayout::new(2, Self::fact_names(self.config.n_facts)))
    }
}

/// Planner for [`ChainEnv`] choosing `set_fact_k` for the first false fact.
pub struct ChainPlanner {
    n_facts: usize,
}

impl ChainPlanner {
    /// Constructs the planner.
    pub fn new(n_facts: usize) -> Self {
        Self { n_facts }
    }
}

impl Planner for ChainPlanner {
    fn operators(&self) -> Vec<String> {
        ChainEnv::operator_names(self.n_facts)
    }

    fn dims(&self) -> HashMap<String, (usize, usize)> {
        self.operators()
            .into_iter()
            .map(|op| (op, (2 + self.n_facts, self.n_facts + 1)))
            .collect()
    }

    fn reset(&mut self, _obs: &[f32]) {}

    fn current_operator(&mut self, obs: &[f32]) -> Option<String> {
        (0..self.n_facts)
            .find(|&k| obs.get(2 + k).map_or(true, |&v| v <= 0.5))
            .map(|k| format!("set_fact_{}", k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::critic::IntrinsicCritic;
    use tempdir::TempDir;

    #[test]
    fn test_linear_q_fit_reduces_loss() -> Result<()> {
        let mut qf = LinearQ::build(&LinearQConfig::default(), 2, 3)?;
        let obs = Array2::from_shape_vec((2, 2), vec![1., 0., 0., 1.])?;
        let first = qf.fit(&obs, &[0, 2], &[1., -1.])?;
        let mut last = first;
        for _ in 0..50 {
            last = qf.fit(&obs, &[0, 2], &[1., -1.])?;
        }
        assert!(last < first);
        Ok(())
    }

    #[test]
    fn test_linear_q_save_load() -> Result<()> {
        let dir = TempDir::new("linear_q")?;
        let path = dir.path().join("q.bin");
        let mut qf = LinearQ::build(&LinearQConfig::default(), 2, 2)?;
        let obs = Array2::from_shape_vec((1, 2), vec![1., 1.])?;
        qf.fit(&obs, &[1], &[5.])?;
        qf.save(&path)?;

        let mut other = LinearQ::build(&LinearQConfig::default(), 2, 2)?;
        other.load(&path)?;
        assert_eq!(other.forward(&obs)?, qf.forward(&obs)?);

        let mut wrong = LinearQ::build(&LinearQConfig::default(), 3, 2)?;
        assert!(wrong.load(&path).is_err());
        Ok(())
    }

    #[test]
    fn test_chain_env() -> Result<()> {
        let mut env = ChainEnv::build(&ChainEnvConfig::default(), 0)?;
        let obs = env.reset()?;
        assert_eq!(obs, vec![0., 0., 0., 0.]);
        let step = env.step(1)?;
        assert_eq!(step.obs, vec![1., 0., 0., 1.]);
        assert!(!step.is_done());
        let step = env.step(0)?;
        assert!(step.is_terminated);
        assert_eq!(step.reward, 1.0);

        let critic = ChainEnv::critic(2, 30., -0.1)?;
        assert!(critic.is_terminal(&obs, 1, &[1., 0., 0., 1.], "set_fact_1"));
        Ok(())
    }

    #[test]
    fn test_chain_planner() {
        let mut planner = ChainPlanner::new(2);
        assert_eq!(
            planner.current_operator(&[0., 0., 0., 0.]),
            Some("set_fact_0".to_string())
        );
        assert_eq!(
            planner.current_operator(&[1., 0., 1., 0.]),
            Some("set_fact_1".to_string())
        );
        assert_eq!(planner.current_operator(&[2., 0., 1., 1.]), None);
    }
}
