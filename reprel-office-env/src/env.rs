//! Office grid world.
mod config;
pub use config::{OfficeEnvConfig, OfficeTask};
use anyhow::Result;
use log::trace;
use rand::{rngs::StdRng, Rng, SeedableRng};
use reprel_core::{critic::FactLayout, error::HrlError, Env, Obs, Step};

/// Names of the facts in the order of the observation.
pub const FACTS: [&str; 3] = ["has_coffee", "has_mail", "visited_office"];

/// Offset of the facts in the observation.
pub const FACT_OFFSET: usize = 2;

/// Actions of [`OfficeEnv`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfficeAct {
    /// `y + 1`.
    Up,
    /// `x + 1`.
    Right,
    /// `y - 1`.
    Down,
    /// `x - 1`.
    Left,
}

impl TryFrom<usize> for OfficeAct {
    type Error = HrlError;

    fn try_from(act: usize) -> Result<Self, Self::Error> {
        match act {
            0 => Ok(Self::Up),
            1 => Ok(Self::Right),
            2 => Ok(Self::Down),
            3 => Ok(Self::Left),
            _ => Err(HrlError::Environment(format!("invalid action {}", act))),
        }
    }
}

/// An office with coffee machines, a mail room, an office and decorations.
///
/// The observation is `[x, y, has_coffee, has_mail, visited_office]`.
/// Moving into a cell with coffee or mail picks it up. Entering the office sets
/// `visited_office`, which is cleared when an item is picked up. The episode ends
/// with `goal_reward` when the office is entered with every item the task needs,
/// and with zero reward when a decoration is stepped on.
pub struct OfficeEnv {
    config: OfficeEnvConfig,
    rng: StdRng,
    pos: (usize, usize),
    has_coffee: bool,
    has_mail: bool,
    visited_office: bool,
}

impl OfficeEnv {
    /// Current cell of the agent.
    pub fn position(&self) -> (usize, usize) {
        self.pos
    }

    /// Layout of the facts in observations.
    pub fn layout() -> FactLayout {
        FactLayout::new(FACT_OFFSET, FACTS)
    }

    fn obs(&self) -> Obs {
        vec![
            self.pos.0 as f32,
            self.pos.1 as f32,
            self.has_coffee as u8 as f32,
            self.has_mail as u8 as f32,
            self.visited_office as u8 as f32,
        ]
    }

    fn is_empty_cell(&self, pos: (usize, usize)) -> bool {
        let c = &self.config;
        pos != c.office
            && !c.coffee.contains(&pos)
            && !c.mail.contains(&pos)
            && !c.decorations.contains(&pos)
    }

    fn start_position(&mut self) -> (usize, usize) {
        if !self.config.random_start {
            return self.config.start;
        }
        loop {
            let pos = (
                self.rng.gen_range(0..self.config.width),
                self.rng.gen_range(0..self.config.height),
            );
            if self.is_empty_cell(pos) {
                return pos;
            }
        }
    }

    fn solved(&self) -> bool {
        let task = self.config.task;
        (!task.needs_coffee() || self.has_coffee) && (!task.needs_mail() || self.has_mail)
    }
}

impl Env for OfficeEnv {
    type Config = OfficeEnvConfig;

    fn build(config: &Self::Config, seed: i64) -> Result<Self> {
        let c = config;
        let cells = c
            .coffee
            .iter()
            .chain(c.mail.iter())
            .chain(c.decorations.iter())
            .chain(std::iter::once(&c.office))
            .chain(std::iter::once(&c.start));
        for &(x, y) in cells {
            if x >= c.width || y >= c.height {
                return Err(HrlError::Configuration(format!(
                    "cell ({}, {}) outside the {}x{} grid",
                    x, y, c.width, c.height
                ))
                .into());
            }
        }

        let mut env = Self {
            config: config.clone(),
            rng: StdRng::seed_from_u64(seed as u64),
            pos: config.start,
            has_coffee: false,
            has_mail: false,
            visited_office: false,
        };
        if !env.is_empty_cell(config.start) && !config.random_start {
            return Err(HrlError::Configuration(format!(
                "start cell {:?} is not empty",
                config.start
            ))
            .into());
        }
        env.pos = env.start_position();
        Ok(env)
    }

    fn step(&mut self, act: usize) -> Result<Step> {
        let (x, y) = self.pos;
        let (w, h) = (self.config.width, self.config.height);
        self.pos = match OfficeAct::try_from(act)? {
            OfficeAct::Up => (x, (y + 1).min(h - 1)),
            OfficeAct::Right => ((x + 1).min(w - 1), y),
            OfficeAct::Down => (x, y.saturating_sub(1)),
            OfficeAct::Left => (x.saturating_sub(1), y),
        };

        let mut reward = 0.0;
        let mut is_terminated = false;
        if self.config.decorations.contains(&self.pos) {
            is_terminated = true;
        } else if self.config.coffee.contains(&self.pos) && !self.has_coffee {
            self.has_coffee = true;
            self.visited_office = false;
        } else if self.config.mail.contains(&self.pos) && !self.has_mail {
            self.has_mail = true;
            self.visited_office = false;
        } else if self.pos == self.config.office {
            self.visited_office = true;
            if self.solved() {
                reward = self.config.goal_reward;
                is_terminated = true;
            }
        }
        trace!("{:?} -> {:?}", act, self.pos);

        Ok(Step::new(self.obs(), reward, is_terminated, false))
    }

    fn reset(&mut self) -> Result<Obs> {
        self.pos = self.start_position();
        self.has_coffee = false;
        self.has_mail = false;
        self.visited_office = false;
        Ok(self.obs())
    }

    fn reset_with_index(&mut self, ix: usize) -> Result<Obs> {
        self.rng = StdRng::seed_from_u64(ix as u64);
        self.reset()
    }

    fn obs_dim(&self) -> usize {
        FACT_OFFSET + FACTS.len()
    }

    fn n_actions(&self) -> usize {
        4
    }

    fn fact_layout(&self) -> Option<FactLayout> {
        Some(Self::layout())
    }
}
