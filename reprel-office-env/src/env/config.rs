//! Configuration of [`OfficeEnv`](super::OfficeEnv).
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Tasks of the office world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Display, EnumString)]
pub enum OfficeTask {
    /// Bring mail to the office.
    #[strum(serialize = "deliver-mail")]
    DeliverMail,

    /// Bring coffee to the office.
    #[strum(serialize = "deliver-coffee")]
    DeliverCoffee,

    /// Bring both mail and coffee to the office.
    #[strum(serialize = "deliver-coffee-and-mail")]
    DeliverCoffeeAndMail,
}

impl OfficeTask {
    /// Returns `true` if the task needs mail.
    pub fn needs_mail(&self) -> bool {
        matches!(self, Self::DeliverMail | Self::DeliverCoffeeAndMail)
    }

    /// Returns `true` if the task needs coffee.
    pub fn needs_coffee(&self) -> bool {
        matches!(self, Self::DeliverCoffee | Self::DeliverCoffeeAndMail)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
/// Configurations of [`OfficeEnv`](super::OfficeEnv).
///
/// Cells are `(x, y)` with `0 <= x < width` and `0 <= y < height`.
pub struct OfficeEnvConfig {
    pub(super) task: OfficeTask,
    pub(super) width: usize,
    pub(super) height: usize,
    pub(super) start: (usize, usize),
    pub(super) random_start: bool,
    pub(super) coffee: Vec<(usize, usize)>,
    pub(super) mail: Vec<(usize, usize)>,
    pub(super) office: (usize, usize),
    pub(super) decorations: Vec<(usize, usize)>,
    pub(super) goal_reward: f32,
}

impl Default for OfficeEnvConfig {
    fn default() -> Self {
        Self {
            task: OfficeTask::DeliverMail,
            width: 12,
            height: 9,
            start: (2, 1),
            random_start: false,
            coffee: vec![(8, 2), (3, 6)],
            mail: vec![(7, 4)],
            office: (4, 4),
            decorations: vec![(4, 1), (7, 1), (1, 4), (10, 4), (4, 7), (7, 7)],
            goal_reward: 1.0,
        }
    }
}

impl OfficeEnvConfig {
    /// Sets the task.
    pub fn task(mut self, v: OfficeTask) -> Self {
        self.task = v;
        self
    }

    /// Sets the size of the grid.
    pub fn size(mut self, width: usize, height: usize) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Sets the start cell.
    pub fn start(mut self, v: (usize, usize)) -> Self {
        self.start = v;
        self
    }

    /// Starts every episode in a random empty cell.
    pub fn random_start(mut self, v: bool) -> Self {
        self.random_start = v;
        self
    }

    /// Sets the cells with coffee.
    pub fn coffee(mut self, v: Vec<(usize, usize)>) -> Self {
        self.coffee = v;
        self
    }

    /// Sets the cells with mail.
    pub fn mail(mut self, v: Vec<(usize, usize)>) -> Self {
        self.mail = v;
        self
    }

    /// Sets the office cell.
    pub fn office(mut self, v: (usize, usize)) -> Self {
        self.office = v;
        self
    }

    /// Sets the cells with decorations, which end the episode when stepped on.
    pub fn decorations(mut self, v: Vec<(usize, usize)>) -> Self {
        self.decorations = v;
        self
    }

    /// Sets the reward of solving the task.
    pub fn goal_reward(mut self, v: f32) -> Self {
        self.goal_reward = v;
        self
    }

    /// The task.
    pub fn get_task(&self) -> OfficeTask {
        self.task
    }
}
