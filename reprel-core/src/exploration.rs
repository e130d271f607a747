//! Exploration strategies wrapping a greedy action.
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Randomizes a base action.
pub trait ExplorationStrategy {
    /// Returns a uniformly random action in `0..n_actions` with probability epsilon,
    /// `base_action` otherwise.
    fn select<R: Rng + ?Sized>(&mut self, base_action: usize, n_actions: usize, rng: &mut R)
        -> usize;

    /// Called at the end of every epoch with the index of the finished epoch.
    fn on_epoch_end(&mut self, _epoch: usize) {}

    /// Current exploration rate.
    fn epsilon(&self) -> f64;
}

fn epsilon_greedy<R: Rng + ?Sized>(
    eps: f64,
    base_action: usize,
    n_actions: usize,
    rng: &mut R,
) -> usize {
    if n_actions > 0 && rng.gen::<f64>() < eps {
        rng.gen_range(0..n_actions)
    } else {
        base_action
    }
}

/// Epsilon-greedy with a constant exploration rate.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct EpsilonGreedy {
    /// Probability of taking a random action.
    pub eps: f64,
}

impl Default for EpsilonGreedy {
    fn default() -> Self {
        Self { eps: 0.1 }
    }
}

impl EpsilonGreedy {
    /// Sets the exploration rate.
    pub fn eps(mut self, v: f64) -> Self {
        self.eps = v;
        self
    }
}

impl ExplorationStrategy for EpsilonGreedy {
    fn select<R: Rng + ?Sized>(
        &mut self,
        base_action: usize,
        n_actions: usize,
        rng: &mut R,
    ) -> usize {
        epsilon_greedy(self.eps, base_action, n_actions, rng)
    }

    fn epsilon(&self) -> f64 {
        self.eps
    }
}

/// Shape of the decay curve of [`EpsilonGreedyWithDecay`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
pub enum DecayPolicy {
    /// `eps_start - (eps_start - eps_floor) * progress`.
    Linear,

    /// `eps_floor + (eps_start - eps_floor) * exp(-5 * progress)`.
    Exponential,
}

/// Epsilon-greedy whose exploration rate decays with the epoch progress.
///
/// The progress after epoch `k` is `(k + 1) / num_epochs`, clipped to 1.
/// Epsilon never increases and never goes below `eps_floor`.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct EpsilonGreedyWithDecay {
    /// Epsilon before the first epoch ends.
    pub eps_start: f64,

    /// Lower bound of epsilon.
    pub eps_floor: f64,

    /// Epoch budget of the run.
    pub num_epochs: usize,

    /// Decay curve.
    pub decay: DecayPolicy,

    eps: f64,
}

impl EpsilonGreedyWithDecay {
    /// Constructs a linearly decaying explorer from 1.0 to 0.1.
    pub fn new(num_epochs: usize) -> Self {
        Self {
            eps_start: 1.0,
            eps_floor: 0.1,
            num_epochs,
            decay: DecayPolicy::Linear,
            eps: 1.0,
        }
    }

    /// Sets the initial epsilon, raised to the floor if below it.
    pub fn eps_start(mut self, v: f64) -> Self {
        self.eps_start = v;
        self.eps = v.max(self.eps_floor);
        self
    }

    /// Sets the floor of epsilon.
    pub fn eps_floor(mut self, v: f64) -> Self {
        self.eps_floor = v;
        self.eps = self.eps.max(v);
        self
    }

    /// Sets the decay curve.
    pub fn decay(mut self, v: DecayPolicy) -> Self {
        self.decay = v;
        self
    }

    fn scheduled(&self, epoch: usize) -> f64 {
        let progress = if self.num_epochs == 0 {
            1.0
        } else {
            ((epoch + 1) as f64 / self.num_epochs as f64).min(1.0)
        };
        let span = (self.eps_start - self.eps_floor).max(0.0);
        let eps = match self.decay {
            DecayPolicy::Linear => self.eps_start - span * progress,
            DecayPolicy::Exponential => self.eps_floor + span * (-5.0 * progress).exp(),
        };
        eps.max(self.eps_floor)
    }
}

impl ExplorationStrategy for EpsilonGreedyWithDecay {
    fn select<R: Rng + ?Sized>(
        &mut self,
        base_action: usize,
        n_actions: usize,
        rng: &mut R,
    ) -> usize {
        epsilon_greedy(self.eps, base_action, n_actions, rng)
    }

    fn on_epoch_end(&mut self, epoch: usize) {
        self.eps = self.eps.min(self.scheduled(epoch)).max(self.eps_floor);
    }

    fn epsilon(&self) -> f64 {
        self.eps
    }
}

/// Exploration strategy of a path collector.
///
/// Also serves as the persisted exploration state of snapshots.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub enum Explorer {
    /// No exploration, used for evaluation.
    Greedy,

    /// Constant epsilon.
    EpsilonGreedy(EpsilonGreedy),

    /// Decaying epsilon.
    EpsilonGreedyWithDecay(EpsilonGreedyWithDecay),
}

impl Default for Explorer {
    fn default() -> Self {
        Self::EpsilonGreedy(EpsilonGreedy::default())
    }
}

impl Explorer {
    /// Constant epsilon-greedy, or linear decay over `num_epochs` if `decay` is `true`.
    pub fn epsilon_greedy(decay: bool, num_epochs: usize) -> Self {
        match decay {
            true => Self::EpsilonGreedyWithDecay(EpsilonGreedyWithDecay::new(num_epochs)),
            false => Self::EpsilonGreedy(EpsilonGreedy::default()),
        }
    }
}

impl ExplorationStrategy for Explorer {
    fn select<R: Rng + ?Sized>(
        &mut self,
        base_action: usize,
        n_actions: usize,
        rng: &mut R,
    ) -> usize {
        match self {
            Self::Greedy => base_action,
            Self::EpsilonGreedy(e) => e.select(base_action, n_actions, rng),
            Self::EpsilonGreedyWithDecay(e) => e.select(base_action, n_actions, rng),
        }
    }

    fn on_epoch_end(&mut self, epoch: usize) {
        match self {
            Self::Greedy | Self::EpsilonGreedy(_) => {}
            Self::EpsilonGreedyWithDecay(e) => e.on_epoch_end(epoch),
        }
    }

    fn epsilon(&self) -> f64 {
        match self {
            Self::Greedy => 0.0,
            Self::EpsilonGreedy(e) => e.epsilon(),
            Self::EpsilonGreedyWithDecay(e) => e.epsilon(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_constant_epsilon() {
        let mut explorer = Explorer::epsilon_greedy(false, 10);
        let eps = explorer.epsilon();
        for epoch in 0..10 {
            explorer.on_epoch_end(epoch);
            assert_eq!(explorer.epsilon(), eps);
        }
        assert_eq!(eps, 0.1);
    }

    #[test]
    fn test_decay_is_monotone_and_floored() {
        for decay in [DecayPolicy::Linear, DecayPolicy::Exponential] {
            let mut explorer = EpsilonGreedyWithDecay::new(20).eps_floor(0.05).decay(decay);
            let mut prev = explorer.epsilon();
            assert_eq!(prev, 1.0);
            for epoch in 0..30 {
                explorer.on_epoch_end(epoch);
                let eps = explorer.epsilon();
                assert!(eps <= prev);
                assert!(eps >= 0.05);
                prev = eps;
            }
            if decay == DecayPolicy::Linear {
                assert!((prev - 0.05).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_start_below_floor() {
        for decay in [DecayPolicy::Linear, DecayPolicy::Exponential] {
            let mut explorer = EpsilonGreedyWithDecay::new(10)
                .eps_start(0.05)
                .eps_floor(0.1)
                .decay(decay);
            assert_eq!(explorer.epsilon(), 0.1);
            for epoch in 0..10 {
                explorer.on_epoch_end(epoch);
                assert_eq!(explorer.epsilon(), 0.1);
            }
        }

        let explorer = EpsilonGreedyWithDecay::new(10).eps_floor(0.2).eps_start(0.05);
        assert_eq!(explorer.epsilon(), 0.2);
    }

    #[test]
    fn test_decay_ignores_earlier_epochs() {
        let mut explorer = EpsilonGreedyWithDecay::new(10);
        explorer.on_epoch_end(5);
        let eps = explorer.epsilon();
        explorer.on_epoch_end(0);
        assert_eq!(explorer.epsilon(), eps);
    }

    #[test]
    fn test_select_bounds() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut always = EpsilonGreedy::default().eps(1.0);
        let mut never = EpsilonGreedy::default().eps(0.0);
        let mut greedy = Explorer::Greedy;
        let mut n_random = 0;
        for _ in 0..200 {
            let a = always.select(2, 4, &mut rng);
            assert!(a < 4);
            n_random += (a != 2) as usize;
            assert_eq!(never.select(2, 4, &mut rng), 2);
            assert_eq!(greedy.select(1, 4, &mut rng), 1);
        }
        assert!(n_random > 0);
    }
}
