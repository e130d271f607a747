//! Greedy policy over action values.
use crate::{error::HrlError, Policy};
use anyhow::Result;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Selects an action with the maximal value.
///
/// When several actions share the maximal value, one of them is chosen uniformly at random.
pub struct ArgmaxDiscretePolicy {
    rng: StdRng,
}

impl ArgmaxDiscretePolicy {
    /// Constructs the policy with a seeded tie-breaking generator.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Policy for ArgmaxDiscretePolicy {
    fn get_action(&mut self, q_values: &[f32]) -> Result<usize> {
        let max = q_values.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let ties = q_values
            .iter()
            .enumerate()
            .filter(|(_, &q)| q == max)
            .map(|(i, _)| i)
            .collect::<Vec<_>>();

        match ties.len() {
            0 => Err(HrlError::Configuration(format!(
                "no maximal action in value vector {:?}",
                q_values
            ))
            .into()),
            1 => Ok(ties[0]),
            n => Ok(ties[self.rng.gen_range(0..n)]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_unique_max() -> Result<()> {
        let mut policy = ArgmaxDiscretePolicy::new(0);
        assert_eq!(policy.get_action(&[0.1, 2.0, -1.0])?, 1);
        Ok(())
    }

    #[test]
    fn test_ties_choose_only_maxima() -> Result<()> {
        let mut policy = ArgmaxDiscretePolicy::new(42);
        let q = [1.0, 3.0, 0.5, 3.0, 3.0];
        let mut chosen = HashSet::new();
        for _ in 0..300 {
            let a = policy.get_action(&q)?;
            assert!([1, 3, 4].contains(&a));
            chosen.insert(a);
        }
        assert_eq!(chosen.len(), 3);
        Ok(())
    }

    #[test]
    fn test_empty_values() {
        let mut policy = ArgmaxDiscretePolicy::new(0);
        assert!(policy.get_action(&[]).is_err());
        assert!(policy.get_action(&[f32::NAN]).is_err());
    }
}
