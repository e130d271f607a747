use crate::error::HrlError;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Position of named boolean facts inside an observation vector.
///
/// Fact `k` is stored at `obs[offset + k]` and is true when the value exceeds 0.5.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct FactLayout {
    offset: usize,
    names: Vec<String>,
}

impl FactLayout {
    /// Constructs a layout of the given facts starting at `offset`.
    pub fn new<T: Into<String>>(offset: usize, names: impl IntoIterator<Item = T>) -> Self {
        Self {
            offset,
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Index of the first fact in the observation.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Names of the facts in order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The number of facts.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if the layout has no facts.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Position of a fact in the layout.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Truth value of fact `ix`. Missing entries are false.
    pub fn fact(&self, obs: &[f32], ix: usize) -> bool {
        obs.get(self.offset + ix).map_or(false, |&v| v > 0.5)
    }

    /// Truth values of all facts.
    pub fn facts(&self, obs: &[f32]) -> Vec<bool> {
        (0..self.len()).map(|ix| self.fact(obs, ix)).collect()
    }

    /// Checks that the layout fits in observations of dimension `obs_dim`.
    pub fn validate(&self, obs_dim: usize) -> Result<()> {
        if self.offset + self.len() > obs_dim {
            return Err(HrlError::Configuration(format!(
                "fact layout {:?} does not fit in observations of dimension {}",
                self, obs_dim
            ))
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facts() {
        let layout = FactLayout::new(2, ["a", "b"]);
        assert_eq!(layout.index_of("b"), Some(1));
        assert_eq!(layout.index_of("c"), None);
        assert_eq!(layout.facts(&[9., 9., 1., 0.]), vec![true, false]);
        assert!(!layout.fact(&[0., 0., 1.], 1));
        assert!(layout.validate(4).is_ok());
        assert!(layout.validate(3).is_err());
    }
}
