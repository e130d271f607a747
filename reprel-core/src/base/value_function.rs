//! Action-value function.
use anyhow::Result;
use ndarray::Array2;
use std::path::Path;

/// A black-box mapping from observations to a vector of action values.
///
/// Each operator owns two of these, an online network updated by gradient descent
/// and a target network periodically overwritten with the online weights.
/// Implementations are free to choose any architecture or backend.
pub trait ValueFunction {
    /// Configuration from which the function is built.
    type Config: Clone;

    /// Extension of the files written by [`ValueFunction::save`].
    const WEIGHTS_EXTENSION: &'static str = "bin";

    /// Builds a freshly initialized value function.
    fn build(config: &Self::Config, in_dim: usize, out_dim: usize) -> Result<Self>
    where
        Self: Sized;

    /// Dimension of the input observations.
    fn in_dim(&self) -> usize;

    /// The number of actions, i.e., the length of the output vector.
    fn out_dim(&self) -> usize;

    /// Computes action values for a batch of observations of shape `[n, in_dim]`.
    ///
    /// The output has shape `[n, out_dim]`.
    fn forward(&self, obs: &Array2<f32>) -> Result<Array2<f32>>;

    /// Computes action values of a single observation.
    fn forward_one(&self, obs: &[f32]) -> Result<Vec<f32>> {
        let obs = Array2::from_shape_vec((1, obs.len()), obs.to_vec())?;
        Ok(self.forward(&obs)?.row(0).to_vec())
    }

    /// Performs a single gradient step on the squared Bellman residual
    /// `(Q(o, a) - target)^2`, averaged over the batch. Returns the loss before the step.
    fn fit(&mut self, obs: &Array2<f32>, act: &[usize], targets: &[f32]) -> Result<f32>;

    /// Overwrites the parameters of `self` with those of `src`.
    fn copy_from(&mut self, src: &Self) -> Result<()>;

    /// Saves the parameters into a file.
    fn save(&self, path: &Path) -> Result<()>;

    /// Loads the parameters from a file written with [`ValueFunction::save`].
    fn load(&mut self, path: &Path) -> Result<()>;
}
