//! Utilities.
use anyhow::{anyhow, Result};
use candle_core::Tensor;
use candle_nn::{loss::mse, VarMap};
use log::trace;

/// Mean of the squared Bellman residual between predictions and targets.
pub fn squared_residual(pred: &Tensor, tgt: &Tensor) -> Result<Tensor> {
    Ok(mse(pred, tgt)?)
}

/// Copies variables of `src` into `dest`.
///
/// Variables are identified by their names.
pub fn copy(dest: &VarMap, src: &VarMap) -> Result<()> {
    trace!("Hard update of variables");
    let dest = dest.data().lock().map_err(|e| anyhow!("{}", e))?;
    let src = src.data().lock().map_err(|e| anyhow!("{}", e))?;

    for (k, v_dest) in dest.iter() {
        let v_src = src
            .get(k)
            .ok_or_else(|| anyhow!("variable {:?} not found in the source", k))?;
        v_dest.set(v_src.as_tensor())?;
    }

    Ok(())
}
