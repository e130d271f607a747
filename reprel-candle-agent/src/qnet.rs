//! Action-value network.
use crate::{
    mlp::{Mlp, MlpConfig},
    opt::{Optimizer, OptimizerConfig},
    util::{copy, squared_residual},
    Device,
};
use anyhow::Result;
use candle_core::{DType, Tensor, D};
use candle_nn::{VarBuilder, VarMap};
use log::{info, trace};
use ndarray::Array2;
use reprel_core::{error::HrlError, ValueFunction};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`QNet`].
///
/// The input and output dimensions are given per operator when the network is built.
pub struct QNetConfig {
    /// The number of units of the hidden layers.
    pub units: Vec<usize>,

    /// Optimizer.
    pub opt_config: OptimizerConfig,

    /// Device on which the network is placed.
    pub device: Device,
}

impl Default for QNetConfig {
    fn default() -> Self {
        Self {
            units: vec![256, 256],
            opt_config: OptimizerConfig::default(),
            device: Device::Cpu,
        }
    }
}

impl QNetConfig {
    /// Sets the number of units of the hidden layers.
    pub fn units(mut self, v: Vec<usize>) -> Self {
        self.units = v;
        self
    }

    /// Sets `n_layers` hidden layers of `n_units` units.
    pub fn hidden_layers(self, n_layers: usize, n_units: usize) -> Self {
        self.units(vec![n_units; n_layers])
    }

    /// Sets the optimizer.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Sets the learning rate of the optimizer.
    pub fn learning_rate(mut self, lr: f64) -> Self {
        self.opt_config = self.opt_config.learning_rate(lr);
        self
    }

    /// Sets the device.
    pub fn device(mut self, v: Device) -> Self {
        self.device = v;
        self
    }

    /// Constructs [`QNetConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`QNetConfig`] as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// An MLP action-value function with its own optimizer.
///
/// Parameters are kept in a [`VarMap`] and saved in the safetensors format.
pub struct QNet {
    device: candle_core::Device,
    varmap: VarMap,
    q: Mlp,
    opt: Optimizer,
    in_dim: usize,
    out_dim: usize,
}

impl QNet {
    /// Parameters of the network.
    pub fn get_varmap(&self) -> &VarMap {
        &self.varmap
    }

    fn to_tensor(&self, obs: &Array2<f32>) -> Result<Tensor> {
        let (n, d) = obs.dim();
        if d != self.in_dim {
            return Err(HrlError::Configuration(format!(
                "observation of dimension {} given to a network of input dimension {}",
                d, self.in_dim
            ))
            .into());
        }
        let data = obs.iter().copied().collect::<Vec<_>>();
        Ok(Tensor::from_slice(&data[..], (n, d), &self.device)?)
    }
}

impl ValueFunction for QNet {
    type Config = QNetConfig;

    const WEIGHTS_EXTENSION: &'static str = "safetensors";

    fn build(config: &Self::Config, in_dim: usize, out_dim: usize) -> Result<Self> {
        let device: candle_core::Device = config.device.try_into()?;
        let varmap = VarMap::new();
        let q = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
            Mlp::build(vb, MlpConfig::new(in_dim, config.units.clone(), out_dim))?
        };
        let opt = config.opt_config.build(varmap.all_vars())?;

        Ok(Self {
            device,
            varmap,
            q,
            opt,
            in_dim,
            out_dim,
        })
    }

    fn in_dim(&self) -> usize {
        self.in_dim
    }

    fn out_dim(&self) -> usize {
        self.out_dim
    }

    fn forward(&self, obs: &Array2<f32>) -> Result<Array2<f32>> {
        let xs = self.to_tensor(obs)?;
        let q = self.q.forward(&xs)?.to_device(&candle_core::Device::Cpu)?;
        let (n, m) = q.dims2()?;
        let data = q.flatten_all()?.to_vec1::<f32>()?;
        Ok(Array2::from_shape_vec((n, m), data)?)
    }

    fn fit(&mut self, obs: &Array2<f32>, act: &[usize], targets: &[f32]) -> Result<f32> {
        let n = act.len();
        if obs.nrows() != n || targets.len() != n {
            return Err(HrlError::Configuration(format!(
                "batch of {} observations, {} actions and {} targets",
                obs.nrows(),
                n,
                targets.len()
            ))
            .into());
        }
        if let Some(&a) = act.iter().find(|&&a| a >= self.out_dim) {
            return Err(HrlError::Configuration(format!(
                "action {} out of range for {} actions",
                a, self.out_dim
            ))
            .into());
        }

        let xs = self.to_tensor(obs)?;
        let act = {
            let act = act.iter().map(|&a| a as u32).collect::<Vec<_>>();
            Tensor::from_slice(&act[..], (n, 1), &self.device)?
        };
        let tgt = Tensor::from_slice(targets, (n,), &self.device)?;
        let pred = self.q.forward(&xs)?.gather(&act, D::Minus1)?.squeeze(D::Minus1)?;

        let loss = squared_residual(&pred, &tgt)?;
        self.opt.backward_step(&loss)?;
        let loss = loss.to_scalar::<f32>()?;
        trace!("loss = {}", loss);
        Ok(loss)
    }

    fn copy_from(&mut self, src: &Self) -> Result<()> {
        copy(&self.varmap, &src.varmap)
    }

    fn save(&self, path: &Path) -> Result<()> {
        self.varmap.save(path)?;
        info!("Save qnet to {:?}", path);
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        self.varmap.load(path).map_err(|e| {
            HrlError::Snapshot(format!("failed to load {:?}: {}", path, e))
        })?;
        info!("Load qnet from {:?}", path);
        Ok(())
    }
}
