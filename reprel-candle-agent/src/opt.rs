//! Optimizers.
use anyhow::Result;
use candle_core::{Tensor, Var};
use candle_nn::{AdamW, Optimizer as _, ParamsAdamW};
use candle_optimisers::adam::{Adam, ParamsAdam};
use serde::{Deserialize, Serialize};

/// Configuration of the optimizer of a value function.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub enum OptimizerConfig {
    /// AdamW optimizer.
    AdamW {
        /// Learning rate.
        lr: f64,
        #[serde(default = "default_beta1")]
        /// Decay rate of the first moment.
        beta1: f64,
        #[serde(default = "default_beta2")]
        /// Decay rate of the second moment.
        beta2: f64,
        #[serde(default = "default_eps")]
        /// Term added to the denominator.
        eps: f64,
        #[serde(default = "default_weight_decay")]
        /// Weight decay.
        weight_decay: f64,
    },

    /// Adam optimizer.
    Adam {
        /// Learning rate.
        lr: f64,
    },
}

fn default_beta1() -> f64 {
    ParamsAdamW::default().beta1
}

fn default_beta2() -> f64 {
    ParamsAdamW::default().beta2
}

fn default_eps() -> f64 {
    ParamsAdamW::default().eps
}

fn default_weight_decay() -> f64 {
    ParamsAdamW::default().weight_decay
}

impl OptimizerConfig {
    /// Constructs the optimizer of the given variables.
    pub fn build(&self, vars: Vec<Var>) -> Result<Optimizer> {
        match &self {
            OptimizerConfig::AdamW {
                lr,
                beta1,
                beta2,
                eps,
                weight_decay,
            } => {
                let params = ParamsAdamW {
                    lr: *lr,
                    beta1: *beta1,
                    beta2: *beta2,
                    eps: *eps,
                    weight_decay: *weight_decay,
                };
                Ok(Optimizer::AdamW(AdamW::new(vars, params)?))
            }
            OptimizerConfig::Adam { lr } => {
                let params = ParamsAdam {
                    lr: *lr,
                    ..ParamsAdam::default()
                };
                Ok(Optimizer::Adam(Adam::new(vars, params)?))
            }
        }
    }

    /// Overrides the learning rate.
    pub fn learning_rate(self, lr: f64) -> Self {
        match self {
            Self::AdamW {
                beta1,
                beta2,
                eps,
                weight_decay,
                ..
            } => Self::AdamW {
                lr,
                beta1,
                beta2,
                eps,
                weight_decay,
            },
            Self::Adam { .. } => Self::Adam { lr },
        }
    }

    /// Returns the learning rate.
    pub fn get_learning_rate(&self) -> f64 {
        match self {
            Self::AdamW { lr, .. } | Self::Adam { lr } => *lr,
        }
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::Adam { lr: 3e-4 }
    }
}

/// Optimizers.
///
/// This is a thin wrapper of the optimizers of candle.
pub enum Optimizer {
    /// AdamW optimizer.
    AdamW(AdamW),

    /// Adam optimizer.
    Adam(Adam),
}

impl Optimizer {
    /// Applies a backward step pass.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        match self {
            Self::AdamW(opt) => Ok(opt.backward_step(loss)?),
            Self::Adam(opt) => Ok(opt.backward_step(loss)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{Device, Tensor};

    // Minimizes `(w - 3)^2` from `w = 0`.
    fn optimize(config: &OptimizerConfig) -> Result<f32> {
        let w = Var::from_tensor(&Tensor::zeros((1,), candle_core::DType::F32, &Device::Cpu)?)?;
        let mut opt = config.build(vec![w.clone()])?;
        for _ in 0..100 {
            let loss = (w.as_tensor() - 3.0)?.sqr()?.sum_all()?;
            opt.backward_step(&loss)?;
        }
        Ok(w.as_tensor().to_vec1::<f32>()?[0])
    }

    #[test]
    fn test_adam_and_adamw_minimize() -> Result<()> {
        let adam = OptimizerConfig::Adam { lr: 0.1 };
        let adamw: OptimizerConfig = serde_yaml::from_str("AdamW:\n  lr: 0.1\n")?;
        assert_eq!(
            adamw,
            OptimizerConfig::AdamW {
                lr: 0.1,
                beta1: ParamsAdamW::default().beta1,
                beta2: ParamsAdamW::default().beta2,
                eps: ParamsAdamW::default().eps,
                weight_decay: ParamsAdamW::default().weight_decay,
            }
        );

        for config in [adam, adamw] {
            let w = optimize(&config)?;
            assert!((w - 3.0).abs() < 1.0, "{:?} ended at {}", config, w);
        }
        Ok(())
    }

    #[test]
    fn test_learning_rate_keeps_adamw_params() {
        let config = OptimizerConfig::AdamW {
            lr: 1e-3,
            beta1: 0.8,
            beta2: 0.9,
            eps: 1e-6,
            weight_decay: 0.0,
        }
        .learning_rate(1e-2);
        assert_eq!(config.get_learning_rate(), 1e-2);
        match config {
            OptimizerConfig::AdamW { beta1, weight_decay, .. } => {
                assert_eq!(beta1, 0.8);
                assert_eq!(weight_decay, 0.0);
            }
            _ => panic!("variant changed"),
        }
        assert_eq!(OptimizerConfig::default().get_learning_rate(), 3e-4);
    }
}
