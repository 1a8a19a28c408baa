//! Activation modules with PyTorch's default arguments.

use shim_core::{Result, Shape, Tensor};

use super::Module;
use super::functional as F;

/// Exponential linear unit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Elu {
    pub alpha: f32,
}

impl Default for Elu {
    fn default() -> Self {
        Self { alpha: 1.0 }
    }
}

impl Module for Elu {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        Ok(F::elu(input, self.alpha))
    }
}

/// Continuously differentiable ELU.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Celu {
    pub alpha: f32,
}

impl Default for Celu {
    fn default() -> Self {
        Self { alpha: 1.0 }
    }
}

impl Module for Celu {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        F::celu(input, self.alpha)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Gelu {
    /// Use the tanh approximation instead of the exact erf form.
    pub tanh: bool,
}

impl Module for Gelu {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        F::gelu(input, if self.tanh { "tanh" } else { "none" })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Glu {
    pub dim: i32,
}

impl Default for Glu {
    fn default() -> Self {
        Self { dim: -1 }
    }
}

impl Module for Glu {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        F::glu(input, self.dim)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hardshrink {
    pub lambd: f32,
}

impl Default for Hardshrink {
    fn default() -> Self {
        Self { lambd: 0.5 }
    }
}

impl Module for Hardshrink {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        Ok(F::hardshrink(input, self.lambd))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Softshrink {
    pub lambd: f32,
}

impl Default for Softshrink {
    fn default() -> Self {
        Self { lambd: 0.5 }
    }
}

impl Module for Softshrink {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        F::softshrink(input, self.lambd)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hardtanh {
    pub min_val: f32,
    pub max_val: f32,
}

impl Default for Hardtanh {
    fn default() -> Self {
        Self {
            min_val: -1.0,
            max_val: 1.0,
        }
    }
}

impl Module for Hardtanh {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        F::hardtanh(input, self.min_val, self.max_val)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LeakyRelu {
    pub negative_slope: f32,
}

impl Default for LeakyRelu {
    fn default() -> Self {
        Self {
            negative_slope: 0.01,
        }
    }
}

impl Module for LeakyRelu {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        Ok(F::leaky_relu(input, self.negative_slope))
    }
}

/// Smooth ReLU; reverts to the identity once `beta * x > threshold`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Softplus {
    pub beta: f32,
    pub threshold: f32,
}

impl Default for Softplus {
    fn default() -> Self {
        Self {
            beta: 1.0,
            threshold: 20.0,
        }
    }
}

impl Module for Softplus {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        Ok(F::softplus(input, self.beta, self.threshold))
    }
}

/// Replace values not above `threshold` with `value`. PyTorch has no defaults here.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Threshold {
    pub threshold: f32,
    pub value: f32,
}

impl Threshold {
    pub fn new(threshold: f32, value: f32) -> Self {
        Self { threshold, value }
    }
}

impl Module for Threshold {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        Ok(F::threshold(input, self.threshold, self.value))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Softmax {
    pub dim: i32,
}

impl Module for Softmax {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        F::softmax(input, self.dim)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogSoftmax {
    pub dim: i32,
}

impl Module for LogSoftmax {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        F::log_softmax(input, self.dim)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Softmin {
    pub dim: i32,
}

impl Module for Softmin {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        F::softmin(input, self.dim)
    }
}

/// Parametric ReLU holding one learnable slope per channel.
#[derive(Clone, Debug)]
pub struct PRelu {
    weight: Tensor,
}

impl PRelu {
    /// PyTorch's initial slope.
    pub const INIT: f32 = 0.25;

    /// `num_parameters` slopes initialised to [`PRelu::INIT`] on `like`'s stream.
    pub fn new(like: &Tensor, num_parameters: usize) -> Result<Self> {
        let shape = Shape::new(vec![num_parameters as i64]);
        let weight = like.full_like(&shape, Self::INIT, like.dtype())?;
        Ok(Self { weight })
    }

    pub fn from_weight(weight: Tensor) -> Self {
        Self { weight }
    }

    pub fn weight(&self) -> &Tensor {
        &self.weight
    }
}

impl Module for PRelu {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        F::prelu(input, &self.weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shim_core::Device;

    fn t(data: &[f32], dims: &[i64]) -> Tensor {
        Tensor::from_f32(data, &Shape::new(dims.to_vec()), &Device::Cpu).unwrap()
    }

    #[test]
    fn test_defaults_match_torch() {
        assert_eq!(LeakyRelu::default().negative_slope, 0.01);
        assert_eq!(Softplus::default(), Softplus { beta: 1.0, threshold: 20.0 });
        assert_eq!(Hardtanh::default(), Hardtanh { min_val: -1.0, max_val: 1.0 });
        assert_eq!(Glu::default().dim, -1);
        assert!(!Gelu::default().tanh);
    }

    #[test]
    fn test_modules_forward() {
        let x = t(&[-2.0, -0.25, 0.25, 2.0], &[1, 4]);
        let layers: Vec<Box<dyn Module>> = vec![
            Box::new(Hardshrink::default()),
            Box::new(Softshrink::default()),
            Box::new(Hardtanh::default()),
            Box::new(Threshold::new(0.0, -1.0)),
        ];
        let outputs: Vec<Vec<f32>> = layers
            .iter()
            .map(|m| m.forward(&x).unwrap().to_vec_f32().unwrap())
            .collect();
        assert_eq!(outputs[0], vec![-2.0, 0.0, 0.0, 2.0]);
        assert_eq!(outputs[1], vec![-1.5, 0.0, 0.0, 1.5]);
        assert_eq!(outputs[2], vec![-1.0, -0.25, 0.25, 1.0]);
        assert_eq!(outputs[3], vec![-1.0, -1.0, 0.25, 2.0]);
    }

    #[test]
    fn test_prelu_module_initial_slope() {
        let x = t(&[-4.0, 4.0, -8.0, 8.0], &[2, 2]);
        let prelu = PRelu::new(&x, 2).unwrap();
        assert_eq!(
            prelu.forward(&x).unwrap().to_vec_f32().unwrap(),
            vec![-1.0, 4.0, -2.0, 8.0]
        );
    }
}
