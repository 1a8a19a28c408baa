//! `torch.nn` activations and normalizations.
//!
//! [`functional`] holds the free functions; [`activation`] and [`norm`]
//! wrap the parameterized ones as modules carrying PyTorch's default
//! arguments.

pub mod activation;
pub mod functional;
pub mod norm;

use shim_core::{Result, Tensor};

pub use activation::{
    Celu, Elu, Gelu, Glu, Hardshrink, Hardtanh, LeakyRelu, LogSoftmax, PRelu, Softmax, Softmin,
    Softplus, Softshrink, Threshold,
};
pub use norm::LocalResponseNorm;

/// A layer mapping one tensor to another.
pub trait Module {
    fn forward(&self, input: &Tensor) -> Result<Tensor>;
}
