//! Normalization modules.

use shim_core::{Result, Tensor};

use super::Module;
use super::functional as F;

/// Local response normalization across channels.
///
/// See [`F::local_response_norm`]; defaults follow PyTorch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocalResponseNorm {
    pub size: usize,
    pub alpha: f32,
    pub beta: f32,
    pub k: f32,
}

impl LocalResponseNorm {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            alpha: 1e-4,
            beta: 0.75,
            k: 1.0,
        }
    }
}

impl Module for LocalResponseNorm {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        F::local_response_norm(input, self.size, self.alpha, self.beta, self.k)
    }
}
