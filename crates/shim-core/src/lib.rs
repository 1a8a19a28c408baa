//! Lazy tensor handles, graph IR and the CPU reference backend behind the
//! shim frontend.
//!
//! `shim-core` provides the foundational types (`Tensor`, `Device`, `DType`,
//! `Shape`) and a backend-agnostic interface for lazy tensor computation.
//! Frontend crates compose `Tensor` methods; nothing runs until a tensor is
//! evaluated on its stream.

pub mod backend;
pub mod config;
pub mod cpu_kernels;
pub mod graph;
pub mod tensor;
pub mod types;

pub use graph::{NativePadMode, NodeId, Scalar, UnaryOp};
pub use tensor::{Device, Tensor};
pub use types::{DType, Shape};

pub type Result<T> = std::result::Result<T, ShimError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ShimError {
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch { expected: Vec<i64>, got: Vec<i64> },

    #[error("{op}: rank mismatch, expected {expected}, got {got}")]
    RankMismatch {
        op: &'static str,
        expected: String,
        got: usize,
    },

    #[error("axis {axis} out of range for ndim {ndim}")]
    InvalidAxis { axis: i64, ndim: usize },

    #[error("{op}: invalid mode '{mode}', valid modes are {valid}")]
    InvalidMode {
        op: &'static str,
        mode: String,
        valid: &'static str,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),
}
