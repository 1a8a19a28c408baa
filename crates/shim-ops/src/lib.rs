//! Shape rules for the frontend: broadcasting, shape inference, dtype
//! promotion and the pad fast-path validator.

pub mod broadcast;
pub mod dtype_promotion;
pub mod pad_check;
pub mod shape_inference;

pub use broadcast::{broadcast_all, broadcast_shapes};
pub use dtype_promotion::{promote, result_type};
pub use pad_check::{
    FallbackReason, NativePad, PadDispatch, PadMode, PadOptions, PadValue, PadWidth, ReflectType,
    check_pad, collapse_constant,
};
pub use shape_inference::infer_shape;

use shim_core::ShimError;

/// Error returned when shapes are incompatible for an op.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShapeError {
    #[error("shape mismatch: {0}")]
    Mismatch(String),

    #[error("invalid axis {axis} for ndim {ndim}")]
    InvalidAxis { axis: i64, ndim: usize },

    #[error("invalid pad width: {0}")]
    InvalidPadWidth(String),
}

impl From<ShapeError> for ShimError {
    fn from(err: ShapeError) -> Self {
        match err {
            ShapeError::InvalidAxis { axis, ndim } => ShimError::InvalidAxis { axis, ndim },
            other => ShimError::InvalidArgument(other.to_string()),
        }
    }
}
