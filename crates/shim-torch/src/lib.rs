//! PyTorch/NumPy-flavoured frontend over `shim-core` lazy tensors.
//!
//! Functions here validate arguments the way their Python counterparts do
//! and lower to graph ops. Padding requests are first checked against the
//! native kernel's limits (`shim_ops::check_pad`) and composed from simpler
//! ops when the kernel cannot serve them.

pub mod manipulation;
pub mod nn;
pub mod pad;
pub mod pad_fallback;
pub mod spectral;
pub mod vision;

pub use manipulation::{
    IndicesOrSections, TakeMode, TopK, atleast_1d, atleast_2d, atleast_3d, broadcast_shapes,
    dsplit, dstack, expand, fliplr, flipud, heaviside, hsplit, hstack, i0, moveaxis, rot90,
    take_along_axis, top_k, vsplit, vstack,
};
pub use pad::pad;
pub use shim_ops::{PadMode, PadOptions, PadValue, PadWidth, ReflectType};
pub use spectral::{bartlett_window, blackman_window};
pub use vision::nms;
