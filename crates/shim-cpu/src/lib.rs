//! Explicit CPU streams.
//!
//! Frontend calls take their backend from the stream their tensors live on.
//! Callers that want isolation from the process-wide default stream create
//! one here and bind tensors to it with `Tensor::from_data_on`.

use std::sync::Arc;

use shim_core::backend::Stream;
use shim_core::config::RuntimeConfig;

pub use shim_core::cpu_kernels::CpuRefBackend;

/// A fresh stream on the CPU reference backend, configured from the environment.
pub fn cpu_stream() -> Arc<Stream> {
    Arc::new(Stream::new(Box::new(CpuRefBackend)))
}

/// A fresh CPU stream with an explicit configuration.
pub fn cpu_stream_with(config: RuntimeConfig) -> Arc<Stream> {
    Arc::new(Stream::with_config(Box::new(CpuRefBackend), config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shim_core::{DType, Shape, Tensor};

    #[test]
    fn streams_are_isolated() {
        let a = cpu_stream_with(RuntimeConfig::default());
        let b = cpu_stream_with(RuntimeConfig::default());
        let x = Tensor::from_data_on(&a, vec![1.0, 2.0], &Shape::new(vec![2]), DType::F32).unwrap();
        assert_eq!(a.graph_node_count(), 1);
        assert_eq!(b.graph_node_count(), 0);
        assert_eq!(x.flip(&[0]).unwrap().to_vec_f32().unwrap(), vec![2.0, 1.0]);
    }

    #[test]
    fn config_is_applied() {
        let s = cpu_stream_with(RuntimeConfig { cse: false });
        assert!(!s.config().cse);
    }
}
