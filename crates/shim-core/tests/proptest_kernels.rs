//! Property checks on the reference kernels through the lazy graph.

use std::sync::Arc;

use proptest::prelude::*;
use shim_core::backend::Stream;
use shim_core::config::RuntimeConfig;
use shim_core::cpu_kernels::CpuRefBackend;
use shim_core::{DType, NativePadMode, Shape, Tensor};

fn fresh_stream() -> Arc<Stream> {
    Arc::new(Stream::with_config(
        Box::new(CpuRefBackend),
        RuntimeConfig { cse: true },
    ))
}

fn vector(data: Vec<f32>) -> Tensor {
    let n = data.len() as i64;
    Tensor::from_data_on(&fresh_stream(), data, &Shape::new(vec![n]), DType::F32).unwrap()
}

proptest! {
    #[test]
    fn flip_twice_is_identity(data in prop::collection::vec(-100.0f32..100.0, 1..32)) {
        let x = vector(data.clone());
        let y = x.flip(&[0]).unwrap().flip(&[0]).unwrap();
        prop_assert_eq!(y.to_vec_f32().unwrap(), data);
    }

    #[test]
    fn constant_pad_keeps_interior(
        data in prop::collection::vec(-100.0f32..100.0, 1..16),
        before in 0usize..5,
        after in 0usize..5,
    ) {
        let x = vector(data.clone());
        let out = x.pad(&[(before, after)], NativePadMode::Constant, 7.0).unwrap();
        let got = out.to_vec_f32().unwrap();
        prop_assert_eq!(got.len(), before + data.len() + after);
        prop_assert!(got[..before].iter().all(|&v| v == 7.0));
        prop_assert_eq!(&got[before..before + data.len()], &data[..]);
        prop_assert!(got[before + data.len()..].iter().all(|&v| v == 7.0));
    }

    #[test]
    fn argsort_orders_values(data in prop::collection::vec(-100.0f32..100.0, 1..32)) {
        let x = vector(data.clone());
        let order = x.argsort(0).unwrap();
        let sorted = x.take_along_axis(&order, 0).unwrap().to_vec_f32().unwrap();
        prop_assert!(sorted.windows(2).all(|w| w[0] <= w[1]));
        let mut expected = data;
        expected.sort_by(f32::total_cmp);
        prop_assert_eq!(sorted, expected);
    }
}
