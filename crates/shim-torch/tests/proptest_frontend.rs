//! Property tests for the frontend functions.

use proptest::prelude::*;
use shim_core::{DType, Shape, Tensor};
use shim_cpu::cpu_stream;
use shim_torch::pad_fallback::pad_fallback;
use shim_torch::{PadMode, PadOptions, fliplr, moveaxis, pad, take_along_axis};

fn arb_shape(min_rank: usize) -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(1i64..=4, min_rank..=3)
}

fn tensor_for(dims: Vec<i64>) -> impl Strategy<Value = (Vec<i64>, Vec<f32>)> {
    let n: i64 = dims.iter().product();
    (Just(dims), prop::collection::vec(-100.0f32..100.0, n as usize))
}

fn make(dims: &[i64], data: Vec<f32>) -> Tensor {
    Tensor::from_data_on(&cpu_stream(), data, &Shape::new(dims.to_vec()), DType::F32).unwrap()
}

proptest! {
    #[test]
    fn moveaxis_inverse((dims, data) in arb_shape(1).prop_flat_map(tensor_for), src in 0i32..3, dst in 0i32..3) {
        let ndim = dims.len() as i32;
        let (s, d) = (src % ndim, dst % ndim);
        let a = make(&dims, data.clone());
        let moved = moveaxis(&a, &[s], &[d]).unwrap();
        let back = moveaxis(&moved, &[d], &[s]).unwrap();
        prop_assert_eq!(back.to_vec_f32().unwrap(), data);
    }

    #[test]
    fn fliplr_involution((dims, data) in arb_shape(2).prop_flat_map(tensor_for)) {
        let m = make(&dims, data.clone());
        let twice = fliplr(&fliplr(&m).unwrap()).unwrap();
        prop_assert_eq!(twice.to_vec_f32().unwrap(), data);
    }

    #[test]
    fn constant_pad_border_and_interior(
        (dims, data) in arb_shape(1).prop_flat_map(tensor_for),
        before in 0usize..3,
        after in 0usize..3,
        value in -5.0f32..5.0,
    ) {
        let x = make(&dims, data.clone());
        let widths = vec![(before, after); dims.len()];
        let options = PadOptions::new(PadMode::Constant).constant_values(value);
        let out = pad(&x, widths, &options).unwrap();
        let padded = out.to_vec_f32().unwrap();
        let out_dims: Vec<usize> = out.shape().dims();

        let mut interior = Vec::new();
        for (flat, &v) in padded.iter().enumerate() {
            let mut rem = flat;
            let mut inside = true;
            for d in (0..out_dims.len()).rev() {
                let c = rem % out_dims[d];
                rem /= out_dims[d];
                if c < before || c >= before + dims[d] as usize {
                    inside = false;
                }
            }
            if inside {
                interior.push(v);
            } else {
                prop_assert_eq!(v, value);
            }
        }
        prop_assert_eq!(interior, data);
    }

    #[test]
    fn native_and_composed_mirror_agree(
        (dims, data) in arb_shape(1).prop_flat_map(tensor_for),
        symmetric in any::<bool>(),
        raw in prop::collection::vec((0usize..5, 0usize..5), 3),
    ) {
        let mode = if symmetric { PadMode::Symmetric } else { PadMode::Reflect };
        let limit = |extent: i64| if symmetric { extent as usize } else { extent as usize - 1 };
        let widths: Vec<(usize, usize)> = dims
            .iter()
            .zip(raw.iter())
            .map(|(&e, &(b, a))| (b.min(limit(e)), a.min(limit(e))))
            .collect();
        let x = make(&dims, data);
        let options = PadOptions::new(mode);
        let native = pad(&x, widths.clone(), &options).unwrap();
        let composed = pad_fallback(&x, &widths, &options).unwrap();
        prop_assert_eq!(native.to_vec_f32().unwrap(), composed.to_vec_f32().unwrap());
    }

    #[test]
    fn clip_gather_never_reads_out_of_bounds(
        data in prop::collection::vec(-10.0f32..10.0, 1..8),
        raw in prop::collection::vec(-20i64..20, 1..8),
    ) {
        let n = data.len() as i64;
        let x = make(&[n], data.clone());
        let idx = Tensor::from_data_on(
            &x.stream(),
            raw.iter().map(|&i| i as f32).collect(),
            &Shape::new(vec![raw.len() as i64]),
            DType::I64,
        )
        .unwrap();
        let got = take_along_axis(&x, &idx, 0, "clip").unwrap().to_vec_f32().unwrap();
        for (g, &i) in got.iter().zip(raw.iter()) {
            prop_assert_eq!(*g, data[i.clamp(0, n - 1) as usize]);
        }
    }
}
