//! End-to-end frontend scenarios on isolated CPU streams.

use std::sync::Arc;

use shim_core::backend::Stream;
use shim_core::{DType, Shape, ShimError, Tensor};
use shim_cpu::cpu_stream;
use shim_torch::{
    IndicesOrSections, PadMode, PadOptions, PadValue, broadcast_shapes, dsplit, fliplr, flipud,
    heaviside, moveaxis, pad, take_along_axis, top_k,
};

fn on(stream: &Arc<Stream>, data: &[f32], dims: &[i64], dtype: DType) -> Tensor {
    Tensor::from_data_on(stream, data.to_vec(), &Shape::new(dims.to_vec()), dtype).unwrap()
}

fn arange(stream: &Arc<Stream>, dims: &[i64]) -> Tensor {
    let n: i64 = dims.iter().product();
    let data: Vec<f32> = (0..n).map(|i| i as f32).collect();
    on(stream, &data, dims, DType::F32)
}

#[test]
fn constant_pad_scenario() {
    let s = cpu_stream();
    let x = on(&s, &[1.0, 2.0, 3.0, 4.0], &[2, 2], DType::F32);
    let options = PadOptions::new(PadMode::Constant).constant_values(0.0);
    let out = pad(&x, vec![(1, 1), (0, 0)], &options).unwrap();
    assert_eq!(out.shape(), &Shape::new(vec![4, 2]));
    assert_eq!(
        out.to_vec_f32().unwrap(),
        vec![0.0, 0.0, 1.0, 2.0, 3.0, 4.0, 0.0, 0.0]
    );
}

#[test]
fn nested_uniform_constant_takes_one_pad_node() {
    let s = cpu_stream();
    let x = arange(&s, &[2, 3]);
    let before = s.graph_node_count();
    let values = PadValue::from(vec![(5.0, 5.0), (5.0, 5.0)]);
    let out = pad(&x, 1usize, &PadOptions::new(PadMode::Constant).constant_values(values)).unwrap();
    assert_eq!(s.graph_node_count(), before + 1);
    let data = out.to_vec_f32().unwrap();
    assert_eq!(data.len(), 4 * 5);
    assert!(data[..5].iter().all(|&v| v == 5.0));
}

#[test]
fn pad_errors_name_the_mode() {
    let s = cpu_stream();
    let x = arange(&s, &[3]);
    let err = "mirror".parse::<PadMode>().unwrap_err();
    assert!(err.to_string().contains("mirror"));
    assert!(err.to_string().contains("linear_ramp"));
    assert!(pad(&x, vec![(1, 1), (1, 1)], &PadOptions::default()).is_err());
}

#[test]
fn moveaxis_round_trip() {
    let s = cpu_stream();
    let a = arange(&s, &[2, 3, 4]);
    let moved = moveaxis(&a, &[0, 2], &[2, 0]).unwrap();
    assert_eq!(moved.shape(), &Shape::new(vec![4, 3, 2]));
    let back = moveaxis(&moved, &[2, 0], &[0, 2]).unwrap();
    assert_eq!(back.to_vec_f32().unwrap(), a.to_vec_f32().unwrap());
}

#[test]
fn flips_are_involutions() {
    let s = cpu_stream();
    let m = arange(&s, &[3, 4]);
    let orig = m.to_vec_f32().unwrap();
    assert_eq!(fliplr(&fliplr(&m).unwrap()).unwrap().to_vec_f32().unwrap(), orig);
    assert_eq!(flipud(&flipud(&m).unwrap()).unwrap().to_vec_f32().unwrap(), orig);
}

#[test]
fn dsplit_rank_rules() {
    let s = cpu_stream();
    let flat = arange(&s, &[2, 4]);
    assert!(matches!(
        dsplit(&flat, &IndicesOrSections::Sections(2)),
        Err(ShimError::RankMismatch { .. })
    ));
    let cube = arange(&s, &[2, 2, 4]);
    let parts = dsplit(&cube, &IndicesOrSections::Sections(2)).unwrap();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0].shape(), &Shape::new(vec![2, 2, 2]));
}

#[test]
fn clip_policy_clamps_past_the_end() {
    let s = cpu_stream();
    let arr = on(&s, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3], DType::F32);
    let at_extent = on(&s, &[3.0, 3.0], &[2, 1], DType::I64);
    let at_last = on(&s, &[2.0, 2.0], &[2, 1], DType::I64);
    let a = take_along_axis(&arr, &at_extent, 1, "clip").unwrap();
    let b = take_along_axis(&arr, &at_last, 1, "clip").unwrap();
    assert_eq!(a.to_vec_f32().unwrap(), b.to_vec_f32().unwrap());
    assert_eq!(a.to_vec_f32().unwrap(), vec![3.0, 6.0]);
}

#[test]
fn fill_policy_uses_dtype_sentinel() {
    let s = cpu_stream();
    let idx = on(&s, &[-1.0, 3.0, 0.0], &[3], DType::I64);

    let floats = on(&s, &[1.0, 2.0, 3.0], &[3], DType::F32);
    let got = take_along_axis(&floats, &idx, 0, "fill").unwrap().to_vec_f32().unwrap();
    assert!(got[0].is_nan() && got[1].is_nan());
    assert_eq!(got[2], 1.0);

    let bytes = on(&s, &[1.0, 2.0, 3.0], &[3], DType::U8);
    let got = take_along_axis(&bytes, &idx, 0, "drop").unwrap().to_vec_f32().unwrap();
    assert_eq!(got, vec![255.0, 255.0, 1.0]);
}

#[test]
fn take_along_axis_broadcasts_index_rows() {
    let s = cpu_stream();
    let arr = on(&s, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3], DType::F32);
    let idx = on(&s, &[2.0, 0.0], &[1, 2], DType::I64);
    let out = take_along_axis(&arr, &idx, -1, "fill").unwrap();
    assert_eq!(out.shape(), &Shape::new(vec![2, 2]));
    assert_eq!(out.to_vec_f32().unwrap(), vec![3.0, 1.0, 6.0, 4.0]);
}

#[test]
fn broadcast_shapes_scenario() {
    assert_eq!(broadcast_shapes(&[&[1, 3], &[4, 1]]).unwrap(), vec![4, 3]);
    assert_eq!(broadcast_shapes(&[&[8, 1, 3], &[4, 1], &[1]]).unwrap(), vec![8, 4, 3]);
}

#[test]
fn heaviside_mixed_signs() {
    let s = cpu_stream();
    let x = on(&s, &[-1.5, 0.0, 2.0, f32::NAN], &[4], DType::F32);
    let v = on(&s, &[0.5], &[1], DType::F32);
    let out = heaviside(&x, &v).unwrap().to_vec_f32().unwrap();
    assert_eq!(&out[..3], &[0.0, 0.5, 1.0]);
    assert!(out[3].is_nan());
}

#[test]
fn top_k_then_gather_agrees() {
    let s = cpu_stream();
    let x = on(&s, &[0.3, 0.9, 0.1, 0.7], &[1, 4], DType::F32);
    let top = top_k(&x, 3, 1, true).unwrap();
    assert_eq!(top.indices.to_vec_f32().unwrap(), vec![1.0, 3.0, 0.0]);
    let regathered = take_along_axis(&x, &top.indices, 1, "clip").unwrap();
    assert_eq!(
        regathered.to_vec_f32().unwrap(),
        top.values.to_vec_f32().unwrap()
    );
}
