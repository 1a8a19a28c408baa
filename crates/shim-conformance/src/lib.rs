//! Conformance harness for the frontend.
//!
//! Frontend outputs are checked three ways: against hand-computed values,
//! against an `ndarray` reference ([`reference`]) on proptest-generated inputs
//! ([`strategies`]), and against recorded JSON fixtures ([`golden`]).

pub mod golden;
pub mod reference;
pub mod strategies;

use std::sync::Arc;

use shim_core::backend::Stream;
use shim_core::{DType, Shape, Tensor};

/// Assert two f32 slices are element-wise close.
pub fn assert_allclose(actual: &[f32], expected: &[f32], atol: f32, rtol: f32) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "length mismatch: actual={} expected={}",
        actual.len(),
        expected.len()
    );
    for (i, (x, y)) in actual.iter().zip(expected.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "mismatch at [{i}]: actual={x} expected={y} diff={diff} tol={tol}"
        );
    }
}

/// Like [`assert_allclose`], but NaN must line up with NaN.
pub fn assert_allclose_nan(actual: &[f32], expected: &[f32], atol: f32, rtol: f32) {
    assert_eq!(actual.len(), expected.len(), "length mismatch");
    for (i, (x, y)) in actual.iter().zip(expected.iter()).enumerate() {
        assert_eq!(
            x.is_nan(),
            y.is_nan(),
            "NaN mismatch at [{i}]: actual={x} expected={y}"
        );
    }
    let keep = |v: &[f32]| -> Vec<f32> { v.iter().map(|x| if x.is_nan() { 0.0 } else { *x }).collect() };
    assert_allclose(&keep(actual), &keep(expected), atol, rtol);
}

/// Deterministic f32 data in roughly `[-1, 1]` from a 64-bit LCG.
///
/// Reproducible across platforms; not suitable for anything statistical.
pub fn gen_data(n: usize, seed: u64) -> Vec<f32> {
    let mut state = seed;
    (0..n)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 33) as f64 / (1u64 << 31) as f64 * 2.0 - 1.0) as f32
        })
        .collect()
}

/// F32 tensor on `stream` from dims and data.
pub fn tensor_on(stream: &Arc<Stream>, dims: &[usize], data: Vec<f32>) -> Tensor {
    Tensor::from_data_on(stream, data, &Shape::from_usize(dims), DType::F32)
        .expect("dims and data disagree")
}
