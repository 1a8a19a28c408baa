//! Straightforward `ndarray` implementations the frontend is compared with.
//!
//! Nothing here is lazy or clever; every function builds its output
//! element by element from the NumPy definition.

use ndarray::{ArrayD, Axis, IxDyn, concatenate};

use shim_core::Tensor;

/// Evaluate `t` and copy it into an `ArrayD`.
pub fn to_array(t: &Tensor) -> shim_core::Result<ArrayD<f32>> {
    let data = t.to_vec_f32()?;
    let dims = t.shape().dims();
    ArrayD::from_shape_vec(IxDyn(&dims), data)
        .map_err(|e| shim_core::ShimError::InvalidArgument(e.to_string()))
}

pub fn from_parts(dims: &[usize], data: Vec<f32>) -> ArrayD<f32> {
    ArrayD::from_shape_vec(IxDyn(dims), data).expect("dims and data disagree")
}

/// Row-major contents.
pub fn flat(a: &ArrayD<f32>) -> Vec<f32> {
    a.iter().copied().collect()
}

/// Map every output coordinate to a source coordinate, or to `None` for fill.
fn pad_with(
    a: &ArrayD<f32>,
    widths: &[(usize, usize)],
    fill: f32,
    source: impl Fn(i64, i64) -> Option<i64>,
) -> ArrayD<f32> {
    let out_dims: Vec<usize> = a
        .shape()
        .iter()
        .zip(widths)
        .map(|(&d, &(b, e))| d + b + e)
        .collect();
    ArrayD::from_shape_fn(IxDyn(&out_dims), |idx| {
        let mut src = Vec::with_capacity(out_dims.len());
        for (axis, &(before, _)) in widths.iter().enumerate() {
            let pos = idx[axis] as i64 - before as i64;
            match source(pos, a.shape()[axis] as i64) {
                Some(s) => src.push(s as usize),
                None => return fill,
            }
        }
        a[IxDyn(&src)]
    })
}

pub fn pad_constant(a: &ArrayD<f32>, widths: &[(usize, usize)], value: f32) -> ArrayD<f32> {
    pad_with(a, widths, value, |p, n| (0..n).contains(&p).then_some(p))
}

/// numpy `reflect` (edge not repeated) or `symmetric` (edge repeated), any width.
pub fn pad_mirror(a: &ArrayD<f32>, widths: &[(usize, usize)], symmetric: bool) -> ArrayD<f32> {
    pad_with(a, widths, 0.0, |p, n| {
        let mut p = p;
        if n == 1 {
            return Some(0);
        }
        // Fold one reflection at a time until in range.
        while !(0..n).contains(&p) {
            p = match (p < 0, symmetric) {
                (true, false) => -p,
                (true, true) => -p - 1,
                (false, false) => 2 * (n - 1) - p,
                (false, true) => 2 * n - 1 - p,
            };
        }
        Some(p)
    })
}

pub fn pad_edge(a: &ArrayD<f32>, widths: &[(usize, usize)]) -> ArrayD<f32> {
    pad_with(a, widths, 0.0, |p, n| Some(p.clamp(0, n - 1)))
}

pub fn pad_wrap(a: &ArrayD<f32>, widths: &[(usize, usize)]) -> ArrayD<f32> {
    pad_with(a, widths, 0.0, |p, n| Some(p.rem_euclid(n)))
}

pub fn moveaxis(a: &ArrayD<f32>, source: usize, destination: usize) -> ArrayD<f32> {
    let mut order: Vec<usize> = (0..a.ndim()).filter(|&d| d != source).collect();
    order.insert(destination, source);
    a.clone().permuted_axes(IxDyn(&order)).as_standard_layout().into_owned()
}

pub fn flip(a: &ArrayD<f32>, axis: usize) -> ArrayD<f32> {
    let mut v = a.view();
    v.invert_axis(Axis(axis));
    v.as_standard_layout().into_owned()
}

/// `take_along_axis` with indices clamped into range.
pub fn take_along_axis_clip(a: &ArrayD<f32>, indices: &ArrayD<i64>, axis: usize) -> ArrayD<f32> {
    let extent = a.shape()[axis] as i64;
    ArrayD::from_shape_fn(indices.raw_dim(), |idx| {
        let i = indices[idx.clone()].clamp(0, extent - 1);
        let mut src = idx;
        src[axis] = i as usize;
        a[src]
    })
}

pub fn softmax(a: &ArrayD<f32>, axis: usize) -> ArrayD<f32> {
    let max = a.fold_axis(Axis(axis), f32::NEG_INFINITY, |&m, &x| m.max(x));
    let shifted = a - &max.insert_axis(Axis(axis));
    let exp = shifted.mapv(f32::exp);
    let total = exp.sum_axis(Axis(axis)).insert_axis(Axis(axis));
    &exp / &total
}

pub fn sum_axis(a: &ArrayD<f32>, axis: usize) -> ArrayD<f32> {
    a.sum_axis(Axis(axis))
}

pub fn concat(arrays: &[ArrayD<f32>], axis: usize) -> ArrayD<f32> {
    let views: Vec<_> = arrays.iter().map(|a| a.view()).collect();
    concatenate(Axis(axis), &views).expect("incompatible shapes")
}
