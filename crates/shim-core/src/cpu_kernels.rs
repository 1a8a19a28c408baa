//! Built-in CPU reference backend, used as the correctness oracle.
//!
//! This is an intentionally simple, safe Rust implementation of every op.
//! It prioritizes correctness and readability over performance.

use std::cmp::Ordering;

use crate::backend::{Backend, NodeInput};
use crate::graph::{NativePadMode, OpKind, TensorMeta, UnaryOp};
use crate::{DType, Result, Shape, ShimError};

/// Reference CPU backend.
pub struct CpuRefBackend;

impl Backend for CpuRefBackend {
    fn eval_node(
        &self,
        op: &OpKind,
        inputs: &[NodeInput<'_>],
        output_meta: &TensorMeta,
    ) -> Result<Vec<f32>> {
        match op {
            OpKind::Constant => Err(ShimError::InvalidArgument(
                "Constant nodes should be pre-materialized".into(),
            )),
            OpKind::Add => binary_elementwise(inputs, |a, b| a + b),
            OpKind::Sub => binary_elementwise(inputs, |a, b| a - b),
            OpKind::Mul => binary_elementwise(inputs, |a, b| a * b),
            OpKind::Div => binary_elementwise(inputs, |a, b| a / b),
            OpKind::Maximum => binary_elementwise(inputs, |a, b| {
                if a.is_nan() || b.is_nan() {
                    f32::NAN
                } else {
                    a.max(b)
                }
            }),
            OpKind::Minimum => binary_elementwise(inputs, |a, b| {
                if a.is_nan() || b.is_nan() {
                    f32::NAN
                } else {
                    a.min(b)
                }
            }),
            OpKind::Heaviside => binary_elementwise(inputs, heaviside),
            OpKind::Prelu => binary_elementwise(inputs, |x, w| if x > 0.0 { x } else { w * x }),
            OpKind::Unary(u) => {
                let a = require_input(inputs, 0)?;
                Ok(a.data.iter().map(|&x| unary(*u, x)).collect())
            }
            OpKind::AsType { wrapping } => {
                let a = require_input(inputs, 0)?;
                let dtype = output_meta.dtype;
                let convert = if *wrapping { DType::wrap } else { DType::saturate };
                Ok(a.data.iter().map(|&x| convert(dtype, x)).collect())
            }
            OpKind::Sum { axis } => reduce(inputs, *axis, |s| s.iter().sum()),
            OpKind::Mean { axis } => reduce(inputs, *axis, |s| {
                s.iter().sum::<f32>() / s.len() as f32
            }),
            OpKind::Max { axis } => reduce(inputs, *axis, |s| {
                s.iter().copied().fold(f32::NEG_INFINITY, f32::max)
            }),
            OpKind::Min { axis } => reduce(inputs, *axis, |s| {
                s.iter().copied().fold(f32::INFINITY, f32::min)
            }),
            OpKind::Median { axis } => reduce(inputs, *axis, median),
            OpKind::Reshape { .. } => {
                let a = require_input(inputs, 0)?;
                Ok(a.data.to_vec())
            }
            OpKind::Transpose { axes } => transpose(inputs, axes.as_deref()),
            OpKind::Broadcast { target_shape } => broadcast(inputs, target_shape),
            OpKind::Flip { axes } => flip(inputs, axes),
            OpKind::Concatenate { axis } => concatenate(inputs, *axis),
            OpKind::Slice { axis, start, end } => slice(inputs, *axis, *start, *end),
            OpKind::Take { axis } => take(inputs, *axis),
            OpKind::TakeAlongAxis { axis } => take_along_axis(inputs, *axis, output_meta),
            OpKind::MaskOutOfRange { extent } => {
                let a = require_input(inputs, 0)?;
                let extent = *extent as f32;
                Ok(a.data
                    .iter()
                    .map(|&i| if i < 0.0 || i >= extent { -1.0 } else { i })
                    .collect())
            }
            OpKind::ArgSort { axis } => argsort(inputs, *axis),
            OpKind::Pad {
                widths,
                mode,
                value,
            } => pad(inputs, widths, *mode, value.get()),
            OpKind::Softmax { axis } => softmax(inputs, *axis, false),
            OpKind::LogSoftmax { axis } => softmax(inputs, *axis, true),
        }
    }
}

fn require_input<'a>(inputs: &'a [NodeInput<'_>], idx: usize) -> Result<&'a NodeInput<'a>> {
    inputs
        .get(idx)
        .ok_or_else(|| ShimError::InvalidArgument(format!("expected input at index {idx}")))
}

fn resolve_axis(shape: &Shape, axis: i32) -> Result<usize> {
    shape.resolve_axis(axis).ok_or(ShimError::InvalidAxis {
        axis: axis as i64,
        ndim: shape.ndim(),
    })
}

/// Split a shape around `axis` into (outer, extent, inner) element counts.
fn split_at_axis(dims: &[usize], axis: usize) -> (usize, usize, usize) {
    let outer = dims[..axis].iter().product();
    let inner = dims[axis + 1..].iter().product();
    (outer, dims[axis], inner)
}

/// Convert a flat row-major index into coordinates.
fn unravel_into(mut flat: usize, dims: &[usize], coords: &mut [usize]) {
    for d in (0..dims.len()).rev() {
        let extent = dims[d].max(1);
        coords[d] = flat % extent;
        flat /= extent;
    }
}

fn binary_elementwise(inputs: &[NodeInput<'_>], f: fn(f32, f32) -> f32) -> Result<Vec<f32>> {
    let a = require_input(inputs, 0)?;
    let b = require_input(inputs, 1)?;
    if a.data.len() != b.data.len() {
        return Err(ShimError::ShapeMismatch {
            expected: a.shape.0.clone(),
            got: b.shape.0.clone(),
        });
    }
    Ok(a.data
        .iter()
        .zip(b.data.iter())
        .map(|(&x, &y)| f(x, y))
        .collect())
}

fn heaviside(x1: f32, x2: f32) -> f32 {
    if x1.is_nan() {
        f32::NAN
    } else if x1 < 0.0 {
        0.0
    } else if x1 == 0.0 {
        x2
    } else {
        1.0
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// `ln(1 + e^x)` without overflow for large `x`.
fn softplus(x: f32) -> f32 {
    x.max(0.0) + (-x.abs()).exp().ln_1p()
}

/// Abramowitz & Stegun 7.1.26, |error| < 1.5e-7.
fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + 0.327_591_1 * x);
    let poly = t
        * (0.254_829_592
            + t * (-0.284_496_736 + t * (1.421_413_741 + t * (-1.453_152_027 + t * 1.061_405_429))));
    sign * (1.0 - poly * (-x * x).exp())
}

/// Power series `sum (x/2)^(2k) / (k!)^2`. Every term is positive, so the
/// sum is accurate for the whole f32 range.
fn bessel_i0(x: f32) -> f32 {
    if x.is_nan() {
        return f32::NAN;
    }
    let q = (x as f64) * (x as f64) / 4.0;
    let mut term = 1.0f64;
    let mut sum = 1.0f64;
    for k in 1..1000u32 {
        let k = k as f64;
        term *= q / (k * k);
        sum += term;
        if term < sum * 1e-17 || !sum.is_finite() {
            break;
        }
    }
    sum as f32
}

const SELU_ALPHA: f32 = 1.673_263_2;
const SELU_SCALE: f32 = 1.050_701;

fn unary(op: UnaryOp, x: f32) -> f32 {
    match op {
        UnaryOp::Neg => -x,
        UnaryOp::Abs => x.abs(),
        UnaryOp::Exp => x.exp(),
        UnaryOp::Log => x.ln(),
        UnaryOp::Sqrt => x.sqrt(),
        UnaryOp::Round => x.round_ties_even(),
        UnaryOp::Relu => {
            if x < 0.0 {
                0.0
            } else {
                x
            }
        }
        UnaryOp::Relu6 => clip(x, 0.0, 6.0),
        UnaryOp::Sigmoid => sigmoid(x),
        UnaryOp::LogSigmoid => -softplus(-x),
        UnaryOp::Tanh => x.tanh(),
        UnaryOp::Tanhshrink => x - x.tanh(),
        UnaryOp::Softsign => x / (1.0 + x.abs()),
        UnaryOp::Silu => x * sigmoid(x),
        UnaryOp::Mish => x * softplus(x).tanh(),
        UnaryOp::Gelu { tanh: true } => {
            0.5 * x
                * (1.0 + ((2.0 / std::f32::consts::PI).sqrt() * (x + 0.044715 * x * x * x)).tanh())
        }
        UnaryOp::Gelu { tanh: false } => {
            (0.5 * x as f64 * (1.0 + erf(x as f64 / std::f64::consts::SQRT_2))) as f32
        }
        UnaryOp::Selu => {
            if x > 0.0 {
                SELU_SCALE * x
            } else {
                SELU_SCALE * SELU_ALPHA * x.exp_m1()
            }
        }
        UnaryOp::Hardsigmoid => clip(x / 6.0 + 0.5, 0.0, 1.0),
        UnaryOp::Hardswish => x * clip(x + 3.0, 0.0, 6.0) / 6.0,
        UnaryOp::BesselI0 => bessel_i0(x),
        UnaryOp::Elu { alpha } => {
            if x > 0.0 {
                x
            } else {
                alpha.get() * x.exp_m1()
            }
        }
        UnaryOp::Celu { alpha } => {
            let alpha = alpha.get();
            if x > 0.0 {
                x
            } else {
                alpha * (x / alpha).exp_m1()
            }
        }
        UnaryOp::LeakyRelu { slope } => {
            if x >= 0.0 {
                x
            } else {
                slope.get() * x
            }
        }
        UnaryOp::Hardtanh { min, max } => clip(x, min.get(), max.get()),
        UnaryOp::Hardshrink { lambd } => {
            if x.abs() > lambd.get() {
                x
            } else {
                0.0
            }
        }
        UnaryOp::Softshrink { lambd } => {
            let l = lambd.get();
            if x > l {
                x - l
            } else if x < -l {
                x + l
            } else {
                0.0
            }
        }
        UnaryOp::Softplus { beta, threshold } => {
            let beta = beta.get();
            if x * beta > threshold.get() {
                x
            } else {
                softplus(x * beta) / beta
            }
        }
        UnaryOp::Threshold { threshold, value } => {
            if x > threshold.get() {
                x
            } else {
                value.get()
            }
        }
        UnaryOp::Clip { min, max } => clip(x, min.get(), max.get()),
        UnaryOp::Pow { exponent } => x.powf(exponent.get()),
    }
}

/// Clamp that lets NaN through and never panics on inverted bounds.
fn clip(x: f32, min: f32, max: f32) -> f32 {
    if x < min {
        min
    } else if x > max {
        max
    } else {
        x
    }
}

fn median(slice: &[f32]) -> f32 {
    if slice.is_empty() || slice.iter().any(|x| x.is_nan()) {
        return f32::NAN;
    }
    let mut sorted = slice.to_vec();
    sorted.sort_by(f32::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}

fn reduce(
    inputs: &[NodeInput<'_>],
    axis: Option<i32>,
    reducer: impl Fn(&[f32]) -> f32,
) -> Result<Vec<f32>> {
    let a = require_input(inputs, 0)?;
    match axis {
        None => Ok(vec![reducer(a.data)]),
        Some(axis) => reduce_along_axis(a, axis, reducer),
    }
}

fn reduce_along_axis(
    a: &NodeInput<'_>,
    axis: i32,
    reducer: impl Fn(&[f32]) -> f32,
) -> Result<Vec<f32>> {
    let ax = resolve_axis(a.shape, axis)?;
    let (outer, dim, inner) = split_at_axis(&a.shape.dims(), ax);

    let mut result = Vec::with_capacity(outer * inner);
    let mut slice = Vec::with_capacity(dim);
    for o in 0..outer {
        for i in 0..inner {
            slice.clear();
            for d in 0..dim {
                slice.push(a.data[o * dim * inner + d * inner + i]);
            }
            result.push(reducer(&slice));
        }
    }
    Ok(result)
}

fn transpose(inputs: &[NodeInput<'_>], axes: Option<&[usize]>) -> Result<Vec<f32>> {
    let a = require_input(inputs, 0)?;
    let ndim = a.shape.ndim();

    let perm: Vec<usize> = match axes {
        Some(ax) => ax.to_vec(),
        None => (0..ndim).rev().collect(),
    };

    if perm.len() != ndim || perm.iter().any(|&p| p >= ndim) {
        return Err(ShimError::InvalidArgument(
            "transpose axes must be a permutation of the input axes".into(),
        ));
    }

    let old_shape = a.shape.dims();
    let new_shape: Vec<usize> = perm.iter().map(|&ax| old_shape[ax]).collect();
    let old_strides = a.shape.strides();

    let mut coords = vec![0usize; ndim];
    let mut result = vec![0.0f32; a.data.len()];
    for (flat, out) in result.iter_mut().enumerate() {
        unravel_into(flat, &new_shape, &mut coords);
        // Coordinate `dim_idx` of the new tensor walks axis `perm[dim_idx]` of the old one.
        let old_flat: usize = coords
            .iter()
            .zip(perm.iter())
            .map(|(&c, &p)| c * old_strides[p])
            .sum();
        *out = a.data[old_flat];
    }

    Ok(result)
}

fn broadcast(inputs: &[NodeInput<'_>], target_shape: &Shape) -> Result<Vec<f32>> {
    let a = require_input(inputs, 0)?;
    let in_shape = &a.shape.0;
    let out_shape = &target_shape.0;
    let out_ndim = out_shape.len();
    let in_ndim = in_shape.len();
    if in_ndim > out_ndim {
        return Err(ShimError::InvalidArgument(format!(
            "cannot broadcast shape {} to {}",
            a.shape, target_shape
        )));
    }
    let pad = out_ndim - in_ndim;
    let total: usize = target_shape.numel().max(0) as usize;

    let mut result = vec![0.0f32; total];
    for (out_flat, out) in result.iter_mut().enumerate() {
        let mut remaining = out_flat;
        let mut in_flat = 0usize;
        let mut in_stride = 1usize;

        for d in (0..out_ndim).rev() {
            let out_dim = out_shape[d] as usize;
            let coord = remaining % out_dim;
            remaining /= out_dim;

            if d >= pad {
                let in_d = d - pad;
                let in_dim = in_shape[in_d] as usize;
                let in_coord = if in_dim == 1 { 0 } else { coord };
                in_flat += in_coord * in_stride;
                in_stride *= in_dim;
            }
        }
        *out = a.data[in_flat];
    }
    Ok(result)
}

fn flip(inputs: &[NodeInput<'_>], axes: &[usize]) -> Result<Vec<f32>> {
    let a = require_input(inputs, 0)?;
    let dims = a.shape.dims();
    if let Some(&bad) = axes.iter().find(|&&ax| ax >= dims.len()) {
        return Err(ShimError::InvalidAxis {
            axis: bad as i64,
            ndim: dims.len(),
        });
    }
    let strides = a.shape.strides();
    let mut coords = vec![0usize; dims.len()];
    let mut result = vec![0.0f32; a.data.len()];
    for (flat, out) in result.iter_mut().enumerate() {
        unravel_into(flat, &dims, &mut coords);
        for &ax in axes {
            coords[ax] = dims[ax] - 1 - coords[ax];
        }
        let src: usize = coords.iter().zip(strides.iter()).map(|(c, s)| c * s).sum();
        *out = a.data[src];
    }
    Ok(result)
}

fn concatenate(inputs: &[NodeInput<'_>], axis: usize) -> Result<Vec<f32>> {
    let first = require_input(inputs, 0)?;
    let ndim = first.shape.ndim();
    if axis >= ndim {
        return Err(ShimError::InvalidAxis {
            axis: axis as i64,
            ndim,
        });
    }
    for inp in inputs {
        let compatible = inp.shape.ndim() == ndim
            && (0..ndim).all(|d| d == axis || inp.shape.0[d] == first.shape.0[d]);
        if !compatible {
            return Err(ShimError::ShapeMismatch {
                expected: first.shape.0.clone(),
                got: inp.shape.0.clone(),
            });
        }
    }

    let (outer, _, inner) = split_at_axis(&first.shape.dims(), axis);
    let total: usize = inputs.iter().map(|i| i.data.len()).sum();
    let mut result = Vec::with_capacity(total);
    for o in 0..outer {
        for inp in inputs {
            let chunk = inp.shape.0[axis] as usize * inner;
            result.extend_from_slice(&inp.data[o * chunk..(o + 1) * chunk]);
        }
    }
    Ok(result)
}

fn slice(inputs: &[NodeInput<'_>], axis: usize, start: usize, end: usize) -> Result<Vec<f32>> {
    let a = require_input(inputs, 0)?;
    let dims = a.shape.dims();
    if axis >= dims.len() {
        return Err(ShimError::InvalidAxis {
            axis: axis as i64,
            ndim: dims.len(),
        });
    }
    if start > end || end > dims[axis] {
        return Err(ShimError::InvalidArgument(format!(
            "slice [{start}, {end}) out of bounds for axis {axis} of shape {}",
            a.shape
        )));
    }
    let (outer, dim, inner) = split_at_axis(&dims, axis);
    let mut result = Vec::with_capacity(outer * (end - start) * inner);
    for o in 0..outer {
        let base = o * dim * inner;
        result.extend_from_slice(&a.data[base + start * inner..base + end * inner]);
    }
    Ok(result)
}

/// Convert a stored index value to a position along an axis of `extent`.
///
/// Negative values count from the end, numpy-style.
fn resolve_index(value: f32, extent: usize) -> Result<usize> {
    let idx = value as i64;
    let resolved = if idx < 0 { idx + extent as i64 } else { idx };
    if resolved < 0 || resolved >= extent as i64 {
        return Err(ShimError::InvalidArgument(format!(
            "index {idx} out of bounds for axis with size {extent}"
        )));
    }
    Ok(resolved as usize)
}

fn take(inputs: &[NodeInput<'_>], axis: usize) -> Result<Vec<f32>> {
    let a = require_input(inputs, 0)?;
    let idx = require_input(inputs, 1)?;
    let dims = a.shape.dims();
    if axis >= dims.len() {
        return Err(ShimError::InvalidAxis {
            axis: axis as i64,
            ndim: dims.len(),
        });
    }
    let (outer, dim, inner) = split_at_axis(&dims, axis);
    let positions = idx
        .data
        .iter()
        .map(|&v| resolve_index(v, dim))
        .collect::<Result<Vec<_>>>()?;

    let mut result = Vec::with_capacity(outer * positions.len() * inner);
    for o in 0..outer {
        for &p in &positions {
            let base = (o * dim + p) * inner;
            result.extend_from_slice(&a.data[base..base + inner]);
        }
    }
    Ok(result)
}

fn take_along_axis(
    inputs: &[NodeInput<'_>],
    axis: usize,
    output_meta: &TensorMeta,
) -> Result<Vec<f32>> {
    let a = require_input(inputs, 0)?;
    let idx = require_input(inputs, 1)?;
    let ndim = a.shape.ndim();
    if idx.shape.ndim() != ndim {
        return Err(ShimError::RankMismatch {
            op: "take_along_axis",
            expected: ndim.to_string(),
            got: idx.shape.ndim(),
        });
    }
    if axis >= ndim {
        return Err(ShimError::InvalidAxis {
            axis: axis as i64,
            ndim,
        });
    }

    let a_dims = a.shape.dims();
    let i_dims = idx.shape.dims();
    let out_dims = output_meta.shape.dims();
    let a_strides = a.shape.strides();
    let i_strides = idx.shape.strides();
    let extent = a_dims[axis];

    let total: usize = out_dims.iter().product();
    let mut coords = vec![0usize; ndim];
    let mut result = Vec::with_capacity(total);
    for flat in 0..total {
        unravel_into(flat, &out_dims, &mut coords);
        let mut i_flat = 0;
        let mut a_flat = 0;
        for d in 0..ndim {
            // Size-1 dims broadcast against the other operand.
            let ic = if i_dims[d] == 1 { 0 } else { coords[d] };
            i_flat += ic * i_strides[d];
            if d != axis {
                let ac = if a_dims[d] == 1 { 0 } else { coords[d] };
                a_flat += ac * a_strides[d];
            }
        }
        let pos = resolve_index(idx.data[i_flat], extent)?;
        a_flat += pos * a_strides[axis];
        result.push(a.data[a_flat]);
    }
    Ok(result)
}

/// NaN sorts after every number, matching numpy.
fn cmp_nan_last(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

fn argsort(inputs: &[NodeInput<'_>], axis: usize) -> Result<Vec<f32>> {
    let a = require_input(inputs, 0)?;
    let dims = a.shape.dims();
    if axis >= dims.len() {
        return Err(ShimError::InvalidAxis {
            axis: axis as i64,
            ndim: dims.len(),
        });
    }
    let (outer, dim, inner) = split_at_axis(&dims, axis);
    let mut result = vec![0.0f32; a.data.len()];
    let mut order: Vec<usize> = Vec::with_capacity(dim);
    for o in 0..outer {
        for i in 0..inner {
            let at = |d: usize| o * dim * inner + d * inner + i;
            order.clear();
            order.extend(0..dim);
            // `sort_by` is stable: ties keep their original order.
            order.sort_by(|&x, &y| cmp_nan_last(a.data[at(x)], a.data[at(y)]));
            for (d, &src) in order.iter().enumerate() {
                result[at(d)] = src as f32;
            }
        }
    }
    Ok(result)
}

/// Map an out-of-range coordinate back into `[0, extent)` for the native
/// pad modes. Widths are validated first, so one reflection suffices.
fn native_source(pos: i64, extent: i64, mode: NativePadMode) -> Option<usize> {
    if (0..extent).contains(&pos) {
        return Some(pos as usize);
    }
    let src = match mode {
        NativePadMode::Constant => return None,
        NativePadMode::Reflect if pos < 0 => -pos,
        NativePadMode::Reflect => 2 * (extent - 1) - pos,
        NativePadMode::Symmetric if pos < 0 => -pos - 1,
        NativePadMode::Symmetric => 2 * extent - 1 - pos,
    };
    Some(src as usize)
}

fn pad(
    inputs: &[NodeInput<'_>],
    widths: &[(usize, usize)],
    mode: NativePadMode,
    value: f32,
) -> Result<Vec<f32>> {
    let a = require_input(inputs, 0)?;
    let dims = a.shape.dims();
    if widths.len() != dims.len() {
        return Err(ShimError::RankMismatch {
            op: "pad",
            expected: dims.len().to_string(),
            got: widths.len(),
        });
    }
    for (axis, (&(before, after), &extent)) in widths.iter().zip(dims.iter()).enumerate() {
        let limit = match mode {
            NativePadMode::Constant => continue,
            NativePadMode::Reflect => extent.saturating_sub(1),
            NativePadMode::Symmetric => extent,
        };
        if before > limit || after > limit {
            return Err(ShimError::InvalidArgument(format!(
                "{mode:?} padding ({before}, {after}) exceeds limit {limit} on axis {axis}"
            )));
        }
    }

    let out_dims: Vec<usize> = dims
        .iter()
        .zip(widths.iter())
        .map(|(&d, &(b, e))| d + b + e)
        .collect();
    let strides = a.shape.strides();
    let total: usize = out_dims.iter().product();
    let mut coords = vec![0usize; dims.len()];
    let mut result = Vec::with_capacity(total);
    'outer: for flat in 0..total {
        unravel_into(flat, &out_dims, &mut coords);
        let mut src = 0usize;
        for d in 0..dims.len() {
            let pos = coords[d] as i64 - widths[d].0 as i64;
            match native_source(pos, dims[d] as i64, mode) {
                Some(s) => src += s * strides[d],
                None => {
                    result.push(value);
                    continue 'outer;
                }
            }
        }
        result.push(a.data[src]);
    }
    Ok(result)
}

fn softmax(inputs: &[NodeInput<'_>], axis: i32, log: bool) -> Result<Vec<f32>> {
    let a = require_input(inputs, 0)?;
    let ax = resolve_axis(a.shape, axis)?;
    let (outer, dim, inner) = split_at_axis(&a.shape.dims(), ax);

    let mut data = a.data.to_vec();

    for o in 0..outer {
        for i in 0..inner {
            let at = |d: usize| o * dim * inner + d * inner + i;
            let mut max_val = f32::NEG_INFINITY;
            for d in 0..dim {
                if data[at(d)] > max_val {
                    max_val = data[at(d)];
                }
            }
            let mut sum_exp = 0.0f32;
            for d in 0..dim {
                sum_exp += (data[at(d)] - max_val).exp();
            }
            let log_sum = sum_exp.ln();
            for d in 0..dim {
                let shifted = data[at(d)] - max_val;
                data[at(d)] = if log {
                    shifted - log_sum
                } else {
                    shifted.exp() / sum_exp
                };
            }
        }
    }
    Ok(data)
}
