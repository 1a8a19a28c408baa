//! Composite padding for requests the native `Pad` kernel cannot serve.
//!
//! Axes are padded one after another, so corner regions see the values the
//! earlier axes already wrote (numpy's order).

use shim_core::{DType, Result, Shape, ShimError, Tensor, UnaryOp};
use shim_ops::{PadMode, PadOptions, ReflectType};

/// Pad `x` by `widths` (one pair per axis) following `options.mode`.
pub fn pad_fallback(x: &Tensor, widths: &[(usize, usize)], options: &PadOptions) -> Result<Tensor> {
    let ndim = x.ndim();
    if widths.len() != ndim {
        return Err(ShimError::RankMismatch {
            op: "pad",
            expected: ndim.to_string(),
            got: widths.len(),
        });
    }
    let constants = match options.mode {
        PadMode::Constant => options.constant_values.per_axis(ndim)?,
        PadMode::LinearRamp => options.end_values.per_axis(ndim)?,
        _ => vec![(0.0, 0.0); ndim],
    };
    let stat_lengths = match &options.stat_length {
        Some(w) => Some(w.resolve(ndim)?),
        None => None,
    };

    let mut out = x.clone();
    for (axis, &(before, after)) in widths.iter().enumerate() {
        if before == 0 && after == 0 {
            continue;
        }
        let extent = out.shape().0[axis] as usize;
        let needs_data = !matches!(options.mode, PadMode::Constant | PadMode::Empty);
        if needs_data && extent == 0 {
            return Err(ShimError::InvalidArgument(format!(
                "can't extend empty axis {axis} using mode '{}'",
                options.mode
            )));
        }
        out = match options.mode {
            PadMode::Constant => pad_constant(&out, axis, (before, after), constants[axis])?,
            PadMode::Empty => pad_constant(&out, axis, (before, after), (0.0, 0.0))?,
            PadMode::Edge | PadMode::Wrap => {
                let map = index_map(options.mode, extent, before, after);
                take_map(&out, axis, map)?
            }
            PadMode::Reflect | PadMode::Symmetric => match options.reflect_type {
                _ if extent == 1 => take_map(&out, axis, index_map(PadMode::Edge, 1, before, after))?,
                ReflectType::Even => {
                    let map = index_map(options.mode, extent, before, after);
                    take_map(&out, axis, map)?
                }
                ReflectType::Odd => pad_odd(&out, axis, options.mode, extent, (before, after))?,
            },
            PadMode::Maximum | PadMode::Minimum | PadMode::Mean | PadMode::Median => {
                let lengths = stat_lengths
                    .as_ref()
                    .map_or((extent, extent), |l| l[axis]);
                pad_stat(&out, axis, options.mode, extent, (before, after), lengths)?
            }
            PadMode::LinearRamp => {
                pad_linear_ramp(&out, axis, extent, (before, after), constants[axis])?
            }
        };
    }
    Ok(out)
}

/// Source position along an axis of `extent` for every padded position.
fn index_map(mode: PadMode, extent: usize, before: usize, after: usize) -> Vec<f32> {
    let n = extent as i64;
    (-(before as i64)..n + after as i64)
        .map(|p| {
            let src = match mode {
                PadMode::Wrap => p.rem_euclid(n),
                PadMode::Reflect => {
                    let period = 2 * (n - 1);
                    let m = p.rem_euclid(period);
                    if m >= n { period - m } else { m }
                }
                PadMode::Symmetric => {
                    let period = 2 * n;
                    let m = p.rem_euclid(period);
                    if m >= n { period - 1 - m } else { m }
                }
                _ => p.clamp(0, n - 1),
            };
            src as f32
        })
        .collect()
}

fn take_map(x: &Tensor, axis: usize, map: Vec<f32>) -> Result<Tensor> {
    let len = map.len() as i64;
    let indices = x.constant_like(map, &Shape::new(vec![len]), DType::I64)?;
    x.take(&indices, axis as i32)
}

fn with_extent(x: &Tensor, axis: usize, extent: usize) -> Shape {
    x.shape().with_dim(axis, extent as i64)
}

fn pad_constant(x: &Tensor, axis: usize, (before, after): (usize, usize), (vb, va): (f32, f32)) -> Result<Tensor> {
    let mut parts = Vec::with_capacity(3);
    if before > 0 {
        parts.push(x.full_like(&with_extent(x, axis, before), vb, x.dtype())?);
    }
    parts.push(x.clone());
    if after > 0 {
        parts.push(x.full_like(&with_extent(x, axis, after), va, x.dtype())?);
    }
    Tensor::concat(&parts, axis as i32)
}

/// Bring composed integer values back into `x`'s dtype, wrapping like
/// fixed-width integer arithmetic.
fn wrap_into(x: &Tensor, values: Tensor) -> Tensor {
    if x.dtype().is_integer() {
        values.wrapping_astype(x.dtype())
    } else {
        values
    }
}

/// Odd reflection: `2 * edge - mirrored`, limited to one period per side.
fn pad_odd(
    x: &Tensor,
    axis: usize,
    mode: PadMode,
    extent: usize,
    (before, after): (usize, usize),
) -> Result<Tensor> {
    // Reflect skips the edge element, symmetric repeats it.
    let skip = usize::from(mode == PadMode::Reflect);
    let limit = extent - skip;
    if before > limit || after > limit {
        return Err(ShimError::InvalidArgument(format!(
            "odd {mode} padding ({before}, {after}) exceeds {limit} on axis {axis}"
        )));
    }
    let ax = axis as i32;
    let mut parts = Vec::with_capacity(3);
    if before > 0 {
        let edge = x.slice_axis(ax, 0, 1)?;
        let map: Vec<f32> = (0..before).rev().map(|j| (j + skip) as f32).collect();
        let mirrored = take_map(x, axis, map)?;
        parts.push(wrap_into(x, edge.add(&edge)?.sub(&mirrored)?));
    }
    parts.push(x.clone());
    if after > 0 {
        let edge = x.slice_axis(ax, extent - 1, extent)?;
        let map: Vec<f32> = (0..after).map(|j| (extent - 1 - skip - j) as f32).collect();
        let mirrored = take_map(x, axis, map)?;
        parts.push(wrap_into(x, edge.add(&edge)?.sub(&mirrored)?));
    }
    Tensor::concat(&parts, ax)
}

fn reduce_keepdim(chunk: &Tensor, axis: usize, mode: PadMode) -> Result<Tensor> {
    let ax = axis as i32;
    let reduced = match mode {
        PadMode::Maximum => chunk.max_axis(ax)?,
        PadMode::Minimum => chunk.min_axis(ax)?,
        PadMode::Mean => chunk.mean_axis(ax)?,
        _ => chunk.median_axis(ax)?,
    };
    let reduced = if chunk.dtype().is_integer() && matches!(mode, PadMode::Mean | PadMode::Median) {
        reduced.unary(UnaryOp::Round)
    } else {
        reduced
    };
    reduced.reshape(&with_extent(chunk, axis, 1))
}

fn pad_stat(
    x: &Tensor,
    axis: usize,
    mode: PadMode,
    extent: usize,
    (before, after): (usize, usize),
    (len_before, len_after): (usize, usize),
) -> Result<Tensor> {
    if len_before == 0 || len_after == 0 {
        return Err(ShimError::InvalidArgument(format!(
            "stat_length of 0 yields no value for '{mode}' padding on axis {axis}"
        )));
    }
    let ax = axis as i32;
    let mut parts = Vec::with_capacity(3);
    if before > 0 {
        let chunk = x.slice_axis(ax, 0, len_before.min(extent))?;
        let stat = reduce_keepdim(&chunk, axis, mode)?;
        parts.push(stat.broadcast_to(&with_extent(x, axis, before))?);
    }
    parts.push(x.clone());
    if after > 0 {
        let chunk = x.slice_axis(ax, extent - len_after.min(extent), extent)?;
        let stat = reduce_keepdim(&chunk, axis, mode)?;
        parts.push(stat.broadcast_to(&with_extent(x, axis, after))?);
    }
    Tensor::concat(&parts, ax)
}

/// Ramp of `width` fractions `j / width` laid out along `axis`.
fn ramp(x: &Tensor, axis: usize, width: usize, reversed: bool) -> Result<Tensor> {
    let mut dims = vec![1i64; x.ndim()];
    dims[axis] = width as i64;
    let steps: Vec<f32> = (0..width)
        .map(|j| {
            let k = if reversed { width - 1 - j } else { j };
            k as f32 / width as f32
        })
        .collect();
    x.constant_like(steps, &Shape::new(dims), DType::F32)
}

fn pad_linear_ramp(
    x: &Tensor,
    axis: usize,
    extent: usize,
    (before, after): (usize, usize),
    (end_before, end_after): (f32, f32),
) -> Result<Tensor> {
    let ax = axis as i32;
    // `full_like` already converts the end value into the dtype's range, so
    // rounded integer ramps stay in range.
    let side = |edge: Tensor, end: f32, width: usize, reversed: bool| -> Result<Tensor> {
        let end = x.full_like(&Shape::scalar(), end, x.dtype())?;
        let r = ramp(x, axis, width, reversed)?;
        let values = edge.sub(&end)?.mul(&r)?.add(&end)?;
        Ok(if x.dtype().is_integer() {
            values.unary(UnaryOp::Round)
        } else {
            values
        })
    };
    let mut parts = Vec::with_capacity(3);
    if before > 0 {
        parts.push(side(x.slice_axis(ax, 0, 1)?, end_before, before, false)?);
    }
    parts.push(x.clone());
    if after > 0 {
        parts.push(side(x.slice_axis(ax, extent - 1, extent)?, end_after, after, true)?);
    }
    Tensor::concat(&parts, ax)
}
