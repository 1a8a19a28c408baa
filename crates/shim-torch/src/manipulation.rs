//! NumPy/PyTorch array-manipulation functions.
//!
//! Each function validates its arguments and delegates to `Tensor` graph
//! ops. Nothing here evaluates; results are lazy like their inputs.

use std::str::FromStr;

use smallvec::SmallVec;

use shim_core::{DType, Result, Shape, ShimError, Tensor, UnaryOp};
use shim_ops::{broadcast_all, result_type, shape_inference};

fn resolve_axis(axis: i32, ndim: usize) -> Result<usize> {
    Ok(shape_inference::resolve_axis(axis, ndim)?)
}

fn require_rank(op: &'static str, t: &Tensor, min: usize) -> Result<()> {
    if t.ndim() < min {
        return Err(ShimError::RankMismatch {
            op,
            expected: format!(">= {min}"),
            got: t.ndim(),
        });
    }
    Ok(())
}

/// Move axes `source` to positions `destination`; the rest keep their order.
pub fn moveaxis(a: &Tensor, source: &[i32], destination: &[i32]) -> Result<Tensor> {
    let ndim = a.ndim();
    if source.len() != destination.len() {
        return Err(ShimError::InvalidArgument(format!(
            "moveaxis: source has {} axes but destination has {}",
            source.len(),
            destination.len()
        )));
    }
    let normalize = |axes: &[i32]| -> Result<SmallVec<[usize; 4]>> {
        let mut out = SmallVec::<[usize; 4]>::new();
        for &ax in axes {
            let r = resolve_axis(ax, ndim)?;
            if out.contains(&r) {
                return Err(ShimError::InvalidArgument(format!(
                    "moveaxis: repeated axis {ax}"
                )));
            }
            out.push(r);
        }
        Ok(out)
    };
    let source = normalize(source)?;
    let destination = normalize(destination)?;

    let mut order: Vec<usize> = (0..ndim).filter(|d| !source.contains(d)).collect();
    let mut moves: SmallVec<[(usize, usize); 4]> =
        destination.iter().copied().zip(source.iter().copied()).collect();
    moves.sort_unstable();
    for (dest, src) in moves {
        order.insert(dest, src);
    }
    a.transpose(Some(&order))
}

/// Step function of `x1`, taking `x2` where `x1` is zero.
pub fn heaviside(x1: &Tensor, x2: &Tensor) -> Result<Tensor> {
    x1.heaviside(x2)
}

/// Reverse the first axis.
pub fn flipud(m: &Tensor) -> Result<Tensor> {
    require_rank("flipud", m, 1)?;
    m.flip(&[0])
}

/// Reverse the second axis.
pub fn fliplr(m: &Tensor) -> Result<Tensor> {
    require_rank("fliplr", m, 2)?;
    m.flip(&[1])
}

/// Rotate by 90 degrees `k` times in the plane of `axes`, from the first
/// axis towards the second.
pub fn rot90(m: &Tensor, k: i64, axes: (i32, i32)) -> Result<Tensor> {
    let ndim = m.ndim();
    require_rank("rot90", m, 2)?;
    let a0 = resolve_axis(axes.0, ndim)?;
    let a1 = resolve_axis(axes.1, ndim)?;
    if a0 == a1 {
        return Err(ShimError::InvalidArgument(format!(
            "rot90: axes must be different, got {axes:?}"
        )));
    }

    match k.rem_euclid(4) {
        0 => Ok(m.clone()),
        2 => m.flip(&[a0 as i32, a1 as i32]),
        turns => {
            let mut perm: Vec<usize> = (0..ndim).collect();
            perm.swap(a0, a1);
            if turns == 1 {
                m.flip(&[a1 as i32])?.transpose(Some(&perm))
            } else {
                m.transpose(Some(&perm))?.flip(&[a1 as i32])
            }
        }
    }
}

fn at_least(t: &Tensor, min_rank: usize) -> Result<Tensor> {
    let dims = &t.shape().0;
    let reshaped = match (min_rank, dims.len()) {
        (_, r) if r >= min_rank => return Ok(t.clone()),
        (1, 0) => vec![1],
        (2, 0) => vec![1, 1],
        (2, 1) => vec![1, dims[0]],
        (3, 0) => vec![1, 1, 1],
        (3, 1) => vec![1, dims[0], 1],
        (3, 2) => vec![dims[0], dims[1], 1],
        _ => {
            return Err(ShimError::Unsupported(format!(
                "atleast_{min_rank}d is not defined"
            )));
        }
    };
    t.reshape(&Shape::new(reshaped))
}

/// View each input with at least one dimension.
pub fn atleast_1d(tensors: &[Tensor]) -> Result<Vec<Tensor>> {
    tensors.iter().map(|t| at_least(t, 1)).collect()
}

/// View each input with at least two dimensions; `(N,)` becomes `(1, N)`.
pub fn atleast_2d(tensors: &[Tensor]) -> Result<Vec<Tensor>> {
    tensors.iter().map(|t| at_least(t, 2)).collect()
}

/// View each input with at least three dimensions.
///
/// `(N,)` becomes `(1, N, 1)` and `(M, N)` becomes `(M, N, 1)`.
pub fn atleast_3d(tensors: &[Tensor]) -> Result<Vec<Tensor>> {
    tensors.iter().map(|t| at_least(t, 3)).collect()
}

/// Cast to the common dtype and concatenate.
fn stack_along(tensors: Vec<Tensor>, axis: i32) -> Result<Tensor> {
    let dtypes: Vec<DType> = tensors.iter().map(|t| t.dtype()).collect();
    let dtype = result_type(&dtypes)
        .ok_or_else(|| ShimError::InvalidArgument("need at least one array to stack".into()))?;
    let cast: Vec<Tensor> = tensors.iter().map(|t| t.astype(dtype)).collect();
    Tensor::concat(&cast, axis)
}

/// Stack row-wise (along the first axis) after promoting to 2-D.
pub fn vstack(tensors: &[Tensor]) -> Result<Tensor> {
    stack_along(atleast_2d(tensors)?, 0)
}

/// Stack column-wise; 1-D inputs are joined end to end.
pub fn hstack(tensors: &[Tensor]) -> Result<Tensor> {
    let arrs = atleast_1d(tensors)?;
    let axis = match arrs.first() {
        Some(t) if t.ndim() == 1 => 0,
        _ => 1,
    };
    stack_along(arrs, axis)
}

/// Stack depth-wise (along the third axis) after promoting to 3-D.
pub fn dstack(tensors: &[Tensor]) -> Result<Tensor> {
    stack_along(atleast_3d(tensors)?, 2)
}

/// Result of [`top_k`].
#[derive(Clone, Debug)]
pub struct TopK {
    pub values: Tensor,
    /// Positions along the reduced axis, as `I64`.
    pub indices: Tensor,
}

/// The `k` largest (or smallest) entries along `axis`, sorted.
///
/// Ties keep their original order.
pub fn top_k(x: &Tensor, k: usize, axis: i32, largest: bool) -> Result<TopK> {
    let ax = resolve_axis(axis, x.ndim())?;
    let extent = x.shape().0[ax] as usize;
    if k > extent {
        return Err(ShimError::InvalidArgument(format!(
            "top_k: k = {k} exceeds axis extent {extent}"
        )));
    }
    let keys = if largest { x.neg() } else { x.clone() };
    let indices = keys.argsort(ax as i32)?.slice_axis(ax as i32, 0, k)?;
    let values = x.take_along_axis(&indices, ax as i32)?;
    Ok(TopK { values, indices })
}

/// Modified Bessel function of the first kind, order 0.
pub fn i0(x: &Tensor) -> Tensor {
    x.unary(UnaryOp::BesselI0)
}

/// How an array is divided by the split functions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndicesOrSections {
    /// This many equal parts; the extent must divide evenly.
    Sections(usize),
    /// Split before each listed position. Negative positions count from the end.
    Indices(Vec<i64>),
}

impl From<usize> for IndicesOrSections {
    fn from(n: usize) -> Self {
        IndicesOrSections::Sections(n)
    }
}

impl From<Vec<i64>> for IndicesOrSections {
    fn from(v: Vec<i64>) -> Self {
        IndicesOrSections::Indices(v)
    }
}

fn split_along(ary: &Tensor, how: &IndicesOrSections, axis: usize) -> Result<Vec<Tensor>> {
    let extent = ary.shape().0[axis];
    let bounds: Vec<(usize, usize)> = match how {
        IndicesOrSections::Sections(0) => {
            return Err(ShimError::InvalidArgument(
                "number of sections must be larger than 0".into(),
            ));
        }
        IndicesOrSections::Sections(n) => {
            let n = *n as i64;
            if extent % n != 0 {
                return Err(ShimError::InvalidArgument(format!(
                    "array split does not result in an equal division: {extent} into {n}"
                )));
            }
            let step = extent / n;
            (0..n)
                .map(|i| ((i * step) as usize, ((i + 1) * step) as usize))
                .collect()
        }
        IndicesOrSections::Indices(points) => {
            let clamp = |p: i64| -> usize {
                let p = if p < 0 { p + extent } else { p };
                p.clamp(0, extent) as usize
            };
            let mut edges = Vec::with_capacity(points.len() + 2);
            edges.push(0usize);
            edges.extend(points.iter().map(|&p| clamp(p)));
            edges.push(extent as usize);
            edges
                .windows(2)
                .map(|w| (w[0], w[1].max(w[0])))
                .collect()
        }
    };
    bounds
        .into_iter()
        .map(|(start, end)| ary.slice_axis(axis as i32, start, end))
        .collect()
}

/// Split along the first axis. Needs rank >= 2.
pub fn vsplit(ary: &Tensor, how: &IndicesOrSections) -> Result<Vec<Tensor>> {
    require_rank("vsplit", ary, 2)?;
    split_along(ary, how, 0)
}

/// Split along the second axis, or the first for 1-D input.
pub fn hsplit(ary: &Tensor, how: &IndicesOrSections) -> Result<Vec<Tensor>> {
    require_rank("hsplit", ary, 1)?;
    let axis = if ary.ndim() > 1 { 1 } else { 0 };
    split_along(ary, how, axis)
}

/// Split along the third axis. Needs rank >= 3.
pub fn dsplit(ary: &Tensor, how: &IndicesOrSections) -> Result<Vec<Tensor>> {
    require_rank("dsplit", ary, 3)?;
    split_along(ary, how, 2)
}

/// Policy for gather indices outside `[0, extent)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TakeMode {
    /// Clamp into range.
    Clip,
    /// Produce the dtype's sentinel value.
    Fill,
    /// Same as `Fill`.
    Drop,
}

impl FromStr for TakeMode {
    type Err = ShimError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "clip" => Ok(TakeMode::Clip),
            "fill" => Ok(TakeMode::Fill),
            "drop" => Ok(TakeMode::Drop),
            other => Err(ShimError::InvalidMode {
                op: "take_along_axis",
                mode: other.to_string(),
                valid: "clip, fill, drop",
            }),
        }
    }
}

/// Gather along `axis` with an index array of the same rank.
///
/// Out-of-range indices never fault: `clip` clamps them, `fill`/`drop`
/// yield NaN for floats, the maximum for unsigned and the minimum for signed
/// integer dtypes. Negative indices are out of range under `fill`/`drop`.
/// `indices` must have an integer dtype.
pub fn take_along_axis(arr: &Tensor, indices: &Tensor, axis: i32, mode: &str) -> Result<Tensor> {
    if !indices.dtype().is_integer() {
        return Err(ShimError::InvalidArgument(format!(
            "take_along_axis: indices must be integers, got {}",
            indices.dtype()
        )));
    }
    if arr.ndim() != indices.ndim() {
        return Err(ShimError::RankMismatch {
            op: "take_along_axis",
            expected: arr.ndim().to_string(),
            got: indices.ndim(),
        });
    }
    let mode: TakeMode = mode.parse()?;
    let ax = resolve_axis(axis, arr.ndim())?;
    let extent = arr.shape().0[ax];
    tracing::debug!(?mode, axis = ax, extent, dtype = %arr.dtype(), "take_along_axis");

    match mode {
        TakeMode::Clip => {
            let clipped = indices.clip(0.0, (extent - 1).max(0) as f32);
            arr.take_along_axis(&clipped, ax as i32)
        }
        TakeMode::Fill | TakeMode::Drop => {
            let sentinel = arr.dtype().fill_sentinel().ok_or_else(|| {
                ShimError::InvalidArgument(format!(
                    "take_along_axis: no fill value for dtype {}",
                    arr.dtype()
                ))
            })?;
            let slab = arr.full_like(&arr.shape().with_dim(ax, 1), sentinel, arr.dtype())?;
            let extended = Tensor::concat(&[arr.clone(), slab], ax as i32)?;
            let masked = indices.mask_out_of_range(extent);
            extended.take_along_axis(&masked, ax as i32)
        }
    }
}

/// Broadcast any number of shapes together, left to right.
pub fn broadcast_shapes(shapes: &[&[i64]]) -> Result<Vec<i64>> {
    let shapes: Vec<Shape> = shapes.iter().map(|s| Shape::from(*s)).collect();
    Ok(broadcast_all(&shapes)?.0)
}

/// Broadcast to `shape`; negative entries keep the input's size there.
///
/// Entries align from the right; new leading dimensions must be explicit.
pub fn expand(x: &Tensor, shape: &[i64]) -> Result<Tensor> {
    let offset = shape.len().checked_sub(x.ndim()).ok_or_else(|| {
        ShimError::InvalidArgument(format!(
            "expand: target rank {} is below input rank {}",
            shape.len(),
            x.ndim()
        ))
    })?;
    let mut target = shape.to_vec();
    for (i, d) in target.iter_mut().enumerate() {
        if *d < 0 {
            *d = match i.checked_sub(offset) {
                Some(src) => x.shape().0[src],
                None => {
                    return Err(ShimError::InvalidArgument(format!(
                        "expand: size {d} not allowed for new leading dimension {i}"
                    )));
                }
            };
        }
    }
    x.broadcast_to(&Shape::new(target))
}
