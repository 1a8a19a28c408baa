//! `Tensor`: shape, dtype and a node id on some [`Stream`].
//!
//! Every method below validates its arguments eagerly and appends one node.
//! Nothing runs until `eval()` or `to_vec_f32()`.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::backend::{Stream, default_stream};
use crate::graph::{NativePadMode, OpKind, Scalar, TensorMeta, UnaryOp};
use crate::{DType, NodeId, Result, Shape, ShimError};

/// Compute device.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Device {
    #[default]
    Cpu,
}

/// Cheap-to-clone handle on a graph node.
///
/// Operands of a binary op must share a stream.
#[derive(Clone)]
pub struct Tensor {
    node_id: NodeId,
    shape: Shape,
    dtype: DType,
    device: Device,
    stream: Arc<Stream>,
}

impl Tensor {
    // ── Constructors ────────────────────────────────────────────────────

    /// Create a tensor filled with zeros.
    pub fn zeros(shape: &Shape, dtype: DType, device: &Device) -> Result<Self> {
        Self::full(shape, 0.0, dtype, device)
    }

    /// Create a tensor filled with ones.
    pub fn ones(shape: &Shape, dtype: DType, device: &Device) -> Result<Self> {
        Self::full(shape, 1.0, dtype, device)
    }

    /// Create a tensor with every element set to `value`.
    pub fn full(shape: &Shape, value: f32, dtype: DType, device: &Device) -> Result<Self> {
        let n = shape.numel().max(0) as usize;
        Self::from_data(vec![value; n], shape, dtype, device)
    }

    /// Create an `f32` tensor from a slice.
    pub fn from_f32(data: &[f32], shape: &Shape, device: &Device) -> Result<Self> {
        Self::from_data(data.to_vec(), shape, DType::F32, device)
    }

    /// Create a tensor on the default stream.
    ///
    /// Values are stored as given; the dtype is a tag.
    pub fn from_data(data: Vec<f32>, shape: &Shape, dtype: DType, device: &Device) -> Result<Self> {
        let mut t = Self::from_data_on(&default_stream(), data, shape, dtype)?;
        t.device = device.clone();
        Ok(t)
    }

    /// Create a tensor on an explicit stream.
    pub fn from_data_on(
        stream: &Arc<Stream>,
        data: Vec<f32>,
        shape: &Shape,
        dtype: DType,
    ) -> Result<Self> {
        let expected = shape.numel().max(0) as usize;
        if data.len() != expected || shape.0.iter().any(|&d| d < 0) {
            return Err(ShimError::InvalidArgument(format!(
                "data length {} does not match shape {} (expected {})",
                data.len(),
                shape,
                expected,
            )));
        }
        let meta = TensorMeta::new(shape.clone(), dtype);
        let node_id = stream.add_constant(data, meta);
        Ok(Self {
            node_id,
            shape: shape.clone(),
            dtype,
            device: Device::Cpu,
            stream: Arc::clone(stream),
        })
    }

    /// Constant on this tensor's stream, for building index maps and fills.
    pub fn constant_like(&self, data: Vec<f32>, shape: &Shape, dtype: DType) -> Result<Self> {
        let mut t = Self::from_data_on(&self.stream, data, shape, dtype)?;
        t.device = self.device.clone();
        Ok(t)
    }

    /// Tensor of `shape` filled with `value`, converted to `dtype`, on this
    /// tensor's stream.
    pub fn full_like(&self, shape: &Shape, value: f32, dtype: DType) -> Result<Self> {
        let n = shape.numel().max(0) as usize;
        self.constant_like(vec![dtype.saturate(value); n], shape, dtype)
    }

    fn lazy_op(
        &self,
        op: OpKind,
        inputs: SmallVec<[NodeId; 2]>,
        shape: Shape,
        dtype: DType,
    ) -> Self {
        let meta = TensorMeta::new(shape.clone(), dtype);
        let node_id = self.stream.add_op(op, inputs, meta);
        Tensor {
            node_id,
            shape,
            dtype,
            device: self.device.clone(),
            stream: Arc::clone(&self.stream),
        }
    }

    fn same_stream(&self, other: &Tensor) -> Result<()> {
        if Arc::ptr_eq(&self.stream, &other.stream) {
            Ok(())
        } else {
            Err(ShimError::InvalidArgument(
                "tensors belong to different streams".into(),
            ))
        }
    }

    fn resolve_axis(&self, axis: i32) -> Result<usize> {
        self.shape.resolve_axis(axis).ok_or(ShimError::InvalidAxis {
            axis: axis as i64,
            ndim: self.shape.ndim(),
        })
    }

    // ── Elementwise ops ─────────────────────────────────────────────────

    /// Broadcast both operands to their common shape and apply `op`.
    fn binary(&self, op: OpKind, rhs: &Tensor) -> Result<Tensor> {
        self.same_stream(rhs)?;
        let shape = Shape::broadcast_shapes(&self.shape, &rhs.shape).ok_or_else(|| {
            ShimError::ShapeMismatch {
                expected: self.shape.0.clone(),
                got: rhs.shape.0.clone(),
            }
        })?;
        let lhs = self.broadcast_to(&shape)?;
        let rhs = rhs.broadcast_to(&shape)?;
        Ok(self.lazy_op(
            op,
            SmallVec::from_slice(&[lhs.node_id, rhs.node_id]),
            shape,
            self.dtype,
        ))
    }

    /// Element-wise addition.
    pub fn add(&self, rhs: &Tensor) -> Result<Tensor> {
        self.binary(OpKind::Add, rhs)
    }

    /// Element-wise subtraction.
    pub fn sub(&self, rhs: &Tensor) -> Result<Tensor> {
        self.binary(OpKind::Sub, rhs)
    }

    /// Element-wise multiplication.
    pub fn mul(&self, rhs: &Tensor) -> Result<Tensor> {
        self.binary(OpKind::Mul, rhs)
    }

    /// Element-wise division.
    pub fn div(&self, rhs: &Tensor) -> Result<Tensor> {
        self.binary(OpKind::Div, rhs)
    }

    /// Element-wise maximum; NaN propagates.
    pub fn maximum(&self, rhs: &Tensor) -> Result<Tensor> {
        self.binary(OpKind::Maximum, rhs)
    }

    /// Element-wise minimum; NaN propagates.
    pub fn minimum(&self, rhs: &Tensor) -> Result<Tensor> {
        self.binary(OpKind::Minimum, rhs)
    }

    /// Step function: 0 below zero, `values` at zero, 1 above.
    pub fn heaviside(&self, values: &Tensor) -> Result<Tensor> {
        self.binary(OpKind::Heaviside, values)
    }

    /// `x` where positive, `weight * x` elsewhere.
    pub fn prelu(&self, weight: &Tensor) -> Result<Tensor> {
        self.binary(OpKind::Prelu, weight)
    }

    /// Apply an element-wise function.
    pub fn unary(&self, op: UnaryOp) -> Tensor {
        self.lazy_op(
            OpKind::Unary(op),
            SmallVec::from_slice(&[self.node_id]),
            self.shape.clone(),
            self.dtype,
        )
    }

    /// Element-wise negation.
    pub fn neg(&self) -> Tensor {
        self.unary(UnaryOp::Neg)
    }

    /// Clamp into `[min, max]`.
    pub fn clip(&self, min: f32, max: f32) -> Tensor {
        self.unary(UnaryOp::Clip {
            min: Scalar(min),
            max: Scalar(max),
        })
    }

    /// Raise every element to `exponent`.
    pub fn pow_scalar(&self, exponent: f32) -> Tensor {
        self.unary(UnaryOp::Pow {
            exponent: Scalar(exponent),
        })
    }

    /// Convert to another dtype.
    pub fn astype(&self, dtype: DType) -> Tensor {
        if dtype == self.dtype {
            return self.clone();
        }
        self.lazy_op(
            OpKind::AsType { wrapping: false },
            SmallVec::from_slice(&[self.node_id]),
            self.shape.clone(),
            dtype,
        )
    }

    /// Reinterpret integer results in `dtype` with fixed-width wraparound.
    ///
    /// Unlike [`astype`](Self::astype) this always adds a node, since values
    /// may already lie outside the tagged dtype's range.
    pub fn wrapping_astype(&self, dtype: DType) -> Tensor {
        self.lazy_op(
            OpKind::AsType { wrapping: true },
            SmallVec::from_slice(&[self.node_id]),
            self.shape.clone(),
            dtype,
        )
    }

    // ── Reductions ──────────────────────────────────────────────────────

    fn reduce(&self, axis: Option<i32>, op: OpKind) -> Result<Tensor> {
        let shape = match axis {
            Some(axis) => {
                let ax = self.resolve_axis(axis)?;
                let mut dims = self.shape.0.clone();
                dims.remove(ax);
                Shape::new(dims)
            }
            None => Shape::scalar(),
        };
        Ok(self.lazy_op(
            op,
            SmallVec::from_slice(&[self.node_id]),
            shape,
            self.dtype,
        ))
    }

    /// Sum along an axis.
    pub fn sum_axis(&self, axis: i32) -> Result<Tensor> {
        self.reduce(Some(axis), OpKind::Sum { axis: Some(axis) })
    }

    /// Sum all elements to a scalar.
    pub fn sum_all(&self) -> Result<Tensor> {
        self.reduce(None, OpKind::Sum { axis: None })
    }

    /// Arithmetic mean along an axis.
    pub fn mean_axis(&self, axis: i32) -> Result<Tensor> {
        self.reduce(Some(axis), OpKind::Mean { axis: Some(axis) })
    }

    pub fn max_axis(&self, axis: i32) -> Result<Tensor> {
        self.reduce(Some(axis), OpKind::Max { axis: Some(axis) })
    }

    pub fn min_axis(&self, axis: i32) -> Result<Tensor> {
        self.reduce(Some(axis), OpKind::Min { axis: Some(axis) })
    }

    pub fn median_axis(&self, axis: i32) -> Result<Tensor> {
        self.reduce(Some(axis), OpKind::Median { axis: Some(axis) })
    }

    // ── Shape manipulation ──────────────────────────────────────────────

    /// Reshape the tensor.
    pub fn reshape(&self, new_shape: &Shape) -> Result<Tensor> {
        if self.shape.numel() != new_shape.numel() {
            return Err(ShimError::ShapeMismatch {
                expected: self.shape.0.clone(),
                got: new_shape.0.clone(),
            });
        }
        if &self.shape == new_shape {
            return Ok(self.clone());
        }
        Ok(self.lazy_op(
            OpKind::Reshape {
                new_shape: new_shape.clone(),
            },
            SmallVec::from_slice(&[self.node_id]),
            new_shape.clone(),
            self.dtype,
        ))
    }

    /// Permute axes; `None` reverses them.
    pub fn transpose(&self, axes: Option<&[usize]>) -> Result<Tensor> {
        let ndim = self.shape.ndim();
        let perm: Vec<usize> = match axes {
            Some(ax) => {
                let mut seen = vec![false; ndim];
                let valid = ax.len() == ndim
                    && ax
                        .iter()
                        .all(|&a| a < ndim && !std::mem::replace(&mut seen[a], true));
                if !valid {
                    return Err(ShimError::InvalidArgument(format!(
                        "transpose axes {ax:?} are not a permutation of {ndim} axes"
                    )));
                }
                ax.to_vec()
            }
            None => (0..ndim).rev().collect(),
        };
        if perm.iter().enumerate().all(|(i, &p)| i == p) {
            return Ok(self.clone());
        }
        let new_dims: Vec<i64> = perm.iter().map(|&ax| self.shape.0[ax]).collect();
        Ok(self.lazy_op(
            OpKind::Transpose { axes: Some(perm) },
            SmallVec::from_slice(&[self.node_id]),
            Shape::new(new_dims),
            self.dtype,
        ))
    }

    /// Broadcast this tensor to the target shape (numpy-style rules).
    pub fn broadcast_to(&self, target: &Shape) -> Result<Tensor> {
        if &self.shape == target {
            return Ok(self.clone());
        }
        // Validate broadcast compatibility: dimensions are compared from the right.
        let in_ndim = self.shape.ndim();
        let out_ndim = target.ndim();
        if in_ndim > out_ndim {
            return Err(ShimError::InvalidArgument(format!(
                "cannot broadcast shape {} to {}",
                self.shape, target
            )));
        }
        let pad = out_ndim - in_ndim;
        for i in 0..in_ndim {
            let in_dim = self.shape.0[i];
            let out_dim = target.0[pad + i];
            if in_dim != 1 && in_dim != out_dim {
                return Err(ShimError::InvalidArgument(format!(
                    "cannot broadcast shape {} to {}",
                    self.shape, target
                )));
            }
        }
        Ok(self.lazy_op(
            OpKind::Broadcast {
                target_shape: target.clone(),
            },
            SmallVec::from_slice(&[self.node_id]),
            target.clone(),
            self.dtype,
        ))
    }

    /// Reverse the order of elements along each of `axes`.
    pub fn flip(&self, axes: &[i32]) -> Result<Tensor> {
        let mut resolved = axes
            .iter()
            .map(|&a| self.resolve_axis(a))
            .collect::<Result<Vec<_>>>()?;
        resolved.sort_unstable();
        resolved.dedup();
        Ok(self.lazy_op(
            OpKind::Flip { axes: resolved },
            SmallVec::from_slice(&[self.node_id]),
            self.shape.clone(),
            self.dtype,
        ))
    }

    /// Join tensors along an existing axis.
    ///
    /// All tensors must share rank and every extent except `axis`.
    pub fn concat(tensors: &[Tensor], axis: i32) -> Result<Tensor> {
        let first = tensors
            .first()
            .ok_or_else(|| ShimError::InvalidArgument("concat of zero tensors".into()))?;
        let ax = first.resolve_axis(axis)?;
        let mut extent = 0;
        for t in tensors {
            first.same_stream(t)?;
            let compatible = t.shape.ndim() == first.shape.ndim()
                && (0..first.shape.ndim()).all(|d| d == ax || t.shape.0[d] == first.shape.0[d]);
            if !compatible {
                return Err(ShimError::ShapeMismatch {
                    expected: first.shape.0.clone(),
                    got: t.shape.0.clone(),
                });
            }
            extent += t.shape.0[ax];
        }
        if tensors.len() == 1 {
            return Ok(first.clone());
        }
        let inputs: SmallVec<[NodeId; 2]> = tensors.iter().map(|t| t.node_id).collect();
        Ok(first.lazy_op(
            OpKind::Concatenate { axis: ax },
            inputs,
            first.shape.with_dim(ax, extent),
            first.dtype,
        ))
    }

    /// Elements `[start, end)` along `axis`.
    pub fn slice_axis(&self, axis: i32, start: usize, end: usize) -> Result<Tensor> {
        let ax = self.resolve_axis(axis)?;
        let extent = self.shape.0[ax] as usize;
        if start > end || end > extent {
            return Err(ShimError::InvalidArgument(format!(
                "slice [{start}, {end}) out of bounds for axis {axis} of shape {}",
                self.shape
            )));
        }
        if start == 0 && end == extent {
            return Ok(self.clone());
        }
        Ok(self.lazy_op(
            OpKind::Slice {
                axis: ax,
                start,
                end,
            },
            SmallVec::from_slice(&[self.node_id]),
            self.shape.with_dim(ax, (end - start) as i64),
            self.dtype,
        ))
    }

    /// Select whole slabs along `axis` by a 1-D index tensor.
    pub fn take(&self, indices: &Tensor, axis: i32) -> Result<Tensor> {
        self.same_stream(indices)?;
        let ax = self.resolve_axis(axis)?;
        if indices.shape.ndim() != 1 {
            return Err(ShimError::RankMismatch {
                op: "take",
                expected: "1".into(),
                got: indices.shape.ndim(),
            });
        }
        Ok(self.lazy_op(
            OpKind::Take { axis: ax },
            SmallVec::from_slice(&[self.node_id, indices.node_id]),
            self.shape.with_dim(ax, indices.shape.0[0]),
            self.dtype,
        ))
    }

    /// Gather along `axis` with an index tensor of the same rank.
    ///
    /// Non-axis extents broadcast against each other; the result takes the
    /// index tensor's extent on `axis`. Negative indices count from the end.
    pub fn take_along_axis(&self, indices: &Tensor, axis: i32) -> Result<Tensor> {
        self.same_stream(indices)?;
        let ndim = self.shape.ndim();
        if indices.shape.ndim() != ndim {
            return Err(ShimError::RankMismatch {
                op: "take_along_axis",
                expected: ndim.to_string(),
                got: indices.shape.ndim(),
            });
        }
        let ax = self.resolve_axis(axis)?;
        let mut dims = Vec::with_capacity(ndim);
        for d in 0..ndim {
            let (a, i) = (self.shape.0[d], indices.shape.0[d]);
            let out = if d == ax || a == i || a == 1 {
                i
            } else if i == 1 {
                a
            } else {
                return Err(ShimError::ShapeMismatch {
                    expected: self.shape.0.clone(),
                    got: indices.shape.0.clone(),
                });
            };
            dims.push(out);
        }
        Ok(self.lazy_op(
            OpKind::TakeAlongAxis { axis: ax },
            SmallVec::from_slice(&[self.node_id, indices.node_id]),
            Shape::new(dims),
            self.dtype,
        ))
    }

    /// Rewrite index values outside `[0, extent)` to -1.
    pub fn mask_out_of_range(&self, extent: i64) -> Tensor {
        self.lazy_op(
            OpKind::MaskOutOfRange { extent },
            SmallVec::from_slice(&[self.node_id]),
            self.shape.clone(),
            self.dtype,
        )
    }

    /// Indices that sort along `axis` (stable, NaN last), as `i64`.
    pub fn argsort(&self, axis: i32) -> Result<Tensor> {
        let ax = self.resolve_axis(axis)?;
        Ok(self.lazy_op(
            OpKind::ArgSort { axis: ax },
            SmallVec::from_slice(&[self.node_id]),
            self.shape.clone(),
            DType::I64,
        ))
    }

    /// Pad with a mode the backend implements natively.
    ///
    /// `widths` holds one `(before, after)` pair per axis. `value` is
    /// converted to this tensor's dtype first.
    pub fn pad(&self, widths: &[(usize, usize)], mode: NativePadMode, value: f32) -> Result<Tensor> {
        if widths.len() != self.shape.ndim() {
            return Err(ShimError::RankMismatch {
                op: "pad",
                expected: self.shape.ndim().to_string(),
                got: widths.len(),
            });
        }
        let dims: Vec<i64> = self
            .shape
            .0
            .iter()
            .zip(widths.iter())
            .map(|(&d, &(b, a))| d + b as i64 + a as i64)
            .collect();
        Ok(self.lazy_op(
            OpKind::Pad {
                widths: widths.to_vec(),
                mode,
                value: Scalar(self.dtype.saturate(value)),
            },
            SmallVec::from_slice(&[self.node_id]),
            Shape::new(dims),
            self.dtype,
        ))
    }

    // ── Activations ─────────────────────────────────────────────────────

    /// Softmax along an axis.
    pub fn softmax(&self, axis: i32) -> Result<Tensor> {
        self.resolve_axis(axis)?;
        Ok(self.lazy_op(
            OpKind::Softmax { axis },
            SmallVec::from_slice(&[self.node_id]),
            self.shape.clone(),
            self.dtype,
        ))
    }

    /// Log of softmax along an axis, computed in one pass.
    pub fn log_softmax(&self, axis: i32) -> Result<Tensor> {
        self.resolve_axis(axis)?;
        Ok(self.lazy_op(
            OpKind::LogSoftmax { axis },
            SmallVec::from_slice(&[self.node_id]),
            self.shape.clone(),
            self.dtype,
        ))
    }

    // ── Materialization ─────────────────────────────────────────────────

    /// Materialize the tensor, triggering evaluation of the computation graph.
    pub fn eval(&self) -> Result<()> {
        self.stream.eval(self.node_id)
    }

    /// Evaluate if needed and copy the data out.
    pub fn to_vec_f32(&self) -> Result<Vec<f32>> {
        self.eval()?;
        self.stream
            .get_buffer(self.node_id)
            .ok_or_else(|| ShimError::InvalidArgument("buffer not found after eval".into()))
    }

    // ── Accessors ───────────────────────────────────────────────────────

    /// Get the tensor shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Get the tensor dtype.
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.shape.ndim()
    }

    /// Number of elements.
    pub fn numel(&self) -> i64 {
        self.shape.numel()
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// The owning stream, shared.
    pub fn stream(&self) -> Arc<Stream> {
        Arc::clone(&self.stream)
    }
}

impl std::fmt::Debug for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tensor")
            .field("node_id", &self.node_id)
            .field("shape", &self.shape)
            .field("dtype", &self.dtype)
            .finish()
    }
}

impl std::ops::Add for &Tensor {
    type Output = Result<Tensor>;
    fn add(self, rhs: &Tensor) -> Self::Output {
        Tensor::add(self, rhs)
    }
}

impl std::ops::Sub for &Tensor {
    type Output = Result<Tensor>;
    fn sub(self, rhs: &Tensor) -> Self::Output {
        Tensor::sub(self, rhs)
    }
}

impl std::ops::Mul for &Tensor {
    type Output = Result<Tensor>;
    fn mul(self, rhs: &Tensor) -> Self::Output {
        Tensor::mul(self, rhs)
    }
}

impl std::ops::Neg for &Tensor {
    type Output = Tensor;
    fn neg(self) -> Self::Output {
        Tensor::neg(self)
    }
}
