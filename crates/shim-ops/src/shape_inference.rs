//! Shape inference for graph ops.
//!
//! Given an `OpKind` and input shapes, computes the output shape without
//! touching data. Frontend code uses it to size intermediate results before
//! building nodes.

use shim_core::Shape;
use shim_core::graph::OpKind;

use crate::ShapeError;

fn input<'a>(inputs: &[&'a Shape], idx: usize) -> Result<&'a Shape, ShapeError> {
    inputs
        .get(idx)
        .copied()
        .ok_or_else(|| ShapeError::Mismatch(format!("missing input {idx}")))
}

fn check_axis(axis: usize, ndim: usize) -> Result<usize, ShapeError> {
    if axis < ndim {
        Ok(axis)
    } else {
        Err(ShapeError::InvalidAxis {
            axis: axis as i64,
            ndim,
        })
    }
}

/// Normalize a possibly negative axis.
pub fn resolve_axis(axis: i32, ndim: usize) -> Result<usize, ShapeError> {
    let ndim_i = ndim as i32;
    let resolved = if axis < 0 { ndim_i + axis } else { axis };
    if resolved < 0 || resolved >= ndim_i {
        return Err(ShapeError::InvalidAxis {
            axis: axis as i64,
            ndim,
        });
    }
    Ok(resolved as usize)
}

/// Infer the output shape for a given op and input shapes.
pub fn infer_shape(op: &OpKind, inputs: &[&Shape]) -> Result<Shape, ShapeError> {
    match op {
        OpKind::Add
        | OpKind::Sub
        | OpKind::Mul
        | OpKind::Div
        | OpKind::Maximum
        | OpKind::Minimum
        | OpKind::Heaviside
        | OpKind::Prelu => {
            let a = input(inputs, 0)?;
            let b = input(inputs, 1)?;
            crate::broadcast_shapes(a, b)
                .ok_or_else(|| ShapeError::Mismatch(format!("cannot broadcast {a} with {b}")))
        }

        OpKind::Constant | OpKind::Unary(_) | OpKind::AsType { .. } | OpKind::MaskOutOfRange { .. } => {
            Ok(input(inputs, 0)?.clone())
        }

        OpKind::Softmax { axis } | OpKind::LogSoftmax { axis } => {
            let a = input(inputs, 0)?;
            resolve_axis(*axis, a.ndim())?;
            Ok(a.clone())
        }

        // Reductions remove the specified axis.
        OpKind::Sum { axis }
        | OpKind::Mean { axis }
        | OpKind::Max { axis }
        | OpKind::Min { axis }
        | OpKind::Median { axis } => {
            let a = input(inputs, 0)?;
            match axis {
                None => Ok(Shape::scalar()),
                Some(ax) => {
                    let resolved = resolve_axis(*ax, a.ndim())?;
                    let mut dims = a.0.clone();
                    dims.remove(resolved);
                    Ok(Shape::new(dims))
                }
            }
        }

        OpKind::Reshape { new_shape } => {
            let a = input(inputs, 0)?;
            if a.numel() != new_shape.numel() {
                return Err(ShapeError::Mismatch(format!(
                    "cannot reshape {a} into {new_shape}"
                )));
            }
            Ok(new_shape.clone())
        }

        OpKind::Broadcast { target_shape } => Ok(target_shape.clone()),

        OpKind::Transpose { axes } => {
            let a = input(inputs, 0)?;
            let perm: Vec<usize> = match axes {
                Some(ax) => ax.clone(),
                None => (0..a.ndim()).rev().collect(),
            };
            if perm.len() != a.ndim() {
                return Err(ShapeError::Mismatch(format!(
                    "permutation {perm:?} does not match rank {}",
                    a.ndim()
                )));
            }
            perm.iter()
                .map(|&ax| check_axis(ax, a.ndim()).map(|ax| a.0[ax]))
                .collect::<Result<Vec<_>, _>>()
                .map(Shape::new)
        }

        OpKind::Flip { axes } => {
            let a = input(inputs, 0)?;
            for &ax in axes {
                check_axis(ax, a.ndim())?;
            }
            Ok(a.clone())
        }

        OpKind::ArgSort { axis } => {
            let a = input(inputs, 0)?;
            check_axis(*axis, a.ndim())?;
            Ok(a.clone())
        }

        OpKind::Concatenate { axis } => {
            let first = input(inputs, 0)?;
            let ax = check_axis(*axis, first.ndim())?;
            let mut extent = 0;
            for s in inputs {
                let compatible = s.ndim() == first.ndim()
                    && (0..s.ndim()).all(|d| d == ax || s.0[d] == first.0[d]);
                if !compatible {
                    return Err(ShapeError::Mismatch(format!(
                        "cannot concatenate {first} with {s} on axis {ax}"
                    )));
                }
                extent += s.0[ax];
            }
            Ok(first.with_dim(ax, extent))
        }

        OpKind::Slice { axis, start, end } => {
            let a = input(inputs, 0)?;
            let ax = check_axis(*axis, a.ndim())?;
            if start > end || *end as i64 > a.0[ax] {
                return Err(ShapeError::Mismatch(format!(
                    "slice [{start}, {end}) out of bounds for {a}"
                )));
            }
            Ok(a.with_dim(ax, (end - start) as i64))
        }

        OpKind::Take { axis } => {
            let a = input(inputs, 0)?;
            let idx = input(inputs, 1)?;
            let ax = check_axis(*axis, a.ndim())?;
            if idx.ndim() != 1 {
                return Err(ShapeError::Mismatch(format!("take indices must be 1-D, got {idx}")));
            }
            Ok(a.with_dim(ax, idx.0[0]))
        }

        OpKind::TakeAlongAxis { axis } => {
            let a = input(inputs, 0)?;
            let idx = input(inputs, 1)?;
            let ax = check_axis(*axis, a.ndim())?;
            if idx.ndim() != a.ndim() {
                return Err(ShapeError::Mismatch(format!(
                    "indices rank {} does not match array rank {}",
                    idx.ndim(),
                    a.ndim()
                )));
            }
            let mut dims = Vec::with_capacity(a.ndim());
            for d in 0..a.ndim() {
                let (ad, id) = (a.0[d], idx.0[d]);
                dims.push(if d == ax || ad == id || ad == 1 {
                    id
                } else if id == 1 {
                    ad
                } else {
                    return Err(ShapeError::Mismatch(format!(
                        "cannot broadcast indices {idx} against {a}"
                    )));
                });
            }
            Ok(Shape::new(dims))
        }

        OpKind::Pad { widths, .. } => {
            let a = input(inputs, 0)?;
            if widths.len() != a.ndim() {
                return Err(ShapeError::InvalidPadWidth(format!(
                    "{} pairs for rank {}",
                    widths.len(),
                    a.ndim()
                )));
            }
            Ok(Shape::new(
                a.0.iter()
                    .zip(widths.iter())
                    .map(|(&d, &(b, e))| d + b as i64 + e as i64)
                    .collect::<Vec<_>>(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shim_core::{NativePadMode, Scalar, UnaryOp};

    fn s(dims: &[i64]) -> Shape {
        Shape::new(dims.to_vec())
    }

    #[test]
    fn test_binary_broadcast() {
        let result = infer_shape(&OpKind::Heaviside, &[&s(&[2, 1]), &s(&[1, 3])]).unwrap();
        assert_eq!(result, s(&[2, 3]));
    }

    #[test]
    fn test_binary_incompatible() {
        assert!(infer_shape(&OpKind::Add, &[&s(&[2, 3]), &s(&[2, 4])]).is_err());
    }

    #[test]
    fn test_unary_preserves_shape() {
        let a = s(&[3, 4]);
        let op = OpKind::Unary(UnaryOp::Softplus {
            beta: Scalar(1.0),
            threshold: Scalar(20.0),
        });
        assert_eq!(infer_shape(&op, &[&a]).unwrap(), a);
    }

    #[test]
    fn test_reduction_removes_axis() {
        let a = s(&[2, 3, 4]);
        let r = infer_shape(&OpKind::Median { axis: Some(-1) }, &[&a]).unwrap();
        assert_eq!(r, s(&[2, 3]));
        let all = infer_shape(&OpKind::Sum { axis: None }, &[&a]).unwrap();
        assert_eq!(all, Shape::scalar());
    }

    #[test]
    fn test_transpose_custom() {
        let result = infer_shape(
            &OpKind::Transpose {
                axes: Some(vec![2, 0, 1]),
            },
            &[&s(&[2, 3, 4])],
        )
        .unwrap();
        assert_eq!(result, s(&[4, 2, 3]));
    }

    #[test]
    fn test_concatenate() {
        let r = infer_shape(
            &OpKind::Concatenate { axis: 1 },
            &[&s(&[2, 1]), &s(&[2, 4]), &s(&[2, 2])],
        )
        .unwrap();
        assert_eq!(r, s(&[2, 7]));
        assert!(infer_shape(&OpKind::Concatenate { axis: 1 }, &[&s(&[2, 1]), &s(&[3, 1])]).is_err());
    }

    #[test]
    fn test_take_along_axis_broadcast() {
        let r = infer_shape(
            &OpKind::TakeAlongAxis { axis: 0 },
            &[&s(&[5, 3]), &s(&[2, 1])],
        )
        .unwrap();
        assert_eq!(r, s(&[2, 3]));
    }

    #[test]
    fn test_pad_grows_each_axis() {
        let op = OpKind::Pad {
            widths: vec![(1, 1), (0, 2)],
            mode: NativePadMode::Constant,
            value: Scalar(0.0),
        };
        assert_eq!(infer_shape(&op, &[&s(&[2, 2])]).unwrap(), s(&[4, 4]));
    }

    #[test]
    fn test_slice_bounds() {
        let ok = OpKind::Slice {
            axis: 0,
            start: 1,
            end: 3,
        };
        assert_eq!(infer_shape(&ok, &[&s(&[3, 2])]).unwrap(), s(&[2, 2]));
        let bad = OpKind::Slice {
            axis: 0,
            start: 1,
            end: 4,
        };
        assert!(infer_shape(&bad, &[&s(&[3, 2])]).is_err());
    }
}
