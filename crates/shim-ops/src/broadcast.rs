//! Broadcasting rules following NumPy semantics.

use shim_core::Shape;

use crate::ShapeError;

/// Compute the broadcast shape of two shapes, or None if incompatible.
///
/// Rules (NumPy-style):
/// 1. Align shapes from the trailing dimension.
/// 2. For each dimension pair: must be equal, or one must be 1.
/// 3. The output dimension is the non-1 one.
pub fn broadcast_shapes(a: &Shape, b: &Shape) -> Option<Shape> {
    Shape::broadcast_shapes(a, b)
}

/// Fold [`broadcast_shapes`] over any number of shapes, left to right.
///
/// A single shape comes back unchanged.
pub fn broadcast_all(shapes: &[Shape]) -> Result<Shape, ShapeError> {
    let (first, rest) = shapes
        .split_first()
        .ok_or_else(|| ShapeError::Mismatch("broadcast of zero shapes".into()))?;
    rest.iter().try_fold(first.clone(), |acc, s| {
        broadcast_shapes(&acc, s)
            .ok_or_else(|| ShapeError::Mismatch(format!("cannot broadcast {acc} with {s}")))
    })
}
