//! torchvision box ops.

use std::cmp::Ordering;

use shim_core::{DType, Result, Shape, ShimError, Tensor};

fn iou(a: &[f32], b: &[f32]) -> f32 {
    let area = |r: &[f32]| (r[2] - r[0]).max(0.0) * (r[3] - r[1]).max(0.0);
    let w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = w * h;
    let union = area(a) + area(b) - inter;
    if union > 0.0 { inter / union } else { 0.0 }
}

/// Greedy non-maximum suppression.
///
/// `boxes` is `[N, 4]` in `(x1, y1, x2, y2)` form, `scores` is `[N]`. Boxes
/// are visited by descending score and a box is dropped when its IoU with an
/// already kept box exceeds `iou_threshold`. Returns kept indices as `I64`,
/// highest score first. The output length depends on the data, so both
/// inputs are evaluated.
pub fn nms(boxes: &Tensor, scores: &Tensor, iou_threshold: f32) -> Result<Tensor> {
    let dims = &boxes.shape().0;
    if dims.len() != 2 || dims[1] != 4 {
        return Err(ShimError::InvalidArgument(format!(
            "nms: boxes must have shape [N, 4], got {}",
            boxes.shape()
        )));
    }
    if scores.shape().0 != [dims[0]] {
        return Err(ShimError::ShapeMismatch {
            expected: vec![dims[0]],
            got: scores.shape().0.clone(),
        });
    }

    let coords = boxes.to_vec_f32()?;
    let s = scores.to_vec_f32()?;
    let mut order: Vec<usize> = (0..s.len()).collect();
    order.sort_by(|&a, &b| s[b].partial_cmp(&s[a]).unwrap_or(Ordering::Equal));

    let mut keep: Vec<usize> = Vec::new();
    for i in order {
        let candidate = &coords[i * 4..i * 4 + 4];
        let suppressed = keep
            .iter()
            .any(|&k| iou(&coords[k * 4..k * 4 + 4], candidate) > iou_threshold);
        if !suppressed {
            keep.push(i);
        }
    }
    tracing::debug!(candidates = s.len(), kept = keep.len(), iou_threshold, "nms");

    let n = keep.len() as i64;
    let data = keep.into_iter().map(|i| i as f32).collect();
    boxes.constant_like(data, &Shape::new(vec![n]), DType::I64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shim_core::Device;

    fn t(data: &[f32], dims: &[i64]) -> Tensor {
        Tensor::from_f32(data, &Shape::new(dims.to_vec()), &Device::Cpu).unwrap()
    }

    #[test]
    fn test_iou() {
        assert_eq!(iou(&[0.0, 0.0, 2.0, 2.0], &[1.0, 0.0, 3.0, 2.0]), 2.0 / 6.0);
        assert_eq!(iou(&[0.0, 0.0, 1.0, 1.0], &[2.0, 2.0, 3.0, 3.0]), 0.0);
    }

    #[test]
    fn test_nms_suppresses_overlaps() {
        let boxes = t(
            &[
                0.0, 0.0, 10.0, 10.0, //
                1.0, 1.0, 11.0, 11.0, //
                20.0, 20.0, 30.0, 30.0,
            ],
            &[3, 4],
        );
        let scores = t(&[0.8, 0.9, 0.7], &[3]);
        let keep = nms(&boxes, &scores, 0.5).unwrap();
        assert_eq!(keep.dtype(), DType::I64);
        assert_eq!(keep.to_vec_f32().unwrap(), vec![1.0, 2.0]);

        let all = nms(&boxes, &scores, 0.9).unwrap();
        assert_eq!(all.to_vec_f32().unwrap(), vec![1.0, 0.0, 2.0]);
    }

    #[test]
    fn test_nms_validates_shapes() {
        let boxes = t(&[0.0; 6], &[2, 3]);
        let scores = t(&[1.0, 1.0], &[2]);
        assert!(nms(&boxes, &scores, 0.5).is_err());
        let boxes = t(&[0.0; 8], &[2, 4]);
        assert!(nms(&boxes, &t(&[1.0], &[1]), 0.5).is_err());
    }

    #[test]
    fn test_nms_empty() {
        let keep = nms(&t(&[], &[0, 4]), &t(&[], &[0]), 0.5).unwrap();
        assert_eq!(keep.shape(), &Shape::new(vec![0]));
    }
}
