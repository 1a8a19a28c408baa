//! Stateless functions in the shape of `torch.nn.functional`.
//!
//! Element-wise activations lower to a single `Unary` node; the softmax
//! family, the normalizations and attention are composed from axis ops.

use shim_core::{NativePadMode, Result, Scalar, Shape, ShimError, Tensor, UnaryOp};

/// `max(0, x)`.
pub fn relu(x: &Tensor) -> Tensor {
    x.unary(UnaryOp::Relu)
}

/// `min(max(0, x), 6)`.
pub fn relu6(x: &Tensor) -> Tensor {
    x.unary(UnaryOp::Relu6)
}

/// `1 / (1 + exp(-x))`.
pub fn sigmoid(x: &Tensor) -> Tensor {
    x.unary(UnaryOp::Sigmoid)
}

/// `log(sigmoid(x))`, stable for large negative inputs.
pub fn logsigmoid(x: &Tensor) -> Tensor {
    x.unary(UnaryOp::LogSigmoid)
}

/// Hyperbolic tangent.
pub fn tanh(x: &Tensor) -> Tensor {
    x.unary(UnaryOp::Tanh)
}

/// `x - tanh(x)`.
pub fn tanhshrink(x: &Tensor) -> Tensor {
    x.unary(UnaryOp::Tanhshrink)
}

/// `x / (1 + |x|)`.
pub fn softsign(x: &Tensor) -> Tensor {
    x.unary(UnaryOp::Softsign)
}

/// `x * sigmoid(x)`.
pub fn silu(x: &Tensor) -> Tensor {
    x.unary(UnaryOp::Silu)
}

/// `x * tanh(softplus(x))`.
pub fn mish(x: &Tensor) -> Tensor {
    x.unary(UnaryOp::Mish)
}

/// Scaled ELU with PyTorch's fixed `alpha` and `scale`.
pub fn selu(x: &Tensor) -> Tensor {
    x.unary(UnaryOp::Selu)
}

/// `relu6(x + 3) / 6`.
pub fn hardsigmoid(x: &Tensor) -> Tensor {
    x.unary(UnaryOp::Hardsigmoid)
}

/// `x * relu6(x + 3) / 6`.
pub fn hardswish(x: &Tensor) -> Tensor {
    x.unary(UnaryOp::Hardswish)
}

/// `x` for positive inputs, `alpha * (exp(x) - 1)` otherwise.
pub fn elu(x: &Tensor, alpha: f32) -> Tensor {
    x.unary(UnaryOp::Elu {
        alpha: Scalar(alpha),
    })
}

/// `max(0, x) + min(0, alpha * (exp(x / alpha) - 1))`. `alpha` must be non-zero.
pub fn celu(x: &Tensor, alpha: f32) -> Result<Tensor> {
    if alpha == 0.0 {
        return Err(ShimError::InvalidArgument(
            "celu: alpha must be non-zero".into(),
        ));
    }
    Ok(x.unary(UnaryOp::Celu {
        alpha: Scalar(alpha),
    }))
}

/// Gaussian error linear unit. `approximate` is `"none"` (erf) or `"tanh"`.
pub fn gelu(x: &Tensor, approximate: &str) -> Result<Tensor> {
    let tanh = match approximate {
        "none" => false,
        "tanh" => true,
        other => {
            return Err(ShimError::InvalidMode {
                op: "gelu",
                mode: other.to_string(),
                valid: "none, tanh",
            });
        }
    };
    Ok(x.unary(UnaryOp::Gelu { tanh }))
}

/// Gated linear unit: split `dim` in halves `a, b` and return `a * sigmoid(b)`.
pub fn glu(x: &Tensor, dim: i32) -> Result<Tensor> {
    let axis = x.shape().resolve_axis(dim).ok_or(ShimError::InvalidAxis {
        axis: dim as i64,
        ndim: x.ndim(),
    })?;
    let extent = x.shape().0[axis] as usize;
    if extent % 2 != 0 {
        return Err(ShimError::InvalidArgument(format!(
            "glu: halving dimension {dim} must be even, got size {extent}"
        )));
    }
    let half = extent / 2;
    let a = x.slice_axis(dim, 0, half)?;
    let b = x.slice_axis(dim, half, extent)?;
    a.mul(&sigmoid(&b))
}

/// Zero inside `[-lambd, lambd]`, identity outside.
pub fn hardshrink(x: &Tensor, lambd: f32) -> Tensor {
    x.unary(UnaryOp::Hardshrink {
        lambd: Scalar(lambd),
    })
}

/// Shrink towards zero by `lambd`; `lambd` must be non-negative.
pub fn softshrink(x: &Tensor, lambd: f32) -> Result<Tensor> {
    if lambd < 0.0 {
        return Err(ShimError::InvalidArgument(format!(
            "softshrink: lambda must be no less than zero, got {lambd}"
        )));
    }
    Ok(x.unary(UnaryOp::Softshrink {
        lambd: Scalar(lambd),
    }))
}

/// Clamp to `[min_val, max_val]`; errors if `min_val > max_val`.
pub fn hardtanh(x: &Tensor, min_val: f32, max_val: f32) -> Result<Tensor> {
    if min_val > max_val {
        return Err(ShimError::InvalidArgument(format!(
            "hardtanh: min_val {min_val} cannot be greater than max_val {max_val}"
        )));
    }
    Ok(x.unary(UnaryOp::Hardtanh {
        min: Scalar(min_val),
        max: Scalar(max_val),
    }))
}

/// `x` for positive inputs, `negative_slope * x` otherwise.
pub fn leaky_relu(x: &Tensor, negative_slope: f32) -> Tensor {
    x.unary(UnaryOp::LeakyRelu {
        slope: Scalar(negative_slope),
    })
}

/// `log(1 + exp(beta * x)) / beta`, linear once `beta * x > threshold`.
pub fn softplus(x: &Tensor, beta: f32, threshold: f32) -> Tensor {
    x.unary(UnaryOp::Softplus {
        beta: Scalar(beta),
        threshold: Scalar(threshold),
    })
}

/// `x` where `x > threshold`, else `value`.
pub fn threshold(x: &Tensor, threshold: f32, value: f32) -> Tensor {
    x.unary(UnaryOp::Threshold {
        threshold: Scalar(threshold),
        value: Scalar(value),
    })
}

/// Softmax along `dim`.
pub fn softmax(x: &Tensor, dim: i32) -> Result<Tensor> {
    x.softmax(dim)
}

/// `log(softmax(x))` along `dim`.
pub fn log_softmax(x: &Tensor, dim: i32) -> Result<Tensor> {
    x.log_softmax(dim)
}

/// `softmax(-x)`.
pub fn softmin(x: &Tensor, dim: i32) -> Result<Tensor> {
    x.neg().softmax(dim)
}

/// `max(0, x) + weight * min(0, x)` with one weight per channel (dim 1).
///
/// A single-element weight applies to every element.
pub fn prelu(x: &Tensor, weight: &Tensor) -> Result<Tensor> {
    let num_parameters = weight.numel();
    if num_parameters == 1 {
        let w = weight.reshape(&Shape::scalar())?;
        return x.prelu(&w);
    }
    if weight.ndim() != 1 {
        return Err(ShimError::RankMismatch {
            op: "prelu",
            expected: "1".into(),
            got: weight.ndim(),
        });
    }
    let channels = x.shape().dim(1).ok_or_else(|| {
        ShimError::InvalidArgument(format!(
            "prelu: {num_parameters} weights need a channel dimension, input has rank {}",
            x.ndim()
        ))
    })?;
    if channels != num_parameters {
        return Err(ShimError::ShapeMismatch {
            expected: vec![channels],
            got: weight.shape().0.clone(),
        });
    }
    let mut dims = vec![num_parameters];
    dims.resize(x.ndim() - 1, 1);
    x.prelu(&weight.reshape(&Shape::new(dims))?)
}

fn require_float(op: &str, x: &Tensor) -> Result<()> {
    if x.dtype().is_float() {
        Ok(())
    } else {
        Err(ShimError::InvalidArgument(format!(
            "{op}: expected a floating point input, got {}",
            x.dtype()
        )))
    }
}

/// Divide by the `p`-norm along `dim`, floored at `eps`.
///
/// `p` must be positive; `f32::INFINITY` selects the max-norm.
pub fn normalize(x: &Tensor, p: f32, dim: i32, eps: f32) -> Result<Tensor> {
    require_float("normalize", x)?;
    if p.is_nan() || p <= 0.0 {
        return Err(ShimError::InvalidArgument(format!(
            "normalize: p must be positive, got {p}"
        )));
    }
    let axis = x.shape().resolve_axis(dim).ok_or(ShimError::InvalidAxis {
        axis: dim as i64,
        ndim: x.ndim(),
    })?;
    let magnitude = x.unary(UnaryOp::Abs);
    let norm = if p == f32::INFINITY {
        magnitude.max_axis(dim)?
    } else if p == 1.0 {
        magnitude.sum_axis(dim)?
    } else {
        magnitude.pow_scalar(p).sum_axis(dim)?.pow_scalar(1.0 / p)
    };
    let floor = x.full_like(&Shape::scalar(), eps, x.dtype())?;
    let denom = norm
        .reshape(&x.shape().with_dim(axis, 1))?
        .maximum(&floor)?;
    x.div(&denom)
}

/// Normalize each element by the squared activity of `size` neighbouring
/// channels (dim 1): `x / (k + alpha * mean(x^2 over the window))^beta`.
///
/// The window is zero-padded with `size / 2` channels before and
/// `(size - 1) / 2` after. Inputs need at least three dimensions.
pub fn local_response_norm(
    x: &Tensor,
    size: usize,
    alpha: f32,
    beta: f32,
    k: f32,
) -> Result<Tensor> {
    require_float("local_response_norm", x)?;
    if x.ndim() < 3 {
        return Err(ShimError::RankMismatch {
            op: "local_response_norm",
            expected: ">= 3".into(),
            got: x.ndim(),
        });
    }
    if size == 0 {
        return Err(ShimError::InvalidArgument(
            "local_response_norm: size must be positive".into(),
        ));
    }
    if x.numel() == 0 {
        return Ok(x.clone());
    }
    let channels = x.shape().0[1] as usize;
    let mut widths = vec![(0, 0); x.ndim()];
    widths[1] = (size / 2, (size - 1) / 2);
    let padded = x.mul(x)?.pad(&widths, NativePadMode::Constant, 0.0)?;

    let mut window = padded.slice_axis(1, 0, channels)?;
    for offset in 1..size {
        window = window.add(&padded.slice_axis(1, offset, offset + channels)?)?;
    }
    let scale = x.full_like(&Shape::scalar(), alpha / size as f32, x.dtype())?;
    let bias = x.full_like(&Shape::scalar(), k, x.dtype())?;
    let denom = window.mul(&scale)?.add(&bias)?.pow_scalar(beta);
    x.div(&denom)
}

/// Insert a unit axis `from_end` positions before the end of `x`'s shape.
fn unsqueeze_from_end(x: &Tensor, from_end: usize) -> Result<Tensor> {
    let mut dims = x.shape().0.clone();
    dims.insert(dims.len() - from_end, 1);
    x.reshape(&Shape::new(dims))
}

/// `softmax(q @ k^T * scale) @ v` over the last two axes; leading axes
/// broadcast.
///
/// `scale` defaults to `1 / sqrt(E)`. With `is_causal`, query `i` only
/// attends to keys `0..=i`.
pub fn scaled_dot_product_attention(
    query: &Tensor,
    key: &Tensor,
    value: &Tensor,
    is_causal: bool,
    scale: Option<f32>,
) -> Result<Tensor> {
    for t in [query, key, value] {
        require_float("scaled_dot_product_attention", t)?;
        if t.ndim() < 2 {
            return Err(ShimError::RankMismatch {
                op: "scaled_dot_product_attention",
                expected: ">= 2".into(),
                got: t.ndim(),
            });
        }
    }
    let last = |t: &Tensor, back: usize| t.shape().0[t.ndim() - back];
    let (l, e) = (last(query, 2), last(query, 1));
    let s = last(key, 2);
    if last(key, 1) != e {
        return Err(ShimError::ShapeMismatch {
            expected: vec![s, e],
            got: vec![s, last(key, 1)],
        });
    }
    if last(value, 2) != s {
        return Err(ShimError::ShapeMismatch {
            expected: vec![s, last(value, 1)],
            got: vec![last(value, 2), last(value, 1)],
        });
    }

    // [.., L, 1, E] * [.., 1, S, E] summed over E gives [.., L, S].
    let scores = unsqueeze_from_end(query, 1)?
        .mul(&unsqueeze_from_end(key, 2)?)?
        .sum_axis(-1)?;
    let scale = scale.unwrap_or(1.0 / (e as f32).sqrt());
    let mut scores = scores.mul(&query.full_like(&Shape::scalar(), scale, query.dtype())?)?;
    if is_causal {
        let mask: Vec<f32> = (0..l)
            .flat_map(|i| (0..s).map(move |j| if j <= i { 0.0 } else { f32::NEG_INFINITY }))
            .collect();
        scores = scores.add(&query.constant_like(mask, &Shape::new(vec![l, s]), query.dtype())?)?;
    }
    let weights = scores.softmax(-1)?;

    // [.., L, S, 1] * [.., 1, S, Ev] summed over S gives [.., L, Ev].
    unsqueeze_from_end(&weights, 0)?
        .mul(&unsqueeze_from_end(value, 2)?)?
        .sum_axis(-2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shim_core::Device;

    fn t(data: &[f32], dims: &[i64]) -> Tensor {
        Tensor::from_f32(data, &Shape::new(dims.to_vec()), &Device::Cpu).unwrap()
    }

    fn assert_close(got: &[f32], want: &[f32]) {
        assert_eq!(got.len(), want.len());
        for (g, w) in got.iter().zip(want) {
            assert!((g - w).abs() < 1e-5, "got {got:?}, want {want:?}");
        }
    }

    #[test]
    fn test_piecewise_linear() {
        let x = t(&[-7.0, -0.5, 0.0, 0.5, 7.0], &[5]);
        assert_eq!(relu(&x).to_vec_f32().unwrap(), vec![0.0, 0.0, 0.0, 0.5, 7.0]);
        assert_eq!(relu6(&x).to_vec_f32().unwrap(), vec![0.0, 0.0, 0.0, 0.5, 6.0]);
        assert_eq!(
            hardtanh(&x, -1.0, 1.0).unwrap().to_vec_f32().unwrap(),
            vec![-1.0, -0.5, 0.0, 0.5, 1.0]
        );
        assert_close(
            &leaky_relu(&x, 0.1).to_vec_f32().unwrap(),
            &[-0.7, -0.05, 0.0, 0.5, 7.0],
        );
        assert_eq!(
            threshold(&x, 0.1, 20.0).to_vec_f32().unwrap(),
            vec![20.0, 20.0, 20.0, 0.5, 7.0]
        );
    }

    #[test]
    fn test_shrinks() {
        let x = t(&[-1.0, -0.25, 0.25, 1.0], &[4]);
        assert_eq!(
            hardshrink(&x, 0.5).to_vec_f32().unwrap(),
            vec![-1.0, 0.0, 0.0, 1.0]
        );
        assert_eq!(
            softshrink(&x, 0.5).unwrap().to_vec_f32().unwrap(),
            vec![-0.5, 0.0, 0.0, 0.5]
        );
        assert!(softshrink(&x, -0.1).is_err());
    }

    #[test]
    fn test_argument_validation() {
        let x = t(&[1.0], &[1]);
        assert!(celu(&x, 0.0).is_err());
        assert!(hardtanh(&x, 1.0, -1.0).is_err());
        assert!(matches!(
            gelu(&x, "erf"),
            Err(ShimError::InvalidMode { op: "gelu", .. })
        ));
    }

    #[test]
    fn test_glu_halves() {
        let x = t(&[1.0, 2.0, 0.0, 0.0], &[1, 4]);
        let out = glu(&x, -1).unwrap();
        assert_eq!(out.shape(), &Shape::new(vec![1, 2]));
        assert_close(&out.to_vec_f32().unwrap(), &[0.5, 1.0]);
        assert!(glu(&t(&[1.0, 2.0, 3.0], &[3]), 0).is_err());
    }

    #[test]
    fn test_softmin_reverses_softmax() {
        let x = t(&[1.0, 2.0, 3.0], &[3]);
        let min = softmin(&x, 0).unwrap().to_vec_f32().unwrap();
        let max = softmax(&x, 0).unwrap().to_vec_f32().unwrap();
        assert_close(&min, &[max[2], max[1], max[0]]);
        let logp = log_softmax(&x, 0).unwrap().to_vec_f32().unwrap();
        let logmax: Vec<f32> = max.iter().map(|p| p.ln()).collect();
        assert_close(&logp, &logmax);
    }

    #[test]
    fn test_prelu_per_channel() {
        // [N=1, C=2, L=2]
        let x = t(&[-1.0, 1.0, -2.0, 2.0], &[1, 2, 2]);
        let w = t(&[0.5, 0.25], &[2]);
        assert_eq!(
            prelu(&x, &w).unwrap().to_vec_f32().unwrap(),
            vec![-0.5, 1.0, -0.5, 2.0]
        );
        let single = t(&[0.1], &[1]);
        assert_close(
            &prelu(&x, &single).unwrap().to_vec_f32().unwrap(),
            &[-0.1, 1.0, -0.2, 2.0],
        );
        let wrong = t(&[0.5, 0.25, 0.1], &[3]);
        assert!(matches!(
            prelu(&x, &wrong),
            Err(ShimError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_smooth_activations() {
        let x = t(&[0.0, 1.0], &[2]);
        assert_close(&sigmoid(&x).to_vec_f32().unwrap(), &[0.5, 0.731_058_6]);
        assert_close(&silu(&x).to_vec_f32().unwrap(), &[0.0, 0.731_058_6]);
        assert_close(&softsign(&x).to_vec_f32().unwrap(), &[0.0, 0.5]);
        assert_close(
            &softplus(&x, 1.0, 20.0).to_vec_f32().unwrap(),
            &[std::f32::consts::LN_2, 1.313_261_7],
        );
        assert_close(&elu(&t(&[-1.0], &[1]), 1.0).to_vec_f32().unwrap(), &[-0.632_120_56]);
    }

    #[test]
    fn test_normalize_norms() {
        let x = t(&[3.0, 4.0, 0.0, 0.0], &[2, 2]);
        assert_close(
            &normalize(&x, 2.0, 1, 1e-12).unwrap().to_vec_f32().unwrap(),
            &[0.6, 0.8, 0.0, 0.0],
        );
        let cols = normalize(&x, 2.0, 0, 1e-12).unwrap();
        assert_eq!(cols.shape(), &Shape::new(vec![2, 2]));
        assert_close(&cols.to_vec_f32().unwrap(), &[1.0, 1.0, 0.0, 0.0]);

        let v = t(&[1.0, -3.0], &[2]);
        assert_close(
            &normalize(&v, 1.0, 0, 1e-12).unwrap().to_vec_f32().unwrap(),
            &[0.25, -0.75],
        );
        assert_close(
            &normalize(&v, f32::INFINITY, -1, 1e-12).unwrap().to_vec_f32().unwrap(),
            &[1.0 / 3.0, -1.0],
        );
        // eps floors a tiny norm.
        let tiny = t(&[0.001], &[1]);
        assert_close(
            &normalize(&tiny, 2.0, 0, 0.1).unwrap().to_vec_f32().unwrap(),
            &[0.01],
        );
    }

    #[test]
    fn test_normalize_validation() {
        let x = t(&[1.0, 2.0], &[2]);
        assert!(normalize(&x, 0.0, 0, 1e-12).is_err());
        assert!(normalize(&x, f32::NAN, 0, 1e-12).is_err());
        assert!(matches!(
            normalize(&x, 2.0, 1, 1e-12),
            Err(ShimError::InvalidAxis { axis: 1, ndim: 1 })
        ));
    }

    #[test]
    fn test_local_response_norm_window() {
        // [N=1, C=3, L=1]; size 2 pads one zero channel in front.
        let x = t(&[1.0, 2.0, 3.0], &[1, 3, 1]);
        let out = local_response_norm(&x, 2, 1.0, 1.0, 1.0).unwrap();
        assert_eq!(out.shape(), &Shape::new(vec![1, 3, 1]));
        assert_close(&out.to_vec_f32().unwrap(), &[1.0 / 1.5, 2.0 / 3.5, 3.0 / 7.5]);

        // size 3 centres the window: sums 5, 14, 13.
        let out = local_response_norm(&x, 3, 3.0, 1.0, 0.0).unwrap();
        assert_close(&out.to_vec_f32().unwrap(), &[1.0 / 5.0, 2.0 / 14.0, 3.0 / 13.0]);
    }

    #[test]
    fn test_local_response_norm_4d_and_rank_check() {
        // [N=1, C=2, H=1, W=2]
        let x = t(&[1.0, 2.0, 3.0, 4.0], &[1, 2, 1, 2]);
        let out = local_response_norm(&x, 2, 2.0, 0.5, 1.0).unwrap();
        // Channel 0 sees only itself, channel 1 sees both.
        let want = [
            1.0 / 2.0f32.sqrt(),
            2.0 / 5.0f32.sqrt(),
            3.0 / 11.0f32.sqrt(),
            4.0 / 21.0f32.sqrt(),
        ];
        assert_close(&out.to_vec_f32().unwrap(), &want);
        assert!(matches!(
            local_response_norm(&t(&[1.0, 2.0], &[1, 2]), 2, 1e-4, 0.75, 1.0),
            Err(ShimError::RankMismatch { got: 2, .. })
        ));
        assert!(local_response_norm(&x, 0, 1e-4, 0.75, 1.0).is_err());
    }

    #[test]
    fn test_attention_weights_values() {
        let q = t(&[1.0, 0.0], &[1, 2]);
        let k = t(&[1.0, 0.0, 0.0, 1.0], &[2, 2]);
        let v = t(&[1.0, 2.0, 3.0, 4.0], &[2, 2]);
        let w0 = 1.0 / (1.0 + (-1.0 / 2.0f32.sqrt()).exp());
        let want = [w0 + 3.0 * (1.0 - w0), 2.0 * w0 + 4.0 * (1.0 - w0)];
        let out = scaled_dot_product_attention(&q, &k, &v, false, None).unwrap();
        assert_eq!(out.shape(), &Shape::new(vec![1, 2]));
        assert_close(&out.to_vec_f32().unwrap(), &want);

        // A zero scale weights every key equally.
        let flat = scaled_dot_product_attention(&q, &k, &v, false, Some(0.0)).unwrap();
        assert_close(&flat.to_vec_f32().unwrap(), &[2.0, 3.0]);
    }

    #[test]
    fn test_attention_causal_and_batched() {
        // [B=1, L=2, E=1]
        let q = t(&[1.0, 1.0], &[1, 2, 1]);
        let k = t(&[1.0, 1.0], &[1, 2, 1]);
        let v = t(&[10.0, 20.0], &[1, 2, 1]);
        let out = scaled_dot_product_attention(&q, &k, &v, true, None).unwrap();
        assert_eq!(out.shape(), &Shape::new(vec![1, 2, 1]));
        assert_close(&out.to_vec_f32().unwrap(), &[10.0, 15.0]);

        let wide = t(&[1.0, 1.0, 1.0, 1.0], &[1, 2, 2]);
        assert!(matches!(
            scaled_dot_product_attention(&q, &wide, &v, false, None),
            Err(ShimError::ShapeMismatch { .. })
        ));
    }
}
