//! Window functions from `torch.signal`-style spectral helpers.

use std::f64::consts::PI;

use shim_core::{DType, Device, Result, Shape, ShimError, Tensor};

/// Evaluate `f(n, denom)` for each sample; periodic windows use one extra
/// point and drop it.
fn window(
    name: &str,
    window_length: i64,
    periodic: bool,
    device: &Device,
    f: impl Fn(f64, f64) -> f64,
) -> Result<Tensor> {
    if window_length < 0 {
        return Err(ShimError::InvalidArgument(format!(
            "{name} requires non-negative window_length, got {window_length}"
        )));
    }
    let len = window_length as usize;
    let data: Vec<f32> = match len {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => {
            let denom = if periodic { len } else { len - 1 } as f64;
            (0..len).map(|n| f(n as f64, denom) as f32).collect()
        }
    };
    Tensor::from_data(data, &Shape::new(vec![window_length]), DType::F32, device)
}

/// Triangular window peaking at 1 in the middle.
pub fn bartlett_window(window_length: i64, periodic: bool, device: &Device) -> Result<Tensor> {
    window("bartlett_window", window_length, periodic, device, |n, denom| {
        1.0 - (2.0 * n / denom - 1.0).abs()
    })
}

pub fn blackman_window(window_length: i64, periodic: bool, device: &Device) -> Result<Tensor> {
    window("blackman_window", window_length, periodic, device, |n, denom| {
        let phase = 2.0 * PI * n / denom;
        0.42 - 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos()
    })
}
