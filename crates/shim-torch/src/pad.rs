//! numpy-style `pad` entry point.

use shim_core::{Result, Tensor};
use shim_ops::{PadDispatch, PadOptions, PadWidth, check_pad};

use crate::pad_fallback::pad_fallback;

/// Pad `input` by `pad_width` according to `options`.
///
/// Requests the native kernel can serve become a single `Pad` node; all
/// others are composed from concat, gather and reduction nodes.
pub fn pad(input: &Tensor, pad_width: impl Into<PadWidth>, options: &PadOptions) -> Result<Tensor> {
    let pad_width = pad_width.into();
    match check_pad(input.shape(), &pad_width, options)? {
        PadDispatch::FastPath(native) => input.pad(&native.widths, native.mode, native.value),
        PadDispatch::Fallback(_) => {
            let widths = pad_width.resolve(input.ndim())?;
            pad_fallback(input, &widths, options)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shim_core::graph::OpKind;
    use shim_core::{DType, Device, Shape};
    use shim_ops::{PadMode, ReflectType};

    fn t(data: &[f32], dims: &[i64]) -> Tensor {
        Tensor::from_f32(data, &Shape::new(dims.to_vec()), &Device::Cpu).unwrap()
    }

    fn is_native_pad(out: &Tensor) -> bool {
        let node = out.stream().get_node(out.node_id()).unwrap();
        matches!(node.op, OpKind::Pad { .. })
    }

    #[test]
    fn test_constant_scalar_goes_native() {
        let x = t(&[1.0, 2.0, 3.0, 4.0], &[2, 2]);
        let out = pad(&x, vec![(1, 1), (0, 0)], &PadOptions::default()).unwrap();
        assert!(is_native_pad(&out));
        assert_eq!(
            out.to_vec_f32().unwrap(),
            vec![0.0, 0.0, 1.0, 2.0, 3.0, 4.0, 0.0, 0.0]
        );
    }

    #[test]
    fn test_uniform_width_reflect_falls_back() {
        let x = t(&[1.0, 2.0, 3.0], &[3]);
        let out = pad(&x, 1usize, &PadOptions::new(PadMode::Reflect)).unwrap();
        assert!(!is_native_pad(&out));
        assert_eq!(out.to_vec_f32().unwrap(), vec![2.0, 1.0, 2.0, 3.0, 2.0]);
    }

    #[test]
    fn test_native_and_fallback_agree() {
        let x = t(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]);
        for mode in [PadMode::Reflect, PadMode::Symmetric] {
            let native = pad(&x, vec![(1, 1), (2, 1)], &PadOptions::new(mode)).unwrap();
            assert!(is_native_pad(&native));
            let composed = pad_fallback(&x, &[(1, 1), (2, 1)], &PadOptions::new(mode)).unwrap();
            assert_eq!(native.to_vec_f32().unwrap(), composed.to_vec_f32().unwrap());
        }
    }

    #[test]
    fn test_odd_reflect_routes_to_fallback() {
        let x = t(&[1.0, 2.0, 4.0], &[3]);
        let opts = PadOptions::new(PadMode::Reflect).reflect_type(ReflectType::Odd);
        let out = pad(&x, vec![(1, 1)], &opts).unwrap();
        assert_eq!(out.to_vec_f32().unwrap(), vec![0.0, 1.0, 2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_integer_constant_is_truncated() {
        let x = Tensor::from_data(vec![1.0, 2.0], &Shape::new(vec![2]), DType::I32, &Device::Cpu)
            .unwrap();
        let out = pad(&x, vec![(1, 1)], &PadOptions::default().constant_values(2.5)).unwrap();
        assert!(is_native_pad(&out));
        assert_eq!(out.dtype(), DType::I32);
        assert_eq!(out.to_vec_f32().unwrap(), vec![2.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn test_mirror_modes_need_a_pair_per_axis() {
        let x = t(&[1.0; 12], &[3, 4]);
        assert!(pad(&x, vec![(1, 1)], &PadOptions::new(PadMode::Reflect)).is_err());
        let out = pad(&x, vec![(1, 1)], &PadOptions::default()).unwrap();
        assert_eq!(out.shape(), &Shape::new(vec![5, 6]));
    }

    #[test]
    fn test_bad_width_list_is_error() {
        let x = t(&[1.0; 8], &[2, 2, 2]);
        assert!(pad(&x, vec![(1, 1), (1, 1)], &PadOptions::default()).is_err());
    }
}
