//! DType promotion rules for mixing operands in stacks and binary ops.
//!
//! Floats beat integers, wider beats narrower, and mixing signed with
//! unsigned integers picks the smallest signed type holding both.

use shim_core::DType;

/// Promote two dtypes to a common result dtype.
///
/// Rules:
/// - Same dtype → same dtype
/// - Bool + X → X
/// - Float + Float → wider float; F16 + BF16 → F32
/// - Int + Float → the float type
/// - Int + Int of one signedness → wider int
/// - Signed + Unsigned → smallest signed int holding both
pub fn promote(a: DType, b: DType) -> DType {
    if a == b {
        return a;
    }
    match (a, b) {
        (DType::Bool, x) | (x, DType::Bool) => x,
        _ if a.is_float() && b.is_float() => {
            if a.size_bytes() == b.size_bytes() {
                // F16 and BF16 disagree on range and precision.
                DType::F32
            } else if a.size_bytes() > b.size_bytes() {
                a
            } else {
                b
            }
        }
        _ if a.is_float() => a,
        _ if b.is_float() => b,
        _ => promote_int(a, b),
    }
}

fn promote_int(a: DType, b: DType) -> DType {
    if a.is_signed_int() == b.is_signed_int() {
        return if a.size_bytes() >= b.size_bytes() { a } else { b };
    }
    let (signed, unsigned) = if a.is_signed_int() { (a, b) } else { (b, a) };
    if signed.size_bytes() > unsigned.size_bytes() {
        signed
    } else {
        match unsigned.size_bytes() * 2 {
            2 => DType::I16,
            4 => DType::I32,
            _ => DType::I64,
        }
    }
}

/// Common dtype of a non-empty list, folding [`promote`] left to right.
pub fn result_type(dtypes: &[DType]) -> Option<DType> {
    let (&first, rest) = dtypes.split_first()?;
    Some(rest.iter().fold(first, |acc, &d| promote(acc, d)))
}
