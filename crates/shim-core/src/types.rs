//! Core type definitions: DType, Shape.

/// Supported data types for tensor elements.
///
/// The dtype is a tag carried alongside the data; the CPU backend stores
/// every element as `f32`. Unsigned types wider than 16 bits are left out
/// because their maxima do not survive the trip through `f32`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    F16,
    BF16,
    F32,
    F64,
}

impl DType {
    /// All dtypes, narrowest integer first.
    pub const ALL: [DType; 11] = [
        DType::Bool,
        DType::I8,
        DType::I16,
        DType::I32,
        DType::I64,
        DType::U8,
        DType::U16,
        DType::F16,
        DType::BF16,
        DType::F32,
        DType::F64,
    ];

    /// Size in bytes of a single element.
    pub fn size_bytes(self) -> usize {
        match self {
            DType::Bool | DType::I8 | DType::U8 => 1,
            DType::I16 | DType::U16 | DType::F16 | DType::BF16 => 2,
            DType::I32 | DType::F32 => 4,
            DType::I64 | DType::F64 => 8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, DType::F16 | DType::BF16 | DType::F32 | DType::F64)
    }

    pub fn is_signed_int(self) -> bool {
        matches!(self, DType::I8 | DType::I16 | DType::I32 | DType::I64)
    }

    pub fn is_unsigned_int(self) -> bool {
        matches!(self, DType::U8 | DType::U16)
    }

    /// Integer of either signedness (bool excluded).
    pub fn is_integer(self) -> bool {
        self.is_signed_int() || self.is_unsigned_int()
    }

    /// Largest finite value representable by this dtype.
    pub fn max_value(self) -> f32 {
        match self {
            DType::Bool => 1.0,
            DType::I8 => i8::MAX as f32,
            DType::I16 => i16::MAX as f32,
            DType::I32 => i32::MAX as f32,
            DType::I64 => i64::MAX as f32,
            DType::U8 => u8::MAX as f32,
            DType::U16 => u16::MAX as f32,
            DType::F16 => 65504.0,
            DType::BF16 | DType::F32 | DType::F64 => f32::MAX,
        }
    }

    /// Smallest finite value representable by this dtype.
    pub fn min_value(self) -> f32 {
        match self {
            DType::Bool | DType::U8 | DType::U16 => 0.0,
            DType::I8 => i8::MIN as f32,
            DType::I16 => i16::MIN as f32,
            DType::I32 => i32::MIN as f32,
            DType::I64 => i64::MIN as f32,
            DType::F16 => -65504.0,
            DType::BF16 | DType::F32 | DType::F64 => f32::MIN,
        }
    }

    /// Convert a value into this dtype's domain the way `astype` does.
    ///
    /// Integers truncate toward zero and saturate at the dtype's bounds; NaN
    /// becomes 0. Bool maps non-zero to 1. Floats pass through.
    pub fn saturate(self, x: f32) -> f32 {
        if self == DType::Bool {
            return if x != 0.0 { 1.0 } else { 0.0 };
        }
        if self.is_integer() {
            if x.is_nan() {
                return 0.0;
            }
            return x.trunc().clamp(self.min_value(), self.max_value());
        }
        x
    }

    /// Like [`saturate`](Self::saturate), but integers wrap modulo
    /// `2^bits` as fixed-width integer arithmetic does.
    ///
    /// `I64` saturates since its range exceeds what `f32` storage can wrap.
    pub fn wrap(self, x: f32) -> f32 {
        if !self.is_integer() || self == DType::I64 || !x.is_finite() {
            return self.saturate(x);
        }
        let modulus = 1i64 << (8 * self.size_bytes());
        let low = self.min_value() as i64;
        ((x.trunc() as i64 - low).rem_euclid(modulus) + low) as f32
    }

    /// Placeholder written into gathered positions that fell out of bounds.
    ///
    /// NaN for floats, the maximum for unsigned integers and the minimum for
    /// signed integers. Bool has no out-of-domain value.
    pub fn fill_sentinel(self) -> Option<f32> {
        if self.is_float() {
            Some(f32::NAN)
        } else if self.is_unsigned_int() {
            Some(self.max_value())
        } else if self.is_signed_int() {
            Some(self.min_value())
        } else {
            None
        }
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DType::Bool => "bool",
            DType::I8 => "i8",
            DType::I16 => "i16",
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::U8 => "u8",
            DType::U16 => "u16",
            DType::F16 => "f16",
            DType::BF16 => "bf16",
            DType::F32 => "f32",
            DType::F64 => "f64",
        };
        f.write_str(name)
    }
}

/// Tensor shape (dimensions).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Shape(pub Vec<i64>);

impl Shape {
    pub fn new(dims: impl Into<Vec<i64>>) -> Self {
        Self(dims.into())
    }

    /// Build from unsigned extents.
    pub fn from_usize(dims: &[usize]) -> Self {
        Self(dims.iter().map(|&d| d as i64).collect())
    }

    /// Scalar (rank-0) shape.
    pub fn scalar() -> Self {
        Self(vec![])
    }

    /// Number of dimensions (rank).
    pub fn ndim(&self) -> usize {
        self.0.len()
    }

    /// Total number of elements.
    pub fn numel(&self) -> i64 {
        self.0.iter().product()
    }

    /// Dimensions as `usize` extents.
    pub fn dims(&self) -> Vec<usize> {
        self.0.iter().map(|&d| d.max(0) as usize).collect()
    }

    /// Get dimension at axis (supports negative indexing).
    pub fn dim(&self, axis: i32) -> Option<i64> {
        self.resolve_axis(axis).map(|ax| self.0[ax])
    }

    /// Normalize a possibly negative axis against this rank.
    pub fn resolve_axis(&self, axis: i32) -> Option<usize> {
        let ndim = self.0.len() as i32;
        let idx = if axis < 0 { ndim + axis } else { axis };
        if idx >= 0 && idx < ndim {
            Some(idx as usize)
        } else {
            None
        }
    }

    /// Row-major strides, in elements.
    pub fn strides(&self) -> Vec<usize> {
        let dims = self.dims();
        let mut strides = vec![1usize; dims.len()];
        for i in (0..dims.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * dims[i + 1];
        }
        strides
    }

    /// Copy of this shape with `axis` resized to `extent`.
    pub fn with_dim(&self, axis: usize, extent: i64) -> Shape {
        let mut dims = self.0.clone();
        dims[axis] = extent;
        Shape(dims)
    }

    /// Compute the broadcast shape of two shapes, or None if incompatible.
    pub fn broadcast_shapes(a: &Shape, b: &Shape) -> Option<Shape> {
        let a_dims = &a.0;
        let b_dims = &b.0;
        let max_ndim = a_dims.len().max(b_dims.len());

        let mut result = Vec::with_capacity(max_ndim);

        for i in 0..max_ndim {
            let da = if i < a_dims.len() {
                a_dims[a_dims.len() - 1 - i]
            } else {
                1
            };
            let db = if i < b_dims.len() {
                b_dims[b_dims.len() - 1 - i]
            } else {
                1
            };

            if da == db {
                result.push(da);
            } else if da == 1 {
                result.push(db);
            } else if db == 1 {
                result.push(da);
            } else {
                return None;
            }
        }

        result.reverse();
        Some(Shape::new(result))
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{d}")?;
        }
        write!(f, "]")
    }
}

impl From<&[i64]> for Shape {
    fn from(dims: &[i64]) -> Self {
        Shape(dims.to_vec())
    }
}
