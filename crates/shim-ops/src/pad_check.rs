//! Pad argument model and the fast-path validator.
//!
//! [`check_pad`] decides whether a pad request can run as a single native
//! `Pad` node or has to be composed from several graph ops. The decision is
//! a pure function of the input shape and the arguments.

use std::fmt;
use std::str::FromStr;

use shim_core::{NativePadMode, Shape, ShimError};

use crate::ShapeError;

/// Pad widths: one amount for every side of every axis, or explicit
/// `(before, after)` pairs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PadWidth {
    Uniform(usize),
    PerAxis(Vec<(usize, usize)>),
}

impl PadWidth {
    /// Expand to one `(before, after)` pair per axis.
    ///
    /// A single pair applies to every axis; any other length must match `ndim`.
    pub fn resolve(&self, ndim: usize) -> Result<Vec<(usize, usize)>, ShapeError> {
        match self {
            PadWidth::Uniform(n) => Ok(vec![(*n, *n); ndim]),
            PadWidth::PerAxis(pairs) if pairs.len() == 1 => Ok(vec![pairs[0]; ndim]),
            PadWidth::PerAxis(pairs) if pairs.len() == ndim => Ok(pairs.clone()),
            PadWidth::PerAxis(pairs) => Err(ShapeError::InvalidPadWidth(format!(
                "{} (before, after) pairs for an array of rank {ndim}",
                pairs.len()
            ))),
        }
    }
}

impl From<usize> for PadWidth {
    fn from(n: usize) -> Self {
        PadWidth::Uniform(n)
    }
}

impl From<Vec<(usize, usize)>> for PadWidth {
    fn from(pairs: Vec<(usize, usize)>) -> Self {
        PadWidth::PerAxis(pairs)
    }
}

impl From<&[(usize, usize)]> for PadWidth {
    fn from(pairs: &[(usize, usize)]) -> Self {
        PadWidth::PerAxis(pairs.to_vec())
    }
}

/// Scalar or arbitrarily nested fill values (`constant_values`, `end_values`).
#[derive(Clone, Debug, PartialEq)]
pub enum PadValue {
    Scalar(f32),
    Seq(Vec<PadValue>),
}

impl PadValue {
    /// Resolve numpy-style into one `(before, after)` value pair per axis.
    ///
    /// Accepted layouts: `v`, `[v]`, `[before, after]`, `[[before, after]]`
    /// and one `[before, after]` pair per axis. Pairs may be `[v]` too.
    pub fn per_axis(&self, ndim: usize) -> Result<Vec<(f32, f32)>, ShapeError> {
        let pair = |v: &PadValue| -> Result<(f32, f32), ShapeError> {
            match v {
                PadValue::Scalar(x) => Ok((*x, *x)),
                PadValue::Seq(items) => match items.as_slice() {
                    [PadValue::Scalar(x)] => Ok((*x, *x)),
                    [PadValue::Scalar(b), PadValue::Scalar(a)] => Ok((*b, *a)),
                    _ => Err(ShapeError::InvalidPadWidth(format!(
                        "expected a (before, after) value pair, got {v:?}"
                    ))),
                },
            }
        };
        match self {
            PadValue::Scalar(x) => Ok(vec![(*x, *x); ndim]),
            PadValue::Seq(items) if items.iter().all(|i| matches!(i, PadValue::Scalar(_))) => {
                Ok(vec![pair(self)?; ndim])
            }
            PadValue::Seq(items) if items.len() == 1 => Ok(vec![pair(&items[0])?; ndim]),
            PadValue::Seq(items) if items.len() == ndim => items.iter().map(pair).collect(),
            PadValue::Seq(items) => Err(ShapeError::InvalidPadWidth(format!(
                "{} value pairs for an array of rank {ndim}",
                items.len()
            ))),
        }
    }
}

impl From<f32> for PadValue {
    fn from(v: f32) -> Self {
        PadValue::Scalar(v)
    }
}

impl From<Vec<f32>> for PadValue {
    fn from(vs: Vec<f32>) -> Self {
        PadValue::Seq(vs.into_iter().map(PadValue::Scalar).collect())
    }
}

impl From<Vec<(f32, f32)>> for PadValue {
    fn from(pairs: Vec<(f32, f32)>) -> Self {
        PadValue::Seq(
            pairs
                .into_iter()
                .map(|(b, a)| PadValue::Seq(vec![PadValue::Scalar(b), PadValue::Scalar(a)]))
                .collect(),
        )
    }
}

/// All numpy pad modes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PadMode {
    Constant,
    Reflect,
    Symmetric,
    LinearRamp,
    Maximum,
    Mean,
    Median,
    Minimum,
    Edge,
    Wrap,
    Empty,
}

const VALID_PAD_MODES: &str =
    "constant, reflect, symmetric, linear_ramp, maximum, mean, median, minimum, edge, wrap, empty";

impl PadMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PadMode::Constant => "constant",
            PadMode::Reflect => "reflect",
            PadMode::Symmetric => "symmetric",
            PadMode::LinearRamp => "linear_ramp",
            PadMode::Maximum => "maximum",
            PadMode::Mean => "mean",
            PadMode::Median => "median",
            PadMode::Minimum => "minimum",
            PadMode::Edge => "edge",
            PadMode::Wrap => "wrap",
            PadMode::Empty => "empty",
        }
    }

    /// The native kernel's counterpart, if there is one.
    pub fn native(self) -> Option<NativePadMode> {
        match self {
            PadMode::Constant => Some(NativePadMode::Constant),
            PadMode::Reflect => Some(NativePadMode::Reflect),
            PadMode::Symmetric => Some(NativePadMode::Symmetric),
            _ => None,
        }
    }
}

impl fmt::Display for PadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PadMode {
    type Err = ShimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "constant" => PadMode::Constant,
            "reflect" => PadMode::Reflect,
            "symmetric" => PadMode::Symmetric,
            "linear_ramp" => PadMode::LinearRamp,
            "maximum" => PadMode::Maximum,
            "mean" => PadMode::Mean,
            "median" => PadMode::Median,
            "minimum" => PadMode::Minimum,
            "edge" => PadMode::Edge,
            "wrap" => PadMode::Wrap,
            "empty" => PadMode::Empty,
            other => {
                return Err(ShimError::InvalidMode {
                    op: "pad",
                    mode: other.to_string(),
                    valid: VALID_PAD_MODES,
                });
            }
        })
    }
}

/// How `reflect` and `symmetric` treat the mirrored values.
///
/// `Odd` subtracts the mirrored value from twice the edge value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReflectType {
    #[default]
    Even,
    Odd,
}

impl FromStr for ReflectType {
    type Err = ShimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "even" => Ok(ReflectType::Even),
            "odd" => Ok(ReflectType::Odd),
            other => Err(ShimError::InvalidMode {
                op: "pad",
                mode: other.to_string(),
                valid: "even, odd",
            }),
        }
    }
}

/// Mode and mode-specific keyword arguments of a pad request.
#[derive(Clone, Debug, PartialEq)]
pub struct PadOptions {
    pub mode: PadMode,
    pub constant_values: PadValue,
    pub end_values: PadValue,
    /// Number of edge values the statistic modes look at; `None` uses the whole axis.
    pub stat_length: Option<PadWidth>,
    pub reflect_type: ReflectType,
}

impl Default for PadOptions {
    fn default() -> Self {
        Self {
            mode: PadMode::Constant,
            constant_values: PadValue::Scalar(0.0),
            end_values: PadValue::Scalar(0.0),
            stat_length: None,
            reflect_type: ReflectType::Even,
        }
    }
}

impl PadOptions {
    pub fn new(mode: PadMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn constant_values(mut self, v: impl Into<PadValue>) -> Self {
        self.constant_values = v.into();
        self
    }

    pub fn end_values(mut self, v: impl Into<PadValue>) -> Self {
        self.end_values = v.into();
        self
    }

    pub fn stat_length(mut self, w: impl Into<PadWidth>) -> Self {
        self.stat_length = Some(w.into());
        self
    }

    pub fn reflect_type(mut self, t: ReflectType) -> Self {
        self.reflect_type = t;
        self
    }
}

/// Arguments for a single native `Pad` node.
#[derive(Clone, Debug, PartialEq)]
pub struct NativePad {
    pub widths: Vec<(usize, usize)>,
    pub mode: NativePadMode,
    pub value: f32,
}

/// Why a request cannot use the native kernel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FallbackReason {
    /// `constant_values` holds more than one distinct value, or none.
    NonUniformConstant,
    /// The mode has no native kernel.
    UnsupportedMode(PadMode),
    /// `reflect`/`symmetric` given a plain integer width.
    UniformWidth,
    /// A width is larger than the mirror source on `axis`.
    ExceedsExtent { axis: usize },
    /// Odd reflection is not mirrored natively.
    OddReflection,
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::NonUniformConstant => f.write_str("constant values are not uniform"),
            FallbackReason::UnsupportedMode(m) => write!(f, "mode '{m}' has no native kernel"),
            FallbackReason::UniformWidth => f.write_str("integer pad width"),
            FallbackReason::ExceedsExtent { axis } => {
                write!(f, "pad width exceeds the mirror source on axis {axis}")
            }
            FallbackReason::OddReflection => f.write_str("odd reflection"),
        }
    }
}

/// Outcome of [`check_pad`].
#[derive(Clone, Debug, PartialEq)]
pub enum PadDispatch {
    FastPath(NativePad),
    Fallback(FallbackReason),
}

impl PadDispatch {
    pub fn is_fast_path(&self) -> bool {
        matches!(self, PadDispatch::FastPath(_))
    }
}

/// Collapse nested fill values to one scalar.
///
/// Returns `(Some(v), true)` when every leaf equals `v` and `(None, false)`
/// when the leaves differ or there are none.
pub fn collapse_constant(value: &PadValue) -> (Option<f32>, bool) {
    match value {
        PadValue::Scalar(v) => (Some(*v), true),
        PadValue::Seq(items) => {
            let mut common: Option<f32> = None;
            for item in items {
                let (Some(v), true) = collapse_constant(item) else {
                    return (None, false);
                };
                match common {
                    None => common = Some(v),
                    Some(c) if c == v || (c.is_nan() && v.is_nan()) => {}
                    Some(_) => return (None, false),
                }
            }
            match common {
                Some(v) => (Some(v), true),
                None => (None, false),
            }
        }
    }
}

/// Decide between the native kernel and the composed fallback.
///
/// Errors only when the pad width cannot be matched to the array's rank.
/// A single `(before, after)` pair stands for every axis in `constant` mode
/// only; other modes need exactly one pair per axis.
pub fn check_pad(
    shape: &Shape,
    pad_width: &PadWidth,
    options: &PadOptions,
) -> Result<PadDispatch, ShapeError> {
    if options.mode != PadMode::Constant
        && let PadWidth::PerAxis(pairs) = pad_width
        && pairs.len() != shape.ndim()
    {
        return Err(ShapeError::InvalidPadWidth(format!(
            "mode '{}' needs {} (before, after) pairs, got {}",
            options.mode,
            shape.ndim(),
            pairs.len()
        )));
    }
    let widths = pad_width.resolve(shape.ndim())?;
    let dispatch = decide(shape, pad_width, widths, options);
    match &dispatch {
        PadDispatch::FastPath(native) => {
            tracing::debug!(mode = %options.mode, native = ?native.mode, "pad fast path");
        }
        PadDispatch::Fallback(reason) => {
            tracing::debug!(mode = %options.mode, %reason, "pad fallback");
        }
    }
    Ok(dispatch)
}

fn decide(
    shape: &Shape,
    pad_width: &PadWidth,
    widths: Vec<(usize, usize)>,
    options: &PadOptions,
) -> PadDispatch {
    let Some(native) = options.mode.native() else {
        return PadDispatch::Fallback(FallbackReason::UnsupportedMode(options.mode));
    };

    if native == NativePadMode::Constant {
        return match collapse_constant(&options.constant_values) {
            (Some(value), true) => PadDispatch::FastPath(NativePad {
                widths,
                mode: native,
                value,
            }),
            _ => PadDispatch::Fallback(FallbackReason::NonUniformConstant),
        };
    }

    if matches!(pad_width, PadWidth::Uniform(_)) {
        return PadDispatch::Fallback(FallbackReason::UniformWidth);
    }
    if options.reflect_type == ReflectType::Odd {
        return PadDispatch::Fallback(FallbackReason::OddReflection);
    }
    for (axis, (&(before, after), &extent)) in widths.iter().zip(shape.0.iter()).enumerate() {
        let extent = extent.max(0) as usize;
        let limit = match native {
            NativePadMode::Reflect => extent.saturating_sub(1),
            _ => extent,
        };
        if before > limit || after > limit {
            return PadDispatch::Fallback(FallbackReason::ExceedsExtent { axis });
        }
    }
    PadDispatch::FastPath(NativePad {
        widths,
        mode: native,
        value: 0.0,
    })
}
