//! Recorded input/output pairs stored as JSON.
//!
//! Expected values were produced with NumPy and PyTorch. `null` in an
//! expected array stands for NaN, which JSON cannot spell.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use shim_core::backend::Stream;
use shim_core::{DType, Shape, Tensor};

const FIXTURE: &str = include_str!("../fixtures/golden.json");

/// Tensor data as it appears in a fixture.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TensorSpec {
    pub shape: Vec<i64>,
    pub data: Vec<f32>,
    #[serde(default = "default_dtype")]
    pub dtype: String,
}

fn default_dtype() -> String {
    DType::F32.to_string()
}

impl TensorSpec {
    pub fn dtype(&self) -> Option<DType> {
        DType::ALL.into_iter().find(|d| d.to_string() == self.dtype)
    }

    /// Materialize on `stream`; unknown dtype names fall back to `f32`.
    pub fn to_tensor(&self, stream: &Arc<Stream>) -> shim_core::Result<Tensor> {
        Tensor::from_data_on(
            stream,
            self.data.clone(),
            &Shape::new(self.shape.clone()),
            self.dtype().unwrap_or(DType::F32),
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Expected {
    pub shape: Vec<i64>,
    pub data: Vec<Option<f32>>,
}

impl Expected {
    /// Expected values with `null` mapped to NaN.
    pub fn values(&self) -> Vec<f32> {
        self.data.iter().map(|v| v.unwrap_or(f32::NAN)).collect()
    }
}

/// One recorded call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GoldenCase {
    pub name: String,
    pub op: String,
    pub input: TensorSpec,
    /// Second operand: indices, weights or comparison values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other: Option<TensorSpec>,
    /// Op arguments by their Python keyword names.
    #[serde(default)]
    pub params: serde_json::Value,
    pub expected: Expected,
}

pub fn load(json: &str) -> serde_json::Result<Vec<GoldenCase>> {
    serde_json::from_str(json)
}

/// The bundled fixture set.
pub fn cases() -> serde_json::Result<Vec<GoldenCase>> {
    load(FIXTURE)
}
