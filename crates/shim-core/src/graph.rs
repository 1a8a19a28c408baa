//! Graph IR: an append-only arena of op nodes.
//!
//! Op parameters that hold floats are stored through [`Scalar`] so that
//! nodes can be hashed for common-subexpression elimination.

use crate::types::{DType, Shape};
use smallvec::SmallVec;
use std::hash::{Hash, Hasher};

/// Unique identifier for a node in the computation graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u64);

/// Metadata about a tensor (known before materialization).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TensorMeta {
    pub shape: Shape,
    pub dtype: DType,
}

impl TensorMeta {
    pub fn new(shape: Shape, dtype: DType) -> Self {
        Self { shape, dtype }
    }
}

/// A node in the lazy computation graph.
#[derive(Clone, Debug)]
pub struct Node {
    pub id: NodeId,
    pub op: OpKind,
    pub inputs: SmallVec<[NodeId; 2]>,
    pub meta: TensorMeta,
}

/// An `f32` op parameter compared and hashed by bit pattern, so ops carrying
/// it can key the CSE tables.
#[derive(Clone, Copy, Debug, Default)]
pub struct Scalar(pub f32);

impl Scalar {
    pub fn get(self) -> f32 {
        self.0
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Scalar {}

impl Hash for Scalar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl From<f32> for Scalar {
    fn from(v: f32) -> Self {
        Scalar(v)
    }
}

/// Padding modes the backend implements natively.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NativePadMode {
    /// Fill with a single scalar.
    Constant,
    /// Mirror about the edge element, which is not repeated.
    Reflect,
    /// Mirror including the edge element.
    Symmetric,
}

/// Element-wise unary functions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Abs,
    Exp,
    Log,
    Sqrt,
    /// Round half to even.
    Round,
    Relu,
    Relu6,
    Sigmoid,
    LogSigmoid,
    Tanh,
    Tanhshrink,
    Softsign,
    Silu,
    Mish,
    /// `tanh` selects the tanh approximation, otherwise the erf form.
    Gelu {
        tanh: bool,
    },
    Selu,
    Hardsigmoid,
    Hardswish,
    /// Modified Bessel function of the first kind, order 0.
    BesselI0,
    Elu {
        alpha: Scalar,
    },
    Celu {
        alpha: Scalar,
    },
    LeakyRelu {
        slope: Scalar,
    },
    Hardtanh {
        min: Scalar,
        max: Scalar,
    },
    Hardshrink {
        lambd: Scalar,
    },
    Softshrink {
        lambd: Scalar,
    },
    Softplus {
        beta: Scalar,
        threshold: Scalar,
    },
    Threshold {
        threshold: Scalar,
        value: Scalar,
    },
    Clip {
        min: Scalar,
        max: Scalar,
    },
    /// `x` raised to a fixed power.
    Pow {
        exponent: Scalar,
    },
}

/// The set of operations supported by the graph IR.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
    // ── Sources ─────────────────────────────────────────────────────────
    /// Constant tensor (data already materialized).
    Constant,

    // ── Elementwise ─────────────────────────────────────────────────────
    Add,
    Sub,
    Mul,
    Div,
    Maximum,
    Minimum,
    /// Inputs: [x1, x2] of equal shape. 0 below zero, x2 at zero, 1 above.
    Heaviside,
    /// Inputs: [x, weight] of equal shape. x where positive, weight * x otherwise.
    Prelu,
    Unary(UnaryOp),
    /// Convert values to the output dtype: integers truncate toward zero,
    /// then saturate ([`DType::saturate`]) or wrap ([`DType::wrap`]).
    AsType { wrapping: bool },

    // ── Reductions (reduced axis is removed) ────────────────────────────
    Sum {
        axis: Option<i32>,
    },
    Mean {
        axis: Option<i32>,
    },
    Max {
        axis: Option<i32>,
    },
    Min {
        axis: Option<i32>,
    },
    /// Even extents average the two middle values.
    Median {
        axis: Option<i32>,
    },

    // ── Shape manipulation ──────────────────────────────────────────────
    Reshape {
        new_shape: Shape,
    },
    Transpose {
        axes: Option<Vec<usize>>,
    },
    /// Broadcast a tensor to a target shape (numpy-style rules).
    Broadcast {
        target_shape: Shape,
    },
    Flip {
        axes: Vec<usize>,
    },
    /// Join all inputs along `axis`.
    Concatenate {
        axis: usize,
    },
    /// Half-open range `[start, end)` along `axis`.
    Slice {
        axis: usize,
        start: usize,
        end: usize,
    },

    // ── Indexing ────────────────────────────────────────────────────────
    /// Inputs: [x, indices(1-D)]. Selects whole slabs along `axis`.
    Take {
        axis: usize,
    },
    /// Inputs: [x, indices] of equal rank. Negative indices count from the end.
    TakeAlongAxis {
        axis: usize,
    },
    /// Rewrites every value outside `[0, extent)` to -1.
    MaskOutOfRange {
        extent: i64,
    },
    /// Stable ascending sort permutation along `axis`, NaN last.
    ArgSort {
        axis: usize,
    },
    Pad {
        widths: Vec<(usize, usize)>,
        mode: NativePadMode,
        value: Scalar,
    },

    // ── Activations ─────────────────────────────────────────────────────
    Softmax {
        axis: i32,
    },
    LogSoftmax {
        axis: i32,
    },
}

impl OpKind {
    /// Whether identical (op, inputs, meta) triples may share one node.
    pub fn is_cse_eligible(&self) -> bool {
        !matches!(self, OpKind::Constant)
    }

    /// Short name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            OpKind::Constant => "constant",
            OpKind::Add => "add",
            OpKind::Sub => "sub",
            OpKind::Mul => "mul",
            OpKind::Div => "div",
            OpKind::Maximum => "maximum",
            OpKind::Minimum => "minimum",
            OpKind::Heaviside => "heaviside",
            OpKind::Prelu => "prelu",
            OpKind::Unary(_) => "unary",
            OpKind::AsType { .. } => "astype",
            OpKind::Sum { .. } => "sum",
            OpKind::Mean { .. } => "mean",
            OpKind::Max { .. } => "max",
            OpKind::Min { .. } => "min",
            OpKind::Median { .. } => "median",
            OpKind::Reshape { .. } => "reshape",
            OpKind::Transpose { .. } => "transpose",
            OpKind::Broadcast { .. } => "broadcast",
            OpKind::Flip { .. } => "flip",
            OpKind::Concatenate { .. } => "concatenate",
            OpKind::Slice { .. } => "slice",
            OpKind::Take { .. } => "take",
            OpKind::TakeAlongAxis { .. } => "take_along_axis",
            OpKind::MaskOutOfRange { .. } => "mask_out_of_range",
            OpKind::ArgSort { .. } => "argsort",
            OpKind::Pad { .. } => "pad",
            OpKind::Softmax { .. } => "softmax",
            OpKind::LogSoftmax { .. } => "log_softmax",
        }
    }
}

/// The computation graph arena.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    next_id: u64,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node and return its ID.
    pub fn add_node(
        &mut self,
        op: OpKind,
        inputs: SmallVec<[NodeId; 2]>,
        meta: TensorMeta,
    ) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.push(Node {
            id,
            op,
            inputs,
            meta,
        });
        id
    }

    /// Get a node by ID.
    ///
    /// Ids are handed out densely, so the node sits at its id's position.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize).filter(|n| n.id == id)
    }

    /// Topological sort of the graph rooted at `outputs`.
    pub fn topo_sort(&self, outputs: &[NodeId]) -> Vec<NodeId> {
        let mut visited = std::collections::HashSet::new();
        let mut order = Vec::new();

        for &out in outputs {
            self.topo_visit(out, &mut visited, &mut order);
        }

        order
    }

    fn topo_visit(
        &self,
        id: NodeId,
        visited: &mut std::collections::HashSet<NodeId>,
        order: &mut Vec<NodeId>,
    ) {
        if !visited.insert(id) {
            return;
        }
        if let Some(node) = self.get(id) {
            for &input in &node.inputs {
                self.topo_visit(input, visited, order);
            }
        }
        order.push(id);
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
