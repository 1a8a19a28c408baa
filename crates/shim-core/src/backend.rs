//! Evaluation engine: the `Backend` trait and the `Stream` that drives it.
//!
//! Tensors only append nodes to a stream's graph. A stream materializes a
//! node by walking its dependencies in topological order and handing each
//! pending node, with its inputs already computed, to the backend.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, LazyLock, Mutex};

use smallvec::SmallVec;

use crate::config::RuntimeConfig;
use crate::graph::{Graph, Node, NodeId, OpKind, TensorMeta};
use crate::types::{DType, Shape};
use crate::{Result, ShimError};

/// Identity of a pure op for common-subexpression elimination.
#[derive(Clone, PartialEq, Eq, Hash)]
struct OpKey {
    op: OpKind,
    inputs: SmallVec<[NodeId; 2]>,
    meta: TensorMeta,
}

/// Identity of a constant: metadata plus a digest of the payload bits.
#[derive(Clone, PartialEq, Eq, Hash)]
struct ConstKey {
    meta: TensorMeta,
    digest: u64,
}

impl ConstKey {
    fn new(meta: &TensorMeta, data: &[f32]) -> Self {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        data.len().hash(&mut hasher);
        data.iter().for_each(|v| v.to_bits().hash(&mut hasher));
        Self {
            meta: meta.clone(),
            digest: hasher.finish(),
        }
    }
}

fn same_bits(a: &[f32], b: &[f32]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
}

/// A computed input as seen by a kernel.
pub struct NodeInput<'a> {
    pub data: &'a [f32],
    pub shape: &'a Shape,
    pub dtype: DType,
}

/// Kernel dispatch for one node at a time.
///
/// Scheduling and buffer ownership stay with [`Stream`].
pub trait Backend: Send + Sync {
    fn eval_node(
        &self,
        op: &OpKind,
        inputs: &[NodeInput<'_>],
        output_meta: &TensorMeta,
    ) -> Result<Vec<f32>>;
}

/// A lazy graph bound to one backend.
///
/// Graph, buffers and CSE tables sit behind separate mutexes; evaluation
/// never holds the graph lock and the buffer lock at the same time.
pub struct Stream {
    graph: Mutex<Graph>,
    backend: Box<dyn Backend>,
    config: RuntimeConfig,
    buffers: Mutex<HashMap<NodeId, Vec<f32>>>,
    op_table: Mutex<HashMap<OpKey, NodeId>>,
    const_table: Mutex<HashMap<ConstKey, NodeId>>,
}

impl Stream {
    /// A stream configured from `SHIM_*` environment variables.
    pub fn new(backend: Box<dyn Backend>) -> Self {
        Self::with_config(backend, RuntimeConfig::from_env())
    }

    pub fn with_config(backend: Box<dyn Backend>, config: RuntimeConfig) -> Self {
        Self {
            graph: Mutex::new(Graph::new()),
            backend,
            config,
            buffers: Mutex::new(HashMap::new()),
            op_table: Mutex::new(HashMap::new()),
            const_table: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> RuntimeConfig {
        self.config
    }

    /// Add a node whose data is already known.
    ///
    /// With CSE on, a constant bit-identical to an earlier one with the same
    /// metadata returns the earlier node.
    pub fn add_constant(&self, data: Vec<f32>, meta: TensorMeta) -> NodeId {
        let key = self.config.cse.then(|| ConstKey::new(&meta, &data));
        let mut table = self.const_table.lock().unwrap();
        if let Some(existing) = key.as_ref().and_then(|k| table.get(k).copied()) {
            let buffers = self.buffers.lock().unwrap();
            // Digest hit; compare payloads before reusing.
            if buffers.get(&existing).is_some_and(|old| same_bits(old, &data)) {
                return existing;
            }
        }

        let id = self
            .graph
            .lock()
            .unwrap()
            .add_node(OpKind::Constant, SmallVec::new(), meta);
        self.buffers.lock().unwrap().insert(id, data);
        if let Some(key) = key {
            table.insert(key, id);
        }
        id
    }

    /// Add an op node, reusing an identical pure node when CSE is on.
    pub fn add_op(&self, op: OpKind, inputs: SmallVec<[NodeId; 2]>, meta: TensorMeta) -> NodeId {
        if !(self.config.cse && op.is_cse_eligible()) {
            return self.graph.lock().unwrap().add_node(op, inputs, meta);
        }
        let key = OpKey {
            op: op.clone(),
            inputs: inputs.clone(),
            meta: meta.clone(),
        };
        let mut table = self.op_table.lock().unwrap();
        *table
            .entry(key)
            .or_insert_with(|| self.graph.lock().unwrap().add_node(op, inputs, meta))
    }

    fn is_materialized(&self, id: NodeId) -> bool {
        self.buffers.lock().unwrap().contains_key(&id)
    }

    /// Clone a node and its inputs' metadata under the graph lock.
    fn node_with_input_metas(&self, id: NodeId) -> Result<(Node, Vec<TensorMeta>)> {
        let graph = self.graph.lock().unwrap();
        let node = graph
            .get(id)
            .cloned()
            .ok_or_else(|| ShimError::InvalidArgument(format!("node {id:?} not in graph")))?;
        let metas = node
            .inputs
            .iter()
            .map(|&input| {
                graph.get(input).map(|n| n.meta.clone()).ok_or_else(|| {
                    ShimError::InvalidArgument(format!("input {input:?} not in graph"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((node, metas))
    }

    /// Copy out the computed inputs of `node` under the buffer lock.
    fn input_buffers(&self, node: &Node) -> Result<Vec<Vec<f32>>> {
        let buffers = self.buffers.lock().unwrap();
        node.inputs
            .iter()
            .map(|id| {
                buffers.get(id).cloned().ok_or_else(|| {
                    ShimError::InvalidArgument(format!(
                        "input {id:?} of {} is not materialized",
                        node.op.name()
                    ))
                })
            })
            .collect()
    }

    /// Materialize `output` and every node it depends on.
    pub fn eval(&self, output: NodeId) -> Result<()> {
        if self.is_materialized(output) {
            return Ok(());
        }
        let order = self.graph.lock().unwrap().topo_sort(&[output]);
        tracing::trace!(?output, nodes = order.len(), "evaluating subgraph");

        for id in order {
            if self.is_materialized(id) {
                continue;
            }
            let (node, metas) = self.node_with_input_metas(id)?;
            let data = self.input_buffers(&node)?;
            let inputs: Vec<NodeInput<'_>> = data
                .iter()
                .zip(&metas)
                .map(|(data, meta)| NodeInput {
                    data,
                    shape: &meta.shape,
                    dtype: meta.dtype,
                })
                .collect();

            tracing::trace!(op = node.op.name(), shape = %node.meta.shape, "eval node");
            let out = self.backend.eval_node(&node.op, &inputs, &node.meta)?;
            self.buffers.lock().unwrap().insert(id, out);
        }
        Ok(())
    }

    /// Computed data for `id`, if it has been evaluated.
    pub fn get_buffer(&self, id: NodeId) -> Option<Vec<f32>> {
        self.buffers.lock().unwrap().get(&id).cloned()
    }

    pub fn get_node(&self, id: NodeId) -> Option<Node> {
        self.graph.lock().unwrap().get(id).cloned()
    }

    pub fn graph_node_count(&self) -> usize {
        self.graph.lock().unwrap().len()
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Process-wide CPU stream behind the device-based constructors.
///
/// Callers wanting isolated graphs build their own stream and use the `*_on`
/// constructors.
static DEFAULT_STREAM: LazyLock<Arc<Stream>> =
    LazyLock::new(|| Arc::new(Stream::new(Box::new(crate::cpu_kernels::CpuRefBackend))));

pub fn default_stream() -> Arc<Stream> {
    Arc::clone(&DEFAULT_STREAM)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu_kernels::CpuRefBackend;

    fn meta(dims: Vec<i64>) -> TensorMeta {
        TensorMeta::new(Shape::new(dims), DType::F32)
    }

    #[test]
    fn test_stream_constant() {
        let stream = default_stream();
        let id = stream.add_constant(vec![1.0, 2.0, 3.0], meta(vec![3]));
        stream.eval(id).unwrap();
        assert_eq!(stream.get_buffer(id).unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_stream_add_op() {
        let stream = default_stream();
        let a = stream.add_constant(vec![1.0, 2.0], meta(vec![2]));
        let b = stream.add_constant(vec![3.0, 4.0], meta(vec![2]));
        let c = stream.add_op(OpKind::Add, SmallVec::from_slice(&[a, b]), meta(vec![2]));
        stream.eval(c).unwrap();
        assert_eq!(stream.get_buffer(c).unwrap(), vec![4.0, 6.0]);
    }

    #[test]
    fn test_cse_disabled_keeps_duplicates() {
        let stream = Stream::with_config(Box::new(CpuRefBackend), RuntimeConfig { cse: false });
        let a = stream.add_constant(vec![1.0, 2.0], meta(vec![2]));
        let b = stream.add_constant(vec![1.0, 2.0], meta(vec![2]));
        assert_ne!(a, b);
        let f1 = stream.add_op(
            OpKind::Flip { axes: vec![0] },
            SmallVec::from_slice(&[a]),
            meta(vec![2]),
        );
        let f2 = stream.add_op(
            OpKind::Flip { axes: vec![0] },
            SmallVec::from_slice(&[a]),
            meta(vec![2]),
        );
        assert_ne!(f1, f2);
        assert_eq!(stream.graph_node_count(), 4);
    }

    #[test]
    fn test_eval_surfaces_kernel_error() {
        let stream = Stream::with_config(Box::new(CpuRefBackend), RuntimeConfig::default());
        let a = stream.add_constant(vec![1.0, 2.0], meta(vec![2]));
        let bad = stream.add_op(
            OpKind::Slice {
                axis: 0,
                start: 1,
                end: 5,
            },
            SmallVec::from_slice(&[a]),
            meta(vec![4]),
        );
        assert!(stream.eval(bad).is_err());
        assert!(stream.get_buffer(bad).is_none());
    }
}
