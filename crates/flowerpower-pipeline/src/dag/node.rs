use crate::error::PipelineError;
use serde_json::Value;
use std::sync::Arc;

/// A DAG node's computation: takes its declared inputs, in the order they
/// were declared, and produces its own output value.
pub type NodeFn = Arc<dyn Fn(&[Value]) -> Result<Value, PipelineError> + Send + Sync>;

/// One function in the DAG, identified by the variable name it produces.
#[derive(Clone)]
pub struct NodeSpec {
    pub name: String,
    pub inputs: Vec<String>,
    pub function: NodeFn,
}

impl std::fmt::Debug for NodeSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeSpec")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .finish_non_exhaustive()
    }
}

/// The explicit DAG declaration a pipeline module provides: a list of
/// `{name, inputs, function}` records. This realizes the "explicit
/// declaration" option for the module/loader boundary — no reflection on
/// function signatures, no code generation.
#[derive(Clone, Debug, Default)]
pub struct PipelineGraphSpec {
    pub nodes: Vec<NodeSpec>,
}

impl PipelineGraphSpec {
    pub fn node_names(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.name.as_str()).collect()
    }
}

/// Builder a pipeline author uses to register nodes, the functional
/// equivalent of a `#[pipeline_node(...)]` attribute without proc-macro
/// machinery.
#[derive(Clone, Debug, Default)]
pub struct PipelineModule {
    nodes: Vec<NodeSpec>,
}

impl PipelineModule {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn node(mut self, name: impl Into<String>, inputs: &[&str], function: NodeFn) -> Self {
        self.nodes.push(NodeSpec {
            name: name.into(),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            function,
        });
        self
    }

    pub fn build(self) -> PipelineGraphSpec {
        PipelineGraphSpec { nodes: self.nodes }
    }
}
