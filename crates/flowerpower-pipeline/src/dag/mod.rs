pub mod graph;
pub mod node;

pub use graph::Dag;
pub use node::{NodeFn, NodeSpec, PipelineGraphSpec, PipelineModule};
