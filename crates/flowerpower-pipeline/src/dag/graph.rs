//! The DAG driver: a petgraph-backed dependency graph over named-variable
//! nodes, executed in topological layers of ready nodes.
//!
//! Structurally grounded on the teacher's `fluent-pipeline::Pipeline<T>`
//! (petgraph-backed graph with an explicit `validate()` pass before
//! execution); the execution loop itself — in-degree bookkeeping plus a
//! ready queue drained layer by layer — follows
//! `fluent-agent::workflow::engine::WorkflowEngine::{build_execution_dag,
//! execute_dag, update_ready_queue}`, which is the closer fit for a
//! named-variable dependency graph (each node consumes other nodes' named
//! outputs) rather than fluent-pipeline's token-routing Start/Split/Merge
//! algebra.

use crate::adapter::Adapter;
use crate::dag::node::{NodeSpec, PipelineGraphSpec};
use crate::error::PipelineError;
use crate::executor::NodeExecutor;
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// A validated, ready-to-run DAG built from a `PipelineGraphSpec`.
pub struct Dag {
    graph: DiGraph<String, ()>,
    index_of: HashMap<String, NodeIndex>,
    specs: HashMap<String, NodeSpec>,
}

impl Dag {
    /// Builds the graph: one node per spec entry, edges from each
    /// dependency that is itself a node name to its dependent. Inputs that
    /// are not other nodes' names are assumed to be externally supplied
    /// run inputs and are resolved (or rejected as unresolved) at
    /// execution time, since they are not known until `inputs` is given.
    pub fn build(spec: &PipelineGraphSpec) -> Result<Self, PipelineError> {
        let mut graph = DiGraph::new();
        let mut index_of = HashMap::new();
        let mut specs = HashMap::new();

        for node in &spec.nodes {
            if specs.contains_key(&node.name) {
                return Err(PipelineError::InvalidGraph(format!(
                    "duplicate node name '{}'",
                    node.name
                )));
            }
            let idx = graph.add_node(node.name.clone());
            index_of.insert(node.name.clone(), idx);
            specs.insert(node.name.clone(), node.clone());
        }

        for node in &spec.nodes {
            for input in &node.inputs {
                if let Some(&dep_idx) = index_of.get(input) {
                    graph.add_edge(dep_idx, index_of[&node.name], ());
                }
            }
        }

        let dag = Dag {
            graph,
            index_of,
            specs,
        };
        dag.validate()?;
        Ok(dag)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if is_cyclic_directed(&self.graph) {
            return Err(PipelineError::InvalidGraph("graph contains a cycle".to_string()));
        }
        Ok(())
    }

    /// Node names with no outgoing edges: the DAG's terminal outputs, used
    /// when `final_vars` is empty.
    pub fn terminal_nodes(&self) -> Vec<String> {
        self.graph
            .node_indices()
            .filter(|&idx| self.graph.neighbors_directed(idx, Direction::Outgoing).count() == 0)
            .map(|idx| self.graph[idx].clone())
            .collect()
    }

    /// Runs every node, seeded by `inputs`, through `executor`, firing
    /// `adapters`' lifecycle hooks around each node and at graph
    /// completion. Returns the full computed variable map; the caller
    /// filters down to the requested `final_vars`.
    pub async fn execute(
        &self,
        inputs: HashMap<String, Value>,
        executor: &dyn NodeExecutor,
        adapters: &[Arc<dyn Adapter>],
    ) -> Result<HashMap<String, Value>, PipelineError> {
        let mut values = inputs;
        let mut in_degree: HashMap<NodeIndex, usize> = HashMap::new();
        for idx in self.graph.node_indices() {
            in_degree.insert(idx, self.graph.neighbors_directed(idx, Direction::Incoming).count());
        }

        let mut ready: VecDeque<NodeIndex> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&idx, _)| idx)
            .collect();

        let mut remaining = in_degree.len();

        while let Some(idx) = ready.pop_front() {
            let name = &self.graph[idx];
            let node = self.specs.get(name).expect("node present in specs");

            let mut resolved_inputs = Vec::with_capacity(node.inputs.len());
            for input_name in &node.inputs {
                match values.get(input_name) {
                    Some(value) => resolved_inputs.push(value.clone()),
                    None => {
                        return Err(PipelineError::UnresolvedInput {
                            node: node.name.clone(),
                            input: input_name.clone(),
                        })
                    }
                }
            }

            for adapter in adapters {
                adapter.pre_node_execute(node).await;
            }
            let result = executor.run(node, resolved_inputs).await;
            for adapter in adapters {
                adapter.post_node_execute(node, &result).await;
            }
            let output = result?;
            values.insert(node.name.clone(), output);
            remaining -= 1;

            for dependent in self.graph.neighbors_directed(idx, Direction::Outgoing) {
                let degree = in_degree.get_mut(&dependent).expect("dependent tracked");
                *degree -= 1;
                if *degree == 0 {
                    ready.push_back(dependent);
                }
            }
        }

        if remaining != 0 {
            return Err(PipelineError::InvalidGraph(
                "graph execution stalled before all nodes ran (disconnected or unresolved dependency)"
                    .to_string(),
            ));
        }

        for adapter in adapters {
            adapter.post_graph_execute(&values).await;
        }

        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::node::PipelineModule;
    use crate::executor::NodeExecutor;
    use async_trait::async_trait;

    struct InlineExecutor;

    #[async_trait]
    impl NodeExecutor for InlineExecutor {
        async fn run(&self, node: &NodeSpec, inputs: Vec<Value>) -> Result<Value, PipelineError> {
            (node.function)(&inputs)
        }
    }

    fn mean_node() -> PipelineGraphSpec {
        PipelineModule::new()
            .node(
                "spend_mean",
                &["spend"],
                Arc::new(|inputs| {
                    let spend = inputs[0]
                        .as_array()
                        .expect("spend is an array")
                        .iter()
                        .map(|v| v.as_f64().unwrap())
                        .collect::<Vec<_>>();
                    let mean = spend.iter().sum::<f64>() / spend.len() as f64;
                    Ok(Value::from(mean))
                }),
            )
            .build()
    }

    #[tokio::test]
    async fn hello_world_pipeline_computes_mean() {
        let spec = mean_node();
        let dag = Dag::build(&spec).unwrap();

        let mut inputs = HashMap::new();
        inputs.insert("spend".to_string(), Value::from(vec![10, 20, 30]));

        let outputs = dag.execute(inputs, &InlineExecutor, &[]).await.unwrap();
        assert_eq!(outputs["spend_mean"], Value::from(20.0));
    }

    #[test]
    fn duplicate_node_names_are_rejected() {
        let spec = PipelineGraphSpec {
            nodes: vec![
                NodeSpec {
                    name: "a".to_string(),
                    inputs: vec![],
                    function: Arc::new(|_| Ok(Value::Null)),
                },
                NodeSpec {
                    name: "a".to_string(),
                    inputs: vec![],
                    function: Arc::new(|_| Ok(Value::Null)),
                },
            ],
        };
        assert!(Dag::build(&spec).is_err());
    }

    #[tokio::test]
    async fn unresolved_input_surfaces_an_error() {
        let spec = PipelineModule::new()
            .node("b", &["a_missing"], Arc::new(|_| Ok(Value::Null)))
            .build();
        let dag = Dag::build(&spec).unwrap();
        let result = dag.execute(HashMap::new(), &InlineExecutor, &[]).await;
        assert!(result.is_err());
    }

    #[test]
    fn terminal_nodes_are_those_with_no_dependents() {
        let spec = PipelineModule::new()
            .node("a", &[], Arc::new(|_| Ok(Value::Null)))
            .node("b", &["a"], Arc::new(|_| Ok(Value::Null)))
            .build();
        let dag = Dag::build(&spec).unwrap();
        assert_eq!(dag.terminal_nodes(), vec!["b".to_string()]);
    }
}
