use crate::error::{GraphError, Result};
use crate::graph::DependencyGraph;
use crate::node::{ComputeNode, NetworkNode, Node};
use crate::record::{NetworkRecord, TaskEvent};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use tracing::debug;

/// Assembles a [`DependencyGraph`] from nodes and id-based dependency declarations.
///
/// Dependencies may name nodes that are added later; they are resolved in `build`.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: DiGraph<Node, ()>,
    ids: HashMap<String, NodeIndex>,
    dependencies: Vec<(String, String)>,
    main_document: Option<String>,
}

/// Every time and duration on a node must be finite and non-negative.
fn check_timing(node: &Node) -> Result<()> {
    let fields: Vec<(&'static str, Option<f64>)> = match node {
        Node::Compute(compute) => vec![
            ("task start time", Some(compute.task.start_time)),
            ("task duration", Some(compute.task.duration)),
            ("corrected end time", compute.corrected_end_time),
        ],
        Node::Network(network) => vec![
            ("start time", Some(network.record.start_time)),
            ("end time", Some(network.record.end_time)),
            (
                "server response time",
                network.record.server_response_time,
            ),
        ],
    };

    for (field, value) in fields {
        if let Some(value) = value
            && (!value.is_finite() || value < 0.0)
        {
            return Err(GraphError::InvalidTiming {
                node: node.id().to_string(),
                field,
                value,
            });
        }
    }
    Ok(())
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: impl Into<Node>) -> Result<NodeIndex> {
        let node = node.into();
        if self.ids.contains_key(node.id()) {
            return Err(GraphError::DuplicateNode(node.id().to_string()));
        }
        check_timing(&node)?;
        let id = node.id().to_string();
        let idx = self.graph.add_node(node);
        self.ids.insert(id, idx);
        Ok(idx)
    }

    pub fn add_network(&mut self, id: &str, record: NetworkRecord) -> Result<NodeIndex> {
        self.add_node(NetworkNode::new(id, record))
    }

    pub fn add_compute(&mut self, id: &str, task: TaskEvent) -> Result<NodeIndex> {
        self.add_node(ComputeNode::new(id, task))
    }

    /// Declares that `dependent` cannot start before `dependency` finishes.
    pub fn add_dependency(&mut self, dependent: &str, dependency: &str) -> Result<()> {
        if dependent == dependency {
            return Err(GraphError::SelfDependency(dependent.to_string()));
        }
        self.dependencies
            .push((dependent.to_string(), dependency.to_string()));
        Ok(())
    }

    pub fn set_main_document(&mut self, id: &str) {
        self.main_document = Some(id.to_string());
    }

    fn resolve(&self, id: &str, dependent: &str) -> Result<NodeIndex> {
        self.ids
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::DanglingDependency {
                node: dependent.to_string(),
                dependency: id.to_string(),
            })
    }

    pub fn build(mut self) -> Result<DependencyGraph> {
        let dependencies = std::mem::take(&mut self.dependencies);
        for (dependent, dependency) in &dependencies {
            let to = *self
                .ids
                .get(dependent)
                .ok_or_else(|| GraphError::UnknownNode(dependent.clone()))?;
            let from = self.resolve(dependency, dependent)?;
            self.graph.update_edge(from, to, ());
        }

        self.link_initiators();

        if let Some(id) = self.main_document.take() {
            let idx = *self
                .ids
                .get(&id)
                .ok_or_else(|| GraphError::UnknownNode(id.clone()))?;
            match &mut self.graph[idx] {
                Node::Network(node) => node.is_main_document = true,
                Node::Compute(_) => return Err(GraphError::NotNetworkNode(id)),
            }
        }

        DependencyGraph::assemble(self.graph)
    }

    /// Network nodes with no declared dependencies hang off their initiator, when known.
    fn link_initiators(&mut self) {
        let mut links = Vec::new();
        for idx in self.graph.node_indices() {
            let has_dependencies = self
                .graph
                .neighbors_directed(idx, Direction::Incoming)
                .next()
                .is_some();
            if has_dependencies {
                continue;
            }
            if let Node::Network(node) = &self.graph[idx]
                && let Some(initiator) = &node.record.initiator
                && let Some(&from) = self.ids.get(initiator)
                && from != idx
            {
                debug!("Linking {} to initiator {}", node.id, initiator);
                links.push((from, idx));
            }
        }
        for (from, to) in links {
            self.graph.update_edge(from, to, ());
        }
    }
}
