use crate::error::{GraphError, Result};
use crate::node::{Node, NodeKind};
use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, EdgeRef, Reversed};
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};

/// A rooted DAG of page-load work.
///
/// Nodes live in a single arena addressed by [`NodeIndex`]; an edge points from a
/// dependency to its dependent. A graph is immutable once assembled: variants are
/// produced as new arenas by [`DependencyGraph::clone_with_relationships`].
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<Node, ()>,
    root: NodeIndex,
    order: Vec<NodeIndex>,
    ids: HashMap<String, NodeIndex>,
    fingerprint: u64,
}

impl DependencyGraph {
    /// Validates an arena and wraps it: exactly one root, no cycles.
    pub(crate) fn assemble(graph: DiGraph<Node, ()>) -> Result<Self> {
        if graph.node_count() == 0 {
            return Err(GraphError::Empty);
        }

        let roots: Vec<NodeIndex> = graph
            .node_indices()
            .filter(|&idx| {
                graph
                    .neighbors_directed(idx, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .collect();

        // A cycle with no entry point leaves zero roots, so check cycles first
        // to report the more useful error.
        let order = toposort(&graph, None)
            .map_err(|cycle| GraphError::Cycle(graph[cycle.node_id()].id().to_string()))?;

        if roots.len() != 1 {
            return Err(GraphError::RootCount(roots.len()));
        }

        let ids = graph
            .node_indices()
            .map(|idx| (graph[idx].id().to_string(), idx))
            .collect();
        let fingerprint = Self::compute_fingerprint(&graph);

        Ok(Self {
            graph,
            root: roots[0],
            order,
            ids,
            fingerprint,
        })
    }

    fn compute_fingerprint(graph: &DiGraph<Node, ()>) -> u64 {
        let mut hasher = DefaultHasher::new();
        for idx in graph.node_indices() {
            graph[idx].hash_payload(&mut hasher);
        }
        for edge in graph.edge_references() {
            graph[edge.source()].id().hash(&mut hasher);
            graph[edge.target()].id().hash(&mut hasher);
        }
        hasher.finish()
    }

    pub fn root(&self) -> NodeIndex {
        self.root
    }

    pub fn root_node(&self) -> &Node {
        &self.graph[self.root]
    }

    pub fn node(&self, idx: NodeIndex) -> &Node {
        &self.graph[idx]
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn find(&self, id: &str) -> Option<NodeIndex> {
        self.ids.get(id).copied()
    }

    /// Hash of every node payload and every edge. Graphs with equal fingerprints simulate
    /// identically under the same options.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Arena indices in insertion order.
    pub fn indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &Node)> + '_ {
        self.graph
            .node_indices()
            .map(move |idx| (idx, &self.graph[idx]))
    }

    pub fn dependencies(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.neighbors(idx, Direction::Incoming)
    }

    pub fn dependents(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.neighbors(idx, Direction::Outgoing)
    }

    fn neighbors(&self, idx: NodeIndex, direction: Direction) -> Vec<NodeIndex> {
        let mut neighbors: Vec<NodeIndex> =
            self.graph.neighbors_directed(idx, direction).collect();
        neighbors.sort();
        neighbors.dedup();
        neighbors
    }

    pub fn topological_order(&self) -> &[NodeIndex] {
        &self.order
    }

    /// Visits every node once, each after all of its dependencies.
    pub fn traverse<F>(&self, mut visitor: F)
    where
        F: FnMut(NodeIndex, &Node),
    {
        for &idx in &self.order {
            visitor(idx, &self.graph[idx]);
        }
    }

    /// `idx` and everything it transitively depends on.
    pub fn ancestors(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let reversed = Reversed(&self.graph);
        let mut dfs = Dfs::new(reversed, idx);
        let mut found = Vec::new();
        while let Some(next) = dfs.next(reversed) {
            found.push(next);
        }
        found
    }

    /// The main document request: the flagged node, else a network root.
    pub fn main_document(&self) -> Option<NodeIndex> {
        self.graph
            .node_indices()
            .find(|&idx| self.graph[idx].is_main_document())
            .or_else(|| (self.root_node().kind() == NodeKind::Network).then_some(self.root))
    }

    /// Builds an independent graph holding every node `predicate` selects, plus all of
    /// their transitive dependencies. The root is always kept.
    pub fn clone_with_relationships<F>(&self, mut predicate: F) -> Result<DependencyGraph>
    where
        F: FnMut(NodeIndex, &Node) -> bool,
    {
        let mut included = vec![false; self.graph.node_count()];
        included[self.root.index()] = true;

        for &idx in &self.order {
            if included[idx.index()] || !predicate(idx, &self.graph[idx]) {
                continue;
            }
            for ancestor in self.ancestors(idx) {
                included[ancestor.index()] = true;
            }
        }

        let mut cloned: DiGraph<Node, ()> = DiGraph::new();
        let mut mapping: Vec<Option<NodeIndex>> = vec![None; self.graph.node_count()];
        for idx in self.graph.node_indices() {
            if included[idx.index()] {
                let copy = self.graph[idx].clone_without_relationships();
                mapping[idx.index()] = Some(cloned.add_node(copy));
            }
        }

        for edge in self.graph.edge_references() {
            if let (Some(from), Some(to)) =
                (mapping[edge.source().index()], mapping[edge.target().index()])
            {
                cloned.add_edge(from, to, ());
            }
        }

        DependencyGraph::assemble(cloned)
    }
}
