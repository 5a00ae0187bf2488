use crate::record::{NetworkRecord, ResourcePriority, ResourceType, TaskEvent};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Compute,
    Network,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Compute => "compute",
            NodeKind::Network => "network",
        }
    }
}

/// A main-thread task vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputeNode {
    pub id: String,
    pub task: Arc<TaskEvent>,
    pub corrected_end_time: Option<f64>,
}

impl ComputeNode {
    pub fn new(id: &str, task: TaskEvent) -> Self {
        Self {
            id: id.to_string(),
            task: Arc::new(task),
            corrected_end_time: None,
        }
    }

    pub fn start_time(&self) -> f64 {
        self.task.start_time
    }

    pub fn end_time(&self) -> f64 {
        self.corrected_end_time
            .unwrap_or_else(|| self.task.end_time())
    }

    pub fn duration(&self) -> f64 {
        self.task.duration
    }

    fn has_child(&self, name: &str) -> bool {
        self.task.children.iter().any(|child| child.name == name)
    }

    pub fn did_perform_layout(&self) -> bool {
        self.has_child("Layout")
    }

    pub fn did_paint(&self) -> bool {
        self.has_child("Paint")
    }

    pub fn did_parse_html(&self) -> bool {
        self.has_child("ParseHTML")
    }

    /// URLs of every script evaluated during this task.
    pub fn evaluate_script_urls(&self) -> Vec<&str> {
        self.task
            .children
            .iter()
            .filter(|child| child.name == "EvaluateScript")
            .filter_map(|child| child.url.as_deref())
            .collect()
    }
}

/// A network fetch vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkNode {
    pub id: String,
    pub record: Arc<NetworkRecord>,
    pub is_main_document: bool,
}

impl NetworkNode {
    pub fn new(id: &str, record: NetworkRecord) -> Self {
        Self {
            id: id.to_string(),
            record: Arc::new(record),
            is_main_document: false,
        }
    }

    pub fn start_time(&self) -> f64 {
        self.record.start_time
    }

    pub fn end_time(&self) -> f64 {
        self.record.end_time
    }

    pub fn is_non_network_protocol(&self) -> bool {
        self.record.is_non_network_protocol()
    }

    pub fn from_disk_cache(&self) -> bool {
        self.record.from_disk_cache
    }

    /// Served without acquiring a connection.
    pub fn is_connectionless(&self) -> bool {
        self.from_disk_cache() || self.is_non_network_protocol()
    }

    pub fn has_render_blocking_priority(&self) -> bool {
        let priority = self.record.priority;
        let is_script = self.record.resource_type == ResourceType::Script;
        let is_document = self.record.resource_type == ResourceType::Document;
        let is_blocking_script = priority == ResourcePriority::High && is_script;
        let is_blocking_import = priority == ResourcePriority::High && is_document;
        priority == ResourcePriority::VeryHigh || is_blocking_script || is_blocking_import
    }

    pub fn is_low_priority_image(&self) -> bool {
        self.record.resource_type == ResourceType::Image
            && self.record.priority <= ResourcePriority::Low
    }
}

/// A vertex of the dependency graph. Edges live in the owning arena, never in the payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Compute(ComputeNode),
    Network(NetworkNode),
}

impl Node {
    pub fn id(&self) -> &str {
        match self {
            Node::Compute(node) => &node.id,
            Node::Network(node) => &node.id,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Compute(_) => NodeKind::Compute,
            Node::Network(_) => NodeKind::Network,
        }
    }

    /// Hashes the id, kind and everything the simulator reads from the payload.
    pub fn hash_payload<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
        self.kind().hash(state);
        match self {
            Node::Compute(node) => {
                node.task.hash_payload(state);
                node.corrected_end_time.map(f64::to_bits).hash(state);
            }
            Node::Network(node) => {
                node.record.hash_payload(state);
                node.is_main_document.hash(state);
            }
        }
    }

    pub fn start_time(&self) -> f64 {
        match self {
            Node::Compute(node) => node.start_time(),
            Node::Network(node) => node.start_time(),
        }
    }

    pub fn end_time(&self) -> f64 {
        match self {
            Node::Compute(node) => node.end_time(),
            Node::Network(node) => node.end_time(),
        }
    }

    pub fn as_compute(&self) -> Option<&ComputeNode> {
        match self {
            Node::Compute(node) => Some(node),
            Node::Network(_) => None,
        }
    }

    pub fn as_network(&self) -> Option<&NetworkNode> {
        match self {
            Node::Network(node) => Some(node),
            Node::Compute(_) => None,
        }
    }

    pub fn is_main_document(&self) -> bool {
        matches!(self, Node::Network(node) if node.is_main_document)
    }

    /// A copy of this vertex's payload, ready to be placed into a fresh arena slot.
    ///
    /// Records and tasks are shared behind `Arc`; edges are not part of the payload,
    /// so the copy starts without any relationships.
    pub fn clone_without_relationships(&self) -> Node {
        self.clone()
    }
}

impl From<ComputeNode> for Node {
    fn from(node: ComputeNode) -> Self {
        Node::Compute(node)
    }
}

impl From<NetworkNode> for Node {
    fn from(node: NetworkNode) -> Self {
        Node::Network(node)
    }
}
