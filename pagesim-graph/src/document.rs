// Serialized form of an already-assembled graph

use crate::builder::GraphBuilder;
use crate::error::Result;
use crate::graph::DependencyGraph;
use crate::navigation::NavigationMarkers;
use crate::node::ComputeNode;
use crate::record::{InitiatorType, NetworkRecord, ResourcePriority, ResourceType, TaskEvent};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordDocument {
    pub url: String,
    pub resource_type: ResourceType,
    pub priority: ResourcePriority,
    pub transfer_size: u64,
    /// Defaults to `transfer_size` when absent.
    pub resource_size: Option<u64>,
    pub protocol: Option<String>,
    pub connection_id: Option<u64>,
    pub connection_reused: bool,
    pub from_disk_cache: bool,
    pub initiator_type: InitiatorType,
    pub initiator: Option<String>,
    pub redirects: Vec<String>,
    pub server_response_time: Option<f64>,
    pub start_time: f64,
    pub end_time: f64,
}

impl RecordDocument {
    pub fn to_record(&self) -> Result<NetworkRecord> {
        let mut record = NetworkRecord::new(&self.url)?
            .with_resource_type(self.resource_type)
            .with_priority(self.priority)
            .with_size(self.transfer_size)
            .with_disk_cache(self.from_disk_cache)
            .with_redirects(self.redirects.clone())
            .with_initiator(self.initiator_type, self.initiator.as_deref())
            .with_timing(self.start_time, self.end_time);

        if let Some(resource_size) = self.resource_size {
            record.resource_size = resource_size;
        }
        if let Some(ref protocol) = self.protocol {
            record.protocol = protocol.clone();
        }
        record.connection_id = self.connection_id;
        record.connection_reused = self.connection_reused;
        record.server_response_time = self.server_response_time;
        Ok(record)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeDocument {
    Network {
        id: String,
        #[serde(default)]
        dependencies: Vec<String>,
        record: RecordDocument,
    },
    Compute {
        id: String,
        #[serde(default)]
        dependencies: Vec<String>,
        task: TaskEvent,
        #[serde(default)]
        corrected_end_time: Option<f64>,
    },
}

impl NodeDocument {
    pub fn id(&self) -> &str {
        match self {
            NodeDocument::Network { id, .. } | NodeDocument::Compute { id, .. } => id,
        }
    }

    pub fn dependencies(&self) -> &[String] {
        match self {
            NodeDocument::Network { dependencies, .. }
            | NodeDocument::Compute { dependencies, .. } => dependencies,
        }
    }
}

/// A graph plus the navigation markers metrics need, as exchanged on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub main_document: Option<String>,
    #[serde(default)]
    pub markers: NavigationMarkers,
    pub nodes: Vec<NodeDocument>,
}

impl GraphDocument {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let document = Self::from_json(&content)?;
        info!(
            "Loaded graph document {} with {} nodes",
            path.display(),
            document.nodes.len()
        );
        Ok(document)
    }

    pub fn to_graph(&self) -> Result<DependencyGraph> {
        let mut builder = GraphBuilder::new();

        for node in &self.nodes {
            match node {
                NodeDocument::Network { id, record, .. } => {
                    builder.add_network(id, record.to_record()?)?;
                }
                NodeDocument::Compute {
                    id,
                    task,
                    corrected_end_time,
                    ..
                } => {
                    let mut compute = ComputeNode::new(id, task.clone());
                    compute.corrected_end_time = *corrected_end_time;
                    builder.add_node(compute)?;
                }
            }
        }

        for node in &self.nodes {
            for dependency in node.dependencies() {
                builder.add_dependency(node.id(), dependency)?;
            }
        }

        if let Some(ref main_document) = self.main_document {
            builder.set_main_document(main_document);
        }

        builder.build()
    }
}
