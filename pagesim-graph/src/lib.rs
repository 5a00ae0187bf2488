pub mod builder;
pub mod document;
pub mod error;
pub mod graph;
pub mod navigation;
pub mod node;
pub mod record;

pub use builder::GraphBuilder;
pub use document::GraphDocument;
pub use error::GraphError;
pub use graph::DependencyGraph;
pub use navigation::NavigationMarkers;
pub use node::{ComputeNode, NetworkNode, Node, NodeKind};
pub use petgraph::graph::NodeIndex;
pub use record::{
    ChildEvent, InitiatorType, NetworkRecord, ResourcePriority, ResourceType, TaskEvent,
};
