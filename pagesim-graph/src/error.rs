use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),

    #[error("Node {0} cannot depend on itself")]
    SelfDependency(String),

    #[error("Node {node} depends on unknown node {dependency}")]
    DanglingDependency { node: String, dependency: String },

    #[error("Unknown node: {0}")]
    UnknownNode(String),

    #[error("Node {0} is not a network node")]
    NotNetworkNode(String),

    #[error("Invalid graph: expected exactly one root, found {0}")]
    RootCount(usize),

    #[error("Invalid graph: dependency cycle through node {0}")]
    Cycle(String),

    #[error("Node {node} has invalid {field}: {value}")]
    InvalidTiming {
        node: String,
        field: &'static str,
        value: f64,
    },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Parse error: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Graph is empty")]
    Empty,
}

pub type Result<T> = std::result::Result<T, GraphError>;
