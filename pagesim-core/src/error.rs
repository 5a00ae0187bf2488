use pagesim_graph::GraphError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OptionsError {
    #[error("rtt must be a non-negative number of milliseconds, got {0}")]
    InvalidRtt(f64),

    #[error("throughput must be greater than zero, got {0}")]
    InvalidThroughput(f64),

    #[error("cpu slowdown multiplier must be greater than zero, got {0}")]
    InvalidCpuSlowdown(f64),

    #[error("maximum concurrent requests must be at least 1")]
    InvalidMaximumRequests,

    #[error("connections per origin must be at least 1")]
    InvalidConnectionsPerOrigin,

    #[error("{name} must be a non-negative finite number, got {value}")]
    InvalidValue { name: String, value: f64 },

    #[error("Unknown throttling preset: {0}")]
    UnknownPreset(String),

    #[error("Parse error: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("Invalid options: {0}")]
    Options(#[from] OptionsError),

    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    #[error("Simulation exceeded {0} iterations")]
    DepthExceeded(usize),
}

#[derive(Error, Debug)]
pub enum MetricError {
    #[error("{metric} is not computable: missing {marker} marker")]
    NotComputable {
        metric: &'static str,
        marker: &'static str,
    },

    #[error("Simulation failed: {0}")]
    Simulation(#[from] SimulationError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoringError {
    #[error("median must be greater than zero, got {0}")]
    InvalidMedian(f64),

    #[error("p10 must be greater than zero, got {0}")]
    InvalidP10(f64),

    #[error("p10 ({p10}) must be less than the median ({median})")]
    P10NotBelowMedian { p10: f64, median: f64 },
}

pub type Result<T> = std::result::Result<T, SimulationError>;
