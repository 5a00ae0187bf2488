pub mod cache;
pub mod error;
pub mod metrics;
pub mod options;
pub mod report;
pub mod scoring;
pub mod simulator;

pub use cache::SimulationCache;
pub use error::{MetricError, OptionsError, ScoringError, SimulationError};
pub use metrics::{Estimator, Metric, MetricEstimate, MetricModel};
pub use options::{SimulationOptions, ThrottlingPreset, WarmupMultipliers};
pub use scoring::{FormFactor, ScoreCurve, log_normal_score};
pub use simulator::{NodeTiming, SimulationResult, Simulator};
