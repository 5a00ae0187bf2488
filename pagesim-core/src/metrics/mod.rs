// Metric estimation from optimistic and pessimistic simulations

mod first_paint;
mod interactive;
mod largest_contentful_paint;
mod speed_index;

pub use first_paint::{FirstContentfulPaint, FirstMeaningfulPaint};
pub use interactive::Interactive;
pub use largest_contentful_paint::LargestContentfulPaint;
pub use speed_index::SpeedIndex;

use crate::cache::SimulationCache;
use crate::error::MetricError;
use crate::scoring::{FormFactor, ScoreCurve};
use crate::simulator::{SimulationResult, Simulator};
use pagesim_graph::{DependencyGraph, NavigationMarkers};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Metric {
    FirstContentfulPaint,
    FirstMeaningfulPaint,
    LargestContentfulPaint,
    Interactive,
    SpeedIndex,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::FirstContentfulPaint,
        Metric::FirstMeaningfulPaint,
        Metric::LargestContentfulPaint,
        Metric::SpeedIndex,
        Metric::Interactive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::FirstContentfulPaint => "first-contentful-paint",
            Metric::FirstMeaningfulPaint => "first-meaningful-paint",
            Metric::LargestContentfulPaint => "largest-contentful-paint",
            Metric::Interactive => "interactive",
            Metric::SpeedIndex => "speed-index",
        }
    }

    pub fn model(&self) -> &'static dyn MetricModel {
        match self {
            Metric::FirstContentfulPaint => &FirstContentfulPaint,
            Metric::FirstMeaningfulPaint => &FirstMeaningfulPaint,
            Metric::LargestContentfulPaint => &LargestContentfulPaint,
            Metric::Interactive => &Interactive,
            Metric::SpeedIndex => &SpeedIndex,
        }
    }

    /// Scoring curve (p10, median in ms) for the given device class.
    pub fn default_curve(&self, form_factor: FormFactor) -> ScoreCurve {
        let (p10, median) = match (self, form_factor) {
            (Metric::FirstContentfulPaint, FormFactor::Mobile) => (1800.0, 3000.0),
            (Metric::FirstContentfulPaint, FormFactor::Desktop) => (934.0, 1600.0),
            (Metric::FirstMeaningfulPaint, FormFactor::Mobile) => (2000.0, 4000.0),
            (Metric::FirstMeaningfulPaint, FormFactor::Desktop) => (934.0, 1600.0),
            (Metric::LargestContentfulPaint, FormFactor::Mobile) => (2500.0, 4000.0),
            (Metric::LargestContentfulPaint, FormFactor::Desktop) => (1200.0, 2400.0),
            (Metric::Interactive, FormFactor::Mobile) => (3785.0, 7300.0),
            (Metric::Interactive, FormFactor::Desktop) => (2468.0, 4500.0),
            (Metric::SpeedIndex, FormFactor::Mobile) => (3387.0, 5800.0),
            (Metric::SpeedIndex, FormFactor::Desktop) => (1311.0, 2300.0),
        };
        ScoreCurve { p10, median }
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "first-contentful-paint" | "fcp" => Ok(Metric::FirstContentfulPaint),
            "first-meaningful-paint" | "fmp" => Ok(Metric::FirstMeaningfulPaint),
            "largest-contentful-paint" | "lcp" => Ok(Metric::LargestContentfulPaint),
            "interactive" | "tti" => Ok(Metric::Interactive),
            "speed-index" | "si" => Ok(Metric::SpeedIndex),
            _ => Err(format!("Unknown metric: {}", s)),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weights applied to the optimistic and pessimistic estimates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coefficients {
    pub intercept: f64,
    pub optimistic: f64,
    pub pessimistic: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Estimate {
    pub time_in_ms: f64,
    pub node_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricEstimate {
    pub metric: Metric,
    pub timing: f64,
    pub optimistic: Estimate,
    pub pessimistic: Estimate,
}

/// Inputs available to [`MetricModel::estimate`] besides the simulation itself.
pub struct EstimateContext<'a> {
    pub markers: &'a NavigationMarkers,
    pub optimistic: bool,
    pub first_contentful_paint: Option<&'a MetricEstimate>,
}

impl EstimateContext<'_> {
    /// The first contentful paint estimate matching this side of the bracket.
    pub fn first_contentful_paint_time(&self) -> Option<f64> {
        self.first_contentful_paint.map(|fcp| {
            if self.optimistic {
                fcp.optimistic.time_in_ms
            } else {
                fcp.pessimistic.time_in_ms
            }
        })
    }
}

pub trait MetricModel: Sync {
    fn metric(&self) -> Metric;

    fn coefficients(&self, rtt: f64) -> Coefficients;

    fn optimistic_graph(
        &self,
        graph: &DependencyGraph,
        markers: &NavigationMarkers,
    ) -> Result<DependencyGraph, MetricError>;

    fn pessimistic_graph(
        &self,
        graph: &DependencyGraph,
        markers: &NavigationMarkers,
    ) -> Result<DependencyGraph, MetricError>;

    fn estimate(
        &self,
        result: &SimulationResult,
        _graph: &DependencyGraph,
        _context: &EstimateContext<'_>,
    ) -> Result<f64, MetricError> {
        Ok(result.completion_time)
    }

    /// Adjusts the combined timing; by default it never precedes first contentful paint.
    fn finalize(&self, timing: f64, first_contentful_paint: Option<&MetricEstimate>) -> f64 {
        match first_contentful_paint {
            Some(fcp) => timing.max(fcp.timing),
            None => timing,
        }
    }
}

pub(crate) fn require_marker(
    value: Option<f64>,
    metric: Metric,
    marker: &'static str,
) -> Result<f64, MetricError> {
    value.ok_or(MetricError::NotComputable {
        metric: metric.as_str(),
        marker,
    })
}

/// Runs metric models against a shared simulator and cache.
pub struct Estimator<'a> {
    simulator: &'a Simulator,
    cache: &'a mut SimulationCache,
}

impl<'a> Estimator<'a> {
    pub fn new(simulator: &'a Simulator, cache: &'a mut SimulationCache) -> Self {
        Self { simulator, cache }
    }

    pub fn compute(
        &mut self,
        metric: Metric,
        graph: &DependencyGraph,
        markers: &NavigationMarkers,
    ) -> Result<MetricEstimate, MetricError> {
        let first_contentful_paint = match metric {
            Metric::FirstContentfulPaint => None,
            _ => Some(
                self.compute(Metric::FirstContentfulPaint, graph, markers)
                    .map_err(|err| match err {
                        MetricError::NotComputable { marker, .. } => {
                            MetricError::NotComputable {
                                metric: metric.as_str(),
                                marker,
                            }
                        }
                        other => other,
                    })?,
            ),
        };

        self.compute_model(
            metric.model(),
            graph,
            markers,
            first_contentful_paint.as_ref(),
        )
    }

    /// Computes each metric independently; one failing does not stop the others.
    pub fn compute_all(
        &mut self,
        metrics: &[Metric],
        graph: &DependencyGraph,
        markers: &NavigationMarkers,
    ) -> Vec<(Metric, Result<MetricEstimate, MetricError>)> {
        metrics
            .iter()
            .map(|&metric| (metric, self.compute(metric, graph, markers)))
            .collect()
    }

    pub fn compute_model(
        &mut self,
        model: &dyn MetricModel,
        graph: &DependencyGraph,
        markers: &NavigationMarkers,
        first_contentful_paint: Option<&MetricEstimate>,
    ) -> Result<MetricEstimate, MetricError> {
        let metric = model.metric();
        let optimistic_graph = model.optimistic_graph(graph, markers)?;
        let pessimistic_graph = model.pessimistic_graph(graph, markers)?;
        debug!(
            "{}: optimistic graph has {} nodes, pessimistic graph has {}",
            metric,
            optimistic_graph.node_count(),
            pessimistic_graph.node_count()
        );

        let strict = self
            .cache
            .get_or_simulate(self.simulator, &optimistic_graph, false)?;
        let flexible = self
            .cache
            .get_or_simulate(self.simulator, &optimistic_graph, true)?;
        let optimistic_result = if flexible.completion_time < strict.completion_time {
            flexible
        } else {
            strict
        };
        let pessimistic_result = self
            .cache
            .get_or_simulate(self.simulator, &pessimistic_graph, false)?;

        let optimistic_estimate = model.estimate(
            &optimistic_result,
            &optimistic_graph,
            &EstimateContext {
                markers,
                optimistic: true,
                first_contentful_paint,
            },
        )?;
        let simulated_pessimistic_estimate = model.estimate(
            &pessimistic_result,
            &pessimistic_graph,
            &EstimateContext {
                markers,
                optimistic: false,
                first_contentful_paint,
            },
        )?;
        // pessimistic never undercuts optimistic
        if simulated_pessimistic_estimate < optimistic_estimate {
            debug!(
                "{}: pessimistic {:.1}ms raised to optimistic {:.1}ms",
                metric, simulated_pessimistic_estimate, optimistic_estimate
            );
        }
        let pessimistic_estimate = simulated_pessimistic_estimate.max(optimistic_estimate);

        let coefficients = model.coefficients(self.simulator.options().rtt);
        let timing = combine(&coefficients, optimistic_estimate, pessimistic_estimate);
        let timing = model.finalize(timing, first_contentful_paint);
        info!(
            "{}: {:.0}ms (optimistic {:.0}ms, pessimistic {:.0}ms)",
            metric, timing, optimistic_estimate, pessimistic_estimate
        );

        Ok(MetricEstimate {
            metric,
            timing,
            optimistic: Estimate {
                time_in_ms: optimistic_estimate,
                node_count: optimistic_graph.node_count(),
            },
            pessimistic: Estimate {
                time_in_ms: pessimistic_estimate,
                node_count: pessimistic_graph.node_count(),
            },
        })
    }
}

/// `intercept * m + optimistic * T_opt + pessimistic * T_pess`, where a positive intercept
/// is scaled down for optimistic estimates under one second.
pub fn combine(coefficients: &Coefficients, optimistic: f64, pessimistic: f64) -> f64 {
    let intercept_multiplier = if coefficients.intercept > 0.0 {
        (optimistic / 1000.0).min(1.0)
    } else {
        1.0
    };
    coefficients.intercept * intercept_multiplier
        + coefficients.optimistic * optimistic
        + coefficients.pessimistic * pessimistic
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_without_intercept() {
        let coefficients = Coefficients {
            intercept: 0.0,
            optimistic: 0.5,
            pessimistic: 0.5,
        };
        assert_eq!(combine(&coefficients, 100.0, 300.0), 200.0);
    }

    #[test]
    fn test_positive_intercept_scaled_by_optimistic_time() {
        let coefficients = Coefficients {
            intercept: 600.0,
            optimistic: 1.0,
            pessimistic: 0.0,
        };
        assert_eq!(combine(&coefficients, 500.0, 0.0), 800.0);
        assert_eq!(combine(&coefficients, 2000.0, 0.0), 2600.0);
    }

    #[test]
    fn test_negative_intercept_applied_in_full() {
        let coefficients = Coefficients {
            intercept: -250.0,
            optimistic: 1.4,
            pessimistic: 0.4,
        };
        assert_eq!(combine(&coefficients, 1000.0, 1000.0), 1550.0);
    }

    #[test]
    fn test_metric_names_round_trip() {
        for metric in Metric::ALL {
            assert_eq!(metric.as_str().parse::<Metric>(), Ok(metric));
        }
        assert_eq!("tti".parse::<Metric>(), Ok(Metric::Interactive));
    }

    #[test]
    fn test_default_curves_are_valid() {
        for metric in Metric::ALL {
            for form_factor in [FormFactor::Mobile, FormFactor::Desktop] {
                assert!(metric.default_curve(form_factor).validate().is_ok());
            }
        }
    }
}
