// Speed index

use super::{Coefficients, EstimateContext, Metric, MetricModel, require_marker};
use crate::error::MetricError;
use crate::simulator::SimulationResult;
use pagesim_graph::{DependencyGraph, NavigationMarkers};

const COEFFICIENTS: Coefficients = Coefficients {
    intercept: -250.0,
    optimistic: 1.4,
    pessimistic: 0.4,
};

/// RTT at which the coefficients above apply unscaled, and the RTT at which they
/// collapse to a plain average.
const CALIBRATION_RTT: f64 = 150.0;
const BASELINE_RTT: f64 = 30.0;

pub struct SpeedIndex;

/// Speed index approximated from layout tasks: each layout's end time weighted by the
/// log of its duration, no layout counted before first contentful paint.
pub fn layout_based_speed_index(
    result: &SimulationResult,
    graph: &DependencyGraph,
    first_contentful_paint: f64,
) -> f64 {
    let mut total_weighted_time = 0.0;
    let mut total_weight = 0.0;

    for (idx, timing) in result.timings() {
        let Some(compute) = graph.node(idx).as_compute() else {
            continue;
        };
        if !compute.did_perform_layout() {
            continue;
        }
        let weight = (timing.end_time - timing.start_time).log2().max(0.0);
        total_weighted_time += weight * timing.end_time.max(first_contentful_paint);
        total_weight += weight;
    }

    if total_weight == 0.0 {
        return first_contentful_paint;
    }
    total_weighted_time / total_weight
}

impl MetricModel for SpeedIndex {
    fn metric(&self) -> Metric {
        Metric::SpeedIndex
    }

    fn coefficients(&self, rtt: f64) -> Coefficients {
        let multiplier = ((rtt - BASELINE_RTT) / (CALIBRATION_RTT - BASELINE_RTT)).max(0.0);
        Coefficients {
            intercept: COEFFICIENTS.intercept * multiplier,
            optimistic: 0.5 + (COEFFICIENTS.optimistic - 0.5) * multiplier,
            pessimistic: 0.5 + (COEFFICIENTS.pessimistic - 0.5) * multiplier,
        }
    }

    fn optimistic_graph(
        &self,
        graph: &DependencyGraph,
        markers: &NavigationMarkers,
    ) -> Result<DependencyGraph, MetricError> {
        require_marker(markers.speed_index, self.metric(), "speed index")?;
        Ok(graph.clone())
    }

    fn pessimistic_graph(
        &self,
        graph: &DependencyGraph,
        _markers: &NavigationMarkers,
    ) -> Result<DependencyGraph, MetricError> {
        Ok(graph.clone())
    }

    fn estimate(
        &self,
        result: &SimulationResult,
        graph: &DependencyGraph,
        context: &EstimateContext<'_>,
    ) -> Result<f64, MetricError> {
        let observed = require_marker(context.markers.speed_index, self.metric(), "speed index")?;
        if context.optimistic {
            return Ok(observed);
        }

        let first_contentful_paint = context.first_contentful_paint_time().unwrap_or(0.0);
        Ok(layout_based_speed_index(result, graph, first_contentful_paint).max(observed))
    }
}
