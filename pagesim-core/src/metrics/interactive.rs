// Time to interactive

use super::{Coefficients, EstimateContext, Metric, MetricModel};
use crate::error::MetricError;
use crate::simulator::SimulationResult;
use pagesim_graph::{
    DependencyGraph, NavigationMarkers, Node, NodeKind, ResourcePriority, ResourceType,
};

/// Observed duration a task needs to be kept in the optimistic graph.
const MINIMUM_CPU_TASK_DURATION: f64 = 20.0;
/// Simulated duration that makes a task a long task.
const LONG_TASK_DURATION: f64 = 50.0;

pub struct Interactive;

/// End of the last simulated task longer than `minimum_duration`, or 0 when there is none.
pub fn last_long_task_end_time(
    result: &SimulationResult,
    graph: &DependencyGraph,
    minimum_duration: f64,
) -> f64 {
    result
        .timings()
        .filter(|(idx, timing)| {
            graph.node(*idx).kind() == NodeKind::Compute && timing.duration > minimum_duration
        })
        .map(|(_, timing)| timing.end_time)
        .fold(0.0, f64::max)
}

impl MetricModel for Interactive {
    fn metric(&self) -> Metric {
        Metric::Interactive
    }

    fn coefficients(&self, _rtt: f64) -> Coefficients {
        Coefficients {
            intercept: 0.0,
            optimistic: 0.45,
            pessimistic: 0.55,
        }
    }

    fn optimistic_graph(
        &self,
        graph: &DependencyGraph,
        _markers: &NavigationMarkers,
    ) -> Result<DependencyGraph, MetricError> {
        Ok(graph.clone_with_relationships(|_, node| match node {
            Node::Compute(compute) => compute.duration() > MINIMUM_CPU_TASK_DURATION,
            Node::Network(network) => {
                let record = &network.record;
                let is_image = record.resource_type == ResourceType::Image;
                let is_script = record.resource_type == ResourceType::Script;
                !is_image && (is_script || record.priority >= ResourcePriority::High)
            }
        })?)
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
        let last_long_task = last_long_task_end_time(result, graph, LONG_TASK_DURATION);
        let floor = context.first_contentful_paint_time().unwrap_or(0.0);
        Ok(last_long_task.max(floor))
    }
}
