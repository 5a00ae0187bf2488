use super::first_paint::first_paint_based_graph;
use super::{Coefficients, EstimateContext, Metric, MetricModel, require_marker};
use crate::error::MetricError;
use crate::simulator::SimulationResult;
use pagesim_graph::{ComputeNode, DependencyGraph, NavigationMarkers, NetworkNode, Node};

pub struct LargestContentfulPaint;

fn is_not_low_priority_image(network: &NetworkNode) -> bool {
    !network.is_low_priority_image()
}

impl MetricModel for LargestContentfulPaint {
    fn metric(&self) -> Metric {
        Metric::LargestContentfulPaint
    }

    fn coefficients(&self, _rtt: f64) -> Coefficients {
        Coefficients {
            intercept: 0.0,
            optimistic: 0.5,
            pessimistic: 0.5,
        }
    }

    fn optimistic_graph(
        &self,
        graph: &DependencyGraph,
        markers: &NavigationMarkers,
    ) -> Result<DependencyGraph, MetricError> {
        let cutoff = require_marker(
            markers.largest_contentful_paint,
            self.metric(),
            "largest contentful paint",
        )?;
        first_paint_based_graph(graph, cutoff, is_not_low_priority_image, |_| false)
    }

    fn pessimistic_graph(
        &self,
        graph: &DependencyGraph,
        markers: &NavigationMarkers,
    ) -> Result<DependencyGraph, MetricError> {
        let cutoff = require_marker(
            markers.largest_contentful_paint,
            self.metric(),
            "largest contentful paint",
        )?;
        first_paint_based_graph(graph, cutoff, |_| true, ComputeNode::did_perform_layout)
    }

    /// Latest finish among nodes that are not offscreen (low priority) images.
    fn estimate(
        &self,
        result: &SimulationResult,
        graph: &DependencyGraph,
        _context: &EstimateContext<'_>,
    ) -> Result<f64, MetricError> {
        Ok(result
            .timings()
            .filter(|(idx, _)| match graph.node(*idx) {
                Node::Network(network) => !network.is_low_priority_image(),
                Node::Compute(_) => true,
            })
            .map(|(_, timing)| timing.end_time)
            .fold(0.0, f64::max))
    }
}
