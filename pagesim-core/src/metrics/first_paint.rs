// First contentful and first meaningful paint

use super::{Coefficients, EstimateContext, Metric, MetricModel, require_marker};
use crate::error::MetricError;
use crate::simulator::SimulationResult;
use pagesim_graph::{
    ComputeNode, DependencyGraph, InitiatorType, NavigationMarkers, NetworkNode, Node, NodeIndex,
    ResourceType,
};
use std::collections::{HashMap, HashSet};

const PAINT_COEFFICIENTS: Coefficients = Coefficients {
    intercept: 0.0,
    optimistic: 0.5,
    pessimistic: 0.5,
};

struct RenderBlockingNodes {
    cpu_nodes: HashSet<NodeIndex>,
    /// Scripts that would have blocked, but only evaluated after the cutoff.
    definitely_not_render_blocking_urls: HashSet<String>,
}

/// Decides which work a first paint at `cutoff` had to wait for.
fn render_blocking_nodes<N, C>(
    graph: &DependencyGraph,
    cutoff: f64,
    mut treat_as_render_blocking: N,
    mut additional_cpu_nodes: C,
) -> RenderBlockingNodes
where
    N: FnMut(&NetworkNode) -> bool,
    C: FnMut(&ComputeNode) -> bool,
{
    let mut earliest_evaluation: HashMap<&str, (f64, NodeIndex)> = HashMap::new();
    let mut cpu_before_cutoff: Vec<(NodeIndex, &ComputeNode)> = Vec::new();

    for idx in graph.topological_order() {
        let Node::Compute(compute) = graph.node(*idx) else {
            continue;
        };
        if compute.start_time() <= cutoff {
            cpu_before_cutoff.push((*idx, compute));
        }
        for url in compute.evaluate_script_urls() {
            let entry = earliest_evaluation
                .entry(url)
                .or_insert((compute.start_time(), *idx));
            if compute.start_time() < entry.0 {
                *entry = (compute.start_time(), *idx);
            }
        }
    }
    cpu_before_cutoff.sort_by(|a, b| {
        a.1.start_time()
            .total_cmp(&b.1.start_time())
            .then(a.0.cmp(&b.0))
    });
    let before_cutoff: HashSet<NodeIndex> =
        cpu_before_cutoff.iter().map(|(idx, _)| *idx).collect();

    let mut cpu_nodes = HashSet::new();
    let mut definitely_not_render_blocking_urls = HashSet::new();

    for (_, node) in graph.nodes() {
        let Node::Network(network) = node else {
            continue;
        };
        if network.record.resource_type != ResourceType::Script
            || !treat_as_render_blocking(network)
        {
            continue;
        }
        for url in network.record.urls() {
            let Some(&(_, evaluator)) = earliest_evaluation.get(url) else {
                continue;
            };
            if before_cutoff.contains(&evaluator) {
                cpu_nodes.insert(evaluator);
            } else {
                definitely_not_render_blocking_urls.insert(url.to_string());
            }
        }
    }

    let firsts: [fn(&ComputeNode) -> bool; 3] = [
        ComputeNode::did_perform_layout,
        ComputeNode::did_paint,
        ComputeNode::did_parse_html,
    ];
    for first in firsts {
        if let Some((idx, _)) = cpu_before_cutoff
            .iter()
            .find(|(_, compute)| first(*compute))
        {
            cpu_nodes.insert(*idx);
        }
    }

    for (idx, compute) in &cpu_before_cutoff {
        if additional_cpu_nodes(*compute) {
            cpu_nodes.insert(*idx);
        }
    }

    RenderBlockingNodes {
        cpu_nodes,
        definitely_not_render_blocking_urls,
    }
}

/// Everything a first paint at `cutoff` depended on.
///
/// Network requests that ended after the paint are dropped (except the main document),
/// as are scripts evaluated only after it.
pub(crate) fn first_paint_based_graph<N, C>(
    graph: &DependencyGraph,
    cutoff: f64,
    mut treat_as_render_blocking: N,
    additional_cpu_nodes: C,
) -> Result<DependencyGraph, MetricError>
where
    N: FnMut(&NetworkNode) -> bool,
    C: FnMut(&ComputeNode) -> bool,
{
    let blocking = render_blocking_nodes(
        graph,
        cutoff,
        &mut treat_as_render_blocking,
        additional_cpu_nodes,
    );

    Ok(graph.clone_with_relationships(|idx, node| match node {
        Node::Network(network) => {
            let after_paint = network.end_time() > cutoff || network.start_time() > cutoff;
            if after_paint && !network.is_main_document {
                return false;
            }
            if blocking
                .definitely_not_render_blocking_urls
                .contains(&network.record.url)
            {
                return false;
            }
            treat_as_render_blocking(network)
        }
        Node::Compute(_) => blocking.cpu_nodes.contains(&idx),
    })?)
}

fn blocks_optimistically(network: &NetworkNode) -> bool {
    network.has_render_blocking_priority()
        && network.record.initiator_type != InitiatorType::Script
}

pub struct FirstContentfulPaint;

impl MetricModel for FirstContentfulPaint {
    fn metric(&self) -> Metric {
        Metric::FirstContentfulPaint
    }

    fn coefficients(&self, _rtt: f64) -> Coefficients {
        PAINT_COEFFICIENTS
    }

    fn optimistic_graph(
        &self,
        graph: &DependencyGraph,
        markers: &NavigationMarkers,
    ) -> Result<DependencyGraph, MetricError> {
        let cutoff = require_marker(
            markers.first_contentful_paint,
            self.metric(),
            "first contentful paint",
        )?;
        first_paint_based_graph(graph, cutoff, blocks_optimistically, |_| false)
    }

    fn pessimistic_graph(
        &self,
        graph: &DependencyGraph,
        markers: &NavigationMarkers,
    ) -> Result<DependencyGraph, MetricError> {
        let cutoff = require_marker(
            markers.first_contentful_paint,
            self.metric(),
            "first contentful paint",
        )?;
        first_paint_based_graph(
            graph,
            cutoff,
            NetworkNode::has_render_blocking_priority,
            |_| false,
        )
    }
}

pub struct FirstMeaningfulPaint;

impl MetricModel for FirstMeaningfulPaint {
    fn metric(&self) -> Metric {
        Metric::FirstMeaningfulPaint
    }

    fn coefficients(&self, _rtt: f64) -> Coefficients {
        PAINT_COEFFICIENTS
    }

    fn optimistic_graph(
        &self,
        graph: &DependencyGraph,
        markers: &NavigationMarkers,
    ) -> Result<DependencyGraph, MetricError> {
        let cutoff = require_marker(
            markers.first_meaningful_paint,
            self.metric(),
            "first meaningful paint",
        )?;
        first_paint_based_graph(graph, cutoff, blocks_optimistically, |_| false)
    }

    fn pessimistic_graph(
        &self,
        graph: &DependencyGraph,
        markers: &NavigationMarkers,
    ) -> Result<DependencyGraph, MetricError> {
        let cutoff = require_marker(
            markers.first_meaningful_paint,
            self.metric(),
            "first meaningful paint",
        )?;
        first_paint_based_graph(
            graph,
            cutoff,
            NetworkNode::has_render_blocking_priority,
            ComputeNode::did_perform_layout,
        )
    }

    fn estimate(
        &self,
        result: &SimulationResult,
        _graph: &DependencyGraph,
        context: &EstimateContext<'_>,
    ) -> Result<f64, MetricError> {
        let floor = context.first_contentful_paint_time().unwrap_or(0.0);
        Ok(result.completion_time.max(floor))
    }
}
