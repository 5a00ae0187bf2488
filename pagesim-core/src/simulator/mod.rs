// Discrete-event page load simulator

mod connection;
mod dns;
mod pool;

use crate::error::{Result, SimulationError};
use crate::options::SimulationOptions;
use connection::DownloadLimits;
use dns::DnsCache;
use pagesim_graph::{ComputeNode, DependencyGraph, Node, NodeIndex, NodeKind};
use pool::ConnectionPool;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

const MAXIMUM_ITERATIONS: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NodeTiming {
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
}

/// Predicted schedule for one graph under one set of options.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    pub completion_time: f64,
    timings: BTreeMap<NodeIndex, NodeTiming>,
    ids: HashMap<String, NodeIndex>,
}

impl SimulationResult {
    pub fn timing(&self, idx: NodeIndex) -> Option<&NodeTiming> {
        self.timings.get(&idx)
    }

    pub fn timing_by_id(&self, id: &str) -> Option<&NodeTiming> {
        self.ids.get(id).and_then(|idx| self.timings.get(idx))
    }

    /// Timings in arena order.
    pub fn timings(&self) -> impl Iterator<Item = (NodeIndex, &NodeTiming)> + '_ {
        self.timings.iter().map(|(&idx, timing)| (idx, timing))
    }

    pub fn len(&self) -> usize {
        self.timings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timings.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum NodeState {
    NotReady,
    Ready,
    InProgress,
    Complete,
}

#[derive(Debug, Clone, Copy, Default)]
struct Progress {
    start_time: f64,
    time_elapsed: f64,
    time_elapsed_overshoot: f64,
    bytes_downloaded: f64,
    estimated_time_elapsed: f64,
}

pub struct Simulator {
    options: SimulationOptions,
}

impl Simulator {
    pub fn new(options: SimulationOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &SimulationOptions {
        &self.options
    }

    /// Simulates with strict connection reuse ordering.
    pub fn simulate(&self, graph: &DependencyGraph) -> Result<SimulationResult> {
        self.simulate_with(graph, false)
    }

    /// With `flexible_ordering`, requests may use any idle connection regardless of
    /// whether the observed request reused one.
    pub fn simulate_with(
        &self,
        graph: &DependencyGraph,
        flexible_ordering: bool,
    ) -> Result<SimulationResult> {
        info!(
            "Simulating {} nodes (rtt {}ms, throughput {}kbps, cpu x{}, flexible: {})",
            graph.node_count(),
            self.options.rtt,
            self.options.throughput_kbps,
            self.options.cpu_slowdown_multiplier,
            flexible_ordering
        );
        let result = Run::new(graph, &self.options, flexible_ordering).execute()?;
        info!("Simulated completion at {:.1}ms", result.completion_time);
        Ok(result)
    }
}

/// Mutable state of a single simulation.
struct Run<'a> {
    graph: &'a DependencyGraph,
    options: &'a SimulationOptions,
    pool: ConnectionPool<'a>,
    dns: DnsCache,
    states: Vec<NodeState>,
    remaining_dependencies: Vec<usize>,
    progress: Vec<Progress>,
    timings: BTreeMap<NodeIndex, NodeTiming>,
    ready: BTreeSet<NodeIndex>,
    in_progress: BTreeSet<(u8, NodeIndex)>,
}

fn completion_rank(kind: NodeKind) -> u8 {
    match kind {
        NodeKind::Network => 0,
        NodeKind::Compute => 1,
    }
}

impl<'a> Run<'a> {
    fn new(
        graph: &'a DependencyGraph,
        options: &'a SimulationOptions,
        flexible_ordering: bool,
    ) -> Self {
        let count = graph.node_count();
        let remaining_dependencies = graph
            .indices()
            .map(|idx| graph.dependencies(idx).len())
            .collect();

        Self {
            graph,
            options,
            pool: ConnectionPool::new(graph, options, flexible_ordering),
            dns: DnsCache::new(options.rtt, options.warmup.dns),
            states: vec![NodeState::NotReady; count],
            remaining_dependencies,
            progress: vec![Progress::default(); count],
            timings: BTreeMap::new(),
            ready: BTreeSet::new(),
            in_progress: BTreeSet::new(),
        }
    }

    fn execute(mut self) -> Result<SimulationResult> {
        let mut total_elapsed = 0.0;
        let mut iterations = 0;

        self.mark_ready(self.graph.root());

        while !self.ready.is_empty() || !self.in_progress.is_empty() {
            iterations += 1;
            if iterations > MAXIMUM_ITERATIONS {
                return Err(SimulationError::DepthExceeded(MAXIMUM_ITERATIONS));
            }

            self.start_ready_nodes(total_elapsed);
            if self.in_progress.is_empty() {
                return Err(SimulationError::InvalidGraph(format!(
                    "{} nodes are ready but none could start",
                    self.ready.len()
                )));
            }

            self.update_network_capacity();
            let step = self.next_completion_time();
            if !step.is_finite() {
                return Err(SimulationError::InvalidGraph(format!(
                    "no in-progress node can finish (step {})",
                    step
                )));
            }

            total_elapsed += step;
            self.advance(step, total_elapsed);
        }

        if self.timings.len() != self.graph.node_count() {
            return Err(SimulationError::InvalidGraph(format!(
                "only {} of {} nodes were reachable from the root",
                self.timings.len(),
                self.graph.node_count()
            )));
        }

        let completion_time = self
            .timings
            .values()
            .map(|timing| timing.end_time)
            .fold(0.0, f64::max);
        let ids = self
            .graph
            .nodes()
            .map(|(idx, node)| (node.id().to_string(), idx))
            .collect();

        Ok(SimulationResult {
            completion_time,
            timings: self.timings,
            ids,
        })
    }

    fn mark_ready(&mut self, idx: NodeIndex) {
        self.states[idx.index()] = NodeState::Ready;
        self.ready.insert(idx);
    }

    fn in_progress_of(&self, kind: NodeKind) -> usize {
        self.in_progress
            .iter()
            .filter(|(rank, _)| *rank == completion_rank(kind))
            .count()
    }

    fn start_ready_nodes(&mut self, total_elapsed: f64) {
        let mut queue: Vec<NodeIndex> = self.ready.iter().copied().collect();
        queue.sort_by(|a, b| {
            let a_start = self.graph.node(*a).start_time();
            let b_start = self.graph.node(*b).start_time();
            a_start.total_cmp(&b_start).then(a.cmp(b))
        });

        for idx in queue {
            if self.try_start(idx) {
                self.ready.remove(&idx);
                self.states[idx.index()] = NodeState::InProgress;
                self.in_progress
                    .insert((completion_rank(self.graph.node(idx).kind()), idx));
                self.progress[idx.index()] = Progress {
                    start_time: total_elapsed,
                    ..Default::default()
                };
                debug!(
                    "Started {} at {:.1}ms",
                    self.graph.node(idx).id(),
                    total_elapsed
                );
            }
        }
    }

    fn try_start(&mut self, idx: NodeIndex) -> bool {
        let graph = self.graph;
        match graph.node(idx) {
            Node::Compute(_) => self.in_progress_of(NodeKind::Compute) == 0,
            Node::Network(network) => {
                if self.in_progress_of(NodeKind::Network)
                    >= self.options.maximum_concurrent_requests
                {
                    return false;
                }
                network.is_connectionless() || self.pool.acquire(idx, &network.record).is_some()
            }
        }
    }

    fn update_network_capacity(&mut self) {
        let in_flight = self.in_progress_of(NodeKind::Network);
        if in_flight == 0 {
            return;
        }
        self.pool
            .set_throughput(self.options.throughput_bps() / in_flight as f64);
    }

    fn next_completion_time(&mut self) -> f64 {
        let active: Vec<NodeIndex> = self.in_progress.iter().map(|&(_, idx)| idx).collect();
        let mut minimum = f64::INFINITY;
        for idx in active {
            let estimate = self.estimate_time_remaining(idx);
            self.progress[idx.index()].estimated_time_elapsed = estimate;
            minimum = minimum.min(estimate);
        }
        minimum
    }

    fn cpu_duration(&self, compute: &ComputeNode) -> f64 {
        let multiplier = if compute.did_perform_layout() {
            self.options.cpu_slowdown_multiplier * self.options.layout_task_multiplier
        } else {
            self.options.cpu_slowdown_multiplier
        };
        (compute.duration() * multiplier)
            .round()
            .min(self.options.maximum_cpu_task_duration)
    }

    fn connectionless_duration(&self, idx: NodeIndex) -> Option<f64> {
        let network = self.graph.node(idx).as_network()?;
        let size_in_mb = network.record.resource_size as f64 / 1024.0 / 1024.0;
        if network.from_disk_cache() {
            Some(8.0 + 20.0 * size_in_mb)
        } else if network.is_non_network_protocol() {
            Some(2.0 + 10.0 * size_in_mb)
        } else {
            None
        }
    }

    fn estimate_time_remaining(&mut self, idx: NodeIndex) -> f64 {
        let graph = self.graph;
        let progress = self.progress[idx.index()];

        match graph.node(idx) {
            Node::Compute(compute) => self.cpu_duration(compute) - progress.time_elapsed,
            Node::Network(network) => {
                if let Some(total) = self.connectionless_duration(idx) {
                    return total - progress.time_elapsed;
                }

                let record = &network.record;
                let dns_resolution_time =
                    self.dns
                        .time_until_resolution(&record.host, progress.start_time, false);
                let Some(connection) = self.pool.connection_for(idx) else {
                    return f64::INFINITY;
                };
                let download = connection.simulate_download_until(
                    record.transfer_size as f64 - progress.bytes_downloaded,
                    DownloadLimits {
                        time_already_elapsed: progress.time_elapsed,
                        maximum_time_to_elapse: None,
                        dns_resolution_time,
                    },
                );
                download.time_elapsed + progress.time_elapsed_overshoot
            }
        }
    }

    fn advance(&mut self, step: f64, total_elapsed: f64) {
        let active: Vec<NodeIndex> = self.in_progress.iter().map(|&(_, idx)| idx).collect();
        for idx in active {
            let finished = self.progress[idx.index()].estimated_time_elapsed == step;
            self.update_progress(idx, step, finished);
            if finished {
                self.complete(idx, total_elapsed);
            }
        }
    }

    fn update_progress(&mut self, idx: NodeIndex, step: f64, finished: bool) {
        let graph = self.graph;
        let network = match graph.node(idx) {
            Node::Network(network) if !network.is_connectionless() => network,
            _ => {
                if !finished {
                    self.progress[idx.index()].time_elapsed += step;
                }
                return;
            }
        };

        let record = &network.record;
        let progress = self.progress[idx.index()];
        let dns_resolution_time =
            self.dns
                .time_until_resolution(&record.host, progress.start_time, true);
        let Some(connection) = self.pool.connection_for(idx) else {
            return;
        };

        let download = connection.simulate_download_until(
            record.transfer_size as f64 - progress.bytes_downloaded,
            DownloadLimits {
                time_already_elapsed: progress.time_elapsed,
                maximum_time_to_elapse: Some(step - progress.time_elapsed_overshoot),
                dns_resolution_time,
            },
        );
        connection.set_congestion_window(download.congestion_window);

        if finished {
            connection.set_warmed(true);
        } else {
            let progress = &mut self.progress[idx.index()];
            progress.time_elapsed += download.time_elapsed;
            progress.time_elapsed_overshoot += download.time_elapsed - step;
            progress.bytes_downloaded += download.bytes_downloaded;
        }
    }

    fn complete(&mut self, idx: NodeIndex, total_elapsed: f64) {
        let graph = self.graph;
        let node = graph.node(idx);
        self.in_progress.remove(&(completion_rank(node.kind()), idx));
        self.states[idx.index()] = NodeState::Complete;
        self.pool.release(idx);

        let start_time = self.progress[idx.index()].start_time;
        self.timings.insert(
            idx,
            NodeTiming {
                start_time,
                end_time: total_elapsed,
                duration: total_elapsed - start_time,
            },
        );
        debug!("Completed {} at {:.1}ms", node.id(), total_elapsed);

        for dependent in graph.dependents(idx) {
            let remaining = &mut self.remaining_dependencies[dependent.index()];
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 && self.states[dependent.index()] == NodeState::NotReady {
                self.mark_ready(dependent);
            }
        }
    }
}
