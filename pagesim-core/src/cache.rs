// Memoization of simulation results across metric estimates

use crate::error::Result;
use crate::options::SimulationOptions;
use crate::simulator::{SimulationResult, Simulator};
use pagesim_graph::DependencyGraph;
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    graph: u64,
    options: u64,
    flexible_ordering: bool,
}

/// Results keyed by graph structure, options and ordering mode.
///
/// Owned by the caller and shared by every estimate of one top-level run; call
/// [`SimulationCache::clear`] before starting an unrelated run.
#[derive(Debug, Default)]
pub struct SimulationCache {
    entries: HashMap<CacheKey, Arc<SimulationResult>>,
    hits: usize,
    misses: usize,
}

impl SimulationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_simulate(
        &mut self,
        simulator: &Simulator,
        graph: &DependencyGraph,
        flexible_ordering: bool,
    ) -> Result<Arc<SimulationResult>> {
        let key = CacheKey {
            graph: graph.fingerprint(),
            options: options_fingerprint(simulator.options()),
            flexible_ordering,
        };

        if let Some(result) = self.entries.get(&key) {
            self.hits += 1;
            debug!("Simulation cache hit for graph {:016x}", key.graph);
            return Ok(Arc::clone(result));
        }

        self.misses += 1;
        let result = Arc::new(simulator.simulate_with(graph, flexible_ordering)?);
        self.entries.insert(key, Arc::clone(&result));
        Ok(result)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }
}

fn options_fingerprint(options: &SimulationOptions) -> u64 {
    let mut hasher = DefaultHasher::new();
    let scalars = [
        options.rtt,
        options.throughput_kbps,
        options.cpu_slowdown_multiplier,
        options.layout_task_multiplier,
        options.maximum_cpu_task_duration,
        options.warmup.dns,
        options.warmup.tcp,
        options.warmup.tls,
        options.default_server_response_time,
    ];
    for value in scalars {
        value.to_bits().hash(&mut hasher);
    }
    options.maximum_concurrent_requests.hash(&mut hasher);
    options.connections_per_origin.hash(&mut hasher);
    for (origin, value) in &options.additional_rtt_by_origin {
        origin.hash(&mut hasher);
        value.to_bits().hash(&mut hasher);
    }
    // separates the two maps
    0xffu8.hash(&mut hasher);
    for (origin, value) in &options.server_response_time_by_origin {
        origin.hash(&mut hasher);
        value.to_bits().hash(&mut hasher);
    }
    hasher.finish()
}
