// Per-origin connection pool

use super::connection::Connection;
use crate::options::SimulationOptions;
use pagesim_graph::{DependencyGraph, NetworkRecord, NodeIndex};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

/// What the observed records say about one origin.
#[derive(Debug, Clone, Default)]
struct OriginProfile {
    connection_ids: BTreeSet<u64>,
    non_reused_records: usize,
    all_reused: bool,
    h2: bool,
    tls: bool,
    server_response_time: Option<f64>,
}

#[derive(Debug)]
pub(crate) struct ConnectionPool<'a> {
    options: &'a SimulationOptions,
    profiles: HashMap<String, OriginProfile>,
    connections: Vec<Connection>,
    by_origin: HashMap<String, Vec<usize>>,
    assignments: HashMap<NodeIndex, usize>,
    flexible_ordering: bool,
}

impl<'a> ConnectionPool<'a> {
    pub fn new(
        graph: &DependencyGraph,
        options: &'a SimulationOptions,
        flexible_ordering: bool,
    ) -> Self {
        let mut profiles: HashMap<String, OriginProfile> = HashMap::new();

        for (_, node) in graph.nodes() {
            let Some(network) = node.as_network() else {
                continue;
            };
            if network.is_connectionless() {
                continue;
            }

            let record = &network.record;
            let profile = profiles
                .entry(record.origin.clone())
                .or_insert_with(|| OriginProfile {
                    all_reused: true,
                    h2: record.is_h2(),
                    tls: record.is_tls(),
                    ..Default::default()
                });

            if let Some(id) = record.connection_id {
                profile.connection_ids.insert(id);
            }
            if !record.connection_reused {
                profile.non_reused_records += 1;
                profile.all_reused = false;
            }
            if profile.server_response_time.is_none() {
                profile.server_response_time = record.server_response_time;
            }
        }

        Self {
            options,
            profiles,
            connections: Vec::new(),
            by_origin: HashMap::new(),
            assignments: HashMap::new(),
            flexible_ordering,
        }
    }

    fn open_origin(&mut self, record: &NetworkRecord) -> Vec<usize> {
        if let Some(slots) = self.by_origin.get(&record.origin) {
            return slots.clone();
        }

        let profile = self
            .profiles
            .get(&record.origin)
            .cloned()
            .unwrap_or_else(|| OriginProfile {
                h2: record.is_h2(),
                tls: record.is_tls(),
                non_reused_records: 1,
                ..Default::default()
            });

        let mut count = if profile.connection_ids.is_empty() {
            profile.non_reused_records.max(1)
        } else {
            profile.connection_ids.len()
        };
        if !profile.h2 {
            count = count.max(self.options.connections_per_origin);
        }

        let rtt = self.options.rtt
            + self
                .options
                .additional_rtt_by_origin
                .get(&record.origin)
                .copied()
                .unwrap_or(0.0);
        let server_latency = self
            .options
            .server_response_time_by_origin
            .get(&record.origin)
            .copied()
            .or(profile.server_response_time)
            .unwrap_or(self.options.default_server_response_time);

        let mut slots = Vec::with_capacity(count);
        for slot in 0..count {
            let mut connection = Connection::new(
                &record.origin,
                slot,
                rtt,
                self.options.throughput_bps(),
                server_latency,
                profile.tls,
                profile.h2,
                self.options.warmup,
            );
            if profile.all_reused && slot == 0 {
                connection.set_warmed(true);
            }
            slots.push(self.connections.len());
            self.connections.push(connection);
        }

        debug!(
            "Opened {} connections to {} (rtt {}ms, server latency {}ms)",
            count, record.origin, rtt, server_latency
        );
        self.by_origin.insert(record.origin.clone(), slots.clone());
        slots
    }

    /// Assigns an idle connection on the record's origin to `node`, if one is available.
    pub fn acquire(&mut self, node: NodeIndex, record: &NetworkRecord) -> Option<usize> {
        if let Some(&existing) = self.assignments.get(&node) {
            return Some(existing);
        }

        let slots = self.open_origin(record);
        let idle: Vec<usize> = slots
            .iter()
            .copied()
            .filter(|&id| self.connections[id].is_idle())
            .collect();

        let mut chosen = self.best_of(idle.iter().copied().filter(|&id| {
            self.flexible_ordering || self.connections[id].is_warm() == record.connection_reused
        }));

        if chosen.is_none() && !self.flexible_ordering && idle.len() == slots.len() {
            warn!(
                "No connection to {} matches observed reuse of {}, using any idle connection",
                record.origin, record.url
            );
            chosen = self.best_of(idle.into_iter());
        }

        let id = chosen?;
        self.connections[id].assign();
        self.assignments.insert(node, id);
        Some(id)
    }

    /// Largest congestion window wins, lowest slot breaks ties.
    fn best_of(&self, candidates: impl Iterator<Item = usize>) -> Option<usize> {
        candidates.fold(None, |best: Option<usize>, id| match best {
            Some(current)
                if self.connections[current].congestion_window()
                    >= self.connections[id].congestion_window() =>
            {
                Some(current)
            }
            _ => Some(id),
        })
    }

    pub fn connection_for(&mut self, node: NodeIndex) -> Option<&mut Connection> {
        let id = *self.assignments.get(&node)?;
        self.connections.get_mut(id)
    }

    pub fn release(&mut self, node: NodeIndex) {
        if let Some(id) = self.assignments.remove(&node) {
            self.connections[id].release();
        }
    }

    pub fn set_throughput(&mut self, throughput: f64) {
        for connection in &mut self.connections {
            connection.set_throughput(throughput);
        }
    }

    pub fn opened(&self) -> usize {
        self.connections.len()
    }
}
