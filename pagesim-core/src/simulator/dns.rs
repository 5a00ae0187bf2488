// Per-host DNS resolution cache

use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    requested_at: f64,
    resolution_time: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct DnsCache {
    rtt: f64,
    multiplier: f64,
    entries: HashMap<String, CacheEntry>,
}

impl DnsCache {
    pub fn new(rtt: f64, multiplier: f64) -> Self {
        Self {
            rtt,
            multiplier,
            entries: HashMap::new(),
        }
    }

    /// Time a lookup of `host` issued at `requested_at` still has to wait.
    ///
    /// Estimates pass `should_update_cache = false`; only a connection that actually
    /// starts resolving records when the answer arrives.
    pub fn time_until_resolution(
        &mut self,
        host: &str,
        requested_at: f64,
        should_update_cache: bool,
    ) -> f64 {
        // Measured from the original request so the requester sees exactly the same wait.
        if let Some(entry) = self.entries.get(host) {
            let waited = requested_at - entry.requested_at;
            return (entry.resolution_time - waited).max(0.0);
        }

        let resolution_time = self.multiplier * self.rtt;
        if should_update_cache {
            self.entries.insert(
                host.to_string(),
                CacheEntry {
                    requested_at,
                    resolution_time,
                },
            );
        }
        resolution_time
    }
}
