// TCP connection model used by the simulator

use crate::options::WarmupMultipliers;

pub(crate) const TCP_SEGMENT_SIZE: f64 = 1460.0;
pub(crate) const INITIAL_CONGESTION_WINDOW: f64 = 10.0;

/// Outcome of advancing a download on a connection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DownloadProgress {
    pub round_trips: u32,
    pub time_elapsed: f64,
    pub bytes_downloaded: f64,
    pub congestion_window: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DownloadLimits {
    pub time_already_elapsed: f64,
    pub maximum_time_to_elapse: Option<f64>,
    pub dns_resolution_time: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct Connection {
    pub origin: String,
    pub slot: usize,
    rtt: f64,
    /// Bits per second currently allotted to this connection.
    throughput: f64,
    server_latency: f64,
    ssl: bool,
    h2: bool,
    warmup: WarmupMultipliers,
    warmed: bool,
    congestion_window: f64,
    in_flight: usize,
}

impl Connection {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        origin: &str,
        slot: usize,
        rtt: f64,
        throughput: f64,
        server_latency: f64,
        ssl: bool,
        h2: bool,
        warmup: WarmupMultipliers,
    ) -> Self {
        Self {
            origin: origin.to_string(),
            slot,
            rtt,
            throughput,
            server_latency,
            ssl,
            h2,
            warmup,
            warmed: false,
            congestion_window: INITIAL_CONGESTION_WINDOW,
            in_flight: 0,
        }
    }

    pub fn is_warm(&self) -> bool {
        self.warmed
    }

    pub fn set_warmed(&mut self, warmed: bool) {
        self.warmed = warmed;
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight == 0
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn assign(&mut self) {
        self.in_flight += 1;
    }

    pub fn release(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    pub fn congestion_window(&self) -> f64 {
        self.congestion_window
    }

    pub fn set_congestion_window(&mut self, congestion_window: f64) {
        self.congestion_window = congestion_window;
    }

    pub fn set_throughput(&mut self, throughput: f64) {
        self.throughput = throughput;
    }

    /// Segments the allotted throughput can carry in one round trip. Fractional, so the
    /// cap grows smoothly with RTT.
    fn maximum_congestion_window(&self) -> f64 {
        if !self.throughput.is_finite() {
            return f64::INFINITY;
        }
        let bytes_per_second = self.throughput / 8.0;
        let seconds_per_round_trip = self.rtt / 1000.0;
        let bytes_per_round_trip = bytes_per_second * seconds_per_round_trip;
        bytes_per_round_trip / TCP_SEGMENT_SIZE
    }

    /// Milliseconds to drain `bytes` at the full allotted throughput.
    fn time_at_line_rate(&self, bytes: f64) -> f64 {
        bytes * 8.0 / self.throughput * 1000.0
    }

    /// Time to first byte for the next request, before any of it has elapsed.
    fn time_to_first_byte(&self, dns_resolution_time: f64) -> (f64, f64) {
        let two_way_latency = self.rtt;
        let one_way_latency = two_way_latency / 2.0;

        let handshake_and_request = if self.warmed {
            one_way_latency
        } else {
            let tls = if self.ssl {
                self.warmup.tls * two_way_latency
            } else {
                0.0
            };
            dns_resolution_time + self.warmup.tcp * two_way_latency + tls
        };

        let ttfb = if self.warmed && self.h2 {
            0.0
        } else {
            handshake_and_request + self.server_latency + one_way_latency
        };
        (handshake_and_request, ttfb)
    }

    /// Downloads up to `bytes_to_download`, stopping once `maximum_time_to_elapse` is spent.
    pub fn simulate_download_until(
        &self,
        bytes_to_download: f64,
        limits: DownloadLimits,
    ) -> DownloadProgress {
        let two_way_latency = self.rtt;
        let maximum_congestion_window = self.maximum_congestion_window();
        let maximum_time_to_elapse = limits.maximum_time_to_elapse.unwrap_or(f64::INFINITY);

        let (handshake_and_request, time_to_first_byte) =
            self.time_to_first_byte(limits.dns_resolution_time);
        let mut round_trips = if two_way_latency > 0.0 {
            (handshake_and_request / two_way_latency).ceil() as u32
        } else {
            0
        };

        let time_elapsed_for_ttfb = (time_to_first_byte - limits.time_already_elapsed).max(0.0);
        let maximum_download_time_to_elapse = maximum_time_to_elapse - time_elapsed_for_ttfb;

        let mut congestion_window = self.congestion_window.min(maximum_congestion_window);
        let mut total_bytes_downloaded = 0.0;
        if time_elapsed_for_ttfb > 0.0 {
            total_bytes_downloaded = congestion_window * TCP_SEGMENT_SIZE;
        } else {
            round_trips = 0;
        }

        let mut download_time_elapsed = 0.0;
        let mut bytes_remaining = bytes_to_download - total_bytes_downloaded;
        while bytes_remaining > 0.0 && download_time_elapsed <= maximum_download_time_to_elapse {
            let next_window = (congestion_window * 2.0).max(1.0);

            // Throughput-bound: the rest streams at line rate instead of whole windows.
            if next_window >= maximum_congestion_window {
                congestion_window = maximum_congestion_window;
                let time_to_finish = self.time_at_line_rate(bytes_remaining);
                let time_available = maximum_download_time_to_elapse - download_time_elapsed;
                let (time_spent, bytes) = if time_to_finish <= time_available {
                    (time_to_finish, bytes_remaining)
                } else {
                    (
                        time_available,
                        time_available / 1000.0 * self.throughput / 8.0,
                    )
                };
                if two_way_latency > 0.0 {
                    round_trips += (time_spent / two_way_latency).ceil() as u32;
                }
                download_time_elapsed += time_spent;
                total_bytes_downloaded += bytes;
                break;
            }

            round_trips += 1;
            congestion_window = next_window;

            // A window is paced across its round trip; the last one ends with the resource.
            let bytes_downloaded_in_window = congestion_window * TCP_SEGMENT_SIZE;
            if bytes_remaining < bytes_downloaded_in_window {
                download_time_elapsed +=
                    two_way_latency * bytes_remaining / bytes_downloaded_in_window;
            } else {
                download_time_elapsed += two_way_latency;
            }
            total_bytes_downloaded += bytes_downloaded_in_window;
            bytes_remaining -= bytes_downloaded_in_window;
        }

        let time_elapsed = time_elapsed_for_ttfb + download_time_elapsed;
        let bytes_downloaded = total_bytes_downloaded.min(bytes_to_download).max(0.0);

        DownloadProgress {
            round_trips,
            time_elapsed,
            bytes_downloaded,
            congestion_window,
        }
    }
}
