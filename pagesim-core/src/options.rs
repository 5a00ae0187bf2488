// Simulation options, throttling presets and their validation

use crate::error::OptionsError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Connection warm-up costs, each expressed as a multiple of the round-trip time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarmupMultipliers {
    pub dns: f64,
    /// SYN, SYN-ACK and the ACK carrying the request: three one-way trips.
    pub tcp: f64,
    /// ClientHello/ServerHello, assuming TLS false start.
    pub tls: f64,
}

impl Default for WarmupMultipliers {
    fn default() -> Self {
        Self {
            dns: 2.0,
            tcp: 1.5,
            tls: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThrottlingPreset {
    MobileSlow4G,
    MobileRegular3G,
    DesktopDense4G,
}

impl ThrottlingPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThrottlingPreset::MobileSlow4G => "mobile-slow-4g",
            ThrottlingPreset::MobileRegular3G => "mobile-regular-3g",
            ThrottlingPreset::DesktopDense4G => "desktop-dense-4g",
        }
    }

    /// (rtt ms, throughput kbps, cpu slowdown)
    fn settings(&self) -> (f64, f64, f64) {
        match self {
            ThrottlingPreset::MobileSlow4G => (150.0, 1.6 * 1024.0, 4.0),
            ThrottlingPreset::MobileRegular3G => (300.0, 700.0, 4.0),
            ThrottlingPreset::DesktopDense4G => (40.0, 10.0 * 1024.0, 1.0),
        }
    }
}

impl FromStr for ThrottlingPreset {
    type Err = OptionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mobile-slow-4g" | "mobile" => Ok(ThrottlingPreset::MobileSlow4G),
            "mobile-regular-3g" | "3g" => Ok(ThrottlingPreset::MobileRegular3G),
            "desktop-dense-4g" | "desktop" => Ok(ThrottlingPreset::DesktopDense4G),
            _ => Err(OptionsError::UnknownPreset(s.to_string())),
        }
    }
}

impl fmt::Display for ThrottlingPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hypothetical network and CPU conditions to simulate under.
///
/// Every field has a default (the `mobile-slow-4g` preset plus calibration constants),
/// so an options file only needs the fields it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationOptions {
    /// Round-trip time in ms.
    pub rtt: f64,
    /// Total downlink in kbps. `f64::INFINITY` means unlimited.
    pub throughput_kbps: f64,
    pub cpu_slowdown_multiplier: f64,
    /// Cap on in-flight network requests across all origins.
    pub maximum_concurrent_requests: usize,
    /// Extra RTT (ms) for specific origins, on top of `rtt`.
    pub additional_rtt_by_origin: BTreeMap<String, f64>,
    pub server_response_time_by_origin: BTreeMap<String, f64>,
    /// Applied on top of the CPU slowdown for tasks that performed layout.
    pub layout_task_multiplier: f64,
    pub maximum_cpu_task_duration: f64,
    pub warmup: WarmupMultipliers,
    pub default_server_response_time: f64,
    pub connections_per_origin: usize,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self::from_preset(ThrottlingPreset::MobileSlow4G)
    }
}

impl SimulationOptions {
    pub fn from_preset(preset: ThrottlingPreset) -> Self {
        let (rtt, throughput_kbps, cpu_slowdown_multiplier) = preset.settings();
        Self {
            rtt,
            throughput_kbps,
            cpu_slowdown_multiplier,
            maximum_concurrent_requests: 10,
            additional_rtt_by_origin: BTreeMap::new(),
            server_response_time_by_origin: BTreeMap::new(),
            layout_task_multiplier: 0.5,
            maximum_cpu_task_duration: 10_000.0,
            warmup: WarmupMultipliers::default(),
            default_server_response_time: 30.0,
            connections_per_origin: 6,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, OptionsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, OptionsError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn with_rtt(mut self, rtt: f64) -> Self {
        self.rtt = rtt;
        self
    }

    pub fn with_throughput_kbps(mut self, throughput_kbps: f64) -> Self {
        self.throughput_kbps = throughput_kbps;
        self
    }

    pub fn with_cpu_slowdown(mut self, multiplier: f64) -> Self {
        self.cpu_slowdown_multiplier = multiplier;
        self
    }

    pub fn with_maximum_concurrent_requests(mut self, maximum: usize) -> Self {
        self.maximum_concurrent_requests = maximum;
        self
    }

    pub fn with_additional_rtt(mut self, origin: &str, rtt: f64) -> Self {
        self.additional_rtt_by_origin.insert(origin.to_string(), rtt);
        self
    }

    pub fn with_server_response_time(mut self, origin: &str, ms: f64) -> Self {
        self.server_response_time_by_origin
            .insert(origin.to_string(), ms);
        self
    }

    pub fn with_warmup(mut self, warmup: WarmupMultipliers) -> Self {
        self.warmup = warmup;
        self
    }

    /// Throughput in bits per second.
    pub fn throughput_bps(&self) -> f64 {
        self.throughput_kbps * 1024.0
    }

    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.rtt.is_nan() || self.rtt < 0.0 || self.rtt.is_infinite() {
            return Err(OptionsError::InvalidRtt(self.rtt));
        }
        if self.throughput_kbps.is_nan() || self.throughput_kbps <= 0.0 {
            return Err(OptionsError::InvalidThroughput(self.throughput_kbps));
        }
        if !self.cpu_slowdown_multiplier.is_finite() || self.cpu_slowdown_multiplier <= 0.0 {
            return Err(OptionsError::InvalidCpuSlowdown(
                self.cpu_slowdown_multiplier,
            ));
        }
        if self.maximum_concurrent_requests == 0 {
            return Err(OptionsError::InvalidMaximumRequests);
        }
        if self.connections_per_origin == 0 {
            return Err(OptionsError::InvalidConnectionsPerOrigin);
        }

        let scalars = [
            ("layout_task_multiplier", self.layout_task_multiplier),
            ("maximum_cpu_task_duration", self.maximum_cpu_task_duration),
            ("warmup.dns", self.warmup.dns),
            ("warmup.tcp", self.warmup.tcp),
            ("warmup.tls", self.warmup.tls),
            (
                "default_server_response_time",
                self.default_server_response_time,
            ),
        ];
        for (name, value) in scalars {
            check_non_negative(name, value)?;
        }
        for (origin, value) in &self.additional_rtt_by_origin {
            check_non_negative(&format!("additional_rtt_by_origin[{}]", origin), *value)?;
        }
        for (origin, value) in &self.server_response_time_by_origin {
            check_non_negative(
                &format!("server_response_time_by_origin[{}]", origin),
                *value,
            )?;
        }

        Ok(())
    }
}

fn check_non_negative(name: &str, value: f64) -> Result<(), OptionsError> {
    if !value.is_finite() || value < 0.0 {
        return Err(OptionsError::InvalidValue {
            name: name.to_string(),
            value,
        });
    }
    Ok(())
}
