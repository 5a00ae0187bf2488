use crate::error::{GraphError, Result};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use url::Url;

/// Schemes that never touch the network stack.
const NON_NETWORK_SCHEMES: &[&str] = &[
    "blob",
    "data",
    "intent",
    "file",
    "filesystem",
    "chrome-extension",
];

const TLS_SCHEMES: &[&str] = &["https", "wss"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ResourceType {
    Document,
    Script,
    Stylesheet,
    Image,
    Font,
    Media,
    Xhr,
    Fetch,
    #[default]
    Other,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Document => "document",
            ResourceType::Script => "script",
            ResourceType::Stylesheet => "stylesheet",
            ResourceType::Image => "image",
            ResourceType::Font => "font",
            ResourceType::Media => "media",
            ResourceType::Xhr => "xhr",
            ResourceType::Fetch => "fetch",
            ResourceType::Other => "other",
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum ResourcePriority {
    VeryLow,
    Low,
    #[default]
    Medium,
    High,
    VeryHigh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum InitiatorType {
    Parser,
    Script,
    Preload,
    #[default]
    Other,
}

/// A single fetch as observed in the original page load.
///
/// Times are milliseconds relative to navigation start. Sizes are bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRecord {
    pub url: String,
    pub origin: String,
    pub host: String,
    pub resource_type: ResourceType,
    pub priority: ResourcePriority,
    pub transfer_size: u64,
    pub resource_size: u64,
    pub protocol: String,
    pub connection_id: Option<u64>,
    pub connection_reused: bool,
    pub from_disk_cache: bool,
    pub initiator_type: InitiatorType,
    /// Id of the graph node that initiated this request, if known.
    pub initiator: Option<String>,
    /// URLs that redirected to `url`, oldest first.
    pub redirects: Vec<String>,
    /// Observed server response time in ms, if the capture measured it.
    pub server_response_time: Option<f64>,
    pub start_time: f64,
    pub end_time: f64,
}

impl NetworkRecord {
    pub fn new(url: &str) -> Result<Self> {
        let parsed =
            Url::parse(url).map_err(|e| GraphError::InvalidUrl(format!("{}: {}", url, e)))?;

        Ok(Self {
            url: url.to_string(),
            origin: parsed.origin().ascii_serialization(),
            host: parsed.host_str().unwrap_or_default().to_string(),
            resource_type: ResourceType::Other,
            priority: ResourcePriority::Medium,
            transfer_size: 0,
            resource_size: 0,
            protocol: "http/1.1".to_string(),
            connection_id: None,
            connection_reused: false,
            from_disk_cache: false,
            initiator_type: InitiatorType::Other,
            initiator: None,
            redirects: Vec::new(),
            server_response_time: None,
            start_time: 0.0,
            end_time: 0.0,
        })
    }

    pub fn with_resource_type(mut self, resource_type: ResourceType) -> Self {
        self.resource_type = resource_type;
        self
    }

    pub fn with_priority(mut self, priority: ResourcePriority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets both transfer and resource size.
    pub fn with_size(mut self, bytes: u64) -> Self {
        self.transfer_size = bytes;
        self.resource_size = bytes;
        self
    }

    pub fn with_protocol(mut self, protocol: &str) -> Self {
        self.protocol = protocol.to_string();
        self
    }

    pub fn with_connection(mut self, connection_id: u64, reused: bool) -> Self {
        self.connection_id = Some(connection_id);
        self.connection_reused = reused;
        self
    }

    pub fn with_initiator(mut self, initiator_type: InitiatorType, node_id: Option<&str>) -> Self {
        self.initiator_type = initiator_type;
        self.initiator = node_id.map(String::from);
        self
    }

    pub fn with_redirects(mut self, redirects: Vec<String>) -> Self {
        self.redirects = redirects;
        self
    }

    pub fn with_server_response_time(mut self, ms: f64) -> Self {
        self.server_response_time = Some(ms);
        self
    }

    pub fn with_disk_cache(mut self, from_disk_cache: bool) -> Self {
        self.from_disk_cache = from_disk_cache;
        self
    }

    pub fn with_timing(mut self, start_time: f64, end_time: f64) -> Self {
        self.start_time = start_time;
        self.end_time = end_time;
        self
    }

    pub fn scheme(&self) -> &str {
        self.url.split_once(':').map(|(scheme, _)| scheme).unwrap_or("")
    }

    pub fn is_non_network_protocol(&self) -> bool {
        NON_NETWORK_SCHEMES.contains(&self.scheme())
    }

    pub fn is_tls(&self) -> bool {
        TLS_SCHEMES.contains(&self.scheme())
    }

    pub fn is_h2(&self) -> bool {
        self.protocol == "h2"
    }

    /// Feeds every field into `state`; floats by bit pattern.
    pub fn hash_payload<H: Hasher>(&self, state: &mut H) {
        self.url.hash(state);
        self.origin.hash(state);
        self.host.hash(state);
        self.resource_type.hash(state);
        self.priority.hash(state);
        self.transfer_size.hash(state);
        self.resource_size.hash(state);
        self.protocol.hash(state);
        self.connection_id.hash(state);
        self.connection_reused.hash(state);
        self.from_disk_cache.hash(state);
        self.initiator_type.hash(state);
        self.initiator.hash(state);
        self.redirects.hash(state);
        self.server_response_time.map(f64::to_bits).hash(state);
        self.start_time.to_bits().hash(state);
        self.end_time.to_bits().hash(state);
    }

    /// Every URL this request answered to, redirect hops first.
    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.redirects
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.url.as_str()))
    }
}

/// A trace event nested inside a main-thread task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildEvent {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
}

impl ChildEvent {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            url: None,
        }
    }

    pub fn evaluate_script(url: &str) -> Self {
        Self {
            name: "EvaluateScript".to_string(),
            url: Some(url.to_string()),
        }
    }
}

/// A top-level main-thread task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEvent {
    #[serde(default = "default_task_name")]
    pub name: String,
    pub start_time: f64,
    pub duration: f64,
    #[serde(default)]
    pub children: Vec<ChildEvent>,
}

fn default_task_name() -> String {
    "RunTask".to_string()
}

impl TaskEvent {
    pub fn new(start_time: f64, duration: f64) -> Self {
        Self {
            name: default_task_name(),
            start_time,
            duration,
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: ChildEvent) -> Self {
        self.children.push(child);
        self
    }

    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    pub fn hash_payload<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.start_time.to_bits().hash(state);
        self.duration.to_bits().hash(state);
        for child in &self.children {
            child.name.hash(state);
            child.url.hash(state);
        }
    }
}
