// Report generation from simulation and metric results

use crate::error::MetricError;
use crate::metrics::{Estimate, Metric, MetricEstimate};
use crate::options::SimulationOptions;
use crate::scoring::FormFactor;
use crate::simulator::SimulationResult;
use pagesim_graph::{DependencyGraph, Node, NodeKind};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

const RULE: &str =
    "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    pub id: String,
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub options: SimulationOptions,
    pub flexible_ordering: bool,
    pub node_count: usize,
    pub completion_time: f64,
    /// Sorted by simulated start time.
    pub nodes: Vec<NodeReport>,
}

impl SimulationReport {
    pub fn new(
        graph: &DependencyGraph,
        result: &SimulationResult,
        options: &SimulationOptions,
        flexible_ordering: bool,
    ) -> Self {
        let mut nodes: Vec<NodeReport> = result
            .timings()
            .map(|(idx, timing)| {
                let node = graph.node(idx);
                NodeReport {
                    id: node.id().to_string(),
                    kind: node.kind(),
                    url: match node {
                        Node::Network(network) => Some(network.record.url.clone()),
                        Node::Compute(_) => None,
                    },
                    start_time: timing.start_time,
                    end_time: timing.end_time,
                    duration: timing.duration,
                }
            })
            .collect();
        nodes.sort_by(|a, b| {
            a.start_time
                .total_cmp(&b.start_time)
                .then(a.end_time.total_cmp(&b.end_time))
        });

        Self {
            options: options.clone(),
            flexible_ordering,
            node_count: graph.node_count(),
            completion_time: result.completion_time,
            nodes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Pass,
    Average,
    Fail,
}

impl Rating {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            Rating::Pass
        } else if score >= 0.5 {
            Rating::Average
        } else {
            Rating::Fail
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Pass => "pass",
            Rating::Average => "average",
            Rating::Fail => "fail",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricReport {
    pub metric: Metric,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimistic: Option<Estimate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pessimistic: Option<Estimate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<Rating>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MetricReport {
    pub fn new(
        metric: Metric,
        outcome: &Result<MetricEstimate, MetricError>,
        form_factor: FormFactor,
    ) -> Self {
        match outcome {
            Ok(estimate) => {
                let score = metric
                    .default_curve(form_factor)
                    .score(estimate.timing)
                    .ok();
                Self {
                    metric,
                    status: "computed".to_string(),
                    timing: Some(estimate.timing),
                    optimistic: Some(estimate.optimistic),
                    pessimistic: Some(estimate.pessimistic),
                    score,
                    rating: score.map(Rating::from_score),
                    error: None,
                }
            }
            Err(err) => {
                let status = match err {
                    MetricError::NotComputable { .. } => "not-computable",
                    _ => "error",
                };
                Self {
                    metric,
                    status: status.to_string(),
                    timing: None,
                    optimistic: None,
                    pessimistic: None,
                    score: None,
                    rating: None,
                    error: Some(err.to_string()),
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EstimateReport {
    pub form_factor: FormFactor,
    pub options: SimulationOptions,
    pub metrics: Vec<MetricReport>,
}

impl EstimateReport {
    pub fn new(
        options: &SimulationOptions,
        form_factor: FormFactor,
        outcomes: &[(Metric, Result<MetricEstimate, MetricError>)],
    ) -> Self {
        Self {
            form_factor,
            options: options.clone(),
            metrics: outcomes
                .iter()
                .map(|(metric, outcome)| MetricReport::new(*metric, outcome, form_factor))
                .collect(),
        }
    }

    pub fn computed(&self) -> usize {
        self.metrics.iter().filter(|m| m.timing.is_some()).count()
    }
}

fn push_header(report: &mut String, title: &str) {
    report.push_str(RULE);
    report.push_str(&format!("{:^80}\n", title));
    report.push_str(RULE);
    report.push('\n');
}

fn push_section(report: &mut String, title: &str) {
    report.push_str(RULE);
    report.push_str(title);
    report.push('\n');
    report.push_str(RULE);
    report.push('\n');
}

fn push_conditions(report: &mut String, options: &SimulationOptions) {
    report.push_str(&format!("RTT:          {} ms\n", options.rtt));
    report.push_str(&format!(
        "Throughput:   {}\n",
        format_throughput(options.throughput_kbps)
    ));
    report.push_str(&format!(
        "CPU:          {}x slowdown\n",
        options.cpu_slowdown_multiplier
    ));
    report.push_str(&format!(
        "Max requests: {}\n",
        options.maximum_concurrent_requests
    ));
}

pub fn generate_simulation_text(data: &SimulationReport) -> String {
    let mut report = String::new();
    push_header(&mut report, "PAGESIM SIMULATION REPORT");

    push_conditions(&mut report, &data.options);
    report.push_str(&format!(
        "Ordering:     {}\n",
        if data.flexible_ordering {
            "flexible"
        } else {
            "strict"
        }
    ));
    report.push_str(&format!("Nodes:        {}\n", data.node_count));
    report.push_str(&format!(
        "Completion:   {}\n\n",
        format_ms(data.completion_time)
    ));

    push_section(&mut report, "TIMELINE");
    for node in &data.nodes {
        let label = node.url.as_deref().unwrap_or(&node.id);
        report.push_str(&format!(
            "  {:>10} → {:>10}  {:<7}  {}\n",
            format_ms(node.start_time),
            format_ms(node.end_time),
            node.kind.as_str(),
            label
        ));
    }
    report.push('\n');
    report
}

pub fn generate_estimate_text(data: &EstimateReport) -> String {
    let mut report = String::new();
    push_header(&mut report, "PAGESIM METRIC ESTIMATES");

    push_conditions(&mut report, &data.options);
    report.push_str(&format!("Form factor:  {}\n\n", data.form_factor));

    push_section(&mut report, "METRICS");
    for metric in &data.metrics {
        match (metric.timing, metric.score) {
            (Some(timing), Some(score)) => {
                let rating = metric.rating.map(|r| r.as_str()).unwrap_or("?");
                report.push_str(&format!(
                    "  {:<26} {:>10}  score {:.2} ({})\n",
                    metric.metric.as_str(),
                    format_ms(timing),
                    score,
                    rating
                ));
            }
            (Some(timing), None) => {
                report.push_str(&format!(
                    "  {:<26} {:>10}\n",
                    metric.metric.as_str(),
                    format_ms(timing)
                ));
            }
            _ => {
                report.push_str(&format!(
                    "  {:<26} {}\n",
                    metric.metric.as_str(),
                    metric.error.as_deref().unwrap_or("not computed")
                ));
            }
        }
    }
    report.push('\n');
    report.push_str(&format!(
        "{} of {} metrics computed\n",
        data.computed(),
        data.metrics.len()
    ));
    report
}

pub fn generate_json_report<T: Serialize>(data: &T) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "pagesim",
                "version": env!("CARGO_PKG_VERSION"),
                "format": "json",
            },
            "data": data,
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

fn format_ms(ms: f64) -> String {
    if ms >= 1000.0 {
        format!("{:.2} s", ms / 1000.0)
    } else {
        format!("{:.0} ms", ms)
    }
}

fn format_throughput(kbps: f64) -> String {
    if kbps.is_infinite() {
        "unlimited".to_string()
    } else if kbps >= 1024.0 {
        format!("{:.1} Mbps", kbps / 1024.0)
    } else {
        format!("{} Kbps", kbps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_ms() {
        assert_eq!(format_ms(250.4), "250 ms");
        assert_eq!(format_ms(1500.0), "1.50 s");
    }

    #[test]
    fn test_format_throughput() {
        assert_eq!(format_throughput(f64::INFINITY), "unlimited");
        assert_eq!(format_throughput(1638.4), "1.6 Mbps");
        assert_eq!(format_throughput(700.0), "700 Kbps");
    }
}
