use pagesim::handlers::*;
use pagesim_core::metrics::Metric;
use pagesim_core::options::ThrottlingPreset;
use pagesim_core::report::ReportFormat;
use pagesim_core::scoring::FormFactor;
use std::io::Write;
use std::path::PathBuf;
use tempfile::{NamedTempFile, TempDir};

const GRAPH_JSON: &str = r#"{
    "main_document": "doc",
    "markers": {"first_contentful_paint": 230, "largest_contentful_paint": 230},
    "nodes": [
        {
            "kind": "network",
            "id": "doc",
            "record": {
                "url": "https://example.com/",
                "resource_type": "Document",
                "priority": "VeryHigh",
                "transfer_size": 20000,
                "start_time": 0,
                "end_time": 200
            }
        },
        {
            "kind": "compute",
            "id": "paint",
            "dependencies": ["doc"],
            "task": {
                "start_time": 210,
                "duration": 20,
                "children": [{"name": "ParseHTML"}, {"name": "Layout"}, {"name": "Paint"}]
            }
        }
    ]
}"#;

fn write_temp(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", content).unwrap();
    file
}

// ============================================================================
// Logging Tests
// ============================================================================

#[test]
fn test_init_logging_twice_keeps_first_subscriber() {
    init_logging(false);
    init_logging(true);
    tracing::info!("still logging after a second init");
}

// ============================================================================
// Input Loading Tests
// ============================================================================

#[test]
fn test_load_graph() {
    let file = write_temp(GRAPH_JSON);

    let (graph, markers) = load_graph(file.path()).unwrap();
    assert_eq!(graph.node_count(), 2);
    assert_eq!(markers.first_contentful_paint, Some(230.0));
    assert!(markers.speed_index.is_none());
}

#[test]
fn test_load_graph_missing_file() {
    let result = load_graph(&PathBuf::from("/nonexistent/graph.json"));
    let message = format!("{:#}", result.unwrap_err());
    assert!(message.contains("Failed to load graph document"));
}

#[test]
fn test_load_graph_invalid_structure() {
    let file = write_temp(
        r#"{"nodes": [
            {"kind": "compute", "id": "a", "task": {"start_time": 0, "duration": 1}},
            {"kind": "compute", "id": "b", "task": {"start_time": 0, "duration": 1}}
        ]}"#,
    );

    let message = format!("{:#}", load_graph(file.path()).unwrap_err());
    assert!(message.contains("Invalid graph"));
}

#[test]
fn test_expand_path_plain() {
    assert_eq!(
        expand_path("/tmp/graph.json").unwrap(),
        PathBuf::from("/tmp/graph.json")
    );
}

#[test]
fn test_expand_path_tilde() {
    let expanded = expand_path("~/graph.json").unwrap();
    assert!(!expanded.to_string_lossy().starts_with('~'));
    assert!(expanded.ends_with("graph.json"));
}

// ============================================================================
// Option Layering Tests
// ============================================================================

#[test]
fn test_default_overrides_use_mobile_preset() {
    let options = OptionOverrides::default().resolve().unwrap();
    assert_eq!(options.rtt, 150.0);
    assert_eq!(options.cpu_slowdown_multiplier, 4.0);
}

#[test]
fn test_flags_override_preset() {
    let overrides = OptionOverrides {
        preset: Some(ThrottlingPreset::DesktopDense4G),
        rtt: Some(80.0),
        maximum_concurrent_requests: Some(2),
        ..Default::default()
    };

    let options = overrides.resolve().unwrap();
    assert_eq!(options.rtt, 80.0);
    assert_eq!(options.cpu_slowdown_multiplier, 1.0);
    assert_eq!(options.maximum_concurrent_requests, 2);
}

#[test]
fn test_options_file_layers_over_preset() {
    let file = write_temp(r#"{"cpu_slowdown_multiplier": 2, "warmup": {"dns": 0}}"#);
    let overrides = OptionOverrides {
        preset: Some(ThrottlingPreset::DesktopDense4G),
        options_file: Some(file.path().to_path_buf()),
        ..Default::default()
    };

    let options = overrides.resolve().unwrap();
    assert_eq!(options.rtt, 40.0);
    assert_eq!(options.cpu_slowdown_multiplier, 2.0);
    assert_eq!(options.warmup.dns, 0.0);
    assert_eq!(options.warmup.tcp, 1.5);
}

#[test]
fn test_flags_override_options_file() {
    let file = write_temp(r#"{"rtt": 300}"#);
    let overrides = OptionOverrides {
        options_file: Some(file.path().to_path_buf()),
        rtt: Some(20.0),
        ..Default::default()
    };

    assert_eq!(overrides.resolve().unwrap().rtt, 20.0);
}

#[test]
fn test_options_file_must_be_object() {
    let file = write_temp("[1, 2, 3]");
    let overrides = OptionOverrides {
        options_file: Some(file.path().to_path_buf()),
        ..Default::default()
    };

    assert!(overrides.resolve().is_err());
}

#[test]
fn test_invalid_flag_value_rejected() {
    let overrides = OptionOverrides {
        cpu_slowdown: Some(0.0),
        ..Default::default()
    };

    let message = format!("{:#}", overrides.resolve().unwrap_err());
    assert!(message.contains("Invalid simulation options"));
}

// ============================================================================
// Argument Parsing Tests
// ============================================================================

#[test]
fn test_parse_metrics_defaults_to_all() {
    assert_eq!(parse_metrics(&[]).unwrap(), Metric::ALL.to_vec());
}

#[test]
fn test_parse_metrics_aliases_and_duplicates() {
    let names = vec!["lcp".to_string(), "FCP".to_string(), "lcp".to_string()];
    assert_eq!(
        parse_metrics(&names).unwrap(),
        vec![Metric::LargestContentfulPaint, Metric::FirstContentfulPaint]
    );
}

#[test]
fn test_parse_metrics_unknown() {
    assert!(parse_metrics(&["cls".to_string()]).is_err());
}

#[test]
fn test_parse_format() {
    assert_eq!(parse_format("json").unwrap(), ReportFormat::Json);
    assert!(parse_format("csv").is_err());
}

// ============================================================================
// Run Tests
// ============================================================================

#[test]
fn test_run_simulation_text() {
    let file = write_temp(GRAPH_JSON);
    let (graph, _) = load_graph(file.path()).unwrap();
    let options = OptionOverrides::default().resolve().unwrap();

    let report = run_simulation(&graph, options, false, ReportFormat::Text).unwrap();
    assert!(report.contains("PAGESIM SIMULATION REPORT"));
    assert!(report.contains("https://example.com/"));
}

#[test]
fn test_run_simulation_json() {
    let file = write_temp(GRAPH_JSON);
    let (graph, _) = load_graph(file.path()).unwrap();
    let options = OptionOverrides::default().resolve().unwrap();

    let report = run_simulation(&graph, options, true, ReportFormat::Json).unwrap();
    let value: serde_json::Value = serde_json::from_str(&report).unwrap();
    assert_eq!(value["report"]["data"]["flexible_ordering"], true);
    assert_eq!(value["report"]["data"]["nodes"].as_array().unwrap().len(), 2);
}

#[test]
fn test_run_estimate_reports_missing_markers() {
    let file = write_temp(GRAPH_JSON);
    let (graph, markers) = load_graph(file.path()).unwrap();
    let options = OptionOverrides::default().resolve().unwrap();

    let report = run_estimate(
        &graph,
        &markers,
        options,
        &Metric::ALL,
        FormFactor::Mobile,
        ReportFormat::Json,
    )
    .unwrap();

    let value: serde_json::Value = serde_json::from_str(&report).unwrap();
    let metrics = value["report"]["data"]["metrics"].as_array().unwrap();
    assert_eq!(metrics.len(), Metric::ALL.len());

    let status = |name: &str| {
        metrics
            .iter()
            .find(|m| m["metric"] == name)
            .map(|m| m["status"].as_str().unwrap_or_default().to_string())
            .unwrap()
    };
    assert_eq!(status("first-contentful-paint"), "computed");
    assert_eq!(status("largest-contentful-paint"), "computed");
    assert_eq!(status("interactive"), "computed");
    assert_eq!(status("first-meaningful-paint"), "not-computable");
    assert_eq!(status("speed-index"), "not-computable");
}

#[test]
fn test_run_estimate_text_to_file() {
    let file = write_temp(GRAPH_JSON);
    let (graph, markers) = load_graph(file.path()).unwrap();
    let options = OptionOverrides::default().resolve().unwrap();
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("estimate.txt");

    let report = run_estimate(
        &graph,
        &markers,
        options,
        &[Metric::FirstContentfulPaint],
        FormFactor::Desktop,
        ReportFormat::Text,
    )
    .unwrap();
    pagesim_core::report::save_report(&report, &output).unwrap();

    let saved = std::fs::read_to_string(&output).unwrap();
    assert!(saved.contains("Form factor:  desktop"));
    assert!(saved.contains("1 of 1 metrics computed"));
}
