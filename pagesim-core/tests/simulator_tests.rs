// Tests for the page load simulator

use pagesim_core::error::SimulationError;
use pagesim_core::options::{SimulationOptions, WarmupMultipliers};
use pagesim_core::simulator::Simulator;
use pagesim_graph::{
    ChildEvent, DependencyGraph, GraphBuilder, NetworkRecord, ResourcePriority, ResourceType,
    TaskEvent,
};

/// 100ms RTT, unlimited bandwidth, no DNS or server time, no CPU slowdown.
fn create_test_options() -> SimulationOptions {
    SimulationOptions {
        default_server_response_time: 0.0,
        ..SimulationOptions::default()
            .with_rtt(100.0)
            .with_throughput_kbps(f64::INFINITY)
            .with_cpu_slowdown(1.0)
            .with_warmup(WarmupMultipliers {
                dns: 0.0,
                ..WarmupMultipliers::default()
            })
    }
}

fn record(url: &str, bytes: u64) -> NetworkRecord {
    NetworkRecord::new(url).unwrap().with_size(bytes)
}

/// A zero-length root task fanning out to one request per url.
fn create_fan_out_graph(urls: &[&str]) -> DependencyGraph {
    let mut builder = GraphBuilder::new();
    builder.add_compute("root", TaskEvent::new(0.0, 0.0)).unwrap();
    for (i, url) in urls.iter().enumerate() {
        let id = format!("request-{}", i);
        builder.add_network(&id, record(url, 10_000)).unwrap();
        builder.add_dependency(&id, "root").unwrap();
    }
    builder.build().unwrap()
}

/// A small but realistic page: document, stylesheet, script and its evaluation, layout.
fn create_page_graph() -> DependencyGraph {
    let mut builder = GraphBuilder::new();
    builder
        .add_network(
            "doc",
            record("https://example.com/", 30_000)
                .with_resource_type(ResourceType::Document)
                .with_priority(ResourcePriority::VeryHigh)
                .with_timing(0.0, 300.0),
        )
        .unwrap();
    builder
        .add_compute(
            "parse",
            TaskEvent::new(310.0, 40.0).with_child(ChildEvent::new("ParseHTML")),
        )
        .unwrap();
    builder
        .add_network(
            "css",
            record("https://example.com/style.css", 8_000)
                .with_resource_type(ResourceType::Stylesheet)
                .with_priority(ResourcePriority::VeryHigh)
                .with_timing(320.0, 500.0),
        )
        .unwrap();
    builder
        .add_network(
            "js",
            record("https://cdn.example.com/app.js", 120_000)
                .with_resource_type(ResourceType::Script)
                .with_priority(ResourcePriority::High)
                .with_timing(320.0, 600.0),
        )
        .unwrap();
    builder
        .add_compute(
            "eval",
            TaskEvent::new(610.0, 80.0)
                .with_child(ChildEvent::evaluate_script("https://cdn.example.com/app.js")),
        )
        .unwrap();
    builder
        .add_compute(
            "layout",
            TaskEvent::new(700.0, 30.0)
                .with_child(ChildEvent::new("Layout"))
                .with_child(ChildEvent::new("Paint")),
        )
        .unwrap();

    builder.add_dependency("parse", "doc").unwrap();
    builder.add_dependency("css", "parse").unwrap();
    builder.add_dependency("js", "parse").unwrap();
    builder.add_dependency("eval", "js").unwrap();
    builder.add_dependency("layout", "css").unwrap();
    builder.add_dependency("layout", "eval").unwrap();
    builder.set_main_document("doc");
    builder.build().unwrap()
}

fn completion(graph: &DependencyGraph, options: SimulationOptions) -> f64 {
    Simulator::new(options)
        .unwrap()
        .simulate(graph)
        .unwrap()
        .completion_time
}

// ============================================================================
// Scenario Tests
// ============================================================================

#[test]
fn test_independent_cold_requests_complete_in_parallel() {
    let graph = create_fan_out_graph(&["https://a.test/one.js", "https://b.test/two.js"]);
    let result = Simulator::new(create_test_options())
        .unwrap()
        .simulate(&graph)
        .unwrap();

    // TCP 1.5 RTT + TLS 1 RTT + response 0.5 RTT
    for id in ["request-0", "request-1"] {
        let timing = result.timing_by_id(id).unwrap();
        assert_eq!(timing.start_time, 0.0);
        assert_eq!(timing.end_time, 300.0);
    }
    assert_eq!(result.completion_time, 300.0);
}

#[test]
fn test_single_compute_node_scaled_by_cpu_slowdown() {
    let mut builder = GraphBuilder::new();
    builder.add_compute("task", TaskEvent::new(0.0, 100.0)).unwrap();
    let graph = builder.build().unwrap();

    let options = create_test_options().with_cpu_slowdown(4.0);
    let result = Simulator::new(options).unwrap().simulate(&graph).unwrap();

    let timing = result.timing_by_id("task").unwrap();
    assert_eq!(timing.duration, 400.0);
    assert_eq!(result.completion_time, 400.0);
}

#[test]
fn test_network_after_compute_waits_for_it() {
    let mut builder = GraphBuilder::new();
    builder.add_compute("task", TaskEvent::new(0.0, 50.0)).unwrap();
    builder
        .add_network("fetch", record("http://a.test/data.json", 1_000))
        .unwrap();
    builder.add_dependency("fetch", "task").unwrap();
    let graph = builder.build().unwrap();

    let result = Simulator::new(create_test_options())
        .unwrap()
        .simulate(&graph)
        .unwrap();

    let task = result.timing_by_id("task").unwrap();
    let fetch = result.timing_by_id("fetch").unwrap();
    assert!(fetch.start_time >= task.end_time);
    // plain http: TCP 1.5 RTT + response 0.5 RTT
    assert_eq!(fetch.end_time, 50.0 + 200.0);
}

#[test]
fn test_concurrency_cap_queues_excess_requests() {
    let urls = [
        "https://a.test/",
        "https://b.test/",
        "https://c.test/",
        "https://d.test/",
        "https://e.test/",
    ];
    let graph = create_fan_out_graph(&urls);
    let options = create_test_options().with_maximum_concurrent_requests(2);
    let result = Simulator::new(options).unwrap().simulate(&graph).unwrap();

    let starts: Vec<f64> = (0..urls.len())
        .map(|i| {
            result
                .timing_by_id(&format!("request-{}", i))
                .unwrap()
                .start_time
        })
        .collect();
    assert_eq!(starts, vec![0.0, 0.0, 300.0, 300.0, 600.0]);
    assert_eq!(result.completion_time, 900.0);

    // never more than two requests in flight
    let timings: Vec<_> = result.timings().map(|(_, t)| *t).collect();
    for sample in &timings {
        let in_flight = timings
            .iter()
            .filter(|t| t.duration > 0.0)
            .filter(|t| t.start_time <= sample.start_time && sample.start_time < t.end_time)
            .count();
        assert!(in_flight <= 2);
    }
}

#[test]
fn test_compute_nodes_never_overlap() {
    let mut builder = GraphBuilder::new();
    builder.add_compute("root", TaskEvent::new(0.0, 10.0)).unwrap();
    builder.add_compute("a", TaskEvent::new(20.0, 30.0)).unwrap();
    builder.add_compute("b", TaskEvent::new(25.0, 30.0)).unwrap();
    builder.add_dependency("a", "root").unwrap();
    builder.add_dependency("b", "root").unwrap();
    let graph = builder.build().unwrap();

    let result = Simulator::new(create_test_options())
        .unwrap()
        .simulate(&graph)
        .unwrap();

    let a = result.timing_by_id("a").unwrap();
    let b = result.timing_by_id("b").unwrap();
    // earlier observed start goes first
    assert_eq!(a.start_time, 10.0);
    assert_eq!(b.start_time, a.end_time);
    assert_eq!(result.completion_time, 70.0);
}

#[test]
fn test_reused_connection_skips_handshake() {
    let mut builder = GraphBuilder::new();
    builder
        .add_network(
            "doc",
            record("https://a.test/", 5_000).with_connection(1, false),
        )
        .unwrap();
    builder
        .add_network(
            "script",
            record("https://a.test/app.js", 5_000).with_connection(1, true),
        )
        .unwrap();
    builder.add_dependency("script", "doc").unwrap();
    let graph = builder.build().unwrap();

    let result = Simulator::new(create_test_options())
        .unwrap()
        .simulate(&graph)
        .unwrap();

    assert_eq!(result.timing_by_id("doc").unwrap().end_time, 300.0);
    // warm: request 0.5 RTT + response 0.5 RTT
    assert_eq!(result.timing_by_id("script").unwrap().end_time, 400.0);
}

#[test]
fn test_disk_cache_request_uses_fixed_cost() {
    let mut builder = GraphBuilder::new();
    builder
        .add_network(
            "cached",
            record("https://a.test/big.js", 1024 * 1024).with_disk_cache(true),
        )
        .unwrap();
    let graph = builder.build().unwrap();

    assert_eq!(completion(&graph, create_test_options()), 28.0);
}

#[test]
fn test_data_url_uses_non_network_cost() {
    let mut builder = GraphBuilder::new();
    builder
        .add_network("inline", record("data:text/plain,hello", 0))
        .unwrap();
    let graph = builder.build().unwrap();

    assert_eq!(completion(&graph, create_test_options()), 2.0);
}

#[test]
fn test_server_response_time_by_origin() {
    let graph = create_fan_out_graph(&["https://slow.test/"]);
    let options = create_test_options().with_server_response_time("https://slow.test", 150.0);

    assert_eq!(completion(&graph, options), 450.0);
}

#[test]
fn test_additional_rtt_by_origin() {
    let graph = create_fan_out_graph(&["https://far.test/"]);
    let options = create_test_options().with_additional_rtt("https://far.test", 100.0);

    assert_eq!(completion(&graph, options), 600.0);
}

// ============================================================================
// Property Tests
// ============================================================================

#[test]
fn test_simulation_is_deterministic() {
    let graph = create_page_graph();
    let simulator = Simulator::new(SimulationOptions::default()).unwrap();

    let first = simulator.simulate(&graph).unwrap();
    let second = simulator.simulate(&graph).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), graph.node_count());
}

#[test]
fn test_every_node_scheduled_after_dependencies() {
    let graph = create_page_graph();
    let result = Simulator::new(SimulationOptions::default())
        .unwrap()
        .simulate(&graph)
        .unwrap();

    for idx in graph.indices() {
        let timing = result.timing(idx).unwrap();
        for dependency in graph.dependencies(idx) {
            assert!(timing.start_time >= result.timing(dependency).unwrap().end_time);
        }
    }
}

/// Graphs exercised by the monotonicity sweeps.
fn create_sweep_graphs() -> Vec<(&'static str, DependencyGraph)> {
    vec![
        ("page", create_page_graph()),
        (
            "fan-out",
            create_fan_out_graph(&["https://a.test/", "https://b.test/", "http://c.test/"]),
        ),
        ("mixed-protocol", create_mixed_protocol_chain()),
        ("cpu-heavy", create_cpu_heavy_graph()),
    ]
}

/// An HTTP/1.1 document, then two HTTP/2 fetches sharing one CDN connection.
fn create_mixed_protocol_chain() -> DependencyGraph {
    let mut builder = GraphBuilder::new();
    builder
        .add_network(
            "doc",
            record("https://a.test/", 29_200).with_resource_type(ResourceType::Document),
        )
        .unwrap();
    builder
        .add_compute(
            "parse",
            TaskEvent::new(310.0, 40.0).with_child(ChildEvent::new("ParseHTML")),
        )
        .unwrap();
    builder
        .add_network(
            "script",
            record("https://cdn.test/app.js", 60_000)
                .with_protocol("h2")
                .with_connection(1, false),
        )
        .unwrap();
    builder
        .add_compute(
            "eval",
            TaskEvent::new(700.0, 120.0)
                .with_child(ChildEvent::evaluate_script("https://cdn.test/app.js")),
        )
        .unwrap();
    builder
        .add_network(
            "image",
            record("https://cdn.test/hero.jpg", 40_000)
                .with_resource_type(ResourceType::Image)
                .with_protocol("h2")
                .with_connection(1, true),
        )
        .unwrap();
    builder
        .add_compute(
            "paint",
            TaskEvent::new(1100.0, 30.0).with_child(ChildEvent::new("Paint")),
        )
        .unwrap();

    builder.add_dependency("parse", "doc").unwrap();
    builder.add_dependency("script", "parse").unwrap();
    builder.add_dependency("eval", "script").unwrap();
    builder.add_dependency("image", "eval").unwrap();
    builder.add_dependency("paint", "image").unwrap();
    builder.set_main_document("doc");
    builder.build().unwrap()
}

/// Long main-thread tasks running while a large fetch is in flight.
fn create_cpu_heavy_graph() -> DependencyGraph {
    let mut builder = GraphBuilder::new();
    builder
        .add_network(
            "doc",
            record("https://a.test/", 12_000).with_resource_type(ResourceType::Document),
        )
        .unwrap();
    builder
        .add_compute(
            "parse",
            TaskEvent::new(200.0, 250.0).with_child(ChildEvent::new("ParseHTML")),
        )
        .unwrap();
    builder
        .add_compute(
            "layout",
            TaskEvent::new(450.0, 300.0).with_child(ChildEvent::new("Layout")),
        )
        .unwrap();
    builder
        .add_network("data", record("https://api.test/data.json", 80_000))
        .unwrap();
    builder
        .add_compute("render", TaskEvent::new(900.0, 60.0))
        .unwrap();

    builder.add_dependency("parse", "doc").unwrap();
    builder.add_dependency("layout", "parse").unwrap();
    builder.add_dependency("data", "doc").unwrap();
    builder.add_dependency("render", "layout").unwrap();
    builder.add_dependency("render", "data").unwrap();
    builder.set_main_document("doc");
    builder.build().unwrap()
}

/// Asserts completion never decreases across `values`, in the order given.
fn assert_non_decreasing<F>(graph: &DependencyGraph, name: &str, values: &[f64], options: F)
where
    F: Fn(f64) -> SimulationOptions,
{
    let mut previous = f64::NEG_INFINITY;
    let mut previous_value = None;
    for &value in values {
        let current = completion(graph, options(value));
        assert!(
            current >= previous - 1e-6,
            "{}: {} finished at {} but {:?} finished at {}",
            name,
            value,
            current,
            previous_value,
            previous
        );
        previous = current;
        previous_value = Some(value);
    }
}

fn steps(from: f64, to: f64, step: f64) -> Vec<f64> {
    let count = ((to - from) / step).round() as usize;
    (0..=count).map(|i| from + i as f64 * step).collect()
}

#[test]
fn test_slower_cpu_never_finishes_earlier() {
    let slowdowns = steps(1.0, 8.0, 0.25);
    for (name, graph) in create_sweep_graphs() {
        assert_non_decreasing(&graph, name, &slowdowns, |slowdown| {
            SimulationOptions::default().with_cpu_slowdown(slowdown)
        });
    }
}

#[test]
fn test_higher_rtt_never_finishes_earlier() {
    let mut builder = GraphBuilder::new();
    builder
        .add_network("page", record("http://a.test/", 29_200))
        .unwrap();
    let graph = builder.build().unwrap();

    // the cap crosses whole segment counts several times in this range
    assert_non_decreasing(&graph, "single request", &steps(100.0, 300.0, 1.0), |rtt| {
        SimulationOptions::default()
            .with_throughput_kbps(226.98)
            .with_rtt(rtt)
    });
}

#[test]
fn test_higher_rtt_never_finishes_earlier_across_graphs() {
    let rtts = steps(5.0, 400.0, 5.0);
    for throughput in [700.0, 1_638.4, 10_240.0, f64::INFINITY] {
        for (name, graph) in create_sweep_graphs() {
            assert_non_decreasing(&graph, name, &rtts, |rtt| {
                SimulationOptions::default()
                    .with_throughput_kbps(throughput)
                    .with_rtt(rtt)
            });
        }
    }
}

#[test]
fn test_lower_throughput_never_finishes_earlier() {
    // descending throughput, so completion must not decrease
    let throughputs: Vec<f64> = (0..=30).map(|i| 20_000.0 / 1.25_f64.powi(i)).collect();
    for rtt in [40.0, 150.0, 300.0] {
        for (name, graph) in create_sweep_graphs() {
            assert_non_decreasing(&graph, name, &throughputs, |throughput| {
                SimulationOptions::default()
                    .with_rtt(rtt)
                    .with_throughput_kbps(throughput)
            });
        }
    }
}

#[test]
fn test_flexible_ordering_is_deterministic() {
    let graph = create_page_graph();
    let simulator = Simulator::new(SimulationOptions::default()).unwrap();

    let first = simulator.simulate_with(&graph, true).unwrap();
    let second = simulator.simulate_with(&graph, true).unwrap();
    assert_eq!(first, second);
}

// ============================================================================
// Error Tests
// ============================================================================

#[test]
fn test_invalid_options_rejected() {
    let options = create_test_options().with_maximum_concurrent_requests(0);
    assert!(matches!(
        Simulator::new(options),
        Err(SimulationError::Options(_))
    ));

    let options = create_test_options().with_throughput_kbps(0.0);
    assert!(Simulator::new(options).is_err());
}

#[test]
fn test_cyclic_graph_never_reaches_simulator() {
    let mut builder = GraphBuilder::new();
    builder.add_compute("root", TaskEvent::new(0.0, 1.0)).unwrap();
    builder.add_compute("a", TaskEvent::new(1.0, 1.0)).unwrap();
    builder.add_compute("b", TaskEvent::new(2.0, 1.0)).unwrap();
    builder.add_dependency("a", "root").unwrap();
    builder.add_dependency("a", "b").unwrap();
    builder.add_dependency("b", "a").unwrap();

    assert!(builder.build().is_err());
}
