use anyhow::{Context, Result, anyhow};
use clap::ArgMatches;
use colored::Colorize;
use pagesim_core::cache::SimulationCache;
use pagesim_core::metrics::{Estimator, Metric};
use pagesim_core::options::{SimulationOptions, ThrottlingPreset};
use pagesim_core::report::{
    EstimateReport, ReportFormat, SimulationReport, generate_estimate_text, generate_json_report,
    generate_simulation_text, save_report,
};
use pagesim_core::scoring::FormFactor;
use pagesim_core::simulator::Simulator;
use pagesim_graph::{DependencyGraph, GraphDocument, NavigationMarkers};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{Level, debug, info};

pub fn print_banner() {
    println!(
        "{} {}",
        "pagesim".bright_cyan().bold(),
        env!("CARGO_PKG_VERSION").bright_white()
    );
    println!("{}", "dependency-graph page load simulator".blue());
    println!();
}

/// Installs the fmt subscriber on stderr, keeping stdout for reports.
pub fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    if let Err(e) = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init()
    {
        // a global subscriber is already set, e.g. by an earlier call in the same process
        debug!("Keeping existing tracing subscriber: {}", e);
    }
}

/// Expands `~` and environment variables in a user-supplied path.
pub fn expand_path(path: &str) -> Result<PathBuf> {
    let expanded =
        shellexpand::full(path).with_context(|| format!("Failed to expand path {}", path))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

pub fn load_graph(path: &Path) -> Result<(DependencyGraph, NavigationMarkers)> {
    let document = GraphDocument::from_path(path)
        .with_context(|| format!("Failed to load graph document {}", path.display()))?;
    let graph = document
        .to_graph()
        .with_context(|| format!("Invalid graph in {}", path.display()))?;
    Ok((graph, document.markers))
}

/// Simulation conditions as requested on the command line.
///
/// Resolution order: preset, then the options file, then individual flags.
#[derive(Debug, Clone, Default)]
pub struct OptionOverrides {
    pub preset: Option<ThrottlingPreset>,
    pub options_file: Option<PathBuf>,
    pub rtt: Option<f64>,
    pub throughput_kbps: Option<f64>,
    pub cpu_slowdown: Option<f64>,
    pub maximum_concurrent_requests: Option<usize>,
}

impl OptionOverrides {
    pub fn from_matches(args: &ArgMatches) -> Result<Self> {
        let preset = args
            .get_one::<String>("preset")
            .map(|name| name.parse::<ThrottlingPreset>())
            .transpose()?;
        let options_file = args
            .get_one::<String>("options-file")
            .map(|path| expand_path(path))
            .transpose()?;

        Ok(Self {
            preset,
            options_file,
            rtt: args.get_one::<f64>("rtt").copied(),
            throughput_kbps: args.get_one::<f64>("throughput").copied(),
            cpu_slowdown: args.get_one::<f64>("cpu-slowdown").copied(),
            maximum_concurrent_requests: args.get_one::<usize>("max-requests").copied(),
        })
    }

    pub fn resolve(&self) -> Result<SimulationOptions> {
        let preset = self.preset.unwrap_or(ThrottlingPreset::MobileSlow4G);
        let mut options = SimulationOptions::from_preset(preset);

        if let Some(ref path) = self.options_file {
            options = layer_options_file(&options, path)?;
        }
        if let Some(rtt) = self.rtt {
            options = options.with_rtt(rtt);
        }
        if let Some(throughput) = self.throughput_kbps {
            options = options.with_throughput_kbps(throughput);
        }
        if let Some(multiplier) = self.cpu_slowdown {
            options = options.with_cpu_slowdown(multiplier);
        }
        if let Some(maximum) = self.maximum_concurrent_requests {
            options = options.with_maximum_concurrent_requests(maximum);
        }

        options.validate().context("Invalid simulation options")?;
        debug!("Resolved simulation options: {:?}", options);
        Ok(options)
    }
}

/// Applies the fields present in an options file on top of `base`.
fn layer_options_file(base: &SimulationOptions, path: &Path) -> Result<SimulationOptions> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read options file {}", path.display()))?;
    let overlay: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse options file {}", path.display()))?;
    if !overlay.is_object() {
        return Err(anyhow!(
            "Options file {} must contain a JSON object",
            path.display()
        ));
    }

    let mut merged = serde_json::to_value(base)?;
    merge_values(&mut merged, overlay);
    let options = serde_json::from_value(merged)
        .with_context(|| format!("Invalid options in {}", path.display()))?;
    info!("Loaded options file {}", path.display());
    Ok(options)
}

fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Metric names from `-m`; every metric when none were given.
pub fn parse_metrics(names: &[String]) -> Result<Vec<Metric>, String> {
    if names.is_empty() {
        return Ok(Metric::ALL.to_vec());
    }
    let mut metrics = Vec::new();
    for name in names {
        let metric = name.parse::<Metric>()?;
        if !metrics.contains(&metric) {
            metrics.push(metric);
        }
    }
    Ok(metrics)
}

pub fn parse_format(name: &str) -> Result<ReportFormat, String> {
    ReportFormat::from_str(name).ok_or_else(|| format!("Unknown report format: {}", name))
}

pub fn run_simulation(
    graph: &DependencyGraph,
    options: SimulationOptions,
    flexible_ordering: bool,
    format: ReportFormat,
) -> Result<String> {
    let simulator = Simulator::new(options)?;
    let result = simulator
        .simulate_with(graph, flexible_ordering)
        .context("Simulation failed")?;
    let report = SimulationReport::new(graph, &result, simulator.options(), flexible_ordering);

    Ok(match format {
        ReportFormat::Text => generate_simulation_text(&report),
        ReportFormat::Json => generate_json_report(&report)?,
    })
}

pub fn run_estimate(
    graph: &DependencyGraph,
    markers: &NavigationMarkers,
    options: SimulationOptions,
    metrics: &[Metric],
    form_factor: FormFactor,
    format: ReportFormat,
) -> Result<String> {
    let simulator = Simulator::new(options)?;
    let mut cache = SimulationCache::new();
    let outcomes = Estimator::new(&simulator, &mut cache).compute_all(metrics, graph, markers);
    debug!(
        "Estimated {} metrics ({} cache hits, {} misses)",
        outcomes.len(),
        cache.hits(),
        cache.misses()
    );

    let report = EstimateReport::new(simulator.options(), form_factor, &outcomes);
    Ok(match format {
        ReportFormat::Text => generate_estimate_text(&report),
        ReportFormat::Json => generate_json_report(&report)?,
    })
}

fn emit_report(content: &str, output: Option<&String>, quiet: bool) -> Result<()> {
    match output {
        Some(path) => {
            let path = expand_path(path)?;
            save_report(content, &path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            if !quiet {
                println!(
                    "{} Report saved to {}",
                    "✓".green().bold(),
                    path.display().to_string().bright_white()
                );
            }
        }
        None => print!("{}", content),
    }
    Ok(())
}

fn load_graph_arg(args: &ArgMatches) -> Result<(DependencyGraph, NavigationMarkers)> {
    let path = args
        .get_one::<String>("graph")
        .ok_or_else(|| anyhow!("--graph is required"))?;
    load_graph(&expand_path(path)?)
}

fn format_arg(args: &ArgMatches) -> Result<ReportFormat> {
    let name = args
        .get_one::<String>("format")
        .map(String::as_str)
        .unwrap_or("text");
    parse_format(name).map_err(|e| anyhow!(e))
}

pub fn handle_simulate(args: &ArgMatches, quiet: bool) -> Result<()> {
    let (graph, _) = load_graph_arg(args)?;
    let options = OptionOverrides::from_matches(args)?.resolve()?;
    let format = format_arg(args)?;
    let flexible = args.get_flag("flexible");

    if !quiet {
        println!(
            "{} Loaded graph with {} nodes",
            "✓".green().bold(),
            graph.node_count().to_string().cyan()
        );
        println!(
            "{} Simulating at {} ms RTT, {}x CPU",
            "→".blue(),
            options.rtt,
            options.cpu_slowdown_multiplier
        );
        println!();
    }

    let content = run_simulation(&graph, options, flexible, format)?;
    emit_report(&content, args.get_one::<String>("output"), quiet)
}

pub fn handle_estimate(args: &ArgMatches, quiet: bool) -> Result<()> {
    let (graph, markers) = load_graph_arg(args)?;
    let options = OptionOverrides::from_matches(args)?.resolve()?;
    let format = format_arg(args)?;

    let names: Vec<String> = args
        .get_many::<String>("metric")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let metrics = parse_metrics(&names).map_err(|e| anyhow!(e))?;
    let form_factor = args
        .get_one::<String>("form-factor")
        .map(|name| name.parse::<FormFactor>())
        .transpose()
        .map_err(|e| anyhow!(e))?
        .unwrap_or_default();

    if !quiet {
        println!(
            "{} Loaded graph with {} nodes",
            "✓".green().bold(),
            graph.node_count().to_string().cyan()
        );
        println!(
            "{} Estimating {} metric(s) for {}",
            "→".blue(),
            metrics.len().to_string().cyan(),
            form_factor
        );
        println!();
    }

    let content = run_estimate(&graph, &markers, options, &metrics, form_factor, format)?;
    emit_report(&content, args.get_one::<String>("output"), quiet)
}
