use crate::CLAP_STYLING;
use clap::{arg, command};

fn condition_args(cmd: clap::Command) -> clap::Command {
    cmd.arg(
        arg!(-g --"graph" <PATH>)
            .required(true)
            .help("Path to a JSON graph document"),
    )
    .arg(
        arg!(--"preset" <PRESET>)
            .required(false)
            .help("Throttling preset to start from")
            .value_parser(["mobile-slow-4g", "mobile-regular-3g", "desktop-dense-4g"]),
    )
    .arg(
        arg!(--"options-file" <PATH>)
            .required(false)
            .help("JSON file of simulation options, layered over the preset"),
    )
    .arg(
        arg!(--"rtt" <MS>)
            .required(false)
            .help("Round-trip time in milliseconds")
            .value_parser(clap::value_parser!(f64)),
    )
    .arg(
        arg!(--"throughput" <KBPS>)
            .required(false)
            .help("Downlink throughput in Kbps")
            .value_parser(clap::value_parser!(f64)),
    )
    .arg(
        arg!(--"cpu-slowdown" <MULTIPLIER>)
            .required(false)
            .help("Main-thread task duration multiplier")
            .value_parser(clap::value_parser!(f64)),
    )
    .arg(
        arg!(--"max-requests" <NUM>)
            .required(false)
            .help("Maximum number of concurrent network requests")
            .value_parser(clap::value_parser!(usize)),
    )
    .arg(
        arg!(-f --"format" <FORMAT>)
            .required(false)
            .help("Report format: text, json")
            .value_parser(["text", "json"])
            .default_value("text"),
    )
    .arg(
        arg!(-o --"output" <PATH>)
            .required(false)
            .help("Save report to file (default: display to screen)"),
    )
}

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("pagesim")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("pagesim")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(arg!(-v --"verbose" "Enable debug logging").required(false))
        .subcommand_required(false)
        .subcommand(
            condition_args(command!("simulate"))
                .about("Replays a page load graph under the given network and CPU conditions")
                .arg(
                    arg!(--"flexible")
                        .required(false)
                        .help("Let requests use any idle connection instead of the observed one")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            condition_args(command!("estimate"))
                .about("Estimates page load metrics from a graph and its navigation markers")
                .arg(
                    arg!(-m --"metric" <METRIC>)
                        .required(false)
                        .help(
                            "Metric to estimate: fcp, fmp, lcp, si, tti (repeatable, default: \
                        all)",
                        )
                        .action(clap::ArgAction::Append),
                )
                .arg(
                    arg!(--"form-factor" <FORM_FACTOR>)
                        .required(false)
                        .help("Scoring curves to apply")
                        .value_parser(["mobile", "desktop"])
                        .default_value("mobile"),
                ),
        )
}
