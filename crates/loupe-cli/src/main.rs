#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use loupe_core::config::load_config;
use output::{OutputMode, resolve_output_mode};
use std::env;
use std::io;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "loupe: inspector for CRDT change logs",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Output format: pretty, text or json.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Shorthand for `--format json`.
    #[arg(long, global = true, hide = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Inspect",
        about = "Show document details",
        long_about = "Show size, change and operation counts, peers, time span, version vectors and frontiers of a change log.",
        after_help = "EXAMPLES:\n    # Summarize a document\n    loupe details doc.json\n\n    # Emit machine-readable output\n    loupe details doc.json --format json"
    )]
    Details(cmd::details::DetailsArgs),

    #[command(
        next_help_heading = "Inspect",
        about = "List changes, newest first",
        long_about = "List every change in the log, newest first, optionally filtered by peer, operation id or message.",
        after_help = "EXAMPLES:\n    # Full history\n    loupe history doc.json\n\n    # Changes by one peer\n    loupe history doc.json --search 12\n\n    # The change holding an operation\n    loupe history doc.json -s 4@12"
    )]
    History(cmd::history::HistoryArgs),

    #[command(
        next_help_heading = "Inspect",
        about = "Show a version vector",
        long_about = "Show the per-peer operation counts of the latest version, or of the checked-out version with --current.",
        after_help = "EXAMPLES:\n    # Latest version\n    loupe vv doc.json\n\n    # Checked-out version\n    loupe vv doc.json --current"
    )]
    Vv(cmd::vv::VvArgs),

    #[command(
        next_help_heading = "Inspect",
        about = "Show the change dependency graph",
        long_about = "Build the change dependency graph, merging single-peer chains, and print it as a summary or Graphviz DOT.",
        after_help = "EXAMPLES:\n    # Node and edge summary\n    loupe graph doc.json\n\n    # Render with Graphviz\n    loupe graph doc.json --dot --direction lr | dot -Tsvg > graph.svg"
    )]
    Graph(cmd::graph::GraphArgs),

    #[command(
        next_help_heading = "Timeline",
        about = "Resolve a timeline position",
        long_about = "Resolve a timeline position to its frontier, or find the position of a frontier with --at.",
        after_help = "EXAMPLES:\n    # What does position 5 show?\n    loupe timeline doc.json 5\n\n    # Where is operation 3@1?\n    loupe timeline doc.json --at 3@1"
    )]
    Timeline(cmd::timeline::TimelineArgs),

    #[command(
        next_help_heading = "Timeline",
        about = "Scrub the timeline interactively",
        long_about = "Read scrub commands from stdin (start, end, next, prev, jump N, drag N, release, tick, status, quit) and check out each position on the document.",
        after_help = "EXAMPLES:\n    # Walk forward two operations\n    printf 'start\\nnext\\nnext\\n' | loupe scrub doc.json\n\n    # Drag with a short debounce, then release\n    printf 'drag 3\\ndrag 7\\nrelease\\n' | loupe scrub doc.json --debounce-ms 50"
    )]
    Scrub(cmd::scrub::ScrubArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOUPE_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "loupe=debug,info"
        } else {
            "loupe=info,warn"
        })
    });

    let format = env::var("LOUPE_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let config = load_config()?;
    let output = resolve_output_mode(cli.format, cli.json, config.output.format.as_deref());

    match cli.command {
        Commands::Details(ref args) => cmd::details::run_details(args, output),
        Commands::History(ref args) => cmd::history::run_history(args, output),
        Commands::Vv(ref args) => cmd::vv::run_vv(args, output),
        Commands::Graph(ref args) => cmd::graph::run_graph(args, &config, output),
        Commands::Timeline(ref args) => cmd::timeline::run_timeline(args, output),
        Commands::Scrub(ref args) => cmd::scrub::run_scrub(args, &config, output),
    }
}
