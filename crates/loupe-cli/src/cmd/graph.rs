//! `loupe graph`: change dependency graph.
//!
//! An edge `A → B` means "B depends on A". Without `--dot` a node and edge
//! summary is printed; with `--dot` the graph is written as Graphviz DOT.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::Args;
use loupe_core::config::LoupeConfig;
use loupe_core::graph::{ChangeGraph, ChangeNode, Direction};
use serde::Serialize;

use super::{format_timestamp, load_document};
use crate::output::{OutputMode, pretty_rule, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct GraphArgs {
    /// Change-log export (JSON), or `-` to read it from stdin.
    pub file: PathBuf,

    /// Layout direction for DOT output: tb or lr.
    #[arg(long)]
    pub direction: Option<Direction>,

    /// Emit Graphviz DOT instead of a summary.
    #[arg(long)]
    pub dot: bool,

    /// Keep one node per change instead of merging single-peer chains.
    #[arg(long)]
    pub no_merge: bool,
}

#[derive(Debug, Serialize)]
struct EdgeView {
    from: String,
    to: String,
}

#[derive(Debug, Serialize)]
struct GraphView<'a> {
    total_changes: usize,
    merged_changes: usize,
    node_count: usize,
    edge_count: usize,
    nodes: Vec<&'a ChangeNode>,
    edges: Vec<EdgeView>,
}

fn render_text(view: &GraphView<'_>, w: &mut dyn Write) -> io::Result<()> {
    for node in &view.nodes {
        writeln!(
            w,
            "node\t{}\t{}@{}\t{}\t{}",
            node.id, node.counter, node.peer, node.length, node.changes
        )?;
    }
    for edge in &view.edges {
        writeln!(w, "edge\t{}\t{}", edge.from, edge.to)?;
    }
    Ok(())
}

fn render_pretty(view: &GraphView<'_>, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, "Change Graph")?;
    writeln!(
        w,
        "{} changes, {} merged, {} nodes, {} edges",
        view.total_changes, view.merged_changes, view.node_count, view.edge_count
    )?;
    writeln!(w)?;
    for node in &view.nodes {
        let parents: Vec<&str> = view
            .edges
            .iter()
            .filter(|e| e.to == node.id)
            .map(|e| e.from.as_str())
            .collect();
        writeln!(
            w,
            "{:<16} {:>8} ops  {:<6}  {}  <- {}",
            node.id,
            node.length,
            format!("{:?}", node.size_class).to_lowercase(),
            format_timestamp(node.timestamp),
            if parents.is_empty() {
                "(root)".to_string()
            } else {
                parents.join(", ")
            }
        )?;
    }
    pretty_rule(w)
}

pub fn run_graph(args: &GraphArgs, config: &LoupeConfig, output: OutputMode) -> anyhow::Result<()> {
    let doc = load_document(&args.file, output)?;
    let merge_chains = config.graph.merge_chains && !args.no_merge;
    let graph = ChangeGraph::build(&doc.log, merge_chains);

    if args.dot {
        let direction = args.direction.unwrap_or(config.graph.direction);
        let stdout = io::stdout();
        let mut out = stdout.lock();
        out.write_all(graph.to_dot(direction).as_bytes())?;
        return Ok(());
    }

    let view = GraphView {
        total_changes: graph.total_changes,
        merged_changes: graph.merged_changes,
        node_count: graph.node_count(),
        edge_count: graph.edge_count(),
        nodes: graph.nodes(),
        edges: graph
            .edges()
            .into_iter()
            .map(|(from, to)| EdgeView { from, to })
            .collect(),
    };
    render_mode(output, &view, render_text, render_pretty)
}
