//! `loupe history`: change table with search.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::Args;
use loupe_core::history::{self, ChangeFilter};
use loupe_core::model::Change;
use serde::Serialize;

use super::{format_timestamp, frontier_ids, load_document, truncate};
use crate::output::{OutputMode, pretty_rule, render_mode};

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Change-log export (JSON), or `-` to read it from stdin.
    pub file: PathBuf,

    /// Filter by peer id, `counter@peer`, or message text.
    #[arg(short, long)]
    pub search: Option<String>,

    /// Maximum number of rows to show.
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ChangeRow {
    id: String,
    peer: String,
    counter: u32,
    length: u32,
    lamport: u32,
    timestamp: i64,
    time: String,
    deps: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl From<&Change> for ChangeRow {
    fn from(change: &Change) -> Self {
        Self {
            id: change.id().to_string(),
            peer: change.peer.to_string(),
            counter: change.counter,
            length: change.length,
            lamport: change.lamport,
            timestamp: change.timestamp,
            time: format_timestamp(change.timestamp),
            deps: frontier_ids(&change.deps),
            message: change.message.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct HistoryView {
    total: usize,
    matched: usize,
    changes: Vec<ChangeRow>,
}

fn render_text(view: &HistoryView, w: &mut dyn Write) -> io::Result<()> {
    for row in &view.changes {
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}\t{}",
            row.id,
            row.length,
            row.lamport,
            row.time,
            row.deps.join(","),
            row.message.as_deref().unwrap_or("")
        )?;
    }
    Ok(())
}

fn render_pretty(view: &HistoryView, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{} total changes, {} shown", view.total, view.changes.len())?;
    pretty_rule(w)?;
    if view.changes.is_empty() {
        return writeln!(w, "(no matching changes)");
    }
    writeln!(
        w,
        "{:<14} {:>6} {:>8}  {:<25}  {:<18} MESSAGE",
        "ID", "OPS", "LAMPORT", "TIME", "DEPS"
    )?;
    for row in &view.changes {
        writeln!(
            w,
            "{:<14} {:>6} {:>8}  {:<25}  {:<18} {}",
            row.id,
            row.length,
            row.lamport,
            row.time,
            truncate(&row.deps.join(", "), 18),
            truncate(row.message.as_deref().unwrap_or("-"), 40)
        )?;
    }
    Ok(())
}

pub fn run_history(args: &HistoryArgs, output: OutputMode) -> anyhow::Result<()> {
    let doc = load_document(&args.file, output)?;
    let changes = history::changes(&doc.log);
    let filter = ChangeFilter::parse(args.search.as_deref().unwrap_or(""));

    let matched: Vec<&Change> = filter.apply(&changes).collect();
    let limit = args.limit.unwrap_or(usize::MAX);
    let view = HistoryView {
        total: changes.len(),
        matched: matched.len(),
        changes: matched.into_iter().take(limit).map(ChangeRow::from).collect(),
    };

    render_mode(output, &view, render_text, render_pretty)
}
