//! `loupe details`: document summary.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::Args;
use loupe_core::details::DocumentDetails;
use serde::Serialize;

use super::{VersionEntry, format_timestamp, frontier_ids, load_document, version_entries};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

/// Version vectors longer than this are abbreviated in pretty output.
const VV_PREVIEW: usize = 3;

#[derive(Args, Debug)]
pub struct DetailsArgs {
    /// Change-log export (JSON), or `-` to read it from stdin.
    pub file: PathBuf,
}

#[derive(Debug, Serialize)]
struct DetailsView {
    name: String,
    size_bytes: u64,
    size: String,
    change_count: usize,
    op_count: u64,
    peer_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_time: Option<String>,
    logged_version_vector: Vec<VersionEntry>,
    current_version_vector: Vec<VersionEntry>,
    logged_frontier: Vec<String>,
    current_frontier: Vec<String>,
    detached: bool,
}

impl From<DocumentDetails> for DetailsView {
    fn from(details: DocumentDetails) -> Self {
        Self {
            start_time: details.start_timestamp.map(format_timestamp),
            end_time: details.end_timestamp.map(format_timestamp),
            logged_version_vector: version_entries(&details.logged_version_vector),
            current_version_vector: version_entries(&details.current_version_vector),
            logged_frontier: frontier_ids(&details.logged_frontier),
            current_frontier: frontier_ids(&details.current_frontier),
            detached: details.is_detached(),
            name: details.name,
            size_bytes: details.size_bytes,
            size: details.size,
            change_count: details.change_count,
            op_count: details.op_count,
            peer_count: details.peer_count,
        }
    }
}

fn preview_vv(entries: &[VersionEntry]) -> String {
    if entries.is_empty() {
        return "None".to_string();
    }
    let shown: Vec<String> = entries
        .iter()
        .take(VV_PREVIEW)
        .map(|e| format!("{}: {}", e.peer, e.counter))
        .collect();
    if entries.len() > VV_PREVIEW {
        format!("{} ... ({} entries)", shown.join(", "), entries.len())
    } else {
        shown.join(", ")
    }
}

fn preview_frontier(ids: &[String]) -> String {
    if ids.is_empty() {
        "None".to_string()
    } else {
        ids.join(", ")
    }
}

fn render_text(view: &DetailsView, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "name={}", view.name)?;
    writeln!(w, "size={} ({} bytes)", view.size, view.size_bytes)?;
    writeln!(w, "changes={} ops={} peers={}", view.change_count, view.op_count, view.peer_count)?;
    writeln!(
        w,
        "span={}..{}",
        view.start_time.as_deref().unwrap_or("-"),
        view.end_time.as_deref().unwrap_or("-")
    )?;
    writeln!(w, "logged_frontier={}", view.logged_frontier.join(","))?;
    writeln!(w, "current_frontier={}", view.current_frontier.join(","))
}

fn render_pretty(view: &DetailsView, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, "Document Details")?;
    pretty_kv(w, "Name", &view.name)?;
    pretty_kv(w, "Size", &view.size)?;
    pretty_kv(w, "Changes", view.change_count.to_string())?;
    pretty_kv(w, "Operations", view.op_count.to_string())?;
    pretty_kv(w, "Peers", view.peer_count.to_string())?;
    pretty_kv(w, "First change", view.start_time.as_deref().unwrap_or("-"))?;
    pretty_kv(w, "Last change", view.end_time.as_deref().unwrap_or("-"))?;
    writeln!(w)?;
    pretty_kv(w, "Logged VV", preview_vv(&view.logged_version_vector))?;
    pretty_kv(w, "Current VV", preview_vv(&view.current_version_vector))?;
    pretty_kv(w, "Logged heads", preview_frontier(&view.logged_frontier))?;
    pretty_kv(w, "Checked out", preview_frontier(&view.current_frontier))?;
    if view.detached {
        writeln!(w, "(checked out behind the latest version)")?;
    }
    Ok(())
}

pub fn run_details(args: &DetailsArgs, output: OutputMode) -> anyhow::Result<()> {
    let doc = load_document(&args.file, output)?;
    let view = DetailsView::from(DocumentDetails::collect(doc.name, doc.size_bytes, &doc.log));
    render_mode(output, &view, render_text, render_pretty)
}
