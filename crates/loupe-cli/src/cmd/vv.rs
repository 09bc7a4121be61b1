//! `loupe vv`: version vector listing.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::Args;
use loupe_core::DocumentEngine;
use serde::Serialize;

use super::{VersionEntry, load_document, version_entries};
use crate::output::{OutputMode, pretty_rule, render_mode};

#[derive(Args, Debug)]
pub struct VvArgs {
    /// Change-log export (JSON), or `-` to read it from stdin.
    pub file: PathBuf,

    /// Show the checked-out version instead of the latest one.
    #[arg(long)]
    pub current: bool,
}

#[derive(Debug, Serialize)]
struct VersionVectorView {
    version: &'static str,
    total_ops: u64,
    entries: Vec<VersionEntry>,
}

fn render_text(view: &VersionVectorView, w: &mut dyn Write) -> io::Result<()> {
    for entry in &view.entries {
        writeln!(w, "{}\t{}", entry.peer, entry.counter)?;
    }
    Ok(())
}

fn render_pretty(view: &VersionVectorView, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{} version vector", capitalize(view.version))?;
    pretty_rule(w)?;
    if view.entries.is_empty() {
        writeln!(w, "(empty)")?;
    }
    for entry in &view.entries {
        writeln!(w, "{:<24} {:>10}", entry.peer, entry.counter)?;
    }
    pretty_rule(w)?;
    writeln!(w, "{} entries, {} operations", view.entries.len(), view.total_ops)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars
        .next()
        .map_or_else(String::new, |first| first.to_uppercase().chain(chars).collect())
}

pub fn run_vv(args: &VvArgs, output: OutputMode) -> anyhow::Result<()> {
    let doc = load_document(&args.file, output)?;
    let (version, vv) = if args.current {
        ("current", doc.log.current_version_vector())
    } else {
        ("logged", doc.log.logged_version_vector())
    };

    let view = VersionVectorView {
        version,
        total_ops: vv.total_ops(),
        entries: version_entries(&vv),
    };
    render_mode(output, &view, render_text, render_pretty)
}
