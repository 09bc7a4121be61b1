//! `loupe timeline`: resolve a timeline position to a frontier, or a
//! frontier back to its position.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::Args;
use loupe_core::model::{Frontier, OpId};
use loupe_core::timeline::{Cursor, TimelineMapper};
use loupe_core::{DocumentEngine, LoupeError};
use serde::Serialize;

use super::{format_timestamp, frontier_ids, load_document};
use crate::output::{CliError, OutputMode, pretty_kv, pretty_section, render_error, render_mode};

#[derive(Args, Debug)]
pub struct TimelineArgs {
    /// Change-log export (JSON), or `-` to read it from stdin.
    pub file: PathBuf,

    /// Position to resolve, from 0 (empty) to the latest version.
    #[arg(required_unless_present = "at", conflicts_with = "at")]
    pub position: Option<u64>,

    /// Find the position of a frontier, e.g. `3@1` or `3@1,0@2`.
    #[arg(long, value_delimiter = ',')]
    pub at: Option<Vec<String>>,
}

/// Metadata of the change under a cursor.
#[derive(Debug, Serialize)]
pub struct ChangeSummary {
    pub id: String,
    pub length: u32,
    pub timestamp: i64,
    pub time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Cursor rendering shared with `loupe scrub`.
#[derive(Debug, Serialize)]
pub struct PositionView {
    pub position: u64,
    pub total_length: u64,
    pub label: String,
    pub frontier: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lamport: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<ChangeSummary>,
}

impl PositionView {
    pub fn new(cursor: &Cursor, mapper: &TimelineMapper) -> Self {
        Self {
            position: cursor.position,
            total_length: mapper.total_length(),
            label: mapper.label(cursor.position),
            frontier: frontier_ids(&cursor.frontier),
            lamport: cursor.lamport,
            change: cursor.change.as_ref().map(|change| ChangeSummary {
                id: change.id().to_string(),
                length: change.length,
                timestamp: change.timestamp,
                time: format_timestamp(change.timestamp),
                message: change.message.clone(),
            }),
        }
    }

    /// One-line form used by text output.
    pub fn line(&self) -> String {
        let mut line = format!(
            "{}/{}\t{}\t{}",
            self.position,
            self.total_length.saturating_sub(1),
            self.label,
            if self.frontier.is_empty() {
                "-".to_string()
            } else {
                self.frontier.join(",")
            }
        );
        if let Some(lamport) = self.lamport {
            line.push_str(&format!("\tlamport={lamport}"));
        }
        if let Some(change) = &self.change {
            line.push_str(&format!("\t{}", change.time));
        }
        line
    }
}

fn render_text(view: &PositionView, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{}", view.line())
}

fn render_pretty(view: &PositionView, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, &view.label)?;
    pretty_kv(
        w,
        "Position",
        format!("{} of {}", view.position, view.total_length.saturating_sub(1)),
    )?;
    pretty_kv(
        w,
        "Frontier",
        if view.frontier.is_empty() {
            "Empty".to_string()
        } else {
            view.frontier.join(", ")
        },
    )?;
    if let Some(lamport) = view.lamport {
        pretty_kv(w, "Lamport", lamport.to_string())?;
    }
    if let Some(change) = &view.change {
        pretty_kv(w, "Change", format!("{} ({} ops)", change.id, change.length))?;
        pretty_kv(w, "Time", &change.time)?;
        if let Some(message) = &change.message {
            pretty_kv(w, "Message", message)?;
        }
    }
    Ok(())
}

fn parse_frontier(ids: &[String]) -> Result<Frontier, LoupeError> {
    ids.iter().map(|id| id.parse::<OpId>()).collect()
}

pub fn run_timeline(args: &TimelineArgs, output: OutputMode) -> anyhow::Result<()> {
    let doc = load_document(&args.file, output)?;
    let mapper = TimelineMapper::new(&doc.log);

    let position = match (&args.at, args.position) {
        (Some(ids), _) => {
            let frontier = match parse_frontier(ids) {
                Ok(frontier) => frontier,
                Err(e) => {
                    render_error(output, &CliError::from(&e))?;
                    return Err(e.into());
                }
            };
            let logged = doc.log.logged_version_vector();
            if let Some(unknown) = frontier.iter().find(|id| !logged.includes(**id)) {
                let e = LoupeError::UnknownOperation(*unknown);
                render_error(output, &CliError::from(&e))?;
                return Err(e.into());
            }
            mapper.position_of(&frontier)
        }
        (None, Some(position)) => position,
        (None, None) => anyhow::bail!("either POSITION or --at is required"),
    };

    let Some(cursor) = mapper.locate(position) else {
        let message = format!(
            "position {position} is out of range (0..={})",
            mapper.latest_position()
        );
        render_error(
            output,
            &CliError::with_details(
                &message,
                format!("Pick a position between 0 and {}", mapper.latest_position()),
                "position_out_of_range",
            ),
        )?;
        anyhow::bail!(message);
    };

    render_mode(output, &PositionView::new(&cursor, &mapper), render_text, render_pretty)
}
