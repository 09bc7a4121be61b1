//! Command handlers and the helpers they share.

pub mod details;
pub mod graph;
pub mod history;
pub mod scrub;
pub mod timeline;
pub mod vv;

use std::io::{self, Read};
use std::path::Path;

use chrono::DateTime;
use loupe_core::ChangeLog;
use loupe_core::model::{Frontier, VersionVector};
use serde::Serialize;

use crate::output::{CliError, OutputMode, render_error};

/// Document path that reads the change log from stdin.
pub const STDIN_PATH: &str = "-";

/// A change log loaded from disk or stdin, with the facts the details view needs.
pub struct Document {
    pub name: String,
    pub size_bytes: u64,
    pub log: ChangeLog,
}

/// Whether `path` names stdin rather than a file.
pub fn is_stdin(path: &Path) -> bool {
    path == Path::new(STDIN_PATH)
}

/// Load `path` (or stdin for `-`), reporting failures through the output layer.
pub fn load_document(path: &Path, output: OutputMode) -> anyhow::Result<Document> {
    match read_change_log(path) {
        Ok((size_bytes, log)) => Ok(Document {
            name: log.name().map_or_else(|| file_name(path), str::to_string),
            size_bytes,
            log,
        }),
        Err(e) => {
            render_error(output, &CliError::from(&e))?;
            Err(anyhow::Error::new(e).context(format!("load {}", path.display())))
        }
    }
}

fn read_change_log(path: &Path) -> loupe_core::Result<(u64, ChangeLog)> {
    if is_stdin(path) {
        let mut json = String::new();
        io::stdin().lock().read_to_string(&mut json)?;
        let log = ChangeLog::from_json_str(&json)?;
        return Ok((json.len() as u64, log));
    }
    let size_bytes = std::fs::metadata(path)?.len();
    ChangeLog::load(path).map(|log| (size_bytes, log))
}

fn file_name(path: &Path) -> String {
    if is_stdin(path) {
        return "stdin".to_string();
    }
    path.file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned())
}

/// RFC 3339 rendering of a change timestamp in seconds.
pub fn format_timestamp(secs: i64) -> String {
    DateTime::from_timestamp(secs, 0).map_or_else(|| secs.to_string(), |ts| ts.to_rfc3339())
}

/// Operation ids of a frontier as `counter@peer` strings.
pub fn frontier_ids(frontier: &Frontier) -> Vec<String> {
    frontier.iter().map(ToString::to_string).collect()
}

/// One peer's entry of a version vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionEntry {
    pub peer: String,
    pub counter: u32,
}

/// Version vector entries sorted by peer.
pub fn version_entries(vv: &VersionVector) -> Vec<VersionEntry> {
    vv.iter()
        .map(|(peer, counter)| VersionEntry {
            peer: peer.to_string(),
            counter,
        })
        .collect()
}

/// Shorten `s` to at most `max` characters, marking the cut with `…`.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push('…');
    out
}
