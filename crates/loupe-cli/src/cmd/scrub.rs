//! `loupe scrub`: interactive timeline session driven from stdin.
//!
//! One command per line:
//!
//! - `start` / `end`: jump to the empty or latest version
//! - `next` / `prev`: step one operation
//! - `jump N`: move to position N and check it out immediately
//! - `drag N`: move to position N; the checkout waits for the debounce
//! - `release`: check out the dragged position now
//! - `tick`: apply a deferred checkout whose quiet period has passed
//! - `status`: print the cursor without moving
//! - `quit`: apply any deferred checkout and exit
//!
//! Every command prints the cursor and the engine's checked-out frontier.
//! JSON output is one object per line.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use loupe_core::config::LoupeConfig;
use loupe_core::debounce::Debouncer;
use loupe_core::model::Frontier;
use loupe_core::timeline::{ScrubOutcome, ScrubSession, TimelineListener};
use loupe_core::{ChangeLog, DocumentEngine};
use serde::Serialize;
use tracing::{debug, warn};

use super::frontier_ids;
use super::timeline::PositionView;
use crate::output::OutputMode;

#[derive(Args, Debug)]
pub struct ScrubArgs {
    /// Change-log export (JSON).
    pub file: PathBuf,

    /// Quiet period before a dragged position is checked out.
    #[arg(long, value_name = "MS")]
    pub debounce_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Start,
    End,
    Next,
    Prev,
    Jump(u64),
    Drag(u64),
    Release,
    Tick,
    Status,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Result<Self, String> {
        let mut words = line.split_whitespace();
        let verb = words.next().unwrap_or_default();
        let position = |words: &mut std::str::SplitWhitespace<'_>| {
            words
                .next()
                .ok_or_else(|| format!("'{verb}' needs a position"))?
                .parse::<u64>()
                .map_err(|e| format!("bad position for '{verb}': {e}"))
        };

        let command = match verb {
            "start" => Self::Start,
            "end" => Self::End,
            "next" => Self::Next,
            "prev" => Self::Prev,
            "jump" => Self::Jump(position(&mut words)?),
            "drag" => Self::Drag(position(&mut words)?),
            "release" => Self::Release,
            "tick" => Self::Tick,
            "status" => Self::Status,
            "quit" | "exit" => Self::Quit,
            other => return Err(format!("unknown command '{other}'")),
        };

        match words.next() {
            Some(extra) => Err(format!("unexpected argument '{extra}'")),
            None => Ok(command),
        }
    }
}

/// Counts frontier notifications for the status line.
#[derive(Debug, Default)]
struct UpdateCounter {
    updates: u64,
}

impl TimelineListener for UpdateCounter {
    fn on_length_change(&mut self, length: u64) {
        debug!(length, "timeline length");
    }

    fn on_new_frontiers(&mut self, frontier: &Frontier) {
        self.updates += 1;
        debug!(frontier = %frontier, "new frontier");
    }
}

#[derive(Debug, Serialize)]
struct StepView {
    command: String,
    outcome: &'static str,
    #[serde(flatten)]
    cursor: PositionView,
    checked_out: Vec<String>,
    pending: bool,
    updates: u64,
}

const fn outcome_name(outcome: ScrubOutcome) -> &'static str {
    match outcome {
        ScrubOutcome::Ignored => "ignored",
        ScrubOutcome::Applied => "applied",
        ScrubOutcome::Deferred => "deferred",
    }
}

const fn flushed_name(flushed: bool) -> &'static str {
    if flushed { "applied" } else { "none" }
}

type Session<'a> = ScrubSession<'a, ChangeLog, &'a mut UpdateCounter>;

fn execute(session: &mut Session<'_>, command: Command) -> loupe_core::Result<&'static str> {
    let outcome = match command {
        Command::Start => outcome_name(session.jump_to_start()?),
        Command::End => outcome_name(session.jump_to_end()?),
        Command::Next => outcome_name(session.step_forward()?),
        Command::Prev => outcome_name(session.step_back()?),
        Command::Jump(position) => outcome_name(session.apply_position(position, true)?),
        Command::Drag(position) => outcome_name(session.apply_position(position, false)?),
        Command::Release | Command::Quit => flushed_name(session.flush()?),
        Command::Tick => flushed_name(session.tick()?),
        Command::Status => "none",
    };
    Ok(outcome)
}

/// Run `command` after landing any deferred checkout that is already due.
///
/// `tick` does its own polling, so it reports the checkout it lands.
fn step(session: &mut Session<'_>, command: Command) -> loupe_core::Result<&'static str> {
    if command != Command::Tick {
        session.tick()?;
    }
    execute(session, command)
}

fn write_step(out: &mut dyn Write, output: OutputMode, step: &StepView) -> anyhow::Result<()> {
    let checked_out = if step.checked_out.is_empty() {
        "-".to_string()
    } else {
        step.checked_out.join(",")
    };
    if output.is_json() {
        serde_json::to_writer(&mut *out, step)?;
        writeln!(out)?;
    } else if output.is_pretty() {
        writeln!(
            out,
            "{:<10} {:<9} {:<24} [{}]{}",
            step.command,
            step.outcome,
            step.cursor.label,
            checked_out,
            if step.pending { " (pending)" } else { "" }
        )?;
    } else {
        writeln!(
            out,
            "{}\t{}\t{}\tchecked_out={}{}",
            step.command,
            step.outcome,
            step.cursor.line(),
            checked_out,
            if step.pending { "\tpending" } else { "" }
        )?;
    }
    out.flush()?;
    Ok(())
}

pub fn run_scrub(args: &ScrubArgs, config: &LoupeConfig, output: OutputMode) -> anyhow::Result<()> {
    if super::is_stdin(&args.file) {
        anyhow::bail!("scrub reads commands from stdin; pass the change log as a file");
    }
    let mut doc = super::load_document(&args.file, output)?;
    let delay = args
        .debounce_ms
        .map_or_else(|| config.timeline.debounce(), Duration::from_millis);

    let mut counter = UpdateCounter::default();
    let mut session = ScrubSession::with_parts(&mut doc.log, &mut counter, Debouncer::new(delay));
    session
        .mapper()
        .check_consistency()
        .context("timeline index is inconsistent")?;

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut lines = stdin.lock().lines();
    let mut quit = false;
    while !quit {
        let (label, command) = match lines.next() {
            Some(line) => {
                let line = line.context("read command")?;
                let trimmed = line.trim();
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    continue;
                }
                match Command::parse(trimmed) {
                    Ok(command) => (trimmed.to_string(), command),
                    Err(message) => {
                        warn!(command = trimmed, "{message}");
                        writeln!(io::stderr(), "error: {message}")?;
                        continue;
                    }
                }
            }
            None => ("eof".to_string(), Command::Quit),
        };
        quit = command == Command::Quit;

        let outcome = step(&mut session, command)?;

        let step = StepView {
            command: label,
            outcome,
            cursor: PositionView::new(session.cursor(), session.mapper()),
            checked_out: frontier_ids(&session.engine().current_frontier()),
            pending: session.is_pending(),
            updates: session.listener().updates,
        };
        write_step(&mut out, output, &step)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse("start"), Ok(Command::Start));
        assert_eq!(Command::parse("jump 4"), Ok(Command::Jump(4)));
        assert_eq!(Command::parse("  drag   12 "), Ok(Command::Drag(12)));
        assert_eq!(Command::parse("exit"), Ok(Command::Quit));
    }

    #[test]
    fn rejects_bad_commands() {
        assert!(Command::parse("jump").is_err());
        assert!(Command::parse("jump x").is_err());
        assert!(Command::parse("next 3").is_err());
        assert!(Command::parse("fly").is_err());
    }

    #[test]
    fn quit_flushes_a_pending_drag() {
        let mut log = loupe_core::changelog::ChangeLog::from_records(vec![
            loupe_core::changelog::ChangeRecord::new(1, 0, 5),
        ])
        .expect("valid");
        let mut counter = UpdateCounter::default();
        let mut session = ScrubSession::with_parts(
            &mut log,
            &mut counter,
            Debouncer::new(Duration::from_secs(3600)),
        );

        assert_eq!(execute(&mut session, Command::Drag(2)).expect("drag"), "deferred");
        assert_eq!(execute(&mut session, Command::Tick).expect("tick"), "none");
        assert_eq!(execute(&mut session, Command::Quit).expect("quit"), "applied");
        assert_eq!(session.engine().current_frontier().len(), 1);
        assert_eq!(session.listener().updates, 1);
    }

    #[test]
    fn tick_reports_an_elapsed_drag() {
        let mut log = loupe_core::changelog::ChangeLog::from_records(vec![
            loupe_core::changelog::ChangeRecord::new(1, 0, 5),
        ])
        .expect("valid");
        let mut counter = UpdateCounter::default();
        let mut session = ScrubSession::with_parts(&mut log, &mut counter, Debouncer::new(Duration::ZERO));

        assert_eq!(step(&mut session, Command::Drag(2)).expect("drag"), "deferred");
        assert_eq!(step(&mut session, Command::Tick).expect("tick"), "applied");
        assert!(!session.is_pending());
        assert_eq!(step(&mut session, Command::Tick).expect("tick"), "none");
    }

    #[test]
    fn due_drag_lands_before_the_next_command() {
        let mut log = loupe_core::changelog::ChangeLog::from_records(vec![
            loupe_core::changelog::ChangeRecord::new(1, 0, 5),
        ])
        .expect("valid");
        let mut counter = UpdateCounter::default();
        let mut session = ScrubSession::with_parts(&mut log, &mut counter, Debouncer::new(Duration::ZERO));

        step(&mut session, Command::Drag(2)).expect("drag");
        assert_eq!(step(&mut session, Command::Status).expect("status"), "none");
        assert!(!session.is_pending());
        assert_eq!(session.engine().current_frontier().len(), 1);
    }
}
