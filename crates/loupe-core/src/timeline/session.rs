//! Scrub session: applies timeline positions to a document engine.
//!
//! The session borrows the engine mutably for its whole lifetime, so nothing
//! else can check the document out while scrubbing. Position changes update
//! the session's cursor and notify the listener right away; the engine
//! checkout itself is either issued immediately or deferred through a
//! [`Debouncer`] while a drag is in progress.
//!
//! # Checkout rules
//!
//! - `immediate == true` checks out synchronously.
//! - The two boundary positions (empty and latest) always check out
//!   synchronously.
//! - Otherwise the frontier is scheduled; a newer request replaces it, and
//!   [`ScrubSession::tick`] applies it once the quiet period has elapsed.
//!
//! A synchronous checkout cancels whatever was pending, so a stale drag
//! position can never land after a later jump.

use tracing::{debug, trace};

use super::mapper::{Cursor, TimelineMapper};
use crate::debounce::{Clock, DEFAULT_DELAY, Debouncer, SystemClock};
use crate::engine::DocumentEngine;
use crate::error::Result;
use crate::model::Frontier;

/// Callbacks for whatever renders the timeline.
pub trait TimelineListener {
    /// Called once, after the position index is built.
    fn on_length_change(&mut self, _length: u64) {}

    /// Called whenever the session moves to a new frontier, ahead of any
    /// deferred engine checkout.
    fn on_new_frontiers(&mut self, _frontier: &Frontier) {}
}

impl TimelineListener for () {}

impl<L: TimelineListener + ?Sized> TimelineListener for &mut L {
    fn on_length_change(&mut self, length: u64) {
        (**self).on_length_change(length);
    }

    fn on_new_frontiers(&mut self, frontier: &Frontier) {
        (**self).on_new_frontiers(frontier);
    }
}

/// What [`ScrubSession::apply_position`] did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrubOutcome {
    /// Position out of range; nothing changed.
    Ignored,
    /// Checkout issued synchronously.
    Applied,
    /// Checkout scheduled behind the debounce window.
    Deferred,
}

/// Interactive timeline over one document engine.
pub struct ScrubSession<'doc, E, L = (), C = SystemClock>
where
    E: DocumentEngine + ?Sized,
    L: TimelineListener,
    C: Clock,
{
    engine: &'doc mut E,
    mapper: TimelineMapper,
    listener: L,
    debouncer: Debouncer<Frontier, C>,
    cursor: Cursor,
}

impl<'doc, E: DocumentEngine + ?Sized> ScrubSession<'doc, E> {
    /// Session with no listener, on the system clock, with the default delay.
    pub fn new(engine: &'doc mut E) -> Self {
        Self::with_parts(engine, (), Debouncer::new(DEFAULT_DELAY))
    }
}

impl<'doc, E, L, C> ScrubSession<'doc, E, L, C>
where
    E: DocumentEngine + ?Sized,
    L: TimelineListener,
    C: Clock,
{
    /// Index `engine` and position the session at its current checkout.
    ///
    /// Fires [`TimelineListener::on_length_change`]. The engine is not
    /// checked out until a position is applied.
    pub fn with_parts(engine: &'doc mut E, mut listener: L, debouncer: Debouncer<Frontier, C>) -> Self {
        let mapper = TimelineMapper::new(&*engine);
        listener.on_length_change(mapper.total_length());

        let current = engine.current_frontier();
        let position = mapper.position_of(&current);
        let cursor = Cursor::at_frontier(position, current, &*engine);
        debug!(position, frontier = %cursor.frontier, "scrub session started");

        Self {
            engine,
            mapper,
            listener,
            debouncer,
            cursor,
        }
    }

    /// Move to `position`.
    ///
    /// Out-of-range positions are ignored. See the module docs for when the
    /// checkout is immediate and when it is deferred.
    ///
    /// # Errors
    ///
    /// Propagates the engine's checkout failure for immediate checkouts.
    pub fn apply_position(&mut self, position: u64, immediate: bool) -> Result<ScrubOutcome> {
        let Some(cursor) = self.mapper.locate(position) else {
            debug!(position, total_length = self.mapper.total_length(), "position out of range");
            return Ok(ScrubOutcome::Ignored);
        };

        self.cursor = cursor;
        self.listener.on_new_frontiers(&self.cursor.frontier);

        let boundary = position == 0 || position == self.mapper.latest_position();
        if immediate || boundary {
            if let Some(stale) = self.debouncer.cancel() {
                trace!(frontier = %stale, "pending checkout superseded");
            }
            self.engine.checkout(&self.cursor.frontier)?;
            Ok(ScrubOutcome::Applied)
        } else {
            self.debouncer.schedule(self.cursor.frontier.clone());
            Ok(ScrubOutcome::Deferred)
        }
    }

    /// Apply the deferred checkout if its quiet period has elapsed.
    ///
    /// Returns `true` when a checkout was issued.
    ///
    /// # Errors
    ///
    /// Propagates the engine's checkout failure.
    pub fn tick(&mut self) -> Result<bool> {
        match self.debouncer.poll() {
            Some(frontier) => self.engine.checkout(&frontier).map(|()| true),
            None => Ok(false),
        }
    }

    /// Apply the deferred checkout now, e.g. when a drag is released.
    ///
    /// # Errors
    ///
    /// Propagates the engine's checkout failure.
    pub fn flush(&mut self) -> Result<bool> {
        match self.debouncer.flush() {
            Some(frontier) => self.engine.checkout(&frontier).map(|()| true),
            None => Ok(false),
        }
    }

    /// Re-derive the position from the engine's current checkout, dropping
    /// any deferred checkout.
    pub fn reset(&mut self) {
        self.debouncer.cancel();
        let current = self.engine.current_frontier();
        let position = self.mapper.position_of(&current);
        self.cursor = Cursor::at_frontier(position, current, &*self.engine);
    }

    /// Step one operation back. Ignored at the empty version.
    ///
    /// # Errors
    ///
    /// Propagates the engine's checkout failure.
    pub fn step_back(&mut self) -> Result<ScrubOutcome> {
        match self.cursor.position.checked_sub(1) {
            Some(position) => self.apply_position(position, true),
            None => Ok(ScrubOutcome::Ignored),
        }
    }

    /// Step one operation forward. Ignored at the latest version.
    ///
    /// # Errors
    ///
    /// Propagates the engine's checkout failure.
    pub fn step_forward(&mut self) -> Result<ScrubOutcome> {
        if self.cursor.position >= self.mapper.latest_position() {
            return Ok(ScrubOutcome::Ignored);
        }
        self.apply_position(self.cursor.position + 1, true)
    }

    /// Jump to the empty version.
    ///
    /// # Errors
    ///
    /// Propagates the engine's checkout failure.
    pub fn jump_to_start(&mut self) -> Result<ScrubOutcome> {
        self.apply_position(0, true)
    }

    /// Jump to the latest version.
    ///
    /// # Errors
    ///
    /// Propagates the engine's checkout failure.
    pub fn jump_to_end(&mut self) -> Result<ScrubOutcome> {
        self.apply_position(self.mapper.latest_position(), true)
    }

    #[must_use]
    pub const fn position(&self) -> u64 {
        self.cursor.position
    }

    #[must_use]
    pub const fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    #[must_use]
    pub const fn mapper(&self) -> &TimelineMapper {
        &self.mapper
    }

    #[must_use]
    pub const fn total_length(&self) -> u64 {
        self.mapper.total_length()
    }

    /// Label for the current position.
    #[must_use]
    pub fn label(&self) -> String {
        self.mapper.label(self.cursor.position)
    }

    /// Whether a deferred checkout is waiting.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    #[must_use]
    pub fn engine(&self) -> &E {
        &*self.engine
    }

    #[must_use]
    pub const fn listener(&self) -> &L {
        &self.listener
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::changelog::{ChangeLog, ChangeRecord};
    use crate::debounce::ManualClock;
    use crate::model::OpId;

    #[derive(Default)]
    struct Recorder {
        lengths: Vec<u64>,
        frontiers: Vec<Frontier>,
    }

    impl TimelineListener for Recorder {
        fn on_length_change(&mut self, length: u64) {
            self.lengths.push(length);
        }

        fn on_new_frontiers(&mut self, frontier: &Frontier) {
            self.frontiers.push(frontier.clone());
        }
    }

    fn linear(ops: u32) -> ChangeLog {
        ChangeLog::from_records(vec![ChangeRecord::new(1, 0, ops)]).expect("valid")
    }

    fn session<'a>(
        log: &'a mut ChangeLog,
        recorder: &'a mut Recorder,
        clock: &ManualClock,
    ) -> ScrubSession<'a, ChangeLog, &'a mut Recorder, ManualClock> {
        let debouncer = Debouncer::with_clock(Duration::from_millis(300), clock.clone());
        ScrubSession::with_parts(log, recorder, debouncer)
    }

    #[test]
    fn starts_at_current_checkout() {
        let mut log = linear(5);
        let mut recorder = Recorder::default();
        let clock = ManualClock::new();
        let s = session(&mut log, &mut recorder, &clock);
        assert_eq!(s.position(), 6);
        assert_eq!(s.label(), "Latest Version");
        assert!(!s.is_pending());
        drop(s);
        assert_eq!(recorder.lengths, vec![7]);
        assert!(recorder.frontiers.is_empty());
    }

    #[test]
    fn starts_mid_history() {
        let mut log = linear(5);
        log.checkout(&Frontier::single(OpId::new(1, 1))).expect("checkout");
        let s = ScrubSession::new(&mut log);
        assert_eq!(s.position(), 2);
        assert_eq!(s.cursor().lamport, Some(1));
    }

    #[test]
    fn immediate_checkout() {
        let mut log = linear(5);
        let mut recorder = Recorder::default();
        let clock = ManualClock::new();
        let mut s = session(&mut log, &mut recorder, &clock);
        assert_eq!(s.apply_position(2, true).expect("apply"), ScrubOutcome::Applied);
        assert_eq!(s.engine().current_frontier(), Frontier::single(OpId::new(1, 1)));
        assert_eq!(s.label(), "Operation 2 of 6");
    }

    #[test]
    fn drag_defers_until_quiet() {
        let mut log = linear(5);
        let mut recorder = Recorder::default();
        let clock = ManualClock::new();
        let mut s = session(&mut log, &mut recorder, &clock);

        for position in [1, 2, 3] {
            assert_eq!(s.apply_position(position, false).expect("apply"), ScrubOutcome::Deferred);
            clock.advance(Duration::from_millis(100));
            assert!(!s.tick().expect("tick"));
        }
        // Cursor follows immediately, engine does not.
        assert_eq!(s.cursor().frontier, Frontier::single(OpId::new(1, 2)));
        assert_eq!(s.engine().current_frontier(), Frontier::single(OpId::new(1, 4)));

        clock.advance(Duration::from_millis(200));
        assert!(s.tick().expect("tick"));
        assert_eq!(s.engine().current_frontier(), Frontier::single(OpId::new(1, 2)));
        assert!(!s.is_pending());
        drop(s);
        assert_eq!(recorder.frontiers.len(), 3);
    }

    #[test]
    fn boundaries_bypass_debounce() {
        let mut log = linear(5);
        let mut recorder = Recorder::default();
        let clock = ManualClock::new();
        let mut s = session(&mut log, &mut recorder, &clock);

        s.apply_position(3, false).expect("apply");
        assert!(s.is_pending());
        assert_eq!(s.apply_position(0, false).expect("apply"), ScrubOutcome::Applied);
        assert!(!s.is_pending());
        assert!(s.engine().current_frontier().is_empty());

        // The superseded drag never lands.
        clock.advance(Duration::from_secs(1));
        assert!(!s.tick().expect("tick"));
        assert!(s.engine().current_frontier().is_empty());
    }

    #[test]
    fn flush_applies_pending() {
        let mut log = linear(5);
        let mut s = ScrubSession::new(&mut log);
        s.apply_position(4, false).expect("apply");
        assert!(s.flush().expect("flush"));
        assert_eq!(s.engine().current_frontier(), Frontier::single(OpId::new(1, 3)));
        assert!(!s.flush().expect("flush"));
    }

    #[test]
    fn out_of_range_is_ignored() {
        let mut log = linear(2);
        let mut recorder = Recorder::default();
        let clock = ManualClock::new();
        let mut s = session(&mut log, &mut recorder, &clock);
        assert_eq!(s.apply_position(4, true).expect("apply"), ScrubOutcome::Ignored);
        assert_eq!(s.apply_position(u64::MAX, false).expect("apply"), ScrubOutcome::Ignored);
        assert_eq!(s.position(), 3);
        assert!(!s.is_pending());
        drop(s);
        assert!(recorder.frontiers.is_empty());
    }

    #[test]
    fn stepping_is_clamped() {
        let mut log = linear(2);
        let mut s = ScrubSession::new(&mut log);
        assert_eq!(s.step_forward().expect("step"), ScrubOutcome::Ignored);
        assert_eq!(s.step_back().expect("step"), ScrubOutcome::Applied);
        assert_eq!(s.position(), 2);
        s.jump_to_start().expect("jump");
        assert_eq!(s.step_back().expect("step"), ScrubOutcome::Ignored);
        assert_eq!(s.position(), 0);
        s.step_forward().expect("step");
        assert_eq!(s.engine().current_frontier(), Frontier::single(OpId::new(1, 0)));
        s.jump_to_end().expect("jump");
        assert_eq!(s.position(), 3);
    }

    #[test]
    fn reset_follows_engine() {
        let mut log = linear(3);
        let mut s = ScrubSession::new(&mut log);
        s.apply_position(1, false).expect("apply");
        s.reset();
        assert!(!s.is_pending());
        assert_eq!(s.position(), 4);
    }
}
