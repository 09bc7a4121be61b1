//! Cancellable deferred task with last-write-wins semantics.
//!
//! A [`Debouncer`] holds at most one pending value. Scheduling a new value
//! replaces the pending one and restarts the quiet period; the value becomes
//! due once the clock passes its deadline. The caller's event loop drives it
//! by calling [`Debouncer::poll`], so there are no threads or timers here.
//!
//! Time comes from a [`Clock`]: [`SystemClock`] in production and
//! [`ManualClock`] wherever time must be stepped deterministically.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Default quiet period before a deferred checkout is applied.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(300);

/// Source of monotonic time.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock.
///
/// Clones share the same time, so a test can keep one handle and hand
/// another to the component under test.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<Instant>>,
}

impl ManualClock {
    /// A clock frozen at the current instant until advanced.
    #[must_use]
    pub fn new() -> Self {
        Self {
            now: Rc::new(Cell::new(Instant::now())),
        }
    }

    /// Move time forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

#[derive(Debug)]
struct Pending<T> {
    value: T,
    deadline: Instant,
}

/// Single-slot deferred value.
#[derive(Debug)]
pub struct Debouncer<T, C: Clock = SystemClock> {
    delay: Duration,
    clock: C,
    pending: Option<Pending<T>>,
}

impl<T> Debouncer<T, SystemClock> {
    /// Debouncer on the system clock.
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self::with_clock(delay, SystemClock)
    }
}

impl<T, C: Clock> Debouncer<T, C> {
    #[must_use]
    pub const fn with_clock(delay: Duration, clock: C) -> Self {
        Self {
            delay,
            clock,
            pending: None,
        }
    }

    /// Defer `value`, replacing (and returning) whatever was pending.
    pub fn schedule(&mut self, value: T) -> Option<T> {
        let deadline = self.clock.now() + self.delay;
        self.pending
            .replace(Pending { value, deadline })
            .map(|p| p.value)
    }

    /// Take the pending value if its deadline has passed.
    pub fn poll(&mut self) -> Option<T> {
        let due = self
            .pending
            .as_ref()
            .is_some_and(|p| self.clock.now() >= p.deadline);
        if due { self.pending.take().map(|p| p.value) } else { None }
    }

    /// Take the pending value regardless of its deadline.
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|p| p.value)
    }

    /// Drop the pending value without applying it.
    pub fn cancel(&mut self) -> Option<T> {
        self.flush()
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
