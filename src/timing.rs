//! Coalescing helpers for the single-threaded event loop.
//!
//! Nothing here owns a thread or a runtime timer: every helper records a
//! deadline and fires when polled at or after it. The reader polls them from
//! `MangaReader::tick`, and the host uses `next_deadline` to sleep precisely.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Source of the current instant.
pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Hand-advanced clock; clones share the same time.
///
/// For hosts that drive time themselves, such as replays and tests.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Rc::new(Cell::new(Instant::now())),
        }
    }

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

/// Keeps only the latest call and releases it once `window` has passed
/// without another call.
#[derive(Debug)]
pub struct Debounce<T> {
    window: Duration,
    pending: Option<(Instant, T)>,
}

impl<T> Debounce<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    pub fn call(&mut self, now: Instant, value: T) {
        self.pending = Some((now + self.window, value));
    }

    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match self.pending {
            Some((deadline, _)) if deadline <= now => self.pending.take().map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(d, _)| *d)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

/// Fires on the leading edge, then at most once more (with the latest value)
/// at the end of each window.
#[derive(Debug)]
pub struct Throttle<T> {
    window: Duration,
    last_fire: Option<Instant>,
    trailing: Option<T>,
}

impl<T> Throttle<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_fire: None,
            trailing: None,
        }
    }

    /// Returns the value when it should run right away.
    pub fn call(&mut self, now: Instant, value: T) -> Option<T> {
        let open = self
            .last_fire
            .map_or(true, |last| now.duration_since(last) >= self.window);
        if open && self.trailing.is_none() {
            self.last_fire = Some(now);
            return Some(value);
        }
        self.trailing = Some(value);
        None
    }

    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let deadline = self.deadline()?;
        if deadline > now {
            return None;
        }
        self.last_fire = Some(now);
        self.trailing.take()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.trailing.as_ref()?;
        let last = self.last_fire?;
        Some(last + self.window)
    }

    pub fn cancel(&mut self) {
        self.trailing = None;
    }
}

/// Single-shot timer; arming it again supersedes the pending shot.
pub type Timer = Debounce<()>;

impl Timer {
    pub fn arm(&mut self, now: Instant) {
        self.call(now, ());
    }

    pub fn fired(&mut self, now: Instant) -> bool {
        self.poll(now).is_some()
    }
}

/// Earliest of several optional deadlines.
pub fn earliest(deadlines: impl IntoIterator<Item = Option<Instant>>) -> Option<Instant> {
    deadlines.into_iter().flatten().min()
}
