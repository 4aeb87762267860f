//! Event scheduling on a logical clock measured from pipeline start.

use std::time::Duration;

/// Kind of scheduled event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickKind {
    /// Query the playback source
    Poll,
    /// Re-evaluate the current line from the extrapolated offset
    Refresh,
}

/// Decides when the next poll or refresh happens.
///
/// Pure: the caller supplies the logical time at which each event actually
/// started, so polls are never closer than `poll_interval` even when a poll
/// ran late or took long.
#[derive(Debug, Clone)]
pub struct Scheduler {
    poll_interval: Duration,
    refresh_interval: Option<Duration>,
    next_poll: Duration,
    next_refresh: Option<Duration>,
}

impl Scheduler {
    /// First poll is due immediately.
    #[must_use]
    pub fn new(poll_interval: Duration, refresh_interval: Option<Duration>) -> Self {
        Self {
            poll_interval,
            refresh_interval,
            next_poll: Duration::ZERO,
            next_refresh: refresh_interval,
        }
    }

    /// Next due event and its logical time. A poll wins ties with a refresh.
    #[must_use]
    pub fn next(&self) -> (Duration, TickKind) {
        match self.next_refresh {
            Some(refresh) if refresh < self.next_poll => (refresh, TickKind::Refresh),
            _ => (self.next_poll, TickKind::Poll),
        }
    }

    /// Record that an event of `kind` started at `started_at`.
    pub fn complete(&mut self, kind: TickKind, started_at: Duration) {
        match kind {
            TickKind::Poll => {
                self.next_poll = started_at + self.poll_interval;
                // Refreshes restart from the fresh poll baseline
                self.next_refresh = self.refresh_interval.map(|interval| started_at + interval);
            }
            TickKind::Refresh => {
                self.next_refresh = self.refresh_interval.map(|interval| started_at + interval);
            }
        }
    }
}
