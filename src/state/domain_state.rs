use std::time::Duration;
use tokio::time::Instant;

/// Request spacing state of one domain
///
/// Lives behind the rate limiter's per-domain lock; never persisted, so the
/// first request to a domain after a restart goes out immediately.
#[derive(Debug, Clone)]
pub struct DomainState {
    /// Minimum time between two request starts
    pub interval: Duration,

    /// Start time of the last request to this domain
    pub last_request_time: Option<Instant>,

    /// Number of requests made to this domain by this process
    pub request_count: u64,
}

impl DomainState {
    /// Creates a state for a domain with the given spacing
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_request_time: None,
            request_count: 0,
        }
    }

    /// Returns the earliest instant the next request may start
    pub fn next_slot(&self, now: Instant) -> Instant {
        match self.last_request_time {
            Some(last) => std::cmp::max(now, last + self.interval),
            None => now,
        }
    }

    /// Calculates the time until the next request can be made
    ///
    /// Returns None if a request can be made now.
    pub fn time_until_next_request(&self, now: Instant) -> Option<Duration> {
        let slot = self.next_slot(now);
        if slot > now {
            Some(slot - now)
        } else {
            None
        }
    }

    /// Records that a request started at `at`
    pub fn record_request(&mut self, at: Instant) {
        self.request_count += 1;
        self.last_request_time = Some(at);
    }
}
