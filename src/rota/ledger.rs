//! Per-endpoint usage ledger over a trailing time window.
//!
//! The ledger is the mutable half of the selection state: the registry says
//! what an endpoint is, the ledger says how hard it has been used lately.
//! One timestamp is recorded per checkout; counts are always computed
//! against a trailing window, with expired entries pruned lazily whenever a
//! window is touched. Nothing here talks to a provider -- declared
//! capacities are trusted, actual rate-limit responses are the caller's
//! problem.

use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Margin predicate shared by live checks and status snapshots: usage at or
/// past `ratio` of capacity counts as near-limit.
pub(crate) fn at_margin(usage: usize, capacity: u32, ratio: f64) -> bool {
    usage as f64 >= capacity as f64 * ratio
}

/// Sliding-window usage counts, keyed by endpoint name.
///
/// Each endpoint's window sits behind its own mutex inside a `DashMap`, so
/// recording against one endpoint never blocks reads of another. Guards are
/// never held across an `.await`. Timestamps come from `tokio::time`, which
/// lets tests drive the clock with `start_paused` instead of sleeping.
pub struct UsageLedger {
    window: Duration,
    windows: DashMap<String, Mutex<VecDeque<Instant>>>,
}

impl UsageLedger {
    /// Create a ledger with the given trailing window length.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            windows: DashMap::new(),
        }
    }

    /// Record one call against the endpoint at the current instant.
    pub fn record(&self, endpoint: &str) {
        let now = Instant::now();
        let entry = self
            .windows
            .entry(endpoint.to_string())
            .or_insert_with(|| Mutex::new(VecDeque::new()));
        let mut window = entry.lock().unwrap();
        Self::prune(&mut window, now, self.window);
        window.push_back(now);
    }

    /// Number of calls recorded against the endpoint within the trailing
    /// window. Unknown endpoints count zero.
    pub fn usage_count(&self, endpoint: &str) -> usize {
        match self.windows.get(endpoint) {
            Some(entry) => {
                let mut window = entry.lock().unwrap();
                Self::prune(&mut window, Instant::now(), self.window);
                window.len()
            }
            None => 0,
        }
    }

    /// Whether recent usage is at or past `ratio` of the declared capacity.
    ///
    /// This is an early-warning margin, not a hard cutoff: selection prefers
    /// endpoints under the margin but still hands out near-limit ones when
    /// nothing better exists.
    pub fn is_near_limit(&self, endpoint: &str, capacity: u32, ratio: f64) -> bool {
        at_margin(self.usage_count(endpoint), capacity, ratio)
    }

    /// Drop entries strictly older than the window. Entries are appended in
    /// time order, so pruning stops at the first survivor.
    fn prune(window: &mut VecDeque<Instant>, now: Instant, span: Duration) {
        while let Some(&front) = window.front() {
            if now.duration_since(front) > span {
                window.pop_front();
            } else {
                break;
            }
        }
    }
}
