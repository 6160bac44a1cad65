use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

use tokio::time::Instant;

/// What a reply did to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// Arrived within the timeout; target resolved as reachable
    Matched,
    /// Probe is outstanding but already expired; entry kept
    Late,
    /// Not in flight: duplicate, already resolved, or never probed
    Unknown,
}

/// Send instants of probes that have not been answered in time.
///
/// Entries are inserted once per target and only ever removed, so whatever is
/// left at the end of a run is the set of unreachable targets.
#[derive(Debug, Default)]
pub struct InFlightTable {
    sent: HashMap<IpAddr, Instant>,
}

impl InFlightTable {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sent: HashMap::with_capacity(capacity),
        }
    }

    /// Record a probe. Returns `false` if the target was already in flight.
    pub fn insert(&mut self, target: IpAddr, at: Instant) -> bool {
        self.sent.insert(target, at).is_none()
    }

    pub fn reconcile(&mut self, from: IpAddr, now: Instant, timeout: Duration) -> ReplyOutcome {
        match self.sent.get(&from) {
            Some(&at) if now.saturating_duration_since(at) <= timeout => {
                self.sent.remove(&from);
                ReplyOutcome::Matched
            }
            Some(_) => ReplyOutcome::Late,
            None => ReplyOutcome::Unknown,
        }
    }

    pub fn contains(&self, target: &IpAddr) -> bool {
        self.sent.contains_key(target)
    }

    pub fn len(&self) -> usize {
        self.sent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }
}
