use std::collections::VecDeque;
use std::net::IpAddr;
use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// Releases targets one per tick, in input order.
///
/// The first tick completes immediately so the first probe goes out at
/// start; later ticks are spaced by `delay`.
#[derive(Debug)]
pub struct Dispatcher {
    pending: VecDeque<IpAddr>,
    ticker: Interval,
}

impl Dispatcher {
    pub fn new(targets: &[IpAddr], delay: Duration) -> Self {
        let mut ticker = time::interval(delay);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            pending: targets.iter().copied().collect(),
            ticker,
        }
    }

    /// Wait for the next dispatch slot.
    pub async fn tick(&mut self) -> Instant {
        self.ticker.tick().await
    }

    /// Take the next target, if any are left.
    pub fn release(&mut self) -> Option<IpAddr> {
        self.pending.pop_front()
    }

    pub fn is_exhausted(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}
