//! The probe engine.
//!
//! A single control loop owns all run state. It multiplexes three event
//! sources: the dispatch ticker, replies forwarded by the listener threads,
//! and the completion deadline armed after the last probe went out.

mod dispatch;
mod error;
mod inflight;
mod listener;
mod results;
mod transport;

use std::net::IpAddr;

use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tracing::{debug, info, trace};

use crate::config::ProbeConfig;
pub use dispatch::Dispatcher;
pub use error::{ProbeError, ProbeResult};
pub use inflight::{InFlightTable, ReplyOutcome};
pub use listener::{spawn_listener, ReplyEvent, ReplySource, REPLY_QUEUE_CAPACITY};
pub use results::{ProbeStatus, SweepResult, TargetResult};
pub use transport::{echo_request, Family, IcmpSocket, ProbeSender, Transports};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Probes still being dispatched
    Running,
    /// Last probe sent, completion deadline armed
    Draining,
    Done,
}

/// Open the transports `targets` need, start their listeners and run a sweep.
pub async fn sweep(targets: &[IpAddr], config: &ProbeConfig) -> ProbeResult<SweepResult> {
    let transports = Transports::open_for(targets)?;
    let (tx, rx) = mpsc::channel(config.reply_queue);

    for socket in transports.sockets() {
        spawn_listener(socket.clone(), tx.clone()).map_err(ProbeError::Spawn)?;
    }
    drop(tx);

    Scanner::new(config.clone(), transports).run(targets, rx).await
}

pub struct Scanner<S> {
    config: ProbeConfig,
    sender: S,
}

impl<S: ProbeSender> Scanner<S> {
    pub fn new(config: ProbeConfig, sender: S) -> Self {
        Self { config, sender }
    }

    /// Probe every target once and classify it.
    ///
    /// Always waits the full timeout after the last dispatch, even when every
    /// probe has already been answered. Fails if the configured delay is zero
    /// or a listener reports a receive error.
    pub async fn run(
        &self,
        targets: &[IpAddr],
        mut replies: mpsc::Receiver<ReplyEvent>,
    ) -> ProbeResult<SweepResult> {
        let start_time = chrono::Utc::now();
        let timeout = self.config.timeout();
        let delay = self.config.delay();

        let mut in_flight = InFlightTable::with_capacity(targets.len());
        if targets.is_empty() {
            return Ok(self.classify(targets, &in_flight, start_time));
        }

        if delay.is_zero() {
            return Err(ProbeError::ZeroDelay);
        }

        let mut dispatcher = Dispatcher::new(targets, delay);
        let deadline = time::sleep(timeout);
        tokio::pin!(deadline);
        let mut phase = Phase::Running;

        debug!(
            "Sweeping {} targets, delay {:?}, timeout {:?}",
            dispatcher.remaining(),
            delay,
            timeout
        );

        while phase != Phase::Done {
            tokio::select! {
                sent_at = dispatcher.tick(), if !dispatcher.is_exhausted() => {
                    // A tick that races with exhaustion releases nothing.
                    if let Some(target) = dispatcher.release() {
                        trace!("Probing {}", target);
                        self.sender.send(target);
                        in_flight.insert(target, sent_at);

                        if dispatcher.is_exhausted() {
                            deadline.as_mut().reset(Instant::now() + timeout);
                            phase = Phase::Draining;
                            debug!(
                                "All probes sent, {} unanswered, waiting {:?} for replies",
                                in_flight.len(),
                                timeout
                            );
                        }
                    }
                }

                Some(event) = replies.recv() => {
                    let from = event?;
                    match in_flight.reconcile(from, Instant::now(), timeout) {
                        ReplyOutcome::Matched => trace!("{} is reachable", from),
                        ReplyOutcome::Late => trace!("Ignoring late reply from {}", from),
                        ReplyOutcome::Unknown => trace!("Ignoring reply from {}", from),
                    }
                }

                _ = &mut deadline, if phase == Phase::Draining => {
                    phase = Phase::Done;
                }
            }
        }

        if in_flight.is_empty() {
            debug!("Every target answered");
        }
        let result = self.classify(targets, &in_flight, start_time);
        info!(
            "Sweep finished: {} reachable, {} unreachable",
            result.reachable_count(),
            result.unreachable_count()
        );
        Ok(result)
    }

    fn classify(
        &self,
        targets: &[IpAddr],
        in_flight: &InFlightTable,
        start_time: chrono::DateTime<chrono::Utc>,
    ) -> SweepResult {
        let targets = targets
            .iter()
            .map(|&target| TargetResult {
                target,
                family: Family::of(target),
                status: if in_flight.contains(&target) {
                    ProbeStatus::Unreachable
                } else {
                    ProbeStatus::Reachable
                },
            })
            .collect();

        SweepResult {
            start_time,
            end_time: chrono::Utc::now(),
            delay_ms: self.config.delay_ms,
            timeout_ms: self.config.timeout_ms,
            targets,
        }
    }
}
