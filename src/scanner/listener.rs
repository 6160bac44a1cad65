use std::net::IpAddr;
use std::thread::JoinHandle;

use tokio::sync::mpsc;
use tracing::{debug, error, trace};

use super::error::ProbeResult;
use super::transport::IcmpSocket;

/// What a listener publishes: a replying address, or the error that killed it.
pub type ReplyEvent = ProbeResult<IpAddr>;

/// Default capacity of the reply channel
pub const REPLY_QUEUE_CAPACITY: usize = 5;

/// Source of inbound replies, drained by a listener thread.
pub trait ReplySource: Send + 'static {
    fn receive(&self) -> ProbeResult<IpAddr>;
    fn name(&self) -> String;
}

impl ReplySource for IcmpSocket {
    fn receive(&self) -> ProbeResult<IpAddr> {
        IcmpSocket::receive(self)
    }

    fn name(&self) -> String {
        format!("{}-listener", self.family())
    }
}

/// Spawn a thread that forwards every reply from `source` into `tx`.
///
/// The thread blocks on the socket and is never told to stop. It ends after
/// publishing a receive error, or once the run has dropped the receiving half.
pub fn spawn_listener<S: ReplySource>(
    source: S,
    tx: mpsc::Sender<ReplyEvent>,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name(source.name())
        .spawn(move || listen(source, tx))
}

fn listen<S: ReplySource>(source: S, tx: mpsc::Sender<ReplyEvent>) {
    debug!("{} started", source.name());
    loop {
        match source.receive() {
            Ok(addr) => {
                trace!("Reply from {}", addr);
                if tx.blocking_send(Ok(addr)).is_err() {
                    break;
                }
            }
            Err(e) => {
                error!("{} failed: {}", source.name(), e);
                let _ = tx.blocking_send(Err(e));
                break;
            }
        }
    }
    debug!("{} stopped", source.name());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::error::ProbeError;
    use std::collections::VecDeque;
    use std::net::Ipv4Addr;
    use std::sync::Mutex;

    struct Scripted {
        replies: Mutex<VecDeque<ProbeResult<IpAddr>>>,
    }

    impl Scripted {
        fn new(replies: Vec<ProbeResult<IpAddr>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
            }
        }
    }

    impl ReplySource for Scripted {
        fn receive(&self) -> ProbeResult<IpAddr> {
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProbeError::UnexpectedPeer("script exhausted".into())))
        }

        fn name(&self) -> String {
            "scripted".to_string()
        }
    }

    fn v4(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(192, 0, 2, last))
    }

    #[test]
    fn test_forwards_replies_then_error() {
        let (tx, mut rx) = mpsc::channel(REPLY_QUEUE_CAPACITY);
        let source = Scripted::new(vec![Ok(v4(1)), Ok(v4(2))]);
        let handle = spawn_listener(source, tx).unwrap();
        handle.join().unwrap();

        assert_eq!(rx.blocking_recv().unwrap().unwrap(), v4(1));
        assert_eq!(rx.blocking_recv().unwrap().unwrap(), v4(2));
        assert!(matches!(
            rx.blocking_recv(),
            Some(Err(ProbeError::UnexpectedPeer(_)))
        ));
        assert!(rx.blocking_recv().is_none());
    }

    #[test]
    fn test_stops_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let source = Scripted::new(vec![Ok(v4(1)), Ok(v4(2)), Ok(v4(3))]);
        let handle = spawn_listener(source, tx).unwrap();
        handle.join().unwrap();
    }
}
