use std::io;

use super::transport::Family;

/// Errors that abort a sweep
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("Cannot open {family} ICMP socket: {source}\nCheck /proc/sys/net/ipv4/ping_group_range")]
    Open {
        family: Family,
        #[source]
        source: io::Error,
    },

    #[error("ICMP receive failed: {0}")]
    Receive(#[from] io::Error),

    #[error("Unexpected peer address on ICMP socket: {0}")]
    UnexpectedPeer(String),

    #[error("No transport open for {0} target")]
    NoTransport(Family),

    #[error("Cannot start reply listener: {0}")]
    Spawn(#[source] io::Error),

    #[error("Probe delay must be greater than 0")]
    ZeroDelay,
}

/// Result type for probe engine operations
pub type ProbeResult<T> = Result<T, ProbeError>;
