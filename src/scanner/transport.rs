//! Unprivileged ICMP sockets, one per address family.
//!
//! Uses `SOCK_DGRAM` ping sockets, so no root is needed as long as the
//! caller's group is inside `net.ipv4.ping_group_range`. The kernel owns the
//! echo identifier on these sockets and only hands back replies to our own
//! requests.

use std::fmt;
use std::mem::MaybeUninit;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use pnet::packet::icmp::echo_request::MutableEchoRequestPacket;
use pnet::packet::icmp::{self, IcmpCode, IcmpPacket, IcmpTypes};
use pnet::packet::icmpv6::{Icmpv6Code, Icmpv6Types, MutableIcmpv6Packet};
use pnet::packet::Packet;
use serde::{Deserialize, Serialize};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tracing::debug;

use super::error::{ProbeError, ProbeResult};

/// Echo header: type, code, checksum, identifier, sequence
pub const ECHO_HEADER_LEN: usize = 8;
const ECHO_SEQUENCE: u16 = 1;
const RECV_BUFFER_SIZE: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Family {
    V4,
    V6,
}

impl Family {
    pub fn of(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => Family::V4,
            IpAddr::V6(_) => Family::V6,
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Family::V4 => write!(f, "IPv4"),
            Family::V6 => write!(f, "IPv6"),
        }
    }
}

/// Anything that can put one probe on the wire.
///
/// Sending never fails from the caller's point of view: a probe that could
/// not be handed to the kernel simply never gets a reply.
pub trait ProbeSender {
    fn send(&self, dst: IpAddr);
}

/// Build an echo request with an empty payload.
pub fn echo_request(family: Family, identifier: u16) -> [u8; ECHO_HEADER_LEN] {
    let mut buf = [0u8; ECHO_HEADER_LEN];
    match family {
        Family::V4 => {
            if let Some(mut packet) = MutableEchoRequestPacket::new(&mut buf) {
                packet.set_icmp_type(IcmpTypes::EchoRequest);
                packet.set_icmp_code(IcmpCode(0));
                packet.set_identifier(identifier);
                packet.set_sequence_number(ECHO_SEQUENCE);
                packet.set_checksum(0);
                let checksum = IcmpPacket::new(packet.packet()).map(|p| icmp::checksum(&p));
                packet.set_checksum(checksum.unwrap_or(0));
            }
        }
        Family::V6 => {
            // ICMPv6 checksums cover the IPv6 pseudo header; the kernel fills it in.
            if let Some(mut packet) = MutableIcmpv6Packet::new(&mut buf) {
                packet.set_icmpv6_type(Icmpv6Types::EchoRequest);
                packet.set_icmpv6_code(Icmpv6Code(0));
                packet.set_checksum(0);
                let mut rest = [0u8; 4];
                rest[..2].copy_from_slice(&identifier.to_be_bytes());
                rest[2..].copy_from_slice(&ECHO_SEQUENCE.to_be_bytes());
                packet.set_payload(&rest);
            }
        }
    }
    buf
}

/// One open ICMP socket bound to the wildcard address of its family.
#[derive(Debug, Clone)]
pub struct IcmpSocket {
    family: Family,
    inner: Arc<Socket>,
}

impl IcmpSocket {
    pub fn open(family: Family) -> ProbeResult<Self> {
        let (domain, protocol, wildcard) = match family {
            Family::V4 => (
                Domain::IPV4,
                Protocol::ICMPV4,
                SocketAddr::from(([0, 0, 0, 0], 0)),
            ),
            Family::V6 => (
                Domain::IPV6,
                Protocol::ICMPV6,
                SocketAddr::from(([0u16; 8], 0)),
            ),
        };

        let socket = Socket::new(domain, Type::DGRAM, Some(protocol))
            .and_then(|s| s.bind(&SockAddr::from(wildcard)).map(|_| s))
            .map_err(|source| ProbeError::Open { family, source })?;

        debug!("Opened {} ICMP socket", family);
        Ok(Self {
            family,
            inner: Arc::new(socket),
        })
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn send(&self, dst: IpAddr) {
        let packet = echo_request(self.family, rand::random::<u16>());
        let addr = SockAddr::from(SocketAddr::new(dst, 0));
        if let Err(e) = self.inner.send_to(&packet, &addr) {
            debug!("Send to {} failed, it will time out: {}", dst, e);
        }
    }

    /// Block until a packet arrives and return who sent it.
    pub fn receive(&self) -> ProbeResult<IpAddr> {
        let mut buf = [MaybeUninit::<u8>::uninit(); RECV_BUFFER_SIZE];
        let (_, peer) = self.inner.recv_from(&mut buf)?;
        peer.as_socket()
            .map(|addr| addr.ip().to_canonical())
            .ok_or_else(|| ProbeError::UnexpectedPeer(format!("{:?}", peer)))
    }
}

/// The transports of one run, opened for the families the targets need.
#[derive(Debug, Clone, Default)]
pub struct Transports {
    v4: Option<IcmpSocket>,
    v6: Option<IcmpSocket>,
}

impl Transports {
    /// Open a socket for every family that appears in `targets`.
    pub fn open_for(targets: &[IpAddr]) -> ProbeResult<Self> {
        let mut transports = Self::default();
        if targets.iter().any(IpAddr::is_ipv4) {
            transports.v4 = Some(IcmpSocket::open(Family::V4)?);
        }
        if targets.iter().any(IpAddr::is_ipv6) {
            transports.v6 = Some(IcmpSocket::open(Family::V6)?);
        }
        Ok(transports)
    }

    pub fn socket_for(&self, family: Family) -> ProbeResult<&IcmpSocket> {
        match family {
            Family::V4 => self.v4.as_ref(),
            Family::V6 => self.v6.as_ref(),
        }
        .ok_or(ProbeError::NoTransport(family))
    }

    pub fn sockets(&self) -> impl Iterator<Item = &IcmpSocket> {
        self.v4.iter().chain(self.v6.iter())
    }
}

impl ProbeSender for Transports {
    fn send(&self, dst: IpAddr) {
        match self.socket_for(Family::of(dst)) {
            Ok(socket) => socket.send(dst),
            Err(e) => debug!("Dropping probe to {}: {}", dst, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_family_of_address() {
        assert_eq!(Family::of(IpAddr::V4(Ipv4Addr::LOCALHOST)), Family::V4);
        assert_eq!(Family::of(IpAddr::V6(Ipv6Addr::LOCALHOST)), Family::V6);
    }

    #[test]
    fn test_v4_echo_request_layout() {
        let packet = echo_request(Family::V4, 0xbeef);
        assert_eq!(packet[0], 8);
        assert_eq!(packet[1], 0);
        assert_eq!(&packet[4..6], &[0xbe, 0xef]);
        assert_eq!(&packet[6..8], &[0x00, 0x01]);
    }

    #[test]
    fn test_v4_echo_request_checksum_verifies() {
        let packet = echo_request(Family::V4, 0x1234);
        // Summing a packet that carries its own checksum folds to 0xffff.
        let mut sum: u32 = packet
            .chunks(2)
            .map(|w| u32::from(u16::from_be_bytes([w[0], w[1]])))
            .sum();
        while sum >> 16 != 0 {
            sum = (sum & 0xffff) + (sum >> 16);
        }
        assert_eq!(sum, 0xffff);
    }

    #[test]
    fn test_v6_echo_request_layout() {
        let packet = echo_request(Family::V6, 0x0102);
        assert_eq!(packet[0], 128);
        assert_eq!(packet[1], 0);
        assert_eq!(&packet[2..4], &[0, 0]);
        assert_eq!(&packet[4..6], &[0x01, 0x02]);
        assert_eq!(&packet[6..8], &[0x00, 0x01]);
    }

    #[test]
    fn test_no_transport_for_missing_family() {
        let transports = Transports::default();
        assert!(matches!(
            transports.socket_for(Family::V6),
            Err(ProbeError::NoTransport(Family::V6))
        ));
        assert_eq!(transports.sockets().count(), 0);
    }

    #[test]
    fn test_open_for_empty_list_opens_nothing() {
        let transports = Transports::open_for(&[]).unwrap();
        assert_eq!(transports.sockets().count(), 0);
    }
}
