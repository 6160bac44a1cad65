//! Turns the input list into the ordered set of addresses to probe.
//!
//! One entry per line: an address, a CIDR prefix or an inclusive
//! `first-last` range. Blank lines and `#` comments are ignored. Lines that
//! cannot be parsed are skipped with a warning so that one typo does not
//! abort a sweep of thousands of hosts.

use std::collections::HashSet;
use std::net::IpAddr;

use ipnet::{IpAddrRange, IpNet, Ipv4AddrRange, Ipv6AddrRange};
use tracing::warn;

/// Largest number of addresses a single prefix or range may expand to
pub const MAX_EXPANSION: u128 = 1 << 16;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("Ignoring invalid IP '{0}'")]
    Invalid(String),

    #[error("Ignoring range '{0}': both ends must be the same address family")]
    MixedRange(String),

    #[error("Ignoring range '{0}': first address is above the last one")]
    ReversedRange(String),

    #[error("Ignoring '{0}': expands to more than 65536 addresses")]
    TooLarge(String),
}

/// Parse raw input bytes. Bytes that are not UTF-8 only spoil their own line.
pub fn parse_target_bytes(data: &[u8]) -> Vec<IpAddr> {
    parse_targets(&String::from_utf8_lossy(data))
}

/// Parse a whole input list, keeping input order and dropping duplicates.
pub fn parse_targets(input: &str) -> Vec<IpAddr> {
    let mut seen = HashSet::new();
    let mut targets = Vec::new();

    for (number, line) in input.lines().enumerate() {
        let entry = strip_comment(line);
        if entry.is_empty() {
            continue;
        }

        match parse_entry(entry) {
            Ok(addrs) => {
                for addr in addrs {
                    if seen.insert(addr) {
                        targets.push(addr);
                    } else {
                        warn!("Line {}: ignoring duplicate address {}", number + 1, addr);
                    }
                }
            }
            Err(e) => warn!("Line {}: {}", number + 1, e),
        }
    }

    targets
}

/// Expand one non-empty entry into canonical addresses.
pub fn parse_entry(entry: &str) -> Result<Vec<IpAddr>, TargetError> {
    if let Ok(addr) = entry.parse::<IpAddr>() {
        return Ok(vec![addr.to_canonical()]);
    }

    if entry.contains('/') {
        let net: IpNet = entry
            .parse()
            .map_err(|_| TargetError::Invalid(entry.to_string()))?;
        let host_bits = u32::from(net.max_prefix_len() - net.prefix_len());
        if host_bits > MAX_EXPANSION.trailing_zeros() {
            return Err(TargetError::TooLarge(entry.to_string()));
        }
        return Ok(net.hosts().map(|a| a.to_canonical()).collect());
    }

    if let Some((first, last)) = entry.split_once('-') {
        let first: IpAddr = first
            .trim()
            .parse()
            .map_err(|_| TargetError::Invalid(entry.to_string()))?;
        let last: IpAddr = last
            .trim()
            .parse()
            .map_err(|_| TargetError::Invalid(entry.to_string()))?;
        return expand_range(entry, first.to_canonical(), last.to_canonical());
    }

    Err(TargetError::Invalid(entry.to_string()))
}

fn expand_range(entry: &str, first: IpAddr, last: IpAddr) -> Result<Vec<IpAddr>, TargetError> {
    let (range, span) = match (first, last) {
        (IpAddr::V4(a), IpAddr::V4(b)) => (
            IpAddrRange::from(Ipv4AddrRange::new(a, b)),
            i128::from(u32::from(b)) - i128::from(u32::from(a)),
        ),
        (IpAddr::V6(a), IpAddr::V6(b)) => {
            let (a_bits, b_bits) = (u128::from(a), u128::from(b));
            if a_bits > b_bits {
                return Err(TargetError::ReversedRange(entry.to_string()));
            }
            (
                IpAddrRange::from(Ipv6AddrRange::new(a, b)),
                i128::try_from(b_bits - a_bits).unwrap_or(i128::MAX),
            )
        }
        _ => return Err(TargetError::MixedRange(entry.to_string())),
    };

    if span < 0 {
        return Err(TargetError::ReversedRange(entry.to_string()));
    }
    if span as u128 >= MAX_EXPANSION {
        return Err(TargetError::TooLarge(entry.to_string()));
    }
    Ok(range.collect())
}

fn strip_comment(line: &str) -> &str {
    line.split('#').next().unwrap_or("").trim()
}
