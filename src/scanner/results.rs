use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use super::transport::Family;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Reachable,
    Unreachable,
}

impl ProbeStatus {
    pub fn is_reachable(self) -> bool {
        self == ProbeStatus::Reachable
    }
}

impl std::fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeStatus::Reachable => write!(f, "ok"),
            ProbeStatus::Unreachable => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetResult {
    pub target: IpAddr,
    pub family: Family,
    pub status: ProbeStatus,
}

/// Final classification of one sweep, in input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepResult {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub delay_ms: u64,
    pub timeout_ms: u64,
    pub targets: Vec<TargetResult>,
}

impl SweepResult {
    pub fn reachable_count(&self) -> usize {
        self.targets.iter().filter(|t| t.status.is_reachable()).count()
    }

    pub fn unreachable_count(&self) -> usize {
        self.targets.len() - self.reachable_count()
    }

    pub fn status_of(&self, target: IpAddr) -> Option<ProbeStatus> {
        self.targets
            .iter()
            .find(|t| t.target == target)
            .map(|t| t.status)
    }
}
