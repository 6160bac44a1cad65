use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Context, Result};

use crate::scanner::REPLY_QUEUE_CAPACITY;

/// Central configuration for pingsweep
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub probe: ProbeConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Interval between two probes
    pub delay_ms: u64,
    /// How long a probe may wait for its reply, and how long the run
    /// keeps listening after the last probe
    pub timeout_ms: u64,
    /// Capacity of the queue between reply listeners and the control loop
    pub reply_queue: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: String,
    pub show_reachable: bool,
    pub show_unreachable: bool,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be greater than 0")]
    Zero(&'static str),

    #[error("output format must be one of: text, json, csv (got '{0}')")]
    UnknownFormat(String),

    #[error("invalid duration '{0}'")]
    Duration(String),
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            delay_ms: 100,
            timeout_ms: 3000,
            reply_queue: REPLY_QUEUE_CAPACITY,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "text".to_string(),
            show_reachable: false,
            show_unreachable: false,
        }
    }
}

impl ProbeConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    /// Load from `path`, or from the standard location if it exists.
    ///
    /// An explicit path must exist; a missing standard file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let default_path = Self::get_config_path();
                if default_path.exists() {
                    Self::load_from(&default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Cannot read config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Get the path to the config file
    pub fn get_config_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("pingsweep");
        path.push("config.json");
        path
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.probe.delay_ms == 0 {
            return Err(ConfigError::Zero("delay"));
        }

        if self.probe.timeout_ms == 0 {
            return Err(ConfigError::Zero("timeout"));
        }

        if self.probe.reply_queue == 0 {
            return Err(ConfigError::Zero("reply_queue"));
        }

        if !matches!(self.output.format.as_str(), "text" | "json" | "csv") {
            return Err(ConfigError::UnknownFormat(self.output.format.clone()));
        }

        Ok(())
    }
}

/// Parse a duration such as `250ms`, `1.5s` or `1m30s`.
///
/// Units are `ns`, `us`, `µs`, `ms`, `s`, `m` and `h`. A bare number is
/// taken as seconds.
pub fn parse_duration(arg: &str) -> Result<Duration, ConfigError> {
    let err = || ConfigError::Duration(arg.to_string());
    let s = arg.trim();
    if s.is_empty() {
        return Err(err());
    }

    if let Ok(secs) = s.parse::<f64>() {
        return nanos_to_duration(secs * 1e9).ok_or_else(err);
    }

    let mut nanos = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(err)?;
        if num_len == 0 {
            return Err(err());
        }
        let value: f64 = rest[..num_len].parse().map_err(|_| err())?;
        rest = &rest[num_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return Err(err()),
        };
        nanos += value * scale;
        rest = &rest[unit_len..];
    }

    nanos_to_duration(nanos).ok_or_else(err)
}

fn nanos_to_duration(nanos: f64) -> Option<Duration> {
    if !nanos.is_finite() || nanos < 0.0 || nanos > u64::MAX as f64 {
        return None;
    }
    Some(Duration::from_nanos(nanos.round() as u64))
}

/// Duration in whole milliseconds, rounding sub-millisecond values up.
pub fn duration_to_millis(d: Duration) -> u64 {
    let ms = d.as_millis();
    let ms = if d.subsec_nanos() % 1_000_000 != 0 { ms + 1 } else { ms };
    u64::try_from(ms).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.probe.delay(), Duration::from_millis(100));
        assert_eq!(config.probe.timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_zero_values_rejected() {
        let mut config = Config::default();
        config.probe.delay_ms = 0;
        assert_eq!(config.validate(), Err(ConfigError::Zero("delay")));

        let mut config = Config::default();
        config.probe.timeout_ms = 0;
        assert_eq!(config.validate(), Err(ConfigError::Zero("timeout")));

        let mut config = Config::default();
        config.output.format = "xml".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::UnknownFormat(_))));
    }

    #[test]
    fn test_partial_config_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "probe": {{ "timeout_ms": 500 }} }}"#).unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.probe.timeout_ms, 500);
        assert_eq!(config.probe.delay_ms, 100);
        assert_eq!(config.output.format, "text");
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(dir.path().join("nope.json").as_path())).is_err());
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("500us").unwrap(), Duration::from_micros(500));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("ms").is_err());
        assert!(parse_duration("10 parsecs").is_err());
        assert!(parse_duration("-1s").is_err());
        assert!(parse_duration("5d").is_err());
    }

    #[test]
    fn test_duration_to_millis_rounds_up() {
        assert_eq!(duration_to_millis(Duration::from_millis(250)), 250);
        assert_eq!(duration_to_millis(Duration::from_micros(500)), 1);
        assert_eq!(duration_to_millis(Duration::from_micros(1500)), 2);
    }
}
