use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{duration_to_millis, parse_duration, Config};

#[derive(Parser, Debug)]
#[command(name = "pingsweep")]
#[command(version)]
#[command(about = "Ping many IP addresses in short time", long_about = None)]
pub struct Cli {
    #[arg(help = "File with one IP address, CIDR prefix or range per line (default: stdin)")]
    pub input: Option<PathBuf>,

    #[arg(short, long, value_parser = parse_duration, help = "Delay between successive pings, e.g. 100ms [default: 100ms]")]
    pub delay: Option<Duration>,

    #[arg(short, long, value_parser = parse_duration, help = "Timeout for response, e.g. 3s [default: 3s]")]
    pub timeout: Option<Duration>,

    #[arg(short = 'u', long, help = "Show only unreachable addresses")]
    pub show_unreachable: bool,

    #[arg(short = 'r', long, help = "Show only reachable addresses")]
    pub show_reachable: bool,

    #[arg(short = 'o', long, value_enum, help = "Output format [default: text]")]
    pub output_format: Option<OutputFormat>,

    #[arg(short = 'f', long, help = "Output file path")]
    pub output_file: Option<PathBuf>,

    #[arg(short, long, help = "Config file (default: <config dir>/pingsweep/config.json)")]
    pub config: Option<PathBuf>,

    #[arg(short, long, help = "Enable debug logging")]
    pub verbose: bool,
}

impl Cli {
    /// Fold command line overrides into a loaded config.
    pub fn apply(&self, config: &mut Config) {
        if let Some(delay) = self.delay {
            config.probe.delay_ms = duration_to_millis(delay);
        }
        if let Some(timeout) = self.timeout {
            config.probe.timeout_ms = duration_to_millis(timeout);
        }
        if let Some(format) = self.output_format {
            config.output.format = format.to_string();
        }
        if self.show_reachable || self.show_unreachable {
            config.output.show_reachable = self.show_reachable;
            config.output.show_unreachable = self.show_unreachable;
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum OutputFormat {
    #[value(name = "text", help = "One line per address, tab separated status")]
    Text,
    #[value(name = "json", help = "JSON output")]
    Json,
    #[value(name = "csv", help = "CSV output")]
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_flags() {
        let cli = Cli::try_parse_from(["pingsweep", "-d", "250ms", "-t", "1s", "-u", "hosts.txt"]).unwrap();
        assert_eq!(cli.delay, Some(Duration::from_millis(250)));
        assert_eq!(cli.timeout, Some(Duration::from_secs(1)));
        assert!(cli.show_unreachable);
        assert!(!cli.show_reachable);
        assert_eq!(cli.input, Some(PathBuf::from("hosts.txt")));
    }

    #[test]
    fn test_too_many_inputs_is_usage_error() {
        assert!(Cli::try_parse_from(["pingsweep", "a.txt", "b.txt"]).is_err());
    }

    #[test]
    fn test_bad_duration_rejected() {
        assert!(Cli::try_parse_from(["pingsweep", "-d", "soon"]).is_err());
    }

    #[test]
    fn test_overrides_applied_to_config() {
        let cli = Cli::try_parse_from(["pingsweep", "-t", "500ms", "-r", "-o", "csv"]).unwrap();
        let mut config = Config::default();
        config.output.show_unreachable = true;
        cli.apply(&mut config);

        assert_eq!(config.probe.timeout_ms, 500);
        assert_eq!(config.probe.delay_ms, 100);
        assert_eq!(config.output.format, "csv");
        assert!(config.output.show_reachable);
        assert!(!config.output.show_unreachable);
    }

    #[test]
    fn test_no_flags_keep_config_values() {
        let cli = Cli::try_parse_from(["pingsweep"]).unwrap();
        let mut config = Config::default();
        config.probe.delay_ms = 20;
        config.output.show_unreachable = true;
        cli.apply(&mut config);

        assert_eq!(config.probe.delay_ms, 20);
        assert!(config.output.show_unreachable);
        assert_eq!(cli.input, None);
    }
}
