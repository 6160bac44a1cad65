use std::fs::File;
use std::io::{self, Write, BufWriter};
use std::path::PathBuf;
use anyhow::Result;

use crate::cli::OutputFormat;
use crate::scanner::{ProbeStatus, SweepResult, TargetResult};

/// Which classifications end up in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShowFilter {
    reachable: bool,
    unreachable: bool,
}

impl ShowFilter {
    /// Asking for neither class means showing both.
    pub fn new(show_reachable: bool, show_unreachable: bool) -> Self {
        if !show_reachable && !show_unreachable {
            return Self { reachable: true, unreachable: true };
        }
        Self {
            reachable: show_reachable,
            unreachable: show_unreachable,
        }
    }

    pub fn shows(&self, status: ProbeStatus) -> bool {
        match status {
            ProbeStatus::Reachable => self.reachable,
            ProbeStatus::Unreachable => self.unreachable,
        }
    }

    /// Both classes are printed, so each line needs a status label.
    pub fn labelled(&self) -> bool {
        self.reachable && self.unreachable
    }
}

pub struct OutputWriter {
    format: OutputFormat,
    filter: ShowFilter,
    file: Option<PathBuf>,
}

impl OutputWriter {
    pub fn new(format: OutputFormat, filter: ShowFilter, file: Option<PathBuf>) -> Self {
        Self { format, filter, file }
    }

    pub fn write(&self, result: &SweepResult) -> Result<()> {
        let output = self.render(result)?;

        match &self.file {
            Some(path) => {
                let file = File::create(path)?;
                let mut writer = BufWriter::new(file);
                writer.write_all(output.as_bytes())?;
                writer.flush()?;
            }
            None => {
                let mut stdout = io::stdout().lock();
                stdout.write_all(output.as_bytes())?;
                stdout.flush()?;
            }
        }

        Ok(())
    }

    pub fn render(&self, result: &SweepResult) -> Result<String> {
        match self.format {
            OutputFormat::Text => Ok(self.format_text(result)),
            OutputFormat::Json => self.format_json(result),
            OutputFormat::Csv => Ok(self.format_csv(result)),
        }
    }

    fn shown<'a>(&'a self, result: &'a SweepResult) -> impl Iterator<Item = &'a TargetResult> {
        result.targets.iter().filter(|t| self.filter.shows(t.status))
    }

    fn format_text(&self, result: &SweepResult) -> String {
        let mut output = String::new();
        for entry in self.shown(result) {
            if self.filter.labelled() {
                output.push_str(&format!("{}\t{}\n", entry.target, entry.status));
            } else {
                output.push_str(&format!("{}\n", entry.target));
            }
        }
        output
    }

    fn format_json(&self, result: &SweepResult) -> Result<String> {
        let filtered = SweepResult {
            targets: self.shown(result).cloned().collect(),
            ..result.clone()
        };
        let mut json = serde_json::to_string_pretty(&filtered)?;
        json.push('\n');
        Ok(json)
    }

    fn format_csv(&self, result: &SweepResult) -> String {
        let mut csv = String::new();
        csv.push_str("address,family,status\n");

        for entry in self.shown(result) {
            csv.push_str(&format!("{},{},{}\n", entry.target, entry.family, entry.status));
        }

        csv
    }
}
