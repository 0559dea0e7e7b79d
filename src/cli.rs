//! Command-line interface argument parsing.

use crate::config::{TOP_N_MAX, TOP_N_MIN};
use crate::util::parse_reference_date;
use clap::Parser;
use std::path::PathBuf;

/// Advisory-service consultation dashboard
///
/// Loads office-level consultation counts and prints summary cards,
/// service rankings, a distribution chart, grouped office bars and a
/// heatmap.
///
/// Examples:
///   consult_dashboard
///   consult_dashboard --data offices.csv --top 10 --sort-by total
///   consult_dashboard --region 서울남부 --view overview
///   consult_dashboard --format json --export-dir out/
///   consult_dashboard --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Dataset file(s), tried in order
    ///
    /// Overrides the candidate list from the configuration file.
    #[arg(short, long, value_name = "FILE", env = "DASHBOARD_DATA", value_delimiter = ',')]
    pub data: Vec<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .dashboard.toml in the current directory
    #[arg(short, long, value_name = "FILE", env = "DASHBOARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Restrict every view to one office (`all` for every office)
    #[arg(short, long, value_name = "OFFICE")]
    pub region: Option<String>,

    /// Reference date shown in the header (YYYY-MM-DD or YYYY.MM.DD)
    #[arg(long, value_name = "DATE")]
    pub date: Option<String>,

    /// Number of offices in the regional chart (5-25)
    #[arg(short, long, value_name = "COUNT", value_parser = parse_top_n)]
    pub top: Option<usize>,

    /// Ranking key for the regional chart: `total` or a service name
    #[arg(short, long, value_name = "KEY")]
    pub sort_by: Option<String>,

    /// Dashboard section to print
    #[arg(long, default_value = "all", value_name = "VIEW")]
    pub view: View,

    /// Output format (text, json)
    #[arg(long, default_value = "text", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Write CSV tables and summary.json into this directory
    #[arg(short, long, value_name = "DIR")]
    pub export_dir: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .dashboard.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Dashboard sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum View {
    /// Metric cards, service ranking and distribution
    Overview,
    /// Grouped bars of the top offices
    Regional,
    /// Office by service heatmap
    Heatmap,
    /// Everything (default)
    #[default]
    All,
}

impl View {
    pub fn includes(self, other: View) -> bool {
        self == View::All || self == other
    }
}

/// Output format for the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Text tables and bars (default)
    #[default]
    Text,
    /// JSON snapshot of every view
    Json,
}

fn parse_top_n(s: &str) -> Result<usize, String> {
    let n: usize = s
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number", s))?;
    if !(TOP_N_MIN..=TOP_N_MAX).contains(&n) {
        return Err(format!(
            "must be between {} and {}",
            TOP_N_MIN, TOP_N_MAX
        ));
    }
    Ok(n)
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref date) = self.date {
            if parse_reference_date(date).is_none() {
                return Err(format!(
                    "Invalid --date '{}': expected YYYY-MM-DD or YYYY.MM.DD",
                    date
                ));
            }
        }

        if let Some(ref dir) = self.export_dir {
            if dir.exists() && !dir.is_dir() {
                return Err(format!(
                    "Export path is not a directory: {}",
                    dir.display()
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        let mut full = vec!["consult_dashboard"];
        full.extend_from_slice(args);
        Args::try_parse_from(full)
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]).unwrap();
        assert_eq!(args.view, View::All);
        assert_eq!(args.format, OutputFormat::Text);
        assert!(args.top.is_none());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_top_n_bounds() {
        assert_eq!(parse(&["--top", "5"]).unwrap().top, Some(5));
        assert_eq!(parse(&["--top", "25"]).unwrap().top, Some(25));
        assert!(parse(&["--top", "4"]).is_err());
        assert!(parse(&["--top", "26"]).is_err());
        assert!(parse(&["--top", "ten"]).is_err());
    }

    #[test]
    fn test_multiple_data_files() {
        let args = parse(&["--data", "a.csv,b.csv"]).unwrap();
        assert_eq!(args.data, vec![PathBuf::from("a.csv"), PathBuf::from("b.csv")]);
    }

    #[test]
    fn test_validation_bad_date() {
        let args = parse(&["--date", "31/12/2023"]).unwrap();
        assert!(args.validate().is_err());
        let args = parse(&["--date", "2023.12.31"]).unwrap();
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let args = parse(&["--verbose", "--quiet"]).unwrap();
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_view_includes() {
        assert!(View::All.includes(View::Heatmap));
        assert!(View::Overview.includes(View::Overview));
        assert!(!View::Overview.includes(View::Regional));
    }

    #[test]
    fn test_log_level() {
        let mut args = parse(&[]).unwrap();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
