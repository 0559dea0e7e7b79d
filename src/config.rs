//! Configuration file handling.
//!
//! Settings come from `.dashboard.toml` (or `--config`); command-line
//! arguments override them.

use crate::cli::Args;
use crate::loader::LoadOptions;
use crate::trend::{SyntheticTrend, DEFAULT_PLAN_FACTOR, DEFAULT_PRIOR_FACTOR};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = ".dashboard.toml";

/// Bounds of the top-N control.
pub const TOP_N_MIN: usize = 5;
pub const TOP_N_MAX: usize = 25;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub display: DisplayConfig,

    #[serde(default)]
    pub trend: TrendConfig,
}

/// Where the dataset lives and how its header is laid out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Files tried in order.
    #[serde(default = "default_candidates")]
    pub candidates: Vec<PathBuf>,

    /// Header of the office-name column.
    #[serde(default = "default_name_column")]
    pub name_column: String,

    /// Header of the grand-total column.
    #[serde(default = "default_total_column")]
    pub total_column: String,

    /// Single-character field delimiter.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            candidates: default_candidates(),
            name_column: default_name_column(),
            total_column: default_total_column(),
            delimiter: default_delimiter(),
        }
    }
}

fn default_candidates() -> Vec<PathBuf> {
    vec![
        PathBuf::from("국민연금공단_노후준비상담 재무 연계서비스 현황_20231231_fixed.csv"),
        PathBuf::from("국민연금공단_노후준비상담 재무 연계서비스 현황_20231231.csv"),
    ]
}

fn default_name_column() -> String {
    "지사명".to_string()
}

fn default_total_column() -> String {
    "합계".to_string()
}

fn default_delimiter() -> String {
    ",".to_string()
}

/// View sizes and control defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Offices in the regional bar chart.
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Reference date shown in the header (`YYYY-MM-DD`).
    #[serde(default = "default_reference_date")]
    pub reference_date: String,

    /// Default region filter; `all` for every office.
    #[serde(default = "default_region")]
    pub region: String,

    /// Default ranking key; `total` or a service name.
    #[serde(default = "default_sort_by")]
    pub sort_by: String,

    #[serde(default = "default_ranking_rows")]
    pub ranking_rows: usize,

    #[serde(default = "default_card_services")]
    pub card_services: usize,

    #[serde(default = "default_pie_slices")]
    pub pie_slices: usize,

    #[serde(default = "default_bar_categories")]
    pub bar_categories: usize,

    #[serde(default = "default_heatmap_offices")]
    pub heatmap_offices: usize,

    #[serde(default = "default_heatmap_categories")]
    pub heatmap_categories: usize,

    /// Width of text bars in terminal cells.
    #[serde(default = "default_bar_width")]
    pub bar_width: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            reference_date: default_reference_date(),
            region: default_region(),
            sort_by: default_sort_by(),
            ranking_rows: default_ranking_rows(),
            card_services: default_card_services(),
            pie_slices: default_pie_slices(),
            bar_categories: default_bar_categories(),
            heatmap_offices: default_heatmap_offices(),
            heatmap_categories: default_heatmap_categories(),
            bar_width: default_bar_width(),
        }
    }
}

fn default_top_n() -> usize {
    15
}

fn default_reference_date() -> String {
    "2023-12-31".to_string()
}

fn default_region() -> String {
    "all".to_string()
}

fn default_sort_by() -> String {
    "total".to_string()
}

fn default_ranking_rows() -> usize {
    10
}

fn default_card_services() -> usize {
    5
}

fn default_pie_slices() -> usize {
    8
}

fn default_bar_categories() -> usize {
    5
}

fn default_heatmap_offices() -> usize {
    20
}

fn default_heatmap_categories() -> usize {
    8
}

fn default_bar_width() -> usize {
    40
}

/// Multipliers for the synthetic prior/plan comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendConfig {
    #[serde(default = "default_prior_factor")]
    pub prior_factor: f64,

    #[serde(default = "default_plan_factor")]
    pub plan_factor: f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            prior_factor: default_prior_factor(),
            plan_factor: default_plan_factor(),
        }
    }
}

fn default_prior_factor() -> f64 {
    DEFAULT_PRIOR_FACTOR
}

fn default_plan_factor() -> f64 {
    DEFAULT_PLAN_FACTOR
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load `--config` if given, else `.dashboard.toml` if present, else defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            Self::load(default_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Merge command-line arguments; only values the user gave override.
    pub fn merge_with_args(&mut self, args: &Args) {
        if !args.data.is_empty() {
            self.data.candidates = args.data.clone();
        }
        if let Some(top) = args.top {
            self.display.top_n = top;
        }
        if let Some(ref date) = args.date {
            self.display.reference_date = date.clone();
        }
        if let Some(ref region) = args.region {
            self.display.region = region.clone();
        }
        if let Some(ref sort_by) = args.sort_by {
            self.display.sort_by = sort_by.clone();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.data.candidates.is_empty() {
            bail!("[data] candidates must list at least one file");
        }
        self.delimiter()?;
        if !(TOP_N_MIN..=TOP_N_MAX).contains(&self.display.top_n) {
            bail!(
                "top_n must be between {} and {}, got {}",
                TOP_N_MIN,
                TOP_N_MAX,
                self.display.top_n
            );
        }
        let d = &self.display;
        for (name, v) in [
            ("ranking_rows", d.ranking_rows),
            ("card_services", d.card_services),
            ("pie_slices", d.pie_slices),
            ("bar_categories", d.bar_categories),
            ("heatmap_offices", d.heatmap_offices),
            ("heatmap_categories", d.heatmap_categories),
        ] {
            if v == 0 {
                bail!("[display] {} must be at least 1", name);
            }
        }
        for (name, f) in [
            ("prior_factor", self.trend.prior_factor),
            ("plan_factor", self.trend.plan_factor),
        ] {
            if !f.is_finite() || f <= 0.0 {
                bail!("[trend] {} must be a positive number", name);
            }
        }
        Ok(())
    }

    pub fn delimiter(&self) -> Result<u8> {
        match self.data.delimiter.as_bytes() {
            [b] => Ok(*b),
            _ if self.data.delimiter == "\\t" => Ok(b'\t'),
            _ => bail!(
                "delimiter must be a single ASCII character, got '{}'",
                self.data.delimiter
            ),
        }
    }

    pub fn load_options(&self) -> Result<LoadOptions> {
        Ok(LoadOptions {
            candidates: self.data.candidates.clone(),
            name_column: self.data.name_column.clone(),
            total_column: self.data.total_column.clone(),
            delimiter: self.delimiter()?,
        })
    }

    pub fn trend_source(&self) -> SyntheticTrend {
        SyntheticTrend::new(self.trend.prior_factor, self.trend.plan_factor)
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
