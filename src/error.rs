// Error types shared by the loader and the aggregation engine.
//
// Engine errors are precondition violations of pure queries; the caller
// decides whether they are fatal (empty dataset) or recoverable (a stale
// control parameter naming an office or category that no longer exists).
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("dataset has no offices; cannot compute totals, averages or percentages")]
    EmptyDataset,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unknown service category: {0}")]
    UnknownCategory(String),

    #[error("unknown office: {0}")]
    UnknownOffice(String),
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("no readable dataset found ({})", list_skipped(.tried))]
    NoSource { tried: Vec<SkippedSource> },

    #[error("required column '{0}' is missing from the header")]
    MissingColumn(String),

    #[error("header declares no service categories")]
    NoCategories,

    #[error("column '{0}' appears more than once in the header")]
    DuplicateColumn(String),

    #[error("row {row}: office '{office}' appears more than once")]
    DuplicateOffice { row: usize, office: String },

    #[error("row {row}: expected {expected} columns, found {found}")]
    ColumnCount {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("row {row}, column '{column}': '{value}' is not a non-negative integer count")]
    InvalidCount {
        row: usize,
        column: String,
        value: String,
    },

    #[error("row {row}, column '{column}': counts add up beyond the supported range")]
    CountOverflow { row: usize, column: String },

    #[error("row {row}: office name is empty")]
    EmptyOfficeName { row: usize },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Why a candidate file was passed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NotFound,
    Unreadable(String),
    Undecodable,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotFound => write!(f, "not found"),
            SkipReason::Unreadable(e) => write!(f, "cannot be read: {}", e),
            SkipReason::Undecodable => write!(f, "exists but is neither UTF-8 nor EUC-KR"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSource {
    pub path: PathBuf,
    pub reason: SkipReason,
}

fn list_skipped(skipped: &[SkippedSource]) -> String {
    if skipped.is_empty() {
        return "no candidate files configured".to_string();
    }
    skipped
        .iter()
        .map(|s| format!("{}: {}", s.path.display(), s.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

pub type EngineResult<T> = Result<T, EngineError>;
