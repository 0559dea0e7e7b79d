use crate::error::LoadError;
use serde::Serialize;
use std::collections::HashSet;
use tabled::Tabled;

/// One regional office: its per-service counts (in schema order) and the
/// grand total reported by the source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfficeRecord {
    pub office_name: String,
    pub service_counts: Vec<u64>,
    pub total: u64,
}

impl OfficeRecord {
    pub fn new(office_name: impl Into<String>, service_counts: Vec<u64>, total: u64) -> Self {
        Self {
            office_name: office_name.into(),
            service_counts,
            total,
        }
    }

    /// Sum of the per-service counts. Equal to `total` for well-formed rows.
    pub fn row_sum(&self) -> u64 {
        self.service_counts.iter().sum()
    }

    pub fn is_consistent(&self) -> bool {
        self.row_sum() == self.total
    }
}

/// Immutable table of offices sharing one declared category schema.
///
/// The category key set is fixed when the dataset is built and every
/// record is checked against it, so queries never re-derive the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    categories: Vec<String>,
    records: Vec<OfficeRecord>,
}

impl Dataset {
    pub fn new(categories: Vec<String>, records: Vec<OfficeRecord>) -> Result<Self, LoadError> {
        if categories.is_empty() {
            return Err(LoadError::NoCategories);
        }
        let mut seen = HashSet::new();
        for c in &categories {
            if !seen.insert(c.as_str()) {
                return Err(LoadError::DuplicateColumn(c.clone()));
            }
        }

        let mut offices = HashSet::new();
        for (i, r) in records.iter().enumerate() {
            let row = i + 1;
            if r.service_counts.len() != categories.len() {
                // +2 accounts for the name and total columns.
                return Err(LoadError::ColumnCount {
                    row,
                    expected: categories.len() + 2,
                    found: r.service_counts.len() + 2,
                });
            }
            if r.office_name.trim().is_empty() {
                return Err(LoadError::EmptyOfficeName { row });
            }
            if !offices.insert(r.office_name.as_str()) {
                return Err(LoadError::DuplicateOffice {
                    row,
                    office: r.office_name.clone(),
                });
            }
        }

        Ok(Self { categories, records })
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn records(&self) -> &[OfficeRecord] {
        &self.records
    }

    pub fn office_count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn category_index(&self, category: &str) -> Option<usize> {
        self.categories.iter().position(|c| c == category)
    }

    pub fn office(&self, name: &str) -> Option<&OfficeRecord> {
        self.records.iter().find(|r| r.office_name == name)
    }

    /// Records whose total column disagrees with the sum of their counts.
    pub fn inconsistent_rows(&self) -> usize {
        self.records.iter().filter(|r| !r.is_consistent()).count()
    }

    /// A dataset with the same schema holding only `records`.
    pub(crate) fn with_records(&self, records: Vec<OfficeRecord>) -> Self {
        Self {
            categories: self.categories.clone(),
            records,
        }
    }
}

/// Per-category sums in schema order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTotals(pub Vec<(String, u64)>);

impl CategoryTotals {
    pub fn get(&self, category: &str) -> Option<u64> {
        self.0.iter().find(|(c, _)| c == category).map(|(_, v)| *v)
    }

    pub fn grand_total(&self) -> u64 {
        self.0.iter().map(|(_, v)| *v).sum()
    }
}

/// Column used to rank offices.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Total,
    Category(String),
}

impl SortKey {
    /// `total`, an empty string, or the dataset's total header select the
    /// total column; anything else names a category.
    pub fn parse(s: &str, total_column: &str) -> Self {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("total") || s == total_column {
            SortKey::Total
        } else {
            SortKey::Category(s.to_string())
        }
    }

    pub fn label<'a>(&'a self, total_column: &'a str) -> &'a str {
        match self {
            SortKey::Total => total_column,
            SortKey::Category(c) => c,
        }
    }
}

/// Region filter from the control surface.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RegionFilter {
    #[default]
    All,
    Office(String),
}

impl RegionFilter {
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") || s == "(전체)" {
            RegionFilter::All
        } else {
            RegionFilter::Office(s.to_string())
        }
    }

    pub fn label(&self) -> &str {
        match self {
            RegionFilter::All => "all",
            RegionFilter::Office(name) => name,
        }
    }
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ServiceRankingRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[serde(rename = "Service")]
    #[tabled(rename = "Service")]
    pub service: String,
    #[serde(rename = "Count")]
    #[tabled(rename = "Count")]
    pub count: u64,
    #[serde(rename = "Share")]
    #[tabled(rename = "Share")]
    pub share: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct OfficeRankingRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[serde(rename = "Office")]
    #[tabled(rename = "Office")]
    pub office: String,
    #[serde(rename = "SortValue")]
    #[tabled(rename = "SortValue")]
    pub sort_value: u64,
    #[serde(rename = "Total")]
    #[tabled(rename = "Total")]
    pub total: u64,
}

#[derive(Debug, Serialize)]
pub struct SummaryStats {
    pub reference_date: String,
    pub source: String,
    pub encoding: String,
    pub region: String,
    pub total_offices: usize,
    pub total_categories: usize,
    pub total_consultations: u64,
    pub avg_per_office: f64,
    pub top_service: Option<String>,
    pub top_service_count: u64,
    pub inconsistent_rows: usize,
    pub trends_are_synthetic: bool,
}
