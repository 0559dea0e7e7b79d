// Aggregation and ranking queries over an immutable `Dataset`.
//
// Every view (cards, ranking table, bars, pie, heatmap) is a projection of
// one of these functions, so ranking, tie-breaking and percentage rules live
// here and nowhere else. Ties always keep the original column/row order,
// which is what a stable sort on a descending key gives us.
use crate::error::{EngineError, EngineResult};
use crate::types::{CategoryTotals, Dataset, OfficeRecord, RegionFilter, SortKey};
use std::collections::HashMap;

fn ensure_non_empty(data: &Dataset) -> EngineResult<()> {
    if data.is_empty() {
        return Err(EngineError::EmptyDataset);
    }
    Ok(())
}

fn ensure_positive(n: usize, what: &str) -> EngineResult<()> {
    if n == 0 {
        return Err(EngineError::InvalidArgument(format!(
            "{} must be at least 1",
            what
        )));
    }
    Ok(())
}

pub fn total_across_offices(data: &Dataset) -> EngineResult<u64> {
    ensure_non_empty(data)?;
    Ok(data.records().iter().map(|r| r.total).sum())
}

pub fn average_per_office(data: &Dataset) -> EngineResult<f64> {
    let total = total_across_offices(data)?;
    Ok(total as f64 / data.office_count() as f64)
}

pub fn category_totals(data: &Dataset) -> CategoryTotals {
    let mut sums = vec![0u64; data.categories().len()];
    for r in data.records() {
        for (acc, v) in sums.iter_mut().zip(&r.service_counts) {
            *acc += *v;
        }
    }
    CategoryTotals(data.categories().iter().cloned().zip(sums).collect())
}

/// Categories ranked by global total, descending. `n` larger than the
/// category count returns every category.
pub fn top_categories(data: &Dataset, n: usize) -> EngineResult<Vec<(String, u64)>> {
    ensure_positive(n, "number of categories")?;
    let CategoryTotals(mut ranked) = category_totals(data);
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(n);
    Ok(ranked)
}

/// Share of all category totals taken by `category`, in percent.
///
/// A dataset whose counts are all zero yields `0.0` for every category.
pub fn category_percentage(data: &Dataset, category: &str) -> EngineResult<f64> {
    ensure_non_empty(data)?;
    let totals = category_totals(data);
    let value = totals
        .get(category)
        .ok_or_else(|| EngineError::UnknownCategory(category.to_string()))?;
    Ok(percentage(value, totals.grand_total()))
}

pub(crate) fn percentage(value: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    value as f64 / whole as f64 * 100.0
}

pub fn top_offices(data: &Dataset, n: usize) -> EngineResult<Vec<OfficeRecord>> {
    top_offices_by(data, &SortKey::Total, n)
}

/// Offices ranked by `key`, descending, original row order on ties.
pub fn top_offices_by(data: &Dataset, key: &SortKey, n: usize) -> EngineResult<Vec<OfficeRecord>> {
    ensure_positive(n, "number of offices")?;
    let mut ranked: Vec<(u64, &OfficeRecord)> = match key {
        SortKey::Total => data.records().iter().map(|r| (r.total, r)).collect(),
        SortKey::Category(c) => {
            let idx = data
                .category_index(c)
                .ok_or_else(|| EngineError::UnknownCategory(c.clone()))?;
            data.records()
                .iter()
                .map(|r| (r.service_counts[idx], r))
                .collect()
        }
    };
    ranked.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(ranked.into_iter().take(n).map(|(_, r)| r.clone()).collect())
}

/// Value of `key` for one record.
pub fn sort_value(data: &Dataset, record: &OfficeRecord, key: &SortKey) -> EngineResult<u64> {
    match key {
        SortKey::Total => Ok(record.total),
        SortKey::Category(c) => data
            .category_index(c)
            .map(|idx| record.service_counts[idx])
            .ok_or_else(|| EngineError::UnknownCategory(c.clone())),
    }
}

/// Cross-tabulation of `offices` (rows) by `categories` (columns), both in
/// the order given.
pub fn regional_matrix<O, C>(data: &Dataset, offices: &[O], categories: &[C]) -> EngineResult<Vec<Vec<u64>>>
where
    O: AsRef<str>,
    C: AsRef<str>,
{
    let columns: Vec<usize> = categories
        .iter()
        .map(|c| {
            data.category_index(c.as_ref())
                .ok_or_else(|| EngineError::UnknownCategory(c.as_ref().to_string()))
        })
        .collect::<EngineResult<_>>()?;

    let by_name: HashMap<&str, &OfficeRecord> = data
        .records()
        .iter()
        .map(|r| (r.office_name.as_str(), r))
        .collect();

    offices
        .iter()
        .map(|o| {
            let rec = by_name
                .get(o.as_ref())
                .ok_or_else(|| EngineError::UnknownOffice(o.as_ref().to_string()))?;
            Ok(columns.iter().map(|&j| rec.service_counts[j]).collect())
        })
        .collect()
}

/// Restrict the dataset to the selected region. `All` is a plain copy.
pub fn filter_region(data: &Dataset, region: &RegionFilter) -> EngineResult<Dataset> {
    match region {
        RegionFilter::All => Ok(data.clone()),
        RegionFilter::Office(name) => {
            let rec = data
                .office(name)
                .ok_or_else(|| EngineError::UnknownOffice(name.clone()))?;
            Ok(data.with_records(vec![rec.clone()]))
        }
    }
}
