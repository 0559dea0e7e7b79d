use crate::views::{Dashboard, Matrix};
use serde::Serialize;
use std::error::Error;
use std::path::{Path, PathBuf};
use tracing::info;

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), Box<dyn Error>> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), Box<dyn Error>> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// Cross-tab as CSV: first column is the office, one column per service.
pub fn write_matrix_csv(path: &Path, corner: &str, m: &Matrix) -> Result<(), Box<dyn Error>> {
    let mut wtr = csv::Writer::from_path(path)?;
    let mut header = vec![corner.to_string()];
    header.extend(m.columns.iter().cloned());
    wtr.write_record(&header)?;
    for (office, row) in m.rows.iter().zip(&m.values) {
        let mut record = vec![office.clone()];
        record.extend(row.iter().map(|v| v.to_string()));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write every table of the dashboard plus a summary into `dir`.
/// Returns the files written.
pub fn export_all<S: Serialize>(
    dir: &Path,
    dashboard: &Dashboard,
    summary: &S,
    name_column: &str,
) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    std::fs::create_dir_all(dir)?;

    let ranking = dir.join("service_ranking.csv");
    write_csv(&ranking, &dashboard.ranking)?;

    let offices = dir.join("top_offices.csv");
    write_csv(&offices, &dashboard.office_ranking)?;

    let heatmap = dir.join("heatmap.csv");
    write_matrix_csv(&heatmap, name_column, &dashboard.heatmap)?;

    let summary_path = dir.join("summary.json");
    write_json(&summary_path, summary)?;

    let written = vec![ranking, offices, heatmap, summary_path];
    for p in &written {
        info!("Wrote {}", p.display());
    }
    Ok(written)
}
