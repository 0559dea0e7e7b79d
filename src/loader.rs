use crate::error::{LoadError, SkipReason, SkippedSource};
use crate::types::{Dataset, OfficeRecord};
use crate::util::parse_count;
use csv::{ReaderBuilder, Trim};
use encoding_rs::EUC_KR;
use std::borrow::Cow;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, info, warn};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Files tried in order; the first one that exists and decodes wins.
    pub candidates: Vec<PathBuf>,
    pub name_column: String,
    pub total_column: String,
    pub delimiter: u8,
}

#[derive(Debug, Clone)]
pub struct LoadReport {
    pub source: PathBuf,
    pub encoding: &'static str,
    pub rows: usize,
    pub categories: usize,
    pub inconsistent_rows: usize,
}

/// Resolve the first usable candidate file and build a validated dataset.
///
/// Missing or undecodable files fall through to the next candidate. A file
/// that decodes but fails structural validation rejects the whole load.
pub fn load_dataset(opts: &LoadOptions) -> Result<(Dataset, LoadReport), LoadError> {
    let mut skipped = Vec::new();
    let mut skip = |path: &PathBuf, reason: SkipReason| {
        skipped.push(SkippedSource {
            path: path.clone(),
            reason,
        })
    };

    for path in &opts.candidates {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Candidate not found: {}", path.display());
                skip(path, SkipReason::NotFound);
                continue;
            }
            Err(e) => {
                warn!("Cannot read {}: {}", path.display(), e);
                skip(path, SkipReason::Unreadable(e.to_string()));
                continue;
            }
        };

        let Some((text, encoding)) = decode(&bytes) else {
            warn!(
                "{} is neither UTF-8 nor {}; trying next candidate",
                path.display(),
                EUC_KR.name()
            );
            skip(path, SkipReason::Undecodable);
            continue;
        };
        debug!("Decoded {} as {}", path.display(), encoding);

        let dataset = parse_dataset(&text, opts)?;
        let report = LoadReport {
            source: path.clone(),
            encoding,
            rows: dataset.office_count(),
            categories: dataset.categories().len(),
            inconsistent_rows: dataset.inconsistent_rows(),
        };
        info!(
            "Loaded {} offices x {} services from {} ({})",
            report.rows,
            report.categories,
            path.display(),
            encoding
        );
        return Ok((dataset, report));
    }

    Err(LoadError::NoSource { tried: skipped })
}

/// UTF-8 first (BOM stripped), then EUC-KR. The WHATWG EUC-KR decoder
/// covers the CP949 extensions used by Korean spreadsheet exports.
pub fn decode(bytes: &[u8]) -> Option<(Cow<'_, str>, &'static str)> {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    if let Ok(s) = std::str::from_utf8(body) {
        return Some((Cow::Borrowed(s), "UTF-8"));
    }
    EUC_KR
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|s| (s, EUC_KR.name()))
}

/// Parse delimited text into a dataset, declaring the category schema from
/// the header: every column except the office-name and total columns.
pub fn parse_dataset(text: &str, opts: &LoadOptions) -> Result<Dataset, LoadError> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(opts.delimiter)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let headers = rdr.headers()?.clone();
    let mut seen = HashSet::new();
    for h in headers.iter() {
        if !seen.insert(h) {
            return Err(LoadError::DuplicateColumn(h.to_string()));
        }
    }
    let name_idx = column_index(&headers, &opts.name_column)?;
    let total_idx = column_index(&headers, &opts.total_column)?;

    let category_cols: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != name_idx && *i != total_idx)
        .map(|(i, h)| (i, h.to_string()))
        .collect();
    debug!(
        "Schema: name='{}' total='{}' services={}",
        opts.name_column,
        opts.total_column,
        category_cols.len()
    );

    // Running sums over every count cell and over the total column. Every
    // engine sum (row, column, grand total) is bounded by one of these, so a
    // dataset that passes here cannot overflow later.
    let mut cells_sum: u64 = 0;
    let mut totals_sum: u64 = 0;

    let mut records = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let row = i + 1;
        let rec = result?;
        if rec.len() != headers.len() {
            return Err(LoadError::ColumnCount {
                row,
                expected: headers.len(),
                found: rec.len(),
            });
        }

        let cell = |idx: usize, column: &str| -> Result<u64, LoadError> {
            let raw = rec.get(idx).unwrap_or("");
            parse_count(raw).ok_or_else(|| LoadError::InvalidCount {
                row,
                column: column.to_string(),
                value: raw.to_string(),
            })
        };

        let total = cell(total_idx, opts.total_column.as_str())?;
        let counts = category_cols
            .iter()
            .map(|(idx, name)| cell(*idx, name.as_str()))
            .collect::<Result<Vec<_>, _>>()?;

        let overflow = |column: &str| LoadError::CountOverflow {
            row,
            column: column.to_string(),
        };
        totals_sum = totals_sum
            .checked_add(total)
            .ok_or_else(|| overflow(opts.total_column.as_str()))?;
        for ((_, name), v) in category_cols.iter().zip(&counts) {
            cells_sum = cells_sum
                .checked_add(*v)
                .ok_or_else(|| overflow(name.as_str()))?;
        }

        let office = OfficeRecord::new(rec.get(name_idx).unwrap_or("").trim(), counts, total);
        if !office.is_consistent() {
            warn!(
                "Row {} ({}): total {} differs from sum of services {}",
                row,
                office.office_name,
                office.total,
                office.row_sum()
            );
        }
        records.push(office);
    }

    let categories = category_cols.into_iter().map(|(_, name)| name).collect();
    Dataset::new(categories, records)
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize, LoadError> {
    headers
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}') == name)
        .ok_or_else(|| LoadError::MissingColumn(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine;
    use std::fs;
    use tempfile::TempDir;

    const SAMPLE: &str = "지사명,합계,svc1,svc2\nA,15,10,5\nB,20,20,0\nC,30,0,30\n";

    fn opts(candidates: Vec<PathBuf>) -> LoadOptions {
        LoadOptions {
            candidates,
            name_column: "지사명".to_string(),
            total_column: "합계".to_string(),
            delimiter: b',',
        }
    }

    #[test]
    fn test_parse_declares_schema_from_header() {
        let ds = parse_dataset(SAMPLE, &opts(vec![])).unwrap();
        assert_eq!(ds.categories(), &["svc1".to_string(), "svc2".to_string()]);
        assert_eq!(ds.office_count(), 3);
        assert_eq!(engine::total_across_offices(&ds).unwrap(), 65);
    }

    #[test]
    fn test_total_column_may_sit_anywhere() {
        let text = "지사명,svc1,svc2,합계\nA,1,2,3\n";
        let ds = parse_dataset(text, &opts(vec![])).unwrap();
        assert_eq!(ds.records()[0].service_counts, vec![1, 2]);
        assert_eq!(ds.records()[0].total, 3);
    }

    #[test]
    fn test_thousands_separators_are_accepted() {
        let text = "지사명,합계,svc1\nA,\"1,200\",\"1,200\"\n";
        let ds = parse_dataset(text, &opts(vec![])).unwrap();
        assert_eq!(ds.records()[0].total, 1200);
    }

    #[test]
    fn test_missing_total_column() {
        let err = parse_dataset("지사명,svc1\nA,1\n", &opts(vec![])).unwrap_err();
        assert!(matches!(err, LoadError::MissingColumn(ref c) if c == "합계"));
    }

    #[test]
    fn test_header_without_services() {
        let err = parse_dataset("지사명,합계\nA,1\n", &opts(vec![])).unwrap_err();
        assert!(matches!(err, LoadError::NoCategories));
    }

    #[test]
    fn test_malformed_count_rejects_dataset() {
        let text = "지사명,합계,svc1\nA,1,1\nB,2,two\n";
        let err = parse_dataset(text, &opts(vec![])).unwrap_err();
        assert!(matches!(err, LoadError::InvalidCount { row: 2, .. }));
    }

    #[test]
    fn test_short_row_rejects_dataset() {
        let text = "지사명,합계,svc1,svc2\nA,1,1\n";
        let err = parse_dataset(text, &opts(vec![])).unwrap_err();
        assert!(matches!(
            err,
            LoadError::ColumnCount {
                row: 1,
                expected: 4,
                found: 3
            }
        ));
    }

    #[test]
    fn test_inconsistent_total_is_kept_and_reported() {
        let text = "지사명,합계,svc1\nA,9,1\n";
        let ds = parse_dataset(text, &opts(vec![])).unwrap();
        assert_eq!(ds.inconsistent_rows(), 1);
    }

    #[test]
    fn test_decode_utf8_with_bom() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(SAMPLE.as_bytes());
        let (text, enc) = decode(&bytes).unwrap();
        assert_eq!(enc, "UTF-8");
        assert!(text.starts_with("지사명"));
    }

    #[test]
    fn test_decode_legacy_korean() {
        let (encoded, _, had_errors) = EUC_KR.encode(SAMPLE);
        assert!(!had_errors);
        assert!(std::str::from_utf8(&encoded).is_err());
        let (text, enc) = decode(&encoded).unwrap();
        assert_eq!(enc, "EUC-KR");
        assert_eq!(text, SAMPLE);
    }

    #[test]
    fn test_load_falls_back_to_second_candidate() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("fixed.csv");
        let present = dir.path().join("plain.csv");
        let (encoded, _, _) = EUC_KR.encode(SAMPLE);
        fs::write(&present, &encoded).unwrap();

        let (ds, report) = load_dataset(&opts(vec![missing, present.clone()])).unwrap();
        assert_eq!(ds.office_count(), 3);
        assert_eq!(report.source, present);
        assert_eq!(report.encoding, "EUC-KR");
        assert_eq!(report.inconsistent_rows, 0);
    }

    #[test]
    fn test_load_prefers_first_candidate() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("fixed.csv");
        let second = dir.path().join("plain.csv");
        fs::write(&first, "지사명,합계,svc1\nOnly,4,4\n").unwrap();
        fs::write(&second, SAMPLE).unwrap();

        let (ds, report) = load_dataset(&opts(vec![first.clone(), second])).unwrap();
        assert_eq!(ds.office_count(), 1);
        assert_eq!(report.source, first);
    }

    #[test]
    fn test_load_fails_when_nothing_is_readable() {
        let dir = TempDir::new().unwrap();
        let err = load_dataset(&opts(vec![dir.path().join("nope.csv")])).unwrap_err();
        match err {
            LoadError::NoSource { tried } => {
                assert_eq!(tried.len(), 1);
                assert_eq!(tried[0].reason, SkipReason::NotFound);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_undecodable_file_is_named_in_error() {
        let dir = TempDir::new().unwrap();
        let garbled = dir.path().join("garbled.csv");
        // 0xFF is invalid in both UTF-8 and EUC-KR.
        fs::write(&garbled, [0xFFu8, 0xFF, 0xFF, b'\n']).unwrap();

        let err = load_dataset(&opts(vec![garbled.clone()])).unwrap_err();
        match err {
            LoadError::NoSource { ref tried } => {
                assert_eq!(tried[0].path, garbled);
                assert_eq!(tried[0].reason, SkipReason::Undecodable);
            }
            ref other => panic!("unexpected error: {}", other),
        }
        assert!(err.to_string().contains("neither UTF-8 nor EUC-KR"));
    }

    #[test]
    fn test_repeated_total_header_is_rejected() {
        let err = parse_dataset("지사명,합계,svc1,합계\nA,5,5,5\n", &opts(vec![])).unwrap_err();
        assert!(matches!(err, LoadError::DuplicateColumn(ref c) if c == "합계"));
    }

    #[test]
    fn test_repeated_name_header_is_rejected() {
        let err = parse_dataset("지사명,합계,svc1,지사명\nA,5,5,B\n", &opts(vec![])).unwrap_err();
        assert!(matches!(err, LoadError::DuplicateColumn(ref c) if c == "지사명"));
    }

    #[test]
    fn test_counts_beyond_u64_are_rejected() {
        let max = u64::MAX;
        let text = format!("지사명,합계,svc1\nA,{max},{max}\nB,{max},{max}\n");
        let err = parse_dataset(&text, &opts(vec![])).unwrap_err();
        assert!(matches!(err, LoadError::CountOverflow { row: 2, ref column } if column == "합계"));
    }

    #[test]
    fn test_row_sum_beyond_u64_is_rejected() {
        let max = u64::MAX;
        let text = format!("지사명,합계,svc1,svc2\nA,1,{max},1\n");
        let err = parse_dataset(&text, &opts(vec![])).unwrap_err();
        assert!(matches!(err, LoadError::CountOverflow { row: 1, ref column } if column == "svc2"));
    }

    #[test]
    fn test_largest_summable_counts_load() {
        let half = u64::MAX / 2;
        let text = format!("지사명,합계,svc1\nA,{half},{half}\nB,{half},{half}\n");
        let ds = parse_dataset(&text, &opts(vec![])).unwrap();
        assert_eq!(engine::total_across_offices(&ds).unwrap(), half * 2);
        assert_eq!(engine::category_totals(&ds).grand_total(), half * 2);
    }
}
