// Parsing and formatting helpers.
//
// Cell parsing lives here so the loader can reject anything that is not a
// clean non-negative count, and number formatting lives here so every view
// prints counts and percentages the same way.
use chrono::NaiveDate;
use num_format::{Locale, ToFormattedString};

/// Parse a count cell.
///
/// - Trims whitespace and surrounding quotes left by spreadsheet exports.
/// - Strips thousands separators like `","`.
/// - Returns `None` for empty cells, signs, decimals or any other text;
///   the loader treats that as a malformed row rather than a zero.
pub fn parse_count(s: &str) -> Option<u64> {
    let s = s.trim().trim_matches('"').trim();
    if s.is_empty() {
        return None;
    }
    let s = s.replace(',', "");
    if !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    s.parse::<u64>().ok()
}

/// Reference date as typed by a user: `YYYY-MM-DD` or `YYYY.MM.DD`.
pub fn parse_reference_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y.%m.%d"))
        .ok()
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals with locale-aware thousands separators (`1,234,567.89`).
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: u64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

/// Signed percentage with two decimals, e.g. `+5.26%`.
pub fn format_change(pct: f64) -> String {
    if pct >= 0.0 {
        format!("+{:.2}%", pct)
    } else {
        format!("{:.2}%", pct)
    }
}

/// Horizontal bar proportional to `value / max`, at most `width` cells.
pub fn bar(value: u64, max: u64, width: usize) -> String {
    if max == 0 || width == 0 {
        return String::new();
    }
    let cells = ((value as f64 / max as f64) * width as f64).round() as usize;
    "█".repeat(cells.min(width))
}

const SHADES: [char; 5] = [' ', '░', '▒', '▓', '█'];

/// Intensity glyph for a heatmap cell relative to the matrix maximum.
pub fn shade(value: u64, max: u64) -> char {
    if max == 0 || value == 0 {
        return SHADES[0];
    }
    let steps = SHADES.len() - 1;
    let idx = ((value as f64 / max as f64) * steps as f64).ceil() as usize;
    SHADES[idx.clamp(1, steps)]
}
