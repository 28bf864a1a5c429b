// Utility helpers for parsing, basic statistics and number formatting.
//
// This module centralizes the "dirty" CSV cell handling so the pipeline
// stages can assume typed `Option<f64>` values.
use num_format::{Locale, ToFormattedString};
use std::cmp::Ordering;

/// Cell spellings that mean "no observation" in WDI exports and in files
/// written by other tabular tools.
const NA_TOKENS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "null", "NULL", "None", "<NA>", "#N/A",
    "#NA", "#N/A N/A", "1.#IND", "-1.#IND", "1.#QNAN", "-1.#QNAN",
];

pub fn is_missing(s: &str) -> bool {
    NA_TOKENS.contains(&s.trim())
}

/// Parse a numeric cell.
///
/// - `Ok(None)` for missing markers.
/// - `Err(())` for anything else that is not a finite number (including
///   `inf` and literals that overflow to it), so the caller can attach the
///   row context to the error.
pub fn parse_cell(s: &str) -> Result<Option<f64>, ()> {
    if is_missing(s) {
        return Ok(None);
    }
    match s.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(()),
    }
}

/// Forgiving variant used when reading our own output back.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    parse_cell(s?).ok().flatten()
}

pub fn parse_i32_safe(s: Option<&str>) -> Option<i32> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<i32>().ok()
}

pub fn text_or_none(s: &str) -> Option<String> {
    if is_missing(s) {
        None
    } else {
        Some(s.trim().to_string())
    }
}

/// Arithmetic mean of the present values; `None` if there are none.
pub fn mean<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let (sum, n) = values
        .into_iter()
        .flatten()
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        None
    } else {
        Some(sum / n as f64)
    }
}

/// Population (ddof = 0) standard deviation.
pub fn std_dev_population(v: &[f64]) -> Option<f64> {
    let m = mean(v.iter().copied().map(Some))?;
    let var = v.iter().map(|x| (x - m).powi(2)).sum::<f64>() / v.len() as f64;
    Some(var.sqrt())
}

pub fn sort_floats(v: &mut [f64]) {
    v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
}

/// Quantile of already-sorted data, interpolating linearly between the two
/// nearest order statistics.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let h = (sorted.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    Some(sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo]))
}

/// CSV rendering of an optional float: empty when missing, and integral
/// values keep a `.0` so the column still reads back as floating point.
pub fn format_cell(v: Option<f64>) -> String {
    match v {
        None => String::new(),
        Some(x) if x.fract() == 0.0 && x.abs() < 1e16 => format!("{:.1}", x),
        Some(x) => x.to_string(),
    }
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals plus `num-format` thousands separators.
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_val: i64 = parts.next().unwrap_or("0").parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = parts.next() {
        res.push('.');
        res.push_str(frac);
    }
    if n.is_sign_negative() && n != 0.0 {
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
