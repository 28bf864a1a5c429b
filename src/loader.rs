use crate::error::{PipelineError, Result};
use crate::types::{CountryInfo, Table};
use crate::util::text_or_none;
use csv::ReaderBuilder;
use encoding_rs::{UTF_8, WINDOWS_1252};
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Decode raw file bytes as UTF-8, falling back to Latin-1 once.
///
/// Returns the text and whether the fallback was needed.
pub fn decode_text(bytes: &[u8]) -> (Cow<'_, str>, bool) {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match UTF_8.decode_without_bom_handling_and_without_replacement(body) {
        Some(text) => (text, false),
        // Latin-1 cannot fail: every byte maps to a character.
        None => (WINDOWS_1252.decode_without_bom_handling(body).0, true),
    }
}

/// Parse CSV text into a `Table`. Short rows are padded with empty cells;
/// rows with more fields than the header are rejected.
pub fn parse_table(name: &str, text: &str) -> Result<Table> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(text.as_bytes());
    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
    let width = headers.len();

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        if record.len() > width {
            return Err(PipelineError::MalformedRow {
                table: name.to_string(),
                line: record.position().map(|p| p.line() as usize).unwrap_or(0),
                found: record.len(),
                expected: width,
            });
        }
        let mut row: Vec<String> = record.iter().map(|c| c.to_string()).collect();
        row.resize(width, String::new());
        rows.push(row);
    }

    Ok(Table {
        name: name.to_string(),
        headers,
        rows,
    })
}

pub fn load_table(path: &Path) -> Result<Table> {
    let bytes = std::fs::read(path).map_err(|e| PipelineError::io(path, e))?;
    let (text, fallback) = decode_text(&bytes);
    if fallback {
        warn!("{} is not valid UTF-8; decoded as Latin-1", path.display());
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let table = parse_table(&name, &text)?;
    info!(
        "loaded {} ({} rows, {} columns)",
        name,
        table.rows.len(),
        table.headers.len()
    );
    Ok(table)
}

/// Region and income group per country code. The first row for a code wins.
pub fn country_metadata(table: &Table) -> Result<HashMap<String, CountryInfo>> {
    let code_idx = table.column("Country Code")?;
    let region_idx = table.column("Region")?;
    let income_idx = table.column("Income Group")?;

    let mut meta: HashMap<String, CountryInfo> = HashMap::new();
    for row in &table.rows {
        let Some(code) = text_or_none(&row[code_idx]) else {
            continue;
        };
        meta.entry(code).or_insert_with(|| CountryInfo {
            region: text_or_none(&row[region_idx]),
            income_group: text_or_none(&row[income_idx]),
        });
    }
    debug!("country metadata for {} codes", meta.len());
    Ok(meta)
}

pub fn load_country_metadata(path: &Path) -> Result<HashMap<String, CountryInfo>> {
    country_metadata(&load_table(path)?)
}
