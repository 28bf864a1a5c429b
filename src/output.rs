use crate::error::{PipelineError, Result};
use crate::types::{Field, Panel, PanelRow, ScoredPanel};
use crate::util::format_cell;
use serde::Serialize;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

const ID_HEADERS: [&str; 3] = ["Country Code", "Country Name", "Year"];
const META_HEADERS: [&str; 2] = ["Region", "Income Group"];

fn id_cells(row: &PanelRow) -> Vec<String> {
    vec![row.country_code.clone(), row.country_name.clone(), row.year.to_string()]
}

fn meta_cells(row: &PanelRow) -> Vec<String> {
    vec![
        row.region.clone().unwrap_or_default(),
        row.income_group.clone().unwrap_or_default(),
    ]
}

/// Cleaned panel: the six value columns first, then identity and metadata.
pub fn write_panel_csv(path: &Path, panel: &Panel) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    let mut header: Vec<&str> = Field::ALL.iter().map(|f| panel.column_name(*f)).collect();
    header.extend(ID_HEADERS);
    header.extend(META_HEADERS);
    wtr.write_record(&header)?;

    for row in &panel.rows {
        let mut record: Vec<String> = Field::ALL.iter().map(|f| format_cell(row.values.get(*f))).collect();
        record.extend(id_cells(row));
        record.extend(meta_cells(row));
        wtr.write_record(&record)?;
    }
    wtr.flush().map_err(|e| PipelineError::io(path, e))?;
    Ok(())
}

/// Scored panel: identity, value columns in panel order, metadata, then the
/// `_n` columns (beneficial before detrimental) and `SKV_v0`.
pub fn write_scored_csv(path: &Path, scored: &ScoredPanel) -> Result<()> {
    let normalized: Vec<Field> = Field::BENEFICIAL
        .iter()
        .chain(Field::DETRIMENTAL.iter())
        .copied()
        .collect();

    let mut wtr = csv::Writer::from_path(path)?;
    let mut header: Vec<String> = ID_HEADERS.iter().map(|h| h.to_string()).collect();
    header.extend(scored.columns.iter().map(|f| f.name(scored.co2).to_string()));
    header.extend(META_HEADERS.iter().map(|h| h.to_string()));
    header.extend(normalized.iter().map(|f| format!("{}_n", f.name(scored.co2))));
    header.push("SKV_v0".to_string());
    wtr.write_record(&header)?;

    for s in &scored.rows {
        let mut record = id_cells(&s.row);
        record.extend(scored.columns.iter().map(|f| format_cell(s.row.values.get(*f))));
        record.extend(meta_cells(&s.row));
        record.extend(normalized.iter().map(|f| format_cell(s.normalized.get(*f))));
        record.push(format_cell(s.skv));
        wtr.write_record(&record)?;
    }
    wtr.flush().map_err(|e| PipelineError::io(path, e))?;
    Ok(())
}

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush().map_err(|e| PipelineError::io(path, e))?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s).map_err(|e| PipelineError::io(path, e))?;
    Ok(())
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}
