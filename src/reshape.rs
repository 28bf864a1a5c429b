// Wide-to-long reshape and the country-year pivot.
//
// RawIndicatorTable (one column per year) -> LongRecord per cell
// -> one PanelRow per (Country Code, Year) with one column per indicator.
use crate::config::DuplicatePolicy;
use crate::error::{PipelineError, Result};
use crate::indicators::IndicatorSelection;
use crate::types::{IndicatorValues, LongRecord, Panel, PanelRow, Table};
use crate::util::parse_cell;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

const ID_COLUMNS: [&str; 4] = ["Country Name", "Country Code", "Indicator Name", "Indicator Code"];

/// Rows of the indicator table whose code is one of the six selected.
pub fn filter_indicators(table: &Table, selection: &IndicatorSelection) -> Result<Table> {
    let idx = table.column("Indicator Code")?;
    let keep: BTreeSet<&str> = selection.codes().into_iter().collect();
    let rows: Vec<Vec<String>> = table
        .rows
        .iter()
        .filter(|r| keep.contains(r[idx].trim()))
        .cloned()
        .collect();
    debug!("{} of {} indicator rows kept", rows.len(), table.rows.len());
    Ok(Table {
        name: table.name.clone(),
        headers: table.headers.clone(),
        rows,
    })
}

/// Year columns are the ones whose header is made only of digits.
fn year_columns(table: &Table) -> Result<Vec<(usize, i32)>> {
    table
        .headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !h.is_empty() && h.chars().all(|c| c.is_ascii_digit()))
        .map(|(i, h)| {
            h.parse::<i32>()
                .map(|y| (i, y))
                .map_err(|_| PipelineError::InvalidYear(h.clone()))
        })
        .collect()
}

/// One `LongRecord` per (row, year column), missing cells included.
pub fn melt(table: &Table) -> Result<Vec<LongRecord>> {
    let ids = ID_COLUMNS
        .iter()
        .map(|c| table.column(c))
        .collect::<Result<Vec<_>>>()?;
    let (name_idx, code_idx, ind_idx) = (ids[0], ids[1], ids[3]);
    let years = year_columns(table)?;

    let mut long = Vec::with_capacity(table.rows.len() * years.len());
    for row in &table.rows {
        for &(col, year) in &years {
            let value = parse_cell(&row[col]).map_err(|_| PipelineError::InvalidValue {
                country: row[code_idx].clone(),
                indicator: row[ind_idx].clone(),
                column: table.headers[col].clone(),
                value: row[col].clone(),
            })?;
            long.push(LongRecord {
                country_name: row[name_idx].clone(),
                country_code: row[code_idx].clone(),
                indicator_code: row[ind_idx].trim().to_string(),
                year,
                value,
            });
        }
    }
    Ok(long)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PivotRow {
    pub country_code: String,
    pub country_name: String,
    pub year: i32,
    pub values: BTreeMap<String, f64>,
}

/// Country-year rows keyed by indicator code. `columns` holds every code
/// with at least one observed value, sorted.
#[derive(Debug, Clone)]
pub struct Pivot {
    pub columns: BTreeSet<String>,
    pub rows: Vec<PivotRow>,
}

/// Spread observed values into one row per (Country Code, Year).
///
/// Missing values do not contribute, so a country-year with nothing
/// observed produces no row.
pub fn pivot(records: &[LongRecord], duplicates: DuplicatePolicy) -> Result<Pivot> {
    struct Acc {
        name: String,
        cells: BTreeMap<String, (f64, usize)>,
    }

    let mut groups: BTreeMap<(String, i32), Acc> = BTreeMap::new();
    for r in records {
        let Some(v) = r.value else { continue };
        let acc = groups
            .entry((r.country_code.clone(), r.year))
            .or_insert_with(|| Acc {
                name: r.country_name.clone(),
                cells: BTreeMap::new(),
            });
        let cell = acc.cells.entry(r.indicator_code.clone()).or_insert((0.0, 0));
        if cell.1 > 0 && duplicates == DuplicatePolicy::Reject {
            return Err(PipelineError::DuplicateKey {
                country_code: r.country_code.clone(),
                indicator_code: r.indicator_code.clone(),
                year: r.year,
            });
        }
        cell.0 += v;
        cell.1 += 1;
    }

    let mut columns = BTreeSet::new();
    let rows = groups
        .into_iter()
        .map(|((country_code, year), acc)| {
            let values: BTreeMap<String, f64> = acc
                .cells
                .into_iter()
                .map(|(code, (sum, n))| (code, sum / n as f64))
                .collect();
            columns.extend(values.keys().cloned());
            PivotRow {
                country_code,
                country_name: acc.name,
                year,
                values,
            }
        })
        .collect();

    Ok(Pivot { columns, rows })
}

/// Replace indicator codes with the short field names.
pub fn rename(pivot: Pivot, selection: &IndicatorSelection) -> Panel {
    let columns = pivot
        .columns
        .iter()
        .filter_map(|code| selection.field_for(code))
        .collect();
    let rows = pivot
        .rows
        .into_iter()
        .map(|p| {
            let mut values = IndicatorValues::default();
            for (code, v) in &p.values {
                if let Some(field) = selection.field_for(code) {
                    *values.slot(field) = Some(*v);
                }
            }
            PanelRow {
                country_code: p.country_code,
                country_name: p.country_name,
                year: p.year,
                values,
                region: None,
                income_group: None,
            }
        })
        .collect();
    Panel {
        co2: selection.co2_field(),
        columns,
        rows,
    }
}

/// filter -> melt -> pivot -> rename.
pub fn reshape(raw: &Table, selection: &IndicatorSelection, duplicates: DuplicatePolicy) -> Result<Panel> {
    let filtered = filter_indicators(raw, selection)?;
    let long = melt(&filtered)?;
    let pivoted = pivot(&long, duplicates)?;
    let panel = rename(pivoted, selection);
    info!(
        "reshaped {} indicator rows into {} long records and {} country-years",
        filtered.rows.len(),
        long.len(),
        panel.rows.len()
    );
    Ok(panel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::select_co2;
    use crate::loader::parse_table;
    use crate::types::{Co2Field, Field};

    const RAW: &str = "\
Country Name,Country Code,Indicator Name,Indicator Code,2019,2020,2021
Zed,ZZZ,Life expectancy,SP.DYN.LE00.IN,70,71,
Zed,ZZZ,GDP per capita,NY.GDP.PCAP.KD,1000,,1200
Zed,ZZZ,CO2 per capita,EN.ATM.CO2E.PC,2.5,2.6,2.7
Zed,ZZZ,Unrelated,XX.UNUSED,1,2,3
Why,YYY,Life expectancy,SP.DYN.LE00.IN,,,
Why,YYY,School,SE.SEC.ENRR,,90,
";

    fn selection(raw: &Table) -> IndicatorSelection {
        select_co2(&crate::indicators::available_codes(raw).unwrap()).unwrap()
    }

    #[test]
    fn filter_keeps_only_selected_codes() {
        let raw = parse_table("WDICSV.csv", RAW).unwrap();
        let filtered = filter_indicators(&raw, &selection(&raw)).unwrap();
        assert_eq!(filtered.rows.len(), 5);
    }

    #[test]
    fn melt_produces_one_record_per_year_column() {
        let raw = parse_table("WDICSV.csv", RAW).unwrap();
        let long = melt(&raw).unwrap();
        assert_eq!(long.len(), 6 * 3);
        assert_eq!(long[0].year, 2019);
        assert_eq!(long[0].value, Some(70.0));
        assert_eq!(long[2].value, None);
    }

    #[test]
    fn melt_rejects_non_numeric_cells() {
        let raw = parse_table(
            "WDICSV.csv",
            "Country Name,Country Code,Indicator Name,Indicator Code,2019\nZed,ZZZ,x,SE.SEC.ENRR,abc\n",
        )
        .unwrap();
        assert!(matches!(melt(&raw), Err(PipelineError::InvalidValue { .. })));
    }

    #[test]
    fn melt_rejects_overflowing_value() {
        let raw = parse_table(
            "WDICSV.csv",
            "Country Name,Country Code,Indicator Name,Indicator Code,2019\nZed,ZZZ,x,SE.SEC.ENRR,1e400\n",
        )
        .unwrap();
        match melt(&raw) {
            Err(PipelineError::InvalidValue { column, value, .. }) => {
                assert_eq!(column, "2019");
                assert_eq!(value, "1e400");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn melt_rejects_overflowing_year_header() {
        let raw = parse_table(
            "WDICSV.csv",
            "Country Name,Country Code,Indicator Name,Indicator Code,99999999999\nZed,ZZZ,x,SE.SEC.ENRR,1\n",
        )
        .unwrap();
        assert!(matches!(melt(&raw), Err(PipelineError::InvalidYear(_))));
    }

    #[test]
    fn pivot_row_count_matches_observed_country_years() {
        let raw = parse_table("WDICSV.csv", RAW).unwrap();
        let sel = selection(&raw);
        let long = melt(&filter_indicators(&raw, &sel).unwrap()).unwrap();
        let observed: BTreeSet<(String, i32)> = long
            .iter()
            .filter(|r| r.value.is_some())
            .map(|r| (r.country_code.clone(), r.year))
            .collect();
        let p = pivot(&long, DuplicatePolicy::Reject).unwrap();
        // ZZZ 2019..2021 and YYY 2020 only.
        assert_eq!(p.rows.len(), observed.len());
        assert_eq!(p.rows.len(), 4);
    }

    #[test]
    fn duplicates_are_rejected_unless_averaging_is_requested() {
        let rec = |v| LongRecord {
            country_name: "Zed".into(),
            country_code: "ZZZ".into(),
            indicator_code: "SE.SEC.ENRR".into(),
            year: 2020,
            value: Some(v),
        };
        let records = vec![rec(80.0), rec(90.0)];
        let err = pivot(&records, DuplicatePolicy::Reject).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::DuplicateKey { ref country_code, year: 2020, .. } if country_code == "ZZZ"
        ));

        let p = pivot(&records, DuplicatePolicy::Mean).unwrap();
        assert_eq!(p.rows[0].values["SE.SEC.ENRR"], 85.0);
    }

    #[test]
    fn reshape_renames_to_fields_in_code_order() {
        let raw = parse_table("WDICSV.csv", RAW).unwrap();
        let panel = reshape(&raw, &selection(&raw), DuplicatePolicy::Reject).unwrap();
        assert_eq!(panel.co2, Co2Field::PerCapita);
        // EN.ATM.CO2E.PC < NY.GDP.PCAP.KD < SE.SEC.ENRR < SP.DYN.LE00.IN
        assert_eq!(panel.columns, vec![Field::Co2, Field::GdpPc, Field::School, Field::Le]);
        let zzz_2020 = panel
            .rows
            .iter()
            .find(|r| r.country_code == "ZZZ" && r.year == 2020)
            .unwrap();
        assert_eq!(zzz_2020.values.le, Some(71.0));
        assert_eq!(zzz_2020.values.gdp_pc, None);
        assert_eq!(zzz_2020.values.co2, Some(2.6));
    }
}
