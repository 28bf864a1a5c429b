use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::types::{CountryInfo, Field, Panel, PanelRow};
use crate::util::{quantile_sorted, sort_floats};
use std::collections::HashMap;
use std::ops::RangeInclusive;
use tracing::{debug, info};

/// Left-join region and income group by country code.
pub fn join_metadata(panel: Panel, meta: &HashMap<String, CountryInfo>) -> Panel {
    let rows = panel
        .rows
        .into_iter()
        .map(|row| {
            let info = meta.get(&row.country_code).cloned().unwrap_or_default();
            PanelRow {
                region: info.region,
                income_group: info.income_group,
                ..row
            }
        })
        .collect();
    Panel { rows, ..panel }
}

/// Drop aggregates (world, income groups, regional blocs): they have no region.
pub fn drop_aggregates(panel: Panel) -> Panel {
    let before = panel.rows.len();
    let rows: Vec<PanelRow> = panel.rows.into_iter().filter(|r| r.region.is_some()).collect();
    debug!("dropped {} aggregate rows", before - rows.len());
    Panel { rows, ..panel }
}

/// Keep years inside `window` and sort by (Country Code, Year).
pub fn restrict_years(panel: Panel, window: &RangeInclusive<i32>) -> Panel {
    let mut rows: Vec<PanelRow> = panel
        .rows
        .into_iter()
        .filter(|r| window.contains(&r.year))
        .collect();
    rows.sort_by(|a, b| a.country_code.cmp(&b.country_code).then(a.year.cmp(&b.year)));
    Panel { rows, ..panel }
}

/// Every value column must exist before cleaning continues.
pub fn require_value_columns(panel: &Panel) -> Result<()> {
    for field in Field::ALL {
        if !panel.has_column(field) {
            let name = panel.column_name(field).to_string();
            return Err(match field {
                Field::Co2 => PipelineError::MissingCo2Column(name),
                _ => PipelineError::MissingValueColumn(name),
            });
        }
    }
    Ok(())
}

/// Fill missing values within `limit` steps of a known one.
///
/// Interior runs of at most `limit` are filled linearly between their
/// neighbours (by position); longer interior runs stay missing. Leading and
/// trailing runs take the nearest known value for the `limit` cells next to
/// it, the rest of the run stays missing.
pub fn interpolate_limited(series: &[Option<f64>], limit: usize) -> Vec<Option<f64>> {
    let mut out = series.to_vec();
    let known: Vec<usize> = (0..series.len()).filter(|&i| series[i].is_some()).collect();
    let (Some(&first), Some(&last)) = (known.first(), known.last()) else {
        return out;
    };

    let v = series[first];
    out[first.saturating_sub(limit)..first].iter_mut().for_each(|c| *c = v);
    let v = series[last];
    let tail_end = (last + 1 + limit).min(series.len());
    out[last + 1..tail_end].iter_mut().for_each(|c| *c = v);

    for pair in known.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        let gap = hi - lo - 1;
        if gap == 0 || gap > limit {
            continue;
        }
        if let (Some(a), Some(b)) = (series[lo], series[hi]) {
            let span = (hi - lo) as f64;
            for i in lo + 1..hi {
                out[i] = Some(a + (b - a) * (i - lo) as f64 / span);
            }
        }
    }
    out
}

/// Interpolate every value column within each country's series.
/// Rows must already be sorted by (Country Code, Year).
pub fn interpolate_gaps(panel: Panel, limit: usize) -> Panel {
    let mut rows = panel.rows;
    let mut filled = 0usize;

    let mut start = 0;
    while start < rows.len() {
        let code = rows[start].country_code.clone();
        let end = rows[start..]
            .iter()
            .position(|r| r.country_code != code)
            .map_or(rows.len(), |n| start + n);
        let group = &mut rows[start..end];
        for field in Field::ALL {
            let series: Vec<Option<f64>> = group.iter().map(|r| r.values.get(field)).collect();
            let result = interpolate_limited(&series, limit);
            for (row, (old, new)) in group.iter_mut().zip(series.iter().zip(result)) {
                if old.is_none() && new.is_some() {
                    filled += 1;
                }
                *row.values.slot(field) = new;
            }
        }
        start = end;
    }

    info!("interpolated {} missing cells (gap limit {})", filled, limit);
    Panel { rows, ..panel }
}

/// Quantile band of one column over the whole panel, missing values ignored.
pub fn quantile_band(panel: &Panel, field: Field, lower: f64, upper: f64) -> Option<(f64, f64)> {
    let mut values: Vec<f64> = panel.series(field).flatten().collect();
    sort_floats(&mut values);
    Some((quantile_sorted(&values, lower)?, quantile_sorted(&values, upper)?))
}

/// Clip every value column to its pooled [lower, upper] quantile band.
pub fn winsorize(panel: Panel, lower: f64, upper: f64) -> Panel {
    let bands: Vec<(Field, (f64, f64))> = Field::ALL
        .iter()
        .filter_map(|&f| quantile_band(&panel, f, lower, upper).map(|b| (f, b)))
        .collect();
    for (field, (lo, hi)) in &bands {
        debug!("winsorize {}: [{}, {}]", panel.column_name(*field), lo, hi);
    }

    let rows = panel
        .rows
        .into_iter()
        .map(|mut row| {
            for (field, (lo, hi)) in &bands {
                let slot = row.values.slot(*field);
                *slot = slot.map(|v| v.clamp(*lo, *hi));
            }
            row
        })
        .collect();
    Panel { rows, ..panel }
}

/// join -> drop aggregates -> year window -> interpolate -> winsorize.
pub fn clean(panel: Panel, meta: &HashMap<String, CountryInfo>, config: &PipelineConfig) -> Result<Panel> {
    let panel = drop_aggregates(join_metadata(panel, meta));
    let panel = restrict_years(panel, &config.years);
    require_value_columns(&panel)?;
    let panel = interpolate_gaps(panel, config.interpolation_limit);
    let panel = winsorize(panel, config.winsor_lower, config.winsor_upper);
    info!("cleaned panel: {} country-years", panel.rows.len());
    Ok(panel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Co2Field, IndicatorValues};
    use approx::assert_relative_eq;

    fn row(code: &str, year: i32, le: Option<f64>) -> PanelRow {
        PanelRow {
            country_code: code.to_string(),
            country_name: code.to_string(),
            year,
            values: IndicatorValues { le, ..Default::default() },
            region: None,
            income_group: None,
        }
    }

    fn panel(rows: Vec<PanelRow>) -> Panel {
        Panel {
            co2: Co2Field::PerCapita,
            columns: Field::ALL.to_vec(),
            rows,
        }
    }

    #[test]
    fn single_interior_gap_is_filled_linearly() {
        let out = interpolate_limited(&[Some(1.0), None, Some(3.0)], 3);
        assert_eq!(out, vec![Some(1.0), Some(2.0), Some(3.0)]);
    }

    #[test]
    fn gap_of_three_filled_gap_of_four_left() {
        let three = interpolate_limited(&[Some(0.0), None, None, None, Some(4.0)], 3);
        assert_eq!(three, vec![Some(0.0), Some(1.0), Some(2.0), Some(3.0), Some(4.0)]);

        let four = [Some(0.0), None, None, None, None, Some(5.0)];
        assert_eq!(interpolate_limited(&four, 3), four.to_vec());
    }

    #[test]
    fn edges_take_nearest_value_within_limit() {
        let out = interpolate_limited(&[None, None, Some(5.0), Some(6.0), None], 3);
        assert_eq!(out, vec![Some(5.0), Some(5.0), Some(5.0), Some(6.0), Some(6.0)]);

        assert_eq!(interpolate_limited(&[None, None], 3), vec![None, None]);
    }

    #[test]
    fn long_edge_runs_fill_only_cells_near_known_value() {
        let lead4 = [None, None, None, None, Some(1.0)];
        assert_eq!(
            interpolate_limited(&lead4, 3),
            vec![None, Some(1.0), Some(1.0), Some(1.0), Some(1.0)]
        );

        let lead5 = [None, None, None, None, None, Some(7.0)];
        assert_eq!(
            interpolate_limited(&lead5, 3),
            vec![None, None, Some(7.0), Some(7.0), Some(7.0), Some(7.0)]
        );

        let trail4 = [Some(1.0), Some(2.0), None, None, None, None];
        assert_eq!(
            interpolate_limited(&trail4, 3),
            vec![Some(1.0), Some(2.0), Some(2.0), Some(2.0), Some(2.0), None]
        );

        let trail5 = [Some(1.0), Some(2.0), None, None, None, None, None];
        assert_eq!(
            interpolate_limited(&trail5, 3),
            vec![Some(1.0), Some(2.0), Some(2.0), Some(2.0), Some(2.0), None, None]
        );
    }

    #[test]
    fn interpolation_stays_within_country() {
        let p = panel(vec![
            row("AAA", 2000, Some(10.0)),
            row("AAA", 2001, None),
            row("BBB", 2000, None),
            row("BBB", 2001, Some(20.0)),
        ]);
        let out = interpolate_gaps(p, 3);
        assert_eq!(out.rows[1].values.le, Some(10.0));
        assert_eq!(out.rows[2].values.le, Some(20.0));
    }

    #[test]
    fn aggregates_and_out_of_window_years_are_dropped() {
        let mut meta = HashMap::new();
        meta.insert(
            "AAA".to_string(),
            CountryInfo { region: Some("R".into()), income_group: Some("High income".into()) },
        );
        meta.insert("WLD".to_string(), CountryInfo::default());
        let p = panel(vec![
            row("AAA", 2001, Some(1.0)),
            row("AAA", 1999, Some(1.0)),
            row("AAA", 2000, Some(1.0)),
            row("WLD", 2000, Some(1.0)),
            row("XXX", 2000, Some(1.0)),
        ]);
        let out = restrict_years(drop_aggregates(join_metadata(p, &meta)), &(2000..=2023));
        let keys: Vec<(&str, i32)> = out.rows.iter().map(|r| (r.country_code.as_str(), r.year)).collect();
        assert_eq!(keys, vec![("AAA", 2000), ("AAA", 2001)]);
        assert_eq!(out.rows[0].income_group.as_deref(), Some("High income"));
    }

    #[test]
    fn winsorize_clips_to_pooled_band_and_keeps_inner_values() {
        let rows: Vec<PanelRow> = (0..=100)
            .map(|i| row(&format!("C{:03}", i), 2000, Some(i as f64)))
            .chain(std::iter::once(row("MIS", 2000, None)))
            .collect();
        let p = panel(rows);
        let (lo, hi) = quantile_band(&p, Field::Le, 0.01, 0.99).unwrap();
        assert_relative_eq!(lo, 1.0);
        assert_relative_eq!(hi, 99.0);

        let out = winsorize(p, 0.01, 0.99);
        let values: Vec<Option<f64>> = out.series(Field::Le).collect();
        assert_eq!(values[0], Some(1.0));
        assert_eq!(values[50], Some(50.0));
        assert_eq!(values[100], Some(99.0));
        assert_eq!(values[101], None);
        assert!(values.iter().flatten().all(|v| (lo..=hi).contains(v)));
    }

    #[test]
    fn missing_co2_column_is_reported_by_name() {
        let mut p = panel(vec![]);
        p.co2 = Co2Field::Intensity;
        p.columns.retain(|f| *f != Field::Co2);
        match require_value_columns(&p) {
            Err(PipelineError::MissingCo2Column(name)) => assert_eq!(name, "CO2intensity"),
            other => panic!("unexpected {:?}", other),
        }

        let mut p = panel(vec![]);
        p.columns.retain(|f| *f != Field::Pm25);
        assert!(matches!(require_value_columns(&p), Err(PipelineError::MissingValueColumn(_))));
    }
}
