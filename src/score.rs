// Composite SKV score.
//
// Beneficial indicators (higher is better) and detrimental ones (lower is
// better) are min-max scaled to [0, 1] separately, detrimental values are
// inverted, and the score is mean(beneficial) - mean(detrimental).
use crate::clean::require_value_columns;
use crate::config::ScalingMode;
use crate::error::Result;
use crate::types::{Field, IndicatorValues, Panel, ScoredPanel, ScoredRow};
use crate::util::mean;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMaxScaler {
    pub min: f64,
    pub max: f64,
}

impl MinMaxScaler {
    /// Fit over the present values; `None` when there are none.
    pub fn fit<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        values.into_iter().flatten().fold(None, |acc, v| match acc {
            None => Some(Self { min: v, max: v }),
            Some(s) => Some(Self {
                min: s.min.min(v),
                max: s.max.max(v),
            }),
        })
    }

    /// A zero range maps everything to 0.
    pub fn transform(&self, v: f64) -> f64 {
        let range = self.max - self.min;
        if range.abs() < f64::EPSILON {
            0.0
        } else {
            (v - self.min) / range
        }
    }
}

/// One scaler per field of `group`, fitted according to `mode`.
fn fit_group(panel: &Panel, group: &[Field], mode: ScalingMode) -> Vec<(Field, Option<MinMaxScaler>)> {
    match mode {
        ScalingMode::Grouped => {
            let joint = MinMaxScaler::fit(group.iter().flat_map(|&f| panel.series(f)));
            group.iter().map(|&f| (f, joint)).collect()
        }
        ScalingMode::PerColumn => group
            .iter()
            .map(|&f| (f, MinMaxScaler::fit(panel.series(f))))
            .collect(),
    }
}

pub fn score(panel: Panel, mode: ScalingMode) -> Result<ScoredPanel> {
    require_value_columns(&panel)?;

    let beneficial = fit_group(&panel, &Field::BENEFICIAL, mode);
    let detrimental = fit_group(&panel, &Field::DETRIMENTAL, mode);
    for (field, scaler) in beneficial.iter().chain(&detrimental) {
        debug!("scaler {}: {:?}", panel.column_name(*field), scaler);
    }

    let co2 = panel.co2;
    let columns = panel.columns;
    let rows: Vec<ScoredRow> = panel
        .rows
        .into_iter()
        .map(|row| {
            let mut normalized = IndicatorValues::default();
            for (field, scaler) in &beneficial {
                *normalized.slot(*field) = row.values.get(*field).zip(*scaler).map(|(v, s)| s.transform(v));
            }
            for (field, scaler) in &detrimental {
                *normalized.slot(*field) =
                    row.values.get(*field).zip(*scaler).map(|(v, s)| 1.0 - s.transform(v));
            }
            let good = mean(Field::BENEFICIAL.iter().map(|&f| normalized.get(f)));
            let bad = mean(Field::DETRIMENTAL.iter().map(|&f| normalized.get(f)));
            let skv = good.zip(bad).map(|(g, b)| g - b);
            ScoredRow { row, normalized, skv }
        })
        .collect();

    info!(
        "scored {} rows ({} with SKV_v0)",
        rows.len(),
        rows.iter().filter(|r| r.skv.is_some()).count()
    );
    Ok(ScoredPanel { co2, columns, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::types::{Co2Field, PanelRow};
    use approx::assert_relative_eq;

    fn row(code: &str, values: IndicatorValues) -> PanelRow {
        PanelRow {
            country_code: code.into(),
            country_name: code.into(),
            year: 2020,
            values,
            region: Some("R".into()),
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

    fn values(le: f64, gdp: f64, school: f64, energy: f64, pm: f64, co2: f64) -> IndicatorValues {
        IndicatorValues {
            le: Some(le),
            gdp_pc: Some(gdp),
            school: Some(school),
            energy_use: Some(energy),
            pm25: Some(pm),
            co2: Some(co2),
        }
    }

    #[test]
    fn dominating_row_scores_higher() {
        let p = panel(vec![
            row("AAA", values(80.0, 40000.0, 95.0, 3000.0, 10.0, 5.0)),
            row("BBB", values(60.0, 2000.0, 50.0, 3000.0, 10.0, 5.0)),
        ]);
        for mode in [ScalingMode::Grouped, ScalingMode::PerColumn] {
            let scored = score(p.clone(), mode).unwrap();
            let a = scored.rows[0].skv.unwrap();
            let b = scored.rows[1].skv.unwrap();
            assert!(a > b, "{:?}: {} <= {}", mode, a, b);
        }
    }

    #[test]
    fn grouped_scaling_shares_one_range() {
        let p = panel(vec![
            row("AAA", values(50.0, 100.0, 0.0, 0.0, 10.0, 20.0)),
            row("BBB", values(0.0, 50.0, 100.0, 40.0, 0.0, 10.0)),
        ]);
        let scored = score(p, ScalingMode::Grouped).unwrap();
        let a = &scored.rows[0].normalized;
        // beneficial range 0..100
        assert_relative_eq!(a.le.unwrap(), 0.5);
        assert_relative_eq!(a.gdp_pc.unwrap(), 1.0);
        // detrimental range 0..40, inverted
        assert_relative_eq!(a.pm25.unwrap(), 0.75);
        assert_relative_eq!(a.co2.unwrap(), 0.5);
        assert_relative_eq!(scored.rows[0].skv.unwrap(), 0.5 - (1.0 + 0.75 + 0.5) / 3.0);
    }

    #[test]
    fn per_column_scaling_is_independent() {
        let p = panel(vec![
            row("AAA", values(50.0, 100.0, 0.0, 0.0, 10.0, 20.0)),
            row("BBB", values(0.0, 50.0, 100.0, 40.0, 0.0, 10.0)),
        ]);
        let scored = score(p, ScalingMode::PerColumn).unwrap();
        let a = &scored.rows[0].normalized;
        assert_relative_eq!(a.le.unwrap(), 1.0);
        assert_relative_eq!(a.pm25.unwrap(), 0.0);
    }

    #[test]
    fn missing_values_stay_missing_and_constant_range_maps_to_zero() {
        let mut v = values(70.0, 1.0, 1.0, 5.0, 5.0, 5.0);
        v.gdp_pc = None;
        let p = panel(vec![row("AAA", v), row("BBB", values(70.0, 1.0, 1.0, 5.0, 5.0, 5.0))]);
        let scored = score(p, ScalingMode::PerColumn).unwrap();
        assert_eq!(scored.rows[0].normalized.gdp_pc, None);
        assert_eq!(scored.rows[0].normalized.le, Some(0.0));
        assert_eq!(scored.rows[0].normalized.co2, Some(1.0));
        assert_relative_eq!(scored.rows[0].skv.unwrap(), -1.0);
    }

    #[test]
    fn all_detrimental_missing_gives_no_score() {
        let mut v = values(70.0, 1.0, 1.0, 0.0, 0.0, 0.0);
        v.energy_use = None;
        v.pm25 = None;
        v.co2 = None;
        let scored = score(panel(vec![row("AAA", v)]), ScalingMode::Grouped).unwrap();
        assert_eq!(scored.rows[0].skv, None);
    }

    #[test]
    fn missing_co2_column_fails() {
        let mut p = panel(vec![]);
        p.columns.retain(|f| *f != Field::Co2);
        assert!(matches!(
            score(p, ScalingMode::Grouped),
            Err(PipelineError::MissingCo2Column(ref n)) if n == "CO2pc"
        ));
    }
}
