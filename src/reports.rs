// Summary tables built from `skv_v0.csv`.
//
// The reporter only sees the written file: it looks columns up by name and
// picks whichever CO2 column the run produced.
use crate::config::{PipelineConfig, ReportConfig};
use crate::error::{PipelineError, Result};
use crate::loader::load_table;
use crate::output::{write_csv, write_json};
use crate::types::{Co2Field, CoverageRow, DeviantRow, LeagueRow, ScatterRow, SummaryStats, Table, TrendRow};
use crate::util::{format_cell, mean, parse_f64_safe, parse_i32_safe, std_dev_population, text_or_none};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub country_code: String,
    pub country_name: String,
    pub year: i32,
    pub income_group: Option<String>,
    pub le: Option<f64>,
    pub co2: Option<f64>,
    pub skv: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ScoredFile {
    pub co2_column: Option<&'static str>,
    pub records: Vec<ScoredRecord>,
}

/// First of CO2pc / CO2intensity / CO2_total present in the headers.
pub fn detect_co2_column(headers: &[String]) -> Option<&'static str> {
    Co2Field::LOOKUP_ORDER
        .iter()
        .map(|f| f.column_name())
        .find(|name| headers.iter().any(|h| h == name))
}

pub fn scored_records(table: &Table) -> Result<ScoredFile> {
    let code = table.column("Country Code")?;
    let name = table.column("Country Name")?;
    let year = table.column("Year")?;
    let income = table.column("Income Group")?;
    let le = table.column("LE")?;
    let skv = table.column("SKV_v0")?;
    let co2_column = detect_co2_column(&table.headers);
    let co2 = co2_column.map(|c| table.column(c)).transpose()?;

    let records = table
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            Ok(ScoredRecord {
                country_code: row[code].clone(),
                country_name: row[name].clone(),
                year: parse_i32_safe(Some(row[year].as_str())).ok_or_else(|| PipelineError::InvalidCell {
                    table: table.name.clone(),
                    column: "Year".to_string(),
                    row: i + 1,
                    value: row[year].clone(),
                })?,
                income_group: text_or_none(&row[income]),
                le: parse_f64_safe(Some(row[le].as_str())),
                co2: co2.and_then(|i| parse_f64_safe(Some(row[i].as_str()))),
                skv: parse_f64_safe(Some(row[skv].as_str())),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ScoredFile { co2_column, records })
}

pub fn load_scored(path: &Path) -> Result<ScoredFile> {
    scored_records(&load_table(path)?)
}

/// Share of recent rows per country that carry a score.
pub fn coverage(records: &[ScoredRecord], from: i32) -> Vec<CoverageRow> {
    let mut counts: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for r in records.iter().filter(|r| r.year >= from) {
        let e = counts.entry(r.country_code.as_str()).or_insert((0, 0));
        e.0 += usize::from(r.skv.is_some());
        e.1 += 1;
    }
    counts
        .into_iter()
        .map(|(code, (present, total))| CoverageRow {
            country_code: code.to_string(),
            coverage: present as f64 / total as f64,
        })
        .collect()
}

/// Mean recent score per country, best first. Countries without any
/// recent score are left out.
pub fn recent_league(records: &[ScoredRecord], from: i32) -> Vec<LeagueRow> {
    let mut groups: BTreeMap<(&str, &str), Vec<Option<f64>>> = BTreeMap::new();
    for r in records.iter().filter(|r| r.year >= from) {
        groups
            .entry((r.country_code.as_str(), r.country_name.as_str()))
            .or_default()
            .push(r.skv);
    }
    let mut league: Vec<LeagueRow> = groups
        .into_iter()
        .filter_map(|((code, name), scores)| {
            mean(scores).map(|skv| LeagueRow {
                country_code: code.to_string(),
                country_name: name.to_string(),
                skv,
            })
        })
        .collect();
    league.sort_by(|a, b| b.skv.partial_cmp(&a.skv).unwrap_or(Ordering::Equal));
    league
}

pub fn top_bottom(league: &[LeagueRow], n: usize) -> (Vec<LeagueRow>, Vec<LeagueRow>) {
    let top = league.iter().take(n).cloned().collect();
    let bottom = league[league.len().saturating_sub(n)..].to_vec();
    (top, bottom)
}

pub fn trend(records: &[ScoredRecord], watch: &[String]) -> Vec<TrendRow> {
    records
        .iter()
        .filter(|r| watch.contains(&r.country_code))
        .map(|r| TrendRow {
            country_code: r.country_code.clone(),
            country_name: r.country_name.clone(),
            year: r.year,
            skv: r.skv,
        })
        .collect()
}

/// Countries whose recent mean score sits at least `z_min` population
/// standard deviations above their income group's mean.
pub fn positive_deviants(records: &[ScoredRecord], from: i32, z_min: f64) -> Vec<DeviantRow> {
    let mut per_country: BTreeMap<(&str, &str, &str), Vec<Option<f64>>> = BTreeMap::new();
    for r in records.iter().filter(|r| r.year >= from) {
        let Some(group) = r.income_group.as_deref() else { continue };
        per_country
            .entry((group, r.country_code.as_str(), r.country_name.as_str()))
            .or_default()
            .push(r.skv);
    }

    let mut by_group: BTreeMap<&str, Vec<(&str, &str, f64)>> = BTreeMap::new();
    for ((group, code, name), scores) in per_country {
        if let Some(m) = mean(scores) {
            by_group.entry(group).or_default().push((code, name, m));
        }
    }

    let mut out = Vec::new();
    for (group, members) in by_group {
        let scores: Vec<f64> = members.iter().map(|m| m.2).collect();
        let (Some(mu), Some(sd)) = (mean(scores.iter().copied().map(Some)), std_dev_population(&scores)) else {
            continue;
        };
        if sd <= 0.0 {
            continue;
        }
        let mut rows: Vec<DeviantRow> = members
            .into_iter()
            .map(|(code, name, skv)| DeviantRow {
                income_group: group.to_string(),
                country_code: code.to_string(),
                country_name: name.to_string(),
                skv,
                z_in_group: (skv - mu) / sd,
            })
            .filter(|d| d.z_in_group >= z_min)
            .collect();
        rows.sort_by(|a, b| b.z_in_group.partial_cmp(&a.z_in_group).unwrap_or(Ordering::Equal));
        out.extend(rows);
    }
    out
}

pub fn scatter(records: &[ScoredRecord], year: i32) -> Vec<ScatterRow> {
    records
        .iter()
        .filter(|r| r.year == year)
        .map(|r| ScatterRow {
            country_name: r.country_name.clone(),
            country_code: r.country_code.clone(),
            co2: r.co2,
            le: r.le,
            skv: r.skv,
        })
        .collect()
}

/// The CO2 header is only known at run time, so this one is written by hand.
pub fn write_scatter_csv(path: &Path, co2_column: &str, rows: &[ScatterRow]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["Country Name", "Country Code", co2_column, "LE", "SKV_v0"])?;
    for r in rows {
        wtr.write_record([
            r.country_name.clone(),
            r.country_code.clone(),
            format_cell(r.co2),
            format_cell(r.le),
            format_cell(r.skv),
        ])?;
    }
    wtr.flush().map_err(|e| PipelineError::io(path, e))?;
    Ok(())
}

pub fn generate_summary(file: &ScoredFile) -> SummaryStats {
    let years = file.records.iter().map(|r| r.year);
    let countries: BTreeSet<&str> = file.records.iter().map(|r| r.country_code.as_str()).collect();
    SummaryStats {
        year_min: years.clone().min(),
        year_max: years.max(),
        total_countries: countries.len(),
        total_rows: file.records.len(),
        co2_column: file.co2_column.map(str::to_string),
        mean_skv: mean(file.records.iter().map(|r| r.skv)),
        generated_at: chrono::Local::now().to_rfc3339(),
    }
}

/// What `run_reports` produced, for console previews.
#[derive(Debug)]
pub struct ReportSet {
    pub top: Vec<LeagueRow>,
    pub bottom: Vec<LeagueRow>,
    pub deviants: Vec<DeviantRow>,
    pub summary: SummaryStats,
    pub files: Vec<PathBuf>,
}

pub fn run_reports(config: &PipelineConfig) -> Result<ReportSet> {
    let file = load_scored(&config.scored_path())?;
    let dir = &config.tables_dir;
    std::fs::create_dir_all(dir).map_err(|e| PipelineError::io(dir, e))?;
    let ReportConfig {
        recent_from,
        scatter_year,
        league_size,
        deviant_z,
        watch,
    } = &config.report;

    let summary = generate_summary(&file);
    if let (Some(lo), Some(hi)) = (summary.year_min, summary.year_max) {
        info!("year range: {} -> {}", lo, hi);
    }
    info!("countries: {}", summary.total_countries);

    let mut files = Vec::new();
    let mut save = |name: String| {
        let p = dir.join(name);
        files.push(p.clone());
        p
    };

    write_csv(&save("coverage_last5.csv".into()), &coverage(&file.records, *recent_from))?;

    let league = recent_league(&file.records, *recent_from);
    let (top, bottom) = top_bottom(&league, *league_size);
    write_csv(&save("top10_skv_v0_last5.csv".into()), &top)?;
    write_csv(&save("bottom10_skv_v0_last5.csv".into()), &bottom)?;

    write_csv(&save("trend_watch.csv".into()), &trend(&file.records, watch))?;

    let deviants = positive_deviants(&file.records, *recent_from, *deviant_z);
    write_csv(&save("positive_deviants_last5.csv".into()), &deviants)?;

    if let Some(co2) = file.co2_column {
        let rows = scatter(&file.records, *scatter_year);
        write_scatter_csv(&save(format!("scatter_{}_LE_{}.csv", co2, scatter_year)), co2, &rows)?;
    }

    write_json(&save("summary.json".into()), &summary)?;

    for f in &files {
        info!("saved {}", f.display());
    }
    Ok(ReportSet {
        top,
        bottom,
        deviants,
        summary,
        files,
    })
}
