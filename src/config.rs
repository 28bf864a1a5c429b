// Fixed run configuration.
//
// Nothing here is read from the command line or the environment: the binary
// always runs with `PipelineConfig::default()`. Tests build their own config
// pointing at temporary directories.
use std::ops::RangeInclusive;
use std::path::PathBuf;

/// How the pivot step treats two observed values for the same
/// (country, indicator, year) key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Fail with `PipelineError::DuplicateKey`.
    Reject,
    /// Average the duplicates.
    Mean,
}

/// How min-max scaling is fitted inside each indicator group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalingMode {
    /// One min/max over every column of the group.
    Grouped,
    /// One min/max per column.
    PerColumn,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub indicators_path: PathBuf,
    pub countries_path: PathBuf,
    pub processed_dir: PathBuf,
    pub tables_dir: PathBuf,
    pub years: RangeInclusive<i32>,
    pub interpolation_limit: usize,
    pub winsor_lower: f64,
    pub winsor_upper: f64,
    pub duplicates: DuplicatePolicy,
    pub scaling: ScalingMode,
    pub report: ReportConfig,
}

#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub recent_from: i32,
    pub scatter_year: i32,
    pub league_size: usize,
    pub deviant_z: f64,
    pub watch: Vec<String>,
}

impl PipelineConfig {
    pub fn panel_path(&self) -> PathBuf {
        self.processed_dir.join("mini_panel_clean.csv")
    }

    pub fn scored_path(&self) -> PathBuf {
        self.processed_dir.join("skv_v0.csv")
    }

    /// Same layout rooted at `root`; used by tests and scratch runs.
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let base = Self::default();
        Self {
            indicators_path: root.join(&base.indicators_path),
            countries_path: root.join(&base.countries_path),
            processed_dir: root.join(&base.processed_dir),
            tables_dir: root.join(&base.tables_dir),
            ..base
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            indicators_path: PathBuf::from("WDICSV.csv"),
            countries_path: PathBuf::from("WDICountry.csv"),
            processed_dir: PathBuf::from("data/processed"),
            tables_dir: PathBuf::from("reports/tables"),
            years: 2000..=2023,
            interpolation_limit: 3,
            winsor_lower: 0.01,
            winsor_upper: 0.99,
            duplicates: DuplicatePolicy::Reject,
            scaling: ScalingMode::Grouped,
            report: ReportConfig::default(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            recent_from: 2019,
            scatter_year: 2020,
            league_size: 10,
            deviant_z: 1.0,
            watch: ["TUR", "NOR", "DEU", "IND"].iter().map(|s| s.to_string()).collect(),
        }
    }
}
