use serde::Serialize;
use tabled::Tabled;

/// A CSV file held in memory as header names plus string cells.
///
/// Every row has exactly `headers.len()` cells; the loader pads short rows.
#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn column(&self, name: &str) -> crate::error::Result<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| crate::error::PipelineError::MissingColumn {
                table: self.name.clone(),
                column: name.to_string(),
            })
    }
}

/// Which CO2 measure the run ended up using; decides the column name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Co2Field {
    PerCapita,
    Intensity,
    Total,
}

impl Co2Field {
    /// Priority order a consumer uses when looking for the CO2 column.
    pub const LOOKUP_ORDER: [Co2Field; 3] = [Co2Field::PerCapita, Co2Field::Intensity, Co2Field::Total];

    pub fn column_name(self) -> &'static str {
        match self {
            Co2Field::PerCapita => "CO2pc",
            Co2Field::Intensity => "CO2intensity",
            Co2Field::Total => "CO2_total",
        }
    }
}

/// One of the six panel value columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Le,
    GdpPc,
    School,
    EnergyUse,
    Pm25,
    Co2,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Le,
        Field::GdpPc,
        Field::School,
        Field::EnergyUse,
        Field::Pm25,
        Field::Co2,
    ];
    /// Higher is better.
    pub const BENEFICIAL: [Field; 3] = [Field::Le, Field::GdpPc, Field::School];
    /// Lower is better.
    pub const DETRIMENTAL: [Field; 3] = [Field::EnergyUse, Field::Pm25, Field::Co2];

    pub fn name(self, co2: Co2Field) -> &'static str {
        match self {
            Field::Le => "LE",
            Field::GdpPc => "GDPpc",
            Field::School => "School",
            Field::EnergyUse => "EnergyUse",
            Field::Pm25 => "PM25",
            Field::Co2 => co2.column_name(),
        }
    }
}

/// Region and income group for one country code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountryInfo {
    pub region: Option<String>,
    pub income_group: Option<String>,
}

/// A single (country, indicator, year) cell after melting.
#[derive(Debug, Clone, PartialEq)]
pub struct LongRecord {
    pub country_name: String,
    pub country_code: String,
    pub indicator_code: String,
    pub year: i32,
    pub value: Option<f64>,
}

/// The six indicator values of one country-year.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IndicatorValues {
    pub le: Option<f64>,
    pub gdp_pc: Option<f64>,
    pub school: Option<f64>,
    pub energy_use: Option<f64>,
    pub pm25: Option<f64>,
    pub co2: Option<f64>,
}

impl IndicatorValues {
    pub fn get(&self, field: Field) -> Option<f64> {
        match field {
            Field::Le => self.le,
            Field::GdpPc => self.gdp_pc,
            Field::School => self.school,
            Field::EnergyUse => self.energy_use,
            Field::Pm25 => self.pm25,
            Field::Co2 => self.co2,
        }
    }

    pub fn slot(&mut self, field: Field) -> &mut Option<f64> {
        match field {
            Field::Le => &mut self.le,
            Field::GdpPc => &mut self.gdp_pc,
            Field::School => &mut self.school,
            Field::EnergyUse => &mut self.energy_use,
            Field::Pm25 => &mut self.pm25,
            Field::Co2 => &mut self.co2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelRow {
    pub country_code: String,
    pub country_name: String,
    pub year: i32,
    pub values: IndicatorValues,
    pub region: Option<String>,
    pub income_group: Option<String>,
}

/// Country-year panel. `columns` lists the value columns that exist, in the
/// order the pivot produced them.
#[derive(Debug, Clone)]
pub struct Panel {
    pub co2: Co2Field,
    pub columns: Vec<Field>,
    pub rows: Vec<PanelRow>,
}

impl Panel {
    pub fn has_column(&self, field: Field) -> bool {
        self.columns.contains(&field)
    }

    pub fn column_name(&self, field: Field) -> &'static str {
        field.name(self.co2)
    }

    pub fn series(&self, field: Field) -> impl Iterator<Item = Option<f64>> + '_ {
        self.rows.iter().map(move |r| r.values.get(field))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRow {
    pub row: PanelRow,
    pub normalized: IndicatorValues,
    pub skv: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ScoredPanel {
    pub co2: Co2Field,
    pub columns: Vec<Field>,
    pub rows: Vec<ScoredRow>,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct CoverageRow {
    #[serde(rename = "Country Code")]
    #[tabled(rename = "Country Code")]
    pub country_code: String,
    #[serde(rename = "coverage_2019_2023")]
    #[tabled(rename = "coverage_2019_2023")]
    pub coverage: f64,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct LeagueRow {
    #[serde(rename = "Country Code")]
    #[tabled(rename = "Country Code")]
    pub country_code: String,
    #[serde(rename = "Country Name")]
    #[tabled(rename = "Country Name")]
    pub country_name: String,
    #[serde(rename = "SKV_v0")]
    #[tabled(rename = "SKV_v0")]
    pub skv: f64,
}

#[derive(Debug, Serialize, Clone)]
pub struct TrendRow {
    #[serde(rename = "Country Code")]
    pub country_code: String,
    #[serde(rename = "Country Name")]
    pub country_name: String,
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "SKV_v0")]
    pub skv: Option<f64>,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct DeviantRow {
    #[serde(rename = "Income Group")]
    #[tabled(rename = "Income Group")]
    pub income_group: String,
    #[serde(rename = "Country Code")]
    #[tabled(rename = "Country Code")]
    pub country_code: String,
    #[serde(rename = "Country Name")]
    #[tabled(rename = "Country Name")]
    pub country_name: String,
    #[serde(rename = "SKV_v0")]
    #[tabled(rename = "SKV_v0")]
    pub skv: f64,
    #[serde(rename = "z_in_group")]
    #[tabled(rename = "z_in_group")]
    pub z_in_group: f64,
}

/// One point of the CO2 vs life expectancy chart data.
#[derive(Debug, Clone)]
pub struct ScatterRow {
    pub country_name: String,
    pub country_code: String,
    pub co2: Option<f64>,
    pub le: Option<f64>,
    pub skv: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct SummaryStats {
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
    pub total_countries: usize,
    pub total_rows: usize,
    pub co2_column: Option<String>,
    pub mean_skv: Option<f64>,
    pub generated_at: String,
}
