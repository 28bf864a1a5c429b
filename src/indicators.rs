// Indicator codes and CO2 indicator selection.
//
// The CO2 candidates and the column each one becomes live in one ordered
// table, so the selection order and the naming cannot disagree.
use crate::error::{PipelineError, Result};
use crate::types::{Co2Field, Field, Table};
use std::collections::BTreeSet;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Co2Candidate {
    pub code: &'static str,
    pub field: Co2Field,
}

/// Best first.
pub const CO2_CANDIDATES: [Co2Candidate; 4] = [
    // per capita, consumption based (AR5)
    Co2Candidate { code: "EN.GHG.CO2.PC.CE.AR5", field: Co2Field::PerCapita },
    // per capita, production based (legacy series)
    Co2Candidate { code: "EN.ATM.CO2E.PC", field: Co2Field::PerCapita },
    // intensity per unit of GDP
    Co2Candidate { code: "EN.GHG.CO2.RT.GDP.KD", field: Co2Field::Intensity },
    // absolute total, Mt
    Co2Candidate { code: "EN.GHG.CO2.MT.CE.AR5", field: Co2Field::Total },
];

pub const FIXED_INDICATORS: [(&str, Field); 5] = [
    ("SP.DYN.LE00.IN", Field::Le),
    ("NY.GDP.PCAP.KD", Field::GdpPc),
    ("SE.SEC.ENRR", Field::School),
    ("EG.USE.PCAP.KG.OE", Field::EnergyUse),
    ("EN.ATM.PM25.MC.M3", Field::Pm25),
];

/// The six indicators a run works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorSelection {
    pub co2: Co2Candidate,
}

impl IndicatorSelection {
    pub fn codes(&self) -> Vec<&'static str> {
        FIXED_INDICATORS
            .iter()
            .map(|(code, _)| *code)
            .chain(std::iter::once(self.co2.code))
            .collect()
    }

    pub fn field_for(&self, code: &str) -> Option<Field> {
        if code == self.co2.code {
            return Some(Field::Co2);
        }
        FIXED_INDICATORS
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, f)| *f)
    }

    pub fn co2_field(&self) -> Co2Field {
        self.co2.field
    }
}

/// Distinct non-empty indicator codes in the raw table.
pub fn available_codes(table: &Table) -> Result<BTreeSet<String>> {
    let idx = table.column("Indicator Code")?;
    Ok(table
        .rows
        .iter()
        .map(|r| r[idx].trim())
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect())
}

/// First CO2 candidate present in `available`.
pub fn select_co2(available: &BTreeSet<String>) -> Result<IndicatorSelection> {
    let co2 = CO2_CANDIDATES
        .iter()
        .find(|c| available.contains(c.code))
        .copied()
        .ok_or_else(|| PipelineError::NoCo2Indicator {
            candidates: CO2_CANDIDATES.iter().map(|c| c.code).collect(),
        })?;
    info!("CO2 indicator: {} -> {}", co2.code, co2.field.column_name());
    Ok(IndicatorSelection { co2 })
}
