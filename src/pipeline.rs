// Explicit stage composition:
// load -> select CO2 -> reshape -> clean -> score -> write.
use crate::clean::clean;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::indicators::{available_codes, select_co2, IndicatorSelection};
use crate::loader::{country_metadata, load_table};
use crate::output::{write_panel_csv, write_scored_csv};
use crate::reshape::reshape;
use crate::score::score;
use crate::types::{Panel, ScoredPanel, Table};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug)]
pub struct PipelineOutput {
    pub selection: IndicatorSelection,
    pub panel: Panel,
    pub scored: ScoredPanel,
}

/// Everything between the two loaded tables and the files on disk.
pub fn transform(raw: &Table, countries: &Table, config: &PipelineConfig) -> Result<PipelineOutput> {
    let selection = select_co2(&available_codes(raw)?)?;
    let meta = country_metadata(countries)?;
    let panel = reshape(raw, &selection, config.duplicates)?;
    let panel = clean(panel, &meta, config)?;
    let scored = score(panel.clone(), config.scaling)?;
    Ok(PipelineOutput {
        selection,
        panel,
        scored,
    })
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn tmp_path(path: &Path) -> PathBuf {
    sibling(path, ".tmp")
}

fn discard(path: &Path) {
    if path.exists() && std::fs::remove_file(path).is_err() {
        warn!("could not remove {}", path.display());
    }
}

/// Write both artifacts or neither: each goes to a temporary sibling first
/// and is renamed into place only once both writes succeeded.
pub fn write_outputs(output: &PipelineOutput, config: &PipelineConfig) -> Result<()> {
    std::fs::create_dir_all(&config.processed_dir)
        .map_err(|e| PipelineError::io(&config.processed_dir, e))?;

    let panel_path = config.panel_path();
    let scored_path = config.scored_path();
    let panel_tmp = tmp_path(&panel_path);
    let scored_tmp = tmp_path(&scored_path);

    let written = write_panel_csv(&panel_tmp, &output.panel)
        .and_then(|_| write_scored_csv(&scored_tmp, &output.scored));
    if let Err(e) = written {
        discard(&panel_tmp);
        discard(&scored_tmp);
        return Err(e);
    }

    // A previous panel is parked until the scored file is in place, so a
    // failed commit leaves the old pair untouched.
    let panel_backup = sibling(&panel_path, ".bak");
    let had_panel = panel_path.is_file();
    if had_panel {
        if let Err(e) = std::fs::rename(&panel_path, &panel_backup) {
            discard(&panel_tmp);
            discard(&scored_tmp);
            return Err(PipelineError::io(&panel_path, e));
        }
    }
    let restore_panel = || {
        discard(&panel_path);
        if had_panel && std::fs::rename(&panel_backup, &panel_path).is_err() {
            warn!("could not restore {}", panel_path.display());
        }
    };

    if let Err(e) = std::fs::rename(&panel_tmp, &panel_path) {
        restore_panel();
        discard(&panel_tmp);
        discard(&scored_tmp);
        return Err(PipelineError::io(&panel_path, e));
    }
    if let Err(e) = std::fs::rename(&scored_tmp, &scored_path) {
        restore_panel();
        discard(&scored_tmp);
        return Err(PipelineError::io(&scored_path, e));
    }
    if had_panel {
        discard(&panel_backup);
    }
    info!("wrote {}", panel_path.display());
    info!("wrote {}", scored_path.display());
    Ok(())
}

pub fn run(config: &PipelineConfig) -> Result<PipelineOutput> {
    let raw = load_table(&config.indicators_path)?;
    let countries = load_table(&config.countries_path)?;
    let output = transform(&raw, &countries, config)?;
    write_outputs(&output, config)?;
    Ok(output)
}
