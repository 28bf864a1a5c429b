// Entry point: one batch pass over the WDI export.
//
// - builds the cleaned panel and the SKV_v0 scores,
// - writes both CSVs under data/processed,
// - derives the summary tables under reports/tables and previews the league.
use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use wdi_skv::output::preview_table_rows;
use wdi_skv::util::{format_int, format_number};
use wdi_skv::{pipeline, reports, PipelineConfig};

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let config = PipelineConfig::default();

    let output = pipeline::run(&config).context("building the SKV panel")?;
    info!(
        "CO2 indicator {} used as {}",
        output.selection.co2.code,
        output.selection.co2_field().column_name()
    );
    println!(
        "Processing dataset... ({} country-years kept, {} scored)",
        format_int(output.panel.rows.len()),
        format_int(output.scored.rows.iter().filter(|r| r.skv.is_some()).count())
    );
    println!(" - {}", config.panel_path().display());
    println!(" - {}\n", config.scored_path().display());

    let set = reports::run_reports(&config).context("generating report tables")?;

    println!("Top {} by SKV_v0 ({}-)\n", config.report.league_size, config.report.recent_from);
    preview_table_rows(&set.top, config.report.league_size);
    println!("Bottom {} by SKV_v0\n", config.report.league_size);
    preview_table_rows(&set.bottom, config.report.league_size);
    println!("Positive deviants within income group\n");
    preview_table_rows(&set.deviants, 5);

    if let Some(m) = set.summary.mean_skv {
        println!("Mean SKV_v0: {}", format_number(m, 4));
    }
    println!("({} tables exported to {})", set.files.len(), config.tables_dir.display());
    Ok(())
}
