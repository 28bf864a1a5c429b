// World Development Indicators -> country-year panel -> SKV composite score.
pub mod clean;
pub mod config;
pub mod error;
pub mod indicators;
pub mod loader;
pub mod output;
pub mod pipeline;
pub mod reports;
pub mod reshape;
pub mod score;
pub mod types;
pub mod util;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
