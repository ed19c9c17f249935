//! CLI command implementations.

pub(crate) mod build;
pub(crate) mod watch;

use std::path::{Path, PathBuf};

use clap::Args;
use orrery_config::{CliSettings, Config};

pub(crate) use build::BuildArgs;
pub(crate) use watch::WatchArgs;

use crate::error::CliError;

/// Options shared by every command that runs the pipeline.
#[derive(Args)]
pub(crate) struct PipelineArgs {
    /// Path to configuration file (default: auto-discover orrery.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Source document directory (overrides config).
    #[arg(short, long)]
    source_dir: Option<PathBuf>,

    /// Site output directory (overrides config).
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Rebuild every document regardless of the hash ledger.
    #[arg(long)]
    no_incremental: bool,

    /// Enable verbose output (info-level logs).
    #[arg(short, long)]
    pub verbose: bool,
}

impl PipelineArgs {
    /// Load configuration with these arguments applied on top.
    fn load_config(&self, watch: Option<(bool, Option<u64>)>) -> Result<Config, CliError> {
        let (watch_enabled, watch_interval_ms) = match watch {
            Some((enabled, interval)) => (Some(enabled), interval),
            None => (None, None),
        };
        let cli_settings = CliSettings {
            source_dir: self.source_dir.clone(),
            output_dir: self.output_dir.clone(),
            incremental: self.no_incremental.then_some(false),
            watch_enabled,
            watch_interval_ms,
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        ensure_project_dir(&config.project_dir)?;
        Ok(config)
    }
}

/// Ensure the `.orrery/` project directory exists with a `.gitignore`.
pub(crate) fn ensure_project_dir(project_dir: &Path) -> Result<(), CliError> {
    std::fs::create_dir_all(project_dir)?;

    let gitignore_path = project_dir.join(".gitignore");
    if !gitignore_path.exists() {
        let _ = std::fs::write(&gitignore_path, "# Automatically created by orrery\n*\n");
    }

    Ok(())
}
