//! `orrery build` command implementation.

use clap::Args;
use orrery_site::BuildOrchestrator;

use super::PipelineArgs;
use super::watch::run_watch;
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the build command.
#[derive(Args)]
pub(crate) struct BuildArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

impl BuildArgs {
    /// Run one build cycle, or watch mode when the config enables it.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the cycle hits a
    /// batch-fatal error.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let config = self.pipeline.load_config(None)?;

        if config.watch.enabled {
            return run_watch(&config, &output);
        }

        output.info(&format!("Source: {}", config.source_resolved.dir.display()));
        output.info(&format!("Output: {}", config.output_resolved.dir.display()));

        let report = BuildOrchestrator::from_config(&config).run_once()?;
        output.report(&report);
        Ok(())
    }
}
