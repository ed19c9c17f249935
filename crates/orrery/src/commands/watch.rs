//! `orrery watch` command implementation.

use std::sync::Arc;

use clap::Args;
use orrery_config::Config;
use orrery_site::BuildOrchestrator;

use super::PipelineArgs;
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the watch command.
#[derive(Args)]
pub(crate) struct WatchArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Milliseconds between build cycles (overrides config).
    #[arg(long)]
    interval_ms: Option<u64>,
}

impl WatchArgs {
    /// Rebuild on a timer until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the runtime cannot start.
    /// Failed cycles are logged and do not end the session.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let config = self.pipeline.load_config(Some((true, self.interval_ms)))?;
        run_watch(&config, &output)
    }
}

/// Run watch mode for `config` on a fresh tokio runtime.
pub(crate) fn run_watch(config: &Config, output: &Output) -> Result<(), CliError> {
    let orchestrator = Arc::new(BuildOrchestrator::from_config(config));
    output.highlight(&format!(
        "Watching {} every {} ms (Ctrl-C to stop)",
        config.source_resolved.dir.display(),
        orchestrator.interval().as_millis()
    ));

    let rt = tokio::runtime::Runtime::new()?;
    let stats = rt.block_on(orchestrator.watch(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "cannot listen for Ctrl-C, watching until killed");
            std::future::pending::<()>().await;
        }
    }));

    output.info(&format!(
        "Stopped after {} cycle(s), {} failed, {} tick(s) skipped",
        stats.cycles, stats.failures, stats.skipped
    ));
    Ok(())
}
