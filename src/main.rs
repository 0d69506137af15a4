mod cli;
mod engine;
mod logging;
mod model;
mod orchestrator;
mod storage;
mod text_summary;
#[cfg(feature = "tui")]
mod tui;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;

fn main() -> Result<()> {
    let args = cli::Cli::parse();

    // The local UTC offset can only be read while the process is single-threaded,
    // so resolve it before the log writer and the runtime spawn their threads.
    let clock = Arc::new(engine::SystemClock::local());
    let _logging_guard = logging::init(args.log_file.as_deref());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;

    match runtime.block_on(cli::run(args, clock)) {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "labbook failed");
            Err(e)
        }
    }
}
