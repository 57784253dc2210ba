//! `build` and `serve` commands.
//!
//! Both run the build orchestrator on a multi-threaded runtime. A one-shot
//! build ends when both pipelines have finished their pass. A live build
//! runs until Ctrl+C or the first fatal error.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam::channel::{self, Receiver};

use crate::build::{BuildMode, BuildOrchestrator};
use crate::config::ProjectConfig;
use crate::document::{DocumentSource, FsRepository};
use crate::render::select_typesetter;
use crate::{core, log};

/// Grace period for in-flight renders once the build returns.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Render every document once, or keep rendering when `live`.
pub fn run_build(config: ProjectConfig, live: bool) -> Result<()> {
    let config = Arc::new(config);
    let source: Arc<dyn DocumentSource> = Arc::new(FsRepository::new(Arc::clone(&config)));
    let typesetter = select_typesetter(&config);
    let orchestrator = BuildOrchestrator::new(config, source, typesetter);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create async runtime")?;

    let result = if live {
        let (shutdown_tx, shutdown_rx) = channel::bounded(1);
        core::register_shutdown(shutdown_tx);
        runtime.block_on(orchestrator.run(BuildMode::Live { serve: true }, wait_for_interrupt(shutdown_rx)))
    } else {
        // Ctrl+C ends a one-shot build with the process
        runtime.block_on(orchestrator.run(BuildMode::OneShot, std::future::pending()))
    };

    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result.context("error during build")?;

    if live {
        log!("build"; "stopped");
    } else {
        log!("build"; "done");
    }
    Ok(())
}

async fn wait_for_interrupt(shutdown_rx: Receiver<()>) {
    let _ = tokio::task::spawn_blocking(move || shutdown_rx.recv()).await;
}
