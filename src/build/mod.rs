//! Build orchestration.
//!
//! ```text
//! prepare output ──> [watcher, ws server, preview server] ──┬─> pdf pipeline ──┐
//!                     (live mode only)                      └─> html pipeline ─┴─> first error / done
//! ```
//!
//! Both pipelines run as tasks on the runtime. A supervisor task joins them
//! and signals completion; the orchestrator races completion against the
//! shared error channel and returns the first error either pipeline reports.
//! In-flight render tasks of a failed pipeline are not cancelled.
//!
//! # Modules
//!
//! - `pipeline` - the pass loop shared by both outputs
//! - `pdf` - PDF artifacts through the typesetter
//! - `html` - preview site pages

mod error;
mod html;
mod pdf;
mod pipeline;

#[cfg(test)]
mod tests;

pub use error::BuildError;

use std::fs;
use std::future::Future;
use std::io::ErrorKind;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;

use crate::config::ProjectConfig;
use crate::document::DocumentSource;
use crate::reload::server::WsServer;
use crate::render::Typesetter;
use crate::serve;
use crate::utils::path::display_relative;
use crate::watch::FsWatcher;
use crate::{debug, log};
use html::HtmlPipeline;
use pdf::PdfPipeline;
use pipeline::{LiveSignals, Pipeline, run_pipeline};

/// How long the build runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    /// One pass per pipeline.
    OneShot,
    /// Rebuild on every source change until interrupted. With `serve`, the
    /// preview and live-reload servers run alongside.
    Live { serve: bool },
}

pub struct BuildOrchestrator {
    config: Arc<ProjectConfig>,
    source: Arc<dyn DocumentSource>,
    typesetter: Arc<dyn Typesetter>,
}

impl BuildOrchestrator {
    pub fn new(
        config: Arc<ProjectConfig>,
        source: Arc<dyn DocumentSource>,
        typesetter: Arc<dyn Typesetter>,
    ) -> Self {
        Self {
            config,
            source,
            typesetter,
        }
    }

    /// Run the build until both pipelines finish, one of them fails, or
    /// `shutdown` resolves.
    pub async fn run(self, mode: BuildMode, shutdown: impl Future<Output = ()>) -> Result<(), BuildError> {
        prepare_output(&self.config)?;
        log!(
            "build";
            "rendering into {} with {}",
            display_relative(self.config.output_dir(), self.config.root()),
            self.typesetter.name()
        );

        let live = match mode {
            BuildMode::OneShot => None,
            BuildMode::Live { serve } => Some(self.start_live_surfaces(serve)?),
        };

        // One slot per pipeline: a failing pipeline never blocks on send
        let (errors_tx, mut errors_rx) = mpsc::channel::<BuildError>(2);
        let mut pipelines = JoinSet::new();

        let pdf = PdfPipeline::new(
            Arc::clone(&self.config),
            Arc::clone(&self.source),
            Arc::clone(&self.typesetter),
        );
        let html = HtmlPipeline::new(Arc::clone(&self.config), Arc::clone(&self.source));
        spawn_pipeline(&mut pipelines, pdf, live.clone(), errors_tx.clone());
        spawn_pipeline(&mut pipelines, html, live, errors_tx.clone());

        let (done_tx, done_rx) = oneshot::channel();
        tokio::spawn(async move {
            while let Some(joined) = pipelines.join_next().await {
                if let Err(e) = joined {
                    let _ = errors_tx.send(BuildError::stage("pipeline task panicked", e)).await;
                }
            }
            let _ = done_tx.send(());
        });

        tokio::pin!(shutdown);
        tokio::select! {
            biased;
            Some(err) = errors_rx.recv() => Err(err),
            _ = done_rx => match errors_rx.try_recv() {
                Ok(err) => Err(err),
                Err(_) => Ok(()),
            },
            () = &mut shutdown => {
                debug!("build"; "shutdown requested");
                Ok(())
            }
        }
    }

    /// Watcher, plus the preview and WebSocket servers when serving.
    fn start_live_surfaces(&self, serve: bool) -> Result<LiveSignals, BuildError> {
        let signals = LiveSignals::default();

        let watcher = FsWatcher::new(&self.config.watch_paths())
            .map_err(|e| BuildError::stage("unable to watch sources", e))?;
        tokio::spawn(watcher.run(Arc::clone(&signals.changes)));
        log!("watch"; "watching for changes");

        if serve {
            let ws = WsServer::start(self.config.serve.interface, self.config.serve.ws_port)
                .map_err(|e| BuildError::stage("unable to start live reload server", e))?;
            tokio::spawn(Arc::clone(&ws).forward_passes(Arc::clone(&signals.passes)));

            serve::start(&self.config, ws.port())
                .map_err(|e| BuildError::stage("unable to start preview server", e))?;
        }

        Ok(signals)
    }
}

fn spawn_pipeline<P: Pipeline>(
    set: &mut JoinSet<()>,
    pipeline: P,
    live: Option<LiveSignals>,
    errors: mpsc::Sender<BuildError>,
) {
    set.spawn(async move {
        if let Err(err) = run_pipeline(pipeline, live).await {
            debug!("build"; "{} pipeline stopped: {}", P::NAME, err);
            let _ = errors.send(err).await;
        }
    });
}

/// Start from an empty output directory.
fn prepare_output(config: &ProjectConfig) -> Result<(), BuildError> {
    match fs::remove_dir_all(config.output_dir()) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(BuildError::stage("unable to remove files from output directory", e)),
    }

    fs::create_dir_all(config.pdf_dir()).map_err(|e| BuildError::stage("unable to create output directory", e))
}
