//! The render loop shared by the PDF and HTML pipelines.
//!
//! ```text
//! one-shot:  pass ──> done
//! live:      subscribe ──> pass ──> notify browsers ──> wait ──┐
//!                ^─────────────────────────────────────────────┘
//! ```
//!
//! The change signal is subscribed before the pass starts, so an edit
//! made while documents are rendering triggers another pass instead of
//! being lost.

use std::future::Future;
use std::sync::Arc;

use super::BuildError;
use crate::document::{DocumentSource, RenderableDocument};
use crate::logger::{status_error, status_success};
use crate::reload::ReloadCoordinator;
use crate::render::PassReport;
use crate::utils::plural_count;

/// Signals connecting the pipelines to the live mode surfaces.
#[derive(Debug, Clone, Default)]
pub struct LiveSignals {
    /// Fired by the watcher when sources change.
    pub changes: Arc<ReloadCoordinator>,
    /// Fired by the pipelines after every live pass.
    pub passes: Arc<ReloadCoordinator>,
}

/// One kind of output, rendered a full pass at a time.
pub trait Pipeline: Send + Sync + 'static {
    /// Short name used in logs and errors.
    const NAME: &'static str;

    fn pass(&self) -> impl Future<Output = Result<PassReport, BuildError>> + Send;
}

/// Run `pipeline` once, or forever in live mode.
///
/// Load errors end the loop in both modes. Document failures end a one-shot
/// build with [`BuildError::DocumentsFailed`] after the whole pass; in live
/// mode they are reported and the loop continues.
pub async fn run_pipeline<P: Pipeline>(pipeline: P, live: Option<LiveSignals>) -> Result<(), BuildError> {
    loop {
        let next_change = live.as_ref().map(|signals| signals.changes.subscribe());

        let report = pipeline.pass().await?;

        let Some(signals) = &live else {
            return one_shot_result(P::NAME, &report);
        };

        report_live_pass(P::NAME, &report);
        signals.passes.broadcast();

        if let Some(signal) = next_change {
            signal.wait().await;
        }
    }
}

fn one_shot_result(name: &'static str, report: &PassReport) -> Result<(), BuildError> {
    if report.is_success() {
        Ok(())
    } else {
        Err(BuildError::DocumentsFailed {
            pipeline: name,
            failed: report.failures.len(),
            total: report.dispatched,
        })
    }
}

fn report_live_pass(name: &str, report: &PassReport) {
    if report.is_success() {
        status_success(&format!(
            "{name}: {} rendered, {} up to date",
            plural_count(report.rendered, "document"),
            report.skipped
        ));
    } else {
        let detail: Vec<_> = report
            .failures
            .iter()
            .map(|(label, _)| format!("  {label}"))
            .collect();
        status_error(
            &format!("{name}: {} failed", plural_count(report.failures.len(), "document")),
            &detail.join("\n"),
        );
    }
}

/// Read both collections off the async runtime.
pub async fn load_documents(
    source: Arc<dyn DocumentSource>,
) -> Result<(Vec<RenderableDocument>, Vec<RenderableDocument>), BuildError> {
    tokio::task::spawn_blocking(move || {
        let policies = source
            .policies()
            .map_err(|e| BuildError::stage("unable to read policies", e))?;
        let narratives = source
            .narratives()
            .map_err(|e| BuildError::stage("unable to read narratives", e))?;
        Ok((policies, narratives))
    })
    .await
    .map_err(|e| BuildError::stage("document loading panicked", e))?
}
