//! Bounded-concurrency dispatch of render tasks.
//!
//! ```text
//! documents ──stale?──> JoinSet ──permit──> spawn_blocking(job.render)
//!                          │
//!                          └── join barrier: the pass ends when all tasks do
//! ```
//!
//! The semaphore outlives passes, so the limit holds across the whole
//! process even if passes were ever to overlap. A permit is an owned RAII
//! guard: it is released when the task ends, whether it succeeded, failed
//! or panicked.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::task::RenderJob;
use crate::document::RenderableDocument;
use crate::freshness::ModificationTracker;
use crate::log;
use crate::utils::path::display_relative;

/// Outcome of one pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassReport {
    /// Documents handed to a render task.
    pub dispatched: usize,
    /// Documents skipped as up to date.
    pub skipped: usize,
    pub rendered: usize,
    /// `(document label, error)` per failed task.
    pub failures: Vec<(String, String)>,
}

impl PassReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

enum TaskOutcome {
    Rendered,
    Failed(String, String),
}

/// Spawns render tasks, at most `limit` running at once.
pub struct Dispatcher {
    permits: Arc<Semaphore>,
    root: PathBuf,
}

impl Dispatcher {
    /// `root` is only used to shorten paths in log lines.
    pub fn new(limit: usize, root: PathBuf) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(limit)),
            root,
        }
    }

    /// Render every stale document and wait for all of them.
    ///
    /// Failures are logged at the task boundary and never cancel siblings.
    /// Only successful renders are recorded in `tracker`, so a failed
    /// document is retried on the next pass.
    pub async fn dispatch(
        &self,
        documents: Vec<RenderableDocument>,
        tracker: &Arc<ModificationTracker>,
        job: Arc<dyn RenderJob>,
    ) -> PassReport {
        let mut report = PassReport::default();
        let mut tasks = JoinSet::new();

        for doc in documents {
            if !tracker.is_stale(&doc.full_path, doc.modified_at) {
                report.skipped += 1;
                continue;
            }
            report.dispatched += 1;

            let permits = Arc::clone(&self.permits);
            let tracker = Arc::clone(tracker);
            let job = Arc::clone(&job);
            let root = self.root.clone();

            tasks.spawn(async move {
                // The semaphore is never closed
                let Ok(_permit) = permits.acquire_owned().await else {
                    return TaskOutcome::Failed(doc.label(), "dispatcher shut down".into());
                };

                let doc = Arc::new(doc);
                let rendering = Arc::clone(&doc);
                let result = tokio::task::spawn_blocking(move || job.render(&rendering)).await;

                match result {
                    Ok(Ok(artifact)) => {
                        tracker.record_rendered(&doc.full_path, doc.modified_at);
                        log!(
                            "pdf";
                            "{} -> {}",
                            display_relative(&doc.full_path, &root),
                            display_relative(&artifact, &root)
                        );
                        TaskOutcome::Rendered
                    }
                    Ok(Err(err)) => {
                        let message = format!("{:#}", anyhow::Error::from(err));
                        log!("error"; "Unable to generate a PDF for {} - {}", doc.label(), message);
                        TaskOutcome::Failed(doc.label(), message)
                    }
                    Err(join_err) => {
                        log!("error"; "render task for {} panicked: {}", doc.label(), join_err);
                        TaskOutcome::Failed(doc.label(), join_err.to_string())
                    }
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(TaskOutcome::Rendered) => report.rendered += 1,
                Ok(TaskOutcome::Failed(label, err)) => report.failures.push((label, err)),
                Err(join_err) => report.failures.push(("<task>".into(), join_err.to_string())),
            }
        }

        report
    }
}
