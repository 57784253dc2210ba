//! Filesystem watcher for live mode.
//!
//! ```text
//! notify ──> bridge thread ──> Debouncer ──quiet 300ms──> changes.broadcast()
//! ```
//!
//! The watcher is registered before the first pass starts, so edits made
//! during the initial build are buffered and trigger a second pass.

mod debouncer;

use std::path::PathBuf;
use std::sync::Arc;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::reload::ReloadCoordinator;
use crate::utils::plural_count;
use crate::{debug, log};
use debouncer::Debouncer;

pub struct FsWatcher {
    notify_rx: std::sync::mpsc::Receiver<notify::Result<notify::Event>>,
    /// Dropping the watcher stops event delivery
    _watcher: RecommendedWatcher,
}

impl FsWatcher {
    /// Start watching `paths`. Missing paths are skipped; directories are
    /// watched recursively, files on their own.
    pub fn new(paths: &[PathBuf]) -> notify::Result<Self> {
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })?;

        for path in paths {
            if !path.exists() {
                debug!("watch"; "skipping missing {}", path.display());
                continue;
            }
            let mode = if path.is_dir() {
                RecursiveMode::Recursive
            } else {
                RecursiveMode::NonRecursive
            };
            watcher.watch(path, mode)?;
        }

        Ok(Self {
            notify_rx,
            _watcher: watcher,
        })
    }

    /// Fire `changes` once per debounced batch, until the watcher goes away.
    pub async fn run(self, changes: Arc<ReloadCoordinator>) {
        let notify_rx = self.notify_rx;
        let _watcher = self._watcher;
        let mut debouncer = Debouncer::new();

        let (async_tx, mut async_rx) = mpsc::channel::<notify::Event>(64);
        std::thread::spawn(move || {
            while let Ok(result) = notify_rx.recv() {
                match result {
                    Ok(event) => {
                        if async_tx.blocking_send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => log!("watch"; "notify error: {}", e),
                }
            }
        });

        loop {
            tokio::select! {
                biased;
                event = async_rx.recv() => match event {
                    Some(event) => debouncer.add_event(&event),
                    None => break,
                },
                _ = tokio::time::sleep(debouncer.sleep_duration()) => {
                    if let Some(batch) = debouncer.take_if_ready() {
                        log!("watch"; "{} changed, rebuilding", plural_count(batch.len(), "file"));
                        changes.broadcast();
                    }
                }
            }
        }
    }
}
