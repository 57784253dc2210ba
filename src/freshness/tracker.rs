//! Per-path record of the last successfully rendered source mtime.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// Last rendered timestamp per source path.
///
/// Shared by every render task of a pipeline behind an `Arc`. Entries are
/// never evicted, and a path's timestamp never moves backwards.
#[derive(Debug, Default)]
pub struct ModificationTracker {
    rendered: Mutex<FxHashMap<PathBuf, SystemTime>>,
}

impl ModificationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when `path` was never rendered, or `modified` is strictly
    /// after the recorded timestamp.
    pub fn is_stale(&self, path: &Path, modified: SystemTime) -> bool {
        match self.rendered.lock().get(path) {
            Some(&recorded) => modified > recorded,
            None => true,
        }
    }

    /// Record a successful render of `path` at source time `modified`.
    ///
    /// Keeps the later of the existing and the new timestamp.
    pub fn record_rendered(&self, path: &Path, modified: SystemTime) {
        let mut rendered = self.rendered.lock();
        match rendered.get_mut(path) {
            Some(recorded) if *recorded >= modified => {}
            Some(recorded) => *recorded = modified,
            None => {
                rendered.insert(path.to_path_buf(), modified);
            }
        }
    }

    /// Number of paths rendered at least once.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.rendered.lock().len()
    }
}
