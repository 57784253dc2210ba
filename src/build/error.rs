//! Build errors surfaced to the CLI.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    /// A stage that stops the whole build, e.g. loading documents.
    #[error("{stage}")]
    Stage {
        stage: String,
        #[source]
        source: anyhow::Error,
    },

    /// Every document was attempted, some failed.
    #[error("{failed} of {total} {pipeline} documents failed to render")]
    DocumentsFailed {
        pipeline: &'static str,
        failed: usize,
        total: usize,
    },
}

impl BuildError {
    pub fn stage(stage: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Stage {
            stage: stage.into(),
            source: source.into(),
        }
    }
}
