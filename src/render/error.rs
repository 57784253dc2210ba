//! Render task errors.

use std::path::PathBuf;

use thiserror::Error;

/// Why a single document failed to render.
///
/// Failures stay local to their task: the dispatcher logs them and carries
/// on with the other documents.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("unable to write preprocessed document `{}`", path.display())]
    Preprocess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("error calling {program} ({status})\n{output}")]
    Invoke {
        program: String,
        status: String,
        output: String,
    },

    #[error("container {action} failed: {detail}")]
    Container { action: &'static str, detail: String },

    #[error("`{}` is outside the project root mounted into the container", path.display())]
    OutsideMount { path: PathBuf },

    #[error("output not generated: `{}`{}", path.display(), hint.map(|h| format!("; {h}")).unwrap_or_default())]
    MissingOutput {
        path: PathBuf,
        hint: Option<&'static str>,
    },

    #[error("unable to remove `{}`", path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
