//! Documents to render and the seam that supplies them.
//!
//! The pipelines only read documents. They ask a [`DocumentSource`] for the
//! ordered policy and narrative collections at the start of every pass and
//! hold each document behind an `Arc` for the lifetime of one render task.

mod repository;

pub use repository::FsRepository;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::SystemTime;

use anyhow::Result;
use serde::Deserialize;

/// Which collection a document belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Policy,
    Narrative,
}

impl DocumentKind {
    /// Default source folder name.
    pub const fn folder(self) -> &'static str {
        match self {
            Self::Policy => "policies",
            Self::Narrative => "narratives",
        }
    }
}

/// One entry of a document's revision history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Revision {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub comment: String,
}

/// A source document ready for rendering.
#[derive(Debug, Clone)]
pub struct RenderableDocument {
    pub kind: DocumentKind,
    pub name: String,
    pub acronym: String,
    /// Empty when the document names no owner.
    pub owner: String,
    /// Standard -> criteria keys this document satisfies.
    pub satisfies: BTreeMap<String, Vec<String>>,
    pub revisions: Vec<Revision>,
    /// Absolute source path; the identity used for staleness tracking.
    pub full_path: PathBuf,
    /// Artifact filename, e.g. `Acme-POL-1.pdf`.
    pub output_filename: String,
    pub modified_at: SystemTime,
    /// Template source of the body.
    pub body: String,
}

impl RenderableDocument {
    /// `Name (ACRONYM)` for diagnostics.
    pub fn label(&self) -> String {
        if self.acronym.is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, self.acronym)
        }
    }
}

/// Supplier of the ordered document collections.
pub trait DocumentSource: Send + Sync {
    fn policies(&self) -> Result<Vec<RenderableDocument>>;
    fn narratives(&self) -> Result<Vec<RenderableDocument>>;
}

/// Build a document with sensible defaults, for tests across modules.
#[cfg(test)]
pub fn test_document(acronym: &str, full_path: PathBuf, modified_at: SystemTime) -> RenderableDocument {
    RenderableDocument {
        kind: DocumentKind::Policy,
        name: format!("{acronym} Policy"),
        acronym: acronym.to_string(),
        owner: String::new(),
        satisfies: BTreeMap::new(),
        revisions: Vec::new(),
        full_path,
        output_filename: format!("{acronym}.pdf"),
        modified_at,
        body: format!("# {acronym}\n\nBody of {acronym}.\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label() {
        let mut doc = test_document("POL-1", PathBuf::from("/p/a.md"), SystemTime::UNIX_EPOCH);
        assert_eq!(doc.label(), "POL-1 Policy (POL-1)");
        doc.acronym.clear();
        assert_eq!(doc.label(), "POL-1 Policy");
    }

    #[test]
    fn test_kind_folders() {
        assert_eq!(DocumentKind::Policy.folder(), "policies");
        assert_eq!(DocumentKind::Narrative.folder(), "narratives");
    }
}
