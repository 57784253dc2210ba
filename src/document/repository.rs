//! Filesystem document repository.
//!
//! Reads `<folder>/*.md`, where each file is a YAML frontmatter block
//! followed by the Markdown body:
//!
//! ```text
//! ---
//! name: Access Control Policy
//! acronym: ACP
//! documentOwner: CISO
//! satisfies:
//!   TSC: [CC6.1, CC6.2]
//! majorRevisions:
//!   - date: Jun 1 2024
//!     comment: Initial document
//! ---
//! # Purpose
//! ...
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;

use super::{DocumentKind, DocumentSource, RenderableDocument, Revision};
use crate::config::ProjectConfig;
use crate::freshness::get_mtime;

/// Frontmatter fields read from a source document.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Header {
    name: String,
    acronym: String,
    #[serde(rename = "documentOwner")]
    owner: String,
    satisfies: BTreeMap<String, Vec<String>>,
    #[serde(rename = "majorRevisions")]
    revisions: Vec<Revision>,
}

/// Documents stored as Markdown files under the project's source folders.
pub struct FsRepository {
    config: Arc<ProjectConfig>,
}

impl FsRepository {
    pub fn new(config: Arc<ProjectConfig>) -> Self {
        Self { config }
    }

    fn load(&self, kind: DocumentKind) -> Result<Vec<RenderableDocument>> {
        let folder = self.config.folder(kind.folder());
        list_markdown(&folder)?
            .into_iter()
            .map(|path| self.read_document(kind, &path))
            .collect()
    }

    fn read_document(&self, kind: DocumentKind, path: &Path) -> Result<RenderableDocument> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("unable to read {}", path.display()))?;
        let (frontmatter, body) = split_frontmatter(&content);

        let header: Header = match frontmatter {
            Some(yaml) if !yaml.trim().is_empty() => serde_yaml::from_str(yaml)
                .with_context(|| format!("malformed frontmatter in {}", path.display()))?,
            _ => Header::default(),
        };

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let name = if header.name.is_empty() { stem.clone() } else { header.name };
        let acronym = if header.acronym.is_empty() { stem } else { header.acronym };
        let output_filename = output_filename(self.config.project.file_prefix.as_deref(), &acronym);
        let modified_at = get_mtime(path)
            .with_context(|| format!("unable to read modification time of {}", path.display()))?;

        Ok(RenderableDocument {
            kind,
            name,
            acronym,
            owner: header.owner,
            satisfies: header.satisfies,
            revisions: header.revisions,
            full_path: path.to_path_buf(),
            output_filename,
            modified_at,
            body: body.to_string(),
        })
    }
}

impl DocumentSource for FsRepository {
    fn policies(&self) -> Result<Vec<RenderableDocument>> {
        self.load(DocumentKind::Policy)
    }

    fn narratives(&self) -> Result<Vec<RenderableDocument>> {
        self.load(DocumentKind::Narrative)
    }
}

/// Absolute paths of `*.md` files in `folder`, README files excluded,
/// sorted by filename.
fn list_markdown(folder: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(folder)
        .with_context(|| format!("unable to load files for: {}", folder.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();

        if !entry.file_type()?.is_file()
            || !name.ends_with(".md")
            || name.to_uppercase().starts_with("README")
        {
            continue;
        }
        files.push(crate::utils::path::normalize_path(&path));
    }

    files.sort();
    Ok(files)
}

/// Split a leading `---` fenced YAML block from the body.
fn split_frontmatter(content: &str) -> (Option<&str>, &str) {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let Some(rest) = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
    else {
        return (None, content);
    };

    // Closing fence at the very start of `rest` means empty frontmatter.
    if let Some(body) = rest.strip_prefix("---") {
        return (Some(""), trim_fence_newline(body));
    }

    match rest.find("\n---") {
        Some(end) => {
            let yaml = &rest[..end];
            let after = &rest[end + "\n---".len()..];
            (Some(yaml), trim_fence_newline(after))
        }
        None => (None, content),
    }
}

fn trim_fence_newline(s: &str) -> &str {
    s.strip_prefix("\r\n")
        .or_else(|| s.strip_prefix('\n'))
        .unwrap_or(s)
}

/// `<prefix>-<acronym>.pdf`, or `<acronym>.pdf` without a prefix.
fn output_filename(prefix: Option<&str>, acronym: &str) -> String {
    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}-{acronym}.pdf"),
        _ => format!("{acronym}.pdf"),
    }
}
