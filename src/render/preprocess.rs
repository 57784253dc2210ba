//! Turn a document into the Markdown file handed to the typesetter.
//!
//! The scratch file is a YAML metadata block followed by the expanded
//! body. The LaTeX template reads the metadata for the title page,
//! running header and footer:
//!
//! ```text
//! ---
//! title: Access Control Policy
//! author: Acme
//! date: June 2024
//! header-includes: true
//! head-content: Access Control Policy
//! foot-content: Access Control Policy confidential 2024
//! include-before: [criteria table, history table, owner line]
//! ...
//! ---
//! # Purpose
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;

use super::RenderError;
use super::context::TemplateContext;
use crate::document::RenderableDocument;

/// Metadata block consumed by the LaTeX template.
#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct DocumentMetadata {
    pub title: String,
    pub author: String,
    pub date: String,
    pub header_includes: bool,
    pub head_content: String,
    pub foot_content: String,
    pub lof: bool,
    pub tables: bool,
    pub include_before: Vec<String>,
}

impl DocumentMetadata {
    pub fn new(doc: &RenderableDocument, author: &str, year: i32) -> Self {
        let date = DateTime::<Local>::from(doc.modified_at).format("%B %Y").to_string();

        Self {
            title: doc.name.clone(),
            author: author.to_string(),
            date,
            header_includes: true,
            head_content: doc.name.clone(),
            foot_content: format!("{} confidential {}", doc.name, year),
            lof: false,
            tables: true,
            include_before: include_before(doc),
        }
    }
}

/// Criteria table, revision history and owner line shown above the body.
fn include_before(doc: &RenderableDocument) -> Vec<String> {
    let mut snippets = Vec::new();

    if !doc.satisfies.is_empty() {
        // BTreeMap iteration keeps standards sorted
        let rows: Vec<_> = doc
            .satisfies
            .iter()
            .map(|(standard, criteria)| (standard.clone(), criteria.join(", ")))
            .collect();
        snippets.push(table(
            "Criteria satisfaction",
            ("Standard", "Criteria Satisfied"),
            &rows,
        ));
    }

    if !doc.revisions.is_empty() {
        let rows: Vec<_> = doc
            .revisions
            .iter()
            .map(|rev| (rev.date.clone(), rev.comment.clone()))
            .collect();
        snippets.push(table("Document history", ("Date", "Comment"), &rows));
    }

    if !doc.owner.is_empty() {
        snippets.push(format!("Policy Owner: {}\n\n", doc.owner));
    }

    snippets
}

/// Two-column pipe table with a caption.
pub fn table(caption: &str, header: (&str, &str), rows: &[(String, String)]) -> String {
    let mut out = format!("{}|{}\n---|:-----\n", header.0, header.1);
    for (left, right) in rows {
        out.push_str(&format!("{left}|{right}\n"));
    }
    out.push_str(&format!("\n: {caption}\n\n"));
    out
}

/// Scratch file for an artifact: `<artifact>.md`.
pub fn scratch_path(artifact: &Path) -> PathBuf {
    let mut name = artifact.as_os_str().to_owned();
    name.push(".md");
    PathBuf::from(name)
}

/// Write the preprocessed document to `scratch`.
///
/// Returns the template warning, if the body failed to expand.
pub fn write_scratch(
    ctx: &TemplateContext,
    doc: &RenderableDocument,
    approved: &str,
    scratch: &Path,
) -> Result<Option<String>, RenderError> {
    let (body, warning) = ctx.render_body(doc, approved);
    let metadata = DocumentMetadata::new(doc, &ctx.name, ctx.year);

    let yaml = serde_yaml::to_string(&metadata).map_err(|err| RenderError::Preprocess {
        path: scratch.to_path_buf(),
        source: std::io::Error::other(err),
    })?;
    let content = format!("---\n{yaml}---\n{body}");

    let write = || -> std::io::Result<()> {
        if let Some(parent) = scratch.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(scratch, content)
    };
    write().map_err(|source| RenderError::Preprocess {
        path: scratch.to_path_buf(),
        source,
    })?;

    Ok(warning)
}
