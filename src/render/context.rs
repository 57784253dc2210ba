//! Template data shared by every render task of a pass.
//!
//! Document bodies are minijinja templates. They see the project-wide
//! values below plus the document being rendered:
//!
//! ```text
//! {{ name }}, {{ project }}  organization name
//! {{ year }}                 current year
//! {{ policies }}             [{ name, acronym, owner }, ...]
//! {{ document.acronym }}     the document being rendered
//! {{ approved }}             last commit date on the approved branch
//! ```
//!
//! Blocks use `{% %}` and comments use `{* *}`. The default `{# #}` comment
//! syntax would swallow pandoc attributes such as `# Scope {#scope}`.

use chrono::{Datelike, Local};
use minijinja::Environment;
use minijinja::syntax::SyntaxConfig;
use serde::Serialize;

use crate::document::RenderableDocument;

/// Summary of one document, as templates see it.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentRef {
    pub name: String,
    pub acronym: String,
    pub owner: String,
}

impl From<&RenderableDocument> for DocumentRef {
    fn from(doc: &RenderableDocument) -> Self {
        Self {
            name: doc.name.clone(),
            acronym: doc.acronym.clone(),
            owner: doc.owner.clone(),
        }
    }
}

/// Read-only values shared by all tasks of one pass.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateContext {
    /// Organization name.
    pub name: String,
    /// Same as `name`, for templates written against `project`.
    pub project: String,
    pub year: i32,
    /// Date of this pass, e.g. `June 2024`.
    pub generated: String,
    pub policies: Vec<DocumentRef>,
    pub narratives: Vec<DocumentRef>,
}

impl TemplateContext {
    pub fn new(
        name: impl Into<String>,
        policies: &[RenderableDocument],
        narratives: &[RenderableDocument],
    ) -> Self {
        let now = Local::now();
        let name = name.into();
        Self {
            project: name.clone(),
            name,
            year: now.year(),
            generated: now.format("%B %Y").to_string(),
            policies: policies.iter().map(DocumentRef::from).collect(),
            narratives: narratives.iter().map(DocumentRef::from).collect(),
        }
    }

    /// Expand the document body as a template.
    ///
    /// A broken template does not fail the document: the body becomes an
    /// inline error notice and the message is returned as a warning.
    pub fn render_body(&self, doc: &RenderableDocument, approved: &str) -> (String, Option<String>) {
        let data = DocumentData {
            global: self,
            document: DocumentRef::from(doc),
            approved,
        };

        let rendered = body_environment().and_then(|env| {
            env.template_from_str(&doc.body)
                .and_then(|template| template.render(&data))
        });

        match rendered {
            Ok(body) => (body, None),
            Err(err) => {
                let msg = err.to_string();
                (format!("# Error processing template:\n\n{msg}\n"), Some(msg))
            }
        }
    }
}

fn body_environment() -> Result<Environment<'static>, minijinja::Error> {
    let mut env = Environment::new();
    env.set_keep_trailing_newline(true);
    env.set_syntax(
        SyntaxConfig::builder()
            .block_delimiters("{%", "%}")
            .variable_delimiters("{{", "}}")
            .comment_delimiters("{*", "*}")
            .build()?,
    );
    Ok(env)
}

#[derive(Serialize)]
struct DocumentData<'a> {
    #[serde(flatten)]
    global: &'a TemplateContext,
    document: DocumentRef,
    approved: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::test_document;
    use std::path::PathBuf;
    use std::time::SystemTime;

    fn doc(acronym: &str, body: &str) -> RenderableDocument {
        let mut doc = test_document(acronym, PathBuf::from("/p/x.md"), SystemTime::UNIX_EPOCH);
        doc.body = body.to_string();
        doc
    }

    #[test]
    fn test_render_body_substitutes_values() {
        let policies = vec![doc("ACP", ""), doc("BCP", "")];
        let ctx = TemplateContext::new("Acme", &policies, &[]);

        let target = doc("ACP", "{{ project }} / {{ document.acronym }} / {{ approved }} / {{ policies|length }}");
        let (body, warning) = ctx.render_body(&target, "Jun 01 2024");
        assert_eq!(body, "Acme / ACP / Jun 01 2024 / 2");
        assert!(warning.is_none());
    }

    #[test]
    fn test_render_body_loops_over_documents() {
        let policies = vec![doc("ACP", ""), doc("BCP", "")];
        let ctx = TemplateContext::new("Acme", &policies, &[]);

        let target = doc("IDX", "{% for p in policies %}{{ p.acronym }};{% endfor %}");
        assert_eq!(ctx.render_body(&target, "").0, "ACP;BCP;");
    }

    #[test]
    fn test_render_body_error_becomes_inline_notice() {
        let ctx = TemplateContext::new("Acme", &[], &[]);
        let (body, warning) = ctx.render_body(&doc("ACP", "{% if %}"), "");

        assert!(body.starts_with("# Error processing template:\n\n"));
        assert!(warning.is_some());
    }

    #[test]
    fn test_pandoc_attributes_are_not_template_syntax() {
        let ctx = TemplateContext::new("Acme", &[], &[]);
        let (body, warning) = ctx.render_body(&doc("ACP", "# Scope {#scope}\n{* draft *}{{ name }}"), "");

        assert!(warning.is_none(), "unexpected warning: {warning:?}");
        assert_eq!(body, "# Scope {#scope}\nAcme");
    }

    #[test]
    fn test_plain_markdown_passes_through() {
        let ctx = TemplateContext::new("Acme", &[], &[]);
        let (body, _) = ctx.render_body(&doc("ACP", "# Title\n\n- item\n"), "");
        assert_eq!(body, "# Title\n\n- item\n");
    }
}
