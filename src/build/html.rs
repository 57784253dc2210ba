//! HTML pipeline: the preview site.
//!
//! Every pass rewrites `index.html` and one `<acronym>.html` page per
//! document. Pages are cheap to produce, so this pipeline does not consult
//! the modification tracker.

use std::fs;
use std::path::{Component, Path};
use std::sync::Arc;

use anyhow::{Context, Result};
use minijinja::{Environment, Value, context};
use pulldown_cmark::{Options, Parser, html};
use serde::Serialize;

use super::BuildError;
use super::pipeline::{Pipeline, load_documents};
use crate::config::ProjectConfig;
use crate::document::{DocumentSource, RenderableDocument};
use crate::embed::site::{INDEX_HTML, PAGE_HTML};
use crate::log;
use crate::render::{PassReport, TemplateContext};

pub struct HtmlPipeline {
    config: Arc<ProjectConfig>,
    source: Arc<dyn DocumentSource>,
}

impl HtmlPipeline {
    pub fn new(config: Arc<ProjectConfig>, source: Arc<dyn DocumentSource>) -> Self {
        Self { config, source }
    }
}

impl Pipeline for HtmlPipeline {
    const NAME: &'static str = "html";

    async fn pass(&self) -> Result<PassReport, BuildError> {
        let (policies, narratives) = load_documents(Arc::clone(&self.source)).await?;
        let config = Arc::clone(&self.config);

        tokio::task::spawn_blocking(move || render_site(&config, &policies, &narratives))
            .await
            .map_err(|e| BuildError::stage("html rendering panicked", e))
    }
}

/// One row of the index, also the page data of a document.
#[derive(Debug, Serialize)]
struct SiteEntry {
    /// Source folder of the collection, used as the row class.
    kind: &'static str,
    page: String,
    name: String,
    acronym: String,
    owner: String,
    /// Link to the PDF, relative to the output root.
    pdf: String,
    pdf_name: String,
}

impl SiteEntry {
    fn new(doc: &RenderableDocument, pdf_folder: &Path) -> Self {
        Self {
            kind: doc.kind.folder(),
            page: page_filename(doc),
            name: doc.name.clone(),
            acronym: doc.acronym.clone(),
            owner: doc.owner.clone(),
            pdf: pdf_href(pdf_folder, &doc.output_filename),
            pdf_name: doc.output_filename.clone(),
        }
    }
}

#[derive(Serialize)]
struct Section {
    title: &'static str,
    entries: Vec<SiteEntry>,
}

fn render_site(
    config: &ProjectConfig,
    policies: &[RenderableDocument],
    narratives: &[RenderableDocument],
) -> PassReport {
    let mut report = PassReport::default();
    let env = site_environment();
    let ctx = TemplateContext::new(config.project.name.clone(), policies, narratives);
    let output = config.output_dir();
    let pdf_folder = &config.build.pdf_folder;

    for doc in policies.iter().chain(narratives) {
        report.dispatched += 1;
        let page = output.join(page_filename(doc));
        match write_page(&env, &ctx, doc, pdf_folder, &page) {
            Ok(()) => report.rendered += 1,
            Err(err) => {
                let message = format!("{err:#}");
                log!("error"; "Unable to generate a page for {} - {}", doc.label(), message);
                report.failures.push((doc.label(), message));
            }
        }
    }

    let sections = [
        Section {
            title: "Policies",
            entries: policies.iter().map(|d| SiteEntry::new(d, pdf_folder)).collect(),
        },
        Section {
            title: "Narratives",
            entries: narratives.iter().map(|d| SiteEntry::new(d, pdf_folder)).collect(),
        },
    ];
    if let Err(err) = write_index(&env, &ctx, &sections, output) {
        let message = format!("{err:#}");
        log!("error"; "Unable to generate the site index - {}", message);
        report.failures.push(("index".into(), message));
    }

    report
}

fn site_environment() -> Environment<'static> {
    let mut env = Environment::new();
    for (name, source) in [INDEX_HTML, PAGE_HTML] {
        if let Err(err) = env.add_template(name, source) {
            log!("error"; "embedded template {} is invalid: {}", name, err);
        }
    }
    env
}

fn write_index(env: &Environment<'_>, ctx: &TemplateContext, sections: &[Section], output: &Path) -> Result<()> {
    let html = env.get_template(INDEX_HTML.0)?.render(context! {
        name => &ctx.name,
        generated => &ctx.generated,
        sections => sections,
    })?;

    let path = output.join("index.html");
    fs::write(&path, html).with_context(|| format!("failed to write {}", path.display()))
}

fn write_page(
    env: &Environment<'_>,
    ctx: &TemplateContext,
    doc: &RenderableDocument,
    pdf_folder: &Path,
    path: &Path,
) -> Result<()> {
    let (body, warning) = ctx.render_body(doc, "");
    if let Some(warning) = warning {
        log!("warning"; "{}: {}", doc.label(), warning);
    }

    let html = env.get_template(PAGE_HTML.0)?.render(context! {
        name => &ctx.name,
        entry => SiteEntry::new(doc, pdf_folder),
        content => Value::from_safe_string(markdown_to_html(&body)),
    })?;

    fs::write(path, html).with_context(|| format!("failed to write {}", path.display()))
}

fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, Parser::new_ext(markdown, options));
    out
}

/// `<acronym>.html`, or the source file stem for documents without one.
fn page_filename(doc: &RenderableDocument) -> String {
    let stem = if doc.acronym.is_empty() {
        doc.full_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| doc.name.clone())
    } else {
        doc.acronym.clone()
    };
    format!("{stem}.html")
}

/// URL path of an artifact, always `/`-separated.
fn pdf_href(pdf_folder: &Path, filename: &str) -> String {
    let mut parts: Vec<_> = pdf_folder
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    parts.push(filename.to_string());
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config_at;
    use crate::document::test_document;
    use std::path::PathBuf;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn doc(acronym: &str, body: &str) -> RenderableDocument {
        let mut doc = test_document(acronym, PathBuf::from(format!("/p/{acronym}.md")), SystemTime::now());
        doc.body = body.to_string();
        doc
    }

    #[test]
    fn test_pdf_href() {
        assert_eq!(pdf_href(Path::new(""), "ACP.pdf"), "ACP.pdf");
        assert_eq!(pdf_href(Path::new("pdf/2024"), "ACP.pdf"), "pdf/2024/ACP.pdf");
    }

    #[test]
    fn test_page_filename_falls_back_to_stem() {
        assert_eq!(page_filename(&doc("ACP", "")), "ACP.html");

        let mut doc = doc("X", "");
        doc.acronym.clear();
        doc.full_path = PathBuf::from("/p/vendor-policy.md");
        assert_eq!(page_filename(&doc), "vendor-policy.html");
    }

    #[test]
    fn test_markdown_tables() {
        let html = markdown_to_html("A|B\n---|---\n1|2\n");
        assert!(html.contains("<table>"));
        assert!(html.contains("<td>2</td>"));
    }

    #[test]
    fn test_render_site_writes_index_and_pages() {
        let dir = TempDir::new().unwrap();
        let config = test_config_at(dir.path(), "[project]\nname = \"Acme & Co\"\n[build]\npdf_folder = \"pdf\"");
        fs::create_dir_all(config.output_dir()).unwrap();

        let policies = vec![doc("ACP", "# Access\n\nFor {{ name }}.\n")];
        let narratives = vec![doc("SYS", "# System\n")];

        let report = render_site(&config, &policies, &narratives);
        assert_eq!(report.rendered, 2);
        assert!(report.is_success());

        let index = fs::read_to_string(config.output_dir().join("index.html")).unwrap();
        assert!(index.contains("href=\"ACP.html\""));
        // minijinja escapes `/` inside attributes as an entity
        assert!(index.contains("SYS.pdf\">SYS.pdf</a>"));
        // auto-escaped
        assert!(index.contains("Acme &amp; Co Compliance"));

        let page = fs::read_to_string(config.output_dir().join("ACP.html")).unwrap();
        assert!(page.contains("<h1>Access</h1>"));
        assert!(page.contains("For Acme &amp; Co."));
    }

    #[test]
    fn test_render_site_reports_unwritable_output() {
        let dir = TempDir::new().unwrap();
        // output directory never created
        let config = test_config_at(dir.path(), "[build]\noutput = \"missing/out\"");

        let report = render_site(&config, &[doc("ACP", "")], &[]);
        assert_eq!(report.rendered, 0);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[1].0, "index");
    }
}
