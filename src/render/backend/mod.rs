//! Typesetting backends.
//!
//! A backend turns one preprocessed Markdown file into one PDF. Two
//! implementations share the pandoc argument list:
//!
//! - [`LocalPandoc`] runs the executable found on `PATH`
//! - [`ContainerPandoc`] runs the same arguments in a short-lived container

mod container;
mod local;

pub use container::ContainerPandoc;
pub use local::LocalPandoc;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::RenderError;
use super::context::TemplateContext;
use super::preprocess;
use crate::config::{BackendKind, ProjectConfig};
use crate::debug;
use crate::document::RenderableDocument;

/// Paths of a single typesetter run.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    /// Preprocessed Markdown input.
    pub input: &'a Path,
    /// PDF artifact to produce.
    pub output: &'a Path,
    /// Project root; the working directory of the run.
    pub root: &'a Path,
}

/// Capability to render one document into one artifact.
pub trait Typesetter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Write the scratch Markdown file for `doc`.
    ///
    /// Returns a template warning when the body failed to expand.
    fn preprocess(
        &self,
        ctx: &TemplateContext,
        doc: &RenderableDocument,
        approved: &str,
        scratch: &Path,
    ) -> Result<Option<String>, RenderError> {
        preprocess::write_scratch(ctx, doc, approved, scratch)
    }

    /// Run the typesetter to completion.
    fn invoke(&self, invocation: &Invocation<'_>) -> Result<(), RenderError>;

    /// Check that the run actually produced its artifact.
    fn verify_output(&self, invocation: &Invocation<'_>) -> Result<(), RenderError> {
        if invocation.output.is_file() {
            Ok(())
        } else {
            Err(RenderError::MissingOutput {
                path: invocation.output.to_path_buf(),
                hint: None,
            })
        }
    }
}

/// Settings shared by both backends.
#[derive(Debug, Clone)]
pub struct PandocOptions {
    pub pdf_engine: String,
    /// LaTeX template, absolute.
    pub template: PathBuf,
}

impl PandocOptions {
    /// Argument list for one run, with paths as the typesetter sees them.
    pub fn args(&self, template: &str, output: &str, input: &str) -> Vec<String> {
        vec![
            "-f".into(),
            "markdown+smart".into(),
            "--toc".into(),
            "-N".into(),
            "--fail-if-warnings".into(),
            format!("--pdf-engine={}", self.pdf_engine),
            "--template".into(),
            template.into(),
            "-o".into(),
            output.into(),
            input.into(),
        ]
    }
}

/// Pick the backend for this configuration.
///
/// `auto` prefers a local executable and falls back to the container.
pub fn select_typesetter(config: &ProjectConfig) -> Arc<dyn Typesetter> {
    let build = &config.build;
    let options = PandocOptions {
        pdf_engine: build.pdf_engine.clone(),
        template: build.template.clone(),
    };

    let local = match build.backend {
        BackendKind::Local => true,
        BackendKind::Container => false,
        BackendKind::Auto => {
            let found = which::which(&build.pandoc).is_ok();
            debug!("pdf"; "`{}` {}on PATH", build.pandoc, if found { "" } else { "not " });
            found
        }
    };

    if local {
        Arc::new(LocalPandoc::new(&build.pandoc, options))
    } else {
        Arc::new(ContainerPandoc::new(&build.container_runtime, &build.image, options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config_at;

    #[test]
    fn test_pandoc_args() {
        let options = PandocOptions {
            pdf_engine: "lualatex".into(),
            template: PathBuf::from("/p/templates/default.latex"),
        };
        let args = options.args("t.latex", "out.pdf", "out.pdf.md");
        assert_eq!(
            args,
            [
                "-f",
                "markdown+smart",
                "--toc",
                "-N",
                "--fail-if-warnings",
                "--pdf-engine=lualatex",
                "--template",
                "t.latex",
                "-o",
                "out.pdf",
                "out.pdf.md"
            ]
        );
    }

    #[test]
    fn test_select_explicit_backends() {
        let config = test_config_at(Path::new("/p"), "[build]\nbackend = \"local\"");
        assert_eq!(select_typesetter(&config).name(), "pandoc");

        let config = test_config_at(Path::new("/p"), "[build]\nbackend = \"container\"");
        assert_eq!(select_typesetter(&config).name(), "pandoc (container)");
    }

    #[test]
    fn test_auto_falls_back_to_container() {
        let config = test_config_at(
            Path::new("/p"),
            "[build]\npandoc = \"no-such-pandoc-4711\"",
        );
        assert_eq!(select_typesetter(&config).name(), "pandoc (container)");
    }
}
