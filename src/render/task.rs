//! One document, one artifact.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::backend::{Invocation, Typesetter};
use super::context::TemplateContext;
use super::git::ApprovalLookup;
use super::preprocess::scratch_path;
use super::RenderError;
use crate::document::RenderableDocument;
use crate::log;

/// Work run for each stale document of a pass.
///
/// Implementations block; the dispatcher runs them on the blocking pool.
pub trait RenderJob: Send + Sync + 'static {
    /// Render `doc`, returning the artifact path.
    fn render(&self, doc: &RenderableDocument) -> Result<PathBuf, RenderError>;
}

/// Output paths of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTask {
    pub artifact: PathBuf,
    pub scratch: PathBuf,
}

impl RenderTask {
    pub fn new(doc: &RenderableDocument, pdf_dir: &Path) -> Self {
        let artifact = pdf_dir.join(&doc.output_filename);
        let scratch = scratch_path(&artifact);
        Self { artifact, scratch }
    }
}

/// Renders PDFs through a typesetting backend.
pub struct PdfJob {
    typesetter: Arc<dyn Typesetter>,
    context: Arc<TemplateContext>,
    approval: Option<ApprovalLookup>,
    pdf_dir: PathBuf,
    root: PathBuf,
}

impl PdfJob {
    pub fn new(
        typesetter: Arc<dyn Typesetter>,
        context: Arc<TemplateContext>,
        approval: Option<ApprovalLookup>,
        pdf_dir: PathBuf,
        root: PathBuf,
    ) -> Self {
        Self {
            typesetter,
            context,
            approval,
            pdf_dir,
            root,
        }
    }
}

impl RenderJob for PdfJob {
    fn render(&self, doc: &RenderableDocument) -> Result<PathBuf, RenderError> {
        let task = RenderTask::new(doc, &self.pdf_dir);
        let approved = self
            .approval
            .as_ref()
            .map(|lookup| lookup.last_commit_date(&doc.full_path))
            .unwrap_or_default();

        if let Some(warning) = self
            .typesetter
            .preprocess(&self.context, doc, &approved, &task.scratch)?
        {
            log!("warning"; "{}: {}", doc.label(), warning);
        }

        // A leftover artifact must not pass verification for a failed run
        remove_if_exists(&task.artifact)?;

        let invocation = Invocation {
            input: &task.scratch,
            output: &task.artifact,
            root: &self.root,
        };
        self.typesetter.invoke(&invocation)?;
        self.typesetter.verify_output(&invocation)?;

        remove_if_exists(&task.scratch)?;
        Ok(task.artifact)
    }
}

fn remove_if_exists(path: &Path) -> Result<(), RenderError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(RenderError::Cleanup {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::test_document;
    use parking_lot::Mutex;
    use std::time::SystemTime;
    use tempfile::TempDir;

    /// Backend that copies the scratch file to the artifact.
    #[derive(Default)]
    struct CopyTypesetter {
        inputs: Mutex<Vec<String>>,
        produce: bool,
    }

    impl Typesetter for CopyTypesetter {
        fn name(&self) -> &'static str {
            "copy"
        }

        fn invoke(&self, invocation: &Invocation<'_>) -> Result<(), RenderError> {
            let content = fs::read_to_string(invocation.input).unwrap();
            self.inputs.lock().push(content.clone());
            if self.produce {
                fs::write(invocation.output, content).unwrap();
            }
            Ok(())
        }
    }

    fn job(dir: &TempDir, typesetter: Arc<CopyTypesetter>) -> PdfJob {
        PdfJob::new(
            typesetter,
            Arc::new(TemplateContext::new("Acme", &[], &[])),
            None,
            dir.path().join("output"),
            dir.path().to_path_buf(),
        )
    }

    #[test]
    fn test_render_task_paths() {
        let doc = test_document("ACP", PathBuf::from("/p/acp.md"), SystemTime::now());
        let task = RenderTask::new(&doc, Path::new("/out/pdf"));
        assert_eq!(task.artifact, PathBuf::from("/out/pdf/ACP.pdf"));
        assert_eq!(task.scratch, PathBuf::from("/out/pdf/ACP.pdf.md"));
    }

    #[test]
    fn test_render_writes_artifact_and_removes_scratch() {
        let dir = TempDir::new().unwrap();
        let typesetter = Arc::new(CopyTypesetter {
            produce: true,
            ..Default::default()
        });
        let doc = test_document("ACP", dir.path().join("acp.md"), SystemTime::now());

        let artifact = job(&dir, Arc::clone(&typesetter)).render(&doc).unwrap();

        assert_eq!(artifact, dir.path().join("output").join("ACP.pdf"));
        assert!(artifact.is_file());
        assert!(!dir.path().join("output").join("ACP.pdf.md").exists());
        assert!(typesetter.inputs.lock()[0].starts_with("---\ntitle: ACP Policy\n"));
    }

    #[test]
    fn test_stale_artifact_does_not_mask_missing_output() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("output");
        fs::create_dir_all(&output).unwrap();
        fs::write(output.join("ACP.pdf"), "old").unwrap();

        let typesetter = Arc::new(CopyTypesetter::default());
        let doc = test_document("ACP", dir.path().join("acp.md"), SystemTime::now());

        let err = job(&dir, typesetter).render(&doc).unwrap_err();
        assert!(matches!(err, RenderError::MissingOutput { .. }));
        // scratch is kept for inspection after a failure
        assert!(output.join("ACP.pdf.md").exists());
    }
}
