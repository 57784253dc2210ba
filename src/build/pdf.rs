//! PDF pipeline: policies and narratives through the typesetter.

use std::sync::Arc;

use super::BuildError;
use super::pipeline::{Pipeline, load_documents};
use crate::config::ProjectConfig;
use crate::document::DocumentSource;
use crate::freshness::ModificationTracker;
use crate::render::{ApprovalLookup, Dispatcher, PassReport, PdfJob, TemplateContext, Typesetter};

pub struct PdfPipeline {
    config: Arc<ProjectConfig>,
    source: Arc<dyn DocumentSource>,
    typesetter: Arc<dyn Typesetter>,
    tracker: Arc<ModificationTracker>,
    dispatcher: Dispatcher,
}

impl PdfPipeline {
    pub fn new(
        config: Arc<ProjectConfig>,
        source: Arc<dyn DocumentSource>,
        typesetter: Arc<dyn Typesetter>,
    ) -> Self {
        let dispatcher = Dispatcher::new(config.build.concurrency, config.root().to_path_buf());
        Self {
            config,
            source,
            typesetter,
            tracker: Arc::new(ModificationTracker::new()),
            dispatcher,
        }
    }
}

impl Pipeline for PdfPipeline {
    const NAME: &'static str = "pdf";

    async fn pass(&self) -> Result<PassReport, BuildError> {
        let (policies, narratives) = load_documents(Arc::clone(&self.source)).await?;
        let context = Arc::new(TemplateContext::new(
            self.config.project.name.clone(),
            &policies,
            &narratives,
        ));

        // Branch detection opens the repository, keep it off the runtime
        let root = self.config.root().to_path_buf();
        let branch = self.config.build.approved_branch.clone();
        let approval = tokio::task::spawn_blocking(move || ApprovalLookup::detect(&root, branch.as_deref()))
            .await
            .map_err(|e| BuildError::stage("approval lookup panicked", e))?;

        let job = Arc::new(PdfJob::new(
            Arc::clone(&self.typesetter),
            context,
            approval,
            self.config.pdf_dir(),
            self.config.root().to_path_buf(),
        ));

        let mut documents = policies;
        documents.extend(narratives);
        Ok(self.dispatcher.dispatch(documents, &self.tracker, job).await)
    }
}
