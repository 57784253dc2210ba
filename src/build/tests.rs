use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};

use anyhow::{Result, bail};
use parking_lot::Mutex;
use tempfile::TempDir;

use super::pipeline::{LiveSignals, run_pipeline};
use super::*;
use crate::config::test_config_at;
use crate::document::{RenderableDocument, test_document};
use crate::render::{Invocation, RenderError, select_typesetter};

/// Source serving fixed documents, optionally failing to load.
#[derive(Default)]
struct FakeSource {
    policies: Mutex<Vec<RenderableDocument>>,
    narratives: Vec<RenderableDocument>,
    unreadable: bool,
}

impl DocumentSource for FakeSource {
    fn policies(&self) -> Result<Vec<RenderableDocument>> {
        if self.unreadable {
            bail!("permission denied");
        }
        Ok(self.policies.lock().clone())
    }

    fn narratives(&self) -> Result<Vec<RenderableDocument>> {
        Ok(self.narratives.clone())
    }
}

/// Typesetter that copies its input to the artifact path.
#[derive(Default)]
struct CopyTypesetter {
    runs: AtomicUsize,
}

impl Typesetter for CopyTypesetter {
    fn name(&self) -> &'static str {
        "copy"
    }

    fn invoke(&self, invocation: &Invocation<'_>) -> Result<(), RenderError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        fs::copy(invocation.input, invocation.output).map_err(|source| RenderError::Preprocess {
            path: invocation.output.to_path_buf(),
            source,
        })?;
        Ok(())
    }
}

fn project(toml: &str) -> (TempDir, Arc<ProjectConfig>) {
    let dir = TempDir::new().unwrap();
    let config = test_config_at(dir.path(), toml);
    (dir, Arc::new(config))
}

fn docs(root: &Path, acronyms: &[&str]) -> Vec<RenderableDocument> {
    acronyms
        .iter()
        .map(|a| test_document(a, root.join(format!("{a}.md")), SystemTime::now()))
        .collect()
}

fn source(root: &Path) -> Arc<FakeSource> {
    Arc::new(FakeSource {
        policies: Mutex::new(docs(root, &["ACP", "BCP"])),
        narratives: docs(root, &["SYS"]),
        unreadable: false,
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_one_shot_build() {
    let (dir, config) = project("[project]\nname = \"Acme\"\n[build]\npdf_folder = \"pdf\"");
    let stale = config.output_dir().join("old.html");
    fs::create_dir_all(config.output_dir()).unwrap();
    fs::write(&stale, "old").unwrap();

    let typesetter = Arc::new(CopyTypesetter::default());
    let orchestrator = BuildOrchestrator::new(Arc::clone(&config), source(dir.path()), typesetter.clone());
    orchestrator
        .run(BuildMode::OneShot, std::future::pending())
        .await
        .unwrap();

    assert!(!stale.exists(), "previous output must be removed");
    assert_eq!(typesetter.runs.load(Ordering::SeqCst), 3);
    for name in ["ACP.pdf", "BCP.pdf", "SYS.pdf"] {
        assert!(config.pdf_dir().join(name).is_file());
        assert!(!config.pdf_dir().join(format!("{name}.md")).exists());
    }
    assert!(config.output_dir().join("index.html").is_file());
    assert!(config.output_dir().join("SYS.html").is_file());
}

/// A broken template only replaces that document's body; the pass still
/// typesets it and every sibling.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_broken_template_does_not_stop_siblings() {
    let (dir, config) = project("");
    let source = source(dir.path());
    source.policies.lock()[0].body = "{% if %}".to_string();

    let typesetter = Arc::new(CopyTypesetter::default());
    BuildOrchestrator::new(Arc::clone(&config), source, typesetter.clone())
        .run(BuildMode::OneShot, std::future::pending())
        .await
        .unwrap();

    assert_eq!(typesetter.runs.load(Ordering::SeqCst), 3);
    for name in ["ACP.pdf", "BCP.pdf", "SYS.pdf"] {
        assert!(config.pdf_dir().join(name).is_file(), "{name} was not rendered");
    }
    let broken = fs::read_to_string(config.pdf_dir().join("ACP.pdf")).unwrap();
    assert!(broken.contains("# Error processing template:"));
    let sibling = fs::read_to_string(config.pdf_dir().join("BCP.pdf")).unwrap();
    assert!(sibling.contains("Body of BCP."));
}

#[tokio::test]
async fn test_load_error_fails_build() {
    let (_dir, config) = project("");
    let source = Arc::new(FakeSource {
        unreadable: true,
        ..Default::default()
    });

    let err = BuildOrchestrator::new(config, source, Arc::new(CopyTypesetter::default()))
        .run(BuildMode::OneShot, std::future::pending())
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "unable to read policies");
    assert_eq!(
        format!("{:#}", anyhow::Error::from(err)),
        "unable to read policies: permission denied"
    );
}

#[test]
fn test_prepare_output_tolerates_missing_dir() {
    let (_dir, config) = project("[build]\noutput = \"out\"\npdf_folder = \"pdf\"");
    assert!(!config.output_dir().exists());

    prepare_output(&config).unwrap();
    assert!(config.pdf_dir().is_dir());
}

#[test]
fn test_prepare_output_failure_is_fatal() {
    let (dir, config) = project("[build]\noutput = \"out\"\npdf_folder = \"pdf\"");
    // a file where the output directory's parent should be
    fs::write(dir.path().join("out"), "not a directory").unwrap();

    let err = prepare_output(&config).unwrap_err();
    assert!(matches!(err, BuildError::Stage { .. }));
}

/// The typesetter exits non-zero: every document is still attempted, the
/// scratch files stay for inspection and the build reports the failures.
#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failing_backend_keeps_scratch_files() {
    let (dir, config) = project("[build]\nbackend = \"local\"\npandoc = \"false\"");
    let typesetter = select_typesetter(&config);

    let err = BuildOrchestrator::new(Arc::clone(&config), source(dir.path()), typesetter)
        .run(BuildMode::OneShot, std::future::pending())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BuildError::DocumentsFailed {
            pipeline: "pdf",
            failed: 3,
            total: 3,
        }
    ));
    for name in ["ACP.pdf.md", "BCP.pdf.md", "SYS.pdf.md"] {
        assert!(config.pdf_dir().join(name).is_file(), "{name} was cleaned up");
    }
}

/// After a live pass, one broadcast is enough to run the next pass, and
/// only documents modified since their last render are typeset again.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_live_pass_follows_broadcast() {
    let (dir, config) = project("");
    fs::create_dir_all(config.pdf_dir()).unwrap();
    let source = source(dir.path());
    let typesetter = Arc::new(CopyTypesetter::default());
    let signals = LiveSignals::default();
    let passes = signals.passes.subscribe();

    let pipeline = PdfPipeline::new(Arc::clone(&config), source.clone(), typesetter.clone());
    let handle = tokio::spawn(run_pipeline(pipeline, Some(signals.clone())));

    tokio::time::timeout(Duration::from_secs(5), passes.wait())
        .await
        .expect("first pass did not complete");
    assert_eq!(typesetter.runs.load(Ordering::SeqCst), 3);

    let next_pass = signals.passes.subscribe();
    source.policies.lock()[0].modified_at = SystemTime::now() + Duration::from_secs(60);
    signals.changes.broadcast();

    tokio::time::timeout(Duration::from_secs(5), next_pass.wait())
        .await
        .expect("broadcast did not trigger another pass");
    assert_eq!(typesetter.runs.load(Ordering::SeqCst), 4);

    handle.abort();
}

#[tokio::test]
async fn test_live_build_stops_on_shutdown() {
    let (dir, config) = project("");
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

    let build = tokio::spawn(
        BuildOrchestrator::new(config, source(dir.path()), Arc::new(CopyTypesetter::default())).run(
            BuildMode::Live { serve: false },
            async move {
                let _ = stop_rx.await;
            },
        ),
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!build.is_finished(), "live build must keep running");

    stop_tx.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), build)
        .await
        .expect("build ignored shutdown")
        .unwrap();
    assert!(result.is_ok());
}
