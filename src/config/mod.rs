//! Project configuration (`dossier.toml`).
//!
//! # Sections
//!
//! | Section      | Purpose                                              |
//! |--------------|------------------------------------------------------|
//! | `[project]`  | Organization name, artifact filename prefix          |
//! | `[build]`    | Output paths, approved branch, typesetting backend   |
//! | `[folders]`  | Custom source folder mappings                        |
//! | `[serve]`    | Preview server and live-reload ports                 |
//!
//! The configuration is loaded once by `main`, then shared as
//! `Arc<ProjectConfig>` with the pipelines and servers.

mod error;
mod section;
mod util;

pub use error::ConfigError;
pub use section::{BackendKind, BuildSection, ProjectSection, ServeSection};

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::cli::{BuildArgs, Cli, Commands};
use crate::utils::path::{normalize_path, resolve_against};
use crate::{debug, log};
use util::find_config_file;

/// Source folders watched in live mode, by their default names.
pub const SOURCE_FOLDERS: &[&str] = &["policies", "narratives", "procedures", "standards"];

/// Root configuration structure representing `dossier.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Absolute path of the loaded config file (None when running on defaults)
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// Project root - parent of the config file, or cwd without one
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub project: ProjectSection,

    #[serde(default)]
    pub build: BuildSection,

    /// Default folder name -> custom folder
    #[serde(default)]
    pub folders: BTreeMap<String, PathBuf>,

    #[serde(default)]
    pub serve: ServeSection,
}

impl ProjectConfig {
    /// Load configuration for the given command line.
    ///
    /// Searches upward from cwd for the config file. Without one, defaults
    /// apply and the current directory becomes the project root.
    pub fn load(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;

        let mut config = match find_config_file(&cwd, &cli.config) {
            Some(path) => {
                let mut config = Self::from_path(&path)?;
                config.root = path.parent().map(Path::to_path_buf).unwrap_or(cwd);
                config.config_path = Some(path);
                config
            }
            None => {
                debug!("config"; "{} not found, using defaults", cli.config.display());
                Self {
                    root: cwd,
                    ..Self::default()
                }
            }
        };

        config.root = normalize_path(&config.root);
        config.apply_command_options(cli);
        config.normalize_paths();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file path, warning about unknown fields.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        let (config, ignored) = Self::parse_with_ignored(&content)?;

        if !ignored.is_empty() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            log!("warning"; "unknown fields in {} ignored: {}", name, ignored.join(", "));
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    fn apply_command_options(&mut self, cli: &Cli) {
        match &cli.command {
            Commands::Build { build_args, .. } => self.apply_build_args(build_args),
            Commands::Serve {
                build_args,
                interface,
                port,
            } => {
                self.apply_build_args(build_args);
                if let Some(interface) = interface {
                    self.serve.interface = *interface;
                }
                if let Some(port) = port {
                    self.serve.port = *port;
                }
            }
        }
    }

    fn apply_build_args(&mut self, args: &BuildArgs) {
        if let Some(output) = &args.output {
            self.build.output = output.clone();
        }
        if let Some(backend) = args.backend {
            self.build.backend = backend;
        }
    }

    /// Make root-relative paths absolute.
    fn normalize_paths(&mut self) {
        self.build.output = resolve_against(&self.root, &self.build.output);
        self.build.template = resolve_against(&self.root, &self.build.template);
        for folder in self.folders.values_mut() {
            *folder = resolve_against(&self.root, folder);
        }
    }

    /// Reject settings that would make the build destructive or impossible.
    pub fn validate(&self) -> Result<()> {
        if self.build.concurrency == 0 {
            bail!(ConfigError::Validation(
                "build.concurrency must be at least 1".into()
            ));
        }

        let pdf_folder = &self.build.pdf_folder;
        if pdf_folder.is_absolute()
            || pdf_folder
                .components()
                .any(|c| matches!(c, Component::ParentDir))
        {
            bail!(ConfigError::Validation(format!(
                "build.pdf_folder must be a relative path inside the output directory, got `{}`",
                pdf_folder.display()
            )));
        }

        // The output directory is wiped before every build.
        let output = normalize_path(&self.build.output);
        if self.root.starts_with(&output) {
            bail!(ConfigError::Validation(format!(
                "build.output `{}` must not contain the project root",
                output.display()
            )));
        }

        Ok(())
    }

    // ------------------------------------------------------------------------
    // Paths
    // ------------------------------------------------------------------------

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn output_dir(&self) -> &Path {
        &self.build.output
    }

    /// Directory that receives PDF artifacts.
    pub fn pdf_dir(&self) -> PathBuf {
        self.build.output.join(&self.build.pdf_folder)
    }

    /// Source folder for a default folder name, honouring `[folders]`.
    pub fn folder(&self, default_name: &str) -> PathBuf {
        self.folders
            .get(default_name)
            .cloned()
            .unwrap_or_else(|| self.root.join(default_name))
    }

    /// Folders watched in live mode.
    pub fn watch_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = SOURCE_FOLDERS.iter().map(|name| self.folder(name)).collect();
        paths.push(self.root.join("templates"));
        if let Some(config_path) = &self.config_path {
            paths.push(config_path.clone());
        }
        paths
    }

    /// Folder whose subfolders the preview server exposes as-is.
    pub fn static_dir(&self) -> PathBuf {
        self.root.join("static")
    }
}

/// Parse config content, panicking on unknown fields to catch typos in tests.
#[cfg(test)]
pub fn test_parse_config(content: &str) -> ProjectConfig {
    let (parsed, ignored) = ProjectConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

/// Config rooted at `root` with paths normalised, as `load` would leave it.
#[cfg(test)]
pub fn test_config_at(root: &Path, content: &str) -> ProjectConfig {
    let mut config = test_parse_config(content);
    config.root = root.to_path_buf();
    config.normalize_paths();
    config
}
