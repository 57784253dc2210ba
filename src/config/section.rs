//! Configuration sections of `dossier.toml`.
//!
//! ```toml
//! [project]
//! name = "Acme Corp"          # organization name, used as document author
//! file_prefix = "Acme"        # artifacts become Acme-<acronym>.pdf
//!
//! [build]
//! output = "output"
//! pdf_folder = ""             # subfolder of output for PDFs
//! approved_branch = "main"    # stamp approval dates only when on this branch
//! backend = "auto"            # auto | local | container
//! pdf_engine = "lualatex"
//! template = "templates/default.latex"
//! concurrency = 10
//!
//! [folders]
//! policies = "docs/policies"  # custom source folder mappings
//!
//! [serve]
//! interface = "127.0.0.1"
//! port = 4000
//! ws_port = 35729
//! ```

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// `[project]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSection {
    /// Organization name.
    pub name: String,
    /// Prefix for artifact filenames.
    pub file_prefix: Option<String>,
}

/// Which typesetting backend renders PDFs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Local `pandoc` when found on PATH, container otherwise.
    #[default]
    Auto,
    /// Local `pandoc` executable.
    Local,
    /// `pandoc` inside a short-lived container.
    Container,
}

/// `[build]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSection {
    /// Output directory (relative to project root).
    pub output: PathBuf,
    /// Subfolder of the output directory that receives PDFs.
    pub pdf_folder: PathBuf,
    /// Branch whose commits count as approvals.
    pub approved_branch: Option<String>,
    pub backend: BackendKind,
    /// Local typesetting executable.
    pub pandoc: String,
    /// Container runtime CLI.
    pub container_runtime: String,
    /// Container image that bundles pandoc and a TeX engine.
    pub image: String,
    pub pdf_engine: String,
    /// LaTeX template (relative to project root).
    pub template: PathBuf,
    /// Maximum render tasks running at once.
    pub concurrency: usize,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            output: PathBuf::from("output"),
            pdf_folder: PathBuf::new(),
            approved_branch: None,
            backend: BackendKind::Auto,
            pandoc: "pandoc".into(),
            container_runtime: "docker".into(),
            image: "strongdm/pandoc".into(),
            pdf_engine: "lualatex".into(),
            template: PathBuf::from("templates/default.latex"),
            concurrency: 10,
        }
    }
}

/// `[serve]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeSection {
    /// Network interface to bind.
    pub interface: IpAddr,
    /// HTTP port of the preview server.
    pub port: u16,
    /// WebSocket port for live reload.
    pub ws_port: u16,
}

impl Default for ServeSection {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 4000,
            ws_port: 35729,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;

    #[test]
    fn test_build_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.build.output, PathBuf::from("output"));
        assert_eq!(config.build.concurrency, 10);
        assert_eq!(config.build.backend, BackendKind::Auto);
        assert_eq!(config.build.image, "strongdm/pandoc");
        assert!(config.build.approved_branch.is_none());
    }

    #[test]
    fn test_backend_kinds() {
        let config = test_parse_config("[build]\nbackend = \"container\"");
        assert_eq!(config.build.backend, BackendKind::Container);

        let config = test_parse_config("[build]\nbackend = \"local\"\npandoc = \"/opt/pandoc\"");
        assert_eq!(config.build.backend, BackendKind::Local);
        assert_eq!(config.build.pandoc, "/opt/pandoc");
    }

    #[test]
    fn test_serve_partial_override() {
        let config = test_parse_config("[serve]\nport = 8080");
        assert_eq!(config.serve.port, 8080);
        assert_eq!(config.serve.ws_port, 35729);
        assert_eq!(config.serve.interface, IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)));
    }

    #[test]
    fn test_project_section() {
        let config = test_parse_config("[project]\nname = \"Acme\"\nfile_prefix = \"ACME\"");
        assert_eq!(config.project.name, "Acme");
        assert_eq!(config.project.file_prefix.as_deref(), Some("ACME"));
    }
}
