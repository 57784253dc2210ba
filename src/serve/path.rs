//! URL to filesystem path resolution.

use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;

/// Directories the preview server reads from.
#[derive(Debug, Clone)]
pub struct ServeRoots {
    /// Build output, served at `/`.
    pub output: PathBuf,
    /// Each subfolder `<name>` is served at `/<name>/`.
    pub static_dir: PathBuf,
}

impl ServeRoots {
    /// File answering `url`, if any.
    ///
    /// A first segment naming a subfolder of the static directory wins over
    /// the output directory.
    pub fn resolve(&self, url: &str) -> Option<PathBuf> {
        let clean = normalize_url(url);
        // Reject suspicious paths before touching the filesystem
        if clean.split('/').any(|segment| segment == "..") {
            return None;
        }

        if let Some((first, rest)) = split_first_segment(&clean) {
            let folder = self.static_dir.join(first);
            if folder.is_dir() {
                return resolve_path(rest, &folder);
            }
        }
        resolve_path(&clean, &self.output)
    }
}

fn split_first_segment(path: &str) -> Option<(&str, &str)> {
    if path.is_empty() {
        return None;
    }
    Some(path.split_once('/').unwrap_or((path, "")))
}

/// Resolve a clean relative path under `root`, mapping directories to
/// their `index.html`.
fn resolve_path(clean: &str, root: &Path) -> Option<PathBuf> {
    // Canonical paths catch symlinks escaping the root
    let canonical = root.join(clean).canonicalize().ok()?;
    let root_canonical = root.canonicalize().ok()?;
    if !canonical.starts_with(&root_canonical) {
        return None;
    }

    if canonical.is_file() {
        return Some(canonical);
    }
    if canonical.is_dir() {
        let index = canonical.join("index.html");
        if index.is_file() {
            return Some(index);
        }
    }
    None
}

/// Decode, drop the query string and trim slashes.
fn normalize_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let decoded = percent_decode_str(path)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_default();
    decoded.trim_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn roots() -> (TempDir, ServeRoots) {
        let dir = TempDir::new().unwrap();
        let roots = ServeRoots {
            output: dir.path().join("output"),
            static_dir: dir.path().join("static"),
        };
        fs::create_dir_all(roots.output.join("pdf")).unwrap();
        fs::create_dir_all(roots.static_dir.join("css")).unwrap();
        fs::write(roots.output.join("index.html"), "<html></html>").unwrap();
        fs::write(roots.output.join("pdf").join("Acme ACP.pdf"), "%PDF").unwrap();
        fs::write(roots.static_dir.join("css").join("site.css"), "body{}").unwrap();
        (dir, roots)
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("/pdf/Acme%20ACP.pdf?x=1"), "pdf/Acme ACP.pdf");
        assert_eq!(normalize_url("/"), "");
        assert_eq!(normalize_url("/index.html#top"), "index.html");
    }

    #[test]
    fn test_root_serves_index() {
        let (_dir, roots) = roots();
        let path = roots.resolve("/").unwrap();
        assert!(path.ends_with("output/index.html"));
    }

    #[test]
    fn test_encoded_pdf_name() {
        let (_dir, roots) = roots();
        let path = roots.resolve("/pdf/Acme%20ACP.pdf").unwrap();
        assert!(path.ends_with("Acme ACP.pdf"));
    }

    #[test]
    fn test_static_subfolder() {
        let (_dir, roots) = roots();
        let path = roots.resolve("/css/site.css").unwrap();
        assert!(path.ends_with("static/css/site.css"));
    }

    #[test]
    fn test_traversal_rejected() {
        let (_dir, roots) = roots();
        assert!(roots.resolve("/../static/css/site.css").is_none());
        assert!(roots.resolve("/css/%2e%2e/%2e%2e/output/index.html").is_none());
    }

    #[test]
    fn test_missing_file() {
        let (_dir, roots) = roots();
        assert!(roots.resolve("/nope.html").is_none());
    }
}
