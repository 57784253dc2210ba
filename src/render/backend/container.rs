//! Pandoc inside a short-lived container.
//!
//! The project root is bind-mounted at `/source`, so every path handed to
//! the typesetter is translated into that mount:
//!
//! ```text
//! create --volume <root>:/source --workdir /source <image> <pandoc args>
//! start <id>
//! wait <id>      -> exit code on stdout
//! logs <id>      -> diagnostics on failure
//! stop, rm       -> always, via ContainerGuard
//! ```

use std::path::Path;

use super::{Invocation, PandocOptions, Typesetter};
use crate::debug;
use crate::render::RenderError;
use crate::utils::exec::{Cmd, combined_output, stdout_string};

/// Mount point of the project root inside the container.
const MOUNT_POINT: &str = "/source";

/// Seconds a container gets to stop before it is killed.
const STOP_TIMEOUT_SECS: &str = "2";

pub struct ContainerPandoc {
    runtime: String,
    image: String,
    options: PandocOptions,
}

impl ContainerPandoc {
    pub fn new(runtime: impl Into<String>, image: impl Into<String>, options: PandocOptions) -> Self {
        Self {
            runtime: runtime.into(),
            image: image.into(),
            options,
        }
    }

    /// Run `<runtime> <args>`, returning trimmed stdout.
    fn runtime_cmd(&self, action: &'static str, args: &[&str]) -> Result<String, RenderError> {
        let output = Cmd::new(&self.runtime)
            .args(args)
            .output()
            .map_err(|source| RenderError::Spawn {
                program: self.runtime.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(RenderError::Container {
                action,
                detail: combined_output(&output),
            });
        }
        Ok(stdout_string(&output))
    }
}

impl Typesetter for ContainerPandoc {
    fn name(&self) -> &'static str {
        "pandoc (container)"
    }

    fn invoke(&self, invocation: &Invocation<'_>) -> Result<(), RenderError> {
        let root = invocation.root;
        let args = self.options.args(
            &container_path(root, &self.options.template)?,
            &container_path(root, invocation.output)?,
            &container_path(root, invocation.input)?,
        );

        let volume = format!("{}:{MOUNT_POINT}", root.display());
        let mut create = vec![
            "create",
            "--volume",
            volume.as_str(),
            "--workdir",
            MOUNT_POINT,
            self.image.as_str(),
        ];
        create.extend(args.iter().map(String::as_str));

        let id = self.runtime_cmd("create", &create)?;
        if id.is_empty() {
            return Err(RenderError::Container {
                action: "create",
                detail: "no container id returned".into(),
            });
        }
        let _guard = ContainerGuard {
            runtime: &self.runtime,
            id: &id,
        };

        self.runtime_cmd("start", &["start", id.as_str()])?;
        let status = self.runtime_cmd("wait", &["wait", id.as_str()])?;
        let code: i64 = status.parse().map_err(|_| RenderError::Container {
            action: "wait",
            detail: format!("unexpected exit status `{status}`"),
        })?;

        if code != 0 {
            let logs = Cmd::new(&self.runtime)
                .args(["logs", id.as_str()])
                .output()
                .map(|output| combined_output(&output))
                .unwrap_or_default();
            return Err(RenderError::Invoke {
                program: format!("pandoc in {}", self.image),
                status: format!("exit code: {code}"),
                output: logs,
            });
        }
        Ok(())
    }

    fn verify_output(&self, invocation: &Invocation<'_>) -> Result<(), RenderError> {
        if invocation.output.is_file() {
            Ok(())
        } else {
            Err(RenderError::MissingOutput {
                path: invocation.output.to_path_buf(),
                hint: Some("verify your container image is up to date"),
            })
        }
    }
}

/// Stops and removes the container on every exit path.
struct ContainerGuard<'a> {
    runtime: &'a str,
    id: &'a str,
}

impl Drop for ContainerGuard<'_> {
    fn drop(&mut self) {
        let stop = Cmd::new(self.runtime)
            .args(["stop", "--time", STOP_TIMEOUT_SECS, self.id])
            .output();
        if let Err(e) = stop {
            debug!("pdf"; "failed to stop container {}: {}", self.id, e);
        }

        let remove = Cmd::new(self.runtime).args(["rm", "--force", self.id]).output();
        match remove {
            Ok(output) if !output.status.success() => {
                debug!("pdf"; "failed to remove container {}: {}", self.id, combined_output(&output));
            }
            Err(e) => debug!("pdf"; "failed to remove container {}: {}", self.id, e),
            Ok(_) => {}
        }
    }
}

/// `path` as seen inside the container.
fn container_path(root: &Path, path: &Path) -> Result<String, RenderError> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| RenderError::OutsideMount {
            path: path.to_path_buf(),
        })?;

    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    Ok(format!("{MOUNT_POINT}/{}", parts.join("/")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_path() {
        let root = Path::new("/srv/acme");
        assert_eq!(
            container_path(root, Path::new("/srv/acme/output/pdf/ACP.pdf")).unwrap(),
            "/source/output/pdf/ACP.pdf"
        );
        assert!(matches!(
            container_path(root, Path::new("/tmp/elsewhere.pdf")),
            Err(RenderError::OutsideMount { .. })
        ));
    }
}

#[cfg(all(test, unix))]
mod runtime_tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Fake container runtime that logs each subcommand and, on `start`,
    /// writes `artifact` unless it is empty.
    fn fake_runtime(dir: &Path, artifact: &Path, exit_code: u8) -> PathBuf {
        let script = dir.join("fake-runtime");
        let calls = dir.join("calls.log");
        fs::write(
            &script,
            format!(
                "#!/bin/sh\necho \"$1\" >> '{calls}'\ncase \"$1\" in\n  create) echo cid-42 ;;\n  start) [ -n '{artifact}' ] && echo pdf > '{artifact}' ;;\n  wait) echo {exit_code} ;;\n  logs) echo 'lualatex failed' ;;\nesac\nexit 0\n",
                calls = calls.display(),
                artifact = artifact.display(),
            ),
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    fn options(root: &Path) -> PandocOptions {
        PandocOptions {
            pdf_engine: "lualatex".into(),
            template: root.join("templates").join("default.latex"),
        }
    }

    fn calls(dir: &Path) -> Vec<String> {
        fs::read_to_string(dir.join("calls.log"))
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_container_lifecycle() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("ACP.pdf");
        let input = dir.path().join("ACP.pdf.md");
        let runtime = fake_runtime(dir.path(), &output, 0);

        let backend = ContainerPandoc::new(runtime.to_string_lossy(), "strongdm/pandoc", options(dir.path()));
        let invocation = Invocation {
            input: &input,
            output: &output,
            root: dir.path(),
        };
        backend.invoke(&invocation).unwrap();
        backend.verify_output(&invocation).unwrap();

        assert_eq!(calls(dir.path()), ["create", "start", "wait", "stop", "rm"]);
    }

    #[test]
    fn test_failed_run_still_releases_container() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("ACP.pdf");
        let runtime = fake_runtime(dir.path(), Path::new(""), 43);

        let backend = ContainerPandoc::new(runtime.to_string_lossy(), "strongdm/pandoc", options(dir.path()));
        let err = backend
            .invoke(&Invocation {
                input: &dir.path().join("ACP.pdf.md"),
                output: &output,
                root: dir.path(),
            })
            .unwrap_err();

        match err {
            RenderError::Invoke { status, output, .. } => {
                assert_eq!(status, "exit code: 43");
                assert_eq!(output, "lualatex failed");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(calls(dir.path()), ["create", "start", "wait", "logs", "stop", "rm"]);
    }

    #[test]
    fn test_zero_exit_without_artifact_is_missing_output() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("ACP.pdf");
        let runtime = fake_runtime(dir.path(), Path::new(""), 0);

        let backend = ContainerPandoc::new(runtime.to_string_lossy(), "strongdm/pandoc", options(dir.path()));
        let invocation = Invocation {
            input: &dir.path().join("ACP.pdf.md"),
            output: &output,
            root: dir.path(),
        };
        backend.invoke(&invocation).unwrap();

        let err = backend.verify_output(&invocation).unwrap_err();
        assert!(err.to_string().contains("verify your container image is up to date"));
    }
}
