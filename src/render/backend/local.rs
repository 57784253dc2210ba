//! Local pandoc executable.

use super::{Invocation, PandocOptions, Typesetter};
use crate::render::RenderError;
use crate::utils::exec::{Cmd, combined_output};

pub struct LocalPandoc {
    program: String,
    options: PandocOptions,
}

impl LocalPandoc {
    pub fn new(program: impl Into<String>, options: PandocOptions) -> Self {
        Self {
            program: program.into(),
            options,
        }
    }
}

impl Typesetter for LocalPandoc {
    fn name(&self) -> &'static str {
        "pandoc"
    }

    fn invoke(&self, invocation: &Invocation<'_>) -> Result<(), RenderError> {
        let args = self.options.args(
            &self.options.template.to_string_lossy(),
            &invocation.output.to_string_lossy(),
            &invocation.input.to_string_lossy(),
        );

        let output = Cmd::new(&self.program)
            .args(args)
            .cwd(invocation.root)
            .output()
            .map_err(|source| RenderError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(RenderError::Invoke {
                program: self.program.clone(),
                status: output.status.to_string(),
                output: combined_output(&output),
            });
        }
        Ok(())
    }
}
