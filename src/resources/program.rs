//! Shader programs
//!
//! A [`Program`] is WGSL source plus the pipeline-overridable constants that
//! specialize it. Sources are validated with `naga` before they are
//! accepted, so a broken edit never replaces a working program: the
//! renderer keeps building pipelines from the last valid code and only
//! picks up a new [`Program::generation`].

use std::borrow::Cow;
use std::path::PathBuf;

use crate::errors::{Result, UmbraError};

/// Where the WGSL code of a program comes from.
#[derive(Debug, Clone)]
pub enum ProgramSource {
    /// Source compiled into the binary. Recompiling re-validates it as is.
    Inline(Cow<'static, str>),
    /// Source read from disk, re-read on every recompilation.
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Program {
    label: String,
    source: ProgramSource,
    constants: Vec<(String, f64)>,
    /// Last code that passed validation.
    code: String,
    generation: u32,
}

impl Program {
    pub fn inline(label: impl Into<String>, code: impl Into<Cow<'static, str>>) -> Result<Self> {
        let label = label.into();
        let code = code.into();
        validate_wgsl(&label, &code)?;
        Ok(Self {
            label,
            code: code.to_string(),
            source: ProgramSource::Inline(code),
            constants: Vec::new(),
            generation: 0,
        })
    }

    pub fn from_file(label: impl Into<String>, path: impl Into<PathBuf>) -> Result<Self> {
        let label = label.into();
        let path = path.into();
        let code = read_source(&path)?;
        validate_wgsl(&label, &code)?;
        Ok(Self {
            label,
            code,
            source: ProgramSource::File(path),
            constants: Vec::new(),
            generation: 0,
        })
    }

    /// Sets a WGSL `override` constant.
    #[must_use]
    pub fn with_constant(mut self, name: impl Into<String>, value: f64) -> Self {
        self.constants.push((name.into(), value));
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn constants(&self) -> &[(String, f64)] {
        &self.constants
    }

    pub fn source(&self) -> &ProgramSource {
        &self.source
    }

    /// Incremented each time a recompilation swaps in new code.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Reloads and validates the source.
    ///
    /// On failure the previous code is kept and the error is returned.
    /// Returns `Ok(true)` when the code changed.
    pub fn recompile(&mut self) -> Result<bool> {
        let code = match &self.source {
            ProgramSource::Inline(code) => code.to_string(),
            ProgramSource::File(path) => read_source(path)?,
        };
        validate_wgsl(&self.label, &code)?;

        if code == self.code {
            return Ok(false);
        }
        self.code = code;
        self.generation += 1;
        Ok(true)
    }
}

fn read_source(path: &PathBuf) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| UmbraError::ShaderSourceRead {
        path: path.clone(),
        source,
    })
}

/// Parses and validates WGSL, returning the front-end diagnostic on failure.
pub fn validate_wgsl(label: &str, code: &str) -> Result<naga::Module> {
    let module = naga::front::wgsl::parse_str(code).map_err(|e| UmbraError::ShaderCompile {
        label: label.to_owned(),
        message: e.emit_to_string(code),
    })?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator.validate(&module).map_err(|e| UmbraError::ShaderCompile {
        label: label.to_owned(),
        message: e.emit_to_string(code),
    })?;

    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "@vertex fn vs_main() -> @builtin(position) vec4<f32> { return vec4<f32>(0.0); }";

    #[test]
    fn invalid_source_is_rejected_with_label() {
        let err = Program::inline("broken", "fn main( {").unwrap_err();
        match err {
            UmbraError::ShaderCompile { label, .. } => assert_eq!(label, "broken"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn failed_recompile_keeps_previous_code() {
        let dir = std::env::temp_dir().join(format!("umbra_program_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("program.wgsl");
        std::fs::write(&path, VALID).unwrap();

        let mut program = Program::from_file("file", &path).unwrap();
        std::fs::write(&path, "this is not wgsl").unwrap();

        assert!(program.recompile().is_err());
        assert_eq!(program.code(), VALID);
        assert_eq!(program.generation(), 0);

        std::fs::remove_dir_all(&dir).ok();
    }
}
