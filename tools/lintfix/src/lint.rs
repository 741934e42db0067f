use crate::errors::LintFixError;
use crate::runtime::{ProcessRequest, ProcessRunner};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const FILEPATH_PLACEHOLDER: &str = "{{filepath}}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintReport {
    pub passed: bool,
    /// stderr followed by stdout, trimmed.
    pub output: String,
}

#[async_trait]
pub trait LintRunner: Send + Sync {
    /// `timeout` bounds this single invocation.
    async fn lint(&self, path: &Path, timeout: Duration) -> Result<LintReport, LintFixError>;
}

/// Splits a command template on whitespace and substitutes the file path into
/// every argument that carries the placeholder.
pub fn render_command(template: &str, path: &Path) -> Result<(String, Vec<String>), LintFixError> {
    let file = path.display().to_string();
    let mut parts = template
        .split_whitespace()
        .map(|part| part.replace(FILEPATH_PLACEHOLDER, &file));
    let program = parts
        .next()
        .ok_or_else(|| LintFixError::InvalidConfig("lint command is empty".to_string()))?;
    Ok((program, parts.collect()))
}

/// Human-readable form of the command for one file, used as a title.
pub fn display_command(template: &str, file_name: &str) -> String {
    template.replace(FILEPATH_PLACEHOLDER, file_name)
}

pub struct CommandLintRunner {
    template: String,
    process_runner: Arc<dyn ProcessRunner>,
}

impl CommandLintRunner {
    pub fn new(template: impl Into<String>, process_runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            template: template.into(),
            process_runner,
        }
    }
}

#[async_trait]
impl LintRunner for CommandLintRunner {
    async fn lint(&self, path: &Path, timeout: Duration) -> Result<LintReport, LintFixError> {
        let (program, args) = render_command(&self.template, path)?;
        let result = self
            .process_runner
            .run(ProcessRequest {
                program,
                args,
                timeout: Some(timeout),
            })
            .await;

        match result {
            Ok(output) => Ok(LintReport {
                passed: output.exit_code == 0,
                output: format!("{}{}", output.stderr, output.stdout).trim().to_string(),
            }),
            Err(LintFixError::Timeout(message)) => Err(LintFixError::Timeout(message)),
            // A linter that cannot start is a failed lint, not a broken run.
            Err(err) => Ok(LintReport {
                passed: false,
                output: err.to_string(),
            }),
        }
    }
}
