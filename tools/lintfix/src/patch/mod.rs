use crate::errors::LintFixError;
use async_trait::async_trait;
use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;

pub mod ollama;

// Opening fence must carry a language tag; the body runs to the next fence.
static CODE_BLOCK_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z0-9_+#.\-]+(.*?)```").ok());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchRequest {
    pub path: PathBuf,
    pub content: String,
    pub lint_output: String,
}

#[async_trait]
pub trait PatchGenerator: Send + Sync {
    /// Returns the full replacement content for `request.path`.
    async fn generate(&self, request: &PatchRequest) -> Result<String, LintFixError>;
}

pub fn build_prompt(language: &str, request: &PatchRequest) -> String {
    format!(
        "Fix these {language} lint errors in {path}:\n{errors}\n\nFile content:\n{content}\n\n\
         Return only the corrected {language} code in a single fenced code block.",
        path = request.path.display(),
        errors = request.lint_output,
        content = request.content,
    )
}

/// Body of the first language-tagged fenced block, trimmed. Text without
/// such a block is returned unchanged.
pub fn extract_code_block(response: &str) -> String {
    CODE_BLOCK_REGEX
        .as_ref()
        .and_then(|re| re.captures(response))
        .and_then(|caps| caps.get(1))
        .map(|body| body.as_str().trim().to_string())
        .unwrap_or_else(|| response.to_string())
}

/// Prompt label for a file extension.
pub fn language_for_extension(extension: &str) -> String {
    match extension.trim_start_matches('.') {
        "go" => "Go".to_string(),
        "rs" => "Rust".to_string(),
        "py" => "Python".to_string(),
        "js" => "JavaScript".to_string(),
        "ts" => "TypeScript".to_string(),
        other => other.to_string(),
    }
}
