use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LintFixError {
    #[error("io error: {0}")]
    Io(String),
    #[error("config parse error: {0}")]
    ConfigParse(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("cli error: {0}")]
    Cli(String),
    #[error("process error: {0}")]
    Process(String),
    #[error("error finding files: {0}")]
    Discovery(String),
    #[error("patch error: {0}")]
    Patch(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("terminal error: {0}")]
    Terminal(String),
}
