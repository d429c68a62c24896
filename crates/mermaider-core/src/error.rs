use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid secrets file: {0}")]
    Secrets(#[from] toml_edit::TomlError),

    #[error("unknown diagram category: {0}")]
    UnknownCategory(String),

    #[error("unknown export format: {0}")]
    UnknownFormat(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
