use std::path::PathBuf;

use thiserror::Error;

/// Crate-wide error type.
///
/// The split mirrors how failures surface to a caller: `Config` and
/// `Validation` are synchronous rejections raised before any process is
/// launched; `JobNotFound`/`OutputMissing` cover unknown job ids and missing
/// output trees; `NotFinished` guards downloads of non-terminal jobs. A
/// failing external tool is *not* an error — it is recorded on the job and
/// observed through polling.
#[derive(Debug, Error)]
pub enum FoldrunError {
    /// A required external asset (database component, script, weights
    /// directory) is missing or unusable.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The request itself is malformed (bad upload extension, non-positive
    /// sampling parameters).
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Output directory missing: {0}")]
    OutputMissing(PathBuf),

    /// Download requested before the job reached terminal success.
    #[error("Job not finished: {0}")]
    NotFinished(String),

    #[error("Archive build failed: {0}")]
    Archive(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, FoldrunError>;
