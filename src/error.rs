use thiserror::Error;

/// Errors surfaced at the CLI boundary.
///
/// The correlation core never produces these: per the tool's best-effort
/// contract, its failures degrade to sentinels or empty results in place.
#[derive(Error, Debug)]
pub enum KeytraceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, KeytraceError>;
