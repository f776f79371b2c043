use std::path::PathBuf;

use thiserror::Error;

/// Every failure a pipeline stage can report.
///
/// Variants carry rendered messages rather than source errors so the type stays
/// `Clone` and can be stored in a [`crate::schedule::CycleReport`].
#[derive(Debug, Clone, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    /// FRED answered with a non-success status; usually a bad or revoked key.
    #[error("FRED rejected the request (status {status}): {message}")]
    Auth { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("failed to parse {0}")]
    Parse(String),

    #[error("required input '{}' does not exist", .0.display())]
    MissingInput(PathBuf),

    #[error("i/o error: {0}")]
    Io(String),

    #[error("stage '{stage}' exited with {}", describe_exit(.code))]
    StageFailed { stage: String, code: Option<i32> },
}

impl AppError {
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Config(_) => 2,
            AppError::Auth { .. } => 3,
            AppError::Network(_) => 4,
            AppError::Parse(_) => 5,
            AppError::MissingInput(_) => 6,
            AppError::Io(_) => 7,
            AppError::StageFailed { .. } => 8,
        }
    }

    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Network(_))
    }

    pub(crate) fn io(context: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        AppError::Io(format!("{context}: {err}"))
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("code {c}"),
        None => "a signal".to_string(),
    }
}
