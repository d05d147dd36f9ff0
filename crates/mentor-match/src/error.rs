use crate::config::ConfigError;
use crate::mentorship::DirectoryImportError;
use crate::telemetry::TelemetryError;

/// Process-level failures: startup, wiring, and serving. Request-level failures are
/// `MatchingError` and never surface here.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("directory import error: {0}")]
    Directory(#[from] DirectoryImportError),
}

impl AppError {
    /// Exit status used by the binary.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Config(_) => 78,
            AppError::Directory(_) => 65,
            AppError::Telemetry(_) | AppError::Io(_) => 1,
        }
    }
}
