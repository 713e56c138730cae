//! Failure taxonomy for the session orchestration core.
//!
//! Every failure a presentation layer can observe maps to one of these
//! variants; `code()` gives the stable identifier used in API payloads.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("audio input device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("no {manager} engine is initialized")]
    EngineNotInitialized { manager: &'static str },

    #[error("{manager} engine '{name}' failed to initialize: {reason}")]
    EngineInitFailed {
        manager: &'static str,
        name: String,
        reason: String,
    },

    #[error("a meeting session is already active")]
    SessionAlreadyActive,

    #[error("no active meeting session")]
    NoActiveSession,

    #[error("audio capture error: {0}")]
    CaptureIo(String),

    #[error("failed to persist artifact: {0:#}")]
    PersistenceWrite(anyhow::Error),

    #[error("transcription failed: {0:#}")]
    TranscriptionFailed(anyhow::Error),

    #[error("enrichment failed: {0}")]
    EnrichmentFailed(String),
}

impl CoreError {
    /// Stable error code for API responses and CLI output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DeviceUnavailable(_) => "device_unavailable",
            Self::EngineNotInitialized { .. } => "engine_not_initialized",
            Self::EngineInitFailed { .. } => "engine_init_failed",
            Self::SessionAlreadyActive => "session_already_active",
            Self::NoActiveSession => "no_active_session",
            Self::CaptureIo(_) => "capture_io_error",
            Self::PersistenceWrite(_) => "persistence_write_error",
            Self::TranscriptionFailed(_) => "transcription_failed",
            Self::EnrichmentFailed(_) => "enrichment_failed",
        }
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(CoreError::SessionAlreadyActive.code(), "session_already_active");
        assert_eq!(CoreError::NoActiveSession.code(), "no_active_session");
        assert_eq!(
            CoreError::EngineNotInitialized { manager: "stt" }.code(),
            "engine_not_initialized"
        );
        assert_eq!(
            CoreError::DeviceUnavailable("no mic".into()).code(),
            "device_unavailable"
        );
    }

    #[test]
    fn test_display_includes_context() {
        let err = CoreError::EngineInitFailed {
            manager: "summarization",
            name: "ollama".into(),
            reason: "connection refused".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("ollama"));
        assert!(msg.contains("connection refused"));
    }
}
