use std::path::PathBuf;
use std::time::Duration;

type Source = Box<dyn std::error::Error + Send + Sync>;

/// Errors produced by engines, the router and the playback controller.
///
/// Variants carry the originating engine where one is involved, and
/// optionally wrap the underlying cause.
#[derive(thiserror::Error, Debug)]
pub enum TtsError {
    #[error("Engine '{engine}' is not available: {reason}")]
    EngineNotAvailable { engine: String, reason: String },

    #[error("Voice '{voice}' not found for engine '{engine}'. Call list_voices to see available voices.")]
    VoiceNotFound { engine: String, voice: String },

    #[error("Text is too long: {length} characters (maximum {max})")]
    TextTooLong { length: usize, max: usize },

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Synthesis failed in engine '{engine}': {message}")]
    SynthesisFailed {
        engine: String,
        message: String,
        #[source]
        source: Option<Source>,
    },

    #[error("File operation failed on {}: {source}", .path.display())]
    FileOperationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Audio file not found: {}", describe_missing(.0))]
    FileNotFound(PathBuf),

    #[error("{operation} timed out after {}s", .after.as_secs())]
    Timeout {
        engine: Option<String>,
        operation: String,
        after: Duration,
    },

    #[error("Playback failed: {message}")]
    PlaybackFailed {
        message: String,
        #[source]
        source: Option<Source>,
    },
}

impl TtsError {
    pub fn unavailable(engine: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EngineNotAvailable {
            engine: engine.into(),
            reason: reason.into(),
        }
    }

    pub fn synthesis(engine: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SynthesisFailed {
            engine: engine.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn synthesis_with(
        engine: impl Into<String>,
        message: impl Into<String>,
        source: impl Into<Source>,
    ) -> Self {
        Self::SynthesisFailed {
            engine: engine.into(),
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn file_op(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileOperationFailed {
            path: path.into(),
            source,
        }
    }

    pub fn playback(message: impl Into<String>) -> Self {
        Self::PlaybackFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Stable machine-readable code used in tool payloads.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EngineNotAvailable { .. } => "ENGINE_NOT_AVAILABLE",
            Self::VoiceNotFound { .. } => "VOICE_NOT_FOUND",
            Self::TextTooLong { .. } => "TEXT_TOO_LONG",
            Self::InvalidParameters(_) => "INVALID_PARAMETERS",
            Self::SynthesisFailed { .. } => "SYNTHESIS_FAILED",
            Self::FileOperationFailed { .. } => "FILE_OPERATION_FAILED",
            Self::FileNotFound(_) => "FILE_NOT_FOUND",
            Self::Timeout { .. } => "TIMEOUT",
            Self::PlaybackFailed { .. } => "PLAYBACK_FAILED",
        }
    }

    /// The engine this error originated from, if any.
    pub fn engine(&self) -> Option<&str> {
        match self {
            Self::EngineNotAvailable { engine, .. }
            | Self::VoiceNotFound { engine, .. }
            | Self::SynthesisFailed { engine, .. } => Some(engine),
            Self::Timeout { engine, .. } => engine.as_deref(),
            _ => None,
        }
    }
}

fn describe_missing(path: &std::path::Path) -> String {
    if path.as_os_str().is_empty() {
        "no path given and nothing has been synthesized yet".to_string()
    } else {
        path.display().to_string()
    }
}

pub type TtsResult<T> = Result<T, TtsError>;

#[cfg(test)]
mod tests {
    use super::TtsError;
    use std::time::Duration;

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            TtsError::unavailable("kokoro", "no python").code(),
            "ENGINE_NOT_AVAILABLE"
        );
        assert_eq!(
            TtsError::TextTooLong {
                length: 50_001,
                max: 50_000
            }
            .code(),
            "TEXT_TOO_LONG"
        );
        assert_eq!(TtsError::playback("no player").code(), "PLAYBACK_FAILED");
    }

    #[test]
    fn timeout_carries_engine_tag() {
        let err = TtsError::Timeout {
            engine: Some("system".to_string()),
            operation: "say synthesis".to_string(),
            after: Duration::from_secs(300),
        };
        assert_eq!(err.engine(), Some("system"));
        assert_eq!(err.to_string(), "say synthesis timed out after 300s");
    }

    #[test]
    fn synthesis_error_exposes_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "broken pipe");
        let err = TtsError::synthesis_with("kokoro", "script failed", io);
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.engine(), Some("kokoro"));
    }
}
