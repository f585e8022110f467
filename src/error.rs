//! Error types for fragcast.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FragcastError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Perception errors
    #[error("Perception backend '{backend}' unavailable: {reason}")]
    PerceptionUnavailable { backend: String, reason: String },

    #[error("Malformed detection record: {message}")]
    DetectionParse { message: String },

    // Voice synthesis errors
    #[error("Voice synthesis failed: {message}")]
    Synthesis { message: String },

    #[error("Voice synthesis tool not found: {tool}")]
    SynthesisToolNotFound { tool: String },

    // Frame source errors
    #[error("Frame source exhausted")]
    FrameSourceExhausted,

    #[error("Fatal capture error in {stage} at t={timestamp:.2}s: {message}")]
    FatalCapture {
        stage: String,
        timestamp: f64,
        message: String,
    },

    // Live control errors
    #[error("Control socket error: {message}")]
    ControlSocket { message: String },

    #[error("Control protocol error: {message}")]
    ControlProtocol { message: String },

    #[error("Control connection failed: {message}")]
    ControlConnection { message: String },

    #[error("Session error: {message}")]
    Session { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl FragcastError {
    /// Builds a [`FragcastError::FatalCapture`] tagged with the failing stage.
    pub fn fatal_capture(stage: &str, timestamp: f64, message: impl Into<String>) -> Self {
        FragcastError::FatalCapture {
            stage: stage.to_string(),
            timestamp,
            message: message.into(),
        }
    }

    /// Returns true for errors that must abort the pipeline.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FragcastError::FatalCapture { .. })
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, FragcastError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_config_invalid_value_display() {
        let error = FragcastError::ConfigInvalidValue {
            key: "perception.confidence_threshold".to_string(),
            message: "must be within 0.0..=1.0".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for perception.confidence_threshold: must be within 0.0..=1.0"
        );
    }

    #[test]
    fn test_perception_unavailable_display() {
        let error = FragcastError::PerceptionUnavailable {
            backend: "replay".to_string(),
            reason: "detections.json not found".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Perception backend 'replay' unavailable: detections.json not found"
        );
    }

    #[test]
    fn test_fatal_capture_carries_stage_and_timestamp() {
        let error = FragcastError::fatal_capture("frame_source", 12.5, "device busy");
        assert_eq!(
            error.to_string(),
            "Fatal capture error in frame_source at t=12.50s: device busy"
        );
        assert!(error.is_fatal());
    }

    #[test]
    fn test_non_fatal_errors() {
        assert!(!FragcastError::FrameSourceExhausted.is_fatal());
        assert!(
            !FragcastError::Synthesis {
                message: "quota".to_string()
            }
            .is_fatal()
        );
    }

    #[test]
    fn test_synthesis_display() {
        let error = FragcastError::Synthesis {
            message: "quota exceeded".to_string(),
        };
        assert_eq!(error.to_string(), "Voice synthesis failed: quota exceeded");
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: FragcastError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_error = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let error: FragcastError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<FragcastError>();
        assert_sync::<FragcastError>();
    }
}
