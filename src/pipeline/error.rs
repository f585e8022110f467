//! Station errors and the session error channel.

use crate::error::FragcastError;
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors a station can return while processing an item.
#[derive(Debug, Clone, PartialEq)]
pub enum StationError {
    /// The item failed; the station keeps running.
    Recoverable(String),
    /// The station must stop.
    Fatal(String),
}

impl fmt::Display for StationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StationError::Recoverable(msg) => write!(f, "Recoverable error: {msg}"),
            StationError::Fatal(msg) => write!(f, "Fatal error: {msg}"),
        }
    }
}

impl std::error::Error for StationError {}

impl From<FragcastError> for StationError {
    fn from(error: FragcastError) -> Self {
        if error.is_fatal() {
            StationError::Fatal(error.to_string())
        } else {
            StationError::Recoverable(error.to_string())
        }
    }
}

impl StationError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, StationError::Fatal(_))
    }
}

/// Receives errors from stations and the worker loop.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, stage: &str, error: &StationError);
}

/// Reports through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, stage: &str, error: &StationError) {
        match error {
            StationError::Recoverable(msg) => tracing::warn!(stage, "{msg}"),
            StationError::Fatal(msg) => tracing::error!(stage, "{msg}"),
        }
    }
}

/// Structured record sent on the session error channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub message: String,
    /// RFC 3339 wall-clock time the error was reported.
    pub timestamp: String,
    pub session_id: Option<String>,
    pub stage: String,
    pub fatal: bool,
}

/// Logs every error and forwards it as an [`ErrorRecord`].
///
/// A full or disconnected channel never blocks the reporting stage.
pub struct ChannelReporter {
    session_id: Option<String>,
    tx: Sender<ErrorRecord>,
}

impl ChannelReporter {
    pub fn new(session_id: Option<String>, tx: Sender<ErrorRecord>) -> Self {
        Self { session_id, tx }
    }
}

impl ErrorReporter for ChannelReporter {
    fn report(&self, stage: &str, error: &StationError) {
        LogReporter.report(stage, error);
        let message = match error {
            StationError::Recoverable(msg) | StationError::Fatal(msg) => msg.clone(),
        };
        let record = ErrorRecord {
            message,
            timestamp: chrono::Utc::now().to_rfc3339(),
            session_id: self.session_id.clone(),
            stage: stage.to_string(),
            fatal: error.is_fatal(),
        };
        if self.tx.try_send(record).is_err() {
            tracing::debug!(stage, "Error channel unavailable, record dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn test_station_error_display() {
        let recoverable = StationError::Recoverable("quota exceeded".to_string());
        assert_eq!(recoverable.to_string(), "Recoverable error: quota exceeded");

        let fatal = StationError::Fatal("capture lost".to_string());
        assert_eq!(fatal.to_string(), "Fatal error: capture lost");
    }

    #[test]
    fn test_from_fragcast_error_keeps_severity() {
        let fatal: StationError = FragcastError::fatal_capture("capture", 1.0, "gone").into();
        assert!(fatal.is_fatal());

        let soft: StationError = FragcastError::Synthesis {
            message: "quota".to_string(),
        }
        .into();
        assert!(!soft.is_fatal());
    }

    #[test]
    fn test_channel_reporter_sends_record() {
        let (tx, rx) = bounded(4);
        let reporter = ChannelReporter::new(Some("match-1".to_string()), tx);
        reporter.report(
            "voice",
            &StationError::Recoverable("Voice synthesis failed: quota".to_string()),
        );

        let record = rx.try_recv().unwrap();
        assert_eq!(record.message, "Voice synthesis failed: quota");
        assert_eq!(record.session_id.as_deref(), Some("match-1"));
        assert_eq!(record.stage, "voice");
        assert!(!record.fatal);
        assert!(chrono::DateTime::parse_from_rfc3339(&record.timestamp).is_ok());
    }

    #[test]
    fn test_channel_reporter_never_blocks() {
        let (tx, rx) = bounded(1);
        let reporter = ChannelReporter::new(None, tx);
        reporter.report("a", &StationError::Recoverable("one".to_string()));
        reporter.report("a", &StationError::Recoverable("two".to_string()));
        assert_eq!(rx.len(), 1);
        drop(rx);
        reporter.report("a", &StationError::Fatal("three".to_string()));
    }

    #[test]
    fn test_log_reporter_does_not_panic() {
        LogReporter.report("test", &StationError::Fatal("boom".to_string()));
    }
}
