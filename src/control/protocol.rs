//! JSON line protocol between the CLI and the live daemon.

use crate::commentary::types::CommentaryStyle;
use crate::config::Config;
use crate::error::{FragcastError, Result};
use crate::pipeline::error::ErrorRecord;
use serde::{Deserialize, Serialize};

/// Per-session overrides accepted by `start`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    /// Any spelling `CommentaryStyle::parse` accepts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commentary_style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commentary_interval_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_importance: Option<u8>,
}

impl SessionSettings {
    /// Overlays these settings on `config`, rejecting values the session
    /// could not run with.
    pub fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(style) = &self.commentary_style {
            let parsed =
                CommentaryStyle::parse(style).ok_or_else(|| FragcastError::ConfigInvalidValue {
                    key: "commentary_style".to_string(),
                    message: format!("unknown style '{style}'"),
                })?;
            config.commentary.style = Some(parsed);
        }
        if let Some(interval) = self.commentary_interval_seconds {
            config.scheduler.min_interval = interval;
        }
        if let Some(importance) = self.override_importance {
            config.scheduler.override_importance = importance;
        }
        if self.map.is_some() {
            config.commentary.map = self.map.clone();
        }
        if self.agent.is_some() {
            config.commentary.agent = self.agent.clone();
        }
        config.validate()
    }
}

/// Commands sent by the CLI to the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Start a live session
    Start {
        session_id: String,
        #[serde(default)]
        settings: SessionSettings,
    },
    /// Stop the live session after flushing it
    Stop,
    Pause,
    Resume,
    Status,
}

impl Command {
    /// Serialize command to JSON string.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize command from JSON string.
    pub fn from_json(s: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Responses sent by the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Ok,
    Status {
        active: bool,
        paused: bool,
        session_id: Option<String>,
        segments: usize,
        /// Most recent errors reported by the session, oldest first.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        errors: Vec<ErrorRecord>,
    },
    /// Session ended; its output has been written by the sinks
    Stopped {
        session_id: String,
        segments: usize,
        events: usize,
    },
    Error {
        message: String,
    },
}

impl Response {
    /// Serialize response to JSON string.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize response from JSON string.
    pub fn from_json(s: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            message: message.into(),
        }
    }
}
