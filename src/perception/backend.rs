//! Perception backend trait.

use crate::error::Result;
use crate::frame::Frame;
use crate::perception::types::{BoundingBox, DetectionRecord, TextDetection};
use serde::{Deserialize, Serialize};

/// Object detection plus OCR over a single frame.
///
/// Backends are selected explicitly by configuration; nothing probes for an
/// installed model at runtime.
pub trait PerceptionBackend: Send {
    /// Detected HUD objects, possibly already carrying recognized text.
    fn detect_objects(&mut self, frame: &Frame) -> Result<Vec<DetectionRecord>>;

    /// Text inside `bbox`, for objects the detector returned without text.
    fn detect_text(&mut self, frame: &Frame, bbox: &BoundingBox) -> Result<Vec<TextDetection>>;

    /// Backend name for logging.
    fn name(&self) -> &'static str;
}

/// Which backend to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Mock,
    /// Pre-computed detections read from a JSON log.
    Replay,
}

impl BackendKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "mock" => Some(BackendKind::Mock),
            "replay" => Some(BackendKind::Replay),
            _ => None,
        }
    }
}

/// What to do when the configured backend cannot be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Continue on the mock backend and warn once.
    #[default]
    Mock,
    /// Abort the session.
    Fail,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!(BackendKind::parse("Replay"), Some(BackendKind::Replay));
        assert_eq!(BackendKind::parse("mock"), Some(BackendKind::Mock));
        assert_eq!(BackendKind::parse("yolo"), None);
    }

    #[test]
    fn test_fallback_deserialize() {
        #[derive(Deserialize)]
        struct Wrapper {
            fallback: FallbackPolicy,
        }
        let w: Wrapper = toml::from_str("fallback = \"fail\"").unwrap();
        assert_eq!(w.fallback, FallbackPolicy::Fail);
    }
}
