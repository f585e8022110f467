//! Perception backend that replays a recorded detection log.

use crate::error::{FragcastError, Result};
use crate::frame::Frame;
use crate::perception::backend::PerceptionBackend;
use crate::perception::types::{BoundingBox, DetectionRecord, TextDetection};
use std::path::Path;

/// Detections loaded from a JSON array of records.
///
/// Each record is handed out once, to the first frame whose timestamp is at
/// or after its own.
#[derive(Debug, Clone)]
pub struct ReplayPerceptionBackend {
    records: Vec<DetectionRecord>,
    cursor: usize,
    skipped: usize,
}

impl ReplayPerceptionBackend {
    /// Loads a detection log. A missing or unreadable log makes the backend
    /// unavailable.
    pub fn open(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| FragcastError::PerceptionUnavailable {
                backend: "replay".to_string(),
                reason: format!("{}: {e}", path.display()),
            })?;
        Self::from_json(&contents)
    }

    /// Parses a log. Entries that are not valid records are skipped and
    /// counted; a document that is not a JSON array is an error.
    pub fn from_json(json: &str) -> Result<Self> {
        let values: Vec<serde_json::Value> =
            serde_json::from_str(json).map_err(|e| FragcastError::PerceptionUnavailable {
                backend: "replay".to_string(),
                reason: format!("detection log is not a JSON array: {e}"),
            })?;

        let mut skipped = 0;
        let mut records: Vec<DetectionRecord> = values
            .into_iter()
            .enumerate()
            .filter_map(|(i, value)| match serde_json::from_value(value) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!("Skipping detection log entry {i}: {e}");
                    skipped += 1;
                    None
                }
            })
            .collect();
        records.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

        Ok(Self {
            records,
            cursor: 0,
            skipped,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Entries dropped while parsing the log.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl PerceptionBackend for ReplayPerceptionBackend {
    fn detect_objects(&mut self, frame: &Frame) -> Result<Vec<DetectionRecord>> {
        let start = self.cursor;
        while self
            .records
            .get(self.cursor)
            .is_some_and(|r| r.timestamp <= frame.timestamp)
        {
            self.cursor += 1;
        }
        Ok(self.records[start..self.cursor].to_vec())
    }

    fn detect_text(&mut self, _frame: &Frame, _bbox: &BoundingBox) -> Result<Vec<TextDetection>> {
        // Logs carry their text inline; there are no pixels to read.
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "replay"
    }
}
