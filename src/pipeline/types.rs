//! Data passed between pipeline stages and handed to sinks.

use crate::commentary::scheduler::SuppressReason;
use crate::commentary::types::{CommentarySegment, sort_segments};
use crate::events::types::GameEvent;
use crate::state::EventOrigin;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Audit entry for one event: where it came from and what was decided.
///
/// Every event the engine sees gets exactly one entry, including events that
/// were never spoken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub event: GameEvent,
    pub origin: EventOrigin,
    /// Present when the event was not spoken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suppressed: Option<SuppressReason>,
    /// Rendered text, `None` when no segment was produced.
    pub commentary: Option<String>,
}

/// Items flowing from the worker through the voice and sink stations.
#[derive(Debug, Clone)]
pub enum PipelineItem {
    Segment(CommentarySegment),
    /// Last item of a session: the complete audit log.
    Finished { events: Vec<EventLogEntry> },
}

/// Per-session counters written into reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStatistics {
    pub total_events: usize,
    pub total_commentary: usize,
    pub high_impact_events: usize,
    pub audio_segments: usize,
    pub suppressed_events: usize,
    pub event_types: BTreeMap<String, usize>,
}

/// Everything a session produced, ordered by timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionResults {
    pub session_id: String,
    pub segments: Vec<CommentarySegment>,
    pub events: Vec<EventLogEntry>,
}

impl SessionResults {
    /// Builds results with segments and events sorted ascending by time.
    pub fn new(
        session_id: impl Into<String>,
        mut segments: Vec<CommentarySegment>,
        mut events: Vec<EventLogEntry>,
    ) -> Self {
        sort_segments(&mut segments);
        events.sort_by(|a, b| a.event.timestamp.total_cmp(&b.event.timestamp));
        Self {
            session_id: session_id.into(),
            segments,
            events,
        }
    }

    pub fn statistics(&self, high_impact: u8) -> SessionStatistics {
        let mut event_types = BTreeMap::new();
        for entry in &self.events {
            *event_types
                .entry(entry.event.event_type().as_str().to_string())
                .or_insert(0) += 1;
        }
        SessionStatistics {
            total_events: self.events.len(),
            total_commentary: self.segments.len(),
            high_impact_events: self
                .events
                .iter()
                .filter(|e| e.event.importance >= high_impact)
                .count(),
            audio_segments: self
                .segments
                .iter()
                .filter(|s| s.audio_ref.is_some())
                .count(),
            suppressed_events: self
                .events
                .iter()
                .filter(|e| e.suppressed.is_some())
                .count(),
            event_types,
        }
    }

    /// Time of the last segment or event, whichever is later.
    pub fn duration(&self) -> f64 {
        let last_segment = self.segments.last().map_or(0.0, |s| s.timestamp);
        let last_event = self.events.last().map_or(0.0, |e| e.event.timestamp);
        last_segment.max(last_event)
    }
}
