//! Commentary requests and rendered segments.

use crate::events::types::{EventType, GameEvent};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Delivery style of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentaryStyle {
    PlayByPlay,
    Analysis,
    Excitement,
    Educational,
}

impl CommentaryStyle {
    /// Rotation used for filler lines.
    pub const FILLER_CYCLE: [CommentaryStyle; 4] = [
        CommentaryStyle::PlayByPlay,
        CommentaryStyle::Analysis,
        CommentaryStyle::Excitement,
        CommentaryStyle::Educational,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommentaryStyle::PlayByPlay => "play_by_play",
            CommentaryStyle::Analysis => "analysis",
            CommentaryStyle::Excitement => "excitement",
            CommentaryStyle::Educational => "educational",
        }
    }

    /// Accepts the snake_case tag or the camelCase/kebab spellings control
    /// clients send ("playByPlay", "play-by-play").
    pub fn parse(value: &str) -> Option<Self> {
        let key: String = value
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "playbyplay" => Some(CommentaryStyle::PlayByPlay),
            "analysis" => Some(CommentaryStyle::Analysis),
            "excitement" => Some(CommentaryStyle::Excitement),
            "educational" => Some(CommentaryStyle::Educational),
            _ => None,
        }
    }
}

impl fmt::Display for CommentaryStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event the scheduler decided to speak about, with its resolved style.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentaryRequest {
    pub event: GameEvent,
    pub style: CommentaryStyle,
}

/// One rendered line of commentary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentarySegment {
    pub timestamp: f64,
    pub text: String,
    pub event_type: EventType,
    pub importance: u8,
    pub style: CommentaryStyle,
    #[serde(default)]
    pub audio_ref: Option<String>,
}

impl CommentarySegment {
    pub fn new(request: &CommentaryRequest, text: String) -> Self {
        Self {
            timestamp: request.event.timestamp,
            text,
            event_type: request.event.event_type(),
            importance: request.event.importance,
            style: request.style,
            audio_ref: None,
        }
    }
}

/// Stable ascending sort by timestamp.
pub fn sort_segments(segments: &mut [CommentarySegment]) {
    segments.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::types::EventKind;

    #[test]
    fn test_style_parse_variants() {
        assert_eq!(
            CommentaryStyle::parse("playByPlay"),
            Some(CommentaryStyle::PlayByPlay)
        );
        assert_eq!(
            CommentaryStyle::parse("play-by-play"),
            Some(CommentaryStyle::PlayByPlay)
        );
        assert_eq!(
            CommentaryStyle::parse("ANALYSIS"),
            Some(CommentaryStyle::Analysis)
        );
        assert_eq!(CommentaryStyle::parse("poetry"), None);
    }

    #[test]
    fn test_segment_from_request() {
        let request = CommentaryRequest {
            event: GameEvent::new(4.0, EventKind::SpikePlant),
            style: CommentaryStyle::Excitement,
        };
        let segment = CommentarySegment::new(&request, "Planted!".to_string());
        assert_eq!(segment.timestamp, 4.0);
        assert_eq!(segment.event_type, EventType::SpikePlant);
        assert_eq!(segment.importance, 5);
        assert_eq!(segment.audio_ref, None);
    }

    #[test]
    fn test_segment_json_keeps_null_audio() {
        let request = CommentaryRequest {
            event: GameEvent::new(1.0, EventKind::GenericFiller),
            style: CommentaryStyle::Analysis,
        };
        let segment = CommentarySegment::new(&request, "text".to_string());
        let json = serde_json::to_value(&segment).unwrap();
        assert!(json["audio_ref"].is_null());
        assert_eq!(json["style"], "analysis");
        assert_eq!(json["event_type"], "generic_filler");
    }

    #[test]
    fn test_sort_segments_is_stable() {
        let make = |t: f64, text: &str| CommentarySegment {
            timestamp: t,
            text: text.to_string(),
            event_type: EventType::GenericFiller,
            importance: 2,
            style: CommentaryStyle::PlayByPlay,
            audio_ref: None,
        };
        let mut segments = vec![make(2.0, "b"), make(1.0, "a"), make(2.0, "c")];
        sort_segments(&mut segments);
        let texts: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }
}
