//! Detection records exchanged between perception backends and the classifier.

use crate::error::{FragcastError, Result};
use serde::{Deserialize, Serialize};

/// HUD region a detection was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    KillFeed,
    Timer,
    Scoreboard,
    Center,
    BuyMenu,
    Abilities,
    #[default]
    Unknown,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::KillFeed => "kill_feed",
            Region::Timer => "timer",
            Region::Scoreboard => "scoreboard",
            Region::Center => "center",
            Region::BuyMenu => "buy_menu",
            Region::Abilities => "abilities",
            Region::Unknown => "unknown",
        }
    }
}

/// Axis-aligned box in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_valid(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
            && self.width >= 0.0
            && self.height >= 0.0
    }
}

/// One object or text span detected in a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    #[serde(default)]
    pub region: Region,
    #[serde(default)]
    pub bbox: BoundingBox,
    /// Detector class, e.g. "event-box" or "timer".
    #[serde(default)]
    pub label: String,
    /// Recognized text, when the backend ran OCR on this box.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub confidence: f32,
    pub timestamp: f64,
}

impl DetectionRecord {
    pub fn text(
        region: Region,
        text: impl Into<String>,
        confidence: f32,
        timestamp: f64,
    ) -> Self {
        Self {
            region,
            bbox: BoundingBox::default(),
            label: "text".to_string(),
            text: Some(text.into()),
            confidence,
            timestamp,
        }
    }

    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = bbox;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Rejects records no classifier should see: NaN or out-of-range
    /// confidence, non-finite timestamps, degenerate boxes.
    pub fn validate(&self) -> Result<()> {
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(FragcastError::DetectionParse {
                message: format!("confidence {} outside 0.0..=1.0", self.confidence),
            });
        }
        if !self.timestamp.is_finite() || self.timestamp < 0.0 {
            return Err(FragcastError::DetectionParse {
                message: format!("invalid timestamp {}", self.timestamp),
            });
        }
        if !self.bbox.is_valid() {
            return Err(FragcastError::DetectionParse {
                message: format!("invalid bounding box {:?}", self.bbox),
            });
        }
        Ok(())
    }
}

/// Text recognized inside a bounding box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextDetection {
    pub text: String,
    pub confidence: f32,
}
