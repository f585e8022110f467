//! Deterministic perception backend.
//!
//! Output depends only on the seed and the frame index, so two runs over the
//! same frames see identical detections. Frames are grouped into rounds of
//! [`ROUND_FRAMES`]: a buy phase, then a countdown, with the scoreboard
//! advancing once per round. Every third frame carries an event box whose
//! text is produced by OCR, like a real detector feeding a text recognizer.

use crate::error::{FragcastError, Result};
use crate::frame::Frame;
use crate::perception::backend::PerceptionBackend;
use crate::perception::types::{BoundingBox, DetectionRecord, Region, TextDetection};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const ROUND_FRAMES: u64 = 60;
const BUY_FRAMES: u64 = 10;

const WEAPONS: &[&str] = &[
    "Vandal", "Phantom", "Operator", "Ghost", "Sheriff", "Spectre", "Judge",
];
const STATUSES: &[&str] = &["OWNED", "REQUESTING", "EQUIPPED"];
const PLAYERS: &[&str] = &["TenZ", "ScreaM", "Shroud", "Player1", "Player2"];

/// Seeded stand-in for a trained detector and OCR engine.
#[derive(Debug, Clone)]
pub struct MockPerceptionBackend {
    seed: u64,
    kill_feed_every: u64,
    fail: bool,
}

impl MockPerceptionBackend {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            kill_feed_every: 7,
            fail: false,
        }
    }

    /// Make every call fail, to exercise error paths.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(0)
        }
    }

    fn rng_for(&self, index: u64) -> StdRng {
        StdRng::seed_from_u64(self.seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ index)
    }

    fn event_box() -> BoundingBox {
        BoundingBox::new(100.0, 100.0, 100.0, 50.0)
    }

    fn timer_text(index: u64) -> String {
        let pos = index % ROUND_FRAMES;
        if pos < BUY_FRAMES {
            return "BUY PHASE".to_string();
        }
        let remaining = 100u64.saturating_sub((pos - BUY_FRAMES) * 2);
        format!("{}:{:02}", remaining / 60, remaining % 60)
    }

    fn score_text(index: u64) -> String {
        let completed = index / ROUND_FRAMES;
        format!("{}-{}", completed.div_ceil(2), completed / 2)
    }
}

impl Default for MockPerceptionBackend {
    fn default() -> Self {
        Self::new(0)
    }
}

fn pick<'a>(rng: &mut StdRng, items: &[&'a str]) -> &'a str {
    items[rng.gen_range(0..items.len())]
}

impl PerceptionBackend for MockPerceptionBackend {
    fn detect_objects(&mut self, frame: &Frame) -> Result<Vec<DetectionRecord>> {
        if self.fail {
            return Err(FragcastError::PerceptionUnavailable {
                backend: self.name().to_string(),
                reason: "mock failure".to_string(),
            });
        }
        let ts = frame.timestamp;
        let mut records = vec![
            DetectionRecord::text(Region::Timer, Self::timer_text(frame.index), 0.95, ts)
                .with_label("timer"),
            DetectionRecord::text(Region::Scoreboard, Self::score_text(frame.index), 0.9, ts)
                .with_label("scoreboard"),
        ];

        if frame.index % 3 == 0 {
            records.push(DetectionRecord {
                region: Region::Center,
                bbox: Self::event_box(),
                label: "event-box".to_string(),
                text: None,
                confidence: 0.85 + (frame.index % 10) as f32 * 0.01,
                timestamp: ts,
            });
        }

        if self.kill_feed_every > 0 && frame.index % self.kill_feed_every == 0 {
            let mut rng = self.rng_for(frame.index.wrapping_add(1));
            let text = format!("{} {}", pick(&mut rng, PLAYERS), pick(&mut rng, WEAPONS));
            records.push(
                DetectionRecord::text(Region::KillFeed, text, 0.8, ts).with_label("kill-feed"),
            );
        }

        Ok(records)
    }

    fn detect_text(&mut self, frame: &Frame, _bbox: &BoundingBox) -> Result<Vec<TextDetection>> {
        if self.fail {
            return Err(FragcastError::PerceptionUnavailable {
                backend: self.name().to_string(),
                reason: "mock failure".to_string(),
            });
        }
        let mut rng = self.rng_for(frame.index);
        let text = format!(
            "{} {} {}",
            pick(&mut rng, STATUSES),
            pick(&mut rng, WEAPONS),
            pick(&mut rng, PLAYERS)
        );
        Ok(vec![TextDetection {
            text,
            confidence: 0.9,
        }])
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
