//! Confidence filtering, OCR hand-off and backend fallback.

use crate::config::PerceptionConfig;
use crate::error::{FragcastError, Result};
use crate::frame::Frame;
use crate::perception::backend::{BackendKind, FallbackPolicy, PerceptionBackend};
use crate::perception::mock::MockPerceptionBackend;
use crate::perception::replay::ReplayPerceptionBackend;
use crate::perception::types::DetectionRecord;

/// Counters kept across a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PerceptionStats {
    pub frames: u64,
    pub kept: u64,
    pub below_threshold: u64,
    pub malformed: u64,
    pub ocr_calls: u64,
}

/// Wraps a backend and turns its raw output into records the classifier
/// can trust.
pub struct PerceptionAdapter {
    backend: Box<dyn PerceptionBackend>,
    threshold: f32,
    fallback: FallbackPolicy,
    fallback_seed: u64,
    fell_back: bool,
    stats: PerceptionStats,
}

impl PerceptionAdapter {
    pub fn new(backend: Box<dyn PerceptionBackend>, threshold: f32) -> Self {
        Self {
            backend,
            threshold,
            fallback: FallbackPolicy::Fail,
            fallback_seed: 0,
            fell_back: false,
            stats: PerceptionStats::default(),
        }
    }

    /// Allow switching to the mock backend if this one fails.
    pub fn with_fallback(mut self, policy: FallbackPolicy, seed: u64) -> Self {
        self.fallback = policy;
        self.fallback_seed = seed;
        self
    }

    /// Builds the configured backend, falling back to the mock backend when
    /// the policy allows it.
    pub fn from_config(config: &PerceptionConfig) -> Result<Self> {
        let backend: Result<Box<dyn PerceptionBackend>> = match config.backend {
            BackendKind::Mock => Ok(Box::new(MockPerceptionBackend::new(config.seed))),
            BackendKind::Replay => match &config.replay_path {
                Some(path) => ReplayPerceptionBackend::open(path)
                    .map(|b| Box::new(b) as Box<dyn PerceptionBackend>),
                None => Err(FragcastError::PerceptionUnavailable {
                    backend: "replay".to_string(),
                    reason: "perception.replay_path is not set".to_string(),
                }),
            },
        };

        let mut adapter = match backend {
            Ok(backend) => Self::new(backend, config.confidence_threshold),
            Err(e) if config.fallback == FallbackPolicy::Mock => {
                tracing::warn!("{e}; using mock perception");
                let mut adapter = Self::new(
                    Box::new(MockPerceptionBackend::new(config.seed)),
                    config.confidence_threshold,
                );
                adapter.fell_back = true;
                adapter
            }
            Err(e) => return Err(e),
        };
        adapter.fallback = config.fallback;
        adapter.fallback_seed = config.seed;
        Ok(adapter)
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// True once the adapter has switched to the mock backend.
    pub fn fell_back(&self) -> bool {
        self.fell_back
    }

    pub fn stats(&self) -> PerceptionStats {
        self.stats
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Detections in `frame` at or above the confidence threshold.
    ///
    /// Objects returned without text are passed through OCR. Malformed
    /// records are dropped and logged.
    pub fn analyze(&mut self, frame: &Frame) -> Result<Vec<DetectionRecord>> {
        self.stats.frames += 1;
        let raw = match self.backend.detect_objects(frame) {
            Ok(raw) => raw,
            Err(e) => {
                self.switch_to_fallback(e)?;
                self.backend.detect_objects(frame)?
            }
        };

        let mut kept = Vec::with_capacity(raw.len());
        for mut record in raw {
            if let Err(e) = record.validate() {
                self.stats.malformed += 1;
                tracing::warn!(
                    backend = self.backend.name(),
                    t = frame.timestamp,
                    "Dropping detection: {e}"
                );
                continue;
            }
            if record.confidence < self.threshold {
                self.stats.below_threshold += 1;
                continue;
            }
            if record.text.is_none() {
                self.stats.ocr_calls += 1;
                let texts = self.backend.detect_text(frame, &record.bbox)?;
                record.text = texts
                    .into_iter()
                    .filter(|t| t.confidence >= self.threshold)
                    .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
                    .map(|t| t.text);
            }
            kept.push(record);
        }
        self.stats.kept += kept.len() as u64;
        Ok(kept)
    }

    fn switch_to_fallback(&mut self, error: FragcastError) -> Result<()> {
        if self.fell_back || self.fallback == FallbackPolicy::Fail {
            return Err(error);
        }
        tracing::warn!(
            "{} backend failed ({error}); continuing with mock perception",
            self.backend.name()
        );
        self.backend = Box::new(MockPerceptionBackend::new(self.fallback_seed));
        self.fell_back = true;
        Ok(())
    }
}
