//! Frame-to-commentary processing shared by batch and live sessions.

use crate::commentary::generator::CommentaryGenerator;
use crate::commentary::scheduler::{CommentaryScheduler, Decision, SuppressReason};
use crate::commentary::types::{CommentaryRequest, CommentarySegment};
use crate::config::Config;
use crate::error::Result;
use crate::events::classifier::EventClassifier;
use crate::frame::Frame;
use crate::perception::adapter::PerceptionAdapter;
use crate::perception::types::DetectionRecord;
use crate::pipeline::types::EventLogEntry;
use crate::state::{EventOrigin, GameState, PhaseStateMachine, TrackedEvent};

/// Runs perception, classification, phase tracking, scheduling and text
/// generation for one frame at a time.
///
/// Every event reaching the scheduler (or absorbed before it) gets exactly one
/// audit entry. Timestamps are clamped so events and segments never go
/// backwards.
pub struct CommentaryEngine {
    perception: PerceptionAdapter,
    classifier: EventClassifier,
    phase: PhaseStateMachine,
    scheduler: CommentaryScheduler,
    generator: CommentaryGenerator,
    audit: Vec<EventLogEntry>,
    last_timestamp: Option<f64>,
}

impl CommentaryEngine {
    pub fn new(
        perception: PerceptionAdapter,
        classifier: EventClassifier,
        phase: PhaseStateMachine,
        scheduler: CommentaryScheduler,
        generator: CommentaryGenerator,
    ) -> Self {
        Self {
            perception,
            classifier,
            phase,
            scheduler,
            generator,
            audit: Vec::new(),
            last_timestamp: None,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let perception = PerceptionAdapter::from_config(&config.perception)?;
        let classifier = EventClassifier::new(config.classifier.players.clone())
            .with_location_extraction(config.classifier.extract_locations);
        let scheduler = CommentaryScheduler::new(config.scheduler)
            .with_preferred_style(config.commentary.style);
        let generator = CommentaryGenerator::with_optional_seed(config.commentary.seed);

        let mut engine = Self::new(
            perception,
            classifier,
            PhaseStateMachine::new(config.phase),
            scheduler,
            generator,
        );
        engine.set_context(
            config.commentary.map.clone(),
            config.commentary.agent.clone(),
        );
        Ok(engine)
    }

    /// Map and agent used by templates.
    pub fn set_context(&mut self, map: Option<String>, agent: Option<String>) {
        self.phase.set_context(map, agent);
    }

    pub fn state(&self) -> &GameState {
        self.phase.state()
    }

    pub fn perception(&self) -> &PerceptionAdapter {
        &self.perception
    }

    /// Analyzes `frame` and returns the segments it produced, in order.
    ///
    /// Only perception can fail; a failure leaves scheduler and phase state
    /// untouched.
    pub fn process_frame(&mut self, frame: &Frame) -> Result<Vec<CommentarySegment>> {
        let detections = self.perception.analyze(frame)?;
        Ok(self.process_detections(frame.timestamp, &detections))
    }

    /// Runs everything after perception on an already filtered detection set.
    pub fn process_detections(
        &mut self,
        timestamp: f64,
        detections: &[DetectionRecord],
    ) -> Vec<CommentarySegment> {
        let now = self.advance(timestamp);
        let events = self.classifier.classify(detections);
        let tracked = self.phase.observe(now, detections, events);

        let mut segments = Vec::new();
        for TrackedEvent { mut event, origin } in tracked {
            event.timestamp = self.advance(event.timestamp);
            for request in self.scheduler.tick(event.timestamp) {
                segments.push(self.render_filler(request));
            }

            if origin == EventOrigin::Absorbed {
                self.audit.push(EventLogEntry {
                    event,
                    origin,
                    suppressed: Some(SuppressReason::Absorbed),
                    commentary: None,
                });
                continue;
            }

            match self.scheduler.offer(&event) {
                Decision::Emit(request) => {
                    let segment = self.generator.render(&request, self.phase.state());
                    self.audit.push(EventLogEntry {
                        event,
                        origin,
                        suppressed: None,
                        commentary: Some(segment.text.clone()),
                    });
                    segments.push(segment);
                }
                Decision::Suppress(reason) => {
                    tracing::trace!(
                        event_type = %event.event_type(),
                        t = event.timestamp,
                        ?reason,
                        "Event suppressed"
                    );
                    self.audit.push(EventLogEntry {
                        event,
                        origin,
                        suppressed: Some(reason),
                        commentary: None,
                    });
                }
            }
        }

        let now = self.advance(now);
        for request in self.scheduler.tick(now) {
            segments.push(self.render_filler(request));
        }
        segments
    }

    /// Ends the session, committing filler that is still due.
    pub fn finish(&mut self) -> Vec<CommentarySegment> {
        let Some(end) = self.last_timestamp else {
            return Vec::new();
        };
        self.scheduler
            .flush(end)
            .into_iter()
            .map(|request| self.render_filler(request))
            .collect()
    }

    /// Returns and clears the audit log.
    pub fn take_audit_log(&mut self) -> Vec<EventLogEntry> {
        std::mem::take(&mut self.audit)
    }

    fn render_filler(&mut self, request: CommentaryRequest) -> CommentarySegment {
        let segment = self.generator.render(&request, self.phase.state());
        self.audit.push(EventLogEntry {
            event: request.event,
            origin: EventOrigin::Derived,
            suppressed: None,
            commentary: Some(segment.text.clone()),
        });
        segment
    }

    /// Clamps `timestamp` to the latest time seen, frame times included, so a
    /// record older than its frame is stamped with the frame time.
    fn advance(&mut self, timestamp: f64) -> f64 {
        let t = match self.last_timestamp {
            Some(last) if timestamp < last => last,
            _ => timestamp,
        };
        self.last_timestamp = Some(t);
        t
    }
}
