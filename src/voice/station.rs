//! Audio rendering for commentary segments.

use crate::commentary::types::CommentarySegment;
use crate::error::Result;
use crate::pipeline::error::{ErrorReporter, LogReporter, StationError};
use crate::pipeline::station::Station;
use crate::pipeline::types::PipelineItem;
use crate::voice::synthesizer::{AudioStore, RateLimiter, VoiceProfile, VoiceSynthesizer};
use std::sync::Arc;

/// Synthesizes and stores audio for one segment at a time.
pub struct VoiceRenderer {
    synthesizer: Box<dyn VoiceSynthesizer>,
    profile: VoiceProfile,
    limiter: RateLimiter,
    store: AudioStore,
}

impl VoiceRenderer {
    pub fn new(
        synthesizer: Box<dyn VoiceSynthesizer>,
        profile: VoiceProfile,
        limiter: RateLimiter,
        store: AudioStore,
    ) -> Self {
        Self {
            synthesizer,
            profile,
            limiter,
            store,
        }
    }

    pub fn synthesizer_name(&self) -> &str {
        self.synthesizer.name()
    }

    /// Sets `segment.audio_ref` on success. On failure the segment is left
    /// untouched and the error returned.
    pub fn render(&mut self, segment: &mut CommentarySegment) -> Result<()> {
        self.limiter.wait();
        let audio = self.synthesizer.synthesize(&segment.text, &self.profile)?;
        let path = self
            .store
            .save(segment.timestamp, self.synthesizer.extension(), &audio)?;
        segment.audio_ref = Some(path.display().to_string());
        Ok(())
    }

    /// Renders every segment, reporting failures without stopping.
    pub fn render_all(
        &mut self,
        segments: &mut [CommentarySegment],
        reporter: &dyn ErrorReporter,
    ) -> usize {
        let mut rendered = 0;
        for segment in segments {
            match self.render(segment) {
                Ok(()) => rendered += 1,
                Err(e) => reporter.report(
                    "voice",
                    &StationError::Recoverable(format!("t={:.2}s: {e}", segment.timestamp)),
                ),
            }
        }
        rendered
    }
}

/// Live-pipeline station wrapping a [`VoiceRenderer`].
///
/// Segments always pass through; a synthesis failure only leaves the audio
/// reference empty.
pub struct VoiceStation {
    renderer: VoiceRenderer,
    reporter: Arc<dyn ErrorReporter>,
    rendered: usize,
    failed: usize,
}

impl VoiceStation {
    pub fn new(renderer: VoiceRenderer) -> Self {
        Self {
            renderer,
            reporter: Arc::new(LogReporter),
            rendered: 0,
            failed: 0,
        }
    }

    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }
}

impl Station for VoiceStation {
    type Input = PipelineItem;
    type Output = PipelineItem;

    fn process(
        &mut self,
        input: PipelineItem,
    ) -> std::result::Result<Option<PipelineItem>, StationError> {
        let PipelineItem::Segment(mut segment) = input else {
            return Ok(Some(input));
        };
        match self.renderer.render(&mut segment) {
            Ok(()) => self.rendered += 1,
            Err(e) => {
                self.failed += 1;
                self.reporter.report(
                    self.name(),
                    &StationError::Recoverable(format!("t={:.2}s: {e}", segment.timestamp)),
                );
            }
        }
        Ok(Some(PipelineItem::Segment(segment)))
    }

    fn name(&self) -> &'static str {
        "voice"
    }

    fn shutdown(&mut self) {
        tracing::debug!(
            rendered = self.rendered,
            failed = self.failed,
            synthesizer = self.renderer.synthesizer_name(),
            "Voice station finished"
        );
    }
}
