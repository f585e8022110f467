use crate::commentary::types::CommentarySegment;
use crate::error::Result;
use crate::output::render_segment;
use crate::pipeline::error::StationError;
use crate::pipeline::station::Station;
use crate::pipeline::types::{EventLogEntry, PipelineItem, SessionResults, SessionStatistics};
use crossbeam_channel::Sender;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Pluggable destination for session output.
/// Pairs with FrameSource for input; this handles commentary output.
pub trait ResultsSink: Send + 'static {
    /// Called for each segment as it is produced (live sessions only see
    /// these in emission order).
    fn segment(&mut self, _segment: &CommentarySegment) -> Result<()> {
        Ok(())
    }

    /// Called once with the complete, time-ordered results.
    fn finish(&mut self, results: &SessionResults) -> Result<()>;

    /// Name for logging/debugging.
    fn name(&self) -> &'static str {
        "sink"
    }
}

#[derive(Debug, Default)]
struct Collected {
    segments: Vec<CommentarySegment>,
    results: Option<SessionResults>,
}

/// Keeps everything in memory. Clones share storage, so a test can keep one
/// handle while the pipeline owns the other.
#[derive(Debug, Clone, Default)]
pub struct CollectorSink {
    inner: Arc<Mutex<Collected>>,
}

impl CollectorSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Segments in the order they were handed to [`ResultsSink::segment`].
    pub fn segments(&self) -> Vec<CommentarySegment> {
        self.lock().segments.clone()
    }

    pub fn results(&self) -> Option<SessionResults> {
        self.lock().results.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Collected> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ResultsSink for CollectorSink {
    fn segment(&mut self, segment: &CommentarySegment) -> Result<()> {
        self.lock().segments.push(segment.clone());
        Ok(())
    }

    fn finish(&mut self, results: &SessionResults) -> Result<()> {
        self.lock().results = Some(results.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "collector"
    }
}

#[derive(Serialize)]
struct Report<'a> {
    session_id: &'a str,
    generated_at: String,
    source: &'a str,
    statistics: SessionStatistics,
    events: &'a [EventLogEntry],
    commentary_segments: &'a [CommentarySegment],
}

/// Writes the full session as one JSON document.
pub struct JsonReportSink {
    path: PathBuf,
    source: String,
    high_impact: u8,
}

impl JsonReportSink {
    pub fn new(path: impl Into<PathBuf>, source: impl Into<String>, high_impact: u8) -> Self {
        Self {
            path: path.into(),
            source: source.into(),
            high_impact,
        }
    }
}

impl ResultsSink for JsonReportSink {
    fn finish(&mut self, results: &SessionResults) -> Result<()> {
        let report = Report {
            session_id: &results.session_id,
            generated_at: chrono::Utc::now().to_rfc3339(),
            source: &self.source,
            statistics: results.statistics(self.high_impact),
            events: &results.events,
            commentary_segments: &results.segments,
        };
        ensure_parent(&self.path)?;
        std::fs::write(&self.path, serde_json::to_string_pretty(&report)?)?;
        tracing::info!(path = %self.path.display(), "Wrote session report");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "json-report"
    }
}

/// Numbered plain-text transcript.
pub struct TranscriptSink {
    path: PathBuf,
}

impl TranscriptSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn render(results: &SessionResults) -> String {
        let mut out = format!("Commentary transcript: {}\n\n", results.session_id);
        for (i, segment) in results.segments.iter().enumerate() {
            let _ = write!(
                out,
                "{:>3}. [{:>7.2}s] ({}) {}",
                i + 1,
                segment.timestamp,
                segment.style,
                segment.text
            );
            if segment.audio_ref.is_some() {
                out.push_str(" [audio]");
            }
            out.push('\n');
        }
        out
    }
}

impl ResultsSink for TranscriptSink {
    fn finish(&mut self, results: &SessionResults) -> Result<()> {
        ensure_parent(&self.path)?;
        std::fs::write(&self.path, Self::render(results))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "transcript"
    }
}

/// M3U playlist of the segments that have audio.
pub struct PlaylistSink {
    path: PathBuf,
}

impl PlaylistSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Entries are written relative to the playlist when the audio lives
    /// below it.
    pub fn render(&self, results: &SessionResults) -> Option<String> {
        let base = self.path.parent().unwrap_or(Path::new(""));
        let mut out = String::from("#EXTM3U\n");
        let mut entries = 0;
        for segment in &results.segments {
            let Some(audio) = &segment.audio_ref else {
                continue;
            };
            let audio = Path::new(audio);
            let entry = audio.strip_prefix(base).unwrap_or(audio);
            let _ = writeln!(
                out,
                "#EXTINF:-1,{:.2}s {}\n{}",
                segment.timestamp,
                segment.event_type,
                entry.display()
            );
            entries += 1;
        }
        (entries > 0).then_some(out)
    }
}

impl ResultsSink for PlaylistSink {
    fn finish(&mut self, results: &SessionResults) -> Result<()> {
        match self.render(results) {
            Some(playlist) => {
                ensure_parent(&self.path)?;
                std::fs::write(&self.path, playlist)?;
            }
            None => tracing::debug!("No audio segments, skipping playlist"),
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "playlist"
    }
}

/// Prints segments as they arrive.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl ResultsSink for StdoutSink {
    fn segment(&mut self, segment: &CommentarySegment) -> Result<()> {
        render_segment(segment);
        Ok(())
    }

    fn finish(&mut self, _results: &SessionResults) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdout"
    }
}

/// Forwards to several sinks. One failing sink does not starve the others;
/// the first error is returned after all have run.
#[derive(Default)]
pub struct FanOutSink {
    sinks: Vec<Box<dyn ResultsSink>>,
}

impl FanOutSink {
    pub fn new(sinks: Vec<Box<dyn ResultsSink>>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: Box<dyn ResultsSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    fn each(
        &mut self,
        mut call: impl FnMut(&mut dyn ResultsSink) -> Result<()>,
    ) -> Result<()> {
        let mut first_err = None;
        for sink in &mut self.sinks {
            if let Err(e) = call(sink.as_mut()) {
                tracing::warn!(sink = sink.name(), "{e}");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

impl ResultsSink for FanOutSink {
    fn segment(&mut self, segment: &CommentarySegment) -> Result<()> {
        self.each(|sink| sink.segment(segment))
    }

    fn finish(&mut self, results: &SessionResults) -> Result<()> {
        self.each(|sink| sink.finish(results))
    }

    fn name(&self) -> &'static str {
        "fan-out"
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Station wrapper for any [`ResultsSink`].
///
/// Assembles [`SessionResults`] when the `Finished` item arrives (or, if the
/// worker died first, at shutdown) and sends them on `result_tx`.
pub struct SinkStation {
    sink: Box<dyn ResultsSink>,
    session_id: String,
    segments: Vec<CommentarySegment>,
    result_tx: Option<Sender<SessionResults>>,
}

impl SinkStation {
    pub fn new(
        sink: Box<dyn ResultsSink>,
        session_id: impl Into<String>,
        result_tx: Sender<SessionResults>,
    ) -> Self {
        Self {
            sink,
            session_id: session_id.into(),
            segments: Vec::new(),
            result_tx: Some(result_tx),
        }
    }

    fn complete(&mut self, events: Vec<EventLogEntry>) -> Result<()> {
        let results = SessionResults::new(
            self.session_id.clone(),
            std::mem::take(&mut self.segments),
            events,
        );
        let outcome = self.sink.finish(&results);
        if let Some(tx) = self.result_tx.take() {
            let _ = tx.send(results);
        }
        outcome
    }
}

impl Station for SinkStation {
    type Input = PipelineItem;
    type Output = ();

    fn name(&self) -> &'static str {
        self.sink.name()
    }

    fn process(&mut self, item: PipelineItem) -> std::result::Result<Option<()>, StationError> {
        match item {
            PipelineItem::Segment(segment) => {
                let outcome = self.sink.segment(&segment);
                self.segments.push(segment);
                outcome.map_err(|e| StationError::Recoverable(e.to_string()))?;
            }
            PipelineItem::Finished { events } => {
                self.complete(events)
                    .map_err(|e| StationError::Recoverable(e.to_string()))?;
            }
        }
        Ok(None)
    }

    fn shutdown(&mut self) {
        if self.result_tx.is_some() {
            tracing::warn!(
                session = %self.session_id,
                "Session ended without an audit log"
            );
            if let Err(e) = self.complete(Vec::new()) {
                tracing::warn!(sink = self.sink.name(), "{e}");
            }
        }
    }
}
