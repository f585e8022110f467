//! Batch runner and live worker driving a [`CommentaryEngine`].

use crate::commentary::types::CommentarySegment;
use crate::config::Config;
use crate::defaults;
use crate::error::{FragcastError, Result};
use crate::frame::FrameSource;
use crate::pipeline::engine::CommentaryEngine;
use crate::pipeline::error::{ErrorReporter, LogReporter, StationError};
use crate::pipeline::sink::{ResultsSink, SinkStation};
use crate::pipeline::station::StationRunner;
use crate::pipeline::types::{PipelineItem, SessionResults};
use crate::voice::{VoiceRenderer, VoiceStation};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, unbounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Configuration for one session.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub session_id: String,
    /// Live worker cadence; also bounds how long a control message waits.
    pub poll_interval: Duration,
    /// Consecutive frame read failures tolerated before giving up.
    pub max_consecutive_errors: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            session_id: "session".to_string(),
            poll_interval: Duration::from_millis(defaults::POLL_INTERVAL_MS),
            max_consecutive_errors: 10,
        }
    }
}

impl PipelineConfig {
    pub fn from_config(config: &Config, session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            poll_interval: Duration::from_millis(config.live.poll_interval_ms),
            max_consecutive_errors: config.live.max_consecutive_errors,
        }
    }
}

/// Messages from the control surface to the live worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    Pause,
    Resume,
    Stop,
}

/// Handle to a running live session.
///
/// Control goes through a message channel into the worker; the only state
/// shared with it is a handful of atomic flags and counters.
pub struct PipelineHandle {
    session_id: String,
    control_tx: Sender<ControlMessage>,
    paused: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    segments: Arc<AtomicUsize>,
    threads: Vec<JoinHandle<()>>,
    result_rx: Receiver<SessionResults>,
}

impl PipelineHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Takes effect before the worker reads its next frame.
    pub fn pause(&self) {
        let _ = self.control_tx.send(ControlMessage::Pause);
    }

    pub fn resume(&self) {
        let _ = self.control_tx.send(ControlMessage::Resume);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// False once the worker has left its loop (stopped, source ended, or
    /// fatal error).
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Segments produced so far.
    pub fn segment_count(&self) -> usize {
        self.segments.load(Ordering::SeqCst)
    }

    /// Stops the session gracefully and returns its results.
    ///
    /// The worker finishes its current frame, flushes the scheduler and hands
    /// the audit log downstream before exiting.
    pub fn stop(self) -> Option<SessionResults> {
        let _ = self.control_tx.send(ControlMessage::Stop);
        self.wait()
    }

    /// Waits for the session to end on its own and returns its results.
    ///
    /// Blocks until every queued segment has been voiced and written. The sink
    /// sends results only after its own output is flushed, and a closed result
    /// channel means the sink station is gone.
    pub fn wait(mut self) -> Option<SessionResults> {
        let result = self.result_rx.recv().ok();
        if result.is_none() {
            tracing::error!(session = %self.session_id, "Sink exited without results");
        }
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                tracing::error!("Pipeline thread panicked");
            }
        }
        result
    }
}

/// Frame source → engine → (voice) → sink.
pub struct Pipeline {
    config: PipelineConfig,
    error_reporter: Arc<dyn ErrorReporter>,
    voice: Option<VoiceRenderer>,
}

impl Pipeline {
    /// Creates a new pipeline with the default (logging) error reporter.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            error_reporter: Arc::new(LogReporter),
            voice: None,
        }
    }

    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.error_reporter = reporter;
        self
    }

    /// Render audio for every segment.
    pub fn with_voice(mut self, voice: Option<VoiceRenderer>) -> Self {
        self.voice = voice;
        self
    }

    /// Runs a finite session to completion on the calling thread.
    ///
    /// Per-frame failures are reported and skipped. A fatal capture error
    /// stops the session and is returned; nothing is handed to the sink.
    pub fn run_batch(
        mut self,
        source: &mut dyn FrameSource,
        engine: &mut CommentaryEngine,
        sink: &mut dyn ResultsSink,
    ) -> Result<SessionResults> {
        source.start()?;
        tracing::info!(
            session = %self.config.session_id,
            source = source.name(),
            backend = engine.perception().backend_name(),
            "Batch session started"
        );

        let reporter = self.error_reporter.clone();
        let mut segments = Vec::new();
        let mut consecutive_errors = 0u32;
        let mut last_timestamp = 0.0;

        loop {
            let frame = match source.next_frame() {
                Ok(Some(frame)) => {
                    consecutive_errors = 0;
                    frame
                }
                Ok(None) | Err(FragcastError::FrameSourceExhausted) => break,
                Err(e) if e.is_fatal() => {
                    reporter.report(source.name(), &StationError::Fatal(e.to_string()));
                    let _ = source.stop();
                    return Err(e);
                }
                Err(e) => {
                    consecutive_errors += 1;
                    reporter.report(source.name(), &StationError::Recoverable(e.to_string()));
                    if consecutive_errors >= self.config.max_consecutive_errors {
                        let _ = source.stop();
                        return Err(FragcastError::fatal_capture(
                            source.name(),
                            last_timestamp,
                            format!("{consecutive_errors} consecutive read failures: {e}"),
                        ));
                    }
                    continue;
                }
            };
            last_timestamp = frame.timestamp;

            match engine.process_frame(&frame) {
                Ok(produced) => {
                    for segment in produced {
                        self.deliver(segment, sink, &mut segments);
                    }
                }
                Err(e) => {
                    let e = escalate(e, frame.timestamp);
                    if e.is_fatal() {
                        reporter.report("perception", &StationError::Fatal(e.to_string()));
                        let _ = source.stop();
                        return Err(e);
                    }
                    reporter.report("perception", &StationError::Recoverable(e.to_string()));
                }
            }
        }

        for segment in engine.finish() {
            self.deliver(segment, sink, &mut segments);
        }
        if let Err(e) = source.stop() {
            tracing::warn!("Failed to stop {}: {e}", source.name());
        }

        let results = SessionResults::new(
            self.config.session_id.clone(),
            segments,
            engine.take_audit_log(),
        );
        if let Err(e) = sink.finish(&results) {
            reporter.report(sink.name(), &StationError::Recoverable(e.to_string()));
        }
        tracing::info!(
            session = %results.session_id,
            segments = results.segments.len(),
            events = results.events.len(),
            "Batch session finished"
        );
        Ok(results)
    }

    fn deliver(
        &mut self,
        mut segment: CommentarySegment,
        sink: &mut dyn ResultsSink,
        segments: &mut Vec<CommentarySegment>,
    ) {
        if let Some(voice) = self.voice.as_mut()
            && let Err(e) = voice.render(&mut segment)
        {
            self.error_reporter.report(
                "voice",
                &StationError::Recoverable(format!("t={:.2}s: {e}", segment.timestamp)),
            );
        }
        if let Err(e) = sink.segment(&segment) {
            self.error_reporter
                .report(sink.name(), &StationError::Recoverable(e.to_string()));
        }
        segments.push(segment);
    }

    /// Starts a live session on its own threads.
    ///
    /// The source is started before returning, so a source that cannot be
    /// opened fails here.
    pub fn start(
        self,
        mut source: Box<dyn FrameSource>,
        engine: CommentaryEngine,
        sink: Box<dyn ResultsSink>,
    ) -> Result<PipelineHandle> {
        source.start()?;

        let (control_tx, control_rx) = unbounded();
        let (item_tx, item_rx) = unbounded::<PipelineItem>();
        let (result_tx, result_rx) = bounded(1);
        let paused = Arc::new(AtomicBool::new(false));
        let running = Arc::new(AtomicBool::new(true));
        let segments = Arc::new(AtomicUsize::new(0));
        let mut threads = Vec::new();

        let sink_rx = match self.voice {
            Some(renderer) => {
                let (voice_tx, voice_rx) = unbounded();
                let station =
                    VoiceStation::new(renderer).with_error_reporter(self.error_reporter.clone());
                let runner =
                    StationRunner::spawn(station, item_rx, voice_tx, self.error_reporter.clone())?;
                threads.push(join_runner(runner)?);
                voice_rx
            }
            None => item_rx,
        };

        // The sink is terminal; nothing is ever sent on its output.
        let (sink_out_tx, _sink_out_rx) = bounded::<()>(1);
        let sink_station = SinkStation::new(sink, self.config.session_id.clone(), result_tx);
        let runner = StationRunner::spawn(
            sink_station,
            sink_rx,
            sink_out_tx,
            self.error_reporter.clone(),
        )?;
        threads.push(join_runner(runner)?);

        let worker = Worker {
            config: self.config.clone(),
            source,
            engine,
            item_tx,
            control_rx,
            paused: paused.clone(),
            segments: segments.clone(),
            reporter: self.error_reporter.clone(),
        };
        let worker_running = running.clone();
        threads.push(
            thread::Builder::new()
                .name("fragcast-worker".to_string())
                .spawn(move || {
                    worker.run();
                    worker_running.store(false, Ordering::SeqCst);
                })?,
        );

        tracing::info!(session = %self.config.session_id, "Live session started");
        Ok(PipelineHandle {
            session_id: self.config.session_id,
            control_tx,
            paused,
            running,
            segments,
            threads,
            result_rx,
        })
    }
}

fn join_runner<S: crate::pipeline::station::Station>(
    runner: StationRunner<S>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("fragcast-join-{}", runner.name()))
        .spawn(move || {
            if let Err(msg) = runner.join() {
                tracing::error!("{msg}");
            }
        })
}

/// A backend that stopped working under the `fail` policy ends the session.
fn escalate(error: FragcastError, timestamp: f64) -> FragcastError {
    match error {
        FragcastError::PerceptionUnavailable { .. } => {
            FragcastError::fatal_capture("perception", timestamp, error.to_string())
        }
        other => other,
    }
}

enum Step {
    Continue,
    Stop,
}

/// The single thread owning the engine (and with it all match state).
struct Worker {
    config: PipelineConfig,
    source: Box<dyn FrameSource>,
    engine: CommentaryEngine,
    item_tx: Sender<PipelineItem>,
    control_rx: Receiver<ControlMessage>,
    paused: Arc<AtomicBool>,
    segments: Arc<AtomicUsize>,
    reporter: Arc<dyn ErrorReporter>,
}

impl Worker {
    fn run(mut self) {
        let mut consecutive_errors = 0u32;
        let mut last_timestamp = 0.0;

        'session: loop {
            // Drain control messages without blocking.
            while let Ok(message) = self.control_rx.try_recv() {
                if let Step::Stop = self.apply(message) {
                    break 'session;
                }
            }

            if !self.paused.load(Ordering::SeqCst) {
                match self.source.next_frame() {
                    Ok(Some(frame)) => {
                        consecutive_errors = 0;
                        last_timestamp = frame.timestamp;
                        match self.engine.process_frame(&frame) {
                            Ok(produced) => {
                                if !self.send(produced) {
                                    break 'session;
                                }
                            }
                            Err(e) => {
                                let e = escalate(e, frame.timestamp);
                                let error = StationError::from(e);
                                self.reporter.report("perception", &error);
                                if error.is_fatal() {
                                    break 'session;
                                }
                            }
                        }
                    }
                    Ok(None) | Err(FragcastError::FrameSourceExhausted) => {
                        if self.source.is_finite() {
                            tracing::debug!("Frame source ended");
                            break 'session;
                        }
                    }
                    Err(e) if e.is_fatal() => {
                        self.reporter
                            .report(self.source.name(), &StationError::Fatal(e.to_string()));
                        break 'session;
                    }
                    Err(e) => {
                        consecutive_errors += 1;
                        self.reporter.report(
                            self.source.name(),
                            &StationError::Recoverable(e.to_string()),
                        );
                        if consecutive_errors >= self.config.max_consecutive_errors {
                            let fatal = FragcastError::fatal_capture(
                                self.source.name(),
                                last_timestamp,
                                format!("{consecutive_errors} consecutive read failures"),
                            );
                            self.reporter.report(
                                self.source.name(),
                                &StationError::Fatal(fatal.to_string()),
                            );
                            break 'session;
                        }
                    }
                }
            }

            // Pace the loop; a control message cuts the wait short.
            match self.control_rx.recv_timeout(self.config.poll_interval) {
                Ok(message) => {
                    if let Step::Stop = self.apply(message) {
                        break 'session;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break 'session,
            }
        }

        let tail = self.engine.finish();
        self.send(tail);
        let events = self.engine.take_audit_log();
        let _ = self.item_tx.send(PipelineItem::Finished { events });
        if let Err(e) = self.source.stop() {
            tracing::warn!("Failed to stop {}: {e}", self.source.name());
        }
        tracing::info!(
            session = %self.config.session_id,
            segments = self.segments.load(Ordering::SeqCst),
            "Live session finished"
        );
    }

    fn apply(&mut self, message: ControlMessage) -> Step {
        match message {
            ControlMessage::Pause => {
                tracing::debug!("Session paused");
                self.paused.store(true, Ordering::SeqCst);
                Step::Continue
            }
            ControlMessage::Resume => {
                tracing::debug!("Session resumed");
                self.paused.store(false, Ordering::SeqCst);
                Step::Continue
            }
            ControlMessage::Stop => Step::Stop,
        }
    }

    /// Returns false when downstream is gone.
    fn send(&self, segments: Vec<CommentarySegment>) -> bool {
        for segment in segments {
            self.segments.fetch_add(1, Ordering::SeqCst);
            if self.item_tx.send(PipelineItem::Segment(segment)).is_err() {
                tracing::debug!("Pipeline downstream closed");
                return false;
            }
        }
        true
    }
}
