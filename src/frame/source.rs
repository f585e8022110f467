//! Frame sources: synthetic, recorded and live capture.

use crate::clock::{Clock, SystemClock};
use crate::error::{FragcastError, Result};
use crate::frame::Frame;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

/// Trait for frame sources, allowing dependency injection and testing.
pub trait FrameSource: Send {
    /// Prepare the source. Failure here is fatal for the session.
    fn start(&mut self) -> Result<()>;

    /// Release the source.
    fn stop(&mut self) -> Result<()>;

    /// Read the next frame.
    ///
    /// `Ok(None)` means no frame is available. For finite sources that is the
    /// end of the stream; live sources may have more later.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Whether this source ends on its own (recording, synthetic stream).
    fn is_finite(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str;
}

/// Evenly spaced empty frames over a fixed duration.
///
/// Frames carry no pixels; a perception backend that keys on frame index
/// (the mock) still produces detections for them.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    duration: f64,
    interval: f64,
    next_index: u64,
    started: bool,
}

impl SyntheticSource {
    /// Frames at `0, interval, 2·interval, ...` strictly before `duration`.
    pub fn new(duration: f64, interval: f64) -> Self {
        Self {
            duration: duration.max(0.0),
            interval: if interval > 0.0 { interval } else { 1.0 },
            next_index: 0,
            started: false,
        }
    }
}

impl FrameSource for SyntheticSource {
    fn start(&mut self) -> Result<()> {
        self.started = true;
        self.next_index = 0;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.started = false;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.started {
            return Err(FragcastError::fatal_capture(self.name(), 0.0, "source not started"));
        }
        let timestamp = self.next_index as f64 * self.interval;
        if timestamp >= self.duration {
            return Ok(None);
        }
        let frame = Frame::new(
            self.next_index,
            timestamp,
            self.next_index.to_le_bytes().to_vec(),
        );
        self.next_index += 1;
        Ok(Some(frame))
    }

    fn name(&self) -> &'static str {
        "synthetic"
    }
}

/// Image files in a directory, read as the frames of a recording.
///
/// Files are ordered by name. File `n` sits at `n / fps` seconds; only every
/// `stride`-th file is read, where the stride is the sample interval
/// expressed in frames. Frames are indexed by sample, not by file.
#[derive(Debug, Clone)]
pub struct RecordedSource {
    dir: PathBuf,
    fps: f64,
    stride: usize,
    files: Vec<PathBuf>,
    cursor: usize,
}

impl RecordedSource {
    pub fn new(dir: impl Into<PathBuf>, fps: f64, sample_interval: f64) -> Self {
        let fps = if fps > 0.0 {
            fps
        } else {
            crate::defaults::FRAME_RATE
        };
        let stride = (fps * sample_interval).round().max(1.0) as usize;
        Self {
            dir: dir.into(),
            fps,
            stride,
            files: Vec::new(),
            cursor: 0,
        }
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    fn list_frames(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        files.sort();
        Ok(files)
    }
}

impl FrameSource for RecordedSource {
    fn start(&mut self) -> Result<()> {
        self.files = Self::list_frames(&self.dir).map_err(|e| {
            FragcastError::fatal_capture(
                "recorded",
                0.0,
                format!("cannot open recording {}: {e}", self.dir.display()),
            )
        })?;
        if self.files.is_empty() {
            return Err(FragcastError::fatal_capture(
                "recorded",
                0.0,
                format!("recording {} contains no frames", self.dir.display()),
            ));
        }
        self.cursor = 0;
        tracing::debug!(
            frames = self.files.len(),
            stride = self.stride,
            "opened recording {}",
            self.dir.display()
        );
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.files.get(self.cursor) else {
            return Ok(None);
        };
        let index = (self.cursor / self.stride) as u64;
        let timestamp = self.cursor as f64 / self.fps;
        self.cursor += self.stride;
        let data = std::fs::read(path).map_err(|e| {
            FragcastError::fatal_capture(
                "recorded",
                timestamp,
                format!("cannot read {}: {e}", path.display()),
            )
        })?;
        Ok(Some(Frame::new(index, timestamp, data)))
    }

    fn name(&self) -> &'static str {
        "recorded"
    }
}

/// Live screen capture through an external screenshot command.
///
/// The command's stdout is taken as one encoded frame, e.g. `grim -`.
/// Timestamps are wall-clock seconds since [`FrameSource::start`].
pub struct CaptureSource {
    program: String,
    args: Vec<String>,
    clock: Arc<dyn Clock>,
    started_at: Option<std::time::Instant>,
    next_index: u64,
}

impl CaptureSource {
    pub fn new(command: &[String]) -> Result<Self> {
        let Some((program, args)) = command.split_first() else {
            return Err(FragcastError::ConfigInvalidValue {
                key: "source.capture_command".to_string(),
                message: "must name a program".to_string(),
            });
        };
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            clock: Arc::new(SystemClock),
            started_at: None,
            next_index: 0,
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn elapsed(&self) -> f64 {
        self.started_at
            .map(|start| (self.clock.now() - start).as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl FrameSource for CaptureSource {
    fn start(&mut self) -> Result<()> {
        // Run once so a missing tool fails the session up front.
        Command::new(&self.program)
            .args(&self.args)
            .output()
            .map_err(|e| {
                FragcastError::fatal_capture(
                    "capture",
                    0.0,
                    format!("cannot run '{}': {e}", self.program),
                )
            })?;
        self.started_at = Some(self.clock.now());
        self.next_index = 0;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.started_at = None;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let timestamp = self.elapsed();
        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .map_err(|e| FragcastError::fatal_capture("capture", timestamp, e.to_string()))?;
        if !output.status.success() {
            // A single failed grab is transient; the live loop counts these.
            return Err(FragcastError::Other(format!(
                "'{}' exited with {}",
                self.program, output.status
            )));
        }
        if output.stdout.is_empty() {
            return Ok(None);
        }
        let frame = Frame::new(self.next_index, timestamp, output.stdout);
        self.next_index += 1;
        Ok(Some(frame))
    }

    fn is_finite(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "capture"
    }
}

/// Scripted frame source for tests.
#[derive(Debug, Clone, Default)]
pub struct MockFrameSource {
    frames: Vec<Frame>,
    cursor: usize,
    started: bool,
    finite: bool,
    fail_start: bool,
    fail_reads_at: Vec<usize>,
    fatal_at: Option<usize>,
    calls: usize,
}

impl MockFrameSource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames,
            finite: true,
            ..Default::default()
        }
    }

    /// Empty frames at the given timestamps, indexed from zero.
    pub fn at_times(timestamps: &[f64]) -> Self {
        Self::new(
            timestamps
                .iter()
                .enumerate()
                .map(|(i, &t)| Frame::empty(i as u64, t))
                .collect(),
        )
    }

    /// Report `None` instead of ending, like a live source between grabs.
    pub fn live(mut self) -> Self {
        self.finite = false;
        self
    }

    pub fn with_start_failure(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Make the read at call position `call` fail with a recoverable error.
    pub fn with_read_failure_at(mut self, call: usize) -> Self {
        self.fail_reads_at.push(call);
        self
    }

    /// Make the read at call position `call` fail fatally.
    pub fn with_fatal_at(mut self, call: usize) -> Self {
        self.fatal_at = Some(call);
        self
    }

    pub fn is_started(&self) -> bool {
        self.started
    }
}

impl FrameSource for MockFrameSource {
    fn start(&mut self) -> Result<()> {
        if self.fail_start {
            return Err(FragcastError::fatal_capture("mock", 0.0, "mock start failure"));
        }
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.started = false;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let call = self.calls;
        self.calls += 1;
        if self.fatal_at == Some(call) {
            let timestamp = self.frames.get(self.cursor).map_or(0.0, |f| f.timestamp);
            return Err(FragcastError::fatal_capture("mock", timestamp, "mock fatal read"));
        }
        if self.fail_reads_at.contains(&call) {
            return Err(FragcastError::Other("mock read failure".to_string()));
        }
        let frame = self.frames.get(self.cursor).cloned();
        if frame.is_some() {
            self.cursor += 1;
        }
        Ok(frame)
    }

    fn is_finite(&self) -> bool {
        self.finite
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
