//! Composition root: turns a [`Config`] into running sessions.
//!
//! frame source → perception → events → phase → scheduler → text → voice → sinks

use crate::config::{Config, SourceKind, VoiceBackend};
use crate::error::{FragcastError, Result};
use crate::frame::{CaptureSource, FrameSource, RecordedSource, SyntheticSource};
use crate::pipeline::engine::CommentaryEngine;
use crate::pipeline::error::ErrorReporter;
use crate::pipeline::orchestrator::{Pipeline, PipelineConfig, PipelineHandle};
use crate::pipeline::sink::{FanOutSink, JsonReportSink, PlaylistSink, StdoutSink, TranscriptSink};
use crate::pipeline::types::SessionResults;
use crate::voice::{
    AudioStore, CommandSynthesizer, MockSynthesizer, RateLimiter, VoiceRenderer, VoiceSynthesizer,
};
use std::sync::Arc;
use std::time::Duration;

pub const REPORT_FILE: &str = "report.json";
pub const TRANSCRIPT_FILE: &str = "transcript.txt";
pub const PLAYLIST_FILE: &str = "commentary.m3u";

/// Session id derived from the local wall clock, e.g. `session_20250101_203000`.
pub fn new_session_id() -> String {
    chrono::Local::now()
        .format("session_%Y%m%d_%H%M%S")
        .to_string()
}

/// Creates the configured frame source.
pub fn build_source(config: &Config) -> Result<Box<dyn FrameSource>> {
    let source = &config.source;
    match source.kind {
        SourceKind::Synthetic => Ok(Box::new(SyntheticSource::new(
            source.duration_secs,
            source.sample_interval_secs,
        ))),
        SourceKind::Recorded => {
            let Some(path) = source.path.clone() else {
                return Err(FragcastError::ConfigInvalidValue {
                    key: "source.path".to_string(),
                    message: "required for recorded sources".to_string(),
                });
            };
            Ok(Box::new(RecordedSource::new(path, source.frame_rate, source.sample_interval_secs)))
        }
        SourceKind::Capture => Ok(Box::new(CaptureSource::new(&source.capture_command)?)),
    }
}

/// Creates the voice renderer, or `None` when voice output is disabled.
pub fn build_voice(config: &Config) -> Result<Option<VoiceRenderer>> {
    let voice = &config.voice;
    if !voice.enabled {
        return Ok(None);
    }

    let synthesizer: Box<dyn VoiceSynthesizer> = match voice.backend {
        VoiceBackend::Mock => Box::new(MockSynthesizer::new()),
        VoiceBackend::Command => {
            let api_key = voice.api_key();
            if api_key.is_none() {
                tracing::warn!(
                    var = %voice.api_key_env,
                    "No API key in environment, synthesis command runs without one"
                );
            }
            Box::new(
                CommandSynthesizer::new(&voice.command, &voice.extension)?.with_api_key(api_key),
            )
        }
    };
    tracing::debug!(synthesizer = synthesizer.name(), "Voice output enabled");

    Ok(Some(VoiceRenderer::new(
        synthesizer,
        voice.profile.clone(),
        RateLimiter::new(Duration::from_millis(voice.delay_ms)),
        AudioStore::new(&config.output.dir),
    )))
}

/// Creates the sinks enabled in `config.output`, writing into `output.dir`.
pub fn build_sinks(config: &Config, source_name: &str) -> FanOutSink {
    let output = &config.output;
    let mut sinks = FanOutSink::new(Vec::new());
    if output.stdout {
        sinks.push(Box::new(StdoutSink));
    }
    if output.json_report {
        sinks.push(Box::new(JsonReportSink::new(
            output.dir.join(REPORT_FILE),
            source_name,
            config.scheduler.override_importance,
        )));
    }
    if output.transcript {
        sinks.push(Box::new(TranscriptSink::new(output.dir.join(TRANSCRIPT_FILE))));
    }
    if output.playlist {
        sinks.push(Box::new(PlaylistSink::new(output.dir.join(PLAYLIST_FILE))));
    }
    sinks
}

/// Runs a finite session (synthetic or recorded) to completion.
///
/// Per-frame, voice and sink failures go to `reporter`.
pub fn run_batch_session(
    config: &Config,
    session_id: &str,
    reporter: Arc<dyn ErrorReporter>,
) -> Result<SessionResults> {
    config.validate()?;
    let mut source = build_source(config)?;
    let mut engine = CommentaryEngine::from_config(config)?;
    let mut sink = build_sinks(config, source.name());

    Pipeline::new(PipelineConfig::from_config(config, session_id))
        .with_error_reporter(reporter)
        .with_voice(build_voice(config)?)
        .run_batch(source.as_mut(), &mut engine, &mut sink)
}

/// Starts a live session on background threads.
pub fn start_live_session(
    config: &Config,
    session_id: &str,
    reporter: Arc<dyn ErrorReporter>,
) -> Result<PipelineHandle> {
    config.validate()?;
    let source = build_source(config)?;
    let engine = CommentaryEngine::from_config(config)?;
    let sink = build_sinks(config, source.name());

    Pipeline::new(PipelineConfig::from_config(config, session_id))
        .with_error_reporter(reporter)
        .with_voice(build_voice(config)?)
        .start(source, engine, Box::new(sink))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::error::{ChannelReporter, LogReporter};
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.output.dir = dir.path().to_path_buf();
        config.source.duration_secs = 30.0;
        config.commentary.seed = Some(7);
        config
    }

    #[test]
    fn test_session_id_format() {
        let id = new_session_id();
        assert!(id.starts_with("session_"));
        assert_eq!(id.len(), "session_20250101_203000".len());
    }

    #[test]
    fn test_build_source_kinds() {
        let mut config = Config::default();
        assert_eq!(build_source(&config).unwrap().name(), "synthetic");

        config.source.kind = SourceKind::Recorded;
        assert!(build_source(&config).is_err());
        config.source.path = Some("/tmp/frames".into());
        assert_eq!(build_source(&config).unwrap().name(), "recorded");
    }

    #[test]
    fn test_build_voice_disabled_by_default() {
        assert!(build_voice(&Config::default()).unwrap().is_none());
    }

    #[test]
    fn test_build_voice_mock() {
        let mut config = Config::default();
        config.voice.enabled = true;
        let renderer = build_voice(&config).unwrap().unwrap();
        assert_eq!(renderer.synthesizer_name(), "mock");
    }

    #[test]
    fn test_build_sinks_follows_output_flags() {
        let mut config = Config::default();
        assert_eq!(build_sinks(&config, "synthetic").len(), 3);
        config.output.playlist = false;
        config.output.stdout = true;
        assert_eq!(build_sinks(&config, "synthetic").len(), 3);
        config.output.json_report = false;
        config.output.transcript = false;
        config.output.stdout = false;
        assert!(build_sinks(&config, "synthetic").is_empty());
    }

    #[test]
    fn test_batch_session_writes_outputs() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.voice.enabled = true;
        config.voice.delay_ms = 0;

        let results = run_batch_session(&config, "batch-1", Arc::new(LogReporter)).unwrap();
        assert_eq!(results.session_id, "batch-1");
        assert!(!results.events.is_empty());
        assert!(!results.segments.is_empty());
        assert!(results.segments.iter().all(|s| s.audio_ref.is_some()));

        let report = std::fs::read_to_string(dir.path().join(REPORT_FILE)).unwrap();
        let json: serde_json::Value = serde_json::from_str(&report).unwrap();
        assert_eq!(json["session_id"], "batch-1");
        assert_eq!(json["source"], "synthetic");
        assert!(dir.path().join(TRANSCRIPT_FILE).exists());
        assert!(dir.path().join(PLAYLIST_FILE).exists());
    }

    #[test]
    fn test_batch_session_rejects_invalid_config() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.scheduler.min_interval = 0.0;
        assert!(matches!(
            run_batch_session(&config, "bad", Arc::new(LogReporter)),
            Err(FragcastError::ConfigInvalidValue { .. })
        ));
    }

    #[test]
    fn test_batch_session_reports_into_the_error_channel() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.voice.enabled = true;
        config.voice.backend = VoiceBackend::Command;
        config.voice.command = vec!["fragcast-no-such-tts".to_string()];
        config.voice.delay_ms = 0;

        let (tx, rx) = crossbeam_channel::unbounded();
        let reporter = Arc::new(ChannelReporter::new(Some("batch-2".to_string()), tx));
        let results = run_batch_session(&config, "batch-2", reporter).unwrap();

        assert!(!results.segments.is_empty());
        let records: Vec<_> = rx.try_iter().collect();
        assert_eq!(records.len(), results.segments.len());
        assert!(records.iter().all(|r| r.stage == "voice" && !r.fatal));
        assert!(
            records
                .iter()
                .all(|r| r.session_id.as_deref() == Some("batch-2"))
        );
    }
}
