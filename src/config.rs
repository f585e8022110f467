use crate::commentary::scheduler::SchedulerConfig;
use crate::commentary::types::CommentaryStyle;
use crate::defaults;
use crate::error::{FragcastError, Result};
use crate::perception::backend::{BackendKind, FallbackPolicy};
use crate::state::phase::PhaseConfig;
use crate::voice::synthesizer::{ApiKey, VoiceProfile};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub perception: PerceptionConfig,
    pub classifier: ClassifierConfig,
    pub phase: PhaseConfig,
    pub scheduler: SchedulerConfig,
    pub commentary: CommentaryConfig,
    pub voice: VoiceConfig,
    pub output: OutputConfig,
    pub live: LiveConfig,
}

/// Where frames come from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Blank frames on a fixed cadence; perception supplies the content.
    #[default]
    Synthetic,
    /// A directory of extracted frame files.
    Recorded,
    /// A capture command run once per poll.
    Capture,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// Frame directory for `recorded`.
    pub path: Option<PathBuf>,
    /// Length of a synthetic session in seconds.
    pub duration_secs: f64,
    pub sample_interval_secs: f64,
    pub frame_rate: f64,
    pub capture_command: Vec<String>,
}

/// Perception backend selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PerceptionConfig {
    pub backend: BackendKind,
    pub fallback: FallbackPolicy,
    pub confidence_threshold: f32,
    /// Detection log for the replay backend.
    pub replay_path: Option<PathBuf>,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Known player names; matched case-insensitively, reported as written here.
    pub players: Vec<String>,
    pub extract_locations: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct CommentaryConfig {
    /// Style for ordinary events; `play_by_play` when unset.
    pub style: Option<CommentaryStyle>,
    /// Template selection seed; entropy when unset.
    pub seed: Option<u64>,
    pub map: Option<String>,
    pub agent: Option<String>,
}

/// Voice synthesis backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum VoiceBackend {
    #[default]
    Mock,
    Command,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VoiceConfig {
    pub enabled: bool,
    pub backend: VoiceBackend,
    /// Program and arguments for the `command` backend.
    pub command: Vec<String>,
    /// Extension of the files the command produces.
    pub extension: String,
    pub delay_ms: u64,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    #[serde(flatten)]
    pub profile: VoiceProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub json_report: bool,
    pub transcript: bool,
    pub playlist: bool,
    /// Print segments as they are produced.
    pub stdout: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LiveConfig {
    pub poll_interval_ms: u64,
    /// Consecutive frame errors after which a live session gives up.
    pub max_consecutive_errors: u32,
    pub socket_path: Option<PathBuf>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Synthetic,
            path: None,
            duration_secs: 60.0,
            sample_interval_secs: defaults::SAMPLE_INTERVAL_SECS,
            frame_rate: defaults::FRAME_RATE,
            capture_command: Vec::new(),
        }
    }
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Mock,
            fallback: FallbackPolicy::Mock,
            confidence_threshold: defaults::CONFIDENCE_THRESHOLD,
            replay_path: None,
            seed: 0,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            players: defaults::DEFAULT_ROSTER
                .iter()
                .map(|p| p.to_string())
                .collect(),
            extract_locations: true,
        }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            backend: VoiceBackend::Mock,
            command: Vec::new(),
            extension: "mp3".to_string(),
            delay_ms: defaults::SYNTHESIS_DELAY_MS,
            api_key_env: "FRAGCAST_TTS_API_KEY".to_string(),
            profile: VoiceProfile::default(),
        }
    }
}

impl VoiceConfig {
    /// Reads the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<ApiKey> {
        ApiKey::from_env(&self.api_key_env)
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(defaults::OUTPUT_DIR),
            json_report: true,
            transcript: true,
            playlist: true,
            stdout: false,
        }
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
            max_consecutive_errors: 10,
            socket_path: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FragcastError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                FragcastError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file, or defaults if the file doesn't exist
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(FragcastError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - FRAGCAST_PERCEPTION_BACKEND → perception.backend
    /// - FRAGCAST_VOICE_ID → voice.voice_id
    /// - FRAGCAST_OUTPUT_DIR → output.dir
    ///
    /// Unknown backend names are ignored with a warning.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(backend) = std::env::var("FRAGCAST_PERCEPTION_BACKEND")
            && !backend.is_empty()
        {
            match BackendKind::parse(&backend) {
                Some(kind) => self.perception.backend = kind,
                None => tracing::warn!(
                    value = %backend,
                    "Ignoring unknown FRAGCAST_PERCEPTION_BACKEND"
                ),
            }
        }

        if let Ok(voice_id) = std::env::var("FRAGCAST_VOICE_ID")
            && !voice_id.is_empty()
        {
            self.voice.profile.voice_id = voice_id;
        }

        if let Ok(dir) = std::env::var("FRAGCAST_OUTPUT_DIR")
            && !dir.is_empty()
        {
            self.output.dir = PathBuf::from(dir);
        }

        self
    }

    /// Rejects values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        fn invalid(key: &str, message: &str) -> Result<()> {
            Err(FragcastError::ConfigInvalidValue {
                key: key.to_string(),
                message: message.to_string(),
            })
        }

        let threshold = self.perception.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return invalid("perception.confidence_threshold", "must be within 0..=1");
        }
        if !(1..=5).contains(&self.scheduler.override_importance) {
            return invalid("scheduler.override_importance", "must be within 1..=5");
        }
        for (key, value) in [
            ("scheduler.min_interval", self.scheduler.min_interval),
            ("scheduler.filler_proximity", self.scheduler.filler_proximity),
            ("source.sample_interval_secs", self.source.sample_interval_secs),
            ("source.frame_rate", self.source.frame_rate),
        ] {
            if value.is_nan() || value <= 0.0 {
                return invalid(key, "must be positive");
            }
        }
        for (key, value) in [
            ("scheduler.type_interval", self.scheduler.type_interval),
            ("scheduler.dedupe_window", self.scheduler.dedupe_window),
            ("scheduler.fill_cadence", self.scheduler.fill_cadence),
        ] {
            if value.is_nan() || value < 0.0 {
                return invalid(key, "must not be negative");
            }
        }
        if self.live.poll_interval_ms == 0 {
            return invalid("live.poll_interval_ms", "must be positive");
        }
        match self.source.kind {
            SourceKind::Recorded if self.source.path.is_none() => {
                return invalid("source.path", "required for recorded sources");
            }
            SourceKind::Capture if self.source.capture_command.is_empty() => {
                return invalid("source.capture_command", "required for capture sources");
            }
            _ => {}
        }
        if self.voice.enabled
            && self.voice.backend == VoiceBackend::Command
            && self.voice.command.is_empty()
        {
            return invalid("voice.command", "required for the command backend");
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/fragcast/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("fragcast")
            .join("config.toml")
    }
}
