//! Text-to-speech backends and the pieces around them.

use crate::clock::{Clock, SystemClock};
use crate::defaults;
use crate::error::{FragcastError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Voice and delivery parameters sent with every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceProfile {
    pub voice_id: String,
    pub model_id: String,
    pub stability: f32,
    pub similarity_boost: f32,
    pub style: f32,
    pub use_speaker_boost: bool,
}

impl Default for VoiceProfile {
    fn default() -> Self {
        Self {
            voice_id: defaults::VOICE_ID.to_string(),
            model_id: defaults::VOICE_MODEL_ID.to_string(),
            stability: 0.75,
            similarity_boost: 0.75,
            style: 0.5,
            use_speaker_boost: true,
        }
    }
}

/// Credential for a hosted TTS service.
///
/// Only ever read from the environment at startup; never serialized and
/// redacted in debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Reads the key from `var`; empty values count as unset.
    pub fn from_env(var: &str) -> Option<Self> {
        std::env::var(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(Self)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Text-to-speech capability.
pub trait VoiceSynthesizer: Send + Sync {
    /// Encoded audio for `text`.
    fn synthesize(&self, text: &str, voice: &VoiceProfile) -> Result<Vec<u8>>;

    fn name(&self) -> &str;

    /// File extension of the produced audio.
    fn extension(&self) -> &str {
        "mp3"
    }
}

impl<T: VoiceSynthesizer> VoiceSynthesizer for Arc<T> {
    fn synthesize(&self, text: &str, voice: &VoiceProfile) -> Result<Vec<u8>> {
        (**self).synthesize(text, voice)
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn extension(&self) -> &str {
        (**self).extension()
    }
}

/// In-process synthesizer for tests and dry runs.
#[derive(Debug, Default)]
pub struct MockSynthesizer {
    fail_all: bool,
    fail_containing: Option<String>,
    calls: AtomicUsize,
}

impl MockSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every request, like an exhausted quota.
    pub fn with_failure(mut self) -> Self {
        self.fail_all = true;
        self
    }

    /// Fail requests whose text contains `needle`.
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_containing = Some(needle.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl VoiceSynthesizer for MockSynthesizer {
    fn synthesize(&self, text: &str, voice: &VoiceProfile) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let fails = self.fail_all
            || self
                .fail_containing
                .as_deref()
                .is_some_and(|needle| text.contains(needle));
        if fails {
            return Err(FragcastError::Synthesis {
                message: "mock synthesis failure".to_string(),
            });
        }
        Ok(format!("{}:{text}", voice.voice_id).into_bytes())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Runs an external TTS program: text on stdin, audio on stdout.
///
/// Voice parameters and the API key are passed through the child's
/// environment (`FRAGCAST_VOICE_ID`, `FRAGCAST_TTS_API_KEY`, ...).
#[derive(Debug)]
pub struct CommandSynthesizer {
    program: String,
    args: Vec<String>,
    api_key: Option<ApiKey>,
    extension: String,
}

impl CommandSynthesizer {
    pub fn new(command: &[String], extension: &str) -> Result<Self> {
        let Some((program, args)) = command.split_first() else {
            return Err(FragcastError::ConfigInvalidValue {
                key: "voice.command".to_string(),
                message: "must name a program".to_string(),
            });
        };
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            api_key: None,
            extension: extension.to_string(),
        })
    }

    pub fn with_api_key(mut self, api_key: Option<ApiKey>) -> Self {
        self.api_key = api_key;
        self
    }
}

impl VoiceSynthesizer for CommandSynthesizer {
    fn synthesize(&self, text: &str, voice: &VoiceProfile) -> Result<Vec<u8>> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .env("FRAGCAST_VOICE_ID", &voice.voice_id)
            .env("FRAGCAST_VOICE_MODEL", &voice.model_id)
            .env("FRAGCAST_VOICE_STABILITY", voice.stability.to_string())
            .env(
                "FRAGCAST_VOICE_SIMILARITY_BOOST",
                voice.similarity_boost.to_string(),
            )
            .env("FRAGCAST_VOICE_STYLE", voice.style.to_string())
            .env(
                "FRAGCAST_VOICE_SPEAKER_BOOST",
                voice.use_speaker_boost.to_string(),
            )
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(key) = &self.api_key {
            command.env("FRAGCAST_TTS_API_KEY", key.expose());
        }

        let mut child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FragcastError::SynthesisToolNotFound {
                    tool: self.program.clone(),
                }
            } else {
                FragcastError::Synthesis {
                    message: format!("cannot start '{}': {e}", self.program),
                }
            }
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes())?;
        }
        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(FragcastError::Synthesis {
                message: format!(
                    "'{}' exited with {}: {}",
                    self.program,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        if output.stdout.is_empty() {
            return Err(FragcastError::Synthesis {
                message: format!("'{}' produced no audio", self.program),
            });
        }
        Ok(output.stdout)
    }

    fn name(&self) -> &str {
        &self.program
    }

    fn extension(&self) -> &str {
        &self.extension
    }
}

/// Enforces a minimum delay between synthesis calls.
pub struct RateLimiter {
    min_delay: Duration,
    last: Option<Instant>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(min_delay: Duration) -> Self {
        Self::with_clock(min_delay, Arc::new(SystemClock))
    }

    pub fn with_clock(min_delay: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            min_delay,
            last: None,
            clock,
        }
    }

    /// Blocks until `min_delay` has passed since the previous call.
    pub fn wait(&mut self) {
        if let Some(last) = self.last {
            let elapsed = self.clock.now().saturating_duration_since(last);
            if elapsed < self.min_delay {
                self.clock.sleep(self.min_delay - elapsed);
            }
        }
        self.last = Some(self.clock.now());
    }
}

/// Writes rendered audio next to the other session outputs.
#[derive(Debug, Clone)]
pub struct AudioStore {
    dir: PathBuf,
}

impl AudioStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save(&self, timestamp: f64, extension: &str, audio: &[u8]) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self
            .dir
            .join(format!("commentary_{timestamp:.2}s.{extension}"));
        std::fs::write(&path, audio)?;
        Ok(path)
    }
}
