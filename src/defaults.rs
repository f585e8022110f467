//! Default configuration constants for fragcast.
//!
//! Shared by the config layer, the engine builders and the CLI so every entry
//! point agrees on the same baseline behavior.

use crate::events::types::GamePhase;

/// Minimum detection confidence kept by the perception adapter.
pub const CONFIDENCE_THRESHOLD: f32 = 0.6;

/// Seconds between analyzed frames of a recording.
///
/// Half a second keeps kill feed entries (visible ~4 s) from slipping between samples.
pub const SAMPLE_INTERVAL_SECS: f64 = 0.5;

/// Frame rate assumed for recordings that do not declare one.
pub const FRAME_RATE: f64 = 30.0;

/// Minimum seconds between two low-importance segments on the global channel.
pub const MIN_INTERVAL_SECS: f64 = 2.0;

/// Events at or above this importance bypass rate limiting.
pub const OVERRIDE_IMPORTANCE: u8 = 4;

/// Seconds without a real segment before filler is synthesized.
pub const FILL_CADENCE_SECS: f64 = 12.0;

/// Filler is dropped when any segment lies within this many seconds of it.
pub const FILLER_PROXIMITY_SECS: f64 = 5.0;

/// Identical events (same type, player, weapon) inside this window are spoken once.
///
/// OCR keeps reading the same kill feed line for several frames.
pub const DEDUPE_WINDOW_SECS: f64 = 3.0;

/// Live worker polling cadence in milliseconds.
pub const POLL_INTERVAL_MS: u64 = 100;

/// Error records the daemon keeps for `status`.
pub const RECENT_ERRORS: usize = 20;

/// Minimum delay between two voice synthesis calls in milliseconds.
pub const SYNTHESIS_DELAY_MS: u64 = 500;

/// Phase assumed before any timer text has been read.
///
/// Unrecognized timer UI used to be read as the action phase; kept as the
/// named starting point instead of a silent fallback.
pub const FALLBACK_PHASE: GamePhase = GamePhase::Action;

/// Default voice for synthesized commentary (energetic caster).
pub const VOICE_ID: &str = "pqHfZKP75CvOlQylNhV4";

/// Default synthesis model identifier.
pub const VOICE_MODEL_ID: &str = "eleven_multilingual_v2";

/// Default output directory for reports, transcripts and audio.
pub const OUTPUT_DIR: &str = "commentary_output";

/// Player names recognized when no roster is configured.
pub const DEFAULT_ROSTER: &[&str] = &["TenZ", "ScreaM", "Shroud", "Player1", "Player2"];

/// Name used when no player can be read from a detection.
pub const UNKNOWN_PLAYER: &str = "Player";
