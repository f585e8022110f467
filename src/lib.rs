//! fragcast - automated shoutcasting for tactical shooters
//!
//! Frames in, timed commentary out: perception turns frames into detections,
//! the classifier turns detections into game events, and the scheduler
//! decides which of them are worth saying.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod app;
#[cfg(feature = "cli")]
pub mod cli;
pub mod clock;
pub mod commentary;
pub mod config;
pub mod control;
pub mod daemon;
pub mod defaults;
pub mod error;
pub mod events;
pub mod frame;
pub mod output;
pub mod perception;
pub mod pipeline;
pub mod state;
pub mod voice;

// Core seams (source → perceive → speak → sink)
pub use frame::{Frame, FrameSource};
pub use perception::backend::PerceptionBackend;
pub use pipeline::sink::ResultsSink;
pub use voice::VoiceSynthesizer;

// Pipeline
pub use pipeline::engine::CommentaryEngine;
pub use pipeline::orchestrator::{Pipeline, PipelineConfig, PipelineHandle};
pub use pipeline::types::SessionResults;

// Error handling
pub use error::{FragcastError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
