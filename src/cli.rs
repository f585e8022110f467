//! Command-line interface for fragcast
//!
//! Provides argument parsing using clap derive macros.

use crate::config::{Config, SourceKind, VoiceBackend};
use crate::control::protocol::SessionSettings;
use crate::perception::backend::BackendKind;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Automated shoutcasting for tactical shooters
#[derive(Parser, Debug)]
#[command(
    name = "fragcast",
    version,
    about = "Turn gameplay frames into timed commentary"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress status output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose logging (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process a recording or synthetic session to completion
    Run(RunArgs),

    /// Serve live sessions over the control socket (foreground)
    Daemon {
        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/fragcast.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Start a live session on the daemon
    Start {
        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/fragcast.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,

        /// Session id (default: derived from the current time)
        #[arg(long, value_name = "ID")]
        session: Option<String>,

        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// Stop the live session and write its outputs
    Stop {
        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/fragcast.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Pause commentary without ending the session
    Pause {
        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/fragcast.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Resume a paused session
    Resume {
        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/fragcast.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Get daemon status
    Status {
        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/fragcast.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Overrides for `run`; anything unset comes from the config file.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Directory of extracted frames (switches the source to `recorded`)
    #[arg(value_name = "FRAMES_DIR")]
    pub frames: Option<PathBuf>,

    /// Synthetic session length. Examples: 90s, 5m, 1m30s
    #[arg(long, short = 'd', value_name = "DURATION", value_parser = parse_duration_secs)]
    pub duration: Option<f64>,

    /// Seconds between analyzed frames
    #[arg(long, value_name = "SECONDS")]
    pub sample_interval: Option<f64>,

    /// Perception backend (mock, replay)
    #[arg(long, value_name = "BACKEND", value_parser = parse_backend)]
    pub backend: Option<BackendKind>,

    /// Detection log for the replay backend
    #[arg(long, value_name = "FILE")]
    pub replay: Option<PathBuf>,

    /// Output directory
    #[arg(long, short = 'o', value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Session id (default: derived from the current time)
    #[arg(long, value_name = "ID")]
    pub session: Option<String>,

    /// Seed for template selection and the mock backend
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Render audio with the mock synthesizer unless `voice.backend` says otherwise
    #[arg(long)]
    pub voice: bool,

    /// Print segments as they are produced
    #[arg(long)]
    pub print: bool,

    #[command(flatten)]
    pub settings: SettingsArgs,
}

/// Per-session commentary settings shared by `run` and `start`.
#[derive(Args, Debug, Default, Clone)]
pub struct SettingsArgs {
    #[arg(long, value_name = "NAME")]
    pub map: Option<String>,

    #[arg(long, value_name = "NAME")]
    pub agent: Option<String>,

    /// Style for ordinary events (play_by_play, analysis, excitement, educational)
    #[arg(long, value_name = "STYLE")]
    pub style: Option<String>,

    /// Minimum gap between segments. Examples: 2s, 1500ms
    #[arg(long, value_name = "DURATION", value_parser = parse_duration_secs)]
    pub interval: Option<f64>,

    /// Importance (1-5) at which an event may interrupt the gap
    #[arg(long, value_name = "LEVEL")]
    pub override_importance: Option<u8>,
}

impl From<SettingsArgs> for SessionSettings {
    fn from(args: SettingsArgs) -> Self {
        SessionSettings {
            map: args.map,
            agent: args.agent,
            commentary_style: args.style,
            commentary_interval_seconds: args.interval,
            override_importance: args.override_importance,
        }
    }
}

impl RunArgs {
    /// Overlays the flags on `config`. Settings are validated by the caller.
    pub fn apply_sources(&self, config: &mut Config) {
        if let Some(frames) = &self.frames {
            config.source.kind = SourceKind::Recorded;
            config.source.path = Some(frames.clone());
        }
        if let Some(duration) = self.duration {
            config.source.duration_secs = duration;
        }
        if let Some(interval) = self.sample_interval {
            config.source.sample_interval_secs = interval;
        }
        if let Some(backend) = self.backend {
            config.perception.backend = backend;
        }
        if let Some(replay) = &self.replay {
            config.perception.replay_path = Some(replay.clone());
            if self.backend.is_none() {
                config.perception.backend = BackendKind::Replay;
            }
        }
        if let Some(output) = &self.output {
            config.output.dir = output.clone();
        }
        if let Some(seed) = self.seed {
            config.perception.seed = seed;
            config.commentary.seed = Some(seed);
        }
        if self.voice && !config.voice.enabled {
            config.voice.enabled = true;
            if config.voice.command.is_empty() {
                config.voice.backend = VoiceBackend::Mock;
            }
        }
        if self.print {
            config.output.stdout = true;
        }
    }
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the default configuration file path
    Path,
    /// Load and validate the configuration
    Check,
}

/// Parse a duration string into seconds.
///
/// Bare numbers are seconds; anything else goes through `humantime`
/// (`30s`, `5m`, `1m30s`, `1500ms`).
fn parse_duration_secs(s: &str) -> Result<f64, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<f64>() {
        return Ok(secs);
    }
    humantime::parse_duration(s)
        .map(|d| d.as_secs_f64())
        .map_err(|e| e.to_string())
}

fn parse_backend(s: &str) -> Result<BackendKind, String> {
    BackendKind::parse(s).ok_or_else(|| format!("unknown perception backend '{s}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_defaults() {
        let cli = Cli::try_parse_from(["fragcast", "run"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(args.frames.is_none());
        assert!(args.duration.is_none());
        assert!(!args.voice);
        assert!(!cli.quiet);
        assert_eq!(cli.verbose, 0);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_parse_verbose_count() {
        let cli = Cli::try_parse_from(["fragcast", "-vv", "status"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["fragcast", "stop", "--quiet", "--config", "/tmp/f.toml"])
            .unwrap();
        assert!(cli.quiet);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/f.toml")));
    }

    #[test]
    fn test_parse_durations() {
        assert_eq!(parse_duration_secs("90").unwrap(), 90.0);
        assert_eq!(parse_duration_secs("2.5").unwrap(), 2.5);
        assert_eq!(parse_duration_secs("1m30s").unwrap(), 90.0);
        assert_eq!(parse_duration_secs("1500ms").unwrap(), 1.5);
        assert!(parse_duration_secs("soon").is_err());
    }

    #[test]
    fn test_parse_run_with_overrides() {
        let cli = Cli::try_parse_from([
            "fragcast",
            "run",
            "/data/frames",
            "--duration",
            "5m",
            "--backend",
            "replay",
            "--replay",
            "/data/d.json",
            "--map",
            "Bind",
            "--interval",
            "3s",
            "--voice",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.duration, Some(300.0));
        assert_eq!(args.backend, Some(BackendKind::Replay));
        assert_eq!(args.settings.map.as_deref(), Some("Bind"));
        assert_eq!(args.settings.interval, Some(3.0));

        let mut config = Config::default();
        args.apply_sources(&mut config);
        assert_eq!(config.source.kind, SourceKind::Recorded);
        assert_eq!(config.source.path, Some(PathBuf::from("/data/frames")));
        assert_eq!(
            config.perception.replay_path,
            Some(PathBuf::from("/data/d.json"))
        );
        assert!(config.voice.enabled);
    }

    #[test]
    fn test_unknown_backend_rejected() {
        assert!(Cli::try_parse_from(["fragcast", "run", "--backend", "yolo"]).is_err());
    }

    #[test]
    fn test_parse_start_settings() {
        let cli = Cli::try_parse_from([
            "fragcast",
            "start",
            "--session",
            "finals",
            "--style",
            "analysis",
            "--override-importance",
            "5",
        ])
        .unwrap();
        let Commands::Start {
            session, settings, ..
        } = cli.command
        else {
            panic!("expected start");
        };
        assert_eq!(session.as_deref(), Some("finals"));
        let settings = SessionSettings::from(settings);
        assert_eq!(settings.commentary_style.as_deref(), Some("analysis"));
        assert_eq!(settings.override_importance, Some(5));
    }

    #[test]
    fn test_replay_flag_selects_replay_backend() {
        let args = RunArgs {
            replay: Some(PathBuf::from("d.json")),
            seed: Some(3),
            ..Default::default()
        };
        let mut config = Config::default();
        args.apply_sources(&mut config);
        assert_eq!(config.perception.backend, BackendKind::Replay);
        assert_eq!(config.commentary.seed, Some(3));
    }
}
