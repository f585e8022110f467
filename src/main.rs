use anyhow::{Context, Result};
use clap::Parser;
use fragcast::app::{self, new_session_id};
use fragcast::cli::{Cli, Commands, ConfigAction, RunArgs};
use fragcast::config::Config;
use fragcast::control::client::send_command;
use fragcast::control::protocol::{Command, Response, SessionSettings};
use fragcast::control::server::ControlServer;
use fragcast::daemon::run_daemon;
use fragcast::output;
use fragcast::pipeline::ChannelReporter;
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);

    match cli.command {
        Commands::Run(args) => {
            let config = load_config(cli.config.as_deref())?;
            run_command(config, args, cli.quiet).await?;
        }
        Commands::Daemon { socket } => {
            let config = load_config(cli.config.as_deref())?;
            run_daemon(config, socket, cli.quiet).await?;
        }
        Commands::Start {
            socket,
            session,
            settings,
        } => {
            let command = Command::Start {
                session_id: session.unwrap_or_else(new_session_id),
                settings: SessionSettings::from(settings),
            };
            handle_control_command(socket, command).await?;
        }
        Commands::Stop { socket } => handle_control_command(socket, Command::Stop).await?,
        Commands::Pause { socket } => handle_control_command(socket, Command::Pause).await?,
        Commands::Resume { socket } => handle_control_command(socket, Command::Resume).await?,
        Commands::Status { socket } => handle_control_command(socket, Command::Status).await?,
        Commands::Config { action } => handle_config_command(action, cli.config.as_deref())?,
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise verbosity picks the level for this crate.
fn init_tracing(quiet: bool, verbose: u8) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info,fragcast=debug",
        (false, _) => "debug,fragcast=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config), which must exist
/// 2. Default config path (~/.config/fragcast/config.toml)
/// 3. Built-in defaults
///
/// Environment variable overrides are applied last.
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&Config::default_path())?,
    };
    Ok(config.with_env_overrides())
}

async fn run_command(mut config: Config, args: RunArgs, quiet: bool) -> Result<()> {
    args.apply_sources(&mut config);
    SessionSettings::from(args.settings.clone()).apply(&mut config)?;
    let session_id = args.session.clone().unwrap_or_else(new_session_id);

    if !quiet {
        eprintln!(
            "Session '{}' ({} source, {} backend)...",
            session_id,
            serde_json::to_value(config.source.kind)?
                .as_str()
                .unwrap_or("?"),
            serde_json::to_value(config.perception.backend)?
                .as_str()
                .unwrap_or("?"),
        );
    }

    let (error_tx, error_rx) = crossbeam_channel::unbounded();
    let reporter = Arc::new(ChannelReporter::new(Some(session_id.clone()), error_tx));

    // Voice synthesis and file writes block; keep them off the runtime.
    let results = tokio::task::spawn_blocking({
        let config = config.clone();
        let session_id = session_id.clone();
        move || app::run_batch_session(&config, &session_id, reporter)
    })
    .await
    .context("session task failed")??;

    if !quiet {
        let stats = results.statistics(config.scheduler.override_importance);
        output::render_summary(&results.session_id, &stats, results.duration());
        let errors = error_rx.try_iter().count();
        if errors > 0 {
            eprintln!(
                "{} {} errors reported during the session (see log)",
                "Warning:".yellow(),
                errors
            );
        }
        eprintln!("Outputs written to {}", config.output.dir.display());
    }
    Ok(())
}

fn handle_config_command(action: ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(custom_path)?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Path => {
            let path = custom_path
                .map(PathBuf::from)
                .unwrap_or_else(Config::default_path);
            println!("{}", path.display());
        }
        ConfigAction::Check => {
            let config = load_config(custom_path)?;
            match config.validate() {
                Ok(()) => println!("{}", "Configuration is valid".green()),
                Err(e) => {
                    eprintln!("{} {e}", "Invalid configuration:".red());
                    std::process::exit(1);
                }
            }
        }
    }
    Ok(())
}

/// Send a control command to the daemon and print its response.
async fn handle_control_command(socket: Option<PathBuf>, command: Command) -> Result<()> {
    let socket_path = socket.unwrap_or_else(ControlServer::default_socket_path);

    match send_command(&socket_path, &command).await {
        Ok(Response::Ok) => println!("{}", "OK".green()),
        Ok(Response::Status {
            active,
            paused,
            session_id,
            segments,
            errors,
        }) => {
            println!("Status:");
            println!("  {}   {}", "Daemon:".dimmed(), fragcast::version_string());
            match session_id {
                Some(id) => {
                    let state = match (active, paused) {
                        (true, true) => "paused".yellow().to_string(),
                        (true, false) => "live".green().to_string(),
                        (false, _) => "ended".dimmed().to_string(),
                    };
                    println!("  {}  {} ({})", "Session:".dimmed(), id, state);
                    println!("  {} {}", "Segments:".dimmed(), segments);
                }
                None => println!("  {}  none", "Session:".dimmed()),
            }
            for record in &errors {
                let label = if record.fatal {
                    "Fatal:".red().to_string()
                } else {
                    "Error:".yellow().to_string()
                };
                println!(
                    "  {} [{}] {} {}",
                    label,
                    record.stage,
                    record.timestamp.dimmed(),
                    record.message
                );
            }
        }
        Ok(Response::Stopped {
            session_id,
            segments,
            events,
        }) => {
            println!(
                "{} '{}': {} segments from {} events",
                "Stopped".green(),
                session_id,
                segments,
                events
            );
        }
        Ok(Response::Error { message }) => {
            eprintln!("{} {}", "Error:".red(), message);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("{} {}", "Error:".red(), e);
            eprintln!("Is the daemon running? Start it with `fragcast daemon`.");
            std::process::exit(1);
        }
    }
    Ok(())
}
