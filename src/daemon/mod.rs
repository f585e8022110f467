//! Daemon mode: holds the live session and serves the control socket.

pub mod handler;

use crate::app;
use crate::config::Config;
use crate::control::server::ControlServer;
use crate::defaults;
use crate::error::{FragcastError, Result};
use crate::pipeline::error::{ChannelReporter, ErrorRecord, ErrorReporter};
use crate::pipeline::orchestrator::PipelineHandle;
use crossbeam_channel::{Receiver, Sender, bounded};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Builds and starts a live session from an effective config.
///
/// Runs on a blocking thread: opening a capture source may run external
/// commands.
pub trait SessionFactory: Send + Sync {
    fn start_session(
        &self,
        session_id: &str,
        config: &Config,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Result<PipelineHandle>;
}

/// Starts sessions with the configured frame source, perception backend,
/// voice and sinks.
pub struct ConfigSessionFactory;

impl SessionFactory for ConfigSessionFactory {
    fn start_session(
        &self,
        session_id: &str,
        config: &Config,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Result<PipelineHandle> {
        app::start_live_session(config, session_id, reporter)
    }
}

/// Error channel of the daemon's sessions.
///
/// Stations report into a bounded channel without blocking; `recent` drains
/// it and keeps the last [`defaults::RECENT_ERRORS`] records.
pub struct SessionErrors {
    tx: Sender<ErrorRecord>,
    rx: Receiver<ErrorRecord>,
    recent: Mutex<VecDeque<ErrorRecord>>,
}

impl SessionErrors {
    pub fn new() -> Self {
        let (tx, rx) = bounded(defaults::RECENT_ERRORS * 8);
        Self {
            tx,
            rx,
            recent: Mutex::new(VecDeque::new()),
        }
    }

    /// Reporter stamping every record with `session_id`.
    pub fn reporter(&self, session_id: &str) -> Arc<dyn ErrorReporter> {
        Arc::new(ChannelReporter::new(Some(session_id.to_string()), self.tx.clone()))
    }

    pub async fn recent(&self) -> Vec<ErrorRecord> {
        let mut recent = self.recent.lock().await;
        for record in self.rx.try_iter() {
            if recent.len() == defaults::RECENT_ERRORS {
                recent.pop_front();
            }
            recent.push_back(record);
        }
        recent.iter().cloned().collect()
    }

    /// Forgets everything reported so far.
    pub async fn clear(&self) {
        let mut recent = self.recent.lock().await;
        self.rx.try_iter().for_each(drop);
        recent.clear();
    }
}

impl Default for SessionErrors {
    fn default() -> Self {
        Self::new()
    }
}

/// Daemon state: base config and the current session, if any.
pub struct DaemonState {
    /// Base configuration; `start` settings are applied to a copy.
    pub config: Arc<Mutex<Config>>,
    pub factory: Arc<dyn SessionFactory>,
    /// Current session (Some = live or finished but not yet stopped)
    pub pipeline: Arc<Mutex<Option<PipelineHandle>>>,
    pub errors: SessionErrors,
}

impl DaemonState {
    pub fn new(config: Config, factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            config: Arc::new(Mutex::new(config)),
            factory,
            pipeline: Arc::new(Mutex::new(None)),
            errors: SessionErrors::new(),
        }
    }

    /// Returns true if a session is producing commentary.
    pub async fn is_active(&self) -> bool {
        self.pipeline
            .lock()
            .await
            .as_ref()
            .is_some_and(|h| h.is_running())
    }
}

/// Run the daemon until SIGINT or SIGTERM.
///
/// A session still running at shutdown is stopped so its outputs are written.
pub async fn run_daemon(config: Config, socket_path: Option<PathBuf>, quiet: bool) -> Result<()> {
    config.validate()?;

    let socket_path = socket_path
        .or_else(|| config.live.socket_path.clone())
        .unwrap_or_else(ControlServer::default_socket_path);
    let server = Arc::new(ControlServer::new(socket_path));

    let state = DaemonState::new(config, Arc::new(ConfigSessionFactory));
    let pipeline = Arc::clone(&state.pipeline);
    let handler = handler::DaemonCommandHandler::new(state, quiet);

    if !quiet {
        eprintln!(
            "Control socket listening at: {}",
            server.socket_path().display()
        );
        eprintln!("Daemon ready.");
    }
    tracing::info!(socket = %server.socket_path().display(), "Daemon started");

    let server_clone = Arc::clone(&server);
    let server_handle = tokio::spawn(async move { server_clone.start(handler).await });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            if !quiet {
                eprintln!("\nReceived SIGINT, shutting down...");
            }
        }
        res = wait_for_sigterm() => {
            if let Err(e) = res {
                eprintln!("Error setting up signal handler: {e}");
            }
            if !quiet {
                eprintln!("\nReceived SIGTERM, shutting down...");
            }
        }
    }

    server.stop()?;

    if let Some(handle) = pipeline.lock().await.take() {
        tracing::info!(session = %handle.session_id(), "Stopping session before exit");
        if let Err(e) = tokio::task::spawn_blocking(move || handle.stop()).await {
            eprintln!("fragcast: session shutdown failed: {e}");
        }
    }

    match server_handle.await {
        Ok(Err(e)) => eprintln!("fragcast: control server failed: {e}"),
        Err(e) => eprintln!("fragcast: daemon server task failed: {e}"),
        Ok(Ok(())) => {}
    }

    if !quiet {
        eprintln!("Daemon stopped.");
    }

    Ok(())
}

/// Wait for SIGTERM signal (used by systemd).
#[cfg(unix)]
async fn wait_for_sigterm() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| FragcastError::Other(format!("Failed to register SIGTERM handler: {e}")))?;
    sigterm.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_sigterm() -> Result<()> {
    std::future::pending::<()>().await
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoSessions;

    impl SessionFactory for NoSessions {
        fn start_session(
            &self,
            _session_id: &str,
            _config: &Config,
            _reporter: Arc<dyn ErrorReporter>,
        ) -> Result<PipelineHandle> {
            Err(FragcastError::Session {
                message: "disabled".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_daemon_state_starts_idle() {
        let state = DaemonState::new(Config::default(), Arc::new(NoSessions));
        assert!(!state.is_active().await);
        assert!(state.pipeline.lock().await.is_none());
    }

    #[tokio::test]
    async fn test_daemon_state_keeps_config() {
        let mut config = Config::default();
        config.commentary.map = Some("Split".to_string());
        let state = DaemonState::new(config, Arc::new(NoSessions));
        assert_eq!(
            state.config.lock().await.commentary.map.as_deref(),
            Some("Split")
        );
    }

    #[tokio::test]
    async fn test_session_errors_keep_the_latest() {
        use crate::pipeline::error::StationError;

        let errors = SessionErrors::new();
        let reporter = errors.reporter("m9");
        for i in 0..defaults::RECENT_ERRORS + 5 {
            reporter.report("capture", &StationError::Recoverable(format!("grab {i}")));
        }

        let recent = errors.recent().await;
        assert_eq!(recent.len(), defaults::RECENT_ERRORS);
        assert_eq!(recent[0].message, "grab 5");
        assert!(recent.iter().all(|r| r.session_id.as_deref() == Some("m9")));

        errors.clear().await;
        assert!(errors.recent().await.is_empty());
    }
}
