//! Command handler implementation for the daemon.

use crate::control::protocol::{Command, Response, SessionSettings};
use crate::control::server::CommandHandler;
use crate::daemon::DaemonState;
use crate::pipeline::orchestrator::PipelineHandle;
use crate::pipeline::types::SessionResults;
use std::sync::Arc;

/// Command handler for control socket commands.
pub struct DaemonCommandHandler {
    state: Arc<DaemonState>,
    quiet: bool,
}

impl DaemonCommandHandler {
    pub fn new(state: DaemonState, quiet: bool) -> Self {
        Self {
            state: Arc::new(state),
            quiet,
        }
    }

    async fn start_session(&self, session_id: String, settings: SessionSettings) -> Response {
        let mut guard = self.state.pipeline.lock().await;

        if let Some(handle) = guard.as_ref()
            && handle.is_running()
        {
            return Response::error(format!("Session '{}' is already running", handle.session_id()));
        }
        // A session that ended on its own is reaped before the next starts.
        if let Some(stale) = guard.take() {
            let _ = finish_blocking(stale, false).await;
        }

        let mut config = self.state.config.lock().await.clone();
        if let Err(e) = settings.apply(&mut config) {
            return Response::error(format!("Invalid session settings: {e}"));
        }

        self.state.errors.clear().await;
        let reporter = self.state.errors.reporter(&session_id);
        let factory = Arc::clone(&self.state.factory);
        let started = tokio::task::spawn_blocking({
            let session_id = session_id.clone();
            move || factory.start_session(&session_id, &config, reporter)
        })
        .await;

        match started {
            Err(e) => Response::error(format!("Session start task failed: {e}")),
            Ok(Err(e)) => Response::error(format!("Failed to start session: {e}")),
            Ok(Ok(handle)) => {
                if !self.quiet {
                    eprintln!("Session '{session_id}' started.");
                }
                tracing::info!(session = %session_id, "Live session started");
                *guard = Some(handle);
                Response::Ok
            }
        }
    }

    async fn stop_session(&self) -> Response {
        let Some(handle) = self.state.pipeline.lock().await.take() else {
            return Response::error("No active session");
        };
        let session_id = handle.session_id().to_string();

        match finish_blocking(handle, true).await {
            Some(results) => {
                if !self.quiet {
                    eprintln!(
                        "Session '{}' stopped: {} segments, {} events.",
                        session_id,
                        results.segments.len(),
                        results.events.len()
                    );
                }
                Response::Stopped {
                    session_id,
                    segments: results.segments.len(),
                    events: results.events.len(),
                }
            }
            None => Response::error(format!(
                "Session '{session_id}' stopped without producing results"
            )),
        }
    }

    async fn set_paused(&self, paused: bool) -> Response {
        let guard = self.state.pipeline.lock().await;
        match guard.as_ref() {
            Some(handle) if handle.is_running() => {
                if paused {
                    handle.pause();
                } else {
                    handle.resume();
                }
                Response::Ok
            }
            _ => Response::error("No active session"),
        }
    }

    async fn status(&self) -> Response {
        let guard = self.state.pipeline.lock().await;
        let errors = self.state.errors.recent().await;
        match guard.as_ref() {
            Some(handle) => Response::Status {
                active: handle.is_running(),
                paused: handle.is_paused(),
                session_id: Some(handle.session_id().to_string()),
                segments: handle.segment_count(),
                errors,
            },
            None => Response::Status {
                active: false,
                paused: false,
                session_id: None,
                segments: 0,
                errors,
            },
        }
    }
}

/// Stopping joins worker threads, so it runs off the async executor.
async fn finish_blocking(handle: PipelineHandle, stop: bool) -> Option<SessionResults> {
    let joined = tokio::task::spawn_blocking(move || {
        if stop { handle.stop() } else { handle.wait() }
    })
    .await;
    match joined {
        Ok(results) => results,
        Err(e) => {
            tracing::error!("Session shutdown task failed: {e}");
            None
        }
    }
}

#[async_trait::async_trait]
impl CommandHandler for DaemonCommandHandler {
    async fn handle(&self, command: Command) -> Response {
        match command {
            Command::Start {
                session_id,
                settings,
            } => self.start_session(session_id, settings).await,
            Command::Stop => self.stop_session().await,
            Command::Pause => self.set_paused(true).await,
            Command::Resume => self.set_paused(false).await,
            Command::Status => self.status().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::daemon::SessionFactory;
    use crate::error::{FragcastError, Result};
    use crate::frame::source::MockFrameSource;
    use crate::pipeline::engine::CommentaryEngine;
    use crate::pipeline::error::ErrorReporter;
    use crate::pipeline::orchestrator::{Pipeline, PipelineConfig};
    use crate::pipeline::sink::CollectorSink;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Starts endless mock sessions and remembers the config each one got.
    #[derive(Default)]
    struct MockFactory {
        seen: Mutex<Vec<Config>>,
        fail: bool,
        /// Read call at which the source fails once.
        read_failure_at: Option<usize>,
    }

    impl SessionFactory for MockFactory {
        fn start_session(
            &self,
            session_id: &str,
            config: &Config,
            reporter: Arc<dyn ErrorReporter>,
        ) -> Result<PipelineHandle> {
            if self.fail {
                return Err(FragcastError::Session {
                    message: "capture unavailable".to_string(),
                });
            }
            self.seen.lock().unwrap().push(config.clone());
            let timestamps: Vec<f64> = (0..10_000).map(|i| i as f64 * 0.5).collect();
            let mut source = MockFrameSource::at_times(&timestamps).live();
            if let Some(call) = self.read_failure_at {
                source = source.with_read_failure_at(call);
            }
            let engine = CommentaryEngine::from_config(config)?;
            let pipeline = Pipeline::new(PipelineConfig {
                session_id: session_id.to_string(),
                poll_interval: Duration::from_millis(5),
                ..Default::default()
            })
            .with_error_reporter(reporter);
            pipeline.start(Box::new(source), engine, Box::new(CollectorSink::new()))
        }
    }

    fn handler_with(factory: MockFactory) -> (DaemonCommandHandler, Arc<MockFactory>) {
        let factory = Arc::new(factory);
        let state = DaemonState::new(Config::default(), factory.clone());
        (DaemonCommandHandler::new(state, true), factory)
    }

    fn start(id: &str) -> Command {
        Command::Start {
            session_id: id.to_string(),
            settings: SessionSettings::default(),
        }
    }

    #[tokio::test]
    async fn test_status_when_idle() {
        let (handler, _) = handler_with(MockFactory::default());
        assert_eq!(
            handler.handle(Command::Status).await,
            Response::Status {
                active: false,
                paused: false,
                session_id: None,
                segments: 0,
                errors: Vec::new(),
            }
        );
    }

    #[tokio::test]
    async fn test_controls_without_session_are_errors() {
        let (handler, _) = handler_with(MockFactory::default());
        for command in [Command::Stop, Command::Pause, Command::Resume] {
            assert!(matches!(
                handler.handle(command).await,
                Response::Error { .. }
            ));
        }
    }

    #[tokio::test]
    async fn test_start_pause_resume_stop() {
        let (handler, _) = handler_with(MockFactory::default());

        assert_eq!(handler.handle(start("m1")).await, Response::Ok);
        let Response::Status {
            active, session_id, ..
        } = handler.handle(Command::Status).await
        else {
            panic!("expected status");
        };
        assert!(active);
        assert_eq!(session_id.as_deref(), Some("m1"));

        assert_eq!(handler.handle(Command::Pause).await, Response::Ok);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(matches!(
            handler.handle(Command::Status).await,
            Response::Status { paused: true, .. }
        ));
        assert_eq!(handler.handle(Command::Resume).await, Response::Ok);

        let stopped = handler.handle(Command::Stop).await;
        assert!(matches!(
            stopped,
            Response::Stopped { ref session_id, .. } if session_id == "m1"
        ));
        assert!(matches!(
            handler.handle(Command::Status).await,
            Response::Status { active: false, session_id: None, .. }
        ));
    }

    #[tokio::test]
    async fn test_second_start_rejected_while_running() {
        let (handler, _) = handler_with(MockFactory::default());
        assert_eq!(handler.handle(start("a")).await, Response::Ok);
        let response = handler.handle(start("b")).await;
        assert!(matches!(response, Response::Error { ref message } if message.contains("'a'")));
        handler.handle(Command::Stop).await;
    }

    #[tokio::test]
    async fn test_settings_reach_the_session_config() {
        let (handler, factory) = handler_with(MockFactory::default());
        let command = Command::Start {
            session_id: "m2".to_string(),
            settings: SessionSettings {
                map: Some("Lotus".to_string()),
                commentary_interval_seconds: Some(6.0),
                ..Default::default()
            },
        };
        assert_eq!(handler.handle(command).await, Response::Ok);
        handler.handle(Command::Stop).await;

        let seen = factory.seen.lock().unwrap();
        assert_eq!(seen[0].commentary.map.as_deref(), Some("Lotus"));
        assert_eq!(seen[0].scheduler.min_interval, 6.0);
    }

    #[tokio::test]
    async fn test_invalid_settings_rejected() {
        let (handler, factory) = handler_with(MockFactory::default());
        let command = Command::Start {
            session_id: "m3".to_string(),
            settings: SessionSettings {
                override_importance: Some(0),
                ..Default::default()
            },
        };
        assert!(matches!(
            handler.handle(command).await,
            Response::Error { .. }
        ));
        assert!(factory.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_factory_failure_reported() {
        let (handler, _) = handler_with(MockFactory {
            fail: true,
            ..Default::default()
        });
        let Response::Error { message } = handler.handle(start("m4")).await else {
            panic!("expected error");
        };
        assert!(message.contains("capture unavailable"));
    }

    #[tokio::test]
    async fn test_read_failure_reaches_status_with_session_id() {
        let (handler, _) = handler_with(MockFactory {
            read_failure_at: Some(2),
            ..Default::default()
        });
        assert_eq!(handler.handle(start("m5")).await, Response::Ok);

        let mut errors = Vec::new();
        for _ in 0..200 {
            if let Response::Status { errors: seen, .. } = handler.handle(Command::Status).await
                && !seen.is_empty()
            {
                errors = seen;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handler.handle(Command::Stop).await;

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].session_id.as_deref(), Some("m5"));
        assert_eq!(errors[0].stage, "mock");
        assert!(!errors[0].fatal);
        assert!(errors[0].message.contains("mock read failure"));
    }

    #[tokio::test]
    async fn test_new_session_starts_with_no_errors() {
        let (handler, _) = handler_with(MockFactory {
            read_failure_at: Some(0),
            ..Default::default()
        });
        assert_eq!(handler.handle(start("first")).await, Response::Ok);
        tokio::time::sleep(Duration::from_millis(100)).await;
        handler.handle(Command::Stop).await;
        assert!(matches!(
            handler.handle(Command::Status).await,
            Response::Status { ref errors, .. } if errors.len() == 1
        ));

        assert_eq!(handler.handle(start("second")).await, Response::Ok);
        let Response::Status { errors, .. } = handler.handle(Command::Status).await else {
            panic!("expected status");
        };
        handler.handle(Command::Stop).await;
        assert!(errors.iter().all(|r| r.session_id.as_deref() == Some("second")));
    }
}
