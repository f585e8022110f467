//! Async Unix socket server for the live control surface.

use crate::control::protocol::{Command, Response};
use crate::error::{FragcastError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

/// Handler trait for processing control commands.
#[async_trait::async_trait]
pub trait CommandHandler: Send + Sync {
    /// Handle a command and return a response.
    async fn handle(&self, command: Command) -> Response;
}

/// Control server: one JSON command line per connection, one response line
/// back.
pub struct ControlServer {
    socket_path: PathBuf,
    shutdown: Arc<AtomicBool>,
}

impl ControlServer {
    pub fn new(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// `$XDG_RUNTIME_DIR/fragcast.sock`, else `/tmp/fragcast-{uid}.sock`.
    pub fn default_socket_path() -> PathBuf {
        if let Ok(xdg_runtime) = std::env::var("XDG_RUNTIME_DIR") {
            PathBuf::from(xdg_runtime).join("fragcast.sock")
        } else {
            // SAFETY: getuid has no preconditions and cannot fail.
            let uid = unsafe { libc::getuid() };
            PathBuf::from(format!("/tmp/fragcast-{uid}.sock"))
        }
    }

    /// Accepts connections until [`stop`](Self::stop) is called.
    pub async fn start<H>(&self, handler: H) -> Result<()>
    where
        H: CommandHandler + 'static,
    {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| FragcastError::ControlSocket {
                message: format!("Failed to remove existing socket: {e}"),
            })?;
        }

        let listener =
            UnixListener::bind(&self.socket_path).map_err(|e| FragcastError::ControlSocket {
                message: format!("Failed to bind to socket: {e}"),
            })?;
        tracing::debug!(path = %self.socket_path.display(), "Control socket bound");

        let handler = Arc::new(handler);

        while !self.shutdown.load(Ordering::SeqCst) {
            // Accept with a timeout so shutdown is noticed.
            let accept_result =
                tokio::time::timeout(tokio::time::Duration::from_millis(100), listener.accept())
                    .await;

            match accept_result {
                Ok(Ok((stream, _))) => {
                    let handler = Arc::clone(&handler);
                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, handler).await {
                            tracing::warn!("Control client error: {e}");
                        }
                    });
                }
                Ok(Err(e)) => {
                    return Err(FragcastError::ControlConnection {
                        message: format!("Failed to accept connection: {e}"),
                    });
                }
                Err(_) => continue,
            }
        }

        Ok(())
    }

    /// Stop accepting connections and remove the socket file.
    pub fn stop(&self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| FragcastError::ControlSocket {
                message: format!("Failed to remove socket file: {e}"),
            })?;
        }
        Ok(())
    }
}

async fn handle_client<H>(stream: UnixStream, handler: Arc<H>) -> Result<()>
where
    H: CommandHandler,
{
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    reader
        .read_line(&mut line)
        .await
        .map_err(|e| FragcastError::ControlConnection {
            message: format!("Failed to read from client: {e}"),
        })?;

    // A malformed command still gets an answer.
    let response = match Command::from_json(line.trim()) {
        Ok(command) => {
            tracing::debug!(?command, "Control command");
            handler.handle(command).await
        }
        Err(e) => Response::error(format!("Invalid command: {e}")),
    };

    let mut response_json = response
        .to_json()
        .map_err(|e| FragcastError::ControlProtocol {
            message: format!("Failed to serialize response: {e}"),
        })?;
    response_json.push('\n');

    writer
        .write_all(response_json.as_bytes())
        .await
        .map_err(|e| FragcastError::ControlConnection {
            message: format!("Failed to write to client: {e}"),
        })?;
    writer
        .flush()
        .await
        .map_err(|e| FragcastError::ControlConnection {
            message: format!("Failed to flush writer: {e}"),
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    struct EchoHandler;

    #[async_trait::async_trait]
    impl CommandHandler for EchoHandler {
        async fn handle(&self, command: Command) -> Response {
            match command {
                Command::Status => Response::Status {
                    active: false,
                    paused: false,
                    session_id: None,
                    segments: 0,
                    errors: Vec::new(),
                },
                Command::Stop => Response::error("no active session"),
                _ => Response::Ok,
            }
        }
    }

    #[test]
    fn test_default_socket_path() {
        let path = ControlServer::default_socket_path();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("fragcast"));
        assert!(name.ends_with(".sock"));
    }

    async fn raw_request(socket_path: &Path, line: &str) -> String {
        let mut stream = UnixStream::connect(socket_path).await.unwrap();
        stream.write_all(line.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_server_answers_commands() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("control.sock");
        let server = Arc::new(ControlServer::new(socket_path.clone()));
        let task = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.start(EchoHandler).await })
        };
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        assert!(socket_path.exists());

        let response = raw_request(&socket_path, "{\"type\":\"pause\"}\n").await;
        assert_eq!(response, "{\"type\":\"ok\"}\n");

        let response = raw_request(&socket_path, "{\"type\":\"stop\"}\n").await;
        assert!(response.contains("no active session"));

        server.stop().unwrap();
        task.await.unwrap().unwrap();
        assert!(!socket_path.exists());
    }

    #[tokio::test]
    async fn test_malformed_command_gets_error_response() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("control.sock");
        let server = Arc::new(ControlServer::new(socket_path.clone()));
        let task = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.start(EchoHandler).await })
        };
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        let response = raw_request(&socket_path, "garbage\n").await;
        let parsed = Response::from_json(response.trim()).unwrap();
        assert!(matches!(parsed, Response::Error { .. }));

        server.stop().unwrap();
        task.await.unwrap().unwrap();
    }
}
