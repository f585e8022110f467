//! Client side of the control socket, used by `fragcast start|stop|...`.

use crate::control::protocol::{Command, Response};
use crate::error::{FragcastError, Result};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

/// Send a command to the daemon and wait for its response.
///
/// # Errors
/// `ControlConnection` if the daemon cannot be reached, `ControlProtocol` if
/// either side of the exchange is not valid JSON.
pub async fn send_command(socket_path: &Path, command: &Command) -> Result<Response> {
    let stream =
        UnixStream::connect(socket_path)
            .await
            .map_err(|e| FragcastError::ControlConnection {
                message: format!(
                    "Failed to connect to daemon at {}: {e}",
                    socket_path.display()
                ),
            })?;

    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let mut command_json = command
        .to_json()
        .map_err(|e| FragcastError::ControlProtocol {
            message: format!("Failed to serialize command: {e}"),
        })?;
    command_json.push('\n');

    writer
        .write_all(command_json.as_bytes())
        .await
        .map_err(|e| FragcastError::ControlConnection {
            message: format!("Failed to write command: {e}"),
        })?;
    writer
        .flush()
        .await
        .map_err(|e| FragcastError::ControlConnection {
            message: format!("Failed to flush writer: {e}"),
        })?;

    let mut response_line = String::new();
    reader
        .read_line(&mut response_line)
        .await
        .map_err(|e| FragcastError::ControlConnection {
            message: format!("Failed to read response: {e}"),
        })?;

    Response::from_json(response_line.trim()).map_err(|e| FragcastError::ControlProtocol {
        message: format!("Failed to deserialize response: {e}"),
    })
}
