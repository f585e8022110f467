//! Control surface for live sessions: a Unix socket speaking one JSON line
//! per request.

pub mod client;
pub mod protocol;
pub mod server;

pub use client::send_command;
pub use protocol::{Command, Response, SessionSettings};
pub use server::{CommandHandler, ControlServer};
