//! Local command bus between a provider and its consumers.
//!
//! A provider exposes one named [`CommandHandler`]. Consumers register with
//! the provider through a [`BusContext`], receive a [`ConsumerEndpoint`], and
//! issue textual commands that block until a [`CallResult`] comes back. Each
//! registration creates a connected Unix socket pair; the provider keeps one
//! half as a listener and its dispatch thread multiplexes every listener with
//! `poll(2)`.
//!
//! ## Requests
//!
//! A request is one newline-terminated line. A line containing `<< TOKEN`
//! opens a here-doc: the lines that follow, up to one equal to `TOKEN`, form
//! the command delivered to the handler.
//!
//! ```text
//! vcl.inline boot << EOF
//! vcl 4.1;
//! backend default none;
//! EOF
//! ```
//!
//! ## Replies
//!
//! Replies use the fixed-width result framing described in [`wire`]: a
//! 13-byte header carrying the status and the answer length, then the answer
//! and a newline.
//!
//! ## Failures
//!
//! The bus never resynchronises a damaged stream. Every [`BusError`] except a
//! reply timeout is fatal; a dispatch loop that hits one follows the
//! configured [`FatalPolicy`], aborting the process by default.

mod client;
mod dispatch;
mod error;
pub mod fatal;
mod handler;
mod reader;
mod registry;
mod status;
pub mod telemetry;
pub mod wire;

pub use client::ConsumerEndpoint;
pub use cmdbus_config::{Config, ConfigError, FatalPolicy, LogFormat};
pub use dispatch::DispatchHandle;
pub use error::{BusError, ErrorKind};
pub use handler::{CommandHandler, WithPrivate, with_private};
pub use reader::{HEREDOC_MARKER, ReadLimits, read_command};
pub use registry::BusContext;
pub use status::{CallResult, Status};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
