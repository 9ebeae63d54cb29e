//! Failure taxonomy for the command bus.
//!
//! The bus never retries and never resynchronises a damaged stream, so almost
//! every error here is fatal: the caller is expected to stop using the
//! affected endpoint or provider, and a dispatch loop hands the error to its
//! [`FatalPolicy`](cmdbus_config::FatalPolicy). Only [`BusError::Timeout`] is
//! confined to the call that raised it.
//!
//! I/O errors are wrapped in `Arc` so the enum stays cheap to move and clone
//! into logs.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use cmdbus_config::ConfigError;
use nix::errno::Errno;
use thiserror::Error;

/// Broad class of a [`BusError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The line-oriented framing was violated.
    Protocol,
    /// The underlying socket failed.
    Transport,
    /// A provider has no free listener slot.
    Capacity,
    /// A reply did not arrive before the deadline.
    Timeout,
    /// The bus was wired up incorrectly.
    Programming,
}

/// Errors raised by the command bus.
#[derive(Debug, Error)]
pub enum BusError {
    /// The configuration describes an unusable bus.
    #[error("invalid bus configuration: {source}")]
    Config {
        /// Validation failure.
        #[source]
        source: ConfigError,
    },

    /// No provider with this name exists in the context.
    #[error("no provider named '{name}'")]
    ProviderNotFound {
        /// Name that was looked up.
        name: String,
    },

    /// A provider with this name already exists.
    #[error("provider '{name}' is already defined")]
    DuplicateProvider {
        /// Conflicting provider name.
        name: String,
    },

    /// The provider's dispatch loop owns its listeners already.
    #[error("provider '{name}' is already dispatching")]
    ProviderStarted {
        /// Provider name.
        name: String,
    },

    /// All listener slots of the provider are taken.
    #[error("provider '{name}' accepts at most {capacity} consumers")]
    CapacityExceeded {
        /// Provider name.
        name: String,
        /// Configured listener capacity.
        capacity: usize,
    },

    /// The dispatch thread could not be created.
    #[error("failed to spawn dispatch thread for '{name}': {source}")]
    Spawn {
        /// Provider name.
        name: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The dispatch thread panicked.
    #[error("dispatch thread for '{name}' panicked")]
    LoopPanicked {
        /// Provider name.
        name: String,
    },

    /// A request line reached the configured limit without a newline.
    #[error("request line exceeds {limit} bytes")]
    LineTooLong {
        /// Configured line limit, newline included.
        limit: usize,
    },

    /// The assembled command carries no text.
    #[error("assembled command is empty")]
    EmptyCommand,

    /// The stream ended in the middle of a request.
    #[error("stream ended {position}")]
    Truncated {
        /// Where in the request the stream ended.
        position: &'static str,
    },

    /// A request was not valid UTF-8.
    #[error("request is not valid UTF-8")]
    InvalidEncoding,

    /// The caller passed a command the protocol cannot frame.
    #[error("invalid command: {reason}")]
    InvalidCommand {
        /// Why the command was refused.
        reason: &'static str,
    },

    /// A reply did not follow the result framing.
    #[error("malformed reply: {reason}")]
    MalformedReply {
        /// Description of the framing violation.
        reason: String,
    },

    /// An answer is too long for the reply header's length field.
    #[error("cannot encode reply: answer of {len} bytes exceeds {limit} bytes")]
    Unencodable {
        /// Answer length in bytes.
        len: usize,
        /// Longest encodable answer.
        limit: usize,
    },

    /// A socket operation failed.
    #[error("{operation} failed: {source}")]
    Transport {
        /// Operation that failed.
        operation: &'static str,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The peer stopped accepting bytes part way through a write.
    #[error("short write: {expected} bytes could not be written in full")]
    ShortWrite {
        /// Size of the frame that was being written.
        expected: usize,
    },

    /// Waiting for readiness failed.
    #[error("readiness wait failed: {source}")]
    Multiplex {
        /// Error reported by `poll(2)`.
        #[source]
        source: Errno,
    },

    /// The endpoint was closed by an earlier failure.
    #[error("endpoint is closed")]
    EndpointClosed,

    /// No complete reply arrived before the deadline.
    #[error("no reply within {timeout:?}")]
    Timeout {
        /// Deadline that expired.
        timeout: Duration,
    },
}

impl BusError {
    /// Wraps an I/O error raised by `operation`.
    pub(crate) fn transport(operation: &'static str, source: io::Error) -> Self {
        Self::Transport {
            operation,
            source: Arc::new(source),
        }
    }

    /// Class of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::LineTooLong { .. }
            | Self::EmptyCommand
            | Self::Truncated { .. }
            | Self::InvalidEncoding
            | Self::InvalidCommand { .. }
            | Self::MalformedReply { .. }
            | Self::Unencodable { .. } => ErrorKind::Protocol,
            Self::Transport { .. }
            | Self::ShortWrite { .. }
            | Self::Multiplex { .. }
            | Self::EndpointClosed => ErrorKind::Transport,
            Self::CapacityExceeded { .. } => ErrorKind::Capacity,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Config { .. }
            | Self::ProviderNotFound { .. }
            | Self::DuplicateProvider { .. }
            | Self::ProviderStarted { .. }
            | Self::Spawn { .. }
            | Self::LoopPanicked { .. } => ErrorKind::Programming,
        }
    }

    /// Whether the error invalidates more than the call that raised it.
    ///
    /// Timeouts end the call and close its endpoint; everything else leaves
    /// the bus in a state that cannot be trusted.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Timeout)
    }

    /// Whether the peer closed its end while a request or reply was in
    /// flight.
    pub(crate) fn is_peer_gone(&self) -> bool {
        matches!(
            self,
            Self::Transport { source, .. }
                if matches!(
                    source.kind(),
                    io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset
                )
        )
    }

    /// Whether this is a socket read that ran into its read timeout.
    pub(crate) fn is_io_timeout(&self) -> bool {
        matches!(
            self,
            Self::Transport { source, .. }
                if matches!(source.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
        )
    }
}

impl From<ConfigError> for BusError {
    fn from(source: ConfigError) -> Self {
        Self::Config { source }
    }
}

#[cfg(test)]
mod tests;
