//! Consumer side of the bus.
//!
//! A [`ConsumerEndpoint`] sends one command line and blocks until the
//! provider's reply has been read in full. Any failure after the first byte
//! leaves the stream out of step with the provider, so the endpoint closes
//! itself and refuses further calls.

use std::fmt;
use std::io::{self, Read};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::BusError;
use crate::status::CallResult;
use crate::wire;

const CLIENT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::client");

/// Consumer half of an endpoint pair, returned by
/// [`BusContext::register`](crate::BusContext::register).
#[derive(Debug)]
pub struct ConsumerEndpoint {
    provider: String,
    slot: usize,
    stream: Option<UnixStream>,
    timeout: Duration,
}

impl ConsumerEndpoint {
    pub(crate) const fn new(
        provider: String,
        slot: usize,
        stream: UnixStream,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            slot,
            stream: Some(stream),
            timeout,
        }
    }

    /// Name of the provider this endpoint talks to.
    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Listener slot this endpoint occupies in its provider, in registration
    /// order.
    #[must_use]
    pub const fn slot(&self) -> usize {
        self.slot
    }

    /// Deadline applied to each reply.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether an earlier failure closed the endpoint.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    /// Sends `command` and waits for the reply.
    ///
    /// The command must not carry its own trailing newline; exactly one is
    /// appended. Embedded newlines are allowed and are how here-doc bodies are
    /// sent.
    ///
    /// # Errors
    ///
    /// - [`BusError::InvalidCommand`] for an empty or newline-terminated
    ///   command. The endpoint stays usable.
    /// - [`BusError::EndpointClosed`] after an earlier failure.
    /// - [`BusError::ShortWrite`] or [`BusError::Transport`] when sending fails.
    /// - [`BusError::Timeout`] when the reply misses the deadline.
    /// - [`BusError::MalformedReply`] when the reply framing is wrong.
    ///
    /// All but the first close the endpoint.
    pub fn call(&mut self, command: &str) -> Result<CallResult, BusError> {
        validate(command)?;
        let Some(stream) = self.stream.as_ref() else {
            return Err(BusError::EndpointClosed);
        };

        match exchange(stream, command, self.timeout) {
            Ok(result) => {
                debug!(
                    target: CLIENT_TARGET,
                    provider = %self.provider,
                    slot = self.slot,
                    status = %result.status(),
                    answer_len = result.answer().len(),
                    "call completed"
                );
                Ok(result)
            }
            Err(error) => {
                warn!(
                    target: CLIENT_TARGET,
                    provider = %self.provider,
                    slot = self.slot,
                    error = %error,
                    "call failed; closing endpoint"
                );
                self.close();
                Err(error)
            }
        }
    }

    /// Formats the command from `args` and sends it with [`Self::call`].
    ///
    /// Usually reached through the [`call!`](crate::call) macro.
    ///
    /// # Errors
    ///
    /// As for [`Self::call`].
    pub fn call_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<CallResult, BusError> {
        let command = fmt::format(args);
        self.call(&command)
    }

    /// Shuts the stream down and releases it.
    ///
    /// The provider sees a clean end of stream and retires the listener.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take()
            && let Err(error) = stream.shutdown(Shutdown::Both)
        {
            // The peer may already be gone; the stream is dropped either way.
            debug!(
                target: CLIENT_TARGET,
                provider = %self.provider,
                error = %error,
                "endpoint shutdown failed"
            );
        }
    }
}

/// Formats a command and sends it on a [`ConsumerEndpoint`].
///
/// ```ignore
/// let reply = cmdbus::call!(endpoint, "param.set {} {}", name, value)?;
/// ```
#[macro_export]
macro_rules! call {
    ($endpoint:expr, $($arg:tt)+) => {
        $endpoint.call_fmt(::std::format_args!($($arg)+))
    };
}

fn validate(command: &str) -> Result<(), BusError> {
    if command.is_empty() {
        return Err(BusError::InvalidCommand {
            reason: "command is empty",
        });
    }
    if command.ends_with('\n') {
        return Err(BusError::InvalidCommand {
            reason: "command must not end with a newline",
        });
    }
    Ok(())
}

fn exchange(
    stream: &UnixStream,
    command: &str,
    timeout: Duration,
) -> Result<CallResult, BusError> {
    let mut frame = Vec::with_capacity(command.len() + 1);
    frame.extend_from_slice(command.as_bytes());
    frame.push(b'\n');
    let mut writer = stream;
    wire::write_frame(&mut writer, &frame, "write request")?;

    let mut reader = DeadlineReader {
        stream,
        deadline: Instant::now() + timeout,
    };
    wire::read_reply(&mut reader).map_err(|error| {
        if error.is_io_timeout() {
            BusError::Timeout { timeout }
        } else {
            error
        }
    })
}

/// Reader that spreads one deadline over every read of a reply.
struct DeadlineReader<'a> {
    stream: &'a UnixStream,
    deadline: Instant,
}

impl Read for DeadlineReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(io::Error::from(io::ErrorKind::TimedOut));
        }
        self.stream.set_read_timeout(Some(remaining))?;
        let mut stream = self.stream;
        stream.read(buf)
    }
}
