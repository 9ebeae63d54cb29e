//! Shared configuration for the command bus.
//!
//! A [`Config`] fixes the limits a provider enforces (listener capacity,
//! request line size), the deadline consumers wait for a reply, what a
//! dispatch loop does on a fatal error, and how telemetry is rendered. Every
//! field has a default, so partial documents deserialise cleanly:
//!
//! ```json
//! { "max_listeners": 4, "on_fatal": "stop" }
//! ```

mod defaults;
mod logging;
mod policy;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use defaults::{
    DEFAULT_CALL_TIMEOUT_MS, DEFAULT_LOG_FILTER, DEFAULT_MAX_LINE_BYTES, DEFAULT_MAX_LISTENERS,
    MIN_LINE_BYTES, default_call_timeout, default_fatal_policy, default_log_filter_string,
    default_log_format,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use policy::{FatalPolicy, FatalPolicyParseError};

/// Bus configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub(crate) max_listeners: usize,
    pub(crate) max_line_bytes: usize,
    pub(crate) call_timeout_ms: u64,
    pub(crate) on_fatal: FatalPolicy,
    pub(crate) log_filter: String,
    pub(crate) log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_listeners: DEFAULT_MAX_LISTENERS,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            call_timeout_ms: DEFAULT_CALL_TIMEOUT_MS,
            on_fatal: default_fatal_policy(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Number of consumers one provider accepts.
    #[must_use]
    pub const fn max_listeners(&self) -> usize {
        self.max_listeners
    }

    /// Upper bound on one request line, newline included.
    #[must_use]
    pub const fn max_line_bytes(&self) -> usize {
        self.max_line_bytes
    }

    /// Deadline for a consumer to receive a complete reply.
    #[must_use]
    pub const fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Reaction of the dispatch loop to fatal errors.
    #[must_use]
    pub const fn on_fatal(&self) -> FatalPolicy {
        self.on_fatal
    }

    /// `tracing` filter directive.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Sets the listener capacity.
    #[must_use]
    pub const fn with_max_listeners(mut self, max_listeners: usize) -> Self {
        self.max_listeners = max_listeners;
        self
    }

    /// Sets the request line limit.
    #[must_use]
    pub const fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes;
        self
    }

    /// Sets the reply deadline. Sub-millisecond precision is dropped.
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the fatal error policy.
    #[must_use]
    pub const fn with_on_fatal(mut self, policy: FatalPolicy) -> Self {
        self.on_fatal = policy;
        self
    }

    /// Sets the log filter directive.
    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Sets the log output format.
    #[must_use]
    pub const fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    /// Checks that the limits describe a usable bus.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the listener capacity or timeout is zero,
    /// or the line limit cannot hold a single byte of content.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.max_listeners == 0 {
            return Err(ConfigError::ZeroListeners);
        }
        if self.max_line_bytes < MIN_LINE_BYTES {
            return Err(ConfigError::LineLimitTooSmall {
                minimum: MIN_LINE_BYTES,
                actual: self.max_line_bytes,
            });
        }
        if self.call_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A provider must accept at least one consumer.
    #[error("max_listeners must be at least 1")]
    ZeroListeners,
    /// The line limit leaves no room for content.
    #[error("max_line_bytes must be at least {minimum}, got {actual}")]
    LineLimitTooSmall {
        /// Smallest accepted value.
        minimum: usize,
        /// Configured value.
        actual: usize,
    },
    /// A zero deadline would fail every call.
    #[error("call_timeout_ms must be greater than zero")]
    ZeroTimeout,
}

#[cfg(test)]
mod tests;
