use std::time::Duration;

use crate::{FatalPolicy, LogFormat};

/// Maximum number of consumers a single provider accepts.
pub const DEFAULT_MAX_LISTENERS: usize = 10;

/// Maximum size of one request line, newline included.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024;

/// Client reply deadline in milliseconds.
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 2_000;

/// Smallest usable line limit: one content byte plus the newline.
pub const MIN_LINE_BYTES: usize = 2;

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default client reply deadline.
#[must_use]
pub const fn default_call_timeout() -> Duration {
    Duration::from_millis(DEFAULT_CALL_TIMEOUT_MS)
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default reaction to fatal errors.
#[must_use]
pub const fn default_fatal_policy() -> FatalPolicy {
    FatalPolicy::Abort
}
