//! Log output selection for bus telemetry.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Output format of the `tracing` subscriber installed by the bus.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event, fields flattened.
    #[default]
    Json,
    /// Single-line text for terminals.
    Compact,
}

impl LogFormat {
    /// Whether events are emitted as machine-readable records.
    #[must_use]
    pub const fn is_structured(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Errors encountered while parsing a [`LogFormat`] from text.
pub type LogFormatParseError = strum::ParseError;
