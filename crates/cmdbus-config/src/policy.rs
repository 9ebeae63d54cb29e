//! Reaction to fatal bus conditions.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// What a dispatch loop does once it hits a fatal error.
///
/// Protocol violations and transport failures cannot be resynchronised on a
/// line-oriented stream, so the loop never continues past one. The policy only
/// selects how the failure leaves the loop.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum FatalPolicy {
    /// Log the error and abort the process so a supervisor can restart it.
    #[default]
    Abort,
    /// Log the error, stop the loop, and report the error from `join`.
    Stop,
}

/// Errors encountered while parsing a [`FatalPolicy`] from text.
pub type FatalPolicyParseError = strum::ParseError;
