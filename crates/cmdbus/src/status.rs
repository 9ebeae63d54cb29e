//! Reply values exchanged per request.

use std::fmt;

/// Three-digit reply status.
///
/// Codes follow the CLI result protocol: `1xx` for malformed or refused
/// commands, `2xx` for success, `3xx` for commands that could not run,
/// `4xx` for communication failures and `5xx` for a closing peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Status(u16);

impl Status {
    /// The command could not be parsed.
    pub const SYNTAX: Self = Self(100);
    /// The command is not known.
    pub const UNKNOWN: Self = Self(101);
    /// The command is known but not implemented.
    pub const UNIMPL: Self = Self(102);
    /// Too few parameters.
    pub const TOOFEW: Self = Self(104);
    /// Too many parameters.
    pub const TOOMANY: Self = Self(105);
    /// A parameter was rejected.
    pub const PARAM: Self = Self(106);
    /// Authentication is required.
    pub const AUTH: Self = Self(107);
    /// Success.
    pub const OK: Self = Self(200);
    /// Success, answer truncated.
    pub const TRUNCATED: Self = Self(201);
    /// The command could not be carried out.
    pub const CANT: Self = Self(300);
    /// Communication failure.
    pub const COMMS: Self = Self(400);
    /// The peer is closing the connection.
    pub const CLOSE: Self = Self(500);

    /// Smallest encodable code.
    pub const MIN: u16 = 100;
    /// Largest encodable code.
    pub const MAX: u16 = 999;

    /// Builds a status from a three-digit code.
    #[must_use]
    pub const fn new(code: u16) -> Option<Self> {
        if code >= Self::MIN && code <= Self::MAX {
            Some(Self(code))
        } else {
            None
        }
    }

    /// Numeric code.
    #[must_use]
    pub const fn code(self) -> u16 {
        self.0
    }

    /// Whether the status reports success.
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 >= 200 && self.0 < 300
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u16> for Status {
    type Error = u16;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        Self::new(code).ok_or(code)
    }
}

/// Status and answer of one request.
///
/// The provider's handler returns one of these per command; the client
/// receives an independent copy decoded from the wire. The answer may be
/// empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallResult {
    status: Status,
    answer: String,
}

impl CallResult {
    /// Creates a result.
    #[must_use]
    pub fn new(status: Status, answer: impl Into<String>) -> Self {
        Self {
            status,
            answer: answer.into(),
        }
    }

    /// Successful result carrying `answer`.
    #[must_use]
    pub fn ok(answer: impl Into<String>) -> Self {
        Self::new(Status::OK, answer)
    }

    /// Reply status.
    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    /// Reply text.
    #[must_use]
    pub fn answer(&self) -> &str {
        &self.answer
    }

    /// Takes ownership of the reply text.
    #[must_use]
    pub fn into_answer(self) -> String {
        self.answer
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(99, None)]
    #[case(100, Some(Status::SYNTAX))]
    #[case(200, Some(Status::OK))]
    #[case(999, Status::new(999))]
    #[case(1000, None)]
    fn status_accepts_three_digit_codes(#[case] code: u16, #[case] expected: Option<Status>) {
        assert_eq!(Status::new(code), expected);
        assert_eq!(Status::try_from(code).ok(), expected);
    }

    #[test]
    fn success_covers_the_2xx_range() {
        assert!(Status::OK.is_success());
        assert!(Status::TRUNCATED.is_success());
        assert!(!Status::CANT.is_success());
        assert!(!Status::UNKNOWN.is_success());
    }

    #[test]
    fn result_hands_over_its_answer() {
        let result = CallResult::new(Status::CANT, "busy");
        assert_eq!(result.status(), Status::CANT);
        assert_eq!(result.answer(), "busy");
        assert_eq!(result.into_answer(), "busy");
        assert_eq!(CallResult::ok("").status().to_string(), "200");
    }
}
