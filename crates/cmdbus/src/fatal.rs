//! Process termination for unrecoverable bus failures.

use std::io::{self, Write};

use tracing::error;

use crate::error::BusError;

const FATAL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::fatal");

/// Reports `error` and aborts the process.
///
/// The message goes to the tracing subscriber and, since one may not be
/// installed, directly to stderr as well. Nothing is unwound: a bus that has
/// lost framing on one endpoint cannot vouch for the others.
pub fn terminate(error: &BusError) -> ! {
    error!(
        target: FATAL_TARGET,
        error = %error,
        kind = ?error.kind(),
        "unrecoverable command bus failure"
    );
    let mut stderr = io::stderr().lock();
    if writeln!(stderr, "cmdbus: fatal: {error}").is_err() {
        // Nowhere left to report; abort regardless.
    }
    std::process::abort()
}
