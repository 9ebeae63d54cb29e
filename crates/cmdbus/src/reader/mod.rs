//! Request line reader and here-doc assembler.
//!
//! Requests are read one byte at a time. The dispatch loop only learns that a
//! listener is readable, not how much of the stream belongs to the current
//! request, so reading ahead would swallow the start of the next one.
//!
//! A first line containing `<< TOKEN` opens a here-doc: the following lines
//! up to a line equal to `TOKEN` form the command, joined by newlines. The
//! first line and the terminator are framing and are not delivered.

use std::io::{self, Read};

use cmdbus_config::Config;

use crate::error::BusError;

/// Sequence that opens a here-doc on the first request line.
pub const HEREDOC_MARKER: &str = "<< ";

/// Bounds applied while reading requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadLimits {
    max_line_bytes: usize,
}

impl ReadLimits {
    /// Limits with an explicit line bound, newline included.
    #[must_use]
    pub const fn new(max_line_bytes: usize) -> Self {
        Self { max_line_bytes }
    }

    /// Limits taken from the bus configuration.
    #[must_use]
    pub const fn from_config(config: &Config) -> Self {
        Self::new(config.max_line_bytes())
    }

    /// Line bound, newline included.
    #[must_use]
    pub const fn max_line_bytes(self) -> usize {
        self.max_line_bytes
    }
}

impl Default for ReadLimits {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Reads one request and assembles its command text.
///
/// Returns `Ok(None)` when the stream ends cleanly before the first byte of a
/// request, which is how a departed consumer shows up.
///
/// # Errors
///
/// - [`BusError::LineTooLong`] when a line reaches the limit without a
///   newline.
/// - [`BusError::Truncated`] when the stream ends inside a line or before the
///   here-doc terminator.
/// - [`BusError::EmptyCommand`] when the assembled text is empty.
/// - [`BusError::InvalidEncoding`] when the request is not UTF-8.
/// - [`BusError::Transport`] when reading fails.
pub fn read_command<R: Read>(
    reader: &mut R,
    limits: ReadLimits,
) -> Result<Option<String>, BusError> {
    let mut line = Vec::new();
    if !read_line(reader, &mut line, limits)? {
        return Ok(None);
    }
    let first = String::from_utf8(line).map_err(|_| BusError::InvalidEncoding)?;

    let token = first
        .split_once(HEREDOC_MARKER)
        .map(|(_, token)| token.to_owned());
    let command = match token {
        Some(token) => read_heredoc(reader, &token, limits)?,
        None => first,
    };
    if command.is_empty() {
        return Err(BusError::EmptyCommand);
    }
    Ok(Some(command))
}

fn read_heredoc<R: Read>(
    reader: &mut R,
    token: &str,
    limits: ReadLimits,
) -> Result<String, BusError> {
    let mut body = Vec::new();
    let mut line = Vec::new();
    loop {
        line.clear();
        if !read_line(reader, &mut line, limits)? {
            return Err(BusError::Truncated {
                position: "before the here-doc terminator",
            });
        }
        if line == token.as_bytes() {
            break;
        }
        body.extend_from_slice(&line);
        body.push(b'\n');
    }
    body.pop();
    String::from_utf8(body).map_err(|_| BusError::InvalidEncoding)
}

/// Appends one line, without its newline, to `line`.
///
/// Returns `false` when the stream ends before any byte was read.
fn read_line<R: Read>(
    reader: &mut R,
    line: &mut Vec<u8>,
    limits: ReadLimits,
) -> Result<bool, BusError> {
    let mut consumed = 0_usize;
    loop {
        if consumed == limits.max_line_bytes {
            return Err(BusError::LineTooLong {
                limit: limits.max_line_bytes,
            });
        }
        let Some(byte) = read_byte(reader)? else {
            if consumed == 0 {
                return Ok(false);
            }
            return Err(BusError::Truncated {
                position: "inside a request line",
            });
        };
        consumed += 1;
        if byte == b'\n' {
            return Ok(true);
        }
        line.push(byte);
    }
}

fn read_byte<R: Read>(reader: &mut R) -> Result<Option<u8>, BusError> {
    let mut byte = [0_u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => {
                let [value] = byte;
                return Ok(Some(value));
            }
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(error) => return Err(BusError::transport("read request", error)),
        }
    }
}
