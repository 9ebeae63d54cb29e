//! Reply framing shared by the dispatch loop and the client.
//!
//! A reply is a fixed 13-byte header followed by the answer and a newline:
//!
//! ```text
//! 200 2       \n
//! ok\n
//! ```
//!
//! The header holds the status left-aligned in three columns, a space, the
//! answer length in bytes left-aligned in eight columns, and a newline. The
//! length does not count the trailing newline.

use std::io::{self, Read, Write};

use crate::error::BusError;
use crate::status::{CallResult, Status};

/// Size of the reply header in bytes.
pub const HEADER_LEN: usize = 13;

/// Longest answer whose length fits the eight-column header field.
pub const MAX_ANSWER_LEN: usize = 99_999_999;

const STATUS_END: usize = 3;
const LENGTH_END: usize = HEADER_LEN - 1;

/// Serialises `result` into a complete reply frame.
///
/// # Errors
///
/// Returns [`BusError::Unencodable`] when the answer is longer than
/// [`MAX_ANSWER_LEN`].
pub fn encode_reply(result: &CallResult) -> Result<Vec<u8>, BusError> {
    let answer = result.answer().as_bytes();
    check_answer_len(answer.len())?;
    let header = format!("{:<3} {:<8}\n", result.status().code(), answer.len());
    debug_assert_eq!(header.len(), HEADER_LEN);
    let mut frame = Vec::with_capacity(HEADER_LEN + answer.len() + 1);
    frame.extend_from_slice(header.as_bytes());
    frame.extend_from_slice(answer);
    frame.push(b'\n');
    Ok(frame)
}

/// Checks that an answer of `len` bytes fits the header's length field.
///
/// # Errors
///
/// Returns [`BusError::Unencodable`] when `len` exceeds [`MAX_ANSWER_LEN`].
pub const fn check_answer_len(len: usize) -> Result<(), BusError> {
    if len > MAX_ANSWER_LEN {
        return Err(BusError::Unencodable {
            len,
            limit: MAX_ANSWER_LEN,
        });
    }
    Ok(())
}

/// Cuts the answer of `result` down to at most `limit` bytes, ending on a
/// character boundary, and marks it [`Status::TRUNCATED`].
///
/// Results that already fit are returned unchanged.
#[must_use]
pub fn truncate_answer(result: CallResult, limit: usize) -> CallResult {
    if result.answer().len() <= limit {
        return result;
    }
    let mut answer = result.into_answer();
    let end = (0..=limit)
        .rev()
        .find(|&index| answer.is_char_boundary(index))
        .unwrap_or_default();
    answer.truncate(end);
    CallResult::new(Status::TRUNCATED, answer)
}

/// Writes one reply frame.
///
/// # Errors
///
/// Returns [`BusError::Unencodable`] for oversized answers,
/// [`BusError::ShortWrite`] when the peer stops accepting bytes, and
/// [`BusError::Transport`] for other write failures.
pub fn write_reply<W: Write>(writer: &mut W, result: &CallResult) -> Result<(), BusError> {
    let frame = encode_reply(result)?;
    write_frame(writer, &frame, "write reply")
}

/// Reads and validates one reply frame.
///
/// # Errors
///
/// Returns [`BusError::MalformedReply`] when the header or terminator is
/// wrong or the stream ends early, and [`BusError::Transport`] when reading
/// fails.
pub fn read_reply<R: Read>(reader: &mut R) -> Result<CallResult, BusError> {
    let mut header = [0_u8; HEADER_LEN];
    read_exact(reader, &mut header, "the reply header")?;
    let (status, length) = parse_header(&header)?;

    let mut body = vec![0_u8; length + 1];
    read_exact(reader, &mut body, "the reply body")?;
    if body.pop() != Some(b'\n') {
        return Err(malformed("answer is not newline-terminated"));
    }
    let answer = String::from_utf8(body).map_err(|_| malformed("answer is not valid UTF-8"))?;
    Ok(CallResult::new(status, answer))
}

/// Writes `frame` in full, mapping a stalled peer to [`BusError::ShortWrite`].
pub(crate) fn write_frame<W: Write>(
    writer: &mut W,
    frame: &[u8],
    operation: &'static str,
) -> Result<(), BusError> {
    writer
        .write_all(frame)
        .and_then(|()| writer.flush())
        .map_err(|source| {
            if source.kind() == io::ErrorKind::WriteZero {
                BusError::ShortWrite {
                    expected: frame.len(),
                }
            } else {
                BusError::transport(operation, source)
            }
        })
}

fn parse_header(header: &[u8; HEADER_LEN]) -> Result<(Status, usize), BusError> {
    if !header.is_ascii() {
        return Err(malformed("header is not ASCII"));
    }
    let text = std::str::from_utf8(header).map_err(|_| malformed("header is not ASCII"))?;
    let (status_field, rest) = text.split_at(STATUS_END);
    let (separator, rest) = rest.split_at(1);
    let (length_field, terminator) = rest.split_at(LENGTH_END - STATUS_END - 1);
    if separator != " " || terminator != "\n" {
        return Err(malformed("header fields are misaligned"));
    }

    let code = numeric_field(status_field, "status")?
        .parse::<u16>()
        .map_err(|_| malformed(format!("status field {status_field:?} is out of range")))?;
    let status = Status::new(code)
        .ok_or_else(|| malformed(format!("status {code} is not a three-digit code")))?;
    let length = numeric_field(length_field, "length")?
        .parse::<usize>()
        .map_err(|_| malformed(format!("length field {length_field:?} is out of range")))?;
    Ok((status, length))
}

/// Strips the space padding of a left-aligned field and requires the
/// remaining digits to be plain ASCII, without sign or inner spaces.
fn numeric_field<'a>(field: &'a str, name: &str) -> Result<&'a str, BusError> {
    let digits = field.trim_end_matches(' ');
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(malformed(format!("{name} field {field:?} is not a number")));
    }
    Ok(digits)
}

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8], part: &str) -> Result<(), BusError> {
    reader.read_exact(buf).map_err(|source| {
        if source.kind() == io::ErrorKind::UnexpectedEof {
            malformed(format!("stream ended inside {part}"))
        } else {
            BusError::transport("read reply", source)
        }
    })
}

fn malformed(reason: impl Into<String>) -> BusError {
    BusError::MalformedReply {
        reason: reason.into(),
    }
}
