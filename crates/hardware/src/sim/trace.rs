//! Request trace format and parsing.
//!
//! One request per line: `<cycle> <R|W> <addr> [size]`, addresses in decimal
//! or `0x` hex, `#` starts a comment. Request ids are assigned in line order
//! during replay, so an identical trace file always produces an identical
//! id sequence.

use thiserror::Error;

use crate::common::constants::LINE_BYTES;
use crate::request::RequestKind;

/// One request arrival in a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceEntry {
    /// Cycle at which the request arrives at the controller.
    pub at_cycle: u64,
    /// Read or write.
    pub kind: RequestKind,
    /// Device address.
    pub addr: u64,
    /// Access size in bytes.
    pub size: u32,
}

/// Errors raised while parsing a trace.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceError {
    /// A line did not have the `<cycle> <R|W> <addr> [size]` shape.
    #[error("line {line}: expected `<cycle> <R|W> <addr> [size]`, got {got:?}")]
    MalformedLine {
        /// 1-based line number.
        line: usize,
        /// The offending text.
        got: String,
    },

    /// A numeric field failed to parse.
    #[error("line {line}: invalid number {got:?}")]
    InvalidNumber {
        /// 1-based line number.
        line: usize,
        /// The offending field.
        got: String,
    },
}

/// Parses a trace from text.
///
/// # Errors
///
/// Returns the first [`TraceError`] found.
pub fn parse(text: &str) -> Result<Vec<TraceEntry>, TraceError> {
    let mut entries = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let content = raw.split('#').next().unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }
        let mut fields = content.split_whitespace();
        let (Some(cycle), Some(op), Some(addr)) =
            (fields.next(), fields.next(), fields.next())
        else {
            return Err(TraceError::MalformedLine {
                line,
                got: content.to_string(),
            });
        };
        let kind = match op {
            "R" | "r" => RequestKind::Read,
            "W" | "w" => RequestKind::Write,
            _ => {
                return Err(TraceError::MalformedLine {
                    line,
                    got: content.to_string(),
                });
            }
        };
        let at_cycle = parse_number(cycle, line)?;
        let addr = parse_number(addr, line)?;
        let size = match fields.next() {
            Some(text) => parse_number(text, line)? as u32,
            None => LINE_BYTES as u32,
        };
        if fields.next().is_some() {
            return Err(TraceError::MalformedLine {
                line,
                got: content.to_string(),
            });
        }
        entries.push(TraceEntry {
            at_cycle,
            kind,
            addr,
            size,
        });
    }
    Ok(entries)
}

fn parse_number(text: &str, line: usize) -> Result<u64, TraceError> {
    let parsed = text
        .strip_prefix("0x")
        .map_or_else(|| text.parse(), |hex| u64::from_str_radix(hex, 16));
    parsed.map_err(|_| TraceError::InvalidNumber {
        line,
        got: text.to_string(),
    })
}
