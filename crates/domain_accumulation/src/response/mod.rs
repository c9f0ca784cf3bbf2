//! Payer response parsing
//!
//! Parsers turn a decrypted response file into one result per response
//! line. A bad line never aborts the file: it comes back as a
//! [`ResponseParseError`], carrying the transaction id when it could be read
//! so the processor can mark that mapping ROW_ERROR.

mod code_table;
mod segment;
mod delimited;

pub use code_table::{ResponseCodeTable, ResponseOutcome};
pub use segment::SegmentResponseParser;
pub use delimited::DelimitedResponseParser;

use serde::Serialize;
use thiserror::Error;

use core_kernel::Cents;

/// One interpreted response line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseLine {
    pub line_number: usize,
    pub transaction_id: String,
    pub code: String,
    pub deductible: Option<Cents>,
    pub oop_applied: Option<Cents>,
    pub message: Option<String>,
}

/// A response line that could not be interpreted
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[error("line {line_number}: {reason}")]
pub struct ResponseParseError {
    pub line_number: usize,
    pub transaction_id: Option<String>,
    pub reason: String,
}

impl ResponseParseError {
    pub fn new(line_number: usize, transaction_id: Option<&str>, reason: impl Into<String>) -> Self {
        Self {
            line_number,
            transaction_id: transaction_id
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_ascii_uppercase),
            reason: reason.into(),
        }
    }
}

/// Result of parsing a whole response file
#[derive(Debug, Clone, Default)]
pub struct ParsedResponse {
    pub lines: Vec<Result<ResponseLine, ResponseParseError>>,
    /// File-level irregularities such as a trailer count mismatch
    pub anomalies: Vec<String>,
}

impl ParsedResponse {
    pub fn ok_count(&self) -> usize {
        self.lines.iter().filter(|line| line.is_ok()).count()
    }

    pub fn error_count(&self) -> usize {
        self.lines.len() - self.ok_count()
    }
}

/// Parses one payer's response files
pub trait ResponseParser: Send + Sync {
    fn parse(&self, content: &str) -> ParsedResponse;
}

/// Parses an optional decimal-dollar field; empty means not supplied
pub(crate) fn parse_amount(
    line_number: usize,
    transaction_id: &str,
    field: &str,
    raw: Option<&str>,
) -> Result<Option<Cents>, ResponseParseError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => Cents::parse_dollars(value).map(Some).map_err(|e| {
            ResponseParseError::new(line_number, Some(transaction_id), format!("invalid {field}: {e}"))
        }),
    }
}

/// Builds a line from positional fields shared by both layouts:
/// transaction id, code, deductible, oop, message
pub(crate) fn line_from_fields(
    line_number: usize,
    fields: &[&str],
) -> Result<ResponseLine, ResponseParseError> {
    let transaction_id = fields.first().map(|f| f.trim()).unwrap_or_default();
    if transaction_id.is_empty() {
        return Err(ResponseParseError::new(line_number, None, "missing transaction id"));
    }
    let code = fields.get(1).map(|f| f.trim()).unwrap_or_default();
    if code.is_empty() {
        return Err(ResponseParseError::new(line_number, Some(transaction_id), "missing response code"));
    }
    let deductible = parse_amount(line_number, transaction_id, "deductible", fields.get(2).copied())?;
    let oop_applied = parse_amount(line_number, transaction_id, "oop", fields.get(3).copied())?;
    let message = fields
        .get(4)
        .map(|m| m.trim())
        .filter(|m| !m.is_empty())
        .map(str::to_string);

    Ok(ResponseLine {
        line_number,
        transaction_id: transaction_id.to_ascii_uppercase(),
        code: code.to_string(),
        deductible,
        oop_applied,
        message,
    })
}
