//! Segment codec
//!
//! Tokenises delimited accumulation files into segments (an id plus ordered
//! elements) and renders them back. The codec never validates grammar; that
//! is the job of each payer's builder and parser.

mod delimiters;
mod segment;

pub use delimiters::Delimiters;
pub use segment::{Segment, SegmentCodec};

use thiserror::Error;

/// Errors raised by delimiter configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Delimiters must be distinct: {0}")]
    AmbiguousDelimiters(String),

    #[error("Line ending token must not contain a delimiter")]
    InvalidLineEnding,
}
