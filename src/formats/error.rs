//! Parse errors shared by the module and symbol-file readers.

use thiserror::Error;

/// Failure to extract identity metadata from a single file.
///
/// These are always scoped to one input buffer; the ingestion layer records
/// them against the entry and moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Invalid DOS signature")]
    InvalidDosSignature,

    #[error("Invalid PE signature")]
    InvalidPeSignature,

    #[error("Invalid optional header magic: {0:#06x}")]
    InvalidMagic(u16),

    #[error("Truncated {what}: expected {expected} bytes, got {actual}")]
    Truncated {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid RVA: {rva:#010x}")]
    InvalidRva { rva: u32 },

    #[error("Invalid file offset: {offset:#x}")]
    InvalidOffset { offset: usize },

    #[error("Image has no debug directory")]
    NoDebugDirectory,

    #[error("Malformed CodeView record: {0}")]
    MalformedCodeView(&'static str),

    #[error("Debug directory carries no usable identity")]
    NoIdentity,

    #[error("Unrecognized symbol file format")]
    UnknownSymbolFormat,

    #[error("Malformed MSF container: {0}")]
    MalformedMsf(&'static str),

    #[error("Malformed metadata: {0}")]
    MalformedMetadata(&'static str),

    #[error("Stream not found: {0}")]
    StreamNotFound(&'static str),

    #[error("Limit exceeded: {0}")]
    LimitExceeded(&'static str),
}

pub type ParseResult<T> = std::result::Result<T, ParseError>;
