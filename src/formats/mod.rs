//! Binary format readers.
//!
//! Only the header fields needed to compute symbol-server identities are
//! decoded. Every read is bounds-checked against the input buffer.

pub mod error;
pub mod pdb;
pub mod pe;
pub mod utils;

pub use error::{ParseError, ParseResult};
