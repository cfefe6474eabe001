//! Symbol-server ingestion for package feeds.
//!
//! Reads the identity of PE modules and their PDB or Portable PDB symbol
//! files from header fields, and publishes both under
//! `symbols/{file}/{signature}/{file}` in a content store.

/// Configuration types
pub mod config;
/// Crate-level error type
pub mod error;
/// PE and PDB header parsers
pub mod formats;
/// Package ingestion pipeline
pub mod ingest;
/// Tracing setup and logging macros
pub mod logging;
/// Package entries
pub mod package;
/// Content stores
pub mod store;
/// Signatures, paths, and module/symbol pairing
pub mod symbols;
/// Timeouts for async operations
pub mod timeout;

pub use config::SymbolsConfig;
pub use error::{Result, SymbolsError};
pub use formats::{ParseError, ParseResult};
pub use ingest::{FeedService, IngestReport, SymbolIngestor};
pub use package::{DirectoryPackage, FileEntry, MemoryEntry, PackageEntry, PackageIdentity};
pub use store::{ContentStore, FileSystemStore, MemoryStore};
pub use symbols::{HeaderSignatureExtractor, Signature, SignatureExtractor, SymbolServerPath};
