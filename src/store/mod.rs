//! Destination for published modules and symbol files.
//!
//! Keys are `/`-separated relative paths such as
//! `symbols/Foo.dll/5f3a...1/Foo.dll`. Implementations must:
//! - treat `write` as create-or-replace under the key,
//! - report every backend failure as `SymbolsError::StoreUnavailable`,
//! - never interpret the bytes they hold.

pub mod fs;
pub mod memory;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

pub use fs::FileSystemStore;
pub use memory::MemoryStore;

/// Key-value blob store addressed by symbol-server paths
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Whether an object is stored under `key`
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Store `data` under `key`
    async fn write(&self, key: &str, data: Bytes) -> Result<()>;
}
