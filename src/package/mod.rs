//! Package contents as seen by the ingestion pipeline.
//!
//! A package is an ordered list of named entries. Names are relative and
//! `/`-separated; an entry is only read when the pipeline needs its bytes.

pub mod file;

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use file::{DirectoryPackage, FileEntry};

/// One named file inside a package
#[async_trait]
pub trait PackageEntry: Send + Sync {
    /// Relative name inside the package, e.g. `lib/net45/Foo.dll`
    fn name(&self) -> &str;

    /// Full contents of the entry
    async fn open(&self) -> Result<Bytes>;
}

/// Entry whose contents are already in memory
#[derive(Debug, Clone)]
pub struct MemoryEntry {
    name: String,
    data: Bytes,
}

impl MemoryEntry {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

#[async_trait]
impl PackageEntry for MemoryEntry {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(&self) -> Result<Bytes> {
        Ok(self.data.clone())
    }
}

/// Identifies a package version to a feed service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageIdentity {
    pub id: String,
    pub version: String,
}

impl PackageIdentity {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}
