//! Content store rooted in a local directory.
//!
//! Objects are written to a uniquely named temporary file beside their final
//! location and renamed into place, so a reader sees either nothing or the
//! whole object.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::{Result, SymbolsError};
use crate::store::ContentStore;

#[derive(Debug, Clone)]
pub struct FileSystemStore {
    root: PathBuf,
}

impl FileSystemStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a store key onto a path under the root.
    ///
    /// Keys with empty, `.` or `..` segments, or a leading separator, are
    /// rejected so no key can address a file outside the root.
    pub fn object_path(&self, key: &str) -> Result<PathBuf> {
        let invalid = |reason: &str| {
            SymbolsError::InvalidArgument(format!("invalid store key '{}': {}", key, reason))
        };

        if key.is_empty() {
            return Err(invalid("empty key"));
        }
        if key.contains('\\') || key.contains(':') {
            return Err(invalid("unsupported character"));
        }

        let mut path = self.root.clone();
        for segment in key.split('/') {
            match segment {
                "" => return Err(invalid("empty segment")),
                "." | ".." => return Err(invalid("relative segment")),
                _ => path.push(segment),
            }
        }
        Ok(path)
    }
}

/// Temporary object file removed on drop unless it was renamed into place
struct TempObject {
    path: PathBuf,
    active: bool,
}

impl TempObject {
    fn beside(target: &Path) -> Option<Self> {
        let parent = target.parent()?;
        Some(Self {
            path: parent.join(format!(".{}.tmp", Uuid::new_v4().simple())),
            active: true,
        })
    }

    fn persist(mut self, target: &Path) -> io::Result<()> {
        std::fs::rename(&self.path, target)?;
        self.active = false;
        Ok(())
    }
}

impl Drop for TempObject {
    fn drop(&mut self) {
        if self.active {
            // Best effort; the file may never have been created.
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Create parents, write a temporary file and rename it over `target`.
///
/// Runs on a blocking thread that finishes even when the awaiting future is
/// dropped, so the temporary file is always renamed or removed.
fn write_object(target: &Path, data: &[u8]) -> io::Result<()> {
    let temp = TempObject::beside(target).ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "object path has no parent")
    })?;
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    trace!(temp = %temp.path.display(), "Writing object to temporary file");
    std::fs::write(&temp.path, data)?;
    temp.persist(target)
}

#[async_trait]
impl ContentStore for FileSystemStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.object_path(key)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| SymbolsError::store(key, e))
    }

    async fn write(&self, key: &str, data: Bytes) -> Result<()> {
        let path = self.object_path(key)?;
        let size = data.len();

        tokio::task::spawn_blocking(move || write_object(&path, &data))
            .await
            .map_err(|e| SymbolsError::Internal(format!("store write task failed: {}", e)))?
            .map_err(|e| SymbolsError::store(key, e))?;

        debug!(key, size, "Stored object");
        Ok(())
    }
}
