//! Package entries backed by files on disk.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use memmap2::Mmap;
use tracing::{debug, trace, warn};

use crate::config::ParseLimits;
use crate::error::{Result, SymbolsError};
use crate::package::PackageEntry;

/// A file read through a read-only memory map, bounded in size
#[derive(Debug, Clone)]
pub struct FileEntry {
    name: String,
    path: PathBuf,
    max_size: u64,
}

impl FileEntry {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, max_size: u64) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            max_size,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_bounded(path: &Path, max_size: u64) -> io::Result<Bytes> {
    let file = File::open(path)?;
    let file_size = file.metadata()?.len();

    if file_size > max_size {
        warn!(
            path = %path.display(),
            size = file_size,
            limit = max_size,
            "File is too large"
        );
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "file size of {} bytes exceeds the maximum of {} bytes",
                file_size, max_size
            ),
        ));
    }

    // memmap cannot map empty files.
    if file_size == 0 {
        return Ok(Bytes::new());
    }

    // Safety: read-only map of a regular file, copied out before the map drops.
    let map = unsafe { Mmap::map(&file)? };
    trace!(path = %path.display(), len = map.len(), "Mapped entry");
    Ok(Bytes::copy_from_slice(&map))
}

#[async_trait]
impl PackageEntry for FileEntry {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(&self) -> Result<Bytes> {
        let path = self.path.clone();
        let max_size = self.max_size;
        let read = tokio::task::spawn_blocking(move || read_bounded(&path, max_size))
            .await
            .map_err(|e| SymbolsError::Internal(format!("entry read task failed: {}", e)))?;
        read.map_err(|e| SymbolsError::entry(self.name.clone(), e))
    }
}

/// An unpacked package directory
pub struct DirectoryPackage {
    root: PathBuf,
    entries: Vec<Arc<dyn PackageEntry>>,
}

impl DirectoryPackage {
    /// Collect every regular file under `root`, ordered by relative name.
    pub fn scan(root: impl AsRef<Path>, max_entry_size: u64) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let mut files = Vec::new();
        collect_files(&root, &root, &mut files)?;
        files.sort_by(|a, b| a.0.cmp(&b.0));

        debug!(root = %root.display(), entries = files.len(), "Scanned package directory");

        let entries = files
            .into_iter()
            .map(|(name, path)| {
                Arc::new(FileEntry::new(name, path, max_entry_size)) as Arc<dyn PackageEntry>
            })
            .collect();
        Ok(Self { root, entries })
    }

    /// Scan with entries bounded by `limits.max_entry_size`.
    pub fn scan_with(root: impl AsRef<Path>, limits: &ParseLimits) -> Result<Self> {
        Self::scan(root, limits.max_entry_size)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entries(&self) -> &[Arc<dyn PackageEntry>] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Arc<dyn PackageEntry>> {
        self.entries
    }
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<(String, PathBuf)>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let path = entry.path();
        if file_type.is_dir() {
            collect_files(root, &path, out)?;
        } else if file_type.is_file() {
            let relative = path
                .strip_prefix(root)
                .map_err(|e| SymbolsError::Internal(e.to_string()))?;
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            out.push((name, path));
        }
    }
    Ok(())
}
