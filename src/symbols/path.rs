//! Symbol-server path layout: `{file}/{signature}/{file}`

use std::fmt;

use crate::error::{Result, SymbolsError};
use crate::symbols::identity::Signature;

/// Relative path under which a symbol server publishes a file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymbolServerPath(String);

impl SymbolServerPath {
    /// Build the canonical path for `file_name` keyed by `signature`.
    ///
    /// `file_name` must be a single path component; the file name appears
    /// verbatim as both the first and the last segment.
    pub fn resolve(file_name: &str, signature: &str) -> Result<Self> {
        if file_name.is_empty() {
            return Err(SymbolsError::InvalidArgument(
                "symbol path file name is empty".into(),
            ));
        }
        if signature.is_empty() {
            return Err(SymbolsError::InvalidArgument(
                "symbol path signature is empty".into(),
            ));
        }
        if file_name.contains(is_separator) {
            return Err(SymbolsError::InvalidArgument(format!(
                "symbol path file name '{}' contains a path separator",
                file_name
            )));
        }

        Ok(Self(format!("{file_name}/{signature}/{file_name}")))
    }

    pub fn for_signature(file_name: &str, signature: &Signature) -> Result<Self> {
        Self::resolve(file_name, signature.as_str())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Store key with the feed-level prefix, e.g. `symbols/a.dll/…/a.dll`
    pub fn store_key(&self, prefix: &str) -> String {
        let prefix = prefix.trim_matches('/');
        if prefix.is_empty() {
            self.0.clone()
        } else {
            format!("{}/{}", prefix, self.0)
        }
    }
}

impl fmt::Display for SymbolServerPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Final path component of a package entry name
pub fn file_name(entry_name: &str) -> &str {
    entry_name
        .rsplit(is_separator)
        .next()
        .unwrap_or(entry_name)
}

/// Package containers use `/`, but Windows tooling sometimes writes `\`
pub fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}
