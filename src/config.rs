//! Configuration for symbol ingestion.
//!
//! Every section has working defaults, so an empty JSON object is a valid
//! configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SymbolsError};
use crate::symbols::SignatureKind;

/// Master configuration for the ingestion pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolsConfig {
    /// Which package entries are ingested and where they land.
    pub ingest: IngestConfig,
    /// How module signatures are selected.
    pub signatures: SignatureConfig,
    /// Upper bounds applied while parsing untrusted files.
    pub limits: ParseLimits,
    /// Content store behaviour.
    pub store: StoreConfig,
}

impl SymbolsConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.ingest.validate()?;
        self.signatures.validate()?;
        if self.store.op_timeout_secs == 0 {
            return Err(SymbolsError::Config(
                "store.op_timeout_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Entry selection and store layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Suffixes identifying modules (default: [".dll"]).
    pub module_extensions: Vec<String>,
    /// Suffixes identifying symbol files (default: [".pdb"]).
    pub symbol_extensions: Vec<String>,
    /// Leading key segment in the store (default: "symbols").
    pub path_prefix: String,
    /// Modules processed at once (default: 8).
    pub max_concurrency: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            module_extensions: vec![".dll".to_string()],
            symbol_extensions: vec![".pdb".to_string()],
            path_prefix: "symbols".to_string(),
            max_concurrency: 8,
        }
    }
}

impl IngestConfig {
    pub fn is_module(&self, name: &str) -> bool {
        has_suffix(name, &self.module_extensions)
    }

    pub fn is_symbol(&self, name: &str) -> bool {
        has_suffix(name, &self.symbol_extensions)
    }

    fn validate(&self) -> Result<()> {
        if self.module_extensions.iter().all(|e| e.is_empty()) {
            return Err(SymbolsError::Config(
                "ingest.module_extensions must not be empty".into(),
            ));
        }
        if self.symbol_extensions.iter().all(|e| e.is_empty()) {
            return Err(SymbolsError::Config(
                "ingest.symbol_extensions must not be empty".into(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(SymbolsError::Config(
                "ingest.max_concurrency must be greater than zero".into(),
            ));
        }
        if self.path_prefix.trim_matches('/').is_empty() {
            return Err(SymbolsError::Config(
                "ingest.path_prefix must not be empty".into(),
            ));
        }
        Ok(())
    }
}

fn has_suffix(name: &str, suffixes: &[String]) -> bool {
    suffixes.iter().filter(|s| !s.is_empty()).any(|suffix| {
        name.len() >= suffix.len()
            && name.is_char_boundary(name.len() - suffix.len())
            && name[name.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
    })
}

/// Module signature selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureConfig {
    /// Kinds tried in order; the first one the image supplies wins
    /// (default: [codeview, timestamp]).
    pub priority: Vec<SignatureKind>,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            priority: vec![SignatureKind::CodeView, SignatureKind::Timestamp],
        }
    }
}

impl SignatureConfig {
    /// Classic symbol-server image key: timestamp and image size first
    pub fn timestamp_first() -> Self {
        Self {
            priority: vec![SignatureKind::Timestamp, SignatureKind::CodeView],
        }
    }

    fn validate(&self) -> Result<()> {
        if self.priority.is_empty() {
            return Err(SymbolsError::Config(
                "signatures.priority must not be empty".into(),
            ));
        }
        if let Some(kind) = self.priority.iter().find(|k| !k.is_module_kind()) {
            return Err(SymbolsError::Config(format!(
                "signatures.priority: '{}' is not a module signature kind",
                kind
            )));
        }
        Ok(())
    }
}

/// Bounds on work done for a single untrusted file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseLimits {
    /// Debug directory entries examined (default: 64).
    pub max_debug_entries: usize,
    /// Largest CodeView record accepted (default: 4096).
    pub max_codeview_size: usize,
    /// Largest MSF stream directory accepted (default: 1MB).
    pub max_msf_directory_bytes: usize,
    /// Largest package entry read from disk (default: 268435456 = 256MB).
    pub max_entry_size: u64,
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self {
            max_debug_entries: 64,
            max_codeview_size: 4096,
            max_msf_directory_bytes: 1024 * 1024,
            max_entry_size: 256 * 1024 * 1024,
        }
    }
}

/// Content store behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Deadline for a single exists or write call (default: 60).
    pub op_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            op_timeout_secs: 60,
        }
    }
}
