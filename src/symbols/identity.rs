//! Identity signatures for modules and symbol files.
//!
//! A signature is derived from a handful of header fields, never from the
//! file contents as a whole, so rebuilding a file with different bytes
//! elsewhere (resources, padding, embedded build dates) keeps its key.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::config::{ParseLimits, SignatureConfig};
use crate::formats::pdb::{self, PdbIdentity, SymbolFormat};
use crate::formats::pe::{CodeViewRecord, DebugEntry, DebugType, PeParser};
use crate::formats::{ParseError, ParseResult};

/// Header fields a signature was rendered from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureKind {
    /// GUID and age from a CodeView RSDS record
    #[serde(rename = "codeview")]
    CodeView,
    /// COFF TimeDateStamp and SizeOfImage (legacy)
    Timestamp,
    /// GUID and age from an MSF PDB info stream
    Pdb,
    /// GUID from a Portable PDB id with the fixed symbol-server age
    PortablePdb,
}

impl SignatureKind {
    /// Kinds that can be selected for a module through the priority list
    pub fn is_module_kind(self) -> bool {
        matches!(self, Self::CodeView | Self::Timestamp)
    }
}

impl fmt::Display for SignatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CodeView => write!(f, "codeview"),
            Self::Timestamp => write!(f, "timestamp"),
            Self::Pdb => write!(f, "pdb"),
            Self::PortablePdb => write!(f, "portable-pdb"),
        }
    }
}

/// Deterministic lookup key for a file on a symbol server
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    kind: SignatureKind,
    value: String,
}

impl Signature {
    pub fn new(kind: SignatureKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    /// `{guid:N}{age:x}`, the key of GUID-identified artifacts
    pub fn from_guid_age(kind: SignatureKind, guid: &[u8; 16], age: u32) -> Self {
        let guid = Uuid::from_bytes_le(*guid);
        Self::new(kind, format!("{}{:x}", guid.simple(), age))
    }

    /// `{timestamp:08x}{size_of_image:x}`, the legacy image key
    pub fn from_timestamp(time_date_stamp: u32, size_of_image: u32) -> Self {
        Self::new(
            SignatureKind::Timestamp,
            format!("{:08x}{:x}", time_date_stamp, size_of_image),
        )
    }

    pub fn kind(&self) -> SignatureKind {
        self.kind
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl From<&PdbIdentity> for Signature {
    fn from(identity: &PdbIdentity) -> Self {
        let kind = match identity.format {
            SymbolFormat::Msf => SignatureKind::Pdb,
            SymbolFormat::Portable => SignatureKind::PortablePdb,
        };
        Self::from_guid_age(kind, &identity.guid, identity.age)
    }
}

/// External symbol file named by a module's CodeView entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolReference {
    pub pdb_path: String,
    /// Key the referenced symbol file is expected to be published under
    pub signature: Signature,
}

/// Everything the debug directory of a module told us
#[derive(Debug, Clone)]
pub struct DebugInfo {
    pub signature: Signature,
    pub entries: Vec<DebugEntry>,
    pub codeview: Option<CodeViewRecord>,
    /// A REPRO entry marks a deterministic build
    pub reproducible: bool,
    references_portable_pdb: bool,
}

impl DebugInfo {
    pub fn symbol_reference(&self) -> Option<SymbolReference> {
        match self.codeview.as_ref()? {
            CodeViewRecord::Rsds {
                guid,
                age,
                pdb_path,
            } => {
                let signature = if self.references_portable_pdb {
                    Signature::from_guid_age(
                        SignatureKind::PortablePdb,
                        guid,
                        pdb::PORTABLE_PDB_AGE,
                    )
                } else {
                    Signature::from_guid_age(SignatureKind::Pdb, guid, *age)
                };
                Some(SymbolReference {
                    pdb_path: pdb_path.clone(),
                    signature,
                })
            }
            CodeViewRecord::Nb10 { .. } => None,
        }
    }
}

/// Parse a module's debug directory and pick its signature.
///
/// Candidates are tried in `config.priority` order; the first one the image
/// can supply wins.
pub fn module_debug_info(
    data: &[u8],
    config: &SignatureConfig,
    limits: &ParseLimits,
) -> ParseResult<DebugInfo> {
    let pe = PeParser::new(data)?;
    let entries = pe.debug_entries(limits.max_debug_entries)?;

    let mut codeview = None;
    let mut codeview_error = None;
    let mut references_portable_pdb = false;
    for entry in entries.iter().filter(|e| e.debug_type == DebugType::CodeView) {
        match pe.codeview(entry, limits.max_codeview_size) {
            Ok(record) => {
                references_portable_pdb = entry.references_portable_pdb();
                codeview = Some(record);
                break;
            }
            Err(err) => {
                debug!(error = %err, "Ignoring malformed CodeView entry");
                codeview_error = Some(err);
            }
        }
    }

    let candidate = |kind: SignatureKind| -> Option<Signature> {
        match kind {
            SignatureKind::CodeView => match codeview.as_ref()? {
                CodeViewRecord::Rsds { guid, age, .. } => {
                    Some(Signature::from_guid_age(SignatureKind::CodeView, guid, *age))
                }
                CodeViewRecord::Nb10 { .. } => None,
            },
            SignatureKind::Timestamp => {
                Some(Signature::from_timestamp(pe.time_date_stamp(), pe.size_of_image()))
            }
            SignatureKind::Pdb | SignatureKind::PortablePdb => None,
        }
    };

    let signature = config
        .priority
        .iter()
        .find_map(|&kind| candidate(kind))
        .ok_or_else(|| codeview_error.unwrap_or(ParseError::NoIdentity))?;

    let reproducible = entries.iter().any(|e| e.debug_type == DebugType::Repro);
    trace!(
        signature = %signature,
        kind = %signature.kind(),
        entries = entries.len(),
        reproducible,
        "Extracted module signature"
    );

    Ok(DebugInfo {
        signature,
        entries,
        codeview,
        reproducible,
        references_portable_pdb,
    })
}

/// Parse a standalone symbol file and render its signature
pub fn symbol_signature(data: &[u8], limits: &ParseLimits) -> ParseResult<Signature> {
    let identity = pdb::parse_identity(data, limits.max_msf_directory_bytes)?;
    Ok(Signature::from(&identity))
}

/// Source of signatures for the ingestion pipeline.
///
/// The default implementation reads real headers; tests substitute fakes.
pub trait SignatureExtractor: Send + Sync {
    fn module_signature(&self, data: &[u8]) -> ParseResult<Signature>;
    fn symbol_signature(&self, data: &[u8]) -> ParseResult<Signature>;
}

/// Extracts signatures from PE debug directories and PDB headers
#[derive(Debug, Clone, Default)]
pub struct HeaderSignatureExtractor {
    config: SignatureConfig,
    limits: ParseLimits,
}

impl HeaderSignatureExtractor {
    pub fn new(config: SignatureConfig, limits: ParseLimits) -> Self {
        Self { config, limits }
    }
}

impl SignatureExtractor for HeaderSignatureExtractor {
    fn module_signature(&self, data: &[u8]) -> ParseResult<Signature> {
        module_debug_info(data, &self.config, &self.limits).map(|info| info.signature)
    }

    fn symbol_signature(&self, data: &[u8]) -> ParseResult<Signature> {
        symbol_signature(data, &self.limits)
    }
}
