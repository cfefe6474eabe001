//! Debug-symbol file identity extraction
//!
//! Two container formats are recognized by their leading magic: the MSF 7.0
//! container produced by the Microsoft toolchain and the Portable PDB
//! metadata format produced by .NET compilers.

pub mod msf;
pub mod portable;

use crate::formats::error::{ParseError, ParseResult};

/// Age reported for Portable PDBs on symbol servers
pub const PORTABLE_PDB_AGE: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolFormat {
    Msf,
    Portable,
}

/// Sniff the container format from the leading bytes
pub fn detect(data: &[u8]) -> Option<SymbolFormat> {
    if msf::is_msf(data) {
        Some(SymbolFormat::Msf)
    } else if portable::is_portable_pdb(data) {
        Some(SymbolFormat::Portable)
    } else {
        None
    }
}

/// GUID and age that identify a symbol file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdbIdentity {
    pub format: SymbolFormat,
    pub guid: [u8; 16],
    pub age: u32,
}

/// Extract the identity of a standalone symbol file
pub fn parse_identity(data: &[u8], max_directory_bytes: usize) -> ParseResult<PdbIdentity> {
    match detect(data) {
        Some(SymbolFormat::Msf) => {
            let info = msf::read_pdb_info(data, max_directory_bytes)?;
            Ok(PdbIdentity {
                format: SymbolFormat::Msf,
                guid: info.guid,
                age: info.lookup_age(),
            })
        }
        Some(SymbolFormat::Portable) => {
            let id = portable::read_pdb_id(data)?;
            Ok(PdbIdentity {
                format: SymbolFormat::Portable,
                guid: id.guid,
                age: PORTABLE_PDB_AGE,
            })
        }
        None => Err(ParseError::UnknownSymbolFormat),
    }
}
