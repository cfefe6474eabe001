//! Portable PDB (ECMA-335 metadata) identity reading

use crate::formats::error::{ParseError, ParseResult};
use crate::formats::utils::{align_up, slice_at, u16_at, u32_at, ReadExt};

/// "BSJB" read as a little-endian u32
pub const METADATA_SIGNATURE: u32 = 0x424A_5342;
pub const PDB_STREAM_NAME: &[u8] = b"#Pdb";

/// Stream names are at most 32 bytes including the terminator
const MAX_STREAM_NAME: usize = 32;
const MAX_VERSION_LENGTH: usize = 255;

/// The 20-byte PDB id stored at the start of the `#Pdb` stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdbId {
    pub guid: [u8; 16],
    pub stamp: u32,
}

pub fn is_portable_pdb(data: &[u8]) -> bool {
    data.read_u32_le_at(0) == Some(METADATA_SIGNATURE)
}

/// Locate a named stream in the metadata root and return its bytes
pub fn find_stream<'a>(data: &'a [u8], wanted: &[u8]) -> ParseResult<&'a [u8]> {
    if !is_portable_pdb(data) {
        return Err(ParseError::MalformedMetadata("missing BSJB signature"));
    }

    let version_len = u32_at(data, 12, "metadata root")? as usize;
    if version_len > MAX_VERSION_LENGTH + 1 {
        return Err(ParseError::MalformedMetadata("version string too long"));
    }
    let version_len = align_up(version_len, 4)
        .ok_or(ParseError::MalformedMetadata("version length overflow"))?;

    let flags_offset = 16 + version_len;
    let stream_count = u16_at(data, flags_offset + 2, "metadata root")?;

    let mut cursor = flags_offset + 4;
    for _ in 0..stream_count {
        let offset = u32_at(data, cursor, "stream header")? as usize;
        let size = u32_at(data, cursor + 4, "stream header")? as usize;

        let name = data
            .read_cstring_at(cursor + 8, MAX_STREAM_NAME)
            .ok_or(ParseError::MalformedMetadata("stream header name"))?;
        let name_len = align_up(name.len() + 1, 4)
            .ok_or(ParseError::MalformedMetadata("stream name overflow"))?;

        if name == wanted {
            return slice_at(data, offset, size, "metadata stream");
        }
        cursor += 8 + name_len;
    }

    Err(ParseError::StreamNotFound("#Pdb"))
}

/// Read the PDB id from a Portable PDB image
pub fn read_pdb_id(data: &[u8]) -> ParseResult<PdbId> {
    let stream = find_stream(data, PDB_STREAM_NAME)?;

    let guid: [u8; 16] = stream
        .read_array_at(0)
        .ok_or(ParseError::MalformedMetadata("#Pdb stream shorter than PDB id"))?;
    let stamp = u32_at(stream, 16, "#Pdb stream")?;

    Ok(PdbId { guid, stamp })
}
