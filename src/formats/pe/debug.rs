//! Debug directory and CodeView record parsing

use crate::formats::error::{ParseError, ParseResult};
use crate::formats::pe::types::*;
use crate::formats::utils::{slice_at, u16_at, u32_at, ReadExt};

/// Parse the `IMAGE_DEBUG_DIRECTORY` array located at `offset`.
///
/// `size` is the byte size advertised by the data directory. Trailing bytes
/// that do not form a whole entry are ignored, matching the loader.
pub fn parse_debug_directory(
    data: &[u8],
    offset: usize,
    size: u32,
    max_entries: usize,
) -> ParseResult<Vec<DebugEntry>> {
    let count = size as usize / DEBUG_DIRECTORY_ENTRY_SIZE;
    if count == 0 {
        return Err(ParseError::NoDebugDirectory);
    }
    if count > max_entries {
        return Err(ParseError::LimitExceeded("debug directory entries"));
    }

    let table = slice_at(
        data,
        offset,
        count * DEBUG_DIRECTORY_ENTRY_SIZE,
        "debug directory",
    )?;

    table
        .chunks_exact(DEBUG_DIRECTORY_ENTRY_SIZE)
        .map(|raw| {
            Ok(DebugEntry {
                characteristics: u32_at(raw, 0, "debug directory entry")?,
                time_date_stamp: u32_at(raw, 4, "debug directory entry")?,
                major_version: u16_at(raw, 8, "debug directory entry")?,
                minor_version: u16_at(raw, 10, "debug directory entry")?,
                debug_type: DebugType::from(u32_at(raw, 12, "debug directory entry")?),
                size_of_data: u32_at(raw, 16, "debug directory entry")?,
                address_of_raw_data: u32_at(raw, 20, "debug directory entry")?,
                pointer_to_raw_data: u32_at(raw, 24, "debug directory entry")?,
            })
        })
        .collect()
}

/// Decode the CodeView payload referenced by a debug entry.
///
/// The payload is located through `pointer_to_raw_data`, which is a file
/// offset and therefore valid even when the data lives outside any section.
pub fn parse_codeview(
    data: &[u8],
    entry: &DebugEntry,
    max_size: usize,
) -> ParseResult<CodeViewRecord> {
    if entry.debug_type != DebugType::CodeView {
        return Err(ParseError::MalformedCodeView("not a CodeView entry"));
    }

    let size = entry.size_of_data as usize;
    if size > max_size {
        return Err(ParseError::LimitExceeded("CodeView record size"));
    }

    let offset = entry.pointer_to_raw_data as usize;
    if offset == 0 {
        return Err(ParseError::InvalidOffset { offset });
    }
    let record = slice_at(data, offset, size, "CodeView record")?;

    let magic: [u8; 4] = record
        .read_array_at(0)
        .ok_or(ParseError::MalformedCodeView("record shorter than its signature"))?;

    match magic {
        CODEVIEW_RSDS_SIGNATURE => {
            let guid: [u8; 16] = record
                .read_array_at(4)
                .ok_or(ParseError::MalformedCodeView("RSDS record missing GUID"))?;
            let age = record
                .read_u32_le_at(20)
                .ok_or(ParseError::MalformedCodeView("RSDS record missing age"))?;
            Ok(CodeViewRecord::Rsds {
                guid,
                age,
                pdb_path: read_pdb_path(record, 24),
            })
        }
        CODEVIEW_NB10_SIGNATURE => {
            let signature = record
                .read_u32_le_at(8)
                .ok_or(ParseError::MalformedCodeView("NB10 record missing signature"))?;
            let age = record
                .read_u32_le_at(12)
                .ok_or(ParseError::MalformedCodeView("NB10 record missing age"))?;
            Ok(CodeViewRecord::Nb10 {
                signature,
                age,
                pdb_path: read_pdb_path(record, 16),
            })
        }
        _ => Err(ParseError::MalformedCodeView("unknown CodeView signature")),
    }
}

fn read_pdb_path(record: &[u8], offset: usize) -> String {
    record
        .read_cstring_at(offset, record.len())
        .map(|raw| String::from_utf8_lossy(raw).into_owned())
        .unwrap_or_default()
}
