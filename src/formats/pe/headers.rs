//! PE header parsing

use crate::formats::error::{ParseError, ParseResult};
use crate::formats::pe::types::*;
use crate::formats::utils::{slice_at, u16_at, u32_at, ReadExt};

/// Parse DOS header from data
pub fn parse_dos_header(data: &[u8]) -> ParseResult<DosHeader> {
    if data.len() < DOS_HEADER_SIZE {
        return Err(ParseError::Truncated {
            what: "DOS header",
            expected: DOS_HEADER_SIZE,
            actual: data.len(),
        });
    }

    let e_magic = u16_at(data, 0, "DOS header")?;
    if e_magic != DOS_SIGNATURE {
        return Err(ParseError::InvalidDosSignature);
    }

    Ok(DosHeader {
        e_magic,
        e_lfanew: u32_at(data, 0x3c, "DOS header")?,
    })
}

/// Parse COFF header from data at offset
pub fn parse_coff_header(data: &[u8], offset: usize) -> ParseResult<CoffHeader> {
    let raw = slice_at(data, offset, COFF_HEADER_SIZE, "COFF header")?;

    Ok(CoffHeader {
        machine: Machine::from(u16_at(raw, 0, "COFF header")?),
        number_of_sections: u16_at(raw, 2, "COFF header")?,
        time_date_stamp: u32_at(raw, 4, "COFF header")?,
        size_of_optional_header: u16_at(raw, 16, "COFF header")?,
        characteristics: u16_at(raw, 18, "COFF header")?,
    })
}

/// Parse optional header from data at offset
///
/// Only the fields that are laid out identically in PE32 and PE32+ are
/// decoded, plus the directory count whose position depends on the magic.
pub fn parse_optional_header(
    data: &[u8],
    offset: usize,
    size: u16,
) -> ParseResult<OptionalHeader> {
    let raw = slice_at(data, offset, size as usize, "optional header")?;
    let magic = u16_at(raw, 0, "optional header")?;

    let count_offset = match magic {
        PE32_MAGIC => 92,
        PE32PLUS_MAGIC => 108,
        _ => return Err(ParseError::InvalidMagic(magic)),
    };

    Ok(OptionalHeader {
        magic,
        size_of_image: u32_at(raw, 56, "optional header")?,
        size_of_headers: u32_at(raw, 60, "optional header")?,
        number_of_rva_and_sizes: u32_at(raw, count_offset, "optional header")?,
    })
}

/// Parse data directories that fit inside the optional header
pub fn parse_data_directories(
    data: &[u8],
    offset: usize,
    count: u32,
    available: usize,
) -> Vec<DataDirectory> {
    let count = (count as usize)
        .min(MAX_DATA_DIRECTORIES)
        .min(available / DATA_DIRECTORY_SIZE);

    let mut directories: Vec<DataDirectory> = (0..count)
        .map_while(|i| {
            let dir_offset = offset.checked_add(i * DATA_DIRECTORY_SIZE)?;
            Some(DataDirectory {
                virtual_address: data.read_u32_le_at(dir_offset)?,
                size: data.read_u32_le_at(dir_offset + 4)?,
            })
        })
        .collect();

    // Pad with empty directories so index lookups never need a bounds check
    directories.resize(MAX_DATA_DIRECTORIES, DataDirectory::default());
    directories
}

/// Parse NT headers (PE signature + COFF + Optional) and data directories
pub fn parse_nt_headers(
    data: &[u8],
    offset: usize,
) -> ParseResult<(NtHeaders, Vec<DataDirectory>)> {
    let signature = slice_at(data, offset, 4, "PE signature")?;
    if signature != PE_SIGNATURE {
        return Err(ParseError::InvalidPeSignature);
    }

    let file_header = parse_coff_header(data, offset + 4)?;

    let opt_offset = offset + 4 + COFF_HEADER_SIZE;
    let opt_size = file_header.size_of_optional_header;
    let optional_header = parse_optional_header(data, opt_offset, opt_size)?;

    let dir_start = optional_header.data_directory_offset();
    let available = (opt_size as usize).saturating_sub(dir_start);
    let directories = parse_data_directories(
        data,
        opt_offset + dir_start,
        optional_header.number_of_rva_and_sizes,
        available,
    );

    Ok((
        NtHeaders {
            file_header,
            optional_header,
        },
        directories,
    ))
}
