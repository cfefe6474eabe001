//! PE parser limited to what symbol-server identities need

pub mod debug;
pub mod headers;
pub mod sections;
pub mod types;

use crate::formats::error::{ParseError, ParseResult};
use debug::*;
use headers::*;
use sections::*;
pub use types::*;

/// Main PE parser
pub struct PeParser<'data> {
    data: &'data [u8],
    nt_headers: NtHeaders,
    data_directories: Vec<DataDirectory>,
    section_table: SectionTable,
}

impl<'data> PeParser<'data> {
    /// Parse DOS, NT and section headers
    pub fn new(data: &'data [u8]) -> ParseResult<Self> {
        let dos_header = parse_dos_header(data)?;
        let nt_offset = dos_header.e_lfanew as usize;

        let (nt_headers, data_directories) = parse_nt_headers(data, nt_offset)?;

        let section_offset = nt_offset
            + 4
            + COFF_HEADER_SIZE
            + nt_headers.file_header.size_of_optional_header as usize;
        let section_headers = parse_section_headers(
            data,
            section_offset,
            nt_headers.file_header.number_of_sections,
        )?;
        let section_table =
            SectionTable::new(section_headers, nt_headers.optional_header.size_of_headers);

        Ok(Self {
            data,
            nt_headers,
            data_directories,
            section_table,
        })
    }

    /// Get COFF header
    pub fn coff_header(&self) -> &CoffHeader {
        &self.nt_headers.file_header
    }

    /// Get optional header
    pub fn optional_header(&self) -> &OptionalHeader {
        &self.nt_headers.optional_header
    }

    /// Check if PE is 64-bit
    pub fn is_64bit(&self) -> bool {
        self.nt_headers.optional_header.is_64bit()
    }

    /// Get machine type
    pub fn machine(&self) -> Machine {
        self.nt_headers.file_header.machine
    }

    /// Link timestamp from the COFF header
    pub fn time_date_stamp(&self) -> u32 {
        self.nt_headers.file_header.time_date_stamp
    }

    /// SizeOfImage from the optional header
    pub fn size_of_image(&self) -> u32 {
        self.nt_headers.optional_header.size_of_image
    }

    /// Get all sections
    pub fn sections(&self) -> &[SectionHeader] {
        self.section_table.sections()
    }

    /// Convert RVA to file offset
    pub fn rva_to_offset(&self, rva: u32) -> Option<usize> {
        self.section_table.rva_to_offset(rva)
    }

    /// Get data directory by index
    pub fn data_directory(&self, index: usize) -> Option<&DataDirectory> {
        self.data_directories.get(index)
    }

    /// Check if file has a debug directory
    pub fn has_debug_info(&self) -> bool {
        self.data_directory(IMAGE_DIRECTORY_ENTRY_DEBUG)
            .is_some_and(DataDirectory::is_present)
    }

    /// Parse the debug directory entries
    pub fn debug_entries(&self, max_entries: usize) -> ParseResult<Vec<DebugEntry>> {
        let dir = self
            .data_directory(IMAGE_DIRECTORY_ENTRY_DEBUG)
            .filter(|d| d.is_present())
            .ok_or(ParseError::NoDebugDirectory)?;

        let offset = self
            .rva_to_offset(dir.virtual_address)
            .ok_or(ParseError::InvalidRva {
                rva: dir.virtual_address,
            })?;

        parse_debug_directory(self.data, offset, dir.size, max_entries)
    }

    /// Decode the CodeView payload of a debug entry
    pub fn codeview(&self, entry: &DebugEntry, max_size: usize) -> ParseResult<CodeViewRecord> {
        parse_codeview(self.data, entry, max_size)
    }
}
