//! Section table and RVA resolution for PE files

use std::cmp::Ordering;

use crate::formats::error::ParseResult;
use crate::formats::pe::types::*;
use crate::formats::utils::{slice_at, u32_at};

/// Section table for RVA to file-offset translation
#[derive(Debug, Clone)]
pub struct SectionTable {
    sections: Vec<SectionHeader>,
    size_of_headers: u32,
}

impl SectionTable {
    /// Create a new section table
    pub fn new(mut sections: Vec<SectionHeader>, size_of_headers: u32) -> Self {
        // Sort by virtual address for binary search
        sections.sort_by_key(|s| s.virtual_address);
        Self {
            sections,
            size_of_headers,
        }
    }

    /// Get all sections
    pub fn sections(&self) -> &[SectionHeader] {
        &self.sections
    }

    /// Find section containing RVA
    pub fn section_containing_rva(&self, rva: u32) -> Option<&SectionHeader> {
        let idx = self
            .sections
            .binary_search_by(|s| {
                if rva < s.virtual_address {
                    Ordering::Greater
                } else if s.contains_rva(rva) {
                    Ordering::Equal
                } else {
                    Ordering::Less
                }
            })
            .ok()?;
        self.sections.get(idx)
    }

    /// Convert RVA to file offset.
    ///
    /// RVAs inside the headers map to themselves. RVAs that fall in the
    /// zero-filled tail of a section have no file backing and resolve to
    /// `None`.
    #[inline]
    pub fn rva_to_offset(&self, rva: u32) -> Option<usize> {
        if let Some(section) = self.section_containing_rva(rva) {
            let delta = rva - section.virtual_address;
            if delta >= section.size_of_raw_data {
                return None;
            }
            return section
                .pointer_to_raw_data
                .checked_add(delta)
                .map(|offset| offset as usize);
        }

        let first_section = self
            .sections
            .first()
            .map_or(u32::MAX, |s| s.virtual_address);
        (rva < self.size_of_headers && rva < first_section).then_some(rva as usize)
    }
}

/// Parse section headers from data
pub fn parse_section_headers(
    data: &[u8],
    offset: usize,
    count: u16,
) -> ParseResult<Vec<SectionHeader>> {
    let table = slice_at(
        data,
        offset,
        count as usize * SECTION_HEADER_SIZE,
        "section table",
    )?;

    table
        .chunks_exact(SECTION_HEADER_SIZE)
        .map(|raw| {
            let mut name = [0u8; 8];
            name.copy_from_slice(&raw[..8]);

            Ok(SectionHeader {
                name,
                virtual_size: u32_at(raw, 8, "section header")?,
                virtual_address: u32_at(raw, 12, "section header")?,
                size_of_raw_data: u32_at(raw, 16, "section header")?,
                pointer_to_raw_data: u32_at(raw, 20, "section header")?,
                characteristics: u32_at(raw, 36, "section header")?,
            })
        })
        .collect()
}
