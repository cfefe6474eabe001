//! PE data types and constants used for debug-directory extraction

use std::fmt;

// PE constants
pub const DOS_SIGNATURE: u16 = 0x5A4D; // MZ
pub const PE_SIGNATURE: [u8; 4] = *b"PE\0\0";
pub const PE32_MAGIC: u16 = 0x10B;
pub const PE32PLUS_MAGIC: u16 = 0x20B;

pub const DOS_HEADER_SIZE: usize = 64;
pub const COFF_HEADER_SIZE: usize = 20;
pub const SECTION_HEADER_SIZE: usize = 40;
pub const DATA_DIRECTORY_SIZE: usize = 8;
pub const MAX_DATA_DIRECTORIES: usize = 16;

// Data directory indices
pub const IMAGE_DIRECTORY_ENTRY_DEBUG: usize = 6;

// Debug directory
pub const DEBUG_DIRECTORY_ENTRY_SIZE: usize = 28;
pub const CODEVIEW_RSDS_SIGNATURE: [u8; 4] = *b"RSDS";
pub const CODEVIEW_NB10_SIGNATURE: [u8; 4] = *b"NB10";

/// Minor version stamped on CodeView entries that point at a Portable PDB ("PM").
pub const PORTABLE_PDB_CODEVIEW_MINOR: u16 = 0x504D;

/// Machine types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Machine {
    Unknown,
    I386,   // 0x014c
    X86_64, // 0x8664
    Arm,    // 0x01c0
    Arm64,  // 0xaa64
    ArmNT,  // 0x01c4
    Other(u16),
}

impl From<u16> for Machine {
    fn from(value: u16) -> Self {
        match value {
            0x014c => Self::I386,
            0x8664 => Self::X86_64,
            0x01c0 => Self::Arm,
            0xaa64 => Self::Arm64,
            0x01c4 => Self::ArmNT,
            0 => Self::Unknown,
            other => Self::Other(other),
        }
    }
}

/// DOS header fields needed to find the NT headers
#[derive(Debug, Clone, Copy)]
pub struct DosHeader {
    pub e_magic: u16,
    pub e_lfanew: u32,
}

/// COFF header (20 bytes)
#[derive(Debug, Clone, Copy)]
pub struct CoffHeader {
    pub machine: Machine,
    pub number_of_sections: u16,
    pub time_date_stamp: u32,
    pub size_of_optional_header: u16,
    pub characteristics: u16,
}

/// Data directory entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataDirectory {
    pub virtual_address: u32,
    pub size: u32,
}

impl DataDirectory {
    pub fn is_present(&self) -> bool {
        self.virtual_address != 0 && self.size > 0
    }
}

/// Optional header fields shared by PE32 and PE32+
#[derive(Debug, Clone, Copy)]
pub struct OptionalHeader {
    pub magic: u16,
    pub size_of_image: u32,
    pub size_of_headers: u32,
    pub number_of_rva_and_sizes: u32,
}

impl OptionalHeader {
    pub fn is_64bit(&self) -> bool {
        self.magic == PE32PLUS_MAGIC
    }

    /// Offset of the data directory array relative to the optional header
    pub fn data_directory_offset(&self) -> usize {
        if self.is_64bit() {
            112
        } else {
            96
        }
    }
}

/// NT headers (PE signature + COFF + Optional)
#[derive(Debug, Clone)]
pub struct NtHeaders {
    pub file_header: CoffHeader,
    pub optional_header: OptionalHeader,
}

/// Section header fields needed for RVA resolution
#[derive(Debug, Clone)]
pub struct SectionHeader {
    pub name: [u8; 8],
    pub virtual_size: u32,
    pub virtual_address: u32,
    pub size_of_raw_data: u32,
    pub pointer_to_raw_data: u32,
    pub characteristics: u32,
}

impl SectionHeader {
    pub fn name(&self) -> String {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(8);
        String::from_utf8_lossy(&self.name[..end]).to_string()
    }

    /// Virtual extent used for containment checks
    pub fn extent(&self) -> u32 {
        self.virtual_size.max(self.size_of_raw_data)
    }

    pub fn contains_rva(&self, rva: u32) -> bool {
        rva >= self.virtual_address && (rva - self.virtual_address) < self.extent()
    }
}

/// Debug directory entry kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugType {
    Coff,
    CodeView,
    Fpo,
    Misc,
    Repro,
    EmbeddedPortablePdb,
    PdbChecksum,
    Other(u32),
}

impl From<u32> for DebugType {
    fn from(value: u32) -> Self {
        match value {
            1 => Self::Coff,
            2 => Self::CodeView,
            3 => Self::Fpo,
            4 => Self::Misc,
            16 => Self::Repro,
            17 => Self::EmbeddedPortablePdb,
            19 => Self::PdbChecksum,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for DebugType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Coff => write!(f, "coff"),
            Self::CodeView => write!(f, "codeview"),
            Self::Fpo => write!(f, "fpo"),
            Self::Misc => write!(f, "misc"),
            Self::Repro => write!(f, "repro"),
            Self::EmbeddedPortablePdb => write!(f, "embedded-portable-pdb"),
            Self::PdbChecksum => write!(f, "pdb-checksum"),
            Self::Other(v) => write!(f, "type-{}", v),
        }
    }
}

/// Debug directory entry (IMAGE_DEBUG_DIRECTORY)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugEntry {
    pub characteristics: u32,
    pub time_date_stamp: u32,
    pub major_version: u16,
    pub minor_version: u16,
    pub debug_type: DebugType,
    pub size_of_data: u32,
    pub address_of_raw_data: u32,
    pub pointer_to_raw_data: u32,
}

impl DebugEntry {
    /// CodeView entries written for Portable PDBs carry the "PM" minor version.
    pub fn references_portable_pdb(&self) -> bool {
        self.debug_type == DebugType::CodeView && self.minor_version == PORTABLE_PDB_CODEVIEW_MINOR
    }
}

/// Decoded CodeView payload of a debug directory entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeViewRecord {
    /// PDB 7.0 record: GUID plus age
    Rsds {
        guid: [u8; 16],
        age: u32,
        pdb_path: String,
    },
    /// PDB 2.0 record: timestamp signature plus age
    Nb10 {
        signature: u32,
        age: u32,
        pdb_path: String,
    },
}

impl CodeViewRecord {
    pub fn pdb_path(&self) -> &str {
        match self {
            Self::Rsds { pdb_path, .. } | Self::Nb10 { pdb_path, .. } => pdb_path,
        }
    }

    pub fn age(&self) -> u32 {
        match self {
            Self::Rsds { age, .. } | Self::Nb10 { age, .. } => *age,
        }
    }
}
