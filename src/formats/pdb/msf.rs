//! MSF 7.0 container ("big" PDB) reading
//!
//! An MSF file is a sequence of fixed-size blocks. The superblock names the
//! block holding the block map, the block map lists the blocks of the stream
//! directory, and the directory lists the blocks of every stream.

use crate::formats::error::{ParseError, ParseResult};
use crate::formats::utils::{block_count, slice_at, u32_at};

pub const MSF_MAGIC: &[u8; 32] = b"Microsoft C/C++ MSF 7.00\r\n\x1aDS\0\0\0";
pub const SUPERBLOCK_SIZE: usize = 56;

/// Stream index of the PDB information stream
pub const PDB_INFO_STREAM: usize = 1;
/// Stream index of the debug information (DBI) stream
pub const DBI_STREAM: usize = 3;

const NIL_STREAM_SIZE: u32 = u32::MAX;
const VALID_BLOCK_SIZES: [u32; 4] = [512, 1024, 2048, 4096];

#[derive(Debug, Clone, Copy)]
pub struct SuperBlock {
    pub block_size: u32,
    pub num_blocks: u32,
    pub num_directory_bytes: u32,
    pub block_map_addr: u32,
}

pub fn is_msf(data: &[u8]) -> bool {
    data.starts_with(MSF_MAGIC)
}

pub fn parse_superblock(data: &[u8]) -> ParseResult<SuperBlock> {
    let raw = slice_at(data, 0, SUPERBLOCK_SIZE, "MSF superblock")?;
    if !raw.starts_with(MSF_MAGIC) {
        return Err(ParseError::MalformedMsf("bad magic"));
    }

    let block_size = u32_at(raw, 32, "MSF superblock")?;
    if !VALID_BLOCK_SIZES.contains(&block_size) {
        return Err(ParseError::MalformedMsf("unsupported block size"));
    }

    Ok(SuperBlock {
        block_size,
        num_blocks: u32_at(raw, 40, "MSF superblock")?,
        num_directory_bytes: u32_at(raw, 44, "MSF superblock")?,
        block_map_addr: u32_at(raw, 52, "MSF superblock")?,
    })
}

/// Parsed MSF stream directory over a borrowed file image
#[derive(Debug)]
pub struct MsfFile<'data> {
    data: &'data [u8],
    superblock: SuperBlock,
    stream_sizes: Vec<u32>,
    stream_blocks: Vec<Vec<u32>>,
}

impl<'data> MsfFile<'data> {
    pub fn parse(data: &'data [u8], max_directory_bytes: usize) -> ParseResult<Self> {
        let superblock = parse_superblock(data)?;
        let block_size = superblock.block_size as usize;

        let directory_len = superblock.num_directory_bytes as usize;
        if directory_len > max_directory_bytes {
            return Err(ParseError::LimitExceeded("MSF stream directory size"));
        }
        if directory_len < 4 {
            return Err(ParseError::MalformedMsf("empty stream directory"));
        }

        let map_entries = block_count(directory_len, block_size);
        if map_entries * 4 > block_size {
            return Err(ParseError::MalformedMsf("block map exceeds one block"));
        }
        let map_offset = (superblock.block_map_addr as usize)
            .checked_mul(block_size)
            .ok_or(ParseError::MalformedMsf("block map address overflow"))?;
        let map = slice_at(data, map_offset, map_entries * 4, "MSF block map")?;
        let directory_blocks = le_u32s(map);

        let mut file = Self {
            data,
            superblock,
            stream_sizes: Vec::new(),
            stream_blocks: Vec::new(),
        };
        let directory = file.read_blocks(&directory_blocks, directory_len)?;
        file.parse_directory(&directory)?;
        Ok(file)
    }

    fn parse_directory(&mut self, directory: &[u8]) -> ParseResult<()> {
        let block_size = self.superblock.block_size as usize;
        let num_streams = u32_at(directory, 0, "MSF stream directory")? as usize;

        // Every stream needs at least its 4-byte size entry
        if num_streams > (directory.len() - 4) / 4 {
            return Err(ParseError::MalformedMsf("stream count exceeds directory"));
        }

        let sizes = le_u32s(slice_at(
            directory,
            4,
            num_streams * 4,
            "MSF stream sizes",
        )?);

        let mut cursor = 4 + num_streams * 4;
        let mut blocks = Vec::with_capacity(num_streams);
        for &size in &sizes {
            let count = if size == NIL_STREAM_SIZE {
                0
            } else {
                block_count(size as usize, block_size)
            };
            let list = slice_at(directory, cursor, count * 4, "MSF stream block list")?;
            blocks.push(le_u32s(list));
            cursor += count * 4;
        }

        self.stream_sizes = sizes;
        self.stream_blocks = blocks;
        Ok(())
    }

    pub fn superblock(&self) -> &SuperBlock {
        &self.superblock
    }

    pub fn stream_count(&self) -> usize {
        self.stream_sizes.len()
    }

    /// Read up to `max_len` bytes from the start of a stream
    pub fn read_stream(&self, index: usize, max_len: usize) -> ParseResult<Vec<u8>> {
        let size = *self
            .stream_sizes
            .get(index)
            .ok_or(ParseError::StreamNotFound("MSF stream index"))?;
        if size == NIL_STREAM_SIZE {
            return Err(ParseError::StreamNotFound("MSF stream is nil"));
        }
        let len = (size as usize).min(max_len);
        self.read_blocks(&self.stream_blocks[index], len)
    }

    fn block(&self, index: u32) -> ParseResult<&'data [u8]> {
        if index >= self.superblock.num_blocks {
            return Err(ParseError::MalformedMsf("block index out of range"));
        }
        let block_size = self.superblock.block_size as usize;
        slice_at(self.data, index as usize * block_size, block_size, "MSF block")
    }

    fn read_blocks(&self, blocks: &[u32], len: usize) -> ParseResult<Vec<u8>> {
        let mut out = Vec::with_capacity(len);
        for &index in blocks {
            if out.len() >= len {
                break;
            }
            let block = self.block(index)?;
            let take = (len - out.len()).min(block.len());
            out.extend_from_slice(&block[..take]);
        }
        if out.len() < len {
            return Err(ParseError::MalformedMsf("stream shorter than its size"));
        }
        Ok(out)
    }
}

fn le_u32s(raw: &[u8]) -> Vec<u32> {
    raw.chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Fields of the PDB information stream that identify the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdbInfo {
    pub version: u32,
    pub signature: u32,
    pub age: u32,
    pub guid: [u8; 16],
    /// Age from the DBI stream header, absent when the file has no DBI stream
    pub dbi_age: Option<u32>,
}

impl PdbInfo {
    /// Age a debugger asks the symbol server for.
    ///
    /// The info-stream age is bumped on every write to the PDB while the
    /// DBI age tracks the linked image, so the DBI age wins when present.
    pub fn lookup_age(&self) -> u32 {
        self.dbi_age.unwrap_or(self.age)
    }
}

pub const PDB_INFO_SIZE: usize = 28;
/// Version signature, version header and age
pub const DBI_HEADER_PREFIX: usize = 12;

/// Read the PDB information stream (stream 1) and the DBI age (stream 3)
pub fn read_pdb_info(data: &[u8], max_directory_bytes: usize) -> ParseResult<PdbInfo> {
    let msf = MsfFile::parse(data, max_directory_bytes)?;
    let stream = msf.read_stream(PDB_INFO_STREAM, PDB_INFO_SIZE)?;
    let raw = slice_at(&stream, 0, PDB_INFO_SIZE, "PDB info stream")?;

    let mut guid = [0u8; 16];
    guid.copy_from_slice(&raw[12..28]);

    Ok(PdbInfo {
        version: u32_at(raw, 0, "PDB info stream")?,
        signature: u32_at(raw, 4, "PDB info stream")?,
        age: u32_at(raw, 8, "PDB info stream")?,
        guid,
        dbi_age: read_dbi_age(&msf)?,
    })
}

/// DBI header age, or `None` when the stream is missing, nil or too short
fn read_dbi_age(msf: &MsfFile<'_>) -> ParseResult<Option<u32>> {
    match msf.stream_sizes.get(DBI_STREAM) {
        Some(&size) if size != NIL_STREAM_SIZE && size as usize >= DBI_HEADER_PREFIX => {
            let header = msf.read_stream(DBI_STREAM, DBI_HEADER_PREFIX)?;
            Ok(Some(u32_at(&header, 8, "DBI stream header")?))
        }
        _ => Ok(None),
    }
}
