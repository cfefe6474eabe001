//! Common test utilities and helpers.
//!
//! Synthetic PE, MSF and Portable PDB images built in memory, plus stores
//! and extractors with scripted behaviour.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use symfeed::formats::{ParseError, ParseResult};
use symfeed::symbols::SignatureKind;
use symfeed::{ContentStore, MemoryEntry, PackageEntry, Signature, SignatureExtractor, SymbolsError};

pub const GUID: [u8; 16] = [
    0x78, 0x56, 0x34, 0x12, 0xbc, 0x9a, 0xf0, 0xde, 0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef,
];

/// `GUID` rendered the way symbol servers print it
pub const GUID_HEX: &str = "123456789abcdef00123456789abcdef";

const DEBUG_TYPE_CODEVIEW: u32 = 2;
const DEBUG_TYPE_REPRO: u32 = 16;

/// Builder for a one-section PE image with a debug directory.
///
/// Layout: headers in the first 0x200 bytes, `.rdata` at RVA 0x1000 / file
/// offset 0x200 holding the debug directory (0x200) and the CodeView record
/// (0x280), then `trailer` bytes standing in for code and resources.
#[derive(Debug, Clone)]
pub struct PeBuilder {
    pub time_date_stamp: u32,
    pub size_of_image: u32,
    pub pe32plus: bool,
    pub codeview: Option<([u8; 16], u32, String)>,
    pub nb10: bool,
    pub portable: bool,
    pub repro: bool,
    pub trailer: Vec<u8>,
}

impl Default for PeBuilder {
    fn default() -> Self {
        Self {
            time_date_stamp: 0x5F5E_1000,
            size_of_image: 0x3000,
            pe32plus: false,
            codeview: Some((GUID, 1, "Foo.pdb".to_string())),
            nb10: false,
            portable: false,
            repro: false,
            trailer: vec![0xCC; 0x100],
        }
    }
}

impl PeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timestamp(mut self, time_date_stamp: u32, size_of_image: u32) -> Self {
        self.time_date_stamp = time_date_stamp;
        self.size_of_image = size_of_image;
        self
    }

    pub fn codeview(mut self, guid: [u8; 16], age: u32, pdb_path: &str) -> Self {
        self.codeview = Some((guid, age, pdb_path.to_string()));
        self
    }

    pub fn without_codeview(mut self) -> Self {
        self.codeview = None;
        self
    }

    pub fn nb10(mut self) -> Self {
        self.nb10 = true;
        self
    }

    pub fn portable(mut self) -> Self {
        self.portable = true;
        self
    }

    pub fn repro(mut self) -> Self {
        self.repro = true;
        self
    }

    pub fn pe32plus(mut self) -> Self {
        self.pe32plus = true;
        self
    }

    pub fn trailer(mut self, trailer: &[u8]) -> Self {
        self.trailer = trailer.to_vec();
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut data = vec![0u8; 0x400];

        data[0..2].copy_from_slice(b"MZ");
        put_u32(&mut data, 60, 0x80);
        data[0x80..0x84].copy_from_slice(b"PE\0\0");

        let (machine, opt_size, magic, dirs, count_at): (u16, u16, u16, usize, usize) =
            if self.pe32plus {
                (0x8664, 0xF0, 0x20B, 112, 108)
            } else {
                (0x014C, 0xE0, 0x10B, 96, 92)
            };

        let coff = 0x84;
        put_u16(&mut data, coff, machine);
        put_u16(&mut data, coff + 2, 1);
        put_u32(&mut data, coff + 4, self.time_date_stamp);
        put_u16(&mut data, coff + 16, opt_size);

        let opt = 0x98;
        put_u16(&mut data, opt, magic);
        put_u32(&mut data, opt + 56, self.size_of_image);
        put_u32(&mut data, opt + 60, 0x200);
        put_u32(&mut data, opt + count_at, 16);

        let mut entries: Vec<[u8; 28]> = Vec::new();
        let mut payload = Vec::new();
        if let Some((guid, age, path)) = &self.codeview {
            if self.nb10 {
                payload.extend_from_slice(b"NB10");
                payload.extend_from_slice(&0u32.to_le_bytes());
                payload.extend_from_slice(&0x1234_5678u32.to_le_bytes());
                payload.extend_from_slice(&age.to_le_bytes());
            } else {
                payload.extend_from_slice(b"RSDS");
                payload.extend_from_slice(guid);
                payload.extend_from_slice(&age.to_le_bytes());
            }
            payload.extend_from_slice(path.as_bytes());
            payload.push(0);

            let minor = if self.portable { 0x504D } else { 0 };
            entries.push(debug_entry(DEBUG_TYPE_CODEVIEW, minor, payload.len() as u32, 0x280));
        }
        if self.repro {
            entries.push(debug_entry(DEBUG_TYPE_REPRO, 0, 0, 0));
        }

        if !entries.is_empty() {
            let dir = opt + dirs + 6 * 8;
            put_u32(&mut data, dir, 0x1000);
            put_u32(&mut data, dir + 4, (entries.len() * 28) as u32);
        }

        let sec = opt + opt_size as usize;
        data[sec..sec + 6].copy_from_slice(b".rdata");
        put_u32(&mut data, sec + 8, 0x200);
        put_u32(&mut data, sec + 12, 0x1000);
        put_u32(&mut data, sec + 16, 0x200);
        put_u32(&mut data, sec + 20, 0x200);

        for (i, entry) in entries.iter().enumerate() {
            let at = 0x200 + i * 28;
            data[at..at + 28].copy_from_slice(entry);
        }
        data[0x280..0x280 + payload.len()].copy_from_slice(&payload);

        data.extend_from_slice(&self.trailer);
        data
    }
}

fn debug_entry(debug_type: u32, minor: u16, size: u32, pointer: u32) -> [u8; 28] {
    let mut raw = [0u8; 28];
    raw[10..12].copy_from_slice(&minor.to_le_bytes());
    raw[12..16].copy_from_slice(&debug_type.to_le_bytes());
    raw[16..20].copy_from_slice(&size.to_le_bytes());
    raw[20..24].copy_from_slice(&pointer.to_le_bytes());
    raw[24..28].copy_from_slice(&pointer.to_le_bytes());
    raw
}

fn put_u16(data: &mut [u8], at: usize, value: u16) {
    data[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(data: &mut [u8], at: usize, value: u32) {
    data[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

const MSF_MAGIC: &[u8; 32] = b"Microsoft C/C++ MSF 7.00\r\n\x1aDS\0\0\0";
const MSF_BLOCK: usize = 512;

/// Five-block MSF file: superblock, block map, directory, an empty stream 0,
/// and the PDB info stream in block 4.
pub fn msf_pdb(guid: [u8; 16], age: u32) -> Vec<u8> {
    let bs = MSF_BLOCK;
    let mut data = vec![0u8; bs * 5];
    data[..32].copy_from_slice(MSF_MAGIC);
    put_u32(&mut data, 32, bs as u32);
    put_u32(&mut data, 40, 5);
    put_u32(&mut data, 44, 16);
    put_u32(&mut data, 52, 1);

    put_u32(&mut data, bs, 2);

    let dir = bs * 2;
    put_u32(&mut data, dir, 2);
    put_u32(&mut data, dir + 4, 0);
    put_u32(&mut data, dir + 8, 28);
    put_u32(&mut data, dir + 12, 4);

    let info = bs * 4;
    put_u32(&mut data, info, 20000404);
    put_u32(&mut data, info + 4, 0x6000_0000);
    put_u32(&mut data, info + 8, age);
    data[info + 12..info + 28].copy_from_slice(&guid);
    data
}

/// Six-block MSF file whose info stream says `info_age` and whose DBI
/// stream (stream 3, block 5) says `dbi_age`.
pub fn msf_pdb_with_dbi(guid: [u8; 16], info_age: u32, dbi_age: u32) -> Vec<u8> {
    let bs = MSF_BLOCK;
    let mut data = msf_pdb(guid, info_age);
    data.resize(bs * 6, 0);
    put_u32(&mut data, 40, 6);
    put_u32(&mut data, 44, 28);

    let dir = bs * 2;
    put_u32(&mut data, dir, 4);
    put_u32(&mut data, dir + 4, 0);
    put_u32(&mut data, dir + 8, 28);
    put_u32(&mut data, dir + 12, 0);
    put_u32(&mut data, dir + 16, 64);
    put_u32(&mut data, dir + 20, 4);
    put_u32(&mut data, dir + 24, 5);

    let dbi = bs * 5;
    put_u32(&mut data, dbi, u32::MAX);
    put_u32(&mut data, dbi + 4, 19990903);
    put_u32(&mut data, dbi + 8, dbi_age);
    data
}

/// Metadata root with a `#Pdb` stream carrying `guid` and `stamp`
pub fn portable_pdb(guid: [u8; 16], stamp: u32) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(b"BSJB");
    data.extend_from_slice(&1u16.to_le_bytes());
    data.extend_from_slice(&1u16.to_le_bytes());
    data.extend_from_slice(&0u32.to_le_bytes());
    let version = b"PDB v1.0\0\0\0\0";
    data.extend_from_slice(&(version.len() as u32).to_le_bytes());
    data.extend_from_slice(version);
    data.extend_from_slice(&0u16.to_le_bytes());
    data.extend_from_slice(&1u16.to_le_bytes());

    let header = data.len();
    data.extend_from_slice(&0u32.to_le_bytes());
    data.extend_from_slice(&32u32.to_le_bytes());
    data.extend_from_slice(b"#Pdb\0\0\0\0");

    let stream = data.len() as u32;
    data.extend_from_slice(&guid);
    data.extend_from_slice(&stamp.to_le_bytes());
    data.extend_from_slice(&[0u8; 12]);
    data[header..header + 4].copy_from_slice(&stream.to_le_bytes());
    data
}

pub fn entry(name: &str, data: impl Into<Bytes>) -> Arc<dyn PackageEntry> {
    Arc::new(MemoryEntry::new(name, data))
}

/// Extractor answering from fixed tables keyed by file contents
#[derive(Default)]
pub struct ScriptedExtractor {
    modules: HashMap<Vec<u8>, String>,
    symbols: HashMap<Vec<u8>, String>,
}

impl ScriptedExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn module(mut self, contents: &[u8], signature: &str) -> Self {
        self.modules.insert(contents.to_vec(), signature.to_string());
        self
    }

    pub fn symbol(mut self, contents: &[u8], signature: &str) -> Self {
        self.symbols.insert(contents.to_vec(), signature.to_string());
        self
    }
}

impl SignatureExtractor for ScriptedExtractor {
    fn module_signature(&self, data: &[u8]) -> ParseResult<Signature> {
        self.modules
            .get(data)
            .map(|s| Signature::new(SignatureKind::CodeView, s.clone()))
            .ok_or(ParseError::InvalidDosSignature)
    }

    fn symbol_signature(&self, data: &[u8]) -> ParseResult<Signature> {
        self.symbols
            .get(data)
            .map(|s| Signature::new(SignatureKind::Pdb, s.clone()))
            .ok_or(ParseError::UnknownSymbolFormat)
    }
}

/// Store that answers `exists` but refuses every write
#[derive(Default)]
pub struct UnavailableStore {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl ContentStore for UnavailableStore {
    async fn exists(&self, _key: &str) -> symfeed::Result<bool> {
        Ok(false)
    }

    async fn write(&self, key: &str, _data: Bytes) -> symfeed::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(SymbolsError::store(key, "connection refused"))
    }
}

/// Store that never answers
pub struct StalledStore;

#[async_trait]
impl ContentStore for StalledStore {
    async fn exists(&self, _key: &str) -> symfeed::Result<bool> {
        std::future::pending::<()>().await;
        Ok(false)
    }

    async fn write(&self, _key: &str, _data: Bytes) -> symfeed::Result<()> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// Store that cancels `token` the first time it is asked anything
pub struct CancellingStore {
    pub token: CancellationToken,
    pub writes: AtomicUsize,
}

#[async_trait]
impl ContentStore for CancellingStore {
    async fn exists(&self, _key: &str) -> symfeed::Result<bool> {
        self.token.cancel();
        Ok(false)
    }

    async fn write(&self, _key: &str, _data: Bytes) -> symfeed::Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
