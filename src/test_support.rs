//! Synthetic compound files for tests.

use crate::common::{END_OF_CHAIN, FAT_SECT, FREE_SECT};
use crate::directory::{DIRECTORY_ENTRY_SIZE, NO_STREAM};
use crate::header::SIGNATURE;

const MINI_SECTOR_SIZE: usize = 64;

/// One directory record, written byte for byte.
#[derive(Debug, Clone)]
pub(crate) struct DirEntry {
    pub name: String,
    pub name_length: u16,
    pub object_type: u8,
    pub color: u8,
    pub left: u32,
    pub right: u32,
    pub child: u32,
    pub clsid: [u8; 16],
    pub state_bits: u32,
    pub creation_time: u64,
    pub modified_time: u64,
    pub start: u32,
    pub size: u64,
}

impl DirEntry {
    fn new(name: &str, object_type: u8) -> Self {
        let units = name.encode_utf16().count();
        Self {
            name: name.to_string(),
            name_length: if name.is_empty() { 0 } else { ((units + 1) * 2) as u16 },
            object_type,
            color: 1,
            left: NO_STREAM,
            right: NO_STREAM,
            child: NO_STREAM,
            clsid: [0; 16],
            state_bits: 0,
            creation_time: 0,
            modified_time: 0,
            start: END_OF_CHAIN,
            size: 0,
        }
    }

    pub fn root(child: u32) -> Self {
        let mut entry = Self::new("Root Entry", 5);
        entry.child = child;
        entry
    }

    pub fn storage(name: &str, child: u32) -> Self {
        let mut entry = Self::new(name, 1);
        entry.child = child;
        entry.start = 0;
        entry
    }

    pub fn stream(name: &str, start: u32, size: u64) -> Self {
        let mut entry = Self::new(name, 2);
        entry.start = start;
        entry.size = size;
        entry
    }

    pub fn empty() -> Self {
        let mut entry = Self::new("", 0);
        entry.color = 0;
        entry.start = 0;
        entry
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut raw = vec![0u8; DIRECTORY_ENTRY_SIZE];
        for (i, unit) in self.name.encode_utf16().take(31).enumerate() {
            raw[i * 2..i * 2 + 2].copy_from_slice(&unit.to_le_bytes());
        }
        raw[0x40..0x42].copy_from_slice(&self.name_length.to_le_bytes());
        raw[0x42] = self.object_type;
        raw[0x43] = self.color;
        raw[0x44..0x48].copy_from_slice(&self.left.to_le_bytes());
        raw[0x48..0x4C].copy_from_slice(&self.right.to_le_bytes());
        raw[0x4C..0x50].copy_from_slice(&self.child.to_le_bytes());
        raw[0x50..0x60].copy_from_slice(&self.clsid);
        raw[0x60..0x64].copy_from_slice(&self.state_bits.to_le_bytes());
        raw[0x64..0x6C].copy_from_slice(&self.creation_time.to_le_bytes());
        raw[0x6C..0x74].copy_from_slice(&self.modified_time.to_le_bytes());
        raw[0x74..0x78].copy_from_slice(&self.start.to_le_bytes());
        raw[0x78..0x80].copy_from_slice(&self.size.to_le_bytes());
        raw
    }
}

pub(crate) fn directory_stream(entries: &[DirEntry]) -> Vec<u8> {
    entries.iter().flat_map(|e| e.to_bytes()).collect()
}

/// Lays out header, one FAT sector, user chains, Mini FAT, mini stream and
/// directory, in that sector order.
///
/// When mini chains were added, the root entry (`entries[0]`) is pointed at
/// the mini stream on `build`.
#[derive(Debug, Clone)]
pub(crate) struct ContainerBuilder {
    pub sector_shift: u16,
    pub cutoff: u32,
    pub entries: Vec<DirEntry>,
    /// Overrides for the header counters.
    pub fat_sectors: Option<u32>,
    pub mini_fat_sectors: Option<u32>,
    pub difat_sectors: u32,
    sectors: Vec<Vec<u8>>,
    fat: Vec<u32>,
    mini_stream: Vec<u8>,
    mini_fat: Vec<u32>,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self::with_sector_shift(9)
    }

    pub fn with_sector_shift(sector_shift: u16) -> Self {
        let sector_size = 1usize << sector_shift;
        Self {
            sector_shift,
            cutoff: 0x1000,
            entries: vec![DirEntry::root(NO_STREAM)],
            fat_sectors: None,
            mini_fat_sectors: None,
            difat_sectors: 0,
            sectors: vec![vec![0; sector_size]],
            fat: vec![FAT_SECT],
            mini_stream: Vec::new(),
            mini_fat: Vec::new(),
        }
    }

    fn sector_size(&self) -> usize {
        1 << self.sector_shift
    }

    /// Stores `bytes` in fresh consecutive sectors and returns the first one.
    pub fn add_chain(&mut self, bytes: &[u8]) -> u32 {
        if bytes.is_empty() {
            return END_OF_CHAIN;
        }
        let sector_size = self.sector_size();
        let first = self.sectors.len() as u32;
        let count = bytes.len().div_ceil(sector_size);
        for (i, chunk) in bytes.chunks(sector_size).enumerate() {
            let mut sector = chunk.to_vec();
            sector.resize(sector_size, 0);
            self.sectors.push(sector);
            self.fat.push(if i + 1 == count { END_OF_CHAIN } else { first + i as u32 + 1 });
        }
        first
    }

    /// Stores `bytes` in fresh mini sectors and returns the first one.
    pub fn add_mini_chain(&mut self, bytes: &[u8]) -> u32 {
        if bytes.is_empty() {
            return END_OF_CHAIN;
        }
        let first = self.mini_fat.len() as u32;
        let count = bytes.len().div_ceil(MINI_SECTOR_SIZE);
        for (i, chunk) in bytes.chunks(MINI_SECTOR_SIZE).enumerate() {
            self.mini_stream.extend_from_slice(chunk);
            self.mini_stream.resize(self.mini_stream.len().next_multiple_of(MINI_SECTOR_SIZE), 0);
            self.mini_fat.push(if i + 1 == count { END_OF_CHAIN } else { first + i as u32 + 1 });
        }
        first
    }

    pub fn build(&self) -> Vec<u8> {
        let mut b = self.clone();
        let sector_size = b.sector_size();

        let mut mini_fat_start = END_OF_CHAIN;
        let mut mini_fat_count = 0;
        if !b.mini_stream.is_empty() {
            let mut raw: Vec<u8> = b.mini_fat.iter().flat_map(|v| v.to_le_bytes()).collect();
            raw.resize(raw.len().next_multiple_of(sector_size), 0xFF);
            mini_fat_count = (raw.len() / sector_size) as u32;
            mini_fat_start = b.add_chain(&raw);
            let stream = b.mini_stream.clone();
            let root_start = b.add_chain(&stream);
            if let Some(root) = b.entries.first_mut() {
                root.start = root_start;
                root.size = stream.len() as u64;
            }
        }

        let directory = directory_stream(&b.entries);
        let directory_start = b.add_chain(&directory);

        let entries_per_sector = sector_size / 4;
        assert!(b.fat.len() <= entries_per_sector, "test container needs more than one FAT sector");
        let mut fat = b.fat.clone();
        fat.resize(entries_per_sector, FREE_SECT);
        b.sectors[0] = fat.iter().flat_map(|v| v.to_le_bytes()).collect();

        let mut header = vec![0u8; sector_size.max(512)];
        header[..8].copy_from_slice(&SIGNATURE);
        header[0x18..0x1A].copy_from_slice(&0x003Eu16.to_le_bytes());
        let major: u16 = if b.sector_shift == 12 { 4 } else { 3 };
        header[0x1A..0x1C].copy_from_slice(&major.to_le_bytes());
        header[0x1C..0x1E].copy_from_slice(&0xFFFEu16.to_le_bytes());
        header[0x1E..0x20].copy_from_slice(&b.sector_shift.to_le_bytes());
        header[0x20..0x22].copy_from_slice(&6u16.to_le_bytes());
        header[0x2C..0x30].copy_from_slice(&b.fat_sectors.unwrap_or(1).to_le_bytes());
        header[0x30..0x34].copy_from_slice(&directory_start.to_le_bytes());
        header[0x38..0x3C].copy_from_slice(&b.cutoff.to_le_bytes());
        header[0x3C..0x40].copy_from_slice(&mini_fat_start.to_le_bytes());
        header[0x40..0x44].copy_from_slice(&b.mini_fat_sectors.unwrap_or(mini_fat_count).to_le_bytes());
        let difat_start = if b.difat_sectors > 0 { 0 } else { END_OF_CHAIN };
        header[0x44..0x48].copy_from_slice(&difat_start.to_le_bytes());
        header[0x48..0x4C].copy_from_slice(&b.difat_sectors.to_le_bytes());
        header[0x4C..0x50].copy_from_slice(&0u32.to_le_bytes());
        for slot in 1..109 {
            let offset = 0x4C + slot * 4;
            header[offset..offset + 4].copy_from_slice(&FREE_SECT.to_le_bytes());
        }

        let mut data = header;
        for sector in &b.sectors {
            data.extend_from_slice(sector);
        }
        data
    }
}
