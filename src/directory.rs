use crate::common::{OleError, OleResult, SectorType};
use binrw::BinRead;
use chrono::{DateTime, Utc};
use modular_bitfield::prelude::*;
use std::fmt::{Display, Formatter};
use std::io::Cursor;

/// directory sector
/// https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-cfb/a94d7445-c4be-49cd-b6b9-2f4abc663817

pub const DIRECTORY_ENTRY_SIZE: usize = 128;
pub const MAX_REG_SID: u32 = 0xFFFFFFFA;
pub const NO_STREAM: u32 = 0xFFFFFFFF;
pub const ROOT_SID: u32 = 0;

const NAME_FIELD_SIZE: usize = 64;
/// 100ns intervals between 1601-01-01 and the unix epoch.
const FILETIME_UNIX_EPOCH: u64 = 116_444_736_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, BinRead)]
pub struct Clsid(pub [u8; 16]);

impl Clsid {
    pub fn is_null(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl Display for Clsid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
            u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            u16::from_le_bytes([b[4], b[5]]),
            u16::from_le_bytes([b[6], b[7]]),
            b[8],
            b[9],
            b[10],
            b[11],
            b[12],
            b[13],
            b[14],
            b[15]
        )
    }
}

/// The 64-bit Stream Size field, kept as its two 32-bit halves.
///
/// Version 3 files only define the low half; some writers leave garbage in
/// the high half, so it is only combined for larger sector sizes.
#[bitfield]
#[derive(Debug, Clone, Copy)]
pub struct StreamSize {
    pub low: B32,
    pub high: B32,
}

impl StreamSize {
    pub fn value(&self, legacy_sector_size: bool) -> u64 {
        if legacy_sector_size {
            self.low() as u64
        } else {
            self.low() as u64 | ((self.high() as u64) << 32)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    Empty,
    Storage,
    Stream,
    LockBytes,
    Property,
    RootStorage,
}

impl ObjectType {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x00 => Some(ObjectType::Empty),
            0x01 => Some(ObjectType::Storage),
            0x02 => Some(ObjectType::Stream),
            0x03 => Some(ObjectType::LockBytes),
            0x04 => Some(ObjectType::Property),
            0x05 => Some(ObjectType::RootStorage),
            _ => None,
        }
    }
}

impl Display for ObjectType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectType::Empty => write!(f, "empty"),
            ObjectType::Storage => write!(f, "storage"),
            ObjectType::Stream => write!(f, "stream"),
            ObjectType::LockBytes => write!(f, "lock bytes"),
            ObjectType::Property => write!(f, "property"),
            ObjectType::RootStorage => write!(f, "root storage"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Red,
    Black,
}

impl Display for Color {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Color::Red => write!(f, "red"),
            Color::Black => write!(f, "black"),
        }
    }
}

/// One raw 128-byte directory record.
#[derive(Debug, Clone, BinRead)]
#[br(little)]
pub struct Entry {
    // Directory Entry Name (64 bytes): UTF-16 name including the terminating null character.
    pub name: [u8; 64],
    // Directory Entry Name Length (2 bytes): length of the name in bytes, terminator included.
    pub name_length: u16,
    // Object Type (1 byte): 0x00 unknown, 0x01 storage, 0x02 stream, 0x05 root storage.
    pub object_type: u8,
    // Color Flag (1 byte): 0x00 red, 0x01 black.
    pub color: u8,
    pub left_sibling_id: u32,
    pub right_sibling_id: u32,
    // Child ID (4 bytes): root of the red-black tree holding this storage's children.
    pub child_id: u32,
    pub clsid: Clsid,
    // State Bits (4 bytes): user-defined flags for storage objects.
    pub state_bits: u32,
    pub creation_time: u64,
    pub modified_time: u64,
    // Starting Sector Location (4 bytes): first sector of a stream, or of the mini stream for the root.
    pub starting_sector_location: SectorType,
    #[br(map = |raw: [u8; 8]| StreamSize::from_bytes(raw))]
    pub stream_size: StreamSize,
}

impl Entry {
    /// Decodes the record of `sid` out of the raw directory stream.
    pub fn from_stream(stream: &[u8], sid: u32) -> OleResult<Self> {
        let start = sid as usize * DIRECTORY_ENTRY_SIZE;
        let raw = stream
            .get(start..start + DIRECTORY_ENTRY_SIZE)
            .ok_or(OleError::InvalidSid { sid })?;
        Ok(Entry::read(&mut Cursor::new(raw))?)
    }

    /// Decodes the length-prefixed UTF-16 name, dropping the terminator and any null characters.
    pub fn name(&self) -> String {
        let len = (self.name_length as usize).min(NAME_FIELD_SIZE).saturating_sub(2);
        let units = self.name[..len]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
        char::decode_utf16(units)
            .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
            .filter(|c| *c != '\0')
            .collect()
    }

    pub fn object_type(&self) -> Option<ObjectType> {
        ObjectType::from_tag(self.object_type)
    }

    pub fn color(&self) -> Color {
        if self.color == 0 {
            Color::Red
        } else {
            Color::Black
        }
    }

    pub fn size(&self, legacy_sector_size: bool) -> u64 {
        self.stream_size.value(legacy_sector_size)
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        filetime_to_datetime(self.creation_time)
    }

    pub fn modified(&self) -> Option<DateTime<Utc>> {
        filetime_to_datetime(self.modified_time)
    }
}

impl Display for Entry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.object_type() {
            Some(t) => write!(f, "name: {},\ttype: {},\tcolor: {},\t", self.name(), t, self.color())?,
            None => write!(f, "name: {},\ttype: #{},\tcolor: {},\t", self.name(), self.object_type, self.color())?,
        }
        write!(
            f,
            "left sibling: {:#x},\tright sibling: {:#x},\tchild: {:#x},\tstart: {}",
            self.left_sibling_id, self.right_sibling_id, self.child_id, self.starting_sector_location
        )
    }
}

/// Windows FILETIME (100ns ticks since 1601) to UTC; zero means "not recorded".
pub fn filetime_to_datetime(filetime: u64) -> Option<DateTime<Utc>> {
    if filetime == 0 {
        return None;
    }
    let since_unix = filetime as i128 - FILETIME_UNIX_EPOCH as i128;
    let secs = since_unix.div_euclid(10_000_000) as i64;
    let nanos = (since_unix.rem_euclid(10_000_000) * 100) as u32;
    DateTime::from_timestamp(secs, nanos)
}
