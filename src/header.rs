use crate::common::{OleError, OleResult, SectorType};
use crate::difat::HeaderDifat;
use crate::directory::Clsid;
use binrw::BinRead;
use std::fmt::{Display, Formatter};
use std::io::Cursor;

pub const HEADER_SIZE: usize = 512;
pub const SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

const MIN_SECTOR_SHIFT: u16 = 7;
const MAX_SECTOR_SHIFT: u16 = 16;

/// The fixed 512-byte compound file header.
/// https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-cfb/05060311-bfce-4b12-874d-71fd4ce63aea
#[derive(Debug, Clone, BinRead)]
#[br(little, magic = b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1")]
pub struct Header {
    // Header CLSID (16 bytes): Reserved and unused class ID that MUST be set to all zeroes (CLSID_NULL).
    pub clsid: Clsid,

    // Minor Version (2 bytes): SHOULD be 0x003E.
    pub minor_version: u16,

    // Major Version (2 bytes): 0x0003 (512-byte sectors) or 0x0004 (4096-byte sectors).
    pub major_version: u16,

    // Byte Order (2 bytes): 0xFFFE, little-endian.
    pub byte_order: u16,

    // Sector Shift (2 bytes): sector size as a power of 2.
    pub sector_shift: u16,

    // Mini Sector Shift (2 bytes): mini stream sector size as a power of 2, normally 6.
    pub mini_sector_shift: u16,

    // Reserved (6 bytes), then Number of Directory Sectors (4 bytes), zero for version 3.
    #[br(pad_before = 6)]
    pub number_of_directory_sectors: u32,

    pub number_of_fat_sectors: u32,

    pub first_directory_sector_location: SectorType,

    pub transaction_signature_number: u32,

    // Mini Stream Cutoff Size (4 bytes): streams strictly smaller than this live in the mini stream.
    pub mini_stream_cutoff_size: u32,

    pub first_mini_fat_sector_location: SectorType,

    pub number_of_mini_fat_sectors: u32,

    pub first_difat_sector_location: SectorType,

    pub number_of_difat_sectors: u32,

    // DIFAT (436 bytes): the first 109 FAT sector locations.
    pub difat: HeaderDifat,
}

impl Header {
    pub fn parse(data: &[u8]) -> OleResult<Self> {
        if data.len() < HEADER_SIZE {
            return Err(OleError::TooShort { len: data.len() });
        }
        if data[..SIGNATURE.len()] != SIGNATURE {
            return Err(OleError::InvalidSignature);
        }

        let header = Header::read(&mut Cursor::new(&data[..HEADER_SIZE])).map_err(|err| match err {
            binrw::Error::BadMagic { .. } => OleError::InvalidSignature,
            other => OleError::ParseError(other),
        })?;

        if !(MIN_SECTOR_SHIFT..=MAX_SECTOR_SHIFT).contains(&header.sector_shift)
            || header.mini_sector_shift > header.sector_shift
        {
            return Err(OleError::InvalidSectorShift {
                sector_shift: header.sector_shift,
                mini_sector_shift: header.mini_sector_shift,
            });
        }

        Ok(header)
    }

    pub fn sector_size(&self) -> usize {
        1 << self.sector_shift
    }

    pub fn mini_sector_size(&self) -> usize {
        1 << self.mini_sector_shift
    }

    /// Version 3 files keep the stream size in the low 32 bits only.
    pub fn is_legacy_sector_size(&self) -> bool {
        self.sector_size() == 512
    }

    /// Declared byte length of the Mini FAT stream.
    pub fn mini_fat_capacity(&self) -> u64 {
        self.number_of_mini_fat_sectors as u64 * self.sector_size() as u64
    }
}

impl Display for Header {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "version: {}.{},\tsector size: {},\tmini sector size: {},\tcutoff: {},\tfat sectors: {},\tmini fat sectors: {},\tdifat sectors: {}",
            self.major_version,
            self.minor_version,
            self.sector_size(),
            self.mini_sector_size(),
            self.mini_stream_cutoff_size,
            self.number_of_fat_sectors,
            self.number_of_mini_fat_sectors,
            self.number_of_difat_sectors
        )
    }
}
