use binrw::BinRead;
use std::fmt::{Display, Formatter};
use thiserror::Error;

pub const MAX_REG_SECT: u32 = 0xFFFFFFFA;
pub const NOT_APPLICABLE: u32 = 0xFFFFFFFB;
pub const DIF_SECT: u32 = 0xFFFFFFFC;
pub const FAT_SECT: u32 = 0xFFFFFFFD;
pub const END_OF_CHAIN: u32 = 0xFFFFFFFE;
pub const FREE_SECT: u32 = 0xFFFFFFFF;

/// REGSECT 0x00000000 - 0xFFFFFFF9 Regular sector number.
///
/// MAXREGSECT 0xFFFFFFFA Maximum regular sector number.
///
/// Not applicable 0xFFFFFFFB Reserved for future use.
///
/// DIFSECT 0xFFFFFFFC Specifies a DIFAT sector in the FAT.
///
/// FATSECT 0xFFFFFFFD Specifies a FAT sector in the FAT.
///
/// ENDOFCHAIN 0xFFFFFFFE End of a linked chain of sectors.
///
/// FREESECT 0xFFFFFFFF Specifies an unallocated sector in the FAT, Mini FAT, or DIFAT.
#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[br(little)]
pub enum SectorType {
    #[br(magic(0xFFFFFFFAu32))]
    MaxRegSect,
    #[br(magic(0xFFFFFFFBu32))]
    NotApplicable,
    #[br(magic(0xFFFFFFFCu32))]
    DifSect,
    #[br(magic(0xFFFFFFFDu32))]
    FatSect,
    #[default]
    #[br(magic(0xFFFFFFFEu32))]
    EndOfChain,
    #[br(magic(0xFFFFFFFFu32))]
    FreeSect,
    RegularSect(u32),
}

impl SectorType {
    pub fn from_raw(value: u32) -> Self {
        match value {
            MAX_REG_SECT => SectorType::MaxRegSect,
            NOT_APPLICABLE => SectorType::NotApplicable,
            DIF_SECT => SectorType::DifSect,
            FAT_SECT => SectorType::FatSect,
            END_OF_CHAIN => SectorType::EndOfChain,
            FREE_SECT => SectorType::FreeSect,
            v => SectorType::RegularSect(v),
        }
    }

    pub fn to_raw(self) -> u32 {
        match self {
            SectorType::MaxRegSect => MAX_REG_SECT,
            SectorType::NotApplicable => NOT_APPLICABLE,
            SectorType::DifSect => DIF_SECT,
            SectorType::FatSect => FAT_SECT,
            SectorType::EndOfChain => END_OF_CHAIN,
            SectorType::FreeSect => FREE_SECT,
            SectorType::RegularSect(v) => v,
        }
    }

    /// `true` for the markers that end the list of in-use DIFAT slots.
    pub fn is_unused(&self) -> bool {
        matches!(self, SectorType::EndOfChain | SectorType::FreeSect)
    }
}

impl Display for SectorType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SectorType::MaxRegSect => write!(f, "MaxRegSect"),
            SectorType::NotApplicable => write!(f, "NotApplicable"),
            SectorType::DifSect => write!(f, "DifatSect"),
            SectorType::FatSect => write!(f, "FatSect"),
            SectorType::EndOfChain => write!(f, "EndOfChain"),
            SectorType::FreeSect => write!(f, "FreeSect"),
            SectorType::RegularSect(v) => write!(f, "{}", v),
        }
    }
}

/// Coarse classification of [`OleError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The buffer is not a compound file at all.
    Format,
    /// The container is recognised but internally inconsistent.
    Structural,
    /// An index, size or name points outside of what the container holds.
    Range,
    /// The node exists but has the wrong kind for the request.
    Type,
    /// Valid container using a feature this reader does not implement.
    Unsupported,
    Io,
}

#[derive(Debug, Error)]
pub enum OleError {
    #[error("file is too short to be a compound file: {len} bytes, need at least 512")]
    TooShort { len: usize },
    #[error("not a compound file: bad header signature")]
    InvalidSignature,
    #[error("invalid sector shift {sector_shift} / mini sector shift {mini_sector_shift}")]
    InvalidSectorShift {
        sector_shift: u16,
        mini_sector_shift: u16,
    },
    #[error("parse error: {0}")]
    ParseError(#[from] binrw::Error),
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("invalid entry type {tag} for directory entry {sid}")]
    InvalidEntryType { sid: u32, tag: u8 },
    #[error("directory entry {sid} must not be the root storage")]
    MisplacedRoot { sid: u32 },
    #[error("directory entry 0 must be the root storage, found type {tag}")]
    MissingRoot { tag: u8 },
    #[error("duplicate name '{name}' in storage '{parent}'")]
    DuplicateName { parent: String, name: String },
    #[error("directory entry {sid} is referenced more than once")]
    DirectoryCycle { sid: u32 },
    #[error("mini stream needs {needed} bytes of mini FAT but only {capacity} are declared")]
    MiniStreamTooLarge { needed: u64, capacity: u64 },
    #[error("DIFAT is used but the number of FAT sectors is {fat_sectors} (< 109)")]
    InconsistentDifat { fat_sectors: u32 },
    #[error("empty stream must start at EndOfChain, found sector {sector}")]
    EmptyStreamWithSector { sector: SectorType },
    #[error("header FAT sector slot {slot} holds {sector} instead of a sector index")]
    InvalidFatSlot { slot: usize, sector: SectorType },

    #[error("sector {sector} is outside of the allocation table ({len} entries)")]
    SectorOutOfRange { sector: SectorType, len: usize },
    #[error("could not read {size} bytes: end of chain reached")]
    UnexpectedEndOfChain { size: u64 },
    #[error("stream of {size} bytes is too large for a table of {capacity} bytes")]
    StreamTooLarge { size: u64, capacity: u64 },
    #[error("stream data is truncated: expected {expected} bytes, found {actual}")]
    TruncatedStream { expected: u64, actual: u64 },
    #[error("sector {sector} is cut short by the end of the file but the chain continues")]
    ShortSector { sector: SectorType },
    #[error("invalid directory entry id {sid}")]
    InvalidSid { sid: u32 },
    #[error("file not found: {name}")]
    NotFound { name: String },

    #[error("cannot get child of non-storage entry '{name}'")]
    NotAStorage { name: String },
    #[error("entry '{name}' has no stream contents")]
    NotAStream { name: String },

    #[error("sector {sector} is beyond the FAT covered by the header; DIFAT chains are not supported")]
    DifatUnsupported { sector: SectorType },
}

impl OleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OleError::TooShort { .. }
            | OleError::InvalidSignature
            | OleError::InvalidSectorShift { .. }
            | OleError::ParseError(_) => ErrorKind::Format,
            OleError::IoError(_) => ErrorKind::Io,
            OleError::InvalidEntryType { .. }
            | OleError::MisplacedRoot { .. }
            | OleError::MissingRoot { .. }
            | OleError::DuplicateName { .. }
            | OleError::DirectoryCycle { .. }
            | OleError::MiniStreamTooLarge { .. }
            | OleError::InconsistentDifat { .. }
            | OleError::EmptyStreamWithSector { .. }
            | OleError::InvalidFatSlot { .. } => ErrorKind::Structural,
            OleError::SectorOutOfRange { .. }
            | OleError::UnexpectedEndOfChain { .. }
            | OleError::StreamTooLarge { .. }
            | OleError::TruncatedStream { .. }
            | OleError::ShortSector { .. }
            | OleError::InvalidSid { .. }
            | OleError::NotFound { .. } => ErrorKind::Range,
            OleError::NotAStorage { .. } | OleError::NotAStream { .. } => ErrorKind::Type,
            OleError::DifatUnsupported { .. } => ErrorKind::Unsupported,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, OleError::NotFound { .. })
    }
}

pub type OleResult<T> = Result<T, OleError>;
