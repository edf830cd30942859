use crate::common::SectorType;
use binrw::BinRead;

/// Number of FAT sector locations stored directly in the header.
pub const HEADER_DIFAT_ENTRIES: usize = 109;

/// The DIFAT array embedded in the header.
/// https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-cfb/0afa4e43-b18f-432a-9917-4f276eca7a73
///
/// Only these first 109 FAT sector locations are followed; DIFAT sector
/// chains that extend the list are detected but not read.
#[derive(Debug, Clone, BinRead)]
#[br(little)]
pub struct HeaderDifat {
    pub entries: [SectorType; HEADER_DIFAT_ENTRIES],
}

impl HeaderDifat {
    /// FAT sector locations up to the first EndOfChain or FreeSect slot.
    pub fn in_use(&self) -> impl Iterator<Item = SectorType> + '_ {
        self.entries.iter().copied().take_while(|entry| !entry.is_unused())
    }
}
