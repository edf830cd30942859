use crate::common::{OleError, OleResult, SectorType};
use crate::difat::HEADER_DIFAT_ENTRIES;
use crate::header::Header;
use binrw::BinRead;
use log::{debug, warn};
use std::io::Cursor;

/// fat sector
/// https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-cfb/30e1013a-a0ff-4404-9ccf-d75d835ff404
#[derive(Debug, Clone, BinRead)]
#[br(little, import(entry_count: usize))]
pub struct FatSector {
    #[br(count = entry_count)]
    pub entries: Vec<SectorType>,
}

impl FatSector {
    /// Decodes every complete 32-bit entry of `raw`.
    pub fn parse(raw: &[u8]) -> OleResult<Self> {
        Ok(FatSector::read_args(&mut Cursor::new(raw), (raw.len() / 4,))?)
    }
}

/// The main sector allocation table.
#[derive(Debug, Clone, Default)]
pub struct Fat {
    pub entries: Vec<SectorType>,
    /// More FAT sectors are listed in DIFAT sectors that were not read.
    pub incomplete: bool,
}

impl Fat {
    /// Concatenates the FAT sectors listed in the header, then clips the
    /// table to the number of sectors the buffer can physically hold.
    pub fn build(data: &[u8], header: &Header) -> OleResult<Self> {
        let sector_size = header.sector_size();
        let mut entries = Vec::new();

        for (slot, sector) in header.difat.in_use().enumerate() {
            let SectorType::RegularSect(index) = sector else {
                return Err(OleError::InvalidFatSlot { slot, sector });
            };
            let offset = (index as usize + 1).saturating_mul(sector_size);
            let raw = data
                .get(offset..)
                .map(|rest| &rest[..rest.len().min(sector_size)])
                .unwrap_or(&[]);
            entries.extend(FatSector::parse(raw)?.entries);
        }

        let declares_difat = header.number_of_difat_sectors > 0;
        if declares_difat && (header.number_of_fat_sectors as usize) < HEADER_DIFAT_ENTRIES {
            return Err(OleError::InconsistentDifat {
                fat_sectors: header.number_of_fat_sectors,
            });
        }

        let max_sector_count = data.len().div_ceil(sector_size).saturating_sub(1);
        let clipped = entries.len() > max_sector_count;
        if clipped {
            warn!(
                "FAT lists {} sectors but the file only holds {}, truncating",
                entries.len(),
                max_sector_count
            );
            entries.truncate(max_sector_count);
        }

        // A clipped table already covers every physical sector, DIFAT or not.
        let incomplete = !clipped
            && (declares_difat || header.number_of_fat_sectors as usize > HEADER_DIFAT_ENTRIES);
        if incomplete {
            warn!(
                "header declares {} DIFAT sectors; only the first {} FAT sectors are used",
                header.number_of_difat_sectors, HEADER_DIFAT_ENTRIES
            );
        }

        debug!("FAT loaded: {} entries", entries.len());
        Ok(Self { entries, incomplete })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{ErrorKind, END_OF_CHAIN, FAT_SECT};
    use crate::test_support::ContainerBuilder;

    #[test]
    fn table_is_clipped_to_physical_sectors() {
        let mut builder = ContainerBuilder::new();
        builder.add_chain(&[7u8; 700]);
        let data = builder.build();
        let header = Header::parse(&data).unwrap();
        let fat = Fat::build(&data, &header).unwrap();

        // header + FAT sector + two data sectors + directory sector
        assert_eq!(data.len(), 5 * 512);
        assert_eq!(fat.len(), 4);
        assert!(!fat.incomplete);
        assert_eq!(fat.entries[0], SectorType::from_raw(FAT_SECT));
        assert_eq!(fat.entries[1], SectorType::RegularSect(2));
        assert_eq!(fat.entries[2], SectorType::from_raw(END_OF_CHAIN));
        assert_eq!(fat.entries[3], SectorType::EndOfChain);
    }

    #[test]
    fn partial_trailing_sector_counts() {
        let mut data = ContainerBuilder::new().build();
        data.extend_from_slice(&[0u8; 10]);
        let header = Header::parse(&data).unwrap();
        // one FAT, one directory and the 10-byte tail
        assert_eq!(Fat::build(&data, &header).unwrap().len(), 3);
    }

    #[test]
    fn difat_with_few_fat_sectors_is_inconsistent() {
        let mut builder = ContainerBuilder::new();
        builder.difat_sectors = 1;
        let data = builder.build();
        let header = Header::parse(&data).unwrap();
        let err = Fat::build(&data, &header).unwrap_err();
        assert!(matches!(err, OleError::InconsistentDifat { fat_sectors: 1 }));
        assert_eq!(err.kind(), ErrorKind::Structural);
    }

    #[test]
    fn marker_in_header_fat_list() {
        let mut data = ContainerBuilder::new().build();
        // second slot of the header FAT list
        data[0x50..0x54].copy_from_slice(&FAT_SECT.to_le_bytes());
        let header = Header::parse(&data).unwrap();
        let err = Fat::build(&data, &header).unwrap_err();
        assert!(matches!(err, OleError::InvalidFatSlot { slot: 1, sector: SectorType::FatSect }));
        assert_eq!(err.kind(), ErrorKind::Structural);
    }

    #[test]
    fn difat_with_full_header_list_marks_table_incomplete() {
        let mut builder = ContainerBuilder::new();
        builder.difat_sectors = 1;
        builder.fat_sectors = Some(110);
        let data = builder.build();
        let header = Header::parse(&data).unwrap();
        // the one real FAT sector (128 entries) exceeds the 2 physical sectors
        assert!(!Fat::build(&data, &header).unwrap().incomplete);

        let mut padded = data.clone();
        padded.resize(200 * 512, 0);
        let fat = Fat::build(&padded, &header).unwrap();
        assert!(fat.incomplete);
        assert_eq!(fat.len(), 128);
    }
}
