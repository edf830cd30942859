use crate::chain::ChainReader;
use crate::common::{OleError, OleResult, SectorType};
use crate::fat::FatSector;
use crate::header::Header;
use log::debug;

/// mini fat sector
/// https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-cfb/c5d235f7-b73c-4ec5-bf8d-5c08306cd023
///
/// The Mini FAT together with the mini stream it addresses. Mini sector `n`
/// starts at byte `n * mini_sector_size` of `data`.
#[derive(Debug, Clone, Default)]
pub struct MiniStream {
    pub mini_fat: Vec<SectorType>,
    pub data: Vec<u8>,
}

impl MiniStream {
    /// Loads the Mini FAT and the mini stream through the main FAT.
    ///
    /// `root_start` and `root_size` describe the root entry, whose stream is
    /// the mini stream.
    pub fn load(main: &ChainReader<'_>, header: &Header, root_start: SectorType, root_size: u64) -> OleResult<Self> {
        let mini_sector_size = header.mini_sector_size() as u64;
        let capacity = header.mini_fat_capacity();
        let mini_sector_count = root_size.div_ceil(mini_sector_size);
        let needed = mini_sector_count * 4;
        if needed > capacity {
            return Err(OleError::MiniStreamTooLarge { needed, capacity });
        }

        let raw = main.read(header.first_mini_fat_sector_location, Some(capacity))?;
        let mut mini_fat = FatSector::parse(&raw)?.entries;
        mini_fat.truncate(mini_sector_count as usize);

        let data = main.read(root_start, Some(root_size))?;
        debug!(
            "mini stream loaded: {} bytes, {} mini FAT entries",
            data.len(),
            mini_fat.len()
        );
        Ok(Self { mini_fat, data })
    }

    pub fn reader(&self, mini_sector_size: usize) -> ChainReader<'_> {
        ChainReader::new(&self.data, &self.mini_fat, mini_sector_size, 0)
    }
}
