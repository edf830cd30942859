use crate::common::{OleError, OleResult, SectorType};
use log::trace;

/// Walks a FAT or Mini FAT chain over a byte buffer and reassembles the stream.
///
/// Sector `n` of the chain lives at `base_offset + n * sector_size` in `data`.
/// For the main FAT the base offset is one sector (the header); for the mini
/// stream it is zero.
#[derive(Debug, Clone, Copy)]
pub struct ChainReader<'a> {
    data: &'a [u8],
    table: &'a [SectorType],
    sector_size: usize,
    base_offset: usize,
    /// The table ends where unread DIFAT sectors would have continued it.
    incomplete: bool,
}

impl<'a> ChainReader<'a> {
    pub fn new(data: &'a [u8], table: &'a [SectorType], sector_size: usize, base_offset: usize) -> Self {
        Self {
            data,
            table,
            sector_size,
            base_offset,
            incomplete: false,
        }
    }

    pub fn with_incomplete_table(mut self, incomplete: bool) -> Self {
        self.incomplete = incomplete;
        self
    }

    /// Largest stream the table can address.
    pub fn capacity(&self) -> u64 {
        self.table.len() as u64 * self.sector_size as u64
    }

    /// Reads the chain starting at `start`.
    ///
    /// With `size == None` the chain is followed until EndOfChain and the
    /// whole sectors are returned; with a declared size exactly `size` bytes
    /// come back or the read fails.
    pub fn read(&self, start: SectorType, size: Option<u64>) -> OleResult<Vec<u8>> {
        let (size, unknown_size) = match size {
            Some(size) => (size, false),
            None => (self.capacity(), true),
        };
        trace!(
            "reading chain from {} ({} bytes, sector size {}, base {})",
            start,
            if unknown_size { "unknown".to_string() } else { size.to_string() },
            self.sector_size,
            self.base_offset
        );

        let sector_count = size.div_ceil(self.sector_size as u64);
        if sector_count > self.table.len() as u64 {
            return Err(if self.incomplete {
                OleError::DifatUnsupported {
                    sector: SectorType::RegularSect(self.table.len() as u32),
                }
            } else {
                OleError::StreamTooLarge {
                    size,
                    capacity: self.capacity(),
                }
            });
        }
        if size == 0 && start != SectorType::EndOfChain {
            return Err(OleError::EmptyStreamWithSector { sector: start });
        }

        let mut data = Vec::with_capacity(size as usize);
        let mut current = start;
        let mut short_sector = None;
        for _ in 0..sector_count {
            let index = match current {
                SectorType::EndOfChain if unknown_size => break,
                SectorType::EndOfChain => return Err(OleError::UnexpectedEndOfChain { size }),
                SectorType::RegularSect(index) if (index as usize) < self.table.len() => index as usize,
                SectorType::RegularSect(_) if self.incomplete => {
                    return Err(OleError::DifatUnsupported { sector: current })
                }
                _ => {
                    return Err(OleError::SectorOutOfRange {
                        sector: current,
                        len: self.table.len(),
                    })
                }
            };

            // only the final sector of a chain may run past the end of the buffer
            if let Some(sector) = short_sector {
                return Err(OleError::ShortSector { sector });
            }
            let bytes = self.sector(index);
            if bytes.len() < self.sector_size {
                short_sector = Some(current);
            }
            data.extend_from_slice(bytes);
            current = self.table[index];
        }

        if unknown_size {
            data.truncate(size as usize);
        } else if (data.len() as u64) < size {
            return Err(OleError::TruncatedStream {
                expected: size,
                actual: data.len() as u64,
            });
        } else {
            data.truncate(size as usize);
        }
        Ok(data)
    }

    /// The bytes of one sector; the last sector of the buffer may be short.
    fn sector(&self, index: usize) -> &'a [u8] {
        let start = self.base_offset.saturating_add(index.saturating_mul(self.sector_size));
        let end = start.saturating_add(self.sector_size).min(self.data.len());
        self.data.get(start..end).unwrap_or(&[])
    }
}
