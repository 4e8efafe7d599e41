#[cfg(test)]
mod crc32_test;

use crc::{Crc, CRC_32_ISCSI};

// CRC_32_ISCSI is the Castagnoli polynomial 0x1EDC6F41, i.e. CRC-32C.
const ISCSI_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

/// Incremental CRC-32C state.
pub struct Crc32(crc::Digest<'static, u32>);

impl Default for Crc32 {
    fn default() -> Self {
        Crc32::new()
    }
}

impl Crc32 {
    pub fn new() -> Self {
        Crc32(ISCSI_CRC.digest())
    }

    pub fn update(&mut self, buf: &[u8]) {
        self.0.update(buf);
    }

    pub fn finalize(self) -> u32 {
        self.0.finalize()
    }
}

/// One-shot CRC-32C of a buffer.
pub fn crc32c(buf: &[u8]) -> u32 {
    ISCSI_CRC.checksum(buf)
}
