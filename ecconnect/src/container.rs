
use byteorder::{BigEndian, ByteOrder};

use crate::crc32::Crc32;
use crate::error::{Error, Result};

pub const CONTAINER_TAG_LENGTH: usize = 4;
pub const CONTAINER_HEADER_LENGTH: usize = 12;

const SIZE_OFFSET: usize = 4;
const CRC_OFFSET: usize = 8;

/// Data layout of a serialized container:
///
/// ```text
/// offset  size   field
///  0      4      ASCII tag
///  4      4      payload size (bytes, big-endian)
///  8      4      CRC-32C (big-endian, over header with this field zero ++ payload)
/// 12      n      payload
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    tag: [u8; CONTAINER_TAG_LENGTH],
    payload: Vec<u8>,
}

/// Writes `n` into the size field of a raw container buffer.
pub fn set_data_size(raw: &mut [u8], n: u32) -> Result<()> {
    if raw.len() < CONTAINER_HEADER_LENGTH {
        return Err(Error::InvalidParameter);
    }
    BigEndian::write_u32(&mut raw[SIZE_OFFSET..CRC_OFFSET], n);
    Ok(())
}

/// Reads the size field of a raw container buffer.
pub fn data_size(raw: &[u8]) -> Result<u32> {
    if raw.len() < CONTAINER_HEADER_LENGTH {
        return Err(Error::InvalidParameter);
    }
    Ok(BigEndian::read_u32(&raw[SIZE_OFFSET..CRC_OFFSET]))
}

fn checksum(raw: &[u8], payload_length: usize) -> u32 {
    let mut crc = Crc32::new();
    crc.update(&raw[..CRC_OFFSET]);
    crc.update(&[0u8; 4]);
    crc.update(&raw[CONTAINER_HEADER_LENGTH..CONTAINER_HEADER_LENGTH + payload_length]);
    crc.finalize()
}

/// Recomputes the checksum of a raw container and stores it in the header.
///
/// The size field must be set before calling this.
pub fn update_checksum(raw: &mut [u8]) -> Result<()> {
    let payload_length = data_size(raw)? as usize;
    if raw.len() < CONTAINER_HEADER_LENGTH + payload_length {
        return Err(Error::InvalidParameter);
    }
    let crc = checksum(raw, payload_length);
    BigEndian::write_u32(&mut raw[CRC_OFFSET..CONTAINER_HEADER_LENGTH], crc);
    Ok(())
}

/// Verifies the checksum of a raw container.
///
/// Succeeds iff the size field matches the available payload and the stored
/// CRC matches the recomputed one. Any mismatch is `InvalidParameter`.
pub fn verify_checksum(raw: &[u8]) -> Result<()> {
    let payload_length = data_size(raw)? as usize;
    if raw.len() != CONTAINER_HEADER_LENGTH + payload_length {
        return Err(Error::InvalidParameter);
    }
    let stored = BigEndian::read_u32(&raw[CRC_OFFSET..CONTAINER_HEADER_LENGTH]);
    if stored != checksum(raw, payload_length) {
        return Err(Error::InvalidParameter);
    }
    Ok(())
}

impl Container {
    pub fn new(tag: [u8; CONTAINER_TAG_LENGTH], payload: Vec<u8>) -> Container {
        Container { tag, payload }
    }

    pub fn tag(&self) -> &[u8; CONTAINER_TAG_LENGTH] {
        &self.tag
    }

    pub fn data(&self) -> &[u8] {
        &self.payload
    }

    pub fn data_size(&self) -> usize {
        self.payload.len()
    }

    pub fn into_data(self) -> Vec<u8> {
        self.payload
    }

    pub fn serialized_size(&self) -> usize {
        CONTAINER_HEADER_LENGTH + self.payload.len()
    }

    /// Serializes the container into `out`, returning the number of bytes
    /// written. Reports the required size when `out` is too short.
    pub fn write_into(&self, out: &mut [u8]) -> Result<usize> {
        let needed = self.serialized_size();
        if out.len() < needed {
            return Err(Error::BufferTooSmall { needed });
        }
        if self.payload.len() > u32::MAX as usize {
            return Err(Error::InvalidParameter);
        }
        out[..CONTAINER_TAG_LENGTH].copy_from_slice(&self.tag);
        set_data_size(out, self.payload.len() as u32)?;
        out[CONTAINER_HEADER_LENGTH..needed].copy_from_slice(&self.payload);
        update_checksum(&mut out[..needed])?;
        Ok(needed)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = vec![0u8; self.serialized_size()];
        self.write_into(&mut out)?;
        Ok(out)
    }

    /// Parses and verifies a serialized container.
    pub fn parse(input: &[u8]) -> Result<Container> {
        verify_checksum(input)?;
        let mut tag = [0u8; CONTAINER_TAG_LENGTH];
        tag.copy_from_slice(&input[..CONTAINER_TAG_LENGTH]);
        Ok(Container {
            tag,
            payload: input[CONTAINER_HEADER_LENGTH..].to_vec(),
        })
    }
}
