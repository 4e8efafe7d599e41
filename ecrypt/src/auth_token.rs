
use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};

/// Wire size of the four fixed `u32` fields.
const FIXED_FIELDS_SIZE: usize = 4 * 4;

/// Authentication token of a Secure Cell.
///
/// Packed little-endian layout:
///
/// ```text
/// u32 alg
/// u32 iv_length
/// u8[iv_length] iv
/// u32 auth_tag_length
/// u8[auth_tag_length] auth_tag
/// u32 message_length
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub alg: u32,
    pub iv: Vec<u8>,
    pub auth_tag: Vec<u8>,
    pub message_length: u32,
}

// Length fields are attacker-controlled; cap them well below anything a
// real token uses so a corrupted token cannot drive a huge allocation.
const MAX_FIELD_LENGTH: u32 = 0xFFFF;

fn read_u32(raw: &[u8], offset: &mut usize) -> Result<u32> {
    let end = offset.checked_add(4).ok_or(Error::DataCorrupt)?;
    if raw.len() < end {
        return Err(Error::DataCorrupt);
    }
    let value = LittleEndian::read_u32(&raw[*offset..end]);
    *offset = end;
    Ok(value)
}

fn read_bytes<'a>(raw: &'a [u8], offset: &mut usize, length: u32) -> Result<&'a [u8]> {
    if length > MAX_FIELD_LENGTH {
        return Err(Error::DataCorrupt);
    }
    let end = offset
        .checked_add(length as usize)
        .ok_or(Error::DataCorrupt)?;
    if raw.len() < end {
        return Err(Error::DataCorrupt);
    }
    let bytes = &raw[*offset..end];
    *offset = end;
    Ok(bytes)
}

impl AuthToken {
    /// Serialized size of this token.
    pub fn size(&self) -> usize {
        FIXED_FIELDS_SIZE + self.iv.len() + self.auth_tag.len()
    }

    /// Serialized size of a token with default IV and tag lengths.
    pub fn default_size() -> usize {
        FIXED_FIELDS_SIZE + ecconnect::sym::AEAD_IV_LENGTH + ecconnect::sym::AEAD_TAG_LENGTH
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size());
        out.extend_from_slice(&self.alg.to_le_bytes());
        out.extend_from_slice(&(self.iv.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&(self.auth_tag.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.auth_tag);
        out.extend_from_slice(&self.message_length.to_le_bytes());
        out
    }

    /// Parses a token from the front of `raw`, returning it together with
    /// the number of bytes consumed. Trailing data is left for the caller
    /// (Seal mode stores the ciphertext right after the token).
    pub fn parse_prefix(raw: &[u8]) -> Result<(AuthToken, usize)> {
        let mut offset = 0;
        let alg = read_u32(raw, &mut offset)?;
        let iv_length = read_u32(raw, &mut offset)?;
        let iv = read_bytes(raw, &mut offset, iv_length)?.to_vec();
        let auth_tag_length = read_u32(raw, &mut offset)?;
        let auth_tag = read_bytes(raw, &mut offset, auth_tag_length)?.to_vec();
        let message_length = read_u32(raw, &mut offset)?;
        Ok((
            AuthToken {
                alg,
                iv,
                auth_tag,
                message_length,
            },
            offset,
        ))
    }

    /// Parses a standalone token; trailing bytes are an error.
    pub fn parse(raw: &[u8]) -> Result<AuthToken> {
        let (token, consumed) = AuthToken::parse_prefix(raw)?;
        if consumed != raw.len() {
            return Err(Error::DataCorrupt);
        }
        Ok(token)
    }

    /// Quick plaintext-size guess without keeping the parsed token around.
    pub fn message_size(raw: &[u8]) -> Result<u32> {
        let (token, _) = AuthToken::parse_prefix(raw)?;
        Ok(token.message_length)
    }
}
