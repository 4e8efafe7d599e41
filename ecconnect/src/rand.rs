use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{Error, Result};

/// Fills `buf` with cryptographically secure random bytes.
pub fn gen_random_bytes(buf: &mut [u8]) -> Result<()> {
    if buf.is_empty() {
        return Err(Error::InvalidParameter);
    }
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| Error::CryptoBackend(e.to_string()))
}
