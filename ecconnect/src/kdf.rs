#[cfg(test)]
mod kdf_test;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

const HMAC_SHA256_BLOCK: usize = 32;

/// Derives `out_length` bytes from a master key, an ASCII label and a list
/// of context buffers.
///
/// Counter-mode construction over HMAC-SHA-256: block `i` (1-based) is
/// `HMAC(key, be32(i) || label || 0x00 || ctx[0] || ctx[1] || ...)`, blocks
/// are concatenated and truncated to the requested length. The output is
/// bound to the whole `(label, contexts)` tuple; empty context buffers are
/// skipped, matching the variadic calling convention of users.
pub fn kdf(
    key: &[u8],
    label: &str,
    contexts: &[&[u8]],
    out_length: usize,
) -> Result<Zeroizing<Vec<u8>>> {
    if key.is_empty() || label.is_empty() || out_length == 0 {
        return Err(Error::InvalidParameter);
    }

    let mut out = Zeroizing::new(Vec::with_capacity(out_length));
    let blocks = out_length.div_ceil(HMAC_SHA256_BLOCK);
    if blocks > u32::MAX as usize {
        return Err(Error::InvalidParameter);
    }

    for i in 1..=blocks as u32 {
        let mut mac =
            HmacSha256::new_from_slice(key).map_err(|_| Error::InvalidParameter)?;
        mac.update(&i.to_be_bytes());
        mac.update(label.as_bytes());
        mac.update(&[0u8]);
        for context in contexts {
            if !context.is_empty() {
                mac.update(context);
            }
        }
        let block = mac.finalize().into_bytes();
        let take = HMAC_SHA256_BLOCK.min(out_length - out.len());
        out.extend_from_slice(&block[..take]);
    }

    Ok(out)
}

/// PBKDF2-HMAC-SHA-256 per RFC 2898.
pub fn pbkdf2_sha256(
    passphrase: &[u8],
    salt: &[u8],
    iterations: u32,
    key: &mut [u8],
) -> Result<()> {
    if passphrase.is_empty() || iterations == 0 || key.is_empty() {
        return Err(Error::InvalidParameter);
    }
    if passphrase.len() > i32::MAX as usize
        || salt.len() > i32::MAX as usize
        || key.len() > i32::MAX as usize
    {
        return Err(Error::InvalidParameter);
    }
    pbkdf2::pbkdf2_hmac::<Sha256>(passphrase, salt, iterations, key);
    Ok(())
}
