#[cfg(test)]
mod rsa_key_pair_gen_test;

use rand::rngs::OsRng;
use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::container::Container;
use crate::error::{Error, Result};
use crate::key::{RSA_PRIV_KEY_PREF, RSA_PUB_KEY_PREF};

pub const RSA_KEY_LENGTH_1024: usize = 1024;
pub const RSA_KEY_LENGTH_2048: usize = 2048;
pub const RSA_KEY_LENGTH_4096: usize = 4096;
pub const RSA_KEY_LENGTH_8192: usize = 8192;

fn rsa_size_tag(bits: usize) -> Result<u8> {
    match bits {
        RSA_KEY_LENGTH_1024 => Ok(b'1'),
        RSA_KEY_LENGTH_2048 => Ok(b'2'),
        RSA_KEY_LENGTH_4096 => Ok(b'4'),
        RSA_KEY_LENGTH_8192 => Ok(b'8'),
        _ => Err(Error::InvalidParameter),
    }
}

/// Freshly generated RSA keypair.
///
/// The public exponent is fixed to 65537; unsupported modulus sizes are
/// rejected before any key generation work happens.
#[derive(Debug)]
pub struct RsaKeyPairGen {
    bits: usize,
    key: RsaPrivateKey,
}

impl RsaKeyPairGen {
    pub fn new(bits: usize) -> Result<RsaKeyPairGen> {
        rsa_size_tag(bits)?;
        log::debug!("generating {bits}-bit RSA key pair");
        let key = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| Error::CryptoBackend(e.to_string()))?;
        Ok(RsaKeyPairGen { bits, key })
    }

    pub fn export_private_key(&self) -> Result<Vec<u8>> {
        let size_tag = rsa_size_tag(self.bits)?;
        let tag = [
            RSA_PRIV_KEY_PREF[0],
            RSA_PRIV_KEY_PREF[1],
            RSA_PRIV_KEY_PREF[2],
            size_tag,
        ];
        let der = self
            .key
            .to_pkcs1_der()
            .map_err(|e| Error::CryptoBackend(e.to_string()))?;
        Container::new(tag, der.as_bytes().to_vec()).serialize()
    }

    pub fn export_public_key(&self) -> Result<Vec<u8>> {
        let size_tag = rsa_size_tag(self.bits)?;
        let tag = [
            RSA_PUB_KEY_PREF[0],
            RSA_PUB_KEY_PREF[1],
            RSA_PUB_KEY_PREF[2],
            size_tag,
        ];
        let der = RsaPublicKey::from(&self.key)
            .to_pkcs1_der()
            .map_err(|e| Error::CryptoBackend(e.to_string()))?;
        Container::new(tag, der.as_bytes().to_vec()).serialize()
    }
}
