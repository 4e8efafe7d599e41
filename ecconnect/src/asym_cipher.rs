
use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;

use crate::error::{Error, Result};
use crate::key::{parse_key_container, KeyKind};

// OAEP uses SHA-1, like the original backend.
const OAEP_HASH_SIZE: usize = 20;

enum RsaKey {
    Private(Box<RsaPrivateKey>),
    Public(Box<RsaPublicKey>),
}

/// RSA-OAEP cipher over an imported key container.
///
/// The key kind decides what the context can do: decryption demands a
/// private key, and that is enforced by construction rather than by probing
/// key internals at call time.
pub struct AsymCipher {
    key: RsaKey,
}

impl AsymCipher {
    pub fn from_key_container(raw: &[u8]) -> Result<AsymCipher> {
        let (kind, container) = parse_key_container(raw)?;
        let key = match kind {
            KeyKind::RsaPrivate => {
                let key = RsaPrivateKey::from_pkcs1_der(container.data())
                    .map_err(|_| Error::DataCorrupt)?;
                RsaKey::Private(Box::new(key))
            }
            KeyKind::RsaPublic => {
                let key = RsaPublicKey::from_pkcs1_der(container.data())
                    .map_err(|_| Error::DataCorrupt)?;
                RsaKey::Public(Box::new(key))
            }
            // Only RSA supports asymmetric encryption.
            _ => return Err(Error::InvalidParameter),
        };
        Ok(AsymCipher { key })
    }

    fn public_key(&self) -> RsaPublicKey {
        match &self.key {
            RsaKey::Private(key) => key.to_public_key(),
            RsaKey::Public(key) => key.as_ref().clone(),
        }
    }

    fn modulus_size(&self) -> usize {
        match &self.key {
            RsaKey::Private(key) => key.size(),
            RsaKey::Public(key) => key.size(),
        }
    }

    pub fn encrypt(&self, plain_data: &[u8]) -> Result<Vec<u8>> {
        if plain_data.is_empty() {
            return Err(Error::InvalidParameter);
        }
        let max_payload = self
            .modulus_size()
            .checked_sub(2 + 2 * OAEP_HASH_SIZE)
            .ok_or(Error::InvalidParameter)?;
        if plain_data.len() > max_payload {
            return Err(Error::InvalidParameter);
        }
        self.public_key()
            .encrypt(&mut OsRng, Oaep::new::<Sha1>(), plain_data)
            .map_err(|_| Error::Fail)
    }

    pub fn decrypt(&self, cipher_data: &[u8]) -> Result<Vec<u8>> {
        if cipher_data.len() != self.modulus_size() {
            return Err(Error::InvalidParameter);
        }
        let key = match &self.key {
            RsaKey::Private(key) => key,
            RsaKey::Public(_) => return Err(Error::InvalidParameter),
        };
        key.decrypt(Oaep::new::<Sha1>(), cipher_data)
            .map_err(|_| Error::Fail)
    }
}
