
use aes::{Aes128, Aes192, Aes256};
use aes_gcm::aead::consts::U12;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::{AeadInPlace, AesGcm, KeyInit};
use ctr::cipher::{KeyIvInit, StreamCipher};
use zeroize::Zeroizing;

use crate::alg;
use crate::error::{Error, Result};

pub const AEAD_IV_LENGTH: usize = 12;
pub const AEAD_TAG_LENGTH: usize = 16;
pub const CTR_IV_LENGTH: usize = 16;

type Aes128GcmIv12 = AesGcm<Aes128, U12>;
type Aes192GcmIv12 = AesGcm<Aes192, U12>;
type Aes256GcmIv12 = AesGcm<Aes256, U12>;

type Aes128CtrBE = ctr::Ctr128BE<Aes128>;
type Aes192CtrBE = ctr::Ctr128BE<Aes192>;
type Aes256CtrBE = ctr::Ctr128BE<Aes256>;

fn check_sym_alg(expected_cipher: u32, alg_id: u32, key: &[u8]) -> Result<()> {
    if !alg::reserved_bits_valid(alg_id) {
        return Err(Error::InvalidParameter);
    }
    if alg::cipher(alg_id) != expected_cipher {
        return Err(Error::NotSupported);
    }
    match alg::key_bytes(alg_id) {
        Some(len) if len == key.len() => Ok(()),
        _ => Err(Error::InvalidParameter),
    }
}

enum GcmCipher {
    Aes128(Box<Aes128GcmIv12>),
    Aes192(Box<Aes192GcmIv12>),
    Aes256(Box<Aes256GcmIv12>),
}

impl std::fmt::Debug for GcmCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GcmCipher::Aes128(_) => f.write_str("GcmCipher::Aes128"),
            GcmCipher::Aes192(_) => f.write_str("GcmCipher::Aes192"),
            GcmCipher::Aes256(_) => f.write_str("GcmCipher::Aes256"),
        }
    }
}

impl GcmCipher {
    fn new(alg_id: u32, key: &[u8]) -> Result<GcmCipher> {
        check_sym_alg(alg::SYM_AES_GCM, alg_id, key)?;
        Ok(match key.len() {
            16 => GcmCipher::Aes128(Box::new(Aes128GcmIv12::new(GenericArray::from_slice(key)))),
            24 => GcmCipher::Aes192(Box::new(Aes192GcmIv12::new(GenericArray::from_slice(key)))),
            _ => GcmCipher::Aes256(Box::new(Aes256GcmIv12::new(GenericArray::from_slice(key)))),
        })
    }

    fn encrypt_detached(&self, iv: &[u8], aad: &[u8], buf: &mut [u8]) -> Result<[u8; AEAD_TAG_LENGTH]> {
        let nonce = GenericArray::from_slice(iv);
        let tag = match self {
            GcmCipher::Aes128(c) => c.encrypt_in_place_detached(nonce, aad, buf),
            GcmCipher::Aes192(c) => c.encrypt_in_place_detached(nonce, aad, buf),
            GcmCipher::Aes256(c) => c.encrypt_in_place_detached(nonce, aad, buf),
        }
        .map_err(|_| Error::Fail)?;
        let mut out = [0u8; AEAD_TAG_LENGTH];
        out.copy_from_slice(&tag);
        Ok(out)
    }

    fn decrypt_detached(&self, iv: &[u8], aad: &[u8], buf: &mut [u8], tag: &[u8]) -> Result<()> {
        let nonce = GenericArray::from_slice(iv);
        let tag = GenericArray::from_slice(tag);
        match self {
            GcmCipher::Aes128(c) => c.decrypt_in_place_detached(nonce, aad, buf, tag),
            GcmCipher::Aes192(c) => c.decrypt_in_place_detached(nonce, aad, buf, tag),
            GcmCipher::Aes256(c) => c.decrypt_in_place_detached(nonce, aad, buf, tag),
        }
        .map_err(|_| Error::InvalidSignature)
    }
}

/// Streaming AES-GCM encryption context.
///
/// Input is collected across `update` calls; the ciphertext and the 16-byte
/// authentication tag are produced by `finalize`. Associated data must be
/// supplied before the first `update`.
#[derive(Debug)]
pub struct AeadEncrypter {
    cipher: GcmCipher,
    iv: Zeroizing<[u8; AEAD_IV_LENGTH]>,
    aad: Vec<u8>,
    buffer: Zeroizing<Vec<u8>>,
}

impl AeadEncrypter {
    pub fn new(alg_id: u32, key: &[u8], iv: &[u8]) -> Result<AeadEncrypter> {
        if iv.len() != AEAD_IV_LENGTH {
            return Err(Error::InvalidParameter);
        }
        let cipher = GcmCipher::new(alg_id, key)?;
        let mut iv_copy = Zeroizing::new([0u8; AEAD_IV_LENGTH]);
        iv_copy.copy_from_slice(iv);
        Ok(AeadEncrypter {
            cipher,
            iv: iv_copy,
            aad: Vec::new(),
            buffer: Zeroizing::new(Vec::new()),
        })
    }

    pub fn set_aad(&mut self, aad: &[u8]) -> Result<()> {
        if !self.buffer.is_empty() {
            return Err(Error::InvalidParameter);
        }
        self.aad.extend_from_slice(aad);
        Ok(())
    }

    pub fn update(&mut self, message: &[u8]) {
        self.buffer.extend_from_slice(message);
    }

    pub fn finalize(self) -> Result<(Vec<u8>, [u8; AEAD_TAG_LENGTH])> {
        let mut buf = self.buffer.to_vec();
        let tag = self
            .cipher
            .encrypt_detached(self.iv.as_ref(), &self.aad, &mut buf)?;
        Ok((buf, tag))
    }
}

/// Streaming AES-GCM decryption context.
///
/// The tag is verified in `finalize`; no plaintext is released on mismatch.
pub struct AeadDecrypter {
    cipher: GcmCipher,
    iv: Zeroizing<[u8; AEAD_IV_LENGTH]>,
    aad: Vec<u8>,
    buffer: Zeroizing<Vec<u8>>,
}

impl AeadDecrypter {
    pub fn new(alg_id: u32, key: &[u8], iv: &[u8]) -> Result<AeadDecrypter> {
        if iv.len() != AEAD_IV_LENGTH {
            return Err(Error::InvalidParameter);
        }
        let cipher = GcmCipher::new(alg_id, key)?;
        let mut iv_copy = Zeroizing::new([0u8; AEAD_IV_LENGTH]);
        iv_copy.copy_from_slice(iv);
        Ok(AeadDecrypter {
            cipher,
            iv: iv_copy,
            aad: Vec::new(),
            buffer: Zeroizing::new(Vec::new()),
        })
    }

    pub fn set_aad(&mut self, aad: &[u8]) -> Result<()> {
        if !self.buffer.is_empty() {
            return Err(Error::InvalidParameter);
        }
        self.aad.extend_from_slice(aad);
        Ok(())
    }

    pub fn update(&mut self, ciphertext: &[u8]) {
        self.buffer.extend_from_slice(ciphertext);
    }

    pub fn finalize(self, tag: &[u8]) -> Result<Vec<u8>> {
        if tag.len() != AEAD_TAG_LENGTH {
            return Err(Error::InvalidSignature);
        }
        let mut buf = self.buffer.to_vec();
        self.cipher
            .decrypt_detached(self.iv.as_ref(), &self.aad, &mut buf, tag)?;
        Ok(buf)
    }
}

enum CtrCipher {
    Aes128(Box<Aes128CtrBE>),
    Aes192(Box<Aes192CtrBE>),
    Aes256(Box<Aes256CtrBE>),
}

impl std::fmt::Debug for CtrCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CtrCipher::Aes128(_) => f.write_str("CtrCipher::Aes128"),
            CtrCipher::Aes192(_) => f.write_str("CtrCipher::Aes192"),
            CtrCipher::Aes256(_) => f.write_str("CtrCipher::Aes256"),
        }
    }
}

/// Unauthenticated AES-CTR context, same direction for encrypt and decrypt.
///
/// Unlike the AEAD contexts this one streams for real: every `update` call
/// returns its output immediately and `finalize` has nothing left to flush.
#[derive(Debug)]
pub struct SymContext {
    cipher: CtrCipher,
}

impl SymContext {
    pub fn new(alg_id: u32, key: &[u8], iv: &[u8]) -> Result<SymContext> {
        check_sym_alg(alg::SYM_AES_CTR, alg_id, key)?;
        if iv.len() != CTR_IV_LENGTH {
            return Err(Error::InvalidParameter);
        }
        let iv = GenericArray::from_slice(iv);
        let cipher = match key.len() {
            16 => CtrCipher::Aes128(Box::new(Aes128CtrBE::new(GenericArray::from_slice(key), iv))),
            24 => CtrCipher::Aes192(Box::new(Aes192CtrBE::new(GenericArray::from_slice(key), iv))),
            _ => CtrCipher::Aes256(Box::new(Aes256CtrBE::new(GenericArray::from_slice(key), iv))),
        };
        Ok(SymContext { cipher })
    }

    pub fn update(&mut self, input: &[u8]) -> Vec<u8> {
        let mut out = input.to_vec();
        match &mut self.cipher {
            CtrCipher::Aes128(c) => c.apply_keystream(&mut out),
            CtrCipher::Aes192(c) => c.apply_keystream(&mut out),
            CtrCipher::Aes256(c) => c.apply_keystream(&mut out),
        }
        out
    }

    pub fn finalize(self) -> Vec<u8> {
        Vec::new()
    }
}
