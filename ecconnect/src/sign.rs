
use rand::rngs::OsRng;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::traits::PublicKeyParts;
use rsa::{pss, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use signature::{RandomizedSigner, SignatureEncoding, Signer, Verifier};
use zeroize::Zeroizing;

use crate::error::{Error, Result};
use crate::key::{ec_private_scalar, parse_key_container, EcCurve, KeyKind};

pub const ED25519_KEY_LENGTH: usize = 32;
pub const ED25519_SIGNATURE_LENGTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignAlg {
    RsaPssSha256,
    EcdsaNistP256Sha256,
    EcdsaNistP384Sha384,
    Ed25519,
}

/// Infers the signature algorithm from the kind of key material supplied.
pub fn sign_alg_for_key(kind: KeyKind) -> Result<SignAlg> {
    match kind {
        KeyKind::RsaPrivate | KeyKind::RsaPublic => Ok(SignAlg::RsaPssSha256),
        KeyKind::EcPrivate(EcCurve::P256) | KeyKind::EcPublic(EcCurve::P256) => {
            Ok(SignAlg::EcdsaNistP256Sha256)
        }
        KeyKind::EcPrivate(EcCurve::P384) | KeyKind::EcPublic(EcCurve::P384) => {
            Ok(SignAlg::EcdsaNistP384Sha384)
        }
        KeyKind::EcPrivate(EcCurve::P521) | KeyKind::EcPublic(EcCurve::P521) => {
            Err(Error::NotSupported)
        }
    }
}

enum SignerKind {
    RsaPss(Box<RsaPrivateKey>),
    EcdsaP256(Box<p256::ecdsa::SigningKey>),
    EcdsaP384(Box<p384::ecdsa::SigningKey>),
    Ed25519(Box<ed25519_dalek::SigningKey>),
}

/// Streaming signature computation.
///
/// Data fed via `update` is signed in `finalize`. RSA-PSS and ECDSA
/// signatures are randomized; Ed25519 is deterministic.
pub struct SignContext {
    signer: SignerKind,
    buffer: Zeroizing<Vec<u8>>,
}

impl SignContext {
    /// Creates a signer from a private key container.
    pub fn from_key_container(raw: &[u8]) -> Result<SignContext> {
        let (kind, container) = parse_key_container(raw)?;
        let signer = match kind {
            KeyKind::RsaPrivate => {
                let key = RsaPrivateKey::from_pkcs1_der(container.data())
                    .map_err(|_| Error::DataCorrupt)?;
                SignerKind::RsaPss(Box::new(key))
            }
            KeyKind::EcPrivate(EcCurve::P256) => {
                let scalar = ec_private_scalar(EcCurve::P256, container.data())?;
                let key = p256::ecdsa::SigningKey::from_slice(scalar)
                    .map_err(|_| Error::DataCorrupt)?;
                SignerKind::EcdsaP256(Box::new(key))
            }
            KeyKind::EcPrivate(EcCurve::P384) => {
                let scalar = ec_private_scalar(EcCurve::P384, container.data())?;
                let key = p384::ecdsa::SigningKey::from_slice(scalar)
                    .map_err(|_| Error::DataCorrupt)?;
                SignerKind::EcdsaP384(Box::new(key))
            }
            KeyKind::EcPrivate(EcCurve::P521) => return Err(Error::NotSupported),
            KeyKind::RsaPublic | KeyKind::EcPublic(_) => return Err(Error::InvalidParameter),
        };
        Ok(SignContext {
            signer,
            buffer: Zeroizing::new(Vec::new()),
        })
    }

    /// Creates an Ed25519 signer from a raw 32-byte seed.
    pub fn ed25519(seed: &[u8]) -> Result<SignContext> {
        let seed: &[u8; ED25519_KEY_LENGTH] =
            seed.try_into().map_err(|_| Error::InvalidParameter)?;
        Ok(SignContext {
            signer: SignerKind::Ed25519(Box::new(ed25519_dalek::SigningKey::from_bytes(seed))),
            buffer: Zeroizing::new(Vec::new()),
        })
    }

    pub fn alg(&self) -> SignAlg {
        match self.signer {
            SignerKind::RsaPss(_) => SignAlg::RsaPssSha256,
            SignerKind::EcdsaP256(_) => SignAlg::EcdsaNistP256Sha256,
            SignerKind::EcdsaP384(_) => SignAlg::EcdsaNistP384Sha384,
            SignerKind::Ed25519(_) => SignAlg::Ed25519,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    pub fn finalize(self) -> Result<Vec<u8>> {
        match &self.signer {
            SignerKind::RsaPss(key) => {
                let signing_key = pss::SigningKey::<Sha256>::new(key.as_ref().clone());
                let signature = signing_key.sign_with_rng(&mut OsRng, &self.buffer);
                Ok(signature.to_bytes().to_vec())
            }
            SignerKind::EcdsaP256(key) => {
                let signature: p256::ecdsa::Signature = key.sign(&self.buffer);
                Ok(signature.to_der().as_bytes().to_vec())
            }
            SignerKind::EcdsaP384(key) => {
                let signature: p384::ecdsa::Signature = key.sign(&self.buffer);
                Ok(signature.to_der().as_bytes().to_vec())
            }
            SignerKind::Ed25519(key) => {
                let signature = key.sign(&self.buffer);
                Ok(signature.to_bytes().to_vec())
            }
        }
    }
}

enum VerifierKind {
    RsaPss(Box<RsaPublicKey>),
    EcdsaP256(Box<p256::ecdsa::VerifyingKey>),
    EcdsaP384(Box<p384::ecdsa::VerifyingKey>),
    Ed25519(Box<ed25519_dalek::VerifyingKey>),
}

/// Streaming signature verification.
///
/// `finalize` has exactly three outcomes: `Ok(())` for a valid signature,
/// `InvalidSignature` for a cryptographically wrong one, and `DataCorrupt`
/// for a signature that could not even be decoded. Everything else is a hard
/// error.
pub struct VerifyContext {
    verifier: VerifierKind,
    buffer: Vec<u8>,
}

impl VerifyContext {
    /// Creates a verifier from a key container. Private key containers are
    /// accepted too; the public half is derived.
    pub fn from_key_container(raw: &[u8]) -> Result<VerifyContext> {
        let (kind, container) = parse_key_container(raw)?;
        let verifier = match kind {
            KeyKind::RsaPublic => {
                let key = RsaPublicKey::from_pkcs1_der(container.data())
                    .map_err(|_| Error::DataCorrupt)?;
                VerifierKind::RsaPss(Box::new(key))
            }
            KeyKind::RsaPrivate => {
                let key = RsaPrivateKey::from_pkcs1_der(container.data())
                    .map_err(|_| Error::DataCorrupt)?;
                VerifierKind::RsaPss(Box::new(key.to_public_key()))
            }
            KeyKind::EcPublic(EcCurve::P256) => {
                let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(container.data())
                    .map_err(|_| Error::DataCorrupt)?;
                VerifierKind::EcdsaP256(Box::new(key))
            }
            KeyKind::EcPublic(EcCurve::P384) => {
                let key = p384::ecdsa::VerifyingKey::from_sec1_bytes(container.data())
                    .map_err(|_| Error::DataCorrupt)?;
                VerifierKind::EcdsaP384(Box::new(key))
            }
            KeyKind::EcPrivate(EcCurve::P256) => {
                let scalar = ec_private_scalar(EcCurve::P256, container.data())?;
                let key = p256::ecdsa::SigningKey::from_slice(scalar)
                    .map_err(|_| Error::DataCorrupt)?;
                VerifierKind::EcdsaP256(Box::new(key.verifying_key().to_owned()))
            }
            KeyKind::EcPrivate(EcCurve::P384) => {
                let scalar = ec_private_scalar(EcCurve::P384, container.data())?;
                let key = p384::ecdsa::SigningKey::from_slice(scalar)
                    .map_err(|_| Error::DataCorrupt)?;
                VerifierKind::EcdsaP384(Box::new(key.verifying_key().to_owned()))
            }
            KeyKind::EcPublic(EcCurve::P521) | KeyKind::EcPrivate(EcCurve::P521) => {
                return Err(Error::NotSupported)
            }
        };
        Ok(VerifyContext {
            verifier,
            buffer: Vec::new(),
        })
    }

    /// Creates an Ed25519 verifier from a raw 32-byte public key.
    pub fn ed25519(public_key: &[u8]) -> Result<VerifyContext> {
        let bytes: &[u8; ED25519_KEY_LENGTH] = public_key
            .try_into()
            .map_err(|_| Error::InvalidParameter)?;
        let key =
            ed25519_dalek::VerifyingKey::from_bytes(bytes).map_err(|_| Error::DataCorrupt)?;
        Ok(VerifyContext {
            verifier: VerifierKind::Ed25519(Box::new(key)),
            buffer: Vec::new(),
        })
    }

    pub fn update(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    pub fn finalize(self, signature: &[u8]) -> Result<()> {
        match &self.verifier {
            VerifierKind::RsaPss(key) => {
                // A PSS signature is exactly as long as the modulus.
                if signature.len() != key.size() {
                    return Err(Error::Fail);
                }
                let signature =
                    pss::Signature::try_from(signature).map_err(|_| Error::DataCorrupt)?;
                let verifying_key = pss::VerifyingKey::<Sha256>::new(key.as_ref().clone());
                verifying_key
                    .verify(&self.buffer, &signature)
                    .map_err(|_| Error::InvalidSignature)
            }
            VerifierKind::EcdsaP256(key) => {
                let signature = p256::ecdsa::Signature::from_der(signature)
                    .map_err(|_| Error::DataCorrupt)?;
                key.verify(&self.buffer, &signature)
                    .map_err(|_| Error::InvalidSignature)
            }
            VerifierKind::EcdsaP384(key) => {
                let signature = p384::ecdsa::Signature::from_der(signature)
                    .map_err(|_| Error::DataCorrupt)?;
                key.verify(&self.buffer, &signature)
                    .map_err(|_| Error::InvalidSignature)
            }
            VerifierKind::Ed25519(key) => {
                let signature = ed25519_dalek::Signature::from_slice(signature)
                    .map_err(|_| Error::DataCorrupt)?;
                key.verify(&self.buffer, &signature)
                    .map_err(|_| Error::InvalidSignature)
            }
        }
    }
}
