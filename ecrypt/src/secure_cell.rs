#[cfg(test)]
mod secure_cell_test;

use ecconnect::alg;
use ecconnect::kdf::kdf;
use ecconnect::rand::gen_random_bytes;
use ecconnect::sym::{
    AeadDecrypter, AeadEncrypter, SymContext, AEAD_IV_LENGTH, AEAD_TAG_LENGTH, CTR_IV_LENGTH,
};
use zeroize::Zeroizing;

use crate::auth_token::AuthToken;
use crate::error::{Error, Result};

const SYM_KDF_KEY_LABEL: &str = "Ecrypt secure cell message key";
const SYM_KDF_IV_LABEL: &str = "Ecrypt secure cell message iv";

fn kdf_context(message_length: u32) -> [u8; 4] {
    message_length.to_le_bytes()
}

/// The 0.9.6 line incorrectly used a 64-bit message length here.
#[cfg(feature = "compat")]
fn kdf_context_compat(message_length: u32) -> [u8; 8] {
    u64::from(message_length).to_le_bytes()
}

fn derive_cell_key(
    master_key: &[u8],
    alg_id: u32,
    kdf_ctx: &[u8],
    user_context: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    let key_length = alg::key_bytes(alg_id).ok_or(Error::Fail)?;
    // The master key API only works with the built-in KDF.
    if alg::kdf(alg_id) != alg::SYM_NOKDF {
        return Err(Error::Fail);
    }
    Ok(kdf(master_key, SYM_KDF_KEY_LABEL, &[kdf_ctx, user_context], key_length)?)
}

fn check_master_key(master_key: &[u8]) -> Result<()> {
    if master_key.is_empty() {
        return Err(Error::InvalidParameter);
    }
    Ok(())
}

fn message_length_u32(message: &[u8]) -> Result<u32> {
    if message.is_empty() {
        return Err(Error::InvalidParameter);
    }
    u32::try_from(message.len()).map_err(|_| Error::InvalidParameter)
}

fn encrypt_auth_sym_message(
    master_key: &[u8],
    message: &[u8],
    user_context: &[u8],
) -> Result<(AuthToken, Vec<u8>)> {
    let message_length = message_length_u32(message)?;
    let alg_id = alg::AUTH_SYM_ALG;

    let derived_key = derive_cell_key(master_key, alg_id, &kdf_context(message_length), user_context)?;

    let mut iv = Zeroizing::new([0u8; AEAD_IV_LENGTH]);
    gen_random_bytes(iv.as_mut())?;

    let mut encrypter = AeadEncrypter::new(alg_id, &derived_key, iv.as_ref())?;
    encrypter.set_aad(user_context)?;
    encrypter.update(message);
    let (encrypted_message, auth_tag) = encrypter.finalize()?;

    let token = AuthToken {
        alg: alg_id,
        iv: iv.to_vec(),
        auth_tag: auth_tag.to_vec(),
        message_length,
    };
    Ok((token, encrypted_message))
}

fn decrypt_auth_sym_with_context(
    master_key: &[u8],
    token: &AuthToken,
    encrypted_message: &[u8],
    user_context: &[u8],
    kdf_ctx: &[u8],
) -> Result<Vec<u8>> {
    let derived_key = derive_cell_key(master_key, token.alg, kdf_ctx, user_context)?;
    let mut decrypter = AeadDecrypter::new(token.alg, &derived_key, &token.iv)?;
    decrypter.set_aad(user_context)?;
    decrypter.update(encrypted_message);
    Ok(decrypter.finalize(&token.auth_tag)?)
}

fn decrypt_auth_sym_message(
    master_key: &[u8],
    token: &AuthToken,
    encrypted_message: &[u8],
    user_context: &[u8],
) -> Result<Vec<u8>> {
    // The message header must be consistent with what we were handed.
    if token.message_length as usize != encrypted_message.len() {
        return Err(Error::Fail);
    }
    if !alg::reserved_bits_valid(token.alg) {
        return Err(Error::Fail);
    }
    // Every bit of the descriptor is significant: unknown ciphers, stray
    // padding or KDF flags and unknown key sizes all invalidate the token.
    if alg::cipher(token.alg) != alg::SYM_AES_GCM
        || alg::kdf(token.alg) != alg::SYM_NOKDF
        || token.alg & alg::SYM_PADDING_MASK != 0
        || alg::key_bytes(token.alg).is_none()
    {
        return Err(Error::Fail);
    }
    if token.iv.len() != AEAD_IV_LENGTH || token.auth_tag.len() != AEAD_TAG_LENGTH {
        return Err(Error::Fail);
    }

    let result = decrypt_auth_sym_with_context(
        master_key,
        token,
        encrypted_message,
        user_context,
        &kdf_context(token.message_length),
    );

    // Blobs from the 0.9.6 line were keyed with a different KDF context.
    // If decryption fails, maybe this is one of them. Try it out.
    #[cfg(feature = "compat")]
    let result = match result {
        Err(ref e) if !matches!(e, Error::BufferTooSmall { .. }) => decrypt_auth_sym_with_context(
            master_key,
            token,
            encrypted_message,
            user_context,
            &kdf_context_compat(token.message_length),
        ),
        other => other,
    };

    let message = result?;
    if message.len() != encrypted_message.len() {
        return Err(Error::Fail);
    }
    Ok(message)
}

/// Secure Cell in Seal mode: the auth token and the ciphertext travel as a
/// single opaque blob.
#[derive(Debug)]
pub struct SecureCellSeal {
    master_key: Zeroizing<Vec<u8>>,
}

impl SecureCellSeal {
    pub fn new(master_key: &[u8]) -> Result<SecureCellSeal> {
        check_master_key(master_key)?;
        Ok(SecureCellSeal {
            master_key: Zeroizing::new(master_key.to_vec()),
        })
    }

    /// Encrypts `message`, producing `auth token || ciphertext`.
    ///
    /// The optional `user_context` is mixed into the derived key and
    /// authenticated as associated data; it is not stored in the output and
    /// must be presented again on decryption.
    pub fn encrypt(&self, message: &[u8], user_context: &[u8]) -> Result<Vec<u8>> {
        let (token, encrypted_message) =
            encrypt_auth_sym_message(&self.master_key, message, user_context)?;
        let mut output = token.serialize();
        output.extend_from_slice(&encrypted_message);
        Ok(output)
    }

    pub fn decrypt(&self, sealed: &[u8], user_context: &[u8]) -> Result<Vec<u8>> {
        if sealed.is_empty() {
            return Err(Error::InvalidParameter);
        }
        let (token, token_size) = AuthToken::parse_prefix(sealed)?;
        decrypt_auth_sym_message(
            &self.master_key,
            &token,
            &sealed[token_size..],
            user_context,
        )
    }
}

/// Secure Cell in Token Protect mode: same cryptography as Seal, but the
/// auth token is returned separately so callers can store metadata apart
/// from the payload.
pub struct SecureCellTokenProtect {
    master_key: Zeroizing<Vec<u8>>,
}

impl SecureCellTokenProtect {
    pub fn new(master_key: &[u8]) -> Result<SecureCellTokenProtect> {
        check_master_key(master_key)?;
        Ok(SecureCellTokenProtect {
            master_key: Zeroizing::new(master_key.to_vec()),
        })
    }

    /// Encrypts `message`, returning `(auth_token, ciphertext)`. The
    /// ciphertext is exactly as long as the message.
    pub fn encrypt(&self, message: &[u8], user_context: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
        let (token, encrypted_message) =
            encrypt_auth_sym_message(&self.master_key, message, user_context)?;
        Ok((token.serialize(), encrypted_message))
    }

    pub fn decrypt(
        &self,
        auth_token: &[u8],
        encrypted_message: &[u8],
        user_context: &[u8],
    ) -> Result<Vec<u8>> {
        let token = AuthToken::parse(auth_token)?;
        decrypt_auth_sym_message(&self.master_key, &token, encrypted_message, user_context)
    }
}

/// Secure Cell in Context Imprint mode: deterministic, unauthenticated.
///
/// Both the key and the IV are derived from the context, so identical
/// `(key, message, context)` triples always produce identical output. There
/// is no tag to verify, which is the price of determinism: decryption with a
/// wrong key or context silently yields garbage.
pub struct SecureCellContextImprint {
    master_key: Zeroizing<Vec<u8>>,
}

impl SecureCellContextImprint {
    pub fn new(master_key: &[u8]) -> Result<SecureCellContextImprint> {
        check_master_key(master_key)?;
        Ok(SecureCellContextImprint {
            master_key: Zeroizing::new(master_key.to_vec()),
        })
    }

    pub fn encrypt(&self, message: &[u8], context: &[u8]) -> Result<Vec<u8>> {
        let message_length = message_length_u32(message)?;
        if context.is_empty() {
            return Err(Error::InvalidParameter);
        }
        let derived_key = kdf(
            &self.master_key,
            SYM_KDF_KEY_LABEL,
            &[&kdf_context(message_length)],
            alg::key_bytes(alg::SYM_ALG).ok_or(Error::Fail)?,
        )?;
        let iv = kdf(&derived_key, SYM_KDF_IV_LABEL, &[context], CTR_IV_LENGTH)?;

        let mut cipher = SymContext::new(alg::SYM_ALG, &derived_key, &iv)?;
        let mut output = cipher.update(message);
        output.extend_from_slice(&cipher.finalize());
        Ok(output)
    }

    pub fn decrypt(&self, encrypted_message: &[u8], context: &[u8]) -> Result<Vec<u8>> {
        let message_length = message_length_u32(encrypted_message)?;
        if context.is_empty() {
            return Err(Error::InvalidParameter);
        }
        let derived_key = kdf(
            &self.master_key,
            SYM_KDF_KEY_LABEL,
            &[&kdf_context(message_length)],
            alg::key_bytes(alg::SYM_ALG).ok_or(Error::Fail)?,
        )?;
        let iv = kdf(&derived_key, SYM_KDF_IV_LABEL, &[context], CTR_IV_LENGTH)?;

        let mut cipher = SymContext::new(alg::SYM_ALG, &derived_key, &iv)?;
        let mut output = cipher.update(encrypted_message);
        output.extend_from_slice(&cipher.finalize());
        Ok(output)
    }
}
