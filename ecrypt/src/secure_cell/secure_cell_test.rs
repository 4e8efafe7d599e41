use super::*;

const MASTER_KEY: &[u8] = &[0x00u8; 32];

#[test]
fn test_seal_round_trip() {
    let cell = SecureCellSeal::new(MASTER_KEY).unwrap();
    let sealed = cell.encrypt(b"Hello, world!", &[]).unwrap();

    // 44-byte auth token followed by ciphertext of the message length.
    assert_eq!(sealed.len(), AuthToken::default_size() + 13);
    assert_eq!(AuthToken::default_size(), 44);

    let decrypted = cell.decrypt(&sealed, &[]).unwrap();
    assert_eq!(decrypted, b"Hello, world!");
}

#[test]
fn test_seal_round_trip_with_context() {
    let cell = SecureCellSeal::new(&[0x77u8; 32]).unwrap();
    let sealed = cell.encrypt(b"payload", b"user context").unwrap();
    assert_eq!(cell.decrypt(&sealed, b"user context").unwrap(), b"payload");

    // Wrong context must not decrypt.
    assert!(matches!(
        cell.decrypt(&sealed, b"other context").unwrap_err(),
        Error::InvalidSignature | Error::Fail
    ));
}

#[test]
fn test_seal_wrong_key_fails() {
    let cell = SecureCellSeal::new(MASTER_KEY).unwrap();
    let sealed = cell.encrypt(b"secret", &[]).unwrap();

    let other = SecureCellSeal::new(&[0x01u8; 32]).unwrap();
    assert!(matches!(
        other.decrypt(&sealed, &[]).unwrap_err(),
        Error::InvalidSignature | Error::Fail
    ));
}

#[test]
fn test_seal_detects_any_bit_flip() {
    let cell = SecureCellSeal::new(MASTER_KEY).unwrap();
    let sealed = cell.encrypt(b"Hello, world!", &[]).unwrap();

    for i in 0..sealed.len() {
        let mut tampered = sealed.clone();
        tampered[i] ^= 0x01;
        assert!(
            matches!(
                cell.decrypt(&tampered, &[]),
                Err(Error::InvalidSignature) | Err(Error::Fail) | Err(Error::DataCorrupt)
            ),
            "bit flip at byte {i} went undetected"
        );
    }
}

#[test]
fn test_seal_tampered_auth_tag() {
    let cell = SecureCellSeal::new(MASTER_KEY).unwrap();
    let mut sealed = cell.encrypt(b"Hello, world!", &[]).unwrap();
    // Flip bit 0 of the auth tag (offsets 24..40 within the token).
    sealed[24] ^= 0x01;
    assert!(matches!(
        cell.decrypt(&sealed, &[]).unwrap_err(),
        Error::InvalidSignature | Error::Fail
    ));
}

#[test]
fn test_seal_rejects_empty_inputs() {
    assert_eq!(SecureCellSeal::new(&[]).unwrap_err(), Error::InvalidParameter);
    let cell = SecureCellSeal::new(MASTER_KEY).unwrap();
    assert_eq!(cell.encrypt(&[], &[]).unwrap_err(), Error::InvalidParameter);
    assert_eq!(cell.decrypt(&[], &[]).unwrap_err(), Error::InvalidParameter);
}

#[test]
fn test_token_protect_round_trip() {
    let cell = SecureCellTokenProtect::new(MASTER_KEY).unwrap();
    let (token, ciphertext) = cell.encrypt(b"detached token", b"ctx").unwrap();

    assert_eq!(token.len(), AuthToken::default_size());
    assert_eq!(ciphertext.len(), b"detached token".len());

    let decrypted = cell.decrypt(&token, &ciphertext, b"ctx").unwrap();
    assert_eq!(decrypted, b"detached token");
}

#[test]
fn test_token_protect_message_length_mismatch() {
    let cell = SecureCellTokenProtect::new(MASTER_KEY).unwrap();
    let (token, ciphertext) = cell.encrypt(b"detached token", &[]).unwrap();

    // The header length must match the ciphertext we hand in.
    assert_eq!(
        cell.decrypt(&token, &ciphertext[..ciphertext.len() - 1], &[])
            .unwrap_err(),
        Error::Fail
    );
}

#[test]
fn test_token_protect_rejects_reserved_alg_bits() {
    let cell = SecureCellTokenProtect::new(MASTER_KEY).unwrap();
    let (token, ciphertext) = cell.encrypt(b"message", &[]).unwrap();

    let mut parsed = AuthToken::parse(&token).unwrap();
    parsed.alg |= 0x0000_1000;
    assert_eq!(
        cell.decrypt(&parsed.serialize(), &ciphertext, &[]).unwrap_err(),
        Error::Fail
    );
}

#[test]
fn test_context_imprint_is_deterministic() {
    let cell = SecureCellContextImprint::new(&[0x01u8; 32]).unwrap();
    let first = cell.encrypt(b"ABCDE", b"ctx").unwrap();
    let second = cell.encrypt(b"ABCDE", b"ctx").unwrap();

    assert_eq!(first, second);
    assert_eq!(first.len(), 5);
    assert_eq!(cell.decrypt(&first, b"ctx").unwrap(), b"ABCDE");
}

#[test]
fn test_context_imprint_context_changes_output() {
    let cell = SecureCellContextImprint::new(&[0x01u8; 32]).unwrap();
    let one = cell.encrypt(b"ABCDE", b"ctx1").unwrap();
    let two = cell.encrypt(b"ABCDE", b"ctx2").unwrap();
    assert_ne!(one, two);
}

#[test]
fn test_context_imprint_requires_context() {
    let cell = SecureCellContextImprint::new(&[0x01u8; 32]).unwrap();
    assert_eq!(
        cell.encrypt(b"ABCDE", &[]).unwrap_err(),
        Error::InvalidParameter
    );
    assert_eq!(
        cell.decrypt(b"ABCDE", &[]).unwrap_err(),
        Error::InvalidParameter
    );
}

#[cfg(feature = "compat")]
mod compat {
    use super::*;
    use ecconnect::alg;
    use ecconnect::kdf::kdf;
    use ecconnect::sym::AeadEncrypter;

    // Builds a Seal blob the way the 0.9.6 line did: the key derivation
    // context carries the message length as a 64-bit value.
    fn seal_with_u64_length_context(master_key: &[u8], message: &[u8]) -> Vec<u8> {
        let message_length = message.len() as u32;
        let kdf_ctx = u64::from(message_length).to_le_bytes();
        let derived_key = kdf(
            master_key,
            "Ecrypt secure cell message key",
            &[&kdf_ctx],
            32,
        )
        .unwrap();

        let iv = [0x0Fu8; 12];
        let mut encrypter = AeadEncrypter::new(alg::AUTH_SYM_ALG, &derived_key, &iv).unwrap();
        encrypter.update(message);
        let (ciphertext, tag) = encrypter.finalize().unwrap();

        let token = AuthToken {
            alg: alg::AUTH_SYM_ALG,
            iv: iv.to_vec(),
            auth_tag: tag.to_vec(),
            message_length,
        };
        let mut out = token.serialize();
        out.extend_from_slice(&ciphertext);
        out
    }

    #[test]
    fn test_legacy_blob_decrypts_via_retry() {
        let legacy = seal_with_u64_length_context(MASTER_KEY, b"legacy data");
        let cell = SecureCellSeal::new(MASTER_KEY).unwrap();
        assert_eq!(cell.decrypt(&legacy, &[]).unwrap(), b"legacy data");
    }
}
