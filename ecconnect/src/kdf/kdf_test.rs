use super::*;

const MASTER_KEY: &[u8] = &[0x42u8; 32];

#[test]
fn test_kdf_is_deterministic() {
    let a = kdf(MASTER_KEY, "test label", &[b"ctx"], 32).unwrap();
    let b = kdf(MASTER_KEY, "test label", &[b"ctx"], 32).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_kdf_exact_output_length() {
    for len in [1, 16, 31, 32, 33, 48, 64, 100] {
        let out = kdf(MASTER_KEY, "length", &[], len).unwrap();
        assert_eq!(out.len(), len);
    }
}

#[test]
fn test_kdf_long_output_extends_prefix() {
    let short = kdf(MASTER_KEY, "prefix", &[b"a"], 32).unwrap();
    let long = kdf(MASTER_KEY, "prefix", &[b"a"], 64).unwrap();
    assert_eq!(&long[..32], &short[..]);
    assert_ne!(&long[32..], &long[..32]);
}

#[test]
fn test_kdf_binds_label_and_contexts() {
    let base = kdf(MASTER_KEY, "label", &[b"one", b"two"], 32).unwrap();

    let other_label = kdf(MASTER_KEY, "label2", &[b"one", b"two"], 32).unwrap();
    assert_ne!(base, other_label);

    let other_context = kdf(MASTER_KEY, "label", &[b"one", b"2wo"], 32).unwrap();
    assert_ne!(base, other_context);

    let other_key = kdf(&[0x43u8; 32], "label", &[b"one", b"two"], 32).unwrap();
    assert_ne!(base, other_key);
}

#[test]
fn test_kdf_skips_empty_contexts() {
    let with_empty = kdf(MASTER_KEY, "label", &[b"ctx", b""], 32).unwrap();
    let without = kdf(MASTER_KEY, "label", &[b"ctx"], 32).unwrap();
    assert_eq!(with_empty, without);
}

#[test]
fn test_kdf_rejects_bad_parameters() {
    assert_eq!(
        kdf(&[], "label", &[], 32).unwrap_err(),
        Error::InvalidParameter
    );
    assert_eq!(
        kdf(MASTER_KEY, "", &[], 32).unwrap_err(),
        Error::InvalidParameter
    );
    assert_eq!(
        kdf(MASTER_KEY, "label", &[], 0).unwrap_err(),
        Error::InvalidParameter
    );
}

#[test]
fn test_pbkdf2_sha256_rfc_vector() {
    // PBKDF2-HMAC-SHA-256 ("passwd", "salt", c = 1), RFC 7914 section 11.
    let mut key = [0u8; 64];
    pbkdf2_sha256(b"passwd", b"salt", 1, &mut key).unwrap();
    assert_eq!(
        hex::encode(key),
        "55ac046e56e3089fec1691c22544b605f94185216dde0465e68b9d57c20dacbc\
         49ca9cccf179b645991664b39d77ef317c71b845b1e30bd509112041d3a19783"
    );
}

#[test]
fn test_pbkdf2_rejects_zero_iterations() {
    let mut key = [0u8; 32];
    assert_eq!(
        pbkdf2_sha256(b"passwd", b"salt", 0, &mut key).unwrap_err(),
        Error::InvalidParameter
    );
}
