use super::*;
use crate::key::{parse_key_container, KeyKind};

#[test]
fn test_unsupported_sizes_rejected() {
    for bits in [0, 512, 1536, 3072, 16384] {
        assert_eq!(
            RsaKeyPairGen::new(bits).unwrap_err(),
            Error::InvalidParameter,
            "{bits} bits should be rejected"
        );
    }
}

#[test]
fn test_exported_containers_parse_back() {
    let pair = RsaKeyPairGen::new(RSA_KEY_LENGTH_1024).unwrap();

    let private = pair.export_private_key().unwrap();
    let (kind, container) = parse_key_container(&private).unwrap();
    assert_eq!(kind, KeyKind::RsaPrivate);
    assert_eq!(container.tag(), b"RRA1");

    let public = pair.export_public_key().unwrap();
    let (kind, container) = parse_key_container(&public).unwrap();
    assert_eq!(kind, KeyKind::RsaPublic);
    assert_eq!(container.tag(), b"URA1");
}
