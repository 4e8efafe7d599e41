use std::sync::atomic::Ordering;

use super::*;

#[test]
fn test_wipe_zeroes_buffer() {
    let mut secret = [0xa5u8; 32];
    wipe(&mut secret);
    assert_eq!(secret, [0u8; 32]);
}

#[test]
fn test_wipe_is_counted() {
    let before = WIPE_COUNT.load(Ordering::SeqCst);
    let mut secret = vec![0x42u8; 16];
    wipe(&mut secret);
    assert!(WIPE_COUNT.load(Ordering::SeqCst) > before);
}
