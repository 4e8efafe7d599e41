use super::*;

#[test]
fn test_check_value() {
    // The standard CRC-32C check vector.
    assert_eq!(crc32c(b"123456789"), 0xE306_9283);
}

#[test]
fn test_empty_input() {
    assert_eq!(crc32c(b""), 0);
}

#[test]
fn test_incremental_matches_one_shot() {
    let data = b"The quick brown fox jumps over the lazy dog";
    let mut crc = Crc32::new();
    for chunk in data.chunks(7) {
        crc.update(chunk);
    }
    assert_eq!(crc.finalize(), crc32c(data));
}

#[test]
fn test_bit_flip_changes_crc() {
    let mut data = b"123456789".to_vec();
    let reference = crc32c(&data);
    data[4] ^= 0x01;
    assert_ne!(crc32c(&data), reference);
}
