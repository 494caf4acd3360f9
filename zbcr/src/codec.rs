//! Big-endian field access for CDBs and data-in buffers.
//!
//! SCSI lays every multi-byte field out most significant byte first. These helpers
//! never look at host byte order, so nothing else in the crate has to.

/// Widest field the accumulator can hold.
pub const MAX_FIELD_WIDTH: usize = 8;

/// Writes the low `width` bytes of `value` to the start of `destination`, MSB first.
///
/// Bits of `value` above `width` bytes are dropped.
pub fn put_be(destination: &mut [u8], value: u64, width: usize) {
    assert!(
        width <= MAX_FIELD_WIDTH,
        "field width {} exceeds {}",
        width,
        MAX_FIELD_WIDTH
    );

    let bytes = value.to_be_bytes();
    destination[..width].copy_from_slice(&bytes[MAX_FIELD_WIDTH - width..]);
}

/// Reads a `width` byte MSB-first field from the start of `source`, zero-extended.
pub fn get_be(source: &[u8], width: usize) -> u64 {
    assert!(
        width <= MAX_FIELD_WIDTH,
        "field width {} exceeds {}",
        width,
        MAX_FIELD_WIDTH
    );

    let mut bytes = [0u8; MAX_FIELD_WIDTH];
    bytes[MAX_FIELD_WIDTH - width..].copy_from_slice(&source[..width]);

    u64::from_be_bytes(bytes)
}
