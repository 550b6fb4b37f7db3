//! The 16-bit CRC carried in every frame trailer.
//!
//! This is the esp-link variant: it is not CRC-16/CCITT or CRC-16/IBM and
//! must not be swapped for a table-driven library CRC. Both the request
//! builder and the inbound validator thread bytes through [`crc16_add`].

/// Fold one byte into the accumulator.
pub fn crc16_add(byte: u8, acc: u16) -> u16 {
    let mut acc = acc ^ u16::from(byte);
    acc = acc.swap_bytes();
    acc ^= (acc & 0xff00) << 4;
    acc ^= acc >> 12;
    acc ^= (acc & 0xff00) >> 5;
    acc
}

/// Fold a run of bytes into the accumulator.
pub fn crc16_data(data: &[u8], acc: u16) -> u16 {
    data.iter().fold(acc, |acc, &b| crc16_add(b, acc))
}

/// CRC of a complete byte sequence, starting from zero.
pub fn crc16(data: &[u8]) -> u16 {
    crc16_data(data, 0)
}
