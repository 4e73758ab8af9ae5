// Copyright 2026 the Layout Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Little-endian tag-field codec.
//!
//! Enum discriminators live inside payloads as 1/2/4/8-byte little-endian
//! fields, and as the narrower "enum element" encoding used for
//! extra-inhabitant case indices (at most 4 bytes wide).

/// Reads a `count`-byte little-endian tag field from the start of `bytes`.
///
/// `count` must be 1, 2, 4, or 8; anything else is a fatal fault.
#[must_use]
pub fn read_tag_bytes(bytes: &[u8], count: usize) -> u64 {
    match count {
        1 => u64::from(bytes[0]),
        2 => u64::from(u16::from_le_bytes([bytes[0], bytes[1]])),
        4 => u64::from(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
        8 => u64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]),
        _ => panic!("unsupported tag byte count"),
    }
}

/// Stores `value` as a `count`-byte little-endian tag field at the start of
/// `bytes`.
///
/// `count` must be 1, 2, 4, or 8; anything else is a fatal fault.
pub fn store_tag_bytes(bytes: &mut [u8], value: u64, count: usize) {
    match count {
        1 => bytes[0] = value as u8,
        2 => bytes[..2].copy_from_slice(&(value as u16).to_le_bytes()),
        4 => bytes[..4].copy_from_slice(&(value as u32).to_le_bytes()),
        8 => bytes[..8].copy_from_slice(&value.to_le_bytes()),
        _ => panic!("unsupported tag byte count"),
    }
}

/// Loads an extra-inhabitant case index from a `size`-byte payload.
///
/// Payloads of 4 bytes and wider are read through their low 4 bytes; a
/// zero-sized payload reads as 0.
#[must_use]
pub fn load_enum_element(bytes: &[u8], size: usize) -> u32 {
    let width = size.min(4);
    let mut buf = [0u8; 4];
    buf[..width].copy_from_slice(&bytes[..width]);
    u32::from_le_bytes(buf)
}

/// Stores an extra-inhabitant case index into a `size`-byte payload.
///
/// The inverse of [`load_enum_element`]: at most the low 4 bytes are written,
/// and a zero-sized payload is left untouched.
pub fn store_enum_element(bytes: &mut [u8], value: u64, size: usize) {
    let width = size.min(4);
    bytes[..width].copy_from_slice(&(value as u32).to_le_bytes()[..width]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_bytes_round_trip_all_widths() {
        let mut buf = [0u8; 8];
        for &(value, count) in &[(0xAAu64, 1usize), (0xBBCC, 2), (0x1122_3344, 4), (u64::MAX, 8)] {
            store_tag_bytes(&mut buf, value, count);
            assert_eq!(read_tag_bytes(&buf, count), value);
        }
    }

    #[test]
    fn tag_bytes_truncate_to_field_width() {
        let mut buf = [0u8; 8];
        store_tag_bytes(&mut buf, 0x0102_0304_0506_0708, 2);
        assert_eq!(read_tag_bytes(&buf, 2), 0x0708);
    }

    #[test]
    #[should_panic(expected = "unsupported tag byte count")]
    fn read_faults_on_unsupported_width() {
        let buf = [0u8; 8];
        let _ = read_tag_bytes(&buf, 3);
    }

    #[test]
    fn enum_element_caps_at_four_bytes() {
        let mut buf = [0xFFu8; 8];
        store_enum_element(&mut buf, 0x0102_0304, 8);
        assert_eq!(load_enum_element(&buf, 8), 0x0102_0304);
        // The high half is not part of the element encoding.
        assert_eq!(&buf[4..], &[0xFF; 4]);
    }

    #[test]
    fn enum_element_narrow_payloads() {
        let mut buf = [0u8; 4];
        store_enum_element(&mut buf, 0x55, 1);
        assert_eq!(load_enum_element(&buf, 1), 0x55);
        store_enum_element(&mut buf, 0x1234, 2);
        assert_eq!(load_enum_element(&buf, 2), 0x1234);
        assert_eq!(load_enum_element(&buf, 0), 0);
    }
}
