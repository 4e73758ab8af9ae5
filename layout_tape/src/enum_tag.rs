// Copyright 2026 the Layout Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Standalone discriminator access for top-level enums.
//!
//! These entry points read or write the tag of an enum value whose layout
//! string *is* the enum descriptor (one enum entry followed by its payload
//! sub-program), without running any destroy or copy engine. Tag 0 is always
//! the payload case; empty cases count up from 1 in the single-payload
//! dialects, while multi-payload tags number the payload cases first.
//!
//! Injection is destructive: it overwrites discriminator bits in place and
//! assumes the previous case, if it held references, has already been
//! destroyed.

use crate::format::{LAYOUT_STRING_HEADER_SIZE, LayoutReader};
use crate::heap::WORD_SIZE;
use crate::metadata::{FnKey, TypeId, TypeTable, decode_type_ref};
use crate::tag::{load_enum_element, read_tag_bytes, store_enum_element};

fn entries<'t>(table: &'t TypeTable, ty: TypeId) -> &'t [u8] {
    match table.layout(ty) {
        Some(layout) => &layout[LAYOUT_STRING_HEADER_SIZE..],
        None => panic!("type has no layout string"),
    }
}

/// Returns a reader positioned on the top-level enum's descriptor, just past
/// its entry word.
fn descriptor_reader<'t>(table: &'t TypeTable, ty: TypeId) -> LayoutReader<'t> {
    LayoutReader::with_offset(entries(table, ty), WORD_SIZE)
}

/// Returns the tag of a single-case enum. There is only the payload case.
#[must_use]
pub fn singleton_enum_get_enum_tag(_table: &TypeTable, _ty: TypeId, _value: &[u8]) -> u32 {
    0
}

/// Injects the tag of a single-case enum. The payload is untouched.
pub fn singleton_enum_destructive_inject_enum_tag(
    _table: &TypeTable,
    _ty: TypeId,
    _value: &mut [u8],
    _tag: u32,
) {
}

/// Returns the active tag of a simple single-payload enum.
#[must_use]
pub fn enum_simple_get_enum_tag(table: &TypeTable, ty: TypeId, value: &[u8]) -> u32 {
    let mut reader = descriptor_reader(table, ty);
    let packed = reader.read_u64();
    let payload_size = reader.read_u64() as usize;
    let zero_tag = reader.read_u64();
    let payload_num_xi = reader.read_u64();
    let extra_tag_pattern = (packed >> 62) as u8;
    let xi_pattern = ((packed >> 59) & 0x7) as u8;
    let xi_offset = (packed & u64::from(u32::MAX)) as usize;

    if extra_tag_pattern != 0 {
        let num_extra_tag_bytes = 1usize << (extra_tag_pattern - 1);
        let tag_bytes = read_tag_bytes(&value[payload_size..], num_extra_tag_bytes);
        if tag_bytes != 0 {
            let case_from_extra_tag = if payload_size >= 4 {
                0
            } else {
                ((tag_bytes as u32) - 1) << (payload_size * 8)
            };
            let case_from_value = load_enum_element(value, payload_size);
            return (case_from_extra_tag | case_from_value) + payload_num_xi as u32 + 1;
        }
    }

    if xi_pattern != 0 {
        let width = 1usize << (xi_pattern - 1);
        let tag = read_tag_bytes(&value[xi_offset..], width).wrapping_sub(zero_tag);
        if tag < payload_num_xi {
            return tag as u32 + 1;
        }
    }

    0
}

/// Writes the discriminator of a simple single-payload enum.
pub fn enum_simple_destructive_inject_enum_tag(
    table: &TypeTable,
    ty: TypeId,
    value: &mut [u8],
    tag: u32,
) {
    let mut reader = descriptor_reader(table, ty);
    let packed = reader.read_u64();
    let payload_size = reader.read_u64() as usize;
    let zero_tag = reader.read_u64();
    let payload_num_xi = reader.read_u64();
    let extra_tag_pattern = (packed >> 62) as u8;
    let xi_pattern = ((packed >> 59) & 0x7) as u8;
    let xi_offset = (packed & u64::from(u32::MAX)) as usize;

    if extra_tag_pattern != 0 && u64::from(tag) > payload_num_xi {
        let num_extra_tag_bytes = 1usize << (extra_tag_pattern - 1);
        let case_index = tag - 1 - payload_num_xi as u32;
        let (extra_tag_index, payload_index) = split_empty_case_index(case_index, payload_size);
        if payload_size > 0 {
            store_enum_element(value, u64::from(payload_index), payload_size);
        }
        store_enum_element(
            &mut value[payload_size..],
            u64::from(extra_tag_index),
            num_extra_tag_bytes,
        );
        return;
    }

    if xi_pattern != 0 && u64::from(tag) <= payload_num_xi {
        if extra_tag_pattern != 0 {
            let num_extra_tag_bytes = 1usize << (extra_tag_pattern - 1);
            store_enum_element(&mut value[payload_size..], 0, num_extra_tag_bytes);
        }
        if tag == 0 {
            return;
        }
        let width = 1usize << (xi_pattern - 1);
        store_enum_element(&mut value[xi_offset..], u64::from(tag - 1) + zero_tag, width);
    }
}

/// Returns the active tag of an enum discriminated by a tag function.
#[must_use]
pub fn enum_fn_get_enum_tag(table: &TypeTable, ty: TypeId, value: &[u8]) -> u32 {
    let mut reader = descriptor_reader(table, ty);
    let key = FnKey(reader.read_relative_reference());
    (table.enum_tag_fn(key))(value)
}

/// Returns the active tag of a generic single-payload enum.
#[must_use]
pub fn single_payload_enum_generic_get_enum_tag(
    table: &TypeTable,
    ty: TypeId,
    value: &[u8],
) -> u32 {
    let mut reader = descriptor_reader(table, ty);
    let packed = reader.read_u64();
    let payload_size = reader.read_u64() as usize;
    let xi_type = decode_type_ref(reader.read_u64());
    let num_empty_cases = reader.read_u32();
    let extra_tag_pattern = (packed >> 62) as u8;
    let xi_offset = (packed & u64::from(u32::MAX)) as usize;

    if extra_tag_pattern != 0 {
        let num_extra_tag_bytes = 1usize << (extra_tag_pattern - 1);
        let tag_bytes = read_tag_bytes(&value[payload_size..], num_extra_tag_bytes);
        if tag_bytes != 0 {
            let payload_num_xi = xi_type.map_or(0, |xi| table.desc(xi).extra_inhabitants);
            let case_from_extra_tag = if payload_size >= 4 {
                0
            } else {
                ((tag_bytes as u32) - 1) << (payload_size * 8)
            };
            let case_from_value = load_enum_element(value, payload_size);
            return (case_from_extra_tag | case_from_value) + payload_num_xi + 1;
        }
    }

    match xi_type {
        Some(xi) => table.get_enum_tag_single_payload(xi, &value[xi_offset..], num_empty_cases),
        None => 0,
    }
}

/// Writes the discriminator of a generic single-payload enum.
pub fn single_payload_enum_generic_destructive_inject_enum_tag(
    table: &TypeTable,
    ty: TypeId,
    value: &mut [u8],
    tag: u32,
) {
    let mut reader = descriptor_reader(table, ty);
    let packed = reader.read_u64();
    let payload_size = reader.read_u64() as usize;
    let xi_type = decode_type_ref(reader.read_u64());
    let num_empty_cases = reader.read_u32();
    let extra_tag_pattern = (packed >> 62) as u8;
    let xi_offset = (packed & u64::from(u32::MAX)) as usize;
    let payload_num_xi = xi_type.map_or(0, |xi| table.desc(xi).extra_inhabitants);

    if extra_tag_pattern != 0 && tag > payload_num_xi {
        let num_extra_tag_bytes = 1usize << (extra_tag_pattern - 1);
        let case_index = tag - 1 - payload_num_xi;
        let (extra_tag_index, payload_index) = split_empty_case_index(case_index, payload_size);
        if payload_size > 0 {
            store_enum_element(value, u64::from(payload_index), payload_size);
        }
        store_enum_element(
            &mut value[payload_size..],
            u64::from(extra_tag_index),
            num_extra_tag_bytes,
        );
        return;
    }

    if tag <= payload_num_xi {
        if extra_tag_pattern != 0 {
            let num_extra_tag_bytes = 1usize << (extra_tag_pattern - 1);
            store_enum_element(&mut value[payload_size..], 0, num_extra_tag_bytes);
        }
        if tag == 0 {
            return;
        }
        if let Some(xi) = xi_type {
            table.store_enum_tag_single_payload(xi, &mut value[xi_offset..], tag, num_empty_cases);
        }
    }
}

/// Returns the active tag of a generic multi-payload enum.
#[must_use]
pub fn multi_payload_enum_generic_get_enum_tag(
    table: &TypeTable,
    ty: TypeId,
    value: &[u8],
) -> u32 {
    let mut reader = descriptor_reader(table, ty);
    let tag_bytes = reader.read_u64() as usize;
    let num_payloads = reader.read_u64() as usize;
    reader.skip(WORD_SIZE);
    let enum_size = reader.read_u64() as usize;
    let payload_size = enum_size - tag_bytes;

    let enum_tag = read_tag_bytes(&value[payload_size..], tag_bytes) as u32;
    if (enum_tag as usize) < num_payloads {
        return enum_tag;
    }

    let payload_value = load_enum_element(value, payload_size);
    if payload_size >= 4 {
        num_payloads as u32 + payload_value
    } else {
        let payload_bits = payload_size as u32 * 8;
        (payload_value | ((enum_tag - num_payloads as u32) << payload_bits)) + num_payloads as u32
    }
}

/// Writes the discriminator of a generic multi-payload enum.
pub fn multi_payload_enum_generic_destructive_inject_enum_tag(
    table: &TypeTable,
    ty: TypeId,
    value: &mut [u8],
    tag: u32,
) {
    let mut reader = descriptor_reader(table, ty);
    let tag_bytes = reader.read_u64() as usize;
    let num_payloads = reader.read_u64() as usize;
    reader.skip(WORD_SIZE);
    let enum_size = reader.read_u64() as usize;
    let payload_size = enum_size - tag_bytes;

    if (tag as usize) < num_payloads {
        // A payload case stores its tag after the payload area.
        store_enum_element(&mut value[payload_size..], u64::from(tag), tag_bytes);
    } else {
        // An empty case is factored between the tag and payload areas.
        let which_empty_case = tag - num_payloads as u32;
        let (which_tag, which_payload_value) = if payload_size >= 4 {
            (num_payloads as u32, which_empty_case)
        } else {
            let payload_bits = payload_size as u32 * 8;
            (
                num_payloads as u32 + (which_empty_case >> payload_bits),
                which_empty_case & ((1u32 << payload_bits) - 1),
            )
        };
        store_enum_element(&mut value[payload_size..], u64::from(which_tag), tag_bytes);
        store_enum_element(value, u64::from(which_payload_value), payload_size);
    }
}

/// Splits an empty-case index into its extra-tag and payload parts.
fn split_empty_case_index(case_index: u32, payload_size: usize) -> (u32, u32) {
    if payload_size >= 4 {
        (1, case_index)
    } else {
        let payload_bits = payload_size as u32 * 8;
        (
            1 + (case_index >> payload_bits),
            case_index & ((1u32 << payload_bits) - 1),
        )
    }
}
