// Copyright 2026 the Layout Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! One-shot resolution of resilient accessors in layout strings.
//!
//! When a resiliently-laid-out field is first instantiated, its layout
//! string still carries relative references: `resilient` entries name a
//! metadata accessor, and the `*_enum_fn` entries name tag functions. This
//! pass walks the field's unresolved entry stream and rewrites the enclosing
//! layout string in place:
//!
//! - `resilient` becomes `metatype` with the accessor's result embedded,
//! - `single_payload_enum_fn` / `multi_payload_enum_fn` become their
//!   `*_resolved` forms with the absolute function key embedded, recursing
//!   into multi-payload case sub-programs.
//!
//! Resolved forms are the same width as unresolved ones, so offsets never
//! shift, and a second pass over already-resolved output finds nothing to
//! rewrite. The surrounding metadata instantiation path is responsible for
//! running this at most once per field; the pass itself takes no locks.

use crate::format::{LayoutReader, write_u64_at};
use crate::heap::WORD_SIZE;
use crate::metadata::{FnKey, TypeId, TypeTable, encode_type_ref};
use crate::opcode::{RefCountKind, SKIP_BITS_MASK};

/// Rewrites every unresolved reference of `field_layout_str` into
/// `layout_str`.
///
/// `field_layout_str` is the field's unresolved entry stream;
/// `layout_str_offset` is the byte position in `layout_str` where that
/// stream's first entry lives. `field_ty` supplies the generic arguments
/// handed to metadata accessors. The two buffers may not alias; when a
/// layout string is resolved against itself, the caller passes a pristine
/// copy as the source.
pub fn resolve_resilient_accessors(
    table: &TypeTable,
    field_ty: TypeId,
    layout_str: &mut [u8],
    layout_str_offset: usize,
    field_layout_str: &[u8],
) {
    resolve_stream(table, field_ty, layout_str, layout_str_offset, field_layout_str, 0);
}

fn resolve_stream(
    table: &TypeTable,
    field_ty: TypeId,
    layout_str: &mut [u8],
    layout_str_offset: usize,
    field_layout_str: &[u8],
    start: usize,
) {
    let mut reader = LayoutReader::with_offset(field_layout_str, start);
    loop {
        let entry_pos = reader.offset();
        let word = reader.read_u64();
        let skip_bits = word & SKIP_BITS_MASK;
        let kind = match RefCountKind::from_entry_word(word) {
            Some(kind) => kind,
            None => panic!("malformed layout string entry"),
        };
        match kind {
            RefCountKind::End => return,
            RefCountKind::Resilient => {
                let key = FnKey(reader.read_relative_reference());
                let resolved = (table.accessor(key))(&table.desc(field_ty).generic_args);
                let at = layout_str_offset + entry_pos;
                write_u64_at(layout_str, at, RefCountKind::Metatype.entry_word(skip_bits));
                write_u64_at(layout_str, at + WORD_SIZE, encode_type_ref(Some(resolved)));
            }
            RefCountKind::Metatype => reader.skip(WORD_SIZE),
            RefCountKind::SinglePayloadEnumSimple => {
                // Six descriptor words; the sub-program is a stream
                // continuation and gets walked by this loop.
                reader.skip(6 * WORD_SIZE);
            }
            RefCountKind::SinglePayloadEnumFn => {
                let key = FnKey(reader.read_relative_reference());
                let at = layout_str_offset + entry_pos;
                write_u64_at(
                    layout_str,
                    at,
                    RefCountKind::SinglePayloadEnumFnResolved.entry_word(skip_bits),
                );
                write_u64_at(layout_str, at + WORD_SIZE, u64::from(key.0));
                reader.skip(2 * WORD_SIZE);
            }
            RefCountKind::SinglePayloadEnumFnResolved => reader.skip(3 * WORD_SIZE),
            RefCountKind::SinglePayloadEnumGeneric => {
                // Packed word, payload size, type reference, empty-case count.
                reader.skip(3 * WORD_SIZE + 4);
                let ref_count_bytes = reader.read_u64() as usize;
                reader.skip(WORD_SIZE + ref_count_bytes);
            }
            RefCountKind::MultiPayloadEnumFn => {
                let key = FnKey(reader.read_relative_reference());
                let at = layout_str_offset + entry_pos;
                write_u64_at(
                    layout_str,
                    at,
                    RefCountKind::MultiPayloadEnumFnResolved.entry_word(skip_bits),
                );
                write_u64_at(layout_str, at + WORD_SIZE, u64::from(key.0));

                let num_cases = reader.read_u64() as usize;
                let ref_count_bytes = reader.read_u64() as usize;
                reader.skip(WORD_SIZE); // enum size
                let cases_base = reader.offset() + num_cases * WORD_SIZE;
                for _ in 0..num_cases {
                    let case_offset = reader.read_u64() as usize;
                    resolve_stream(
                        table,
                        field_ty,
                        layout_str,
                        layout_str_offset,
                        field_layout_str,
                        cases_base + case_offset,
                    );
                }
                reader.skip(ref_count_bytes);
            }
            RefCountKind::MultiPayloadEnumFnResolved => {
                reader.skip(WORD_SIZE);
                let num_cases = reader.read_u64() as usize;
                let ref_count_bytes = reader.read_u64() as usize;
                reader.skip(WORD_SIZE + num_cases * WORD_SIZE + ref_count_bytes);
            }
            RefCountKind::MultiPayloadEnumGeneric => {
                reader.skip(WORD_SIZE);
                let num_payloads = reader.read_u64() as usize;
                let ref_count_bytes = reader.read_u64() as usize;
                reader.skip(WORD_SIZE * (num_payloads + 1) + ref_count_bytes);
            }
            _ => {}
        }
    }
}
