// Copyright 2026 the Layout Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layout-string builder.
//!
//! A small, public helper for constructing layout strings without manually
//! computing entry words, descriptor lengths, case-offset tables, or
//! relative function references. Sub-programs are emitted through closures;
//! their byte lengths and offsets are back-patched once the closure returns.
//!
//! The encoding matches `docs/format.md`; a minimal layout is locked
//! byte-for-byte by a test below as a regression signal for format changes.

use alloc::vec::Vec;

use crate::format::{LAYOUT_STRING_HEADER_SIZE, LayoutWriter};
use crate::heap::WORD_SIZE;
use crate::metadata::{FnKey, TypeId, encode_type_ref};
use crate::opcode::{RefCountKind, SKIP_BITS_MASK};

/// Descriptor fields of a simple single-payload enum entry.
///
/// Tag-byte counts must be 0, 1, 2, 4, or 8; they are stored as power-of-two
/// patterns in the packed descriptor word.
#[derive(Clone, Copy, Debug)]
pub struct SimpleEnumLayout {
    /// Extra tag bytes appended after the payload, or 0.
    pub extra_tag_byte_count: u8,
    /// Width of the extra-inhabitant tag field inside the payload, or 0.
    pub xi_tag_byte_count: u8,
    /// Byte offset of the extra-inhabitant tag field within the enum.
    pub xi_tag_offset: u32,
    /// Payload size in bytes.
    pub payload_size: u64,
    /// First extra-inhabitant tag value.
    pub zero_tag_value: u64,
    /// Number of extra-inhabitant tag values.
    pub xi_tag_values: u64,
    /// Bytes an empty case advances over in place of the payload sub-program.
    pub skip: u64,
}

/// Descriptor fields of a generic single-payload enum entry.
#[derive(Clone, Copy, Debug)]
pub struct GenericEnumLayout {
    /// Extra tag bytes appended after the payload, or 0.
    pub extra_tag_byte_count: u8,
    /// Byte offset of the extra-inhabitant region within the enum.
    pub xi_tag_offset: u32,
    /// Payload size in bytes.
    pub payload_size: u64,
    /// The payload type whose extra inhabitants discriminate the enum.
    pub xi_type: Option<TypeId>,
    /// Number of empty cases.
    pub num_empty_cases: u32,
    /// Bytes an empty case advances over in place of the payload sub-program.
    pub skip: u64,
}

/// Builds one layout string.
#[derive(Clone, Debug)]
pub struct LayoutBuilder {
    w: LayoutWriter,
    pending_skip: u64,
}

impl Default for LayoutBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutBuilder {
    /// Creates a builder with an empty header.
    #[must_use]
    pub fn new() -> Self {
        let mut w = LayoutWriter::new();
        w.write_u64(0); // entry-stream length, patched by `finish`
        w.write_u64(0); // value size, patched by `finish`
        Self { w, pending_skip: 0 }
    }

    /// Current position in the entry stream (relative references are encoded
    /// against these positions).
    fn stream_pos(&self) -> usize {
        self.w.len() - LAYOUT_STRING_HEADER_SIZE
    }

    /// Accumulates `n` plain bytes to advance over before the next entry.
    pub fn skip(&mut self, n: usize) {
        self.pending_skip += n as u64;
    }

    fn entry(&mut self, kind: RefCountKind) {
        assert!(self.pending_skip <= SKIP_BITS_MASK, "skip distance too large");
        self.w.write_u64(kind.entry_word(self.pending_skip));
        self.pending_skip = 0;
    }

    fn relative_reference(&mut self, key: FnKey) {
        let rel = i64::from(key.0) - self.stream_pos() as i64;
        let rel = i32::try_from(rel).expect("relative reference out of range");
        self.w.write_u64(u64::from(rel as u32));
    }

    /// Emits a word-sized reference-slot entry.
    pub fn ref_slot(&mut self, kind: RefCountKind) {
        debug_assert!(matches!(
            kind,
            RefCountKind::Error
                | RefCountKind::NativeStrong
                | RefCountKind::Unowned
                | RefCountKind::Weak
                | RefCountKind::Unknown
                | RefCountKind::UnknownUnowned
                | RefCountKind::UnknownWeak
                | RefCountKind::Bridge
                | RefCountKind::Block
                | RefCountKind::ObjcStrong
        ));
        self.entry(kind);
    }

    /// Emits a field with an embedded type reference.
    pub fn metatype(&mut self, ty: TypeId) {
        self.entry(RefCountKind::Metatype);
        self.w.write_u64(encode_type_ref(Some(ty)));
    }

    /// Emits an existential container entry.
    pub fn existential(&mut self) {
        self.entry(RefCountKind::Existential);
    }

    /// Emits a resilient field naming a metadata accessor.
    pub fn resilient(&mut self, accessor: FnKey) {
        self.entry(RefCountKind::Resilient);
        self.relative_reference(accessor);
    }

    /// Emits a simple single-payload enum; `payload` emits the payload
    /// sub-program as a continuation of this stream.
    pub fn single_payload_enum_simple(
        &mut self,
        e: &SimpleEnumLayout,
        payload: impl FnOnce(&mut Self),
    ) {
        self.entry(RefCountKind::SinglePayloadEnumSimple);
        let packed = (u64::from(tag_byte_pattern(e.extra_tag_byte_count)) << 62)
            | (u64::from(tag_byte_pattern(e.xi_tag_byte_count)) << 59)
            | u64::from(e.xi_tag_offset);
        self.w.write_u64(packed);
        self.w.write_u64(e.payload_size);
        self.w.write_u64(e.zero_tag_value);
        self.w.write_u64(e.xi_tag_values);
        self.continuation_tail(e.skip, payload);
    }

    /// Emits a single-payload enum with an unresolved tag function.
    pub fn single_payload_enum_fn(
        &mut self,
        tag_fn: FnKey,
        skip: u64,
        payload: impl FnOnce(&mut Self),
    ) {
        self.entry(RefCountKind::SinglePayloadEnumFn);
        self.relative_reference(tag_fn);
        self.continuation_tail(skip, payload);
    }

    /// Emits a single-payload enum with a resolved tag function.
    pub fn single_payload_enum_fn_resolved(
        &mut self,
        tag_fn: FnKey,
        skip: u64,
        payload: impl FnOnce(&mut Self),
    ) {
        self.entry(RefCountKind::SinglePayloadEnumFnResolved);
        self.w.write_u64(u64::from(tag_fn.0));
        self.continuation_tail(skip, payload);
    }

    /// Emits a generic single-payload enum.
    pub fn single_payload_enum_generic(
        &mut self,
        e: &GenericEnumLayout,
        payload: impl FnOnce(&mut Self),
    ) {
        self.entry(RefCountKind::SinglePayloadEnumGeneric);
        let packed = (u64::from(tag_byte_pattern(e.extra_tag_byte_count)) << 62)
            | u64::from(e.xi_tag_offset);
        self.w.write_u64(packed);
        self.w.write_u64(e.payload_size);
        self.w.write_u64(encode_type_ref(e.xi_type));
        self.w.write_u32(e.num_empty_cases);
        self.continuation_tail(e.skip, payload);
    }

    /// Emits a multi-payload enum with an unresolved tag function; each case
    /// closure emits one payload sub-program.
    pub fn multi_payload_enum_fn(
        &mut self,
        tag_fn: FnKey,
        enum_size: u64,
        cases: &[&dyn Fn(&mut Self)],
    ) {
        self.entry(RefCountKind::MultiPayloadEnumFn);
        self.relative_reference(tag_fn);
        self.multi_payload_tail(enum_size, cases);
    }

    /// Emits a multi-payload enum with a resolved tag function.
    pub fn multi_payload_enum_fn_resolved(
        &mut self,
        tag_fn: FnKey,
        enum_size: u64,
        cases: &[&dyn Fn(&mut Self)],
    ) {
        self.entry(RefCountKind::MultiPayloadEnumFnResolved);
        self.w.write_u64(u64::from(tag_fn.0));
        self.multi_payload_tail(enum_size, cases);
    }

    /// Emits a multi-payload enum discriminated by trailing tag bytes.
    pub fn multi_payload_enum_generic(
        &mut self,
        tag_byte_count: u64,
        enum_size: u64,
        cases: &[&dyn Fn(&mut Self)],
    ) {
        self.entry(RefCountKind::MultiPayloadEnumGeneric);
        self.w.write_u64(tag_byte_count);
        self.multi_payload_tail(enum_size, cases);
    }

    /// Writes the `ref_count_bytes`/`skip` pair and the inline sub-program,
    /// back-patching the sub-program length.
    fn continuation_tail(&mut self, skip: u64, payload: impl FnOnce(&mut Self)) {
        let ref_count_bytes_at = self.w.len();
        self.w.write_u64(0);
        self.w.write_u64(skip);
        let sub_start = self.w.len();
        payload(self);
        let ref_count_bytes = (self.w.len() - sub_start) as u64;
        self.w.patch_u64_at(ref_count_bytes_at, ref_count_bytes);
    }

    fn multi_payload_tail(&mut self, enum_size: u64, cases: &[&dyn Fn(&mut Self)]) {
        self.w.write_u64(cases.len() as u64);
        let ref_count_bytes_at = self.w.len();
        self.w.write_u64(0);
        self.w.write_u64(enum_size);
        let offsets_at = self.w.len();
        for _ in cases {
            self.w.write_u64(0);
        }
        let sub_base = self.w.len();
        for (i, case) in cases.iter().enumerate() {
            let case_offset = (self.w.len() - sub_base) as u64;
            self.w.patch_u64_at(offsets_at + i * WORD_SIZE, case_offset);
            case(self);
            self.entry(RefCountKind::End);
        }
        let ref_count_bytes = (self.w.len() - sub_base) as u64;
        self.w.patch_u64_at(ref_count_bytes_at, ref_count_bytes);
    }

    /// Terminates the stream and fills in the header for a type of `size`
    /// bytes.
    #[must_use]
    pub fn finish(mut self, size: usize) -> Vec<u8> {
        self.entry(RefCountKind::End);
        let stream_len = (self.w.len() - LAYOUT_STRING_HEADER_SIZE) as u64;
        self.w.patch_u64_at(0, stream_len);
        self.w.patch_u64_at(8, size as u64);
        self.w.into_vec()
    }
}

fn tag_byte_pattern(count: u8) -> u8 {
    match count {
        0 => 0,
        1 => 1,
        2 => 2,
        4 => 3,
        8 => 4,
        _ => panic!("unsupported tag byte count"),
    }
}
