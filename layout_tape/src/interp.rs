// Copyright 2026 the Layout Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The layout-string interpreter.
//!
//! Each engine is a loop over the entry stream of a type's layout string:
//! read an entry word, advance over (and for the copying engines, copy) the
//! plain bytes it skips, then perform the typed action its opcode names.
//! Plain bytes between reference slots never touch the heap runtime; the
//! cumulative address offset after the `End` entry equals the type's size.
//!
//! Enum entries re-enter the engines recursively: a payload case's
//! sub-program is executed with the same top-level operation, selected by a
//! handler function passed into the multi-payload walkers. Single-payload
//! sub-programs are continuations of the enclosing stream, entered by simply
//! not skipping them.

use crate::format::{LAYOUT_STRING_HEADER_SIZE, LayoutReader};
use crate::heap::{
    HeapRuntime, OBJC_RESERVED_BITS_MASK, SPARE_BITS_MASK, WORD_SIZE, read_word, write_word,
};
use crate::metadata::{FnKey, GetEnumTagFn, TypeId, TypeTable, decode_type_ref};
use crate::opcode::{RefCountKind, SKIP_BITS_MASK};
use crate::tag::read_tag_bytes;

/// Number of words in an existential container's inline value buffer.
pub const NUM_WORDS_VALUE_BUFFER: usize = 3;

/// Byte size of an existential container's inline value buffer. The payload
/// type word sits directly after it.
pub const VALUE_BUFFER_SIZE: usize = NUM_WORDS_VALUE_BUFFER * WORD_SIZE;

/// The layout interpreter, bound to a module's [`TypeTable`] and an
/// embedder's [`HeapRuntime`].
///
/// Every method operates on caller-owned buffers of at least the type's size
/// and performs no allocation of its own; see `docs/format.md` for the entry
/// stream the methods execute.
#[derive(Debug)]
pub struct Interp<'a, H: HeapRuntime> {
    table: &'a TypeTable,
    heap: &'a mut H,
}

impl<'a, H: HeapRuntime> Interp<'a, H> {
    /// Creates an interpreter over `table` and `heap`.
    pub fn new(table: &'a TypeTable, heap: &'a mut H) -> Self {
        Self { table, heap }
    }

    /// Releases every reference-bearing slot of the value.
    pub fn destroy(&mut self, ty: TypeId, value: &mut [u8]) {
        vw_destroy(self.table, self.heap, ty, value);
    }

    /// Initializes `dest` as a copy of `src`, retaining every
    /// reference-bearing slot.
    pub fn init_with_copy(&mut self, ty: TypeId, dest: &mut [u8], src: &[u8]) {
        vw_init_with_copy(self.table, self.heap, ty, dest, src);
    }

    /// Initializes `dest` by moving the value out of `src`.
    ///
    /// Bitwise-takable types take a single byte-copy fast path; otherwise
    /// address-sensitive slots (unknown-origin weak references, non-takable
    /// delegated fields) are moved through the runtime.
    pub fn init_with_take(&mut self, ty: TypeId, dest: &mut [u8], src: &[u8]) {
        vw_init_with_take(self.table, self.heap, ty, dest, src);
    }

    /// Replaces the value in `dest` with a copy of `src`, releasing what
    /// `dest` held.
    pub fn assign_with_copy(&mut self, ty: TypeId, dest: &mut [u8], src: &[u8]) {
        vw_assign_with_copy(self.table, self.heap, ty, dest, src);
    }

    /// Replaces the value in `dest` with the value moved out of `src`.
    pub fn assign_with_take(&mut self, ty: TypeId, dest: &mut [u8], src: &[u8]) {
        vw_destroy(self.table, self.heap, ty, dest);
        vw_init_with_take(self.table, self.heap, ty, dest, src);
    }

    /// Destroys `count` elements laid out `stride` bytes apart.
    pub fn array_destroy(&mut self, ty: TypeId, values: &mut [u8], count: usize, stride: usize) {
        let table = self.table;
        let Some(layout) = table.layout(ty) else {
            return;
        };
        for i in 0..count {
            let mut reader = LayoutReader::new(&layout[LAYOUT_STRING_HEADER_SIZE..]);
            let mut offset = i * stride;
            walk_destroy(table, self.heap, ty, &mut reader, &mut offset, values);
            debug_assert_eq!(offset, i * stride + table.desc(ty).size);
        }
    }

    /// Copy-initializes `count` elements laid out `stride` bytes apart.
    pub fn array_init_with_copy(
        &mut self,
        ty: TypeId,
        dest: &mut [u8],
        src: &[u8],
        count: usize,
        stride: usize,
    ) {
        let table = self.table;
        let size = table.desc(ty).size;
        let Some(layout) = table.layout(ty) else {
            for i in 0..count {
                dest[i * stride..i * stride + size].copy_from_slice(&src[i * stride..i * stride + size]);
            }
            return;
        };
        for i in 0..count {
            let mut reader = LayoutReader::new(&layout[LAYOUT_STRING_HEADER_SIZE..]);
            let mut offset = i * stride;
            walk_init_with_copy(table, self.heap, ty, &mut reader, &mut offset, dest, src);
            debug_assert_eq!(offset, i * stride + size);
        }
    }

    /// Copy-assigns `count` elements laid out `stride` bytes apart.
    pub fn array_assign_with_copy(
        &mut self,
        ty: TypeId,
        dest: &mut [u8],
        src: &[u8],
        count: usize,
        stride: usize,
    ) {
        let table = self.table;
        let size = table.desc(ty).size;
        let Some(layout) = table.layout(ty) else {
            for i in 0..count {
                dest[i * stride..i * stride + size].copy_from_slice(&src[i * stride..i * stride + size]);
            }
            return;
        };
        for i in 0..count {
            let mut reader = LayoutReader::new(&layout[LAYOUT_STRING_HEADER_SIZE..]);
            let mut offset = i * stride;
            walk_assign_with_copy(table, self.heap, ty, &mut reader, &mut offset, dest, src);
            debug_assert_eq!(offset, i * stride + size);
        }
    }

    /// Initializes a 3-word value buffer from another.
    ///
    /// Value-inline types copy the value itself; out-of-line values share the
    /// heap box by retaining it.
    pub fn init_buffer_with_copy_of_buffer(&mut self, ty: TypeId, dest: &mut [u8], src: &[u8]) {
        vw_init_buffer_with_copy_of_buffer(self.table, self.heap, ty, dest, src);
    }
}

type UnaryHandler<H> =
    fn(&TypeTable, &mut H, TypeId, &mut LayoutReader<'_>, &mut usize, &mut [u8]);
type BinaryHandler<H> =
    fn(&TypeTable, &mut H, TypeId, &mut LayoutReader<'_>, &mut usize, &mut [u8], &[u8]);

fn entry_kind(word: u64) -> RefCountKind {
    match RefCountKind::from_entry_word(word) {
        Some(kind) => kind,
        None => panic!("malformed layout string entry"),
    }
}

fn required_type_ref(word: u64) -> TypeId {
    match decode_type_ref(word) {
        Some(ty) => ty,
        None => panic!("missing type reference in layout string"),
    }
}

fn read_fn_key(reader: &mut LayoutReader<'_>, resolved: bool) -> FnKey {
    if resolved {
        FnKey(reader.read_u64() as u32)
    } else {
        FnKey(reader.read_relative_reference())
    }
}

fn copy_range(dest: &mut [u8], src: &[u8], offset: usize, len: usize) {
    dest[offset..offset + len].copy_from_slice(&src[offset..offset + len]);
}

// Value-witness delegation. A type with a layout string runs the engines on
// it; a type without one is plain data.

fn vw_destroy<H: HeapRuntime>(t: &TypeTable, heap: &mut H, ty: TypeId, value: &mut [u8]) {
    let Some(layout) = t.layout(ty) else {
        return;
    };
    let mut reader = LayoutReader::new(&layout[LAYOUT_STRING_HEADER_SIZE..]);
    let mut offset = 0;
    walk_destroy(t, heap, ty, &mut reader, &mut offset, value);
    debug_assert_eq!(offset, t.desc(ty).size);
}

fn vw_init_with_copy<H: HeapRuntime>(
    t: &TypeTable,
    heap: &mut H,
    ty: TypeId,
    dest: &mut [u8],
    src: &[u8],
) {
    let size = t.desc(ty).size;
    let Some(layout) = t.layout(ty) else {
        dest[..size].copy_from_slice(&src[..size]);
        return;
    };
    let mut reader = LayoutReader::new(&layout[LAYOUT_STRING_HEADER_SIZE..]);
    let mut offset = 0;
    walk_init_with_copy(t, heap, ty, &mut reader, &mut offset, dest, src);
    debug_assert_eq!(offset, size);
}

fn vw_init_with_take<H: HeapRuntime>(
    t: &TypeTable,
    heap: &mut H,
    ty: TypeId,
    dest: &mut [u8],
    src: &[u8],
) {
    let desc = t.desc(ty);
    let size = desc.size;
    if desc.flags.is_bitwise_takable {
        dest[..size].copy_from_slice(&src[..size]);
        return;
    }
    let Some(layout) = t.layout(ty) else {
        dest[..size].copy_from_slice(&src[..size]);
        return;
    };
    let mut reader = LayoutReader::new(&layout[LAYOUT_STRING_HEADER_SIZE..]);
    let mut offset = 0;
    walk_init_with_take(t, heap, ty, &mut reader, &mut offset, dest, src);
    debug_assert_eq!(offset, size);
}

fn vw_assign_with_copy<H: HeapRuntime>(
    t: &TypeTable,
    heap: &mut H,
    ty: TypeId,
    dest: &mut [u8],
    src: &[u8],
) {
    let size = t.desc(ty).size;
    let Some(layout) = t.layout(ty) else {
        dest[..size].copy_from_slice(&src[..size]);
        return;
    };
    let mut reader = LayoutReader::new(&layout[LAYOUT_STRING_HEADER_SIZE..]);
    let mut offset = 0;
    walk_assign_with_copy(t, heap, ty, &mut reader, &mut offset, dest, src);
    debug_assert_eq!(offset, size);
}

fn vw_init_buffer_with_copy_of_buffer<H: HeapRuntime>(
    t: &TypeTable,
    heap: &mut H,
    ty: TypeId,
    dest: &mut [u8],
    src: &[u8],
) {
    if t.desc(ty).flags.is_value_inline {
        vw_init_with_copy(t, heap, ty, dest, src);
    } else {
        let shared_box = read_word(src, 0);
        write_word(dest, 0, shared_box);
        heap.retain(shared_box);
    }
}

// Destroy.

fn step_destroy<H: HeapRuntime>(
    t: &TypeTable,
    heap: &mut H,
    ty: TypeId,
    reader: &mut LayoutReader<'_>,
    offset: &mut usize,
    addr: &mut [u8],
) -> bool {
    let word = reader.read_u64();
    *offset += (word & SKIP_BITS_MASK) as usize;
    match entry_kind(word) {
        RefCountKind::End => return false,
        RefCountKind::Error => {
            let w = read_word(addr, *offset);
            *offset += WORD_SIZE;
            heap.error_release(w);
        }
        RefCountKind::NativeStrong => {
            let w = read_word(addr, *offset);
            *offset += WORD_SIZE;
            heap.release(w & !SPARE_BITS_MASK);
        }
        RefCountKind::Unowned => {
            let w = read_word(addr, *offset);
            *offset += WORD_SIZE;
            heap.unowned_release(w & !SPARE_BITS_MASK);
        }
        RefCountKind::Weak => {
            let w = read_word(addr, *offset);
            *offset += WORD_SIZE;
            heap.weak_destroy(w);
        }
        RefCountKind::Unknown => {
            let w = read_word(addr, *offset);
            *offset += WORD_SIZE;
            heap.unknown_release(w);
        }
        RefCountKind::UnknownUnowned => {
            let w = read_word(addr, *offset);
            *offset += WORD_SIZE;
            heap.unknown_unowned_destroy(w);
        }
        RefCountKind::UnknownWeak => {
            let w = read_word(addr, *offset);
            *offset += WORD_SIZE;
            heap.unknown_weak_destroy(w);
        }
        RefCountKind::Bridge => {
            let w = read_word(addr, *offset);
            *offset += WORD_SIZE;
            heap.bridge_release(w);
        }
        RefCountKind::Block => {
            let w = read_word(addr, *offset);
            *offset += WORD_SIZE;
            heap.block_release(w);
        }
        RefCountKind::ObjcStrong => {
            let w = read_word(addr, *offset);
            *offset += WORD_SIZE;
            if w & OBJC_RESERVED_BITS_MASK == 0 {
                heap.objc_release(w & !SPARE_BITS_MASK);
            }
        }
        RefCountKind::Custom | RefCountKind::Generic => {
            panic!("reserved opcode in layout string")
        }
        RefCountKind::Metatype => {
            let field_ty = required_type_ref(reader.read_u64());
            let size = t.desc(field_ty).size;
            vw_destroy(t, heap, field_ty, &mut addr[*offset..*offset + size]);
            *offset += size;
        }
        RefCountKind::Existential => {
            let field_ty = required_type_ref(read_word(addr, *offset + VALUE_BUFFER_SIZE));
            if t.desc(field_ty).flags.is_value_inline {
                let size = t.desc(field_ty).size;
                vw_destroy(t, heap, field_ty, &mut addr[*offset..*offset + size]);
            } else {
                heap.release(read_word(addr, *offset));
            }
            *offset += VALUE_BUFFER_SIZE;
        }
        RefCountKind::Resilient => {
            let key = FnKey(reader.read_relative_reference());
            let field_ty = (t.accessor(key))(&t.desc(ty).generic_args);
            let size = t.desc(field_ty).size;
            vw_destroy(t, heap, field_ty, &mut addr[*offset..*offset + size]);
            *offset += size;
        }
        RefCountKind::SinglePayloadEnumSimple => {
            single_payload_enum_simple_unary(reader, offset, addr);
        }
        RefCountKind::SinglePayloadEnumFn => {
            single_payload_enum_fn_unary(t, reader, offset, addr, false);
        }
        RefCountKind::SinglePayloadEnumFnResolved => {
            single_payload_enum_fn_unary(t, reader, offset, addr, true);
        }
        RefCountKind::SinglePayloadEnumGeneric => {
            single_payload_enum_generic_unary(t, reader, offset, addr);
        }
        RefCountKind::MultiPayloadEnumFn => {
            multi_payload_enum_unary(
                t,
                heap,
                ty,
                reader,
                offset,
                addr,
                MultiDialect::Fn { resolved: false },
                walk_destroy::<H>,
            );
        }
        RefCountKind::MultiPayloadEnumFnResolved => {
            multi_payload_enum_unary(
                t,
                heap,
                ty,
                reader,
                offset,
                addr,
                MultiDialect::Fn { resolved: true },
                walk_destroy::<H>,
            );
        }
        RefCountKind::MultiPayloadEnumGeneric => {
            multi_payload_enum_unary(
                t,
                heap,
                ty,
                reader,
                offset,
                addr,
                MultiDialect::Generic,
                walk_destroy::<H>,
            );
        }
    }
    true
}

fn walk_destroy<H: HeapRuntime>(
    t: &TypeTable,
    heap: &mut H,
    ty: TypeId,
    reader: &mut LayoutReader<'_>,
    offset: &mut usize,
    addr: &mut [u8],
) {
    while step_destroy(t, heap, ty, reader, offset, addr) {}
}

// Init with copy.

fn step_init_with_copy<H: HeapRuntime>(
    t: &TypeTable,
    heap: &mut H,
    ty: TypeId,
    reader: &mut LayoutReader<'_>,
    offset: &mut usize,
    dest: &mut [u8],
    src: &[u8],
) -> bool {
    let word = reader.read_u64();
    let skip = (word & SKIP_BITS_MASK) as usize;
    if skip > 0 {
        copy_range(dest, src, *offset, skip);
    }
    *offset += skip;
    match entry_kind(word) {
        RefCountKind::End => return false,
        RefCountKind::Error => {
            let w = read_word(src, *offset);
            write_word(dest, *offset, w);
            *offset += WORD_SIZE;
            heap.error_retain(w);
        }
        RefCountKind::NativeStrong => {
            let w = read_word(src, *offset);
            write_word(dest, *offset, w);
            *offset += WORD_SIZE;
            heap.retain(w & !SPARE_BITS_MASK);
        }
        RefCountKind::Unowned => {
            let w = read_word(src, *offset);
            write_word(dest, *offset, w);
            *offset += WORD_SIZE;
            heap.unowned_retain(w & !SPARE_BITS_MASK);
        }
        RefCountKind::Weak => {
            let w = heap.weak_copy_init(read_word(src, *offset));
            write_word(dest, *offset, w);
            *offset += WORD_SIZE;
        }
        RefCountKind::Unknown => {
            let w = read_word(src, *offset);
            write_word(dest, *offset, w);
            *offset += WORD_SIZE;
            heap.unknown_retain(w);
        }
        RefCountKind::UnknownUnowned => {
            let w = heap.unknown_unowned_copy_init(read_word(src, *offset));
            write_word(dest, *offset, w);
            *offset += WORD_SIZE;
        }
        RefCountKind::UnknownWeak => {
            let w = heap.unknown_weak_copy_init(read_word(src, *offset));
            write_word(dest, *offset, w);
            *offset += WORD_SIZE;
        }
        RefCountKind::Bridge => {
            let w = read_word(src, *offset);
            write_word(dest, *offset, w);
            *offset += WORD_SIZE;
            heap.bridge_retain(w);
        }
        RefCountKind::Block => {
            let w = heap.block_copy(read_word(src, *offset));
            write_word(dest, *offset, w);
            *offset += WORD_SIZE;
        }
        RefCountKind::ObjcStrong => {
            let w = read_word(src, *offset);
            write_word(dest, *offset, w);
            *offset += WORD_SIZE;
            if w & OBJC_RESERVED_BITS_MASK == 0 {
                heap.objc_retain(w & !SPARE_BITS_MASK);
            }
        }
        RefCountKind::Custom | RefCountKind::Generic => {
            panic!("reserved opcode in layout string")
        }
        RefCountKind::Metatype => {
            let field_ty = required_type_ref(reader.read_u64());
            let size = t.desc(field_ty).size;
            vw_init_with_copy(
                t,
                heap,
                field_ty,
                &mut dest[*offset..*offset + size],
                &src[*offset..*offset + size],
            );
            *offset += size;
        }
        RefCountKind::Existential => {
            let field_ty = required_type_ref(read_word(src, *offset + VALUE_BUFFER_SIZE));
            vw_init_buffer_with_copy_of_buffer(
                t,
                heap,
                field_ty,
                &mut dest[*offset..*offset + VALUE_BUFFER_SIZE],
                &src[*offset..*offset + VALUE_BUFFER_SIZE],
            );
            *offset += VALUE_BUFFER_SIZE;
        }
        RefCountKind::Resilient => {
            let key = FnKey(reader.read_relative_reference());
            let field_ty = (t.accessor(key))(&t.desc(ty).generic_args);
            let size = t.desc(field_ty).size;
            vw_init_with_copy(
                t,
                heap,
                field_ty,
                &mut dest[*offset..*offset + size],
                &src[*offset..*offset + size],
            );
            *offset += size;
        }
        RefCountKind::SinglePayloadEnumSimple => {
            single_payload_enum_simple_binary(reader, offset, dest, src);
        }
        RefCountKind::SinglePayloadEnumFn => {
            single_payload_enum_fn_binary(t, reader, offset, dest, src, false);
        }
        RefCountKind::SinglePayloadEnumFnResolved => {
            single_payload_enum_fn_binary(t, reader, offset, dest, src, true);
        }
        RefCountKind::SinglePayloadEnumGeneric => {
            single_payload_enum_generic_binary(t, reader, offset, dest, src);
        }
        RefCountKind::MultiPayloadEnumFn => {
            multi_payload_enum_binary(
                t,
                heap,
                ty,
                reader,
                offset,
                dest,
                src,
                MultiDialect::Fn { resolved: false },
                walk_init_with_copy::<H>,
            );
        }
        RefCountKind::MultiPayloadEnumFnResolved => {
            multi_payload_enum_binary(
                t,
                heap,
                ty,
                reader,
                offset,
                dest,
                src,
                MultiDialect::Fn { resolved: true },
                walk_init_with_copy::<H>,
            );
        }
        RefCountKind::MultiPayloadEnumGeneric => {
            multi_payload_enum_binary(
                t,
                heap,
                ty,
                reader,
                offset,
                dest,
                src,
                MultiDialect::Generic,
                walk_init_with_copy::<H>,
            );
        }
    }
    true
}

fn walk_init_with_copy<H: HeapRuntime>(
    t: &TypeTable,
    heap: &mut H,
    ty: TypeId,
    reader: &mut LayoutReader<'_>,
    offset: &mut usize,
    dest: &mut [u8],
    src: &[u8],
) {
    while step_init_with_copy(t, heap, ty, reader, offset, dest, src) {}
}

// Init with take. Slots whose ownership moves with their bits are word-copied;
// only address-sensitive slots and delegated fields go through the runtime.

fn walk_init_with_take<H: HeapRuntime>(
    t: &TypeTable,
    heap: &mut H,
    ty: TypeId,
    reader: &mut LayoutReader<'_>,
    offset: &mut usize,
    dest: &mut [u8],
    src: &[u8],
) {
    loop {
        let word = reader.read_u64();
        let skip = (word & SKIP_BITS_MASK) as usize;
        if skip > 0 {
            copy_range(dest, src, *offset, skip);
        }
        *offset += skip;
        match entry_kind(word) {
            RefCountKind::End => return,
            RefCountKind::Error
            | RefCountKind::NativeStrong
            | RefCountKind::Unowned
            | RefCountKind::Weak
            | RefCountKind::Unknown
            | RefCountKind::UnknownUnowned
            | RefCountKind::Bridge
            | RefCountKind::Block
            | RefCountKind::ObjcStrong => {
                let w = read_word(src, *offset);
                write_word(dest, *offset, w);
                *offset += WORD_SIZE;
            }
            RefCountKind::UnknownWeak => {
                let w = heap.unknown_weak_take_init(read_word(src, *offset));
                write_word(dest, *offset, w);
                *offset += WORD_SIZE;
            }
            RefCountKind::Custom | RefCountKind::Generic => {
                panic!("reserved opcode in layout string")
            }
            RefCountKind::Metatype => {
                let field_ty = required_type_ref(reader.read_u64());
                let size = t.desc(field_ty).size;
                vw_init_with_take(
                    t,
                    heap,
                    field_ty,
                    &mut dest[*offset..*offset + size],
                    &src[*offset..*offset + size],
                );
                *offset += size;
            }
            RefCountKind::Existential => {
                let field_ty = required_type_ref(read_word(src, *offset + VALUE_BUFFER_SIZE));
                if t.desc(field_ty).flags.is_value_inline {
                    let size = t.desc(field_ty).size;
                    vw_init_with_take(
                        t,
                        heap,
                        field_ty,
                        &mut dest[*offset..*offset + size],
                        &src[*offset..*offset + size],
                    );
                } else {
                    // Only the box pointer moves; the rest of the buffer is
                    // dead in both source and destination.
                    let w = read_word(src, *offset);
                    write_word(dest, *offset, w);
                }
                *offset += VALUE_BUFFER_SIZE;
            }
            RefCountKind::Resilient => {
                let key = FnKey(reader.read_relative_reference());
                let field_ty = (t.accessor(key))(&t.desc(ty).generic_args);
                let size = t.desc(field_ty).size;
                vw_init_with_take(
                    t,
                    heap,
                    field_ty,
                    &mut dest[*offset..*offset + size],
                    &src[*offset..*offset + size],
                );
                *offset += size;
            }
            RefCountKind::SinglePayloadEnumSimple => {
                single_payload_enum_simple_binary(reader, offset, dest, src);
            }
            RefCountKind::SinglePayloadEnumFn => {
                single_payload_enum_fn_binary(t, reader, offset, dest, src, false);
            }
            RefCountKind::SinglePayloadEnumFnResolved => {
                single_payload_enum_fn_binary(t, reader, offset, dest, src, true);
            }
            RefCountKind::SinglePayloadEnumGeneric => {
                single_payload_enum_generic_binary(t, reader, offset, dest, src);
            }
            RefCountKind::MultiPayloadEnumFn => {
                multi_payload_enum_binary(
                    t,
                    heap,
                    ty,
                    reader,
                    offset,
                    dest,
                    src,
                    MultiDialect::Fn { resolved: false },
                    walk_init_with_take::<H>,
                );
            }
            RefCountKind::MultiPayloadEnumFnResolved => {
                multi_payload_enum_binary(
                    t,
                    heap,
                    ty,
                    reader,
                    offset,
                    dest,
                    src,
                    MultiDialect::Fn { resolved: true },
                    walk_init_with_take::<H>,
                );
            }
            RefCountKind::MultiPayloadEnumGeneric => {
                multi_payload_enum_binary(
                    t,
                    heap,
                    ty,
                    reader,
                    offset,
                    dest,
                    src,
                    MultiDialect::Generic,
                    walk_init_with_take::<H>,
                );
            }
        }
    }
}

// Assign with copy: release or destroy what dest held, retain what src holds,
// slot by slot.

fn walk_assign_with_copy<H: HeapRuntime>(
    t: &TypeTable,
    heap: &mut H,
    ty: TypeId,
    reader: &mut LayoutReader<'_>,
    offset: &mut usize,
    dest: &mut [u8],
    src: &[u8],
) {
    loop {
        let word = reader.read_u64();
        let skip = (word & SKIP_BITS_MASK) as usize;
        if skip > 0 {
            copy_range(dest, src, *offset, skip);
        }
        *offset += skip;
        match entry_kind(word) {
            RefCountKind::End => return,
            RefCountKind::Error => {
                let dw = read_word(dest, *offset);
                let sw = read_word(src, *offset);
                write_word(dest, *offset, sw);
                *offset += WORD_SIZE;
                heap.error_release(dw);
                heap.error_retain(sw);
            }
            RefCountKind::NativeStrong => {
                let dw = read_word(dest, *offset);
                let sw = read_word(src, *offset);
                write_word(dest, *offset, sw);
                *offset += WORD_SIZE;
                heap.release(dw & !SPARE_BITS_MASK);
                heap.retain(sw & !SPARE_BITS_MASK);
            }
            RefCountKind::Unowned => {
                let dw = read_word(dest, *offset);
                let sw = read_word(src, *offset);
                write_word(dest, *offset, sw);
                *offset += WORD_SIZE;
                heap.unowned_release(dw & !SPARE_BITS_MASK);
                heap.unowned_retain(sw & !SPARE_BITS_MASK);
            }
            RefCountKind::Weak => {
                let dw = read_word(dest, *offset);
                let sw = read_word(src, *offset);
                let w = heap.weak_copy_assign(dw, sw);
                write_word(dest, *offset, w);
                *offset += WORD_SIZE;
            }
            RefCountKind::Unknown => {
                let dw = read_word(dest, *offset);
                let sw = read_word(src, *offset);
                write_word(dest, *offset, sw);
                *offset += WORD_SIZE;
                heap.unknown_release(dw);
                heap.unknown_retain(sw);
            }
            RefCountKind::UnknownUnowned => {
                let dw = read_word(dest, *offset);
                let sw = read_word(src, *offset);
                let w = heap.unknown_unowned_copy_assign(dw, sw);
                write_word(dest, *offset, w);
                *offset += WORD_SIZE;
            }
            RefCountKind::UnknownWeak => {
                let dw = read_word(dest, *offset);
                let sw = read_word(src, *offset);
                let w = heap.unknown_weak_copy_assign(dw, sw);
                write_word(dest, *offset, w);
                *offset += WORD_SIZE;
            }
            RefCountKind::Bridge => {
                let dw = read_word(dest, *offset);
                let sw = read_word(src, *offset);
                write_word(dest, *offset, sw);
                *offset += WORD_SIZE;
                heap.bridge_release(dw);
                heap.bridge_retain(sw);
            }
            RefCountKind::Block => {
                let dw = read_word(dest, *offset);
                heap.block_release(dw);
                let w = heap.block_copy(read_word(src, *offset));
                write_word(dest, *offset, w);
                *offset += WORD_SIZE;
            }
            RefCountKind::ObjcStrong => {
                let dw = read_word(dest, *offset);
                let sw = read_word(src, *offset);
                write_word(dest, *offset, sw);
                *offset += WORD_SIZE;
                if dw & OBJC_RESERVED_BITS_MASK == 0 {
                    heap.objc_release(dw & !SPARE_BITS_MASK);
                }
                if sw & OBJC_RESERVED_BITS_MASK == 0 {
                    heap.objc_retain(sw & !SPARE_BITS_MASK);
                }
            }
            RefCountKind::Custom | RefCountKind::Generic => {
                panic!("reserved opcode in layout string")
            }
            RefCountKind::Metatype => {
                let field_ty = required_type_ref(reader.read_u64());
                let size = t.desc(field_ty).size;
                vw_assign_with_copy(
                    t,
                    heap,
                    field_ty,
                    &mut dest[*offset..*offset + size],
                    &src[*offset..*offset + size],
                );
                *offset += size;
            }
            RefCountKind::Existential => {
                let field_ty = required_type_ref(read_word(src, *offset + VALUE_BUFFER_SIZE));
                if t.desc(field_ty).flags.is_value_inline {
                    let size = t.desc(field_ty).size;
                    vw_assign_with_copy(
                        t,
                        heap,
                        field_ty,
                        &mut dest[*offset..*offset + size],
                        &src[*offset..*offset + size],
                    );
                } else {
                    heap.release(read_word(dest, *offset));
                    let w = read_word(src, *offset);
                    write_word(dest, *offset, w);
                    heap.retain(w);
                }
                *offset += VALUE_BUFFER_SIZE;
            }
            RefCountKind::Resilient => {
                let key = FnKey(reader.read_relative_reference());
                let field_ty = (t.accessor(key))(&t.desc(ty).generic_args);
                let size = t.desc(field_ty).size;
                vw_assign_with_copy(
                    t,
                    heap,
                    field_ty,
                    &mut dest[*offset..*offset + size],
                    &src[*offset..*offset + size],
                );
                *offset += size;
            }
            RefCountKind::SinglePayloadEnumSimple => {
                single_payload_enum_simple_assign(t, heap, ty, reader, offset, dest, src);
            }
            RefCountKind::SinglePayloadEnumFn => {
                single_payload_enum_fn_assign(t, heap, ty, reader, offset, dest, src, false);
            }
            RefCountKind::SinglePayloadEnumFnResolved => {
                single_payload_enum_fn_assign(t, heap, ty, reader, offset, dest, src, true);
            }
            RefCountKind::SinglePayloadEnumGeneric => {
                single_payload_enum_generic_assign(t, heap, ty, reader, offset, dest, src);
            }
            RefCountKind::MultiPayloadEnumFn => {
                multi_payload_enum_assign(
                    t,
                    heap,
                    ty,
                    reader,
                    offset,
                    dest,
                    src,
                    MultiDialect::Fn { resolved: false },
                );
            }
            RefCountKind::MultiPayloadEnumFnResolved => {
                multi_payload_enum_assign(
                    t,
                    heap,
                    ty,
                    reader,
                    offset,
                    dest,
                    src,
                    MultiDialect::Fn { resolved: true },
                );
            }
            RefCountKind::MultiPayloadEnumGeneric => {
                multi_payload_enum_assign(t, heap, ty, reader, offset, dest, src, MultiDialect::Generic);
            }
        }
    }
}

// Single-payload enum walkers. The payload sub-program is a continuation of
// the enclosing stream: the payload case falls through into it, the empty
// cases jump over it and bitwise-handle the payload area.

struct SimpleEnumDesc {
    extra_tag_pattern: u8,
    xi_pattern: u8,
    xi_offset: usize,
    payload_size: usize,
    zero_tag: u64,
    xi_values: u64,
    ref_count_bytes: usize,
    skip: usize,
}

fn read_simple_desc(reader: &mut LayoutReader<'_>) -> SimpleEnumDesc {
    let packed = reader.read_u64();
    let payload_size = reader.read_u64() as usize;
    let zero_tag = reader.read_u64();
    let xi_values = reader.read_u64();
    let ref_count_bytes = reader.read_u64() as usize;
    let skip = reader.read_u64() as usize;
    SimpleEnumDesc {
        extra_tag_pattern: (packed >> 62) as u8,
        xi_pattern: ((packed >> 59) & 0x7) as u8,
        xi_offset: (packed & u64::from(u32::MAX)) as usize,
        payload_size,
        zero_tag,
        xi_values,
        ref_count_bytes,
        skip,
    }
}

fn simple_enum_is_payload(d: &SimpleEnumDesc, value: &[u8], offset: usize) -> bool {
    let mut xi_pattern = d.xi_pattern;
    if d.extra_tag_pattern != 0 {
        let extra_tag_bytes = 1usize << (d.extra_tag_pattern - 1);
        if read_tag_bytes(&value[offset + d.payload_size..], extra_tag_bytes) != 0 {
            xi_pattern = 0;
        }
    }
    if xi_pattern != 0 {
        let width = 1usize << (xi_pattern - 1);
        let tag = read_tag_bytes(&value[offset + d.xi_offset..], width).wrapping_sub(d.zero_tag);
        if tag >= d.xi_values {
            return true;
        }
    }
    false
}

fn simple_enum_case_tag(d: &SimpleEnumDesc, value: &[u8], offset: usize) -> u64 {
    let mut tag = 0u64;
    if d.extra_tag_pattern != 0 {
        let extra_tag_bytes = 1usize << (d.extra_tag_pattern - 1);
        tag = read_tag_bytes(&value[offset + d.payload_size..], extra_tag_bytes);
    }
    if d.xi_pattern != 0 {
        let width = 1usize << (d.xi_pattern - 1);
        tag = if tag != 0 {
            0
        } else {
            read_tag_bytes(&value[offset + d.xi_offset..], width).wrapping_sub(d.zero_tag)
        };
    }
    tag
}

fn single_payload_enum_simple_unary(
    reader: &mut LayoutReader<'_>,
    offset: &mut usize,
    addr: &[u8],
) {
    let d = read_simple_desc(reader);
    if simple_enum_is_payload(&d, addr, *offset) {
        return;
    }
    reader.skip(d.ref_count_bytes);
    *offset += d.skip;
}

fn single_payload_enum_simple_binary(
    reader: &mut LayoutReader<'_>,
    offset: &mut usize,
    dest: &mut [u8],
    src: &[u8],
) {
    let d = read_simple_desc(reader);
    if simple_enum_is_payload(&d, src, *offset) {
        return;
    }
    reader.skip(d.ref_count_bytes);
    copy_range(dest, src, *offset, d.skip);
    *offset += d.skip;
}

fn single_payload_enum_fn_unary(
    t: &TypeTable,
    reader: &mut LayoutReader<'_>,
    offset: &mut usize,
    addr: &[u8],
    resolved: bool,
) {
    let key = read_fn_key(reader, resolved);
    let ref_count_bytes = reader.read_u64() as usize;
    let skip = reader.read_u64() as usize;
    if (t.enum_tag_fn(key))(&addr[*offset..]) == 0 {
        return;
    }
    reader.skip(ref_count_bytes);
    *offset += skip;
}

fn single_payload_enum_fn_binary(
    t: &TypeTable,
    reader: &mut LayoutReader<'_>,
    offset: &mut usize,
    dest: &mut [u8],
    src: &[u8],
    resolved: bool,
) {
    let key = read_fn_key(reader, resolved);
    let ref_count_bytes = reader.read_u64() as usize;
    let skip = reader.read_u64() as usize;
    if (t.enum_tag_fn(key))(&src[*offset..]) == 0 {
        return;
    }
    reader.skip(ref_count_bytes);
    copy_range(dest, src, *offset, skip);
    *offset += skip;
}

struct GenericEnumDesc {
    extra_tag_pattern: u8,
    xi_offset: usize,
    payload_size: usize,
    xi_type: Option<TypeId>,
    num_empty_cases: u32,
    ref_count_bytes: usize,
    skip: usize,
}

fn read_generic_desc(reader: &mut LayoutReader<'_>) -> GenericEnumDesc {
    let packed = reader.read_u64();
    let payload_size = reader.read_u64() as usize;
    let xi_type = decode_type_ref(reader.read_u64());
    let num_empty_cases = reader.read_u32();
    let ref_count_bytes = reader.read_u64() as usize;
    let skip = reader.read_u64() as usize;
    GenericEnumDesc {
        extra_tag_pattern: (packed >> 62) as u8,
        xi_offset: (packed & u64::from(u32::MAX)) as usize,
        payload_size,
        xi_type,
        num_empty_cases,
        ref_count_bytes,
        skip,
    }
}

fn generic_enum_is_payload(
    t: &TypeTable,
    d: &GenericEnumDesc,
    value: &[u8],
    offset: usize,
) -> bool {
    let mut xi_type = d.xi_type;
    if d.extra_tag_pattern != 0 {
        let extra_tag_bytes = 1usize << (d.extra_tag_pattern - 1);
        if read_tag_bytes(&value[offset + d.payload_size..], extra_tag_bytes) != 0 {
            xi_type = None;
        }
    }
    if let Some(xi) = xi_type {
        let tag =
            t.get_enum_tag_single_payload(xi, &value[offset + d.xi_offset..], d.num_empty_cases);
        if tag == 0 {
            return true;
        }
    }
    false
}

fn generic_enum_case_tag(t: &TypeTable, d: &GenericEnumDesc, value: &[u8], offset: usize) -> u64 {
    let mut tag = 0u64;
    if d.extra_tag_pattern != 0 {
        let extra_tag_bytes = 1usize << (d.extra_tag_pattern - 1);
        tag = read_tag_bytes(&value[offset + d.payload_size..], extra_tag_bytes);
    }
    if let Some(xi) = d.xi_type {
        if tag == 0 {
            tag = u64::from(t.get_enum_tag_single_payload(
                xi,
                &value[offset + d.xi_offset..],
                d.num_empty_cases,
            ));
        }
    }
    tag
}

fn single_payload_enum_generic_unary(
    t: &TypeTable,
    reader: &mut LayoutReader<'_>,
    offset: &mut usize,
    addr: &[u8],
) {
    let d = read_generic_desc(reader);
    if generic_enum_is_payload(t, &d, addr, *offset) {
        return;
    }
    reader.skip(d.ref_count_bytes);
    *offset += d.skip;
}

fn single_payload_enum_generic_binary(
    t: &TypeTable,
    reader: &mut LayoutReader<'_>,
    offset: &mut usize,
    dest: &mut [u8],
    src: &[u8],
) {
    let d = read_generic_desc(reader);
    if generic_enum_is_payload(t, &d, src, *offset) {
        return;
    }
    reader.skip(d.ref_count_bytes);
    copy_range(dest, src, *offset, d.skip);
    *offset += d.skip;
}

// The assign walkers classify both sides and pick one of four paths: update
// the active sub-program in place, materialize the source payload, destroy
// the destination payload, or bitwise-copy between empty cases.

#[expect(clippy::too_many_arguments, reason = "engine thread-through state")]
fn single_payload_assign_tail<H: HeapRuntime>(
    t: &TypeTable,
    heap: &mut H,
    ty: TypeId,
    reader: &mut LayoutReader<'_>,
    offset: &mut usize,
    dest: &mut [u8],
    src: &[u8],
    src_payload: bool,
    dest_payload: bool,
    ref_count_bytes: usize,
    skip: usize,
) {
    if src_payload && dest_payload {
        // Both active: fall through and assign the sub-program in place.
        return;
    }
    if src_payload {
        let end = reader.offset() + ref_count_bytes;
        while reader.offset() < end {
            let _ = step_init_with_copy(t, heap, ty, reader, offset, dest, src);
        }
        return;
    }
    if dest_payload {
        let end = reader.offset() + ref_count_bytes;
        let mut nested_offset = *offset;
        while reader.offset() < end {
            let _ = step_destroy(t, heap, ty, reader, &mut nested_offset, dest);
        }
    } else {
        reader.skip(ref_count_bytes);
    }
    copy_range(dest, src, *offset, skip);
    *offset += skip;
}

fn single_payload_enum_simple_assign<H: HeapRuntime>(
    t: &TypeTable,
    heap: &mut H,
    ty: TypeId,
    reader: &mut LayoutReader<'_>,
    offset: &mut usize,
    dest: &mut [u8],
    src: &[u8],
) {
    let d = read_simple_desc(reader);
    let src_payload = simple_enum_case_tag(&d, src, *offset) >= d.xi_values;
    let dest_payload = simple_enum_case_tag(&d, dest, *offset) >= d.xi_values;
    single_payload_assign_tail(
        t,
        heap,
        ty,
        reader,
        offset,
        dest,
        src,
        src_payload,
        dest_payload,
        d.ref_count_bytes,
        d.skip,
    );
}

#[expect(clippy::too_many_arguments, reason = "engine thread-through state")]
fn single_payload_enum_fn_assign<H: HeapRuntime>(
    t: &TypeTable,
    heap: &mut H,
    ty: TypeId,
    reader: &mut LayoutReader<'_>,
    offset: &mut usize,
    dest: &mut [u8],
    src: &[u8],
    resolved: bool,
) {
    let key = read_fn_key(reader, resolved);
    let ref_count_bytes = reader.read_u64() as usize;
    let skip = reader.read_u64() as usize;
    let get_tag = t.enum_tag_fn(key);
    let src_payload = get_tag(&src[*offset..]) == 0;
    let dest_payload = get_tag(&dest[*offset..]) == 0;
    single_payload_assign_tail(
        t,
        heap,
        ty,
        reader,
        offset,
        dest,
        src,
        src_payload,
        dest_payload,
        ref_count_bytes,
        skip,
    );
}

fn single_payload_enum_generic_assign<H: HeapRuntime>(
    t: &TypeTable,
    heap: &mut H,
    ty: TypeId,
    reader: &mut LayoutReader<'_>,
    offset: &mut usize,
    dest: &mut [u8],
    src: &[u8],
) {
    let d = read_generic_desc(reader);
    let src_payload = generic_enum_case_tag(t, &d, src, *offset) == 0;
    let dest_payload = generic_enum_case_tag(t, &d, dest, *offset) == 0;
    single_payload_assign_tail(
        t,
        heap,
        ty,
        reader,
        offset,
        dest,
        src,
        src_payload,
        dest_payload,
        d.ref_count_bytes,
        d.skip,
    );
}

// Multi-payload enum walkers. The tag selects one of `num_payloads`
// End-terminated case sub-programs through an offset table; tags past the
// payload range are pure empty cases handled bitwise.

#[derive(Copy, Clone, Debug)]
enum MultiDialect {
    Fn { resolved: bool },
    Generic,
}

#[derive(Copy, Clone)]
enum TagProbe {
    Fn(GetEnumTagFn),
    TagBytes(usize),
}

struct MultiEnumHead {
    num_payloads: usize,
    ref_count_bytes: usize,
    enum_size: usize,
    probe: TagProbe,
}

impl MultiEnumHead {
    fn tag_of(&self, value: &[u8], offset: usize) -> usize {
        match self.probe {
            TagProbe::Fn(f) => f(&value[offset..]) as usize,
            TagProbe::TagBytes(n) => {
                read_tag_bytes(&value[offset + self.enum_size - n..], n) as usize
            }
        }
    }
}

fn read_multi_head(
    t: &TypeTable,
    reader: &mut LayoutReader<'_>,
    dialect: MultiDialect,
) -> MultiEnumHead {
    match dialect {
        MultiDialect::Fn { resolved } => {
            let key = read_fn_key(reader, resolved);
            let num_payloads = reader.read_u64() as usize;
            let ref_count_bytes = reader.read_u64() as usize;
            let enum_size = reader.read_u64() as usize;
            MultiEnumHead {
                num_payloads,
                ref_count_bytes,
                enum_size,
                probe: TagProbe::Fn(t.enum_tag_fn(key)),
            }
        }
        MultiDialect::Generic => {
            let tag_bytes = reader.read_u64() as usize;
            let num_payloads = reader.read_u64() as usize;
            let ref_count_bytes = reader.read_u64() as usize;
            let enum_size = reader.read_u64() as usize;
            MultiEnumHead {
                num_payloads,
                ref_count_bytes,
                enum_size,
                probe: TagProbe::TagBytes(tag_bytes),
            }
        }
    }
}

#[expect(clippy::too_many_arguments, reason = "engine thread-through state")]
fn multi_payload_enum_unary<H: HeapRuntime>(
    t: &TypeTable,
    heap: &mut H,
    ty: TypeId,
    reader: &mut LayoutReader<'_>,
    offset: &mut usize,
    addr: &mut [u8],
    dialect: MultiDialect,
    handler: UnaryHandler<H>,
) {
    let head = read_multi_head(t, reader, dialect);
    let mut nested = *reader;
    let mut nested_offset = *offset;
    let tag = head.tag_of(addr, *offset);
    reader.skip(head.ref_count_bytes + head.num_payloads * WORD_SIZE);
    *offset += head.enum_size;
    if tag < head.num_payloads {
        let case_offset = nested.peek_u64_at(tag * WORD_SIZE) as usize;
        nested.skip(head.num_payloads * WORD_SIZE + case_offset);
        handler(t, heap, ty, &mut nested, &mut nested_offset, addr);
    }
}

#[expect(clippy::too_many_arguments, reason = "engine thread-through state")]
fn multi_payload_enum_binary<H: HeapRuntime>(
    t: &TypeTable,
    heap: &mut H,
    ty: TypeId,
    reader: &mut LayoutReader<'_>,
    offset: &mut usize,
    dest: &mut [u8],
    src: &[u8],
    dialect: MultiDialect,
    handler: BinaryHandler<H>,
) {
    let head = read_multi_head(t, reader, dialect);
    let mut nested = *reader;
    let mut nested_offset = *offset;
    let tag = head.tag_of(src, *offset);
    reader.skip(head.ref_count_bytes + head.num_payloads * WORD_SIZE);
    if tag < head.num_payloads {
        *offset += head.enum_size;
        let case_offset = nested.peek_u64_at(tag * WORD_SIZE) as usize;
        nested.skip(head.num_payloads * WORD_SIZE + case_offset);
        handler(t, heap, ty, &mut nested, &mut nested_offset, dest, src);
        // Tag bytes and padding past the case's extent, measured from the
        // destination side.
        let trailing = *offset - nested_offset;
        if trailing > 0 {
            copy_range(dest, src, nested_offset, trailing);
        }
    } else {
        copy_range(dest, src, *offset, head.enum_size);
        *offset += head.enum_size;
    }
}

#[expect(clippy::too_many_arguments, reason = "engine thread-through state")]
fn multi_payload_enum_assign<H: HeapRuntime>(
    t: &TypeTable,
    heap: &mut H,
    ty: TypeId,
    reader: &mut LayoutReader<'_>,
    offset: &mut usize,
    dest: &mut [u8],
    src: &[u8],
    dialect: MultiDialect,
) {
    let head = read_multi_head(t, reader, dialect);
    let nested = *reader;
    let nested_start = *offset;
    let src_tag = head.tag_of(src, *offset);
    let dest_tag = head.tag_of(dest, *offset);
    reader.skip(head.ref_count_bytes + head.num_payloads * WORD_SIZE);
    let n = head.num_payloads;

    if src_tag < n && dest_tag < n {
        *offset += head.enum_size;
        let src_case = nested.peek_u64_at(src_tag * WORD_SIZE) as usize;
        let dest_case = nested.peek_u64_at(dest_tag * WORD_SIZE) as usize;
        let mut src_reader = nested;
        let mut dest_reader = nested;
        src_reader.skip(n * WORD_SIZE + src_case);
        dest_reader.skip(n * WORD_SIZE + dest_case);
        let mut dest_offset = nested_start;
        walk_destroy(t, heap, ty, &mut dest_reader, &mut dest_offset, dest);
        let mut src_offset = nested_start;
        walk_init_with_copy(t, heap, ty, &mut src_reader, &mut src_offset, dest, src);
        let trailing = *offset - src_offset;
        if trailing > 0 {
            copy_range(dest, src, src_offset, trailing);
        }
    } else if src_tag < n {
        *offset += head.enum_size;
        let src_case = nested.peek_u64_at(src_tag * WORD_SIZE) as usize;
        let mut src_reader = nested;
        src_reader.skip(n * WORD_SIZE + src_case);
        let mut src_offset = nested_start;
        walk_init_with_copy(t, heap, ty, &mut src_reader, &mut src_offset, dest, src);
        let trailing = *offset - src_offset;
        if trailing > 0 {
            copy_range(dest, src, src_offset, trailing);
        }
    } else if dest_tag < n {
        let dest_case = nested.peek_u64_at(dest_tag * WORD_SIZE) as usize;
        let mut dest_reader = nested;
        dest_reader.skip(n * WORD_SIZE + dest_case);
        let mut dest_offset = nested_start;
        walk_destroy(t, heap, ty, &mut dest_reader, &mut dest_offset, dest);
        copy_range(dest, src, *offset, head.enum_size);
        *offset += head.enum_size;
    } else {
        copy_range(dest, src, *offset, head.enum_size);
        *offset += head.enum_size;
    }
}
