// Copyright 2026 the Layout Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `layout_tape`: byte-code layout strings and the runtime interpreter that
//! executes them over raw value buffers.
//!
//! A compiler emits, per aggregate type, a compact *layout string* naming
//! where the reference-bearing fields of a value live: plain byte spans,
//! strong/weak/unowned slots, nested enums whose payloads are interpreted
//! per-tag, delegated fields, and resiliently-opaque fields resolved at load
//! time. At run time the [`interp::Interp`] engines (destroy, init-with-copy,
//! init-with-take, assign-with-copy, assign-with-take) walk the string
//! against caller-owned buffers and route every reference effect through an
//! embedder's [`heap::HeapRuntime`]. The wire format lives in
//! `docs/format.md`.
//!
//! ## Example
//!
//! Discriminator access needs no heap runtime at all:
//!
//! ```
//! use layout_tape::builder::{LayoutBuilder, SimpleEnumLayout};
//! use layout_tape::enum_tag::{
//!     enum_simple_destructive_inject_enum_tag, enum_simple_get_enum_tag,
//! };
//! use layout_tape::metadata::{TypeDesc, TypeTable};
//!
//! // A single-payload enum over a 4-byte plain payload with two
//! // extra-inhabitant patterns starting at 0x10, plus one extra tag byte.
//! let mut table = TypeTable::new();
//! let ty = table.register(TypeDesc::plain(5, 4));
//!
//! let mut b = LayoutBuilder::new();
//! b.single_payload_enum_simple(
//!     &SimpleEnumLayout {
//!         extra_tag_byte_count: 1,
//!         xi_tag_byte_count: 4,
//!         xi_tag_offset: 0,
//!         payload_size: 4,
//!         zero_tag_value: 0x10,
//!         xi_tag_values: 2,
//!         skip: 5,
//!     },
//!     |_| {}, // the payload is plain data
//! );
//! table.instantiate_layout_string(ty, b.finish(5));
//!
//! let mut value = [0u8; 5];
//! enum_simple_destructive_inject_enum_tag(&table, ty, &mut value, 2);
//! assert_eq!(enum_simple_get_enum_tag(&table, ty, &value), 2);
//! ```

#![no_std]

extern crate alloc;

pub mod builder;
pub mod disasm;
pub mod enum_tag;
pub mod format;
pub mod heap;
pub mod interp;
pub mod metadata;
pub mod opcode;
pub mod resolve;
pub mod tag;
