// Copyright 2026 the Layout Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layout-string disassembler.
//!
//! Renders an entry stream as one line per entry for debugging emitters and
//! resolver output. Single-payload sub-programs print inline (they are
//! stream continuations); multi-payload cases print indented under their
//! enum.

use alloc::string::String;
use core::fmt::Write as _;

use crate::format::{LAYOUT_STRING_HEADER_SIZE, LayoutReader, read_u64_at};
use crate::heap::WORD_SIZE;
use crate::opcode::{RefCountKind, SKIP_BITS_MASK};

/// Renders `layout` (header included) as human-readable text.
#[must_use]
pub fn disassemble(layout: &[u8]) -> String {
    let mut out = String::new();
    let stream_len = read_u64_at(layout, 0);
    let size = read_u64_at(layout, 8);
    let _ = writeln!(out, "layout string: value size {size}, entry stream {stream_len} bytes");
    walk(&mut out, &layout[LAYOUT_STRING_HEADER_SIZE..], 0, 1);
    out
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn walk(out: &mut String, entries: &[u8], start: usize, depth: usize) {
    let mut r = LayoutReader::with_offset(entries, start);
    loop {
        let word = r.read_u64();
        let skip = word & SKIP_BITS_MASK;
        let Some(kind) = RefCountKind::from_entry_word(word) else {
            indent(out, depth);
            let _ = writeln!(out, "+{skip} <invalid opcode {:#04x}>", word >> 56);
            return;
        };
        indent(out, depth);
        match kind {
            RefCountKind::End => {
                let _ = writeln!(out, "+{skip} end");
                return;
            }
            RefCountKind::Metatype => {
                let type_ref = r.read_u64();
                let _ = writeln!(out, "+{skip} metatype type_ref={type_ref}");
            }
            RefCountKind::Resilient => {
                let key = r.read_relative_reference();
                let _ = writeln!(out, "+{skip} resilient accessor={key}");
            }
            RefCountKind::SinglePayloadEnumSimple => {
                let packed = r.read_u64();
                let payload_size = r.read_u64();
                let zero_tag = r.read_u64();
                let xi_values = r.read_u64();
                let ref_count_bytes = r.read_u64();
                let empty_skip = r.read_u64();
                let _ = writeln!(
                    out,
                    "+{skip} {} payload_size={payload_size} zero_tag={zero_tag} \
                     xi_values={xi_values} packed={packed:#x} \
                     ref_count_bytes={ref_count_bytes} skip={empty_skip}",
                    kind.mnemonic(),
                );
            }
            RefCountKind::SinglePayloadEnumFn | RefCountKind::SinglePayloadEnumFnResolved => {
                let key = if kind == RefCountKind::SinglePayloadEnumFn {
                    r.read_relative_reference()
                } else {
                    r.read_u64() as u32
                };
                let ref_count_bytes = r.read_u64();
                let empty_skip = r.read_u64();
                let _ = writeln!(
                    out,
                    "+{skip} {} tag_fn={key} ref_count_bytes={ref_count_bytes} skip={empty_skip}",
                    kind.mnemonic(),
                );
            }
            RefCountKind::SinglePayloadEnumGeneric => {
                let packed = r.read_u64();
                let payload_size = r.read_u64();
                let xi_type = r.read_u64();
                let num_empty_cases = r.read_u32();
                let ref_count_bytes = r.read_u64();
                let empty_skip = r.read_u64();
                let _ = writeln!(
                    out,
                    "+{skip} {} payload_size={payload_size} xi_type_ref={xi_type} \
                     empty_cases={num_empty_cases} packed={packed:#x} \
                     ref_count_bytes={ref_count_bytes} skip={empty_skip}",
                    kind.mnemonic(),
                );
            }
            RefCountKind::MultiPayloadEnumFn
            | RefCountKind::MultiPayloadEnumFnResolved
            | RefCountKind::MultiPayloadEnumGeneric => {
                let mut head = String::new();
                match kind {
                    RefCountKind::MultiPayloadEnumFn => {
                        let _ = write!(head, "tag_fn={}", r.read_relative_reference());
                    }
                    RefCountKind::MultiPayloadEnumFnResolved => {
                        let _ = write!(head, "tag_fn={}", r.read_u64() as u32);
                    }
                    _ => {
                        let _ = write!(head, "tag_bytes={}", r.read_u64());
                    }
                }
                let num_payloads = r.read_u64() as usize;
                let ref_count_bytes = r.read_u64() as usize;
                let enum_size = r.read_u64();
                let _ = writeln!(
                    out,
                    "+{skip} {} {head} payloads={num_payloads} enum_size={enum_size} \
                     ref_count_bytes={ref_count_bytes}",
                    kind.mnemonic(),
                );
                let cases_base = r.offset() + num_payloads * WORD_SIZE;
                for i in 0..num_payloads {
                    let case_offset = r.read_u64() as usize;
                    indent(out, depth + 1);
                    let _ = writeln!(out, "case {i}:");
                    walk(out, entries, cases_base + case_offset, depth + 2);
                }
                r.skip(ref_count_bytes);
            }
            _ => {
                let _ = writeln!(out, "+{skip} {}", kind.mnemonic());
            }
        }
    }
}
