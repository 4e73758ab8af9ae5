// Copyright 2026 the Layout Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

#![allow(missing_docs, reason = "benchmark crate")]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use layout_tape::builder::{LayoutBuilder, SimpleEnumLayout};
use layout_tape::heap::{HeapRuntime, WORD_SIZE, Word, write_word};
use layout_tape::interp::Interp;
use layout_tape::metadata::{LayoutFlags, TypeDesc, TypeId, TypeTable};
use layout_tape::opcode::RefCountKind;

/// A heap runtime that does nothing, to measure pure interpreter overhead.
struct NopHeap;

impl HeapRuntime for NopHeap {
    fn retain(&mut self, _object: Word) {}
    fn release(&mut self, _object: Word) {}
    fn unowned_retain(&mut self, _object: Word) {}
    fn unowned_release(&mut self, _object: Word) {}
    fn weak_copy_init(&mut self, src: Word) -> Word {
        src
    }
    fn weak_copy_assign(&mut self, _dest: Word, src: Word) -> Word {
        src
    }
    fn weak_take_init(&mut self, src: Word) -> Word {
        src
    }
    fn weak_destroy(&mut self, _slot: Word) {}
    fn unknown_retain(&mut self, _object: Word) {}
    fn unknown_release(&mut self, _object: Word) {}
    fn unknown_unowned_copy_init(&mut self, src: Word) -> Word {
        src
    }
    fn unknown_unowned_copy_assign(&mut self, _dest: Word, src: Word) -> Word {
        src
    }
    fn unknown_unowned_destroy(&mut self, _slot: Word) {}
    fn unknown_weak_copy_init(&mut self, src: Word) -> Word {
        src
    }
    fn unknown_weak_copy_assign(&mut self, _dest: Word, src: Word) -> Word {
        src
    }
    fn unknown_weak_take_init(&mut self, src: Word) -> Word {
        src
    }
    fn unknown_weak_destroy(&mut self, _slot: Word) {}
    fn bridge_retain(&mut self, _object: Word) {}
    fn bridge_release(&mut self, _object: Word) {}
    fn error_retain(&mut self, _object: Word) {}
    fn error_release(&mut self, _object: Word) {}
    fn block_copy(&mut self, block: Word) -> Word {
        block
    }
    fn block_release(&mut self, _block: Word) {}
    fn objc_retain(&mut self, _object: Word) {}
    fn objc_release(&mut self, _object: Word) {}
}

fn register_pair(table: &mut TypeTable) -> TypeId {
    let ty = table.register(TypeDesc {
        size: 16,
        align: 8,
        flags: LayoutFlags {
            is_bitwise_takable: true,
            is_value_inline: true,
        },
        extra_inhabitants: 0,
        xi_zero_value: 0,
        generic_args: Vec::new(),
    });
    let mut b = LayoutBuilder::new();
    b.skip(8);
    b.ref_slot(RefCountKind::NativeStrong);
    table.instantiate_layout_string(ty, b.finish(16));
    ty
}

fn register_option_ref(table: &mut TypeTable) -> TypeId {
    let ty = table.register(TypeDesc {
        size: 8,
        align: 8,
        flags: LayoutFlags {
            is_bitwise_takable: false,
            is_value_inline: true,
        },
        extra_inhabitants: 0,
        xi_zero_value: 0,
        generic_args: Vec::new(),
    });
    let mut b = LayoutBuilder::new();
    b.single_payload_enum_simple(
        &SimpleEnumLayout {
            extra_tag_byte_count: 0,
            xi_tag_byte_count: 8,
            xi_tag_offset: 0,
            payload_size: 8,
            zero_tag_value: 0,
            xi_tag_values: 1,
            skip: 8,
        },
        |b| b.ref_slot(RefCountKind::NativeStrong),
    );
    table.instantiate_layout_string(ty, b.finish(8));
    ty
}

fn bench_array_init_with_copy(c: &mut Criterion) {
    let mut group = c.benchmark_group("array_init_with_copy_pairs");
    for &count in &[16usize, 256, 4096] {
        let mut table = TypeTable::new();
        let pair = register_pair(&mut table);
        let mut src = vec![0u8; count * 16];
        for i in 0..count {
            write_word(&mut src, i * 16 + WORD_SIZE, 0xA000);
        }
        let mut dest = vec![0u8; count * 16];
        let mut heap = NopHeap;
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                let mut interp = Interp::new(&table, &mut heap);
                interp.array_init_with_copy(pair, &mut dest, &src, count, 16);
                black_box(&dest);
            });
        });
    }
    group.finish();
}

fn bench_array_destroy(c: &mut Criterion) {
    let mut group = c.benchmark_group("array_destroy_pairs");
    for &count in &[16usize, 256, 4096] {
        let mut table = TypeTable::new();
        let pair = register_pair(&mut table);
        let mut values = vec![0u8; count * 16];
        for i in 0..count {
            write_word(&mut values, i * 16 + WORD_SIZE, 0xA000);
        }
        let mut heap = NopHeap;
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                let mut interp = Interp::new(&table, &mut heap);
                interp.array_destroy(pair, &mut values, count, 16);
                black_box(&values);
            });
        });
    }
    group.finish();
}

fn bench_enum_walk(c: &mut Criterion) {
    let mut group = c.benchmark_group("option_ref_destroy");
    let mut table = TypeTable::new();
    let option = register_option_ref(&mut table);
    let mut heap = NopHeap;

    let mut some = [0u8; 8];
    write_word(&mut some, 0, 0xA000);
    group.bench_function("some", |b| {
        b.iter(|| {
            let mut value = some;
            Interp::new(&table, &mut heap).destroy(option, &mut value);
            black_box(value);
        });
    });

    let none = [0u8; 8];
    group.bench_function("none", |b| {
        b.iter(|| {
            let mut value = none;
            Interp::new(&table, &mut heap).destroy(option, &mut value);
            black_box(value);
        });
    });
    group.finish();
}

fn bench_interp(c: &mut Criterion) {
    bench_array_init_with_copy(c);
    bench_array_destroy(c);
    bench_enum_walk(c);
}

criterion_group!(benches, bench_interp);
criterion_main!(benches);
