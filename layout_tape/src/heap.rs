// Copyright 2026 the Layout Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Heap-runtime ABI for the layout interpreter.
//!
//! The interpreter delegates every reference-count effect to an
//! embedder-provided [`HeapRuntime`]. Reference slots in value buffers are
//! 8-byte little-endian [`Word`]s; the interpreter loads and stores them, and
//! hands the runtime the word values. Strong-family words are masked with
//! [`SPARE_BITS_MASK`] before reaching the runtime, but the stored word is
//! always preserved verbatim in destinations.
//!
//! The weak and unknown-unowned families own side-table state keyed by slot
//! contents, so their copy/take operations return the word to store into the
//! destination slot instead of the interpreter copying bits blindly.

/// A reference slot value.
pub type Word = u64;

/// Byte width of a reference slot.
pub const WORD_SIZE: usize = 8;

/// Pointer bits guaranteed zero by the calling convention, available for tag
/// encodings. Masked off before a word reaches the runtime.
pub const SPARE_BITS_MASK: Word = 0xF800_0000_0000_0007;

/// Low bits reserved for foreign tagged-pointer encodings. A word with any of
/// these set never reaches the foreign retain/release primitives.
pub const OBJC_RESERVED_BITS_MASK: Word = 0x1;

/// Reads the reference word at `offset` in `bytes`.
#[must_use]
pub fn read_word(bytes: &[u8], offset: usize) -> Word {
    let b = &bytes[offset..offset + WORD_SIZE];
    Word::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
}

/// Stores the reference word at `offset` in `bytes`.
pub fn write_word(bytes: &mut [u8], offset: usize, word: Word) {
    bytes[offset..offset + WORD_SIZE].copy_from_slice(&word.to_le_bytes());
}

/// Reference-count primitives the interpreter invokes.
///
/// Every method must be safe to call with any word a well-formed value can
/// hold, including extra-inhabitant bit patterns the interpreter was steered
/// away from by enum discriminators (it never is, but the runtime must not
/// assume liveness beyond what its own side tables record). Implementations
/// are expected to be thread-safe at the primitive level; the interpreter
/// adds no locking.
pub trait HeapRuntime {
    /// Increments the strong count of a native object.
    fn retain(&mut self, object: Word);
    /// Decrements the strong count of a native object.
    fn release(&mut self, object: Word);

    /// Increments the unowned count of a native object.
    fn unowned_retain(&mut self, object: Word);
    /// Decrements the unowned count of a native object.
    fn unowned_release(&mut self, object: Word);

    /// Initializes a weak slot from a live weak slot; returns the word to
    /// store in the destination.
    fn weak_copy_init(&mut self, src: Word) -> Word;
    /// Reassigns a live weak slot from another; returns the word to store.
    fn weak_copy_assign(&mut self, dest: Word, src: Word) -> Word;
    /// Moves a weak slot, consuming the source; returns the word to store.
    fn weak_take_init(&mut self, src: Word) -> Word;
    /// Destroys a weak slot.
    fn weak_destroy(&mut self, slot: Word);

    /// Increments the strong count of an object of unknown origin.
    fn unknown_retain(&mut self, object: Word);
    /// Decrements the strong count of an object of unknown origin.
    fn unknown_release(&mut self, object: Word);

    /// Initializes an unknown-origin unowned slot; returns the word to store.
    fn unknown_unowned_copy_init(&mut self, src: Word) -> Word;
    /// Reassigns an unknown-origin unowned slot; returns the word to store.
    fn unknown_unowned_copy_assign(&mut self, dest: Word, src: Word) -> Word;
    /// Destroys an unknown-origin unowned slot.
    fn unknown_unowned_destroy(&mut self, slot: Word);

    /// Initializes an unknown-origin weak slot; returns the word to store.
    fn unknown_weak_copy_init(&mut self, src: Word) -> Word;
    /// Reassigns an unknown-origin weak slot; returns the word to store.
    fn unknown_weak_copy_assign(&mut self, dest: Word, src: Word) -> Word;
    /// Moves an unknown-origin weak slot, consuming the source; returns the
    /// word to store.
    fn unknown_weak_take_init(&mut self, src: Word) -> Word;
    /// Destroys an unknown-origin weak slot.
    fn unknown_weak_destroy(&mut self, slot: Word);

    /// Increments the count of a bridge object.
    fn bridge_retain(&mut self, object: Word);
    /// Decrements the count of a bridge object.
    fn bridge_release(&mut self, object: Word);

    /// Increments the count of an error box.
    fn error_retain(&mut self, object: Word);
    /// Decrements the count of an error box.
    fn error_release(&mut self, object: Word);

    /// Copies a block; returns the word to store in the destination.
    fn block_copy(&mut self, block: Word) -> Word;
    /// Releases a block.
    fn block_release(&mut self, block: Word);

    /// Increments the count of a foreign object.
    fn objc_retain(&mut self, object: Word);
    /// Decrements the count of a foreign object.
    fn objc_release(&mut self, object: Word);
}
