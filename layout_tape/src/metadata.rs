// Copyright 2026 the Layout Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Type metadata for the layout interpreter.
//!
//! A compiled module registers its aggregate types in a [`TypeTable`]; the
//! table owns each type's descriptor, its layout string once instantiated,
//! and the module's registries of enum-tag functions and metadata accessors.
//! Layout strings embed [`TypeId`]s where they need to reference another
//! type, and [`FnKey`]s where they need to reference a registered function
//! (see `docs/format.md` for the wire encodings).
//!
//! The table also provides the single-payload extra-inhabitant witnesses a
//! generic enum descriptor delegates to: a type's extra inhabitants are the
//! `extra_inhabitants` consecutive little-endian values starting at
//! `xi_zero_value`, read and stored through the enum-element codec.

use alloc::vec::Vec;

use crate::tag::{load_enum_element, read_tag_bytes, store_enum_element, store_tag_bytes};

/// A handle to a type registered in a [`TypeTable`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

/// A handle to a function registered in a [`TypeTable`].
///
/// Enum-tag functions and metadata accessors live in separate registries; the
/// opcode consuming a key determines which registry it indexes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FnKey(pub u32);

/// Reads the discriminator of an enum value. The slice starts at the enum.
pub type GetEnumTagFn = fn(&[u8]) -> u32;

/// Produces the concrete type of a resilient field from the enclosing type's
/// generic arguments.
pub type MetadataAccessorFn = fn(&[TypeId]) -> TypeId;

/// Layout properties of a registered type.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct LayoutFlags {
    /// A raw byte copy suffices to transfer ownership of a value.
    pub is_bitwise_takable: bool,
    /// Values fit inline in a 3-word buffer.
    pub is_value_inline: bool,
}

/// A type descriptor.
#[derive(Clone, Debug)]
pub struct TypeDesc {
    /// Byte size of a value.
    pub size: usize,
    /// Required alignment of a value.
    pub align: usize,
    /// Layout properties.
    pub flags: LayoutFlags,
    /// Number of extra inhabitants (unused bit patterns) in a value.
    pub extra_inhabitants: u32,
    /// First extra-inhabitant bit pattern, as a little-endian value.
    pub xi_zero_value: u64,
    /// Generic arguments fed to metadata accessors for resilient fields.
    pub generic_args: Vec<TypeId>,
}

impl TypeDesc {
    /// Creates a plain-data descriptor: bitwise takable, no extra
    /// inhabitants, no generic arguments.
    #[must_use]
    pub fn plain(size: usize, align: usize) -> Self {
        Self {
            size,
            align,
            flags: LayoutFlags {
                is_bitwise_takable: true,
                is_value_inline: true,
            },
            extra_inhabitants: 0,
            xi_zero_value: 0,
            generic_args: Vec::new(),
        }
    }
}

#[derive(Clone, Debug)]
struct TypeEntry {
    desc: TypeDesc,
    layout: Option<Vec<u8>>,
}

/// The module-owned registry of types, layout strings, and functions.
#[derive(Clone, Debug, Default)]
pub struct TypeTable {
    types: Vec<TypeEntry>,
    enum_tag_fns: Vec<GetEnumTagFn>,
    accessors: Vec<MetadataAccessorFn>,
}

impl TypeTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type and returns its handle.
    pub fn register(&mut self, desc: TypeDesc) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(TypeEntry { desc, layout: None });
        id
    }

    /// Registers an enum-tag function and returns its key.
    pub fn register_enum_tag_fn(&mut self, f: GetEnumTagFn) -> FnKey {
        let key = FnKey(self.enum_tag_fns.len() as u32);
        self.enum_tag_fns.push(f);
        key
    }

    /// Registers a metadata accessor and returns its key.
    pub fn register_accessor(&mut self, f: MetadataAccessorFn) -> FnKey {
        let key = FnKey(self.accessors.len() as u32);
        self.accessors.push(f);
        key
    }

    /// Binds a layout string to a registered type.
    pub fn instantiate_layout_string(&mut self, ty: TypeId, layout: Vec<u8>) {
        self.types[ty.0 as usize].layout = Some(layout);
    }

    /// Returns the descriptor of `ty`.
    #[must_use]
    pub fn desc(&self, ty: TypeId) -> &TypeDesc {
        &self.types[ty.0 as usize].desc
    }

    /// Returns the layout string bound to `ty`, if any.
    #[must_use]
    pub fn layout(&self, ty: TypeId) -> Option<&[u8]> {
        self.types[ty.0 as usize].layout.as_deref()
    }

    /// Resolves an enum-tag function key.
    #[must_use]
    pub fn enum_tag_fn(&self, key: FnKey) -> GetEnumTagFn {
        self.enum_tag_fns[key.0 as usize]
    }

    /// Resolves a metadata accessor key.
    #[must_use]
    pub fn accessor(&self, key: FnKey) -> MetadataAccessorFn {
        self.accessors[key.0 as usize]
    }

    /// Reads the single-payload enum tag of a value of `ty` with
    /// `num_empty_cases` empty cases layered on top of it.
    ///
    /// Returns 0 when the value is a valid payload, otherwise `1 + index` of
    /// the active empty case. `bytes` starts at the value; extra tag bytes,
    /// if any are needed, live directly after it.
    #[must_use]
    pub fn get_enum_tag_single_payload(
        &self,
        ty: TypeId,
        bytes: &[u8],
        num_empty_cases: u32,
    ) -> u32 {
        let desc = self.desc(ty);
        let size = desc.size;
        let num_xi = desc.extra_inhabitants;

        let extra_tag_bytes = extra_tag_byte_count(size, num_empty_cases, num_xi);
        if extra_tag_bytes != 0 {
            let tag = read_tag_bytes(&bytes[size..], extra_tag_bytes);
            if tag != 0 {
                let case_from_extra = if size >= 4 {
                    0
                } else {
                    ((tag as u32) - 1) << (size * 8)
                };
                let case_from_value = load_enum_element(bytes, size);
                return (case_from_extra | case_from_value) + num_xi + 1;
            }
        }

        if num_xi != 0 {
            let value = u64::from(load_enum_element(bytes, size));
            let index = value.wrapping_sub(desc.xi_zero_value);
            if index < u64::from(num_xi) {
                return index as u32 + 1;
            }
        }

        0
    }

    /// Stores the single-payload enum tag of a value of `ty`.
    ///
    /// The inverse of [`TypeTable::get_enum_tag_single_payload`]: tag 0
    /// selects the payload case (clearing any extra tag bytes), tags within
    /// the extra-inhabitant space store the corresponding bit pattern, and
    /// tags beyond it split the case index between payload bytes and extra
    /// tag bytes.
    pub fn store_enum_tag_single_payload(
        &self,
        ty: TypeId,
        bytes: &mut [u8],
        tag: u32,
        num_empty_cases: u32,
    ) {
        let desc = self.desc(ty);
        let size = desc.size;
        let num_xi = desc.extra_inhabitants;
        let extra_tag_bytes = extra_tag_byte_count(size, num_empty_cases, num_xi);

        if tag <= num_xi {
            if extra_tag_bytes != 0 {
                store_tag_bytes(&mut bytes[size..], 0, extra_tag_bytes);
            }
            if tag == 0 {
                return;
            }
            store_enum_element(bytes, desc.xi_zero_value + u64::from(tag - 1), size);
            return;
        }

        let case_index = tag - 1 - num_xi;
        let (extra_tag, payload_value) = if size >= 4 {
            (1, case_index)
        } else {
            let payload_bits = size as u32 * 8;
            (
                1 + (case_index >> payload_bits),
                case_index & ((1u32 << payload_bits) - 1),
            )
        };
        if size > 0 {
            store_enum_element(bytes, u64::from(payload_value), size);
        }
        if extra_tag_bytes != 0 {
            store_tag_bytes(&mut bytes[size..], u64::from(extra_tag), extra_tag_bytes);
        }
    }
}

/// Encodes an optional embedded type reference as a layout-string word.
///
/// `0` means "no type"; any other value is the [`TypeId`] plus one.
#[must_use]
pub fn encode_type_ref(ty: Option<TypeId>) -> u64 {
    match ty {
        Some(ty) => u64::from(ty.0) + 1,
        None => 0,
    }
}

/// Decodes an embedded type-reference word.
#[must_use]
pub fn decode_type_ref(word: u64) -> Option<TypeId> {
    if word == 0 {
        None
    } else {
        Some(TypeId((word - 1) as u32))
    }
}

/// Number of extra tag bytes a single-payload enum needs after a
/// `payload_size`-byte payload with `num_xi` extra inhabitants to represent
/// `num_empty_cases` empty cases.
#[must_use]
pub fn extra_tag_byte_count(payload_size: usize, num_empty_cases: u32, num_xi: u32) -> usize {
    if num_empty_cases <= num_xi {
        return 0;
    }
    let spilled = u64::from(num_empty_cases - num_xi);
    let extra_tags = if payload_size >= 4 {
        1
    } else {
        let per_tag = 1u64 << (payload_size * 8);
        1 + (spilled - 1) / per_tag
    };
    // The zero tag value is reserved for the payload case.
    if extra_tags < 0xFF {
        1
    } else if extra_tags < 0xFFFF {
        2
    } else {
        4
    }
}
