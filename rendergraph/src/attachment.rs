//! Built-in `ImageAttachment` composite (spec.md §3 "ImageView").
//!
//! An image attachment's extent/sample-count/layer-count/mip-count are
//! frequently left unspecified by the caller and filled in later by Reify
//! Inference (§4.5); modelling them as ordinary composite members (rather
//! than a special node kind) lets the existing `CONSTRUCT`/placeholder
//! machinery do that inference without a parallel code path, the same way
//! `autograph_api`'s `image::Dimensions` enum (`render/src/image.rs`)
//! reuses one shape across 1D/2D/3D/array/cubemap images instead of one
//! type per image kind.

use crate::types::{CompositeType, MemberDesc};
use std::fmt;

// `CONSTRUCT`'s `args[0]` is reserved, for every composite, as an optional
// "known aggregate" to inherit unset fields from (spec.md §4.5 "For a
// CONSTRUCT whose first argument is a known aggregate, copy non-default
// fields from that argument"); a `Placeholder` in that slot means "no
// base" (see `reify::propagate_inherited_defaults`). Named fields occupy
// `args[1..]`, offset by one from their `CompositeType::MEMBERS` index.
pub const BASE_SLOT: usize = 0;
pub const FIELD_WIDTH: usize = 1;
pub const FIELD_HEIGHT: usize = 2;
pub const FIELD_DEPTH: usize = 3;
pub const FIELD_SAMPLES: usize = 4;
pub const FIELD_BASE_LEVEL: usize = 5;
pub const FIELD_LEVEL_COUNT: usize = 6;
pub const FIELD_BASE_LAYER: usize = 7;
pub const FIELD_LAYER_COUNT: usize = 8;
pub const FIELD_FORMAT: usize = 9;
/// Member count as seen by `CompositeType` (no base slot).
pub const IMAGE_ATTACHMENT_FIELD_COUNT: usize = 9;
/// `CONSTRUCT::args` length: one base slot plus every member.
pub const IMAGE_ATTACHMENT_ARG_COUNT: usize = 10;

/// Marker type registered once with the type interner via
/// `Types::register_composite::<ImageAttachment>`. Carries no Rust-level
/// data itself — the actual per-value fields live as `CONSTRUCT` arguments
/// in the IR, addressed by the `FIELD_*` constants above.
pub struct ImageAttachment;

const MEMBERS: &[MemberDesc] = &[
    MemberDesc { name: "width" },
    MemberDesc { name: "height" },
    MemberDesc { name: "depth" },
    MemberDesc { name: "samples" },
    MemberDesc { name: "base_level" },
    MemberDesc { name: "level_count" },
    MemberDesc { name: "base_layer" },
    MemberDesc { name: "layer_count" },
    MemberDesc { name: "format" },
];

impl CompositeType for ImageAttachment {
    const MEMBERS: &'static [MemberDesc] = MEMBERS;

    fn member_count() -> usize {
        IMAGE_ATTACHMENT_FIELD_COUNT
    }

    // Every field of an attachment may be inherited from a co-attached
    // image in the same renderpass (spec.md §4.5 framebuffer inference),
    // so all fields default-copy.
    fn is_default(_index: usize) -> bool {
        true
    }

    fn format_member_to(&self, _index: usize, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<attachment field>")
    }
}

/// `BufferResource` plays the equivalent role for buffers: a single
/// placeholder-able `size` field (spec.md §4.3 `subrange(off,len)` /
/// `same_size`/`set_size`).
pub struct BufferResource;

const BUFFER_MEMBERS: &[MemberDesc] = &[MemberDesc { name: "size" }];
pub const BUFFER_BASE_SLOT: usize = 0;
pub const FIELD_BUFFER_SIZE: usize = 1;
pub const BUFFER_FIELD_COUNT: usize = 1;
pub const BUFFER_ARG_COUNT: usize = 2;

impl CompositeType for BufferResource {
    const MEMBERS: &'static [MemberDesc] = BUFFER_MEMBERS;

    fn member_count() -> usize {
        BUFFER_FIELD_COUNT
    }

    fn is_default(_index: usize) -> bool {
        true
    }

    fn format_member_to(&self, _index: usize, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<buffer field>")
    }
}
