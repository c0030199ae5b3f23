//! Type interner.
//!
//! Mirrors the interning discipline of `autograph_spirv::TypeDesc`
//! (`examples/ennis-autograph-ng/spirv/src/lib.rs`): a small set of type
//! constructors, content-hash based deduplication, and a `stripped` helper
//! that peels the `Aliased`/`Imbued` wrapper layers. Where `TypeDesc` used a
//! `'tcx` arena lifetime tied to a single SPIR-V module, this interner uses
//! a `Module`-scoped `u32` index (`TypeId`) instead, so a `Type` can be
//! copied freely without borrowing the arena — the same tradeoff
//! `autograph_api`'s `typed-arena`/`dropless-arena` dependencies make for
//! its own long-lived interned data.

use crate::domain::Domain;
use crate::error::{InvalidType, Result};
use bitflags::bitflags;
use fxhash::FxHashMap;
use std::any::Any;
use std::fmt;
use std::rc::Rc;

bitflags! {
    /// Symbolic read/write permission attached to a pass argument or
    /// result. Drives barrier generation in the scheduler.
    pub struct Access: u32 {
        const TRANSFER_READ       = 0b0000_0000_0001;
        const TRANSFER_WRITE      = 0b0000_0000_0010;
        const COLOR_READ          = 0b0000_0000_0100;
        const COLOR_WRITE         = 0b0000_0000_1000;
        const COLOR_RESOLVE_READ  = 0b0000_0001_0000;
        const COLOR_RESOLVE_WRITE = 0b0000_0010_0000;
        const DEPTH_STENCIL_READ  = 0b0000_0100_0000;
        const DEPTH_STENCIL_WRITE = 0b0000_1000_0000;
        const FRAGMENT_SAMPLED    = 0b0001_0000_0000;
        const FRAGMENT_RW         = 0b0010_0000_0000;
        const COMPUTE_SAMPLED     = 0b0100_0000_0000;
        const COMPUTE_RW          = 0b1000_0000_0000;
        const HOST_READ           = 0b0001_0000_0000_0000;
        const HOST_WRITE          = 0b0010_0000_0000_0000;

        const WRITE_BITS = Self::TRANSFER_WRITE.bits
            | Self::COLOR_WRITE.bits
            | Self::COLOR_RESOLVE_WRITE.bits
            | Self::DEPTH_STENCIL_WRITE.bits
            | Self::FRAGMENT_RW.bits
            | Self::COMPUTE_RW.bits
            | Self::HOST_WRITE.bits;
    }
}

impl Access {
    /// Any bit in `self` implies a write-like final use: a resource has at
    /// most one such use live at a time.
    pub fn is_write(self) -> bool {
        self.intersects(Access::WRITE_BITS)
    }
}

/// Integer/float scalar kind with explicit bit-width, as opposed to
/// `autograph_spirv::PrimitiveType` which only distinguishes kind.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ScalarKind {
    Bool,
    Signed,
    Unsigned,
    Float,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Scalar {
    pub kind: ScalarKind,
    pub bits: u32,
}

/// `SLICE`/`Array` length: either a fixed count or "take everything after
/// the start index" (`MIP`/`LAYER` slices with `count = REMAINING`).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ArrayLen {
    Fixed(u32),
    Remaining,
}

pub type TypeId = u32;
pub type EnumId = u32;
pub type CompositeId = u32;
pub type OpaqueFnId = u32;

#[derive(Clone)]
pub struct EnumDesc {
    pub tag: &'static str,
    pub identity_hash: u64,
    pub format_to: fn(u64, &mut fmt::Formatter) -> fmt::Result,
}

/// One member of a `Composite` type: declaration-order name, byte offset
/// (used only for `format_to`/diagnostics — the IR never reads raw bytes),
/// and the member's own interned type.
#[derive(Copy, Clone, Debug)]
pub struct CompositeMember {
    pub name: &'static str,
    pub offset: usize,
    pub ty: TypeId,
}

/// Function-pointer-like hooks a user-defined aggregate exposes to the IR,
/// captured from a concrete `T: CompositeType` at
/// `Types::register_composite::<T>` time. `format_member` closes over a
/// `std::any::Any` trait object and downcasts back to `T` on call, the same
/// type-erasure idiom `src/frame/mod.rs`'s `Task`/`TaskDetails` use to let
/// heterogeneous task payloads live in one `petgraph::Graph`.
#[derive(Clone)]
pub struct CompositeVTable {
    pub is_default: fn(usize) -> bool,
    pub format_member: Rc<dyn Fn(&dyn Any, usize, &mut fmt::Formatter) -> fmt::Result>,
}

#[derive(Clone)]
pub struct CompositeDesc {
    pub tag: u64,
    pub members: Vec<CompositeMember>,
    pub content_hash: u64,
    pub vtable: CompositeVTable,
}

/// Per-member descriptor generated by `#[derive(Composite)]`.
#[derive(Copy, Clone, Debug)]
pub struct MemberDesc {
    pub name: &'static str,
}

/// Implemented by `#[derive(Composite)]`. See `rendergraph-macros`.
pub trait CompositeType: 'static {
    const MEMBERS: &'static [MemberDesc];

    fn member_count() -> usize;
    /// `true` means take this member from the aliased source; `false` means
    /// this member is explicit and overrides the aliased source's value.
    fn is_default(index: usize) -> bool;
    fn format_member_to(&self, index: usize, f: &mut fmt::Formatter) -> fmt::Result;
}

pub type PassCallback =
    Rc<dyn Fn(&mut dyn crate::command_buffer::CommandBuffer, &[crate::pass::Binding]) -> Result<()>>;

#[derive(Clone)]
pub struct OpaqueFnDesc {
    pub name: &'static str,
    pub args: Vec<TypeId>,
    pub rets: Vec<TypeId>,
    pub domain: Domain,
    pub callback: PassCallback,
}

#[derive(Clone)]
pub enum TypeKind {
    Scalar(Scalar),
    Enum(EnumId),
    EnumValue(TypeId, u64),
    Pointer(TypeId),
    ImageView,
    Array(TypeId, ArrayLen),
    Composite(CompositeId),
    /// Wraps a result type and records that the Nth argument of the owning
    /// `CALL` aliases this result.
    Aliased(TypeId, u32),
    /// Wraps a type and records an access mode on a `CALL`'s argument or
    /// result.
    Imbued(TypeId, Access),
    OpaqueFn(OpaqueFnId),
}

struct TypeRecord {
    kind: TypeKind,
}

/// The process-wide type interner.
///
/// One `Types` lives per `Module` (see `arena.rs`); `reset_between_compiles`
/// corresponds to dropping and recreating a `Module`.
pub struct Types {
    records: Vec<TypeRecord>,
    // Structural dedup keyed by a cheap discriminant tuple; composites and
    // enums dedup by (tag, hash) in their own side tables instead, since
    // their content can't cheaply round-trip through `TypeKind`'s derive.
    dedup: FxHashMap<(u8, u64, u64), TypeId>,
    enums: Vec<EnumDesc>,
    enums_by_hash: FxHashMap<u64, EnumId>,
    composites: Vec<CompositeDesc>,
    composites_by_hash: FxHashMap<(u64, u64), CompositeId>,
    opaque_fns: Vec<OpaqueFnDesc>,
}

impl Types {
    pub fn new() -> Self {
        Types {
            records: Vec::new(),
            dedup: FxHashMap::default(),
            enums: Vec::new(),
            enums_by_hash: FxHashMap::default(),
            composites: Vec::new(),
            composites_by_hash: FxHashMap::default(),
            opaque_fns: Vec::new(),
        }
    }

    fn emplace(&mut self, disc: u8, a: u64, b: u64, kind: TypeKind) -> TypeId {
        if let Some(&id) = self.dedup.get(&(disc, a, b)) {
            return id;
        }
        let id = self.records.len() as TypeId;
        self.records.push(TypeRecord { kind });
        self.dedup.insert((disc, a, b), id);
        id
    }

    pub fn kind(&self, ty: TypeId) -> &TypeKind {
        &self.records[ty as usize].kind
    }

    pub fn make_scalar(&mut self, kind: ScalarKind, bits: u32) -> TypeId {
        let disc = match kind {
            ScalarKind::Bool => 0,
            ScalarKind::Signed => 1,
            ScalarKind::Unsigned => 2,
            ScalarKind::Float => 3,
        };
        self.emplace(0, disc, bits as u64, TypeKind::Scalar(Scalar { kind, bits }))
    }

    pub fn make_enum(
        &mut self,
        tag: &'static str,
        identity_hash: u64,
        format_to: fn(u64, &mut fmt::Formatter) -> fmt::Result,
    ) -> TypeId {
        let enum_id = *self.enums_by_hash.entry(identity_hash).or_insert_with(|| {
            let id = self.enums.len() as EnumId;
            self.enums.push(EnumDesc {
                tag,
                identity_hash,
                format_to,
            });
            id
        });
        self.emplace(1, identity_hash, 0, TypeKind::Enum(enum_id))
    }

    pub fn make_enum_value(&mut self, enum_ty: TypeId, value: u64) -> TypeId {
        self.emplace(
            2,
            enum_ty as u64,
            value,
            TypeKind::EnumValue(enum_ty, value),
        )
    }

    pub fn make_pointer(&mut self, inner: TypeId) -> TypeId {
        self.emplace(3, inner as u64, 0, TypeKind::Pointer(inner))
    }

    pub fn make_imageview(&mut self) -> TypeId {
        self.emplace(4, 0, 0, TypeKind::ImageView)
    }

    pub fn make_array(&mut self, inner: TypeId, count: ArrayLen) -> Result<TypeId> {
        let count_key = match count {
            ArrayLen::Fixed(n) => {
                if (n as i64) < 0 {
                    return Err(InvalidType::NegativeArrayCount.into());
                }
                n as u64
            }
            ArrayLen::Remaining => u64::max_value(),
        };
        Ok(self.emplace(5, inner as u64, count_key, TypeKind::Array(inner, count)))
    }

    /// Registers (or looks up) a composite type from its generated
    /// `CompositeType` impl. `tag` is a user-supplied disambiguator for
    /// otherwise-identical layouts that should not alias (e.g. two
    /// structurally identical attachment descriptions used for unrelated
    /// purposes) — composites are interned by content hash plus this tag.
    pub fn register_composite<T: CompositeType>(
        &mut self,
        tag: u64,
        member_types: &[TypeId],
    ) -> Result<TypeId> {
        if member_types.len() != T::MEMBERS.len() {
            return Err(InvalidType::MismatchedMemberOffsets.into());
        }
        let members: Vec<CompositeMember> = T::MEMBERS
            .iter()
            .zip(member_types.iter())
            .enumerate()
            .map(|(i, (m, &ty))| CompositeMember {
                name: m.name,
                offset: i,
                ty,
            })
            .collect();

        let content_hash = {
            use std::hash::{Hash, Hasher};
            let mut hasher = fxhash::FxHasher::default();
            tag.hash(&mut hasher);
            for m in &members {
                m.name.hash(&mut hasher);
                m.ty.hash(&mut hasher);
            }
            hasher.finish()
        };

        let vtable = CompositeVTable {
            is_default: T::is_default,
            format_member: Rc::new(|value: &dyn Any, index: usize, f: &mut fmt::Formatter| {
                value
                    .downcast_ref::<T>()
                    .expect("composite vtable type mismatch")
                    .format_member_to(index, f)
            }),
        };

        let composite_id = match self.composites_by_hash.get(&(content_hash, tag)) {
            Some(&id) => id,
            None => {
                let id = self.composites.len() as CompositeId;
                self.composites.push(CompositeDesc {
                    tag,
                    members,
                    content_hash,
                    vtable,
                });
                self.composites_by_hash.insert((content_hash, tag), id);
                id
            }
        };

        Ok(self.emplace(
            6,
            content_hash,
            tag,
            TypeKind::Composite(composite_id),
        ))
    }

    pub fn composite(&self, id: CompositeId) -> &CompositeDesc {
        &self.composites[id as usize]
    }

    pub fn make_aliased(&mut self, inner: TypeId, arg_index: u32) -> TypeId {
        self.emplace(
            7,
            inner as u64,
            arg_index as u64,
            TypeKind::Aliased(inner, arg_index),
        )
    }

    pub fn make_imbued(&mut self, inner: TypeId, access: Access) -> TypeId {
        self.emplace(
            8,
            inner as u64,
            access.bits() as u64,
            TypeKind::Imbued(inner, access),
        )
    }

    pub fn make_opaque_fn(
        &mut self,
        name: &'static str,
        args: Vec<TypeId>,
        rets: Vec<TypeId>,
        domain: Domain,
        callback: PassCallback,
    ) -> Result<TypeId> {
        let id = self.opaque_fns.len() as OpaqueFnId;
        self.opaque_fns.push(OpaqueFnDesc {
            name,
            args,
            rets,
            domain,
            callback,
        });
        // Opaque-fns are identified by declaration site, not structurally
        // interned: two passes with identical signatures are still
        // distinct passes. `Rc::as_ptr`-style identity would require the
        // callback to already be allocated; we key on the fresh id itself
        // so every `make_opaque_fn` call yields a new type, matching
        // `make_pass`'s "records a pass template" semantics.
        Ok(self.emplace(9, id as u64, 0, TypeKind::OpaqueFn(id)))
    }

    pub fn opaque_fn(&self, id: OpaqueFnId) -> &OpaqueFnDesc {
        &self.opaque_fns[id as usize]
    }

    /// Peels `Aliased`/`Imbued` wrapper layers without copying. Equality on
    /// types is by-value over the stripped layer.
    pub fn stripped(&self, mut ty: TypeId) -> TypeId {
        loop {
            match *self.kind(ty) {
                TypeKind::Aliased(inner, _) => ty = inner,
                TypeKind::Imbued(inner, _) => ty = inner,
                _ => return ty,
            }
        }
    }

    /// Equality on the stripped layer.
    pub fn types_equal(&self, a: TypeId, b: TypeId) -> bool {
        self.stripped(a) == self.stripped(b)
    }
}

impl Default for Types {
    fn default() -> Self {
        Types::new()
    }
}
