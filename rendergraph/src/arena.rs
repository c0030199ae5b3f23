//! Node arena.
//!
//! Structured the way `autograph_spirv::Module` stores a SPIR-V module as a
//! flat `Vec<u32>` addressed by `IPtr(usize)` (`spirv/src/lib.rs`): nodes
//! live in one `Vec`, addressed by a `NodeId` index, and are never
//! individually freed — the whole arena is dropped (`collect`) at the end
//! of a compile. The arena is single-writer during graph construction;
//! the linker pass only re-reads it until slice resolution rewrites it in
//! place.

use crate::types::TypeId;
use smallvec::SmallVec;
use std::fmt;

pub type NodeId = u32;

/// A reference to one result of a node: `(producer, which output)`.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Ref {
    pub node: NodeId,
    pub index: u32,
}

impl Ref {
    pub fn new(node: NodeId, index: u32) -> Ref {
        Ref { node, index }
    }

    /// Shorthand for the (overwhelmingly common) single-result node.
    pub fn single(node: NodeId) -> Ref {
        Ref { node, index: 0 }
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "%{}.{}", self.node, self.index)
    }
}

/// Slice axis.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum SliceAxis {
    Mip,
    Layer,
    Field,
    Range,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum MathOp {
    Add,
    Sub,
    Mul,
    Div,
    Max,
    Min,
}

/// Node discriminant: every IR node is one of these kinds.
#[derive(Clone, Debug)]
pub enum NodeKind {
    /// A compile-time-known value. Payload lives in `Node::constant`.
    Constant(ConstValue),
    /// An unresolved field awaiting Reify Inference.
    Placeholder,
    /// Builds a composite/array value from its `args`.
    Construct,
    /// Binds a host-owned resource into the graph (`acquire_*`).
    Acquire { user_value: u64, initial_access: crate::types::Access },
    /// Hands a resource back to the host / previous owner.
    Release,
    /// A release→acquire splice inserted across a domain edge.
    Splice { from_domain: crate::domain::Domain, to_domain: crate::domain::Domain },
    /// Invokes a registered pass.
    Call { opaque_fn: crate::types::OpaqueFnId },
    /// Selects a subrange of a resource along one axis.
    Slice { axis: SliceAxis, start: Ref, count: Ref },
    /// Reads back a compile-time-constant field of a `CreateInfo`-like
    /// value for use by the constant evaluator.
    GetCi { field: &'static str },
    MathBinary { op: MathOp },
    /// `acquire_next_image(swapchain)`.
    AcquireNextImage,
    /// Marks a collected/dead node; never produced by user code.
    Garbage,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ConstValue {
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    Extent3D { width: u32, height: u32, depth: u32 },
    Unset,
}

/// Use-chain entry for one `(node, result_index)`.
#[derive(Clone, Debug, Default)]
pub struct Link {
    pub def: Option<Ref>,
    pub reads: SmallVec<[Ref; 4]>,
    pub undef: Option<Ref>,
    pub prev: Option<Ref>,
    pub next: Option<Ref>,
    pub urdef: Option<Ref>,
}

#[derive(Clone, Debug, Default)]
pub struct AcquireRelease {
    pub signal: crate::signal::SignalId,
    /// Weak back-reference from acquirer to releaser, used only to compute
    /// synchronization. Cyclic acquire/release pairs are modeled as node
    /// IDs on this side-table, not as graph edges, so they never form a
    /// cycle in the dependency graph itself.
    pub paired_with: Option<NodeId>,
}

#[derive(Clone, Debug)]
pub struct Node {
    pub kind: NodeKind,
    /// One result type per output, in declaration order.
    pub types: SmallVec<[TypeId; 1]>,
    pub args: SmallVec<[Ref; 4]>,
    pub rel_acq: Option<AcquireRelease>,
    pub links: SmallVec<[Link; 1]>,
    /// Debug name, set by `acquire_*`/`make_pass` call sites. Not read by
    /// any pass; purely for `dump_graph` / `graphviz`-style diagnostics
    /// (the teacher's `src/frame/dump.rs`, `src/frame/graphviz.rs`).
    pub name: Option<&'static str>,
}

impl Node {
    fn new(kind: NodeKind, types: SmallVec<[TypeId; 1]>, args: SmallVec<[Ref; 4]>) -> Node {
        let n = types.len();
        Node {
            kind,
            types,
            args,
            rel_acq: None,
            links: smallvec::smallvec![Link::default(); n],
            name: None,
        }
    }
}

/// A per-compile arena of nodes, plus the interned type table that backs
/// it.
pub struct Module {
    nodes: Vec<Node>,
    pub types: crate::types::Types,
    /// The interned `ImageAttachment` composite type, registered once so
    /// Reify Inference can recognize attachment values structurally
    /// instead of re-deriving them from a name.
    pub image_attachment_ty: TypeId,
    pub buffer_resource_ty: TypeId,
}

impl Module {
    pub fn new() -> Module {
        let mut types = crate::types::Types::new();
        let u32_ty = types.make_scalar(crate::types::ScalarKind::Unsigned, 32);
        let image_attachment_members = [u32_ty; crate::attachment::IMAGE_ATTACHMENT_FIELD_COUNT];
        let image_attachment_ty = types
            .register_composite::<crate::attachment::ImageAttachment>(0, &image_attachment_members)
            .expect("built-in ImageAttachment composite registration cannot fail");
        let buffer_resource_members = [u32_ty; crate::attachment::BUFFER_FIELD_COUNT];
        let buffer_resource_ty = types
            .register_composite::<crate::attachment::BufferResource>(0, &buffer_resource_members)
            .expect("built-in BufferResource composite registration cannot fail");
        Module {
            nodes: Vec::new(),
            types,
            image_attachment_ty,
            buffer_resource_ty,
        }
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id as usize]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        0..self.nodes.len() as NodeId
    }

    fn push(&mut self, kind: NodeKind, types: SmallVec<[TypeId; 1]>, args: SmallVec<[Ref; 4]>) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(Node::new(kind, types, args));
        id
    }

    pub fn new_constant(&mut self, ty: TypeId, value: ConstValue) -> Ref {
        let id = self.push(NodeKind::Constant(value), smallvec::smallvec![ty], SmallVec::new());
        Ref::single(id)
    }

    pub fn new_placeholder(&mut self, ty: TypeId) -> Ref {
        let id = self.push(NodeKind::Placeholder, smallvec::smallvec![ty], SmallVec::new());
        Ref::single(id)
    }

    pub fn new_construct(&mut self, ty: TypeId, args: &[Ref]) -> Ref {
        let id = self.push(NodeKind::Construct, smallvec::smallvec![ty], args.iter().cloned().collect());
        Ref::single(id)
    }

    pub fn new_call(
        &mut self,
        opaque_fn: crate::types::OpaqueFnId,
        result_types: &[TypeId],
        args: &[Ref],
    ) -> NodeId {
        self.push(
            NodeKind::Call { opaque_fn },
            result_types.iter().cloned().collect(),
            args.iter().cloned().collect(),
        )
    }

    pub fn new_slice(&mut self, ty: TypeId, src: Ref, axis: SliceAxis, start: Ref, count: Ref) -> Ref {
        let id = self.push(
            NodeKind::Slice { axis, start, count },
            smallvec::smallvec![ty],
            smallvec::smallvec![src],
        );
        Ref::single(id)
    }

    pub fn new_get_ci(&mut self, ty: TypeId, src: Ref, field: &'static str) -> Ref {
        let id = self.push(NodeKind::GetCi { field }, smallvec::smallvec![ty], smallvec::smallvec![src]);
        Ref::single(id)
    }

    pub fn new_math_binary(&mut self, ty: TypeId, op: MathOp, lhs: Ref, rhs: Ref) -> Ref {
        let id = self.push(
            NodeKind::MathBinary { op },
            smallvec::smallvec![ty],
            smallvec::smallvec![lhs, rhs],
        );
        Ref::single(id)
    }

    pub fn new_acquire(
        &mut self,
        ty: TypeId,
        user_value: u64,
        initial_access: crate::types::Access,
    ) -> Ref {
        let id = self.push(
            NodeKind::Acquire {
                user_value,
                initial_access,
            },
            smallvec::smallvec![ty],
            SmallVec::new(),
        );
        Ref::single(id)
    }

    pub fn new_release(&mut self, src: Ref) -> NodeId {
        self.push(NodeKind::Release, SmallVec::new(), smallvec::smallvec![src])
    }

    pub fn new_splice(
        &mut self,
        ty: TypeId,
        src: Ref,
        from_domain: crate::domain::Domain,
        to_domain: crate::domain::Domain,
    ) -> Ref {
        let id = self.push(
            NodeKind::Splice {
                from_domain,
                to_domain,
            },
            smallvec::smallvec![ty],
            smallvec::smallvec![src],
        );
        Ref::single(id)
    }

    pub fn new_acquire_next_image(&mut self, ty: TypeId) -> Ref {
        let id = self.push(NodeKind::AcquireNextImage, smallvec::smallvec![ty], SmallVec::new());
        Ref::single(id)
    }

    /// Intern-equality test used by passes to compare two `Ref`s without
    /// walking node contents.
    pub fn intern_ref(&self, a: Ref, b: Ref) -> bool {
        a.node == b.node && a.index == b.index
    }

    pub fn result_type(&self, r: Ref) -> TypeId {
        self.node(r.node).types[r.index as usize]
    }

    /// Frees orphaned subtrees at the end of a compile. Since the arena is
    /// a flat `Vec` with no slot reuse across compiles, this amounts to
    /// computing reachability from the surviving root set and marking the
    /// rest `Garbage`; callers typically drop the whole `Module` instead
    /// and only call `collect` when reusing one `Module` across several
    /// small sub-graphs within one frame.
    pub fn collect(&mut self, roots: &[NodeId]) {
        let mut reachable = vec![false; self.nodes.len()];
        let mut stack: Vec<NodeId> = roots.to_vec();
        while let Some(id) = stack.pop() {
            if reachable[id as usize] {
                continue;
            }
            reachable[id as usize] = true;
            for a in self.nodes[id as usize].args.clone() {
                stack.push(a.node);
            }
        }
        for (id, reached) in reachable.iter().enumerate() {
            if !*reached {
                self.nodes[id].kind = NodeKind::Garbage;
                self.nodes[id].args.clear();
            }
        }
    }
}

impl Default for Module {
    fn default() -> Self {
        Module::new()
    }
}
