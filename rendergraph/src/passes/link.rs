//! Link / use-chain builder (spec.md §4.6).
//!
//! For every node output, walks its direct consumers in construction order
//! (valid because the arena is append-only and an argument can only name
//! an earlier node — spec.md §4.2 "the arena is single-writer during
//! graph construction") and splits them into `reads` and an optional
//! `undef`. A write-access `CALL` whose result aliases its input
//! (`Aliased`, spec.md §3) starts a fresh chain rooted at that result;
//! `prev`/`next` stitch the aliasing chain together across those
//! boundaries so reconvergence (`slice.rs`) and the scheduler can walk it
//! in either direction.

use crate::arena::{Module, NodeId, NodeKind, Ref};
use crate::error::{GraphError, Result};
use crate::types::TypeKind;
use fxhash::FxHashMap;
use log::warn;
use smallvec::SmallVec;

/// Whether the use of `def_ref` as argument `arg_idx` of `consumer_id` is
/// write-like (spec.md §4.6 "Split uses into reads ... and writes (any
/// write bit)").
fn classifies_as_write(module: &Module, consumer_id: NodeId, arg_idx: u32) -> bool {
    match module.node(consumer_id).kind {
        NodeKind::Call { opaque_fn } => {
            let arg_ty = module.types.opaque_fn(opaque_fn).args[arg_idx as usize];
            match module.types.kind(arg_ty) {
                TypeKind::Imbued(_, access) => access.is_write(),
                _ => false,
            }
        }
        NodeKind::Release => true,
        _ => false,
    }
}

pub fn run(module: &mut Module) -> Result<()> {
    // Phase 1: every direct (CALL argument / RELEASE source) consumer of
    // every Ref. Structural consumers (SLICE source, GET_CI source,
    // MATH_BINARY operands) don't participate in the resource chain —
    // they compute derived values, they don't read or write the resource
    // itself.
    let mut uses: FxHashMap<Ref, Vec<(NodeId, u32)>> = FxHashMap::default();
    for id in module.ids() {
        match module.node(id).kind {
            NodeKind::Call { .. } => {
                for (i, &a) in module.node(id).args.iter().enumerate() {
                    uses.entry(a).or_insert_with(Vec::new).push((id, i as u32));
                }
            }
            NodeKind::Release => {
                if let Some(&a) = module.node(id).args.get(0) {
                    uses.entry(a).or_insert_with(Vec::new).push((id, 0));
                }
            }
            _ => {}
        }
    }

    // Phase 2: build one Link per node output.
    for id in module.ids() {
        let n_outputs = module.node(id).types.len();
        for out_idx in 0..n_outputs {
            let def_ref = Ref::new(id, out_idx as u32);
            let use_list = uses.get(&def_ref).cloned().unwrap_or_default();

            let mut reads: SmallVec<[Ref; 4]> = SmallVec::new();
            let mut undef: Option<Ref> = None;
            for (consumer_id, arg_idx) in use_list {
                if undef.is_some() {
                    warn!(
                        "{:?} used again (by node {}) after its undef; later uses are ignored for chain purposes",
                        def_ref, consumer_id
                    );
                    continue;
                }
                let use_ref = Ref::new(consumer_id, arg_idx);
                if classifies_as_write(module, consumer_id, arg_idx) {
                    undef = Some(use_ref);
                } else {
                    reads.push(use_ref);
                }
            }

            let link = &mut module.node_mut(id).links[out_idx];
            link.def = Some(def_ref);
            link.reads = reads;
            link.undef = undef;
            link.urdef = Some(def_ref);
        }
    }

    // Phase 3: stitch the aliasing chain. A CALL whose Nth result is
    // `Aliased(_, arg_index)` makes that result the continuation of the
    // chain rooted at `args[arg_index]`.
    let call_ids: Vec<NodeId> = module
        .ids()
        .filter(|&id| matches!(module.node(id).kind, NodeKind::Call { .. }))
        .collect();
    for id in call_ids {
        let opaque_fn = match module.node(id).kind {
            NodeKind::Call { opaque_fn } => opaque_fn,
            _ => unreachable!(),
        };
        let rets = module.types.opaque_fn(opaque_fn).rets.clone();
        let args = module.node(id).args.clone();
        for (out_idx, &ret_ty) in rets.iter().enumerate() {
            let arg_index = match module.types.kind(ret_ty) {
                TypeKind::Aliased(_, idx) => *idx,
                _ => continue,
            };
            let aliased_source = args[arg_index as usize];
            let this_def = Ref::new(id, out_idx as u32);

            let source_urdef = module.node(aliased_source.node).links[aliased_source.index as usize].urdef;
            module.node_mut(aliased_source.node).links[aliased_source.index as usize].next = Some(this_def);

            let link = &mut module.node_mut(id).links[out_idx];
            link.prev = Some(aliased_source);
            link.urdef = source_urdef.or(Some(aliased_source));
        }
    }

    check_use_before_init(module)?;
    insert_implicit_releases(module);

    Ok(())
}

/// spec.md §4.3 "Scoped acquisition: `acquire_*`/`discard_*` ... with
/// guaranteed release on all exit paths". A resource that reaches the end
/// of its (possibly write-aliased) chain having only ever been *read* would
/// otherwise have no `undef` at all, and so no signal telling the
/// `Allocator` it is safe to reclaim (§4.9). A chain that already ends in a
/// real write already satisfies the "at most one undef" invariant on its
/// own; this only fills in the chains that don't.
fn insert_implicit_releases(module: &mut Module) {
    let roots: Vec<NodeId> = module
        .ids()
        .filter(|&id| matches!(module.node(id).kind, NodeKind::Acquire { .. } | NodeKind::AcquireNextImage))
        .collect();

    for root in roots {
        let mut tail = Ref::single(root);
        loop {
            let next = module.node(tail.node).links[tail.index as usize].next;
            match next {
                Some(n) => tail = n,
                None => break,
            }
        }
        let needs_release = module.node(tail.node).links[tail.index as usize].undef.is_none();
        if !needs_release {
            continue;
        }
        let release_id = module.new_release(tail);
        module.node_mut(tail.node).links[tail.index as usize].undef = Some(Ref::new(release_id, 0));
    }
}

/// spec.md §4.3: a resource whose content is undefined (a `discard_*`
/// acquisition, `initial_access` empty) may not be *read* before it is
/// written. Since `reads` only ever holds uses that precede the first
/// write-like use (see the loop above), a non-empty `reads` on such a
/// node's sole output means the very first use was a read.
fn check_use_before_init(module: &Module) -> Result<()> {
    for id in module.ids() {
        if let NodeKind::Acquire { initial_access, .. } = module.node(id).kind {
            if initial_access.is_empty() && !module.node(id).links[0].reads.is_empty() {
                return Err(GraphError::UseBeforeInit.into());
            }
        }
    }
    Ok(())
}
