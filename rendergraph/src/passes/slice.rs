//! Slice resolution and reconvergence (spec.md §4.7).
//!
//! Two passes share this module: resolving a `SLICE` node's `start`/`count`
//! to concrete, constant-evaluated values (rewriting the node's operands to
//! `CONSTANT`s in the process), and detecting `TimeTravel` — a
//! whole-resource use observed strictly between two disjoint slice-writes
//! of the same parent, i.e. before the reconvergence point that would make
//! that use see a consistent picture of the resource.

use crate::arena::{ConstValue, Module, NodeId, NodeKind, Ref, SliceAxis};
use crate::error::{GraphError, Result};
use crate::passes::constant;
use fxhash::FxHashMap;
use std::collections::HashMap;

/// A fully resolved `SLICE` (spec.md §4.7 "`count = REMAINING` means up to
/// `level_count`" — represented here as `count: None`).
#[derive(Copy, Clone, Debug)]
pub struct ResolvedSlice {
    pub axis: SliceAxis,
    pub start: u64,
    pub count: Option<u64>,
}

/// Runs slice resolution followed by reconvergence checking. Must run
/// after `reify::run` (so attachment field counts are constants where
/// known) and after `link::run` (so every node's `Link` is populated for
/// the reconvergence check).
pub fn run(module: &mut Module) -> Result<FxHashMap<NodeId, ResolvedSlice>> {
    let resolved = resolve_slices(module)?;
    check_reconvergence(module)?;
    Ok(resolved)
}

/// A `SLICE`'s `count` Ref is a `Placeholder` when the caller asked for
/// "the rest" (spec.md §4.7 `count = REMAINING`); any other node must be
/// constant-evaluable.
fn resolve_slices(module: &mut Module) -> Result<FxHashMap<NodeId, ResolvedSlice>> {
    let mut out = FxHashMap::default();
    let slice_ids: Vec<NodeId> = module
        .ids()
        .filter(|&id| matches!(module.node(id).kind, NodeKind::Slice { .. }))
        .collect();

    for id in slice_ids {
        let (axis, start, count) = match module.node(id).kind {
            NodeKind::Slice { axis, start, count } => (axis, start, count),
            _ => unreachable!(),
        };

        let start_val = constant::as_u64(constant::eval_ref(module, start)?)?;
        let count_val = if matches!(module.node(count.node).kind, NodeKind::Placeholder) {
            None
        } else {
            Some(constant::as_u64(constant::eval_ref(module, count)?)?)
        };

        if matches!(axis, SliceAxis::Field) && count_val != Some(1) {
            return Err(GraphError::InvalidSlice.into());
        }

        // Rewrite start/count to their resolved CONSTANT nodes so
        // downstream passes (scheduler, executor) never re-run the
        // interpreter.
        let start_ty = module.result_type(start);
        let resolved_start = module.new_constant(start_ty, ConstValue::U64(start_val));
        let resolved_count = match count_val {
            Some(n) => {
                let count_ty = module.result_type(count);
                module.new_constant(count_ty, ConstValue::U64(n))
            }
            None => count,
        };
        module.node_mut(id).kind = NodeKind::Slice {
            axis,
            start: resolved_start,
            count: resolved_count,
        };

        out.insert(
            id,
            ResolvedSlice {
                axis,
                start: start_val,
                count: count_val,
            },
        );
    }

    Ok(out)
}

/// Whether the ranges `[a_start, a_start+a_count)` and
/// `[b_start, b_start+b_count)` are disjoint. A `None` count ("remaining")
/// is treated as extending to infinity, which is conservative but safe: an
/// open-ended slice can never be proven disjoint from another slice on the
/// same axis, so it always participates in the reconvergence check below.
fn ranges_overlap(a_start: u64, a_count: Option<u64>, b_start: u64, b_count: Option<u64>) -> bool {
    let a_end = a_count.map(|c| a_start + c);
    let b_end = b_count.map(|c| b_start + c);
    let a_before_b = a_end.map(|e| e <= b_start).unwrap_or(false);
    let b_before_a = b_end.map(|e| e <= a_start).unwrap_or(false);
    !(a_before_b || b_before_a)
}

/// spec.md §4.7 "Reconvergence: ... Attempting to use the parent value
/// before P when a slice has been modified after P is `TimeTravel`."
///
/// For each resource with two or more disjoint live slices, P is the
/// construction-order point (a `NodeId`, our proxy for scheduled order —
/// see `arena.rs`'s module doc) of the last slice-write. A direct,
/// whole-resource use of the parent that falls strictly between the first
/// and last slice-write of a disjoint pair has observed a torn state.
fn check_reconvergence(module: &Module) -> Result<()> {
    // Group direct SLICE children by their parent.
    let mut children: HashMap<Ref, Vec<NodeId>> = HashMap::new();
    for id in module.ids() {
        if let NodeKind::Slice { .. } = module.node(id).kind {
            let parent = module.node(id).args[0];
            children.entry(parent).or_insert_with(Vec::new).push(id);
        }
    }

    for (parent, slices) in &children {
        if slices.len() < 2 {
            continue;
        }
        // Each slice's "write point" is the NodeId of its own undef (the
        // consumer that wrote through it), if any; a slice that's only
        // ever read doesn't narrow the live window.
        let mut write_points: Vec<(NodeId, u64, Option<u64>)> = Vec::new();
        for &slice_id in slices {
            let (start, count) = match module.node(slice_id).kind {
                NodeKind::Slice { start, count, .. } => (start, count),
                _ => unreachable!(),
            };
            let start_val = match constant::eval_ref(module, start) {
                Ok(v) => constant::as_u64(v).unwrap_or(0),
                Err(_) => continue,
            };
            let count_val = if matches!(module.node(count.node).kind, NodeKind::Placeholder) {
                None
            } else {
                constant::eval_ref(module, count).ok().and_then(|v| constant::as_u64(v).ok())
            };
            if let Some(undef) = module.node(slice_id).links[0].undef {
                write_points.push((undef.node, start_val, count_val));
            }
        }
        if write_points.len() < 2 {
            continue;
        }

        // Disjoint pairs only: overlapping slices writing concurrently is
        // caller error caught elsewhere (two writers to the same range),
        // not a reconvergence question.
        let mut disjoint_window: Option<(NodeId, NodeId)> = None;
        for i in 0..write_points.len() {
            for j in (i + 1)..write_points.len() {
                let (wi, si, ci) = write_points[i];
                let (wj, sj, cj) = write_points[j];
                if !ranges_overlap(si, ci, sj, cj) {
                    let lo = wi.min(wj);
                    let hi = wi.max(wj);
                    disjoint_window = Some(match disjoint_window {
                        Some((a, b)) => (a.min(lo), b.max(hi)),
                        None => (lo, hi),
                    });
                }
            }
        }
        let (window_start, window_end) = match disjoint_window {
            Some(w) => w,
            None => continue,
        };

        // Any direct (non-slice) use of the parent strictly inside the
        // open write window has observed a torn resource.
        let direct_uses = module.node(parent.node).links[parent.index as usize]
            .reads
            .iter()
            .cloned()
            .chain(module.node(parent.node).links[parent.index as usize].undef);
        for use_ref in direct_uses {
            if use_ref.node > window_start && use_ref.node < window_end {
                return Err(GraphError::TimeTravel.into());
            }
        }
    }

    Ok(())
}
