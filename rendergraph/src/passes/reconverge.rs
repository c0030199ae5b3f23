//! Reconvergence (spec.md §4.6 point 3, §4.7 "Reconvergence").
//!
//! Disjoint slice-writes of one resource may run concurrently; this pass
//! finds, for each resource with two or more live disjoint slices, the
//! first direct whole-resource use that comes after every one of those
//! writes and records it as a reconvergence point. The scheduler (§4.8)
//! turns each point into extra same-domain ordering (or a barrier, across
//! domains) from every listed slice-write onto the consumer at `point`, so
//! that consumer observes every slice's last write.
//!
//! `slice.rs::check_reconvergence` is the negative half of this: it
//! rejects graphs where a whole-resource use falls *before* a valid
//! reconvergence point (`TimeTravel`). This pass only ever runs over
//! graphs that already passed that check.

use crate::arena::{Module, NodeId, NodeKind, Ref};
use crate::error::Result;
use std::collections::HashMap;

#[derive(Clone, Debug)]
pub struct ReconvergencePoint {
    pub parent: Ref,
    /// The node whose use of `parent` is the convergence site.
    pub point: NodeId,
    /// The SLICE nodes whose last write must be ordered before `point`.
    pub slices: Vec<NodeId>,
    /// The CALLs that performed those writes (`slices[i]`'s `undef.node`),
    /// in the same order as `slices`. The scheduler adds an edge from each
    /// of these onto `point` so the reconvergence site is never scheduled
    /// before a slice it must observe the result of.
    pub writers: Vec<NodeId>,
}

pub fn run(module: &Module) -> Result<Vec<ReconvergencePoint>> {
    let mut children: HashMap<Ref, Vec<NodeId>> = HashMap::new();
    for id in module.ids() {
        if let NodeKind::Slice { .. } = module.node(id).kind {
            let parent = module.node(id).args[0];
            children.entry(parent).or_insert_with(Vec::new).push(id);
        }
    }

    let mut points = Vec::new();
    for (parent, slices) in children {
        let written: Vec<(NodeId, NodeId)> = slices
            .iter()
            .filter_map(|&sid| {
                module.node(sid).links[0]
                    .undef
                    .map(|undef| (sid, undef.node))
            })
            .collect();
        if written.len() < 2 {
            continue;
        }
        let last_write = written.iter().map(|&(_, w)| w).max().unwrap();

        let link = &module.node(parent.node).links[parent.index as usize];
        let next_whole_use = link
            .reads
            .iter()
            .cloned()
            .chain(link.undef)
            .map(|r| r.node)
            .filter(|&n| n > last_write)
            .min();

        if let Some(point) = next_whole_use {
            let (slices, writers): (Vec<NodeId>, Vec<NodeId>) = written.into_iter().unzip();
            points.push(ReconvergencePoint {
                parent,
                point,
                slices,
                writers,
            });
        }
    }

    Ok(points)
}
