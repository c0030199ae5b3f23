//! Scheduler (spec.md §4.8).
//!
//! Assigns each `CALL` a concrete `Domain`, demotes domains that can't run
//! the call's access set, splices `RELEASE`/`ACQUIRE` pairs across
//! domain-changing edges (here, a single `SPLICE` node — see `arena.rs`),
//! and computes the per-edge Vulkan barrier tuple the executor needs.
//! Grounded in the teacher's `FrameGraphInner = Graph<Task, Dependency,
//! Directed, u32>` (`src/frame/mod.rs`): we likewise build a `petgraph`
//! dependency graph over the scheduled nodes rather than re-deriving
//! order from the arena's append order, since splicing mutates the arena
//! after the fact and can't be trusted to stay in `NodeId` order.

use crate::arena::{AcquireRelease, Module, NodeId, NodeKind};
use crate::domain::Domain;
use crate::error::{GraphError, Result};
use crate::passes::Analysis;
use crate::types::{Access, TypeKind};
use ash::vk;
use fxhash::{FxHashMap, FxHashSet};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

#[derive(Copy, Clone, Debug)]
pub struct EdgeSync {
    pub src_stage: vk::PipelineStageFlags,
    pub src_access: vk::AccessFlags,
    pub dst_stage: vk::PipelineStageFlags,
    pub dst_access: vk::AccessFlags,
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
}

pub struct Schedule {
    /// Scheduled `CALL`/`SPLICE` nodes, topologically ordered.
    pub order: Vec<NodeId>,
    pub domains: FxHashMap<NodeId, Domain>,
    pub edge_sync: FxHashMap<(NodeId, NodeId), EdgeSync>,
}

pub fn run(module: &mut Module, analysis: &Analysis) -> Result<Schedule> {
    let mut domains = assign_domains(module)?;
    insert_splices(module, &mut domains);
    let order = topo_order(module, &analysis.reconvergence)?;
    let edge_sync = compute_edge_sync(module, &order);
    Ok(Schedule {
        order,
        domains,
        edge_sync,
    })
}

fn call_access_union(module: &Module, id: NodeId) -> Access {
    let opaque_fn = match module.node(id).kind {
        NodeKind::Call { opaque_fn } => opaque_fn,
        _ => return Access::empty(),
    };
    let desc = module.types.opaque_fn(opaque_fn);
    let mut acc = Access::empty();
    for &ty in desc.args.iter().chain(desc.rets.iter()) {
        if let TypeKind::Imbued(_, a) = module.types.kind(ty) {
            acc |= *a;
        }
    }
    acc
}

/// spec.md §4.8 rule 2 "demote to the nearest compatible domain" — the
/// minimal domain that can run `access` at all.
fn required_domain_for_access(access: Access) -> Domain {
    if access.intersects(
        Access::COLOR_READ
            | Access::COLOR_WRITE
            | Access::COLOR_RESOLVE_READ
            | Access::COLOR_RESOLVE_WRITE
            | Access::DEPTH_STENCIL_READ
            | Access::DEPTH_STENCIL_WRITE
            | Access::FRAGMENT_SAMPLED
            | Access::FRAGMENT_RW,
    ) {
        Domain::Graphics
    } else if access.intersects(Access::COMPUTE_SAMPLED | Access::COMPUTE_RW) {
        Domain::Compute
    } else if access.intersects(Access::HOST_READ | Access::HOST_WRITE) {
        Domain::Host
    } else {
        Domain::Transfer
    }
}

fn assign_domains(module: &Module) -> Result<FxHashMap<NodeId, Domain>> {
    let call_ids: Vec<NodeId> = module
        .ids()
        .filter(|&id| matches!(module.node(id).kind, NodeKind::Call { .. }))
        .collect();

    let mut declared: FxHashMap<NodeId, Domain> = FxHashMap::default();
    for &id in &call_ids {
        let opaque_fn = match module.node(id).kind {
            NodeKind::Call { opaque_fn } => opaque_fn,
            _ => unreachable!(),
        };
        declared.insert(id, module.types.opaque_fn(opaque_fn).domain);
    }

    // Adjacency restricted to CALL-to-CALL edges, both directions, used
    // to find "the nearest upstream or downstream CALL with a concrete
    // domain" (spec.md §4.8 rule 1).
    let mut upstream: FxHashMap<NodeId, Vec<NodeId>> = FxHashMap::default();
    let mut downstream: FxHashMap<NodeId, Vec<NodeId>> = FxHashMap::default();
    for &id in &call_ids {
        for &arg in module.node(id).args.iter() {
            if matches!(module.node(arg.node).kind, NodeKind::Call { .. }) {
                upstream.entry(id).or_insert_with(Vec::new).push(arg.node);
                downstream.entry(arg.node).or_insert_with(Vec::new).push(id);
            }
        }
    }

    let mut resolved: FxHashMap<NodeId, Domain> = FxHashMap::default();
    for &id in &call_ids {
        let mut domain = declared[&id];
        if domain == Domain::Any {
            domain = nearest_concrete_domain(id, &declared, &upstream, &downstream).unwrap_or(Domain::Graphics);
        }
        let required = required_domain_for_access(call_access_union(module, id));
        if !domain.can_execute(required) {
            domain = required;
        }
        resolved.insert(id, domain);
    }
    Ok(resolved)
}

fn nearest_concrete_domain(
    start: NodeId,
    declared: &FxHashMap<NodeId, Domain>,
    upstream: &FxHashMap<NodeId, Vec<NodeId>>,
    downstream: &FxHashMap<NodeId, Vec<NodeId>>,
) -> Option<Domain> {
    let mut visited: FxHashSet<NodeId> = FxHashSet::default();
    visited.insert(start);
    let mut frontier = vec![start];
    while !frontier.is_empty() {
        let mut next = Vec::new();
        for id in frontier {
            let mut neighbors: Vec<NodeId> = Vec::new();
            if let Some(v) = upstream.get(&id) {
                neighbors.extend(v);
            }
            if let Some(v) = downstream.get(&id) {
                neighbors.extend(v);
            }
            for n in neighbors {
                if visited.insert(n) {
                    if let Some(&d) = declared.get(&n) {
                        if d != Domain::Any {
                            return Some(d);
                        }
                    }
                    next.push(n);
                }
            }
        }
        frontier = next;
    }
    None
}

/// spec.md §4.8 rule 3: insert a domain-crossing `SPLICE` on every CALL
/// argument edge whose producer and consumer ended up on different
/// domains, paired through a fresh timeline `Signal` (`AcquireRelease`
/// mirrors the producer/consumer pairing the same way `acquire_*`/
/// `discard_*`-issued `ACQUIRE`/`RELEASE` pairs do in `arena.rs`).
fn insert_splices(module: &mut Module, domains: &mut FxHashMap<NodeId, Domain>) {
    let call_ids: Vec<NodeId> = module
        .ids()
        .filter(|&id| matches!(module.node(id).kind, NodeKind::Call { .. }))
        .collect();

    for id in call_ids {
        let consumer_domain = domains[&id];
        let args = module.node(id).args.clone();
        let mut new_args = args.clone();
        let mut changed = false;
        for (i, &arg) in args.iter().enumerate() {
            if !matches!(module.node(arg.node).kind, NodeKind::Call { .. }) {
                continue;
            }
            let producer_domain = domains[&arg.node];
            if producer_domain == consumer_domain {
                continue;
            }
            let ty = module.result_type(arg);
            let splice_ref = module.new_splice(ty, arg, producer_domain, consumer_domain);
            module.node_mut(splice_ref.node).rel_acq = Some(AcquireRelease {
                signal: splice_ref.node as crate::signal::SignalId,
                paired_with: Some(arg.node),
            });
            domains.insert(splice_ref.node, consumer_domain);
            new_args[i] = splice_ref;
            changed = true;
        }
        if changed {
            module.node_mut(id).args = new_args;
        }
    }
}

/// spec.md §4.8 "within one domain, submission order equals topological
/// order of CALLs". Built from actual argument dependencies rather than
/// `NodeId` order because `insert_splices` appends new nodes out of
/// position relative to the calls they sit between.
///
/// Also takes the reconvergence points found by `passes::reconverge`
/// (§4.6 point 3, §4.7 "Reconvergence"): a disjoint slice-write doesn't
/// produce an argument edge into the whole-resource consumer that later
/// observes it (the consumer's argument is the *parent* value, not the
/// slice), so without these extra edges the consumer could be ordered
/// before a write it must see.
fn topo_order(module: &Module, reconvergence: &[crate::passes::reconverge::ReconvergencePoint]) -> Result<Vec<NodeId>> {
    let ids: Vec<NodeId> = module
        .ids()
        .filter(|&id| matches!(module.node(id).kind, NodeKind::Call { .. } | NodeKind::Splice { .. }))
        .collect();

    let mut graph = DiGraph::<NodeId, ()>::new();
    let mut index_of: FxHashMap<NodeId, NodeIndex> = FxHashMap::default();
    for &id in &ids {
        index_of.insert(id, graph.add_node(id));
    }
    for &id in &ids {
        for &arg in module.node(id).args.iter() {
            if let Some(&src_idx) = index_of.get(&arg.node) {
                graph.add_edge(src_idx, index_of[&id], ());
            }
        }
    }
    for point in reconvergence {
        let dst_idx = match index_of.get(&point.point) {
            Some(&idx) => idx,
            None => continue,
        };
        for &writer in &point.writers {
            if let Some(&src_idx) = index_of.get(&writer) {
                graph.add_edge(src_idx, dst_idx, ());
            }
        }
    }

    toposort(&graph, None)
        .map(|order| order.into_iter().map(|idx| graph[idx]).collect())
        .map_err(|_| GraphError::CyclicDependency.into())
}

/// spec.md §4.8 "Per-edge synchronization: compute the `(src_stage,
/// src_access, dst_stage, dst_access, old_layout, new_layout)` tuple from
/// the imbued accesses of producer output and consumer input."
fn access_to_vk(access: Access) -> (vk::PipelineStageFlags, vk::AccessFlags, vk::ImageLayout) {
    if access.intersects(Access::COLOR_READ | Access::COLOR_WRITE | Access::COLOR_RESOLVE_READ | Access::COLOR_RESOLVE_WRITE) {
        (
            vk::PIPELINE_STAGE_COLOR_ATTACHMENT_OUTPUT_BIT,
            vk::ACCESS_COLOR_ATTACHMENT_READ_BIT | vk::ACCESS_COLOR_ATTACHMENT_WRITE_BIT,
            vk::ImageLayout::ColorAttachmentOptimal,
        )
    } else if access.intersects(Access::DEPTH_STENCIL_READ | Access::DEPTH_STENCIL_WRITE) {
        (
            vk::PIPELINE_STAGE_EARLY_FRAGMENT_TESTS_BIT | vk::PIPELINE_STAGE_LATE_FRAGMENT_TESTS_BIT,
            vk::ACCESS_DEPTH_STENCIL_ATTACHMENT_READ_BIT | vk::ACCESS_DEPTH_STENCIL_ATTACHMENT_WRITE_BIT,
            vk::ImageLayout::DepthStencilAttachmentOptimal,
        )
    } else if access.intersects(Access::FRAGMENT_SAMPLED) {
        (
            vk::PIPELINE_STAGE_FRAGMENT_SHADER_BIT,
            vk::ACCESS_SHADER_READ_BIT,
            vk::ImageLayout::ShaderReadOnlyOptimal,
        )
    } else if access.intersects(Access::FRAGMENT_RW) {
        (
            vk::PIPELINE_STAGE_FRAGMENT_SHADER_BIT,
            vk::ACCESS_SHADER_READ_BIT | vk::ACCESS_SHADER_WRITE_BIT,
            vk::ImageLayout::General,
        )
    } else if access.intersects(Access::COMPUTE_SAMPLED) {
        (
            vk::PIPELINE_STAGE_COMPUTE_SHADER_BIT,
            vk::ACCESS_SHADER_READ_BIT,
            vk::ImageLayout::ShaderReadOnlyOptimal,
        )
    } else if access.intersects(Access::COMPUTE_RW) {
        (
            vk::PIPELINE_STAGE_COMPUTE_SHADER_BIT,
            vk::ACCESS_SHADER_READ_BIT | vk::ACCESS_SHADER_WRITE_BIT,
            vk::ImageLayout::General,
        )
    } else if access.contains(Access::TRANSFER_READ) {
        (
            vk::PIPELINE_STAGE_TRANSFER_BIT,
            vk::ACCESS_TRANSFER_READ_BIT,
            vk::ImageLayout::TransferSrcOptimal,
        )
    } else if access.intersects(Access::TRANSFER_WRITE) {
        (
            vk::PIPELINE_STAGE_TRANSFER_BIT,
            vk::ACCESS_TRANSFER_WRITE_BIT,
            vk::ImageLayout::TransferDstOptimal,
        )
    } else if access.intersects(Access::HOST_READ | Access::HOST_WRITE) {
        (
            vk::PIPELINE_STAGE_HOST_BIT,
            vk::ACCESS_HOST_READ_BIT | vk::ACCESS_HOST_WRITE_BIT,
            vk::ImageLayout::General,
        )
    } else {
        (vk::PIPELINE_STAGE_TOP_OF_PIPE_BIT, vk::AccessFlags::empty(), vk::ImageLayout::Undefined)
    }
}

fn node_access(module: &Module, id: NodeId, arg_index: Option<usize>) -> Access {
    match (module.node(id).kind, arg_index) {
        (NodeKind::Call { opaque_fn }, Some(i)) => {
            match module.types.kind(module.types.opaque_fn(opaque_fn).args[i]) {
                TypeKind::Imbued(_, a) => *a,
                _ => Access::empty(),
            }
        }
        (NodeKind::Call { .. }, None) => call_access_union(module, id),
        _ => Access::empty(),
    }
}

fn compute_edge_sync(module: &Module, order: &[NodeId]) -> FxHashMap<(NodeId, NodeId), EdgeSync> {
    let mut out = FxHashMap::default();
    for &id in order {
        for (i, &arg) in module.node(id).args.iter().enumerate() {
            if !matches!(
                module.node(arg.node).kind,
                NodeKind::Call { .. } | NodeKind::Splice { .. }
            ) {
                continue;
            }
            let src_access = node_access(module, arg.node, None);
            let dst_access = node_access(module, id, Some(i));
            let (src_stage, src_access_vk, old_layout) = access_to_vk(src_access);
            let (dst_stage, dst_access_vk, new_layout) = access_to_vk(dst_access);
            out.insert(
                (arg.node, id),
                EdgeSync {
                    src_stage,
                    src_access: src_access_vk,
                    dst_stage,
                    dst_access: dst_access_vk,
                    old_layout,
                    new_layout,
                },
            );
        }
    }
    out
}
