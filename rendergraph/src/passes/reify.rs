//! Reify Inference (spec.md §4.5).
//!
//! Runs as a fixed-point loop, converting placeholder fields to constants
//! by propagating known extents/formats/samples/layer counts/mips. Ported
//! from the reasoning in `examples/original_source/src/irpasses/ReifyInference.cpp`,
//! re-expressed over this crate's arena instead of walking a C++ node
//! graph by hand.

use crate::arena::{ConstValue, Module, NodeId, NodeKind, Ref};
use crate::attachment;
use crate::error::{GraphError, Result};
use crate::types::{Access, ScalarKind, TypeKind};
use log::{debug, warn};

fn attachment_renderpass_access() -> Access {
    Access::COLOR_READ
        | Access::COLOR_WRITE
        | Access::COLOR_RESOLVE_READ
        | Access::COLOR_RESOLVE_WRITE
        | Access::DEPTH_STENCIL_READ
        | Access::DEPTH_STENCIL_WRITE
}

/// The fields unified across every attachment argument of one renderpass
/// `CALL` (spec.md §4.5 "framebuffer inference: all color/depth
/// attachments in one graphics pass must agree on extent, samples, layer
/// count; unspecified axes take the other's value").
const UNIFIED_FIELDS: &[usize] = &[
    attachment::FIELD_WIDTH,
    attachment::FIELD_HEIGHT,
    attachment::FIELD_DEPTH,
    attachment::FIELD_SAMPLES,
    attachment::FIELD_LAYER_COUNT,
    attachment::FIELD_FORMAT,
];

pub fn run(module: &mut Module) -> Result<()> {
    apply_renderpass_defaults(module);
    let mut iterations = 0;
    loop {
        iterations += 1;
        let mut changed = false;
        changed |= propagate_inherited_defaults(module)?;
        changed |= propagate_attachment_fields(module)?;
        if !changed {
            break;
        }
        if iterations > 64 {
            // A real fixed point should settle in a handful of rounds;
            // this guards against a malformed graph (e.g. a dependency
            // cycle between two composites' default fields) spinning
            // forever instead of making progress each round.
            return Err(GraphError::AttachmentInconsistency.into());
        }
    }
    if iterations > 1 {
        warn!("reify inference needed {} fixed-point iterations", iterations);
    }
    debug!("reify inference settled after {} iterations", iterations);
    Ok(())
}

fn is_placeholder(module: &Module, r: Ref) -> bool {
    matches!(module.node(r.node).kind, NodeKind::Placeholder)
}

fn resolved_const(module: &Module, r: Ref) -> Option<ConstValue> {
    match module.node(r.node).kind {
        NodeKind::Constant(v) => Some(v),
        _ => None,
    }
}

/// spec.md §4.5 rule: "For renderpass attachments, `level_count` defaults
/// to 1, `depth` defaults to 1. When an image has no backing handle,
/// default `base_layer = 0` and `base_level = 0`."
fn apply_renderpass_defaults(module: &mut Module) {
    let u32_ty = module.types.make_scalar(ScalarKind::Unsigned, 32);
    let attachment_ty = module.image_attachment_ty;
    let ids: Vec<NodeId> = module.ids().collect();
    for id in ids {
        let is_attachment_construct = {
            let node = module.node(id);
            matches!(node.kind, NodeKind::Construct)
                && node.types.get(0).copied() == Some(attachment_ty)
        };
        if !is_attachment_construct {
            continue;
        }
        for (field, default) in [
            (attachment::FIELD_LEVEL_COUNT, 1u64),
            (attachment::FIELD_DEPTH, 1u64),
            (attachment::FIELD_BASE_LEVEL, 0u64),
            (attachment::FIELD_BASE_LAYER, 0u64),
        ] {
            let cur = module.node(id).args[field];
            if is_placeholder(module, cur) {
                let c = module.new_constant(u32_ty, ConstValue::U64(default));
                module.node_mut(id).args[field] = c;
            }
        }
    }
}

/// spec.md §4.5 rule: "For a `CONSTRUCT` whose first argument is a known
/// aggregate, copy non-default fields from that argument into the
/// remaining placeholder slots."
fn propagate_inherited_defaults(module: &mut Module) -> Result<bool> {
    let mut changed = false;
    let ids: Vec<NodeId> = module.ids().collect();
    for id in ids {
        let (composite_id, args, arg_count) = {
            let node = module.node(id);
            if !matches!(node.kind, NodeKind::Construct) {
                continue;
            }
            let ty = match node.types.get(0) {
                Some(t) => *t,
                None => continue,
            };
            match module.types.kind(ty) {
                TypeKind::Composite(cid) => (*cid, node.args.clone(), node.args.len()),
                _ => continue,
            }
        };
        if arg_count == 0 {
            continue;
        }
        let base = args[0];
        let base_is_same_composite = {
            let base_node = module.node(base.node);
            matches!(base_node.kind, NodeKind::Construct)
                && base_node
                    .types
                    .get(0)
                    .map(|t| matches!(module.types.kind(*t), TypeKind::Composite(c) if *c == composite_id))
                    .unwrap_or(false)
        };
        if !base_is_same_composite {
            continue;
        }
        let base_args = module.node(base.node).args.clone();
        let base_resolved = !base_args.iter().any(|r| is_placeholder(module, *r));
        if !base_resolved {
            continue;
        }
        let is_default = module.types.composite(composite_id).vtable.is_default;
        for i in 1..arg_count.min(base_args.len()) {
            // `args[i]` is member `i - 1` (args[0] is the base slot itself).
            if is_placeholder(module, args[i]) && is_default(i - 1) {
                module.node_mut(id).args[i] = base_args[i];
                changed = true;
            }
        }
    }
    Ok(changed)
}

/// spec.md §4.5 rule: "For an image bound to a renderpass-attachment
/// access, propagate extent / sample-count / layer-count between all
/// co-attached images in that CALL."
fn propagate_attachment_fields(module: &mut Module) -> Result<bool> {
    let mut changed = false;
    let call_ids: Vec<NodeId> = module
        .ids()
        .filter(|&id| matches!(module.node(id).kind, NodeKind::Call { .. }))
        .collect();

    for call_id in call_ids {
        let attachment_args: Vec<Ref> = {
            let node = module.node(call_id);
            let mut out = Vec::new();
            for &arg in node.args.iter() {
                let result_ty = module.result_type(arg);
                if module.types.stripped(result_ty) != module.image_attachment_ty {
                    continue;
                }
                let access = match module.types.kind(result_ty) {
                    TypeKind::Imbued(_, a) => *a,
                    _ => Access::empty(),
                };
                if access.intersects(attachment_renderpass_access()) && !is_placeholder(module, arg)
                {
                    out.push(arg);
                }
            }
            out
        };
        if attachment_args.len() < 2 {
            continue;
        }

        for &field in UNIFIED_FIELDS {
            let mut agreed: Option<ConstValue> = None;
            for &att in &attachment_args {
                let field_ref = module.node(att.node).args[field];
                if let Some(v) = resolved_const(module, field_ref) {
                    match agreed {
                        None => agreed = Some(v),
                        Some(existing) if existing == v => {}
                        Some(_) => return Err(GraphError::AttachmentInconsistency.into()),
                    }
                }
            }
            let agreed_value = match agreed {
                Some(v) => v,
                None => continue,
            };
            for &att in &attachment_args {
                let field_ref = module.node(att.node).args[field];
                if is_placeholder(module, field_ref) {
                    let ty = module.result_type(field_ref);
                    let c = module.new_constant(ty, agreed_value);
                    module.node_mut(att.node).args[field] = c;
                    changed = true;
                }
            }
        }
    }
    Ok(changed)
}
