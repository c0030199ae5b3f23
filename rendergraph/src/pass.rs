//! Pass registry & `CALL` nodes.
//!
//! Grounded in the teacher's per-domain task builders
//! (`src/frame/mod.rs`'s `GraphicsTaskBuilder`/`ComputeTaskBuilder`/
//! `TransferTaskBuilder`/`PresentTaskBuilder`, reexported from
//! `frame::{graphics, compute, transfer, present}`): there, each task kind
//! has its own builder that accumulates `TaskOutputRef`s before sealing
//! into a `Task` node in the `FrameGraph`. `Pass`/`PassTemplate` here plays
//! the same role but generalized to one call shape for every domain, since
//! `make_pass` is domain-polymorphic — `domain=eAny` lets the scheduler
//! infer it later.

use crate::arena::{Module, NodeId, Ref};
use crate::domain::Domain;
use crate::error::{GraphError, Result};
use crate::types::{Access, PassCallback, TypeId};
use std::rc::Rc;

/// A resolved argument handed to a pass callback at execution time: which
/// declared argument slot this is, the access it was declared with, and
/// the node whose resource backs it (so the callback can ask the
/// `CommandBuffer` for the concrete handle via
/// `get_resource_image_attachment`).
#[derive(Copy, Clone, Debug)]
pub struct Binding {
    pub arg_index: u32,
    pub access: Access,
    pub node: NodeId,
}

/// A registered pass template, recorded by `make_pass(name, fn, domain)`.
#[derive(Clone)]
pub struct PassTemplate {
    pub name: &'static str,
    pub domain: Domain,
    opaque_fn: TypeId,
}

/// Declares one argument of a pass: its (stripped) type and the access it
/// requires. Built by callers via `arg()`/`result()` before calling
/// `make_pass`.
#[derive(Copy, Clone, PartialEq)]
pub struct ArgSpec {
    pub ty: TypeId,
    pub access: Access,
}

/// Declares one result of a pass. `aliases` is `Some(arg_index)` for
/// write-back ("polymorphic") passes.
#[derive(Copy, Clone)]
pub struct ResultSpec {
    pub ty: TypeId,
    pub access: Access,
    pub aliases: Option<u32>,
}

pub fn make_pass(
    module: &mut Module,
    name: &'static str,
    domain: Domain,
    args: &[ArgSpec],
    results: &[ResultSpec],
    callback: PassCallback,
) -> Result<PassTemplate> {
    let arg_types: Vec<TypeId> = args
        .iter()
        .map(|a| module.types.make_imbued(a.ty, a.access))
        .collect();
    let ret_types: Vec<TypeId> = results
        .iter()
        .map(|r| {
            let imbued = module.types.make_imbued(r.ty, r.access);
            match r.aliases {
                Some(arg_index) => module.types.make_aliased(imbued, arg_index),
                None => imbued,
            }
        })
        .collect();

    let opaque_fn = module
        .types
        .make_opaque_fn(name, arg_types, ret_types, domain, callback)?;

    Ok(PassTemplate {
        name,
        domain,
        opaque_fn,
    })
}

impl PassTemplate {
    /// Instantiates this template against concrete arguments, appending a
    /// `CALL` node whose outputs carry imbued-access annotations.
    ///
    /// Returns one `Ref` per declared result, in declaration order — every
    /// output is tracked regardless of whether the caller keeps the
    /// returned `Ref`, so the link pass can still see a later discard of an
    /// unused multi-return output.
    pub fn call(&self, module: &mut Module, args: &[Ref]) -> Result<Vec<Ref>> {
        let desc = module.types.opaque_fn(self.opaque_fn).clone();
        if args.len() != desc.args.len() {
            return Err(GraphError::TypeMismatch.into());
        }
        for (i, &a) in args.iter().enumerate() {
            let declared = module.types.stripped(desc.args[i]);
            let actual = module.types.stripped(module.result_type(a));
            if !module.types.types_equal(declared, actual) {
                return Err(GraphError::TypeMismatch.into());
            }
        }
        let call = module.new_call(self.opaque_fn, &desc.rets, args);
        Ok((0..desc.rets.len() as u32)
            .map(|index| Ref::new(call, index))
            .collect())
    }
}

/// `lift_compute(pipeline)`: builds a pass that binds descriptors in
/// declaration order and dispatches
/// `(x, y, z)`. Descriptor binding numbers follow the order of non-count
/// arguments (the first three `Ref`s, `x`/`y`/`z`, are plain scalars, not
/// descriptor-bound resources).
pub fn lift_compute(
    module: &mut Module,
    name: &'static str,
    resource_args: &[ArgSpec],
    callback: PassCallback,
) -> Result<PassTemplate> {
    let u32_ty = module.types.make_scalar(crate::types::ScalarKind::Unsigned, 32);
    let mut args = vec![
        ArgSpec {
            ty: u32_ty,
            access: Access::empty(),
        };
        3
    ];
    args.extend_from_slice(resource_args);

    // Every write-accessed resource argument becomes an aliased result so
    // callers can keep chaining the mutated value forward.
    // `lift_compute`'s whole point is in-place
    // compute shaders — without this, a caller could never read back what
    // the dispatch just wrote, since the written `Ref` would have no
    // further use the linker could see. `PassTemplate::call`'s returned
    // `Vec<Ref>` lines up with the write-accessed entries of
    // `resource_args`, in the same relative order.
    let results: Vec<ResultSpec> = resource_args
        .iter()
        .enumerate()
        .filter(|(_, a)| a.access.is_write())
        .map(|(i, a)| ResultSpec {
            ty: a.ty,
            access: a.access,
            aliases: Some((3 + i) as u32),
        })
        .collect();

    make_pass(module, name, Domain::Compute, &args, &results, callback)
}
