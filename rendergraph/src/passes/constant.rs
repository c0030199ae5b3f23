//! Constant evaluator (spec.md §4.4 "constant evaluator").
//!
//! A small interpreter over the handful of node kinds that can be known at
//! compile time: `CONSTANT` itself, `GET_CI` reads of a resolved
//! `CONSTRUCT`'s named field, a `FIELD`-axis `SLICE` of a resolved
//! `CONSTRUCT` (spec.md §8 testable property 4, "composite round-trip"),
//! and `MATH_BINARY` over two evaluable operands. Slice resolution
//! (`slice.rs`) uses this to turn a `SLICE` node's `start`/`count` into
//! concrete `u64`s.

use crate::arena::{ConstValue, MathOp, Module, NodeId, NodeKind, SliceAxis};
use crate::error::{GraphError, Result};
use crate::types::TypeKind;

pub fn eval(module: &Module, node: NodeId) -> Result<ConstValue> {
    match module.node(node).kind {
        NodeKind::Constant(v) => Ok(v),
        NodeKind::GetCi { field } => eval_get_ci(module, node, field),
        NodeKind::Slice { axis: SliceAxis::Field, start, .. } => eval_field_slice(module, node, start),
        NodeKind::MathBinary { op } => {
            let args = module.node(node).args.clone();
            let lhs = eval(module, args[0].node)?;
            let rhs = eval(module, args[1].node)?;
            eval_math(op, lhs, rhs)
        }
        _ => Err(GraphError::IncompleteConstruct.into()),
    }
}

/// `SLICE(FIELD, i)` of a resolved `CONSTRUCT` recovers member `i`
/// byte-for-byte: `args[0]` is the reserved inherited-base slot (see
/// `attachment::BASE_SLOT`), so member `i` lives at `args[i + 1]`,
/// matching `eval_get_ci`'s name-indexed lookup but addressed positionally
/// since a `FIELD` slice carries an index, not a name.
fn eval_field_slice(module: &Module, node: NodeId, start: crate::arena::Ref) -> Result<ConstValue> {
    let index = as_u64(eval(module, start.node)?)? as usize;
    let src = module.node(node).args[0];
    match module.node(src.node).kind {
        NodeKind::Construct => {
            let field_ref = *module
                .node(src.node)
                .args
                .get(index + 1)
                .ok_or(GraphError::TypeMismatch)?;
            eval(module, field_ref.node)
        }
        _ => Err(GraphError::IncompleteConstruct.into()),
    }
}

/// Evaluates `eval` over a `Ref`, for callers that only have the producing
/// node's output rather than a bare `NodeId`.
pub fn eval_ref(module: &Module, r: crate::arena::Ref) -> Result<ConstValue> {
    eval(module, r.node)
}

fn eval_get_ci(module: &Module, node: NodeId, field: &str) -> Result<ConstValue> {
    let src = module.node(node).args[0];

    // `Extent3D` constants aren't a registered composite (there's no
    // `CompositeType` for a bare ConstValue payload) but GET_CI still
    // needs to project `width`/`height`/`depth` out of one, e.g. for
    // `Value::set_size`.
    if let Ok(ConstValue::Extent3D { width, height, depth }) = eval(module, src.node) {
        return match field {
            "width" => Ok(ConstValue::U64(width as u64)),
            "height" => Ok(ConstValue::U64(height as u64)),
            "depth" => Ok(ConstValue::U64(depth as u64)),
            _ => Err(GraphError::TypeMismatch.into()),
        };
    }

    let ty = module.result_type(src);
    let composite_id = match module.types.kind(module.types.stripped(ty)) {
        TypeKind::Composite(cid) => *cid,
        _ => return Err(GraphError::TypeMismatch.into()),
    };
    let desc = module.types.composite(composite_id);
    let member_index = desc
        .members
        .iter()
        .position(|m| m.name == field)
        .ok_or(GraphError::TypeMismatch)?;
    match module.node(src.node).kind {
        // `CONSTRUCT::args` reserves `args[0]` as the inherited-base slot
        // (see `attachment::BASE_SLOT`), so member `i` lives at `args[i+1]`.
        NodeKind::Construct => {
            let field_ref = module.node(src.node).args[member_index + 1];
            eval(module, field_ref.node)
        }
        _ => Err(GraphError::IncompleteConstruct.into()),
    }
}

fn as_i128(v: ConstValue) -> Result<i128> {
    match v {
        ConstValue::I64(n) => Ok(n as i128),
        ConstValue::U64(n) => Ok(n as i128),
        ConstValue::Bool(b) => Ok(b as i128),
        ConstValue::F64(_) | ConstValue::Extent3D { .. } | ConstValue::Unset => {
            Err(GraphError::TypeMismatch.into())
        }
    }
}

fn eval_math(op: MathOp, lhs: ConstValue, rhs: ConstValue) -> Result<ConstValue> {
    if let (ConstValue::F64(a), ConstValue::F64(b)) = (lhs, rhs) {
        let r = match op {
            MathOp::Add => a + b,
            MathOp::Sub => a - b,
            MathOp::Mul => a * b,
            MathOp::Div => a / b,
            MathOp::Max => a.max(b),
            MathOp::Min => a.min(b),
        };
        return Ok(ConstValue::F64(r));
    }
    let a = as_i128(lhs)?;
    let b = as_i128(rhs)?;
    let r = match op {
        MathOp::Add => a + b,
        MathOp::Sub => a - b,
        MathOp::Mul => a * b,
        MathOp::Div => {
            if b == 0 {
                return Err(GraphError::InvalidSlice.into());
            }
            a / b
        }
        MathOp::Max => a.max(b),
        MathOp::Min => a.min(b),
    };
    // Preserve signedness of the wider operand; slice math is U64 in
    // practice (extents/offsets are never negative) but MATH_BINARY is
    // also used for signed scalar expressions elsewhere.
    if matches!(lhs, ConstValue::I64(_)) || matches!(rhs, ConstValue::I64(_)) {
        Ok(ConstValue::I64(r as i64))
    } else {
        Ok(ConstValue::U64(r as u64))
    }
}

/// Convenience used by `slice.rs`/Reify to pull a plain `u64` out of a
/// resolved constant, erroring on anything that isn't integer-shaped.
pub fn as_u64(v: ConstValue) -> Result<u64> {
    match v {
        ConstValue::U64(n) => Ok(n),
        ConstValue::I64(n) if n >= 0 => Ok(n as u64),
        _ => Err(GraphError::TypeMismatch.into()),
    }
}
