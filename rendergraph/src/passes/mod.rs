//! IR compiler passes, run in sequence by `compile` (spec.md §2
//! "Reify Inference, then Link/use-chain building, then slice
//! resolution+reconvergence, then scheduling").

pub mod constant;
pub mod link;
pub mod reconverge;
pub mod reify;
pub mod slice;

use crate::arena::Module;
use crate::error::Result;

/// The result of the analysis passes, handed to the scheduler.
pub struct Analysis {
    pub resolved_slices: fxhash::FxHashMap<crate::arena::NodeId, slice::ResolvedSlice>,
    pub reconvergence: Vec<reconverge::ReconvergencePoint>,
}

/// Runs Reify Inference, link building, slice resolution, and
/// reconvergence detection over `module`, in the order spec.md §2 lists
/// them. Each pass may rewrite the arena in place (Reify resolves
/// placeholders to constants; slice resolution resolves `SLICE`
/// start/count); `link::run` must come after Reify so it sees final
/// access/alias relationships, and `slice::run`/`reconverge::run` must
/// come after `link::run` so `Link` is populated.
pub fn analyze(module: &mut Module) -> Result<Analysis> {
    reify::run(module)?;
    link::run(module)?;
    let resolved_slices = slice::run(module)?;
    let reconvergence = reconverge::run(module)?;
    Ok(Analysis {
        resolved_slices,
        reconvergence,
    })
}
