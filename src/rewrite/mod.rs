//! The semantics-preserving rewrite passes of the compilation pipeline.
//!
//! The [`flatten`] pass rewrites arbitrarily nested constraints into flat
//! normal form, synthesizing auxiliary variables through a memoizing cache
//! so that no normalized subexpression is defined twice.
//!
//! The [`canonical`] pass imposes a total order on the operands of
//! commutative and associative operators, which is what makes the cache
//! catch permuted duplicates in the first place.
//!
//! The [`reify`] pass splits double reifications into half-reifications,
//! [`comparison`] normalizes every comparison into a `LinExpr ⋈ Constant`
//! shape, [`linearize`] rewrites the result into a restricted linear
//! vocabulary (with Big-M and bipartite-matching encodings), [`positive`]
//! eliminates negated boolean views, and [`redundancy`] drops duplicates
//! and tautologies.
//!
//! Each pass is a pure function over an ordered constraint sequence and can
//! be run on its own; [`compile`] is the standard stacking. The CSE cache
//! and the variable pool are threaded explicitly and live for exactly one
//! invocation.

use indexmap::IndexSet;
use tracing::debug;

use crate::ast::{Expr, VarPool};
use crate::Error;

pub mod canonical;
pub mod comparison;
pub mod flatten;
#[cfg(test)]
mod fuzz_test;
pub mod linearize;
pub mod positive;
pub mod redundancy;
pub mod reify;

/// Configuration of a pipeline invocation.
#[derive(Debug, Clone)]
pub struct Options {
    /// Operator and global names the backend consumes natively. Everything
    /// else is rewritten or rejected by the linearizer.
    pub supported: IndexSet<&'static str>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            supported: linearize::default_supported(),
        }
    }
}

/// Run the full pipeline on an ordered sequence of constraint roots.
///
/// Returns the linearized constraint set. Auxiliary variables end up in
/// `pool` next to the originals, with their resolved domains.
pub fn compile(
    constraints: &[Expr],
    pool: &mut VarPool,
    options: &Options,
) -> Result<Vec<Expr>, Error> {
    let cons = flatten::toplevel_list(constraints)?;
    debug!(count = cons.len(), "toplevel normalization");

    let mut cache = flatten::ExprCache::new();
    let cons = flatten::Flattener::new(pool, &mut cache).flatten_constraints(&cons);
    debug!(count = cons.len(), cached = cache.len(), "flattening");

    let cons = canonical::canonicalize_constraints(&cons);
    let cons = reify::only_bv_reifies(&cons)?;
    let cons = comparison::canonical_comparison(&cons);

    let cons = linearize::Linearizer::new(pool, &mut cache, options.supported.clone())
        .linearize(&cons, false)?;
    debug!(count = cons.len(), "linearization");

    let cons = positive::only_positive_bv(&cons, pool, &mut cache)?;
    let cons = redundancy::remove_redundant(&cons);
    debug!(count = cons.len(), variables = pool.len(), "pipeline done");
    Ok(cons)
}
