//! Compilation pipeline for constraint-programming models: a stack of
//! semantics-preserving rewrite passes that turn arbitrarily nested
//! arithmetic/boolean/relational expression trees into a flat, canonical
//! and (optionally) linear form for solver backends.
//!
//! The [`ast`] module holds the expression model: variables, constants,
//! operators, comparisons, global relations and opaque pass-through
//! constraints, together with bound inference and ground evaluation. The
//! [`rewrite`] module holds the passes; [`rewrite::compile`] stacks them.
//!
//! A frontend builds its constraints with the [`ast::Expr`] constructors and
//! an [`ast::VarPool`], compiles, and ships the result plus the pool's
//! variables (original and auxiliary, with resolved domains) to a backend.
//! This crate does not decide satisfiability and does not interpret solver
//! results.
//!
//! ```
//! use flattery::ast::{Expr, VarPool};
//! use flattery::rewrite::{self, Options};
//!
//! let mut pool = VarPool::new();
//! let x = Expr::var(pool.int_var(0, 3, "x")?);
//! let y = Expr::var(pool.int_var(0, 3, "y")?);
//! let cons = rewrite::compile(&[Expr::ne(x, y)], &mut pool, &Options::default())?;
//! assert!(!cons.is_empty());
//! # Ok::<(), flattery::Error>(())
//! ```

use thiserror::Error as ThisError;

pub mod ast;
pub mod pretty;
pub mod rewrite;

pub use ast::expr::MalformedExpression;
pub use rewrite::linearize::LinearizationUnsupported;

/// Any error surfaced by expression construction or the pipeline.
#[derive(Debug, Clone, ThisError)]
pub enum Error {
    #[error(transparent)]
    Malformed(#[from] MalformedExpression),
    #[error(transparent)]
    Unsupported(#[from] LinearizationUnsupported),
}
