//! Types for the abstract syntax trees of constraint expressions.

pub mod bounds;
pub mod eval;
pub mod shared;
pub use shared::*;
pub mod symbol;
pub use symbol::*;
pub mod var;
pub use var::*;
pub mod expr;
pub use expr::*;
pub mod util;
