//! Removal of duplicate and trivially true constraints.
//!
//! Applied after canonicalization, so permuted duplicates have already been
//! rewritten to identical renderings. Deduplication is order-preserving: a
//! seen-set decides membership, the output keeps the first occurrence in
//! input order. Trivially false constraints survive; dropping them would
//! change satisfiability.

use indexmap::IndexSet;
use tracing::debug;

use crate::ast::{CmpOp, Expr, ExprKind};
use crate::pretty::pretty_string;

/// Filter out `true`, reflexive comparisons of syntactically identical
/// sides, and exact duplicates.
pub fn remove_redundant(constraints: &[Expr]) -> Vec<Expr> {
    let mut seen = IndexSet::new();
    let mut out = Vec::new();
    for constraint in constraints {
        if matches!(constraint.kind, ExprKind::BoolLit(true)) {
            continue;
        }
        if let ExprKind::Cmp(CmpOp::Eq | CmpOp::Le | CmpOp::Ge, lhs, rhs) = &constraint.kind {
            if pretty_string(lhs) == pretty_string(rhs) {
                continue;
            }
        }
        if seen.insert(pretty_string(constraint)) {
            out.push(constraint.clone());
        }
    }
    debug!(
        before = constraints.len(),
        after = out.len(),
        "removed redundant constraints"
    );
    out
}

#[cfg(test)]
mod test {
    use crate::ast::{Expr, VarPool};

    use super::*;

    #[test]
    fn duplicates_tautologies_and_identical_sides_vanish() {
        let mut pool = VarPool::new();
        let a = Expr::var(pool.int_var(0, 9, "a").unwrap());
        let b = Expr::var(pool.int_var(0, 9, "b").unwrap());
        let c = Expr::var(pool.int_var(0, 9, "c").unwrap());
        let d = Expr::var(pool.int_var(0, 9, "d").unwrap());

        let sum_eq = Expr::eq(Expr::sum(vec![a, b]).unwrap(), c);
        let cons = [
            sum_eq.clone(),
            sum_eq.clone(),
            Expr::bool_lit(true),
            Expr::eq(d.clone(), d.clone()),
        ];
        assert_eq!(remove_redundant(&cons), vec![sum_eq]);
    }

    #[test]
    fn irreflexive_identical_sides_survive() {
        let mut pool = VarPool::new();
        let d = Expr::var(pool.int_var(0, 9, "d").unwrap());
        let c = Expr::ne(d.clone(), d);
        assert_eq!(remove_redundant(&[c.clone()]), vec![c]);
    }

    #[test]
    fn false_survives() {
        let c = Expr::bool_lit(false);
        assert_eq!(remove_redundant(&[c.clone(), c.clone()]), vec![c]);
    }

    #[test]
    fn output_order_is_input_order() {
        let mut pool = VarPool::new();
        let a = Expr::var(pool.int_var(0, 9, "a").unwrap());
        let b = Expr::var(pool.int_var(0, 9, "b").unwrap());
        let c1 = Expr::le(b.clone(), a.clone());
        let c2 = Expr::le(a, Expr::constant(5));
        let out = remove_redundant(&[c1.clone(), c2.clone(), c1.clone()]);
        assert_eq!(out, vec![c1, c2]);
    }
}
