//! Normalization of comparisons into the `LinExpr ⋈ Constant` shape.
//!
//! [`canonical_comparison`] moves every variable term to the left-hand side
//! (negating terms pulled across the relation) and folds every constant into
//! a single right-hand constant. Reified comparisons and the comparison side
//! of an implication are normalized one level deep. Left-hand sides outside
//! the linear vocabulary (products, divisions, globals) pass through
//! untouched; the linearizer decides their fate.

use indexmap::IndexSet;

use crate::ast::{CmpOp, Expr, ExprKind, OpKind, VarPool};
use crate::pretty::pretty_string;

use super::flatten::{ExprCache, Flattener};

/// Normalize a sequence of constraints.
pub fn canonical_comparison(constraints: &[Expr]) -> Vec<Expr> {
    constraints.iter().map(canonical_comparison_one).collect()
}

pub(crate) fn canonical_comparison_one(constraint: &Expr) -> Expr {
    match &constraint.kind {
        // half-reification: normalize the comparison side
        ExprKind::Op(OpKind::Implies, args) => {
            let (lhs, rhs) = (&args[0], &args[1]);
            if matches!(rhs.kind, ExprKind::Cmp(_, _, _)) {
                implication(lhs.clone(), canonical_comparison_one(rhs))
            } else if matches!(lhs.kind, ExprKind::Cmp(_, _, _)) {
                implication(canonical_comparison_one(lhs), rhs.clone())
            } else {
                constraint.clone()
            }
        }
        ExprKind::Cmp(op, lhs, rhs) => {
            // reification of a comparison: recurse into the left side only
            let lhs = if *op == CmpOp::Eq && matches!(lhs.kind, ExprKind::Cmp(_, _, _)) {
                canonical_comparison_one(lhs)
            } else {
                lhs.clone()
            };
            if !is_linear_expr(&lhs) || !is_linear_expr(rhs) {
                return Expr::cmp(*op, lhs, rhs.clone());
            }

            let mut terms: Vec<(i64, Expr)> = Vec::new();
            let mut constant = 0i64;
            push_terms(&lhs, 1, &mut terms, &mut constant);
            push_terms(rhs, -1, &mut terms, &mut constant);
            let terms = merge_terms(terms);

            if terms.is_empty() {
                // everything folded away: the comparison is decided
                return Expr::bool_lit(op.holds(0, constant));
            }
            let linexpr = if terms.iter().all(|(w, _)| *w == 1) {
                Expr::from_kind(ExprKind::Op(
                    OpKind::Sum,
                    terms.into_iter().map(|(_, arg)| arg).collect(),
                ))
            } else {
                let (weights, args) = terms.into_iter().unzip();
                Expr::from_kind(ExprKind::Wsum(weights, args))
            };
            Expr::cmp(*op, linexpr, Expr::constant(constant))
        }
        _ => constraint.clone(),
    }
}

fn is_linear_expr(expr: &Expr) -> bool {
    matches!(
        expr.kind,
        ExprKind::Const(_)
            | ExprKind::Var(_)
            | ExprKind::NegView(_)
            | ExprKind::Op(OpKind::Sum, _)
            | ExprKind::Wsum(_, _)
    )
}

/// Accumulate `weight * expr` into the term list, folding constants into the
/// right-hand accumulator. Terms from the right-hand side arrive with a
/// negated weight.
fn push_terms(expr: &Expr, weight: i64, terms: &mut Vec<(i64, Expr)>, constant: &mut i64) {
    match &expr.kind {
        ExprKind::Const(value) => *constant -= weight * value,
        ExprKind::Op(OpKind::Sum, args) => {
            for arg in args {
                push_terms(arg, weight, terms, constant);
            }
        }
        ExprKind::Wsum(weights, args) => {
            for (w, arg) in weights.iter().zip(args) {
                push_terms(arg, weight * w, terms, constant);
            }
        }
        _ => terms.push((weight, expr.clone())),
    }
}

/// Combine like terms, dropping those that cancel out. Keeps the first
/// occurrence order.
fn merge_terms(terms: Vec<(i64, Expr)>) -> Vec<(i64, Expr)> {
    let mut merged: Vec<(String, i64, Expr)> = Vec::new();
    for (w, arg) in terms {
        let key = pretty_string(&arg);
        match merged.iter_mut().find(|(k, _, _)| *k == key) {
            Some(entry) => entry.1 += w,
            None => merged.push((key, w, arg)),
        }
    }
    merged
        .into_iter()
        .filter(|(_, w, _)| *w != 0)
        .map(|(_, w, arg)| (w, arg))
        .collect()
}

fn implication(lhs: Expr, rhs: Expr) -> Expr {
    Expr::from_kind(ExprKind::Op(OpKind::Implies, vec![lhs, rhs]))
}

/// Rewrite `NumExpr ⋈ Var` (⋈ other than `==`) into `(NumExpr == A)` plus
/// `(A ⋈ Var)` when the left-hand operator is not in `supported`. Solvers
/// that only accept equality on general numeric expressions need this.
pub fn only_numexpr_equality(
    constraints: &[Expr],
    pool: &mut VarPool,
    cache: &mut ExprCache,
    supported: &IndexSet<&'static str>,
) -> Vec<Expr> {
    let mut out = Vec::new();
    for constraint in constraints {
        match &constraint.kind {
            ExprKind::Cmp(op, lhs, rhs)
                if *op != CmpOp::Eq
                    && !lhs.is_flat_var()
                    && lhs.op_name().map_or(true, |name| !supported.contains(name)) =>
            {
                let mut flattener = Flattener::new(pool, cache);
                let (lvar, lcons) = flattener.get_or_make_var(lhs);
                out.extend(lcons);
                out.push(Expr::cmp(*op, lvar, rhs.clone()));
            }
            _ => out.push(constraint.clone()),
        }
    }
    out
}
