//! Elimination of negated boolean views from linearized constraints.
//!
//! Backends that only accept plain variables in linear expressions cannot
//! see a [`NegView`](crate::ast::ExprKind::NegView). This pass substitutes
//! `1 - parent` for every view and folds the constant into the right-hand
//! side: a weighted-sum term `w * ¬x` becomes `-w * x` with the bound
//! shifted by `w`. Non-linear operators get a dedicated auxiliary variable
//! per negated argument instead. Indicator conditions may stay negated.
//!
//! Inputs must already be linearized (see [`super::linearize`]).

use crate::ast::{Expr, ExprKind, OpKind, VarPool};

use super::flatten::{ExprCache, Flattener};
use super::linearize::{default_supported, LinearizationUnsupported, Linearizer};

/// Rewrite linearized constraints to use only non-negated boolean variables
/// outside indicator conditions.
pub fn only_positive_bv(
    constraints: &[Expr],
    pool: &mut VarPool,
    cache: &mut ExprCache,
) -> Result<Vec<Expr>, LinearizationUnsupported> {
    let mut out = Vec::new();
    for constraint in constraints {
        positive_constraint(constraint, pool, cache, &mut out)?;
    }
    Ok(out)
}

fn positive_constraint(
    constraint: &Expr,
    pool: &mut VarPool,
    cache: &mut ExprCache,
    out: &mut Vec<Expr>,
) -> Result<(), LinearizationUnsupported> {
    match &constraint.kind {
        ExprKind::Cmp(op, lhs, rhs) => {
            let mut lhs = lhs.clone();
            let mut rhs = rhs.clone();
            let mut aux_cons = Vec::new();

            // a lone negated view: `¬x ⋈ c` is `-x ⋈ c - 1`
            if let ExprKind::NegView(parent) = &lhs.kind {
                let parent = parent.clone();
                let c = expect_const(&rhs, constraint);
                lhs = Expr::from_kind(ExprKind::Wsum(vec![-1], vec![Expr::var(parent)]));
                rhs = Expr::constant(c - 1);
            }

            // a sum with negated views becomes a weighted sum first
            if let ExprKind::Op(OpKind::Sum, args) = &lhs.kind {
                if args
                    .iter()
                    .any(|arg| matches!(arg.kind, ExprKind::NegView(_)))
                {
                    let args = args.clone();
                    lhs = Expr::from_kind(ExprKind::Wsum(vec![1; args.len()], args));
                }
            }

            // `w * ¬x` becomes `-w * x` with the bound shifted by `w`
            if let ExprKind::Wsum(weights, args) = &lhs.kind {
                if args
                    .iter()
                    .any(|arg| matches!(arg.kind, ExprKind::NegView(_)))
                {
                    let (weights, args) = (weights.clone(), args.clone());
                    let c = expect_const(&rhs, constraint);
                    let mut shift = 0i64;
                    let mut new_weights = Vec::with_capacity(weights.len());
                    let mut new_args = Vec::with_capacity(args.len());
                    for (w, arg) in weights.iter().zip(&args) {
                        if let ExprKind::NegView(parent) = &arg.kind {
                            new_weights.push(-w);
                            new_args.push(Expr::var(parent.clone()));
                            shift += w;
                        } else {
                            new_weights.push(*w);
                            new_args.push(arg.clone());
                        }
                    }
                    lhs = Expr::from_kind(ExprKind::Wsum(new_weights, new_args));
                    rhs = Expr::constant(c - shift);
                }
            }

            // non-linear operators substitute an auxiliary `aux == 1 - x`
            // per negated argument
            if let ExprKind::Op(op2, args) = &lhs.kind {
                if !matches!(op2, OpKind::Sum)
                    && args
                        .iter()
                        .any(|arg| matches!(arg.kind, ExprKind::NegView(_)))
                {
                    let (op2, args) = (*op2, args.clone());
                    let mut flattener = Flattener::new(pool, cache);
                    let mut new_args = Vec::with_capacity(args.len());
                    for arg in &args {
                        if let ExprKind::NegView(parent) = &arg.kind {
                            let complement = Expr::sum(vec![
                                Expr::constant(1),
                                Expr::neg(Expr::var(parent.clone())),
                            ])
                            .unwrap();
                            let (aux, cons) = flattener.get_or_make_var(&complement);
                            new_args.push(aux);
                            aux_cons.extend(cons);
                        } else {
                            new_args.push(arg.clone());
                        }
                    }
                    lhs = Expr::from_kind(ExprKind::Op(op2, new_args));
                }
            }

            out.push(Expr::cmp(*op, lhs, rhs));
            if !aux_cons.is_empty() {
                let mut linearizer = Linearizer::new(pool, cache, default_supported());
                let lin = linearizer.linearize(&aux_cons, false)?;
                out.extend(only_positive_bv(&lin, pool, cache)?);
            }
            Ok(())
        }

        // indicator: the condition may stay negated, the body may not
        ExprKind::Op(OpKind::Implies, args) => {
            let (cond, sub) = (&args[0], &args[1]);
            assert!(
                cond.is_bool_var(),
                "`{}` is not a linear constraint; run linearization first",
                constraint
            );
            let mut sub_out = Vec::new();
            positive_constraint(sub, pool, cache, &mut sub_out)?;
            out.extend(sub_out.into_iter().map(|e| {
                Expr::from_kind(ExprKind::Op(OpKind::Implies, vec![cond.clone(), e]))
            }));
            Ok(())
        }

        ExprKind::Global(_, _) | ExprKind::BoolLit(_) | ExprKind::Opaque(_) => {
            out.push(constraint.clone());
            Ok(())
        }

        _ => panic!(
            "`{}` is not a linear constraint; run linearization first",
            constraint
        ),
    }
}

fn expect_const(rhs: &Expr, constraint: &Expr) -> i64 {
    rhs.as_const().unwrap_or_else(|| {
        panic!(
            "expected a constant right-hand side in `{}`; run comparison normalization first",
            constraint
        )
    })
}
