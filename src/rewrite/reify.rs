//! Unnesting of reified boolean expressions.
//!
//! Flattening leaves double reifications `BoolExpr == BV` in the constraint
//! set. The linearizer only accepts boolean variables on the left of an
//! implication, so this pass splits every such equivalence into its two
//! half-reifications:
//!
//! ```text
//! BoolExpr == BV   ~~>   BV -> BoolExpr,  ¬BV -> ¬BoolExpr
//! ```
//!
//! The negated side is computed structurally on the flat expression:
//! comparison operators flip, conjunctions and disjunctions dualize over
//! negated views, `¬(a -> b)` is `a ∧ ¬b` and `¬(a xor b)` is `a == b`.
//! Reified globals have no such dual and are reported as unsupported.

use crate::ast::{CmpOp, Expr, ExprKind, OpKind};

use super::linearize::LinearizationUnsupported;

/// Rewrite double reifications into half-reifications.
pub fn only_bv_reifies(constraints: &[Expr]) -> Result<Vec<Expr>, LinearizationUnsupported> {
    let mut out = Vec::new();
    for constraint in constraints {
        reify_constraint(constraint, &mut out)?;
    }
    Ok(out)
}

fn reify_constraint(constraint: &Expr, out: &mut Vec<Expr>) -> Result<(), LinearizationUnsupported> {
    match &constraint.kind {
        ExprKind::Cmp(CmpOp::Eq, lhs, rhs)
            if rhs.is_bool_var() && lhs.is_bool() && !lhs.is_flat_var() =>
        {
            // `¬e == b` is `e == ¬b`
            if let ExprKind::Op(OpKind::Not, args) = &lhs.kind {
                return reify_constraint(&Expr::eq(args[0].clone(), rhs.negate()), out);
            }
            let negated = negate_flat(lhs)?;
            out.push(implication(rhs.clone(), lhs.clone()));
            out.push(implication(rhs.negate(), negated));
            Ok(())
        }
        _ => {
            out.push(constraint.clone());
            Ok(())
        }
    }
}

/// The negation of a flat boolean expression, as a flat boolean expression.
fn negate_flat(expr: &Expr) -> Result<Expr, LinearizationUnsupported> {
    match &expr.kind {
        ExprKind::Var(_)
        | ExprKind::NegView(_)
        | ExprKind::BoolLit(_)
        | ExprKind::Cmp(_, _, _)
        | ExprKind::Op(OpKind::Not, _) => Ok(expr.negate()),
        ExprKind::Op(OpKind::And, args) => Ok(Expr::from_kind(ExprKind::Op(
            OpKind::Or,
            args.iter().map(|arg| arg.negate()).collect(),
        ))),
        ExprKind::Op(OpKind::Or, args) => Ok(Expr::from_kind(ExprKind::Op(
            OpKind::And,
            args.iter().map(|arg| arg.negate()).collect(),
        ))),
        ExprKind::Op(OpKind::Xor, args) => Ok(Expr::eq(args[0].clone(), args[1].clone())),
        ExprKind::Op(OpKind::Implies, args) => Ok(Expr::from_kind(ExprKind::Op(
            OpKind::And,
            vec![args[0].clone(), args[1].negate()],
        ))),
        _ => Err(LinearizationUnsupported::new(
            expr,
            "cannot negate this reified constraint; run global-constraint decomposition first"
                .to_string(),
        )),
    }
}

fn implication(lhs: Expr, rhs: Expr) -> Expr {
    Expr::from_kind(ExprKind::Op(OpKind::Implies, vec![lhs, rhs]))
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::ast::VarPool;

    use super::*;

    #[test]
    fn disjunction_reification_splits_into_half_reifications() {
        let mut pool = VarPool::new();
        let p = Expr::var(pool.bool_var("p").unwrap());
        let q = Expr::var(pool.bool_var("q").unwrap());
        let b = Expr::var(pool.bool_var("b").unwrap());
        let c = Expr::eq(Expr::or(vec![p, q]).unwrap(), b);
        let out = only_bv_reifies(&[c]).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].to_string(), "(b -> (p || q))");
        assert_eq!(out[1].to_string(), "(~b -> (~p && ~q))");
    }

    #[test]
    fn comparison_reification_flips_the_operator() {
        let mut pool = VarPool::new();
        let x = Expr::var(pool.int_var(0, 9, "x").unwrap());
        let y = Expr::var(pool.int_var(0, 9, "y").unwrap());
        let b = Expr::var(pool.bool_var("b").unwrap());
        let c = Expr::eq(Expr::le(x, y), b);
        let out = only_bv_reifies(&[c]).unwrap();
        assert_eq!(out[0].to_string(), "(b -> (x <= y))");
        assert_eq!(out[1].to_string(), "(~b -> (x > y))");
    }

    #[test]
    fn negated_views_as_targets_flip_polarity() {
        let mut pool = VarPool::new();
        let p = Expr::var(pool.bool_var("p").unwrap());
        let q = Expr::var(pool.bool_var("q").unwrap());
        let b = Expr::var(pool.bool_var("b").unwrap());
        let c = Expr::eq(Expr::and(vec![p, q]).unwrap(), b.negate());
        let out = only_bv_reifies(&[c]).unwrap();
        assert_eq!(out[0].to_string(), "(~b -> (p && q))");
        assert_eq!(out[1].to_string(), "(b -> (~p || ~q))");
    }

    #[test]
    fn plain_variable_equivalences_pass_through() {
        let mut pool = VarPool::new();
        let a = Expr::var(pool.bool_var("a").unwrap());
        let b = Expr::var(pool.bool_var("b").unwrap());
        let c = Expr::eq(a, b);
        let out = only_bv_reifies(&[c.clone()]).unwrap();
        assert_eq!(out, vec![c]);
    }

    #[test]
    fn reified_globals_are_rejected() {
        let mut pool = VarPool::new();
        let x = Expr::var(pool.int_var(0, 2, "x").unwrap());
        let y = Expr::var(pool.int_var(0, 2, "y").unwrap());
        let b = Expr::var(pool.bool_var("b").unwrap());
        let c = Expr::eq(Expr::alldifferent(vec![x, y]).unwrap(), b);
        assert!(only_bv_reifies(&[c]).is_err());
    }
}
