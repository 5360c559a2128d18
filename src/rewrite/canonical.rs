//! Canonical ordering of commutative and associative operators.
//!
//! Rewrites every expression into a fixed representative of its equivalence
//! class under commutativity, associativity and De Morgan duality, so that
//! structurally equal expressions render to identical canonical keys. The
//! CSE cache of the flattener and the redundancy filter both rely on this:
//! two operand permutations of the same commutative expression must compare
//! equal by key.
//!
//! The pass is pure and idempotent. Rules are applied innermost first.

use crate::ast::{Expr, ExprKind, GlobalArg, GlobalKind, OpKind};
use crate::pretty::pretty_string;

/// The canonical string key of an expression: the rendering of its
/// canonical form.
pub fn canonical_key(expr: &Expr) -> String {
    pretty_string(&canonicalize(expr))
}

/// Canonicalize a single expression.
pub fn canonicalize(expr: &Expr) -> Expr {
    match &expr.kind {
        ExprKind::Var(_)
        | ExprKind::NegView(_)
        | ExprKind::Const(_)
        | ExprKind::BoolLit(_)
        | ExprKind::Opaque(_) => expr.clone(),

        ExprKind::Op(OpKind::Sum, args) => {
            let args = sort_by_key(args.iter().map(canonicalize).collect());
            Expr::from_kind(ExprKind::Op(OpKind::Sum, args))
        }

        ExprKind::Op(op @ (OpKind::And | OpKind::Or), args) => {
            let args: Vec<Expr> = args.iter().map(canonicalize).collect();
            // all-negated connectives collapse to the negated dual, so both
            // polarity encodings of the same formula share one key
            if args
                .iter()
                .all(|arg| matches!(arg.kind, ExprKind::NegView(_)))
            {
                let dual = match op {
                    OpKind::And => OpKind::Or,
                    _ => OpKind::And,
                };
                let parents = sort_by_key(args.iter().map(|arg| arg.negate()).collect());
                Expr::from_kind(ExprKind::Op(dual, parents)).negate()
            } else {
                Expr::from_kind(ExprKind::Op(*op, sort_by_key(args)))
            }
        }

        ExprKind::Op(OpKind::Mul, _) => {
            let mut operands = Vec::new();
            collect_mul_operands(expr, &mut operands);
            let operands = sort_by_key(operands);
            operands
                .into_iter()
                .reduce(Expr::mul)
                .expect("mul has two operands")
        }

        ExprKind::Op(op @ (OpKind::Div | OpKind::Mod), args) => Expr::from_kind(ExprKind::Op(
            *op,
            vec![canonicalize(&args[0]), canonicalize(&args[1])],
        )),

        // the exponent is not commutative with the base and stays untouched
        ExprKind::Op(OpKind::Pow, args) => Expr::from_kind(ExprKind::Op(
            OpKind::Pow,
            vec![canonicalize(&args[0]), args[1].clone()],
        )),

        ExprKind::Op(OpKind::Neg, args) => {
            if args[0].is_flat_var() {
                expr.clone()
            } else {
                Expr::neg(canonicalize(&args[0]))
            }
        }

        ExprKind::Op(OpKind::Not, args) => {
            let inner = canonicalize(&args[0]);
            // fold the negation into the operand where a canonical negated
            // form exists
            let foldable = matches!(
                &inner.kind,
                ExprKind::Var(_)
                    | ExprKind::NegView(_)
                    | ExprKind::BoolLit(_)
                    | ExprKind::Cmp(_, _, _)
                    | ExprKind::Op(OpKind::Not, _)
            );
            if foldable {
                inner.negate()
            } else {
                Expr::from_kind(ExprKind::Op(OpKind::Not, vec![inner]))
            }
        }

        ExprKind::Op(op @ (OpKind::Xor | OpKind::Implies), args) => Expr::from_kind(ExprKind::Op(
            *op,
            args.iter().map(canonicalize).collect(),
        )),

        ExprKind::Wsum(weights, args) => {
            let mut pairs: Vec<(String, i64, Expr)> = weights
                .iter()
                .zip(args)
                .map(|(w, arg)| {
                    let arg = canonicalize(arg);
                    // argument key first, weight only as tie-break
                    (format!("{}{}", pretty_string(&arg), w), *w, arg)
                })
                .collect();
            pairs.sort_by(|a, b| a.0.cmp(&b.0));
            let (weights, args) = pairs.into_iter().map(|(_, w, arg)| (w, arg)).unzip();
            Expr::from_kind(ExprKind::Wsum(weights, args))
        }

        ExprKind::Cmp(op, lhs, rhs) => Expr::cmp(*op, canonicalize(lhs), canonicalize(rhs)),

        ExprKind::Global(GlobalKind::AllDifferent, args) => {
            let args = sort_by_key(
                args.iter()
                    .map(|arg| match arg {
                        GlobalArg::One(e) => canonicalize(e),
                        GlobalArg::Many(_) => panic!("nested list in `{}`", expr),
                    })
                    .collect(),
            );
            Expr::from_kind(ExprKind::Global(
                GlobalKind::AllDifferent,
                args.into_iter().map(GlobalArg::One).collect(),
            ))
        }

        ExprKind::Global(global, args) => Expr::from_kind(ExprKind::Global(
            *global,
            args.iter()
                .map(|arg| match arg {
                    GlobalArg::One(e) => GlobalArg::One(canonicalize(e)),
                    GlobalArg::Many(es) => GlobalArg::Many(es.iter().map(canonicalize).collect()),
                })
                .collect(),
        )),
    }
}

/// Canonicalize a sequence of constraint roots.
///
/// Nested expressions get the full ruleset. The root itself keeps its
/// polarity: the De Morgan collapse applies to sub-expressions only, so no
/// later pass has to consume a negation at constraint level.
pub fn canonicalize_constraints(constraints: &[Expr]) -> Vec<Expr> {
    constraints.iter().map(canonicalize_constraint).collect()
}

fn canonicalize_constraint(constraint: &Expr) -> Expr {
    match &constraint.kind {
        ExprKind::Cmp(op, lhs, rhs) => Expr::cmp(*op, canonicalize(lhs), canonicalize(rhs)),
        ExprKind::Op(op, args) => {
            Expr::from_kind(ExprKind::Op(*op, args.iter().map(canonicalize).collect()))
        }
        ExprKind::Global(_, _) => canonicalize(constraint),
        _ => constraint.clone(),
    }
}

fn sort_by_key(mut args: Vec<Expr>) -> Vec<Expr> {
    args.sort_by_cached_key(|arg| pretty_string(arg));
    args
}

/// Flatten nested multiplications into one associative operand list,
/// e.g. `A * B * ((C * D) * E)` becomes `[A, B, C, D, E]`.
fn collect_mul_operands(expr: &Expr, out: &mut Vec<Expr>) {
    match &expr.kind {
        ExprKind::Op(OpKind::Mul, args) => {
            collect_mul_operands(&args[0], out);
            collect_mul_operands(&args[1], out);
        }
        _ => out.push(canonicalize(expr)),
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::ast::VarPool;

    use super::*;

    fn vars(pool: &mut VarPool) -> (Expr, Expr, Expr) {
        (
            Expr::var(pool.int_var(0, 9, "a").unwrap()),
            Expr::var(pool.int_var(0, 9, "b").unwrap()),
            Expr::var(pool.int_var(0, 9, "c").unwrap()),
        )
    }

    #[test]
    fn permuted_sums_share_a_key() {
        let mut pool = VarPool::new();
        let (a, b, c) = vars(&mut pool);
        let e1 = Expr::sum(vec![a.clone(), b.clone(), c.clone()]).unwrap();
        let e2 = Expr::sum(vec![c, a, b]).unwrap();
        assert_eq!(canonical_key(&e1), canonical_key(&e2));
    }

    #[test]
    fn nested_muls_flatten_sort_and_refold() {
        let mut pool = VarPool::new();
        let (a, b, c) = vars(&mut pool);
        let d = Expr::var(pool.int_var(0, 9, "d").unwrap());
        let e = Expr::mul(Expr::mul(d, b), Expr::mul(c, a));
        assert_eq!(canonicalize(&e).to_string(), "(((a * b) * c) * d)");
    }

    #[test]
    fn wsum_sorts_pairs_by_argument_key() {
        let mut pool = VarPool::new();
        let (a, b, _) = vars(&mut pool);
        let e = Expr::wsum(vec![5, 2], vec![b.clone(), a.clone()]).unwrap();
        let canon = canonicalize(&e);
        assert_eq!(canon, Expr::wsum(vec![2, 5], vec![a, b]).unwrap());
    }

    #[test]
    fn de_morgan_collapses_all_negated_connectives() {
        let mut pool = VarPool::new();
        let p = Expr::var(pool.bool_var("p").unwrap());
        let q = Expr::var(pool.bool_var("q").unwrap());
        let e = Expr::and(vec![q.negate(), p.negate()]).unwrap();
        assert_eq!(canonicalize(&e).to_string(), "!((p || q))");
        let e = Expr::or(vec![q.negate(), p.negate()]).unwrap();
        assert_eq!(canonicalize(&e).to_string(), "!((p && q))");
    }

    #[test]
    fn mixed_polarity_connectives_only_sort() {
        let mut pool = VarPool::new();
        let p = Expr::var(pool.bool_var("p").unwrap());
        let q = Expr::var(pool.bool_var("q").unwrap());
        let e = Expr::or(vec![q.negate(), p.clone()]).unwrap();
        assert_eq!(canonicalize(&e).to_string(), "(p || ~q)");
    }

    #[test]
    fn alldifferent_arguments_sort() {
        let mut pool = VarPool::new();
        let (a, b, c) = vars(&mut pool);
        let e = Expr::alldifferent(vec![c.clone(), a.clone(), b.clone()]).unwrap();
        assert_eq!(
            canonicalize(&e),
            Expr::alldifferent(vec![a, b, c]).unwrap()
        );
    }

    #[test]
    fn canonicalize_is_idempotent() {
        let mut pool = VarPool::new();
        let (a, b, c) = vars(&mut pool);
        let p = Expr::var(pool.bool_var("p").unwrap());
        let q = Expr::var(pool.bool_var("q").unwrap());
        let exprs = [
            Expr::sum(vec![Expr::mul(c.clone(), b.clone()), a.clone()]).unwrap(),
            Expr::wsum(vec![-1, 3], vec![b.clone(), Expr::mul(a.clone(), c.clone())]).unwrap(),
            Expr::and(vec![q.negate(), p.negate()]).unwrap(),
            Expr::eq(
                Expr::sum(vec![b, a]).unwrap(),
                Expr::pow(c, Expr::constant(2)).unwrap(),
            ),
        ];
        for e in exprs {
            let once = canonicalize(&e);
            assert_eq!(canonicalize(&once), once);
        }
    }
}
