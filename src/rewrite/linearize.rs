//! Linearization of flat constraints into a restricted linear vocabulary.
//!
//! Linearized constraints have one of the following forms:
//!
//! - `LinExpr == Constant` / `LinExpr <= Constant` / `LinExpr >= Constant`,
//!   where `LinExpr` is a variable, a sum or a weighted sum;
//! - indicator constraints `BoolVar -> LinExpr ⋈ Constant`, where the
//!   boolean may be negated;
//! - global relations from the caller-supplied supported set;
//! - opaque constraints, forwarded unchanged.
//!
//! Inputs must be flat and comparison-normalized, with only boolean
//! variables on the left of implications (see [`super::reify`]).
//! AllDifferent gets a dedicated bipartite-matching decomposition when it is
//! not supported natively; any other unsupported operator is a hard error
//! telling the caller which decomposition to run first.

use indexmap::IndexSet;
use thiserror::Error;
use tracing::trace;

use crate::ast::bounds::bounds;
use crate::ast::util::variables_of;
use crate::ast::{CmpOp, Expr, ExprKind, GlobalArg, GlobalKind, OpKind, VarPool};
use crate::pretty::join_commas;

use super::comparison::canonical_comparison_one;
use super::flatten::{ExprCache, Flattener};

/// An operator or global outside the supported set reached the linearizer.
#[derive(Debug, Clone, Error)]
#[error("cannot linearize `{expr}`: {reason}")]
pub struct LinearizationUnsupported {
    pub expr: String,
    pub reason: String,
}

impl LinearizationUnsupported {
    pub(crate) fn new(expr: &Expr, reason: impl Into<String>) -> Self {
        LinearizationUnsupported {
            expr: expr.to_string(),
            reason: reason.into(),
        }
    }
}

/// The default supported set: plain and weighted sums.
pub fn default_supported() -> IndexSet<&'static str> {
    ["sum", "wsum"].into_iter().collect()
}

/// The linearization pass. Shares the variable pool and CSE cache of the
/// pipeline invocation, since several rewrites introduce fresh variables and
/// re-enter flattening.
pub struct Linearizer<'a> {
    pool: &'a mut VarPool,
    cache: &'a mut ExprCache,
    supported: IndexSet<&'static str>,
}

impl<'a> Linearizer<'a> {
    pub fn new(
        pool: &'a mut VarPool,
        cache: &'a mut ExprCache,
        supported: IndexSet<&'static str>,
    ) -> Self {
        Linearizer {
            pool,
            cache,
            supported,
        }
    }

    /// Linearize an ordered constraint sequence. With `reified` set, the
    /// output must stay usable under an indicator: disequalities use the
    /// Big-M encoding instead of a case split on a fresh indicator.
    pub fn linearize(
        &mut self,
        constraints: &[Expr],
        reified: bool,
    ) -> Result<Vec<Expr>, LinearizationUnsupported> {
        let mut out = Vec::new();
        for constraint in constraints {
            self.linearize_constraint(constraint, reified, &mut out)?;
        }
        Ok(out)
    }

    fn linearize_constraint(
        &mut self,
        constraint: &Expr,
        reified: bool,
        out: &mut Vec<Expr>,
    ) -> Result<(), LinearizationUnsupported> {
        match &constraint.kind {
            ExprKind::Var(var) if var.is_bool() => {
                out.push(Expr::ge(sum(vec![constraint.clone()]), Expr::constant(1)))
            }
            ExprKind::NegView(_) => {
                out.push(Expr::ge(sum(vec![constraint.clone()]), Expr::constant(1)))
            }
            ExprKind::BoolLit(_) | ExprKind::Opaque(_) => out.push(constraint.clone()),

            // boolean connectives become cardinality constraints
            ExprKind::Op(OpKind::And, args) => out.push(Expr::ge(
                sum(args.clone()),
                Expr::constant(args.len() as i64),
            )),
            ExprKind::Op(OpKind::Or, args) => {
                out.push(Expr::ge(sum(args.clone()), Expr::constant(1)))
            }
            ExprKind::Op(OpKind::Xor, args) => {
                out.push(Expr::eq(sum(args.clone()), Expr::constant(1)))
            }
            ExprKind::Op(OpKind::Implies, args) => {
                self.linearize_implication(&args[0], &args[1], reified, out)?
            }

            ExprKind::Cmp(op, lhs, rhs) => self.linearize_comparison(*op, lhs, rhs, reified, out)?,

            ExprKind::Global(GlobalKind::AllDifferent, args)
                if !self.supported.contains("alldifferent") =>
            {
                self.decompose_alldifferent(constraint, args, out)
            }
            ExprKind::Global(global, _) if self.supported.contains(global.name()) => {
                out.push(constraint.clone())
            }
            ExprKind::Global(global, _) => {
                return Err(LinearizationUnsupported::new(
                    constraint,
                    format!(
                        "global constraint `{}` is not in the supported set; \
                         run global-constraint decomposition first",
                        global.name()
                    ),
                ))
            }

            _ => panic!(
                "constraint `{}` is not in flat normal form; run flattening first",
                constraint
            ),
        }
        Ok(())
    }

    fn linearize_implication(
        &mut self,
        cond: &Expr,
        sub: &Expr,
        reified: bool,
        out: &mut Vec<Expr>,
    ) -> Result<(), LinearizationUnsupported> {
        assert!(
            cond.is_bool_var(),
            "left side of implication `{}` must be a boolean variable; run reification unnesting first",
            cond
        );
        // BoolVar -> BoolVar is just an inequality
        if sub.is_bool_var() {
            out.push(Expr::le(
                Expr::from_kind(ExprKind::Wsum(
                    vec![1, -1],
                    vec![cond.clone(), sub.clone()],
                )),
                Expr::constant(0),
            ));
            return Ok(());
        }

        let lin_sub = self.linearize(&[sub.clone()], true)?;
        out.extend(
            lin_sub
                .iter()
                .map(|lin| implication(cond.clone(), lin.clone())),
        );

        // variables introduced by the encoding are pinned to their lower
        // bound when the indicator is off, so the off branch admits no
        // spurious degrees of freedom
        let sub_vars = variables_of([sub]);
        let pin: Vec<Expr> = variables_of(lin_sub.iter())
            .into_iter()
            .filter(|(name, _)| !sub_vars.contains_key(name))
            .map(|(_, nv)| {
                implication(
                    cond.negate(),
                    Expr::eq(Expr::var(nv.clone()), Expr::constant(nv.lb)),
                )
            })
            .collect();
        let lin_pin = self.linearize(&pin, reified)?;
        out.extend(lin_pin);
        Ok(())
    }

    fn linearize_comparison(
        &mut self,
        op: CmpOp,
        lhs: &Expr,
        rhs: &Expr,
        reified: bool,
        out: &mut Vec<Expr>,
    ) -> Result<(), LinearizationUnsupported> {
        // `BV != BV` before normalization rewrites both sides
        if op == CmpOp::Ne && lhs.is_bool_var() && rhs.is_bool_var() {
            out.push(Expr::eq(
                sum(vec![lhs.clone(), rhs.clone()]),
                Expr::constant(1),
            ));
            return Ok(());
        }

        let lhs = match &lhs.kind {
            ExprKind::Op(OpKind::Mul, args) if !self.supported.contains("mul") => {
                // a constant multiple is a weighted sum of one term
                if let Some(c) = args[0].as_const() {
                    Expr::from_kind(ExprKind::Wsum(vec![c], vec![args[1].clone()]))
                } else if let Some(c) = args[1].as_const() {
                    Expr::from_kind(ExprKind::Wsum(vec![c], vec![args[0].clone()]))
                } else {
                    return Err(self.unsupported_lhs(lhs));
                }
            }
            ExprKind::Op(op2, _)
                if !matches!(op2, OpKind::Sum) && !self.supported.contains(op2.name()) =>
            {
                return Err(self.unsupported_lhs(lhs));
            }
            ExprKind::Global(global, _) if !self.supported.contains(global.name()) => {
                return Err(LinearizationUnsupported::new(
                    lhs,
                    format!(
                        "global constraint `{}` on the left of a comparison is not supported; \
                         run global-constraint decomposition first",
                        global.name()
                    ),
                ));
            }
            ExprKind::Cmp(_, _, _) => {
                return Err(LinearizationUnsupported::new(
                    lhs,
                    "reified comparison; run reification unnesting first".to_string(),
                ));
            }
            _ => lhs.clone(),
        };

        let constraint = canonical_comparison_one(&Expr::cmp(op, lhs, rhs.clone()));
        let (op, lhs, rhs) = match &constraint.kind {
            ExprKind::Cmp(op, lhs, rhs) => (*op, lhs.clone(), rhs.clone()),
            // the comparison folded to a constant truth value
            _ => {
                out.push(constraint.clone());
                return Ok(());
            }
        };

        match op {
            // strict inequalities shift the constant bound; sound because
            // every expression is integer-valued
            CmpOp::Lt => {
                let (new_rhs, cons) = self.shifted_rhs(&rhs, -1);
                out.push(Expr::le(lhs, new_rhs));
                let lin = self.linearize(&cons, false)?;
                out.extend(lin);
            }
            CmpOp::Gt => {
                let (new_rhs, cons) = self.shifted_rhs(&rhs, 1);
                out.push(Expr::ge(lhs, new_rhs));
                let lin = self.linearize(&cons, false)?;
                out.extend(lin);
            }
            CmpOp::Ne => {
                let general_lhs = lhs
                    .op_name()
                    .map_or(false, |name| name != "sum" && name != "wsum");
                if reified || general_lhs {
                    self.big_m_disequality(&lhs, &rhs, reified, out)?;
                } else {
                    // case split on a fresh indicator
                    let z = Expr::var(self.pool.fresh_bool());
                    let cons = [
                        implication(z.clone(), Expr::lt(lhs.clone(), rhs.clone())),
                        implication(z.negate(), Expr::gt(lhs, rhs)),
                    ];
                    let lin = self.linearize(&cons, reified)?;
                    out.extend(lin);
                }
            }
            _ => out.push(Expr::cmp(op, lhs, rhs)),
        }
        Ok(())
    }

    /// Big-M encoding of `lhs != rhs` with a fresh indicator `z`: exactly
    /// one of `lhs < rhs` and `lhs > rhs` holds, selected by `z`. The
    /// constants come from interval bound propagation.
    fn big_m_disequality(
        &mut self,
        lhs: &Expr,
        rhs: &Expr,
        reified: bool,
        out: &mut Vec<Expr>,
    ) -> Result<(), LinearizationUnsupported> {
        let z = Expr::var(self.pool.fresh_bool());
        let (_, m1) = bounds(&sum(vec![
            lhs.clone(),
            Expr::neg(rhs.clone()),
            Expr::constant(1),
        ]));
        let (_, m2) = bounds(&sum(vec![
            rhs.clone(),
            Expr::neg(lhs.clone()),
            Expr::constant(1),
        ]));
        trace!(m1, m2, z = %z, "big-m encoding for disequality");

        let cons = [
            Expr::le(
                sum(vec![lhs.clone(), Expr::mul(Expr::constant(-m1), z.clone())]),
                shifted(rhs, -1),
            ),
            Expr::ge(
                sum(vec![lhs.clone(), Expr::mul(Expr::constant(-m2), z)]),
                shifted(rhs, 1 - m2),
            ),
        ];
        let flat = Flattener::new(self.pool, self.cache).flatten_constraints(&cons);
        let lin = self.linearize(&flat, reified)?;
        out.extend(lin);
        Ok(())
    }

    /// Bipartite-matching decomposition of AllDifferent: a 0/1 indicator
    /// matrix over the shared value range with row-sum 1 (each variable
    /// takes one value), column-sum at most 1 (each value is used at most
    /// once) and a linking row per variable.
    fn decompose_alldifferent(&mut self, constraint: &Expr, args: &[GlobalArg], out: &mut Vec<Expr>) {
        let args: Vec<Expr> = args
            .iter()
            .map(|arg| match arg {
                GlobalArg::One(e) => e.clone(),
                GlobalArg::Many(_) => panic!("nested list in `{}`", constraint),
            })
            .collect();
        let ranges: Vec<(i64, i64)> = args.iter().map(bounds).collect();
        let lb = ranges.iter().map(|r| r.0).min().unwrap();
        let ub = ranges.iter().map(|r| r.1).max().unwrap();
        let width = (ub - lb + 1) as usize;
        trace!(n = args.len(), lb, ub, "bipartite decomposition of alldifferent");

        let sigma: Vec<Vec<Expr>> = args
            .iter()
            .map(|_| {
                (0..width)
                    .map(|_| Expr::var(self.pool.fresh_bool()))
                    .collect()
            })
            .collect();

        // each variable takes exactly one value
        for row in &sigma {
            out.push(Expr::eq(sum(row.clone()), Expr::constant(1)));
        }
        // each value is used by at most one variable
        for v in 0..width {
            let column: Vec<Expr> = sigma.iter().map(|row| row[v].clone()).collect();
            out.push(Expr::le(sum(column), Expr::constant(1)));
        }
        // link the indicator rows back to the variables
        for (arg, row) in args.iter().zip(&sigma) {
            let mut weights: Vec<i64> = (lb..=ub).collect();
            weights.push(-1);
            let mut terms = row.clone();
            terms.push(arg.clone());
            out.push(Expr::eq(
                Expr::from_kind(ExprKind::Wsum(weights, terms)),
                Expr::constant(0),
            ));
        }
    }

    /// `rhs + delta`, as a folded constant when possible, otherwise as a
    /// fresh variable with its defining constraint.
    fn shifted_rhs(&mut self, rhs: &Expr, delta: i64) -> (Expr, Vec<Expr>) {
        if rhs.as_const().is_some() {
            (shifted(rhs, delta), Vec::new())
        } else {
            let mut flattener = Flattener::new(self.pool, self.cache);
            flattener.get_or_make_var(&shifted(rhs, delta))
        }
    }

    fn unsupported_lhs(&self, lhs: &Expr) -> LinearizationUnsupported {
        LinearizationUnsupported::new(
            lhs,
            format!(
                "left-hand side must be one of {{{}}}; run expression decomposition first",
                join_commas(self.supported.iter().map(|s| s.to_string()))
            ),
        )
    }
}

fn sum(args: Vec<Expr>) -> Expr {
    Expr::from_kind(ExprKind::Op(OpKind::Sum, args))
}

fn implication(lhs: Expr, rhs: Expr) -> Expr {
    Expr::from_kind(ExprKind::Op(OpKind::Implies, vec![lhs, rhs]))
}

fn shifted(expr: &Expr, delta: i64) -> Expr {
    if delta == 0 {
        return expr.clone();
    }
    match expr.as_const() {
        Some(c) => Expr::constant(c + delta),
        None => sum(vec![expr.clone(), Expr::constant(delta)]),
    }
}

#[cfg(test)]
mod test {
    use crate::ast::VarPool;

    use super::*;

    fn linearize(pool: &mut VarPool, constraints: &[Expr], reified: bool) -> Vec<Expr> {
        let mut cache = ExprCache::new();
        Linearizer::new(pool, &mut cache, default_supported())
            .linearize(constraints, reified)
            .unwrap()
    }

    #[test]
    fn strict_inequalities_shift_the_bound() {
        let mut pool = VarPool::new();
        let x = Expr::var(pool.int_var(0, 9, "x").unwrap());
        let out = linearize(&mut pool, &[Expr::lt(x.clone(), Expr::constant(5))], false);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to_string(), "((x) <= 4)");
        let out = linearize(&mut pool, &[Expr::gt(x, Expr::constant(5))], false);
        assert_eq!(out[0].to_string(), "((x) >= 6)");
    }

    #[test]
    fn connectives_become_cardinality_constraints() {
        let mut pool = VarPool::new();
        let p = Expr::var(pool.bool_var("p").unwrap());
        let q = Expr::var(pool.bool_var("q").unwrap());
        let r = Expr::var(pool.bool_var("r").unwrap());
        let out = linearize(
            &mut pool,
            &[
                Expr::and(vec![p.clone(), q.clone(), r.clone()]).unwrap(),
                Expr::or(vec![p.clone(), q.clone()]).unwrap(),
                Expr::xor(p.clone(), q.clone()).unwrap(),
                p.clone(),
            ],
            false,
        );
        assert_eq!(out[0].to_string(), "((p + q + r) >= 3)");
        assert_eq!(out[1].to_string(), "((p + q) >= 1)");
        assert_eq!(out[2].to_string(), "((p + q) == 1)");
        assert_eq!(out[3].to_string(), "((p) >= 1)");
    }

    #[test]
    fn implication_between_variables_is_an_inequality() {
        let mut pool = VarPool::new();
        let p = Expr::var(pool.bool_var("p").unwrap());
        let q = Expr::var(pool.bool_var("q").unwrap());
        let out = linearize(
            &mut pool,
            &[Expr::implies(p, q).unwrap()],
            false,
        );
        assert_eq!(out[0].to_string(), "(wsum([1, -1], [p, q]) <= 0)");
    }

    #[test]
    fn constant_multiple_becomes_wsum() {
        let mut pool = VarPool::new();
        let x = Expr::var(pool.int_var(0, 9, "x").unwrap());
        let out = linearize(
            &mut pool,
            &[Expr::eq(
                Expr::mul(Expr::constant(3), x),
                Expr::constant(6),
            )],
            false,
        );
        assert_eq!(out[0].to_string(), "(wsum([3], [x]) == 6)");
    }

    #[test]
    fn variable_product_is_rejected_with_guidance() {
        let mut pool = VarPool::new();
        let x = Expr::var(pool.int_var(0, 9, "x").unwrap());
        let y = Expr::var(pool.int_var(0, 9, "y").unwrap());
        let mut cache = ExprCache::new();
        let err = Linearizer::new(&mut pool, &mut cache, default_supported())
            .linearize(&[Expr::eq(Expr::mul(x, y), Expr::constant(6))], false)
            .unwrap_err();
        assert!(err.to_string().contains("expression decomposition"));
    }

    #[test]
    fn boolean_disequality_is_a_cardinality_constraint() {
        let mut pool = VarPool::new();
        let p = Expr::var(pool.bool_var("p").unwrap());
        let q = Expr::var(pool.bool_var("q").unwrap());
        let out = linearize(&mut pool, &[Expr::ne(p, q)], false);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to_string(), "((p + q) == 1)");
    }

    #[test]
    fn reified_disequality_uses_big_m() {
        let mut pool = VarPool::new();
        let x = Expr::var(pool.int_var(0, 3, "x").unwrap());
        let y = Expr::var(pool.int_var(0, 3, "y").unwrap());
        let out = linearize(&mut pool, &[Expr::ne(x, y)], true);
        // two linear constraints over x, y and the fresh indicator
        assert_eq!(out.len(), 2);
        for c in &out {
            assert!(matches!(c.kind, ExprKind::Cmp(CmpOp::Le | CmpOp::Ge, _, _)));
        }
    }
}
