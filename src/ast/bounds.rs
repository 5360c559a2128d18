//! Interval bound inference for expressions.
//!
//! Every numeric expression gets a sound inclusive range `[lb, ub]`: the
//! range contains every value the expression can take under any assignment
//! within its variables' domains. Auxiliary variable domains and the Big-M
//! constants of the linearizer are derived from these bounds, so they must
//! never be too narrow. Endpoint analysis is exact for sums, weighted sums,
//! products, powers and the numeric globals; division and remainder are
//! conservative. Arithmetic saturates at the `i64` range.

use super::{Expr, ExprKind, GlobalArg, GlobalKind, OpKind};

/// Compute the inclusive `(lb, ub)` range of an expression.
///
/// Boolean expressions are treated as their 0/1 truth value.
pub fn bounds(expr: &Expr) -> (i64, i64) {
    match &expr.kind {
        ExprKind::Var(var) => (var.lb, var.ub),
        ExprKind::NegView(_) => (0, 1),
        ExprKind::Const(value) => (*value, *value),
        ExprKind::BoolLit(b) => (*b as i64, *b as i64),
        ExprKind::Op(op, args) => op_bounds(expr, *op, args),
        ExprKind::Wsum(weights, args) => {
            let mut lo = 0i64;
            let mut hi = 0i64;
            for (w, arg) in weights.iter().zip(args) {
                let (alo, ahi) = bounds(arg);
                let (tlo, thi) = if *w >= 0 {
                    (w.saturating_mul(alo), w.saturating_mul(ahi))
                } else {
                    (w.saturating_mul(ahi), w.saturating_mul(alo))
                };
                lo = lo.saturating_add(tlo);
                hi = hi.saturating_add(thi);
            }
            (lo, hi)
        }
        ExprKind::Cmp(_, _, _) => (0, 1),
        ExprKind::Global(global, args) => global_bounds(*global, args),
        ExprKind::Opaque(_) => (0, 1),
    }
}

fn op_bounds(expr: &Expr, op: OpKind, args: &[Expr]) -> (i64, i64) {
    match op {
        OpKind::Sum => args.iter().map(bounds).fold((0, 0), |(lo, hi), (alo, ahi)| {
            (lo.saturating_add(alo), hi.saturating_add(ahi))
        }),
        OpKind::Mul => {
            let (alo, ahi) = bounds(&args[0]);
            let (blo, bhi) = bounds(&args[1]);
            min_max(
                [alo, alo, ahi, ahi]
                    .iter()
                    .zip([blo, bhi, blo, bhi])
                    .map(|(a, b)| a.saturating_mul(b)),
            )
        }
        OpKind::Div => {
            let (alo, ahi) = bounds(&args[0]);
            let divisors = divisor_endpoints(expr, bounds(&args[1]));
            min_max(
                [alo, ahi]
                    .iter()
                    .flat_map(|a| divisors.iter().map(move |d| a / d)),
            )
        }
        OpKind::Mod => {
            let (alo, ahi) = bounds(&args[0]);
            let m = divisor_endpoints(expr, bounds(&args[1]))
                .iter()
                .map(|d| d.abs())
                .max()
                .unwrap();
            let lo = if alo < 0 { alo.max(-(m - 1)) } else { 0 };
            let hi = if ahi > 0 { ahi.min(m - 1) } else { 0 };
            (lo, hi)
        }
        OpKind::Pow => {
            let (alo, ahi) = bounds(&args[0]);
            // exponent is a construction-checked non-negative constant
            let exp = args[1]
                .as_const()
                .unwrap_or_else(|| panic!("non-constant exponent in `{}`", expr))
                as u32;
            let mut candidates = vec![ipow(alo, exp), ipow(ahi, exp)];
            if alo <= 0 && 0 <= ahi {
                candidates.push(0);
            }
            min_max(candidates)
        }
        OpKind::Neg => {
            let (lo, hi) = bounds(&args[0]);
            (hi.saturating_neg(), lo.saturating_neg())
        }
        OpKind::And | OpKind::Or | OpKind::Not | OpKind::Xor | OpKind::Implies => (0, 1),
    }
}

fn global_bounds(global: GlobalKind, args: &[GlobalArg]) -> (i64, i64) {
    match global {
        GlobalKind::AllDifferent => (0, 1),
        GlobalKind::Max => fold_extremum(args, i64::max),
        GlobalKind::Min => fold_extremum(args, i64::min),
        GlobalKind::Abs => {
            let (lo, hi) = bounds(single_arg(args));
            if lo <= 0 && 0 <= hi {
                (0, lo.abs().max(hi.abs()))
            } else {
                min_max([lo.abs(), hi.abs()])
            }
        }
        GlobalKind::Element => match args {
            [GlobalArg::Many(array), GlobalArg::One(_)] => {
                let ranges: Vec<_> = array.iter().map(bounds).collect();
                (
                    ranges.iter().map(|r| r.0).min().unwrap(),
                    ranges.iter().map(|r| r.1).max().unwrap(),
                )
            }
            _ => panic!("malformed element arguments"),
        },
    }
}

fn fold_extremum(args: &[GlobalArg], pick: impl Fn(i64, i64) -> i64 + Copy) -> (i64, i64) {
    args.iter()
        .map(|arg| bounds(one_arg(arg)))
        .reduce(|(lo, hi), (alo, ahi)| (pick(lo, alo), pick(hi, ahi)))
        .unwrap()
}

fn single_arg(args: &[GlobalArg]) -> &Expr {
    match args {
        [arg] => one_arg(arg),
        _ => panic!("expected a single global argument"),
    }
}

fn one_arg(arg: &GlobalArg) -> &Expr {
    match arg {
        GlobalArg::One(e) => e,
        GlobalArg::Many(_) => panic!("unexpected argument list"),
    }
}

/// The endpoints of the divisor's domain with zero excluded.
///
/// A divisor whose domain is exactly `{0}` cannot occur in a well-formed
/// model; it indicates a frontend bug, not user input that a pass could
/// recover from.
fn divisor_endpoints(expr: &Expr, (lo, hi): (i64, i64)) -> Vec<i64> {
    let mut endpoints = Vec::new();
    if hi >= 1 {
        endpoints.push(lo.max(1));
        endpoints.push(hi);
    }
    if lo <= -1 {
        endpoints.push(lo);
        endpoints.push(hi.min(-1));
    }
    assert!(
        !endpoints.is_empty(),
        "divisor of `{}` can only be zero",
        expr
    );
    endpoints
}

fn min_max(values: impl IntoIterator<Item = i64>) -> (i64, i64) {
    let mut iter = values.into_iter();
    let first = iter.next().unwrap();
    iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

fn ipow(base: i64, exp: u32) -> i64 {
    (0..exp).fold(1i64, |acc, _| acc.saturating_mul(base))
}

#[cfg(test)]
mod test {
    use crate::ast::VarPool;

    use super::super::Expr;
    use super::*;

    fn xy(pool: &mut VarPool) -> (Expr, Expr) {
        (
            Expr::var(pool.int_var(-2, 3, "x").unwrap()),
            Expr::var(pool.int_var(1, 4, "y").unwrap()),
        )
    }

    #[test]
    fn sum_and_wsum_bounds() {
        let mut pool = VarPool::new();
        let (x, y) = xy(&mut pool);
        assert_eq!(bounds(&Expr::sum(vec![x.clone(), y.clone()]).unwrap()), (-1, 7));
        assert_eq!(
            bounds(&Expr::wsum(vec![2, -3], vec![x, y]).unwrap()),
            (-16, 3)
        );
    }

    #[test]
    fn mul_bounds_cover_sign_changes() {
        let mut pool = VarPool::new();
        let (x, y) = xy(&mut pool);
        assert_eq!(bounds(&Expr::mul(x, y)), (-8, 12));
    }

    #[test]
    fn div_bounds_split_divisor_around_zero() {
        let mut pool = VarPool::new();
        let a = Expr::var(pool.int_var(-7, 7, "a").unwrap());
        let d = Expr::var(pool.int_var(-2, 2, "d").unwrap());
        // extremes at divisor = ±1
        assert_eq!(bounds(&Expr::div(a, d).unwrap()), (-7, 7));
    }

    #[test]
    fn pow_bounds_include_zero_crossing() {
        let mut pool = VarPool::new();
        let x = Expr::var(pool.int_var(-3, 2, "x").unwrap());
        let sq = Expr::pow(x, Expr::constant(2)).unwrap();
        assert_eq!(bounds(&sq), (0, 9));
    }

    #[test]
    fn global_bounds() {
        let mut pool = VarPool::new();
        let (x, y) = xy(&mut pool);
        assert_eq!(
            bounds(&Expr::max_of(vec![x.clone(), y.clone()]).unwrap()),
            (1, 4)
        );
        assert_eq!(
            bounds(&Expr::min_of(vec![x.clone(), y.clone()]).unwrap()),
            (-2, 3)
        );
        assert_eq!(bounds(&Expr::abs(x.clone())), (0, 3));
        let idx = Expr::var(pool.int_var(0, 1, "i").unwrap());
        assert_eq!(bounds(&Expr::element(vec![x, y], idx).unwrap()), (-2, 4));
    }

    #[test]
    fn negated_view_is_binary() {
        let mut pool = VarPool::new();
        let b = Expr::var(pool.bool_var("b").unwrap());
        assert_eq!(bounds(&b.negate()), (0, 1));
    }
}
