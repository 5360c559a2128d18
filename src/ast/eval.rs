//! Ground evaluation of expressions under a complete assignment.
//!
//! This is the semantic reference for all rewrite passes: a transformation
//! is correct when the original and rewritten constraint sets have the same
//! solutions (projected onto the original variables). The equivalence tests
//! enumerate small domains with [`eval`], and callers can use it to check a
//! solution handed back by a backend.

use indexmap::IndexMap;

use super::{Expr, ExprKind, GlobalArg, GlobalKind, OpKind, Symbol};

/// A total assignment of values to variables, by name.
pub type Assignment = IndexMap<Symbol, i64>;

/// Evaluate an expression. Boolean expressions evaluate to 0 or 1.
///
/// Panics on unassigned variables and on opaque constraints, which have no
/// interpretation the pipeline could know.
pub fn eval(expr: &Expr, assignment: &Assignment) -> i64 {
    match &expr.kind {
        ExprKind::Var(var) => *assignment
            .get(&var.name)
            .unwrap_or_else(|| panic!("variable `{}` is not assigned", var.name)),
        ExprKind::NegView(var) => {
            1 - *assignment
                .get(&var.name)
                .unwrap_or_else(|| panic!("variable `{}` is not assigned", var.name))
        }
        ExprKind::Const(value) => *value,
        ExprKind::BoolLit(b) => *b as i64,
        ExprKind::Op(op, args) => {
            let arg = |i: usize| eval(&args[i], assignment);
            match op {
                OpKind::Sum => args.iter().map(|a| eval(a, assignment)).sum(),
                OpKind::Mul => arg(0) * arg(1),
                OpKind::Div => {
                    let divisor = arg(1);
                    assert!(divisor != 0, "division by zero in `{}`", expr);
                    arg(0) / divisor
                }
                OpKind::Mod => {
                    let divisor = arg(1);
                    assert!(divisor != 0, "remainder by zero in `{}`", expr);
                    arg(0) % divisor
                }
                OpKind::Pow => arg(0).pow(arg(1) as u32),
                OpKind::Neg => -arg(0),
                OpKind::And => args.iter().all(|a| eval(a, assignment) != 0) as i64,
                OpKind::Or => args.iter().any(|a| eval(a, assignment) != 0) as i64,
                OpKind::Not => (arg(0) == 0) as i64,
                OpKind::Xor => ((arg(0) != 0) != (arg(1) != 0)) as i64,
                OpKind::Implies => (arg(0) == 0 || arg(1) != 0) as i64,
            }
        }
        ExprKind::Wsum(weights, args) => weights
            .iter()
            .zip(args)
            .map(|(w, a)| w * eval(a, assignment))
            .sum(),
        ExprKind::Cmp(op, lhs, rhs) => {
            op.holds(eval(lhs, assignment), eval(rhs, assignment)) as i64
        }
        ExprKind::Global(global, args) => eval_global(expr, *global, args, assignment),
        ExprKind::Opaque(opaque) => panic!("cannot evaluate opaque constraint `{}`", opaque.name),
    }
}

/// Evaluate a boolean expression as a truth value.
pub fn holds(expr: &Expr, assignment: &Assignment) -> bool {
    eval(expr, assignment) != 0
}

fn eval_global(expr: &Expr, global: GlobalKind, args: &[GlobalArg], assignment: &Assignment) -> i64 {
    let one = |arg: &GlobalArg| match arg {
        GlobalArg::One(e) => eval(e, assignment),
        GlobalArg::Many(_) => panic!("unexpected argument list in `{}`", expr),
    };
    match global {
        GlobalKind::AllDifferent => {
            let values: Vec<i64> = args.iter().map(one).collect();
            values
                .iter()
                .enumerate()
                .all(|(i, v)| values[i + 1..].iter().all(|w| w != v)) as i64
        }
        GlobalKind::Max => args.iter().map(one).max().unwrap(),
        GlobalKind::Min => args.iter().map(one).min().unwrap(),
        GlobalKind::Abs => one(&args[0]).abs(),
        GlobalKind::Element => match args {
            [GlobalArg::Many(array), GlobalArg::One(index)] => {
                let i = eval(index, assignment);
                assert!(
                    0 <= i && (i as usize) < array.len(),
                    "element index {} out of range in `{}`",
                    i,
                    expr
                );
                eval(&array[i as usize], assignment)
            }
            _ => panic!("malformed element arguments in `{}`", expr),
        },
    }
}

#[cfg(test)]
mod test {
    use crate::ast::VarPool;

    use super::*;

    #[test]
    fn arithmetic_and_logic() {
        let mut pool = VarPool::new();
        let x = Expr::var(pool.int_var(0, 9, "x").unwrap());
        let b = Expr::var(pool.bool_var("b").unwrap());
        let mut asg = Assignment::new();
        asg.insert(Symbol::intern("x"), 7);
        asg.insert(Symbol::intern("b"), 0);

        let e = Expr::wsum(vec![2, -1], vec![x.clone(), Expr::constant(3)]).unwrap();
        assert_eq!(eval(&e, &asg), 11);
        assert!(holds(&Expr::gt(x.clone(), Expr::constant(6)), &asg));
        assert!(holds(&b.negate(), &asg));
        assert!(holds(
            &Expr::implies(b, Expr::lt(x.clone(), Expr::constant(0))).unwrap(),
            &asg
        ));
        assert_eq!(
            eval(
                &Expr::alldifferent(vec![x.clone(), Expr::constant(7)]).unwrap(),
                &asg
            ),
            0
        );
        assert_eq!(
            eval(
                &Expr::element(vec![Expr::constant(4), x], Expr::constant(1)).unwrap(),
                &asg
            ),
            7
        );
    }
}
