// Using [`IndexMap`], which preserves the insertion order, for deterministic results
use indexmap::IndexMap;

use super::{Expr, ExprKind, GlobalArg, Symbol, VarRef};

/// Collect every variable occurring in `expr`, in first-occurrence order.
///
/// A negated view counts as an occurrence of its parent variable.
pub fn collect_variables(expr: &Expr, out: &mut IndexMap<Symbol, VarRef>) {
    match &expr.kind {
        ExprKind::Var(var) | ExprKind::NegView(var) => {
            out.entry(var.name).or_insert_with(|| var.clone());
        }
        ExprKind::Const(_) | ExprKind::BoolLit(_) => {}
        ExprKind::Op(_, args) | ExprKind::Wsum(_, args) => {
            for arg in args {
                collect_variables(arg, out);
            }
        }
        ExprKind::Cmp(_, lhs, rhs) => {
            collect_variables(lhs, out);
            collect_variables(rhs, out);
        }
        ExprKind::Global(_, args) => {
            for arg in args {
                match arg {
                    GlobalArg::One(e) => collect_variables(e, out),
                    GlobalArg::Many(es) => {
                        for e in es {
                            collect_variables(e, out);
                        }
                    }
                }
            }
        }
        ExprKind::Opaque(opaque) => {
            for arg in &opaque.args {
                collect_variables(arg, out);
            }
        }
    }
}

/// The variables of a sequence of constraints, in first-occurrence order.
pub fn variables_of<'a>(exprs: impl IntoIterator<Item = &'a Expr>) -> IndexMap<Symbol, VarRef> {
    let mut out = IndexMap::new();
    for expr in exprs {
        collect_variables(expr, &mut out);
    }
    out
}

#[cfg(test)]
mod test {
    use crate::ast::VarPool;

    use super::*;

    #[test]
    fn collects_in_first_occurrence_order() {
        let mut pool = VarPool::new();
        let x = Expr::var(pool.int_var(0, 9, "x").unwrap());
        let y = Expr::var(pool.int_var(0, 9, "y").unwrap());
        let b = Expr::var(pool.bool_var("b").unwrap());

        let e = Expr::eq(
            Expr::sum(vec![y.clone(), x.clone(), y]).unwrap(),
            Expr::mul(Expr::constant(2), x),
        );
        let vars = variables_of([&e, &b.negate()]);
        let names: Vec<String> = vars.keys().map(|s| s.to_string()).collect();
        assert_eq!(names, ["y", "x", "b"]);
    }
}
