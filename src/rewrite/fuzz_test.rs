//! Property-based tests over randomly generated expressions.
//!
//! Instead of an SMT prover, equivalence is checked by brute-force
//! enumeration: the generated variables have tiny domains, so evaluating an
//! expression under every assignment is cheap and exact.

use proptest::prelude::*;
use proptest::test_runner::{Config, TestCaseResult, TestRunner};

use crate::ast::eval::{eval, Assignment};
use crate::ast::util::variables_of;
use crate::ast::{CmpOp, Expr, Shared, VarDecl, VarKind, VarPool, VarRef};

use super::canonical::canonicalize;
use super::flatten::{is_flat, toplevel_list, ExprCache, Flattener};

/// Expression generator over a fixed set of small-domain variables.
struct ExprGen {
    int_vars: Vec<Expr>,
    bool_vars: Vec<Expr>,
}

impl ExprGen {
    fn new() -> Self {
        let int_vars = ["x", "y", "z"]
            .iter()
            .map(|name| Expr::var(mk_var(name, VarKind::Int, -2, 2)))
            .collect();
        let bool_vars = ["p", "q"]
            .iter()
            .map(|name| Expr::var(mk_var(name, VarKind::Bool, 0, 1)))
            .collect();
        ExprGen {
            int_vars,
            bool_vars,
        }
    }

    fn mk_strategy(&self) -> impl Strategy<Value = (Expr, Expr)> {
        let bool_leafs = prop_oneof![
            3 => prop::sample::select(self.bool_vars.clone()),
            1 => prop::bool::ANY.prop_map(Expr::bool_lit),
        ];
        let int_leafs = prop_oneof![
            3 => prop::sample::select(self.int_vars.clone()),
            1 => (-2i64..=2).prop_map(Expr::constant),
        ];
        // depth stays shallow: leaf values are at most 2, but nested products
        // and powers square the reachable range at every level and must not
        // overflow exact evaluation
        (bool_leafs, int_leafs).prop_recursive(3, 24, 3, |inner| {
            let bool_element = inner.clone().prop_map(|(bool_expr, _)| bool_expr);
            let int_element = inner.prop_map(|(_, int_expr)| int_expr);
            let int_strategy = prop_oneof![
                prop::collection::vec(int_element.clone(), 2..4)
                    .prop_map(|args| Expr::sum(args).unwrap()),
                (int_element.clone(), int_element.clone())
                    .prop_map(|(lhs, rhs)| Expr::mul(lhs, rhs)),
                int_element.clone().prop_map(Expr::neg),
                (
                    prop::collection::vec(-2i64..=2, 2),
                    prop::collection::vec(int_element.clone(), 2)
                )
                    .prop_map(|(weights, args)| Expr::wsum(weights, args).unwrap()),
                int_element
                    .clone()
                    .prop_map(|base| Expr::pow(base, Expr::constant(2)).unwrap()),
            ];
            let cmp_ops = vec![
                CmpOp::Eq,
                CmpOp::Ne,
                CmpOp::Lt,
                CmpOp::Le,
                CmpOp::Gt,
                CmpOp::Ge,
            ];
            let bool_strategy = prop_oneof![
                prop::collection::vec(bool_element.clone(), 2..4)
                    .prop_map(|args| Expr::and(args).unwrap()),
                prop::collection::vec(bool_element.clone(), 2..4)
                    .prop_map(|args| Expr::or(args).unwrap()),
                (bool_element.clone(), bool_element.clone())
                    .prop_map(|(lhs, rhs)| Expr::xor(lhs, rhs).unwrap()),
                (bool_element.clone(), bool_element.clone())
                    .prop_map(|(lhs, rhs)| Expr::implies(lhs, rhs).unwrap()),
                bool_element.clone().prop_map(|expr| expr.negate()),
                (
                    prop::sample::select(cmp_ops),
                    int_element.clone(),
                    int_element
                )
                    .prop_map(|(op, lhs, rhs)| Expr::cmp(op, lhs, rhs)),
            ];
            (bool_strategy, int_strategy)
        })
    }

    fn mk_bool_strategy(&self) -> impl Strategy<Value = Expr> {
        self.mk_strategy().prop_map(|(bool_expr, _)| bool_expr)
    }

    fn mk_int_strategy(&self) -> impl Strategy<Value = Expr> {
        self.mk_strategy().prop_map(|(_, int_expr)| int_expr)
    }
}

fn mk_var(name: &str, kind: VarKind, lb: i64, ub: i64) -> VarRef {
    Shared::new(VarDecl {
        name: crate::ast::Symbol::intern(name),
        kind,
        lb,
        ub,
    })
}

/// Every assignment of the expression's variables within their domains.
fn all_assignments(expr: &Expr) -> Vec<Assignment> {
    let vars: Vec<VarRef> = variables_of([expr]).into_values().collect();
    let mut out = vec![Assignment::new()];
    for var in vars {
        let mut next = Vec::with_capacity(out.len() * (var.ub - var.lb + 1) as usize);
        for assignment in &out {
            for value in var.lb..=var.ub {
                let mut assignment = assignment.clone();
                assignment.insert(var.name, value);
                next.push(assignment);
            }
        }
        out = next;
    }
    out
}

fn check_canonical(expr: Expr) -> TestCaseResult {
    let canon = canonicalize(&expr);
    prop_assert_eq!(
        canonicalize(&canon),
        canon.clone(),
        "canonicalization is not idempotent for `{}`",
        expr
    );
    for assignment in all_assignments(&expr) {
        prop_assert_eq!(
            eval(&expr, &assignment),
            eval(&canon, &assignment),
            "canonicalization changed the value of `{}` (canonical `{}`)",
            expr,
            canon
        );
    }
    Ok(())
}

fn check_flatten(expr: Expr) -> TestCaseResult {
    let cons = toplevel_list(&[expr.clone()]).unwrap();

    let mut pool = VarPool::new();
    let mut cache = ExprCache::new();
    let flat = Flattener::new(&mut pool, &mut cache).flatten_constraints(&cons);
    for c in &flat {
        prop_assert!(is_flat(c), "`{}` flattened to non-flat `{}`", expr, c);
    }
    let aux_once = pool.len();

    // flattening the same constraint twice must not spend a second set of
    // auxiliaries: every normalized subexpression hits the cache
    let mut pool2 = VarPool::new();
    let mut cache2 = ExprCache::new();
    Flattener::new(&mut pool2, &mut cache2).flatten_constraints(&[expr.clone(), expr.clone()]);
    prop_assert_eq!(
        pool2.len(),
        aux_once,
        "duplicated `{}` created extra auxiliaries",
        expr
    );
    Ok(())
}

#[test]
fn fuzz_canonicalize_bool() {
    run_fuzz(|gen| gen.mk_bool_strategy(), check_canonical);
}

#[test]
fn fuzz_canonicalize_int() {
    run_fuzz(|gen| gen.mk_int_strategy(), check_canonical);
}

#[test]
fn fuzz_flatten() {
    run_fuzz(|gen| gen.mk_bool_strategy(), check_flatten);
}

fn run_fuzz<S: Strategy<Value = Expr>>(
    mk_strategy: impl FnOnce(&ExprGen) -> S,
    check: impl Fn(Expr) -> TestCaseResult,
) {
    let expr_gen = ExprGen::new();
    let config = Config {
        cases: 256,
        ..Config::default()
    };
    let mut test_runner = TestRunner::new(config);
    let res = test_runner.run(&mk_strategy(&expr_gen), check);
    match res {
        Ok(_) => (),
        Err(e) => panic!("{}\n{}", e, test_runner),
    }
}
