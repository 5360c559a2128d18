//! Flattening of nested constraints into flat normal form, with
//! common-subexpression elimination.
//!
//! In flat normal form, each side of a comparison is a variable, a constant,
//! or a single operator/global node whose own arguments are variables or
//! constants. Nested sub-expressions are replaced by auxiliary variables
//! whose domains come from [`bounds`] and whose defining constraints are
//! emitted alongside the rewritten constraint.
//!
//! The [`ExprCache`] is the CSE mechanism: it maps the canonical key of a
//! normalized sub-expression to the variable standing in for it. At most one
//! auxiliary variable and one defining constraint exist per distinct
//! normalized sub-expression across one pipeline invocation. The cache is
//! scoped to a single invocation and threaded explicitly; it is never a
//! process-wide singleton.

use indexmap::IndexMap;
use tracing::trace;

use crate::ast::bounds::bounds;
use crate::ast::{
    CmpOp, Expr, ExprKind, GlobalArg, MalformedExpression, OpKind, VarPool,
};

use super::canonical::{canonical_key, canonicalize};

/// The memoizing cache from normalized sub-expression to assigned variable.
///
/// Lookups and insertions go through the canonical key, so operand
/// permutations of the same commutative expression hit the same entry.
#[derive(Debug, Default)]
pub struct ExprCache {
    map: IndexMap<String, Expr>,
}

impl ExprCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, expr: &Expr) -> Option<Expr> {
        self.map.get(&canonical_key(expr)).cloned()
    }

    pub fn insert(&mut self, expr: &Expr, var: Expr) {
        self.map.insert(canonical_key(expr), var);
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Split nested top-level conjunctions into an ordered sequence of
/// constraint roots. Non-boolean roots are rejected.
pub fn toplevel_list(constraints: &[Expr]) -> Result<Vec<Expr>, MalformedExpression> {
    let mut out = Vec::new();
    for constraint in constraints {
        push_toplevel(constraint, &mut out)?;
    }
    Ok(out)
}

fn push_toplevel(constraint: &Expr, out: &mut Vec<Expr>) -> Result<(), MalformedExpression> {
    match &constraint.kind {
        ExprKind::Op(OpKind::And, args) => {
            for arg in args {
                push_toplevel(arg, out)?;
            }
            Ok(())
        }
        _ if constraint.is_bool() => {
            out.push(constraint.clone());
            Ok(())
        }
        _ => Err(MalformedExpression(format!(
            "constraint must be boolean: `{}`",
            constraint
        ))),
    }
}

/// True if a constraint is in flat normal form.
pub fn is_flat(constraint: &Expr) -> bool {
    match &constraint.kind {
        ExprKind::Cmp(_, lhs, rhs) => is_flat_side(lhs) && is_flat_side(rhs),
        _ => is_flat_side(constraint),
    }
}

fn is_flat_side(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Var(_) | ExprKind::NegView(_) | ExprKind::Const(_) | ExprKind::BoolLit(_) => true,
        ExprKind::Op(_, args) | ExprKind::Wsum(_, args) => {
            args.iter().all(|arg| arg.is_flat_var())
        }
        // one reified comparison level with flat sides
        ExprKind::Cmp(_, lhs, rhs) => lhs.is_flat_var() && rhs.is_flat_var(),
        ExprKind::Global(_, args) => args.iter().all(|arg| arg.is_flat()),
        ExprKind::Opaque(_) => true,
    }
}

/// The flattening pass. Holds the variable pool for auxiliary synthesis and
/// the CSE cache of the current pipeline invocation.
pub struct Flattener<'a> {
    pool: &'a mut VarPool,
    cache: &'a mut ExprCache,
}

impl<'a> Flattener<'a> {
    pub fn new(pool: &'a mut VarPool, cache: &'a mut ExprCache) -> Self {
        Flattener { pool, cache }
    }

    /// Flatten an ordered constraint sequence. The output contains the
    /// rewritten constraints plus the defining constraints of every
    /// synthesized auxiliary variable.
    pub fn flatten_constraints(&mut self, constraints: &[Expr]) -> Vec<Expr> {
        let mut out = Vec::new();
        for constraint in constraints {
            self.flatten_constraint(constraint, &mut out);
        }
        out
    }

    fn flatten_constraint(&mut self, constraint: &Expr, out: &mut Vec<Expr>) {
        match &constraint.kind {
            ExprKind::Cmp(op, lhs, rhs) => self.flatten_comparison(*op, lhs, rhs, out),
            ExprKind::Var(var) if var.is_bool() => out.push(constraint.clone()),
            ExprKind::NegView(_) | ExprKind::BoolLit(_) | ExprKind::Opaque(_) => {
                out.push(constraint.clone())
            }
            ExprKind::Op(OpKind::And, args) => {
                for arg in args {
                    self.flatten_constraint(arg, out);
                }
            }
            ExprKind::Op(op, _) if op.is_bool() => {
                let (flat, defs) = self.normalized_boolexpr(constraint);
                out.push(flat);
                out.extend(defs);
            }
            ExprKind::Global(global, _) if global.is_bool() => {
                let (flat, defs) = self.normalized_boolexpr(constraint);
                out.push(flat);
                out.extend(defs);
            }
            _ => panic!("constraint must be boolean: `{}`", constraint),
        }
    }

    fn flatten_comparison(&mut self, op: CmpOp, lhs: &Expr, rhs: &Expr, out: &mut Vec<Expr>) {
        let mut op = op;
        let mut lhs = lhs.clone();
        let mut rhs = rhs.clone();

        // normalize `Var == Expr` to the canonical `Expr == Var` shape
        if matches!(op, CmpOp::Eq | CmpOp::Ne) && lhs.is_flat_var() && !rhs.is_flat_var() {
            std::mem::swap(&mut lhs, &mut rhs);
        }
        // `BoolExpr != BoolExpr` becomes `BoolExpr == !BoolExpr`
        if op == CmpOp::Ne && lhs.is_bool() && rhs.is_bool() {
            op = CmpOp::Eq;
            rhs = rhs.negate();
        }
        if lhs.is_flat_var() && rhs.is_flat_var() {
            out.push(Expr::cmp(op, lhs, rhs));
            return;
        }

        let (rvar, rcons) = self.get_or_make_var(&rhs);
        // reification (double implication) keeps a boolean left-hand side
        let (mut lhs, lcons) = if op == CmpOp::Eq && lhs.is_bool() && rvar.is_bool() {
            self.normalized_boolexpr(&lhs)
        } else if op == CmpOp::Eq && lhs.is_bool() {
            self.get_or_make_var(&lhs)
        } else {
            self.normalized_numexpr(&lhs)
        };

        // cross-constraint CSE: reuse an earlier variable standing for the
        // same normalized left-hand side, and record this one for later
        if let Some(cached) = self.cache.lookup(&lhs) {
            if canonical_key(&cached) != canonical_key(&rvar) {
                trace!(lhs = %lhs, var = %cached, "reusing cached subexpression");
                lhs = cached;
            }
        } else if op == CmpOp::Eq && lhs.as_const().is_none() {
            self.cache.insert(&lhs, rvar.clone());
        }

        if lhs.as_const().is_some() {
            // a constant left side mirrors the comparison instead
            out.push(Expr::cmp(op.flip(), rvar, lhs));
        } else {
            out.push(Expr::cmp(op, lhs, rvar));
        }
        out.extend(lcons);
        out.extend(rcons);
    }

    /// Return a variable standing for `expr`, plus the flat defining
    /// constraints introduced along the way. Flat leaves are returned as-is;
    /// previously seen sub-expressions come from the cache without new
    /// constraints.
    pub fn get_or_make_var(&mut self, expr: &Expr) -> (Expr, Vec<Expr>) {
        if expr.is_flat_var() {
            return (expr.clone(), Vec::new());
        }
        if let Some(var) = self.cache.lookup(expr) {
            trace!(expr = %expr, var = %var, "cse cache hit");
            return (var, Vec::new());
        }

        if expr.is_bool() {
            let (flat, defs) = self.normalized_boolexpr(expr);
            // a lone boolean variable needs no alias `bv == bv`
            if flat.is_bool_var() {
                return (flat, defs);
            }
            if let Some(var) = self.cache.lookup(&flat) {
                return (var, Vec::new());
            }
            let bvar = Expr::var(self.pool.fresh_bool());
            trace!(expr = %flat, var = %bvar, "reifying boolean subexpression");
            self.cache.insert(&flat, bvar.clone());
            let mut cons = vec![Expr::eq(flat, bvar.clone())];
            cons.extend(defs);
            (bvar, cons)
        } else {
            let (flat, defs) = self.normalized_numexpr(expr);
            if flat.is_flat_var() {
                return (flat, defs);
            }
            if let Some(var) = self.cache.lookup(&flat) {
                return (var, Vec::new());
            }
            let (lb, ub) = bounds(&flat);
            let ivar = Expr::var(self.pool.fresh_int(lb, ub));
            trace!(expr = %flat, var = %ivar, lb, ub, "introducing auxiliary variable");
            self.cache.insert(&flat, ivar.clone());
            let mut cons = vec![Expr::eq(flat, ivar.clone())];
            cons.extend(defs);
            (ivar, cons)
        }
    }

    /// Normalize a numeric expression into a single operator/global node
    /// whose arguments are all variables or constants.
    fn normalized_numexpr(&mut self, expr: &Expr) -> (Expr, Vec<Expr>) {
        if expr.is_flat_var() {
            return (expr.clone(), Vec::new());
        }
        // a boolean in numeric position contributes its 0/1 truth value
        if expr.is_bool() {
            return self.get_or_make_var(expr);
        }
        let expr = canonicalize(expr);

        match &expr.kind {
            // unary negation and constant multiples become weighted sums so
            // they take part in the wsum folding below
            ExprKind::Op(OpKind::Neg, _) => self.normalized_numexpr(&to_wsum(&expr)),
            ExprKind::Op(OpKind::Mul, _) if wsum_should(&expr) => {
                self.normalized_numexpr(&to_wsum(&expr))
            }

            _ if args_are_flat(&expr) => (expr.clone(), Vec::new()),

            // fold nested subtractions and constant multiples into a single
            // weighted sum, e.g. `x - y + 2*(z + r)`
            ExprKind::Op(OpKind::Sum, args)
                if args
                    .iter()
                    .any(|arg| matches!(arg.kind, ExprKind::Op(OpKind::Neg, _)) || wsum_should(arg)) =>
            {
                let mut weights = Vec::new();
                let mut terms = Vec::new();
                for arg in args {
                    let (ws, es) = wsum_make(arg);
                    weights.extend(ws);
                    terms.extend(es);
                }
                self.normalized_numexpr(&Expr::from_kind(ExprKind::Wsum(weights, terms)))
            }

            ExprKind::Wsum(weights, args) => {
                // inline compatible nested terms (-, sum, wsum) instead of
                // spending an auxiliary variable on each
                let mut weights = weights.clone();
                let mut terms = args.clone();
                let mut i = 0;
                while i < terms.len() {
                    match &terms[i].kind {
                        ExprKind::Op(OpKind::Neg | OpKind::Sum, _) | ExprKind::Wsum(_, _) => {
                            let (ws, es) = wsum_make(&terms[i]);
                            let w = weights[i];
                            weights.splice(i..i + 1, ws.into_iter().map(|wj| w * wj));
                            terms.splice(i..i + 1, es);
                        }
                        _ => i += 1,
                    }
                }
                let (flat, cons) = self.flatten_args(&terms);
                (Expr::from_kind(ExprKind::Wsum(weights, flat)), cons)
            }

            ExprKind::Op(op, args) => {
                let (flat, cons) = self.flatten_args(args);
                (Expr::from_kind(ExprKind::Op(*op, flat)), cons)
            }

            ExprKind::Global(global, args) => {
                let mut cons = Vec::new();
                let mut flat = Vec::new();
                for arg in args {
                    let (f, c) = self.get_or_make_var_or_list(arg);
                    flat.push(f);
                    cons.extend(c);
                }
                (Expr::from_kind(ExprKind::Global(*global, flat)), cons)
            }

            _ => panic!("expected numeric expression, got `{}`", expr),
        }
    }

    /// Normalize a boolean expression into a single operator/comparison/
    /// global node over variables, suitable for reification.
    fn normalized_boolexpr(&mut self, expr: &Expr) -> (Expr, Vec<Expr>) {
        let expr = canonicalize(expr);
        match &expr.kind {
            ExprKind::Var(_)
            | ExprKind::NegView(_)
            | ExprKind::BoolLit(_)
            | ExprKind::Opaque(_) => (expr.clone(), Vec::new()),

            ExprKind::Op(OpKind::Not, args) => {
                let (var, cons) = self.get_or_make_var(&args[0]);
                (var.negate(), cons)
            }

            ExprKind::Op(op, args) if op.is_bool() => {
                let (flat, cons) = self.flatten_args(args);
                (Expr::from_kind(ExprKind::Op(*op, flat)), cons)
            }

            ExprKind::Cmp(op, lhs, rhs) => {
                let mut op = *op;
                let mut lhs = lhs.clone();
                let mut rhs = rhs.clone();
                if matches!(op, CmpOp::Eq | CmpOp::Ne) && lhs.is_flat_var() && !rhs.is_flat_var() {
                    std::mem::swap(&mut lhs, &mut rhs);
                }
                if op == CmpOp::Ne && lhs.is_bool() && rhs.is_bool() {
                    op = CmpOp::Eq;
                    rhs = rhs.negate();
                }
                let (rvar, mut cons) = self.get_or_make_var(&rhs);
                let (lflat, lcons) = if op == CmpOp::Eq && lhs.is_bool() && rvar.is_bool() {
                    self.normalized_boolexpr(&lhs)
                } else if op == CmpOp::Eq && lhs.is_bool() {
                    self.get_or_make_var(&lhs)
                } else {
                    self.normalized_numexpr(&lhs)
                };
                cons.extend(lcons);
                (Expr::cmp(op, lflat, rvar), cons)
            }

            ExprKind::Global(global, args) if global.is_bool() => {
                let mut cons = Vec::new();
                let mut flat = Vec::new();
                for arg in args {
                    let (f, c) = self.get_or_make_var_or_list(arg);
                    flat.push(f);
                    cons.extend(c);
                }
                (Expr::from_kind(ExprKind::Global(*global, flat)), cons)
            }

            _ => panic!("expected boolean expression, got `{}`", expr),
        }
    }

    fn flatten_args(&mut self, args: &[Expr]) -> (Vec<Expr>, Vec<Expr>) {
        let mut cons = Vec::new();
        let mut flat = Vec::new();
        for arg in args {
            let (var, c) = self.get_or_make_var(arg);
            flat.push(var);
            cons.extend(c);
        }
        (flat, cons)
    }

    fn get_or_make_var_or_list(&mut self, arg: &GlobalArg) -> (GlobalArg, Vec<Expr>) {
        match arg {
            GlobalArg::One(e) => {
                let (var, cons) = self.get_or_make_var(e);
                (GlobalArg::One(var), cons)
            }
            GlobalArg::Many(es) => {
                let (flat, cons) = self.flatten_args(es);
                (GlobalArg::Many(flat), cons)
            }
        }
    }
}

/// Should this expression be treated as a weighted sum?
fn wsum_should(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Op(OpKind::Neg, _) | ExprKind::Wsum(_, _) => true,
        ExprKind::Op(OpKind::Mul, args) => {
            args[0].as_const().is_some() || args[1].as_const().is_some()
        }
        _ => false,
    }
}

/// Decompose an expression into aligned weight/argument lists.
fn wsum_make(expr: &Expr) -> (Vec<i64>, Vec<Expr>) {
    match &expr.kind {
        ExprKind::Op(OpKind::Neg, args) => {
            let (ws, es) = wsum_make(&args[0]);
            (ws.into_iter().map(|w| -w).collect(), es)
        }
        ExprKind::Op(OpKind::Mul, args) if args[0].as_const().is_some() => {
            (vec![args[0].as_const().unwrap()], vec![args[1].clone()])
        }
        ExprKind::Op(OpKind::Mul, args) if args[1].as_const().is_some() => {
            (vec![args[1].as_const().unwrap()], vec![args[0].clone()])
        }
        ExprKind::Op(OpKind::Sum, args) => (vec![1; args.len()], args.clone()),
        ExprKind::Wsum(ws, es) => (ws.clone(), es.clone()),
        _ => (vec![1], vec![expr.clone()]),
    }
}

fn to_wsum(expr: &Expr) -> Expr {
    let (ws, es) = wsum_make(expr);
    Expr::from_kind(ExprKind::Wsum(ws, es))
}

fn args_are_flat(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Op(_, args) | ExprKind::Wsum(_, args) => {
            args.iter().all(|arg| arg.is_flat_var())
        }
        ExprKind::Global(_, args) => args.iter().all(|arg| arg.is_flat()),
        _ => false,
    }
}
