//! Abstract representation of constraint expressions.
//!
//! The node set is a closed tagged union: every pass matches exhaustively
//! over [`ExprKind`], so adding a node kind forces every pass to decide how
//! to handle it. Nodes are immutable values behind [`Shared`] handles;
//! passes construct new nodes rather than mutating.

use std::fmt;

use thiserror::Error;

use crate::pretty::{parens_group, pretty_list, Doc, SimplePretty};

use super::{Shared, Symbol, VarRef};

/// Constructing a node whose arguments violate arity or kind expectations.
///
/// This is rejected immediately at construction and never propagated through
/// the passes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed expression: {0}")]
pub struct MalformedExpression(pub String);

pub type Expr = Shared<ExprData>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExprData {
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprKind {
    /// A decision variable.
    Var(VarRef),
    /// The logical complement of a boolean variable.
    ///
    /// Invariant: never wraps another negated view; double negation
    /// collapses to the parent variable (see [`Expr::negate`]).
    NegView(VarRef),
    /// An integer constant.
    Const(i64),
    /// An operator applied to an ordered argument sequence.
    Op(OpKind, Vec<Expr>),
    /// A weighted sum with index-aligned weights and arguments.
    Wsum(Vec<i64>, Vec<Expr>),
    /// A comparison between two expressions.
    Cmp(CmpOp, Expr, Expr),
    /// A global relation or function.
    Global(GlobalKind, Vec<GlobalArg>),
    /// A trivially true or false constraint, produced by folding.
    BoolLit(bool),
    /// A backend-specific constraint that every pass forwards unchanged.
    Opaque(Opaque),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// N-ary addition.
    Sum,
    /// Binary multiplication.
    Mul,
    /// Binary truncated integer division.
    Div,
    /// Binary remainder (sign follows the dividend).
    Mod,
    /// Binary exponentiation with a constant non-negative exponent.
    Pow,
    /// Unary arithmetic negation.
    Neg,
    /// N-ary conjunction.
    And,
    /// N-ary disjunction.
    Or,
    /// Unary logical negation of a non-variable boolean expression.
    Not,
    /// Binary exclusive or.
    Xor,
    /// Binary implication.
    Implies,
}

impl OpKind {
    /// The operator's name, as used in supported-operator sets.
    pub fn name(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::Mod => "mod",
            Self::Pow => "pow",
            Self::Neg => "-",
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
            Self::Xor => "xor",
            Self::Implies => "->",
        }
    }

    pub fn is_bool(self) -> bool {
        matches!(
            self,
            Self::And | Self::Or | Self::Not | Self::Xor | Self::Implies
        )
    }

    /// The infix rendering of binary/n-ary operators.
    fn symbol(self) -> &'static str {
        match self {
            Self::Sum => "+",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Pow => "**",
            Self::Neg => "-",
            Self::And => "&&",
            Self::Or => "||",
            Self::Not => "!",
            Self::Xor => "xor",
            Self::Implies => "->",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    /// The operator for the mirrored comparison: `a op b` iff `b op.flip() a`.
    pub fn flip(self) -> CmpOp {
        match self {
            Self::Eq => Self::Eq,
            Self::Ne => Self::Ne,
            Self::Lt => Self::Gt,
            Self::Le => Self::Ge,
            Self::Gt => Self::Lt,
            Self::Ge => Self::Le,
        }
    }

    /// The operator for the negated comparison: `!(a op b)` iff `a op.negate() b`.
    pub fn negate(self) -> CmpOp {
        match self {
            Self::Eq => Self::Ne,
            Self::Ne => Self::Eq,
            Self::Lt => Self::Ge,
            Self::Le => Self::Gt,
            Self::Gt => Self::Le,
            Self::Ge => Self::Lt,
        }
    }

    /// Evaluate the comparison on two known values.
    pub fn holds(self, lhs: i64, rhs: i64) -> bool {
        match self {
            Self::Eq => lhs == rhs,
            Self::Ne => lhs != rhs,
            Self::Lt => lhs < rhs,
            Self::Le => lhs <= rhs,
            Self::Gt => lhs > rhs,
            Self::Ge => lhs >= rhs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalKind {
    /// All arguments take pairwise distinct values (boolean relation).
    AllDifferent,
    /// Maximum of the arguments (numeric function).
    Max,
    /// Minimum of the arguments (numeric function).
    Min,
    /// `element([a0, .., an], i)` is `a_i` (numeric function).
    Element,
    /// Absolute value (numeric function).
    Abs,
}

impl GlobalKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::AllDifferent => "alldifferent",
            Self::Max => "max",
            Self::Min => "min",
            Self::Element => "element",
            Self::Abs => "abs",
        }
    }

    pub fn is_bool(self) -> bool {
        matches!(self, Self::AllDifferent)
    }
}

/// An argument of a global relation: a single expression or a nested
/// sequence (e.g. the array argument of `element`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlobalArg {
    One(Expr),
    Many(Vec<Expr>),
}

impl GlobalArg {
    /// True if the argument contains only variables and constants.
    pub fn is_flat(&self) -> bool {
        match self {
            GlobalArg::One(e) => e.is_flat_var(),
            GlobalArg::Many(es) => es.iter().all(|e| e.is_flat_var()),
        }
    }
}

/// An atomic backend-specific relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opaque {
    pub name: Symbol,
    pub args: Vec<Expr>,
}

impl ExprData {
    /// Whether this expression denotes a truth value.
    pub fn is_bool(&self) -> bool {
        match &self.kind {
            ExprKind::Var(var) => var.is_bool(),
            ExprKind::NegView(_) => true,
            ExprKind::Const(_) => false,
            ExprKind::Op(op, _) => op.is_bool(),
            ExprKind::Wsum(_, _) => false,
            ExprKind::Cmp(_, _, _) => true,
            ExprKind::Global(global, _) => global.is_bool(),
            ExprKind::BoolLit(_) => true,
            ExprKind::Opaque(_) => true,
        }
    }

    pub fn is_num(&self) -> bool {
        !self.is_bool()
    }

    /// True for the leaves of flat normal form: variables, negated views
    /// and constants.
    pub fn is_flat_var(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Var(_) | ExprKind::NegView(_) | ExprKind::Const(_)
        )
    }

    /// True for boolean variables and their negated views.
    pub fn is_bool_var(&self) -> bool {
        match &self.kind {
            ExprKind::Var(var) => var.is_bool(),
            ExprKind::NegView(_) => true,
            _ => false,
        }
    }

    pub fn as_const(&self) -> Option<i64> {
        match self.kind {
            ExprKind::Const(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_var(&self) -> Option<&VarRef> {
        match &self.kind {
            ExprKind::Var(var) => Some(var),
            _ => None,
        }
    }

    /// The operator/global name on the left-hand side of a comparison, for
    /// membership tests against a supported-operator set. Flat leaves have
    /// no name.
    pub fn op_name(&self) -> Option<&'static str> {
        match &self.kind {
            ExprKind::Op(op, _) => Some(op.name()),
            ExprKind::Wsum(_, _) => Some("wsum"),
            ExprKind::Global(global, _) => Some(global.name()),
            _ => None,
        }
    }
}

impl Expr {
    pub(crate) fn from_kind(kind: ExprKind) -> Expr {
        Shared::new(ExprData { kind })
    }

    pub fn var(var: VarRef) -> Expr {
        Expr::from_kind(ExprKind::Var(var))
    }

    pub fn constant(value: i64) -> Expr {
        Expr::from_kind(ExprKind::Const(value))
    }

    pub fn bool_lit(value: bool) -> Expr {
        Expr::from_kind(ExprKind::BoolLit(value))
    }

    pub fn sum(args: Vec<Expr>) -> Result<Expr, MalformedExpression> {
        if args.is_empty() {
            return Err(MalformedExpression("sum of no arguments".to_string()));
        }
        Ok(Expr::from_kind(ExprKind::Op(OpKind::Sum, args)))
    }

    pub fn wsum(weights: Vec<i64>, args: Vec<Expr>) -> Result<Expr, MalformedExpression> {
        if weights.len() != args.len() {
            return Err(MalformedExpression(format!(
                "wsum with {} weights but {} arguments",
                weights.len(),
                args.len()
            )));
        }
        if args.is_empty() {
            return Err(MalformedExpression("wsum of no arguments".to_string()));
        }
        Ok(Expr::from_kind(ExprKind::Wsum(weights, args)))
    }

    pub fn mul(lhs: Expr, rhs: Expr) -> Expr {
        Expr::from_kind(ExprKind::Op(OpKind::Mul, vec![lhs, rhs]))
    }

    pub fn div(lhs: Expr, rhs: Expr) -> Result<Expr, MalformedExpression> {
        if rhs.as_const() == Some(0) {
            return Err(MalformedExpression(format!(
                "division of `{}` by constant zero",
                lhs
            )));
        }
        Ok(Expr::from_kind(ExprKind::Op(OpKind::Div, vec![lhs, rhs])))
    }

    pub fn modulo(lhs: Expr, rhs: Expr) -> Result<Expr, MalformedExpression> {
        if rhs.as_const() == Some(0) {
            return Err(MalformedExpression(format!(
                "remainder of `{}` by constant zero",
                lhs
            )));
        }
        Ok(Expr::from_kind(ExprKind::Op(OpKind::Mod, vec![lhs, rhs])))
    }

    pub fn pow(base: Expr, exponent: Expr) -> Result<Expr, MalformedExpression> {
        match exponent.as_const() {
            Some(e) if e >= 0 => Ok(Expr::from_kind(ExprKind::Op(
                OpKind::Pow,
                vec![base, exponent],
            ))),
            Some(e) => Err(MalformedExpression(format!(
                "negative exponent {} in power of `{}`",
                e, base
            ))),
            None => Err(MalformedExpression(format!(
                "non-constant exponent `{}` in power of `{}`",
                exponent, base
            ))),
        }
    }

    pub fn neg(operand: Expr) -> Expr {
        Expr::from_kind(ExprKind::Op(OpKind::Neg, vec![operand]))
    }

    pub fn and(args: Vec<Expr>) -> Result<Expr, MalformedExpression> {
        Self::connective(OpKind::And, args)
    }

    pub fn or(args: Vec<Expr>) -> Result<Expr, MalformedExpression> {
        Self::connective(OpKind::Or, args)
    }

    pub fn xor(lhs: Expr, rhs: Expr) -> Result<Expr, MalformedExpression> {
        Self::connective(OpKind::Xor, vec![lhs, rhs])
    }

    pub fn implies(lhs: Expr, rhs: Expr) -> Result<Expr, MalformedExpression> {
        Self::connective(OpKind::Implies, vec![lhs, rhs])
    }

    fn connective(op: OpKind, args: Vec<Expr>) -> Result<Expr, MalformedExpression> {
        if args.is_empty() {
            return Err(MalformedExpression(format!(
                "{} of no arguments",
                op.name()
            )));
        }
        if let Some(arg) = args.iter().find(|arg| !arg.is_bool()) {
            return Err(MalformedExpression(format!(
                "non-boolean argument `{}` of {}",
                arg,
                op.name()
            )));
        }
        Ok(Expr::from_kind(ExprKind::Op(op, args)))
    }

    pub fn cmp(op: CmpOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::from_kind(ExprKind::Cmp(op, lhs, rhs))
    }

    pub fn eq(lhs: Expr, rhs: Expr) -> Expr {
        Expr::cmp(CmpOp::Eq, lhs, rhs)
    }

    pub fn ne(lhs: Expr, rhs: Expr) -> Expr {
        Expr::cmp(CmpOp::Ne, lhs, rhs)
    }

    pub fn le(lhs: Expr, rhs: Expr) -> Expr {
        Expr::cmp(CmpOp::Le, lhs, rhs)
    }

    pub fn lt(lhs: Expr, rhs: Expr) -> Expr {
        Expr::cmp(CmpOp::Lt, lhs, rhs)
    }

    pub fn ge(lhs: Expr, rhs: Expr) -> Expr {
        Expr::cmp(CmpOp::Ge, lhs, rhs)
    }

    pub fn gt(lhs: Expr, rhs: Expr) -> Expr {
        Expr::cmp(CmpOp::Gt, lhs, rhs)
    }

    pub fn alldifferent(args: Vec<Expr>) -> Result<Expr, MalformedExpression> {
        if args.len() < 2 {
            return Err(MalformedExpression(
                "alldifferent needs at least two arguments".to_string(),
            ));
        }
        Ok(Expr::from_kind(ExprKind::Global(
            GlobalKind::AllDifferent,
            args.into_iter().map(GlobalArg::One).collect(),
        )))
    }

    pub fn max_of(args: Vec<Expr>) -> Result<Expr, MalformedExpression> {
        Self::extremum(GlobalKind::Max, args)
    }

    pub fn min_of(args: Vec<Expr>) -> Result<Expr, MalformedExpression> {
        Self::extremum(GlobalKind::Min, args)
    }

    fn extremum(global: GlobalKind, args: Vec<Expr>) -> Result<Expr, MalformedExpression> {
        if args.is_empty() {
            return Err(MalformedExpression(format!(
                "{} of no arguments",
                global.name()
            )));
        }
        Ok(Expr::from_kind(ExprKind::Global(
            global,
            args.into_iter().map(GlobalArg::One).collect(),
        )))
    }

    pub fn element(array: Vec<Expr>, index: Expr) -> Result<Expr, MalformedExpression> {
        if array.is_empty() {
            return Err(MalformedExpression(
                "element over an empty array".to_string(),
            ));
        }
        Ok(Expr::from_kind(ExprKind::Global(
            GlobalKind::Element,
            vec![GlobalArg::Many(array), GlobalArg::One(index)],
        )))
    }

    pub fn abs(operand: Expr) -> Expr {
        Expr::from_kind(ExprKind::Global(
            GlobalKind::Abs,
            vec![GlobalArg::One(operand)],
        ))
    }

    pub fn opaque(name: &str, args: Vec<Expr>) -> Expr {
        Expr::from_kind(ExprKind::Opaque(Opaque {
            name: Symbol::intern(name),
            args,
        }))
    }

    /// Logical negation of a boolean expression.
    ///
    /// A boolean variable becomes its negated view and a negated view
    /// collapses back to its parent, so views never nest. Panics on numeric
    /// expressions; callers must check [`ExprData::is_bool`] first.
    pub fn negate(&self) -> Expr {
        match &self.kind {
            ExprKind::Var(var) if var.is_bool() => Expr::from_kind(ExprKind::NegView(var.clone())),
            ExprKind::NegView(var) => Expr::var(var.clone()),
            ExprKind::BoolLit(b) => Expr::bool_lit(!b),
            ExprKind::Cmp(op, lhs, rhs) => Expr::cmp(op.negate(), lhs.clone(), rhs.clone()),
            ExprKind::Op(OpKind::Not, args) => args[0].clone(),
            _ if self.is_bool() => Expr::from_kind(ExprKind::Op(OpKind::Not, vec![self.clone()])),
            _ => panic!("cannot negate numeric expression `{}`", self),
        }
    }
}

impl SimplePretty for ExprData {
    fn pretty(&self) -> Doc {
        let res = match &self.kind {
            ExprKind::Var(var) => Doc::as_string(var.name),
            ExprKind::NegView(var) => Doc::text("~").append(Doc::as_string(var.name)),
            ExprKind::Const(value) => Doc::as_string(value),
            ExprKind::Op(op @ (OpKind::Neg | OpKind::Not), args) => {
                Doc::text(op.symbol()).append(parens_group(args[0].pretty()))
            }
            ExprKind::Op(op, args) => parens_group(Doc::intersperse(
                args.iter().map(|arg| arg.pretty()),
                Doc::space()
                    .append(Doc::text(op.symbol()))
                    .append(Doc::space()),
            )),
            ExprKind::Wsum(weights, args) => Doc::text("wsum([")
                .append(Doc::intersperse(
                    weights.iter().map(Doc::as_string),
                    Doc::text(", "),
                ))
                .append(Doc::text("], ["))
                .append(pretty_list(args))
                .append(Doc::text("])")),
            ExprKind::Cmp(op, lhs, rhs) => parens_group(
                lhs.pretty()
                    .append(Doc::space())
                    .append(Doc::text(op.as_str()))
                    .append(Doc::space())
                    .append(rhs.pretty()),
            ),
            ExprKind::Global(global, args) => {
                Doc::text(global.name()).append(parens_group(pretty_list(args)))
            }
            ExprKind::BoolLit(b) => Doc::as_string(b),
            ExprKind::Opaque(opaque) => {
                Doc::as_string(opaque.name).append(parens_group(pretty_list(&opaque.args)))
            }
        };
        Doc::group(res)
    }
}

impl SimplePretty for Expr {
    fn pretty(&self) -> Doc {
        ExprData::pretty(self)
    }
}

impl SimplePretty for GlobalArg {
    fn pretty(&self) -> Doc {
        match self {
            GlobalArg::One(e) => e.pretty(),
            GlobalArg::Many(es) => Doc::text("[")
                .append(pretty_list(es))
                .append(Doc::text("]")),
        }
    }
}

impl fmt::Display for ExprData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.pretty().render_fmt(u16::MAX as usize, f)
    }
}

#[cfg(test)]
mod test {
    use crate::ast::VarPool;

    use super::*;

    #[test]
    fn format_expr() {
        let mut pool = VarPool::new();
        let x = Expr::var(pool.int_var(0, 9, "x").unwrap());
        let y = Expr::var(pool.int_var(0, 9, "y").unwrap());
        let e = Expr::le(
            Expr::sum(vec![x, Expr::mul(Expr::constant(2), y)]).unwrap(),
            Expr::constant(17),
        );
        assert_eq!(e.to_string(), "((x + (2 * y)) <= 17)");
    }

    #[test]
    fn wsum_length_mismatch_rejected() {
        let mut pool = VarPool::new();
        let x = Expr::var(pool.int_var(0, 9, "x").unwrap());
        let err = Expr::wsum(vec![1, 2], vec![x]).unwrap_err();
        assert!(err.to_string().contains("2 weights but 1 arguments"));
    }

    #[test]
    fn boolean_connective_rejects_numeric_argument() {
        let mut pool = VarPool::new();
        let x = Expr::var(pool.int_var(0, 9, "x").unwrap());
        let b = Expr::var(pool.bool_var("b").unwrap());
        assert!(Expr::and(vec![b.clone(), x]).is_err());
        assert!(Expr::and(vec![b.clone(), b]).is_ok());
    }

    #[test]
    fn division_by_constant_zero_rejected() {
        let mut pool = VarPool::new();
        let x = Expr::var(pool.int_var(0, 9, "x").unwrap());
        assert!(Expr::div(x.clone(), Expr::constant(0)).is_err());
        assert!(Expr::modulo(x, Expr::constant(0)).is_err());
    }

    #[test]
    fn double_negation_collapses() {
        let mut pool = VarPool::new();
        let b = Expr::var(pool.bool_var("b").unwrap());
        let neg = b.negate();
        assert!(matches!(neg.kind, ExprKind::NegView(_)));
        assert_eq!(neg.negate(), b);
    }

    #[test]
    fn negate_flips_comparisons() {
        let mut pool = VarPool::new();
        let x = Expr::var(pool.int_var(0, 9, "x").unwrap());
        let e = Expr::lt(x.clone(), Expr::constant(5));
        assert_eq!(e.negate().to_string(), "(x >= 5)");
    }
}
