//! Decision variables and the pool that creates them.

use std::fmt;

use indexmap::IndexMap;

use crate::pretty::{Doc, SimplePretty};

use super::{MalformedExpression, Shared, Symbol};

/// The two kinds of decision variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarKind {
    Bool,
    Int,
}

/// A decision variable: a name, a kind and an inclusive domain `[lb, ub]`.
///
/// Boolean variables always have the domain `[0, 1]`. The name is the
/// variable's identity; two declarations with the same name are the same
/// variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarDecl {
    pub name: Symbol,
    pub kind: VarKind,
    pub lb: i64,
    pub ub: i64,
}

/// A shared reference to a variable declaration.
pub type VarRef = Shared<VarDecl>;

impl VarDecl {
    pub fn is_bool(&self) -> bool {
        self.kind == VarKind::Bool
    }
}

impl fmt::Display for VarDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.name.fmt(f)
    }
}

impl SimplePretty for VarDecl {
    fn pretty(&self) -> Doc {
        Doc::as_string(self.name)
    }
}

/// The factory for all variables of one model.
///
/// The frontend creates its variables here ([`VarPool::int_var`] and
/// [`VarPool::bool_var`]), and the pipeline synthesizes auxiliary variables
/// through the same pool ([`VarPool::fresh_int`] and
/// [`VarPool::fresh_bool`]). After compilation the pool holds the complete
/// set of variables (original plus auxiliary) with their resolved domains,
/// which is what a solver backend consumes.
#[derive(Debug, Default)]
pub struct VarPool {
    vars: IndexMap<Symbol, VarRef>,
    next_int: u32,
    next_bool: u32,
}

impl VarPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a named integer variable with domain `[lb, ub]`.
    pub fn int_var(&mut self, lb: i64, ub: i64, name: &str) -> Result<VarRef, MalformedExpression> {
        if lb > ub {
            return Err(MalformedExpression(format!(
                "empty domain [{}, {}] for variable `{}`",
                lb, ub, name
            )));
        }
        self.declare(VarDecl {
            name: Symbol::intern(name),
            kind: VarKind::Int,
            lb,
            ub,
        })
    }

    /// Declare a named boolean variable. The domain is always `[0, 1]`.
    pub fn bool_var(&mut self, name: &str) -> Result<VarRef, MalformedExpression> {
        self.declare(VarDecl {
            name: Symbol::intern(name),
            kind: VarKind::Bool,
            lb: 0,
            ub: 1,
        })
    }

    /// Synthesize a fresh auxiliary integer variable with domain `[lb, ub]`.
    pub fn fresh_int(&mut self, lb: i64, ub: i64) -> VarRef {
        debug_assert!(lb <= ub, "empty domain [{}, {}] for auxiliary", lb, ub);
        loop {
            let name = format!("iv{}", self.next_int);
            self.next_int += 1;
            let sym = Symbol::intern(&name);
            if !self.vars.contains_key(&sym) {
                return self
                    .declare(VarDecl {
                        name: sym,
                        kind: VarKind::Int,
                        lb,
                        ub,
                    })
                    .unwrap();
            }
        }
    }

    /// Synthesize a fresh auxiliary boolean variable.
    pub fn fresh_bool(&mut self) -> VarRef {
        loop {
            let name = format!("bv{}", self.next_bool);
            self.next_bool += 1;
            let sym = Symbol::intern(&name);
            if !self.vars.contains_key(&sym) {
                return self
                    .declare(VarDecl {
                        name: sym,
                        kind: VarKind::Bool,
                        lb: 0,
                        ub: 1,
                    })
                    .unwrap();
            }
        }
    }

    fn declare(&mut self, decl: VarDecl) -> Result<VarRef, MalformedExpression> {
        if self.vars.contains_key(&decl.name) {
            return Err(MalformedExpression(format!(
                "variable `{}` is already declared",
                decl.name
            )));
        }
        let var = Shared::new(decl);
        self.vars.insert(var.name, var.clone());
        Ok(var)
    }

    pub fn get(&self, name: Symbol) -> Option<&VarRef> {
        self.vars.get(&name)
    }

    /// All variables in declaration order.
    pub fn variables(&self) -> impl Iterator<Item = &VarRef> {
        self.vars.values()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn duplicate_names_rejected() {
        let mut pool = VarPool::new();
        pool.int_var(0, 5, "x").unwrap();
        assert!(pool.int_var(0, 5, "x").is_err());
        assert!(pool.bool_var("x").is_err());
    }

    #[test]
    fn empty_domain_rejected() {
        let mut pool = VarPool::new();
        assert!(pool.int_var(3, 2, "y").is_err());
    }

    #[test]
    fn fresh_names_skip_declared_ones() {
        let mut pool = VarPool::new();
        pool.int_var(0, 1, "iv0").unwrap();
        let aux = pool.fresh_int(0, 9);
        assert_eq!(aux.name.to_owned(), "iv1");
        assert_eq!((aux.lb, aux.ub), (0, 9));
    }
}
