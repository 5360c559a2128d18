use once_cell::sync::Lazy;
use std::fmt;
use std::sync::Mutex;
use string_interner::{DefaultSymbol, StringInterner};

static INTERNED_STRINGS: Lazy<Mutex<StringInterner>> =
    Lazy::new(|| Mutex::new(StringInterner::new()));

/// An interned string.
///
/// Variable and opaque-constraint names are interned so that identity
/// comparisons are cheap. The frontend must keep variable names unique; the
/// [`crate::ast::VarPool`] enforces this for the variables it creates.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(DefaultSymbol);

impl Symbol {
    pub fn intern(string: &str) -> Self {
        let mut interned = INTERNED_STRINGS.lock().unwrap();
        Symbol(interned.get_or_intern(string))
    }

    pub fn to_owned(self) -> String {
        let interned = INTERNED_STRINGS.lock().unwrap();
        interned.resolve(self.0).unwrap().to_owned()
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let interned = INTERNED_STRINGS.lock().unwrap();
        fmt::Debug::fmt(interned.resolve(self.0).unwrap(), f)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let interned = INTERNED_STRINGS.lock().unwrap();
        fmt::Display::fmt(interned.resolve(self.0).unwrap(), f)
    }
}
