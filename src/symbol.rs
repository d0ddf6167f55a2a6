//! Interned identifiers.
//!
//! Names (struct fields, function parameters, identifiers) are interned once into a
//! `bumpalo` arena and referenced everywhere else as a cheap `Copy` handle. The
//! interner lives for the whole compilation and is never torn down mid-pass.

use std::cell::RefCell;
use bumpalo::Bump;
use hashbrown::HashMap;

/// A handle to an interned string. Two symbols compare equal iff their underlying
/// text is identical.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol(*const str);

impl std::fmt::Debug for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Symbol {
    pub fn as_str(&self) -> &str {
        // Safety: `self.0` was produced from a live allocation in `Interner::arena`,
        // which is never freed before the interner (and thus every symbol it handed
        // out) goes out of scope.
        unsafe { &*self.0 }
    }
}

impl PartialOrd for Symbol {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Symbol {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}

struct Interner {
    arena: Bump,
    map: HashMap<&'static str, Symbol>,
}

impl Interner {
    fn new() -> Self {
        Self { arena: Bump::new(), map: HashMap::new() }
    }

    fn intern(&mut self, text: &str) -> Symbol {
        if let Some(sym) = self.map.get(text) {
            return *sym;
        }
        let allocated: &str = self.arena.alloc_str(text);
        // Safety: `allocated` lives as long as `self.arena`, and `self` (and its
        // arena) is never dropped for the lifetime of the process in this
        // single-compilation binary.
        let extended: &'static str = unsafe { std::mem::transmute(allocated) };
        let sym = Symbol(extended as *const str);
        self.map.insert(extended, sym);
        sym
    }
}

thread_local! {
    static INTERNER: RefCell<Interner> = RefCell::new(Interner::new());
}

/// Intern `text`, returning a stable `Symbol` handle.
pub fn intern(text: &str) -> Symbol {
    INTERNER.with(|cell| cell.borrow_mut().intern(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_text_interns_to_equal_symbol() {
        let a = intern("main");
        let b = intern("main");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "main");
    }

    #[test]
    fn different_text_interns_distinctly() {
        let a = intern("foo");
        let b = intern("bar");
        assert_ne!(a, b);
    }
}
