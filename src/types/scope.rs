//! The scope tree (SPEC_FULL.md §3.3) and its handle-based redesign (§3.3a).
//!
//! Every scope owns a type-namespace and a value-namespace (struct/enum/fn/const
//! only — `LetDecl`s are *not* stored here; they live in the separate
//! `scope_local_variable` table populated by pass 4, matching the source's own
//! split between `Scope::value_namespace` and per-scope local variable maps).

use hashbrown::HashMap;

use crate::symbol::Symbol;
use crate::types::realty::RealType;
use crate::types::{ConstId, EnumId, FnId, ScopeId, StructId};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ScopeKind {
    Root,
    Block,
    Function,
    Impl,
}

/// A name bound in a scope's type namespace.
#[derive(Clone, Copy, Debug)]
pub enum TypeNsEntry {
    Struct(StructId),
    Enum(EnumId),
}

/// A name bound in a scope's value namespace (functions and consts only).
#[derive(Clone, Copy, Debug)]
pub enum ValueNsEntry {
    Fn(FnId),
    Const(ConstId),
}

pub struct ScopeData {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    pub types: HashMap<Symbol, TypeNsEntry>,
    pub values: HashMap<Symbol, ValueNsEntry>,
    /// Name of the struct this `impl` block extends, set at creation time.
    pub impl_struct: Option<Symbol>,
    /// The impl's `Self` real-type, resolved in pass 2.
    pub self_type: Option<RealType>,
    pub is_main: bool,
    pub has_exit: bool,
}

impl ScopeData {
    fn new(kind: ScopeKind, parent: Option<ScopeId>) -> Self {
        ScopeData {
            kind,
            parent,
            children: Vec::new(),
            types: HashMap::new(),
            values: HashMap::new(),
            impl_struct: None,
            self_type: None,
            is_main: false,
            has_exit: false,
        }
    }
}

/// The `Vec`-backed scope arena plus the per-scope local-variable table pass 4
/// fills in. Kept together since both are indexed by `ScopeId`.
pub struct ScopeTree {
    scopes: Vec<ScopeData>,
    pub root: ScopeId,
}

impl ScopeTree {
    pub fn new() -> Self {
        let mut scopes = Vec::new();
        scopes.push(ScopeData::new(ScopeKind::Root, None));
        ScopeTree { scopes, root: ScopeId(0) }
    }

    pub fn push_child(&mut self, parent: ScopeId, kind: ScopeKind) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(ScopeData::new(kind, Some(parent)));
        self.scopes[parent.index()].children.push(id);
        id
    }

    pub fn get(&self, id: ScopeId) -> &ScopeData {
        &self.scopes[id.index()]
    }

    pub fn get_mut(&mut self, id: ScopeId) -> &mut ScopeData {
        &mut self.scopes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    /// Walk outward from `start`, looking up `name` in each scope's type namespace.
    pub fn lookup_type(&self, start: ScopeId, name: Symbol) -> Option<TypeNsEntry> {
        let mut cur = Some(start);
        while let Some(id) = cur {
            let scope = self.get(id);
            if let Some(entry) = scope.types.get(&name) {
                return Some(*entry);
            }
            cur = scope.parent;
        }
        None
    }

    /// Walk outward from `start`, looking up `name` in each scope's value namespace
    /// (functions and consts; locals are checked separately via `scope_local_variable`).
    pub fn lookup_value(&self, start: ScopeId, name: Symbol) -> Option<ValueNsEntry> {
        let mut cur = Some(start);
        while let Some(id) = cur {
            let scope = self.get(id);
            if let Some(entry) = scope.values.get(&name) {
                return Some(*entry);
            }
            cur = scope.parent;
        }
        None
    }

    /// The nearest enclosing `Impl` scope, if any, walking outward from `start`.
    pub fn enclosing_impl(&self, start: ScopeId) -> Option<ScopeId> {
        let mut cur = Some(start);
        while let Some(id) = cur {
            let scope = self.get(id);
            if scope.kind == ScopeKind::Impl {
                return Some(id);
            }
            cur = scope.parent;
        }
        None
    }

    /// The nearest enclosing `Function` scope, if any.
    pub fn enclosing_function(&self, start: ScopeId) -> Option<ScopeId> {
        let mut cur = Some(start);
        while let Some(id) = cur {
            let scope = self.get(id);
            if scope.kind == ScopeKind::Function {
                return Some(id);
            }
            cur = scope.parent;
        }
        None
    }
}

impl Default for ScopeTree {
    fn default() -> Self {
        ScopeTree::new()
    }
}
