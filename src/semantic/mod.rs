//! The four-pass semantic analyzer (SPEC_FULL.md §4.1): scope/decl construction,
//! type resolution, const evaluation plus control-flow outcome, then expression
//! typing and `let` introduction.

mod builtins;
mod constfold;
pub(crate) mod literals;
mod pass1;
mod pass2;
mod pass3;
mod pass4;

use hashbrown::HashMap;

use crate::error::Result;
use crate::symbol::Symbol;
use crate::types::ast::{Item, NodeId};
use crate::types::constval::ConstValue;
use crate::types::decl::{ConstDecl, EnumDecl, FnDecl, LetDecl, StructDecl};
use crate::types::realty::{PlaceKind, RealType};
use crate::types::scope::ScopeTree;
use crate::types::{Arena, ConstId, EnumId, FnId, LetId, ScopeId, StructId};

#[derive(Clone, Copy, Debug)]
pub enum DeclRef {
    Struct(StructId),
    Enum(EnumId),
    Fn(FnId),
    Const(ConstId),
}

#[derive(Clone, Copy, Debug)]
pub enum PathResolution {
    EnumVariant(EnumId, i32),
    AssocConst(ConstId),
}

/// Everything pass 1 through pass 4 produce, keyed however is cheapest to look up
/// again from an un-owned AST node: `NodeId` for anything expression/type/pattern
/// shaped, plain arena ids for declarations.
pub struct Program {
    pub items: Vec<Item>,

    pub scopes: ScopeTree,
    pub structs: Arena<StructId, StructDecl>,
    pub enums: Arena<EnumId, EnumDecl>,
    pub fns: Arena<FnId, FnDecl>,
    pub consts: Arena<ConstId, ConstDecl>,
    pub lets: Arena<LetId, LetDecl>,

    /// Local variable bindings per scope (parameters and `let`s); kept apart from
    /// `ScopeData::values`, which only ever holds functions and consts.
    pub scope_locals: HashMap<ScopeId, HashMap<Symbol, LetId>>,

    /// The scope an item's name is resolved *from* (its lexical parent).
    pub item_decl_scope: HashMap<NodeId, ScopeId>,
    /// The declaration an item introduces.
    pub item_decl: HashMap<NodeId, DeclRef>,
    /// Every scope's directly-declared items, in declaration order. Used by the
    /// global lowering driver (SPEC_FULL.md §4.4.3), which needs a deterministic
    /// per-scope traversal order that a `HashMap`-backed namespace can't give it.
    pub scope_items: HashMap<ScopeId, Vec<NodeId>>,
    /// Every AST node's enclosing scope (pass 1's `node_scope` table, SPEC_FULL.md
    /// §4.1: "node id -> enclosing scope"). For a node that itself introduces a new
    /// scope (a `Fn`'s body block, an `Impl` block, a non-function-body `Block`),
    /// this is the scope *introduced by* that node, not its parent's.
    pub node_scope: HashMap<NodeId, ScopeId>,

    pub node_types: HashMap<NodeId, RealType>,
    pub node_places: HashMap<NodeId, PlaceKind>,
    pub node_outcomes: HashMap<NodeId, crate::types::outcome::OutcomeState>,
    /// `Identifier` expressions and `let`/parameter patterns resolved to a local.
    pub node_lets: HashMap<NodeId, LetId>,
    /// Every call expression's resolved callee.
    pub node_calls: HashMap<NodeId, FnId>,
    /// Bare `Type::member` expressions (not in call position).
    pub node_paths: HashMap<NodeId, PathResolution>,

    pub const_values: HashMap<ConstId, ConstValue>,
    /// `Const` item -> the `NodeId` of its defining item, for lazy const evaluation.
    pub const_item: HashMap<ConstId, NodeId>,
    /// An array type's size-expression node id -> its evaluated length
    /// (`const_expr_to_size` in SPEC_FULL.md §4.1).
    pub array_sizes: HashMap<NodeId, u32>,

    pub builtin_methods: HashMap<(BuiltinReceiver, Symbol), FnId>,
    pub builtin_assoc_fns: HashMap<(Symbol, Symbol), FnId>,

    pub main_fn: Option<FnId>,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BuiltinReceiver {
    Array,
    String,
    Str,
    UnsignedIshInt,
}

impl Program {
    fn new(items: Vec<Item>) -> Self {
        Program {
            items,
            scopes: ScopeTree::new(),
            structs: Arena::new(),
            enums: Arena::new(),
            fns: Arena::new(),
            consts: Arena::new(),
            lets: Arena::new(),
            scope_locals: HashMap::new(),
            item_decl_scope: HashMap::new(),
            item_decl: HashMap::new(),
            scope_items: HashMap::new(),
            node_scope: HashMap::new(),
            node_types: HashMap::new(),
            node_places: HashMap::new(),
            node_outcomes: HashMap::new(),
            node_lets: HashMap::new(),
            node_calls: HashMap::new(),
            node_paths: HashMap::new(),
            const_values: HashMap::new(),
            const_item: HashMap::new(),
            array_sizes: HashMap::new(),
            builtin_methods: HashMap::new(),
            builtin_assoc_fns: HashMap::new(),
            main_fn: None,
        }
    }

    /// Temporarily takes ownership of the AST so a pass can hold `&[Item]` and
    /// `&mut Program` at once without a self-referential borrow.
    pub(crate) fn with_items<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce(&[Item], &mut Program) -> R,
    {
        let items = std::mem::take(&mut self.items);
        let result = f(&items, self);
        self.items = items;
        result
    }

    pub(crate) fn lookup_local(&self, start: ScopeId, name: Symbol) -> Option<LetId> {
        let mut cur = Some(start);
        while let Some(id) = cur {
            if let Some(id) = self.scope_locals.get(&id).and_then(|m| m.get(&name)) {
                return Some(*id);
            }
            cur = self.scopes.get(id).parent;
        }
        None
    }
}

pub fn find_item(items: &[Item], target: NodeId) -> Option<&Item> {
    for item in items {
        if item.id == target {
            return Some(item);
        }
        if let crate::types::ast::ItemKind::Impl { items: inner, .. } = &item.kind {
            if let Some(found) = find_item(inner, target) {
                return Some(found);
            }
        }
    }
    None
}

/// Runs all four passes over a parsed program, producing the fully resolved and
/// typed `Program`.
pub fn analyze(items: Vec<Item>) -> Result<Program> {
    let mut prog = Program::new(items);
    builtins::register(&mut prog);
    prog.with_items(|items, prog| pass1::build_scopes(items, prog))?;
    prog.with_items(|items, prog| pass2::resolve_types(items, prog))?;
    prog.with_items(|items, prog| pass3::compute_outcomes(items, prog))?;
    prog.with_items(|items, prog| pass4::type_program(items, prog))?;
    Ok(prog)
}
