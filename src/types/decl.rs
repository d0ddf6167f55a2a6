//! Declaration records (SPEC_FULL.md §3.2). Each carries the data the source's
//! `StructDecl`/`EnumDecl`/`FnDecl`/`ConstDecl`/`LetDecl` classes hold, but links to
//! other declarations and to the AST via `Copy` handles instead of `shared_ptr`/`Weak`.

use hashbrown::HashMap;

use crate::symbol::Symbol;
use crate::types::ast::{NodeId, ReceiverKind};
use crate::types::realty::RealType;
use crate::types::{ConstId, FnId, LetId, ScopeId, StructId};

pub struct StructDecl {
    pub name: Symbol,
    /// Declaration order, needed both for deterministic IR field layout and for
    /// the stub/define split in type lowering.
    pub field_order: Vec<Symbol>,
    pub fields: HashMap<Symbol, RealType>,
    pub methods: HashMap<Symbol, FnId>,
    pub associated_func: HashMap<Symbol, FnId>,
    pub associated_const: HashMap<Symbol, ConstId>,
}

impl StructDecl {
    pub fn new(name: Symbol) -> Self {
        StructDecl {
            name,
            field_order: Vec::new(),
            fields: HashMap::new(),
            methods: HashMap::new(),
            associated_func: HashMap::new(),
            associated_const: HashMap::new(),
        }
    }

    pub fn field_type(&self, name: Symbol) -> Option<&RealType> {
        self.fields.get(&name)
    }
}

pub struct EnumDecl {
    pub name: Symbol,
    /// Variant names in declaration order; a variant's discriminant is its index.
    pub variants: Vec<Symbol>,
}

impl EnumDecl {
    pub fn discriminant(&self, name: Symbol) -> Option<i32> {
        self.variants.iter().position(|v| *v == name).map(|i| i as i32)
    }
}

pub struct FnDecl {
    pub name: Symbol,
    /// `None` for builtins, which have no body to lower.
    pub ast: Option<NodeId>,
    /// The function body's own scope, created in pass 1. `None` for builtins.
    pub function_scope: Option<ScopeId>,
    pub params: Vec<(Symbol, RealType, bool)>, // name, type, mutable
    pub return_type: RealType,
    pub receiver: ReceiverKind,
    pub self_struct: Option<StructId>,
    pub is_main: bool,
    pub is_exit: bool,
    pub is_builtin: bool,
    /// True only for the compiler-synthesized `len()` on arrays, whose calls are
    /// replaced by a compile-time constant rather than lowered to a real call.
    pub is_array_len: bool,
    /// Filled by pass 4: the `LetDecl` each parameter is bound to inside the body.
    pub param_let_decls: Vec<LetId>,
}

impl FnDecl {
    pub fn has_receiver(&self) -> bool {
        !matches!(self.receiver, ReceiverKind::None)
    }
}

pub struct ConstDecl {
    pub name: Symbol,
    pub ast: NodeId,
    pub ty: RealType,
}

pub struct LetDecl {
    pub name: Symbol,
    pub ty: RealType,
    pub mutable: bool,
}
