//! Pass 1 (SPEC_FULL.md §4.1.1): a pre-order walk that builds the scope tree and
//! collects a skeleton declaration for every struct/enum/fn/const, detecting name
//! collisions within a namespace. Types, bodies, and `let`-bindings are left
//! unresolved; later passes fill them in using the scope/decl skeletons this pass
//! produces.

use crate::error::{CompileError, Result};
use crate::types::ast::*;
use crate::types::decl::{ConstDecl, EnumDecl, FnDecl, StructDecl};
use crate::types::realty::RealType;
use crate::types::scope::{ScopeKind, TypeNsEntry, ValueNsEntry};
use crate::types::ScopeId;

use super::{DeclRef, Program};

struct Pass1<'p> {
    prog: &'p mut Program,
    scope: ScopeId,
}

pub fn build_scopes(items: &[Item], prog: &mut Program) -> Result<()> {
    let root = prog.scopes.root;
    let mut p = Pass1 { prog, scope: root };
    for item in items {
        p.walk_item(item)?;
    }
    Ok(())
}

impl<'p> Pass1<'p> {
    fn note_scope(&mut self, id: NodeId) {
        self.prog.node_scope.insert(id, self.scope);
    }

    fn in_scope<R>(&mut self, scope: ScopeId, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        let saved = self.scope;
        self.scope = scope;
        let result = f(self);
        self.scope = saved;
        result
    }

    fn walk_item(&mut self, item: &Item) -> Result<()> {
        self.note_scope(item.id);
        self.prog.item_decl_scope.insert(item.id, self.scope);
        self.prog.scope_items.entry(self.scope).or_default().push(item.id);
        match &item.kind {
            ItemKind::Fn(sig) => self.walk_fn_item(item.id, sig),
            ItemKind::Struct { name, fields } => self.walk_struct_item(item.id, *name, fields),
            ItemKind::Enum { name, variants } => self.walk_enum_item(item.id, *name, variants),
            ItemKind::Impl { struct_name, items } => self.walk_impl_item(item.id, *struct_name, items),
            ItemKind::Const { name, ty, value } => self.walk_const_item(item.id, *name, ty, value),
        }
    }

    fn declare_value(&mut self, name: crate::symbol::Symbol, entry: ValueNsEntry) -> Result<()> {
        let scope = self.prog.scopes.get_mut(self.scope);
        if scope.values.contains_key(&name) {
            return Err(CompileError::semantic(format!("`{name}` is already defined in this scope")));
        }
        scope.values.insert(name, entry);
        Ok(())
    }

    fn declare_type(&mut self, name: crate::symbol::Symbol, entry: TypeNsEntry) -> Result<()> {
        let scope = self.prog.scopes.get_mut(self.scope);
        if scope.types.contains_key(&name) {
            return Err(CompileError::semantic(format!("type `{name}` is already defined in this scope")));
        }
        scope.types.insert(name, entry);
        Ok(())
    }

    fn walk_fn_item(&mut self, item_id: NodeId, sig: &FnSig) -> Result<()> {
        let fn_scope = self.prog.scopes.push_child(self.scope, ScopeKind::Function);
        if sig.name.as_str() == "main" && self.prog.scopes.get(self.scope).kind == ScopeKind::Root {
            self.prog.scopes.get_mut(fn_scope).is_main = true;
        }
        let fid = self.prog.fns.push(FnDecl {
            name: sig.name,
            ast: Some(item_id),
            function_scope: Some(fn_scope),
            params: Vec::new(),
            return_type: RealType::unit(),
            receiver: sig.receiver,
            self_struct: None,
            is_main: false,
            is_exit: false,
            is_builtin: false,
            is_array_len: false,
            param_let_decls: Vec::new(),
        });
        self.declare_value(sig.name, ValueNsEntry::Fn(fid))?;
        self.prog.item_decl.insert(item_id, DeclRef::Fn(fid));
        self.prog.node_scope.insert(item_id, fn_scope);

        self.in_scope(fn_scope, |p| {
            for param in &sig.params {
                p.walk_pattern(&param.pattern)?;
                p.walk_type(&param.ty)?;
            }
            if let Some(rt) = &sig.return_type {
                p.walk_type(rt)?;
            }
            p.walk_block_same_scope(&sig.body)
        })
    }

    fn walk_struct_item(&mut self, item_id: NodeId, name: crate::symbol::Symbol, fields: &[StructField]) -> Result<()> {
        let sid = self.prog.structs.push(StructDecl::new(name));
        self.declare_type(name, TypeNsEntry::Struct(sid))?;
        self.prog.item_decl.insert(item_id, DeclRef::Struct(sid));
        for f in fields {
            self.walk_type(&f.ty)?;
        }
        Ok(())
    }

    fn walk_enum_item(&mut self, item_id: NodeId, name: crate::symbol::Symbol, variants: &[crate::symbol::Symbol]) -> Result<()> {
        let mut seen = hashbrown::HashSet::new();
        for v in variants {
            if !seen.insert(*v) {
                return Err(CompileError::semantic(format!("duplicate variant `{v}` in enum `{name}`")));
            }
        }
        let eid = self.prog.enums.push(EnumDecl { name, variants: variants.to_vec() });
        self.declare_type(name, TypeNsEntry::Enum(eid))?;
        self.prog.item_decl.insert(item_id, DeclRef::Enum(eid));
        Ok(())
    }

    fn walk_impl_item(&mut self, item_id: NodeId, struct_name: crate::symbol::Symbol, items: &[Item]) -> Result<()> {
        let impl_scope = self.prog.scopes.push_child(self.scope, ScopeKind::Impl);
        self.prog.scopes.get_mut(impl_scope).impl_struct = Some(struct_name);
        self.prog.node_scope.insert(item_id, impl_scope);
        self.in_scope(impl_scope, |p| {
            for inner in items {
                p.walk_item(inner)?;
            }
            Ok(())
        })
    }

    fn walk_const_item(&mut self, item_id: NodeId, name: crate::symbol::Symbol, ty: &Type, value: &Expr) -> Result<()> {
        let cid = self.prog.consts.push(ConstDecl { name, ast: item_id, ty: RealType::unit() });
        self.declare_value(name, ValueNsEntry::Const(cid))?;
        self.prog.item_decl.insert(item_id, DeclRef::Const(cid));
        self.prog.const_item.insert(cid, item_id);
        self.walk_type(ty)?;
        self.walk_expr(value)
    }

    /// A function body block reuses the function's own scope (SPEC_FULL.md
    /// §4.1.1: "its body block reuses that scope").
    fn walk_block_same_scope(&mut self, block: &Block) -> Result<()> {
        self.note_scope(block.id);
        for stmt in &block.statements {
            self.walk_stmt(stmt)?;
        }
        if let Some(tail) = &block.tail {
            self.walk_stmt(tail)?;
        }
        Ok(())
    }

    /// Any other block introduces its own `Block` scope.
    fn walk_block_new_scope(&mut self, block: &Block) -> Result<()> {
        let scope = self.prog.scopes.push_child(self.scope, ScopeKind::Block);
        self.prog.node_scope.insert(block.id, scope);
        self.in_scope(scope, |p| {
            for stmt in &block.statements {
                p.walk_stmt(stmt)?;
            }
            if let Some(tail) = &block.tail {
                p.walk_stmt(tail)?;
            }
            Ok(())
        })
    }

    fn walk_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        self.note_scope(stmt.id);
        match &stmt.kind {
            StmtKind::Let { pattern, ty, init } => {
                self.walk_pattern(pattern)?;
                if let Some(ty) = ty {
                    self.walk_type(ty)?;
                }
                if let Some(init) = init {
                    self.walk_expr(init)?;
                }
                Ok(())
            }
            StmtKind::Expr { expr, .. } => self.walk_expr(expr),
            StmtKind::Item(item) => self.walk_item(item),
        }
    }

    fn walk_pattern(&mut self, pattern: &Pattern) -> Result<()> {
        self.note_scope(pattern.id);
        Ok(())
    }

    fn walk_type(&mut self, ty: &Type) -> Result<()> {
        self.note_scope(ty.id);
        match &ty.kind {
            TypeKind::Array { elem, size, .. } => {
                self.walk_type(elem)?;
                self.walk_expr(size)
            }
            TypeKind::Path { .. } | TypeKind::Unit | TypeKind::SelfType => Ok(()),
        }
    }

    fn walk_expr(&mut self, expr: &Expr) -> Result<()> {
        self.note_scope(expr.id);
        match &expr.kind {
            ExprKind::Literal(..) | ExprKind::Identifier(_) | ExprKind::SelfExpr | ExprKind::Unit | ExprKind::Continue(None) => Ok(()),
            ExprKind::Binary(_, l, r) => {
                self.walk_expr(l)?;
                self.walk_expr(r)
            }
            ExprKind::Unary(_, e) => self.walk_expr(e),
            ExprKind::Call(callee, args) => {
                self.walk_expr(callee)?;
                for a in args {
                    self.walk_expr(a)?;
                }
                Ok(())
            }
            ExprKind::Field(base, _) => self.walk_expr(base),
            ExprKind::Struct(_, fields) => {
                for (_, v) in fields {
                    self.walk_expr(v)?;
                }
                Ok(())
            }
            ExprKind::Index(base, idx) => {
                self.walk_expr(base)?;
                self.walk_expr(idx)
            }
            ExprKind::Block(block) => self.walk_block_new_scope(block),
            ExprKind::If(cond, then_b, else_b) => {
                self.walk_expr(cond)?;
                self.walk_block_new_scope(then_b)?;
                if let Some(else_b) = else_b {
                    self.walk_block_new_scope(else_b)?;
                }
                Ok(())
            }
            ExprKind::While(cond, body) => {
                self.walk_expr(cond)?;
                self.walk_block_new_scope(body)
            }
            ExprKind::Loop(body) => self.walk_block_new_scope(body),
            ExprKind::Return(v) | ExprKind::Break(v) => {
                if let Some(v) = v {
                    self.walk_expr(v)?;
                }
                Ok(())
            }
            ExprKind::Continue(Some(v)) => self.walk_expr(v),
            ExprKind::Cast(e, ty) => {
                self.walk_expr(e)?;
                self.walk_type(ty)
            }
            ExprKind::Path(ty, _) => self.walk_type(ty),
            ExprKind::Array(elems) => {
                for e in elems {
                    self.walk_expr(e)?;
                }
                Ok(())
            }
            ExprKind::RepeatArray(elem, size) => {
                self.walk_expr(elem)?;
                self.walk_expr(size)
            }
        }
    }
}
