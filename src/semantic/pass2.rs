//! Pass 2 (SPEC_FULL.md §4.1.2): resolves every surface `Type` to a `RealType`,
//! resolves each `impl` block's `Self`, binds struct fields, attaches methods /
//! associated functions / associated consts to their struct, and locates `main`.
//!
//! Array-type resolution folds its size expression immediately via
//! [`super::constfold`] rather than queuing it for a later pass: the evaluator is
//! already memoized and lookup-order-independent (SPEC_FULL.md §9 "AnyInt" note),
//! so there is nothing a deferred worklist would buy that inline evaluation
//! doesn't already give for free. This also directly fills `array_sizes`
//! (`const_expr_to_size`), so property T4 holds the moment pass 2 finishes.

use crate::error::{CompileError, Result};
use crate::types::ast::*;
use crate::types::realty::{self, RealType};
use crate::types::scope::{ScopeKind, TypeNsEntry};
use crate::types::ScopeId;

use super::{constfold, DeclRef, Program};

pub fn resolve_types(items: &[Item], prog: &mut Program) -> Result<()> {
    let root = prog.scopes.root;
    for item in items {
        walk_item(items, prog, root, item)?;
    }
    if prog.main_fn.is_none() {
        return Err(CompileError::semantic("no `main` function found".to_string()));
    }
    Ok(())
}

/// Resolves a surface `Type` node to a `RealType`, memoizing into
/// `Program::node_types`. Shared with pass 4 for `let` type annotations.
pub(super) fn resolve_type(items: &[Item], prog: &mut Program, scope: ScopeId, ty: &Type) -> Result<RealType> {
    let rt = match &ty.kind {
        TypeKind::Path { name, reference } => RealType::new(resolve_path_kind(prog, scope, *name)?, *reference),
        TypeKind::Array { elem, size, reference } => {
            let elem_rt = resolve_type(items, prog, scope, elem)?;
            let size_val = constfold::eval_const_expr(items, prog, scope, size)?;
            let n = size_val.narrow_to_usize()?;
            prog.array_sizes.insert(size.id, n);
            RealType::new(realty::TypeKind::Array(Box::new(elem_rt), n), *reference)
        }
        TypeKind::Unit => RealType::unit(),
        TypeKind::SelfType => {
            let impl_scope = prog
                .scopes
                .enclosing_impl(scope)
                .ok_or_else(|| CompileError::semantic("`Self` used outside an `impl` block".to_string()))?;
            prog.scopes
                .get(impl_scope)
                .self_type
                .clone()
                .ok_or_else(|| CompileError::internal("impl `Self` type not yet resolved"))?
        }
    };
    prog.node_types.insert(ty.id, rt.clone());
    Ok(rt)
}

fn resolve_path_kind(prog: &Program, scope: ScopeId, name: crate::symbol::Symbol) -> Result<realty::TypeKind> {
    if let Some(entry) = prog.scopes.lookup_type(scope, name) {
        return Ok(match entry {
            TypeNsEntry::Struct(sid) => realty::TypeKind::Struct(name, sid),
            TypeNsEntry::Enum(eid) => realty::TypeKind::Enum(name, eid),
        });
    }
    Ok(match name.as_str() {
        "i32" => realty::TypeKind::I32,
        "u32" => realty::TypeKind::U32,
        "isize" => realty::TypeKind::Isize,
        "usize" => realty::TypeKind::Usize,
        "bool" => realty::TypeKind::Bool,
        "char" => realty::TypeKind::Char,
        "str" => realty::TypeKind::Str,
        "String" => realty::TypeKind::String,
        _ => return Err(CompileError::semantic(format!("unknown type `{name}`"))),
    })
}

fn walk_item(items: &[Item], prog: &mut Program, scope: ScopeId, item: &Item) -> Result<()> {
    match &item.kind {
        ItemKind::Fn(sig) => walk_fn(items, prog, scope, item.id, sig),
        ItemKind::Struct { fields, .. } => walk_struct(items, prog, scope, item.id, fields),
        ItemKind::Enum { .. } => Ok(()),
        ItemKind::Impl { struct_name, items: inner } => walk_impl(items, prog, scope, item.id, *struct_name, inner),
        ItemKind::Const { name, ty, value } => walk_const(items, prog, scope, item.id, *name, ty, value),
    }
}

fn walk_fn(items: &[Item], prog: &mut Program, scope: ScopeId, item_id: NodeId, sig: &FnSig) -> Result<()> {
    let fid = match prog.item_decl[&item_id] {
        DeclRef::Fn(f) => f,
        _ => return Err(CompileError::internal("fn item did not register a FnDecl")),
    };

    let mut params = Vec::with_capacity(sig.params.len());
    for p in &sig.params {
        let rt = resolve_type(items, prog, scope, &p.ty)?;
        let PatternKind::Identifier { name, mutable, .. } = &p.pattern.kind;
        params.push((*name, rt, *mutable));
    }
    let return_type = match &sig.return_type {
        Some(t) => resolve_type(items, prog, scope, t)?,
        None => RealType::unit(),
    };
    prog.fns[fid].params = params;
    prog.fns[fid].return_type = return_type;

    let in_impl = prog.scopes.get(scope).kind == ScopeKind::Impl;
    if in_impl {
        let struct_id = match &prog.scopes.get(scope).self_type {
            Some(rt) => match &rt.kind {
                realty::TypeKind::Struct(_, sid) => *sid,
                _ => return Err(CompileError::semantic("`impl` target is not a struct".to_string())),
            },
            None => return Err(CompileError::internal("impl scope missing resolved Self")),
        };
        prog.fns[fid].self_struct = Some(struct_id);
        if sig.receiver == ReceiverKind::None {
            prog.structs[struct_id].associated_func.insert(sig.name, fid);
        } else {
            prog.structs[struct_id].methods.insert(sig.name, fid);
        }
    } else if sig.receiver != ReceiverKind::None {
        return Err(CompileError::semantic(format!("`fn {}` takes a receiver outside an `impl` block", sig.name)));
    }

    if sig.name.as_str() == "main" && prog.scopes.get(scope).kind == ScopeKind::Root {
        if prog.main_fn.is_some() {
            return Err(CompileError::semantic("multiple `main` functions".to_string()));
        }
        if sig.receiver != ReceiverKind::None {
            return Err(CompileError::semantic("`main` cannot take a receiver".to_string()));
        }
        prog.main_fn = Some(fid);
        prog.fns[fid].is_main = true;
    }

    let fn_scope = *prog
        .node_scope
        .get(&item_id)
        .ok_or_else(|| CompileError::internal("fn item missing its function scope"))?;
    walk_stmts(items, prog, fn_scope, &sig.body)
}

fn walk_struct(items: &[Item], prog: &mut Program, scope: ScopeId, item_id: NodeId, fields: &[StructField]) -> Result<()> {
    let sid = match prog.item_decl[&item_id] {
        DeclRef::Struct(s) => s,
        _ => return Err(CompileError::internal("struct item did not register a StructDecl")),
    };
    for f in fields {
        let rt = resolve_type(items, prog, scope, &f.ty)?;
        if prog.structs[sid].fields.contains_key(&f.name) {
            return Err(CompileError::semantic(format!("duplicate field `{}`", f.name)));
        }
        prog.structs[sid].field_order.push(f.name);
        prog.structs[sid].fields.insert(f.name, rt);
    }
    Ok(())
}

fn walk_impl(
    items: &[Item],
    prog: &mut Program,
    scope: ScopeId,
    item_id: NodeId,
    struct_name: crate::symbol::Symbol,
    inner: &[Item],
) -> Result<()> {
    let impl_scope = *prog
        .node_scope
        .get(&item_id)
        .ok_or_else(|| CompileError::internal("impl item missing its scope"))?;
    let entry = prog
        .scopes
        .lookup_type(scope, struct_name)
        .ok_or_else(|| CompileError::semantic(format!("undefined type `{struct_name}`")))?;
    let sid = match entry {
        TypeNsEntry::Struct(sid) => sid,
        TypeNsEntry::Enum(_) => return Err(CompileError::semantic("`impl` target must be a struct".to_string())),
    };
    prog.scopes.get_mut(impl_scope).self_type = Some(RealType::value(realty::TypeKind::Struct(struct_name, sid)));
    for it in inner {
        walk_item(items, prog, impl_scope, it)?;
    }
    Ok(())
}

fn walk_const(
    items: &[Item],
    prog: &mut Program,
    scope: ScopeId,
    item_id: NodeId,
    name: crate::symbol::Symbol,
    ty: &Type,
    value: &Expr,
) -> Result<()> {
    let cid = match prog.item_decl[&item_id] {
        DeclRef::Const(c) => c,
        _ => return Err(CompileError::internal("const item did not register a ConstDecl")),
    };
    let rt = resolve_type(items, prog, scope, ty)?;
    prog.consts[cid].ty = rt;

    if prog.scopes.get(scope).kind == ScopeKind::Impl {
        let struct_id = match &prog.scopes.get(scope).self_type {
            Some(rt) => match &rt.kind {
                realty::TypeKind::Struct(_, sid) => *sid,
                _ => return Err(CompileError::semantic("`impl` target is not a struct".to_string())),
            },
            None => return Err(CompileError::internal("impl scope missing resolved Self")),
        };
        prog.structs[struct_id].associated_const.insert(name, cid);
    }

    walk_expr_for_items(items, prog, scope, value)
}

/// Finds `Item` statements nested anywhere inside a function body / block so
/// their types get resolved, without otherwise touching expression typing (pass
/// 4's job).
fn walk_stmts(items: &[Item], prog: &mut Program, scope: ScopeId, block: &Block) -> Result<()> {
    for stmt in block.statements.iter().chain(block.tail.iter()) {
        match &stmt.kind {
            StmtKind::Item(item) => walk_item(items, prog, scope, item)?,
            StmtKind::Let { init, .. } => {
                if let Some(e) = init {
                    walk_expr_for_items(items, prog, scope, e)?;
                }
            }
            StmtKind::Expr { expr, .. } => walk_expr_for_items(items, prog, scope, expr)?,
        }
    }
    Ok(())
}

fn walk_block_new(items: &[Item], prog: &mut Program, block: &Block) -> Result<()> {
    let inner = *prog
        .node_scope
        .get(&block.id)
        .ok_or_else(|| CompileError::internal("block missing its scope"))?;
    walk_stmts(items, prog, inner, block)
}

fn walk_expr_for_items(items: &[Item], prog: &mut Program, scope: ScopeId, expr: &Expr) -> Result<()> {
    match &expr.kind {
        ExprKind::Block(b) => walk_block_new(items, prog, b),
        ExprKind::If(cond, then_b, else_b) => {
            walk_expr_for_items(items, prog, scope, cond)?;
            walk_block_new(items, prog, then_b)?;
            if let Some(else_b) = else_b {
                walk_block_new(items, prog, else_b)?;
            }
            Ok(())
        }
        ExprKind::While(cond, body) => {
            walk_expr_for_items(items, prog, scope, cond)?;
            walk_block_new(items, prog, body)
        }
        ExprKind::Loop(body) => walk_block_new(items, prog, body),
        ExprKind::Binary(_, l, r) => {
            walk_expr_for_items(items, prog, scope, l)?;
            walk_expr_for_items(items, prog, scope, r)
        }
        ExprKind::Unary(_, e) => walk_expr_for_items(items, prog, scope, e),
        ExprKind::Call(callee, args) => {
            walk_expr_for_items(items, prog, scope, callee)?;
            for a in args {
                walk_expr_for_items(items, prog, scope, a)?;
            }
            Ok(())
        }
        ExprKind::Field(base, _) => walk_expr_for_items(items, prog, scope, base),
        ExprKind::Struct(_, fields) => {
            for (_, v) in fields {
                walk_expr_for_items(items, prog, scope, v)?;
            }
            Ok(())
        }
        ExprKind::Index(base, idx) => {
            walk_expr_for_items(items, prog, scope, base)?;
            walk_expr_for_items(items, prog, scope, idx)
        }
        ExprKind::Return(v) | ExprKind::Break(v) | ExprKind::Continue(v) => {
            if let Some(v) = v {
                walk_expr_for_items(items, prog, scope, v)?;
            }
            Ok(())
        }
        ExprKind::Cast(e, _) => walk_expr_for_items(items, prog, scope, e),
        ExprKind::Array(elems) => {
            for e in elems {
                walk_expr_for_items(items, prog, scope, e)?;
            }
            Ok(())
        }
        ExprKind::RepeatArray(elem, size) => {
            walk_expr_for_items(items, prog, scope, elem)?;
            walk_expr_for_items(items, prog, scope, size)
        }
        ExprKind::Literal(..)
        | ExprKind::Identifier(_)
        | ExprKind::SelfExpr
        | ExprKind::Unit
        | ExprKind::Path(..) => Ok(()),
    }
}
