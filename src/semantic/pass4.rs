//! Pass 4 (SPEC_FULL.md §4.1.4): expression typing and `let` introduction.
//!
//! A context-carrying walker: a stack of enclosing-loop result types (`loop`
//! starts `Never`, `while` starts `Unit`; `break`-with-value merges into the
//! top), the `FnId` currently being typed, and its declared return type.
//!
//! The surface grammar already disambiguates a call's callee by AST shape
//! (`Call(Identifier, _)` is a free-function call, `Call(Field(base, name),
//! _)` a method call, `Call(Path(ty, name), _)` an associated-function call),
//! so call resolution is handled directly in `type_call` rather than by
//! threading a `require_function` flag through a generic callee-typing step.

use hashbrown::HashMap;

use crate::error::{CompileError, Result};
use crate::symbol::Symbol;
use crate::types::ast::*;
use crate::types::decl::LetDecl;
use crate::types::outcome::OutcomeState;
use crate::types::realty::{self, PlaceKind, RealType, TypeKind};
use crate::types::scope::{TypeNsEntry, ValueNsEntry};
use crate::types::{FnId, ScopeId};

use super::{builtins, constfold, pass2, DeclRef, PathResolution, Program};

pub fn type_program(items: &[Item], prog: &mut Program) -> Result<()> {
    let root = prog.scopes.root;
    let mut p = Pass4 {
        items,
        prog,
        scope: root,
        current_fn: None,
        current_return_type: RealType::unit(),
        loop_stack: Vec::new(),
    };
    for item in items {
        p.walk_top_item(item)?;
    }
    Ok(())
}

struct Pass4<'p> {
    items: &'p [Item],
    prog: &'p mut Program,
    scope: ScopeId,
    current_fn: Option<FnId>,
    current_return_type: RealType,
    loop_stack: Vec<RealType>,
}

impl<'p> Pass4<'p> {
    fn record(&mut self, id: NodeId, ty: RealType, place: PlaceKind) -> RealType {
        self.prog.node_types.insert(id, ty.clone());
        self.prog.node_places.insert(id, place);
        ty
    }

    fn place_of(&self, id: NodeId) -> PlaceKind {
        *self.prog.node_places.get(&id).unwrap_or(&PlaceKind::NotPlace)
    }

    fn walk_top_item(&mut self, item: &Item) -> Result<()> {
        match &item.kind {
            ItemKind::Fn(sig) => self.type_fn(item.id, sig),
            ItemKind::Impl { items, .. } => {
                for inner in items {
                    self.walk_top_item(inner)?;
                }
                Ok(())
            }
            ItemKind::Struct { .. } | ItemKind::Enum { .. } | ItemKind::Const { .. } => Ok(()),
        }
    }

    fn type_fn(&mut self, item_id: NodeId, sig: &FnSig) -> Result<()> {
        let fid = match self.prog.item_decl[&item_id] {
            DeclRef::Fn(f) => f,
            _ => return Err(CompileError::internal("fn item did not register a FnDecl")),
        };
        let fn_scope = *self
            .prog
            .node_scope
            .get(&item_id)
            .ok_or_else(|| CompileError::internal("fn item missing its function scope"))?;

        let params = self.prog.fns[fid].params.clone();
        let mut param_lets = Vec::with_capacity(params.len());
        for (name, ty, mutable) in &params {
            let let_id = self.prog.lets.push(LetDecl { name: *name, ty: ty.clone(), mutable: *mutable });
            self.prog.scope_locals.entry(fn_scope).or_insert_with(HashMap::new).insert(*name, let_id);
            param_lets.push(let_id);
        }
        self.prog.fns[fid].param_let_decls = param_lets;

        let saved_fn = self.current_fn.replace(fid);
        let saved_ret = std::mem::replace(&mut self.current_return_type, self.prog.fns[fid].return_type.clone());
        let saved_loop = std::mem::take(&mut self.loop_stack);

        let body_result = self.type_block(&sig.body);

        self.current_fn = saved_fn;
        self.current_return_type = saved_ret;
        self.loop_stack = saved_loop;

        let body_ty = body_result?;
        let body_outcome = *self.prog.node_outcomes.get(&sig.body.id).unwrap_or(&OutcomeState::NEXT);
        if body_outcome.can_continue() {
            let declared = self.prog.fns[fid].return_type.clone();
            realty::merge(&declared, &body_ty, false)
                .map_err(|e| CompileError::semantic(format!("function `{}`: {e}", sig.name)))?;
        }

        if self.prog.fns[fid].is_main && !self.prog.scopes.get(fn_scope).has_exit {
            return Err(CompileError::semantic("`main` must call `exit` before it returns".to_string()));
        }

        Ok(())
    }

    fn type_block(&mut self, block: &Block) -> Result<RealType> {
        let block_scope = *self
            .prog
            .node_scope
            .get(&block.id)
            .ok_or_else(|| CompileError::internal("block missing its scope"))?;
        let saved = std::mem::replace(&mut self.scope, block_scope);
        let result = self.type_block_body(block);
        self.scope = saved;
        result
    }

    fn type_block_body(&mut self, block: &Block) -> Result<RealType> {
        for stmt in &block.statements {
            self.type_stmt(stmt)?;
        }
        let outcome = *self.prog.node_outcomes.get(&block.id).unwrap_or(&OutcomeState::NEXT);
        let (ty, place) = if !outcome.can_continue() {
            if let Some(tail) = &block.tail {
                self.type_stmt(tail)?;
            }
            (RealType::never(), PlaceKind::NotPlace)
        } else if let Some(tail) = &block.tail {
            self.type_stmt(tail)?;
            match &tail.kind {
                StmtKind::Expr { expr, .. } => (
                    self.prog.node_types.get(&expr.id).cloned().unwrap_or_else(RealType::unit),
                    self.place_of(expr.id),
                ),
                _ => (RealType::unit(), PlaceKind::NotPlace),
            }
        } else {
            (RealType::unit(), PlaceKind::NotPlace)
        };
        Ok(self.record(block.id, ty, place))
    }

    fn type_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match &stmt.kind {
            StmtKind::Let { pattern, ty, init } => self.type_let(pattern, ty, init),
            StmtKind::Expr { expr, .. } => {
                self.type_expr(expr)?;
                Ok(())
            }
            StmtKind::Item(item) => self.walk_top_item(item),
        }
    }

    fn type_let(&mut self, pattern: &Pattern, ty: &Option<Type>, init: &Option<Expr>) -> Result<()> {
        let declared = match ty {
            Some(t) => Some(pass2::resolve_type(self.items, self.prog, self.scope, t)?),
            None => None,
        };
        let init_ty = match init {
            Some(e) => Some(self.type_expr(e)?),
            None => None,
        };
        let PatternKind::Identifier { name, mutable, by_ref } = &pattern.kind;

        let final_ty = match by_ref {
            RefKind::None => match (&declared, &init_ty) {
                (Some(t), Some(i)) => realty::merge(t, i, false).map_err(CompileError::semantic)?,
                (Some(t), None) => t.clone(),
                (None, Some(i)) => i.clone(),
                (None, None) => {
                    return Err(CompileError::semantic(format!(
                        "cannot infer the type of `{name}`; add a type annotation or an initializer"
                    )))
                }
            },
            RefKind::Ref => {
                let i = init_ty.ok_or_else(|| CompileError::semantic("`&` pattern requires an initializer".to_string()))?;
                if i.reference == RefKind::None {
                    return Err(CompileError::semantic("`&` pattern requires a reference initializer".to_string()));
                }
                let bound = i.deref_once();
                match &declared {
                    Some(t) => realty::merge(t, &bound, false).map_err(CompileError::semantic)?,
                    None => bound,
                }
            }
            RefKind::RefMut => {
                let i = init_ty.ok_or_else(|| CompileError::semantic("`&mut` pattern requires an initializer".to_string()))?;
                if i.reference != RefKind::RefMut {
                    return Err(CompileError::semantic("`&mut` pattern requires a `&mut` initializer".to_string()));
                }
                let bound = i.deref_once();
                match &declared {
                    Some(t) => realty::merge(t, &bound, false).map_err(CompileError::semantic)?,
                    None => bound,
                }
            }
        };

        let let_id = self.prog.lets.push(LetDecl { name: *name, ty: final_ty, mutable: *mutable });
        self.prog.scope_locals.entry(self.scope).or_insert_with(HashMap::new).insert(*name, let_id);
        self.prog.node_lets.insert(pattern.id, let_id);
        Ok(())
    }

    fn type_expr(&mut self, expr: &Expr) -> Result<RealType> {
        let (ty, place) = self.type_expr_kind(expr)?;
        Ok(self.record(expr.id, ty, place))
    }

    fn type_expr_kind(&mut self, expr: &Expr) -> Result<(RealType, PlaceKind)> {
        Ok(match &expr.kind {
            ExprKind::Literal(LiteralKind::Number, text) => {
                let (value, suffix) = super::literals::parse_number(text)?;
                let ty = match suffix {
                    None => RealType::any_int(),
                    Some(TypeKind::I32) => {
                        constfold::range_check_i32(value)?;
                        RealType::value(TypeKind::I32)
                    }
                    Some(TypeKind::Isize) => {
                        constfold::range_check_i32(value)?;
                        RealType::value(TypeKind::Isize)
                    }
                    Some(TypeKind::U32) => {
                        constfold::range_check_u32(value)?;
                        RealType::value(TypeKind::U32)
                    }
                    Some(TypeKind::Usize) => {
                        constfold::range_check_u32(value)?;
                        RealType::value(TypeKind::Usize)
                    }
                    Some(_) => return Err(CompileError::internal("literal suffix parsed to a non-integer type")),
                };
                (ty, PlaceKind::NotPlace)
            }
            ExprKind::Literal(LiteralKind::Bool, _) => (RealType::bool_(), PlaceKind::NotPlace),
            ExprKind::Literal(LiteralKind::Char, _) => (RealType::value(TypeKind::Char), PlaceKind::NotPlace),
            ExprKind::Literal(LiteralKind::Str, _) => (RealType::new(TypeKind::Str, RefKind::Ref), PlaceKind::NotPlace),

            ExprKind::Identifier(name) => {
                if let Some(let_id) = self.prog.lookup_local(self.scope, *name) {
                    self.prog.node_lets.insert(expr.id, let_id);
                    let decl = &self.prog.lets[let_id];
                    (decl.ty.clone(), PlaceKind::from_mutable(decl.mutable))
                } else {
                    match self.prog.scopes.lookup_value(self.scope, *name) {
                        Some(ValueNsEntry::Const(cid)) => (self.prog.consts[cid].ty.clone(), PlaceKind::NotPlace),
                        Some(ValueNsEntry::Fn(_)) => {
                            return Err(CompileError::semantic(format!("`{name}` is a function; call it with `(...)`")))
                        }
                        None => return Err(CompileError::semantic(format!("undefined identifier `{name}`"))),
                    }
                }
            }

            ExprKind::Binary(op, l, r) => self.type_binary(*op, l, r)?,

            ExprKind::Unary(op, e) => self.type_unary(*op, e)?,

            ExprKind::Call(callee, args) => (self.type_call(expr.id, callee, args)?, PlaceKind::NotPlace),

            ExprKind::Field(base, name) => {
                let base_ty = self.type_expr(base)?;
                match &base_ty.kind {
                    TypeKind::Struct(_, sid) => {
                        let field_ty = self.prog.structs[*sid]
                            .field_type(*name)
                            .cloned()
                            .ok_or_else(|| CompileError::semantic(format!("no field `{name}` on this struct")))?;
                        let place = PlaceKind::auto_deref(base_ty.reference, self.place_of(base.id));
                        (field_ty, place)
                    }
                    _ => return Err(CompileError::semantic(format!("no field `{name}` on this type"))),
                }
            }

            ExprKind::Struct(name, fields) => {
                let sid = match self.prog.scopes.lookup_type(self.scope, *name) {
                    Some(TypeNsEntry::Struct(sid)) => sid,
                    Some(TypeNsEntry::Enum(_)) => {
                        return Err(CompileError::semantic(format!("`{name}` is an enum, not a struct")))
                    }
                    None => return Err(CompileError::semantic(format!("undefined struct `{name}`"))),
                };
                let field_count = self.prog.structs[sid].field_order.len();
                if fields.len() != field_count {
                    return Err(CompileError::semantic(format!(
                        "struct literal for `{name}` has {} field(s), expected {field_count}",
                        fields.len()
                    )));
                }
                let mut seen: hashbrown::HashSet<Symbol> = hashbrown::HashSet::new();
                for (fname, fexpr) in fields {
                    if !seen.insert(*fname) {
                        return Err(CompileError::semantic(format!("duplicate field `{fname}` in struct literal")));
                    }
                    let expected = self.prog.structs[sid]
                        .field_type(*fname)
                        .cloned()
                        .ok_or_else(|| CompileError::semantic(format!("`{name}` has no field `{fname}`")))?;
                    let actual = self.type_expr(fexpr)?;
                    realty::merge(&expected, &actual, false)
                        .map_err(|e| CompileError::semantic(format!("field `{fname}`: {e}")))?;
                }
                (RealType::value(TypeKind::Struct(*name, sid)), PlaceKind::NotPlace)
            }

            ExprKind::Index(base, idx) => {
                let base_ty = self.type_expr(base)?;
                let idx_ty = self.type_expr(idx)?;
                if !(idx_ty.kind == TypeKind::Usize || idx_ty.is_any_int()) {
                    return Err(CompileError::semantic("array index must be `usize`".to_string()));
                }
                match &base_ty.kind {
                    TypeKind::Array(elem, _) => {
                        let place = PlaceKind::auto_deref(base_ty.reference, self.place_of(base.id));
                        ((**elem).clone(), place)
                    }
                    _ => return Err(CompileError::semantic("cannot index a non-array value".to_string())),
                }
            }

            ExprKind::Block(block) => {
                let ty = self.type_block(block)?;
                let place = self.place_of(block.id);
                (ty, place)
            }

            ExprKind::If(cond, then_b, else_b) => {
                let cond_ty = self.type_expr(cond)?;
                if cond_ty.kind != TypeKind::Bool || cond_ty.reference != RefKind::None {
                    return Err(CompileError::semantic("`if` condition must be `bool`".to_string()));
                }
                let then_ty = self.type_block(then_b)?;
                let merged = match else_b {
                    Some(b) => {
                        let else_ty = self.type_block(b)?;
                        realty::merge(&then_ty, &else_ty, false).map_err(CompileError::semantic)?
                    }
                    None => realty::merge(&then_ty, &RealType::unit(), false).map_err(CompileError::semantic)?,
                };
                (merged, PlaceKind::NotPlace)
            }

            ExprKind::While(cond, body) => {
                let cond_ty = self.type_expr(cond)?;
                if cond_ty.kind != TypeKind::Bool || cond_ty.reference != RefKind::None {
                    return Err(CompileError::semantic("`while` condition must be `bool`".to_string()));
                }
                self.loop_stack.push(RealType::unit());
                let body_result = self.type_block(body);
                let top = self.loop_stack.pop().expect("loop_stack balanced with push");
                body_result?;
                (top, PlaceKind::NotPlace)
            }

            ExprKind::Loop(body) => {
                self.loop_stack.push(RealType::never());
                let body_result = self.type_block(body);
                let top = self.loop_stack.pop().expect("loop_stack balanced with push");
                body_result?;
                (top, PlaceKind::NotPlace)
            }

            ExprKind::Return(v) => {
                let inner = match v {
                    Some(e) => self.type_expr(e)?,
                    None => RealType::unit(),
                };
                realty::merge(&self.current_return_type, &inner, false)
                    .map_err(|e| CompileError::semantic(format!("`return`: {e}")))?;
                (RealType::never(), PlaceKind::NotPlace)
            }

            ExprKind::Break(v) => {
                let inner = match v {
                    Some(e) => self.type_expr(e)?,
                    None => RealType::unit(),
                };
                match self.loop_stack.last_mut() {
                    Some(top) => {
                        let merged = realty::merge(top, &inner, false).map_err(CompileError::semantic)?;
                        *top = merged;
                    }
                    None => return Err(CompileError::semantic("`break` outside of a loop".to_string())),
                }
                (RealType::never(), PlaceKind::NotPlace)
            }

            ExprKind::Continue(v) => {
                if let Some(e) = v {
                    self.type_expr(e)?;
                }
                if self.loop_stack.is_empty() {
                    return Err(CompileError::semantic("`continue` outside of a loop".to_string()));
                }
                (RealType::never(), PlaceKind::NotPlace)
            }

            ExprKind::Cast(e, ty) => {
                let from = self.type_expr(e)?;
                let to = pass2::resolve_type(self.items, self.prog, self.scope, ty)?;
                if !realty::cast_is_legal(&from, &to) {
                    return Err(CompileError::semantic("illegal cast between these types".to_string()));
                }
                (to, PlaceKind::NotPlace)
            }

            ExprKind::Path(ty, member) => self.type_path_value(expr.id, ty, *member)?,

            ExprKind::SelfExpr => {
                let fid = self
                    .current_fn
                    .ok_or_else(|| CompileError::semantic("`self` used outside a method".to_string()))?;
                let decl = &self.prog.fns[fid];
                if decl.receiver == ReceiverKind::None {
                    return Err(CompileError::semantic("`self` used in a function with no receiver".to_string()));
                }
                let sid = decl
                    .self_struct
                    .ok_or_else(|| CompileError::internal("method missing its owning struct"))?;
                let struct_name = self.prog.structs[sid].name;
                let base = RealType::value(TypeKind::Struct(struct_name, sid));
                match decl.receiver {
                    ReceiverKind::ByValue => (base, PlaceKind::ReadWritePlace),
                    ReceiverKind::Ref => (base.with_reference(RefKind::Ref), PlaceKind::ReadOnlyPlace),
                    ReceiverKind::RefMut => (base.with_reference(RefKind::RefMut), PlaceKind::ReadWritePlace),
                    ReceiverKind::None => unreachable!(),
                }
            }

            ExprKind::Unit => (RealType::unit(), PlaceKind::NotPlace),

            ExprKind::Array(elems) => {
                let mut elem_ty: Option<RealType> = None;
                for e in elems {
                    let t = self.type_expr(e)?;
                    elem_ty = Some(match elem_ty {
                        Some(prev) => realty::merge(&prev, &t, false).map_err(CompileError::semantic)?,
                        None => t,
                    });
                }
                let n = elems.len() as u32;
                let ty = RealType::value(TypeKind::Array(Box::new(elem_ty.unwrap_or_else(RealType::never)), n));
                (ty, PlaceKind::NotPlace)
            }

            ExprKind::RepeatArray(elem, size) => {
                let elem_ty = self.type_expr(elem)?;
                let n = if let Some(n) = self.prog.array_sizes.get(&size.id) {
                    *n
                } else {
                    let val = constfold::eval_const_expr(self.items, self.prog, self.scope, size)?;
                    let n = val.narrow_to_usize()?;
                    self.prog.array_sizes.insert(size.id, n);
                    n
                };
                let ty = RealType::value(TypeKind::Array(Box::new(elem_ty), n));
                (ty, PlaceKind::NotPlace)
            }
        })
    }

    fn type_binary(&mut self, op: BinaryOp, l: &Expr, r: &Expr) -> Result<(RealType, PlaceKind)> {
        if op.is_assignment() {
            let l_ty = self.type_expr(l)?;
            if !self.place_of(l.id).is_writable() {
                return Err(CompileError::semantic("left-hand side of assignment is not a mutable place".to_string()));
            }
            let r_ty = self.type_expr(r)?;
            if let Some(inner) = op.compound_op() {
                self.check_binary_legal(inner, &l_ty, &r_ty)?;
            } else {
                realty::merge(&l_ty, &r_ty, true).map_err(CompileError::semantic)?;
            }
            Ok((RealType::unit(), PlaceKind::NotPlace))
        } else if op.is_logical() {
            let l_ty = self.type_expr(l)?;
            let r_ty = self.type_expr(r)?;
            if l_ty.kind != TypeKind::Bool || r_ty.kind != TypeKind::Bool || l_ty.is_referenced() || r_ty.is_referenced() {
                return Err(CompileError::semantic("`&&`/`||` require `bool` operands".to_string()));
            }
            Ok((RealType::bool_(), PlaceKind::NotPlace))
        } else if op.is_comparison() {
            let l_ty = self.type_expr(l)?;
            let r_ty = self.type_expr(r)?;
            if l_ty.is_referenced() || r_ty.is_referenced() {
                return Err(CompileError::semantic(
                    "comparison operators do not accept reference operands directly".to_string(),
                ));
            }
            realty::merge(&l_ty, &r_ty, false).map_err(CompileError::semantic)?;
            Ok((RealType::bool_(), PlaceKind::NotPlace))
        } else {
            let l_ty = self.type_expr(l)?;
            let r_ty = self.type_expr(r)?;
            let result = self.check_binary_legal(op, &l_ty, &r_ty)?;
            Ok((result, PlaceKind::NotPlace))
        }
    }

    fn check_binary_legal(&self, op: BinaryOp, l: &RealType, r: &RealType) -> Result<RealType> {
        if l.is_referenced() || r.is_referenced() {
            return Err(CompileError::semantic("this operator does not accept reference operands directly".to_string()));
        }
        match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
                if !l.is_numeric() || !r.is_numeric() {
                    return Err(CompileError::semantic("arithmetic requires numeric operands".to_string()));
                }
                realty::merge(l, r, false).map_err(CompileError::semantic)
            }
            BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => {
                if l.kind == TypeKind::Bool && r.kind == TypeKind::Bool {
                    return Ok(RealType::bool_());
                }
                if !l.is_numeric() || !r.is_numeric() {
                    return Err(CompileError::semantic("bitwise operators require numeric or `bool` operands".to_string()));
                }
                realty::merge(l, r, false).map_err(CompileError::semantic)
            }
            BinaryOp::Shl | BinaryOp::Shr => {
                if !l.is_numeric() || !r.is_numeric() {
                    return Err(CompileError::semantic("shift requires numeric operands".to_string()));
                }
                Ok(l.clone())
            }
            _ => Err(CompileError::internal("operator is not a value-producing binary operator")),
        }
    }

    fn type_unary(&mut self, op: UnaryOp, e: &Expr) -> Result<(RealType, PlaceKind)> {
        Ok(match op {
            UnaryOp::Neg => {
                let t = self.type_expr(e)?;
                if t.is_referenced() || !t.is_numeric() {
                    return Err(CompileError::semantic("`-` requires a numeric, non-reference operand".to_string()));
                }
                (t, PlaceKind::NotPlace)
            }
            UnaryOp::Not => {
                let t = self.type_expr(e)?;
                if t.is_referenced() {
                    return Err(CompileError::semantic("`!` does not accept a reference operand".to_string()));
                }
                if t.kind == TypeKind::Bool || t.is_numeric() {
                    (t, PlaceKind::NotPlace)
                } else {
                    return Err(CompileError::semantic("`!` requires a numeric or `bool` operand".to_string()));
                }
            }
            UnaryOp::Ref => {
                let t = self.type_expr(e)?;
                (t.with_reference(RefKind::Ref), PlaceKind::NotPlace)
            }
            UnaryOp::RefMut => {
                let t = self.type_expr(e)?;
                if !self.place_of(e.id).is_writable() {
                    return Err(CompileError::semantic("cannot take `&mut` of a read-only place".to_string()));
                }
                (t.with_reference(RefKind::RefMut), PlaceKind::NotPlace)
            }
            UnaryOp::Deref => {
                let t = self.type_expr(e)?;
                match t.reference {
                    RefKind::Ref => (t.deref_once(), PlaceKind::ReadOnlyPlace),
                    RefKind::RefMut => (t.deref_once(), PlaceKind::ReadWritePlace),
                    RefKind::None => return Err(CompileError::semantic("cannot dereference a non-reference value".to_string())),
                }
            }
        })
    }

    fn lookup_method(&self, kind: &TypeKind, name: Symbol) -> Option<FnId> {
        match kind {
            TypeKind::Struct(_, sid) => self.prog.structs[*sid].methods.get(&name).copied(),
            other => builtins::receiver_of(other).and_then(|recv| self.prog.builtin_methods.get(&(recv, name)).copied()),
        }
    }

    fn lookup_assoc_fn_base(&self, ty: &Type) -> Result<(Symbol, Option<crate::types::StructId>)> {
        match &ty.kind {
            TypeKind::Path { name, .. } => match self.prog.scopes.lookup_type(self.scope, *name) {
                Some(TypeNsEntry::Struct(sid)) => Ok((*name, Some(sid))),
                Some(TypeNsEntry::Enum(_)) => {
                    Err(CompileError::semantic(format!("`{name}` is an enum; it has no associated functions")))
                }
                None => Ok((*name, None)),
            },
            TypeKind::SelfType => {
                let impl_scope = self
                    .prog
                    .scopes
                    .enclosing_impl(self.scope)
                    .ok_or_else(|| CompileError::semantic("`Self` used outside an `impl` block".to_string()))?;
                match &self.prog.scopes.get(impl_scope).self_type {
                    Some(rt) => match &rt.kind {
                        realty::TypeKind::Struct(name, sid) => Ok((*name, Some(*sid))),
                        _ => Err(CompileError::semantic("`Self` does not name a struct".to_string())),
                    },
                    None => Err(CompileError::internal("impl `Self` type not resolved")),
                }
            }
            _ => Err(CompileError::semantic("invalid path expression".to_string())),
        }
    }

    fn lookup_assoc_fn(&self, ty: &Type, member: Symbol) -> Result<FnId> {
        let (base_name, struct_id) = self.lookup_assoc_fn_base(ty)?;
        if let Some(sid) = struct_id {
            if let Some(fid) = self.prog.structs[sid].associated_func.get(&member) {
                return Ok(*fid);
            }
        }
        self.prog
            .builtin_assoc_fns
            .get(&(base_name, member))
            .copied()
            .ok_or_else(|| CompileError::semantic(format!("no associated function `{base_name}::{member}`")))
    }

    fn type_path_value(&mut self, expr_id: NodeId, ty: &Type, member: Symbol) -> Result<(RealType, PlaceKind)> {
        let (base_name, struct_id) = self.lookup_assoc_fn_base(ty)?;
        if let Some(sid) = struct_id {
            if let Some(cid) = self.prog.structs[sid].associated_const.get(&member).copied() {
                self.prog.node_paths.insert(expr_id, PathResolution::AssocConst(cid));
                return Ok((self.prog.consts[cid].ty.clone(), PlaceKind::NotPlace));
            }
            return Err(CompileError::semantic(format!("no associated const `{base_name}::{member}`")));
        }
        // Not a struct: the only other path base is an enum, found directly via the
        // type namespace (builtins register no enum-like type names).
        if let TypeKind::Path { name, .. } = &ty.kind {
            if let Some(TypeNsEntry::Enum(eid)) = self.prog.scopes.lookup_type(self.scope, *name) {
                let discriminant = self.prog.enums[eid]
                    .discriminant(member)
                    .ok_or_else(|| CompileError::semantic(format!("enum `{name}` has no variant `{member}`")))?;
                self.prog.node_paths.insert(expr_id, PathResolution::EnumVariant(eid, discriminant));
                return Ok((RealType::value(TypeKind::Enum(*name, eid)), PlaceKind::NotPlace));
            }
        }
        Err(CompileError::semantic(format!("`{base_name}` has no member `{member}`")))
    }

    fn type_call(&mut self, call_id: NodeId, callee: &Expr, args: &[Expr]) -> Result<RealType> {
        let (fid, receiver) = match &callee.kind {
            ExprKind::Identifier(name) => match self.prog.scopes.lookup_value(self.scope, *name) {
                Some(ValueNsEntry::Fn(fid)) => (fid, None),
                _ => return Err(CompileError::semantic(format!("undefined function `{name}`"))),
            },
            ExprKind::Field(base, name) => {
                let base_ty = self.type_expr(base)?;
                let fid = self
                    .lookup_method(&base_ty.kind, *name)
                    .ok_or_else(|| CompileError::semantic(format!("no method `{name}` found for this type")))?;
                (fid, Some((base_ty, base.id)))
            }
            ExprKind::Path(ty, member) => (self.lookup_assoc_fn(ty, *member)?, None),
            _ => return Err(CompileError::semantic("expression is not callable".to_string())),
        };

        let decl_name = self.prog.fns[fid].name;
        let params = self.prog.fns[fid].params.clone();
        let return_type = self.prog.fns[fid].return_type.clone();
        let receiver_kind = self.prog.fns[fid].receiver;
        let is_exit = self.prog.fns[fid].is_exit;

        if is_exit {
            match self.prog.main_fn {
                Some(main_fid) if Some(main_fid) == self.current_fn => {
                    if let Some(main_scope) = self.prog.fns[main_fid].function_scope {
                        self.prog.scopes.get_mut(main_scope).has_exit = true;
                    }
                }
                _ => return Err(CompileError::semantic("`exit` may only be called from `main`".to_string())),
            }
        }

        match (&receiver, receiver_kind) {
            (Some((_, base_id)), ReceiverKind::RefMut) => {
                if !self.place_of(*base_id).is_writable() {
                    return Err(CompileError::semantic(format!(
                        "cannot call `{decl_name}` on a read-only value; it takes `&mut self`"
                    )));
                }
            }
            (Some(_), ReceiverKind::Ref | ReceiverKind::ByValue) => {}
            (Some(_), ReceiverKind::None) => {
                return Err(CompileError::internal("method dispatch resolved to a non-receiver function"))
            }
            (None, ReceiverKind::None) => {}
            (None, _) => return Err(CompileError::semantic(format!("`{decl_name}` requires a receiver"))),
        }

        if args.len() != params.len() {
            return Err(CompileError::semantic(format!(
                "`{decl_name}` expects {} argument(s), found {}",
                params.len(),
                args.len()
            )));
        }
        for (arg, (pname, pty, _)) in args.iter().zip(params.iter()) {
            let arg_ty = self.type_expr(arg)?;
            realty::merge(pty, &arg_ty, false).map_err(|e| CompileError::semantic(format!("argument `{pname}` to `{decl_name}`: {e}")))?;
        }

        self.prog.node_calls.insert(call_id, fid);
        Ok(return_type)
    }
}
