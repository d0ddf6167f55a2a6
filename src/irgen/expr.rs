//! Expression and statement lowering (SPEC_FULL.md §4.4.2): one method per
//! `ExprKind`, driven off `Program`'s side tables rather than re-deriving any of
//! pass 4's decisions. Every lowered node publishes its result into exactly one
//! of `expr_value` (an r-value) or `expr_address` (an l-value); `get_rvalue`/
//! `get_lvalue` convert between the two on demand when a consumer needs the one
//! the producer didn't publish.

use crate::error::{CompileError, Result};
use crate::semantic::PathResolution;
use crate::symbol::Symbol;
use crate::types::ast::{
    Block, BinaryOp, Expr, NodeId, ExprKind, PatternKind, ReceiverKind, RefKind, Stmt, StmtKind, Type as AstType, UnaryOp,
};
use crate::types::ir::{IcmpPredicate, IrType, IrValue};
use crate::types::outcome::OutcomeState;
use crate::types::realty::{RealType, TypeKind};
use crate::types::scope::ValueNsEntry;
use crate::types::{ConstId, FnId};

use super::context::{FunctionContext, LoopContext};
use super::IrGenerator;

impl<'p> IrGenerator<'p> {
    fn ctx(&self) -> &FunctionContext {
        self.ctx.as_ref().expect("lower_* called outside a function body")
    }

    fn ctx_mut(&mut self) -> &mut FunctionContext {
        self.ctx.as_mut().expect("lower_* called outside a function body")
    }

    /// Loads through `expr_address` on demand, caching the result; errors if
    /// neither table has an entry (a node that never got lowered).
    pub(crate) fn get_rvalue(&mut self, id: NodeId) -> Result<IrValue> {
        if let Some(v) = self.expr_value.get(&id) {
            return Ok(v.clone());
        }
        let addr = self
            .expr_address
            .get(&id)
            .cloned()
            .ok_or_else(|| CompileError::internal(format!("node {id:?} produced neither a value nor an address")))?;
        let v = self.builder.create_load(addr, None)?;
        self.expr_value.insert(id, v.clone());
        Ok(v)
    }

    /// Spills a cached r-value to a fresh entry-block alloca on demand — the
    /// generic fallback for taking the address of something that was never a
    /// place to begin with (e.g. `&5`, `&(a + b)`).
    pub(crate) fn get_lvalue(&mut self, id: NodeId) -> Result<IrValue> {
        if let Some(addr) = self.expr_address.get(&id) {
            return Ok(addr.clone());
        }
        let v = self
            .expr_value
            .get(&id)
            .cloned()
            .ok_or_else(|| CompileError::internal(format!("node {id:?} produced neither a value nor an address")))?;
        let slot = self.builder.create_entry_alloca(v.ty().clone(), None)?;
        self.builder.create_store(v, slot.clone())?;
        self.expr_address.insert(id, slot.clone());
        Ok(slot)
    }

    /// The effective address a `Field`/`Index`/method-receiver base contributes:
    /// a reference-typed base auto-derefs through its (already-loaded) pointer
    /// value, anything else is addressed directly.
    fn base_address(&mut self, base: &Expr) -> Result<IrValue> {
        if self.node_type(base.id)?.is_referenced() {
            self.get_rvalue(base.id)
        } else {
            self.get_lvalue(base.id)
        }
    }

    pub(crate) fn lower_block(&mut self, block: &Block) -> Result<Option<IrValue>> {
        for stmt in &block.statements {
            if self.builder.block_has_terminator() {
                break;
            }
            self.lower_stmt(stmt)?;
        }

        let outcome = *self.prog.node_outcomes.get(&block.id).unwrap_or(&OutcomeState::NEXT);
        if let Some(tail) = &block.tail {
            if !self.builder.block_has_terminator() {
                self.lower_stmt(tail)?;
            }
        }

        if !outcome.can_continue() || self.builder.block_has_terminator() {
            return Ok(None);
        }

        let block_ty = self.node_type(block.id)?.clone();
        if matches!(block_ty.kind, TypeKind::Unit | TypeKind::Never) {
            return Ok(None);
        }
        match &block.tail {
            Some(tail) => match &tail.kind {
                StmtKind::Expr { expr, .. } => Ok(Some(self.get_rvalue(expr.id)?)),
                _ => Ok(None),
            },
            None => Ok(None),
        }
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match &stmt.kind {
            StmtKind::Let { pattern, init, .. } => self.lower_let(pattern, init),
            StmtKind::Expr { expr, .. } => self.lower_expr(expr),
            StmtKind::Item(item) => self.lower_nested_item(item),
        }
    }

    /// A `fn`/`struct`/`enum`/`const` item declared mid-block. Struct/enum/const
    /// items need no codegen of their own (the global driver already pre-declared
    /// and, for const arrays, pre-emitted their globals); a nested `fn` gets a
    /// full body, generated with the builder's insertion point and this
    /// generator's per-function scratch state saved and restored around it so it
    /// doesn't clobber the enclosing function still being built.
    fn lower_nested_item(&mut self, item: &crate::types::ast::Item) -> Result<()> {
        if !matches!(item.kind, crate::types::ast::ItemKind::Fn(_)) {
            return self.generate_item(item);
        }

        let saved_position = self.builder.save_position();
        let saved_ctx = self.ctx.take();
        let saved_values = std::mem::take(&mut self.expr_value);
        let saved_addresses = std::mem::take(&mut self.expr_address);

        let result = self.generate_item(item);

        self.expr_address = saved_addresses;
        self.expr_value = saved_values;
        self.ctx = saved_ctx;
        self.builder.restore_position(saved_position);
        result
    }

    fn lower_let(&mut self, pattern: &crate::types::ast::Pattern, init: &Option<Expr>) -> Result<()> {
        let let_id = *self
            .prog
            .node_lets
            .get(&pattern.id)
            .ok_or_else(|| CompileError::internal("let pattern missing its LetDecl"))?;
        let PatternKind::Identifier { by_ref, .. } = &pattern.kind;
        let let_ty = self.prog.lets[let_id].ty.clone();
        let let_name = self.prog.lets[let_id].name;
        let ir_ty = self.tl.lower(self.builder.module_mut(), &self.prog.structs, &let_ty)?;
        let slot = self.builder.create_entry_alloca(ir_ty, Some(&format!("{let_name}.slot")))?;

        if let Some(init_expr) = init {
            self.lower_expr(init_expr)?;
            let value = match by_ref {
                RefKind::None => self.get_rvalue(init_expr.id)?,
                RefKind::Ref | RefKind::RefMut => {
                    let ptr = self.get_rvalue(init_expr.id)?;
                    self.builder.create_load(ptr, None)?
                }
            };
            self.builder.create_store(value, slot.clone())?;
        }

        self.ctx_mut().let_slots.insert(let_id, slot);
        Ok(())
    }

    pub(crate) fn lower_expr(&mut self, expr: &Expr) -> Result<()> {
        match &expr.kind {
            ExprKind::Literal(kind, text) => self.lower_literal(expr.id, *kind, text),
            ExprKind::Identifier(name) => self.lower_identifier(expr.id, *name),
            ExprKind::Binary(op, l, r) => self.lower_binary(expr.id, *op, l, r),
            ExprKind::Unary(op, e) => self.lower_unary(expr.id, *op, e),
            ExprKind::Call(callee, args) => self.lower_call(expr.id, callee, args),
            ExprKind::Field(base, name) => self.lower_field(expr.id, base, *name),
            ExprKind::Struct(name, fields) => self.lower_struct_literal(expr.id, *name, fields),
            ExprKind::Index(base, idx) => self.lower_index(expr.id, base, idx),
            ExprKind::Block(block) => self.lower_block_expr(expr.id, block),
            ExprKind::If(cond, then_b, else_b) => self.lower_if(expr.id, cond, then_b, else_b),
            ExprKind::While(cond, body) => self.lower_while(cond, body),
            ExprKind::Loop(body) => self.lower_loop(expr.id, body),
            ExprKind::Return(v) => self.lower_return(v),
            ExprKind::Break(v) => self.lower_break(v),
            ExprKind::Continue(v) => self.lower_continue(v),
            ExprKind::Cast(e, _ty) => self.lower_cast(expr.id, e),
            ExprKind::Path(ty, member) => self.lower_path(expr.id, ty, *member),
            ExprKind::SelfExpr => self.lower_self(expr.id),
            ExprKind::Unit => Ok(()),
            ExprKind::Array(elems) => self.lower_array(expr.id, elems),
            ExprKind::RepeatArray(elem, size) => self.lower_repeat_array(expr.id, elem, size),
        }
    }

    fn lower_literal(&mut self, expr_id: NodeId, kind: crate::types::ast::LiteralKind, text: &str) -> Result<()> {
        use crate::types::ast::LiteralKind;
        match kind {
            LiteralKind::Number => {
                let (value, _suffix) = crate::semantic::literals::parse_number(text)?;
                self.expr_value.insert(expr_id, IrValue::Constant { ty: IrType::i32(), literal: value });
            }
            LiteralKind::Bool => {
                let v = if text == "true" { 1 } else { 0 };
                self.expr_value.insert(expr_id, IrValue::Constant { ty: IrType::i1(), literal: v });
            }
            LiteralKind::Char => {
                let ch = text.chars().next().ok_or_else(|| CompileError::internal("empty char literal"))?;
                self.expr_value.insert(expr_id, IrValue::Constant { ty: IrType::i8(), literal: ch as i64 });
            }
            LiteralKind::Str => {
                let addr = self.builder.create_string_literal(&mut self.tl, text)?;
                self.expr_address.insert(expr_id, addr);
            }
        }
        Ok(())
    }

    fn lower_identifier(&mut self, expr_id: NodeId, name: Symbol) -> Result<()> {
        if let Some(let_id) = self.prog.node_lets.get(&expr_id).copied() {
            let slot = self
                .ctx()
                .let_slots
                .get(&let_id)
                .cloned()
                .ok_or_else(|| CompileError::internal(format!("no slot allocated for local `{name}`")))?;
            self.expr_address.insert(expr_id, slot);
            return Ok(());
        }
        let scope = *self
            .prog
            .node_scope
            .get(&expr_id)
            .ok_or_else(|| CompileError::internal("identifier missing its enclosing scope"))?;
        match self.prog.scopes.lookup_value(scope, name) {
            Some(ValueNsEntry::Const(cid)) => self.lower_const_ref(expr_id, cid),
            _ => Err(CompileError::internal(format!("identifier `{name}` did not resolve to a local or a const"))),
        }
    }

    fn lower_const_ref(&mut self, expr_id: NodeId, cid: ConstId) -> Result<()> {
        let rt = self.prog.consts[cid].ty.clone();
        if matches!(rt.kind, TypeKind::Array(..)) {
            let name = self
                .driver
                .const_global
                .get(&cid)
                .cloned()
                .ok_or_else(|| CompileError::internal("array const missing its pre-emitted global"))?;
            let ir_ty = self.tl.lower(self.builder.module_mut(), &self.prog.structs, &rt)?;
            self.expr_address.insert(expr_id, IrValue::Global { name, ty: IrType::ptr(ir_ty) });
        } else {
            let value = self
                .prog
                .const_values
                .get(&cid)
                .cloned()
                .ok_or_else(|| CompileError::internal("const value not computed by constant folding"))?;
            let iv = self
                .tl
                .lower_const(self.builder.module_mut(), &self.prog.structs, &value, &rt)?
                .ok_or_else(|| CompileError::internal("scalar const failed to lower to an IR constant"))?;
            self.expr_value.insert(expr_id, iv);
        }
        Ok(())
    }

    fn lower_path(&mut self, expr_id: NodeId, _ty: &AstType, _member: Symbol) -> Result<()> {
        match self.prog.node_paths.get(&expr_id).copied() {
            Some(PathResolution::EnumVariant(_eid, discriminant)) => {
                self.expr_value.insert(expr_id, IrValue::Constant { ty: IrType::i32(), literal: discriminant as i64 });
                Ok(())
            }
            Some(PathResolution::AssocConst(cid)) => self.lower_const_ref(expr_id, cid),
            None => Err(CompileError::internal("path expression missing its resolution")),
        }
    }

    fn lower_self(&mut self, expr_id: NodeId) -> Result<()> {
        let slot = self.ctx().self_slot.clone().ok_or_else(|| CompileError::internal("`self` used with no self slot"))?;
        self.expr_address.insert(expr_id, slot);
        Ok(())
    }

    fn lower_field(&mut self, expr_id: NodeId, base: &Expr, name: Symbol) -> Result<()> {
        self.lower_expr(base)?;
        let base_ty = self.node_type(base.id)?.clone();
        let sid = match &base_ty.kind {
            TypeKind::Struct(_, sid) => *sid,
            _ => return Err(CompileError::internal("field access on a non-struct type")),
        };
        let field_idx = self.prog.structs[sid]
            .field_order
            .iter()
            .position(|f| *f == name)
            .ok_or_else(|| CompileError::internal(format!("no field `{name}` on this struct")))?;
        let base_addr = self.base_address(base)?;
        let struct_ir = IrType::Struct(self.tl.declare_struct_stub(self.builder.module_mut(), &self.prog.structs, sid));
        let zero = IrValue::Constant { ty: IrType::i32(), literal: 0 };
        let idx_const = IrValue::Constant { ty: IrType::i32(), literal: field_idx as i64 };
        let addr = self.builder.create_gep(base_addr, struct_ir, vec![zero, idx_const], Some(&format!("{name}.addr")))?;
        self.expr_address.insert(expr_id, addr);
        Ok(())
    }

    fn lower_index(&mut self, expr_id: NodeId, base: &Expr, idx: &Expr) -> Result<()> {
        self.lower_expr(base)?;
        self.lower_expr(idx)?;
        let base_ty = self.node_type(base.id)?.clone();
        let (elem_rt, n) = match &base_ty.kind {
            TypeKind::Array(e, n) => (e.as_ref().clone(), *n),
            _ => return Err(CompileError::internal("index access on a non-array type")),
        };
        let elem_ir = self.tl.lower(self.builder.module_mut(), &self.prog.structs, &elem_rt)?;
        let arr_ir = IrType::Array(Box::new(elem_ir), n);
        let base_addr = self.base_address(base)?;
        let idx_val = self.get_rvalue(idx.id)?;
        let zero = IrValue::Constant { ty: IrType::i32(), literal: 0 };
        let addr = self.builder.create_gep(base_addr, arr_ir, vec![zero, idx_val], Some("idx.addr"))?;
        self.expr_address.insert(expr_id, addr);
        Ok(())
    }

    fn lower_struct_literal(&mut self, expr_id: NodeId, _name: Symbol, fields: &[(Symbol, Expr)]) -> Result<()> {
        let rt = self.node_type(expr_id)?.clone();
        let sid = match &rt.kind {
            TypeKind::Struct(_, sid) => *sid,
            _ => return Err(CompileError::internal("struct literal did not resolve to a struct type")),
        };
        let struct_ir = IrType::Struct(self.tl.declare_struct_stub(self.builder.module_mut(), &self.prog.structs, sid));
        let slot = self.builder.create_entry_alloca(struct_ir.clone(), Some("struct.slot"))?;
        let field_order = self.prog.structs[sid].field_order.clone();
        for (idx, fname) in field_order.iter().enumerate() {
            let (_, fexpr) = fields
                .iter()
                .find(|(n, _)| n == fname)
                .ok_or_else(|| CompileError::internal(format!("struct literal missing field `{fname}`")))?;
            self.lower_expr(fexpr)?;
            let v = self.get_rvalue(fexpr.id)?;
            let zero = IrValue::Constant { ty: IrType::i32(), literal: 0 };
            let idx_const = IrValue::Constant { ty: IrType::i32(), literal: idx as i64 };
            let addr = self.builder.create_gep(slot.clone(), struct_ir.clone(), vec![zero, idx_const], Some(&format!("{fname}.addr")))?;
            self.builder.create_store(v, addr)?;
        }
        self.expr_address.insert(expr_id, slot);
        Ok(())
    }

    fn lower_array(&mut self, expr_id: NodeId, elems: &[Expr]) -> Result<()> {
        let rt = self.node_type(expr_id)?.clone();
        let (elem_rt, n) = match &rt.kind {
            TypeKind::Array(e, n) => (e.as_ref().clone(), *n),
            _ => return Err(CompileError::internal("array literal did not resolve to an array type")),
        };
        let elem_ir = self.tl.lower(self.builder.module_mut(), &self.prog.structs, &elem_rt)?;
        let arr_ir = IrType::Array(Box::new(elem_ir), n);
        let slot = self.builder.create_entry_alloca(arr_ir.clone(), Some("array.slot"))?;
        for (i, e) in elems.iter().enumerate() {
            self.lower_expr(e)?;
            let v = self.get_rvalue(e.id)?;
            let zero = IrValue::Constant { ty: IrType::i32(), literal: 0 };
            let idx_const = IrValue::Constant { ty: IrType::i32(), literal: i as i64 };
            let addr = self.builder.create_gep(slot.clone(), arr_ir.clone(), vec![zero, idx_const], Some(&format!("elem.{i}.addr")))?;
            self.builder.create_store(v, addr)?;
        }
        self.expr_address.insert(expr_id, slot);
        Ok(())
    }

    fn lower_repeat_array(&mut self, expr_id: NodeId, elem: &Expr, _size: &Expr) -> Result<()> {
        let rt = self.node_type(expr_id)?.clone();
        let (elem_rt, n) = match &rt.kind {
            TypeKind::Array(e, n) => (e.as_ref().clone(), *n),
            _ => return Err(CompileError::internal("repeat-array did not resolve to an array type")),
        };
        let elem_ir = self.tl.lower(self.builder.module_mut(), &self.prog.structs, &elem_rt)?;
        let arr_ir = IrType::Array(Box::new(elem_ir), n);
        let slot = self.builder.create_entry_alloca(arr_ir.clone(), Some("repeat.slot"))?;
        let idx_slot = self.builder.create_entry_alloca(IrType::i32(), Some("repeat.idx"))?;
        self.builder.create_store(IrValue::Constant { ty: IrType::i32(), literal: 0 }, idx_slot.clone())?;

        let cond_block = self.builder.create_block("repeat.cond");
        let body_block = self.builder.create_block("repeat.body");
        let after_block = self.builder.create_block("repeat.after");
        let cond_label = self.builder.block_label(cond_block);
        let body_label = self.builder.block_label(body_block);
        let after_label = self.builder.block_label(after_block);

        self.builder.create_br(&cond_label)?;
        self.builder.set_block(cond_block);
        let idx_val = self.builder.create_load(idx_slot.clone(), Some("repeat.idx.val"))?;
        let n_const = IrValue::Constant { ty: IrType::i32(), literal: n as i64 };
        let cmp = self.builder.create_icmp(IcmpPredicate::Ult, idx_val.clone(), n_const, Some("repeat.cmp"))?;
        self.builder.create_cond_br(cmp, &body_label, &after_label)?;

        self.builder.set_block(body_block);
        self.lower_expr(elem)?;
        let elem_val = self.get_rvalue(elem.id)?;
        let zero = IrValue::Constant { ty: IrType::i32(), literal: 0 };
        let elem_addr = self.builder.create_gep(slot.clone(), arr_ir, vec![zero, idx_val.clone()], Some("repeat.elem.addr"))?;
        self.builder.create_store(elem_val, elem_addr)?;
        let next_idx = self.builder.create_add(idx_val, IrValue::Constant { ty: IrType::i32(), literal: 1 }, Some("repeat.idx.next"))?;
        self.builder.create_store(next_idx, idx_slot)?;
        self.builder.create_br(&cond_label)?;

        self.builder.set_block(after_block);
        self.expr_address.insert(expr_id, slot);
        Ok(())
    }

    fn lower_block_expr(&mut self, expr_id: NodeId, block: &Block) -> Result<()> {
        let value = self.lower_block(block)?;
        if let Some(tail) = &block.tail {
            if let StmtKind::Expr { expr: tail_expr, .. } = &tail.kind {
                if let Some(addr) = self.expr_address.get(&tail_expr.id).cloned() {
                    self.expr_address.insert(expr_id, addr);
                    return Ok(());
                }
            }
        }
        if let Some(v) = value {
            self.expr_value.insert(expr_id, v);
        }
        Ok(())
    }

    fn lower_if(&mut self, expr_id: NodeId, cond: &Expr, then_b: &Block, else_b: &Option<Block>) -> Result<()> {
        self.lower_expr(cond)?;
        let cond_val = self.get_rvalue(cond.id)?;

        let then_block = self.builder.create_block("if.then");
        let else_block = self.builder.create_block("if.else");
        let merge_block = self.builder.create_block("if.merge");
        let then_label = self.builder.block_label(then_block);
        let else_label = self.builder.block_label(else_block);
        let merge_label = self.builder.block_label(merge_block);
        self.builder.create_cond_br(cond_val, &then_label, &else_label)?;

        let outcome = *self.prog.node_outcomes.get(&expr_id).unwrap_or(&OutcomeState::NEXT);
        let expr_ty = self.node_type(expr_id)?.clone();
        let needs_slot = outcome.can_continue() && !matches!(expr_ty.kind, TypeKind::Unit | TypeKind::Never);
        let result_slot = if needs_slot {
            let ty_ir = self.tl.lower(self.builder.module_mut(), &self.prog.structs, &expr_ty)?;
            Some(self.builder.create_entry_alloca(ty_ir, Some("if.result"))?)
        } else {
            None
        };

        self.builder.set_block(then_block);
        let then_val = self.lower_block(then_b)?;
        if !self.builder.block_has_terminator() {
            if let (Some(slot), Some(v)) = (&result_slot, &then_val) {
                self.builder.create_store(v.clone(), slot.clone())?;
            }
            self.builder.create_br(&merge_label)?;
        }

        self.builder.set_block(else_block);
        let else_val = match else_b {
            Some(b) => self.lower_block(b)?,
            None => None,
        };
        if !self.builder.block_has_terminator() {
            if let (Some(slot), Some(v)) = (&result_slot, &else_val) {
                self.builder.create_store(v.clone(), slot.clone())?;
            }
            self.builder.create_br(&merge_label)?;
        }

        self.builder.set_block(merge_block);
        if let Some(slot) = result_slot {
            let v = self.builder.create_load(slot, Some("if.val"))?;
            self.expr_value.insert(expr_id, v);
        }
        Ok(())
    }

    fn lower_while(&mut self, cond: &Expr, body: &Block) -> Result<()> {
        let cond_block = self.builder.create_block("while.cond");
        let body_block = self.builder.create_block("while.body");
        let exit_block = self.builder.create_block("while.exit");
        let cond_label = self.builder.block_label(cond_block);
        let body_label = self.builder.block_label(body_block);
        let exit_label = self.builder.block_label(exit_block);

        self.builder.create_br(&cond_label)?;
        self.builder.set_block(cond_block);
        self.lower_expr(cond)?;
        let cond_val = self.get_rvalue(cond.id)?;
        self.builder.create_cond_br(cond_val, &body_label, &exit_label)?;

        self.builder.set_block(body_block);
        self.ctx_mut().loop_stack.push(LoopContext { continue_target: cond_block, break_target: exit_block, break_slot: None });
        let body_result = self.lower_block(body);
        self.ctx_mut().loop_stack.pop();
        body_result?;
        if !self.builder.block_has_terminator() {
            self.builder.create_br(&cond_label)?;
        }

        self.builder.set_block(exit_block);
        Ok(())
    }

    fn lower_loop(&mut self, expr_id: NodeId, body: &Block) -> Result<()> {
        let body_block = self.builder.create_block("loop.body");
        let break_block = self.builder.create_block("loop.break");
        let body_label = self.builder.block_label(body_block);

        let outcome = *self.prog.node_outcomes.get(&expr_id).unwrap_or(&OutcomeState::NEXT);
        let expr_ty = self.node_type(expr_id)?.clone();
        let needs_slot = outcome.can_continue() && !matches!(expr_ty.kind, TypeKind::Unit | TypeKind::Never);
        let break_slot = if needs_slot {
            let ty_ir = self.tl.lower(self.builder.module_mut(), &self.prog.structs, &expr_ty)?;
            Some(self.builder.create_entry_alloca(ty_ir, Some("loop.result"))?)
        } else {
            None
        };

        self.builder.create_br(&body_label)?;
        self.builder.set_block(body_block);
        self.ctx_mut().loop_stack.push(LoopContext { continue_target: body_block, break_target: break_block, break_slot: break_slot.clone() });
        let body_result = self.lower_block(body);
        self.ctx_mut().loop_stack.pop();
        body_result?;
        if !self.builder.block_has_terminator() {
            self.builder.create_br(&body_label)?;
        }

        self.builder.set_block(break_block);
        if let Some(slot) = break_slot {
            let v = self.builder.create_load(slot, Some("loop.val"))?;
            self.expr_value.insert(expr_id, v);
        }
        Ok(())
    }

    fn lower_return(&mut self, value: &Option<Expr>) -> Result<()> {
        if let Some(v) = value {
            self.lower_expr(v)?;
            let val = self.get_rvalue(v.id)?;
            if let Some(slot) = self.ctx().return_slot.clone() {
                self.builder.create_store(val, slot)?;
            }
        }
        let label = self.builder.block_label(self.ctx().return_block);
        self.builder.create_br(&label)
    }

    fn lower_break(&mut self, value: &Option<Expr>) -> Result<()> {
        let (break_target, break_slot) = {
            let lc = self.ctx().loop_stack.last().ok_or_else(|| CompileError::internal("`break` outside a loop"))?;
            (lc.break_target, lc.break_slot.clone())
        };
        if let Some(v) = value {
            self.lower_expr(v)?;
            if let Some(slot) = break_slot {
                let val = self.get_rvalue(v.id)?;
                self.builder.create_store(val, slot)?;
            }
        }
        let label = self.builder.block_label(break_target);
        self.builder.create_br(&label)
    }

    fn lower_continue(&mut self, _value: &Option<Expr>) -> Result<()> {
        let continue_target = self
            .ctx()
            .loop_stack
            .last()
            .ok_or_else(|| CompileError::internal("`continue` outside a loop"))?
            .continue_target;
        let label = self.builder.block_label(continue_target);
        self.builder.create_br(&label)
    }

    fn lower_cast(&mut self, expr_id: NodeId, e: &Expr) -> Result<()> {
        self.lower_expr(e)?;
        let v = self.get_rvalue(e.id)?;
        let from_rt = self.node_type(e.id)?.clone();
        let to_rt = self.node_type(expr_id)?.clone();
        let to_ir = self.tl.lower(self.builder.module_mut(), &self.prog.structs, &to_rt)?;

        let from_bits = int_bits(v.ty());
        let to_bits = int_bits(&to_ir);
        let result = if from_bits == to_bits {
            v
        } else if to_bits == 1 {
            let zero = IrValue::Constant { ty: v.ty().clone(), literal: 0 };
            self.builder.create_icmp(IcmpPredicate::Ne, v, zero, None)?
        } else if to_bits > from_bits {
            let unsigned_from = from_rt.is_unsigned() || matches!(from_rt.kind, TypeKind::Bool | TypeKind::Char);
            if unsigned_from {
                self.builder.create_zext(v, to_ir, None)?
            } else {
                self.builder.create_sext(v, to_ir, None)?
            }
        } else {
            self.builder.create_trunc(v, to_ir, None)?
        };
        self.expr_value.insert(expr_id, result);
        Ok(())
    }

    fn lower_unary(&mut self, expr_id: NodeId, op: UnaryOp, e: &Expr) -> Result<()> {
        match op {
            UnaryOp::Neg => {
                self.lower_expr(e)?;
                let v = self.get_rvalue(e.id)?;
                let zero = IrValue::Constant { ty: v.ty().clone(), literal: 0 };
                let result = self.builder.create_sub(zero, v, Some("neg"))?;
                self.expr_value.insert(expr_id, result);
            }
            UnaryOp::Not => {
                self.lower_expr(e)?;
                let v = self.get_rvalue(e.id)?;
                let rt = self.node_type(e.id)?.clone();
                let mask = if matches!(rt.kind, TypeKind::Bool) {
                    IrValue::Constant { ty: IrType::i1(), literal: 1 }
                } else {
                    IrValue::Constant { ty: v.ty().clone(), literal: -1 }
                };
                let result = self.builder.create_xor(v, mask, Some("not"))?;
                self.expr_value.insert(expr_id, result);
            }
            UnaryOp::Ref | UnaryOp::RefMut => {
                self.lower_expr(e)?;
                let addr = self.get_lvalue(e.id)?;
                self.expr_value.insert(expr_id, addr);
            }
            UnaryOp::Deref => {
                self.lower_expr(e)?;
                let ptr = self.get_rvalue(e.id)?;
                self.expr_address.insert(expr_id, ptr);
            }
        }
        Ok(())
    }

    fn lower_binary(&mut self, expr_id: NodeId, op: BinaryOp, l: &Expr, r: &Expr) -> Result<()> {
        if op.is_assignment() {
            self.lower_expr(l)?;
            let lhs_addr = self.get_lvalue(l.id)?;
            self.lower_expr(r)?;
            let rhs_val = self.get_rvalue(r.id)?;
            let l_rt = self.node_type(l.id)?.clone();
            let final_val = match op.compound_op() {
                Some(inner) => {
                    let cur = self.builder.create_load(lhs_addr.clone(), Some("lhs.val"))?;
                    self.apply_binary_op(inner, cur, rhs_val, &l_rt)?
                }
                None => rhs_val,
            };
            self.builder.create_store(final_val, lhs_addr)?;
            Ok(())
        } else if op.is_logical() {
            self.lower_logical(expr_id, op, l, r)
        } else if op.is_comparison() {
            self.lower_comparison(expr_id, op, l, r)
        } else {
            self.lower_expr(l)?;
            let lv = self.get_rvalue(l.id)?;
            self.lower_expr(r)?;
            let rv = self.get_rvalue(r.id)?;
            let l_rt = self.node_type(l.id)?.clone();
            let result = self.apply_binary_op(op, lv, rv, &l_rt)?;
            self.expr_value.insert(expr_id, result);
            Ok(())
        }
    }

    fn apply_binary_op(&mut self, op: BinaryOp, l: IrValue, r: IrValue, l_rt: &RealType) -> Result<IrValue> {
        let unsigned = l_rt.is_unsigned();
        Ok(match op {
            BinaryOp::Add => self.builder.create_add(l, r, None)?,
            BinaryOp::Sub => self.builder.create_sub(l, r, None)?,
            BinaryOp::Mul => self.builder.create_mul(l, r, None)?,
            BinaryOp::Div if unsigned => self.builder.create_udiv(l, r, None)?,
            BinaryOp::Div => self.builder.create_sdiv(l, r, None)?,
            BinaryOp::Rem if unsigned => self.builder.create_urem(l, r, None)?,
            BinaryOp::Rem => self.builder.create_srem(l, r, None)?,
            BinaryOp::And => self.builder.create_and(l, r, None)?,
            BinaryOp::Or => self.builder.create_or(l, r, None)?,
            BinaryOp::Xor => self.builder.create_xor(l, r, None)?,
            BinaryOp::Shl => self.builder.create_shl(l, r, None)?,
            BinaryOp::Shr if unsigned => self.builder.create_lshr(l, r, None)?,
            BinaryOp::Shr => self.builder.create_ashr(l, r, None)?,
            _ => return Err(CompileError::internal("operator is not a value-producing binary operator")),
        })
    }

    fn lower_comparison(&mut self, expr_id: NodeId, op: BinaryOp, l: &Expr, r: &Expr) -> Result<()> {
        self.lower_expr(l)?;
        let lv = self.get_rvalue(l.id)?;
        self.lower_expr(r)?;
        let rv = self.get_rvalue(r.id)?;
        let l_rt = self.node_type(l.id)?.clone();
        let unsigned = l_rt.is_unsigned();
        let pred = match op {
            BinaryOp::Eq => IcmpPredicate::Eq,
            BinaryOp::Ne => IcmpPredicate::Ne,
            BinaryOp::Lt if unsigned => IcmpPredicate::Ult,
            BinaryOp::Lt => IcmpPredicate::Slt,
            BinaryOp::Le if unsigned => IcmpPredicate::Ule,
            BinaryOp::Le => IcmpPredicate::Sle,
            BinaryOp::Gt if unsigned => IcmpPredicate::Ugt,
            BinaryOp::Gt => IcmpPredicate::Sgt,
            BinaryOp::Ge if unsigned => IcmpPredicate::Uge,
            BinaryOp::Ge => IcmpPredicate::Sge,
            _ => return Err(CompileError::internal("operator is not a comparison")),
        };
        let result = self.builder.create_icmp(pred, lv, rv, Some("cmp"))?;
        self.expr_value.insert(expr_id, result);
        Ok(())
    }

    /// `&&`/`||` with a result slot pre-seeded to the operator's identity (`false`
    /// for `&&`, `true` for `||`), only visiting the right operand on the branch
    /// that needs it.
    fn lower_logical(&mut self, expr_id: NodeId, op: BinaryOp, l: &Expr, r: &Expr) -> Result<()> {
        let is_and = matches!(op, BinaryOp::AndAnd);
        let slot = self.builder.create_entry_alloca(IrType::i1(), Some("logical.result"))?;
        let identity = IrValue::Constant { ty: IrType::i1(), literal: if is_and { 0 } else { 1 } };
        self.builder.create_store(identity, slot.clone())?;

        self.lower_expr(l)?;
        let l_val = self.get_rvalue(l.id)?;
        let rhs_block = self.builder.create_block("logical.rhs");
        let merge_block = self.builder.create_block("logical.merge");
        let rhs_label = self.builder.block_label(rhs_block);
        let merge_label = self.builder.block_label(merge_block);
        if is_and {
            self.builder.create_cond_br(l_val, &rhs_label, &merge_label)?;
        } else {
            self.builder.create_cond_br(l_val, &merge_label, &rhs_label)?;
        }

        self.builder.set_block(rhs_block);
        self.lower_expr(r)?;
        let r_val = self.get_rvalue(r.id)?;
        self.builder.create_store(r_val, slot.clone())?;
        if !self.builder.block_has_terminator() {
            self.builder.create_br(&merge_label)?;
        }

        self.builder.set_block(merge_block);
        let result = self.builder.create_load(slot, Some("logical.val"))?;
        self.expr_value.insert(expr_id, result);
        Ok(())
    }

    fn lower_call(&mut self, expr_id: NodeId, callee: &Expr, args: &[Expr]) -> Result<()> {
        let fid = *self
            .prog
            .node_calls
            .get(&expr_id)
            .ok_or_else(|| CompileError::internal("call expression missing its resolved function"))?;

        if self.prog.fns[fid].is_exit {
            let arg = args.first().ok_or_else(|| CompileError::internal("`exit` called with no argument"))?;
            self.lower_expr(arg)?;
            let val = self.get_rvalue(arg.id)?;
            if let Some(slot) = self.ctx().return_slot.clone() {
                self.builder.create_store(val, slot)?;
            }
            let label = self.builder.block_label(self.ctx().return_block);
            self.builder.create_br(&label)?;
            return Ok(());
        }

        if self.prog.fns[fid].is_array_len {
            let base = match &callee.kind {
                ExprKind::Field(base, _) => base,
                _ => return Err(CompileError::internal("array `len()` call missing its receiver")),
            };
            let base_ty = self.node_type(base.id)?.clone();
            let n = match &base_ty.kind {
                TypeKind::Array(_, n) => *n,
                _ => return Err(CompileError::internal("`len()` receiver is not an array")),
            };
            self.expr_value.insert(expr_id, IrValue::Constant { ty: IrType::i32(), literal: n as i64 });
            return Ok(());
        }

        let receiver_kind = self.prog.fns[fid].receiver;
        let mut arg_vals = Vec::with_capacity(args.len() + 1);
        if receiver_kind != ReceiverKind::None {
            let base = match &callee.kind {
                ExprKind::Field(base, _) => base,
                _ => return Err(CompileError::internal("method call missing its receiver expression")),
            };
            self.lower_expr(base)?;
            let recv_val = match receiver_kind {
                ReceiverKind::ByValue => self.get_rvalue(base.id)?,
                ReceiverKind::Ref | ReceiverKind::RefMut => self.base_address(base)?,
                ReceiverKind::None => unreachable!("checked above"),
            };
            arg_vals.push(recv_val);
        }
        for a in args {
            self.lower_expr(a)?;
            arg_vals.push(self.get_rvalue(a.id)?);
        }

        let symbol = self.call_symbol(fid)?;
        let ret_rt = self.prog.fns[fid].return_type.clone();
        let ret_ir = self.tl.lower(self.builder.module_mut(), &self.prog.structs, &ret_rt)?;
        let hint = if matches!(ret_ir, IrType::Void) { None } else { Some("call.val") };
        let result = self.builder.create_call(&symbol, arg_vals, ret_ir, hint)?;
        if let Some(v) = result {
            self.expr_value.insert(expr_id, v);
        }
        Ok(())
    }

    /// A user function's symbol was already pre-declared by the global lowering
    /// driver; a builtin's is declared the first time it's actually called
    /// (SPEC_FULL.md §4.4.3's "built-in runtime functions are declared on first
    /// use"). `IrModule::declare_function` is itself idempotent, so repeated
    /// calls for the same builtin just return the existing declaration.
    fn call_symbol(&mut self, fid: FnId) -> Result<String> {
        if self.prog.fns[fid].is_builtin {
            let name = self.prog.fns[fid].name.as_str().to_string();
            let (ret, params) = self.tl.lower_function(self.builder.module_mut(), self.prog, fid)?;
            let param_list: Vec<(String, IrType)> = params.into_iter().map(|t| (String::new(), t)).collect();
            self.builder.module_mut().declare_function(name.clone(), param_list, ret);
            Ok(name)
        } else {
            self.driver
                .fn_symbol
                .get(&fid)
                .cloned()
                .ok_or_else(|| CompileError::internal("function missing its pre-declared symbol"))
        }
    }
}

fn int_bits(ty: &IrType) -> u32 {
    match ty {
        IrType::Integer(bits) => *bits,
        _ => 32,
    }
}
