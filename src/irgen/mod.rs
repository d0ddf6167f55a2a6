//! IR generator (SPEC_FULL.md §4.4): the AST-driven walk that emits instructions
//! via the builder, using the semantic side tables (`Program::node_types`,
//! `node_places`, `node_outcomes`, `node_lets`, ...) rather than re-deriving any
//! of pass 4's decisions.
//!
//! Every local variable, parameter, and receiver gets a stack slot (`alloca` in
//! the entry block) that's loaded/stored through for every read/write, matching
//! the teacher's own "don't hand-roll SSA, let a later mem2reg pass do it"
//! approach to codegen (this dialect has no such pass, but the output is still
//! valid, just unoptimized, IR).

mod builder;
mod context;
mod expr;

pub use builder::IrBuilder;
use context::FunctionContext;

use hashbrown::HashMap;

use crate::error::{CompileError, Result};
use crate::lowering::{GlobalLoweringDriver, TypeLowering};
use crate::semantic::Program;
use crate::types::ast::{Item, ItemKind, NodeId, ReceiverKind};
use crate::types::ir::IrType;
use crate::types::realty::{PlaceKind, RealType};
use crate::types::FnId;

pub struct IrGenerator<'p> {
    prog: &'p Program,
    tl: TypeLowering,
    driver: GlobalLoweringDriver,
    builder: IrBuilder,
    expr_value: HashMap<NodeId, crate::types::ir::IrValue>,
    expr_address: HashMap<NodeId, crate::types::ir::IrValue>,
    ctx: Option<FunctionContext>,
}

impl<'p> IrGenerator<'p> {
    pub fn new(prog: &'p Program, tl: TypeLowering, driver: GlobalLoweringDriver, builder: IrBuilder) -> Self {
        IrGenerator { prog, tl, driver, builder, expr_value: HashMap::new(), expr_address: HashMap::new(), ctx: None }
    }

    pub fn into_module(self) -> crate::types::ir::IrModule {
        self.builder.into_module()
    }

    pub fn generate(&mut self, items: &[Item]) -> Result<()> {
        for item in items {
            self.generate_item(item)?;
        }
        Ok(())
    }

    fn generate_item(&mut self, item: &Item) -> Result<()> {
        match &item.kind {
            ItemKind::Fn(sig) => self.generate_fn(item.id, sig),
            ItemKind::Impl { items, .. } => {
                for inner in items {
                    self.generate_item(inner)?;
                }
                Ok(())
            }
            ItemKind::Struct { .. } | ItemKind::Enum { .. } | ItemKind::Const { .. } => Ok(()),
        }
    }

    fn fn_id_of(&self, item_id: NodeId) -> Result<FnId> {
        match self.prog.item_decl.get(&item_id) {
            Some(crate::semantic::DeclRef::Fn(fid)) => Ok(*fid),
            _ => Err(CompileError::internal("fn item missing its FnDecl")),
        }
    }

    fn generate_fn(&mut self, item_id: NodeId, sig: &crate::types::ast::FnSig) -> Result<()> {
        let fid = self.fn_id_of(item_id)?;
        if self.prog.fns[fid].is_builtin {
            return Ok(());
        }
        let decl_has_receiver = self.prog.fns[fid].has_receiver();
        let param_let_decls = self.prog.fns[fid].param_let_decls.clone();
        let param_names: Vec<String> = self.prog.fns[fid].params.iter().map(|(n, _, _)| n.as_str().to_string()).collect();
        let is_main = self.prog.fns[fid].is_main;

        let symbol = self
            .driver
            .fn_symbol
            .get(&fid)
            .cloned()
            .ok_or_else(|| CompileError::internal("function missing its pre-declared symbol"))?;
        let (ret_ty, param_tys) = self.tl.lower_function(self.builder.module_mut(), self.prog, fid)?;

        let mut param_decl_list = Vec::with_capacity(param_tys.len());
        let mut idx = 0;
        if decl_has_receiver {
            param_decl_list.push(("self".to_string(), param_tys[0].clone()));
            idx = 1;
        }
        for name in &param_names {
            param_decl_list.push((format!("p.{name}"), param_tys[idx].clone()));
            idx += 1;
        }

        let fn_idx = self.builder.module_mut().define_function(symbol, param_decl_list.clone(), ret_ty.clone());
        self.builder.set_function(fn_idx);
        let entry = self.builder.create_block("entry");
        let return_block = self.builder.create_block("return");
        self.builder.set_block(entry);

        let mut ctx = FunctionContext {
            return_block,
            return_slot: None,
            self_slot: None,
            let_slots: HashMap::new(),
            loop_stack: Vec::new(),
        };

        let mut field_idx = 0;
        if decl_has_receiver {
            let (reg_name, ty) = &param_decl_list[0];
            let incoming = crate::types::ir::IrValue::Register { name: reg_name.clone(), ty: ty.clone() };
            let slot = self.builder.create_entry_alloca(ty.clone(), Some("self.slot"))?;
            self.builder.create_store(incoming, slot.clone())?;
            ctx.self_slot = Some(slot);
            field_idx = 1;
        }
        for (i, let_id) in param_let_decls.iter().enumerate() {
            let (reg_name, ty) = &param_decl_list[field_idx + i];
            let incoming = crate::types::ir::IrValue::Register { name: reg_name.clone(), ty: ty.clone() };
            let slot = self.builder.create_entry_alloca(ty.clone(), Some(&format!("{}.slot", param_names[i])))?;
            self.builder.create_store(incoming, slot.clone())?;
            ctx.let_slots.insert(*let_id, slot);
        }

        let needs_return_slot = is_main || !matches!(ret_ty, IrType::Void);
        if needs_return_slot {
            let slot = self.builder.create_entry_alloca(ret_ty.clone(), Some("ret.slot"))?;
            ctx.return_slot = Some(slot);
        }

        self.ctx = Some(ctx);
        let body_value = self.lower_block(&sig.body)?;

        if !self.builder.block_has_terminator() {
            if let Some(v) = body_value {
                if let Some(slot) = self.ctx.as_ref().unwrap().return_slot.clone() {
                    self.builder.create_store(v, slot)?;
                }
            } else if is_main {
                if let Some(slot) = self.ctx.as_ref().unwrap().return_slot.clone() {
                    self.builder.create_store(crate::types::ir::IrValue::Constant { ty: IrType::i32(), literal: 0 }, slot)?;
                }
            }
            let label = self.builder.block_label(return_block);
            self.builder.create_br(&label)?;
        }

        self.builder.set_block(return_block);
        let return_slot = self.ctx.as_ref().unwrap().return_slot.clone();
        match return_slot {
            Some(slot) => {
                let v = self.builder.create_load(slot, Some("ret.val"))?;
                self.builder.create_ret(Some(v))?;
            }
            None => self.builder.create_ret(None)?,
        }

        self.ctx = None;
        self.expr_value.clear();
        self.expr_address.clear();
        Ok(())
    }

    pub(crate) fn node_type(&self, id: NodeId) -> Result<&RealType> {
        self.prog.node_types.get(&id).ok_or_else(|| CompileError::internal(format!("node {id:?} missing a resolved type")))
    }

    pub(crate) fn node_place(&self, id: NodeId) -> PlaceKind {
        *self.prog.node_places.get(&id).unwrap_or(&PlaceKind::NotPlace)
    }

    pub(crate) fn ir_type_of(&mut self, id: NodeId) -> Result<IrType> {
        let rt = self.node_type(id)?.clone();
        self.tl.lower(self.builder.module_mut(), &self.prog.structs, &rt)
    }

}
