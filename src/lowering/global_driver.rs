//! Global lowering driver (SPEC_FULL.md §4.4.3): a depth-first walk of the scope
//! tree that pre-declares every struct/function/const-array global before the IR
//! generator lowers a single function body, and assigns each a name unique across
//! the whole program by suffixing it with its scope's position among its
//! siblings (e.g. a function named `helper` declared inside the third child of
//! the second child of the root becomes `helper.1.2`).

use hashbrown::HashMap;

use crate::error::{CompileError, Result};
use crate::semantic::{DeclRef, Program};
use crate::types::constval::ConstValue;
use crate::types::ir::IrModule;
use crate::types::realty::TypeKind;
use crate::types::{ConstId, FnId, ScopeId};

use super::TypeLowering;

pub struct GlobalLoweringDriver {
    /// Every non-builtin function's IR-level symbol name.
    pub fn_symbol: HashMap<FnId, String>,
    /// An array-typed const's backing global, by const id.
    pub const_global: HashMap<ConstId, String>,
}

impl GlobalLoweringDriver {
    pub fn new() -> Self {
        GlobalLoweringDriver { fn_symbol: HashMap::new(), const_global: HashMap::new() }
    }

    pub fn run(&mut self, module: &mut IrModule, tl: &mut TypeLowering, prog: &Program) -> Result<()> {
        self.visit_scope(module, tl, prog, prog.scopes.root, String::new())
    }

    fn visit_scope(
        &mut self,
        module: &mut IrModule,
        tl: &mut TypeLowering,
        prog: &Program,
        scope: ScopeId,
        suffix: String,
    ) -> Result<()> {
        let item_ids = prog.scope_items.get(&scope).cloned().unwrap_or_default();

        for id in &item_ids {
            if let Some(DeclRef::Struct(sid)) = prog.item_decl.get(id) {
                tl.declare_struct_stub(module, &prog.structs, *sid);
            }
        }
        for id in &item_ids {
            if let Some(DeclRef::Struct(sid)) = prog.item_decl.get(id) {
                tl.define_struct_fields(module, &prog.structs, *sid)?;
            }
        }

        for id in &item_ids {
            if let Some(DeclRef::Fn(fid)) = prog.item_decl.get(id) {
                let decl = &prog.fns[*fid];
                let name = format!("{}{suffix}", decl.name);
                let (ret, params) = tl.lower_function(module, prog, *fid)?;
                let param_list = params.into_iter().map(|t| (String::new(), t)).collect();
                module.declare_function(name.clone(), param_list, ret);
                self.fn_symbol.insert(*fid, name);
            }
        }

        for id in &item_ids {
            if let Some(DeclRef::Const(cid)) = prog.item_decl.get(id) {
                self.lower_const_global(module, tl, prog, *cid, &suffix)?;
            }
        }

        let children = prog.scopes.get(scope).children.clone();
        for (i, child) in children.iter().enumerate() {
            self.visit_scope(module, tl, prog, *child, format!("{suffix}.{i}"))?;
        }
        Ok(())
    }

    fn lower_const_global(
        &mut self,
        module: &mut IrModule,
        tl: &mut TypeLowering,
        prog: &Program,
        cid: ConstId,
        suffix: &str,
    ) -> Result<()> {
        let rt = prog.consts[cid].ty.clone();
        let TypeKind::Array(elem_ty, _) = &rt.kind else { return Ok(()) };
        let value = prog
            .const_values
            .get(&cid)
            .ok_or_else(|| CompileError::internal("const array value not computed by pass 3"))?;
        let ConstValue::Array(items) = value else {
            return Err(CompileError::internal("array-typed const did not evaluate to a ConstValue::Array"));
        };
        let ir_ty = tl.lower(module, &prog.structs, &rt)?;
        let init_text = super::serialize_const_array(tl, module, &prog.structs, items, elem_ty)?;
        let name = format!("const.{}{suffix}", prog.consts[cid].name);
        module.create_global(name.clone(), ir_ty, init_text, true)?;
        self.const_global.insert(cid, name);
        Ok(())
    }
}

impl Default for GlobalLoweringDriver {
    fn default() -> Self {
        GlobalLoweringDriver::new()
    }
}
