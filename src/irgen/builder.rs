//! IR builder (SPEC_FULL.md §4.3): an insertion-point-tracking façade over
//! `IrModule`/`IrFunction` that names every temporary it creates. A hinted
//! register reuses the block-label naming scheme already on `IrFunction`: the
//! first use of a hint gets the bare name, later uses get `hint.N`.

use hashbrown::HashMap;

use crate::error::{CompileError, Result};
use crate::lowering;
use crate::types::ir::{IcmpPredicate, Instruction, IrModule, IrType, IrValue};

pub struct IrBuilder {
    module: IrModule,
    current_fn: usize,
    current_block: usize,
    tmp_counter: u32,
    str_counter: u32,
    hint_counters: HashMap<String, u32>,
}

/// A saved insertion point, returned by [`IrBuilder::save_position`].
pub struct InsertionPoint {
    current_fn: usize,
    current_block: usize,
    tmp_counter: u32,
    hint_counters: HashMap<String, u32>,
}

impl IrBuilder {
    pub fn new(module: IrModule) -> Self {
        IrBuilder {
            module,
            current_fn: usize::MAX,
            current_block: usize::MAX,
            tmp_counter: 0,
            str_counter: 0,
            hint_counters: HashMap::new(),
        }
    }

    pub fn into_module(self) -> IrModule {
        self.module
    }

    pub fn module(&self) -> &IrModule {
        &self.module
    }

    pub fn module_mut(&mut self) -> &mut IrModule {
        &mut self.module
    }

    pub fn set_function(&mut self, idx: usize) {
        self.current_fn = idx;
        self.hint_counters.clear();
        self.tmp_counter = 0;
    }

    pub fn set_block(&mut self, idx: usize) {
        self.current_block = idx;
    }

    /// Snapshots the current insertion point and naming counters so a nested
    /// item (a `fn` declared inside a block) can be generated without
    /// disturbing the enclosing function still being built.
    pub fn save_position(&self) -> InsertionPoint {
        InsertionPoint {
            current_fn: self.current_fn,
            current_block: self.current_block,
            tmp_counter: self.tmp_counter,
            hint_counters: self.hint_counters.clone(),
        }
    }

    pub fn restore_position(&mut self, saved: InsertionPoint) {
        self.current_fn = saved.current_fn;
        self.current_block = saved.current_block;
        self.tmp_counter = saved.tmp_counter;
        self.hint_counters = saved.hint_counters;
    }

    pub fn current_block(&self) -> usize {
        self.current_block
    }

    pub fn create_block(&mut self, label: &str) -> usize {
        self.module.functions[self.current_fn].create_block(label)
    }

    pub fn block_label(&self, idx: usize) -> String {
        self.module.functions[self.current_fn].blocks[idx].label.clone()
    }

    pub fn block_has_terminator(&self) -> bool {
        self.module.functions[self.current_fn].blocks[self.current_block].terminator().is_some()
    }

    fn name_for(&mut self, hint: Option<&str>) -> String {
        match hint {
            Some(h) => {
                let n = self.hint_counters.entry(h.to_string()).or_insert(0);
                let name = if *n == 0 { h.to_string() } else { format!("{h}.{n}") };
                *n += 1;
                name
            }
            None => {
                let n = self.tmp_counter;
                self.tmp_counter += 1;
                format!("tmp.{n}")
            }
        }
    }

    fn emit(&mut self, inst: Instruction) -> Result<()> {
        self.module.functions[self.current_fn].blocks[self.current_block].append(inst)
    }

    /// An `alloca` in the function's entry block, regardless of the current
    /// insertion point — every local variable's stack slot lives there so later
    /// blocks never need a `dominates`-style check before reading it.
    pub fn create_entry_alloca(&mut self, ty: IrType, hint: Option<&str>) -> Result<IrValue> {
        let saved = self.current_block;
        self.current_block = 0;
        let result = self.create_alloca(ty, hint);
        self.current_block = saved;
        result
    }

    pub fn create_alloca(&mut self, ty: IrType, hint: Option<&str>) -> Result<IrValue> {
        let name = self.name_for(hint);
        let result = IrValue::Register { name, ty: IrType::ptr(ty.clone()) };
        self.emit(Instruction::Alloca { result: result.clone(), allocated_ty: ty })?;
        Ok(result)
    }

    pub fn create_load(&mut self, addr: IrValue, hint: Option<&str>) -> Result<IrValue> {
        let pointee = match addr.ty() {
            IrType::Pointer(inner) => (**inner).clone(),
            other => return Err(CompileError::internal(format!("create_load: operand is not a pointer ({})", other.to_string()))),
        };
        let name = self.name_for(hint);
        let result = IrValue::Register { name, ty: pointee.clone() };
        self.emit(Instruction::Load { result: result.clone(), ty: pointee, addr })?;
        Ok(result)
    }

    pub fn create_store(&mut self, value: IrValue, addr: IrValue) -> Result<()> {
        self.emit(Instruction::Store { value, addr })
    }

    /// `root_ty` is the pointee type of `base` (the aggregate being indexed into),
    /// `indices` the full getelementptr index list, the first of which conventionally
    /// steps over the base pointer itself (almost always a constant `0`).
    pub fn create_gep(&mut self, base: IrValue, root_ty: IrType, indices: Vec<IrValue>, hint: Option<&str>) -> Result<IrValue> {
        let pointee = Self::gep_result_type(&root_ty, &indices)?;
        let name = self.name_for(hint);
        let result = IrValue::Register { name, ty: IrType::ptr(pointee) };
        self.emit(Instruction::Gep { result: result.clone(), root_ty, base, indices })?;
        Ok(result)
    }

    fn gep_result_type(root_ty: &IrType, indices: &[IrValue]) -> Result<IrType> {
        let mut cur = root_ty.clone();
        for (i, idx) in indices.iter().enumerate() {
            if i == 0 {
                continue;
            }
            cur = match &cur {
                IrType::Array(elem, _) => (**elem).clone(),
                IrType::Struct(s) => {
                    let field_idx = match idx {
                        IrValue::Constant { literal, .. } => *literal as usize,
                        _ => return Err(CompileError::internal("getelementptr into a struct requires a constant index")),
                    };
                    let fields = s.fields.borrow();
                    let fields = fields
                        .as_ref()
                        .ok_or_else(|| CompileError::internal(format!("getelementptr into undefined struct `{}`", s.name)))?;
                    fields
                        .get(field_idx)
                        .cloned()
                        .ok_or_else(|| CompileError::internal(format!("field index {field_idx} out of range on `{}`", s.name)))?
                }
                other => return Err(CompileError::internal(format!("getelementptr index into non-aggregate type {}", other.to_string()))),
            };
        }
        Ok(cur)
    }

    fn binary(&mut self, op: &'static str, lhs: IrValue, rhs: IrValue, hint: Option<&str>) -> Result<IrValue> {
        let ty = lhs.ty().clone();
        let name = self.name_for(hint);
        let result = IrValue::Register { name, ty };
        self.emit(Instruction::Binary { op, result: result.clone(), lhs, rhs })?;
        Ok(result)
    }

    pub fn create_add(&mut self, l: IrValue, r: IrValue, hint: Option<&str>) -> Result<IrValue> { self.binary("add", l, r, hint) }
    pub fn create_sub(&mut self, l: IrValue, r: IrValue, hint: Option<&str>) -> Result<IrValue> { self.binary("sub", l, r, hint) }
    pub fn create_mul(&mut self, l: IrValue, r: IrValue, hint: Option<&str>) -> Result<IrValue> { self.binary("mul", l, r, hint) }
    pub fn create_sdiv(&mut self, l: IrValue, r: IrValue, hint: Option<&str>) -> Result<IrValue> { self.binary("sdiv", l, r, hint) }
    pub fn create_udiv(&mut self, l: IrValue, r: IrValue, hint: Option<&str>) -> Result<IrValue> { self.binary("udiv", l, r, hint) }
    pub fn create_srem(&mut self, l: IrValue, r: IrValue, hint: Option<&str>) -> Result<IrValue> { self.binary("srem", l, r, hint) }
    pub fn create_urem(&mut self, l: IrValue, r: IrValue, hint: Option<&str>) -> Result<IrValue> { self.binary("urem", l, r, hint) }
    pub fn create_and(&mut self, l: IrValue, r: IrValue, hint: Option<&str>) -> Result<IrValue> { self.binary("and", l, r, hint) }
    pub fn create_or(&mut self, l: IrValue, r: IrValue, hint: Option<&str>) -> Result<IrValue> { self.binary("or", l, r, hint) }
    pub fn create_xor(&mut self, l: IrValue, r: IrValue, hint: Option<&str>) -> Result<IrValue> { self.binary("xor", l, r, hint) }
    pub fn create_shl(&mut self, l: IrValue, r: IrValue, hint: Option<&str>) -> Result<IrValue> { self.binary("shl", l, r, hint) }
    pub fn create_ashr(&mut self, l: IrValue, r: IrValue, hint: Option<&str>) -> Result<IrValue> { self.binary("ashr", l, r, hint) }
    pub fn create_lshr(&mut self, l: IrValue, r: IrValue, hint: Option<&str>) -> Result<IrValue> { self.binary("lshr", l, r, hint) }

    pub fn create_icmp(&mut self, pred: IcmpPredicate, lhs: IrValue, rhs: IrValue, hint: Option<&str>) -> Result<IrValue> {
        let name = self.name_for(hint);
        let result = IrValue::Register { name, ty: IrType::i1() };
        self.emit(Instruction::Icmp { pred, result: result.clone(), lhs, rhs })?;
        Ok(result)
    }

    fn cast(&mut self, op: &'static str, value: IrValue, target: IrType, hint: Option<&str>) -> Result<IrValue> {
        let name = self.name_for(hint);
        let result = IrValue::Register { name, ty: target.clone() };
        self.emit(Instruction::Cast { op, result: result.clone(), value, target })?;
        Ok(result)
    }

    pub fn create_zext(&mut self, v: IrValue, target: IrType, hint: Option<&str>) -> Result<IrValue> { self.cast("zext", v, target, hint) }
    pub fn create_sext(&mut self, v: IrValue, target: IrType, hint: Option<&str>) -> Result<IrValue> { self.cast("sext", v, target, hint) }
    pub fn create_trunc(&mut self, v: IrValue, target: IrType, hint: Option<&str>) -> Result<IrValue> { self.cast("trunc", v, target, hint) }

    pub fn create_br(&mut self, target_label: &str) -> Result<()> {
        self.emit(Instruction::Br { target: target_label.to_string() })
    }

    pub fn create_cond_br(&mut self, cond: IrValue, if_true: &str, if_false: &str) -> Result<()> {
        self.emit(Instruction::CondBr { cond, if_true: if_true.to_string(), if_false: if_false.to_string() })
    }

    pub fn create_ret(&mut self, value: Option<IrValue>) -> Result<()> {
        self.emit(Instruction::Ret { value })
    }

    pub fn create_call(&mut self, callee: &str, args: Vec<IrValue>, ret_ty: IrType, hint: Option<&str>) -> Result<Option<IrValue>> {
        let result = if matches!(ret_ty, IrType::Void) {
            None
        } else {
            Some(IrValue::Register { name: self.name_for(hint), ty: ret_ty.clone() })
        };
        self.emit(Instruction::Call { result: result.clone(), callee: callee.to_string(), ret_ty, args })?;
        Ok(result)
    }

    pub fn create_string_literal(&mut self, tl: &mut lowering::TypeLowering, text: &str) -> Result<IrValue> {
        lowering::lower_string_literal(&mut self.module, tl, &mut self.str_counter, text)
    }
}
