//! Type lowering (SPEC_FULL.md §4.2): maps a `RealType` to its `IrType`, and a
//! `FnDecl`/`ConstValue` to the IR shapes the generator builds on top of.
//!
//! Struct lowering follows the stub-then-define split the IR module itself
//! already exposes (`declare_struct_stub` / fields filled in later), so mutually
//! referencing structs within one scope resolve regardless of declaration order.

mod global_driver;

pub use global_driver::GlobalLoweringDriver;

use hashbrown::HashMap;

use crate::error::{CompileError, Result};
use crate::semantic::Program;
use crate::types::constval::ConstValue;
use crate::types::decl::StructDecl;
use crate::types::realty::{RealType, TypeKind};
use crate::types::ast::ReceiverKind;
use crate::types::ir::{encode_string_literal, IrModule, IrType, IrValue, StructTypeRef};
use crate::types::{Arena, FnId, StructId};

pub struct TypeLowering {
    struct_cache: HashMap<StructId, StructTypeRef>,
}

impl TypeLowering {
    /// Builds the lowering context and registers the two builtin aggregate types
    /// every program can reference (`Str`, `String`) regardless of whether a
    /// user-written struct mentions them.
    pub fn new(module: &mut IrModule) -> Self {
        let mut tl = TypeLowering { struct_cache: HashMap::new() };
        tl.declare_builtin_string_types(module);
        tl
    }

    fn declare_builtin_string_types(&mut self, module: &mut IrModule) {
        let str_stub = module.declare_struct_stub("Str");
        *str_stub.fields.borrow_mut() = Some(vec![IrType::ptr(IrType::i8()), IrType::i32()]);
        let string_stub = module.declare_struct_stub("String");
        *string_stub.fields.borrow_mut() = Some(vec![IrType::ptr(IrType::i8()), IrType::i32(), IrType::i32()]);
    }

    pub fn str_type(&self, module: &IrModule) -> IrType {
        IrType::Struct(module.find_struct("Str").expect("builtin Str type registered at construction"))
    }

    pub fn string_type(&self, module: &IrModule) -> IrType {
        IrType::Struct(module.find_struct("String").expect("builtin String type registered at construction"))
    }

    pub fn declare_struct_stub(
        &mut self,
        module: &mut IrModule,
        structs: &Arena<StructId, StructDecl>,
        sid: StructId,
    ) -> StructTypeRef {
        if let Some(existing) = self.struct_cache.get(&sid) {
            return existing.clone();
        }
        let name = structs[sid].name.as_str().to_string();
        let stub = module.declare_struct_stub(&name);
        self.struct_cache.insert(sid, stub.clone());
        stub
    }

    /// Fills in a struct's field list, recursively lowering (and, for nested
    /// struct fields, stubbing) each one. A no-op if already defined.
    pub fn define_struct_fields(
        &mut self,
        module: &mut IrModule,
        structs: &Arena<StructId, StructDecl>,
        sid: StructId,
    ) -> Result<()> {
        let stub = self.declare_struct_stub(module, structs, sid);
        if stub.fields.borrow().is_some() {
            return Ok(());
        }
        let mut fields = Vec::with_capacity(structs[sid].field_order.len());
        for fname in &structs[sid].field_order {
            let rt = structs[sid].fields[fname].clone();
            fields.push(self.lower(module, structs, &rt)?);
        }
        *stub.fields.borrow_mut() = Some(fields);
        Ok(())
    }

    /// Maps a `RealType` to its `IrType` (SPEC_FULL.md §4.2's scalar table, plus
    /// arrays/structs/enums), wrapping in `ptr` when the type carries a reference.
    pub fn lower(&mut self, module: &mut IrModule, structs: &Arena<StructId, StructDecl>, rt: &RealType) -> Result<IrType> {
        let base = match &rt.kind {
            TypeKind::Unit | TypeKind::Never => IrType::Void,
            TypeKind::Bool => IrType::i1(),
            TypeKind::Char => IrType::i8(),
            TypeKind::I32 | TypeKind::U32 | TypeKind::Isize | TypeKind::Usize | TypeKind::AnyInt => IrType::i32(),
            TypeKind::Str => self.str_type(module),
            TypeKind::String => self.string_type(module),
            TypeKind::Array(elem, n) => {
                let elem_ir = self.lower(module, structs, elem)?;
                IrType::Array(Box::new(elem_ir), *n)
            }
            TypeKind::Struct(_, sid) => IrType::Struct(self.declare_struct_stub(module, structs, *sid)),
            TypeKind::Enum(..) => IrType::i32(),
            TypeKind::Function(_) => return Err(CompileError::internal("function types are never lowered directly")),
        };
        Ok(if rt.is_referenced() { IrType::ptr(base) } else { base })
    }

    /// Byte size of a value of this type, used only for the builtin `len`/size
    /// bookkeeping the const-array global lowering needs; never emitted as an IR
    /// `sizeof` since this dialect has no such instruction.
    pub fn size_in_bytes(&mut self, module: &mut IrModule, structs: &Arena<StructId, StructDecl>, rt: &RealType) -> Result<u32> {
        if rt.is_referenced() {
            return Ok(4);
        }
        Ok(match &rt.kind {
            TypeKind::Unit | TypeKind::Never => 0,
            TypeKind::Bool | TypeKind::Char => 1,
            TypeKind::I32 | TypeKind::U32 | TypeKind::Isize | TypeKind::Usize | TypeKind::AnyInt => 4,
            TypeKind::Str => 8,
            TypeKind::String => 12,
            TypeKind::Enum(..) => 4,
            TypeKind::Array(elem, n) => self.size_in_bytes(module, structs, elem)? * n,
            TypeKind::Struct(_, sid) => {
                self.define_struct_fields(module, structs, *sid)?;
                let mut total = 0;
                for fname in &structs[*sid].field_order {
                    let field_ty = structs[*sid].fields[fname].clone();
                    total += self.size_in_bytes(module, structs, &field_ty)?;
                }
                total
            }
            TypeKind::Function(_) => return Err(CompileError::internal("function types have no size")),
        })
    }

    /// The IR return type and parameter list for a function, with the receiver (if
    /// any) prepended, and `main` forced to `i32` (SPEC_FULL.md §4.2, §6.1).
    pub fn lower_function(&mut self, module: &mut IrModule, prog: &Program, fid: FnId) -> Result<(IrType, Vec<IrType>)> {
        let decl = &prog.fns[fid];
        let mut params = Vec::with_capacity(decl.params.len() + 1);
        if decl.has_receiver() {
            let sid = decl
                .self_struct
                .ok_or_else(|| CompileError::internal("method missing its owning struct"))?;
            let struct_ir = IrType::Struct(self.declare_struct_stub(module, &prog.structs, sid));
            params.push(match decl.receiver {
                ReceiverKind::ByValue => struct_ir,
                ReceiverKind::Ref | ReceiverKind::RefMut => IrType::ptr(struct_ir),
                ReceiverKind::None => unreachable!("has_receiver() checked above"),
            });
        }
        for (_, ty, _) in &decl.params {
            params.push(self.lower(module, &prog.structs, ty)?);
        }
        let ret = if decl.is_main { IrType::i32() } else { self.lower(module, &prog.structs, &decl.return_type)? };
        Ok((ret, params))
    }

    /// Lowers a scalar constant to an `IrValue::Constant`. Returns `None` for
    /// array constants, which the global driver emits as their own global instead.
    pub fn lower_const(
        &mut self,
        module: &mut IrModule,
        structs: &Arena<StructId, StructDecl>,
        value: &ConstValue,
        expected: &RealType,
    ) -> Result<Option<IrValue>> {
        let literal = match value {
            ConstValue::Array(_) => return Ok(None),
            ConstValue::AnyInt(v) => *v,
            ConstValue::I32(v) => *v as i64,
            ConstValue::U32(v) => *v as i64,
            ConstValue::Isize(v) => *v as i64,
            ConstValue::Usize(v) => *v as i64,
            ConstValue::Bool(b) => *b as i64,
            ConstValue::Char(c) => *c as i64,
            ConstValue::Unit => return Ok(None),
        };
        let ty = self.lower(module, structs, expected)?;
        Ok(Some(IrValue::Constant { ty, literal }))
    }
}

/// Serializes a const array (possibly nested) as an LLVM aggregate initializer,
/// e.g. `[ i32 1, i32 2, i32 3 ]`.
pub fn serialize_const_array(
    tl: &mut TypeLowering,
    module: &mut IrModule,
    structs: &Arena<StructId, StructDecl>,
    values: &[ConstValue],
    elem_ty: &RealType,
) -> Result<String> {
    let elem_ir = tl.lower(module, structs, elem_ty)?;
    let mut parts = Vec::with_capacity(values.len());
    for v in values {
        match v {
            ConstValue::Array(inner) => {
                let inner_elem = match &elem_ty.kind {
                    TypeKind::Array(e, _) => e.as_ref(),
                    _ => return Err(CompileError::internal("nested const array without an array element type")),
                };
                let text = serialize_const_array(tl, module, structs, inner, inner_elem)?;
                parts.push(format!("{} {text}", elem_ir.to_string()));
            }
            scalar => {
                let iv = tl
                    .lower_const(module, structs, scalar, elem_ty)?
                    .ok_or_else(|| CompileError::internal("const array element did not lower to a scalar"))?;
                parts.push(iv.typed_repr());
            }
        }
    }
    Ok(format!("[ {} ]", parts.join(", ")))
}

/// Lowers a string literal to an anonymous, privately-linked `Str` global (a
/// `{ ptr, i32 }` pair pointing at its own byte-array global) and returns a
/// pointer to it, matching how every other `&str` value is represented
/// (SPEC_FULL.md §6.4): a reference to a `Str` fat pointer, not a bare byte
/// pointer.
pub fn lower_string_literal(module: &mut IrModule, tl: &mut TypeLowering, counter: &mut u32, text: &str) -> Result<IrValue> {
    let byte_len = text.as_bytes().len() as u32 + 1;
    let bytes_ty = IrType::Array(Box::new(IrType::i8()), byte_len);
    let bytes_init = encode_string_literal(text);
    let bytes_name = format!("str.{counter}.bytes");
    let bytes_global = module.create_global(bytes_name, bytes_ty, bytes_init, true)?;

    let str_ty = tl.str_type(module);
    let fat_init = format!("{{ ptr {}, i32 {} }}", bytes_global.repr(), text.as_bytes().len());
    let fat_name = format!("str.{counter}");
    *counter += 1;
    module.create_global(fat_name, str_ty, fat_init, true)
}
