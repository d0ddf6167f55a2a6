//! The IR entity model (SPEC_FULL.md §3.8): types, values, instructions, blocks,
//! functions and the module, plus their textual serialization. The text format is
//! a deliberately minimal LLVM-IR dialect and is produced bit-for-bit the way the
//! lowering/codegen half of the teacher's compiler produces it: one `to_string`
//! per entity, concatenated by the module.

use std::cell::RefCell;
use std::fmt::Write as _;
use std::rc::Rc;

/// A named aggregate type. Forward-declared by `declare_struct_stub` with empty
/// `fields`, then filled in by `define_struct_fields`; shared via `Rc` so every
/// `IrType::Struct` referring to the same name sees the fields once they land.
pub struct StructTypeData {
    pub name: String,
    pub fields: RefCell<Option<Vec<IrType>>>,
}

pub type StructTypeRef = Rc<StructTypeData>;

#[derive(Clone)]
pub enum IrType {
    Void,
    Integer(u32),
    Pointer(Box<IrType>),
    Array(Box<IrType>, u32),
    Struct(StructTypeRef),
    Function(Box<IrType>, Vec<IrType>),
}

impl IrType {
    pub fn i1() -> IrType { IrType::Integer(1) }
    pub fn i8() -> IrType { IrType::Integer(8) }
    pub fn i32() -> IrType { IrType::Integer(32) }

    pub fn ptr(inner: IrType) -> IrType {
        IrType::Pointer(Box::new(inner))
    }

    pub fn is_struct_named(&self, name: &str) -> bool {
        matches!(self, IrType::Struct(s) if s.name == name)
    }

    /// `None` until `define_struct_fields` has run for this struct.
    pub fn struct_fields(&self) -> Option<Vec<IrType>> {
        match self {
            IrType::Struct(s) => s.fields.borrow().clone(),
            _ => None,
        }
    }

    pub fn to_string(&self) -> String {
        match self {
            IrType::Void => "void".to_string(),
            IrType::Integer(bits) => format!("i{bits}"),
            IrType::Pointer(_) => "ptr".to_string(),
            IrType::Array(elem, size) => format!("[{size} x {}]", elem.to_string()),
            IrType::Struct(s) => format!("%{}", s.name),
            IrType::Function(ret, params) => {
                let params = params.iter().map(IrType::to_string).collect::<Vec<_>>().join(", ");
                format!("{}({params})", ret.to_string())
            }
        }
    }
}

impl PartialEq for IrType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (IrType::Void, IrType::Void) => true,
            (IrType::Integer(a), IrType::Integer(b)) => a == b,
            (IrType::Pointer(a), IrType::Pointer(b)) => a == b,
            (IrType::Array(ae, asz), IrType::Array(be, bsz)) => asz == bsz && ae == be,
            (IrType::Struct(a), IrType::Struct(b)) => a.name == b.name,
            (IrType::Function(ar, ap), IrType::Function(br, bp)) => ar == br && ap == bp,
            _ => false,
        }
    }
}

impl std::fmt::Debug for IrType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_string())
    }
}

/// An SSA value: a register produced by some instruction, a literal constant, or a
/// reference to a module-level global.
#[derive(Clone)]
pub enum IrValue {
    Register { name: String, ty: IrType },
    Constant { ty: IrType, literal: i64 },
    Global { name: String, ty: IrType },
}

impl IrValue {
    pub fn ty(&self) -> &IrType {
        match self {
            IrValue::Register { ty, .. } => ty,
            IrValue::Constant { ty, .. } => ty,
            IrValue::Global { ty, .. } => ty,
        }
    }

    /// The bare operand text, with no type prefix.
    pub fn repr(&self) -> String {
        match self {
            IrValue::Register { name, .. } => format!("%{name}"),
            IrValue::Global { name, .. } => format!("@{name}"),
            IrValue::Constant { ty, literal } => {
                if matches!(ty, IrType::Integer(1)) {
                    if *literal != 0 { "true".to_string() } else { "false".to_string() }
                } else {
                    literal.to_string()
                }
            }
        }
    }

    /// `<type> <operand>`, the form every instruction operand is printed in.
    pub fn typed_repr(&self) -> String {
        format!("{} {}", self.ty().to_string(), self.repr())
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum IcmpPredicate {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
    Ult,
    Ule,
    Ugt,
    Uge,
}

impl IcmpPredicate {
    fn mnemonic(self) -> &'static str {
        match self {
            IcmpPredicate::Eq => "eq",
            IcmpPredicate::Ne => "ne",
            IcmpPredicate::Slt => "slt",
            IcmpPredicate::Sle => "sle",
            IcmpPredicate::Sgt => "sgt",
            IcmpPredicate::Sge => "sge",
            IcmpPredicate::Ult => "ult",
            IcmpPredicate::Ule => "ule",
            IcmpPredicate::Ugt => "ugt",
            IcmpPredicate::Uge => "uge",
        }
    }
}

pub enum Instruction {
    Binary { op: &'static str, result: IrValue, lhs: IrValue, rhs: IrValue },
    Icmp { pred: IcmpPredicate, result: IrValue, lhs: IrValue, rhs: IrValue },
    Cast { op: &'static str, result: IrValue, value: IrValue, target: IrType },
    Alloca { result: IrValue, allocated_ty: IrType },
    Load { result: IrValue, ty: IrType, addr: IrValue },
    Store { value: IrValue, addr: IrValue },
    Gep { result: IrValue, root_ty: IrType, base: IrValue, indices: Vec<IrValue> },
    Br { target: String },
    CondBr { cond: IrValue, if_true: String, if_false: String },
    Ret { value: Option<IrValue> },
    Call { result: Option<IrValue>, callee: String, ret_ty: IrType, args: Vec<IrValue> },
}

impl Instruction {
    pub fn is_terminator(&self) -> bool {
        matches!(self, Instruction::Br { .. } | Instruction::CondBr { .. } | Instruction::Ret { .. })
    }

    pub fn result(&self) -> Option<&IrValue> {
        match self {
            Instruction::Binary { result, .. }
            | Instruction::Icmp { result, .. }
            | Instruction::Cast { result, .. }
            | Instruction::Alloca { result, .. }
            | Instruction::Load { result, .. }
            | Instruction::Gep { result, .. } => Some(result),
            Instruction::Call { result, .. } => result.as_ref(),
            Instruction::Store { .. } | Instruction::Br { .. } | Instruction::CondBr { .. } | Instruction::Ret { .. } => None,
        }
    }

    pub fn to_string(&self) -> String {
        match self {
            Instruction::Binary { op, result, lhs, rhs } => {
                format!("{} = {op} {}, {}", result.repr(), lhs.typed_repr(), rhs.repr())
            }
            Instruction::Icmp { pred, result, lhs, rhs } => {
                format!("{} = icmp {} {}, {}", result.repr(), pred.mnemonic(), lhs.typed_repr(), rhs.repr())
            }
            Instruction::Cast { op, result, value, target } => {
                format!("{} = {op} {} to {}", result.repr(), value.typed_repr(), target.to_string())
            }
            Instruction::Alloca { result, allocated_ty } => {
                format!("{} = alloca {}", result.repr(), allocated_ty.to_string())
            }
            Instruction::Load { result, ty, addr } => {
                format!("{} = load {}, {}", result.repr(), ty.to_string(), addr.typed_repr())
            }
            Instruction::Store { value, addr } => {
                format!("store {}, {}", value.typed_repr(), addr.typed_repr())
            }
            Instruction::Gep { result, root_ty, base, indices } => {
                let mut s = format!("{} = getelementptr {}, {}", result.repr(), root_ty.to_string(), base.typed_repr());
                for idx in indices {
                    let _ = write!(s, ", {}", idx.typed_repr());
                }
                s
            }
            Instruction::Br { target } => format!("br label %{target}"),
            Instruction::CondBr { cond, if_true, if_false } => {
                format!("br {}, label %{if_true}, label %{if_false}", cond.typed_repr())
            }
            Instruction::Ret { value } => match value {
                None => "ret void".to_string(),
                Some(v) => format!("ret {}", v.typed_repr()),
            },
            Instruction::Call { result, callee, ret_ty, args } => {
                let args = args.iter().map(IrValue::typed_repr).collect::<Vec<_>>().join(", ");
                match result {
                    Some(r) => format!("{} = call {} @{callee}({args})", r.repr(), ret_ty.to_string()),
                    None => format!("call {} @{callee}({args})", ret_ty.to_string()),
                }
            }
        }
    }
}

pub struct BasicBlock {
    pub label: String,
    pub instructions: Vec<Instruction>,
}

impl BasicBlock {
    pub fn new(label: String) -> Self {
        BasicBlock { label, instructions: Vec::new() }
    }

    pub fn terminator(&self) -> Option<&Instruction> {
        self.instructions.last().filter(|i| i.is_terminator())
    }

    /// Appends `inst`. If the block already ends in a terminator, a non-terminator
    /// instruction is inserted just before it instead (matching how the source's
    /// `append` keeps dead code after an early `return`/`break` from ever reaching
    /// the output, without the caller having to check reachability itself).
    pub fn append(&mut self, inst: Instruction) -> crate::error::Result<()> {
        if self.terminator().is_some() {
            if inst.is_terminator() {
                return crate::error::bug!("attempted to append a second terminator to block `{}`", self.label);
            }
            let last = self.instructions.len() - 1;
            self.instructions.insert(last, inst);
        } else {
            self.instructions.push(inst);
        }
        Ok(())
    }

    pub fn to_string(&self) -> String {
        let mut out = format!("{}:\n", self.label);
        for inst in &self.instructions {
            let _ = writeln!(out, "    {}", inst.to_string());
        }
        out
    }
}

pub struct IrFunction {
    pub name: String,
    pub params: Vec<(String, IrType)>,
    pub return_ty: IrType,
    pub blocks: Vec<BasicBlock>,
    pub is_declaration: bool,
    block_name_counters: hashbrown::HashMap<String, u32>,
}

impl IrFunction {
    pub fn new(name: String, params: Vec<(String, IrType)>, return_ty: IrType, is_declaration: bool) -> Self {
        IrFunction { name, params, return_ty, blocks: Vec::new(), is_declaration, block_name_counters: hashbrown::HashMap::new() }
    }

    pub fn fn_type(&self) -> IrType {
        IrType::Function(Box::new(self.return_ty.clone()), self.params.iter().map(|(_, t)| t.clone()).collect())
    }

    /// Creates a new block named `label` if unused, else `label.N` for the Nth reuse
    /// of that label within this function.
    pub fn create_block(&mut self, label: &str) -> usize {
        let n = self.block_name_counters.entry(label.to_string()).or_insert(0);
        let name = if *n == 0 { label.to_string() } else { format!("{label}.{n}") };
        *n += 1;
        let idx = self.blocks.len();
        self.blocks.push(BasicBlock::new(name));
        idx
    }

    pub fn signature_string(&self) -> String {
        let params = self
            .params
            .iter()
            .map(|(name, ty)| {
                if self.is_declaration && name.is_empty() {
                    ty.to_string()
                } else {
                    format!("{} %{name}", ty.to_string())
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("{} @{}({params})", self.return_ty.to_string(), self.name)
    }

    pub fn to_string(&self) -> String {
        if self.is_declaration {
            format!("declare {}\n", self.signature_string())
        } else {
            let mut out = format!("define {} {{\n", self.signature_string());
            for block in &self.blocks {
                out.push_str(&block.to_string());
            }
            out.push_str("}\n");
            out
        }
    }
}

pub struct GlobalValue {
    pub name: String,
    pub pointee: IrType,
    pub init_text: String,
    pub is_const: bool,
    pub linkage: String,
}

impl GlobalValue {
    pub fn definition_string(&self) -> String {
        let kind = if self.is_const { "constant" } else { "global" };
        format!("@{} = {} {kind} {} {}", self.name, self.linkage, self.pointee.to_string(), self.init_text)
    }
}

pub struct IrModule {
    pub target_triple: String,
    pub data_layout: String,
    pub comments: Vec<String>,
    pub type_definitions: Vec<StructTypeRef>,
    pub globals: Vec<GlobalValue>,
    pub functions: Vec<IrFunction>,
}

impl IrModule {
    pub fn new() -> Self {
        IrModule {
            target_triple: "i386-unknown-unknown".to_string(),
            data_layout: "e-m:e-p:32:32-i64:64-f64:64-n8:16:32-S128".to_string(),
            comments: Vec::new(),
            type_definitions: Vec::new(),
            globals: Vec::new(),
            functions: Vec::new(),
        }
    }

    pub fn declare_struct_stub(&mut self, name: &str) -> StructTypeRef {
        if let Some(existing) = self.type_definitions.iter().find(|s| s.name == name) {
            return existing.clone();
        }
        let data = Rc::new(StructTypeData { name: name.to_string(), fields: RefCell::new(None) });
        self.type_definitions.push(data.clone());
        data
    }

    pub fn find_struct(&self, name: &str) -> Option<StructTypeRef> {
        self.type_definitions.iter().find(|s| s.name == name).cloned()
    }

    pub fn create_global(&mut self, name: String, pointee: IrType, init_text: String, is_const: bool) -> crate::error::Result<IrValue> {
        if self.globals.iter().any(|g| g.name == name) {
            return crate::error::bug!("global `{name}` already declared");
        }
        self.globals.push(GlobalValue { name: name.clone(), pointee: pointee.clone(), init_text, is_const, linkage: "private".to_string() });
        Ok(IrValue::Global { name, ty: IrType::ptr(pointee) })
    }

    /// Returns the index of an existing function with this name, or declares (but
    /// does not define) a new one.
    pub fn declare_function(&mut self, name: String, params: Vec<(String, IrType)>, return_ty: IrType) -> usize {
        if let Some(idx) = self.functions.iter().position(|f| f.name == name) {
            return idx;
        }
        self.functions.push(IrFunction::new(name, params, return_ty, true));
        self.functions.len() - 1
    }

    /// Like `declare_function`, but flips `is_declaration` off — used when the
    /// caller is about to populate the body.
    pub fn define_function(&mut self, name: String, params: Vec<(String, IrType)>, return_ty: IrType) -> usize {
        let idx = self.declare_function(name, params, return_ty);
        self.functions[idx].is_declaration = false;
        idx
    }

    pub fn to_string(&self) -> String {
        let mut out = String::new();
        for c in &self.comments {
            let _ = writeln!(out, "; {c}");
        }
        if !self.comments.is_empty() {
            out.push('\n');
        }
        let _ = writeln!(out, "target triple = \"{}\"", self.target_triple);
        let _ = writeln!(out, "target datalayout = \"{}\"", self.data_layout);
        out.push('\n');

        for s in &self.type_definitions {
            let fields = s.fields.borrow();
            let fields = fields.as_ref().map(|f| f.iter().map(IrType::to_string).collect::<Vec<_>>().join(", ")).unwrap_or_default();
            let _ = writeln!(out, "%{} = type {{ {fields} }}", s.name);
        }
        if !self.type_definitions.is_empty() {
            out.push('\n');
        }

        for g in &self.globals {
            let _ = writeln!(out, "{}", g.definition_string());
        }
        if !self.globals.is_empty() {
            out.push('\n');
        }

        for f in self.functions.iter().filter(|f| f.is_declaration) {
            out.push_str(&f.to_string());
        }
        out.push('\n');
        for f in self.functions.iter().filter(|f| !f.is_declaration) {
            out.push('\n');
            out.push_str(&f.to_string());
        }
        out
    }
}

impl Default for IrModule {
    fn default() -> Self {
        IrModule::new()
    }
}

/// Encodes a string literal as an LLVM-style `c"..."` constant, NUL-terminated,
/// with every byte outside printable-ASCII-minus-quote-and-backslash escaped as
/// `\XX` uppercase hex.
pub fn encode_string_literal(text: &str) -> String {
    let mut out = String::from("c\"");
    for byte in text.bytes() {
        match byte {
            b'\\' | b'"' => {
                let _ = write!(out, "\\{byte:02X}");
            }
            0x20..=0x7e => out.push(byte as char),
            _ => {
                let _ = write!(out, "\\{byte:02X}");
            }
        }
    }
    out.push_str("\\00\"");
    out
}
