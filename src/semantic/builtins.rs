//! Registration of the runtime ABI (SPEC_FULL.md §6.5): the handful of free
//! functions and methods every program can call without declaring them, each
//! represented the same way a user `fn` is — a `FnDecl` with no body (`ast: None`).

use crate::symbol;
use crate::types::ast::{RefKind, ReceiverKind};
use crate::types::decl::FnDecl;
use crate::types::realty::{RealType, TypeKind};
use crate::types::scope::ValueNsEntry;

use super::{BuiltinReceiver, Program};

fn str_ref() -> RealType {
    RealType::new(TypeKind::Str, RefKind::Ref)
}
fn str_mut_ref() -> RealType {
    RealType::new(TypeKind::Str, RefKind::RefMut)
}
fn string_ty() -> RealType {
    RealType::value(TypeKind::String)
}
fn usize_ty() -> RealType {
    RealType::usize_()
}

struct Spec {
    name: &'static str,
    params: Vec<(&'static str, RealType, bool)>,
    return_type: RealType,
    receiver: ReceiverKind,
    is_exit: bool,
    is_array_len: bool,
}

fn push_fn(prog: &mut Program, spec: Spec) -> crate::types::FnId {
    let params = spec
        .params
        .into_iter()
        .map(|(name, ty, mutable)| (symbol::intern(name), ty, mutable))
        .collect();
    prog.fns.push(FnDecl {
        name: symbol::intern(spec.name),
        ast: None,
        function_scope: None,
        params,
        return_type: spec.return_type,
        receiver: spec.receiver,
        self_struct: None,
        is_main: false,
        is_exit: spec.is_exit,
        is_builtin: true,
        is_array_len: spec.is_array_len,
        param_let_decls: Vec::new(),
    })
}

fn free_fn(
    prog: &mut Program,
    name: &'static str,
    params: Vec<(&'static str, RealType, bool)>,
    return_type: RealType,
    is_exit: bool,
) {
    let fid = push_fn(
        prog,
        Spec { name, params, return_type, receiver: ReceiverKind::None, is_exit, is_array_len: false },
    );
    prog.scopes.get_mut(prog.scopes.root).values.insert(symbol::intern(name), ValueNsEntry::Fn(fid));
}

fn method(
    prog: &mut Program,
    recv: BuiltinReceiver,
    name: &'static str,
    receiver: ReceiverKind,
    params: Vec<(&'static str, RealType, bool)>,
    return_type: RealType,
    is_array_len: bool,
) {
    let fid = push_fn(prog, Spec { name, params, return_type, receiver, is_exit: false, is_array_len });
    prog.builtin_methods.insert((recv, symbol::intern(name)), fid);
}

fn assoc_fn(prog: &mut Program, type_name: &'static str, name: &'static str, params: Vec<(&'static str, RealType, bool)>, return_type: RealType) {
    let fid = push_fn(prog, Spec { name, params, return_type, receiver: ReceiverKind::None, is_exit: false, is_array_len: false });
    prog.builtin_assoc_fns.insert((symbol::intern(type_name), symbol::intern(name)), fid);
}

pub fn register(prog: &mut Program) {
    free_fn(prog, "print", vec![("s", str_ref(), false)], RealType::unit(), false);
    free_fn(prog, "println", vec![("s", str_ref(), false)], RealType::unit(), false);
    free_fn(prog, "printInt", vec![("n", RealType::i32_(), false)], RealType::unit(), false);
    free_fn(prog, "printlnInt", vec![("n", RealType::i32_(), false)], RealType::unit(), false);
    free_fn(prog, "getInt", vec![], RealType::i32_(), false);
    free_fn(prog, "exit", vec![("code", RealType::i32_(), false)], RealType::unit(), true);

    method(prog, BuiltinReceiver::UnsignedIshInt, "to_string", ReceiverKind::Ref, vec![], string_ty(), false);
    method(prog, BuiltinReceiver::String, "as_str", ReceiverKind::Ref, vec![], str_ref(), false);
    method(prog, BuiltinReceiver::String, "as_mut_str", ReceiverKind::RefMut, vec![], str_mut_ref(), false);
    method(prog, BuiltinReceiver::String, "append", ReceiverKind::RefMut, vec![("s", str_ref(), false)], RealType::unit(), false);
    method(prog, BuiltinReceiver::Array, "len", ReceiverKind::Ref, vec![], usize_ty(), true);
    method(prog, BuiltinReceiver::String, "len", ReceiverKind::Ref, vec![], usize_ty(), false);
    method(prog, BuiltinReceiver::Str, "len", ReceiverKind::Ref, vec![], usize_ty(), false);

    assoc_fn(prog, "String", "from", vec![("s", str_ref(), false)], string_ty());
}

/// The builtin receiver family a real type belongs to, if any — used to dispatch
/// `x.method(...)` to the right `builtin_methods` entry.
pub fn receiver_of(kind: &TypeKind) -> Option<BuiltinReceiver> {
    match kind {
        TypeKind::Array(..) => Some(BuiltinReceiver::Array),
        TypeKind::String => Some(BuiltinReceiver::String),
        TypeKind::Str => Some(BuiltinReceiver::Str),
        TypeKind::U32 | TypeKind::Usize | TypeKind::AnyInt => Some(BuiltinReceiver::UnsignedIshInt),
        _ => None,
    }
}
