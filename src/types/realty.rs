//! Real types: the language's semantic type system (SPEC_FULL.md §3.4).

use crate::symbol::Symbol;
use crate::types::ast::RefKind;
use crate::types::{EnumId, FnId, StructId};

/// The closed set of semantic type kinds. `AnyInt` is a type-inference placeholder
/// that pass 4 must eliminate before IR generation (§9 Design Notes).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeKind {
    Unit,
    Never,
    Bool,
    Char,
    I32,
    U32,
    Isize,
    Usize,
    AnyInt,
    Str,
    String,
    Array(Box<RealType>, u32),
    Struct(Symbol, StructId),
    Enum(Symbol, EnumId),
    Function(FnId),
}

/// A real type always carries a reference tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RealType {
    pub kind: TypeKind,
    pub reference: RefKind,
}

impl RealType {
    pub fn new(kind: TypeKind, reference: RefKind) -> Self {
        RealType { kind, reference }
    }

    pub fn value(kind: TypeKind) -> Self {
        RealType::new(kind, RefKind::None)
    }

    pub fn unit() -> Self { RealType::value(TypeKind::Unit) }
    pub fn never() -> Self { RealType::value(TypeKind::Never) }
    pub fn bool_() -> Self { RealType::value(TypeKind::Bool) }
    pub fn i32_() -> Self { RealType::value(TypeKind::I32) }
    pub fn usize_() -> Self { RealType::value(TypeKind::Usize) }
    pub fn any_int() -> Self { RealType::value(TypeKind::AnyInt) }

    pub fn is_never(&self) -> bool {
        matches!(self.kind, TypeKind::Never)
    }

    pub fn is_any_int(&self) -> bool {
        matches!(self.kind, TypeKind::AnyInt)
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::I32 | TypeKind::U32 | TypeKind::Isize | TypeKind::Usize | TypeKind::AnyInt
        )
    }

    pub fn is_unsigned(&self) -> bool {
        matches!(self.kind, TypeKind::U32 | TypeKind::Usize)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer()
    }

    pub fn is_referenced(&self) -> bool {
        !matches!(self.reference, RefKind::None)
    }

    /// Strips one layer of reference, as field/index auto-deref does.
    pub fn deref_once(&self) -> RealType {
        RealType::new(self.kind.clone(), RefKind::None)
    }

    pub fn with_reference(&self, reference: RefKind) -> RealType {
        RealType::new(self.kind.clone(), reference)
    }
}

/// Whether an expression denotes a memory location, and if so whether it may be
/// written through (SPEC_FULL.md §3.7).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PlaceKind {
    NotPlace,
    ReadOnlyPlace,
    ReadWritePlace,
}

impl PlaceKind {
    pub fn from_mutable(mutable: bool) -> Self {
        if mutable { PlaceKind::ReadWritePlace } else { PlaceKind::ReadOnlyPlace }
    }

    pub fn is_writable(self) -> bool {
        matches!(self, PlaceKind::ReadWritePlace)
    }

    /// Field/index auto-deref: `&Struct` yields a read-only place, `&mut Struct`
    /// yields a read-write place, regardless of the base's own place kind.
    pub fn auto_deref(base_reference: RefKind, base_place: PlaceKind) -> PlaceKind {
        match base_reference {
            RefKind::Ref => PlaceKind::ReadOnlyPlace,
            RefKind::RefMut => PlaceKind::ReadWritePlace,
            RefKind::None => base_place,
        }
    }
}

/// `merge(left, right, is_assignment)` per SPEC_FULL.md §4.1.6.
pub fn merge(left: &RealType, right: &RealType, is_assignment: bool) -> Result<RealType, String> {
    if left.is_never() {
        return Ok(right.clone());
    }
    if right.is_never() {
        return Ok(left.clone());
    }

    let reference = match (left.reference, right.reference) {
        (a, b) if a == b => a,
        (RefKind::RefMut, RefKind::Ref) | (RefKind::Ref, RefKind::RefMut) => {
            if is_assignment && left.reference == RefKind::RefMut {
                return Err("cannot assign a shared reference into a `&mut` place".into());
            }
            RefKind::Ref
        }
        _ => return Err(format!("reference kind mismatch: {:?} vs {:?}", left.reference, right.reference)),
    };

    if left.is_any_int() && right.is_numeric() {
        return Ok(RealType::new(right.kind.clone(), reference));
    }
    if right.is_any_int() && left.is_numeric() {
        return Ok(RealType::new(left.kind.clone(), reference));
    }

    let kind = match (&left.kind, &right.kind) {
        (TypeKind::Array(le, ls), TypeKind::Array(re, rs)) => {
            if ls != rs {
                return Err(format!("array size mismatch: {ls} vs {rs}"));
            }
            let elem = merge(le, re, false)?;
            TypeKind::Array(Box::new(elem), *ls)
        }
        (TypeKind::Struct(_, lid), TypeKind::Struct(_, rid)) => {
            if lid != rid {
                return Err("struct types are not the same declaration".into());
            }
            left.kind.clone()
        }
        (TypeKind::Enum(_, lid), TypeKind::Enum(_, rid)) => {
            if lid != rid {
                return Err("enum types are not the same declaration".into());
            }
            left.kind.clone()
        }
        (a, b) if a == b => left.kind.clone(),
        (a, b) => return Err(format!("type mismatch: {a:?} vs {b:?}")),
    };

    Ok(RealType::new(kind, reference))
}

/// §4.1.5 cast legality: does `from as to` type-check (IR-level sign/zero extension
/// and truncation is chosen later, in irgen, from the concrete widths/signedness).
pub fn cast_is_legal(from: &RealType, to: &RealType) -> bool {
    use TypeKind::*;
    match (from.reference, to.reference) {
        (RefKind::None, RefKind::None) => {}
        (RefKind::RefMut, RefKind::Ref) => {}
        (a, b) if a == b => {}
        _ => return false,
    }
    match (&from.kind, &to.kind) {
        (I32 | U32 | Isize | Usize | AnyInt, I32 | U32 | Isize | Usize) => true,
        (Char, I32 | U32 | Isize | Usize) => true,
        (Bool, I32 | U32 | Isize | Usize) => true,
        (Enum(..), I32 | U32 | Isize | Usize) => true,
        (Array(le, ls), Array(re, rs)) => ls == rs && cast_is_legal(le, re),
        (a, b) if a == b => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_int_merges_into_concrete() {
        let m = merge(&RealType::any_int(), &RealType::i32_(), false).unwrap();
        assert_eq!(m.kind, TypeKind::I32);
    }

    #[test]
    fn never_absorbs() {
        let m = merge(&RealType::never(), &RealType::bool_(), false).unwrap();
        assert_eq!(m.kind, TypeKind::Bool);
    }

    #[test]
    fn mismatched_scalars_fail() {
        assert!(merge(&RealType::i32_(), &RealType::bool_(), false).is_err());
    }

    #[test]
    fn mut_ref_into_shared_ref_assignment_fails() {
        let left = RealType::new(TypeKind::I32, RefKind::RefMut);
        let right = RealType::new(TypeKind::I32, RefKind::Ref);
        assert!(merge(&left, &right, true).is_err());
    }
}
