//! Constant evaluation (SPEC_FULL.md §4.1.3). A single recursive, memoizing
//! evaluator serves two callers: pass 2's array-size resolution (a size-expression
//! may reference a `const` declared anywhere visible, regardless of declaration
//! order) and pass 3's sweep that evaluates every `const` item so its value is
//! available to IR lowering even if nothing else in the program references it.
//! Memoizing in `Program::const_values` keyed by `ConstId` makes evaluation order
//! irrelevant: whichever caller reaches a given const first evaluates it, and every
//! later caller just reads the cached value.

use crate::error::{CompileError, Result};
use crate::symbol::Symbol;
use crate::types::ast::*;
use crate::types::constval::ConstValue;
use crate::types::scope::{TypeNsEntry, ValueNsEntry};
use crate::types::{ConstId, ScopeId};

use super::{find_item, Program};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum IntKind {
    AnyInt,
    I32,
    U32,
    Isize,
    Usize,
}

fn int_kind(v: &ConstValue) -> Option<IntKind> {
    Some(match v {
        ConstValue::AnyInt(_) => IntKind::AnyInt,
        ConstValue::I32(_) => IntKind::I32,
        ConstValue::U32(_) => IntKind::U32,
        ConstValue::Isize(_) => IntKind::Isize,
        ConstValue::Usize(_) => IntKind::Usize,
        _ => return None,
    })
}

fn make_int(kind: IntKind, value: i64) -> Result<ConstValue> {
    Ok(match kind {
        IntKind::AnyInt => ConstValue::AnyInt(value),
        IntKind::I32 => ConstValue::I32(range_check_i32(value)?),
        IntKind::Isize => ConstValue::Isize(range_check_i32(value)?),
        IntKind::U32 => ConstValue::U32(range_check_u32(value)?),
        IntKind::Usize => ConstValue::Usize(range_check_u32(value)?),
    })
}

/// Shared with pass 4, which range-checks suffixed integer literals the same way.
pub(super) fn range_check_i32(value: i64) -> Result<i32> {
    i32::try_from(value).map_err(|_| CompileError::semantic(format!("constant {value} does not fit in a 32-bit signed integer")))
}

pub(super) fn range_check_u32(value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| CompileError::semantic(format!("constant {value} does not fit in a 32-bit unsigned integer")))
}

/// The common kind two integer constants unify to, `AnyInt` absorbing into
/// whichever side is concrete (SPEC_FULL.md §4.1.6's merge rule, restated for
/// values instead of types).
fn unify_kind(a: IntKind, b: IntKind) -> Result<IntKind> {
    match (a, b) {
        (IntKind::AnyInt, k) | (k, IntKind::AnyInt) => Ok(k),
        (a, b) if a == b => Ok(a),
        (a, b) => Err(CompileError::semantic(format!("integer constant kind mismatch: {a:?} vs {b:?}"))),
    }
}

/// Evaluates and memoizes the value of a `const` declaration, following its
/// initializer expression on demand.
pub fn eval_const_id(items: &[Item], prog: &mut Program, cid: ConstId) -> Result<ConstValue> {
    if let Some(v) = prog.const_values.get(&cid) {
        return Ok(v.clone());
    }
    let item_id = *prog.const_item.get(&cid).expect("const decl missing its item node");
    let item = find_item(items, item_id).expect("const item not found in AST");
    let ItemKind::Const { value, .. } = &item.kind else { panic!("const_item pointed at a non-const item") };
    let scope = *prog.item_decl_scope.get(&item_id).expect("const item missing its decl scope");
    let value = eval_const_expr(items, prog, scope, value)?;
    prog.const_values.insert(cid, value.clone());
    Ok(value)
}

fn lookup_const_by_name(prog: &Program, scope: ScopeId, name: Symbol) -> Option<ConstId> {
    match prog.scopes.lookup_value(scope, name) {
        Some(ValueNsEntry::Const(cid)) => Some(cid),
        _ => None,
    }
}

/// Resolves the struct/enum named by a (possibly `Self`) type path, for
/// `Type::member` constant expressions.
fn resolve_type_ns(prog: &Program, scope: ScopeId, ty: &Type) -> Option<TypeNsEntry> {
    match &ty.kind {
        TypeKind::Path { name, .. } => prog.scopes.lookup_type(scope, *name),
        TypeKind::SelfType => {
            let impl_scope = prog.scopes.enclosing_impl(scope)?;
            let data = prog.scopes.get(impl_scope);
            if let Some(self_ty) = &data.self_type {
                return match &self_ty.kind {
                    crate::types::realty::TypeKind::Struct(_, sid) => Some(TypeNsEntry::Struct(*sid)),
                    crate::types::realty::TypeKind::Enum(_, eid) => Some(TypeNsEntry::Enum(*eid)),
                    _ => None,
                };
            }
            let name = data.impl_struct?;
            prog.scopes.lookup_type(prog.scopes.get(impl_scope).parent.unwrap_or(scope), name)
        }
        _ => None,
    }
}

pub fn eval_const_expr(items: &[Item], prog: &mut Program, scope: ScopeId, expr: &Expr) -> Result<ConstValue> {
    match &expr.kind {
        ExprKind::Literal(LiteralKind::Number, text) => {
            let (value, suffix) = super::literals::parse_number(text)?;
            Ok(match suffix {
                None => ConstValue::AnyInt(value),
                Some(crate::types::realty::TypeKind::I32) => ConstValue::I32(range_check_i32(value)?),
                Some(crate::types::realty::TypeKind::U32) => ConstValue::U32(range_check_u32(value)?),
                Some(crate::types::realty::TypeKind::Isize) => ConstValue::Isize(range_check_i32(value)?),
                Some(crate::types::realty::TypeKind::Usize) => ConstValue::Usize(range_check_u32(value)?),
                Some(_) => unreachable!("parse_number only yields integer suffix kinds"),
            })
        }
        ExprKind::Literal(LiteralKind::Bool, text) => Ok(ConstValue::Bool(text == "true")),
        ExprKind::Literal(LiteralKind::Char, text) => {
            Ok(ConstValue::Char(text.chars().next().unwrap_or('\0')))
        }
        ExprKind::Literal(LiteralKind::Str, _) => {
            Err(CompileError::semantic("string literals are not constant-foldable".to_string()))
        }
        ExprKind::Unit => Ok(ConstValue::Unit),
        ExprKind::Identifier(name) => {
            let cid = lookup_const_by_name(prog, scope, *name)
                .ok_or_else(|| CompileError::semantic(format!("`{name}` is not a constant expression")))?;
            eval_const_id(items, prog, cid)
        }
        ExprKind::Path(ty, member) => {
            match resolve_type_ns(prog, scope, ty) {
                Some(TypeNsEntry::Enum(eid)) => {
                    let decl = &prog.enums[eid];
                    let disc = decl
                        .discriminant(*member)
                        .ok_or_else(|| CompileError::semantic(format!("enum `{}` has no variant `{member}`", decl.name)))?;
                    Ok(ConstValue::AnyInt(disc as i64))
                }
                Some(TypeNsEntry::Struct(sid)) => {
                    let cid = *prog.structs[sid]
                        .associated_const
                        .get(member)
                        .ok_or_else(|| CompileError::semantic(format!("no associated const `{member}` on this struct")))?;
                    eval_const_id(items, prog, cid)
                }
                None => Err(CompileError::semantic("path expression does not name a struct or enum".to_string())),
            }
        }
        ExprKind::Unary(op, operand) => {
            let v = eval_const_expr(items, prog, scope, operand)?;
            eval_unary(*op, v)
        }
        ExprKind::Binary(op, lhs, rhs) if !op.is_assignment() => {
            let l = eval_const_expr(items, prog, scope, lhs)?;
            let r = eval_const_expr(items, prog, scope, rhs)?;
            eval_binary(*op, l, r)
        }
        ExprKind::Cast(inner, ty) => {
            let v = eval_const_expr(items, prog, scope, inner)?;
            eval_cast(v, ty)
        }
        ExprKind::Array(elems) => {
            let values = elems
                .iter()
                .map(|e| eval_const_expr(items, prog, scope, e))
                .collect::<Result<Vec<_>>>()?;
            Ok(ConstValue::Array(values))
        }
        ExprKind::RepeatArray(elem, size) => {
            let v = eval_const_expr(items, prog, scope, elem)?;
            let n = eval_const_expr(items, prog, scope, size)?.narrow_to_usize()?;
            Ok(ConstValue::Array(vec![v; n as usize]))
        }
        _ => Err(CompileError::semantic("expression is not constant-foldable".to_string())),
    }
}

fn eval_unary(op: UnaryOp, v: ConstValue) -> Result<ConstValue> {
    match op {
        UnaryOp::Neg => {
            let kind = int_kind(&v).ok_or_else(|| CompileError::semantic("`-` requires a numeric constant".to_string()))?;
            make_int(kind, -v.as_i64().unwrap())
        }
        UnaryOp::Not => match v {
            ConstValue::Bool(b) => Ok(ConstValue::Bool(!b)),
            other => {
                let kind = int_kind(&other).ok_or_else(|| CompileError::semantic("`!` requires a numeric or bool constant".to_string()))?;
                let mask = match kind {
                    IntKind::U32 | IntKind::Usize => !(other.as_i64().unwrap() as u32) as i64,
                    _ => !(other.as_i64().unwrap() as i32) as i64,
                };
                make_int(kind, mask)
            }
        },
        _ => Err(CompileError::semantic("operator is not valid in a constant expression".to_string())),
    }
}

fn eval_binary(op: BinaryOp, l: ConstValue, r: ConstValue) -> Result<ConstValue> {
    if op.is_logical() {
        return match (l, r) {
            (ConstValue::Bool(a), ConstValue::Bool(b)) => {
                Ok(ConstValue::Bool(if op == BinaryOp::AndAnd { a && b } else { a || b }))
            }
            _ => Err(CompileError::semantic("`&&`/`||` require bool operands".to_string())),
        };
    }

    let (lk, rk) = (int_kind(&l), int_kind(&r));
    if let (Some(lk), Some(rk)) = (lk, rk) {
        let kind = unify_kind(lk, rk)?;
        let a = l.as_i64().unwrap();
        let b = r.as_i64().unwrap();
        if op.is_comparison() {
            let result = match op {
                BinaryOp::Eq => a == b,
                BinaryOp::Ne => a != b,
                BinaryOp::Lt => a < b,
                BinaryOp::Le => a <= b,
                BinaryOp::Gt => a > b,
                BinaryOp::Ge => a >= b,
                _ => unreachable!(),
            };
            return Ok(ConstValue::Bool(result));
        }
        let value = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Div => {
                if b == 0 {
                    return Err(CompileError::semantic("division by zero in constant expression".to_string()));
                }
                a.checked_div(b)
            }
            BinaryOp::Rem => {
                if b == 0 {
                    return Err(CompileError::semantic("modulus by zero in constant expression".to_string()));
                }
                a.checked_rem(b)
            }
            BinaryOp::And => Some(a & b),
            BinaryOp::Or => Some(a | b),
            BinaryOp::Xor => Some(a ^ b),
            BinaryOp::Shl => Some(a << b),
            BinaryOp::Shr => Some(a >> b),
            _ => return Err(CompileError::semantic("operator is not valid in a constant expression".to_string())),
        };
        let value = value.ok_or_else(|| CompileError::semantic("integer overflow in constant expression".to_string()))?;
        return make_int(kind, value);
    }

    match (l, r) {
        (ConstValue::Bool(a), ConstValue::Bool(b)) if op.is_comparison() => {
            let result = match op {
                BinaryOp::Eq => a == b,
                BinaryOp::Ne => a != b,
                _ => return Err(CompileError::semantic("bool only supports `==`/`!=`".to_string())),
            };
            Ok(ConstValue::Bool(result))
        }
        (ConstValue::Char(a), ConstValue::Char(b)) if op.is_comparison() => {
            let result = match op {
                BinaryOp::Eq => a == b,
                BinaryOp::Ne => a != b,
                BinaryOp::Lt => a < b,
                BinaryOp::Le => a <= b,
                BinaryOp::Gt => a > b,
                BinaryOp::Ge => a >= b,
                _ => unreachable!(),
            };
            Ok(ConstValue::Bool(result))
        }
        _ => Err(CompileError::semantic("operand types are not valid for this operator in a constant expression".to_string())),
    }
}

fn eval_cast(v: ConstValue, ty: &Type) -> Result<ConstValue> {
    use crate::types::ast::TypeKind as AstTypeKind;
    let AstTypeKind::Path { name, .. } = &ty.kind else {
        return Err(CompileError::semantic("unsupported cast target in constant expression".to_string()));
    };
    let raw = match &v {
        ConstValue::Char(c) => *c as i64,
        ConstValue::Bool(b) => *b as i64,
        other => other.as_i64().ok_or_else(|| CompileError::semantic("value is not castable in a constant expression".to_string()))?,
    };
    Ok(match name.as_str() {
        "i32" => ConstValue::I32(range_check_i32(raw)?),
        "u32" => ConstValue::U32(range_check_u32(raw)?),
        "isize" => ConstValue::Isize(range_check_i32(raw)?),
        "usize" => ConstValue::Usize(range_check_u32(raw)?),
        other => return Err(CompileError::semantic(format!("cannot cast to `{other}` in a constant expression"))),
    })
}
