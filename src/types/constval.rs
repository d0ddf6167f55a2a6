//! Constant values produced by const evaluation (SPEC_FULL.md §3.5).

use crate::error::{CompileError, Result};

#[derive(Clone, Debug, PartialEq)]
pub enum ConstValue {
    AnyInt(i64),
    I32(i32),
    U32(u32),
    Isize(i32),
    Usize(u32),
    Bool(bool),
    Char(char),
    Unit,
    Array(Vec<ConstValue>),
}

impl ConstValue {
    /// The value as a plain `i64`, for arithmetic that doesn't care about the
    /// concrete integer kind yet.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            ConstValue::AnyInt(v) => Some(v),
            ConstValue::I32(v) => Some(v as i64),
            ConstValue::U32(v) => Some(v as i64),
            ConstValue::Isize(v) => Some(v as i64),
            ConstValue::Usize(v) => Some(v as i64),
            _ => None,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ConstValue::AnyInt(_) | ConstValue::I32(_) | ConstValue::U32(_)
                | ConstValue::Isize(_) | ConstValue::Usize(_)
        )
    }

    /// Narrow an `AnyInt`/concrete integer constant to `Usize`, range-checking
    /// against unsigned 32-bit range, as required when evaluating an array size
    /// expression (§4.1.3).
    pub fn narrow_to_usize(&self) -> Result<u32> {
        match self {
            ConstValue::Usize(v) => Ok(*v),
            ConstValue::AnyInt(v) if *v >= 0 && *v <= u32::MAX as i64 => Ok(*v as u32),
            ConstValue::AnyInt(v) => {
                Err(CompileError::semantic(format!("array size {v} does not fit in usize")))
            }
            other => Err(CompileError::semantic(format!("array size must be usize, found {other:?}"))),
        }
    }
}
