//! Literal text -> value parsing shared by pass 4 (expression typing) and the
//! constant folder (SPEC_FULL.md §6.2's token vocabulary: optional `0x` base
//! prefix, optional `_i32 | _u32 | _isize | _usize` suffix).

use crate::error::{CompileError, Result};
use crate::types::realty::TypeKind;

/// Splits a number token's text into its digits and an optional explicit suffix,
/// then parses the digits (decimal or `0x` hex) into an `i64`.
pub fn parse_number(text: &str) -> Result<(i64, Option<TypeKind>)> {
    const SUFFIXES: &[(&str, TypeKind)] = &[
        ("_isize", TypeKind::Isize),
        ("_usize", TypeKind::Usize),
        ("_i32", TypeKind::I32),
        ("_u32", TypeKind::U32),
    ];
    let mut digits = text;
    let mut suffix = None;
    for (tag, kind) in SUFFIXES {
        if let Some(stripped) = text.strip_suffix(tag) {
            digits = stripped;
            suffix = Some(kind.clone());
            break;
        }
    }
    let value = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(&hex.replace('_', ""), 16)
    } else {
        digits.replace('_', "").parse::<i64>()
    };
    let value = value.map_err(|_| CompileError::semantic(format!("malformed integer literal `{text}`")))?;
    Ok((value, suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_decimal() {
        assert_eq!(parse_number("42").unwrap(), (42, None));
    }

    #[test]
    fn parses_hex_with_suffix() {
        let (v, k) = parse_number("0x1A_i32").unwrap();
        assert_eq!(v, 26);
        assert_eq!(k, Some(TypeKind::I32));
    }

    #[test]
    fn parses_usize_suffix() {
        assert_eq!(parse_number("3_usize").unwrap(), (3, Some(TypeKind::Usize)));
    }
}
