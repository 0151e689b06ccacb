//! C type-name parser for declarative header data.
//!
//! Handles the spellings fake headers are written with: primitive specifier
//! lists in any order (`unsigned long`, `long unsigned int`), `const`,
//! pointer stars (with `const` after a star), alias names and tag references
//! (`struct tm`). Does NOT handle arrays, function pointers or struct bodies.

use crate::error::{Error, Result};
use crate::model::{CType, RecordKind};

/// Parse a C type spelling such as `const CHAR *` into a [`CType`].
///
/// Top-level qualifiers on a non-pointer are dropped: they do not change the
/// shape of the type.
pub fn parse_type(spelling: &str) -> Result<CType> {
    let tokens = tokenize(spelling);
    if tokens.is_empty() {
        return Err(invalid(spelling, "empty type"));
    }

    // Split base specifiers from the pointer part at the first `*`.
    let star = tokens.iter().position(|t| *t == "*").unwrap_or(tokens.len());
    let (base_tokens, pointer_tokens) = tokens.split_at(star);

    let base_const = base_tokens.contains(&"const");
    let specifiers: Vec<&str> = base_tokens
        .iter()
        .copied()
        .filter(|t| !matches!(*t, "const" | "volatile"))
        .collect();
    let mut ty = parse_specifiers(spelling, &specifiers)?;

    // Each `*` wraps the type so far; `const` right before a `*` qualifies
    // the pointee that star points to.
    let mut pending_const = base_const;
    for tok in pointer_tokens {
        match *tok {
            "*" => {
                ty = CType::Ptr {
                    pointee: Box::new(ty),
                    is_const: pending_const,
                };
                pending_const = false;
            }
            "const" => pending_const = true,
            "volatile" => {}
            other => return Err(invalid(spelling, &format!("unexpected `{other}` after `*`"))),
        }
    }
    Ok(ty)
}

fn parse_specifiers(spelling: &str, specifiers: &[&str]) -> Result<CType> {
    if specifiers.is_empty() {
        return Err(invalid(spelling, "missing type specifier"));
    }

    // A single non-keyword identifier names another alias.
    if specifiers.len() == 1 && !is_keyword(specifiers[0]) {
        let name = specifiers[0];
        if name == "wchar_t" {
            return Ok(CType::WChar);
        }
        if !is_identifier(name) {
            return Err(invalid(spelling, &format!("`{name}` is not an identifier")));
        }
        return Ok(CType::Named(name.to_string()));
    }

    if let [keyword @ ("struct" | "union" | "enum"), tag] = specifiers {
        if !is_identifier(tag) || is_keyword(tag) {
            return Err(invalid(spelling, &format!("`{tag}` is not a tag name")));
        }
        let tag = tag.to_string();
        return Ok(match *keyword {
            "struct" => CType::Record {
                kind: RecordKind::Struct,
                tag,
            },
            "union" => CType::Record {
                kind: RecordKind::Union,
                tag,
            },
            _ => CType::Enum(tag),
        });
    }

    let mut signed = false;
    let mut unsigned = false;
    let mut longs = 0usize;
    let mut base: Option<&str> = None;
    for spec in specifiers {
        match *spec {
            "signed" => signed = true,
            "unsigned" => unsigned = true,
            "long" => longs += 1,
            "void" | "_Bool" | "bool" | "char" | "short" | "int" | "float" | "double" => {
                // `int` only pairs with `short` here; `long`, `signed` and
                // `unsigned` are counted separately.
                base = match (base, *spec) {
                    (None, spec) => Some(spec),
                    (Some("short"), "int") | (Some("int"), "short") => Some("short"),
                    (Some(prev), spec) => {
                        return Err(invalid(spelling, &format!("`{prev}` combined with `{spec}`")));
                    }
                };
            }
            other => {
                return Err(invalid(spelling, &format!("unknown specifier `{other}`")));
            }
        }
    }
    if signed && unsigned {
        return Err(invalid(spelling, "both `signed` and `unsigned`"));
    }

    let ty = match (base, longs) {
        (Some("void"), 0) if !signed && !unsigned => CType::Void,
        (Some("_Bool") | Some("bool"), 0) if !signed && !unsigned => CType::Bool,
        (Some("float"), 0) if !signed && !unsigned => CType::Float,
        (Some("double"), 0) if !signed && !unsigned => CType::Double,
        (Some("char"), 0) if unsigned => CType::UChar,
        (Some("char"), 0) if signed => CType::SChar,
        (Some("char"), 0) => CType::Char,
        (Some("short"), 0) => {
            if unsigned {
                CType::UShort
            } else {
                CType::Short
            }
        }
        (Some("int") | None, 0) => {
            if unsigned {
                CType::UInt
            } else {
                CType::Int
            }
        }
        (Some("int") | None, 1) => {
            if unsigned {
                CType::ULong
            } else {
                CType::Long
            }
        }
        (Some("int") | None, 2) => {
            if unsigned {
                CType::ULongLong
            } else {
                CType::LongLong
            }
        }
        _ => return Err(invalid(spelling, "unsupported specifier combination")),
    };
    Ok(ty)
}

/// Split on whitespace, keeping `*` as its own token.
fn tokenize(s: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    for part in s.split_whitespace() {
        let mut remaining = part;
        while !remaining.is_empty() {
            if let Some(star_pos) = remaining.find('*') {
                if star_pos > 0 {
                    tokens.push(&remaining[..star_pos]);
                }
                tokens.push("*");
                remaining = &remaining[star_pos + 1..];
            } else {
                tokens.push(remaining);
                break;
            }
        }
    }
    tokens
}

fn is_keyword(tok: &str) -> bool {
    matches!(
        tok,
        "void"
            | "_Bool"
            | "bool"
            | "char"
            | "short"
            | "int"
            | "long"
            | "float"
            | "double"
            | "signed"
            | "unsigned"
            | "const"
            | "volatile"
            | "struct"
            | "union"
            | "enum"
    )
}

pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

fn invalid(spelling: &str, detail: &str) -> Error {
    Error::InvalidType {
        spelling: spelling.to_string(),
        detail: detail.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_spellings() {
        assert_eq!(parse_type("unsigned long").unwrap(), CType::ULong);
        assert_eq!(parse_type("long unsigned int").unwrap(), CType::ULong);
        assert_eq!(parse_type("unsigned").unwrap(), CType::UInt);
        assert_eq!(parse_type("short int").unwrap(), CType::Short);
        assert_eq!(parse_type("unsigned char").unwrap(), CType::UChar);
        assert_eq!(parse_type("signed char").unwrap(), CType::SChar);
        assert_eq!(parse_type("long long").unwrap(), CType::LongLong);
        assert_eq!(parse_type("wchar_t").unwrap(), CType::WChar);
        assert_eq!(parse_type("const int").unwrap(), CType::Int);
        assert_eq!(parse_type("int short unsigned").unwrap(), CType::UShort);
        assert_eq!(parse_type("long long unsigned int").unwrap(), CType::ULongLong);
        assert_eq!(parse_type("signed int").unwrap(), CType::Int);
    }

    #[test]
    fn tag_references() {
        assert_eq!(parse_type("struct tm").unwrap(), CType::record("tm"));
        assert_eq!(
            parse_type("const struct tm *").unwrap(),
            CType::const_ptr(CType::record("tm"))
        );
        assert_eq!(
            parse_type("union value").unwrap(),
            CType::Record {
                kind: RecordKind::Union,
                tag: "value".to_string()
            }
        );
        assert_eq!(parse_type("enum mode").unwrap(), CType::Enum("mode".to_string()));
        assert!(parse_type("struct").is_err());
        assert!(parse_type("struct int").is_err());
        assert!(parse_type("unsigned struct tm").is_err());
    }

    #[test]
    fn pointers_and_aliases() {
        assert_eq!(parse_type("void *").unwrap(), CType::ptr(CType::Void));
        assert_eq!(
            parse_type("const CHAR*").unwrap(),
            CType::const_ptr(CType::named("CHAR"))
        );
        assert_eq!(
            parse_type("WCHAR *").unwrap(),
            CType::ptr(CType::named("WCHAR"))
        );
        assert_eq!(
            parse_type("char *const *").unwrap(),
            CType::const_ptr(CType::ptr(CType::Char))
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_type("").is_err());
        assert!(parse_type("unsigned float").is_err());
        assert!(parse_type("signed unsigned int").is_err());
        assert!(parse_type("char double").is_err());
        assert!(parse_type("HANDLE HWND").is_err());
        assert!(parse_type("int * x").is_err());
        for spelling in [
            "char int",
            "void int",
            "float int",
            "double int",
            "_Bool int",
            "int int",
            "int char",
            "short short",
            "long char",
            "long short",
        ] {
            assert!(parse_type(spelling).is_err(), "`{spelling}` should be rejected");
        }
    }
}
