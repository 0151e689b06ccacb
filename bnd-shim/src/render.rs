//! Renderer: [`SymbolEnvironment`] → self-contained C header text.
//!
//! The rendered text is the at-rest form of an environment: a preprocessor
//! run with `-nostdinc -I<dir>` picks it up in place of the real SDK header.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;
use crate::model::{Guard, SymbolEnvironment};
use crate::registry::{HeaderSet, normalize_header_name};

/// Include-guard macro for a header name: `sys/types.h` →
/// `BND_SHIM_SYS_TYPES_H`.
pub fn guard_macro(header: &str) -> String {
    let body: String = normalize_header_name(header)
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("BND_SHIM_{body}")
}

/// Render `env` as header text. Output is deterministic: rendering the same
/// environment twice yields identical bytes.
pub fn render_header(env: &SymbolEnvironment) -> String {
    let guard = guard_macro(&env.header);
    let models: Vec<&str> = env.models.iter().map(|m| m.name()).collect();

    let mut out = String::new();
    // `write!` into a String cannot fail.
    let _ = writeln!(
        out,
        "/* {}: fake header generated by bnd-shim ({}). Type shape only, no behavior. */",
        normalize_header_name(&env.header),
        models.join(", ")
    );
    let _ = writeln!(out, "#ifndef {guard}");
    let _ = writeln!(out, "#define {guard}");

    if !env.includes.is_empty() {
        out.push('\n');
        for include in &env.includes {
            let _ = writeln!(out, "#include <{}>", normalize_header_name(include));
        }
    }

    if env.uses_wchar() {
        out.push_str("\n#ifndef __cplusplus\ntypedef __WCHAR_TYPE__ wchar_t;\n#endif\n");
    }

    // Tags used before (or without) a definition here get a file-scope
    // declaration, so a prototype never declares its own `struct`.
    let mut declared: Vec<String> = env.records.iter().map(|r| r.ty().to_string()).collect();
    let mut forward = Vec::new();
    for ty in env.types() {
        for tag in ty.referenced_tags() {
            if !tag.starts_with("enum ") && !declared.contains(&tag) {
                declared.push(tag.clone());
                forward.push(tag);
            }
        }
    }
    if !forward.is_empty() {
        out.push('\n');
        for tag in &forward {
            let _ = writeln!(out, "{tag};");
        }
    }

    if !env.enums.is_empty() {
        out.push('\n');
        for e in &env.enums {
            match &e.tag {
                Some(tag) => {
                    let _ = writeln!(out, "enum {tag} {{");
                }
                None => out.push_str("enum {\n"),
            }
            let values: Vec<String> = e
                .enumerators
                .iter()
                .map(|v| format!("    {} = {}", v.name, v.value))
                .collect();
            let _ = writeln!(out, "{}\n}};", values.join(",\n"));
        }
    }

    if !env.aliases.is_empty() {
        out.push('\n');
        for alias in &env.aliases {
            let _ = writeln!(out, "typedef {};", alias.target.declare(&alias.name));
        }
    }

    for record in &env.records {
        let _ = writeln!(out, "\n{} {{", record.ty());
        for field in &record.fields {
            let _ = writeln!(out, "    {};", field.ty.declare(&field.name));
        }
        out.push_str("};\n");
    }

    if !env.constants.is_empty() {
        out.push('\n');
        for c in &env.constants {
            match c.guard {
                Guard::IfAbsent => {
                    let _ = writeln!(out, "#ifndef {0}\n#define {0} {1}\n#endif", c.name, c.value);
                }
                Guard::Always => {
                    let _ = writeln!(out, "#define {} {}", c.name, c.value);
                }
            }
        }
    }

    if !env.function_macros.is_empty() {
        out.push('\n');
        for m in &env.function_macros {
            match m.guard {
                Guard::IfAbsent => {
                    let _ = writeln!(
                        out,
                        "#ifndef {}\n#define {} {}\n#endif",
                        m.name,
                        m.signature(),
                        m.body
                    );
                }
                Guard::Always => {
                    let _ = writeln!(out, "#define {} {}", m.signature(), m.body);
                }
            }
        }
    }

    if !env.markers.is_empty() {
        out.push('\n');
        for m in &env.markers {
            let _ = writeln!(out, "#ifndef {}", m.name);
            match &m.expansion {
                Some(expansion) => {
                    let _ = writeln!(out, "#define {} {}", m.name, expansion);
                }
                None => {
                    let _ = writeln!(out, "#define {}", m.name);
                }
            }
            let _ = writeln!(out, "#endif");
        }
    }

    if !env.stubs.is_empty() {
        out.push('\n');
        for stub in &env.stubs {
            match &stub.convention_marker {
                Some(marker) => {
                    let _ = writeln!(out, "{marker} {};", stub.prototype());
                }
                None => {
                    let _ = writeln!(out, "{};", stub.prototype());
                }
            }
        }
    }

    let _ = writeln!(out, "\n#endif /* {guard} */");
    out
}

/// Write every header of `set` under `dir`, creating subdirectories for
/// names like `sys/types.h`. Returns the written paths.
pub fn write_set(set: &HeaderSet, dir: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for env in set.headers() {
        let path = dir.join(normalize_header_name(&env.header));
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, render_header(env))?;
        debug!(set = %set.name(), path = %path.display(), symbols = env.len(), "wrote fake header");
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::windows_h;
    use crate::model::{
        CType, CallConv, EnumDef, Enumerator, Field, MacroFunction, Param, RecordDef, RecordKind,
        StubDeclaration, TargetModel, TypeAlias,
    };

    #[test]
    fn guard_macro_names() {
        assert_eq!(guard_macro("windows.h"), "BND_SHIM_WINDOWS_H");
        assert_eq!(guard_macro("sys\\types.h"), "BND_SHIM_SYS_TYPES_H");
    }

    #[test]
    fn windows_h_text() {
        let text = render_header(&windows_h());
        assert!(text.contains("typedef unsigned long DWORD;"), "{text}");
        assert!(text.contains("typedef void *HANDLE;"), "{text}");
        assert!(text.contains("typedef const CHAR *LPCSTR;"), "{text}");
        assert!(text.contains("#ifndef TRUE\n#define TRUE 1\n#endif"), "{text}");
        assert!(text.contains("#define NULL ((void *)0)"), "{text}");
        assert!(text.contains("#define ERROR_SUCCESS 0L"), "{text}");
        assert!(text.contains("#ifndef WINAPI\n#define WINAPI\n#endif"), "{text}");
        assert!(text.contains("#define CONST const"), "{text}");
        assert!(text.contains("WINAPI void Sleep(DWORD dwMilliseconds);"), "{text}");
        assert!(text.contains("typedef __WCHAR_TYPE__ wchar_t;"), "{text}");
        assert_eq!(text, render_header(&windows_h()));
        assert!(!text.contains("#include"), "windows.h depends on nothing: {text}");
    }

    #[test]
    fn includes_come_right_after_the_guard() {
        let mut env = SymbolEnvironment::new("std_testcase.h", &[TargetModel::Win64]);
        env.includes = vec!["windows.h".to_string()];
        env.aliases.push(TypeAlias {
            name: "PDWORD".to_string(),
            target: CType::ptr(CType::named("DWORD")),
        });
        let text = render_header(&env);
        let include = text.find("#include <windows.h>").expect(&text);
        let guard = text.find("#define BND_SHIM_STD_TESTCASE_H").unwrap();
        let typedef = text.find("typedef DWORD *PDWORD;").unwrap();
        assert!(guard < include && include < typedef, "{text}");
    }

    #[test]
    fn records_enums_and_variadics() {
        let mut env = SymbolEnvironment::new("time.h", &[TargetModel::Win64]);
        env.enums.push(EnumDef {
            tag: Some("clockid_kind".to_string()),
            enumerators: vec![
                Enumerator {
                    name: "CLOCK_REALTIME".to_string(),
                    value: 0,
                },
                Enumerator {
                    name: "CLOCK_MONOTONIC".to_string(),
                    value: 4,
                },
            ],
        });
        env.enums.push(EnumDef {
            tag: None,
            enumerators: vec![Enumerator {
                name: "TIME_UTC".to_string(),
                value: 1,
            }],
        });
        env.aliases.push(TypeAlias {
            name: "clockid_kind".to_string(),
            target: CType::Enum("clockid_kind".to_string()),
        });
        env.records.push(RecordDef {
            kind: RecordKind::Struct,
            tag: "tm".to_string(),
            fields: vec![
                Field {
                    name: "tm_sec".to_string(),
                    ty: CType::Int,
                },
                Field {
                    name: "tm_zone".to_string(),
                    ty: CType::Array {
                        element: Box::new(CType::Char),
                        len: 8,
                    },
                },
            ],
        });
        env.function_macros.push(MacroFunction {
            name: "difftime_s".to_string(),
            params: vec!["a".to_string(), "b".to_string()],
            body: "((a) - (b))".to_string(),
            guard: Guard::Always,
        });
        let stub = |name: &str, return_type: CType, params: Vec<Param>, variadic: bool| {
            StubDeclaration {
                name: name.to_string(),
                return_type,
                params,
                calling_convention: CallConv::Cdecl,
                convention_marker: None,
                variadic,
            }
        };
        env.stubs = vec![
            stub("gettm", CType::record("tm"), vec![], false),
            stub(
                "put",
                CType::Void,
                vec![Param {
                    name: "t".to_string(),
                    ty: CType::record("tm"),
                }],
                false,
            ),
            stub(
                "close_file",
                CType::Int,
                vec![Param {
                    name: "f".to_string(),
                    ty: CType::ptr(CType::record("_iobuf")),
                }],
                false,
            ),
            stub(
                "printf",
                CType::Int,
                vec![Param {
                    name: "format".to_string(),
                    ty: CType::const_ptr(CType::Char),
                }],
                true,
            ),
        ];

        let text = render_header(&env);
        for fragment in [
            "struct _iobuf;\n",
            "enum clockid_kind {\n    CLOCK_REALTIME = 0,\n    CLOCK_MONOTONIC = 4\n};",
            "enum {\n    TIME_UTC = 1\n};",
            "typedef enum clockid_kind clockid_kind;",
            "struct tm {\n    int tm_sec;\n    char tm_zone[8];\n};",
            "#define difftime_s(a, b) ((a) - (b))",
            "struct tm gettm(void);",
            "void put(struct tm t);",
            "int close_file(struct _iobuf *f);",
            "int printf(const char *format, ...);",
        ] {
            assert!(text.contains(fragment), "missing {fragment:?} in:\n{text}");
        }
        assert!(!text.contains("void t"), "{text}");
        assert!(!text.contains("struct tm;"), "defined records need no forward declaration");
    }
}
