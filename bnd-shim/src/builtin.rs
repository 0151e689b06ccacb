//! Built-in fake header sets.

use crate::model::{
    CType, CallConv, Guard, MacroConstant, MacroValue, Marker, MarkerKind, Param,
    StubDeclaration, SymbolEnvironment, TargetModel, TypeAlias,
};
use crate::registry::{HeaderSet, Registry};

/// Names accepted by [`builtin_set`].
pub const BUILTIN_SETS: &[&str] = &["windows"];

/// Look up a built-in header set by name.
pub fn builtin_set(name: &str) -> Option<HeaderSet> {
    match name {
        "windows" => {
            let mut set = HeaderSet::new("windows");
            set.insert(windows_h());
            Some(set)
        }
        _ => None,
    }
}

/// Registry holding every built-in set.
pub fn builtin_registry() -> Registry {
    let mut registry = Registry::new();
    for name in BUILTIN_SETS {
        if let Some(set) = builtin_set(name) {
            registry.add_set(set);
        }
    }
    registry
}

/// `windows.h`: the Win32 integer, handle and string aliases, boolean/null
/// sentinels, no-op `WINAPI`/`IN`/`OUT`/`CONST` markers and two `void` stubs.
///
/// `WINAPI` expands to nothing, so `ExitProcess` and `Sleep` are declared
/// with the platform-default convention rather than `__stdcall`.
pub fn windows_h() -> SymbolEnvironment {
    let mut env = SymbolEnvironment::new("windows.h", &[TargetModel::Win32, TargetModel::Win64]);

    env.aliases = vec![
        alias("DWORD", CType::ULong),
        alias("BOOL", CType::Int),
        alias("ULONG", CType::ULong),
        alias("WORD", CType::UShort),
        alias("BYTE", CType::UChar),
        alias("HANDLE", CType::ptr(CType::Void)),
        alias("HWND", CType::named("HANDLE")),
        alias("CHAR", CType::Char),
        alias("WCHAR", CType::WChar),
        alias("LPWSTR", CType::ptr(CType::named("WCHAR"))),
        alias("LPCSTR", CType::const_ptr(CType::named("CHAR"))),
        alias("LPCWSTR", CType::const_ptr(CType::named("WCHAR"))),
        alias("LPVOID", CType::ptr(CType::Void)),
        alias("LONG", CType::Long),
        alias("UINT", CType::UInt),
    ];

    env.constants = vec![
        constant("FALSE", MacroValue::int(0), Guard::IfAbsent),
        constant("TRUE", MacroValue::int(1), Guard::IfAbsent),
        constant("NULL", MacroValue::NullPointer, Guard::IfAbsent),
        constant(
            "ERROR_SUCCESS",
            MacroValue::Integer {
                value: 0,
                literal: "0L".to_string(),
            },
            Guard::Always,
        ),
    ];

    env.markers = vec![
        marker("WINAPI", MarkerKind::CallingConvention, None),
        marker("IN", MarkerKind::Annotation, None),
        marker("OUT", MarkerKind::Annotation, None),
        marker("CONST", MarkerKind::Qualifier, Some("const")),
    ];

    env.stubs = vec![
        winapi_void("ExitProcess", "uExitCode", "UINT"),
        winapi_void("Sleep", "dwMilliseconds", "DWORD"),
    ];

    env
}

fn alias(name: &str, target: CType) -> TypeAlias {
    TypeAlias {
        name: name.to_string(),
        target,
    }
}

fn constant(name: &str, value: MacroValue, guard: Guard) -> MacroConstant {
    MacroConstant {
        name: name.to_string(),
        value,
        guard,
    }
}

fn marker(name: &str, kind: MarkerKind, expansion: Option<&str>) -> Marker {
    Marker {
        name: name.to_string(),
        kind,
        expansion: expansion.map(str::to_string),
    }
}

fn winapi_void(name: &str, param: &str, param_type: &str) -> StubDeclaration {
    StubDeclaration {
        name: name.to_string(),
        return_type: CType::Void,
        params: vec![Param {
            name: param.to_string(),
            ty: CType::named(param_type),
        }],
        calling_convention: CallConv::Cdecl,
        convention_marker: Some("WINAPI".to_string()),
        variadic: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_h_contents() {
        let env = windows_h();
        assert_eq!(env.aliases.len(), 15);
        assert_eq!(env.stub("Sleep").unwrap().return_type, CType::Void);
        assert_eq!(env.constant("TRUE").unwrap().guard, Guard::IfAbsent);
        assert_eq!(env.constant("ERROR_SUCCESS").unwrap().guard, Guard::Always);
        assert_eq!(
            env.marker("WINAPI").unwrap().kind,
            MarkerKind::CallingConvention
        );
        assert!(env.uses_wchar());
    }

    #[test]
    fn unknown_builtin() {
        assert!(builtin_set("cocoa").is_none());
        assert_eq!(builtin_registry().set_names(), vec!["windows".to_string()]);
    }
}
