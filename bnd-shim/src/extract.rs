//! Extraction: fake (or real) header text → [`SymbolEnvironment`] via libclang.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use clang::{CallingConvention, Entity, EntityKind, Index, Type as ClangType, TypeKind};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::model::*;
use crate::registry::HeaderSet;

/// Empty macros with these names are calling-convention markers; any other
/// empty macro is treated as an annotation.
const CALLING_CONVENTION_MARKERS: &[&str] = &[
    "WINAPI",
    "WINAPIV",
    "APIENTRY",
    "CALLBACK",
    "PASCAL",
    "NTAPI",
    "STDMETHODCALLTYPE",
    "CDECL",
    "__stdcall",
    "__cdecl",
    "__fastcall",
];

const QUALIFIERS: &[&str] = &["const", "volatile", "restrict"];

/// Parse `path` and collect the typedefs, records, enums, macros and
/// function declarations written in that file.
///
/// `header` is the identity the environment is registered under (e.g.
/// `sys/types.h`). Declarations pulled in from other files are skipped.
pub fn extract_header(
    index: &Index,
    path: &Path,
    header: &str,
    models: &[TargetModel],
    clang_args: &[String],
) -> Result<SymbolEnvironment> {
    debug!(path = %path.display(), header, "parsing header");
    let text = std::fs::read_to_string(path)?;
    let directives = scan_directives(&text);

    let tu = index
        .parser(path)
        .arguments(clang_args)
        .detailed_preprocessing_record(true)
        .skip_function_bodies(true)
        .parse()
        .map_err(|e| Error::Clang(format!("failed to parse {}: {e:?}", path.display())))?;

    let entities = tu.get_entity().get_children();
    let in_scope = |e: &Entity| is_in_file(e, path);

    let names = TagNames::collect(&entities, &in_scope);

    let mut env = SymbolEnvironment::new(header, models);
    env.enums = collect_enums(&entities, &in_scope, &names);
    env.records = collect_records(&entities, &in_scope, &names);
    env.aliases = collect_typedefs(&entities, &in_scope, &names);
    let macros = collect_macros(&entities, &in_scope, &directives);
    env.constants = macros.constants;
    env.function_macros = macros.functions;
    env.markers = macros.markers;
    env.stubs = collect_functions(&entities, &in_scope, &names, &text, &env.markers);

    tracing::info!(
        header,
        aliases = env.aliases.len(),
        records = env.records.len(),
        enums = env.enums.len(),
        constants = env.constants.len(),
        function_macros = env.function_macros.len(),
        markers = env.markers.len(),
        stubs = env.stubs.len(),
        "header extraction complete"
    );
    Ok(env)
}

/// Extract every `.h` file under `dir` into a header set named `name`.
/// Header identities are paths relative to `dir` with `/` separators.
pub fn extract_dir(
    index: &Index,
    name: &str,
    dir: &Path,
    models: &[TargetModel],
    clang_args: &[String],
) -> Result<HeaderSet> {
    let mut args: Vec<String> = clang_args.to_vec();
    let flag = format!("-I{}", dir.display());
    if !args.contains(&flag) {
        args.push(flag);
    }

    let mut files = Vec::new();
    collect_header_files(dir, &mut files)?;
    files.sort();

    let mut set = HeaderSet::new(name);
    for file in files {
        let relative = file
            .strip_prefix(dir)
            .unwrap_or(&file)
            .to_string_lossy()
            .replace('\\', "/");
        let env = extract_header(index, &file, &relative, models, &args)?;
        set.insert(env);
    }
    Ok(set)
}

fn collect_header_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_header_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "h") {
            out.push(path);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Directive scanning
// ---------------------------------------------------------------------------

/// What a plain-text pass over the header tells us that libclang does not:
/// which macros sit inside `#ifndef NAME / #define NAME` and which one is
/// the include guard.
#[derive(Debug, Default, PartialEq, Eq)]
struct Directives {
    include_guard: Option<String>,
    guarded: HashSet<String>,
}

fn scan_directives(text: &str) -> Directives {
    let mut lines = Vec::new();
    let mut in_comment = false;
    for raw in text.lines() {
        let mut line = raw.trim();
        if in_comment {
            match line.find("*/") {
                Some(end) => {
                    in_comment = false;
                    line = line[end + 2..].trim();
                }
                None => continue,
            }
        }
        if let Some(start) = line.find("/*") {
            match line[start..].find("*/") {
                Some(_) => {}
                None => in_comment = true,
            }
            if start == 0 {
                // whole-line comment (or comment opener)
                if in_comment || line.ends_with("*/") {
                    continue;
                }
            }
        }
        if line.is_empty() || line.starts_with("//") {
            continue;
        }
        lines.push(line);
    }

    let mut directives = Directives::default();
    for (i, pair) in lines.windows(2).enumerate() {
        let Some(tested) = directive_arg(pair[0], "ifndef") else {
            continue;
        };
        let Some(defined) = directive_arg(pair[1], "define") else {
            continue;
        };
        let defined_name = defined.split_whitespace().next().unwrap_or_default();
        if tested != defined_name {
            continue;
        }
        if i == 0 && defined.split_whitespace().count() == 1 && looks_like_include_guard(tested) {
            directives.include_guard = Some(tested.to_string());
        } else {
            directives.guarded.insert(tested.to_string());
        }
    }
    directives
}

fn looks_like_include_guard(name: &str) -> bool {
    name.ends_with("_H") || name.ends_with("_H_") || name.ends_with("_INCLUDED")
}

/// `#  ifndef  FOO` → `Some("FOO")` for `keyword = "ifndef"`.
fn directive_arg<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = line.strip_prefix('#')?.trim_start();
    let rest = rest.strip_prefix(keyword)?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(rest.trim())
}

// ---------------------------------------------------------------------------
// Tag naming
// ---------------------------------------------------------------------------

/// Names for anonymous records and enums, taken from the typedef that
/// introduces them: `typedef enum { A, B } E;` names the enum `E`.
#[derive(Debug, Default)]
struct TagNames {
    by_location: HashMap<(PathBuf, u32, u32), String>,
}

impl TagNames {
    fn collect(entities: &[Entity], in_scope: &impl Fn(&Entity) -> bool) -> Self {
        let mut names = TagNames::default();
        for entity in entities {
            if entity.get_kind() != EntityKind::TypedefDecl || !in_scope(entity) {
                continue;
            }
            let (Some(name), Some(underlying)) =
                (entity.get_name(), entity.get_typedef_underlying_type())
            else {
                continue;
            };
            let underlying = match underlying.get_kind() {
                TypeKind::Elaborated => match underlying.get_elaborated_type() {
                    Some(inner) => inner,
                    None => continue,
                },
                _ => underlying,
            };
            if !matches!(underlying.get_kind(), TypeKind::Record | TypeKind::Enum) {
                continue;
            }
            if let Some(decl) = underlying.get_declaration()
                && is_unnamed(&decl)
                && let Some(key) = location_key(&decl)
            {
                trace!(name = %name, "naming anonymous tag after its typedef");
                names.by_location.entry(key).or_insert(name);
            }
        }
        names
    }

    /// Tag of a record or enum declaration; `None` for an anonymous one no
    /// typedef names.
    fn name_of(&self, decl: &Entity) -> Option<String> {
        if !is_unnamed(decl) {
            return decl.get_name();
        }
        self.by_location.get(&location_key(decl)?).cloned()
    }
}

/// clang reports anonymous tags with no name, an empty one, or a
/// placeholder like `enum (unnamed at time.h:3:9)`.
fn is_unnamed(decl: &Entity) -> bool {
    match decl.get_name() {
        None => true,
        Some(name) => {
            name.is_empty()
                || decl.is_anonymous()
                || name.contains("(unnamed")
                || name.contains("(anonymous")
        }
    }
}

fn location_key(entity: &Entity) -> Option<(PathBuf, u32, u32)> {
    let location = entity.get_location()?.get_file_location();
    Some((location.file?.get_path(), location.line, location.column))
}

// ---------------------------------------------------------------------------
// Collection helpers: one per declaration kind
// ---------------------------------------------------------------------------

fn collect_enums(
    entities: &[Entity],
    in_scope: &impl Fn(&Entity) -> bool,
    names: &TagNames,
) -> Vec<EnumDef> {
    let mut enums = Vec::new();
    let mut seen = HashSet::new();
    for entity in entities {
        if entity.get_kind() != EntityKind::EnumDecl || !in_scope(entity) || !entity.is_definition() {
            continue;
        }
        let tag = names.name_of(entity);
        if let Some(tag) = &tag
            && !seen.insert(tag.clone())
        {
            continue;
        }
        let enumerators: Vec<Enumerator> = entity
            .get_children()
            .iter()
            .filter(|c| c.get_kind() == EntityKind::EnumConstantDecl)
            .filter_map(|c| {
                let name = c.get_name()?;
                let (value, _) = c.get_enum_constant_value()?;
                Some(Enumerator { name, value })
            })
            .collect();
        debug!(tag = tag.as_deref().unwrap_or("<anonymous>"), enumerators = enumerators.len(), "extracted enum");
        enums.push(EnumDef { tag, enumerators });
    }
    enums
}

fn collect_records(
    entities: &[Entity],
    in_scope: &impl Fn(&Entity) -> bool,
    names: &TagNames,
) -> Vec<RecordDef> {
    let mut records = Vec::new();
    let mut seen = HashSet::new();
    for entity in entities {
        let kind = match entity.get_kind() {
            EntityKind::StructDecl => RecordKind::Struct,
            EntityKind::UnionDecl => RecordKind::Union,
            _ => continue,
        };
        // forward declarations carry no layout
        if !in_scope(entity) || !entity.is_definition() {
            continue;
        }
        let Some(tag) = names.name_of(entity) else {
            warn!("skipping anonymous {kind} without a typedef name");
            continue;
        };
        if !seen.insert(tag.clone()) {
            continue;
        }
        match extract_record(entity, kind, &tag, names) {
            Ok(record) => {
                debug!(tag = %tag, fields = record.fields.len(), "extracted {kind}");
                records.push(record);
            }
            Err(e) => warn!(tag = %tag, err = %e, "skipping {kind}"),
        }
    }
    records
}

fn extract_record(
    entity: &Entity,
    kind: RecordKind,
    tag: &str,
    names: &TagNames,
) -> Result<RecordDef> {
    let mut fields = Vec::new();
    for child in entity.get_children() {
        if child.get_kind() != EntityKind::FieldDecl {
            continue;
        }
        let name = child
            .get_name()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| clang_error(tag, "unnamed member"))?;
        if child.is_bit_field() {
            return Err(clang_error(tag, &format!("bit-field `{name}` is not supported")));
        }
        let ty = child
            .get_type()
            .ok_or_else(|| clang_error(tag, "member has no type"))?;
        fields.push(Field {
            name,
            ty: map_clang_type(&ty, names)?,
        });
    }
    Ok(RecordDef {
        kind,
        tag: tag.to_string(),
        fields,
    })
}

fn collect_typedefs(
    entities: &[Entity],
    in_scope: &impl Fn(&Entity) -> bool,
    names: &TagNames,
) -> Vec<TypeAlias> {
    let mut aliases = Vec::new();
    let mut seen = HashSet::new();
    for entity in entities {
        if entity.get_kind() != EntityKind::TypedefDecl || !in_scope(entity) {
            continue;
        }
        let name = match entity.get_name() {
            Some(n) if !n.is_empty() => n,
            _ => continue,
        };
        // wchar_t is supplied by the rendered prelude, not by the header set
        if name == "wchar_t" || !seen.insert(name.clone()) {
            continue;
        }
        let Some(underlying) = entity.get_typedef_underlying_type() else {
            continue;
        };
        match map_clang_type(&underlying, names) {
            Ok(target) => {
                trace!(name = %name, ty = %target, "extracted typedef");
                aliases.push(TypeAlias { name, target });
            }
            Err(e) => warn!(name = %name, err = %e, "skipping typedef"),
        }
    }
    aliases
}

#[derive(Debug, Default)]
struct Macros {
    constants: Vec<MacroConstant>,
    functions: Vec<MacroFunction>,
    markers: Vec<Marker>,
}

fn collect_macros(
    entities: &[Entity],
    in_scope: &impl Fn(&Entity) -> bool,
    directives: &Directives,
) -> Macros {
    let mut macros = Macros::default();
    let mut seen = HashSet::new();

    for entity in entities {
        if entity.get_kind() != EntityKind::MacroDefinition || !in_scope(entity) {
            continue;
        }
        let name = match entity.get_name() {
            Some(n) if !n.is_empty() => n,
            _ => continue,
        };
        if directives.include_guard.as_deref() == Some(name.as_str()) {
            continue;
        }
        if !seen.insert(name.clone()) {
            continue;
        }
        let Some(range) = entity.get_range() else {
            continue;
        };
        let mut tokens: Vec<String> = range.tokenize().iter().map(|t| t.get_spelling()).collect();
        // Strip trailing "#" that clang sometimes appends
        if tokens.last().is_some_and(|t| t == "#") {
            tokens.pop();
        }
        let guard = Guard::from_guarded(directives.guarded.contains(&name));

        if entity.is_function_like_macro() {
            match split_function_macro(&tokens) {
                Some((params, body)) => {
                    debug!(name = %name, params = params.len(), "extracted function-like macro");
                    macros.functions.push(MacroFunction {
                        name,
                        params,
                        body,
                        guard,
                    });
                }
                None => warn!(name = %name, "skipping malformed function-like macro"),
            }
            continue;
        }
        let body = &tokens[1.min(tokens.len())..];

        match body {
            [] => {
                let kind = if CALLING_CONVENTION_MARKERS.contains(&name.as_str()) {
                    MarkerKind::CallingConvention
                } else {
                    MarkerKind::Annotation
                };
                debug!(name = %name, %kind, "extracted marker");
                macros.markers.push(Marker {
                    name,
                    kind,
                    expansion: None,
                });
            }
            [single] if QUALIFIERS.contains(&single.as_str()) => {
                debug!(name = %name, "extracted qualifier marker");
                macros.markers.push(Marker {
                    name,
                    kind: MarkerKind::Qualifier,
                    expansion: Some(single.clone()),
                });
            }
            _ => match MacroValue::parse(&body.join(" ")) {
                Ok(value) => {
                    debug!(name = %name, %value, ?guard, "extracted #define constant");
                    macros.constants.push(MacroConstant { name, value, guard });
                }
                Err(e) => warn!(name = %name, err = %e, "skipping macro"),
            },
        }
    }
    macros
}

/// `NAME ( a , b ) body` tokens → (`[a, b]`, `body`).
fn split_function_macro(tokens: &[String]) -> Option<(Vec<String>, String)> {
    if tokens.get(1).map(String::as_str) != Some("(") {
        return None;
    }
    let close = tokens.iter().position(|t| t == ")")?;
    let params = tokens[2..close]
        .iter()
        .filter(|t| *t != ",")
        .cloned()
        .collect();
    Some((params, tokens[close + 1..].join(" ")))
}

fn collect_functions(
    entities: &[Entity],
    in_scope: &impl Fn(&Entity) -> bool,
    names: &TagNames,
    text: &str,
    markers: &[Marker],
) -> Vec<StubDeclaration> {
    let lines: Vec<&str> = text.lines().collect();
    let mut stubs = Vec::new();
    let mut seen = HashSet::new();
    for entity in entities {
        if entity.get_kind() != EntityKind::FunctionDecl || !in_scope(entity) {
            continue;
        }
        let name = match entity.get_name() {
            Some(n) if !n.is_empty() => n,
            _ => continue,
        };
        if !seen.insert(name.clone()) {
            trace!(name = %name, "skipping duplicate function");
            continue;
        }
        match extract_function(entity, &name, names) {
            Ok(mut stub) => {
                stub.convention_marker = convention_marker_at(entity, &lines, &name, markers);
                debug!(name = %name, params = stub.params.len(), variadic = stub.variadic, "extracted function");
                stubs.push(stub);
            }
            Err(e) => warn!(name = %name, err = %e, "skipping function"),
        }
    }
    stubs
}

/// Find a calling-convention marker spelled before `name` on the
/// declaration's line. Empty macros leave no tokens behind, so the source
/// text is the only place the marker is still visible.
fn convention_marker_at(
    entity: &Entity,
    lines: &[&str],
    name: &str,
    markers: &[Marker],
) -> Option<String> {
    let line_no = entity.get_location()?.get_file_location().line as usize;
    let line = lines.get(line_no.checked_sub(1)?)?;
    let prefix = &line[..line.find(name)?];
    prefix
        .split(|c: char| !(c == '_' || c.is_ascii_alphanumeric()))
        .find(|word| {
            markers
                .iter()
                .any(|m| m.name == *word && m.kind == MarkerKind::CallingConvention)
        })
        .map(str::to_string)
}

fn extract_function(entity: &Entity, name: &str, names: &TagNames) -> Result<StubDeclaration> {
    let fn_type = entity.get_type().ok_or_else(|| clang_error(name, "function has no type"))?;
    let ret_type = fn_type
        .get_result_type()
        .ok_or_else(|| clang_error(name, "function has no return type"))?;
    let return_type = map_clang_type(&ret_type, names)?;

    let calling_convention = fn_type
        .get_calling_convention()
        .map(map_calling_convention)
        .unwrap_or(CallConv::Cdecl);

    let args = entity.get_arguments().unwrap_or_default();
    let mut params = Vec::new();
    for (i, arg) in args.iter().enumerate() {
        let param_name = arg
            .get_name()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("param{i}"));
        let ty = arg
            .get_type()
            .ok_or_else(|| clang_error(name, "parameter has no type"))?;
        params.push(Param {
            name: param_name,
            ty: map_clang_type(&ty, names)?,
        });
    }

    Ok(StubDeclaration {
        name: name.to_string(),
        return_type,
        params,
        calling_convention,
        convention_marker: None,
        variadic: entity.is_variadic(),
    })
}

// ---------------------------------------------------------------------------
// Type mapping: clang TypeKind → CType
// ---------------------------------------------------------------------------

fn map_clang_type(ty: &ClangType, names: &TagNames) -> Result<CType> {
    match ty.get_kind() {
        TypeKind::Void => Ok(CType::Void),
        TypeKind::Bool => Ok(CType::Bool),
        TypeKind::CharS | TypeKind::CharU => Ok(CType::Char),
        TypeKind::SChar => Ok(CType::SChar),
        TypeKind::UChar => Ok(CType::UChar),
        TypeKind::WChar => Ok(CType::WChar),
        TypeKind::Short => Ok(CType::Short),
        TypeKind::UShort => Ok(CType::UShort),
        TypeKind::Int => Ok(CType::Int),
        TypeKind::UInt => Ok(CType::UInt),
        // Kept model-agnostic; the shape table decides 32 vs 64 bits.
        TypeKind::Long => Ok(CType::Long),
        TypeKind::ULong => Ok(CType::ULong),
        TypeKind::LongLong => Ok(CType::LongLong),
        TypeKind::ULongLong => Ok(CType::ULongLong),
        TypeKind::Float => Ok(CType::Float),
        TypeKind::Double => Ok(CType::Double),

        TypeKind::Pointer => {
            let pointee = ty
                .get_pointee_type()
                .ok_or_else(|| type_error(ty, "pointer has no pointee type"))?;
            let is_const = pointee.is_const_qualified();
            let inner = map_clang_type(&pointee, names)?;
            if matches!(inner, CType::Array { .. }) {
                return Err(type_error(ty, "pointer to array is not supported"));
            }
            Ok(CType::Ptr {
                pointee: Box::new(inner),
                is_const,
            })
        }

        TypeKind::ConstantArray => {
            let element = ty
                .get_element_type()
                .ok_or_else(|| type_error(ty, "array has no element type"))?;
            let len = ty
                .get_size()
                .ok_or_else(|| type_error(ty, "array has no length"))?;
            Ok(CType::Array {
                element: Box::new(map_clang_type(&element, names)?),
                len,
            })
        }

        // `T x[]` decays to `T *`
        TypeKind::IncompleteArray => {
            let element = ty
                .get_element_type()
                .ok_or_else(|| type_error(ty, "array has no element type"))?;
            Ok(CType::ptr(map_clang_type(&element, names)?))
        }

        TypeKind::Elaborated => {
            let inner = ty
                .get_elaborated_type()
                .ok_or_else(|| type_error(ty, "elaborated type has no inner type"))?;
            map_clang_type(&inner, names)
        }

        TypeKind::Typedef => {
            let name = ty
                .get_declaration()
                .and_then(|d| d.get_name())
                .unwrap_or_default();
            match name.as_str() {
                "" => map_clang_type(&ty.get_canonical_type(), names),
                "wchar_t" => Ok(CType::WChar),
                _ => Ok(CType::Named(name)),
            }
        }

        TypeKind::Record | TypeKind::Enum => {
            let decl = ty
                .get_declaration()
                .ok_or_else(|| type_error(ty, "tag type has no declaration"))?;
            let Some(tag) = names.name_of(&decl) else {
                return Err(type_error(ty, "anonymous tag without a typedef name"));
            };
            if ty.get_kind() == TypeKind::Enum {
                return Ok(CType::Enum(tag));
            }
            // Incomplete records (`struct opaque` with no body anywhere) only
            // appear behind pointers, where `void` keeps the pointer shape.
            if ty.get_sizeof().is_err() {
                debug!(tag = %tag, "incomplete record type mapped to void");
                return Ok(CType::Void);
            }
            let kind = match decl.get_kind() {
                EntityKind::UnionDecl => RecordKind::Union,
                _ => RecordKind::Struct,
            };
            Ok(CType::Record { kind, tag })
        }

        other => Err(type_error(ty, &format!("unsupported clang TypeKind: {other:?}"))),
    }
}

fn map_calling_convention(cc: CallingConvention) -> CallConv {
    match cc {
        CallingConvention::Cdecl => CallConv::Cdecl,
        CallingConvention::Stdcall => CallConv::Stdcall,
        CallingConvention::Fastcall => CallConv::Fastcall,
        _ => CallConv::Cdecl,
    }
}

fn type_error(ty: &ClangType, detail: &str) -> Error {
    Error::InvalidType {
        spelling: ty.get_display_name(),
        detail: detail.to_string(),
    }
}

fn clang_error(name: &str, detail: &str) -> Error {
    Error::Clang(format!("{name}: {detail}"))
}

// ---------------------------------------------------------------------------
// Source-location filtering
// ---------------------------------------------------------------------------

fn is_in_file(entity: &Entity, path: &Path) -> bool {
    let Some(location) = entity.get_location() else {
        return false;
    };
    let Some(file) = location.get_file_location().file else {
        return false;
    };
    let file_path = file.get_path();
    file_path == path || file_path.ends_with(path) || same_file(&file_path, path)
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_finds_include_guard_and_guarded_defines() {
        let text = "/* leading\n   comment */\n#ifndef FAKE_H\n#define FAKE_H\n\n\
                    #ifndef TRUE\n#define TRUE 1\n#endif\n#define PLAIN 2\n\
                    #ifndef OTHER\n#define DIFFERENT 3\n#endif\n#endif\n";
        let d = scan_directives(text);
        assert_eq!(d.include_guard.as_deref(), Some("FAKE_H"));
        assert!(d.guarded.contains("TRUE"));
        assert!(!d.guarded.contains("PLAIN"));
        assert!(!d.guarded.contains("DIFFERENT"));
    }

    #[test]
    fn scan_without_include_guard() {
        let d = scan_directives("// header\n#ifndef NULL\n#define NULL ((void *)0)\n#endif\n");
        assert_eq!(d.include_guard, None);
        assert!(d.guarded.contains("NULL"));
    }

    #[test]
    fn leading_marker_is_not_an_include_guard() {
        let d = scan_directives("#ifndef WINAPI\n#define WINAPI\n#endif\n");
        assert_eq!(d.include_guard, None);
        assert!(d.guarded.contains("WINAPI"));
    }

    fn tokens(text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn function_macro_tokens_split() {
        assert_eq!(
            split_function_macro(&tokens("MAX ( a , b ) ( ( a ) > ( b ) ? ( a ) : ( b ) )")),
            Some((
                vec!["a".to_string(), "b".to_string()],
                "( ( a ) > ( b ) ? ( a ) : ( b ) )".to_string()
            ))
        );
        assert_eq!(
            split_function_macro(&tokens("LOG ( fmt , ... ) printf ( fmt , __VA_ARGS__ )")),
            Some((
                vec!["fmt".to_string(), "...".to_string()],
                "printf ( fmt , __VA_ARGS__ )".to_string()
            ))
        );
        assert_eq!(
            split_function_macro(&tokens("UNUSED ( x )")),
            Some((vec!["x".to_string()], String::new()))
        );
        assert_eq!(split_function_macro(&tokens("PLAIN 1")), None);
    }

    #[test]
    fn directive_arg_requires_keyword_boundary() {
        assert_eq!(directive_arg("#  ifndef  FOO", "ifndef"), Some("FOO"));
        assert_eq!(directive_arg("#ifndefFOO", "ifndef"), None);
        assert_eq!(directive_arg("#define X 1", "ifndef"), None);
    }
}
