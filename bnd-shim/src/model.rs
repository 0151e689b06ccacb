//! Symbol environment model: the structured form of a fake header.
//!
//! These types are clang-independent and text-independent: the declarative
//! config, the libclang extractor and the built-in header sets all produce
//! them, and the renderer, shape table and guard controller consume them.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{Error, Result};

/// A target data model the shape table can answer for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetModel {
    /// 32-bit Windows (ILP32).
    Win32,
    /// 64-bit Windows (LLP64).
    Win64,
    /// 64-bit Linux (LP64).
    Linux64,
}

impl TargetModel {
    pub const ALL: [TargetModel; 3] = [TargetModel::Win32, TargetModel::Win64, TargetModel::Linux64];

    pub fn name(self) -> &'static str {
        match self {
            TargetModel::Win32 => "win32",
            TargetModel::Win64 => "win64",
            TargetModel::Linux64 => "linux64",
        }
    }

    /// Data model label (`ILP32`, `LLP64`, `LP64`).
    pub fn data_model(self) -> &'static str {
        match self {
            TargetModel::Win32 => "ILP32",
            TargetModel::Win64 => "LLP64",
            TargetModel::Linux64 => "LP64",
        }
    }

    /// Target triple handed to clang when checking against this model.
    pub fn triple(self) -> &'static str {
        match self {
            TargetModel::Win32 => "i686-pc-windows-msvc",
            TargetModel::Win64 => "x86_64-pc-windows-msvc",
            TargetModel::Linux64 => "x86_64-unknown-linux-gnu",
        }
    }

    pub fn is_windows(self) -> bool {
        matches!(self, TargetModel::Win32 | TargetModel::Win64)
    }

    pub fn pointer_bits(self) -> u32 {
        match self {
            TargetModel::Win32 => 32,
            TargetModel::Win64 | TargetModel::Linux64 => 64,
        }
    }
}

impl fmt::Display for TargetModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TargetModel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TargetModel::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidValue {
                spelling: s.to_string(),
                detail: "expected one of win32, win64, linux64".to_string(),
            })
    }
}

/// A C type as written in a fake header.
///
/// Primitive variants stay model-agnostic (`Long` is not yet 32 or 64 bits);
/// the shape table decides widths per [`TargetModel`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CType {
    Void,
    Bool,
    Char,
    SChar,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,
    WChar,
    Float,
    Double,
    /// Pointer to a type. `is_const` indicates `const T*`.
    Ptr { pointee: Box<CType>, is_const: bool },
    /// Fixed-length array, e.g. a `char name[32]` field.
    Array { element: Box<CType>, len: usize },
    /// Reference to another alias (`HANDLE`, `CHAR`).
    Named(String),
    /// `struct tag` or `union tag`, used by value or behind a pointer.
    Record { kind: RecordKind, tag: String },
    /// `enum tag`.
    Enum(String),
}

impl CType {
    pub fn ptr(pointee: CType) -> CType {
        CType::Ptr {
            pointee: Box::new(pointee),
            is_const: false,
        }
    }

    pub fn const_ptr(pointee: CType) -> CType {
        CType::Ptr {
            pointee: Box::new(pointee),
            is_const: true,
        }
    }

    pub fn named(name: &str) -> CType {
        CType::Named(name.to_string())
    }

    pub fn record(tag: &str) -> CType {
        CType::Record {
            kind: RecordKind::Struct,
            tag: tag.to_string(),
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, CType::Void)
    }

    /// True if `wchar_t` appears anywhere in this type.
    pub fn uses_wchar(&self) -> bool {
        match self {
            CType::WChar => true,
            CType::Ptr { pointee, .. } => pointee.uses_wchar(),
            CType::Array { element, .. } => element.uses_wchar(),
            _ => false,
        }
    }

    /// Names of aliases this type refers to, outermost first.
    pub fn referenced_names(&self) -> Vec<&str> {
        match self {
            CType::Named(name) => vec![name.as_str()],
            CType::Ptr { pointee, .. } => pointee.referenced_names(),
            CType::Array { element, .. } => element.referenced_names(),
            _ => Vec::new(),
        }
    }

    /// Tag symbols this type refers to (`struct tm`, `enum E`).
    pub fn referenced_tags(&self) -> Vec<String> {
        match self {
            CType::Record { .. } | CType::Enum(_) => vec![self.to_string()],
            CType::Ptr { pointee, .. } => pointee.referenced_tags(),
            CType::Array { element, .. } => element.referenced_tags(),
            _ => Vec::new(),
        }
    }

    /// Render a declaration of `declarator` with this type
    /// (`void *HANDLE`, `unsigned long DWORD`, `char name[32]`).
    pub fn declare(&self, declarator: &str) -> String {
        if let CType::Array { element, len } = self {
            return element.declare(&format!("{declarator}[{len}]"));
        }
        let spelled = self.to_string();
        if declarator.is_empty() {
            spelled
        } else if spelled.ends_with('*') {
            format!("{spelled}{declarator}")
        } else {
            format!("{spelled} {declarator}")
        }
    }
}

impl fmt::Display for CType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CType::Void => write!(f, "void"),
            CType::Bool => write!(f, "_Bool"),
            CType::Char => write!(f, "char"),
            CType::SChar => write!(f, "signed char"),
            CType::UChar => write!(f, "unsigned char"),
            CType::Short => write!(f, "short"),
            CType::UShort => write!(f, "unsigned short"),
            CType::Int => write!(f, "int"),
            CType::UInt => write!(f, "unsigned int"),
            CType::Long => write!(f, "long"),
            CType::ULong => write!(f, "unsigned long"),
            CType::LongLong => write!(f, "long long"),
            CType::ULongLong => write!(f, "unsigned long long"),
            CType::WChar => write!(f, "wchar_t"),
            CType::Float => write!(f, "float"),
            CType::Double => write!(f, "double"),
            CType::Ptr { pointee, is_const } => match (pointee.as_ref(), is_const) {
                // `char *const *` style: const binds to the inner pointer
                (CType::Ptr { .. }, true) => write!(f, "{pointee} const *"),
                (CType::Ptr { .. }, false) => write!(f, "{pointee}*"),
                (_, true) => write!(f, "const {pointee} *"),
                (_, false) => write!(f, "{pointee} *"),
            },
            CType::Array { element, len } => write!(f, "{element} [{len}]"),
            CType::Named(name) => write!(f, "{name}"),
            CType::Record { kind, tag } => write!(f, "{kind} {tag}"),
            CType::Enum(tag) => write!(f, "enum {tag}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Struct,
    Union,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Struct => write!(f, "struct"),
            RecordKind::Union => write!(f, "union"),
        }
    }
}

/// Replacement value of a `#define` constant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MacroValue {
    /// Integer literal, kept with its spelling so `0` and `0L` stay distinct.
    Integer { value: i64, literal: String },
    /// `((void *)0)`.
    NullPointer,
    /// Any other replacement list, kept as raw tokens.
    Tokens(String),
}

impl MacroValue {
    pub fn int(value: i64) -> MacroValue {
        MacroValue::Integer {
            value,
            literal: value.to_string(),
        }
    }

    /// Parse a replacement list.
    ///
    /// Integer literals may be decimal, hex or octal with `U`/`L` suffixes and
    /// an optional leading `-`. Whitespace inside `((void *)0)` is ignored.
    pub fn parse(text: &str) -> Result<MacroValue> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::InvalidValue {
                spelling: text.to_string(),
                detail: "empty replacement list (declare a marker instead)".to_string(),
            });
        }
        let squashed: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        if squashed == "((void*)0)" || squashed == "(void*)0" {
            return Ok(MacroValue::NullPointer);
        }
        let (negated, digits) = match squashed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, squashed.as_str()),
        };
        if let Some(magnitude) = parse_int_literal(digits)
            && let Ok(magnitude) = i64::try_from(magnitude)
        {
            let value = if negated { -magnitude } else { magnitude };
            return Ok(MacroValue::Integer {
                value,
                literal: squashed,
            });
        }
        Ok(MacroValue::Tokens(text.to_string()))
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            MacroValue::Integer { value, .. } => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for MacroValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacroValue::Integer { literal, .. } => write!(f, "{literal}"),
            MacroValue::NullPointer => write!(f, "((void *)0)"),
            MacroValue::Tokens(tokens) => write!(f, "{tokens}"),
        }
    }
}

/// Parse a decimal, hex (`0x1F`) or octal literal with optional integer
/// suffixes (`1U`, `0x10UL`, `0L`). Returns None if not parseable.
pub(crate) fn parse_int_literal(s: &str) -> Option<u64> {
    let s = s.trim_end_matches(['u', 'U', 'l', 'L']);
    if s.is_empty() {
        return None;
    }

    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else if let Some(octal) = s.strip_prefix('0') {
        if octal.is_empty() {
            Some(0)
        } else if octal.chars().all(|c| c.is_ascii_digit()) {
            u64::from_str_radix(octal, 8).ok()
        } else {
            None
        }
    } else if s.chars().all(|c| c.is_ascii_digit()) {
        s.parse::<u64>().ok()
    } else {
        None
    }
}

/// Definition-guard state of a macro.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Guard {
    /// `#ifndef X / #define X / #endif`: an earlier definition always wins.
    IfAbsent,
    /// Plain `#define`: a differing earlier definition is a conflict.
    Always,
}

impl Guard {
    pub fn from_guarded(guarded: bool) -> Guard {
        if guarded { Guard::IfAbsent } else { Guard::Always }
    }
}

/// A `typedef` contributed by a fake header.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeAlias {
    pub name: String,
    pub target: CType,
}

/// A `#define` constant contributed by a fake header.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MacroConstant {
    pub name: String,
    pub value: MacroValue,
    pub guard: Guard,
}

/// What a no-op marker macro stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MarkerKind {
    /// `WINAPI`, `CALLBACK`: expands to nothing; ABI decoration is not modeled.
    CallingConvention,
    /// `IN`, `OUT`, `OPTIONAL`: parameter hints with no enforced meaning.
    Annotation,
    /// `CONST`: spelled alias for a type qualifier.
    Qualifier,
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkerKind::CallingConvention => write!(f, "calling-convention"),
            MarkerKind::Annotation => write!(f, "annotation"),
            MarkerKind::Qualifier => write!(f, "qualifier"),
        }
    }
}

/// A function-like macro, kept as its raw replacement list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MacroFunction {
    pub name: String,
    /// Parameter names; a trailing `...` marks a variadic macro.
    pub params: Vec<String>,
    pub body: String,
    pub guard: Guard,
}

impl MacroFunction {
    /// `NAME(a, b)`
    pub fn signature(&self) -> String {
        format!("{}({})", self.name, self.params.join(", "))
    }
}

/// A struct or union member.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: String,
    pub ty: CType,
}

/// A complete struct or union definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordDef {
    pub kind: RecordKind,
    pub tag: String,
    pub fields: Vec<Field>,
}

impl RecordDef {
    /// The type naming this record.
    pub fn ty(&self) -> CType {
        CType::Record {
            kind: self.kind,
            tag: self.tag.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Enumerator {
    pub name: String,
    pub value: i64,
}

/// An enum definition. Anonymous enums (`enum { A = 1 };`) have no tag and
/// only contribute their enumerators.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumDef {
    pub tag: Option<String>,
    pub enumerators: Vec<Enumerator>,
}

impl EnumDef {
    pub fn value_of(&self, name: &str) -> Option<i64> {
        self.enumerators.iter().find(|e| e.name == name).map(|e| e.value)
    }
}

/// A marker macro. Always introduced define-if-absent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Marker {
    pub name: String,
    pub kind: MarkerKind,
    /// Replacement tokens, `None` for an empty expansion.
    pub expansion: Option<String>,
}

/// Calling convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallConv {
    /// Platform default (cdecl on most platforms).
    #[default]
    Cdecl,
    /// stdcall (Windows x86).
    Stdcall,
    /// Fastcall.
    Fastcall,
}

/// A function parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Param {
    pub name: String,
    pub ty: CType,
}

/// A body-less function declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StubDeclaration {
    pub name: String,
    pub return_type: CType,
    pub params: Vec<Param>,
    pub calling_convention: CallConv,
    /// Marker macro spelled in front of the declaration (e.g. `WINAPI`).
    pub convention_marker: Option<String>,
    /// Takes `...` after the named parameters.
    pub variadic: bool,
}

impl StubDeclaration {
    /// The C prototype, e.g. `void Sleep(DWORD dwMilliseconds)` or
    /// `int printf(const char *format, ...)`.
    pub fn prototype(&self) -> String {
        let mut params: Vec<String> = self.params.iter().map(|p| p.ty.declare(&p.name)).collect();
        if self.variadic {
            params.push("...".to_string());
        }
        let params = if params.is_empty() {
            "void".to_string()
        } else {
            params.join(", ")
        };
        self.return_type
            .declare(&format!("{}({})", self.name, params))
    }
}

/// Everything one fake header contributes.
///
/// Shared read-only behind an `Arc` once built.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SymbolEnvironment {
    /// Header identity, e.g. `windows.h`.
    pub header: String,
    /// Target models whose widths this header claims to get right.
    pub models: Vec<TargetModel>,
    /// Headers this one `#include`s, in order.
    pub includes: Vec<String>,
    pub aliases: Vec<TypeAlias>,
    pub records: Vec<RecordDef>,
    pub enums: Vec<EnumDef>,
    pub constants: Vec<MacroConstant>,
    pub function_macros: Vec<MacroFunction>,
    pub markers: Vec<Marker>,
    pub stubs: Vec<StubDeclaration>,
}

impl SymbolEnvironment {
    pub fn new(header: &str, models: &[TargetModel]) -> Self {
        SymbolEnvironment {
            header: header.to_string(),
            models: models.to_vec(),
            ..Default::default()
        }
    }

    pub fn alias(&self, name: &str) -> Option<&TypeAlias> {
        self.aliases.iter().find(|a| a.name == name)
    }

    pub fn constant(&self, name: &str) -> Option<&MacroConstant> {
        self.constants.iter().find(|c| c.name == name)
    }

    pub fn marker(&self, name: &str) -> Option<&Marker> {
        self.markers.iter().find(|m| m.name == name)
    }

    pub fn stub(&self, name: &str) -> Option<&StubDeclaration> {
        self.stubs.iter().find(|s| s.name == name)
    }

    pub fn record(&self, tag: &str) -> Option<&RecordDef> {
        self.records.iter().find(|r| r.tag == tag)
    }

    /// The enum with this tag, or the anonymous enum declaring this
    /// enumerator when `name` is not a tag.
    pub fn enum_def(&self, name: &str) -> Option<&EnumDef> {
        self.enums
            .iter()
            .find(|e| e.tag.as_deref() == Some(name))
            .or_else(|| self.enums.iter().find(|e| e.value_of(name).is_some()))
    }

    pub fn function_macro(&self, name: &str) -> Option<&MacroFunction> {
        self.function_macros.iter().find(|m| m.name == name)
    }

    /// Total number of symbols contributed.
    pub fn len(&self) -> usize {
        let enums: usize = self
            .enums
            .iter()
            .map(|e| e.enumerators.len() + usize::from(e.tag.is_some()))
            .sum();
        self.aliases.len()
            + self.records.len()
            + enums
            + self.constants.len()
            + self.function_macros.len()
            + self.markers.len()
            + self.stubs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every type written in this header: alias targets, fields, return
    /// and parameter types.
    pub fn types(&self) -> impl Iterator<Item = &CType> {
        let aliases = self.aliases.iter().map(|a| &a.target);
        let fields = self.records.iter().flat_map(|r| r.fields.iter().map(|f| &f.ty));
        let stubs = self
            .stubs
            .iter()
            .flat_map(|s| std::iter::once(&s.return_type).chain(s.params.iter().map(|p| &p.ty)));
        aliases.chain(fields).chain(stubs)
    }

    /// True if any alias, field or stub mentions `wchar_t`.
    pub fn uses_wchar(&self) -> bool {
        self.types().any(CType::uses_wchar)
    }

    /// Alias and tag names this header uses without defining them, in first
    /// use order.
    pub fn external_references(&self) -> Vec<String> {
        let mut defined: Vec<String> = self.aliases.iter().map(|a| a.name.clone()).collect();
        defined.extend(self.records.iter().map(|r| r.ty().to_string()));
        defined.extend(self.enums.iter().filter_map(|e| e.tag.as_ref()).map(|t| format!("enum {t}")));

        let mut external: Vec<String> = Vec::new();
        for ty in self.types() {
            let names = ty.referenced_names().into_iter().map(str::to_string);
            for name in names.chain(ty.referenced_tags()) {
                if !defined.contains(&name) && !external.contains(&name) {
                    external.push(name);
                }
            }
        }
        external
    }

    /// All symbols, in the order they are committed: aliases, record and
    /// enum tags, enumerators, constants, function-like macros, markers,
    /// stubs.
    ///
    /// Tags live in their own namespace, so they are keyed by their full
    /// spelling (`struct tm`).
    pub fn symbols(&self) -> Vec<Symbol> {
        let aliases = self.aliases.iter().map(|a| Symbol {
            name: a.name.clone(),
            definition: Definition::Alias(a.target.clone()),
            guard: Guard::Always,
        });
        let records = self.records.iter().map(|r| Symbol {
            name: r.ty().to_string(),
            definition: Definition::Record(
                r.fields.iter().map(|f| (f.name.clone(), f.ty.clone())).collect(),
            ),
            guard: Guard::Always,
        });
        let enums = self.enums.iter().filter_map(|e| {
            let tag = e.tag.as_ref()?;
            Some(Symbol {
                name: format!("enum {tag}"),
                definition: Definition::Enum(
                    e.enumerators.iter().map(|v| (v.name.clone(), v.value)).collect(),
                ),
                guard: Guard::Always,
            })
        });
        let enumerators = self.enums.iter().flat_map(|e| {
            e.enumerators.iter().map(|v| Symbol {
                name: v.name.clone(),
                definition: Definition::Enumerator(v.value),
                guard: Guard::Always,
            })
        });
        let constants = self.constants.iter().map(|c| Symbol {
            name: c.name.clone(),
            definition: Definition::Constant(c.value.clone()),
            guard: c.guard,
        });
        let function_macros = self.function_macros.iter().map(|m| Symbol {
            name: m.name.clone(),
            definition: Definition::MacroFunction {
                params: m.params.clone(),
                body: m.body.clone(),
            },
            guard: m.guard,
        });
        let markers = self.markers.iter().map(|m| Symbol {
            name: m.name.clone(),
            definition: Definition::Marker(m.expansion.clone()),
            guard: Guard::IfAbsent,
        });
        let stubs = self.stubs.iter().map(|s| Symbol {
            name: s.name.clone(),
            definition: Definition::Function {
                return_type: s.return_type.clone(),
                params: s.params.iter().map(|p| p.ty.clone()).collect(),
                variadic: s.variadic,
                calling_convention: s.calling_convention,
            },
            guard: Guard::Always,
        });
        aliases
            .chain(records)
            .chain(enums)
            .chain(enumerators)
            .chain(constants)
            .chain(function_macros)
            .chain(markers)
            .chain(stubs)
            .collect()
    }
}

/// One named entry as the guard controller sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub definition: Definition,
    pub guard: Guard,
}

/// The comparable part of a symbol. Two symbols with the same name conflict
/// when their definitions differ.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Definition {
    Alias(CType),
    Constant(MacroValue),
    Marker(Option<String>),
    MacroFunction {
        params: Vec<String>,
        body: String,
    },
    /// Member names and types, in order.
    Record(Vec<(String, CType)>),
    Enum(Vec<(String, i64)>),
    Enumerator(i64),
    /// Parameter names do not take part in comparison.
    Function {
        return_type: CType,
        params: Vec<CType>,
        variadic: bool,
        calling_convention: CallConv,
    },
}

impl fmt::Display for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Definition::Alias(ty) => write!(f, "typedef {ty}"),
            Definition::Constant(value) => write!(f, "#define {value}"),
            Definition::Marker(Some(expansion)) => write!(f, "#define {expansion}"),
            Definition::Marker(None) => write!(f, "#define <empty>"),
            Definition::MacroFunction { params, body } => {
                write!(f, "#define ({}) {body}", params.join(", "))
            }
            Definition::Record(fields) => {
                let fields: Vec<String> = fields.iter().map(|(n, t)| t.declare(n)).collect();
                write!(f, "{{ {} }}", fields.join("; "))
            }
            Definition::Enum(values) => {
                let values: Vec<String> = values.iter().map(|(n, v)| format!("{n} = {v}")).collect();
                write!(f, "{{ {} }}", values.join(", "))
            }
            Definition::Enumerator(value) => write!(f, "enumerator {value}"),
            Definition::Function {
                return_type,
                params,
                variadic,
                ..
            } => {
                let mut params: Vec<String> = params.iter().map(|p| p.to_string()).collect();
                if *variadic {
                    params.push("...".to_string());
                }
                write!(f, "{return_type} ({})", params.join(", "))
            }
        }
    }
}
