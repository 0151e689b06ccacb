//! Configuration types for `bnd-shim.toml`.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::ctype::{is_identifier, parse_type};
use crate::error::{Error, Result};
use crate::model::{
    CallConv, Guard, MacroConstant, MacroFunction, MacroValue, Marker, MarkerKind, Param,
    StubDeclaration, SymbolEnvironment, TargetModel, TypeAlias,
};
use crate::registry::normalize_header_name;
use crate::registry::{MissingHeaderPolicy, SearchPolicy};

/// Root configuration.
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub session: SessionConfig,
    /// Real SDK include directories. Searched (after `base_dir`) when
    /// resolving `dir` paths, placed in the search order according to
    /// `session.search`, and injected as `-I` flags for clang.
    #[serde(default)]
    pub include_paths: Vec<PathBuf>,
    /// Extra clang arguments applied whenever a header or source is parsed.
    #[serde(default)]
    pub clang_args: Vec<String>,
    /// Built-in header sets to register, in search order.
    #[serde(default = "default_builtins")]
    pub builtin: Vec<String>,
    #[serde(default)]
    pub header_set: Vec<HeaderSetConfig>,
}

impl Default for Config {
    /// Built-ins only, as if read from an empty file.
    fn default() -> Self {
        Config {
            output: OutputConfig::default(),
            session: SessionConfig::default(),
            include_paths: Vec::new(),
            clang_args: Vec::new(),
            builtin: default_builtins(),
            header_set: Vec::new(),
        }
    }
}

fn default_builtins() -> Vec<String> {
    vec!["windows".to_string()]
}

/// Output settings.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Directory fake headers are materialized into; one subdirectory per set.
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("fake_include")
}

/// Adapter-level policy.
#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    /// Default models for headers that do not list their own.
    #[serde(default = "default_models")]
    pub models: Vec<TargetModel>,
    #[serde(default)]
    pub search: SearchPolicy,
    #[serde(default)]
    pub missing: MissingHeaderPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            models: default_models(),
            search: SearchPolicy::default(),
            missing: MissingHeaderPolicy::default(),
        }
    }
}

fn default_models() -> Vec<TargetModel> {
    vec![TargetModel::Win32, TargetModel::Win64]
}

/// A fake header set: either declared inline or read from a directory of
/// `.h` files through libclang.
#[derive(Debug, Deserialize)]
pub struct HeaderSetConfig {
    pub name: String,
    /// Directory of fake headers to extract. Mutually usable with `header`.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Models for every header in the set that does not list its own.
    #[serde(default)]
    pub models: Vec<TargetModel>,
    /// Extra clang arguments for extracting `dir`.
    #[serde(default)]
    pub clang_args: Vec<String>,
    #[serde(default)]
    pub header: Vec<HeaderConfig>,
}

impl HeaderSetConfig {
    /// Models inherited by this set's headers.
    pub fn effective_models(&self, session: &SessionConfig) -> Vec<TargetModel> {
        if self.models.is_empty() {
            session.models.clone()
        } else {
            self.models.clone()
        }
    }
}

/// One declaratively defined fake header.
#[derive(Debug, Deserialize)]
pub struct HeaderConfig {
    pub name: String,
    #[serde(default)]
    pub models: Vec<TargetModel>,
    /// Headers to `#include` ahead of this one's declarations. Headers that
    /// define a referenced alias are added automatically.
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub typedef: Vec<TypedefConfig>,
    #[serde(default)]
    pub define: Vec<DefineConfig>,
    #[serde(default)]
    pub function_macro: Vec<FunctionMacroConfig>,
    #[serde(default)]
    pub marker: Vec<MarkerConfig>,
    #[serde(default)]
    pub function: Vec<FunctionConfig>,
}

#[derive(Debug, Deserialize)]
pub struct TypedefConfig {
    pub name: String,
    /// C spelling of the aliased type, e.g. `const CHAR *`.
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Debug, Deserialize)]
pub struct DefineConfig {
    pub name: String,
    pub value: String,
    /// Wrap in `#ifndef` so an earlier definition wins.
    #[serde(default)]
    pub guarded: bool,
}

#[derive(Debug, Deserialize)]
pub struct FunctionMacroConfig {
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
    pub body: String,
    #[serde(default)]
    pub guarded: bool,
}

#[derive(Debug, Deserialize)]
pub struct MarkerConfig {
    pub name: String,
    pub kind: MarkerKind,
    #[serde(default)]
    pub expansion: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FunctionConfig {
    pub name: String,
    #[serde(default = "default_return")]
    pub returns: String,
    #[serde(default)]
    pub params: Vec<ParamConfig>,
    #[serde(default)]
    pub convention: CallConv,
    /// Marker macro spelled before the declaration, e.g. `WINAPI`.
    #[serde(default)]
    pub marker: Option<String>,
    /// Accepts `...` after `params`.
    #[serde(default)]
    pub variadic: bool,
}

fn default_return() -> String {
    "void".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ParamConfig {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

impl HeaderConfig {
    /// Build the environment this header declares. `default_models` applies
    /// when the header lists none.
    pub fn to_environment(&self, default_models: &[TargetModel]) -> Result<SymbolEnvironment> {
        let models = if self.models.is_empty() {
            default_models
        } else {
            self.models.as_slice()
        };
        let mut env = SymbolEnvironment::new(&self.name, models);
        env.includes = self.include.iter().map(|h| normalize_header_name(h)).collect();

        for td in &self.typedef {
            env.aliases.push(TypeAlias {
                name: td.name.clone(),
                target: parse_type(&td.ty)?,
            });
        }
        for def in &self.define {
            env.constants.push(MacroConstant {
                name: def.name.clone(),
                value: MacroValue::parse(&def.value)?,
                guard: Guard::from_guarded(def.guarded),
            });
        }
        for m in &self.function_macro {
            if m.params.iter().any(|p| p != "..." && !is_identifier(p)) {
                return Err(Error::InvalidValue {
                    spelling: m.params.join(", "),
                    detail: format!("parameters of function-like macro `{}`", m.name),
                });
            }
            env.function_macros.push(MacroFunction {
                name: m.name.clone(),
                params: m.params.clone(),
                body: m.body.trim().to_string(),
                guard: Guard::from_guarded(m.guarded),
            });
        }
        for m in &self.marker {
            env.markers.push(Marker {
                name: m.name.clone(),
                kind: m.kind,
                expansion: m.expansion.clone().filter(|e| !e.trim().is_empty()),
            });
        }
        for f in &self.function {
            let params = f
                .params
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    Ok(Param {
                        name: if p.name.is_empty() {
                            format!("param{i}")
                        } else {
                            p.name.clone()
                        },
                        ty: parse_type(&p.ty)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            env.stubs.push(StubDeclaration {
                name: f.name.clone(),
                return_type: parse_type(&f.returns)?,
                params,
                calling_convention: f.convention,
                convention_marker: f.marker.clone(),
                variadic: f.variadic,
            });
        }
        Ok(env)
    }
}

/// Resolve a path by searching `base_dir` first, then each `include_paths`
/// entry. Absolute paths are returned as-is. If the path is not found
/// anywhere, falls back to `base_dir.join(path)` so the caller reports a
/// meaningful error.
pub fn resolve_header(path: &Path, base_dir: &Path, include_paths: &[PathBuf]) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    let candidate = base_dir.join(path);
    if candidate.exists() {
        return candidate;
    }
    for inc in include_paths {
        let candidate = inc.join(path);
        if candidate.exists() {
            return candidate;
        }
    }
    base_dir.join(path)
}

/// Load and parse a `bnd-shim.toml` configuration file.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let config: Config = toml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {}", path.display(), e))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CType;

    const SAMPLE: &str = r#"
builtin = []

[session]
models = ["win64"]
search = "fake-fallback"
missing = "opaque"

[[header_set]]
name = "support"

[[header_set.header]]
name = "std_testcase.h"
include = ["<windows.h>"]
typedef = [
    { name = "UINT8", type = "unsigned char" },
    { name = "PUINT8", type = "UINT8 *" },
]
define = [
    { name = "LOCAL_MAX", value = "0xFF", guarded = true },
    { name = "GOOD", value = "0" },
]
function_macro = [
    { name = "MAX", params = ["a", "b"], body = "((a) > (b) ? (a) : (b))", guarded = true },
]
marker = [{ name = "NOINLINE", kind = "annotation" }]
function = [
    { name = "printLine", params = [{ name = "line", type = "const char *" }] },
    { name = "printFormatted", returns = "int", params = [{ name = "format", type = "const char *" }], variadic = true },
    { name = "globalReturnsTrue", returns = "int", marker = "NOINLINE" },
]
"#;

    #[test]
    fn parses_declarative_header() {
        let cfg: Config = toml::from_str(SAMPLE).unwrap();
        assert!(cfg.builtin.is_empty());
        assert_eq!(cfg.session.search, SearchPolicy::FakeFallback);
        assert_eq!(cfg.session.missing, MissingHeaderPolicy::Opaque);
        assert_eq!(cfg.output.dir, PathBuf::from("fake_include"));

        let set = &cfg.header_set[0];
        let models = set.effective_models(&cfg.session);
        assert_eq!(models, vec![TargetModel::Win64]);

        let env = set.header[0].to_environment(&models).unwrap();
        assert_eq!(env.header, "std_testcase.h");
        assert_eq!(
            env.alias("PUINT8").unwrap().target,
            CType::ptr(CType::named("UINT8"))
        );
        assert_eq!(env.constant("LOCAL_MAX").unwrap().value.as_integer(), Some(255));
        assert_eq!(env.constant("LOCAL_MAX").unwrap().guard, Guard::IfAbsent);
        assert_eq!(env.constant("GOOD").unwrap().guard, Guard::Always);
        assert_eq!(env.stub("printLine").unwrap().return_type, CType::Void);
        assert_eq!(
            env.stub("globalReturnsTrue").unwrap().convention_marker.as_deref(),
            Some("NOINLINE")
        );
        assert_eq!(env.includes, vec!["windows.h".to_string()]);

        let formatted = env.stub("printFormatted").unwrap();
        assert!(formatted.variadic);
        assert_eq!(
            formatted.prototype(),
            "int printFormatted(const char *format, ...)"
        );
        assert!(!env.stub("printLine").unwrap().variadic);

        let max = env.function_macro("MAX").unwrap();
        assert_eq!(max.signature(), "MAX(a, b)");
        assert_eq!(max.guard, Guard::IfAbsent);
    }

    #[test]
    fn bad_macro_parameter_is_reported() {
        let cfg: Config = toml::from_str(
            r#"
[[header_set]]
name = "bad"
[[header_set.header]]
name = "bad.h"
function_macro = [{ name = "TWICE", params = ["2x"], body = "((2x) * 2)" }]
"#,
        )
        .unwrap();
        let err = cfg.header_set[0].header[0]
            .to_environment(&[TargetModel::Win64])
            .unwrap_err();
        assert!(err.to_string().contains("TWICE"), "got {err}");
    }

    #[test]
    fn defaults_when_sections_missing() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.builtin, vec!["windows".to_string()]);
        assert_eq!(cfg.session.models, vec![TargetModel::Win32, TargetModel::Win64]);
        assert_eq!(cfg.session.search, SearchPolicy::FakeFirst);

        let default = Config::default();
        assert_eq!(default.builtin, cfg.builtin);
        assert_eq!(default.output.dir, cfg.output.dir);
    }

    #[test]
    fn bad_type_is_reported() {
        let header = HeaderConfig {
            name: "bad.h".to_string(),
            models: vec![],
            include: vec![],
            typedef: vec![TypedefConfig {
                name: "X".to_string(),
                ty: "unsigned float".to_string(),
            }],
            define: vec![],
            function_macro: vec![],
            marker: vec![],
            function: vec![],
        };
        let err = header.to_environment(&[TargetModel::Win64]).unwrap_err();
        assert!(err.to_string().contains("unsigned float"), "got {err}");
    }
}
