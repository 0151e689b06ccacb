//! libclang as the front-end adapter: parse a source file against the
//! materialized fake include directories and report diagnostics.

use std::fmt;
use std::path::{Path, PathBuf};

use clang::diagnostic::Severity as ClangSeverity;
use clang::{Entity, Index};
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::TargetModel;
use crate::registry::SearchLocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Note,
    Warning,
    Error,
}

/// One compiler diagnostic, detached from the translation unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub file: Option<PathBuf>,
    pub line: u32,
    pub column: u32,
}

impl Diagnostic {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// An identifier or type name the front end could not resolve.
    pub fn is_unknown_identifier(&self) -> bool {
        self.message.contains("undeclared identifier")
            || self.message.contains("unknown type name")
            || self.message.contains("implicit declaration of function")
    }

    /// A value or initializer whose type does not fit its destination.
    pub fn is_type_mismatch(&self) -> bool {
        self.message.contains("incompatible type")
            || self.message.contains("void value not ignored")
            || self.message.contains("incompatible pointer")
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Note => "note",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        match &self.file {
            Some(file) => write!(
                f,
                "{}:{}:{}: {severity}: {}",
                file.display(),
                self.line,
                self.column,
                self.message
            ),
            None => write!(f, "{severity}: {}", self.message),
        }
    }
}

/// `-I` flags for a search order. Fake sets map to `fake_root/<set>`, the
/// layout [`crate::materialize`] writes.
pub fn include_args(order: &[SearchLocation], fake_root: &Path) -> Vec<String> {
    order
        .iter()
        .map(|location| match location {
            SearchLocation::Fake(set) => format!("-I{}", fake_root.join(set).display()),
            SearchLocation::Dir(dir) => format!("-I{}", dir.display()),
        })
        .collect()
}

/// Parse `source` for `model` with `-nostdinc` plus `include_args`, and
/// return every diagnostic at note level or above.
pub fn check_source(
    index: &Index,
    source: &Path,
    model: TargetModel,
    include_args: &[String],
    clang_args: &[String],
) -> Result<Vec<Diagnostic>> {
    let mut args = vec![
        format!("--target={}", model.triple()),
        "-nostdinc".to_string(),
    ];
    args.extend(include_args.iter().cloned());
    args.extend(clang_args.iter().cloned());
    debug!(source = %source.display(), ?args, "checking source");

    let tu = index
        .parser(source)
        .arguments(&args)
        .parse()
        .map_err(|e| Error::Clang(format!("failed to parse {}: {e:?}", source.display())))?;

    let diagnostics = tu
        .get_diagnostics()
        .iter()
        .filter_map(|d| {
            let severity = match d.get_severity() {
                ClangSeverity::Ignored => return None,
                ClangSeverity::Note => Severity::Note,
                ClangSeverity::Warning => Severity::Warning,
                ClangSeverity::Error | ClangSeverity::Fatal => Severity::Error,
            };
            let location = d.get_location().get_file_location();
            Some(Diagnostic {
                severity,
                message: d.get_text(),
                file: location.file.map(|f| f.get_path()),
                line: location.line,
                column: location.column,
            })
        })
        .collect();
    Ok(diagnostics)
}

/// True if `entity` was declared in a file under one of `fake_dirs`.
/// Consumers use it to prune fake-header declarations from their output.
pub fn is_fake_location(entity: &Entity, fake_dirs: &[PathBuf]) -> bool {
    let Some(location) = entity.get_location() else {
        return false;
    };
    let Some(file) = location.get_file_location().file else {
        return false;
    };
    let path = file.get_path();
    fake_dirs.iter().any(|dir| path.starts_with(dir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn include_args_follow_order() {
        let order = vec![
            SearchLocation::Dir(PathBuf::from("/sdk/include")),
            SearchLocation::Fake("windows".to_string()),
        ];
        let args = include_args(&order, Path::new("/tmp/fake"));
        assert_eq!(args, vec!["-I/sdk/include", "-I/tmp/fake/windows"]);
    }

    #[test]
    fn diagnostic_classification() {
        let d = Diagnostic {
            severity: Severity::Error,
            message: "initializing 'int' with an expression of incompatible type 'void'"
                .to_string(),
            file: Some(PathBuf::from("unit.c")),
            line: 4,
            column: 9,
        };
        assert!(d.is_error());
        assert!(d.is_type_mismatch());
        assert!(!d.is_unknown_identifier());
        assert_eq!(
            d.to_string(),
            "unit.c:4:9: error: initializing 'int' with an expression of incompatible type 'void'"
        );
    }
}
