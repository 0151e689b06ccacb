//! Conformance check: table widths vs. what a real compiler reports.
//!
//! The substitution layer cannot verify its own widths at resolution time.
//! This check renders an environment, parses it with libclang for each
//! model's target triple and compares `sizeof` of every typedef against the
//! shape table. Disagreements come back as [`Error::ShapeMismatch`].
//! Headers that `#include` other fake headers need the `-I` arguments of
//! the materialized sets, and a table that covers the included aliases.

use std::path::Path;

use clang::{EntityKind, Index};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::{SymbolEnvironment, TargetModel};
use crate::registry::normalize_header_name;
use crate::render::render_header;
use crate::shape::ShapeTable;

/// Outcome of checking one environment under one model.
#[derive(Debug)]
pub struct ConformanceReport {
    pub header: String,
    pub model: TargetModel,
    /// Aliases compared against the compiler.
    pub checked: usize,
    /// One `Error::ShapeMismatch` per disagreeing alias.
    pub mismatches: Vec<Error>,
    /// Aliases the table has no width for under this model.
    pub skipped: Vec<String>,
}

impl ConformanceReport {
    pub fn is_conformant(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// `Ok(checked)` when conformant, otherwise the first mismatch.
    pub fn into_result(mut self) -> Result<usize> {
        if self.mismatches.is_empty() {
            Ok(self.checked)
        } else {
            Err(self.mismatches.swap_remove(0))
        }
    }
}

/// Check every alias of `env` recorded in `table` under `model`.
///
/// `include_args` (see [`crate::frontend::include_args`]) and `clang_args`
/// are appended after the target and `-nostdinc` flags.
pub fn verify(
    index: &Index,
    env: &SymbolEnvironment,
    table: &ShapeTable,
    model: TargetModel,
    include_args: &[String],
    clang_args: &[String],
) -> Result<ConformanceReport> {
    let scratch = tempfile::tempdir()?;
    let header_path = scratch.path().join(normalize_header_name(&env.header));
    if let Some(parent) = header_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&header_path, render_header(env))?;

    let mut args = include_args.to_vec();
    args.extend(clang_args.iter().cloned());
    let widths = compiler_widths(index, &header_path, model, &args)?;

    let mut report = ConformanceReport {
        header: env.header.clone(),
        model,
        checked: 0,
        mismatches: Vec::new(),
        skipped: Vec::new(),
    };
    for alias in &env.aliases {
        let declared = match table.width_of(&alias.name, model) {
            Ok(bits) => bits,
            Err(e) => {
                warn!(alias = %alias.name, %model, err = %e, "alias left unchecked");
                report.skipped.push(alias.name.clone());
                continue;
            }
        };
        let Some(actual) = widths.iter().find(|(n, _)| *n == alias.name).map(|(_, w)| *w) else {
            warn!(alias = %alias.name, %model, "compiler reported no size for alias");
            continue;
        };
        report.checked += 1;
        if declared != actual {
            report.mismatches.push(Error::ShapeMismatch {
                alias: alias.name.clone(),
                model,
                declared,
                actual,
            });
        }
    }

    info!(
        header = %report.header,
        %model,
        checked = report.checked,
        skipped = report.skipped.len(),
        mismatches = report.mismatches.len(),
        "conformance check complete"
    );
    Ok(report)
}

/// `(typedef name, bits)` for every sized typedef declared in `header`.
fn compiler_widths(
    index: &Index,
    header: &Path,
    model: TargetModel,
    clang_args: &[String],
) -> Result<Vec<(String, u32)>> {
    let mut args = vec![
        format!("--target={}", model.triple()),
        "-nostdinc".to_string(),
        "-xc".to_string(),
    ];
    args.extend(clang_args.iter().cloned());

    let tu = index
        .parser(header)
        .arguments(&args)
        .skip_function_bodies(true)
        .parse()
        .map_err(|e| Error::Clang(format!("failed to parse {}: {e:?}", header.display())))?;

    let mut widths = Vec::new();
    for entity in tu.get_entity().get_children() {
        if entity.get_kind() != EntityKind::TypedefDecl {
            continue;
        }
        let Some(name) = entity.get_name() else {
            continue;
        };
        let Some(ty) = entity.get_type() else {
            continue;
        };
        match ty.get_sizeof() {
            Ok(bytes) => {
                debug!(name = %name, bytes, triple = model.triple(), "compiler size");
                widths.push((name, (bytes * 8) as u32));
            }
            Err(e) => debug!(name = %name, err = ?e, "typedef has no size"),
        }
    }
    Ok(widths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_into_result() {
        let ok = ConformanceReport {
            header: "windows.h".to_string(),
            model: TargetModel::Win64,
            checked: 3,
            mismatches: vec![],
            skipped: vec![],
        };
        assert!(ok.is_conformant());
        assert_eq!(ok.into_result().unwrap(), 3);

        let bad = ConformanceReport {
            header: "windows.h".to_string(),
            model: TargetModel::Win64,
            checked: 1,
            mismatches: vec![Error::ShapeMismatch {
                alias: "LONG".to_string(),
                model: TargetModel::Win64,
                declared: 64,
                actual: 32,
            }],
            skipped: vec!["TIMER".to_string()],
        };
        assert!(!bad.is_conformant());
        let err = bad.into_result().unwrap_err();
        assert!(err.to_string().contains("LONG"), "got {err}");
    }
}
