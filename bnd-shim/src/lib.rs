//! bnd-shim: fake platform headers for C front ends.
//!
//! Supplies stand-ins for platform SDK headers (e.g. `windows.h`) so a
//! parser, static analyzer or cross-compiler front end can resolve
//! platform symbols with the correct type *shape* while no real SDK is
//! present. Headers are structured data ([`model::SymbolEnvironment`]),
//! committed per parse session through [`guard::Session`], found through
//! [`registry::Registry`] and rendered to C text on demand.
//!
//! # Quick start
//!
//! Materialize every configured fake header set into an include directory
//! (suitable for `build.rs`):
//!
//! ```no_run
//! use std::path::Path;
//!
//! // Reads config TOML, builds the header sets, writes one directory per set.
//! bnd_shim::run(Path::new("bnd-shim.toml"), None).unwrap();
//! ```
//!
//! Or resolve headers in-process without touching disk:
//!
//! ```
//! use bnd_shim::{builtin, guard::Session, model::TargetModel, registry::SearchPolicy};
//!
//! let registry = builtin::builtin_registry();
//! let order = registry.search_order(SearchPolicy::FakeFirst, &[]);
//! let resolved = registry.resolve("windows.h", &order).unwrap();
//!
//! let mut session = Session::new();
//! session.commit(resolved.environment().unwrap()).unwrap();
//! assert_eq!(session.width_of("HANDLE", TargetModel::Win64).unwrap(), 64);
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

pub mod builtin;
pub mod config;
pub mod conformance;
pub mod ctype;
pub mod error;
pub mod extract;
pub mod frontend;
pub mod guard;
pub mod model;
pub mod registry;
pub mod render;
pub mod shape;

pub use error::Error;

/// Run the full pipeline: load config, build every header set and write them
/// as C headers, one subdirectory per set.
///
/// `config_path` is the path to a `bnd-shim.toml` configuration file.
/// `output` optionally overrides the output directory from the config.
///
/// Returns the directory the header sets were written under.
pub fn run(config_path: &Path, output: Option<&Path>) -> Result<PathBuf> {
    let cfg = config::load_config(config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    let registry = build_registry(&cfg, base_dir)?;

    let output_dir = match output {
        Some(p) => p.to_path_buf(),
        None => base_dir.join(&cfg.output.dir),
    };
    let written = materialize(&registry, &output_dir)?;

    info!(
        path = %output_dir.display(),
        headers = written.len(),
        "wrote fake include directory"
    );

    Ok(output_dir)
}

/// Parse a `bnd-shim.toml` config file and build its registry without
/// writing to disk.
pub fn generate(config_path: &Path) -> Result<registry::Registry> {
    let cfg = config::load_config(config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    build_registry(&cfg, base_dir)
}

/// Build a registry from an already-loaded [`config::Config`].
///
/// Sets are registered in this order: built-ins listed in `builtin`, then
/// each `[[header_set]]` as written. `base_dir` is the directory relative
/// to which `dir` paths resolve (typically the TOML file's parent).
pub fn build_registry(cfg: &config::Config, base_dir: &Path) -> Result<registry::Registry> {
    info!(
        builtins = cfg.builtin.len(),
        header_sets = cfg.header_set.len(),
        "loaded configuration"
    );

    let mut registry = registry::Registry::new();
    for name in &cfg.builtin {
        let set = builtin::builtin_set(name).with_context(|| {
            format!(
                "unknown builtin header set `{name}` (known: {})",
                builtin::BUILTIN_SETS.join(", ")
            )
        })?;
        registry.add_set(set);
    }

    let needs_clang = cfg.header_set.iter().any(|s| s.dir.is_some());
    let extracted = if needs_clang {
        with_index(|index| {
            let mut sets = Vec::new();
            for set_cfg in cfg.header_set.iter() {
                let Some(dir) = &set_cfg.dir else {
                    continue;
                };
                let dir = config::resolve_header(dir, base_dir, &cfg.include_paths);
                let mut args = cfg.clang_args.clone();
                args.push("-nostdinc".to_string());
                args.extend(set_cfg.clang_args.iter().cloned());
                let models = set_cfg.effective_models(&cfg.session);
                let set = extract::extract_dir(index, &set_cfg.name, &dir, &models, &args)
                    .with_context(|| {
                        format!("extracting header set `{}` from {}", set_cfg.name, dir.display())
                    })?;
                sets.push(set);
            }
            Ok(sets)
        })?
    } else {
        Vec::new()
    };
    let mut extracted = extracted.into_iter();

    for set_cfg in &cfg.header_set {
        let mut set = match set_cfg.dir {
            Some(_) => extracted
                .next()
                .context("extracted header sets out of step with config")?,
            None => registry::HeaderSet::new(&set_cfg.name),
        };
        let models = set_cfg.effective_models(&cfg.session);
        for header in &set_cfg.header {
            let env = header.to_environment(&models).with_context(|| {
                format!("header `{}` in set `{}`", header.name, set_cfg.name)
            })?;
            set.insert(env);
        }
        registry.add_set(set);
    }

    // Aliases are reported by validation below; tags left undefined are
    // forward-declared by the renderer.
    for (header, name) in registry.link_includes() {
        if name.contains(' ') {
            warn!(header = %header, tag = %name, "record or enum tag defined by no header");
        }
    }

    validate_type_references(&registry)?;

    Ok(registry)
}

/// Write every set of `registry` under `out_dir/<set name>/`.
pub fn materialize(registry: &registry::Registry, out_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for set in registry.sets() {
        let dir = out_dir.join(set.name());
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating {}", dir.display()))?;
        let paths = render::write_set(set, &dir)
            .with_context(|| format!("writing header set `{}`", set.name()))?;
        written.extend(paths);
    }
    Ok(written)
}

/// Search order the config asks for: every registered set plus
/// `include_paths`, arranged by `session.search`.
pub fn search_order(
    cfg: &config::Config,
    registry: &registry::Registry,
    base_dir: &Path,
) -> Vec<registry::SearchLocation> {
    let real_dirs: Vec<PathBuf> = cfg
        .include_paths
        .iter()
        .map(|p| {
            if p.is_absolute() {
                p.clone()
            } else {
                base_dir.join(p)
            }
        })
        .collect();
    registry.search_order(cfg.session.search, &real_dirs)
}

/// Run `f` with a fresh libclang index.
///
/// libclang allows one `Clang` instance per process at a time, so callers
/// must not nest this.
pub fn with_index<T>(f: impl FnOnce(&clang::Index) -> Result<T>) -> Result<T> {
    let clang =
        clang::Clang::new().map_err(|e| anyhow::anyhow!("failed to initialize libclang: {e}"))?;
    let index = clang::Index::new(&clang, false, false);
    f(&index)
}

// ---------------------------------------------------------------------------
// Type-reference validation
// ---------------------------------------------------------------------------

/// A single unresolved alias reference with context about where it was found.
struct UnresolvedRef {
    type_name: String,
    set: String,
    context: String,
}

/// Verify that every alias name used by a typedef, record member or stub is
/// defined by some registered header. An unresolved name would otherwise surface much
/// later as an `UnknownAlias` width query.
fn validate_type_references(registry: &registry::Registry) -> Result<()> {
    let known: HashSet<&str> = registry
        .sets()
        .iter()
        .flat_map(|s| s.headers())
        .flat_map(|env| env.aliases.iter().map(|a| a.name.as_str()))
        .collect();

    let mut unresolved = Vec::new();
    for set in registry.sets() {
        for env in set.headers() {
            let mut check = |ty: &model::CType, context: String| {
                for name in ty.referenced_names() {
                    if !known.contains(name) {
                        unresolved.push(UnresolvedRef {
                            type_name: name.to_string(),
                            set: set.name().to_string(),
                            context: context.clone(),
                        });
                    }
                }
            };
            for alias in &env.aliases {
                check(&alias.target, format!("typedef `{}` in {}", alias.name, env.header));
            }
            for record in &env.records {
                for field in &record.fields {
                    check(
                        &field.ty,
                        format!("member `{}` of `{}` in {}", field.name, record.ty(), env.header),
                    );
                }
            }
            for stub in &env.stubs {
                check(
                    &stub.return_type,
                    format!("return type of `{}` in {}", stub.name, env.header),
                );
                for param in &stub.params {
                    check(
                        &param.ty,
                        format!("param `{}` of `{}` in {}", param.name, stub.name, env.header),
                    );
                }
            }
        }
    }

    if unresolved.is_empty() {
        return Ok(());
    }

    let mut seen = HashSet::new();
    let unique: Vec<&UnresolvedRef> = unresolved
        .iter()
        .filter(|r| seen.insert(r.type_name.as_str()))
        .collect();
    for r in &unique {
        warn!(name = %r.type_name, set = %r.set, "unresolved alias reference");
    }

    let mut msg = format!(
        "{} unresolved type reference(s) found; width queries for these would \
         fail with UnknownAlias.\n\
         Hint: add a `typedef` for each name to a header set, or list the \
         builtin that defines it in `builtin`.\n",
        unique.len()
    );
    for r in &unique {
        msg.push_str(&format!(
            "\n  • `{}`: referenced in {} (set `{}`)",
            r.type_name, r.context, r.set,
        ));
    }

    anyhow::bail!("{msg}");
}
