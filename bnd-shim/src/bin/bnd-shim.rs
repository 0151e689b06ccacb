//! CLI entry point for bnd-shim.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use bnd_shim::config::{self, Config};
use bnd_shim::guard::Session;
use bnd_shim::model::TargetModel;
use bnd_shim::registry::Resolution;
use bnd_shim::{conformance, frontend};

/// bnd-shim: fake platform headers for C front ends.
#[derive(Parser, Debug)]
#[command(name = "bnd-shim", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write every configured fake header set to disk.
    Materialize {
        /// Path to the bnd-shim.toml configuration file.
        #[arg(default_value = "bnd-shim.toml")]
        config: PathBuf,

        /// Output directory (overrides config).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show where a header resolves and the symbols it introduces.
    Resolve {
        header: String,

        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Width in bits of a type alias under a target model.
    Width {
        alias: String,

        #[arg(short, long)]
        model: TargetModel,

        /// Header that declares the alias.
        #[arg(long, default_value = "windows.h")]
        header: String,

        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Compare alias widths with the sizes libclang computes per target.
    Verify {
        #[arg(default_value = "bnd-shim.toml")]
        config: PathBuf,
    },
    /// Parse a C source against the fake headers and print diagnostics.
    Check {
        source: PathBuf,

        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(short, long, default_value = "win64")]
        model: TargetModel,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("bnd_shim=info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Materialize { config, output } => {
            let dir = bnd_shim::run(&config, output.as_deref())?;
            println!("{}", dir.display());
        }
        Command::Resolve { header, config } => resolve(&header, config.as_deref())?,
        Command::Width {
            alias,
            model,
            header,
            config,
        } => width(&alias, model, &header, config.as_deref())?,
        Command::Verify { config } => verify(&config)?,
        Command::Check {
            source,
            config,
            model,
        } => check(&source, config.as_deref(), model)?,
    }
    Ok(())
}

/// Config from `path`, or the built-in defaults when none is given.
fn load(path: Option<&Path>) -> Result<(Config, PathBuf)> {
    match path {
        Some(path) => {
            let cfg = config::load_config(path)?;
            let base_dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
            Ok((cfg, base_dir))
        }
        None => Ok((Config::default(), PathBuf::from("."))),
    }
}

fn resolve(header: &str, config: Option<&Path>) -> Result<()> {
    let (cfg, base_dir) = load(config)?;
    let registry = bnd_shim::build_registry(&cfg, &base_dir)?;
    let order = bnd_shim::search_order(&cfg, &registry, &base_dir);

    let resolutions = cfg
        .session
        .missing
        .apply(registry.resolve_with_includes(header, &order))
        .with_context(|| format!("resolving `{header}`"))?;
    let Some(resolutions) = resolutions else {
        println!("{header}: not found, treated as opaque");
        return Ok(());
    };

    // Dependencies come first; the requested header is last.
    let mut session = Session::new();
    for resolution in resolutions {
        match resolution {
            Resolution::Real { path } => println!("{header}: real header {}", path.display()),
            Resolution::Fake { set, env } => {
                println!("{}: fake header from set `{set}`", env.header);
                let report = session.commit(&env)?;
                for symbol in env.symbols() {
                    let definition = session
                        .lookup(&symbol.name)
                        .map(|d| d.to_string())
                        .unwrap_or_default();
                    println!("  {:<24} {definition}", symbol.name);
                }
                println!("{} symbol(s) installed", report.installed());
            }
        }
    }
    Ok(())
}

fn width(alias: &str, model: TargetModel, header: &str, config: Option<&Path>) -> Result<()> {
    let (cfg, base_dir) = load(config)?;
    let registry = bnd_shim::build_registry(&cfg, &base_dir)?;
    let order = bnd_shim::search_order(&cfg, &registry, &base_dir);

    let resolutions = registry.resolve_with_includes(header, &order)?;
    let mut session = Session::new();
    for resolution in &resolutions {
        let env = resolution
            .environment()
            .with_context(|| format!("`{header}` is a real header; widths are only known for fake headers"))?;
        session.commit(env)?;
    }
    let shape = session.shape_of(alias, model)?;
    println!("{alias} ({model}): {shape}");
    Ok(())
}

fn verify(config: &Path) -> Result<()> {
    let (cfg, base_dir) = load(Some(config))?;
    let registry = bnd_shim::build_registry(&cfg, &base_dir)?;
    let order = bnd_shim::search_order(&cfg, &registry, &base_dir);

    let scratch = tempfile::tempdir().context("creating scratch include directory")?;
    bnd_shim::materialize(&registry, scratch.path())?;
    let include_args = frontend::include_args(&order, scratch.path());
    let table = registry.shape_table();

    let mut failures = Vec::new();
    let mut checked = 0;
    let mut skipped = 0;
    bnd_shim::with_index(|index| {
        for set in registry.sets() {
            for env in set.headers() {
                for &model in &env.models {
                    let report = conformance::verify(
                        index,
                        env,
                        &table,
                        model,
                        &include_args,
                        &cfg.clang_args,
                    )
                    .with_context(|| format!("verifying {} for {model}", env.header))?;
                    checked += report.checked;
                    skipped += report.skipped.len();
                    failures.extend(report.mismatches);
                }
            }
        }
        Ok(())
    })?;

    for failure in &failures {
        eprintln!("{failure}");
    }
    if !failures.is_empty() {
        anyhow::bail!("{} of {checked} alias width(s) disagree with the compiler", failures.len());
    }
    println!("{checked} alias width(s) match the compiler ({skipped} without a recorded width)");
    Ok(())
}

fn check(source: &Path, config: Option<&Path>, model: TargetModel) -> Result<()> {
    let (cfg, base_dir) = load(config)?;
    let registry = bnd_shim::build_registry(&cfg, &base_dir)?;
    let order = bnd_shim::search_order(&cfg, &registry, &base_dir);

    let scratch = tempfile::tempdir().context("creating scratch include directory")?;
    bnd_shim::materialize(&registry, scratch.path())?;
    let include_args = frontend::include_args(&order, scratch.path());

    let diagnostics = bnd_shim::with_index(|index| {
        Ok(frontend::check_source(
            index,
            source,
            model,
            &include_args,
            &cfg.clang_args,
        )?)
    })?;

    for diagnostic in &diagnostics {
        println!("{diagnostic}");
    }
    let errors = diagnostics.iter().filter(|d| d.is_error()).count();
    if errors > 0 {
        anyhow::bail!("{} error(s) in {}", errors, source.display());
    }
    Ok(())
}
