//! Error kinds surfaced by the substitution layer.

use crate::model::{Definition, TargetModel};

/// Errors raised while building, resolving or committing fake headers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No width is recorded for this alias under this target model.
    #[error("unknown alias `{alias}` for target model {model}: no width recorded")]
    UnknownAlias { alias: String, model: TargetModel },

    /// Two differing definitions for one symbol name.
    #[error("conflicting redefinition of `{name}`: existing `{existing}`, incoming `{incoming}`")]
    RedefinitionConflict {
        name: String,
        existing: Definition,
        incoming: Definition,
    },

    /// The header is absent from every search location.
    #[error("header `{header}` not found in any search location")]
    NotFound { header: String },

    /// A declared alias width disagrees with what the platform compiler reports.
    #[error(
        "shape mismatch for `{alias}` on {model}: table says {declared} bits, compiler says {actual} bits"
    )]
    ShapeMismatch {
        alias: String,
        model: TargetModel,
        declared: u32,
        actual: u32,
    },

    /// A C type spelling that cannot be parsed.
    #[error("invalid C type `{spelling}`: {detail}")]
    InvalidType { spelling: String, detail: String },

    /// A macro value, model name or other scalar setting that cannot be parsed.
    #[error("invalid value `{spelling}`: {detail}")]
    InvalidValue { spelling: String, detail: String },

    /// libclang failed to initialize or parse.
    #[error("libclang: {0}")]
    Clang(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// `NotFound` is the only kind an adapter may choose to recover from.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

/// Result type alias for substitution-layer operations.
pub type Result<T> = std::result::Result<T, Error>;
