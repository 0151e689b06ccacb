//! Type-shape table: width, signedness and alignment per alias and model.
//!
//! The table only answers for alias/model pairs it recorded. Anything else is
//! an [`Error::UnknownAlias`]; a guessed width would silently corrupt every
//! later `sizeof`, cast and arithmetic judgment the front end makes.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::model::{CType, SymbolEnvironment, TargetModel, TypeAlias};

/// Alias chains longer than this are treated as cycles.
const MAX_ALIAS_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signedness {
    Signed,
    Unsigned,
}

/// Canonical kind an alias bottoms out in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Bool,
    Integer,
    Character,
    WideCharacter,
    Float,
    Pointer,
}

/// Size and representation of a scalar under one target model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shape {
    pub kind: ShapeKind,
    pub bits: u32,
    pub align_bits: u32,
    pub signedness: Signedness,
}

impl Shape {
    fn scalar(kind: ShapeKind, bits: u32, signedness: Signedness) -> Shape {
        Shape {
            kind,
            bits,
            align_bits: bits,
            signedness,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = match self.signedness {
            Signedness::Signed => "signed",
            Signedness::Unsigned => "unsigned",
        };
        write!(
            f,
            "{:?} {} bits ({sign}, align {})",
            self.kind, self.bits, self.align_bits
        )
    }
}

/// Shape of a primitive C type under `model`. `None` for `void`, arrays and
/// records, and for alias names, which only a [`ShapeTable`] can resolve.
pub fn primitive_shape(ty: &CType, model: TargetModel) -> Option<Shape> {
    use ShapeKind::*;
    use Signedness::*;

    // `long` is 32-bit on both Windows models (ILP32/LLP64), 64-bit on LP64.
    let long_bits = match model {
        TargetModel::Win32 | TargetModel::Win64 => 32,
        TargetModel::Linux64 => 64,
    };
    let shape = match ty {
        CType::Void | CType::Named(_) | CType::Array { .. } | CType::Record { .. } => return None,
        // MSVC enums are always `int`; SysV picks `unsigned int` when no
        // enumerator is negative, which a bare tag does not tell us.
        CType::Enum(_) if model.is_windows() => Shape::scalar(Integer, 32, Signed),
        CType::Enum(_) => return None,
        CType::Bool => Shape::scalar(Bool, 8, Unsigned),
        // plain char is signed on every modeled x86 ABI
        CType::Char => Shape::scalar(Character, 8, Signed),
        CType::SChar => Shape::scalar(Character, 8, Signed),
        CType::UChar => Shape::scalar(Character, 8, Unsigned),
        CType::Short => Shape::scalar(Integer, 16, Signed),
        CType::UShort => Shape::scalar(Integer, 16, Unsigned),
        CType::Int => Shape::scalar(Integer, 32, Signed),
        CType::UInt => Shape::scalar(Integer, 32, Unsigned),
        CType::Long => Shape::scalar(Integer, long_bits, Signed),
        CType::ULong => Shape::scalar(Integer, long_bits, Unsigned),
        CType::LongLong => Shape::scalar(Integer, 64, Signed),
        CType::ULongLong => Shape::scalar(Integer, 64, Unsigned),
        CType::WChar if model.is_windows() => Shape::scalar(WideCharacter, 16, Unsigned),
        CType::WChar => Shape::scalar(WideCharacter, 32, Signed),
        CType::Float => Shape::scalar(Float, 32, Signed),
        CType::Double => Shape::scalar(Float, 64, Signed),
        CType::Ptr { .. } => Shape::scalar(Pointer, model.pointer_bits(), Unsigned),
    };
    Some(shape)
}

/// Recorded shapes keyed by `(alias, model)`.
#[derive(Debug, Clone, Default)]
pub struct ShapeTable {
    shapes: HashMap<(String, TargetModel), Shape>,
}

impl ShapeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table for every alias of `env` under the models it claims.
    pub fn for_environment(env: &SymbolEnvironment) -> Self {
        let mut table = Self::new();
        table.extend(&env.aliases, &env.models);
        table
    }

    /// Record `aliases` under each of `models`.
    ///
    /// Names resolve against `aliases` first, then against shapes this table
    /// already holds for the same model, so headers can build on each other.
    /// Aliases that bottom out in `void` or in an unknown name are skipped and
    /// keep answering `UnknownAlias`.
    pub fn extend(&mut self, aliases: &[TypeAlias], models: &[TargetModel]) {
        let local: HashMap<&str, &CType> = aliases
            .iter()
            .map(|a| (a.name.as_str(), &a.target))
            .collect();
        for &model in models {
            for alias in aliases {
                match self.resolve(&alias.target, model, &local, 0) {
                    Some(shape) => {
                        trace!(alias = %alias.name, %model, bits = shape.bits, "recorded shape");
                        self.shapes.insert((alias.name.clone(), model), shape);
                    }
                    None => {
                        debug!(alias = %alias.name, %model, "alias has no scalar shape, not recorded");
                    }
                }
            }
        }
    }

    /// Merge another table in; existing entries are kept.
    pub fn merge(&mut self, other: &ShapeTable) {
        for (key, shape) in &other.shapes {
            self.shapes.entry(key.clone()).or_insert(*shape);
        }
    }

    fn resolve(
        &self,
        ty: &CType,
        model: TargetModel,
        local: &HashMap<&str, &CType>,
        depth: usize,
    ) -> Option<Shape> {
        if depth > MAX_ALIAS_DEPTH {
            return None;
        }
        match ty {
            CType::Named(name) => match local.get(name.as_str()) {
                Some(target) => self.resolve(target, model, local, depth + 1),
                None => self.shapes.get(&(name.clone(), model)).copied(),
            },
            other => primitive_shape(other, model),
        }
    }

    /// Full shape of `alias` under `model`.
    pub fn shape_of(&self, alias: &str, model: TargetModel) -> Result<Shape> {
        self.shapes
            .get(&(alias.to_string(), model))
            .copied()
            .ok_or_else(|| Error::UnknownAlias {
                alias: alias.to_string(),
                model,
            })
    }

    /// Bit width of `alias` under `model`.
    pub fn width_of(&self, alias: &str, model: TargetModel) -> Result<u32> {
        self.shape_of(alias, model).map(|s| s.bits)
    }

    /// Models `alias` has a recorded shape for, sorted.
    pub fn models_for(&self, alias: &str) -> Vec<TargetModel> {
        let mut models: Vec<TargetModel> = self
            .shapes
            .keys()
            .filter(|(name, _)| name == alias)
            .map(|(_, model)| *model)
            .collect();
        models.sort();
        models
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alias(name: &str, target: CType) -> TypeAlias {
        TypeAlias {
            name: name.to_string(),
            target,
        }
    }

    #[test]
    fn chains_resolve_through_local_aliases() {
        let aliases = vec![
            alias("HANDLE", CType::ptr(CType::Void)),
            alias("HWND", CType::named("HANDLE")),
            alias("DWORD", CType::ULong),
        ];
        let mut table = ShapeTable::new();
        table.extend(&aliases, &[TargetModel::Win32, TargetModel::Linux64]);

        assert_eq!(table.width_of("HWND", TargetModel::Win32).unwrap(), 32);
        assert_eq!(table.width_of("HWND", TargetModel::Linux64).unwrap(), 64);
        assert_eq!(table.width_of("DWORD", TargetModel::Linux64).unwrap(), 64);
        assert_eq!(
            table.models_for("DWORD"),
            vec![TargetModel::Win32, TargetModel::Linux64]
        );
    }

    #[test]
    fn unclaimed_model_is_unknown() {
        let mut table = ShapeTable::new();
        table.extend(&[alias("LONG", CType::Long)], &[TargetModel::Win64]);
        let err = table.width_of("LONG", TargetModel::Linux64).unwrap_err();
        assert!(matches!(err, Error::UnknownAlias { .. }), "got {err:?}");
    }

    #[test]
    fn void_and_dangling_aliases_are_not_recorded() {
        let aliases = vec![
            alias("VOID", CType::Void),
            alias("PFOO", CType::named("FOO")),
            alias("LOOP_A", CType::named("LOOP_B")),
            alias("LOOP_B", CType::named("LOOP_A")),
        ];
        let mut table = ShapeTable::new();
        table.extend(&aliases, &[TargetModel::Win64]);
        assert!(table.is_empty());
        assert!(table.width_of("VOID", TargetModel::Win64).is_err());
        assert!(table.width_of("LOOP_A", TargetModel::Win64).is_err());
    }

    #[test]
    fn later_headers_build_on_recorded_shapes() {
        let mut table = ShapeTable::new();
        table.extend(&[alias("WORD", CType::UShort)], &[TargetModel::Win64]);
        table.extend(&[alias("ATOM", CType::named("WORD"))], &[TargetModel::Win64]);
        let shape = table.shape_of("ATOM", TargetModel::Win64).unwrap();
        assert_eq!(shape.bits, 16);
        assert_eq!(shape.signedness, Signedness::Unsigned);
    }

    #[test]
    fn records_have_no_scalar_shape() {
        let aliases = vec![
            alias("tm_t", CType::record("tm")),
            alias("ptm_t", CType::ptr(CType::record("tm"))),
            alias("kind_t", CType::Enum("kind".to_string())),
        ];
        let mut table = ShapeTable::new();
        table.extend(&aliases, &[TargetModel::Win32, TargetModel::Linux64]);
        assert!(table.width_of("tm_t", TargetModel::Win32).is_err());
        assert_eq!(table.width_of("ptm_t", TargetModel::Win32).unwrap(), 32);
        assert_eq!(table.width_of("kind_t", TargetModel::Win32).unwrap(), 32);
        assert!(table.width_of("kind_t", TargetModel::Linux64).is_err());
    }

    #[test]
    fn wchar_follows_platform() {
        assert_eq!(primitive_shape(&CType::WChar, TargetModel::Win64).unwrap().bits, 16);
        assert_eq!(primitive_shape(&CType::WChar, TargetModel::Linux64).unwrap().bits, 32);
    }
}
