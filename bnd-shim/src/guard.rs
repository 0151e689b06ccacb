//! Guard controller: per-session, define-if-absent symbol commits.
//!
//! A [`Session`] replaces textual `#ifndef` state with an explicit map keyed
//! by symbol name. Each translation unit owns its own session; nothing here
//! is process-global, so parallel parses cannot suppress each other's
//! definitions.

use std::collections::HashMap;

use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::model::{CType, Definition, Guard, MacroValue, Symbol, SymbolEnvironment, TargetModel};
use crate::registry::normalize_header_name;
use crate::shape::{Shape, ShapeTable};

/// Constants referring to other constants are folded at most this deep.
const MAX_FOLD_DEPTH: usize = 16;

/// Outcome of introducing one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Introduced {
    Installed,
    AlreadyPresent,
}

/// Where a committed symbol came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// Command-line `-D` or a definition seen earlier in the unit.
    Predefined,
    /// Introduced directly by the adapter.
    Unit,
    /// Committed from the named header.
    Header(String),
}

#[derive(Debug, Clone)]
struct Entry {
    definition: Definition,
    origin: Origin,
}

/// Include guard of one header within a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeGuard {
    pub header: String,
    pub committed: bool,
}

/// Result of committing one header's environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReport {
    pub header: String,
    /// False when the header's include guard was already committed.
    pub first: bool,
    pub outcomes: Vec<(String, Introduced)>,
}

impl CommitReport {
    pub fn installed(&self) -> usize {
        self.count(Introduced::Installed)
    }

    pub fn already_present(&self) -> usize {
        self.count(Introduced::AlreadyPresent)
    }

    fn count(&self, kind: Introduced) -> usize {
        self.outcomes.iter().filter(|(_, o)| *o == kind).count()
    }
}

/// Symbol table and guard state of one parse session.
#[derive(Debug, Default)]
pub struct Session {
    symbols: HashMap<String, Entry>,
    guards: HashMap<String, IncludeGuard>,
    shapes: ShapeTable,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a constant before any header is resolved, like `-DNAME=value`.
    pub fn predefine(&mut self, name: &str, value: MacroValue) -> Result<Introduced> {
        let symbol = Symbol {
            name: name.to_string(),
            definition: Definition::Constant(value),
            guard: Guard::Always,
        };
        self.introduce_from(&symbol, Origin::Predefined)
    }

    /// Introduce a single symbol on behalf of the unit being parsed.
    pub fn introduce(&mut self, symbol: &Symbol) -> Result<Introduced> {
        self.introduce_from(symbol, Origin::Unit)
    }

    fn introduce_from(&mut self, symbol: &Symbol, origin: Origin) -> Result<Introduced> {
        let outcome = self.check(symbol)?;
        if outcome == Introduced::Installed {
            trace!(name = %symbol.name, "installed");
            self.symbols.insert(
                symbol.name.clone(),
                Entry {
                    definition: symbol.definition.clone(),
                    origin,
                },
            );
        }
        Ok(outcome)
    }

    /// Decide what introducing `symbol` would do, without mutating.
    fn check(&self, symbol: &Symbol) -> Result<Introduced> {
        let Some(existing) = self.symbols.get(&symbol.name) else {
            return Ok(Introduced::Installed);
        };
        if existing.definition == symbol.definition {
            return Ok(Introduced::AlreadyPresent);
        }
        match symbol.guard {
            Guard::IfAbsent => {
                debug!(
                    name = %symbol.name,
                    kept = %existing.definition,
                    skipped = %symbol.definition,
                    "guarded definition skipped, earlier definition wins"
                );
                Ok(Introduced::AlreadyPresent)
            }
            Guard::Always => Err(Error::RedefinitionConflict {
                name: symbol.name.clone(),
                existing: existing.definition.clone(),
                incoming: symbol.definition.clone(),
            }),
        }
    }

    /// Commit every symbol of `env` and close its include guard.
    ///
    /// All symbols are checked before any is installed: on a conflict the
    /// session is left untouched and the first conflict is returned.
    /// Committing the same header again reports `AlreadyPresent` for every
    /// symbol.
    pub fn commit(&mut self, env: &SymbolEnvironment) -> Result<CommitReport> {
        let header = normalize_header_name(&env.header);
        let symbols = env.symbols();

        let mut conflicts: Vec<Error> = symbols
            .iter()
            .filter_map(|symbol| self.check(symbol).err())
            .collect();
        // Two symbols of one environment may also collide with each other.
        let mut seen: HashMap<&str, &Definition> = HashMap::new();
        for symbol in &symbols {
            if let Some(prev) = seen.insert(symbol.name.as_str(), &symbol.definition)
                && *prev != symbol.definition
                && symbol.guard == Guard::Always
            {
                conflicts.push(Error::RedefinitionConflict {
                    name: symbol.name.clone(),
                    existing: prev.clone(),
                    incoming: symbol.definition.clone(),
                });
            }
        }
        if !conflicts.is_empty() {
            for extra in &conflicts[1..] {
                warn!(header = %header, err = %extra, "additional conflict");
            }
            return Err(conflicts.swap_remove(0));
        }

        let mut outcomes = Vec::with_capacity(symbols.len());
        for symbol in &symbols {
            // Re-check: an earlier symbol of this same header may have just
            // installed the name.
            let outcome = self.check(symbol)?;
            outcomes.push((symbol.name.clone(), outcome));
            if outcome == Introduced::Installed {
                self.symbols.insert(
                    symbol.name.clone(),
                    Entry {
                        definition: symbol.definition.clone(),
                        origin: Origin::Header(header.clone()),
                    },
                );
            }
        }
        self.shapes.extend(&env.aliases, &env.models);

        let guard = self
            .guards
            .entry(header.clone())
            .or_insert_with(|| IncludeGuard {
                header: header.clone(),
                committed: false,
            });
        let first = !guard.committed;
        guard.committed = true;

        let report = CommitReport {
            header,
            first,
            outcomes,
        };
        debug!(
            header = %report.header,
            first = report.first,
            installed = report.installed(),
            already_present = report.already_present(),
            "committed header"
        );
        Ok(report)
    }

    /// True once `header`'s environment has been committed.
    pub fn is_committed(&self, header: &str) -> bool {
        self.guards
            .get(&normalize_header_name(header))
            .is_some_and(|g| g.committed)
    }

    pub fn include_guard(&self, header: &str) -> Option<&IncludeGuard> {
        self.guards.get(&normalize_header_name(header))
    }

    pub fn lookup(&self, name: &str) -> Option<&Definition> {
        self.symbols.get(name).map(|e| &e.definition)
    }

    pub fn origin_of(&self, name: &str) -> Option<&Origin> {
        self.symbols.get(name).map(|e| &e.origin)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    /// Declared return type of a function symbol.
    pub fn return_type_of(&self, name: &str) -> Option<&CType> {
        match self.lookup(name)? {
            Definition::Function { return_type, .. } => Some(return_type),
            _ => None,
        }
    }

    /// Fold an integer constant or enumerator, following constants that
    /// name other constants (`#define OK TRUE`).
    pub fn fold_constant(&self, name: &str) -> Option<i64> {
        let mut current = name;
        for _ in 0..MAX_FOLD_DEPTH {
            match self.lookup(current)? {
                Definition::Constant(MacroValue::Integer { value, .. }) => return Some(*value),
                Definition::Enumerator(value) => return Some(*value),
                Definition::Constant(MacroValue::Tokens(tokens)) => current = tokens.trim(),
                _ => return None,
            }
        }
        None
    }

    /// Shape of an alias committed in this session.
    pub fn shape_of(&self, alias: &str, model: TargetModel) -> Result<Shape> {
        self.shapes.shape_of(alias, model)
    }

    pub fn width_of(&self, alias: &str, model: TargetModel) -> Result<u32> {
        self.shapes.width_of(alias, model)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
