//! Header set registry: header name + search order → environment.
//!
//! The registry is order-agnostic: callers (the front-end adapter) build a
//! search order from a [`SearchPolicy`] and the registry returns the first
//! hit along it. Fake header sets and real include directories share one
//! order, so the same data serves "always substitute" and "fill gaps only".

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::SymbolEnvironment;
use crate::shape::ShapeTable;

/// Normalize a header name so `<windows.h>`, `"./windows.h"` and
/// `sys\types.h` address the same entry as `windows.h` / `sys/types.h`.
pub fn normalize_header_name(name: &str) -> String {
    let trimmed = name
        .trim()
        .trim_start_matches(['<', '"'])
        .trim_end_matches(['>', '"']);
    let mut normalized = trimmed.replace('\\', "/");
    while let Some(rest) = normalized.strip_prefix("./") {
        normalized = rest.to_string();
    }
    normalized
}

/// Key fake headers are stored and looked up under. SDK headers are
/// spelled with any capitalization (`<Windows.h>`, `<WinBase.h>`), so the
/// lookup ignores ASCII case.
fn lookup_key(name: &str) -> String {
    normalize_header_name(name).to_ascii_lowercase()
}

/// A named collection of fake headers (e.g. `windows`, `fake_libc`).
#[derive(Debug, Clone, Default)]
pub struct HeaderSet {
    name: String,
    headers: BTreeMap<String, Arc<SymbolEnvironment>>,
}

impl HeaderSet {
    pub fn new(name: &str) -> Self {
        HeaderSet {
            name: name.to_string(),
            headers: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add an environment under its (normalized) header name. A second
    /// environment for the same header replaces the first.
    pub fn insert(&mut self, env: SymbolEnvironment) {
        self.insert_shared(Arc::new(env));
    }

    fn insert_shared(&mut self, env: Arc<SymbolEnvironment>) {
        let key = lookup_key(&env.header);
        if let Some(previous) = self.headers.get(&key) {
            warn!(
                set = %self.name,
                header = %env.header,
                replaced = %previous.header,
                "replacing header already in set"
            );
        }
        self.headers.insert(key, env);
    }

    /// Look up a header, ignoring ASCII case.
    pub fn get(&self, header: &str) -> Option<&Arc<SymbolEnvironment>> {
        self.headers.get(&lookup_key(header))
    }

    /// Headers in name order.
    pub fn headers(&self) -> impl Iterator<Item = &Arc<SymbolEnvironment>> {
        self.headers.values()
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

/// One step of a search order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchLocation {
    /// A registered fake header set, by name.
    Fake(String),
    /// A real include directory on disk.
    Dir(PathBuf),
}

/// Where fake header sets go relative to real include directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchPolicy {
    /// Fake headers shadow any real SDK header (always substitute).
    #[default]
    FakeFirst,
    /// Fake headers only fill gaps the real SDK leaves.
    FakeFallback,
}

impl SearchPolicy {
    pub fn order(self, fake_sets: &[String], real_dirs: &[PathBuf]) -> Vec<SearchLocation> {
        let fake = fake_sets.iter().cloned().map(SearchLocation::Fake);
        let real = real_dirs.iter().cloned().map(SearchLocation::Dir);
        match self {
            SearchPolicy::FakeFirst => fake.chain(real).collect(),
            SearchPolicy::FakeFallback => real.chain(fake).collect(),
        }
    }
}

/// What the adapter does with a header no location provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingHeaderPolicy {
    /// Report a parse error.
    #[default]
    Error,
    /// Continue; symbols from the header are assumed opaque.
    Opaque,
}

impl MissingHeaderPolicy {
    /// Apply the policy to a resolution result. Only `NotFound` is ever
    /// downgraded; every other error passes through.
    pub fn apply<T>(self, result: Result<T>) -> Result<Option<T>> {
        match result {
            Ok(resolution) => Ok(Some(resolution)),
            Err(Error::NotFound { header }) if self == MissingHeaderPolicy::Opaque => {
                warn!(header = %header, "header not found, symbols assumed opaque");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// Where a header resolved to.
#[derive(Debug, Clone)]
pub enum Resolution {
    Fake {
        set: String,
        env: Arc<SymbolEnvironment>,
    },
    Real {
        path: PathBuf,
    },
}

impl Resolution {
    pub fn is_fake(&self) -> bool {
        matches!(self, Resolution::Fake { .. })
    }

    pub fn environment(&self) -> Option<&Arc<SymbolEnvironment>> {
        match self {
            Resolution::Fake { env, .. } => Some(env),
            Resolution::Real { .. } => None,
        }
    }
}

/// All fake header sets known to a host tool, in registration order.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    sets: Vec<HeaderSet>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a header set. A set with the same name is merged into: its
    /// headers are kept unless `set` provides the same header, which then
    /// replaces it.
    pub fn add_set(&mut self, set: HeaderSet) {
        if let Some(existing) = self.sets.iter_mut().find(|s| s.name == set.name) {
            debug!(set = %set.name, headers = set.len(), "merging into existing header set");
            for env in set.headers.into_values() {
                existing.insert_shared(env);
            }
            return;
        }
        debug!(set = %set.name, headers = set.len(), "registered header set");
        self.sets.push(set);
    }

    pub fn set(&self, name: &str) -> Option<&HeaderSet> {
        self.sets.iter().find(|s| s.name == name)
    }

    pub fn sets(&self) -> &[HeaderSet] {
        &self.sets
    }

    /// Set names in registration order.
    pub fn set_names(&self) -> Vec<String> {
        self.sets.iter().map(|s| s.name.clone()).collect()
    }

    /// Search order for `policy` over every registered set and `real_dirs`.
    pub fn search_order(&self, policy: SearchPolicy, real_dirs: &[PathBuf]) -> Vec<SearchLocation> {
        policy.order(&self.set_names(), real_dirs)
    }

    /// Return the first environment or real header found along `order`.
    ///
    /// Unknown fake set names in `order` are skipped with a warning.
    pub fn resolve(&self, header: &str, order: &[SearchLocation]) -> Result<Resolution> {
        let name = normalize_header_name(header);
        for location in order {
            match location {
                SearchLocation::Fake(set_name) => {
                    let Some(set) = self.set(set_name) else {
                        warn!(set = %set_name, "search order names an unregistered header set");
                        continue;
                    };
                    if let Some(env) = set.get(&name) {
                        debug!(header = %name, set = %set_name, "resolved to fake header");
                        return Ok(Resolution::Fake {
                            set: set_name.clone(),
                            env: Arc::clone(env),
                        });
                    }
                }
                SearchLocation::Dir(dir) => {
                    let candidate = dir.join(&name);
                    if candidate.is_file() {
                        debug!(header = %name, path = %candidate.display(), "resolved to real header");
                        return Ok(Resolution::Real { path: candidate });
                    }
                }
            }
        }
        Err(Error::NotFound { header: name })
    }

    /// Resolve `header` and, for a fake header, every header it includes.
    /// Dependencies come first, so committing the results in order leaves
    /// every referenced alias defined before it is used.
    pub fn resolve_with_includes(
        &self,
        header: &str,
        order: &[SearchLocation],
    ) -> Result<Vec<Resolution>> {
        let mut resolved = Vec::new();
        let mut seen = HashSet::new();
        self.resolve_into(header, order, &mut seen, &mut resolved)?;
        Ok(resolved)
    }

    fn resolve_into(
        &self,
        header: &str,
        order: &[SearchLocation],
        seen: &mut HashSet<String>,
        resolved: &mut Vec<Resolution>,
    ) -> Result<()> {
        if !seen.insert(lookup_key(header)) {
            return Ok(());
        }
        let resolution = self.resolve(header, order)?;
        if let Resolution::Fake { env, .. } = &resolution {
            for include in &env.includes {
                self.resolve_into(include, order, seen, resolved)?;
            }
        }
        resolved.push(resolution);
        Ok(())
    }

    /// Header defining `name` (an alias or a `struct`/`enum` tag), looking
    /// in set `from` first and then in registration order.
    fn provider_of(
        &self,
        from: usize,
        name: &str,
        providers: &HashMap<String, Vec<(usize, String)>>,
    ) -> Option<String> {
        let candidates = providers.get(name)?;
        candidates
            .iter()
            .find(|(set, _)| *set == from)
            .or_else(|| candidates.first())
            .map(|(_, header)| header.clone())
    }

    /// Fill in each environment's `includes` with the headers that define
    /// the aliases and tags it references but does not define itself, so
    /// every rendered header is self-contained.
    ///
    /// Returns `(header, name)` for references no registered header
    /// defines.
    pub fn link_includes(&mut self) -> Vec<(String, String)> {
        let mut providers: HashMap<String, Vec<(usize, String)>> = HashMap::new();
        for (i, set) in self.sets.iter().enumerate() {
            for env in set.headers() {
                let header = normalize_header_name(&env.header);
                let aliases = env.aliases.iter().map(|a| a.name.clone());
                let records = env.records.iter().map(|r| r.ty().to_string());
                let enums = env
                    .enums
                    .iter()
                    .filter_map(|e| e.tag.as_ref())
                    .map(|t| format!("enum {t}"));
                for name in aliases.chain(records).chain(enums) {
                    providers.entry(name).or_default().push((i, header.clone()));
                }
            }
        }

        let mut unresolved = Vec::new();
        let mut updates = Vec::new();
        for (i, set) in self.sets.iter().enumerate() {
            for (key, env) in &set.headers {
                let own = normalize_header_name(&env.header);
                let mut includes = env.includes.clone();
                for name in env.external_references() {
                    match self.provider_of(i, &name, &providers) {
                        Some(header) if header == own => {}
                        Some(header) => {
                            if !includes.contains(&header) {
                                debug!(header = %own, include = %header, name = %name, "linked include");
                                includes.push(header);
                            }
                        }
                        None => unresolved.push((own.clone(), name)),
                    }
                }
                if includes != env.includes {
                    updates.push((i, key.clone(), includes));
                }
            }
        }

        for (i, key, includes) in updates {
            if let Some(env) = self.sets[i].headers.get_mut(&key) {
                Arc::make_mut(env).includes = includes;
            }
        }
        unresolved
    }

    /// One shape table over every registered header. Each header's includes
    /// are recorded before the header itself, so aliases built on another
    /// header's aliases (`PDWORD` on `DWORD`) resolve.
    pub fn shape_table(&self) -> ShapeTable {
        let mut table = ShapeTable::new();
        let mut done = HashSet::new();
        for (i, set) in self.sets.iter().enumerate() {
            for env in set.headers() {
                self.extend_with_includes(i, env, &mut table, &mut done);
            }
        }
        table
    }

    fn extend_with_includes(
        &self,
        set: usize,
        env: &SymbolEnvironment,
        table: &mut ShapeTable,
        done: &mut HashSet<(usize, String)>,
    ) {
        if !done.insert((set, lookup_key(&env.header))) {
            return;
        }
        for include in &env.includes {
            let found = self.sets[set]
                .get(include)
                .map(|dep| (set, dep))
                .or_else(|| {
                    self.sets
                        .iter()
                        .enumerate()
                        .find_map(|(i, s)| s.get(include).map(|dep| (i, dep)))
                });
            match found {
                Some((i, dep)) => self.extend_with_includes(i, dep, table, done),
                None => warn!(header = %env.header, include = %include, "included header not registered"),
            }
        }
        table.extend(&env.aliases, &env.models);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CType, TargetModel, TypeAlias};

    fn set_with(name: &str, headers: &[&str]) -> HeaderSet {
        let mut set = HeaderSet::new(name);
        for h in headers {
            set.insert(SymbolEnvironment::new(h, &[TargetModel::Win64]));
        }
        set
    }

    #[test]
    fn normalizes_spellings() {
        assert_eq!(normalize_header_name("<windows.h>"), "windows.h");
        assert_eq!(normalize_header_name("\"./windows.h\""), "windows.h");
        assert_eq!(normalize_header_name("sys\\types.h"), "sys/types.h");
    }

    #[test]
    fn first_set_along_order_wins() {
        let mut registry = Registry::new();
        registry.add_set(set_with("a", &["x.h"]));
        registry.add_set(set_with("b", &["x.h", "y.h"]));

        let order = vec![
            SearchLocation::Fake("b".to_string()),
            SearchLocation::Fake("a".to_string()),
        ];
        match registry.resolve("x.h", &order).unwrap() {
            Resolution::Fake { set, .. } => assert_eq!(set, "b"),
            other => panic!("expected fake resolution, got {other:?}"),
        }
    }

    #[test]
    fn missing_header_policy() {
        let registry = Registry::new();
        let result = registry.resolve("nope.h", &[]);
        assert!(result.as_ref().is_err_and(|e| e.is_recoverable()));
        assert!(MissingHeaderPolicy::Opaque.apply(result).unwrap().is_none());
        assert!(
            MissingHeaderPolicy::Error
                .apply(registry.resolve("nope.h", &[]))
                .is_err()
        );
    }

    #[test]
    fn unknown_set_in_order_is_skipped() {
        let mut registry = Registry::new();
        registry.add_set(set_with("a", &["x.h"]));
        let order = vec![
            SearchLocation::Fake("ghost".to_string()),
            SearchLocation::Fake("a".to_string()),
        ];
        assert!(registry.resolve("x.h", &order).unwrap().is_fake());
    }

    #[test]
    fn same_name_sets_merge() {
        let mut registry = Registry::new();
        registry.add_set(set_with("a", &["x.h"]));
        registry.add_set(set_with("a", &["y.h"]));
        assert_eq!(registry.sets().len(), 1);
        assert_eq!(registry.set("a").unwrap().len(), 2);
    }

    #[test]
    fn merging_a_set_replaces_shared_headers() {
        let mut first = HeaderSet::new("a");
        let mut old = SymbolEnvironment::new("x.h", &[TargetModel::Win64]);
        old.aliases.push(TypeAlias {
            name: "OLD".to_string(),
            target: CType::Int,
        });
        first.insert(old);

        let mut second = HeaderSet::new("a");
        let mut new = SymbolEnvironment::new("X.h", &[TargetModel::Win64]);
        new.aliases.push(TypeAlias {
            name: "NEW".to_string(),
            target: CType::Int,
        });
        second.insert(new);

        let mut registry = Registry::new();
        registry.add_set(first);
        registry.add_set(second);

        let set = registry.set("a").unwrap();
        assert_eq!(set.len(), 1, "x.h and X.h are one header");
        let env = set.get("x.h").unwrap();
        assert!(env.alias("NEW").is_some(), "the merged-in header wins");
        assert!(env.alias("OLD").is_none());
    }

    #[test]
    fn lookup_ignores_case() {
        let mut registry = Registry::new();
        registry.add_set(set_with("windows", &["windows.h", "sys/Types.h"]));
        let order = vec![SearchLocation::Fake("windows".to_string())];
        for spelling in ["<Windows.h>", "WINDOWS.H", "\"windows.h\"", "SYS\\TYPES.H"] {
            assert!(
                registry.resolve(spelling, &order).unwrap().is_fake(),
                "{spelling} should resolve"
            );
        }
        // the registered spelling is kept for display and rendering
        let env = registry.set("windows").unwrap().get("sys/types.h").unwrap();
        assert_eq!(env.header, "sys/Types.h");
    }

    fn env_with_alias(header: &str, name: &str, target: CType) -> SymbolEnvironment {
        let mut env = SymbolEnvironment::new(header, &[TargetModel::Win32, TargetModel::Win64]);
        env.aliases.push(TypeAlias {
            name: name.to_string(),
            target,
        });
        env
    }

    #[test]
    fn includes_follow_referenced_aliases() {
        let mut base = HeaderSet::new("base");
        base.insert(env_with_alias("windows.h", "DWORD", CType::ULong));
        let mut support = HeaderSet::new("support");
        support.insert(env_with_alias("std_testcase.h", "PDWORD", CType::ptr(CType::named("DWORD"))));
        support.insert(env_with_alias("dangling.h", "PQWORD", CType::ptr(CType::named("QWORD"))));

        let mut registry = Registry::new();
        registry.add_set(base);
        registry.add_set(support);
        let unresolved = registry.link_includes();
        assert_eq!(unresolved, vec![("dangling.h".to_string(), "QWORD".to_string())]);

        let testcase = registry.set("support").unwrap().get("std_testcase.h").unwrap();
        assert_eq!(testcase.includes, vec!["windows.h".to_string()]);
        assert!(registry.set("base").unwrap().get("windows.h").unwrap().includes.is_empty());

        let table = registry.shape_table();
        assert_eq!(table.width_of("PDWORD", TargetModel::Win64).unwrap(), 64);
        assert_eq!(table.width_of("PDWORD", TargetModel::Win32).unwrap(), 32);

        let order = registry.search_order(SearchPolicy::FakeFirst, &[]);
        let chain: Vec<String> = registry
            .resolve_with_includes("std_testcase.h", &order)
            .unwrap()
            .iter()
            .filter_map(|r| r.environment().map(|e| e.header.clone()))
            .collect();
        assert_eq!(chain, vec!["windows.h", "std_testcase.h"]);
    }
}
