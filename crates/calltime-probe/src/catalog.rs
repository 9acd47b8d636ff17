//! Read-only view of the functions declared by the host.

use std::fmt;
use std::sync::Arc;

/// Opaque identity of a declared function.
///
/// Two catalog entries are the same target exactly when their ids are equal,
/// regardless of their names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub u64);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A declared function as seen by the resolver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub target: TargetId,
    /// Simple function name, e.g. `Execute`
    pub name: String,
    /// Declaring type simple name, e.g. `Bar`
    pub type_name: String,
    /// Declaring type fully-qualified name, e.g. `Game.Logic.Bar`
    pub qualified_type: String,
    /// Parameter type names, used for overload suffixes
    pub params: Vec<String>,
    /// Source location (`file:line`) when known
    pub location: Option<String>,
}

impl CatalogEntry {
    pub fn new(
        target: TargetId,
        qualified_type: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let qualified_type = qualified_type.into();
        let type_name = simple_type_name(&qualified_type).to_string();
        CatalogEntry {
            target,
            name: name.into(),
            type_name,
            qualified_type,
            params: Vec::new(),
            location: None,
        }
    }

    pub fn with_params<S: AsRef<str>>(mut self, params: &[S]) -> Self {
        self.params = params.iter().map(|p| p.as_ref().to_string()).collect();
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Parameter list rendered as `(T1, T2)`; `()` for zero arity
    pub fn overload_suffix(&self) -> String {
        format!("({})", self.params.join(", "))
    }
}

/// Last segment of a qualified type name, accepting `.`, `::`, `+` and `/`
/// as nesting separators.
pub fn simple_type_name(qualified: &str) -> &str {
    qualified
        .rfind(['.', ':', '+', '/'])
        .map(|idx| &qualified[idx + 1..])
        .unwrap_or(qualified)
}

/// Rewrite nested-type separators (`::`, `+`, `/`) to `.`
pub fn normalize_type_name(name: &str) -> String {
    name.replace("::", ".").replace(['+', '/'], ".")
}

/// Enumerable, read-only function catalog supplied by the host
pub trait FunctionCatalog {
    /// All declared functions in enumeration order
    fn entries(&self) -> &[CatalogEntry];

    fn len(&self) -> usize {
        self.entries().len()
    }

    fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

impl<T: FunctionCatalog + ?Sized> FunctionCatalog for &T {
    fn entries(&self) -> &[CatalogEntry] {
        (**self).entries()
    }
}

impl<T: FunctionCatalog + ?Sized> FunctionCatalog for Arc<T> {
    fn entries(&self) -> &[CatalogEntry] {
        (**self).entries()
    }
}

/// In-memory catalog, built up front by the host
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    entries: Vec<CatalogEntry>,
}

impl StaticCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        StaticCatalog { entries }
    }

    pub fn builder() -> StaticCatalogBuilder {
        StaticCatalogBuilder::default()
    }

    /// Find an entry by identity
    pub fn get(&self, target: TargetId) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.target == target)
    }
}

impl FunctionCatalog for StaticCatalog {
    fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }
}

/// Builder assigning sequential target ids starting at 1
#[derive(Debug, Default)]
pub struct StaticCatalogBuilder {
    entries: Vec<CatalogEntry>,
}

impl StaticCatalogBuilder {
    /// Add a function declared on `namespace.type_name`
    pub fn function<S: AsRef<str>>(
        mut self,
        namespace: &str,
        type_name: &str,
        name: &str,
        params: &[S],
    ) -> Self {
        let qualified = if namespace.is_empty() {
            type_name.to_string()
        } else {
            format!("{}.{}", namespace, type_name)
        };
        let target = TargetId(self.entries.len() as u64 + 1);
        self.entries
            .push(CatalogEntry::new(target, qualified, name).with_params(params));
        self
    }

    pub fn entry(mut self, entry: CatalogEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn build(self) -> StaticCatalog {
        StaticCatalog::new(self.entries)
    }
}
