use crate::catalog::{CatalogEntry, FunctionCatalog, normalize_type_name};
use crate::error::ResolveError;
use std::collections::HashMap;
use tracing::debug;

/// Resolves textual identifiers against a function catalog.
///
/// Identifiers have the form `Type.Method`, `Namespace.Type.Method`,
/// `Type:Method` or a Rust path `module::Type::method`. The type part is
/// looked up in this order, first hit wins:
///
/// 1. fully-qualified type name
/// 2. simple type name (first declaring type in catalog order)
/// 3. `ns.Type` for each fallback namespace, in order
///
/// Every function of the resolved type with the requested simple name is
/// returned, so overloads can be told apart later. All comparisons are
/// ordinal and case-sensitive.
pub struct SymbolIndex<C> {
    catalog: C,
    /// Normalized qualified type name -> entry indices, catalog order
    by_type: HashMap<String, Vec<usize>>,
    /// Simple type name -> normalized qualified name of its first declaring type
    by_simple: HashMap<String, String>,
}

impl<C: FunctionCatalog> SymbolIndex<C> {
    /// Index a catalog for repeated resolution
    pub fn new(catalog: C) -> Self {
        let mut by_type: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_simple: HashMap<String, String> = HashMap::new();

        for (idx, entry) in catalog.entries().iter().enumerate() {
            let qualified = normalize_type_name(&entry.qualified_type);
            by_simple
                .entry(entry.type_name.clone())
                .or_insert_with(|| qualified.clone());
            by_type.entry(qualified).or_default().push(idx);
        }

        SymbolIndex {
            catalog,
            by_type,
            by_simple,
        }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Resolve an identifier to every matching function
    pub fn resolve<S: AsRef<str>>(
        &self,
        identifier: &str,
        fallback_namespaces: &[S],
    ) -> Result<Vec<&CatalogEntry>, ResolveError> {
        let (type_part, member) = split_identifier(identifier)?;

        let qualified = self
            .resolve_type(type_part, fallback_namespaces)
            .ok_or_else(|| ResolveError::UnresolvedType(identifier.trim().to_string()))?;

        let entries = self.catalog.entries();
        let matches: Vec<&CatalogEntry> = self
            .by_type
            .get(qualified)
            .into_iter()
            .flatten()
            .map(|&idx| &entries[idx])
            .filter(|entry| entry.name == member)
            .collect();

        if matches.is_empty() {
            return Err(ResolveError::UnresolvedMember {
                identifier: identifier.trim().to_string(),
                type_name: qualified.to_string(),
                member: member.to_string(),
            });
        }

        Ok(matches)
    }

    /// Find the normalized qualified name of the type an identifier refers to
    pub fn resolve_type<S: AsRef<str>>(
        &self,
        type_part: &str,
        fallback_namespaces: &[S],
    ) -> Option<&str> {
        let normalized = normalize_type_name(type_part);

        if let Some((qualified, _)) = self.by_type.get_key_value(normalized.as_str()) {
            return Some(qualified);
        }

        if let Some(qualified) = self.by_simple.get(type_part) {
            return Some(qualified);
        }

        for ns in fallback_namespaces {
            let candidate = format!("{}.{}", normalize_type_name(ns.as_ref()), normalized);
            if let Some((qualified, _)) = self.by_type.get_key_value(candidate.as_str()) {
                debug!(type_part, namespace = ns.as_ref(), "resolved type via fallback namespace");
                return Some(qualified);
            }
        }

        None
    }
}

/// One-off resolution without keeping an index around
pub fn resolve<S: AsRef<str>>(
    identifier: &str,
    catalog: &dyn FunctionCatalog,
    fallback_namespaces: &[S],
) -> Result<Vec<CatalogEntry>, ResolveError> {
    let index = SymbolIndex::new(catalog);
    let found = index.resolve(identifier, fallback_namespaces)?;
    Ok(found.into_iter().cloned().collect())
}

/// Split an identifier into its type and member parts.
///
/// The split happens at the last `.` or `:`; a `::` pair counts as a single
/// separator.
pub fn split_identifier(identifier: &str) -> Result<(&str, &str), ResolveError> {
    let malformed = || ResolveError::MalformedIdentifier(identifier.trim().to_string());

    let trimmed = identifier.trim();
    if trimmed.is_empty() {
        return Err(malformed());
    }

    let sep = trimmed.rfind(['.', ':']).ok_or_else(malformed)?;
    let member = &trimmed[sep + 1..];

    let bytes = trimmed.as_bytes();
    let type_end = if bytes[sep] == b':' && sep > 0 && bytes[sep - 1] == b':' {
        sep - 1
    } else {
        sep
    };
    let type_part = &trimmed[..type_end];

    if type_part.is_empty() || member.is_empty() {
        return Err(malformed());
    }

    Ok((type_part, member))
}
