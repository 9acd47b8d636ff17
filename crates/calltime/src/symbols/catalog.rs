use super::dwarf::LineTable;
use crate::error::{Error, Result};
use crate::process::ProcessInfo;
use calltime_probe::catalog::normalize_type_name;
use calltime_probe::{CatalogEntry, FunctionCatalog, TargetId};
use object::{Object, ObjectSymbol};
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Function catalog read from an executable's symbol table.
///
/// Each text symbol `a::b::Type::method` becomes an entry of type
/// `a.b.Type`; free functions `a::b::func` belong to the module `a.b`.
/// Identity is the symbol address.
pub struct ElfCatalog {
    entries: Vec<CatalogEntry>,
    with_locations: bool,
}

impl ElfCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { memmap2::Mmap::map(&file) }?;

        let object = object::File::parse(&*mmap)
            .map_err(|e| Error::SymbolResolution(format!("Failed to parse ELF: {}", e)))?;

        // Line info is optional; entries just go without a location
        let lines = LineTable::parse(&object).unwrap_or_else(|e| {
            debug!(error = %e, "ignoring unreadable line program");
            LineTable::default()
        });

        let symbols = object
            .symbols()
            .filter(|s| s.kind() == object::SymbolKind::Text && s.is_definition())
            .filter(|s| s.address() != 0)
            .filter_map(|s| Some((s.address(), s.name().ok()?)));
        let catalog = Self::from_symbols(symbols, &lines);

        if catalog.entries.is_empty() {
            return Err(Error::MissingSymbols {
                path: path.display().to_string(),
            });
        }

        debug!(
            path = %path.display(),
            functions = catalog.entries.len(),
            line_ranges = lines.len(),
            "loaded function catalog"
        );
        Ok(catalog)
    }

    /// Catalog of a running process's executable
    pub fn for_process(proc_info: &ProcessInfo) -> Result<Self> {
        Self::load(&proc_info.proc_exe_path())
    }

    /// Build from `(address, mangled name)` pairs, ordered by address.
    ///
    /// Aliases of an address keep the first name seen.
    pub fn from_symbols<'a, I>(symbols: I, lines: &LineTable) -> Self
    where
        I: IntoIterator<Item = (u64, &'a str)>,
    {
        let mut symbols: Vec<(u64, &str)> = symbols.into_iter().collect();
        symbols.sort_by_key(|&(addr, _)| addr);

        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        for (addr, mangled) in symbols {
            if !seen.insert(addr) {
                continue;
            }
            let demangled = format!("{:#}", rustc_demangle::demangle(mangled));
            let Some((type_path, name)) = split_symbol_path(&demangled) else {
                continue;
            };

            let mut entry = CatalogEntry::new(TargetId(addr), normalize_type_name(&type_path), name);
            if let Some(range) = lines.lookup(addr) {
                entry = entry.with_location(range.display_location());
            }
            entries.push(entry);
        }

        ElfCatalog {
            with_locations: !lines.is_empty(),
            entries,
        }
    }

    /// False when the executable had no usable line program
    pub fn has_locations(&self) -> bool {
        self.with_locations
    }
}

impl FunctionCatalog for ElfCatalog {
    fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }
}

/// Split a demangled symbol into its declaring path and function name.
///
/// `<a::Type as b::Trait>::method` and `<a::Type>::method` declare on
/// `a::Type`. Generic arguments are dropped from every segment. Symbols
/// with no path, and compiler-generated names such as closures and shims,
/// give `None`.
pub fn split_symbol_path(demangled: &str) -> Option<(String, &str)> {
    let segments = split_top_level(demangled);
    let (name, path) = segments.split_last()?;

    if path.is_empty() || name.is_empty() || !is_plain_ident(name) {
        return None;
    }

    let mut type_segments = Vec::with_capacity(path.len());
    for (i, segment) in path.iter().enumerate() {
        if i == 0 && segment.starts_with('<') {
            let self_type = qualified_self(segment)?;
            type_segments.extend(split_top_level(self_type).into_iter().map(strip_generics));
        } else {
            if segment.starts_with('{') {
                return None;
            }
            type_segments.push(strip_generics(segment));
        }
    }

    if type_segments.iter().any(|s| s.is_empty()) {
        return None;
    }
    Some((type_segments.join("::"), name))
}

/// Split on `::` outside of `<...>`
fn split_top_level(path: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let bytes = path.as_bytes();
    let mut depth = 0usize;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'<' => depth += 1,
            b'>' => depth = depth.saturating_sub(1),
            b':' if depth == 0 && bytes.get(i + 1) == Some(&b':') => {
                segments.push(&path[start..i]);
                i += 2;
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    segments.push(&path[start..]);
    segments
}

/// Self type of `<T as Trait>` or `<T>`
fn qualified_self(segment: &str) -> Option<&str> {
    let inner = segment.strip_prefix('<')?.strip_suffix('>')?;
    let mut depth = 0usize;
    for (i, c) in inner.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ' ' if depth == 0 && inner[i..].starts_with(" as ") => return Some(&inner[..i]),
            _ => {}
        }
    }
    Some(inner)
}

fn strip_generics(segment: &str) -> &str {
    match segment.find('<') {
        Some(idx) => &segment[..idx],
        None => segment,
    }
}

fn is_plain_ident(name: &str) -> bool {
    name.chars().all(|c| c.is_alphanumeric() || c == '_')
}
