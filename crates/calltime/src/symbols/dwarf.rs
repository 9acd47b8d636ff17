use crate::error::{Error, Result};
use gimli::{EndianSlice, RunTimeEndian};
use object::{Object, ObjectSection};

/// An address range mapped to a source location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRange {
    pub start: u64,
    pub end: u64,
    pub file: String,
    pub line: u32,
}

impl AddressRange {
    /// `file:line` with the path shortened for display
    pub fn display_location(&self) -> String {
        let file = simplify_path(&self.file);
        if self.line > 0 {
            format!("{}:{}", file, self.line)
        } else {
            file
        }
    }
}

/// Source locations from the DWARF line program, sorted by start address
#[derive(Debug, Default)]
pub struct LineTable {
    ranges: Vec<AddressRange>,
}

impl LineTable {
    /// Parse `.debug_line` from an object file.
    ///
    /// An object without line info gives an empty table.
    pub fn parse(object: &object::File<'_>) -> Result<Self> {
        if object.section_by_name(".debug_line").is_none() {
            return Ok(LineTable::default());
        }

        let endian = if object.is_little_endian() {
            RunTimeEndian::Little
        } else {
            RunTimeEndian::Big
        };

        let load_section = |name: &str| -> &[u8] {
            object
                .section_by_name(name)
                .and_then(|s| s.data().ok())
                .unwrap_or(&[])
        };

        let dwarf = gimli::Dwarf {
            debug_abbrev: gimli::DebugAbbrev::new(load_section(".debug_abbrev"), endian),
            debug_info: gimli::DebugInfo::new(load_section(".debug_info"), endian),
            debug_line: gimli::DebugLine::new(load_section(".debug_line"), endian),
            debug_str: gimli::DebugStr::new(load_section(".debug_str"), endian),
            debug_line_str: gimli::DebugLineStr::new(load_section(".debug_line_str"), endian),
            ..Default::default()
        };

        let mut ranges = parse_line_program(&dwarf)?;
        ranges.sort_by_key(|r| r.start);
        Ok(LineTable { ranges })
    }

    pub fn from_ranges(mut ranges: Vec<AddressRange>) -> Self {
        ranges.sort_by_key(|r| r.start);
        LineTable { ranges }
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Range containing `addr`
    pub fn lookup(&self, addr: u64) -> Option<&AddressRange> {
        let idx = self.ranges.partition_point(|r| r.start <= addr);
        let range = self.ranges.get(idx.checked_sub(1)?)?;
        (addr < range.end).then_some(range)
    }
}

fn parse_line_program(
    dwarf: &gimli::Dwarf<EndianSlice<'_, RunTimeEndian>>,
) -> Result<Vec<AddressRange>> {
    let mut ranges = Vec::new();
    let mut units = dwarf.units();

    while let Ok(Some(header)) = units.next() {
        let unit = dwarf
            .unit(header)
            .map_err(|e| Error::SymbolResolution(format!("Failed to parse unit: {}", e)))?;

        let Some(program) = unit.line_program.clone() else {
            continue;
        };

        let mut rows = program.rows();
        let mut prev_row: Option<(u64, String, u32)> = None;

        while let Ok(Some((header, row))) = rows.next_row() {
            let addr = row.address();

            let file = row
                .file(header)
                .map(|f| {
                    let mut path = String::new();

                    if let Some(dir) = f.directory(header)
                        && let Ok(dir_str) = dwarf.attr_string(&unit, dir)
                        && let Ok(s) = dir_str.to_string()
                    {
                        path.push_str(s);
                        if !path.ends_with('/') {
                            path.push('/');
                        }
                    }

                    if let Ok(name) = dwarf.attr_string(&unit, f.path_name())
                        && let Ok(s) = name.to_string()
                    {
                        path.push_str(s);
                    }

                    path
                })
                .unwrap_or_default();
            let line = row.line().map(|l| l.get() as u32).unwrap_or(0);

            // A row covers everything up to the next row's address
            if let Some((prev_addr, prev_file, prev_line)) = prev_row.take()
                && addr > prev_addr
                && !prev_file.is_empty()
            {
                ranges.push(AddressRange {
                    start: prev_addr,
                    end: addr,
                    file: prev_file,
                    line: prev_line,
                });
            }

            if !row.end_sequence() {
                prev_row = Some((addr, file, line));
            }
        }
    }

    Ok(ranges)
}

/// Shorten a source path for display.
///
/// Standard library files become `<std>/file.rs`, registry crates become
/// `crate/file.rs`, and project files keep the part from `src/` on.
pub fn simplify_path(path: &str) -> String {
    if path.starts_with('[') {
        return path.to_string();
    }

    if (path.contains("/rust/library/") || path.contains("/rustc/"))
        && let Some(filename) = path.rsplit('/').next()
    {
        return format!("<std>/{}", filename);
    }

    for prefix in ["/.cargo/registry/src/", "/.cargo/git/checkouts/"] {
        if let Some(idx) = path.find(prefix) {
            // skip the index directory (e.g. index.crates.io-6f17d22bba15001f)
            let after_prefix = &path[idx + prefix.len()..];
            if let Some(slash) = after_prefix.find('/') {
                let krate_path = &after_prefix[slash + 1..];
                return match krate_path.find("/src/") {
                    Some(src) => format!("{}/{}", &krate_path[..src], &krate_path[src + 5..]),
                    None => krate_path.to_string(),
                };
            }
        }
    }

    match path.find("/src/") {
        Some(idx) => path[idx + 1..].to_string(),
        None => path.to_string(),
    }
}
