use crate::cli::ResolveArgs;
use crate::config::TrackingConfig;
use crate::error::{Error, Result};
use crate::process::{ProcessInfo, find_process_by_name};
use crate::symbols::ElfCatalog;
use calltime_probe::{
    CallSiteBinder, EntryWarning, FunctionCatalog, TargetId, TrackedId, Tracker,
};
use comfy_table::{ContentArrangement, Table, presets};
use std::collections::HashSet;
use std::path::PathBuf;

/// One function that registration would track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRow {
    pub id: TrackedId,
    pub name: String,
    pub target: TargetId,
    pub location: Option<String>,
}

#[derive(Debug, Default)]
pub struct ResolveOutcome {
    pub rows: Vec<ResolvedRow>,
    pub warnings: Vec<EntryWarning>,
}

pub fn run(args: &ResolveArgs) -> Result<()> {
    let (exe, catalog) = load_catalog(args)?;
    if !catalog.has_locations() {
        eprintln!("No line info in {}; source locations unavailable", exe.display());
    }

    let mut config = match &args.config {
        Some(path) => TrackingConfig::from_file(path)?,
        None => TrackingConfig::default(),
    };
    config.merge_fallbacks(&args.fallbacks);

    let function_count = catalog.len();
    let outcome = resolve_catalog(catalog, &config, &args.idents);

    println!("# {} ({} functions)", exe.display(), function_count);
    println!("{}", render_table(&outcome.rows));

    if !outcome.warnings.is_empty() {
        eprintln!();
        for warning in &outcome.warnings {
            eprintln!("warning: {}", warning);
        }
    }

    Ok(())
}

fn load_catalog(args: &ResolveArgs) -> Result<(PathBuf, ElfCatalog)> {
    if let Some(exe) = &args.exe {
        return Ok((exe.clone(), ElfCatalog::load(exe)?));
    }

    let pid = match (args.pid, &args.process) {
        (Some(pid), _) => pid,
        (None, Some(name)) => find_process_by_name(name)?,
        (None, None) => {
            return Err(Error::InvalidArgument(
                "One of --exe, --pid or --process is required".to_string(),
            ));
        }
    };

    let proc_info = ProcessInfo::new(pid)?;
    eprintln!(
        "Reading symbols of {} (PID {})",
        proc_info.name(),
        proc_info.pid()
    );
    let catalog = ElfCatalog::for_process(&proc_info)?;
    Ok((proc_info.exe_path().to_path_buf(), catalog))
}

/// Register the configured identifiers against `catalog` the way a host
/// would, and collect what got tracked.
pub fn resolve_catalog<C: FunctionCatalog>(
    catalog: C,
    config: &TrackingConfig,
    extra_idents: &[String],
) -> ResolveOutcome {
    let identifiers = config.identifiers(extra_idents);
    let tracker = Tracker::new(catalog, CallSiteBinder::new())
        .with_fallback_namespaces(config.fallback_namespaces.iter().cloned());

    let report = tracker.register(&identifiers);

    let mut seen = HashSet::new();
    let mut rows = Vec::new();
    for identifier in &identifiers {
        let Ok(planned) = tracker.plan(identifier) else {
            continue;
        };
        for (name, entry) in planned {
            if let Some(id) = tracker.registry().id_of(entry.target)
                && seen.insert(entry.target)
            {
                rows.push(ResolvedRow {
                    id,
                    name,
                    target: entry.target,
                    location: entry.location.clone(),
                });
            }
        }
    }
    rows.sort_by_key(|row| row.id);

    ResolveOutcome {
        rows,
        warnings: report.warnings,
    }
}

fn render_table(rows: &[ResolvedRow]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_BORDERS_ONLY)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["ID", "FUNCTION", "ADDRESS", "LOCATION"]);

    for row in rows {
        table.add_row(vec![
            row.id.to_string(),
            row.name.clone(),
            row.target.to_string(),
            row.location.clone().unwrap_or_else(|| "-".to_string()),
        ]);
    }
    table
}
