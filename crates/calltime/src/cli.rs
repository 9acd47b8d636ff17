use crate::storage::SortKey;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "calltime")]
#[command(about = "Per-function call timing for Rust programs")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve identifiers against an executable and show what would be tracked
    Resolve(ResolveArgs),

    /// View the most expensive functions from a recording
    Top {
        /// Recording database file
        file: PathBuf,

        /// Number of entries to display
        #[arg(long, short = 'n', default_value = "20")]
        top: usize,

        /// Column to sort by
        #[arg(long, short = 's', value_enum, default_value = "total")]
        sort: TopSort,

        /// Only include drains from the last N of recording
        #[arg(long, value_parser = parse_duration)]
        since: Option<Duration>,

        /// Output as JSON
        #[arg(long, conflicts_with = "csv")]
        json: bool,

        /// Output as CSV
        #[arg(long)]
        csv: bool,
    },

    /// Execute raw SQL query on a recording database
    Query {
        /// Recording database file
        file: PathBuf,

        /// SQL query to execute
        sql: String,
    },

    /// List saved recordings
    List {
        /// Directory to search (defaults to current directory)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Executable to read symbols from
    #[arg(long, short = 'e', conflicts_with_all = ["pid", "process"])]
    pub exe: Option<PathBuf>,

    /// Process ID whose executable is used
    #[arg(long, short = 'p', conflicts_with = "process")]
    pub pid: Option<u32>,

    /// Process name (pgrep-style matching)
    #[arg(long, short = 'P')]
    pub process: Option<String>,

    /// Tracking file (TOML)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Identifier to track, e.g. `Lru.get` or `app::cache::Lru::get`
    #[arg(long = "ident", short = 'i')]
    pub idents: Vec<String>,

    /// Extra fallback namespace, tried after those in the tracking file
    #[arg(long = "fallback", short = 'f')]
    pub fallbacks: Vec<String>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TopSort {
    Total,
    Calls,
    Max,
    Exceptions,
}

impl From<TopSort> for SortKey {
    fn from(sort: TopSort) -> Self {
        match sort {
            TopSort::Total => SortKey::Total,
            TopSort::Calls => SortKey::Calls,
            TopSort::Max => SortKey::Max,
            TopSort::Exceptions => SortKey::Exceptions,
        }
    }
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    if let Ok(d) = humantime::parse_duration(s) {
        return Ok(d);
    }

    // Bare number as seconds
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    Err(format!(
        "Invalid duration '{}'. Examples: 30s, 5m, 2h, 1h30m, 90",
        s
    ))
}

impl ResolveArgs {
    pub fn validate(&self) -> Result<(), String> {
        if self.exe.is_none() && self.pid.is_none() && self.process.is_none() {
            return Err("One of --exe, --pid or --process is required".to_string());
        }
        if self.config.is_none() && self.idents.is_empty() {
            return Err("Nothing to resolve: pass --config or at least one --ident".to_string());
        }
        Ok(())
    }
}

impl Cli {
    pub fn validate(&self) -> Result<(), String> {
        match &self.command {
            Command::Resolve(args) => args.validate(),
            Command::Top { top: 0, .. } => Err("--top must be at least 1".to_string()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("90").unwrap(), Duration::from_secs(90));
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn test_resolve_args() {
        let cli = Cli::try_parse_from([
            "calltime", "resolve", "--exe", "./game", "-i", "Lru.get", "-i", "Lru.put", "-f", "app",
        ])
        .unwrap();
        cli.validate().unwrap();
        let Command::Resolve(args) = cli.command else {
            panic!("expected resolve");
        };
        assert_eq!(args.idents, vec!["Lru.get", "Lru.put"]);
        assert_eq!(args.fallbacks, vec!["app"]);
    }

    #[test]
    fn test_resolve_requires_target_and_idents() {
        let cli = Cli::try_parse_from(["calltime", "resolve", "-i", "Lru.get"]).unwrap();
        assert!(cli.validate().is_err());

        let cli = Cli::try_parse_from(["calltime", "resolve", "--pid", "1"]).unwrap();
        assert!(cli.validate().is_err());

        assert!(Cli::try_parse_from(["calltime", "resolve", "--exe", "a", "--pid", "1"]).is_err());
    }

    #[test]
    fn test_top_defaults() {
        let cli = Cli::try_parse_from(["calltime", "top", "rec.db"]).unwrap();
        let Command::Top { top, sort, json, csv, since, .. } = cli.command else {
            panic!("expected top");
        };
        assert_eq!((top, sort, json, csv, since), (20, TopSort::Total, false, false, None));
        assert_eq!(SortKey::from(sort), SortKey::Total);

        assert!(Cli::try_parse_from(["calltime", "top", "rec.db", "--json", "--csv"]).is_err());
    }
}
