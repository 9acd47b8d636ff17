use anyhow::Context;
use clap::Parser;
use calltime::cli::{Cli, Command};
use calltime::error::exit_code;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::from(exit_code::SUCCESS as u8),
        Err(e) => {
            eprintln!("Error: {e:#}");
            if let Some(calltime_err) = e.downcast_ref::<calltime::Error>() {
                ExitCode::from(calltime_err.exit_code() as u8)
            } else {
                ExitCode::from(exit_code::GENERAL_ERROR as u8)
            }
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    cli.validate()
        .map_err(calltime::Error::InvalidArgument)
        .context("Invalid arguments")?;

    match cli.command {
        Command::Resolve(args) => {
            calltime::commands::resolve::run(&args)?;
        }
        Command::Top {
            file,
            top,
            sort,
            since,
            json,
            csv,
        } => {
            calltime::commands::top::run(&file, top, sort.into(), since, json, csv)?;
        }
        Command::Query { file, sql } => {
            calltime::commands::query::run(&file, &sql)?;
        }
        Command::List { dir } => {
            calltime::commands::list::run(dir.as_deref())?;
        }
        Command::Completions { shell } => {
            use clap::CommandFactory;
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "calltime", &mut std::io::stdout());
        }
    }

    Ok(())
}
