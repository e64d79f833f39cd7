use std::io::ErrorKind;
use std::process;

use clap::Parser;
use cli::{Args, Command};
use env_logger::Env;
use error::{SindexError, SindexResult};
use polars::error::PolarsError;
use project::Project;
use rayon::ThreadPoolBuilder;

mod cli;
mod commands;
mod config;
mod error;
mod links;
mod ndjson;
mod normalization;
mod prelude;
mod progress;
mod project;

fn num_threads(args: &Args) -> usize {
    if let Some(num_threads) = args.num_jobs {
        return num_threads;
    }

    if let Ok(config) = Project::discover().and_then(|p| p.config()) {
        if let Some(runtime) = config.runtime {
            if let Some(num_threads) = runtime.num_jobs {
                return num_threads;
            }
        }
    }

    0
}

fn init_logger(verbose: bool) {
    let filter = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(filter))
        .init();
}

fn run(args: Args) -> SindexResult<()> {
    match args.cmd {
        Command::Completions(cmd) => cmd.execute(),
        Command::Config(cmd) => cmd.execute(),
        Command::Dindex(cmd) => cmd.execute(),
        Command::Init(cmd) => cmd.execute(),
        Command::Lookup(cmd) => cmd.execute(),
        Command::Rank(cmd) => cmd.execute(),
        Command::Sindex(cmd) => cmd.execute(),
    }
}

fn main() {
    let args = Args::parse();
    init_logger(args.verbose);

    if let Err(e) = ThreadPoolBuilder::new()
        .num_threads(num_threads(&args))
        .build_global()
    {
        eprintln!("error: {e:#}");
        process::exit(1);
    }

    match run(args) {
        Ok(()) => process::exit(0),
        Err(SindexError::IO(e)) if e.kind() == ErrorKind::BrokenPipe => {
            process::exit(0)
        }
        Err(SindexError::Polars(PolarsError::IO { error, .. }))
            if error.kind() == ErrorKind::BrokenPipe =>
        {
            process::exit(0);
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            process::exit(1);
        }
    }
}
