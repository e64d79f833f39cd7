use clap::{Parser, Subcommand};

use crate::commands::*;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub(crate) struct Args {
    /// Number of threads to use. If this options isn't set or a value
    /// of "0" is chosen, the maximum number of available threads
    /// is used.
    #[clap(
        short = 'j',
        long,
        env = "SINDEX_NUM_JOBS",
        hide_env_values = true
    )]
    pub(crate) num_jobs: Option<usize>,

    /// Run verbosely. Log additional information (level `info`) to
    /// the standard error stream. The `RUST_LOG` environment variable
    /// takes precedence.
    #[arg(short, long, global = true)]
    pub(crate) verbose: bool,

    #[command(subcommand)]
    pub(crate) cmd: Command,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    Completions(Completions),
    Config(Config),
    Dindex(Dindex),
    #[clap(alias = "new")]
    Init(Init),
    Lookup(Lookup),
    Rank(Rank),
    Sindex(Sindex),
}
