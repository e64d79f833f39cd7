use std::fmt::Display;
use std::str::FromStr;

use clap::Parser;
use sindex_core::AggregationStrategy;

use crate::config::{Aggregation, Batch};
use crate::prelude::*;

const OPTIONS: &[&str] = &[
    "runtime.num-jobs",
    "batch.datasets",
    "batch.entities",
    "batch.rows-per-file",
    "aggregation.strategy",
    "aggregation.entity-key",
    "paths.normalization",
];

/// Get and set project config options.
#[derive(Debug, Parser)]
pub(crate) struct Config {
    /// Get the value for the given key.
    #[arg(long, conflicts_with_all = ["value", "unset", "set"])]
    get: bool,

    /// Remove the key from the config. Options with a default value
    /// are reset to the default.
    #[arg(long, conflicts_with_all = ["value", "get", "set"])]
    unset: bool,

    /// Set the value for the given key.
    #[arg(long, requires = "value", conflicts_with_all = ["get", "unset"])]
    set: bool,

    /// The name of the config option.
    name: String,

    /// The (new) value of the config option.
    #[arg(conflicts_with_all = ["get", "unset"])]
    value: Option<String>,
}

#[inline]
fn print_option<T>(key: &str, value: Option<T>)
where
    T: ToString,
{
    println!(
        "{key} = {}",
        match value {
            Some(value) => value.to_string(),
            None => "None".to_string(),
        }
    );
}

fn parse<T>(value: &str) -> SindexResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    value.parse::<T>().map_err(|e| {
        SindexError::other(format!("invalid value `{value}`: {e}"))
    })
}

impl Config {
    pub(crate) fn execute(self) -> SindexResult<()> {
        let project = Project::discover()?;
        let mut config = project.config()?;

        let name = match self.name.as_str() {
            name if OPTIONS.contains(&name) => name,
            name => {
                bail!("unknown config option `{name}`");
            }
        };

        if let Some(value) = self.value {
            match name {
                "runtime.num-jobs" => {
                    let num_jobs = Some(parse::<usize>(&value)?);
                    match config.runtime {
                        Some(ref mut runtime) => runtime.num_jobs = num_jobs,
                        None => config.runtime = Some(Runtime { num_jobs }),
                    }
                }
                "batch.datasets" => {
                    config.batch.datasets = parse(&value)?;
                }
                "batch.entities" => {
                    config.batch.entities = parse(&value)?;
                }
                "batch.rows-per-file" => {
                    config.batch.rows_per_file = parse(&value)?;
                }
                "aggregation.strategy" => {
                    config.aggregation.strategy =
                        parse::<AggregationStrategy>(&value)?;
                }
                "aggregation.entity-key" => {
                    if value.trim().is_empty() {
                        bail!("invalid value `{value}`");
                    }
                    config.aggregation.entity_key = value;
                }
                "paths.normalization" => {
                    config.paths.normalization = Some(value.into());
                }
                _ => unreachable!(),
            }

            config.save()?;
        } else if self.unset {
            match name {
                "runtime.num-jobs" => config.runtime = None,
                "batch.datasets" => {
                    config.batch.datasets = Batch::default().datasets;
                }
                "batch.entities" => {
                    config.batch.entities = Batch::default().entities;
                }
                "batch.rows-per-file" => {
                    config.batch.rows_per_file =
                        Batch::default().rows_per_file;
                }
                "aggregation.strategy" => {
                    config.aggregation.strategy =
                        Aggregation::default().strategy;
                }
                "aggregation.entity-key" => {
                    config.aggregation.entity_key =
                        Aggregation::default().entity_key;
                }
                "paths.normalization" => config.paths.normalization = None,
                _ => unreachable!(),
            }

            config.save()?;
        } else {
            match name {
                "runtime.num-jobs" => {
                    print_option(
                        name,
                        config.runtime.and_then(|rt| rt.num_jobs),
                    );
                }
                "batch.datasets" => {
                    print_option(name, Some(config.batch.datasets))
                }
                "batch.entities" => {
                    print_option(name, Some(config.batch.entities))
                }
                "batch.rows-per-file" => {
                    print_option(name, Some(config.batch.rows_per_file))
                }
                "aggregation.strategy" => {
                    print_option(name, Some(config.aggregation.strategy))
                }
                "aggregation.entity-key" => {
                    print_option(name, Some(config.aggregation.entity_key))
                }
                "paths.normalization" => print_option(
                    name,
                    config
                        .paths
                        .normalization
                        .map(|path| path.display().to_string()),
                ),
                _ => unreachable!(),
            }
        }

        Ok(())
    }
}
