use std::io::{stdout, Write};
use std::path::PathBuf;

use clap::Parser;
use sindex_core::{NormalizationFactors, TopicId};

use crate::normalization::load_table;
use crate::prelude::*;

/// Print the normalization factors resolved for a topic and year.
#[derive(Debug, Parser)]
pub(crate) struct Lookup {
    /// The normalization table (CSV or Arrow IPC). Defaults to the
    /// table of the project config.
    #[arg(long = "norm", value_name = "filename")]
    normalization: Option<PathBuf>,

    /// The publication year of the dataset. Without a year, only
    /// year-agnostic rows are considered.
    #[arg(short, long)]
    year: Option<i32>,

    /// Fail instead of printing the default factors, if the table has
    /// no matching row.
    #[arg(long)]
    strict: bool,

    /// Pretty-print the JSON output.
    #[arg(short, long)]
    pretty: bool,

    /// The topic id in short (`T12345`) or URL form. Malformed ids
    /// are treated as unknown topic.
    topic: Option<String>,
}

impl Lookup {
    pub(crate) fn execute(self) -> SindexResult<()> {
        let path = match self.normalization {
            Some(path) => Some(path),
            None => {
                let project = Project::discover()?;
                let config = project.config()?;
                config
                    .paths
                    .normalization
                    .map(|path| project.resolve(path))
            }
        };

        let table = load_table(path.as_deref())?;
        let topic = self.topic.as_deref().and_then(TopicId::parse);

        let factors = match table.lookup(topic.as_ref(), self.year) {
            Some(factors) => factors,
            None if self.strict => {
                bail!("no normalization row matches the request");
            }
            None => {
                NormalizationFactors::defaults(topic.as_ref(), self.year)
            }
        };

        let mut out = stdout().lock();
        if self.pretty {
            serde_json::to_writer_pretty(&mut out, &factors)?;
        } else {
            serde_json::to_writer(&mut out, &factors)?;
        }

        writeln!(out)?;
        Ok(())
    }
}
