use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::Parser;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sindex_core::date::{midnight, year_of};
use sindex_core::{
    dataset_index_series, DIndexPoint, DatasetId, DatasetRecord,
    Diagnostics, NormalizationFactors, NormalizationTable,
};

use crate::ndjson::{list_files, reset_dir, LineReader, RotatingWriter};
use crate::normalization::load_table;
use crate::prelude::*;

const PBAR_DINDEX: &str = "Computing d-index: {human_pos} | \
        elapsed: {elapsed_precise}{msg}";

/// A single point of a d-index series, as written to and read from
/// the d-index output files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DIndexRow {
    pub(crate) dataset_id: DatasetId,
    pub(crate) score: f64,
    pub(crate) created: DateTime<Utc>,
    pub(crate) year: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NormalizationRow<'a> {
    dataset_id: DatasetId,
    #[serde(rename = "normalization_factors")]
    factors: &'a NormalizationFactors,
}

/// The d-index series and the normalization factors of one dataset.
#[derive(Debug)]
struct Output {
    dataset_id: DatasetId,
    points: Vec<DIndexPoint>,
    factors: NormalizationFactors,
}

/// Compute the d-index series of all datasets.
#[derive(Debug, Parser)]
pub(crate) struct Dindex {
    /// Operate quietly; do not show progress.
    #[arg(short, long)]
    quiet: bool,

    /// The reference date (`YYYY-MM-DD`) used for events without a
    /// date and for datasets without any time point. Defaults to the
    /// current date (UTC).
    #[arg(long, value_name = "date")]
    today: Option<NaiveDate>,

    /// The normalization table (CSV or Arrow IPC). Defaults to the
    /// table of the project config.
    #[arg(long = "norm", value_name = "filename")]
    normalization: Option<PathBuf>,

    /// Number of dataset records per batch and per output file.
    #[arg(long)]
    batch_size: Option<usize>,

    /// The dataset records (a NDJSON file or a directory of NDJSON
    /// files). Defaults to the `paths.datasets` directory.
    path: Option<PathBuf>,
}

fn process(
    line: &str,
    table: &NormalizationTable,
    reference: DateTime<Utc>,
) -> (Option<Output>, Diagnostics) {
    let mut diagnostics = Diagnostics::default();

    let record: DatasetRecord = match serde_json::from_str(line) {
        Ok(record) => record,
        Err(e) => {
            log::debug!("skip record: {e}");
            diagnostics.skipped_records += 1;
            return (None, diagnostics);
        }
    };

    diagnostics.records += 1;

    let input = record.to_input(&mut diagnostics);
    let factors = table
        .resolve(input.score.topic_id.as_ref(), input.publication_year());
    let series = dataset_index_series(&input, &factors, reference);
    diagnostics.record_series(&series);

    let output = Output {
        dataset_id: record.dataset_id,
        points: series.points,
        factors,
    };

    (Some(output), diagnostics)
}

impl Dindex {
    pub(crate) fn execute(self) -> SindexResult<()> {
        let project = Project::discover()?;
        let config = project.config()?;

        let reference = match self.today {
            Some(date) => date.and_time(NaiveTime::MIN).and_utc(),
            None => midnight(Utc::now()),
        };

        let normalization = self
            .normalization
            .or(config.paths.normalization)
            .map(|path| project.resolve(path));
        let table = load_table(normalization.as_deref())?;

        let datasets_dir = project
            .resolve(self.path.unwrap_or(config.paths.datasets));
        let files = list_files(&datasets_dir, "ndjson")?;
        log::info!("found {} dataset file(s)", files.len());

        let dindex_dir = project.resolve(config.paths.dindex);
        let norm_dir = project.resolve(config.paths.normalization_out);
        reset_dir(&dindex_dir)?;
        reset_dir(&norm_dir)?;

        let batch_size =
            self.batch_size.unwrap_or(config.batch.datasets);
        if batch_size == 0 {
            bail!("batch size must be greater than zero");
        }

        let mut dindex_writer =
            RotatingWriter::new(&dindex_dir, None, usize::MAX);
        let mut norm_writer =
            RotatingWriter::new(&norm_dir, None, usize::MAX);

        let pbar =
            ProgressBarBuilder::new(PBAR_DINDEX, self.quiet).build();
        let mut lines = LineReader::new(files);
        let mut diagnostics = Diagnostics::default();
        let mut batches = 0;

        loop {
            let batch = lines
                .by_ref()
                .take(batch_size)
                .collect::<Result<Vec<_>, _>>()?;

            if batch.is_empty() {
                break;
            }

            let results: Vec<(Option<Output>, Diagnostics)> = batch
                .par_iter()
                .map(|line| process(line, &table, reference))
                .collect();

            pbar.inc(batch.len() as u64);

            for (output, diag) in results {
                diagnostics += diag;

                let Some(output) = output else {
                    continue;
                };

                for point in output.points.iter() {
                    dindex_writer.write(&DIndexRow {
                        dataset_id: output.dataset_id,
                        score: point.value,
                        created: point.date,
                        year: year_of(&point.date),
                    })?;
                }

                norm_writer.write(&NormalizationRow {
                    dataset_id: output.dataset_id,
                    factors: &output.factors,
                })?;
            }

            dindex_writer.rotate()?;
            norm_writer.rotate()?;
            batches += 1;
        }

        pbar.finish_using_style();
        diagnostics.skipped_records += lines.skipped();

        let points = dindex_writer.finish()?;
        let datasets = norm_writer.finish()?;

        log::info!(
            "wrote {points} d-index point(s) of {datasets} dataset(s) \
             in {batches} batch(es)"
        );

        if diagnostics.skipped_records > 0 {
            log::warn!(
                "skipped {} malformed record(s)",
                diagnostics.skipped_records
            );
        }

        if diagnostics.rejected() > 0 {
            log::warn!(
                "rejected {} invalid value(s): events = {}, dates = {}, \
                 weights = {}, scores = {}, publication dates = {}, \
                 topics = {}",
                diagnostics.rejected(),
                diagnostics.invalid_events,
                diagnostics.invalid_dates,
                diagnostics.invalid_weights,
                diagnostics.invalid_scores,
                diagnostics.invalid_publication_dates,
                diagnostics.invalid_topics,
            );
        }

        Ok(())
    }
}
