use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Utc};
use clap::Parser;
use hashbrown::{HashMap, HashSet};
use rayon::prelude::*;
use serde_json::{Map, Value};
use sindex_core::{
    aggregate_entity, yearly_observations, AggregationStrategy,
    DIndexPoint, DatasetId, EntityId, ObservationIndex, SIndexPoint,
    YearObservation,
};

use super::dindex::DIndexRow;
use crate::links::{read_batch_links, read_entities};
use crate::ndjson::{list_files, reset_dir, LineReader, RotatingWriter};
use crate::prelude::*;

const PBAR_SINDEX: &str = "Computing s-index: {human_pos}/{human_len} \
        ({percent}%) | elapsed: {elapsed_precise}{msg}";

/// Aggregate the d-index of linked datasets into the s-index of
/// authors or organizations.
#[derive(Debug, Parser)]
pub(crate) struct Sindex {
    /// Operate quietly; do not show progress.
    #[arg(short, long)]
    quiet: bool,

    /// The aggregation strategy. Defaults to the strategy of the
    /// project config.
    #[arg(long, value_name = "strategy")]
    strategy: Option<AggregationStrategy>,

    /// The calendar year in progress, which is never evaluated by the
    /// carry-forward strategy. Defaults to the current year (UTC).
    #[arg(long, value_name = "year")]
    current_year: Option<i32>,

    /// The name of the entity id field, e.g. `automatedUserId` or
    /// `automatedOrganizationId`.
    #[arg(long, value_name = "name")]
    entity_key: Option<String>,

    /// The entity-dataset links (a NDJSON or CSV file or a directory).
    /// Defaults to the `paths.links` directory.
    #[arg(long, value_name = "path")]
    links: Option<PathBuf>,

    /// The d-index output directory. Defaults to `paths.dindex`.
    #[arg(long, value_name = "path")]
    dindex: Option<PathBuf>,

    /// Write the s-index files into `path`. Defaults to the
    /// `paths.sindex` directory.
    #[arg(short, long, value_name = "path")]
    output: Option<PathBuf>,

    /// Number of entities per batch.
    #[arg(long)]
    batch_size: Option<usize>,
}

/// Reads the d-index points of the given datasets. With the
/// carry-forward strategy the points are reduced to yearly
/// observations; with summation every point is kept as an observation
/// of its year. Returns the index and the number of malformed lines.
fn load_observations(
    files: &[PathBuf],
    datasets: &HashSet<DatasetId>,
    strategy: AggregationStrategy,
) -> SindexResult<(ObservationIndex, usize)> {
    let mut points: HashMap<DatasetId, Vec<DIndexPoint>> = HashMap::new();
    let mut index = ObservationIndex::new();
    let mut skipped = 0;

    let mut reader = LineReader::new(files.to_vec());
    for line in reader.by_ref() {
        let line = line?;
        let row: DIndexRow = match serde_json::from_str(&line) {
            Ok(row) => row,
            Err(e) => {
                log::debug!("skip d-index row: {e}");
                skipped += 1;
                continue;
            }
        };

        if !datasets.contains(&row.dataset_id) {
            continue;
        }

        match strategy {
            AggregationStrategy::CarryForward => {
                points.entry(row.dataset_id).or_default().push(
                    DIndexPoint {
                        date: row.created,
                        value: row.score,
                    },
                );
            }
            AggregationStrategy::Summation => {
                index.push(
                    row.dataset_id,
                    YearObservation {
                        year: row.year,
                        value: row.score,
                    },
                );
            }
        }
    }

    skipped += reader.skipped();

    for (dataset_id, points) in points.iter() {
        for obs in yearly_observations(points) {
            index.push(*dataset_id, obs);
        }
    }

    Ok((index.finish(), skipped))
}

fn sindex_row(entity_key: &str, point: &SIndexPoint) -> Value {
    let mut row = Map::new();
    row.insert(entity_key.into(), point.entity_id.into());
    row.insert("score".into(), point.value.into());
    row.insert("year".into(), point.year.into());
    Value::Object(row)
}

fn aggregate_batch(
    batch: &[(EntityId, BTreeSet<DatasetId>)],
    dindex_files: &[PathBuf],
    current_year: i32,
    strategy: AggregationStrategy,
) -> SindexResult<(Vec<SIndexPoint>, usize)> {
    let datasets: HashSet<DatasetId> = batch
        .iter()
        .flat_map(|(_, datasets)| datasets.iter().copied())
        .collect();

    let (index, skipped) =
        load_observations(dindex_files, &datasets, strategy)?;
    log::debug!(
        "loaded observations of {} of {} dataset(s)",
        index.len(),
        datasets.len()
    );

    let points = batch
        .par_iter()
        .map(|(entity_id, datasets)| {
            aggregate_entity(
                *entity_id,
                datasets,
                &index,
                current_year,
                strategy,
            )
        })
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .collect();

    Ok((points, skipped))
}

fn resolve_or(
    project: &Project,
    path: Option<PathBuf>,
    default: &Path,
) -> PathBuf {
    project.resolve(path.as_deref().unwrap_or(default))
}

impl Sindex {
    pub(crate) fn execute(self) -> SindexResult<()> {
        let project = Project::discover()?;
        let config = project.config()?;

        let strategy = self.strategy.unwrap_or(config.aggregation.strategy);
        let current_year =
            self.current_year.unwrap_or_else(|| Utc::now().year());
        let entity_key =
            self.entity_key.unwrap_or(config.aggregation.entity_key);
        let batch_size = self.batch_size.unwrap_or(config.batch.entities);
        if batch_size == 0 {
            bail!("batch size must be greater than zero");
        }

        let links_path =
            resolve_or(&project, self.links, &config.paths.links);
        let dindex_dir =
            resolve_or(&project, self.dindex, &config.paths.dindex);
        let output_dir =
            resolve_or(&project, self.output, &config.paths.sindex);

        let (entities, skipped_links) =
            read_entities(&links_path, &entity_key)?;
        log::info!("found {} linked entities", entities.len());
        if skipped_links > 0 {
            log::warn!("skipped {skipped_links} malformed link(s)");
        }

        let dindex_files = list_files(&dindex_dir, "ndjson")?;
        if dindex_files.is_empty() {
            log::warn!("no d-index files found in {}", dindex_dir.display());
        }

        reset_dir(&output_dir)?;
        let mut writer = RotatingWriter::new(
            &output_dir,
            Some("sindex"),
            config.batch.rows_per_file,
        );

        log::info!(
            "aggregate with strategy {strategy} (current year {current_year})"
        );

        let pbar = ProgressBarBuilder::new(PBAR_SINDEX, self.quiet)
            .len(entities.len() as u64)
            .build();

        let mut skipped = 0;
        for ids in entities.chunks(batch_size) {
            let batch = read_batch_links(&links_path, &entity_key, ids)?;
            let (points, batch_skipped) = aggregate_batch(
                &batch,
                &dindex_files,
                current_year,
                strategy,
            )?;

            for point in points.iter() {
                writer.write(&sindex_row(&entity_key, point))?;
            }

            skipped += batch_skipped;
            pbar.inc(ids.len() as u64);
        }

        pbar.finish_using_style();

        let rows = writer.finish()?;
        log::info!("wrote {rows} s-index row(s)");

        if skipped > 0 {
            log::warn!("skipped {skipped} malformed d-index row(s)");
        }

        Ok(())
    }
}
