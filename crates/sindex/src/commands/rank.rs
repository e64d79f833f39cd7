use std::io::stdout;
use std::path::{Path, PathBuf};

use clap::Parser;
use comfy_table::{presets, Row, Table};
use hashbrown::{HashMap, HashSet};
use serde_json::Value;
use sindex_core::{
    rank, DatasetId, DatasetRecord, RankedEntity, RankingOptions,
    SIndexPoint,
};

use crate::links::read_links;
use crate::ndjson::{list_files, LineReader};
use crate::prelude::*;

/// Print the entities with the highest s-index.
#[derive(Debug, Parser)]
pub(crate) struct Rank {
    /// Only entities linked to more than `n` datasets are ranked.
    #[arg(long, default_value = "5", value_name = "n")]
    datasets_above: usize,

    /// Only entities whose datasets have more than `n` citations in
    /// total are ranked.
    #[arg(long, default_value = "5", value_name = "n")]
    citations_above: usize,

    /// Only entities with an s-index per dataset greater than `x` are
    /// ranked.
    #[arg(long, default_value = "1.0", value_name = "x")]
    avg_above: f64,

    /// Print at most `n` entities.
    #[arg(short = 'n', long, value_name = "n")]
    limit: Option<usize>,

    /// Write the ranking in CSV format to the standard output.
    #[arg(long)]
    csv: bool,

    /// The name of the entity id field. Defaults to the entity key of
    /// the project config.
    #[arg(long, value_name = "name")]
    entity_key: Option<String>,

    /// The entity-dataset links. Defaults to `paths.links`.
    #[arg(long, value_name = "path")]
    links: Option<PathBuf>,

    /// The s-index output directory. Defaults to `paths.sindex`.
    #[arg(long, value_name = "path")]
    sindex: Option<PathBuf>,

    /// The dataset records, used to count citations. Defaults to
    /// `paths.datasets`.
    #[arg(long, value_name = "path")]
    datasets: Option<PathBuf>,
}

fn parse_row(line: &str, entity_key: &str) -> Option<SIndexPoint> {
    let value: Value = serde_json::from_str(line).ok()?;
    Some(SIndexPoint {
        entity_id: value.get(entity_key)?.as_u64()?,
        year: i32::try_from(value.get("year")?.as_i64()?).ok()?,
        value: value.get("score")?.as_f64()?,
    })
}

fn read_points(
    path: &Path,
    entity_key: &str,
) -> SindexResult<Vec<SIndexPoint>> {
    let mut points = vec![];
    let mut skipped = 0;

    let mut reader = LineReader::new(list_files(path, "ndjson")?);
    for line in reader.by_ref() {
        match parse_row(&line?, entity_key) {
            Some(point) => points.push(point),
            None => skipped += 1,
        }
    }

    skipped += reader.skipped();
    if skipped > 0 {
        log::warn!("skipped {skipped} malformed s-index row(s)");
    }

    Ok(points)
}

/// Counts the citations of the given datasets.
fn read_citations(
    path: &Path,
    datasets: &HashSet<DatasetId>,
) -> SindexResult<HashMap<DatasetId, usize>> {
    let mut citations = HashMap::new();
    let mut skipped = 0;

    let mut reader = LineReader::new(list_files(path, "ndjson")?);
    for line in reader.by_ref() {
        let record: DatasetRecord = match serde_json::from_str(&line?) {
            Ok(record) => record,
            Err(e) => {
                log::debug!("skip record: {e}");
                skipped += 1;
                continue;
            }
        };

        if datasets.contains(&record.dataset_id) {
            *citations.entry(record.dataset_id).or_insert(0) +=
                record.citation_count();
        }
    }

    skipped += reader.skipped();
    if skipped > 0 {
        log::warn!("skipped {skipped} malformed record(s)");
    }

    Ok(citations)
}

fn print_table(ranking: &[RankedEntity]) {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_header(Row::from(vec![
        "rank",
        "entity",
        "datasets",
        "citations",
        "year",
        "s-index",
        "avg d-index",
    ]));

    for (idx, entity) in ranking.iter().enumerate() {
        table.add_row([
            (idx + 1).to_string(),
            entity.entity_id.to_string(),
            entity.dataset_count.to_string(),
            entity.total_citations.to_string(),
            entity.sindex_year.to_string(),
            format!("{:.4}", entity.sindex),
            format!("{:.4}", entity.avg_dataset_index),
        ]);
    }

    println!("{table}");
}

impl Rank {
    pub(crate) fn execute(self) -> SindexResult<()> {
        let project = Project::discover()?;
        let config = project.config()?;

        let entity_key =
            self.entity_key.unwrap_or(config.aggregation.entity_key);
        let links_path =
            project.resolve(self.links.unwrap_or(config.paths.links));
        let sindex_path =
            project.resolve(self.sindex.unwrap_or(config.paths.sindex));

        let datasets_path =
            project.resolve(self.datasets.unwrap_or(config.paths.datasets));

        let links = read_links(&links_path, &entity_key)?;
        let points = read_points(&sindex_path, &entity_key)?;
        let linked: HashSet<DatasetId> =
            links.iter().map(|link| link.dataset_id).collect();
        let citations = read_citations(&datasets_path, &linked)?;

        let options = RankingOptions {
            dataset_threshold: self.datasets_above,
            citation_threshold: self.citations_above,
            avg_dataset_index_threshold: self.avg_above,
            limit: self.limit,
        };

        let ranking = rank(&points, &links, &citations, &options);

        if self.csv {
            let mut writer = csv::Writer::from_writer(stdout().lock());
            for entity in ranking.iter() {
                writer.serialize(entity)?;
            }

            writer.flush()?;
        } else {
            print_table(&ranking);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use approx::assert_relative_eq;

    use super::*;

    type TestResult = anyhow::Result<()>;

    #[test]
    fn parse_sindex_row() {
        let point = parse_row(
            r#"{"automatedOrganizationId": 3, "score": 1.5, "year": 2021}"#,
            "automatedOrganizationId",
        )
        .unwrap();

        assert_eq!(point.entity_id, 3);
        assert_eq!(point.year, 2021);
        assert_relative_eq!(point.value, 1.5);

        assert!(parse_row(r#"{"score": 1.5, "year": 2021}"#, "id").is_none());
        assert!(parse_row("[]", "id").is_none());
    }

    #[test]
    fn read_sindex_dir() -> TestResult {
        let dir = tempfile::tempdir()?;
        fs::write(
            dir.path().join("sindex-1.ndjson"),
            "{\"automatedUserId\":1,\"score\":1.0,\"year\":2020}\n\
             {\"automatedUserId\":1,\"score\":2.0,\"year\":2021}\n\
             {\"automatedUserId\":\"x\",\"score\":2.0,\"year\":2021}\n",
        )?;

        let points = read_points(dir.path(), "automatedUserId")?;
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].year, 2021);
        Ok(())
    }

    #[test]
    fn count_citations_of_linked_datasets() -> TestResult {
        let dir = tempfile::tempdir()?;
        fs::write(
            dir.path().join("1.ndjson"),
            "{\"datasetId\":1,\"citations\":[{\"weight\":1},{}]}\n\
             {\"datasetId\":2,\"citations\":null}\n\
             {\"datasetId\":3,\"citations\":[{}]}\n\
             {\"citations\":[{}]}\n",
        )?;

        let linked: HashSet<DatasetId> = [1, 2].into_iter().collect();
        let citations = read_citations(dir.path(), &linked)?;

        assert_eq!(citations.get(&1), Some(&2));
        assert_eq!(citations.get(&2), Some(&0));
        assert_eq!(citations.get(&3), None);
        Ok(())
    }
}
