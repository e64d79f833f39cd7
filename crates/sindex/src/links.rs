use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use hashbrown::HashSet;
use serde::Deserialize;
use serde_json::Value;
use sindex_core::{group_links, DatasetId, EntityDatasetLink, EntityId};

use crate::ndjson::{list_files, LineReader};
use crate::prelude::*;

#[derive(Debug, Deserialize)]
struct CsvLink {
    entity_id: EntityId,
    dataset_id: DatasetId,
}

fn id(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parses a NDJSON link record `{"<entity_key>": .., "datasetId": ..}`.
fn parse_line(line: &str, entity_key: &str) -> Option<EntityDatasetLink> {
    let value: Value = serde_json::from_str(line).ok()?;
    let entity_id = id(value.get(entity_key))?;
    let dataset_id = id(value.get("datasetId"))?;
    Some(EntityDatasetLink::new(entity_id, dataset_id))
}

fn link_files(path: &Path) -> SindexResult<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = list_files(path, "ndjson")?;
    files.extend(list_files(path, "csv")?);
    Ok(files)
}

fn is_csv(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some("csv")
}

/// Calls `f` with every entity-dataset link of a file or directory.
/// NDJSON files identify the entity by the `entity_key` field, CSV
/// files by the `entity_id` column. Returns the number of malformed
/// records, which are skipped.
pub(crate) fn for_each_link<F>(
    path: &Path,
    entity_key: &str,
    mut f: F,
) -> SindexResult<usize>
where
    F: FnMut(EntityDatasetLink),
{
    let mut skipped = 0;

    for file in link_files(path)? {
        if is_csv(&file) {
            let mut reader = csv::Reader::from_path(&file)?;
            for result in reader.deserialize::<CsvLink>() {
                match result {
                    Ok(link) => {
                        f(EntityDatasetLink::new(
                            link.entity_id,
                            link.dataset_id,
                        ));
                    }
                    Err(e) => {
                        log::debug!("skip link: {e}");
                        skipped += 1;
                    }
                }
            }
        } else {
            let mut reader = LineReader::new(vec![file]);
            for line in reader.by_ref() {
                let line = line?;
                match parse_line(&line, entity_key) {
                    Some(link) => f(link),
                    None => {
                        log::debug!("skip link: {line}");
                        skipped += 1;
                    }
                }
            }

            skipped += reader.skipped();
        }
    }

    Ok(skipped)
}

/// Reads all entity-dataset links of a file or directory.
pub(crate) fn read_links(
    path: &Path,
    entity_key: &str,
) -> SindexResult<Vec<EntityDatasetLink>> {
    let mut links = vec![];
    let skipped = for_each_link(path, entity_key, |link| links.push(link))?;

    if skipped > 0 {
        log::warn!("skipped {skipped} malformed link(s)");
    }

    Ok(links)
}

/// Returns the ids of all linked entities in ascending order, and the
/// number of malformed records.
pub(crate) fn read_entities(
    path: &Path,
    entity_key: &str,
) -> SindexResult<(Vec<EntityId>, usize)> {
    let mut entities = BTreeSet::new();
    let skipped = for_each_link(path, entity_key, |link| {
        entities.insert(link.entity_id);
    })?;

    Ok((entities.into_iter().collect(), skipped))
}

/// Reads the datasets linked to the given entities, grouped by entity.
/// Other links are dropped while reading.
pub(crate) fn read_batch_links(
    path: &Path,
    entity_key: &str,
    entities: &[EntityId],
) -> SindexResult<Vec<(EntityId, BTreeSet<DatasetId>)>> {
    let wanted: HashSet<EntityId> = entities.iter().copied().collect();
    let mut links = vec![];

    for_each_link(path, entity_key, |link| {
        if wanted.contains(&link.entity_id) {
            links.push(link);
        }
    })?;

    Ok(group_links(&links).into_iter().collect())
}
