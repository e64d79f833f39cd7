//! Ranking of entities by their latest s-index.

use hashbrown::HashMap;
use serde::Serialize;

use crate::sindex::{
    group_links, DatasetId, EntityDatasetLink, EntityId, SIndexPoint,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RankedEntity {
    pub entity_id: EntityId,
    pub dataset_count: usize,
    pub sindex: f64,
    pub sindex_year: i32,
    pub avg_dataset_index: f64,
    pub total_citations: usize,
}

/// Thresholds an entity must exceed to be ranked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingOptions {
    /// Entities must be linked to more datasets than this.
    pub dataset_threshold: usize,

    /// The linked datasets must have more citations than this.
    pub citation_threshold: usize,

    /// The s-index per linked dataset must be greater than this.
    pub avg_dataset_index_threshold: f64,

    /// Maximum number of entities to return.
    pub limit: Option<usize>,
}

impl Default for RankingOptions {
    fn default() -> Self {
        Self {
            dataset_threshold: 5,
            citation_threshold: 5,
            avg_dataset_index_threshold: 1.0,
            limit: None,
        }
    }
}

/// Ranks entities by the s-index of their latest year, highest first.
/// Ties are broken by entity id. Entities without any s-index point are
/// not ranked. `citations` holds the number of citations per dataset;
/// unknown datasets have none.
pub fn rank(
    points: &[SIndexPoint],
    links: &[EntityDatasetLink],
    citations: &HashMap<DatasetId, usize>,
    options: &RankingOptions,
) -> Vec<RankedEntity> {
    let mut latest: HashMap<EntityId, (i32, f64)> = HashMap::new();
    for point in points {
        latest
            .entry(point.entity_id)
            .and_modify(|entry| {
                if point.year >= entry.0 {
                    *entry = (point.year, point.value);
                }
            })
            .or_insert((point.year, point.value));
    }

    let mut ranked: Vec<RankedEntity> = group_links(links)
        .into_iter()
        .filter_map(|(entity_id, datasets)| {
            let (year, sindex) = latest.get(&entity_id).copied()?;
            let dataset_count = datasets.len();
            let total_citations = datasets
                .iter()
                .filter_map(|dataset_id| citations.get(dataset_id))
                .sum();

            Some(RankedEntity {
                entity_id,
                dataset_count,
                sindex,
                sindex_year: year,
                avg_dataset_index: sindex / dataset_count as f64,
                total_citations,
            })
        })
        .filter(|entity| {
            entity.dataset_count > options.dataset_threshold
                && entity.total_citations > options.citation_threshold
                && entity.avg_dataset_index
                    > options.avg_dataset_index_threshold
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.sindex
            .total_cmp(&a.sindex)
            .then(a.entity_id.cmp(&b.entity_id))
    });

    if let Some(limit) = options.limit {
        ranked.truncate(limit);
    }

    ranked
}
