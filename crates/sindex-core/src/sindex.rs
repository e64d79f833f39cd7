//! Aggregation of d-index observations into the s-index of authors and
//! organizations.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display};
use std::str::FromStr;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::dindex::YearObservation;
use crate::error::CoreError;

pub type DatasetId = u64;
pub type EntityId = u64;

/// A link between an entity (author or organization) and a dataset.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
pub struct EntityDatasetLink {
    pub entity_id: EntityId,
    pub dataset_id: DatasetId,
}

impl EntityDatasetLink {
    pub fn new(entity_id: EntityId, dataset_id: DatasetId) -> Self {
        Self {
            entity_id,
            dataset_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SIndexPoint {
    pub entity_id: EntityId,
    pub year: i32,
    pub value: f64,
}

/// How the d-index values of linked datasets are combined.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum AggregationStrategy {
    /// Every year from the first observation up to the last completed
    /// year; datasets without an observation in a year contribute
    /// their latest earlier value.
    #[default]
    CarryForward,

    /// Only the years with at least one observation; every
    /// observation contributes exactly once. Fed with the raw d-index
    /// points of a dataset (see [ObservationIndex::push]), a dataset
    /// with several points in a year contributes all of them.
    Summation,
}

impl Display for AggregationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CarryForward => f.write_str("carry-forward"),
            Self::Summation => f.write_str("summation"),
        }
    }
}

impl FromStr for AggregationStrategy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "carry-forward" => Ok(Self::CarryForward),
            "summation" => Ok(Self::Summation),
            _ => Err(CoreError::other(format!(
                "invalid aggregation strategy '{s}'"
            ))),
        }
    }
}

/// The yearly d-index observations of a set of datasets, sorted by
/// year per dataset.
#[derive(Debug, Default)]
pub struct ObservationIndex {
    by_dataset: HashMap<DatasetId, Vec<YearObservation>>,
}

impl ObservationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an observation. Call [finish](Self::finish) before
    /// querying the index.
    pub fn push(&mut self, dataset_id: DatasetId, obs: YearObservation) {
        self.by_dataset.entry(dataset_id).or_default().push(obs);
    }

    /// Sorts the observations of every dataset by year. The sort is
    /// stable; among several observations of the same year the one
    /// added last is the effective one.
    pub fn finish(mut self) -> Self {
        self.by_dataset
            .values_mut()
            .for_each(|obs| obs.sort_by_key(|o| o.year));
        self
    }

    /// Returns the observations of a dataset (empty if unknown).
    pub fn get(&self, dataset_id: DatasetId) -> &[YearObservation] {
        self.by_dataset
            .get(&dataset_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.by_dataset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_dataset.is_empty()
    }
}

impl FromIterator<(DatasetId, YearObservation)> for ObservationIndex {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = (DatasetId, YearObservation)>,
    {
        let mut index = Self::new();
        for (dataset_id, obs) in iter {
            index.push(dataset_id, obs);
        }

        index.finish()
    }
}

/// Returns the value of a dataset in the given year: the observation
/// of that year, or else the latest earlier observation, or else zero.
/// The observations must be sorted by year.
pub fn effective_value(sorted: &[YearObservation], year: i32) -> f64 {
    match sorted.partition_point(|obs| obs.year <= year) {
        0 => 0.0,
        idx => sorted[idx - 1].value,
    }
}

/// Groups links by entity. Duplicate links are collapsed.
pub fn group_links(
    links: &[EntityDatasetLink],
) -> BTreeMap<EntityId, BTreeSet<DatasetId>> {
    links.iter().fold(BTreeMap::new(), |mut acc, link| {
        acc.entry(link.entity_id)
            .or_insert_with(BTreeSet::new)
            .insert(link.dataset_id);
        acc
    })
}

/// Computes the s-index series of a single entity.
///
/// `current_year` is the calendar year in progress; with the
/// carry-forward strategy it is never evaluated.
pub fn aggregate_entity(
    entity_id: EntityId,
    datasets: &BTreeSet<DatasetId>,
    index: &ObservationIndex,
    current_year: i32,
    strategy: AggregationStrategy,
) -> Vec<SIndexPoint> {
    match strategy {
        AggregationStrategy::CarryForward => {
            carry_forward(entity_id, datasets, index, current_year)
        }
        AggregationStrategy::Summation => {
            summation(entity_id, datasets, index)
        }
    }
}

fn carry_forward(
    entity_id: EntityId,
    datasets: &BTreeSet<DatasetId>,
    index: &ObservationIndex,
    current_year: i32,
) -> Vec<SIndexPoint> {
    let series: Vec<&[YearObservation]> = datasets
        .iter()
        .map(|dataset_id| index.get(*dataset_id))
        .filter(|obs| !obs.is_empty())
        .collect();

    let min_year =
        series.iter().filter_map(|obs| obs.first()).map(|o| o.year).min();
    let max_year =
        series.iter().filter_map(|obs| obs.last()).map(|o| o.year).max();

    let (Some(min_year), Some(max_year)) = (min_year, max_year) else {
        return vec![];
    };

    let end_year = max_year.min(current_year - 1);
    if min_year > end_year {
        return vec![];
    }

    (min_year..=end_year)
        .map(|year| SIndexPoint {
            entity_id,
            year,
            value: series
                .iter()
                .map(|obs| effective_value(obs, year))
                .sum(),
        })
        .collect()
}

fn summation(
    entity_id: EntityId,
    datasets: &BTreeSet<DatasetId>,
    index: &ObservationIndex,
) -> Vec<SIndexPoint> {
    let mut totals: BTreeMap<i32, f64> = BTreeMap::new();
    for dataset_id in datasets {
        for obs in index.get(*dataset_id) {
            *totals.entry(obs.year).or_insert(0.0) += obs.value;
        }
    }

    totals
        .into_iter()
        .map(|(year, value)| SIndexPoint {
            entity_id,
            year,
            value,
        })
        .collect()
}

/// Computes the s-index of every linked entity. The result is sorted
/// by entity and year.
pub fn aggregate(
    links: &[EntityDatasetLink],
    index: &ObservationIndex,
    current_year: i32,
    strategy: AggregationStrategy,
) -> Vec<SIndexPoint> {
    group_links(links)
        .iter()
        .flat_map(|(entity_id, datasets)| {
            aggregate_entity(
                *entity_id,
                datasets,
                index,
                current_year,
                strategy,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn obs(year: i32, value: f64) -> YearObservation {
        YearObservation { year, value }
    }

    fn index(entries: &[(DatasetId, i32, f64)]) -> ObservationIndex {
        entries
            .iter()
            .map(|(dataset_id, year, value)| (*dataset_id, obs(*year, *value)))
            .collect()
    }

    fn link(entity_id: EntityId, dataset_id: DatasetId) -> EntityDatasetLink {
        EntityDatasetLink::new(entity_id, dataset_id)
    }

    fn rows(points: &[SIndexPoint]) -> Vec<(EntityId, i32, f64)> {
        points.iter().map(|p| (p.entity_id, p.year, p.value)).collect()
    }

    #[test]
    fn effective_value_carries_forward() {
        let sorted = [obs(2018, 1.0), obs(2020, 2.0), obs(2020, 2.5)];

        assert_relative_eq!(effective_value(&sorted, 2017), 0.0);
        assert_relative_eq!(effective_value(&sorted, 2018), 1.0);
        assert_relative_eq!(effective_value(&sorted, 2019), 1.0);
        assert_relative_eq!(effective_value(&sorted, 2020), 2.5);
        assert_relative_eq!(effective_value(&sorted, 2030), 2.5);
        assert_relative_eq!(effective_value(&[], 2020), 0.0);
    }

    #[test]
    fn index_sorts_by_year() {
        let index = index(&[(1, 2022, 3.0), (1, 2019, 1.0), (1, 2020, 2.0)]);
        let years: Vec<i32> = index.get(1).iter().map(|o| o.year).collect();

        assert_eq!(years, vec![2019, 2020, 2022]);
        assert!(index.get(2).is_empty());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn two_datasets_carry_forward() {
        let index = index(&[(1, 2020, 1.0), (2, 2021, 2.0)]);
        let links = [link(7, 1), link(7, 2)];

        let result =
            aggregate(&links, &index, 2023, AggregationStrategy::CarryForward);
        assert_eq!(
            rows(&result),
            vec![(7, 2020, 1.0), (7, 2021, 3.0), (7, 2022, 3.0)]
        );
    }

    #[test]
    fn current_year_is_excluded() {
        let links = [link(1, 1)];

        let result = aggregate(
            &links,
            &index(&[(1, 2023, 4.0)]),
            2023,
            AggregationStrategy::CarryForward,
        );
        assert!(result.is_empty());

        let result = aggregate(
            &links,
            &index(&[(1, 2025, 4.0)]),
            2023,
            AggregationStrategy::CarryForward,
        );
        assert!(result.is_empty());
    }

    #[test]
    fn range_ends_at_last_observation() {
        let index = index(&[(1, 2010, 1.0), (1, 2012, 2.0)]);
        let links = [link(1, 1)];

        let result =
            aggregate(&links, &index, 2024, AggregationStrategy::CarryForward);
        assert_eq!(
            rows(&result),
            vec![(1, 2010, 1.0), (1, 2011, 1.0), (1, 2012, 2.0)]
        );
    }

    #[test]
    fn entities_without_observations_are_skipped() {
        let index = index(&[(1, 2020, 1.0)]);
        let links = [link(1, 99), link(2, 1), link(2, 98)];

        let result =
            aggregate(&links, &index, 2023, AggregationStrategy::CarryForward);
        assert_eq!(
            rows(&result),
            vec![(2, 2020, 1.0), (2, 2021, 1.0), (2, 2022, 1.0)]
        );
    }

    #[test]
    fn zero_sums_are_emitted() {
        let index = index(&[(1, 2020, 0.0), (1, 2021, 0.0)]);
        let links = [link(5, 1)];

        let result =
            aggregate(&links, &index, 2022, AggregationStrategy::CarryForward);
        assert_eq!(rows(&result), vec![(5, 2020, 0.0), (5, 2021, 0.0)]);
    }

    #[test]
    fn duplicate_links_count_once() {
        let index = index(&[(1, 2020, 1.5)]);
        let links = [link(3, 1), link(3, 1)];

        for strategy in [
            AggregationStrategy::CarryForward,
            AggregationStrategy::Summation,
        ] {
            let result = aggregate(&links, &index, 2021, strategy);
            assert_eq!(rows(&result), vec![(3, 2020, 1.5)]);
        }
    }

    #[test]
    fn result_is_independent_of_input_order() {
        let mut entries: Vec<(DatasetId, i32, f64)> = vec![
            (1, 2019, 0.5),
            (2, 2021, 1.0),
            (1, 2022, 0.75),
            (3, 2018, 2.0),
            (2, 2019, 0.25),
        ];
        let mut links = vec![link(2, 3), link(1, 1), link(2, 2), link(1, 2)];

        let a = aggregate(&links, &index(&entries), 2024, Default::default());
        entries.reverse();
        links.reverse();
        let b = aggregate(&links, &index(&entries), 2024, Default::default());

        assert_eq!(a, b);
        assert_eq!(a.first().map(|p| (p.entity_id, p.year)), Some((1, 2019)));
        assert_eq!(a.last().map(|p| (p.entity_id, p.year)), Some((2, 2021)));
    }

    #[test]
    fn summation_strategy() {
        let index = index(&[(1, 2020, 1.0), (2, 2021, 2.0), (2, 2024, 3.0)]);
        let links = [link(7, 1), link(7, 2)];

        let result =
            aggregate(&links, &index, 2023, AggregationStrategy::Summation);
        assert_eq!(
            rows(&result),
            vec![(7, 2020, 1.0), (7, 2021, 2.0), (7, 2024, 3.0)]
        );
    }

    #[test]
    fn summation_counts_every_point_of_a_year() {
        let index = index(&[
            (1, 2020, 0.5),
            (1, 2020, 1.0),
            (2, 2020, 2.0),
            (2, 2021, 2.5),
        ]);
        let links = [link(7, 1), link(7, 2)];

        let result =
            aggregate(&links, &index, 2023, AggregationStrategy::Summation);
        assert_eq!(rows(&result), vec![(7, 2020, 3.5), (7, 2021, 2.5)]);
    }

    #[test]
    fn strategy_from_str() {
        assert_eq!(
            "carry-forward".parse::<AggregationStrategy>().unwrap(),
            AggregationStrategy::CarryForward
        );
        assert_eq!(
            "summation".parse::<AggregationStrategy>().unwrap(),
            AggregationStrategy::Summation
        );
        assert!("sum".parse::<AggregationStrategy>().is_err());
        assert_eq!(AggregationStrategy::default().to_string(), "carry-forward");
    }
}
