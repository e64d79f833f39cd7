//! # s-index core
//!
//! This crate computes the _dataset index_ (d-index) of scientific
//! datasets and aggregates it into the _s-index_ of authors and
//! organizations. The d-index combines a FAIR score, weighted
//! citations and weighted mentions, each normalized by the median of
//! the dataset's topic and publication year.
//!
//! All engines are pure functions over explicit inputs. Nothing in
//! this crate reads the system clock or holds global state; the
//! reference instant and the normalization table are always passed in
//! by the caller.
//!
//! ## Normalization
//!
//! The [NormalizationTable] resolves the median reference values (FT,
//! CTw, MTw) for a `(topic, year)` request, following a fixed fallback
//! chain and falling back to documented defaults.
//!
//! ## d-index
//!
//! [dataset_index_series] evaluates the d-index at the publication
//! date and at every citation or mention date of a dataset.
//!
//! ## s-index
//!
//! [aggregate] sums the effective d-index of all datasets linked to an
//! entity for every year, carrying forward the last known value.
//!
//! ## License
//!
//! This project is licensed under the terms of the [EUPL v1.2].
//!
//! [EUPL v1.2]: https://joinup.ec.europa.eu/collection/eupl/eupl-text-eupl-12

pub mod date;
pub mod dindex;
pub mod error;
pub mod normalization;
pub mod ranking;
pub mod record;
pub mod sindex;
pub mod topic;

pub use dindex::{
    dataset_index, dataset_index_series, yearly_observations,
    CitationEvent, DIndexPoint, DIndexSeries, DatasetInput,
    MentionEvent, RawScoreInput, YearObservation,
};
pub use error::{CoreError, CoreResult};
pub use normalization::{
    Factor, NormalizationFactors, NormalizationTable,
    NormalizationTableBuilder,
};
pub use ranking::{rank, RankedEntity, RankingOptions};
pub use record::{DatasetRecord, Diagnostics};
pub use sindex::{
    aggregate, aggregate_entity, group_links, AggregationStrategy,
    DatasetId, EntityDatasetLink, EntityId, ObservationIndex,
    SIndexPoint,
};
pub use topic::TopicId;
