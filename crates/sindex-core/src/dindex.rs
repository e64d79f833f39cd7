//! The dataset index (d-index).
//!
//! At any instant the d-index of a dataset is
//!
//! ```text
//! d = (Fi / FT + Ciw / CTw + Miw / MTw) / 3
//! ```
//!
//! where `Fi` is the FAIR score scaled into `[0, 1]`, `Ciw` and `Miw`
//! are the weighted sums of all citations and mentions up to that
//! instant and `FT`, `CTw`, `MTw` are the [NormalizationFactors] of
//! the dataset's topic and publication year.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};

use crate::date::midnight;
use crate::normalization::NormalizationFactors;
use crate::topic::TopicId;

/// The per-dataset scoring input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawScoreInput {
    /// The FAIR score in `[0, 100]`, if the dataset has been rated.
    pub fair_score_raw: Option<f64>,

    /// The publication date, if known.
    pub publication_date: Option<DateTime<Utc>>,

    /// The topic used to select the normalization row.
    pub topic_id: Option<TopicId>,
}

/// A weighted citation. Citations without a date are counted at the
/// reference day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CitationEvent {
    pub date: Option<DateTime<Utc>>,
    pub weight: f64,
}

/// A weighted mention. Mentions without a date are counted at the
/// reference day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MentionEvent {
    pub date: Option<DateTime<Utc>>,
    pub weight: f64,
}

/// Everything needed to compute the d-index series of one dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetInput {
    pub score: RawScoreInput,
    pub citations: Vec<CitationEvent>,
    pub mentions: Vec<MentionEvent>,
}

impl DatasetInput {
    /// Returns the publication year, used to select the normalization
    /// row.
    #[inline]
    pub fn publication_year(&self) -> Option<i32> {
        self.score.publication_date.map(|date| date.year())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DIndexPoint {
    pub date: DateTime<Utc>,
    pub value: f64,
}

/// The d-index of a dataset over time.
#[derive(Debug, Clone, PartialEq)]
pub struct DIndexSeries {
    /// The evaluated time points. The publication date (if known)
    /// comes first, followed by the event dates in ascending order.
    /// Never empty.
    pub points: Vec<DIndexPoint>,

    /// Number of events excluded because of a negative or non-finite
    /// weight.
    pub rejected_events: usize,

    /// Whether the FAIR score was present but not a finite number.
    pub rejected_score: bool,
}

/// A d-index value reduced to a calendar year.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YearObservation {
    pub year: i32,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum EventKind {
    Citation,
    Mention,
}

#[inline]
fn is_valid_weight(weight: f64) -> bool {
    weight.is_finite() && weight >= 0.0
}

/// Scales a raw FAIR score from `[0, 100]` into `[0, 1]`. A missing
/// score counts as zero. The second value is `true` if the score was
/// present but not a finite number.
pub fn normalized_fair_score(raw: Option<f64>) -> (f64, bool) {
    match raw {
        None => (0.0, false),
        Some(score) if !score.is_finite() => (0.0, true),
        Some(score) => ((score / 100.0).clamp(0.0, 1.0), false),
    }
}

/// Computes a single d-index value.
#[inline]
pub fn dataset_index(
    fi: f64,
    ciw: f64,
    miw: f64,
    factors: &NormalizationFactors,
) -> f64 {
    (fi / factors.ft().get()
        + ciw / factors.ctw().get()
        + miw / factors.mtw().get())
        / 3.0
}

/// Computes the d-index at every meaningful time point of a dataset.
///
/// Events without a date take place at the UTC midnight of
/// `reference`. Events dated before the publication date are counted
/// at the publication date. If neither a publication date nor any
/// event exists, the series consists of a single point at the UTC
/// midnight of `reference`.
pub fn dataset_index_series(
    input: &DatasetInput,
    factors: &NormalizationFactors,
    reference: DateTime<Utc>,
) -> DIndexSeries {
    let today = midnight(reference);
    let (fi, rejected_score) =
        normalized_fair_score(input.score.fair_score_raw);

    let citations = input
        .citations
        .iter()
        .map(|c| (c.date, EventKind::Citation, c.weight));
    let mentions = input
        .mentions
        .iter()
        .map(|m| (m.date, EventKind::Mention, m.weight));

    let mut rejected_events = 0;
    let mut events: Vec<(DateTime<Utc>, EventKind, f64)> = citations
        .chain(mentions)
        .filter_map(|(date, kind, weight)| {
            if is_valid_weight(weight) {
                Some((date.unwrap_or(today), kind, weight))
            } else {
                rejected_events += 1;
                None
            }
        })
        .collect();

    events.sort_by_key(|(date, _, _)| *date);

    let publication_date = input.score.publication_date;
    let mut dates: Vec<DateTime<Utc>> = events
        .iter()
        .map(|(date, _, _)| *date)
        .filter(|date| publication_date.map_or(true, |pd| *date > pd))
        .collect();
    dates.dedup();

    let mut eval_dates: Vec<DateTime<Utc>> =
        publication_date.into_iter().chain(dates).collect();
    if eval_dates.is_empty() {
        eval_dates.push(today);
    }

    let mut ciw = 0.0;
    let mut miw = 0.0;
    let mut pending = events.iter().peekable();

    let points = eval_dates
        .into_iter()
        .map(|date| {
            while let Some((_, kind, weight)) =
                pending.next_if(|(event_date, _, _)| *event_date <= date)
            {
                match kind {
                    EventKind::Citation => ciw += weight,
                    EventKind::Mention => miw += weight,
                }
            }

            DIndexPoint {
                date,
                value: dataset_index(fi, ciw, miw, factors),
            }
        })
        .collect();

    DIndexSeries {
        points,
        rejected_events,
        rejected_score,
    }
}

/// Reduces a d-index series to one observation per calendar year,
/// holding the value of the latest point within that year. The result
/// is sorted by year.
pub fn yearly_observations(points: &[DIndexPoint]) -> Vec<YearObservation> {
    let mut latest: BTreeMap<i32, (DateTime<Utc>, f64)> = BTreeMap::new();

    for point in points {
        latest
            .entry(point.date.year())
            .and_modify(|entry| {
                if point.date >= entry.0 {
                    *entry = (point.date, point.value);
                }
            })
            .or_insert((point.date, point.value));
    }

    latest
        .into_iter()
        .map(|(year, (_, value))| YearObservation { year, value })
        .collect()
}
