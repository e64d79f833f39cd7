//! Raw dataset records as they are exported by the ingestion pipeline.
//!
//! A raw record is deliberately permissive: dates are strings and
//! scores or weights may be numbers or numeric strings. Converting a
//! record into a [DatasetInput] drops every malformed value and counts
//! it in the [Diagnostics], so that one bad value never aborts a run.

use std::ops::AddAssign;

use serde::Deserialize;
use serde_json::Value;

use crate::date::parse_date;
use crate::dindex::{
    CitationEvent, DIndexSeries, DatasetInput, MentionEvent,
    RawScoreInput,
};
use crate::sindex::DatasetId;
use crate::topic::TopicId;

/// A raw dataset record. Apart from the dataset id every field is kept
/// as plain JSON and validated by [DatasetRecord::to_input].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetRecord {
    pub dataset_id: DatasetId,

    #[serde(default)]
    pub published_at: Option<Value>,

    #[serde(default)]
    pub topic_id: Option<Value>,

    #[serde(default)]
    pub fair_score: Option<Value>,

    /// A list of `{"date": .., "weight": ..}` objects.
    #[serde(default)]
    pub citations: Option<Value>,

    /// A list of `{"date": .., "weight": ..}` objects.
    #[serde(default)]
    pub mentions: Option<Value>,
}

/// Counters of skipped and rejected input.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Diagnostics {
    /// Records read successfully.
    pub records: usize,

    /// Lines that couldn't be read as a dataset record.
    pub skipped_records: usize,

    /// Events dropped because they aren't JSON objects. A `citations`
    /// or `mentions` field that isn't a list counts once.
    pub invalid_events: usize,

    /// Events dropped because of an unparseable date.
    pub invalid_dates: usize,

    /// Events dropped because of a non-numeric, negative or
    /// non-finite weight.
    pub invalid_weights: usize,

    /// FAIR scores ignored because they aren't numbers.
    pub invalid_scores: usize,

    /// Publication dates ignored because they couldn't be parsed.
    pub invalid_publication_dates: usize,

    /// Topic ids ignored because they are malformed.
    pub invalid_topics: usize,
}

impl Diagnostics {
    /// Returns the total number of rejected values (excluding skipped
    /// records).
    pub fn rejected(&self) -> usize {
        self.invalid_events
            + self.invalid_dates
            + self.invalid_weights
            + self.invalid_scores
            + self.invalid_publication_dates
            + self.invalid_topics
    }

    /// Accounts for the values rejected by the d-index engine.
    pub fn record_series(&mut self, series: &DIndexSeries) {
        self.invalid_weights += series.rejected_events;
        if series.rejected_score {
            self.invalid_scores += 1;
        }
    }
}

impl AddAssign for Diagnostics {
    fn add_assign(&mut self, rhs: Self) {
        self.records += rhs.records;
        self.skipped_records += rhs.skipped_records;
        self.invalid_events += rhs.invalid_events;
        self.invalid_dates += rhs.invalid_dates;
        self.invalid_weights += rhs.invalid_weights;
        self.invalid_scores += rhs.invalid_scores;
        self.invalid_publication_dates += rhs.invalid_publication_dates;
        self.invalid_topics += rhs.invalid_topics;
    }
}

/// Reads a number from a JSON number or a numeric string.
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

enum DateField {
    Absent,
    Valid(chrono::DateTime<chrono::Utc>),
    Invalid,
}

fn date_field(value: Option<&Value>) -> DateField {
    match value {
        None | Some(Value::Null) => DateField::Absent,
        Some(Value::String(s)) if s.trim().is_empty() => DateField::Absent,
        Some(Value::String(s)) => match parse_date(s) {
            Ok(date) => DateField::Valid(date),
            Err(_) => DateField::Invalid,
        },
        Some(_) => DateField::Invalid,
    }
}

/// Returns the entries of an event list. A missing or `null` list is
/// empty; anything else but a list is rejected.
fn event_list<'a>(
    value: Option<&'a Value>,
    diagnostics: &mut Diagnostics,
) -> &'a [Value] {
    match value {
        None | Some(Value::Null) => &[],
        Some(Value::Array(events)) => events,
        Some(_) => {
            diagnostics.invalid_events += 1;
            &[]
        }
    }
}

/// Converts a raw event into `(date, weight)`. A missing weight counts
/// as zero.
fn event(
    raw: &Value,
    diagnostics: &mut Diagnostics,
) -> Option<(Option<chrono::DateTime<chrono::Utc>>, f64)> {
    let Some(raw) = raw.as_object() else {
        diagnostics.invalid_events += 1;
        return None;
    };

    let date = match date_field(raw.get("date")) {
        DateField::Absent => None,
        DateField::Valid(date) => Some(date),
        DateField::Invalid => {
            diagnostics.invalid_dates += 1;
            return None;
        }
    };

    let weight = match raw.get("weight") {
        None | Some(Value::Null) => 0.0,
        Some(value) => match number(value) {
            Some(weight) => weight,
            None => {
                diagnostics.invalid_weights += 1;
                return None;
            }
        },
    };

    Some((date, weight))
}

impl DatasetRecord {
    /// Returns the number of citation entries, valid or not.
    pub fn citation_count(&self) -> usize {
        match self.citations {
            Some(Value::Array(ref citations)) => citations.len(),
            _ => 0,
        }
    }

    /// Converts the record into the typed input of the d-index
    /// engine. Malformed values are dropped and counted.
    pub fn to_input(&self, diagnostics: &mut Diagnostics) -> DatasetInput {
        let fair_score_raw = match self.fair_score.as_ref() {
            None | Some(Value::Null) => None,
            Some(value) => {
                let score = number(value);
                if score.is_none() {
                    diagnostics.invalid_scores += 1;
                }
                score
            }
        };

        let publication_date = match date_field(self.published_at.as_ref())
        {
            DateField::Absent => None,
            DateField::Valid(date) => Some(date),
            DateField::Invalid => {
                diagnostics.invalid_publication_dates += 1;
                None
            }
        };

        let topic_id = match self.topic_id.as_ref() {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => {
                let topic = TopicId::parse(s);
                if topic.is_none() && !s.trim().is_empty() {
                    diagnostics.invalid_topics += 1;
                }
                topic
            }
            Some(_) => {
                diagnostics.invalid_topics += 1;
                None
            }
        };

        let citations = event_list(self.citations.as_ref(), diagnostics)
            .iter()
            .filter_map(|raw| event(raw, diagnostics))
            .map(|(date, weight)| CitationEvent { date, weight })
            .collect();

        let mentions = event_list(self.mentions.as_ref(), diagnostics)
            .iter()
            .filter_map(|raw| event(raw, diagnostics))
            .map(|(date, weight)| MentionEvent { date, weight })
            .collect();

        DatasetInput {
            score: RawScoreInput {
                fair_score_raw,
                publication_date,
                topic_id,
            },
            citations,
            mentions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date::ymd;

    type TestResult = anyhow::Result<()>;

    #[test]
    fn full_record() -> TestResult {
        let record: DatasetRecord = serde_json::from_str(
            r#"{"datasetId": 42, "publishedAt": "2020-01-01T00:00:00Z",
                "topicId": "T12345", "fairScore": 60,
                "citations": [{"date": "2021-06-01", "weight": 2.0}],
                "mentions": [{"date": null, "weight": "1.5"}]}"#,
        )?;

        let mut diagnostics = Diagnostics::default();
        let input = record.to_input(&mut diagnostics);

        assert_eq!(record.dataset_id, 42);
        assert_eq!(input.score.fair_score_raw, Some(60.0));
        assert_eq!(input.score.publication_date, ymd(2020, 1, 1));
        assert_eq!(input.score.topic_id, TopicId::parse("T12345"));
        assert_eq!(
            input.citations,
            vec![CitationEvent { date: ymd(2021, 6, 1), weight: 2.0 }]
        );
        assert_eq!(
            input.mentions,
            vec![MentionEvent { date: None, weight: 1.5 }]
        );
        assert_eq!(diagnostics, Diagnostics::default());
        Ok(())
    }

    #[test]
    fn minimal_record() -> TestResult {
        let record: DatasetRecord =
            serde_json::from_str(r#"{"datasetId": 1}"#)?;
        let mut diagnostics = Diagnostics::default();
        let input = record.to_input(&mut diagnostics);

        assert_eq!(input, DatasetInput::default());
        assert_eq!(diagnostics.rejected(), 0);
        Ok(())
    }

    #[test]
    fn malformed_values_are_dropped() -> TestResult {
        let record: DatasetRecord = serde_json::from_str(
            r#"{"datasetId": 7, "publishedAt": "someday",
                "topicId": "T 1", "fairScore": "high",
                "citations": [
                    {"date": "2021-13-45", "weight": 1.0},
                    {"date": "2021-01-01", "weight": "heavy"},
                    {"date": "2021-01-02"},
                    {"date": 20210103, "weight": 1.0}
                ],
                "mentions": [{"date": "", "weight": -1.0}]}"#,
        )?;

        let mut diagnostics = Diagnostics::default();
        let input = record.to_input(&mut diagnostics);

        assert_eq!(input.score.fair_score_raw, None);
        assert_eq!(input.score.publication_date, None);
        assert_eq!(input.score.topic_id, None);
        assert_eq!(
            input.citations,
            vec![CitationEvent { date: ymd(2021, 1, 2), weight: 0.0 }]
        );

        // Negative weights are left to the engine.
        assert_eq!(
            input.mentions,
            vec![MentionEvent { date: None, weight: -1.0 }]
        );

        assert_eq!(diagnostics.invalid_dates, 2);
        assert_eq!(diagnostics.invalid_weights, 1);
        assert_eq!(diagnostics.invalid_scores, 1);
        assert_eq!(diagnostics.invalid_publication_dates, 1);
        assert_eq!(diagnostics.invalid_topics, 1);
        assert_eq!(diagnostics.rejected(), 6);
        Ok(())
    }

    #[test]
    fn empty_topic_is_not_an_error() -> TestResult {
        let record: DatasetRecord =
            serde_json::from_str(r#"{"datasetId": 1, "topicId": "  "}"#)?;
        let mut diagnostics = Diagnostics::default();
        let input = record.to_input(&mut diagnostics);

        assert_eq!(input.score.topic_id, None);
        assert_eq!(diagnostics.invalid_topics, 0);
        Ok(())
    }

    #[test]
    fn null_event_lists_are_empty() -> TestResult {
        let record: DatasetRecord = serde_json::from_str(
            r#"{"datasetId": 3, "fairScore": 60,
                "citations": null, "mentions": null}"#,
        )?;

        let mut diagnostics = Diagnostics::default();
        let input = record.to_input(&mut diagnostics);

        assert!(input.citations.is_empty());
        assert!(input.mentions.is_empty());
        assert_eq!(input.score.fair_score_raw, Some(60.0));
        assert_eq!(record.citation_count(), 0);
        assert_eq!(diagnostics.rejected(), 0);
        Ok(())
    }

    #[test]
    fn non_string_topic_is_no_topic() -> TestResult {
        let record: DatasetRecord = serde_json::from_str(
            r#"{"datasetId": 4, "topicId": 12345, "fairScore": 50}"#,
        )?;

        let mut diagnostics = Diagnostics::default();
        let input = record.to_input(&mut diagnostics);

        assert_eq!(input.score.topic_id, None);
        assert_eq!(input.score.fair_score_raw, Some(50.0));
        assert_eq!(diagnostics.invalid_topics, 1);
        Ok(())
    }

    #[test]
    fn non_object_events_are_dropped() -> TestResult {
        let record: DatasetRecord = serde_json::from_str(
            r#"{"datasetId": 5,
                "citations": [
                    "2021-01-01",
                    {"date": "2021-02-01", "weight": 1.0},
                    [1, 2]
                ],
                "mentions": {"date": "2021-03-01", "weight": 1.0}}"#,
        )?;

        let mut diagnostics = Diagnostics::default();
        let input = record.to_input(&mut diagnostics);

        assert_eq!(
            input.citations,
            vec![CitationEvent { date: ymd(2021, 2, 1), weight: 1.0 }]
        );
        assert!(input.mentions.is_empty());
        assert_eq!(record.citation_count(), 3);
        assert_eq!(diagnostics.invalid_events, 3);
        assert_eq!(diagnostics.rejected(), 3);
        Ok(())
    }

    #[test]
    fn add_diagnostics() {
        let mut total = Diagnostics {
            records: 2,
            invalid_dates: 1,
            ..Default::default()
        };
        total += Diagnostics {
            records: 3,
            skipped_records: 1,
            invalid_dates: 2,
            ..Default::default()
        };

        assert_eq!(total.records, 5);
        assert_eq!(total.skipped_records, 1);
        assert_eq!(total.invalid_dates, 3);
    }
}
