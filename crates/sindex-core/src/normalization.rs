//! Topic/year normalization factors.
//!
//! The normalization table holds, per `(topic, year)`, the medians of
//! the FAIR score (FT), the weighted citation sum (CTw) and the
//! weighted mention sum (MTw). The table is assembled with a
//! [NormalizationTableBuilder] and frozen by [build]; a frozen table
//! is read-only and can be shared between threads without locking.
//!
//! [build]: NormalizationTableBuilder::build

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use hashbrown::HashMap;
use serde::{Serialize, Serializer};

use crate::error::{bail, CoreError, CoreResult};
use crate::topic::{TopicId, ALL};

/// Sentinel year of year-agnostic rows and of requests without a
/// publication year.
pub const UNKNOWN_YEAR: i32 = -1;

pub const FT_DEFAULT: f64 = 0.5;
pub const CTW_DEFAULT: f64 = 1.0;
pub const MTW_DEFAULT: f64 = 1.0;

/// Factors are stored with a precision of six decimal places.
#[inline]
fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

/// A strictly positive, finite normalization factor.
///
/// Every denominator of the d-index formula is a `Factor`, so a
/// division by zero can't be expressed.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Factor(f64);

impl Factor {
    pub const FT_DEFAULT: Factor = Factor(FT_DEFAULT);
    pub const CTW_DEFAULT: Factor = Factor(CTW_DEFAULT);
    pub const MTW_DEFAULT: Factor = Factor(MTW_DEFAULT);

    /// Creates a new factor, rounded to six decimal places. Returns
    /// `None` if the (rounded) value isn't strictly positive.
    pub fn new(value: f64) -> Option<Self> {
        let value = round6(value);
        if value.is_finite() && value > 0.0 {
            Some(Self(value))
        } else {
            None
        }
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Factor {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Row {
    ft: Factor,
    ctw: Factor,
    mtw: Factor,
}

/// The outcome of a normalization lookup, including the provenance of
/// the factors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizationFactors {
    #[serde(rename = "FT")]
    ft: Factor,
    #[serde(rename = "CTw")]
    ctw: Factor,
    #[serde(rename = "MTw")]
    mtw: Factor,
    topic_id_used: String,
    year_used: Option<i32>,
    topic_id_requested: Option<String>,
    year_requested: Option<i32>,
    used_year_clamp: bool,
}

impl NormalizationFactors {
    /// The documented defaults (FT = 0.5, CTw = 1.0, MTw = 1.0), used
    /// when the table has no matching row.
    pub fn defaults(topic: Option<&TopicId>, year: Option<i32>) -> Self {
        Self {
            ft: Factor::FT_DEFAULT,
            ctw: Factor::CTW_DEFAULT,
            mtw: Factor::MTW_DEFAULT,
            topic_id_used: ALL.into(),
            year_used: year,
            topic_id_requested: topic.map(TopicId::canonical),
            year_requested: year,
            used_year_clamp: false,
        }
    }

    #[inline]
    pub fn ft(&self) -> Factor {
        self.ft
    }

    #[inline]
    pub fn ctw(&self) -> Factor {
        self.ctw
    }

    #[inline]
    pub fn mtw(&self) -> Factor {
        self.mtw
    }

    #[inline]
    pub fn topic_id_used(&self) -> &str {
        &self.topic_id_used
    }

    #[inline]
    pub fn year_used(&self) -> Option<i32> {
        self.year_used
    }

    #[inline]
    pub fn topic_id_requested(&self) -> Option<&str> {
        self.topic_id_requested.as_deref()
    }

    #[inline]
    pub fn year_requested(&self) -> Option<i32> {
        self.year_requested
    }

    #[inline]
    pub fn used_year_clamp(&self) -> bool {
        self.used_year_clamp
    }
}

impl Default for NormalizationFactors {
    fn default() -> Self {
        Self::defaults(None, None)
    }
}

/// Collects the rows of a [NormalizationTable].
#[derive(Debug, Default)]
pub struct NormalizationTableBuilder {
    rows: HashMap<String, BTreeMap<i32, Row>>,
}

impl NormalizationTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a row to the table. A row for an existing `(topic, year)`
    /// pair replaces the previous one.
    ///
    /// Fails if the topic id is malformed or if any factor isn't
    /// strictly positive; the table is left unchanged in that case.
    pub fn insert(
        &mut self,
        topic_id: &str,
        year: i32,
        ft: f64,
        ctw: f64,
        mtw: f64,
    ) -> CoreResult<()> {
        let Some(topic) = TopicId::parse(topic_id) else {
            bail!("invalid topic id '{topic_id}' (year = {year})");
        };

        let factor = |name: &'static str, value: f64| {
            Factor::new(value).ok_or_else(|| CoreError::InvalidFactor {
                name,
                value,
                topic: topic.to_string(),
                year,
            })
        };

        let row = Row {
            ft: factor("FT", ft)?,
            ctw: factor("CTw", ctw)?,
            mtw: factor("MTw", mtw)?,
        };

        self.rows
            .entry(topic.as_str().to_string())
            .or_default()
            .insert(year, row);

        Ok(())
    }

    /// Returns the number of rows collected so far.
    pub fn len(&self) -> usize {
        self.rows.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Freezes the table.
    pub fn build(self) -> NormalizationTable {
        NormalizationTable { rows: self.rows }
    }
}

/// An immutable `(topic, year) → (FT, CTw, MTw)` lookup table.
#[derive(Debug, Default)]
pub struct NormalizationTable {
    rows: HashMap<String, BTreeMap<i32, Row>>,
}

impl NormalizationTable {
    /// Returns an empty table; every lookup resolves to the defaults.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[inline]
    fn row(&self, topic: &str, year: i32) -> Option<&Row> {
        self.rows.get(topic).and_then(|years| years.get(&year))
    }

    /// Returns the range of concrete years (`>= 0`) available for the
    /// given topic id, exactly as stored.
    pub fn year_range(&self, topic: &str) -> Option<(i32, i32)> {
        let years = self.rows.get(topic)?;
        let mut iter = years.range(0..).map(|(year, _)| *year);
        let min = iter.next()?;
        let max = iter.next_back().unwrap_or(min);
        Some((min, max))
    }

    /// Clamps a year into the union of the year ranges of the given
    /// topic and the fallback topic `ALL`.
    fn clamp_year(
        &self,
        topic: Option<&TopicId>,
        year: i32,
    ) -> (i32, bool) {
        let ranges = [Some(ALL), topic.map(TopicId::as_str)]
            .into_iter()
            .flatten()
            .filter_map(|topic| self.year_range(topic));

        let Some((min, max)) = ranges.reduce(|(lo1, hi1), (lo2, hi2)| {
            (lo1.min(lo2), hi1.max(hi2))
        }) else {
            return (year, false);
        };

        if year < min {
            (min, true)
        } else if year > max {
            (max, true)
        } else {
            (year, false)
        }
    }

    /// Looks up the normalization factors for a topic and year.
    ///
    /// The first matching row wins, in this order: the topic as
    /// given, its URL form, its short form, `ALL`; all at the
    /// (clamped) year. If a concrete year was requested, the same
    /// chain is tried again for the year-agnostic rows. Returns `None`
    /// if nothing matched.
    pub fn lookup(
        &self,
        topic: Option<&TopicId>,
        year: Option<i32>,
    ) -> Option<NormalizationFactors> {
        let (year_used, used_year_clamp) = match year {
            Some(year) => self.clamp_year(topic, year),
            None => (UNKNOWN_YEAR, false),
        };

        let mut candidates: Vec<String> = Vec::with_capacity(4);
        if let Some(topic) = topic {
            candidates.push(topic.as_str().to_string());
            if let Some(full) = topic.full_form() {
                candidates.push(full);
            }
            if let Some(short) = topic.short_form() {
                candidates.push(short.to_string());
            }
        }
        candidates.push(ALL.to_string());

        let mut years = vec![year_used];
        if year.is_some() {
            years.push(UNKNOWN_YEAR);
        }

        years.into_iter().find_map(|y| {
            candidates.iter().find_map(|candidate| {
                self.row(candidate, y).map(|row| NormalizationFactors {
                    ft: row.ft,
                    ctw: row.ctw,
                    mtw: row.mtw,
                    topic_id_used: candidate.clone(),
                    year_used: Some(y),
                    topic_id_requested: topic.map(TopicId::canonical),
                    year_requested: year,
                    used_year_clamp,
                })
            })
        })
    }

    /// Like [lookup](Self::lookup), but substitutes the documented
    /// defaults if no row matched.
    pub fn resolve(
        &self,
        topic: Option<&TopicId>,
        year: Option<i32>,
    ) -> NormalizationFactors {
        self.lookup(topic, year)
            .unwrap_or_else(|| NormalizationFactors::defaults(topic, year))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    type TestResult = anyhow::Result<()>;

    fn topic(s: &str) -> TopicId {
        TopicId::parse(s).unwrap()
    }

    fn table() -> anyhow::Result<NormalizationTable> {
        let mut builder = NormalizationTableBuilder::new();
        builder.insert("https://openalex.org/T100", 2019, 0.6, 2.0, 3.0)?;
        builder.insert("https://openalex.org/T100", 2020, 0.7, 2.5, 3.5)?;
        builder.insert("T200", 2020, 0.4, 1.5, 1.5)?;
        builder.insert("T300", UNKNOWN_YEAR, 0.3, 0.9, 0.8)?;
        builder.insert("ALL", 2015, 0.55, 1.1, 1.2)?;
        builder.insert("ALL", 2022, 0.65, 1.3, 1.4)?;
        builder.insert("ALL", UNKNOWN_YEAR, 0.5, 1.0, 1.0)?;
        Ok(builder.build())
    }

    #[test]
    fn factor_rejects_non_positive() {
        assert!(Factor::new(0.0).is_none());
        assert!(Factor::new(-1.0).is_none());
        assert!(Factor::new(f64::NAN).is_none());
        assert!(Factor::new(f64::INFINITY).is_none());
        assert!(Factor::new(0.000_000_1).is_none());
        assert_relative_eq!(Factor::new(0.123_456_789).unwrap().get(), 0.123457);
    }

    #[test]
    fn builder_rejects_invalid_rows() -> TestResult {
        let mut builder = NormalizationTableBuilder::new();
        let err = builder.insert("T1", 2020, 0.5, 0.0, 1.0).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidFactor { name: "CTw", year: 2020, .. }
        ));
        assert!(builder.insert("  ", 2020, 0.5, 1.0, 1.0).is_err());
        assert!(builder.is_empty());

        builder.insert("T1", 2020, 0.5, 1.0, 1.0)?;
        builder.insert("T1", 2020, 0.6, 1.0, 1.0)?;
        assert_eq!(builder.len(), 1);

        let table = builder.build();
        let nf = table.resolve(Some(&topic("T1")), Some(2020));
        assert_relative_eq!(nf.ft().get(), 0.6);
        Ok(())
    }

    #[test]
    fn exact_match() -> TestResult {
        let table = table()?;
        let nf = table
            .lookup(Some(&topic("https://openalex.org/T100")), Some(2020))
            .unwrap();

        assert_relative_eq!(nf.ft().get(), 0.7);
        assert_relative_eq!(nf.ctw().get(), 2.5);
        assert_relative_eq!(nf.mtw().get(), 3.5);
        assert_eq!(nf.topic_id_used(), "https://openalex.org/T100");
        assert_eq!(nf.year_used(), Some(2020));
        assert_eq!(
            nf.topic_id_requested(),
            Some("https://openalex.org/T100")
        );
        assert_eq!(nf.year_requested(), Some(2020));
        assert!(!nf.used_year_clamp());
        Ok(())
    }

    #[test]
    fn short_request_matches_url_row() -> TestResult {
        let table = table()?;
        let nf = table.lookup(Some(&topic("T100")), Some(2019)).unwrap();

        assert_eq!(nf.topic_id_used(), "https://openalex.org/T100");
        assert_relative_eq!(nf.ft().get(), 0.6);
        assert_eq!(
            nf.topic_id_requested(),
            Some("https://openalex.org/T100")
        );
        Ok(())
    }

    #[test]
    fn url_request_matches_short_row() -> TestResult {
        let table = table()?;
        let nf = table
            .lookup(Some(&topic("https://openalex.org/T200")), Some(2020))
            .unwrap();

        assert_eq!(nf.topic_id_used(), "T200");
        assert_relative_eq!(nf.ft().get(), 0.4);
        Ok(())
    }

    #[test]
    fn topic_as_given_wins_over_alternate_form() -> TestResult {
        let mut builder = NormalizationTableBuilder::new();
        builder.insert("T100", 2020, 0.3, 1.0, 1.0)?;
        builder.insert("https://openalex.org/T100", 2020, 0.7, 1.0, 1.0)?;
        let table = builder.build();

        let nf = table.lookup(Some(&topic("T100")), Some(2020)).unwrap();
        assert_eq!(nf.topic_id_used(), "T100");
        assert_relative_eq!(nf.ft().get(), 0.3);

        let nf = table
            .lookup(Some(&topic("https://openalex.org/T100")), Some(2020))
            .unwrap();
        assert_eq!(nf.topic_id_used(), "https://openalex.org/T100");
        assert_relative_eq!(nf.ft().get(), 0.7);
        Ok(())
    }

    #[test]
    fn falls_back_to_all() -> TestResult {
        let table = table()?;
        let nf = table.lookup(Some(&topic("T999")), Some(2015)).unwrap();

        assert_eq!(nf.topic_id_used(), "ALL");
        assert_eq!(nf.year_used(), Some(2015));
        assert_eq!(
            nf.topic_id_requested(),
            Some("https://openalex.org/T999")
        );
        assert_relative_eq!(nf.ft().get(), 0.55);
        Ok(())
    }

    #[test]
    fn clamps_to_union_of_topic_and_all() -> TestResult {
        let table = table()?;

        // T200 only covers 2020, but ALL extends the range to 2022.
        let nf = table.lookup(Some(&topic("T200")), Some(2030)).unwrap();
        assert_eq!(nf.year_used(), Some(2022));
        assert_eq!(nf.year_requested(), Some(2030));
        assert!(nf.used_year_clamp());
        assert_eq!(nf.topic_id_used(), "ALL");

        let nf = table.lookup(None, Some(1990)).unwrap();
        assert_eq!(nf.year_used(), Some(2015));
        assert!(nf.used_year_clamp());
        Ok(())
    }

    #[test]
    fn year_inside_range_without_row_uses_unknown_year() -> TestResult {
        let table = table()?;

        // 2018 is inside [2015, 2022] but neither T300 nor ALL have a
        // row for it.
        let nf = table.lookup(Some(&topic("T300")), Some(2018)).unwrap();
        assert_eq!(nf.topic_id_used(), "T300");
        assert_eq!(nf.year_used(), Some(UNKNOWN_YEAR));
        assert_eq!(nf.year_requested(), Some(2018));
        assert!(!nf.used_year_clamp());
        assert_relative_eq!(nf.ft().get(), 0.3);

        let nf = table.lookup(Some(&topic("T999")), Some(2018)).unwrap();
        assert_eq!(nf.topic_id_used(), "ALL");
        assert_eq!(nf.year_used(), Some(UNKNOWN_YEAR));
        Ok(())
    }

    #[test]
    fn unknown_year_request() -> TestResult {
        let table = table()?;
        let nf = table.lookup(Some(&topic("T300")), None).unwrap();

        assert_eq!(nf.topic_id_used(), "T300");
        assert_eq!(nf.year_used(), Some(UNKNOWN_YEAR));
        assert_eq!(nf.year_requested(), None);
        assert!(!nf.used_year_clamp());
        Ok(())
    }

    #[test]
    fn unknown_year_request_skips_concrete_rows() -> TestResult {
        let mut builder = NormalizationTableBuilder::new();
        builder.insert("T1", 2020, 0.4, 1.0, 1.0)?;
        builder.insert("ALL", 2020, 0.4, 1.0, 1.0)?;
        let table = builder.build();

        assert_eq!(table.lookup(Some(&topic("T1")), None), None);
        Ok(())
    }

    #[test]
    fn defaults_without_any_row() {
        let table = NormalizationTable::empty();
        let nf = table.resolve(None, None);

        assert_eq!(nf.topic_id_used(), "ALL");
        assert!(!nf.used_year_clamp());
        assert_eq!(nf.year_used(), None);
        assert_eq!(nf.topic_id_requested(), None);
        assert_relative_eq!(nf.ft().get(), 0.5);
        assert_relative_eq!(nf.ctw().get(), 1.0);
        assert_relative_eq!(nf.mtw().get(), 1.0);

        let nf = table.resolve(Some(&topic("T5")), Some(2021));
        assert_eq!(nf.topic_id_used(), "ALL");
        assert_eq!(nf.year_used(), Some(2021));
        assert_eq!(nf.year_requested(), Some(2021));
        assert_eq!(nf.topic_id_requested(), Some("https://openalex.org/T5"));
    }

    #[test]
    fn provenance_serialization() -> TestResult {
        let table = table()?;
        let nf = table.resolve(Some(&topic("T200")), Some(2030));
        let json = serde_json::to_string(&nf)?;

        assert_eq!(
            json,
            "{\"FT\":0.65,\"CTw\":1.3,\"MTw\":1.4,\
             \"topic_id_used\":\"ALL\",\"year_used\":2022,\
             \"topic_id_requested\":\"https://openalex.org/T200\",\
             \"year_requested\":2030,\"used_year_clamp\":true}"
        );

        let json = serde_json::to_string(&NormalizationFactors::default())?;
        assert_eq!(
            json,
            "{\"FT\":0.5,\"CTw\":1.0,\"MTw\":1.0,\
             \"topic_id_used\":\"ALL\",\"year_used\":null,\
             \"topic_id_requested\":null,\"year_requested\":null,\
             \"used_year_clamp\":false}"
        );
        Ok(())
    }

    #[test]
    fn table_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NormalizationTable>();
    }
}
