use std::fmt::{self, Display};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// The topic id of the topic-agnostic normalization rows.
pub const ALL: &str = "ALL";

/// Prefix of fully-qualified OpenAlex topic ids.
pub const OPENALEX_PREFIX: &str = "https://openalex.org/";

fn topic_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s\p{Cc}]+$").unwrap())
}

/// A well-formed subject-classification identifier.
///
/// A topic is either given in short form (`T12345`) or as
/// fully-qualified URL (`https://openalex.org/T12345`). Both forms
/// denote the same topic.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct TopicId(String);

impl TopicId {
    /// Parses a topic id. Surrounding whitespace is removed. Returns
    /// `None` for empty strings and strings with inner whitespace or
    /// control characters; those are treated as "no topic".
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if topic_re().is_match(s) {
            Some(Self(s.to_string()))
        } else {
            None
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn is_all(&self) -> bool {
        self.0 == ALL
    }

    /// Returns the short form (`T12345`) if the id is given as
    /// OpenAlex URL.
    pub fn short_form(&self) -> Option<&str> {
        self.0
            .strip_prefix(OPENALEX_PREFIX)
            .filter(|rest| !rest.is_empty())
    }

    /// Returns the URL form if the id is given in short form. The
    /// fallback topic `ALL` has no URL form.
    pub fn full_form(&self) -> Option<String> {
        if self.0.starts_with("http://")
            || self.0.starts_with("https://")
            || self.is_all()
        {
            return None;
        }

        Some(format!("{OPENALEX_PREFIX}{}", self.0))
    }

    /// Returns the canonical (URL) form used for provenance records.
    pub fn canonical(&self) -> String {
        self.full_form().unwrap_or_else(|| self.0.clone())
    }
}

impl Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
