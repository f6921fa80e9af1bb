/// Subscription filters: matching predicate and wire (de)serialization
use std::collections::{BTreeMap, BTreeSet};

use chrono::{TimeDelta, Utc};
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::warn;

use crate::domain::event::SignedEvent;
use crate::domain::validation::{EventId, MAX_TAG_ELEMENTS, PublicKey};

/// Filter validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// Filter is not a JSON object
    #[error("filter must be an object")]
    NotAnObject,
    /// ID value is not 64 lowercase hex characters
    #[error("invalid id format: {0}")]
    InvalidIdFormat(String),
    /// Author value is not 64 lowercase hex characters
    #[error("invalid author format: {0}")]
    InvalidAuthorFormat(String),
    /// A list-valued field is not an array of the expected element type
    #[error("{0} must be an array of strings")]
    NotAStringArray(String),
    /// A kind is not an integer in 0..=65535
    #[error("invalid kind: {0}")]
    InvalidKind(String),
    /// Tag letter is not a single ASCII letter
    #[error("invalid tag letter: {0}")]
    InvalidTagLetter(char),
    /// Too many values for a single tag constraint
    #[error("too many #{tag} values: {count} > {max}")]
    TooManyTagValues { tag: char, count: usize, max: usize },
    /// since/until/limit is not a non-negative integer
    #[error("{0} must be a non-negative integer")]
    InvalidInteger(String),
}

/// A NIP-01 filter
///
/// All populated fields must hold for a match (AND); an empty set or `None`
/// places no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub ids: BTreeSet<String>,
    pub authors: BTreeSet<String>,
    pub kinds: BTreeSet<u16>,
    pub tags: BTreeMap<char, BTreeSet<String>>,
    pub since: Option<u64>,
    pub until: Option<u64>,
    pub limit: Option<u64>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add event ids (64 lowercase hex)
    pub fn ids<I, S>(mut self, ids: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for id in ids {
            let id = id.as_ref();
            EventId::from_hex(id).map_err(|_| FilterError::InvalidIdFormat(id.to_string()))?;
            self.ids.insert(id.to_string());
        }
        Ok(self)
    }

    /// Add author pubkeys (64 lowercase hex)
    pub fn authors<I, S>(mut self, authors: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for author in authors {
            let author = author.as_ref();
            PublicKey::from_hex(author)
                .map_err(|_| FilterError::InvalidAuthorFormat(author.to_string()))?;
            self.authors.insert(author.to_string());
        }
        Ok(self)
    }

    pub fn id(mut self, id: &EventId) -> Self {
        self.ids.insert(id.to_hex());
        self
    }

    pub fn author(mut self, pubkey: &PublicKey) -> Self {
        self.authors.insert(pubkey.to_hex());
        self
    }

    pub fn kinds(mut self, kinds: impl IntoIterator<Item = u16>) -> Self {
        self.kinds.extend(kinds);
        self
    }

    pub fn kind(self, kind: u16) -> Self {
        self.kinds([kind])
    }

    /// Add allowed values for the tag named `letter`
    pub fn tag<I, S>(mut self, letter: char, values: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if !letter.is_ascii_alphabetic() {
            return Err(FilterError::InvalidTagLetter(letter));
        }
        let allowed = self.tags.entry(letter).or_default();
        allowed.extend(values.into_iter().map(Into::into));
        if allowed.len() > MAX_TAG_ELEMENTS {
            return Err(FilterError::TooManyTagValues {
                tag: letter,
                count: allowed.len(),
                max: MAX_TAG_ELEMENTS,
            });
        }
        Ok(self)
    }

    pub fn since(mut self, timestamp: u64) -> Self {
        self.since = Some(timestamp);
        self
    }

    pub fn until(mut self, timestamp: u64) -> Self {
        self.until = Some(timestamp);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Lower bound relative to now, e.g. `since_ago(TimeDelta::hours(1))`
    pub fn since_ago(self, delta: TimeDelta) -> Self {
        self.since(seconds_ago(delta))
    }

    /// Upper bound relative to now
    pub fn until_ago(self, delta: TimeDelta) -> Self {
        self.until(seconds_ago(delta))
    }

    /// Check if an event matches this filter
    ///
    /// Tag constraints only inspect the first tag whose name is the letter;
    /// its second element must be one of the allowed values.
    pub fn matches(&self, event: &SignedEvent) -> bool {
        if !self.ids.is_empty() && !self.ids.contains(&event.id().to_hex()) {
            return false;
        }
        if !self.authors.is_empty() && !self.authors.contains(&event.pubkey().to_hex()) {
            return false;
        }
        if !self.kinds.is_empty() && !self.kinds.contains(&event.kind()) {
            return false;
        }
        if self.since.is_some_and(|since| event.created_at() < since) {
            return false;
        }
        if self.until.is_some_and(|until| event.created_at() > until) {
            return false;
        }
        self.tags
            .iter()
            .all(|(letter, allowed)| first_tag_matches(event, *letter, allowed))
    }

    /// Check if an event matches any of the filters (OR)
    pub fn matches_any(event: &SignedEvent, filters: &[Filter]) -> bool {
        filters.iter().any(|filter| filter.matches(event))
    }

    /// Parse a wire filter object
    ///
    /// Unknown keys are logged and ignored. An empty `#<letter>` list places
    /// no constraint.
    pub fn from_value(value: &Value) -> Result<Self, FilterError> {
        let obj = value.as_object().ok_or(FilterError::NotAnObject)?;
        let mut filter = Filter::new();

        for (key, value) in obj {
            match key.as_str() {
                "ids" => filter = filter.ids(string_array(key, value)?)?,
                "authors" => filter = filter.authors(string_array(key, value)?)?,
                "kinds" => filter = filter.kinds(kind_array(value)?),
                "since" => filter.since = optional_integer(key, value)?,
                "until" => filter.until = optional_integer(key, value)?,
                "limit" => filter.limit = optional_integer(key, value)?,
                _ => match tag_letter(key) {
                    Some(letter) => {
                        let values = string_array(key, value)?;
                        if !values.is_empty() {
                            filter = filter.tag(letter, values)?;
                        }
                    }
                    None => warn!(key = %key, "Ignoring unknown filter key"),
                },
            }
        }

        Ok(filter)
    }

    /// Wire filter object with only populated fields
    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        if !self.ids.is_empty() {
            obj.insert("ids".to_string(), json!(self.ids));
        }
        if !self.authors.is_empty() {
            obj.insert("authors".to_string(), json!(self.authors));
        }
        if !self.kinds.is_empty() {
            obj.insert("kinds".to_string(), json!(self.kinds));
        }
        for (letter, values) in &self.tags {
            if !values.is_empty() {
                obj.insert(format!("#{}", letter), json!(values));
            }
        }
        if let Some(since) = self.since {
            obj.insert("since".to_string(), json!(since));
        }
        if let Some(until) = self.until {
            obj.insert("until".to_string(), json!(until));
        }
        if let Some(limit) = self.limit {
            obj.insert("limit".to_string(), json!(limit));
        }
        Value::Object(obj)
    }
}

fn first_tag_matches(event: &SignedEvent, letter: char, allowed: &BTreeSet<String>) -> bool {
    let mut buf = [0u8; 4];
    let name: &str = letter.encode_utf8(&mut buf);
    event
        .first_tag(name)
        .and_then(|tag| tag.get(1))
        .is_some_and(|value| allowed.contains(value))
}

fn seconds_ago(delta: TimeDelta) -> u64 {
    Utc::now()
        .checked_sub_signed(delta)
        .and_then(|time| u64::try_from(time.timestamp()).ok())
        .unwrap_or_default()
}

/// `#x` -> `Some('x')` for a single ASCII letter
fn tag_letter(key: &str) -> Option<char> {
    let mut chars = key.strip_prefix('#')?.chars();
    let letter = chars.next()?;
    (chars.next().is_none() && letter.is_ascii_alphabetic()).then_some(letter)
}

fn string_array<'a>(key: &str, value: &'a Value) -> Result<Vec<&'a str>, FilterError> {
    value
        .as_array()
        .ok_or_else(|| FilterError::NotAStringArray(key.to_string()))?
        .iter()
        .map(|v| {
            v.as_str()
                .ok_or_else(|| FilterError::NotAStringArray(key.to_string()))
        })
        .collect()
}

fn kind_array(value: &Value) -> Result<Vec<u16>, FilterError> {
    value
        .as_array()
        .ok_or_else(|| FilterError::InvalidKind(value.to_string()))?
        .iter()
        .map(|v| {
            v.as_u64()
                .and_then(|kind| u16::try_from(kind).ok())
                .ok_or_else(|| FilterError::InvalidKind(v.to_string()))
        })
        .collect()
}

fn optional_integer(key: &str, value: &Value) -> Result<Option<u64>, FilterError> {
    if value.is_null() {
        return Ok(None);
    }
    value
        .as_u64()
        .map(Some)
        .ok_or_else(|| FilterError::InvalidInteger(key.to_string()))
}
