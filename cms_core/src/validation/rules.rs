//! Validation rules and the predicates behind them

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;

use super::{FieldError, Scenario};

lazy_static! {
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-zA-Z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?\.)+[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?$"
    ).unwrap();

    static ref TAG_REGEX: Regex = Regex::new(
        r"(?s)<!--.*?(?:-->|$)|<[a-zA-Z/!?][^>]*(?:>|$)"
    ).unwrap();
}

/// Typed accessor pair for one text attribute of a record.
pub struct Attribute<R> {
    pub name: &'static str,
    pub get: fn(&R) -> Option<&str>,
    pub set: fn(&mut R, Option<String>),
}

impl<R> Clone for Attribute<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for Attribute<R> {}

impl<R> Attribute<R> {
    pub fn new(
        name: &'static str,
        get: fn(&R) -> Option<&str>,
        set: fn(&mut R, Option<String>),
    ) -> Self {
        Self { name, get, set }
    }
}

/// Typed accessor pair for a server-assigned timestamp.
pub struct TimestampField<R> {
    pub name: &'static str,
    pub get: fn(&R) -> Option<DateTime<Utc>>,
    pub set: fn(&mut R, DateTime<Utc>),
}

impl<R> Clone for TimestampField<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for TimestampField<R> {}

pub enum RuleKind<R> {
    Required(Vec<Attribute<R>>),
    /// Checked against the store, excluding the record's own row.
    Unique(Vec<Attribute<R>>),
    Length { attribute: Attribute<R>, max: usize },
    Email(Attribute<R>),
    Match { attribute: Attribute<R>, pattern: &'static Regex },
    Compare { attribute: Attribute<R>, with: Attribute<R> },
    In { attribute: Attribute<R>, range: &'static [&'static str] },
    Default { attribute: Attribute<R>, value: Option<&'static str> },
    Filter { attribute: Attribute<R>, filter: fn(&str) -> String },
    Custom { attribute: Attribute<R>, check: fn(&R) -> Option<FieldError> },
    Timestamp { field: TimestampField<R>, overwrite: bool },
}

pub struct Rule<R> {
    pub kind: RuleKind<R>,
    /// Scenarios the rule is limited to; empty means all of them.
    pub on: &'static [Scenario],
}

impl<R> Rule<R> {
    pub fn new(kind: RuleKind<R>) -> Self {
        Self { kind, on: &[] }
    }

    pub fn on(mut self, scenarios: &'static [Scenario]) -> Self {
        self.on = scenarios;
        self
    }

    pub fn applies_to(&self, scenario: Scenario) -> bool {
        self.on.is_empty() || self.on.iter().any(|scope| scenario.matches(*scope))
    }

    pub fn required(attributes: Vec<Attribute<R>>) -> Self {
        Self::new(RuleKind::Required(attributes))
    }

    pub fn unique(attributes: Vec<Attribute<R>>) -> Self {
        Self::new(RuleKind::Unique(attributes))
    }

    pub fn length(attribute: Attribute<R>, max: usize) -> Self {
        Self::new(RuleKind::Length { attribute, max })
    }

    pub fn email(attribute: Attribute<R>) -> Self {
        Self::new(RuleKind::Email(attribute))
    }

    pub fn pattern(attribute: Attribute<R>, pattern: &'static Regex) -> Self {
        Self::new(RuleKind::Match { attribute, pattern })
    }

    pub fn compare(attribute: Attribute<R>, with: Attribute<R>) -> Self {
        Self::new(RuleKind::Compare { attribute, with })
    }

    pub fn in_range(attribute: Attribute<R>, range: &'static [&'static str]) -> Self {
        Self::new(RuleKind::In { attribute, range })
    }

    pub fn default_value(attribute: Attribute<R>, value: Option<&'static str>) -> Self {
        Self::new(RuleKind::Default { attribute, value })
    }

    pub fn filter(attribute: Attribute<R>, filter: fn(&str) -> String) -> Self {
        Self::new(RuleKind::Filter { attribute, filter })
    }

    pub fn custom(attribute: Attribute<R>, check: fn(&R) -> Option<FieldError>) -> Self {
        Self::new(RuleKind::Custom { attribute, check })
    }

    /// Fills the timestamp with the pass's clock reading when it is unset.
    pub fn stamp_if_unset(field: TimestampField<R>) -> Self {
        Self::new(RuleKind::Timestamp { field, overwrite: false })
    }

    pub fn stamp(field: TimestampField<R>) -> Self {
        Self::new(RuleKind::Timestamp { field, overwrite: true })
    }
}

/// Blank as far as "required" is concerned: absent, empty or only whitespace.
pub fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

/// Empty as far as defaulting and format checks are concerned.
pub fn is_empty(value: Option<&str>) -> bool {
    value.map_or(true, str::is_empty)
}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_REGEX.is_match(value)
}

pub fn exceeds_length(value: &str, max: usize) -> bool {
    value.chars().count() > max
}

/// Removes markup tags and comments, keeping the text between them.
pub fn strip_tags(value: &str) -> String {
    TAG_REGEX.replace_all(value, "").into_owned()
}
