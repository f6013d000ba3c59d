//! Rule-based record validation
//!
//! A record type declares an ordered [`RuleSet`]; [`validate`] runs its
//! `before_validate` hook and then every rule scoped to the current
//! [`Scenario`], collecting all failures into [`FieldErrors`].

pub mod rules;
pub mod validators;

pub use rules::*;
pub use validators::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Lifecycle scenario a validation pass runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    Insert,
    Update,
    Search,
    Register,
}

impl Scenario {
    /// Whether a rule scoped to `scope` applies in this scenario.
    /// Registration is an insert, so insert-scoped rules fire for it too.
    pub fn matches(self, scope: Scenario) -> bool {
        self == scope || (self == Scenario::Register && scope == Scenario::Insert)
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scenario::Insert => write!(f, "insert"),
            Scenario::Update => write!(f, "update"),
            Scenario::Search => write!(f, "search"),
            Scenario::Register => write!(f, "register"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationContext {
    pub scenario: Scenario,
    /// Identity of the authenticated caller, when there is one.
    pub actor_id: Option<i64>,
    pub now: DateTime<Utc>,
}

impl ValidationContext {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            actor_id: None,
            now: Utc::now(),
        }
    }

    pub fn with_actor(mut self, actor_id: Option<i64>) -> Self {
        self.actor_id = actor_id;
        self
    }

    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    MissingField,
    TooLong,
    InvalidFormat,
    InvalidEnum,
    DuplicateValue,
    Mismatch,
    UnsupportedType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub kind: ErrorKind,
    pub message: String,
}

impl FieldError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Errors collected during one validation pass, keyed by attribute name.
/// Each attribute's list keeps the order in which its rules were declared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors {
    errors: BTreeMap<String, Vec<FieldError>>,
}

impl FieldErrors {
    pub fn add(&mut self, attribute: &str, error: FieldError) {
        self.errors
            .entry(attribute.to_string())
            .or_insert_with(Vec::new)
            .push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn get(&self, attribute: &str) -> Option<&[FieldError]> {
        self.errors.get(attribute).map(Vec::as_slice)
    }

    pub fn kinds(&self, attribute: &str) -> Vec<ErrorKind> {
        self.get(attribute)
            .map(|errors| errors.iter().map(|e| e.kind).collect())
            .unwrap_or_default()
    }

    pub fn has_kind(&self, attribute: &str, kind: ErrorKind) -> bool {
        self.get(attribute)
            .map_or(false, |errors| errors.iter().any(|e| e.kind == kind))
    }

    /// Attributes that failed with the given kind, in name order.
    pub fn attributes_with(&self, kind: ErrorKind) -> Vec<&str> {
        self.errors
            .iter()
            .filter(|(_, errors)| errors.iter().any(|e| e.kind == kind))
            .map(|(attribute, _)| attribute.as_str())
            .collect()
    }

    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }

    pub fn messages(&self, attribute: &str) -> Vec<&str> {
        self.get(attribute)
            .map(|errors| errors.iter().map(|e| e.message.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn into_result(self) -> crate::Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(crate::AppError::Validation(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for errors in self.errors.values() {
            for error in errors {
                if !first {
                    write!(f, " ")?;
                }
                write!(f, "{}", error.message)?;
                first = false;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_matches_insert_scope() {
        assert!(Scenario::Register.matches(Scenario::Insert));
        assert!(Scenario::Register.matches(Scenario::Register));
        assert!(!Scenario::Insert.matches(Scenario::Register));
        assert!(!Scenario::Update.matches(Scenario::Insert));
    }

    #[test]
    fn test_field_errors_keep_rule_order() {
        let mut errors = FieldErrors::default();
        errors.add("type", FieldError::new(ErrorKind::MissingField, "File Type cannot be blank."));
        errors.add("type", FieldError::new(ErrorKind::UnsupportedType, "You can only update PDF or Word docs."));
        errors.add("name", FieldError::new(ErrorKind::TooLong, "too long"));

        assert_eq!(errors.kinds("type"), vec![ErrorKind::MissingField, ErrorKind::UnsupportedType]);
        assert_eq!(errors.attributes_with(ErrorKind::TooLong), vec!["name"]);
        assert!(errors.kinds("size").is_empty());
        assert!(errors.clone().into_result().is_err());
        assert!(FieldErrors::default().into_result().is_ok());
    }

    #[test]
    fn test_field_errors_serialize_by_attribute() {
        let mut errors = FieldErrors::default();
        errors.add("email", FieldError::new(ErrorKind::DuplicateValue, "taken"));

        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json["email"][0]["kind"], "DuplicateValue");
        assert_eq!(json["email"][0]["message"], "taken");
    }
}
