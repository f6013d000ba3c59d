//! Rule runner shared by every record type

use async_trait::async_trait;
use tracing::debug;

use super::{rules::*, ErrorKind, FieldError, FieldErrors, ValidationContext};
use crate::error::Result;

/// Store access needed by `unique` rules.
#[async_trait]
pub trait UniqueLookup: Send + Sync {
    /// Whether a row other than `exclude_id` already holds `value` in `column`.
    async fn value_taken(
        &self,
        table: &str,
        column: &str,
        value: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool>;
}

/// A record that can be checked by a [`RuleSet`].
pub trait Validatable: Sized + Send + Sync {
    /// Table holding the record, used by uniqueness lookups.
    const TABLE: &'static str;

    fn id(&self) -> Option<i64>;

    fn rules() -> RuleSet<Self>;

    /// Human-readable label used in error messages.
    fn label(attribute: &'static str) -> &'static str {
        attribute
    }

    /// Runs before any rule. Side effects here stick to the record.
    fn before_validate(&mut self, _ctx: &ValidationContext) {}
}

pub struct RuleSet<R> {
    rules: Vec<Rule<R>>,
}

impl<R: Validatable> RuleSet<R> {
    pub fn new(rules: Vec<Rule<R>>) -> Self {
        Self { rules }
    }

    /// Runs every rule scoped to `ctx.scenario`, in declaration order.
    /// A failing rule never stops later ones.
    pub async fn run(
        &self,
        record: &mut R,
        ctx: &ValidationContext,
        lookup: &dyn UniqueLookup,
    ) -> Result<()> {
        let mut errors = FieldErrors::default();

        for rule in self.rules.iter().filter(|rule| rule.applies_to(ctx.scenario)) {
            match &rule.kind {
                RuleKind::Required(attributes) => {
                    for attribute in attributes {
                        if is_blank((attribute.get)(record)) {
                            errors.add(attribute.name, FieldError::new(
                                ErrorKind::MissingField,
                                format!("{} cannot be blank.", R::label(attribute.name)),
                            ));
                        }
                    }
                }
                RuleKind::Unique(attributes) => {
                    for attribute in attributes {
                        let value = match (attribute.get)(record) {
                            Some(value) if !value.is_empty() => value.to_string(),
                            _ => continue,
                        };
                        let exclude_id = record.id();
                        if lookup.value_taken(R::TABLE, attribute.name, &value, exclude_id).await? {
                            errors.add(attribute.name, FieldError::new(
                                ErrorKind::DuplicateValue,
                                format!("{} \"{}\" has already been taken.", R::label(attribute.name), value),
                            ));
                        }
                    }
                }
                RuleKind::Length { attribute, max } => {
                    if let Some(value) = (attribute.get)(record) {
                        if exceeds_length(value, *max) {
                            errors.add(attribute.name, FieldError::new(
                                ErrorKind::TooLong,
                                format!("{} is too long (maximum is {} characters).", R::label(attribute.name), max),
                            ));
                        }
                    }
                }
                RuleKind::Email(attribute) => {
                    let value = (attribute.get)(record);
                    if !is_empty(value) && !value.map_or(false, is_valid_email) {
                        errors.add(attribute.name, FieldError::new(
                            ErrorKind::InvalidFormat,
                            format!("{} is not a valid email address.", R::label(attribute.name)),
                        ));
                    }
                }
                RuleKind::Match { attribute, pattern } => {
                    let value = (attribute.get)(record);
                    if !is_empty(value) && !value.map_or(false, |v| pattern.is_match(v)) {
                        errors.add(attribute.name, FieldError::new(
                            ErrorKind::InvalidFormat,
                            format!("{} is invalid.", R::label(attribute.name)),
                        ));
                    }
                }
                RuleKind::Compare { attribute, with } => {
                    let value = (attribute.get)(record).unwrap_or("");
                    let other = (with.get)(record).unwrap_or("");
                    if value != other {
                        errors.add(attribute.name, FieldError::new(
                            ErrorKind::Mismatch,
                            format!("{} must be repeated exactly.", R::label(attribute.name)),
                        ));
                    }
                }
                RuleKind::In { attribute, range } => {
                    let value = (attribute.get)(record);
                    if !is_empty(value) && !value.map_or(false, |v| range.iter().any(|allowed| *allowed == v)) {
                        errors.add(attribute.name, FieldError::new(
                            ErrorKind::InvalidEnum,
                            format!("{} is not in the list.", R::label(attribute.name)),
                        ));
                    }
                }
                RuleKind::Default { attribute, value } => {
                    if is_empty((attribute.get)(record)) {
                        (attribute.set)(record, value.map(str::to_string));
                    }
                }
                RuleKind::Filter { attribute, filter } => {
                    let filtered = (attribute.get)(record).map(|value| filter(value));
                    if filtered.is_some() {
                        (attribute.set)(record, filtered);
                    }
                }
                RuleKind::Custom { attribute, check } => {
                    if let Some(error) = check(&*record) {
                        errors.add(attribute.name, error);
                    }
                }
                RuleKind::Timestamp { field, overwrite } => {
                    if *overwrite || (field.get)(record).is_none() {
                        (field.set)(record, ctx.now);
                    }
                }
            }
        }

        if !errors.is_empty() {
            debug!(
                table = R::TABLE,
                scenario = %ctx.scenario,
                fields = ?errors.attributes().collect::<Vec<_>>(),
                "Record failed validation"
            );
        }

        errors.into_result()
    }
}

/// Validates `record` for `ctx.scenario`, applying defaults and filters in place.
pub async fn validate<R: Validatable>(
    record: &mut R,
    ctx: &ValidationContext,
    lookup: &dyn UniqueLookup,
) -> Result<()> {
    record.before_validate(ctx);
    let rules = R::rules();
    rules.run(record, ctx, lookup).await
}
