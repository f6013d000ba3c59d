use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::validation::validate_file_type;
use crate::database::format_timestamp;
use crate::search::Criteria;
use crate::validation::{
    strip_tags, Attribute, Rule, RuleSet, Scenario, TimestampField, Validatable, ValidationContext,
};

pub const NAME_MAX_LENGTH: usize = 80;

/// Metadata of an uploaded document. `size` is a byte count kept as text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct File {
    pub id: Option<i64>,
    /// Owner; filled from the acting user when left unset.
    pub user_id: Option<i64>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub file_type: Option<String>,
    pub size: Option<String>,
    pub description: Option<String>,
    pub date_entered: Option<DateTime<Utc>>,
    pub date_updated: Option<DateTime<Utc>>,
}

impl File {
    pub fn new(name: impl Into<String>, file_type: impl Into<String>, size: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            file_type: Some(file_type.into()),
            size: Some(size.into()),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_owner(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Takes every stored column this record leaves unset from `stored`.
    pub fn fill_unset_from(&mut self, stored: File) {
        self.user_id = self.user_id.or(stored.user_id);
        self.name = self.name.take().or(stored.name);
        self.file_type = self.file_type.take().or(stored.file_type);
        self.size = self.size.take().or(stored.size);
        self.description = self.description.take().or(stored.description);
        self.date_entered = self.date_entered.or(stored.date_entered);
        self.date_updated = self.date_updated.or(stored.date_updated);
    }

    pub fn search_criteria(&self) -> Criteria {
        Criteria::new()
            .compare_id("id", self.id)
            .compare_id("user_id", self.user_id)
            .compare("name", self.name.as_deref())
            .compare("type", self.file_type.as_deref())
            .compare("size", self.size.as_deref())
            .compare("description", self.description.as_deref())
            .compare_exact("date_entered", self.date_entered.map(|t| format_timestamp(&t)).as_deref())
            .compare_exact("date_updated", self.date_updated.map(|t| format_timestamp(&t)).as_deref())
    }
}

fn name() -> Attribute<File> {
    Attribute::new("name", |f| f.name.as_deref(), |f, v| f.name = v)
}

fn file_type() -> Attribute<File> {
    Attribute::new("type", |f| f.file_type.as_deref(), |f, v| f.file_type = v)
}

fn size() -> Attribute<File> {
    Attribute::new("size", |f| f.size.as_deref(), |f, v| f.size = v)
}

fn description() -> Attribute<File> {
    Attribute::new("description", |f| f.description.as_deref(), |f, v| f.description = v)
}

fn date_entered() -> TimestampField<File> {
    TimestampField {
        name: "date_entered",
        get: |f| f.date_entered,
        set: |f, t| f.date_entered = Some(t),
    }
}

fn date_updated() -> TimestampField<File> {
    TimestampField {
        name: "date_updated",
        get: |f| f.date_updated,
        set: |f, t| f.date_updated = Some(t),
    }
}

impl Validatable for File {
    const TABLE: &'static str = "file";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn rules() -> RuleSet<Self> {
        RuleSet::new(vec![
            Rule::required(vec![name(), file_type(), size()]),
            // defaulting must run before filtering
            Rule::default_value(description(), None),
            Rule::filter(description(), strip_tags),
            Rule::length(name(), NAME_MAX_LENGTH),
            Rule::custom(file_type(), validate_file_type),
            Rule::stamp_if_unset(date_entered()).on(&[Scenario::Insert]),
            Rule::stamp(date_updated()).on(&[Scenario::Update]),
        ])
    }

    fn label(attribute: &'static str) -> &'static str {
        match attribute {
            "id" => "ID",
            "user_id" => "Uploaded By",
            "name" => "File Name",
            "type" => "File Type",
            "size" => "File Size",
            "description" => "Description",
            "date_entered" => "Date Entered",
            "date_updated" => "Date Updated",
            other => other,
        }
    }

    fn before_validate(&mut self, ctx: &ValidationContext) {
        if self.user_id.is_none() {
            self.user_id = ctx.actor_id;
        }
    }
}
