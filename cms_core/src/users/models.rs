use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::database::format_timestamp;
use crate::search::Criteria;
use crate::validation::{Attribute, Rule, RuleSet, Scenario, TimestampField, Validatable};

lazy_static! {
    static ref PASSWORD_REGEX: Regex = Regex::new(r"(?i)^[a-z0-9_-]{6,20}$").unwrap();
}

pub const USERNAME_MAX_LENGTH: usize = 45;
pub const EMAIL_MAX_LENGTH: usize = 60;

/// A user account row. Every column is optional so the same struct serves
/// as a filter template for searches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Option<i64>,
    pub username: Option<String>,
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub pass: Option<String>,
    /// Confirmation typed during registration. Never stored.
    #[serde(skip_serializing)]
    pub pass_compare: Option<String>,
    #[serde(rename = "type")]
    pub user_type: Option<String>,
    pub date_entered: Option<DateTime<Utc>>,
    pub date_updated: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(username: impl Into<String>, email: impl Into<String>, pass: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            email: Some(email.into()),
            pass: Some(pass.into()),
            ..Default::default()
        }
    }

    pub fn with_pass_compare(mut self, pass_compare: impl Into<String>) -> Self {
        self.pass_compare = Some(pass_compare.into());
        self
    }

    pub fn with_type(mut self, user_type: UserType) -> Self {
        self.user_type = Some(user_type.to_string());
        self
    }

    /// The account type, when it holds one of the known values.
    pub fn role(&self) -> Option<UserType> {
        self.user_type.as_deref().and_then(|t| t.parse().ok())
    }

    /// Takes every stored column this record leaves unset from `stored`, so
    /// a partial change can be validated and written as a whole row.
    pub fn fill_unset_from(&mut self, stored: User) {
        self.username = self.username.take().or(stored.username);
        self.email = self.email.take().or(stored.email);
        self.pass = self.pass.take().or(stored.pass);
        self.user_type = self.user_type.take().or(stored.user_type);
        self.date_entered = self.date_entered.or(stored.date_entered);
        self.date_updated = self.date_updated.or(stored.date_updated);
    }

    /// Conditions for the columns set on this record when it is used as a
    /// search filter. The password never takes part in a search.
    pub fn search_criteria(&self) -> Criteria {
        Criteria::new()
            .compare_id("id", self.id)
            .compare("username", self.username.as_deref())
            .compare("email", self.email.as_deref())
            .compare("type", self.user_type.as_deref())
            .compare_exact("date_entered", self.date_entered.map(|t| format_timestamp(&t)).as_deref())
            .compare_exact("date_updated", self.date_updated.map(|t| format_timestamp(&t)).as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Public,
    Author,
    Admin,
}

impl UserType {
    pub const NAMES: &'static [&'static str] = &["public", "author", "admin"];
}

impl Default for UserType {
    fn default() -> Self {
        UserType::Public
    }
}

impl std::fmt::Display for UserType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserType::Public => write!(f, "public"),
            UserType::Author => write!(f, "author"),
            UserType::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for UserType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(UserType::Public),
            "author" => Ok(UserType::Author),
            "admin" => Ok(UserType::Admin),
            _ => Err(format!("Invalid user type: {}", s)),
        }
    }
}

fn username() -> Attribute<User> {
    Attribute::new("username", |u| u.username.as_deref(), |u, v| u.username = v)
}

fn email() -> Attribute<User> {
    Attribute::new("email", |u| u.email.as_deref(), |u, v| u.email = v)
}

fn pass() -> Attribute<User> {
    Attribute::new("pass", |u| u.pass.as_deref(), |u, v| u.pass = v)
}

fn pass_compare() -> Attribute<User> {
    Attribute::new("pass_compare", |u| u.pass_compare.as_deref(), |u, v| u.pass_compare = v)
}

fn user_type() -> Attribute<User> {
    Attribute::new("type", |u| u.user_type.as_deref(), |u, v| u.user_type = v)
}

fn date_entered() -> TimestampField<User> {
    TimestampField {
        name: "date_entered",
        get: |u| u.date_entered,
        set: |u, t| u.date_entered = Some(t),
    }
}

fn date_updated() -> TimestampField<User> {
    TimestampField {
        name: "date_updated",
        get: |u| u.date_updated,
        set: |u, t| u.date_updated = Some(t),
    }
}

impl Validatable for User {
    const TABLE: &'static str = "user";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn rules() -> RuleSet<Self> {
        RuleSet::new(vec![
            Rule::required(vec![username(), email(), pass()]).on(&[Scenario::Insert]),
            Rule::unique(vec![email(), username()]),
            Rule::length(username(), USERNAME_MAX_LENGTH),
            Rule::email(email()),
            Rule::length(email(), EMAIL_MAX_LENGTH),
            Rule::pattern(pass(), &PASSWORD_REGEX),
            Rule::compare(pass(), pass_compare()).on(&[Scenario::Register]),
            Rule::in_range(user_type(), UserType::NAMES),
            Rule::default_value(user_type(), Some("public")),
            Rule::stamp_if_unset(date_entered()).on(&[Scenario::Insert]),
            Rule::stamp(date_updated()).on(&[Scenario::Update]),
        ])
    }

    fn label(attribute: &'static str) -> &'static str {
        match attribute {
            "id" => "ID",
            "username" => "Username",
            "email" => "Email",
            "pass" => "Password",
            "pass_compare" => "Password Confirmation",
            "type" => "Type",
            "date_entered" => "Date Entered",
            "date_updated" => "Date Updated",
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validators::tests::MemoryLookup;
    use crate::validation::{validate, ErrorKind, ValidationContext};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 20, 9, 30, 0).unwrap()
    }

    async fn errors_for(user: &mut User, scenario: Scenario) -> Option<crate::validation::FieldErrors> {
        let ctx = ValidationContext::new(scenario).at(now());
        validate(user, &ctx, &MemoryLookup::default())
            .await
            .err()
            .and_then(|e| e.field_errors().cloned())
    }

    #[tokio::test]
    async fn test_missing_fields_on_insert() {
        let mut user = User {
            email: Some("a@example.com".to_string()),
            ..Default::default()
        };
        let errors = errors_for(&mut user, Scenario::Insert).await.unwrap();

        assert_eq!(errors.attributes_with(ErrorKind::MissingField), vec!["pass", "username"]);
        assert_eq!(errors.messages("username"), vec!["Username cannot be blank."]);
        assert_eq!(errors.kinds("pass"), vec![ErrorKind::MissingField]);
    }

    #[tokio::test]
    async fn test_required_does_not_apply_on_update() {
        let mut user = User {
            id: Some(3),
            ..Default::default()
        };
        assert!(errors_for(&mut user, Scenario::Update).await.is_none());
    }

    #[tokio::test]
    async fn test_password_pattern() {
        for bad in ["short", "has space1", "way_too_long_password_123", "bang!bang"] {
            let mut user = User::new("alice", "alice@example.com", bad);
            let errors = errors_for(&mut user, Scenario::Insert).await.unwrap();
            assert_eq!(errors.kinds("pass"), vec![ErrorKind::InvalidFormat], "{}", bad);
            assert_eq!(errors.messages("pass"), vec!["Password is invalid."]);
        }

        for good in ["secret", "MiXeD_case-123", "ABCDEFGHIJ0123456789"] {
            let mut user = User::new("alice", "alice@example.com", good);
            assert!(errors_for(&mut user, Scenario::Insert).await.is_none(), "{}", good);
        }
    }

    #[tokio::test]
    async fn test_register_compares_confirmation() {
        let mut mismatched = User::new("bob", "bob@example.com", "secret1").with_pass_compare("secret2");
        let errors = errors_for(&mut mismatched, Scenario::Register).await.unwrap();
        assert_eq!(errors.kinds("pass"), vec![ErrorKind::Mismatch]);
        assert_eq!(errors.messages("pass"), vec!["Password must be repeated exactly."]);

        let mut missing = User::new("bob", "bob@example.com", "secret1");
        let errors = errors_for(&mut missing, Scenario::Register).await.unwrap();
        assert!(errors.has_kind("pass", ErrorKind::Mismatch));

        let mut matched = User::new("bob", "bob@example.com", "secret1").with_pass_compare("secret1");
        assert!(errors_for(&mut matched, Scenario::Register).await.is_none());
        assert_eq!(matched.date_entered, Some(now()));

        let mut insert_only = User::new("bob", "bob@example.com", "secret1").with_pass_compare("other1");
        assert!(errors_for(&mut insert_only, Scenario::Insert).await.is_none());
    }

    #[tokio::test]
    async fn test_type_range_and_default() {
        let mut invalid = User::new("carol", "carol@example.com", "secret1");
        invalid.user_type = Some("owner".to_string());
        let errors = errors_for(&mut invalid, Scenario::Insert).await.unwrap();
        assert_eq!(errors.kinds("type"), vec![ErrorKind::InvalidEnum]);
        assert_eq!(errors.messages("type"), vec!["Type is not in the list."]);

        let mut absent = User::new("carol", "carol@example.com", "secret1");
        assert!(errors_for(&mut absent, Scenario::Insert).await.is_none());
        assert_eq!(absent.user_type.as_deref(), Some("public"));
        assert_eq!(absent.role(), Some(UserType::Public));

        let mut author = User::new("carol", "carol@example.com", "secret1").with_type(UserType::Author);
        assert!(errors_for(&mut author, Scenario::Insert).await.is_none());
        assert_eq!(author.role(), Some(UserType::Author));
    }

    #[tokio::test]
    async fn test_email_and_length_limits() {
        let mut user = User::new("d".repeat(46), "not-an-email", "secret1");
        let errors = errors_for(&mut user, Scenario::Insert).await.unwrap();
        assert_eq!(errors.kinds("username"), vec![ErrorKind::TooLong]);
        assert_eq!(
            errors.messages("username"),
            vec!["Username is too long (maximum is 45 characters)."]
        );
        assert_eq!(errors.kinds("email"), vec![ErrorKind::InvalidFormat]);

        let long_email = format!("{}@example.com", "e".repeat(50));
        let mut user = User::new("dave", long_email, "secret1");
        let errors = errors_for(&mut user, Scenario::Insert).await.unwrap();
        assert_eq!(errors.kinds("email"), vec![ErrorKind::TooLong]);
    }

    #[tokio::test]
    async fn test_timestamps_follow_scenario() {
        let mut inserted = User::new("erin", "erin@example.com", "secret1");
        assert!(errors_for(&mut inserted, Scenario::Insert).await.is_none());
        assert_eq!(inserted.date_entered, Some(now()));
        assert_eq!(inserted.date_updated, None);

        let entered = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let mut updated = User {
            id: Some(1),
            date_entered: Some(entered),
            ..User::new("erin", "erin@example.com", "secret1")
        };
        assert!(errors_for(&mut updated, Scenario::Update).await.is_none());
        assert_eq!(updated.date_entered, Some(entered));
        assert_eq!(updated.date_updated, Some(now()));
    }

    #[tokio::test]
    async fn test_duplicate_email_and_username() {
        let lookup = MemoryLookup::default()
            .with("user", "email", 1, "taken@example.com")
            .with("user", "username", 1, "taken");
        let mut user = User::new("taken", "taken@example.com", "secret1");
        let ctx = ValidationContext::new(Scenario::Insert);

        let err = validate(&mut user, &ctx, &lookup).await.unwrap_err();
        let errors = err.field_errors().unwrap();
        assert_eq!(errors.kinds("email"), vec![ErrorKind::DuplicateValue]);
        assert_eq!(errors.messages("username"), vec!["Username \"taken\" has already been taken."]);

        user.id = Some(1);
        validate(&mut user, &ValidationContext::new(Scenario::Update), &lookup)
            .await
            .unwrap();
    }

    #[test]
    fn test_password_is_never_serialized() {
        let user = User::new("frank", "frank@example.com", "secret1").with_pass_compare("secret1");
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("pass").is_none());
        assert!(json.get("pass_compare").is_none());
        assert_eq!(json["username"], "frank");
    }

    #[test]
    fn test_user_type_parsing() {
        assert_eq!("admin".parse::<UserType>().unwrap(), UserType::Admin);
        assert!("Admin".parse::<UserType>().is_err());
        assert_eq!(UserType::default().to_string(), "public");
    }

    #[test]
    fn test_search_criteria_skips_password() {
        let filter = User {
            username: Some("ali".to_string()),
            pass: Some("secret1".to_string()),
            ..Default::default()
        };
        let criteria = filter.search_criteria();
        assert_eq!(criteria.where_clause(), "WHERE username REGEXP ?");
        assert_eq!(criteria.params().len(), 1);
    }
}
