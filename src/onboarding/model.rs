//! Onboarding draft and answer models.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;

/// Minimum password length accepted at finalization.
pub const MIN_PASSWORD_LEN: usize = 8;

/// The nicotine product the user is quitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    Cigarettes,
    VapeDisposable,
    Pouches,
    Dip,
}

impl ProductType {
    pub const ALL: [ProductType; 4] = [
        Self::Cigarettes,
        Self::VapeDisposable,
        Self::Pouches,
        Self::Dip,
    ];

    /// Wire name, e.g. `"vape_disposable"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cigarettes => "cigarettes",
            Self::VapeDisposable => "vape_disposable",
            Self::Pouches => "pouches",
            Self::Dip => "dip",
        }
    }

    /// Parse a wire name. Unknown names yield `None` (treated as unset).
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == s.trim())
    }

    /// Short label for the selection card.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Cigarettes => "Cigarettes",
            Self::VapeDisposable => "Vape",
            Self::Pouches => "Pouches",
            Self::Dip => "Dip/Chew",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Cigarettes => "Traditional cigarettes",
            Self::VapeDisposable => "E-cigarettes and vaping devices",
            Self::Pouches => "Tobacco-free pouches",
            Self::Dip => "Smokeless tobacco",
        }
    }
}

impl std::fmt::Display for ProductType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How long the user has been using the product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DurationBucket {
    #[serde(rename = "under_5y")]
    Under5Years,
    #[serde(rename = "5_to_10y")]
    FiveToTenYears,
    #[serde(rename = "10_to_20y")]
    TenToTwentyYears,
    #[serde(rename = "over_20y")]
    Over20Years,
}

impl DurationBucket {
    pub const ALL: [DurationBucket; 4] = [
        Self::Under5Years,
        Self::FiveToTenYears,
        Self::TenToTwentyYears,
        Self::Over20Years,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Under5Years => "under_5y",
            Self::FiveToTenYears => "5_to_10y",
            Self::TenToTwentyYears => "10_to_20y",
            Self::Over20Years => "over_20y",
        }
    }

    /// Parse a stored bucket, including the older `less_than_5` style names.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "under_5y" | "less_than_5" => Some(Self::Under5Years),
            "5_to_10y" | "5_to_10" | "less_than_10" => Some(Self::FiveToTenYears),
            "10_to_20y" | "10_to_20" => Some(Self::TenToTwentyYears),
            "over_20y" | "over_20" => Some(Self::Over20Years),
            _ => None,
        }
    }

    /// Bucket holding a number of years. Zero, negative, or non-finite
    /// values have no bucket.
    pub fn from_years(years: f64) -> Option<Self> {
        if !years.is_finite() || years <= 0.0 {
            return None;
        }
        Some(if years < 5.0 {
            Self::Under5Years
        } else if years < 10.0 {
            Self::FiveToTenYears
        } else if years < 20.0 {
            Self::TenToTwentyYears
        } else {
            Self::Over20Years
        })
    }

    /// Upper bound of the bucket in years. The open-ended bucket uses 35.
    pub fn max_years(&self) -> u32 {
        match self {
            Self::Under5Years => 5,
            Self::FiveToTenYears => 10,
            Self::TenToTwentyYears => 20,
            Self::Over20Years => 35,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Under5Years => "Less than 5 years",
            Self::FiveToTenYears => "5 to 10 years",
            Self::TenToTwentyYears => "10 to 20 years",
            Self::Over20Years => "Over 20 years",
        }
    }
}

impl std::fmt::Display for DurationBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contact details collected on the identity step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub opt_in_messages: bool,
}

impl Identity {
    /// Name sent as `username` at sign-up.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }

    /// Check the required fields (first name, last name, email).
    pub fn validate(&self) -> Result<(), ValidationError> {
        let required = [
            ("First name", &self.first_name),
            ("Last name", &self.last_name),
            ("Email", &self.email),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingField { field });
            }
        }
        Ok(())
    }
}

/// Password pair collected on the last step.
///
/// Persisted with the rest of the draft, in cleartext.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub password: String,
    pub confirm_password: String,
}

impl Credentials {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.password.is_empty() {
            return Err(ValidationError::MissingField { field: "Password" });
        }
        if self.confirm_password.is_empty() {
            return Err(ValidationError::MissingField {
                field: "Confirm password",
            });
        }
        if self.password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::PasswordTooShort {
                min: MIN_PASSWORD_LEN,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("password", &"[redacted]")
            .field("confirm_password", &"[redacted]")
            .finish()
    }
}

/// Partial answers for an in-progress onboarding session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingDraft {
    pub product_type: Option<ProductType>,
    pub daily_usage: f64,
    pub unit_cost: f64,
    pub duration_bucket: Option<DurationBucket>,
    pub identity: Identity,
    pub credentials: Credentials,
    pub declined_initial_offer: bool,
}

impl OnboardingDraft {
    /// Rehydrate a draft from persisted JSON.
    ///
    /// Never fails: malformed JSON yields an empty draft, and each field that
    /// is missing or has the wrong shape falls back to its default on its
    /// own. Older flat drafts (`weeklyUsage`, `firstName`, ...) are accepted.
    pub fn from_json_lenient(raw: &str) -> Self {
        let value: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("Discarding unreadable onboarding draft: {}", e);
                return Self::default();
            }
        };
        let Some(obj) = value.as_object() else {
            tracing::warn!("Discarding onboarding draft: not a JSON object");
            return Self::default();
        };

        let identity_src = obj
            .get("identity")
            .and_then(Value::as_object)
            .unwrap_or(obj);
        let credentials_src = obj
            .get("credentials")
            .and_then(Value::as_object)
            .unwrap_or(obj);

        let (first_name, last_name) = match (
            str_field(identity_src, &["firstName"]),
            str_field(identity_src, &["lastName"]),
        ) {
            (None, None) => {
                split_full_name(&str_field(identity_src, &["name"]).unwrap_or_default())
            }
            (first, last) => (first.unwrap_or_default(), last.unwrap_or_default()),
        };

        Self {
            product_type: str_field(obj, &["productType"])
                .as_deref()
                .and_then(ProductType::parse),
            daily_usage: amount_field(obj, &["dailyUsage", "weeklyUsage"]),
            unit_cost: amount_field(obj, &["unitCost", "monthlySpending"]),
            duration_bucket: duration_field(obj, &["durationBucket", "duration"]),
            identity: Identity {
                first_name,
                last_name,
                email: str_field(identity_src, &["email"]).unwrap_or_default(),
                phone: str_field(identity_src, &["phone"]).unwrap_or_default(),
                opt_in_messages: bool_field(identity_src, "optInMessages"),
            },
            credentials: Credentials {
                password: str_field(credentials_src, &["password"]).unwrap_or_default(),
                confirm_password: str_field(credentials_src, &["confirmPassword"])
                    .unwrap_or_default(),
            },
            declined_initial_offer: bool_field(obj, "declinedInitialOffer"),
        }
    }
}

fn str_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(String::from)
}

/// Bucket names, or a bare number of years from older drafts.
fn duration_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<DurationBucket> {
    keys.iter().find_map(|k| match obj.get(*k)? {
        Value::String(s) => {
            DurationBucket::parse(s).or_else(|| DurationBucket::from_years(parse_amount(s)))
        }
        Value::Number(n) => n.as_f64().and_then(DurationBucket::from_years),
        _ => None,
    })
}

/// `"Sam van Lee"` → (`"Sam"`, `"van Lee"`).
fn split_full_name(name: &str) -> (String, String) {
    match name.trim().split_once(char::is_whitespace) {
        Some((first, last)) => (first.to_string(), last.trim().to_string()),
        None => (name.trim().to_string(), String::new()),
    }
}

fn bool_field(obj: &Map<String, Value>, key: &str) -> bool {
    obj.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn amount_field(obj: &Map<String, Value>, keys: &[&str]) -> f64 {
    keys.iter()
        .find_map(|k| match obj.get(*k)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => Some(parse_amount(s)),
            _ => None,
        })
        .map(sanitize_amount)
        .unwrap_or(0.0)
}

static LEADING_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?").expect("valid number regex")
});

/// Parse a user-entered amount.
///
/// Reads the leading numeric part of the input (`"2.5 packs"` → 2.5).
/// Anything unparseable, non-finite, or negative becomes 0.
pub fn parse_amount(input: &str) -> f64 {
    LEADING_NUMBER
        .find(input.trim())
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map(sanitize_amount)
        .unwrap_or(0.0)
}

/// Clamp an amount to a finite, non-negative value.
pub fn sanitize_amount(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_amount_reads_leading_number() {
        assert_eq!(parse_amount("2"), 2.0);
        assert_eq!(parse_amount(" 2.5 packs"), 2.5);
        assert_eq!(parse_amount(".5"), 0.5);
        assert_eq!(parse_amount("1e1"), 10.0);
    }

    #[test]
    fn parse_amount_coerces_garbage_to_zero() {
        assert_eq!(parse_amount(""), 0.0);
        assert_eq!(parse_amount("abc"), 0.0);
        assert_eq!(parse_amount("NaN"), 0.0);
        assert_eq!(parse_amount("-3"), 0.0);
        assert_eq!(parse_amount("1e999"), 0.0);
    }

    #[test]
    fn product_type_parse_roundtrip() {
        for product in ProductType::ALL {
            assert_eq!(ProductType::parse(product.as_str()), Some(product));
            let json = serde_json::to_string(&product).unwrap();
            assert_eq!(json, format!("\"{product}\""));
        }
        assert_eq!(ProductType::parse("multiple"), None);
    }

    #[test]
    fn duration_max_years() {
        let expected = [5, 10, 20, 35];
        for (bucket, years) in DurationBucket::ALL.iter().zip(expected) {
            assert_eq!(bucket.max_years(), years, "{bucket}");
        }
    }

    #[test]
    fn duration_accepts_legacy_names() {
        assert_eq!(DurationBucket::parse("less_than_5"), Some(DurationBucket::Under5Years));
        assert_eq!(DurationBucket::parse("less_than_10"), Some(DurationBucket::FiveToTenYears));
        assert_eq!(DurationBucket::parse("over_20"), Some(DurationBucket::Over20Years));
        assert_eq!(DurationBucket::parse("forever"), None);
    }

    #[test]
    fn duration_from_years() {
        assert_eq!(DurationBucket::from_years(3.0), Some(DurationBucket::Under5Years));
        assert_eq!(DurationBucket::from_years(5.0), Some(DurationBucket::FiveToTenYears));
        assert_eq!(DurationBucket::from_years(12.5), Some(DurationBucket::TenToTwentyYears));
        assert_eq!(DurationBucket::from_years(40.0), Some(DurationBucket::Over20Years));
        assert_eq!(DurationBucket::from_years(0.0), None);
        assert_eq!(DurationBucket::from_years(f64::NAN), None);
    }

    #[test]
    fn lenient_load_reads_numeric_duration_and_full_name() {
        let draft = OnboardingDraft::from_json_lenient(r#"{"duration": 12, "name": "Sam van Lee"}"#);
        assert_eq!(draft.duration_bucket, Some(DurationBucket::TenToTwentyYears));
        assert_eq!(draft.identity.first_name, "Sam");
        assert_eq!(draft.identity.last_name, "van Lee");

        let draft = OnboardingDraft::from_json_lenient(r#"{"duration": "7", "name": "Cher"}"#);
        assert_eq!(draft.duration_bucket, Some(DurationBucket::FiveToTenYears));
        assert_eq!(draft.identity.display_name(), "Cher");

        let draft = OnboardingDraft::from_json_lenient(
            r#"{"duration": "forever", "firstName": "Ada", "name": "Ignored Name"}"#,
        );
        assert_eq!(draft.duration_bucket, None);
        assert_eq!(draft.identity.first_name, "Ada");
        assert_eq!(draft.identity.last_name, "");
    }

    #[test]
    fn identity_requires_names_and_email() {
        let mut identity = Identity {
            first_name: "Ada".into(),
            last_name: " ".into(),
            email: "ada@example.com".into(),
            ..Default::default()
        };
        assert_eq!(
            identity.validate(),
            Err(ValidationError::MissingField { field: "Last name" })
        );
        identity.last_name = "Lovelace".into();
        assert!(identity.validate().is_ok());
        assert_eq!(identity.display_name(), "Ada Lovelace");
    }

    #[test]
    fn credentials_validation_order() {
        let creds = |p: &str, c: &str| Credentials {
            password: p.into(),
            confirm_password: c.into(),
        };
        assert_eq!(
            creds("", "").validate(),
            Err(ValidationError::MissingField { field: "Password" })
        );
        assert_eq!(
            creds("longenough", "different1").validate(),
            Err(ValidationError::PasswordMismatch)
        );
        assert_eq!(
            creds("short", "short").validate(),
            Err(ValidationError::PasswordTooShort { min: 8 })
        );
        assert!(creds("longenough", "longenough").validate().is_ok());
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let creds = Credentials {
            password: "hunter2hunter2".into(),
            confirm_password: "hunter2hunter2".into(),
        };
        assert!(!format!("{creds:?}").contains("hunter2"));
    }

    #[test]
    fn lenient_load_restores_present_fields() {
        let raw = r#"{"productType":"pouches","dailyUsage":3,"identity":{"email":"a@b.co"}}"#;
        let draft = OnboardingDraft::from_json_lenient(raw);
        assert_eq!(draft.product_type, Some(ProductType::Pouches));
        assert_eq!(draft.daily_usage, 3.0);
        assert_eq!(draft.unit_cost, 0.0);
        assert_eq!(draft.duration_bucket, None);
        assert_eq!(draft.identity.email, "a@b.co");
        assert_eq!(draft.identity.first_name, "");
        assert!(!draft.declined_initial_offer);
    }

    #[test]
    fn lenient_load_tolerates_wrong_shapes() {
        let raw = r#"{"productType":42,"dailyUsage":"lots","unitCost":-5,"durationBucket":"forever","declinedInitialOffer":"yes"}"#;
        let draft = OnboardingDraft::from_json_lenient(raw);
        assert_eq!(draft, OnboardingDraft::default());
    }

    #[test]
    fn lenient_load_of_garbage_starts_fresh() {
        assert_eq!(OnboardingDraft::from_json_lenient("{not json"), OnboardingDraft::default());
        assert_eq!(OnboardingDraft::from_json_lenient("[1,2]"), OnboardingDraft::default());
        assert_eq!(OnboardingDraft::from_json_lenient(""), OnboardingDraft::default());
    }

    #[test]
    fn lenient_load_reads_flat_legacy_drafts() {
        let raw = r#"{
            "productType": "dip",
            "weeklyUsage": "2",
            "monthlySpending": "8",
            "duration": "5_to_10",
            "firstName": "Sam",
            "lastName": "Lee",
            "email": "sam@example.com",
            "optInMessages": true,
            "password": "pw123456",
            "confirmPassword": "pw123456",
            "declinedInitialOffer": true
        }"#;
        let draft = OnboardingDraft::from_json_lenient(raw);
        assert_eq!(draft.product_type, Some(ProductType::Dip));
        assert_eq!(draft.daily_usage, 2.0);
        assert_eq!(draft.unit_cost, 8.0);
        assert_eq!(draft.duration_bucket, Some(DurationBucket::FiveToTenYears));
        assert_eq!(draft.identity.display_name(), "Sam Lee");
        assert!(draft.identity.opt_in_messages);
        assert_eq!(draft.credentials.password, "pw123456");
        assert!(draft.declined_initial_offer);
    }

    #[test]
    fn saved_shape_reloads_identically() {
        let draft = OnboardingDraft {
            product_type: Some(ProductType::VapeDisposable),
            daily_usage: 1.5,
            unit_cost: 7.0,
            duration_bucket: Some(DurationBucket::Over20Years),
            identity: Identity {
                first_name: "Kim".into(),
                last_name: "Park".into(),
                email: "kim@example.com".into(),
                phone: "555-0100".into(),
                opt_in_messages: true,
            },
            credentials: Credentials::default(),
            declined_initial_offer: true,
        };
        let json = serde_json::to_string(&draft).unwrap();
        assert!(json.contains("\"durationBucket\":\"over_20y\""));
        assert_eq!(OnboardingDraft::from_json_lenient(&json), draft);
    }
}
