//! Account registry gateways: email uniqueness check and account
//! provisioning.
//!
//! The manager only sees the two traits below; `http` talks to the real
//! backend and `mock` is an in-process stand-in.

pub mod http;
pub mod mock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::GatewayError;
use crate::onboarding::model::ProductType;

pub use http::HttpGateway;
pub use mock::MockGateway;

/// Outcome of an email uniqueness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailStatus {
    Exists,
    NotExists,
}

/// Account record returned by sign-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Authenticated session returned by sign-up.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: User,
    pub token: SecretString,
}

/// `POST /auth/signup` body.
#[derive(Clone, Serialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub username: String,
}

impl std::fmt::Debug for SignUpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignUpRequest")
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .field("username", &self.username)
            .finish()
    }
}

/// Quit plan created right after sign-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitRecordRequest {
    pub quit_date: DateTime<Utc>,
    pub product_type: ProductType,
    pub daily_usage: u64,
    /// Per-day cost, the entered unit cost divided by 30.
    pub cost: f64,
    pub reasons: Vec<String>,
    pub triggers: Vec<String>,
}

/// Stored quit plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quit_date: Option<DateTime<Utc>>,
}

/// Checks whether an email already has an account.
#[async_trait]
pub trait EmailRegistry: Send + Sync {
    async fn check_exists(&self, email: &str) -> Result<EmailStatus, GatewayError>;
}

/// Creates the account and its first quit plan.
#[async_trait]
pub trait AccountProvisioner: Send + Sync {
    /// Register a new account. Fails with `DuplicateEmail` when taken.
    async fn sign_up(&self, request: &SignUpRequest) -> Result<AuthSession, GatewayError>;

    /// Create the quit plan, authenticated with the sign-up token.
    async fn create_habit_record(
        &self,
        token: &SecretString,
        request: &HabitRecordRequest,
    ) -> Result<HabitRecord, GatewayError>;
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Str(String),
        Num(serde_json::Number),
    }
    Ok(match Id::deserialize(deserializer)? {
        Id::Str(s) => s,
        Id::Num(n) => n.to_string(),
    })
}
