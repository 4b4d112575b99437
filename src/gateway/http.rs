//! HTTP gateway: talks to the account backend's REST endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::{
    AccountProvisioner, AuthSession, EmailRegistry, EmailStatus, HabitRecord, HabitRecordRequest,
    SignUpRequest, User,
};
use crate::error::{ConfigError, GatewayError, ValidationError};

/// Endpoint paths, relative to the API base URL.
pub mod paths {
    pub const CHECK_EMAIL: &str = "/auth/check-email";
    pub const SIGN_UP: &str = "/auth/signup";
    pub const HABIT_RECORDS: &str = "/quit-attempts";
}

#[derive(Deserialize)]
struct CheckEmailResponse {
    exists: bool,
}

#[derive(Deserialize)]
struct SignUpResponse {
    user: User,
    token: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// reqwest-backed implementation of both gateways.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    base_url: String,
    client: reqwest::Client,
}

impl HttpGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Turn a non-2xx response into a gateway error.
    ///
    /// 409, or a message about an existing account, means the email is taken.
    /// Other 4xx responses are validation failures; anything else is treated
    /// as a transport problem and can be retried.
    async fn rejection(resp: reqwest::Response, fallback: &str) -> GatewayError {
        let status = resp.status();
        let message = resp
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|b| b.error)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| fallback.to_string());

        if status == StatusCode::CONFLICT || mentions_existing_account(&message) {
            return ValidationError::DuplicateEmail.into();
        }
        if status.is_client_error() {
            return ValidationError::Rejected(message).into();
        }
        GatewayError::Network(format!("{status}: {message}"))
    }
}

fn mentions_existing_account(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("already registered") || lower.contains("already exists")
}

fn transport(e: reqwest::Error) -> GatewayError {
    GatewayError::Network(e.to_string())
}

#[async_trait]
impl EmailRegistry for HttpGateway {
    async fn check_exists(&self, email: &str) -> Result<EmailStatus, GatewayError> {
        let resp = self
            .client
            .post(self.url(paths::CHECK_EMAIL))
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await
            .map_err(transport)?;

        if !resp.status().is_success() {
            // Any failure here blocks the step; it never counts as "not registered".
            return Err(GatewayError::Network(format!("HTTP error! status: {}", resp.status())));
        }

        let body: CheckEmailResponse = resp.json().await.map_err(transport)?;
        Ok(if body.exists {
            EmailStatus::Exists
        } else {
            EmailStatus::NotExists
        })
    }
}

#[async_trait]
impl AccountProvisioner for HttpGateway {
    async fn sign_up(&self, request: &SignUpRequest) -> Result<AuthSession, GatewayError> {
        let resp = self
            .client
            .post(self.url(paths::SIGN_UP))
            .json(request)
            .send()
            .await
            .map_err(transport)?;

        if !resp.status().is_success() {
            return Err(Self::rejection(resp, "Signup failed").await);
        }

        let body: SignUpResponse = resp.json().await.map_err(transport)?;
        tracing::info!(user_id = %body.user.id, "Account created");
        Ok(AuthSession {
            user: body.user,
            token: SecretString::from(body.token),
        })
    }

    async fn create_habit_record(
        &self,
        token: &SecretString,
        request: &HabitRecordRequest,
    ) -> Result<HabitRecord, GatewayError> {
        let resp = self
            .client
            .post(self.url(paths::HABIT_RECORDS))
            .bearer_auth(token.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(transport)?;

        if !resp.status().is_success() {
            return Err(Self::rejection(resp, "Failed to create quit plan").await);
        }

        resp.json().await.map_err(transport)
    }
}
