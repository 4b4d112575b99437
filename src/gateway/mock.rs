//! In-process account gateway for tests and offline runs.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use uuid::Uuid;

use super::{
    AccountProvisioner, AuthSession, EmailRegistry, EmailStatus, HabitRecord, HabitRecordRequest,
    SignUpRequest, User,
};
use crate::error::{GatewayError, ValidationError};

/// Scriptable registry and provisioner.
///
/// Failures are scripted per call kind and stay in effect until cleared.
#[derive(Default)]
pub struct MockGateway {
    delay: Duration,
    registered: Mutex<HashSet<String>>,
    check_failure: Mutex<Option<GatewayError>>,
    sign_up_failure: Mutex<Option<GatewayError>>,
    habit_failure: Mutex<Option<GatewayError>>,
    records: Mutex<Vec<HabitRecordRequest>>,
    check_calls: AtomicUsize,
    sign_up_calls: AtomicUsize,
    habit_calls: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call, to keep requests in flight.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Mark an email as already registered.
    pub fn register(&self, email: &str) {
        lock(&self.registered).insert(normalize(email));
    }

    pub fn fail_email_checks(&self, failure: Option<GatewayError>) {
        *lock(&self.check_failure) = failure;
    }

    pub fn fail_sign_up(&self, failure: Option<GatewayError>) {
        *lock(&self.sign_up_failure) = failure;
    }

    pub fn fail_habit_records(&self, failure: Option<GatewayError>) {
        *lock(&self.habit_failure) = failure;
    }

    pub fn check_calls(&self) -> usize {
        self.check_calls.load(Ordering::SeqCst)
    }

    pub fn sign_up_calls(&self) -> usize {
        self.sign_up_calls.load(Ordering::SeqCst)
    }

    pub fn habit_calls(&self) -> usize {
        self.habit_calls.load(Ordering::SeqCst)
    }

    /// Quit plans created so far.
    pub fn records(&self) -> Vec<HabitRecordRequest> {
        lock(&self.records).clone()
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl EmailRegistry for MockGateway {
    async fn check_exists(&self, email: &str) -> Result<EmailStatus, GatewayError> {
        self.check_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if let Some(err) = lock(&self.check_failure).clone() {
            return Err(err);
        }
        Ok(if lock(&self.registered).contains(&normalize(email)) {
            EmailStatus::Exists
        } else {
            EmailStatus::NotExists
        })
    }
}

#[async_trait]
impl AccountProvisioner for MockGateway {
    async fn sign_up(&self, request: &SignUpRequest) -> Result<AuthSession, GatewayError> {
        self.sign_up_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if let Some(err) = lock(&self.sign_up_failure).clone() {
            return Err(err);
        }
        if !lock(&self.registered).insert(normalize(&request.email)) {
            return Err(ValidationError::DuplicateEmail.into());
        }
        let id = Uuid::new_v4();
        Ok(AuthSession {
            user: User {
                id: id.to_string(),
                email: request.email.clone(),
                username: Some(request.username.clone()),
            },
            token: SecretString::from(format!("mock-token-{id}")),
        })
    }

    async fn create_habit_record(
        &self,
        _token: &SecretString,
        request: &HabitRecordRequest,
    ) -> Result<HabitRecord, GatewayError> {
        self.habit_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if let Some(err) = lock(&self.habit_failure).clone() {
            return Err(err);
        }
        lock(&self.records).push(request.clone());
        Ok(HabitRecord {
            id: Uuid::new_v4().to_string(),
            quit_date: Some(request.quit_date),
        })
    }
}
