//! OnboardingManager: coordinates the funnel steps, draft persistence, the
//! offer timer, and the account gateways.
//!
//! All state lives behind one `RwLock`. Gateway calls are made with the lock
//! released; before a result is applied the manager checks that the session
//! is still on the step (same transition epoch) that issued the request.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::copy::step_title;
use super::model::{
    Credentials, DurationBucket, Identity, OnboardingDraft, ProductType, parse_amount,
};
use super::offer::{OfferConfig, OfferTimer};
use super::state::Step;
use super::stats::HabitStats;
use super::store::DraftStore;
use crate::error::{FlowError, Result, ValidationError};
use crate::gateway::{
    AccountProvisioner, AuthSession, EmailRegistry, EmailStatus, HabitRecord, HabitRecordRequest,
    SignUpRequest,
};

/// Inline message shown when the email check cannot reach the registry.
pub const EMAIL_CHECK_FAILED: &str = "Unable to check email. Please try again.";

/// Days the entered unit cost is spread over when reporting a daily cost.
const COST_DIVISOR: f64 = 30.0;

/// Manager tuning.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Pause between answering a question and moving to the next step.
    pub advance_delay: Duration,
    pub offer: OfferConfig,
    /// Remove the persisted draft once the account is provisioned.
    pub clear_draft_on_success: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            advance_delay: Duration::from_millis(300),
            offer: OfferConfig::default(),
            clear_draft_on_success: false,
        }
    }
}

/// Collaborators injected into the manager.
#[derive(Clone)]
pub struct ManagerDeps {
    pub store: Arc<dyn DraftStore>,
    pub registry: Arc<dyn EmailRegistry>,
    pub provisioner: Arc<dyn AccountProvisioner>,
}

/// A response to the offer step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferChoice {
    /// Take the offer currently shown (full price, or the flash-sale price).
    Accept,
    /// Turn it down. On the first offer this opens the flash sale; on the
    /// flash sale it means continuing at full price.
    Decline,
}

/// Result of a successful finalization.
#[derive(Debug, Clone)]
pub struct Provisioned {
    pub session: AuthSession,
    pub record: HabitRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Request {
    EmailCheck,
    Provisioning,
}

struct Session {
    step: Step,
    draft: OnboardingDraft,
    /// Bumped on every step change.
    epoch: u64,
    in_flight: Option<Request>,
    error: Option<String>,
    offer: Option<OfferTimer>,
    /// Set once sign-up succeeds, so a retry after a failed quit-plan
    /// creation does not sign up twice.
    account: Option<AuthSession>,
}

/// Everything a front end needs to render the current step.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub step: Step,
    pub step_number: u8,
    pub progress: f64,
    pub title: String,
    pub draft: OnboardingDraft,
    pub stats: HabitStats,
    pub error: Option<String>,
    /// A gateway request is outstanding; the triggering control is disabled.
    pub busy: bool,
    pub can_go_back: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds_left: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seats_left: Option<u32>,
}

/// Drives one onboarding session from product selection to a provisioned
/// account.
pub struct OnboardingManager {
    session_id: Uuid,
    config: ManagerConfig,
    deps: ManagerDeps,
    session: RwLock<Session>,
}

impl OnboardingManager {
    /// Start a session, rehydrating whatever draft the store holds.
    ///
    /// The session opens on the product step, which clears the stored
    /// product type.
    pub async fn resume(config: ManagerConfig, deps: ManagerDeps) -> Self {
        let mut draft = deps.store.load().await;
        draft.product_type = None;

        let manager = Self {
            session_id: Uuid::new_v4(),
            config,
            deps,
            session: RwLock::new(Session {
                step: Step::ProductType,
                draft,
                epoch: 0,
                in_flight: None,
                error: None,
                offer: None,
                account: None,
            }),
        };

        {
            let session = manager.session.read().await;
            manager.persist(&session.draft).await;
        }
        tracing::info!(session_id = %manager.session_id, "Onboarding session started");
        manager
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub async fn current_step(&self) -> Step {
        self.session.read().await.step
    }

    pub async fn draft(&self) -> OnboardingDraft {
        self.session.read().await.draft.clone()
    }

    pub async fn stats(&self) -> HabitStats {
        HabitStats::from_draft(&self.session.read().await.draft)
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let session = self.session.read().await;
        SessionSnapshot {
            session_id: self.session_id,
            step: session.step,
            step_number: session.step.number(),
            progress: session.step.progress_fraction(),
            title: step_title(session.step, session.draft.product_type),
            draft: session.draft.clone(),
            stats: HabitStats::from_draft(&session.draft),
            error: session.error.clone(),
            busy: session.in_flight.is_some(),
            can_go_back: session.step.previous().is_some(),
            seconds_left: session.offer.as_ref().map(|t| t.seconds_left()),
            seats_left: session.offer.as_ref().map(|t| t.seats_left()),
        }
    }

    // ── Questionnaire ───────────────────────────────────────────────

    /// Step 1: pick the product. Advances after the configured delay.
    pub async fn select_product(&self, product: ProductType) -> Result<Step> {
        self.answer(Step::ProductType, "select_product", move |draft| {
            draft.product_type = Some(product);
        })
        .await
    }

    /// Step 2: units used per day. Unparseable input is stored as 0.
    pub async fn set_daily_usage(&self, input: &str) -> Result<Step> {
        let amount = parse_amount(input);
        self.answer(Step::DailyUsage, "set_daily_usage", move |draft| {
            draft.daily_usage = amount;
        })
        .await
    }

    /// Step 3: cost per unit. Unparseable input is stored as 0.
    pub async fn set_unit_cost(&self, input: &str) -> Result<Step> {
        let amount = parse_amount(input);
        self.answer(Step::UnitCost, "set_unit_cost", move |draft| {
            draft.unit_cost = amount;
        })
        .await
    }

    /// Step 4: how long the habit has lasted.
    pub async fn select_duration(&self, bucket: DurationBucket) -> Result<Step> {
        self.answer(Step::Duration, "select_duration", move |draft| {
            draft.duration_bucket = Some(bucket);
        })
        .await
    }

    /// Record an answer, persist it, then advance once the delay elapses,
    /// unless the session changed step in the meantime.
    async fn answer<F>(&self, expected: Step, action: &'static str, apply: F) -> Result<Step>
    where
        F: FnOnce(&mut OnboardingDraft) + Send,
    {
        let epoch = {
            let mut session = self.session.write().await;
            ensure_step(&session, session.step == expected, action)?;
            apply(&mut session.draft);
            self.persist(&session.draft).await;
            session.epoch
        };

        tokio::time::sleep(self.config.advance_delay).await;

        let mut session = self.session.write().await;
        if session.epoch != epoch {
            tracing::debug!(
                session_id = %self.session_id,
                action,
                step = %session.step,
                "Auto-advance superseded"
            );
            return Ok(session.step);
        }
        if let Some(next) = expected.next() {
            self.enter(&mut session, next).await?;
        }
        Ok(session.step)
    }

    // ── Identity ────────────────────────────────────────────────────

    /// Step 5: edit the contact details. Clears any inline error.
    pub async fn update_identity<F>(&self, edit: F) -> Result<()>
    where
        F: FnOnce(&mut Identity) + Send,
    {
        let mut session = self.session.write().await;
        ensure_step(&session, session.step == Step::Identity, "update_identity")?;
        edit(&mut session.draft.identity);
        session.error = None;
        self.persist(&session.draft).await;
        Ok(())
    }

    /// Step 5: validate the contact details and check the email is free.
    ///
    /// Moves to the offer only when the registry answers "not registered".
    /// A registered email or a failed check leaves the session on this step
    /// with an inline error.
    pub async fn submit_identity(&self) -> Result<Step> {
        let (email, epoch) = {
            let mut session = self.session.write().await;
            ensure_step(&session, session.step == Step::Identity, "submit_identity")?;
            if session.in_flight.is_some() {
                return Err(FlowError::RequestInFlight.into());
            }
            if let Err(e) = session.draft.identity.validate() {
                session.error = Some(e.to_string());
                return Err(e.into());
            }
            session.in_flight = Some(Request::EmailCheck);
            session.error = None;
            (session.draft.identity.email.trim().to_string(), session.epoch)
        };

        tracing::debug!(session_id = %self.session_id, "Checking email availability");
        let result = self.deps.registry.check_exists(&email).await;

        let mut session = self.session.write().await;
        session.in_flight = None;
        if session.epoch != epoch || session.draft.identity.email.trim() != email {
            tracing::info!(
                session_id = %self.session_id,
                step = %session.step,
                "Discarding email check result"
            );
            return Err(FlowError::StaleResponse { step: session.step }.into());
        }

        match result {
            Ok(EmailStatus::NotExists) => {
                self.enter(&mut session, Step::Offer { flash_sale: false }).await?;
                Ok(session.step)
            }
            Ok(EmailStatus::Exists) => {
                let err = ValidationError::DuplicateEmail;
                session.error = Some(err.to_string());
                Err(err.into())
            }
            Err(e) => {
                tracing::warn!(session_id = %self.session_id, "Email check failed: {}", e);
                session.error = Some(EMAIL_CHECK_FAILED.to_string());
                Err(e.into())
            }
        }
    }

    // ── Offer ───────────────────────────────────────────────────────

    /// Step 6: respond to the offer currently shown.
    ///
    /// The choice only changes what is displayed; it is logged but never
    /// stored in the draft or sent to provisioning.
    pub async fn respond_to_offer(&self, choice: OfferChoice) -> Result<Step> {
        let mut session = self.session.write().await;
        let Step::Offer { flash_sale } = session.step else {
            return Err(FlowError::InvalidTransition {
                step: session.step,
                action: "respond_to_offer",
            }
            .into());
        };

        tracing::info!(
            session_id = %self.session_id,
            ?choice,
            flash_sale,
            "Offer response"
        );

        match (flash_sale, choice) {
            (false, OfferChoice::Decline) => {
                session.draft.declined_initial_offer = true;
                self.persist(&session.draft).await;
                self.enter(&mut session, Step::Offer { flash_sale: true }).await?;
            }
            _ => {
                self.enter(&mut session, Step::Credentials).await?;
            }
        }
        Ok(session.step)
    }

    // ── Credentials ─────────────────────────────────────────────────

    /// Step 7: edit the password fields. Clears any inline error.
    pub async fn update_credentials<F>(&self, edit: F) -> Result<()>
    where
        F: FnOnce(&mut Credentials) + Send,
    {
        let mut session = self.session.write().await;
        ensure_step(&session, session.step == Step::Credentials, "update_credentials")?;
        edit(&mut session.draft.credentials);
        session.error = None;
        self.persist(&session.draft).await;
        Ok(())
    }

    /// Step 7: create the account and its quit plan.
    ///
    /// Only one finalization runs at a time; a second call while one is
    /// outstanding fails with `RequestInFlight` without contacting the
    /// backend. If sign-up succeeds but the quit plan cannot be created, the
    /// account stays and the error is reported; calling again retries only
    /// the quit plan.
    pub async fn finalize(&self) -> Result<Provisioned> {
        let (sign_up, habit, existing, epoch) = {
            let mut session = self.session.write().await;
            ensure_step(&session, session.step == Step::Credentials, "finalize")?;
            if session.in_flight.is_some() {
                return Err(FlowError::RequestInFlight.into());
            }
            let prepared = prepare_provisioning(&session.draft);
            let (sign_up, habit) = match prepared {
                Ok(requests) => requests,
                Err(e) => {
                    session.error = Some(e.to_string());
                    return Err(e.into());
                }
            };
            session.in_flight = Some(Request::Provisioning);
            session.error = None;
            (sign_up, habit, session.account.clone(), session.epoch)
        };

        let account = match existing {
            Some(account) => account,
            None => match self.deps.provisioner.sign_up(&sign_up).await {
                Ok(account) => account,
                Err(e) => {
                    tracing::warn!(session_id = %self.session_id, "Sign-up failed: {}", e);
                    let mut session = self.session.write().await;
                    session.in_flight = None;
                    session.error = Some(e.to_string());
                    return Err(e.into());
                }
            },
        };

        let record = self
            .deps
            .provisioner
            .create_habit_record(&account.token, &habit)
            .await;

        let mut session = self.session.write().await;
        session.in_flight = None;
        session.account = Some(account.clone());
        if session.epoch != epoch {
            return Err(FlowError::StaleResponse { step: session.step }.into());
        }

        let record = match record {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(
                    session_id = %self.session_id,
                    user_id = %account.user.id,
                    "Account created but quit plan failed: {}",
                    e
                );
                let err = FlowError::PartialProvisioning {
                    user_id: account.user.id.clone(),
                    source: e,
                };
                session.error = Some(err.to_string());
                return Err(err.into());
            }
        };

        self.enter(&mut session, Step::Provisioned).await?;
        if self.config.clear_draft_on_success {
            if let Err(e) = self.deps.store.clear().await {
                tracing::warn!(session_id = %self.session_id, "Failed to clear onboarding draft: {}", e);
            }
        }
        tracing::info!(
            session_id = %self.session_id,
            user_id = %account.user.id,
            record_id = %record.id,
            "Onboarding complete"
        );

        Ok(Provisioned {
            session: account,
            record,
        })
    }

    // ── Navigation ──────────────────────────────────────────────────

    /// Go back one step. Only available on steps 2–5.
    pub async fn go_back(&self) -> Result<Step> {
        let mut session = self.session.write().await;
        let Some(previous) = session.step.previous() else {
            return Err(FlowError::InvalidTransition {
                step: session.step,
                action: "go_back",
            }
            .into());
        };
        self.enter(&mut session, previous).await?;
        Ok(session.step)
    }

    /// End the session, stopping any offer timers.
    pub async fn close(&self) {
        let mut session = self.session.write().await;
        if let Some(mut timer) = session.offer.take() {
            timer.cancel();
        }
        tracing::info!(session_id = %self.session_id, step = %session.step, "Onboarding session closed");
    }

    /// Move to `target`, applying the entry and exit rules of each step.
    async fn enter(&self, session: &mut Session, target: Step) -> Result<()> {
        let from = session.step;
        if !from.can_transition_to(target) {
            return Err(FlowError::InvalidTransition {
                step: from,
                action: "transition",
            }
            .into());
        }

        session.step = target;
        session.epoch += 1;
        session.error = None;

        match (from.is_offer(), target) {
            (false, Step::Offer { .. }) => {
                session.offer = Some(OfferTimer::start(self.config.offer.clone()));
            }
            (true, Step::Offer { flash_sale: true }) => {
                if let Some(timer) = session.offer.as_mut() {
                    timer.start_scarcity();
                }
            }
            (true, _) => {
                if let Some(mut timer) = session.offer.take() {
                    timer.cancel();
                }
            }
            _ => {}
        }

        if target == Step::ProductType {
            session.draft.product_type = None;
            self.persist(&session.draft).await;
        }

        tracing::info!(
            session_id = %self.session_id,
            from = %from,
            to = %target,
            "Onboarding step changed"
        );
        Ok(())
    }

    /// Write the draft through to the store. Failures are logged only.
    async fn persist(&self, draft: &OnboardingDraft) {
        if let Err(e) = self.deps.store.save(draft).await {
            tracing::warn!(session_id = %self.session_id, "Failed to persist onboarding draft: {}", e);
        }
    }
}

fn ensure_step(session: &Session, ok: bool, action: &'static str) -> std::result::Result<(), FlowError> {
    if ok {
        Ok(())
    } else {
        Err(FlowError::InvalidTransition {
            step: session.step,
            action,
        })
    }
}

/// Validate the draft and build the sign-up and quit-plan requests.
fn prepare_provisioning(
    draft: &OnboardingDraft,
) -> std::result::Result<(SignUpRequest, HabitRecordRequest), ValidationError> {
    let product_type = draft.product_type.ok_or(ValidationError::MissingField {
        field: "Product type",
    })?;
    draft.identity.validate()?;
    draft.credentials.validate()?;

    let sign_up = SignUpRequest {
        email: draft.identity.email.trim().to_string(),
        password: draft.credentials.password.clone(),
        username: draft.identity.display_name(),
    };
    let habit = HabitRecordRequest {
        quit_date: Utc::now(),
        product_type,
        daily_usage: whole_daily_usage(draft.daily_usage),
        cost: draft.unit_cost / COST_DIVISOR,
        reasons: Vec::new(),
        triggers: Vec::new(),
    };
    Ok((sign_up, habit))
}

/// Round the daily usage for the quit plan. Values past `u64::MAX` are
/// clamped and logged.
fn whole_daily_usage(daily_usage: f64) -> u64 {
    let rounded = daily_usage.round();
    if rounded >= u64::MAX as f64 {
        tracing::warn!(daily_usage, "Daily usage clamped to u64::MAX");
        return u64::MAX;
    }
    rounded.max(0.0) as u64
}
