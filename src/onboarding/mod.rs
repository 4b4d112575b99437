//! Onboarding funnel: a seven-step flow that profiles a nicotine habit,
//! shows the projected savings with a time-limited offer, and provisions an
//! account with a first quit plan.
//!
//! The manager drives the steps; answers are written through to a draft
//! store after every change so an interrupted session can pick up again.

pub mod copy;
pub mod manager;
pub mod model;
pub mod offer;
pub mod state;
pub mod stats;
pub mod store;

pub use manager::{
    ManagerConfig, ManagerDeps, OfferChoice, OnboardingManager, Provisioned, SessionSnapshot,
};
pub use model::{Credentials, DurationBucket, Identity, OnboardingDraft, ProductType};
pub use offer::{OfferConfig, OfferTimer};
pub use state::Step;
pub use stats::{HabitStats, compute_stats};
pub use store::{DraftStore, FileDraftStore, InMemoryDraftStore};
