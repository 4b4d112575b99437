//! Quit Onboarding: habit-profiling funnel and account provisioning.

pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod onboarding;
