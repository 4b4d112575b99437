//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::onboarding::manager::ManagerConfig;
use crate::onboarding::offer::OfferConfig;
use crate::onboarding::store::DRAFT_FILE_NAME;

const ENV_PREFIX: &str = "QUIT_ONBOARDING_";

/// Runtime configuration for the onboarding funnel binary.
#[derive(Debug, Clone)]
pub struct FunnelConfig {
    /// Base URL of the account backend.
    pub api_url: String,
    /// Where the onboarding draft is kept between runs.
    pub draft_path: PathBuf,
    /// Directory for the rolling log file.
    pub log_dir: PathBuf,
    /// Per-request timeout for backend calls.
    pub http_timeout: Duration,
    /// Use in-process gateways instead of the backend.
    pub offline: bool,
    pub manager: ManagerConfig,
}

impl Default for FunnelConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3000".to_string(),
            draft_path: PathBuf::from("./data").join(DRAFT_FILE_NAME),
            log_dir: PathBuf::from("./logs"),
            http_timeout: Duration::from_secs(10),
            offline: false,
            manager: ManagerConfig::default(),
        }
    }
}

impl FunnelConfig {
    /// Load from `QUIT_ONBOARDING_*` environment variables. Unset or
    /// unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(format!("{ENV_PREFIX}{key}")).ok())
    }

    /// Load from an arbitrary key lookup (keys without the prefix).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());

        let api_url = lookup("API_URL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.api_url);

        let draft_path = lookup("DRAFT_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.draft_path);

        let log_dir = lookup("LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.log_dir);

        let http_timeout = parsed("HTTP_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.http_timeout);

        let advance_delay = parsed("ADVANCE_DELAY_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.manager.advance_delay);

        let offer = OfferConfig {
            countdown_secs: parsed("OFFER_SECS")
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(defaults.manager.offer.countdown_secs),
            initial_seats: parsed("SEATS")
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(defaults.manager.offer.initial_seats),
            ..defaults.manager.offer
        };

        Self {
            api_url,
            draft_path,
            log_dir,
            http_timeout,
            offline: lookup("OFFLINE").is_some_and(|v| is_truthy(&v)),
            manager: ManagerConfig {
                advance_delay,
                offer,
                clear_draft_on_success: lookup("CLEAR_DRAFT_ON_SUCCESS")
                    .is_some_and(|v| is_truthy(&v)),
            },
        }
    }

    /// Reject values the funnel cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.offline
            && !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://"))
        {
            return Err(ConfigError::InvalidValue {
                key: format!("{ENV_PREFIX}API_URL"),
                message: format!("expected an http(s) URL, got '{}'", self.api_url),
            });
        }
        if self.http_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: format!("{ENV_PREFIX}HTTP_TIMEOUT_SECS"),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.manager.offer.initial_seats < self.manager.offer.min_seats {
            return Err(ConfigError::InvalidValue {
                key: format!("{ENV_PREFIX}SEATS"),
                message: format!("must be at least {}", self.manager.offer.min_seats),
            });
        }
        Ok(())
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
