//! Error types for the onboarding funnel.

use crate::onboarding::state::Step;

/// Top-level error type for the funnel.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Draft store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Flow(#[from] FlowError),
}

impl Error {
    /// Whether the user can simply try the same action again.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Gateway(GatewayError::Network(_)) => true,
            Self::Flow(FlowError::RequestInFlight | FlowError::PartialProvisioning { .. }) => true,
            Self::Validation(_) | Self::Gateway(GatewayError::Validation(_)) => true,
            _ => false,
        }
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Field-level problems shown inline next to the offending input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    MissingField { field: &'static str },

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("This email is already registered. Please login instead.")]
    DuplicateEmail,

    #[error("{0}")]
    Rejected(String),
}

/// Failures from the account registry (email check, sign-up, habit record).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("Network error: {0}")]
    Network(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Draft persistence errors. Loading never surfaces these; a corrupt or
/// missing draft is treated as a fresh start.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to serialize draft: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Step-controller errors.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("Action '{action}' is not available on step {step}")]
    InvalidTransition { step: Step, action: &'static str },

    #[error("A request is already in progress")]
    RequestInFlight,

    #[error("Discarded response for step {step}: the session has moved on")]
    StaleResponse { step: Step },

    #[error("Your account was created, but saving your quit plan failed: {source}")]
    PartialProvisioning {
        user_id: String,
        #[source]
        source: GatewayError,
    },
}

/// Result type alias for the funnel.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_email_message_directs_to_login() {
        let err = Error::from(GatewayError::from(ValidationError::DuplicateEmail));
        assert!(err.to_string().contains("Please login instead"));
        assert!(err.is_retriable());
    }

    #[test]
    fn validation_is_retriable_wherever_it_was_raised() {
        let local = Error::from(ValidationError::DuplicateEmail);
        let remote = Error::from(GatewayError::from(ValidationError::DuplicateEmail));
        assert_eq!(local.is_retriable(), remote.is_retriable());

        let rejected = Error::from(GatewayError::from(ValidationError::Rejected(
            "bad plan".into(),
        )));
        assert!(rejected.is_retriable());
    }

    #[test]
    fn network_errors_are_retriable() {
        let err = Error::from(GatewayError::Network("connection refused".into()));
        assert!(err.is_retriable());
    }

    #[test]
    fn invalid_transition_is_not_retriable() {
        let err = Error::from(FlowError::InvalidTransition {
            step: Step::ProductType,
            action: "go_back",
        });
        assert!(!err.is_retriable());
        assert!(err.to_string().contains("go_back"));
    }

    #[test]
    fn partial_provisioning_mentions_account() {
        let err = FlowError::PartialProvisioning {
            user_id: "u-1".into(),
            source: GatewayError::Network("timeout".into()),
        };
        assert!(err.to_string().contains("account was created"));
    }
}
