//! Onboarding state machine: tracks which step of the funnel the user is on.

use serde::{Deserialize, Serialize};

/// Number of visible steps in the funnel.
pub const TOTAL_STEPS: u8 = 7;

/// The steps of the onboarding funnel.
///
/// Forward order: ProductType → DailyUsage → UnitCost → Duration → Identity →
/// Offer → Credentials → Provisioned. The flash-sale flag only exists inside
/// `Offer`, so leaving the offer step drops it with the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    ProductType,
    DailyUsage,
    UnitCost,
    Duration,
    Identity,
    Offer { flash_sale: bool },
    Credentials,
    Provisioned,
}

impl Step {
    /// 1-based step number as shown in "Step n of 7".
    pub fn number(&self) -> u8 {
        match self {
            Self::ProductType => 1,
            Self::DailyUsage => 2,
            Self::UnitCost => 3,
            Self::Duration => 4,
            Self::Identity => 5,
            Self::Offer { .. } => 6,
            Self::Credentials | Self::Provisioned => 7,
        }
    }

    /// Fraction of the funnel completed, `number / 7`.
    pub fn progress_fraction(&self) -> f64 {
        f64::from(self.number()) / f64::from(TOTAL_STEPS)
    }

    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: Step) -> bool {
        use Step::*;
        matches!(
            (self, target),
            (ProductType, DailyUsage)
                | (DailyUsage, UnitCost)
                | (UnitCost, Duration)
                | (Duration, Identity)
                | (Identity, Offer { flash_sale: false })
                | (Offer { flash_sale: false }, Offer { flash_sale: true })
                | (Offer { .. }, Credentials)
                | (Credentials, Provisioned)
                // Backward
                | (DailyUsage, ProductType)
                | (UnitCost, DailyUsage)
                | (Duration, UnitCost)
                | (Identity, Duration)
        )
    }

    /// The step reached by moving forward, if any.
    pub fn next(&self) -> Option<Step> {
        use Step::*;
        match self {
            ProductType => Some(DailyUsage),
            DailyUsage => Some(UnitCost),
            UnitCost => Some(Duration),
            Duration => Some(Identity),
            Identity => Some(Offer { flash_sale: false }),
            Offer { .. } => Some(Credentials),
            Credentials => Some(Provisioned),
            Provisioned => None,
        }
    }

    /// The step reached by going back. Only the questionnaire steps (2–5)
    /// allow it; the offer and credential steps are funnel-committed.
    pub fn previous(&self) -> Option<Step> {
        use Step::*;
        match self {
            DailyUsage => Some(ProductType),
            UnitCost => Some(DailyUsage),
            Duration => Some(UnitCost),
            Identity => Some(Duration),
            _ => None,
        }
    }

    /// Whether this step is terminal (account provisioned).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Provisioned)
    }

    /// Whether the offer timer should be running on this step.
    pub fn is_offer(&self) -> bool {
        matches!(self, Self::Offer { .. })
    }
}

impl Default for Step {
    fn default() -> Self {
        Self::ProductType
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ProductType => "product_type",
            Self::DailyUsage => "daily_usage",
            Self::UnitCost => "unit_cost",
            Self::Duration => "duration",
            Self::Identity => "identity",
            Self::Offer { flash_sale: false } => "offer",
            Self::Offer { flash_sale: true } => "offer_flash_sale",
            Self::Credentials => "credentials",
            Self::Provisioned => "provisioned",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Step; 9] = [
        Step::ProductType,
        Step::DailyUsage,
        Step::UnitCost,
        Step::Duration,
        Step::Identity,
        Step::Offer { flash_sale: false },
        Step::Offer { flash_sale: true },
        Step::Credentials,
        Step::Provisioned,
    ];

    #[test]
    fn next_is_always_a_valid_transition() {
        for step in ALL {
            if let Some(next) = step.next() {
                assert!(step.can_transition_to(next), "{step} should transition to {next}");
            }
        }
    }

    #[test]
    fn back_only_on_questionnaire_steps() {
        use Step::*;
        assert!(ProductType.previous().is_none());
        assert_eq!(DailyUsage.previous(), Some(ProductType));
        assert_eq!(Identity.previous(), Some(Duration));
        assert!(Offer { flash_sale: false }.previous().is_none());
        assert!(Offer { flash_sale: true }.previous().is_none());
        assert!(Credentials.previous().is_none());
        assert!(Provisioned.previous().is_none());
    }

    #[test]
    fn invalid_transitions() {
        use Step::*;
        // Skip steps
        assert!(!ProductType.can_transition_to(UnitCost));
        assert!(!Identity.can_transition_to(Credentials));
        // Backtrack out of committed steps
        assert!(!Credentials.can_transition_to(Offer { flash_sale: false }));
        assert!(!Offer { flash_sale: true }.can_transition_to(Identity));
        // Flash sale cannot be undone
        assert!(!Offer { flash_sale: true }.can_transition_to(Offer { flash_sale: false }));
        // Identity always lands on the plain offer
        assert!(!Identity.can_transition_to(Offer { flash_sale: true }));
        // Terminal
        assert!(!Provisioned.can_transition_to(ProductType));
    }

    #[test]
    fn progress_is_step_over_seven() {
        assert!((Step::ProductType.progress_fraction() - 1.0 / 7.0).abs() < f64::EPSILON);
        assert!((Step::Offer { flash_sale: true }.progress_fraction() - 6.0 / 7.0).abs() < f64::EPSILON);
        assert!((Step::Provisioned.progress_fraction() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn is_terminal() {
        assert!(Step::Provisioned.is_terminal());
        assert!(!Step::Credentials.is_terminal());
        assert!(!Step::ProductType.is_terminal());
    }

    #[test]
    fn display_names_are_unique() {
        let names: std::collections::HashSet<String> = ALL.iter().map(|s| s.to_string()).collect();
        assert_eq!(names.len(), ALL.len());
    }

    #[test]
    fn serde_keeps_flash_sale_inside_offer() {
        let json = serde_json::to_value(Step::Offer { flash_sale: true }).unwrap();
        assert_eq!(json, serde_json::json!({"step": "offer", "flash_sale": true}));
        let parsed: Step = serde_json::from_value(serde_json::json!({"step": "identity"})).unwrap();
        assert_eq!(parsed, Step::Identity);
    }
}
