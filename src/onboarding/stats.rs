//! Habit cost statistics derived from the draft answers.

use serde::Serialize;

use super::model::{sanitize_amount, DurationBucket, OnboardingDraft, ProductType};

const DAYS_PER_YEAR: f64 = 365.0;

/// Unit names used when describing the user's habit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UnitLabel {
    pub singular: &'static str,
    pub plural: &'static str,
    pub unit: &'static str,
}

impl UnitLabel {
    /// Label set for a product. Unset falls back to cigarettes.
    pub fn for_product(product: Option<ProductType>) -> Self {
        match product.unwrap_or(ProductType::Cigarettes) {
            ProductType::Cigarettes => Self {
                singular: "cigarette",
                plural: "cigarettes",
                unit: "cigarettes",
            },
            ProductType::VapeDisposable => Self {
                singular: "vape",
                plural: "vapes",
                unit: "vapes",
            },
            ProductType::Pouches => Self {
                singular: "pouch",
                plural: "pouches",
                unit: "pouches",
            },
            ProductType::Dip => Self {
                singular: "can",
                plural: "cans",
                unit: "cans",
            },
        }
    }
}

/// Yearly and lifetime usage/spending figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HabitStats {
    pub yearly_usage: u64,
    pub yearly_spending: u64,
    pub total_spent_lifetime: u64,
    pub label: UnitLabel,
}

/// Compute habit statistics.
///
/// Non-finite or negative inputs count as 0, so the results are always
/// displayable. Lifetime spend uses the upper bound of the duration bucket.
pub fn compute_stats(
    daily_usage: f64,
    unit_cost: f64,
    duration: Option<DurationBucket>,
    product: Option<ProductType>,
) -> HabitStats {
    let daily_usage = sanitize_amount(daily_usage);
    let unit_cost = sanitize_amount(unit_cost);

    let daily_cost = daily_usage * unit_cost;
    let yearly_spending = round_whole(daily_cost * DAYS_PER_YEAR);
    let yearly_usage = round_whole(daily_usage * DAYS_PER_YEAR);
    let max_years = duration.map(|d| d.max_years()).unwrap_or(0);
    let total_spent_lifetime = round_whole(yearly_spending as f64 * f64::from(max_years));

    HabitStats {
        yearly_usage,
        yearly_spending,
        total_spent_lifetime,
        label: UnitLabel::for_product(product),
    }
}

impl HabitStats {
    pub fn from_draft(draft: &OnboardingDraft) -> Self {
        compute_stats(
            draft.daily_usage,
            draft.unit_cost,
            draft.duration_bucket,
            draft.product_type,
        )
    }
}

/// Round half away from zero. Inputs are already non-negative; the `as`
/// cast saturates anything too large for `u64`.
fn round_whole(value: f64) -> u64 {
    value.round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onboarding::model::parse_amount;

    #[test]
    fn two_packs_at_eight_for_five_to_ten_years() {
        let stats = compute_stats(
            2.0,
            8.0,
            Some(DurationBucket::FiveToTenYears),
            Some(ProductType::Cigarettes),
        );
        assert_eq!(stats.yearly_spending, 5840);
        assert_eq!(stats.yearly_usage, 730);
        assert_eq!(stats.total_spent_lifetime, 58400);
        assert_eq!(stats.label.plural, "cigarettes");
    }

    #[test]
    fn lifetime_uses_bucket_upper_bound() {
        let expected = [5u64, 10, 20, 35];
        for (bucket, years) in DurationBucket::ALL.into_iter().zip(expected) {
            let stats = compute_stats(1.0, 1.0, Some(bucket), None);
            assert_eq!(stats.total_spent_lifetime, 365 * years, "{bucket}");
        }
    }

    #[test]
    fn unset_duration_means_no_lifetime_total() {
        let stats = compute_stats(2.0, 8.0, None, Some(ProductType::Dip));
        assert_eq!(stats.yearly_spending, 5840);
        assert_eq!(stats.total_spent_lifetime, 0);
    }

    #[test]
    fn unparseable_usage_matches_zero() {
        let bucket = Some(DurationBucket::Over20Years);
        let product = Some(ProductType::Pouches);
        let garbage = compute_stats(parse_amount("lots"), 6.0, bucket, product);
        let zero = compute_stats(0.0, 6.0, bucket, product);
        assert_eq!(garbage, zero);
        assert_eq!(garbage.yearly_spending, 0);
    }

    #[test]
    fn nan_and_negative_inputs_never_leak() {
        let stats = compute_stats(f64::NAN, f64::INFINITY, Some(DurationBucket::Under5Years), None);
        assert_eq!(stats.yearly_usage, 0);
        assert_eq!(stats.yearly_spending, 0);
        assert_eq!(stats.total_spent_lifetime, 0);

        let negative = compute_stats(-2.0, 8.0, Some(DurationBucket::Under5Years), None);
        assert_eq!(negative.yearly_spending, 0);
    }

    #[test]
    fn fractional_inputs_round() {
        // 1.5 * 6.5 * 365 = 3558.75
        let stats = compute_stats(1.5, 6.5, Some(DurationBucket::Under5Years), None);
        assert_eq!(stats.yearly_spending, 3559);
        assert_eq!(stats.yearly_usage, 548);
        assert_eq!(stats.total_spent_lifetime, 3559 * 5);
    }

    #[test]
    fn labels_per_product() {
        assert_eq!(UnitLabel::for_product(None).singular, "cigarette");
        assert_eq!(UnitLabel::for_product(Some(ProductType::VapeDisposable)).plural, "vapes");
        assert_eq!(UnitLabel::for_product(Some(ProductType::Pouches)).singular, "pouch");
        assert_eq!(UnitLabel::for_product(Some(ProductType::Dip)).unit, "cans");
    }

    #[test]
    fn from_draft_uses_draft_fields() {
        let draft = OnboardingDraft {
            product_type: Some(ProductType::VapeDisposable),
            daily_usage: 1.0,
            unit_cost: 9.0,
            duration_bucket: Some(DurationBucket::TenToTwentyYears),
            ..Default::default()
        };
        let stats = HabitStats::from_draft(&draft);
        assert_eq!(stats.yearly_spending, 3285);
        assert_eq!(stats.total_spent_lifetime, 65700);
        assert_eq!(stats.label.singular, "vape");
    }
}
