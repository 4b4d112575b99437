//! Step titles, answer options, and offer copy.

use super::model::{DurationBucket, ProductType};
use super::state::Step;
use super::stats::HabitStats;

/// Daily usage choices offered on the usage step.
pub const DAILY_USAGE_OPTIONS: [u32; 5] = [1, 2, 3, 4, 5];

/// Per-unit cost choices (dollars) offered on the cost step.
pub const UNIT_COST_OPTIONS: [u32; 4] = [6, 7, 8, 9];

/// Full program price shown on the first offer.
pub const FULL_PRICE: &str = "$79";

/// Discounted price shown on the flash sale.
pub const FLASH_SALE_PRICE: &str = "$19.99";

/// Title shown above the inputs of a step.
pub fn step_title(step: Step, product: Option<ProductType>) -> String {
    use ProductType::*;
    match step {
        Step::ProductType => "What are you quitting?".to_string(),
        Step::DailyUsage => {
            let unit = match product {
                Some(Cigarettes) => "Packs",
                Some(VapeDisposable) => "Vapes",
                Some(Pouches) => "Pouches",
                Some(Dip) => "Cans",
                None => return "How Many Per Day?".to_string(),
            };
            format!("How Many {unit} Per Day?")
        }
        Step::UnitCost => {
            let unit = match product {
                Some(Cigarettes) => "Pack",
                Some(VapeDisposable) => "Vape",
                Some(Pouches) => "Pouch",
                Some(Dip) => "Can",
                None => "Unit",
            };
            format!("Cost Per {unit}")
        }
        Step::Duration => {
            let habit = match product {
                Some(Cigarettes) => "smoking",
                Some(VapeDisposable) => "vaping",
                Some(Pouches) => "using pouches",
                Some(Dip) => "dipping",
                None => "using",
            };
            format!("How long have you been {habit}?")
        }
        Step::Identity => "Create Account".to_string(),
        Step::Offer { flash_sale: false } => "Start your journey".to_string(),
        Step::Offer { flash_sale: true } => "WAIT! EXCLUSIVE FLASH SALE".to_string(),
        Step::Credentials => "Create your account".to_string(),
        Step::Provisioned => "Your journey begins!".to_string(),
    }
}

/// Headline for the offer step, built from the user's numbers.
pub fn offer_pitch(flash_sale: bool, stats: &HabitStats) -> String {
    if flash_sale {
        format!(
            "Save ${}/year for just {FLASH_SALE_PRICE}!",
            group_thousands(stats.yearly_spending)
        )
    } else {
        format!(
            "Invest just {FULL_PRICE} today to break free and save ${}/year!",
            group_thousands(stats.yearly_spending)
        )
    }
}

/// Scarcity line for the flash sale.
pub fn seats_line(seats: u32) -> String {
    if seats > 1 {
        format!("Only {seats} spots left at this price")
    } else {
        "Last spot at this price!".to_string()
    }
}

/// Render seconds as `m:ss`.
pub fn format_countdown(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// `1234567` → `"1,234,567"`.
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Labels for the duration choices, in display order.
pub fn duration_options() -> [(DurationBucket, &'static str); 4] {
    DurationBucket::ALL.map(|b| (b, b.label()))
}
