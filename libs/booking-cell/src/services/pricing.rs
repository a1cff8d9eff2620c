use tracing::debug;

use shared_config::AppConfig;

use crate::models::{MedicalExamination, PriceBreakdown};

pub const ONLINE_DISCOUNT_PERCENT: u32 = 10;
pub const DEPOSIT_PERCENT: u32 = 50;

/// `numerator / denominator` rounded half away from zero, for non-negative amounts.
pub fn round_half_up(numerator: i64, denominator: i64) -> i64 {
    if denominator <= 0 {
        return numerator;
    }
    (2 * numerator + denominator).div_euclid(2 * denominator)
}

pub fn percent_of(amount: i64, percent: u32) -> i64 {
    round_half_up(amount * i64::from(percent), 100)
}

/// Total, online-discounted price and deposit for a set of service prices.
pub fn price_booking<I>(prices: I, discount_percent: u32, deposit_percent: u32) -> PriceBreakdown
where
    I: IntoIterator<Item = i64>,
{
    let discount_percent = discount_percent.min(100);
    let deposit_percent = deposit_percent.min(100);

    let total: i64 = prices.into_iter().map(|price| price.max(0)).sum();
    let discounted = percent_of(total, 100 - discount_percent);
    let deposit = percent_of(discounted, deposit_percent);

    PriceBreakdown {
        total,
        discounted,
        deposit,
        discount_percent,
        deposit_percent,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PricingCalculator {
    discount_percent: u32,
    deposit_percent: u32,
}

impl Default for PricingCalculator {
    fn default() -> Self {
        Self::new(ONLINE_DISCOUNT_PERCENT, DEPOSIT_PERCENT)
    }
}

impl PricingCalculator {
    pub fn new(discount_percent: u32, deposit_percent: u32) -> Self {
        Self {
            discount_percent: discount_percent.min(100),
            deposit_percent: deposit_percent.min(100),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.online_discount_percent, config.deposit_percent)
    }

    pub fn discount_percent(&self) -> u32 {
        self.discount_percent
    }

    pub fn calculate(&self, services: &[&MedicalExamination]) -> PriceBreakdown {
        let breakdown = price_booking(
            services.iter().map(|service| service.price),
            self.discount_percent,
            self.deposit_percent,
        );

        debug!(
            "Priced {} services: total {} discounted {} deposit {}",
            services.len(),
            breakdown.total,
            breakdown.discounted,
            breakdown.deposit
        );

        breakdown
    }
}
