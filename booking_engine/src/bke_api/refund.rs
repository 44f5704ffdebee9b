//! The cancellation refund policy.
//!
//! Refunds are tiered on lead time: how long before the service starts the cancellation lands.
//! Cancel early and most of the money comes back; cancel at the door and none of it does.

use bkg_common::Money;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One rung of the refund ladder: cancellations with strictly more than `hours_before` hours of
/// lead time refund `percent` of the collected amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundTier {
    pub hours_before: i64,
    pub percent: u8,
}

impl RefundTier {
    pub const fn new(hours_before: i64, percent: u8) -> Self {
        Self { hours_before, percent }
    }
}

/// An ordered refund ladder. Tiers are kept sorted by lead time, most generous first, and the
/// first tier the cancellation clears decides the percentage. A cancellation that clears no tier
/// refunds nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundPolicy {
    tiers: Vec<RefundTier>,
}

impl Default for RefundPolicy {
    /// The standard ladder: 100% with more than 72h of lead time, then 75% (48h), 50% (24h),
    /// 25% (12h), and nothing inside 12 hours.
    fn default() -> Self {
        Self::new(vec![
            RefundTier::new(72, 100),
            RefundTier::new(48, 75),
            RefundTier::new(24, 50),
            RefundTier::new(12, 25),
        ])
    }
}

impl RefundPolicy {
    pub fn new(mut tiers: Vec<RefundTier>) -> Self {
        tiers.sort_by(|a, b| b.hours_before.cmp(&a.hours_before));
        Self { tiers }
    }

    pub fn tiers(&self) -> &[RefundTier] {
        &self.tiers
    }

    /// The refund percentage for a cancellation happening at `now` against a service starting at
    /// `service_start`. Tier boundaries are exclusive: cancelling exactly 48h ahead earns the
    /// 24h-tier rate, not the 48h one.
    pub fn percent_for(&self, now: DateTime<Utc>, service_start: DateTime<Utc>) -> u8 {
        let lead_time = service_start - now;
        self.tiers.iter().find(|tier| lead_time > Duration::hours(tier.hours_before)).map(|t| t.percent).unwrap_or(0)
    }

    /// What a cancellation at `now` would refund from `collected`. Rounds toward zero, so the
    /// traveller never receives more than the percentage of what they paid.
    pub fn refund_due(&self, collected: Money, now: DateTime<Utc>, service_start: DateTime<Utc>) -> Money {
        collected.percent(self.percent_for(now, service_start))
    }
}
