//! Cancellation refund rules.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Refund schedule applied when a customer cancels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundPolicy {
    /// Cancellations within this many hours of ordering get a full refund.
    pub full_refund_window_hours: i64,
    /// Refund percentage after the window.
    pub late_refund_percent: u8,
}

impl Default for RefundPolicy {
    fn default() -> Self {
        Self {
            full_refund_window_hours: 24,
            late_refund_percent: 50,
        }
    }
}

/// Outcome of applying a [`RefundPolicy`] to an order total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundQuote {
    pub rate_percent: u8,
    pub refund_amount: i64,
    pub cancellation_fee: i64,
}

impl RefundPolicy {
    pub fn rate_at(&self, ordered_at: DateTime<Utc>, now: DateTime<Utc>) -> u8 {
        if now - ordered_at <= Duration::hours(self.full_refund_window_hours) {
            100
        } else {
            self.late_refund_percent.min(100)
        }
    }

    /// Refund is floored; the fee takes the remainder so both always add up to `total`.
    pub fn quote(&self, total: i64, ordered_at: DateTime<Utc>, now: DateTime<Utc>) -> RefundQuote {
        let rate_percent = self.rate_at(ordered_at, now);
        let refund_amount = total.saturating_mul(i64::from(rate_percent)) / 100;
        RefundQuote {
            rate_percent,
            refund_amount,
            cancellation_fee: total - refund_amount,
        }
    }
}
