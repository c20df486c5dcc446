//! Booking configuration.
//!
//! Loaded from `WARDROBE_*` environment variables; anything missing or
//! unparsable falls back to the default.

use std::env;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use wardrobe_rentals::{RefundPolicy, ShippingRates};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingConfig {
    /// Days an asset stays blocked after the rental ends (cleaning, inspection).
    pub buffer_days: u32,
    /// Time a customer has to pay the deposit.
    pub deposit_window_hours: i64,
    pub refund: RefundPolicy,
    /// Platform share of rental revenue, in percent.
    pub platform_fee_percent: u8,
    pub shipping: ShippingRates,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            buffer_days: 1,
            deposit_window_hours: 24,
            refund: RefundPolicy::default(),
            platform_fee_percent: 50,
            shipping: ShippingRates::default(),
        }
    }
}

impl BookingConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`BookingConfig::from_env`] with an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let amount = |key: &str| parsed::<i64>(&lookup, key);

        Self {
            buffer_days: parsed(&lookup, "WARDROBE_BUFFER_DAYS").unwrap_or(defaults.buffer_days),
            deposit_window_hours: parsed(&lookup, "WARDROBE_DEPOSIT_WINDOW_HOURS")
                .unwrap_or(defaults.deposit_window_hours),
            refund: RefundPolicy {
                full_refund_window_hours: parsed(&lookup, "WARDROBE_FULL_REFUND_WINDOW_HOURS")
                    .unwrap_or(defaults.refund.full_refund_window_hours),
                late_refund_percent: parsed::<u8>(&lookup, "WARDROBE_LATE_REFUND_PERCENT")
                    .map(|p| p.min(100))
                    .unwrap_or(defaults.refund.late_refund_percent),
            },
            platform_fee_percent: parsed::<u8>(&lookup, "WARDROBE_PLATFORM_FEE_PERCENT")
                .map(|p| p.min(100))
                .unwrap_or(defaults.platform_fee_percent),
            shipping: ShippingRates {
                quick: amount("WARDROBE_SHIPPING_QUICK").unwrap_or(defaults.shipping.quick),
                parcel: amount("WARDROBE_SHIPPING_PARCEL").unwrap_or(defaults.shipping.parcel),
                bundle: amount("WARDROBE_SHIPPING_BUNDLE").unwrap_or(defaults.shipping.bundle),
                unspecified: amount("WARDROBE_SHIPPING_UNSPECIFIED")
                    .unwrap_or(defaults.shipping.unspecified),
            },
        }
    }

    pub fn deposit_window(&self) -> Duration {
        Duration::hours(self.deposit_window_hours)
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|raw| raw.trim().parse().ok())
}
