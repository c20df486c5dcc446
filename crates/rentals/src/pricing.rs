//! Line amounts and shipping fees.

use serde::{Deserialize, Serialize};

use wardrobe_core::{DateRange, DomainError, DomainResult};

/// How the goods travel to the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMethod {
    Quick,
    Parcel,
    Bundle,
}

impl DeliveryMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryMethod::Quick => "quick",
            DeliveryMethod::Parcel => "parcel",
            DeliveryMethod::Bundle => "bundle",
        }
    }
}

impl core::str::FromStr for DeliveryMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quick" => Ok(DeliveryMethod::Quick),
            "parcel" => Ok(DeliveryMethod::Parcel),
            "bundle" => Ok(DeliveryMethod::Bundle),
            other => Err(DomainError::validation(format!("unknown delivery method '{other}'"))),
        }
    }
}

/// Payment method. Only manual bank transfer is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    BankTransfer,
}

/// Flat shipping fee per delivery method, in smallest currency unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingRates {
    pub quick: i64,
    pub parcel: i64,
    pub bundle: i64,
    /// Charged when the customer did not pick a method.
    pub unspecified: i64,
}

impl Default for ShippingRates {
    fn default() -> Self {
        Self {
            quick: 15_000,
            parcel: 5_000,
            bundle: 0,
            unspecified: 5_000,
        }
    }
}

impl ShippingRates {
    pub fn fee(&self, method: Option<DeliveryMethod>) -> i64 {
        match method {
            Some(DeliveryMethod::Quick) => self.quick,
            Some(DeliveryMethod::Parcel) => self.parcel,
            Some(DeliveryMethod::Bundle) => self.bundle,
            None => self.unspecified,
        }
    }
}

/// `daily_rate × billable days × quantity`.
pub fn line_amount(daily_rate: i64, period: &DateRange, quantity: u32) -> DomainResult<i64> {
    if daily_rate < 0 {
        return Err(DomainError::validation("daily rate cannot be negative"));
    }
    daily_rate
        .checked_mul(i64::from(period.billable_days()))
        .and_then(|v| v.checked_mul(i64::from(quantity)))
        .ok_or_else(|| DomainError::validation("line amount overflows"))
}
