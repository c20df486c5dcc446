use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use wardrobe_core::{BlockedPeriodId, DateRange, DomainError, DomainResult, ProductId, UserId};

/// Admin-entered hold on a product (maintenance, photo shoot, repairs).
///
/// Applies to the product as a whole, not to a specific asset, and is only used
/// for "at least one unit blocked" reporting; asset assignment ignores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedPeriod {
    pub id: BlockedPeriodId,
    pub product_id: ProductId,
    pub period: DateRange,
    pub reason: String,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl BlockedPeriod {
    pub fn new(
        product_id: ProductId,
        period: DateRange,
        reason: impl Into<String>,
        created_by: UserId,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(DomainError::validation("blocked period needs a reason"));
        }
        Ok(Self {
            id: BlockedPeriodId::new(),
            product_id,
            period,
            reason: reason.trim().to_string(),
            created_by,
            created_at,
        })
    }

    pub fn blocks(&self, range: &DateRange) -> bool {
        self.period.overlaps(range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_reason() {
        let period = DateRange::parse("2024-06-01", "2024-06-05").unwrap();
        let err = BlockedPeriod::new(ProductId::new(), period, " ", UserId::new(), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn blocks_overlapping_ranges_only() {
        let period = DateRange::parse("2024-06-01", "2024-06-05").unwrap();
        let blocked =
            BlockedPeriod::new(ProductId::new(), period, "re-stitching hem", UserId::new(), Utc::now()).unwrap();
        assert!(blocked.blocks(&DateRange::parse("2024-06-05", "2024-06-08").unwrap()));
        assert!(!blocked.blocks(&DateRange::parse("2024-06-06", "2024-06-08").unwrap()));
    }
}
