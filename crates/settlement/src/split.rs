//! Revenue split between the platform and suppliers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use wardrobe_core::{DomainError, DomainResult, SupplierId};

/// Gross amount divided into platform fee and supplier payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSplit {
    pub gross_amount: i64,
    pub platform_fee_percent: u8,
    pub platform_fee_amount: i64,
    pub supplier_amount: i64,
}

impl FeeSplit {
    /// Fee is floored; the supplier gets the remainder.
    pub fn new(gross_amount: i64, platform_fee_percent: u8) -> DomainResult<Self> {
        if gross_amount < 0 {
            return Err(DomainError::validation("gross amount cannot be negative"));
        }
        if platform_fee_percent > 100 {
            return Err(DomainError::validation("platform fee cannot exceed 100%"));
        }
        let platform_fee_amount = gross_amount
            .checked_mul(i64::from(platform_fee_percent))
            .ok_or_else(|| DomainError::validation("gross amount too large"))?
            / 100;
        Ok(Self {
            gross_amount,
            platform_fee_percent,
            platform_fee_amount,
            supplier_amount: gross_amount - platform_fee_amount,
        })
    }

    /// Issue charges go to the supplier untouched.
    pub fn pass_through(gross_amount: i64) -> DomainResult<Self> {
        Self::new(gross_amount, 0)
    }
}

/// Sum line amounts per supplier, ordered by supplier id.
pub fn gross_by_supplier(
    lines: impl IntoIterator<Item = (SupplierId, i64)>,
) -> DomainResult<BTreeMap<SupplierId, i64>> {
    let mut totals = BTreeMap::new();
    for (supplier, amount) in lines {
        let entry: &mut i64 = totals.entry(supplier).or_insert(0);
        *entry = entry
            .checked_add(amount)
            .ok_or_else(|| DomainError::validation("supplier total overflows"))?;
    }
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_gross_splits_in_half() {
        let split = FeeSplit::new(40_000, 50).unwrap();
        assert_eq!(split.platform_fee_amount, 20_000);
        assert_eq!(split.supplier_amount, 20_000);
    }

    #[test]
    fn odd_gross_favours_supplier() {
        let split = FeeSplit::new(10_001, 50).unwrap();
        assert_eq!(split.platform_fee_amount, 5_000);
        assert_eq!(split.supplier_amount, 5_001);
    }

    #[test]
    fn pass_through_has_no_fee() {
        let split = FeeSplit::pass_through(8_000).unwrap();
        assert_eq!(split.platform_fee_amount, 0);
        assert_eq!(split.supplier_amount, 8_000);
    }

    #[test]
    fn totals_are_grouped_per_supplier() {
        let a = SupplierId::new();
        let b = SupplierId::new();
        let totals = gross_by_supplier([(a, 20_000), (b, 5_000), (a, 20_000)]).unwrap();
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[&a], 40_000);
        assert_eq!(totals[&b], 5_000);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn fee_and_payout_add_up(gross in 0i64..1_000_000_000, rate in 0u8..=100) {
                let split = FeeSplit::new(gross, rate).unwrap();
                prop_assert_eq!(split.platform_fee_amount + split.supplier_amount, gross);
                prop_assert!(split.platform_fee_amount <= split.supplier_amount || rate > 50);
            }

            #[test]
            fn half_split_of_even_gross_is_exact(half in 0i64..500_000_000) {
                let split = FeeSplit::new(half * 2, 50).unwrap();
                prop_assert_eq!(split.platform_fee_amount, half);
                prop_assert_eq!(split.supplier_amount, half);
            }

            #[test]
            fn issue_split_keeps_everything_with_supplier(gross in 0i64..1_000_000_000) {
                let split = FeeSplit::pass_through(gross).unwrap();
                prop_assert_eq!(split.supplier_amount, gross);
                prop_assert_eq!(split.platform_fee_amount, 0);
            }
        }
    }
}
