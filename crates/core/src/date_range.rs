//! Inclusive calendar date ranges.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Wire format for calendar dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(raw: &str) -> DomainResult<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.len() != 10 {
        return Err(DomainError::validation(format!(
            "date '{raw}' must be formatted as YYYY-MM-DD"
        )));
    }
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .map_err(|e| DomainError::validation(format!("date '{raw}' is invalid: {e}")))
}

/// Inclusive `[start, end]` range of calendar dates with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl ValueObject for DateRange {}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> DomainResult<Self> {
        if start > end {
            return Err(DomainError::validation(format!(
                "start date {start} is after end date {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse both ends from `YYYY-MM-DD` strings.
    ///
    /// Fails fast with a validation error; callers rely on this happening before
    /// any store access.
    pub fn parse(start: &str, end: &str) -> DomainResult<Self> {
        Self::new(parse_date(start)?, parse_date(end)?)
    }

    /// Like `new`, but additionally requires `start < end`.
    pub fn strict(start: NaiveDate, end: NaiveDate) -> DomainResult<Self> {
        if start >= end {
            return Err(DomainError::validation(format!(
                "start date {start} must be before end date {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Inclusive overlap test: `NOT (self.end < other.start OR self.start > other.end)`.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        !(self.end < other.start || self.start > other.end)
    }

    pub fn contains(&self, other: &DateRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Whole days between start and end.
    pub fn nights(&self) -> u32 {
        u32::try_from((self.end - self.start).num_days()).unwrap_or(0)
    }

    /// Days charged for a rental over this range; a same-day rental is one day.
    pub fn billable_days(&self) -> u32 {
        self.nights().max(1)
    }

    /// Same start, end pushed out by `days` (buffer for cleaning/inspection).
    pub fn extend_end(&self, days: u32) -> DomainResult<Self> {
        let end = self
            .end
            .checked_add_days(Days::new(u64::from(days)))
            .ok_or_else(|| DomainError::validation("date range extends past the calendar"))?;
        Ok(Self {
            start: self.start,
            end,
        })
    }

    /// `extend_end` clamped at the last representable date.
    pub fn saturating_extend_end(&self, days: u32) -> Self {
        Self {
            start: self.start,
            end: self
                .end
                .checked_add_days(Days::new(u64::from(days)))
                .unwrap_or(NaiveDate::MAX),
        }
    }

    /// Smallest range covering both.
    pub fn union(&self, other: &DateRange) -> DateRange {
        DateRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl core::fmt::Display for DateRange {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{}..={}",
            self.start.format(DATE_FORMAT),
            self.end.format(DATE_FORMAT)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: &str, end: &str) -> DateRange {
        DateRange::parse(start, end).unwrap()
    }

    #[test]
    fn parse_rejects_malformed_dates() {
        for bad in ["2024/06/01", "2024-6-1", "tomorrow", "", "2024-02-30"] {
            let err = DateRange::parse(bad, "2024-06-03").unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)), "accepted {bad:?}");
        }
    }

    #[test]
    fn parse_rejects_inverted_range() {
        let err = DateRange::parse("2024-06-03", "2024-06-01").unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn single_day_range_is_valid_but_not_strict() {
        let day = parse_date("2024-06-01").unwrap();
        assert!(DateRange::new(day, day).is_ok());
        assert!(DateRange::strict(day, day).is_err());
    }

    #[test]
    fn overlap_is_inclusive_on_both_ends() {
        let booked = range("2024-06-01", "2024-06-04");
        assert!(booked.overlaps(&range("2024-06-04", "2024-06-06")));
        assert!(booked.overlaps(&range("2024-05-28", "2024-06-01")));
        assert!(booked.overlaps(&range("2024-06-02", "2024-06-02")));
        assert!(!booked.overlaps(&range("2024-06-05", "2024-06-07")));
        assert!(!booked.overlaps(&range("2024-05-20", "2024-05-31")));
    }

    #[test]
    fn billable_days_counts_whole_days() {
        assert_eq!(range("2024-06-01", "2024-06-03").billable_days(), 2);
        assert_eq!(range("2024-06-01", "2024-06-01").billable_days(), 1);
        assert_eq!(range("2024-02-28", "2024-03-01").billable_days(), 2);
    }

    #[test]
    fn extend_end_adds_buffer_days() {
        let extended = range("2024-06-01", "2024-06-03").extend_end(1).unwrap();
        assert_eq!(extended, range("2024-06-01", "2024-06-04"));
    }

    #[test]
    fn display_uses_wire_format() {
        assert_eq!(range("2024-06-01", "2024-06-03").to_string(), "2024-06-01..=2024-06-03");
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn arb_range() -> impl Strategy<Value = DateRange> {
            (0i64..400, 0i64..30).prop_map(|(offset, len)| {
                let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
                let start = base + chrono::Duration::days(offset);
                DateRange::new(start, start + chrono::Duration::days(len)).unwrap()
            })
        }

        proptest! {
            /// Property: overlap is symmetric.
            #[test]
            fn overlap_is_symmetric(a in arb_range(), b in arb_range()) {
                prop_assert_eq!(a.overlaps(&b), b.overlaps(&a));
            }

            /// Property: a range always overlaps its own extension and the union contains both.
            #[test]
            fn union_contains_both(a in arb_range(), b in arb_range(), buffer in 0u32..5) {
                let extended = a.extend_end(buffer).unwrap();
                prop_assert!(extended.overlaps(&a));
                prop_assert!(extended.contains(&a));
                let u = a.union(&b);
                prop_assert!(u.contains(&a) && u.contains(&b));
            }
        }
    }
}
