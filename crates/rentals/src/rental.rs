use serde::{Deserialize, Serialize};

use wardrobe_core::{AssetId, DateRange, DomainResult, Entity, OrderId, ProductId, RentalId};

use crate::pricing::line_amount;
use crate::status::{RentalAction, RentalStatus};

/// One asset reserved for one date range, owned by an order.
///
/// The blocked interval is always derived from the rental dates
/// (`end + buffer_days`); it is not part of the stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rental {
    id: RentalId,
    order_id: OrderId,
    asset_id: AssetId,
    product_id: ProductId,
    period: DateRange,
    buffer_days: u32,
    status: RentalStatus,
    quantity: u32,
    /// Daily rate snapshot in smallest currency unit.
    rental_rate: i64,
    cancel_reason: Option<String>,
}

/// Input for one rental within a new order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalLine {
    pub rental_id: RentalId,
    pub asset_id: AssetId,
    pub product_id: ProductId,
    pub period: DateRange,
    pub buffer_days: u32,
    pub rental_rate: i64,
}

impl Rental {
    /// New `requested` rental of a single asset.
    pub fn book(order_id: OrderId, line: &RentalLine) -> DomainResult<Self> {
        // validates the rate and the amount's range up front
        line_amount(line.rental_rate, &line.period, 1)?;
        line.period.extend_end(line.buffer_days)?;
        Ok(Self {
            id: line.rental_id,
            order_id,
            asset_id: line.asset_id,
            product_id: line.product_id,
            period: line.period,
            buffer_days: line.buffer_days,
            status: RentalStatus::Requested,
            quantity: 1,
            rental_rate: line.rental_rate,
            cancel_reason: None,
        })
    }

    pub fn id_typed(&self) -> RentalId {
        self.id
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn asset_id(&self) -> AssetId {
        self.asset_id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn period(&self) -> DateRange {
        self.period
    }

    pub fn buffer_days(&self) -> u32 {
        self.buffer_days
    }

    /// `[start, end + buffer_days]`
    pub fn blocked(&self) -> DateRange {
        self.period.saturating_extend_end(self.buffer_days)
    }

    pub fn status(&self) -> RentalStatus {
        self.status
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn rental_rate(&self) -> i64 {
        self.rental_rate
    }

    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }

    pub fn days(&self) -> u32 {
        self.period.billable_days()
    }

    /// `rental_rate × days × quantity`; validated at booking.
    pub fn amount(&self) -> i64 {
        self.rental_rate
            .saturating_mul(i64::from(self.days()))
            .saturating_mul(i64::from(self.quantity))
    }

    pub fn is_blocking(&self) -> bool {
        self.status.is_blocking()
    }

    /// True if this rental holds its asset anywhere in `range`.
    pub fn blocks(&self, range: &DateRange) -> bool {
        self.is_blocking() && self.blocked().overlaps(range)
    }

    /// Two rentals that would double-book the same asset.
    pub fn collides_with(&self, other: &Rental) -> bool {
        self.asset_id == other.asset_id
            && self.is_blocking()
            && other.is_blocking()
            && self.blocked().overlaps(&other.blocked())
    }

    pub(crate) fn check(&self, action: RentalAction) -> DomainResult<RentalStatus> {
        self.status.next(action)
    }

    pub(crate) fn set_status(&mut self, status: RentalStatus) {
        self.status = status;
    }

    pub(crate) fn set_cancel_reason(&mut self, reason: &str) {
        self.cancel_reason = Some(reason.to_string());
    }
}

impl Entity for Rental {
    type Id = RentalId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
