//! `wardrobe-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! typed ids, the error taxonomy, aggregate traits, calendar ranges and the
//! injectable clock.

pub mod aggregate;
pub mod clock;
pub mod date_range;
pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion, execute};
pub use clock::{Clock, ManualClock, SystemClock};
pub use date_range::{DATE_FORMAT, DateRange, parse_date};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{
    AssetId, BlockedPeriodId, CartId, CartItemId, CategoryId, IssueId, OrderId, ProductId,
    RentalId, SettlementId, SupplierId, UserId,
};
pub use value_object::ValueObject;
