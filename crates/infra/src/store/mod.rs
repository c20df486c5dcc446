//! Storage abstraction for the booking core.
//!
//! Aggregates are stored as current state keyed by their typed id; every write
//! carries an [`ExpectedVersion`] checked against the stored aggregate version.
//! Relations are explicit foreign-key ids (order → rentals → asset → product →
//! supplier); lookups go through the query methods below, never through
//! back-references on the entities.
//!
//! The in-memory implementation backs tests and the demo; a database adapter
//! would implement the same traits.

mod in_memory;

pub use in_memory::InMemoryStore;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use wardrobe_catalog::{Asset, BlockedPeriod, Product};
use wardrobe_core::{
    AssetId, BlockedPeriodId, ExpectedVersion, IssueId, OrderId, ProductId, RentalId,
    SettlementId, SupplierId, UserId,
};
use wardrobe_rentals::{Cart, Order, Rental, RentalIssue};
use wardrobe_settlement::Settlement;

use crate::error::StoreError;

pub type StoreResult<T> = Result<T, StoreError>;

/// Catalog rows read by the booking core (plus the admin writes it owns).
pub trait CatalogStore: Send + Sync {
    fn product(&self, product_id: ProductId) -> StoreResult<Option<Product>>;
    fn save_product(&self, product: &Product, expected: ExpectedVersion) -> StoreResult<()>;

    fn asset(&self, asset_id: AssetId) -> StoreResult<Option<Asset>>;
    fn save_asset(&self, asset: &Asset, expected: ExpectedVersion) -> StoreResult<()>;

    /// Every asset of the product regardless of status, ordered by asset code.
    ///
    /// The ordering makes first-fit assignment deterministic.
    fn assets_of_product(&self, product_id: ProductId) -> StoreResult<Vec<Asset>>;

    fn blocked_periods(&self, product_id: ProductId) -> StoreResult<Vec<BlockedPeriod>>;
    fn insert_blocked_period(&self, period: BlockedPeriod) -> StoreResult<()>;
    fn remove_blocked_period(
        &self,
        blocked_period_id: BlockedPeriodId,
    ) -> StoreResult<Option<BlockedPeriod>>;
}

/// One cart per user.
pub trait CartStore: Send + Sync {
    fn cart_of_user(&self, user_id: UserId) -> StoreResult<Option<Cart>>;
    fn save_cart(&self, cart: &Cart, expected: ExpectedVersion) -> StoreResult<()>;
}

/// Orders together with the rentals they own.
pub trait OrderStore: Send + Sync {
    fn order(&self, order_id: OrderId) -> StoreResult<Option<Order>>;

    /// Commit a new order and all of its rentals atomically.
    ///
    /// Under the store's write lock, every rental of the order is re-checked
    /// against committed blocking rentals on the same asset; a collision fails
    /// the whole insert with [`StoreError::Overlap`].
    fn insert_order(&self, order: &Order) -> StoreResult<()>;

    fn save_order(&self, order: &Order, expected: ExpectedVersion) -> StoreResult<()>;

    /// Rentals of any status on the given assets.
    fn rentals_for_assets(&self, asset_ids: &[AssetId]) -> StoreResult<Vec<Rental>>;

    fn orders_of_user(&self, user_id: UserId) -> StoreResult<Vec<Order>>;
    fn order_of_rental(&self, rental_id: RentalId) -> StoreResult<Option<Order>>;

    /// Open, unpaid orders whose deposit deadline passed before `now`.
    fn overdue_orders(&self, now: DateTime<Utc>) -> StoreResult<Vec<Order>>;
}

pub trait SettlementStore: Send + Sync {
    fn settlement(&self, settlement_id: SettlementId) -> StoreResult<Option<Settlement>>;

    /// Commit the rental settlements of one order at once.
    ///
    /// Fails with [`StoreError::Duplicate`] if the order already has rental
    /// settlements.
    fn insert_order_settlements(
        &self,
        order_id: OrderId,
        settlements: &[Settlement],
    ) -> StoreResult<()>;

    fn save_settlement(&self, settlement: &Settlement, expected: ExpectedVersion)
    -> StoreResult<()>;

    fn settlements_of_order(&self, order_id: OrderId) -> StoreResult<Vec<Settlement>>;
    fn settlements_of_supplier(&self, supplier_id: SupplierId) -> StoreResult<Vec<Settlement>>;
}

pub trait IssueStore: Send + Sync {
    fn issue(&self, issue_id: IssueId) -> StoreResult<Option<RentalIssue>>;
    fn save_issue(&self, issue: &RentalIssue) -> StoreResult<()>;
    fn issues_of_order(&self, order_id: OrderId) -> StoreResult<Vec<RentalIssue>>;
}

/// Everything the marketplace services need from storage.
pub trait Store: CatalogStore + CartStore + OrderStore + SettlementStore + IssueStore {}

impl<T> Store for T where T: CatalogStore + CartStore + OrderStore + SettlementStore + IssueStore {}

macro_rules! forward_through_arc {
    ($tr:ident { $(fn $name:ident(&self $(, $arg:ident: $ty:ty)*) -> $ret:ty;)* }) => {
        impl<S> $tr for Arc<S>
        where
            S: $tr + ?Sized,
        {
            $(
                fn $name(&self $(, $arg: $ty)*) -> $ret {
                    (**self).$name($($arg),*)
                }
            )*
        }
    };
}

forward_through_arc!(CatalogStore {
    fn product(&self, product_id: ProductId) -> StoreResult<Option<Product>>;
    fn save_product(&self, product: &Product, expected: ExpectedVersion) -> StoreResult<()>;
    fn asset(&self, asset_id: AssetId) -> StoreResult<Option<Asset>>;
    fn save_asset(&self, asset: &Asset, expected: ExpectedVersion) -> StoreResult<()>;
    fn assets_of_product(&self, product_id: ProductId) -> StoreResult<Vec<Asset>>;
    fn blocked_periods(&self, product_id: ProductId) -> StoreResult<Vec<BlockedPeriod>>;
    fn insert_blocked_period(&self, period: BlockedPeriod) -> StoreResult<()>;
    fn remove_blocked_period(&self, blocked_period_id: BlockedPeriodId) -> StoreResult<Option<BlockedPeriod>>;
});

forward_through_arc!(CartStore {
    fn cart_of_user(&self, user_id: UserId) -> StoreResult<Option<Cart>>;
    fn save_cart(&self, cart: &Cart, expected: ExpectedVersion) -> StoreResult<()>;
});

forward_through_arc!(OrderStore {
    fn order(&self, order_id: OrderId) -> StoreResult<Option<Order>>;
    fn insert_order(&self, order: &Order) -> StoreResult<()>;
    fn save_order(&self, order: &Order, expected: ExpectedVersion) -> StoreResult<()>;
    fn rentals_for_assets(&self, asset_ids: &[AssetId]) -> StoreResult<Vec<Rental>>;
    fn orders_of_user(&self, user_id: UserId) -> StoreResult<Vec<Order>>;
    fn order_of_rental(&self, rental_id: RentalId) -> StoreResult<Option<Order>>;
    fn overdue_orders(&self, now: DateTime<Utc>) -> StoreResult<Vec<Order>>;
});

forward_through_arc!(SettlementStore {
    fn settlement(&self, settlement_id: SettlementId) -> StoreResult<Option<Settlement>>;
    fn insert_order_settlements(&self, order_id: OrderId, settlements: &[Settlement]) -> StoreResult<()>;
    fn save_settlement(&self, settlement: &Settlement, expected: ExpectedVersion) -> StoreResult<()>;
    fn settlements_of_order(&self, order_id: OrderId) -> StoreResult<Vec<Settlement>>;
    fn settlements_of_supplier(&self, supplier_id: SupplierId) -> StoreResult<Vec<Settlement>>;
});

forward_through_arc!(IssueStore {
    fn issue(&self, issue_id: IssueId) -> StoreResult<Option<RentalIssue>>;
    fn save_issue(&self, issue: &RentalIssue) -> StoreResult<()>;
    fn issues_of_order(&self, order_id: OrderId) -> StoreResult<Vec<RentalIssue>>;
});
