use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use wardrobe_catalog::{Asset, BlockedPeriod, Product};
use wardrobe_core::{
    AggregateRoot, AssetId, BlockedPeriodId, ExpectedVersion, IssueId, OrderId, ProductId,
    RentalId, SettlementId, SupplierId, UserId,
};
use wardrobe_rentals::{Cart, Order, Rental, RentalIssue};
use wardrobe_settlement::{Settlement, SettlementKind};

use super::{CartStore, CatalogStore, IssueStore, OrderStore, SettlementStore, StoreResult};
use crate::error::StoreError;

#[derive(Debug, Default)]
struct Inner {
    products: HashMap<ProductId, Product>,
    assets: HashMap<AssetId, Asset>,
    blocked_periods: HashMap<BlockedPeriodId, BlockedPeriod>,
    carts: HashMap<UserId, Cart>,
    orders: HashMap<OrderId, Order>,
    // asset -> orders holding a rental on it
    orders_by_asset: HashMap<AssetId, Vec<OrderId>>,
    settlements: HashMap<SettlementId, Settlement>,
    issues: HashMap<IssueId, RentalIssue>,
}

impl Inner {
    fn rentals_on(&self, asset_id: AssetId) -> impl Iterator<Item = &Rental> {
        self.orders_by_asset
            .get(&asset_id)
            .into_iter()
            .flatten()
            .filter_map(move |order_id| self.orders.get(order_id))
            .flat_map(|order| order.rentals())
            .filter(move |rental| rental.asset_id() == asset_id)
    }
}

/// In-memory store for tests and the demo.
///
/// A single `RwLock` guards all tables, so a multi-row write (an order with its
/// rentals, the settlements of an order) is atomic.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Inner>> {
        self.inner.read().map_err(|_| StoreError::poisoned())
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Inner>> {
        self.inner.write().map_err(|_| StoreError::poisoned())
    }
}

fn check_version(
    what: &str,
    expected: ExpectedVersion,
    actual: Option<u64>,
) -> StoreResult<()> {
    if expected.matches(actual) {
        Ok(())
    } else {
        Err(StoreError::Concurrency(format!(
            "{what}: expected {expected:?}, found {actual:?}"
        )))
    }
}

impl CatalogStore for InMemoryStore {
    fn product(&self, product_id: ProductId) -> StoreResult<Option<Product>> {
        Ok(self.read()?.products.get(&product_id).cloned())
    }

    fn save_product(&self, product: &Product, expected: ExpectedVersion) -> StoreResult<()> {
        let mut inner = self.write()?;
        let id = product.id_typed();
        check_version(
            &format!("product {id}"),
            expected,
            inner.products.get(&id).map(AggregateRoot::version),
        )?;
        inner.products.insert(id, product.clone());
        Ok(())
    }

    fn asset(&self, asset_id: AssetId) -> StoreResult<Option<Asset>> {
        Ok(self.read()?.assets.get(&asset_id).cloned())
    }

    fn save_asset(&self, asset: &Asset, expected: ExpectedVersion) -> StoreResult<()> {
        let mut inner = self.write()?;
        let id = asset.id_typed();
        check_version(
            &format!("asset {id}"),
            expected,
            inner.assets.get(&id).map(AggregateRoot::version),
        )?;
        if expected == ExpectedVersion::NoStream
            && inner
                .assets
                .values()
                .any(|a| a.asset_code() == asset.asset_code())
        {
            return Err(StoreError::Duplicate(format!(
                "asset code '{}' already in use",
                asset.asset_code()
            )));
        }
        inner.assets.insert(id, asset.clone());
        Ok(())
    }

    fn assets_of_product(&self, product_id: ProductId) -> StoreResult<Vec<Asset>> {
        let inner = self.read()?;
        let mut assets: Vec<Asset> = inner
            .assets
            .values()
            .filter(|a| a.product_id() == Some(product_id))
            .cloned()
            .collect();
        assets.sort_by(|a, b| a.asset_code().cmp(b.asset_code()));
        Ok(assets)
    }

    fn blocked_periods(&self, product_id: ProductId) -> StoreResult<Vec<BlockedPeriod>> {
        let inner = self.read()?;
        let mut periods: Vec<BlockedPeriod> = inner
            .blocked_periods
            .values()
            .filter(|p| p.product_id == product_id)
            .cloned()
            .collect();
        periods.sort_by_key(|p| p.period.start());
        Ok(periods)
    }

    fn insert_blocked_period(&self, period: BlockedPeriod) -> StoreResult<()> {
        let mut inner = self.write()?;
        if inner.blocked_periods.contains_key(&period.id) {
            return Err(StoreError::Duplicate(format!("blocked period {}", period.id)));
        }
        inner.blocked_periods.insert(period.id, period);
        Ok(())
    }

    fn remove_blocked_period(
        &self,
        blocked_period_id: BlockedPeriodId,
    ) -> StoreResult<Option<BlockedPeriod>> {
        Ok(self.write()?.blocked_periods.remove(&blocked_period_id))
    }
}

impl CartStore for InMemoryStore {
    fn cart_of_user(&self, user_id: UserId) -> StoreResult<Option<Cart>> {
        Ok(self.read()?.carts.get(&user_id).cloned())
    }

    fn save_cart(&self, cart: &Cart, expected: ExpectedVersion) -> StoreResult<()> {
        let user_id = cart
            .user_id()
            .ok_or_else(|| StoreError::Storage(format!("cart {} has no owner", cart.id_typed())))?;
        let mut inner = self.write()?;
        check_version(
            &format!("cart of user {user_id}"),
            expected,
            inner.carts.get(&user_id).map(AggregateRoot::version),
        )?;
        inner.carts.insert(user_id, cart.clone());
        Ok(())
    }
}

impl OrderStore for InMemoryStore {
    fn order(&self, order_id: OrderId) -> StoreResult<Option<Order>> {
        Ok(self.read()?.orders.get(&order_id).cloned())
    }

    fn insert_order(&self, order: &Order) -> StoreResult<()> {
        let mut inner = self.write()?;
        let id = order.id_typed();
        check_version(
            &format!("order {id}"),
            ExpectedVersion::NoStream,
            inner.orders.get(&id).map(AggregateRoot::version),
        )?;

        for rental in order.rentals() {
            if inner
                .rentals_on(rental.asset_id())
                .any(|committed| committed.collides_with(rental))
            {
                return Err(StoreError::Overlap {
                    asset_id: rental.asset_id(),
                    product_id: rental.product_id(),
                    interval: rental.blocked(),
                });
            }
        }

        for rental in order.rentals() {
            let holders = inner.orders_by_asset.entry(rental.asset_id()).or_default();
            if !holders.contains(&id) {
                holders.push(id);
            }
        }
        inner.orders.insert(id, order.clone());
        Ok(())
    }

    fn save_order(&self, order: &Order, expected: ExpectedVersion) -> StoreResult<()> {
        let mut inner = self.write()?;
        let id = order.id_typed();
        let actual = inner.orders.get(&id).map(AggregateRoot::version);
        if actual.is_none() {
            return Err(StoreError::Storage(format!("order {id} was never inserted")));
        }
        check_version(&format!("order {id}"), expected, actual)?;
        inner.orders.insert(id, order.clone());
        Ok(())
    }

    fn rentals_for_assets(&self, asset_ids: &[AssetId]) -> StoreResult<Vec<Rental>> {
        let inner = self.read()?;
        Ok(asset_ids
            .iter()
            .flat_map(|asset_id| inner.rentals_on(*asset_id))
            .cloned()
            .collect())
    }

    fn orders_of_user(&self, user_id: UserId) -> StoreResult<Vec<Order>> {
        let inner = self.read()?;
        let mut orders: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| o.user_id() == Some(user_id))
            .cloned()
            .collect();
        orders.sort_by_key(Order::created_at);
        Ok(orders)
    }

    fn order_of_rental(&self, rental_id: RentalId) -> StoreResult<Option<Order>> {
        let inner = self.read()?;
        Ok(inner
            .orders
            .values()
            .find(|o| o.rental(rental_id).is_some())
            .cloned())
    }

    fn overdue_orders(&self, now: DateTime<Utc>) -> StoreResult<Vec<Order>> {
        let inner = self.read()?;
        let mut orders: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| o.is_overdue(now))
            .cloned()
            .collect();
        orders.sort_by_key(Order::deposit_deadline_at);
        Ok(orders)
    }
}

impl SettlementStore for InMemoryStore {
    fn settlement(&self, settlement_id: SettlementId) -> StoreResult<Option<Settlement>> {
        Ok(self.read()?.settlements.get(&settlement_id).cloned())
    }

    fn insert_order_settlements(
        &self,
        order_id: OrderId,
        settlements: &[Settlement],
    ) -> StoreResult<()> {
        let mut inner = self.write()?;
        let already = inner
            .settlements
            .values()
            .any(|s| s.order_id() == Some(order_id) && s.kind() == SettlementKind::Rental);
        if already {
            return Err(StoreError::Duplicate(format!(
                "settlements for order {order_id} already exist"
            )));
        }
        if let Some(dup) = settlements
            .iter()
            .find(|s| inner.settlements.contains_key(&s.id_typed()))
        {
            return Err(StoreError::Duplicate(format!("settlement {}", dup.id_typed())));
        }
        for settlement in settlements {
            inner.settlements.insert(settlement.id_typed(), settlement.clone());
        }
        Ok(())
    }

    fn save_settlement(
        &self,
        settlement: &Settlement,
        expected: ExpectedVersion,
    ) -> StoreResult<()> {
        let mut inner = self.write()?;
        let id = settlement.id_typed();
        check_version(
            &format!("settlement {id}"),
            expected,
            inner.settlements.get(&id).map(AggregateRoot::version),
        )?;
        inner.settlements.insert(id, settlement.clone());
        Ok(())
    }

    fn settlements_of_order(&self, order_id: OrderId) -> StoreResult<Vec<Settlement>> {
        let inner = self.read()?;
        let mut out: Vec<Settlement> = inner
            .settlements
            .values()
            .filter(|s| s.order_id() == Some(order_id))
            .cloned()
            .collect();
        out.sort_by_key(Settlement::id_typed);
        Ok(out)
    }

    fn settlements_of_supplier(&self, supplier_id: SupplierId) -> StoreResult<Vec<Settlement>> {
        let inner = self.read()?;
        let mut out: Vec<Settlement> = inner
            .settlements
            .values()
            .filter(|s| s.supplier_id() == Some(supplier_id))
            .cloned()
            .collect();
        out.sort_by_key(Settlement::id_typed);
        Ok(out)
    }
}

impl IssueStore for InMemoryStore {
    fn issue(&self, issue_id: IssueId) -> StoreResult<Option<RentalIssue>> {
        Ok(self.read()?.issues.get(&issue_id).cloned())
    }

    fn save_issue(&self, issue: &RentalIssue) -> StoreResult<()> {
        self.write()?.issues.insert(issue.id, issue.clone());
        Ok(())
    }

    fn issues_of_order(&self, order_id: OrderId) -> StoreResult<Vec<RentalIssue>> {
        let inner = self.read()?;
        let mut out: Vec<RentalIssue> = inner
            .issues
            .values()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect();
        out.sort_by_key(|i| i.reported_at);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{Duration, NaiveDate, TimeZone};
    use wardrobe_catalog::{AssetCommand, ConditionGrade, RegisterAsset};
    use wardrobe_core::{DateRange, execute};
    use wardrobe_rentals::{
        CancelOrder, OrderCommand, PlaceOrder, RefundPolicy, RentalLine,
    };

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 20, 10, 0, 0).unwrap()
    }

    fn range(start: u32, end: u32) -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 6, start).unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, end).unwrap(),
        )
        .unwrap()
    }

    fn asset(product_id: ProductId, code: &str) -> Asset {
        let id = AssetId::new();
        let mut asset = Asset::empty(id);
        let cmd = AssetCommand::RegisterAsset(RegisterAsset {
            asset_id: id,
            product_id,
            asset_code: code.to_string(),
            condition_grade: ConditionGrade::A,
            occurred_at: at(),
        });
        execute(&mut asset, &cmd).unwrap();
        asset
    }

    fn order_on(user_id: UserId, asset_id: AssetId, product_id: ProductId, period: DateRange) -> Order {
        let order_id = OrderId::new();
        let mut order = Order::empty(order_id);
        let cmd = OrderCommand::PlaceOrder(PlaceOrder {
            order_id,
            user_id,
            period,
            delivery_method: None,
            shipping_address: None,
            shipping_cost: 5000,
            lines: vec![RentalLine {
                rental_id: RentalId::new(),
                asset_id,
                product_id,
                period,
                buffer_days: 1,
                rental_rate: 10000,
            }],
            deposit_deadline_at: at() + Duration::hours(24),
            occurred_at: at(),
        });
        execute(&mut order, &cmd).unwrap();
        order
    }

    #[test]
    fn assets_come_back_ordered_by_code() {
        let store = InMemoryStore::new();
        let product_id = ProductId::new();
        for code in ["C-3", "A-1", "B-2"] {
            store
                .save_asset(&asset(product_id, code), ExpectedVersion::NoStream)
                .unwrap();
        }
        store
            .save_asset(&asset(ProductId::new(), "A-0"), ExpectedVersion::NoStream)
            .unwrap();

        let codes: Vec<String> = store
            .assets_of_product(product_id)
            .unwrap()
            .iter()
            .map(|a| a.asset_code().to_string())
            .collect();
        assert_eq!(codes, vec!["A-1", "B-2", "C-3"]);
    }

    #[test]
    fn duplicate_asset_code_is_refused() {
        let store = InMemoryStore::new();
        let product_id = ProductId::new();
        store
            .save_asset(&asset(product_id, "A-1"), ExpectedVersion::NoStream)
            .unwrap();
        let err = store
            .save_asset(&asset(product_id, "A-1"), ExpectedVersion::NoStream)
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[test]
    fn asset_codes_are_unique_across_products() {
        let store = InMemoryStore::new();
        store
            .save_asset(&asset(ProductId::new(), "TIARA-7"), ExpectedVersion::NoStream)
            .unwrap();
        let err = store
            .save_asset(&asset(ProductId::new(), "TIARA-7"), ExpectedVersion::NoStream)
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[test]
    fn overlapping_order_on_same_asset_is_refused() {
        let store = InMemoryStore::new();
        let (product_id, asset_id) = (ProductId::new(), AssetId::new());

        store
            .insert_order(&order_on(UserId::new(), asset_id, product_id, range(1, 3)))
            .unwrap();

        // blocked until the 4th because of the buffer day
        let err = store
            .insert_order(&order_on(UserId::new(), asset_id, product_id, range(4, 6)))
            .unwrap_err();
        assert!(matches!(err, StoreError::Overlap { asset_id: a, .. } if a == asset_id));

        store
            .insert_order(&order_on(UserId::new(), asset_id, product_id, range(5, 7)))
            .unwrap();
        assert_eq!(store.rentals_for_assets(&[asset_id]).unwrap().len(), 2);
    }

    #[test]
    fn canceled_rentals_free_the_asset() {
        let store = InMemoryStore::new();
        let (product_id, asset_id, user_id) = (ProductId::new(), AssetId::new(), UserId::new());
        let mut first = order_on(user_id, asset_id, product_id, range(1, 3));
        store.insert_order(&first).unwrap();

        let before = first.version();
        let cmd = OrderCommand::CancelOrder(CancelOrder {
            order_id: first.id_typed(),
            user_id,
            reason: "changed plans".to_string(),
            policy: RefundPolicy::default(),
            occurred_at: at() + Duration::hours(1),
        });
        execute(&mut first, &cmd).unwrap();
        store.save_order(&first, ExpectedVersion::Exact(before)).unwrap();

        store
            .insert_order(&order_on(UserId::new(), asset_id, product_id, range(2, 3)))
            .unwrap();
    }

    #[test]
    fn stale_order_write_is_a_concurrency_error() {
        let store = InMemoryStore::new();
        let order = order_on(UserId::new(), AssetId::new(), ProductId::new(), range(1, 3));
        store.insert_order(&order).unwrap();

        let err = store
            .save_order(&order, ExpectedVersion::Exact(order.version() + 1))
            .unwrap_err();
        assert!(matches!(err, StoreError::Concurrency(_)));
    }

    #[test]
    fn order_found_through_its_rental() {
        let store = InMemoryStore::new();
        let order = order_on(UserId::new(), AssetId::new(), ProductId::new(), range(1, 3));
        store.insert_order(&order).unwrap();
        let rental_id = order.rentals()[0].id_typed();

        let found = store.order_of_rental(rental_id).unwrap().unwrap();
        assert_eq!(found.id_typed(), order.id_typed());
        assert!(store.order_of_rental(RentalId::new()).unwrap().is_none());
    }

    #[test]
    fn overdue_orders_are_past_deadline_only() {
        let store = InMemoryStore::new();
        store
            .insert_order(&order_on(UserId::new(), AssetId::new(), ProductId::new(), range(1, 3)))
            .unwrap();

        assert!(store.overdue_orders(at() + Duration::hours(24)).unwrap().is_empty());
        assert_eq!(store.overdue_orders(at() + Duration::hours(25)).unwrap().len(), 1);
    }
}
