//! End-to-end tests of the marketplace services over the in-memory store.
//!
//! Verifies:
//! - Cart → order booking, pricing and asset assignment
//! - No double booking under concurrent callers
//! - Lifecycle, cancellation refunds and supplier settlements
//! - Events and notifications leave the core as expected

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
    use serde_json::Value as JsonValue;

    use wardrobe_catalog::{Asset, AssetStatus, BlockedPeriod, ConditionGrade, Product};
    use wardrobe_core::{
        AssetId, BlockedPeriodId, CategoryId, Clock, DateRange, DomainError, ExpectedVersion,
        IssueId, ManualClock, OrderId, ProductId, RentalId, SettlementId, SupplierId, UserId,
    };
    use wardrobe_events::{EventBus, EventEnvelope, InMemoryEventBus};
    use wardrobe_rentals::{
        Cart, DeliveryMethod, FulfillmentStatus, IssueKind, IssueSeverity, IssueStatus, Order,
        PaymentStatus, Rental, RentalIssue, RentalStatus,
    };
    use wardrobe_settlement::{Settlement, SettlementKind, SettlementStatus};

    use crate::config::BookingConfig;
    use crate::error::{ErrorKind, StoreError};
    use crate::notify::{NotificationKind, RecordingNotifier, StaticDirectory};
    use crate::service::Marketplace;
    use crate::store::{
        CartStore, CatalogStore, InMemoryStore, IssueStore, OrderStore, SettlementStore,
        StoreResult,
    };

    type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

    static NEXT_BATCH: AtomicUsize = AtomicUsize::new(0);

    struct Harness {
        market: Marketplace<InMemoryStore, Bus>,
        bus: Bus,
        clock: Arc<ManualClock>,
        notifier: Arc<RecordingNotifier>,
        admin: UserId,
        supplier: SupplierId,
        supplier_contact: UserId,
    }

    fn setup_with(notifier: RecordingNotifier) -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 20, 10, 0, 0).unwrap(),
        ));
        let notifier = Arc::new(notifier);
        let admin = UserId::new();
        let supplier = SupplierId::new();
        let supplier_contact = UserId::new();
        let directory = StaticDirectory::new()
            .with_admin(admin)
            .with_supplier(supplier, supplier_contact);

        let market = Marketplace::new(store, bus.clone(), BookingConfig::default())
            .with_clock(clock.clone())
            .with_notifier(notifier.clone())
            .with_directory(Arc::new(directory));

        Harness {
            market,
            bus,
            clock,
            notifier,
            admin,
            supplier,
            supplier_contact,
        }
    }

    fn setup() -> Harness {
        setup_with(RecordingNotifier::new())
    }

    fn seed_product(h: &Harness, daily_price: i64, units: usize) -> ProductId {
        let product = h
            .market
            .create_product(
                h.supplier,
                CategoryId::new(),
                "Velvet opera cape",
                "Floor length, lined",
                daily_price,
            )
            .unwrap();
        // asset codes are unique across the catalog
        let batch = NEXT_BATCH.fetch_add(1, Ordering::Relaxed);
        for n in 1..=units {
            h.market
                .register_asset(
                    product.id_typed(),
                    &format!("CAPE-{batch:04}-{n:02}"),
                    ConditionGrade::A,
                )
                .unwrap();
        }
        product.id_typed()
    }

    fn book(h: &Harness, user: UserId, product: ProductId, quantity: u32, start: &str, end: &str) -> OrderId {
        h.market.add_item(user, product, quantity, start, end).unwrap();
        h.market
            .create_order_from_cart(user, start, end, None, None)
            .unwrap()
            .id_typed()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[test]
    fn two_units_for_two_days_cost_45000() {
        let h = setup();
        let product = seed_product(&h, 10_000, 2);
        let user = UserId::new();

        h.market.add_item(user, product, 2, "2024-06-01", "2024-06-03").unwrap();
        let order = h
            .market
            .create_order_from_cart(user, "2024-06-01", "2024-06-03", None, None)
            .unwrap();

        assert_eq!(order.total_amount(), 45_000);
        assert_eq!(order.shipping_cost(), 5_000);
        assert_eq!(order.payment_status(), PaymentStatus::Pending);
        assert_eq!(order.fulfillment_status(), FulfillmentStatus::Requested);
        assert_eq!(order.rentals().len(), 2);
        assert_ne!(order.rentals()[0].asset_id(), order.rentals()[1].asset_id());
        for rental in order.rentals() {
            assert_eq!(rental.quantity(), 1);
            assert_eq!(rental.status(), RentalStatus::Requested);
            assert_eq!(rental.blocked().start(), day(1));
            assert_eq!(rental.blocked().end(), day(4));
        }
        assert_eq!(
            order.deposit_deadline_at(),
            Some(h.clock.now() + Duration::hours(24))
        );

        assert!(h.market.get_or_create_cart(user).unwrap().is_empty());
        assert_eq!(
            h.market.available_count(product, "2024-06-01", "2024-06-03").unwrap(),
            0
        );

        let created = h.notifier.sent_of_kind(NotificationKind::OrderCreated);
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].user, h.admin);
    }

    #[test]
    fn delivery_method_sets_shipping() {
        let h = setup();
        let product = seed_product(&h, 10_000, 1);
        let user = UserId::new();
        h.market.add_item(user, product, 1, "2024-06-01", "2024-06-02").unwrap();

        let order = h
            .market
            .create_order_from_cart(
                user,
                "2024-06-01",
                "2024-06-02",
                Some(DeliveryMethod::Quick),
                Some("12 Stage Door Lane".to_string()),
            )
            .unwrap();
        assert_eq!(order.shipping_cost(), 15_000);
        assert_eq!(order.total_amount(), 25_000);
        assert_eq!(order.shipping_address(), Some("12 Stage Door Lane"));
    }

    #[test]
    fn bad_dates_fail_validation() {
        let h = setup();
        let product = seed_product(&h, 10_000, 1);

        for (start, end) in [("2024-13-01", "2024-06-02"), ("2024-06-05", "2024-06-01"), ("June 1", "2024-06-02")] {
            let err = h.market.available_count(product, start, end).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "{start}..{end}");
        }

        let user = UserId::new();
        h.market.add_item(user, product, 1, "2024-06-01", "2024-06-01").unwrap();
        let err = h
            .market
            .create_order_from_cart(user, "2024-06-01", "2024-06-01", None, None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn count_inside_confirmed_rental_is_zero() {
        let h = setup();
        let product = seed_product(&h, 8_000, 1);
        let order_id = book(&h, UserId::new(), product, 1, "2024-06-01", "2024-06-03");
        h.market.approve(order_id, h.admin).unwrap();

        assert_eq!(h.market.available_count(product, "2024-06-02", "2024-06-02").unwrap(), 0);
        // buffer day
        assert_eq!(h.market.available_count(product, "2024-06-04", "2024-06-04").unwrap(), 0);
        assert_eq!(h.market.available_count(product, "2024-06-05", "2024-06-06").unwrap(), 1);
    }

    #[test]
    fn assets_out_of_circulation_do_not_count() {
        let h = setup();
        let product = seed_product(&h, 8_000, 2);
        let asset = h.market.store().assets_of_product(product).unwrap()[0].id_typed();
        h.market
            .change_asset_status(asset, AssetStatus::Maintenance, Some("torn hem".to_string()))
            .unwrap();

        assert_eq!(h.market.available_count(product, "2024-06-01", "2024-06-02").unwrap(), 1);
        assert_eq!(h.market.available_count(ProductId::new(), "2024-06-01", "2024-06-02").unwrap(), 0);
    }

    #[test]
    fn cart_merges_and_checks_combined_quantity() {
        let h = setup();
        let product = seed_product(&h, 8_000, 2);
        let user = UserId::new();

        h.market.add_item(user, product, 1, "2024-06-01", "2024-06-02").unwrap();
        let cart = h.market.add_item(user, product, 1, "2024-06-01", "2024-06-02").unwrap();
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].quantity, 2);
        assert_eq!(cart.items()[0].price_snapshot, Some(8_000));

        let err = h
            .market
            .add_item(user, product, 1, "2024-06-01", "2024-06-02")
            .unwrap_err();
        assert!(matches!(
            err.domain(),
            Some(DomainError::InsufficientCapacity { requested: 3, available: 2, .. })
        ));

        let err = h.market.add_item(user, product, 0, "2024-06-03", "2024-06-04").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn cart_quantity_updates() {
        let h = setup();
        let product = seed_product(&h, 8_000, 2);
        let user = UserId::new();
        let cart = h.market.add_item(user, product, 1, "2024-06-01", "2024-06-02").unwrap();
        let item_id = cart.items()[0].id;

        let err = h.market.update_quantity(user, item_id, 3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Capacity);

        let cart = h.market.update_quantity(user, item_id, 2).unwrap();
        assert_eq!(cart.items()[0].quantity, 2);
        let cart = h.market.update_quantity(user, item_id, 1).unwrap();
        assert_eq!(cart.items()[0].quantity, 1);

        let cart = h.market.remove_item(user, item_id).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn inactive_product_cannot_be_added() {
        let h = setup();
        let product = seed_product(&h, 8_000, 1);
        h.market.set_product_active(product, false).unwrap();

        let err = h
            .market
            .add_item(UserId::new(), product, 1, "2024-06-01", "2024-06-02")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn shortage_aborts_the_whole_order() {
        let h = setup();
        let roomy = seed_product(&h, 5_000, 3);
        let scarce = seed_product(&h, 9_000, 1);
        let (late, early) = (UserId::new(), UserId::new());

        h.market.add_item(late, roomy, 1, "2024-06-10", "2024-06-12").unwrap();
        h.market.add_item(late, scarce, 1, "2024-06-10", "2024-06-12").unwrap();
        book(&h, early, scarce, 1, "2024-06-11", "2024-06-13");

        let err = h
            .market
            .create_order_from_cart(late, "2024-06-10", "2024-06-12", None, None)
            .unwrap_err();
        assert!(matches!(
            err.domain(),
            Some(DomainError::InsufficientCapacity { requested: 1, available: 0, .. })
        ));
        assert!(h.market.orders_of_user(late).unwrap().is_empty());
        assert_eq!(h.market.get_or_create_cart(late).unwrap().items().len(), 2);
        assert_eq!(h.market.available_count(roomy, "2024-06-10", "2024-06-12").unwrap(), 3);
    }

    #[test]
    fn concurrent_bookings_for_last_unit_have_one_winner() {
        let h = setup();
        let product = seed_product(&h, 10_000, 1);
        let users: Vec<UserId> = (0..8).map(|_| UserId::new()).collect();
        for user in &users {
            h.market.add_item(*user, product, 1, "2024-06-01", "2024-06-03").unwrap();
        }

        let results: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = users
                .iter()
                .map(|user| {
                    let market = &h.market;
                    scope.spawn(move || {
                        market.create_order_from_cart(*user, "2024-06-01", "2024-06-03", None, None)
                    })
                })
                .collect();
            handles.into_iter().map(|handle| handle.join().unwrap()).collect()
        });

        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| e.kind() == ErrorKind::Capacity));
    }

    #[test]
    fn cancel_within_a_day_refunds_everything() {
        let h = setup();
        let product = seed_product(&h, 10_000, 1);
        let user = UserId::new();
        let order_id = book(&h, user, product, 1, "2024-06-01", "2024-06-03");

        h.clock.advance(Duration::hours(2));
        let order = h.market.cancel(order_id, user, "found another outfit").unwrap();

        let cancellation = order.cancellation().unwrap();
        assert_eq!(cancellation.refund.rate_percent, 100);
        assert_eq!(cancellation.refund.refund_amount, 25_000);
        assert_eq!(cancellation.refund.cancellation_fee, 0);
        assert_eq!(order.fulfillment_status(), FulfillmentStatus::Canceled);
        assert!(order
            .rentals()
            .iter()
            .all(|r| r.status() == RentalStatus::Canceled && r.cancel_reason() == Some("found another outfit")));

        assert_eq!(h.market.available_count(product, "2024-06-01", "2024-06-03").unwrap(), 1);
        assert_eq!(h.notifier.sent_of_kind(NotificationKind::OrderCanceled).len(), 2);
    }

    #[test]
    fn late_cancel_keeps_half() {
        let h = setup();
        let product = seed_product(&h, 10_000, 1);
        let user = UserId::new();
        let order_id = book(&h, user, product, 1, "2024-06-01", "2024-06-03");

        h.clock.advance(Duration::hours(25));
        let order = h.market.cancel(order_id, user, "schedule changed").unwrap();
        let refund = order.cancellation().unwrap().refund;
        assert_eq!(refund.rate_percent, 50);
        assert_eq!(refund.refund_amount, 12_500);
        assert_eq!(refund.cancellation_fee, 12_500);
    }

    #[test]
    fn only_the_customer_may_cancel() {
        let h = setup();
        let product = seed_product(&h, 10_000, 1);
        let order_id = book(&h, UserId::new(), product, 1, "2024-06-01", "2024-06-03");

        let err = h.market.cancel(order_id, UserId::new(), "not mine").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(err.http_status(), 403);
    }

    #[test]
    fn late_transfer_on_canceled_order_is_refunded() {
        let h = setup();
        let product = seed_product(&h, 10_000, 1);
        let user = UserId::new();
        let order_id = book(&h, user, product, 1, "2024-06-01", "2024-06-03");
        h.market.request_deposit(order_id).unwrap();
        h.market.cancel(order_id, user, "too late").unwrap();

        let err = h.market.mark_refunded(order_id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);

        let order = h.market.confirm_payment(order_id).unwrap();
        assert_eq!(order.payment_status(), PaymentStatus::Confirmed);
        assert_eq!(order.fulfillment_status(), FulfillmentStatus::Canceled);
        assert_eq!(order.refund_due(), 25_000);

        let order = h.market.mark_refunded(order_id).unwrap();
        assert_eq!(order.payment_status(), PaymentStatus::Refunded);
        assert!(order.refunded_at().is_some());
    }

    #[test]
    fn overdue_orders_expire_and_free_assets() {
        let h = setup();
        let product = seed_product(&h, 10_000, 1);
        let user = UserId::new();
        let order_id = book(&h, user, product, 1, "2024-06-01", "2024-06-03");

        let err = h.market.expire(order_id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);
        assert!(h.market.expire_overdue().unwrap().is_empty());

        h.clock.advance(Duration::hours(25));
        assert_eq!(h.market.expire_overdue().unwrap(), vec![order_id]);

        let order = h.market.order(order_id).unwrap();
        assert_eq!(order.fulfillment_status(), FulfillmentStatus::Expired);
        assert_eq!(order.payment_status(), PaymentStatus::Expired);
        assert_eq!(h.market.available_count(product, "2024-06-01", "2024-06-03").unwrap(), 1);

        let expired = h.notifier.sent_of_kind(NotificationKind::OrderExpired);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].user, user);
    }

    #[test]
    fn full_lifecycle_settles_with_supplier() {
        let h = setup();
        let product = seed_product(&h, 10_000, 2);
        let user = UserId::new();
        let order_id = book(&h, user, product, 2, "2024-06-01", "2024-06-03");

        h.market.request_deposit(order_id).unwrap();
        let order = h.market.confirm_payment(order_id).unwrap();
        assert_eq!(order.fulfillment_status(), FulfillmentStatus::Confirmed);
        assert_eq!(h.notifier.sent_of_kind(NotificationKind::OrderApproved).len(), 1);

        h.market.start_preparing(order_id).unwrap();
        let order = h.market.dispatch(order_id).unwrap();
        assert!(order.rentals().iter().all(|r| r.status() == RentalStatus::Rented));
        h.market.deliver(order_id).unwrap();
        let order = h.market.collect(order_id).unwrap();
        assert!(order.rentals().iter().all(|r| r.status() == RentalStatus::Returned));
        h.market.start_inspection(order_id).unwrap();

        let err = h.market.complete(order_id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);

        h.market
            .finish_inspection(order_id, true, Some("all clean".to_string()))
            .unwrap();
        let (order, settlements) = h.market.complete(order_id).unwrap();
        assert!(order.is_completed());
        assert!(order.rentals().iter().all(|r| r.status() == RentalStatus::Completed));

        assert_eq!(settlements.len(), 1);
        let settlement = &settlements[0];
        assert_eq!(settlement.supplier_id(), Some(h.supplier));
        assert_eq!(settlement.kind(), SettlementKind::Rental);
        assert_eq!(settlement.gross_amount(), 40_000);
        assert_eq!(settlement.platform_fee_amount(), 20_000);
        assert_eq!(settlement.supplier_amount(), 20_000);
        assert_eq!(settlement.status(), SettlementStatus::Pending);

        let ready = h.notifier.sent_of_kind(NotificationKind::SettlementReady);
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].user, h.supplier_contact);

        let err = h.market.create_settlements_for_order(order_id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let settlement_id = settlement.id_typed();
        let err = h.market.mark_settlement_paid(settlement_id, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);

        let confirmed = h.market.confirm_settlement(settlement_id).unwrap();
        assert!(confirmed.settlement_date().is_some());
        let paid = h
            .market
            .mark_settlement_paid(settlement_id, Some("TRX-2024-0611".to_string()))
            .unwrap();
        assert_eq!(paid.status(), SettlementStatus::Paid);
        assert_eq!(paid.payment_reference(), Some("TRX-2024-0611"));
        assert_eq!(h.market.settlements_of_supplier(h.supplier).unwrap().len(), 1);
    }

    #[test]
    fn rejected_order_frees_assets_and_settles_nothing() {
        let h = setup();
        let product = seed_product(&h, 10_000, 1);
        let user = UserId::new();
        let order_id = book(&h, user, product, 1, "2024-06-01", "2024-06-03");

        let order = h.market.reject(order_id, "item reserved for a shoot").unwrap();
        assert_eq!(order.rejection_reason(), Some("item reserved for a shoot"));
        assert_eq!(h.market.available_count(product, "2024-06-01", "2024-06-03").unwrap(), 1);
        assert_eq!(h.notifier.sent_of_kind(NotificationKind::OrderRejected)[0].user, user);

        let err = h.market.create_settlements_for_order(order_id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);
    }

    #[test]
    fn damage_report_books_an_issue_settlement() {
        let h = setup();
        let product = seed_product(&h, 10_000, 1);
        let order_id = book(&h, UserId::new(), product, 1, "2024-06-01", "2024-06-03");
        let rental_id = h.market.order(order_id).unwrap().rentals()[0].id_typed();

        let (issue, settlement) = h
            .market
            .report_issue(rental_id, IssueKind::Damage, IssueSeverity::Medium, "wine stain on lining", 7_500, h.admin)
            .unwrap();
        assert_eq!(issue.status, IssueStatus::Open);
        let settlement = settlement.unwrap();
        assert_eq!(settlement.kind(), SettlementKind::Issue);
        assert_eq!(settlement.supplier_amount(), 7_500);
        assert_eq!(settlement.platform_fee_amount(), 0);
        assert_eq!(h.notifier.sent_of_kind(NotificationKind::IssueReported).len(), 1);

        let (_, none) = h
            .market
            .report_issue(rental_id, IssueKind::Delay, IssueSeverity::Low, "returned a day late", 0, h.admin)
            .unwrap();
        assert!(none.is_none());

        let resolved = h.market.resolve_issue(issue.id, "charged the deposit").unwrap();
        assert_eq!(resolved.status, IssueStatus::Resolved);
        let err = h.market.waive_issue(issue.id, "changed mind").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);
        assert_eq!(h.market.issues_of_order(order_id).unwrap().len(), 2);
    }

    #[test]
    fn items_are_priced_and_reserved_on_their_own_dates() {
        let h = setup();
        let product = seed_product(&h, 10_000, 1);
        let user = UserId::new();

        h.market.add_item(user, product, 1, "2024-06-10", "2024-06-12").unwrap();
        let order = h
            .market
            .create_order_from_cart(user, "2024-06-01", "2024-06-20", None, None)
            .unwrap();

        assert_eq!(order.total_amount(), 25_000);
        assert_eq!(order.period(), Some(DateRange::new(day(1), day(20)).unwrap()));
        let rental = &order.rentals()[0];
        assert_eq!(rental.period(), DateRange::new(day(10), day(12)).unwrap());
        assert_eq!(rental.blocked(), DateRange::new(day(10), day(13)).unwrap());

        assert_eq!(h.market.available_count(product, "2024-06-01", "2024-06-05").unwrap(), 1);
        assert_eq!(h.market.available_count(product, "2024-06-13", "2024-06-13").unwrap(), 0);
        assert_eq!(h.market.available_count(product, "2024-06-14", "2024-06-20").unwrap(), 1);
    }

    #[test]
    fn separate_dates_of_one_product_share_a_single_asset() {
        let h = setup();
        let product = seed_product(&h, 10_000, 1);
        let user = UserId::new();

        h.market.add_item(user, product, 1, "2024-06-01", "2024-06-03").unwrap();
        h.market.add_item(user, product, 1, "2024-06-10", "2024-06-15").unwrap();
        let order = h
            .market
            .create_order_from_cart(user, "2024-06-01", "2024-06-15", None, None)
            .unwrap();

        assert_eq!(order.rentals().len(), 2);
        assert_eq!(order.rentals()[0].asset_id(), order.rentals()[1].asset_id());
        let lines: i64 = order
            .rentals()
            .iter()
            .map(|r| r.rental_rate() * i64::from(r.days()) * i64::from(r.quantity()))
            .sum();
        // 10000 × 2 + 10000 × 5 + 5000 shipping
        assert_eq!(order.total_amount(), 75_000);
        assert_eq!(order.total_amount(), lines + order.shipping_cost());
        for rental in order.rentals() {
            assert_eq!(rental.blocked().start(), rental.period().start());
            assert_eq!(rental.blocked().end(), rental.period().end() + chrono::Days::new(1));
        }
    }

    #[test]
    fn order_span_widens_to_cover_items_outside_the_checkout_range() {
        let h = setup();
        let product = seed_product(&h, 10_000, 1);
        let user = UserId::new();

        h.market.add_item(user, product, 1, "2024-06-10", "2024-06-12").unwrap();
        let order = h
            .market
            .create_order_from_cart(user, "2024-06-01", "2024-06-03", None, None)
            .unwrap();

        assert_eq!(order.period(), Some(DateRange::new(day(1), day(12)).unwrap()));
        assert_eq!(order.rentals()[0].period(), DateRange::new(day(10), day(12)).unwrap());
        assert_eq!(order.total_amount(), 25_000);
    }

    #[test]
    fn checked_out_cart_cannot_be_booked_twice() {
        let h = setup();
        let product = seed_product(&h, 10_000, 2);
        let user = UserId::new();
        book(&h, user, product, 1, "2024-06-01", "2024-06-03");

        assert!(h.market.get_or_create_cart(user).unwrap().is_empty());
        let err = h
            .market
            .create_order_from_cart(user, "2024-06-01", "2024-06-03", None, None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(h.market.orders_of_user(user).unwrap().len(), 1);
    }

    #[test]
    fn failed_issue_charge_leaves_no_issue_behind() {
        let market = Marketplace::new(
            Arc::new(SettlementsOffline(InMemoryStore::new())),
            Arc::new(InMemoryEventBus::new()),
            BookingConfig::default(),
        );
        let product = market
            .create_product(SupplierId::new(), CategoryId::new(), "Pirate hat", "Felt", 4_000)
            .unwrap();
        market
            .register_asset(product.id_typed(), "HAT-01", ConditionGrade::B)
            .unwrap();
        let user = UserId::new();
        market
            .add_item(user, product.id_typed(), 1, "2024-06-01", "2024-06-02")
            .unwrap();
        let order = market
            .create_order_from_cart(user, "2024-06-01", "2024-06-02", None, None)
            .unwrap();
        let rental_id = order.rentals()[0].id_typed();

        let err = market
            .report_issue(rental_id, IssueKind::Loss, IssueSeverity::High, "never came back", 40_000, user)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(market.issues_of_order(order.id_typed()).unwrap().is_empty());

        market
            .report_issue(rental_id, IssueKind::Delay, IssueSeverity::Low, "two days late", 0, user)
            .unwrap();
        assert_eq!(market.issues_of_order(order.id_typed()).unwrap().len(), 1);
    }

    /// In-memory store whose settlement ledger refuses every write.
    struct SettlementsOffline(InMemoryStore);

    impl CatalogStore for SettlementsOffline {
        fn product(&self, product_id: ProductId) -> StoreResult<Option<Product>> {
            self.0.product(product_id)
        }
        fn save_product(&self, product: &Product, expected: ExpectedVersion) -> StoreResult<()> {
            self.0.save_product(product, expected)
        }
        fn asset(&self, asset_id: AssetId) -> StoreResult<Option<Asset>> {
            self.0.asset(asset_id)
        }
        fn save_asset(&self, asset: &Asset, expected: ExpectedVersion) -> StoreResult<()> {
            self.0.save_asset(asset, expected)
        }
        fn assets_of_product(&self, product_id: ProductId) -> StoreResult<Vec<Asset>> {
            self.0.assets_of_product(product_id)
        }
        fn blocked_periods(&self, product_id: ProductId) -> StoreResult<Vec<BlockedPeriod>> {
            self.0.blocked_periods(product_id)
        }
        fn insert_blocked_period(&self, period: BlockedPeriod) -> StoreResult<()> {
            self.0.insert_blocked_period(period)
        }
        fn remove_blocked_period(&self, id: BlockedPeriodId) -> StoreResult<Option<BlockedPeriod>> {
            self.0.remove_blocked_period(id)
        }
    }

    impl CartStore for SettlementsOffline {
        fn cart_of_user(&self, user_id: UserId) -> StoreResult<Option<Cart>> {
            self.0.cart_of_user(user_id)
        }
        fn save_cart(&self, cart: &Cart, expected: ExpectedVersion) -> StoreResult<()> {
            self.0.save_cart(cart, expected)
        }
    }

    impl OrderStore for SettlementsOffline {
        fn order(&self, order_id: OrderId) -> StoreResult<Option<Order>> {
            self.0.order(order_id)
        }
        fn insert_order(&self, order: &Order) -> StoreResult<()> {
            self.0.insert_order(order)
        }
        fn save_order(&self, order: &Order, expected: ExpectedVersion) -> StoreResult<()> {
            self.0.save_order(order, expected)
        }
        fn rentals_for_assets(&self, asset_ids: &[AssetId]) -> StoreResult<Vec<Rental>> {
            self.0.rentals_for_assets(asset_ids)
        }
        fn orders_of_user(&self, user_id: UserId) -> StoreResult<Vec<Order>> {
            self.0.orders_of_user(user_id)
        }
        fn order_of_rental(&self, rental_id: RentalId) -> StoreResult<Option<Order>> {
            self.0.order_of_rental(rental_id)
        }
        fn overdue_orders(&self, now: DateTime<Utc>) -> StoreResult<Vec<Order>> {
            self.0.overdue_orders(now)
        }
    }

    impl SettlementStore for SettlementsOffline {
        fn settlement(&self, settlement_id: SettlementId) -> StoreResult<Option<Settlement>> {
            self.0.settlement(settlement_id)
        }
        fn insert_order_settlements(&self, _: OrderId, _: &[Settlement]) -> StoreResult<()> {
            Err(StoreError::Storage("settlement ledger offline".to_string()))
        }
        fn save_settlement(&self, _: &Settlement, _: ExpectedVersion) -> StoreResult<()> {
            Err(StoreError::Storage("settlement ledger offline".to_string()))
        }
        fn settlements_of_order(&self, order_id: OrderId) -> StoreResult<Vec<Settlement>> {
            self.0.settlements_of_order(order_id)
        }
        fn settlements_of_supplier(&self, supplier_id: SupplierId) -> StoreResult<Vec<Settlement>> {
            self.0.settlements_of_supplier(supplier_id)
        }
    }

    impl IssueStore for SettlementsOffline {
        fn issue(&self, issue_id: IssueId) -> StoreResult<Option<RentalIssue>> {
            self.0.issue(issue_id)
        }
        fn save_issue(&self, issue: &RentalIssue) -> StoreResult<()> {
            self.0.save_issue(issue)
        }
        fn issues_of_order(&self, order_id: OrderId) -> StoreResult<Vec<RentalIssue>> {
            self.0.issues_of_order(order_id)
        }
    }

    #[test]
    fn manual_holds_show_up_in_the_calendar() {
        let h = setup();
        let product = seed_product(&h, 10_000, 2);
        book(&h, UserId::new(), product, 1, "2024-06-01", "2024-06-03");
        let hold = h
            .market
            .add_blocked_period(product, "2024-06-10", "2024-06-12", "photo shoot", h.admin)
            .unwrap();

        assert!(h.market.is_product_blocked(product, "2024-06-12", "2024-06-20").unwrap());
        assert!(!h.market.is_product_blocked(product, "2024-06-01", "2024-06-09").unwrap());

        let calendar = h.market.blocked_intervals(product, "2024-06-01", "2024-06-30").unwrap();
        assert_eq!(calendar.len(), 2);
        assert_eq!(calendar[0].interval.start(), day(1));
        assert_eq!(calendar[1].interval.start(), day(10));

        h.market.remove_blocked_period(hold.id).unwrap();
        assert!(!h.market.is_product_blocked(product, "2024-06-12", "2024-06-20").unwrap());
        let err = h.market.remove_blocked_period(hold.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn committed_changes_are_published() {
        let h = setup();
        let sub = h.bus.subscribe();
        let product = seed_product(&h, 10_000, 1);
        let order_id = book(&h, UserId::new(), product, 1, "2024-06-01", "2024-06-03");
        h.market.approve(order_id, h.admin).unwrap();

        let order_events: Vec<_> = sub
            .drain()
            .into_iter()
            .filter(|e| e.aggregate_type() == "rentals.order")
            .collect();
        assert_eq!(order_events.len(), 2);
        assert_eq!(order_events[0].event_type(), "rentals.order.placed");
        assert_eq!(order_events[0].aggregate_version(), 1);
        assert_eq!(order_events[1].event_type(), "rentals.order.approved");
        assert_eq!(order_events[1].aggregate_version(), 2);
        assert_eq!(order_events[1].aggregate_id(), *order_id.as_uuid());
    }

    #[test]
    fn broken_notifier_does_not_fail_booking() {
        let h = setup_with(RecordingNotifier::failing());
        let product = seed_product(&h, 10_000, 1);
        let order_id = book(&h, UserId::new(), product, 1, "2024-06-01", "2024-06-03");
        assert!(h.market.approve(order_id, h.admin).is_ok());
    }

    #[test]
    fn stale_order_update_is_a_conflict() {
        let h = setup();
        let product = seed_product(&h, 10_000, 1);
        let order_id = book(&h, UserId::new(), product, 1, "2024-06-01", "2024-06-03");
        let stale = h.market.order(order_id).unwrap();
        h.market.approve(order_id, h.admin).unwrap();

        let err = h
            .market
            .store()
            .save_order(&stale, ExpectedVersion::Exact(1))
            .unwrap_err();
        assert!(matches!(err, StoreError::Concurrency(_)));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Step {
            Book { start: u32, nights: u32, quantity: u32 },
            Cancel { pick: usize },
        }

        fn step() -> impl Strategy<Value = Step> {
            prop_oneof![
                3 => (1u32..20, 1u32..5, 1u32..3)
                    .prop_map(|(start, nights, quantity)| Step::Book { start, nights, quantity }),
                1 => any::<usize>().prop_map(|pick| Step::Cancel { pick }),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            #[test]
            fn blocking_rentals_never_overlap_per_asset(steps in prop::collection::vec(step(), 1..12)) {
                let h = setup();
                let product = seed_product(&h, 10_000, 3);
                let mut placed: Vec<(OrderId, UserId)> = Vec::new();

                for step in steps {
                    match step {
                        Step::Book { start, nights, quantity } => {
                            let user = UserId::new();
                            let from = format!("2024-06-{start:02}");
                            let to = format!("2024-06-{:02}", start + nights);
                            if h.market.add_item(user, product, quantity, &from, &to).is_ok() {
                                match h.market.create_order_from_cart(user, &from, &to, None, None) {
                                    Ok(order) => placed.push((order.id_typed(), user)),
                                    Err(e) => prop_assert_eq!(e.kind(), ErrorKind::Capacity),
                                }
                            }
                        }
                        Step::Cancel { pick } => {
                            if !placed.is_empty() {
                                let (order_id, user) = placed[pick % placed.len()];
                                let _ = h.market.cancel(order_id, user, "property test");
                            }
                        }
                    }

                    let assets: Vec<_> = h
                        .market
                        .store()
                        .assets_of_product(product)
                        .unwrap()
                        .iter()
                        .map(|a| a.id_typed())
                        .collect();
                    let rentals = h.market.store().rentals_for_assets(&assets).unwrap();
                    for (i, a) in rentals.iter().enumerate() {
                        for b in &rentals[i + 1..] {
                            prop_assert!(!a.collides_with(b));
                        }
                    }
                }
            }
        }
    }
}
