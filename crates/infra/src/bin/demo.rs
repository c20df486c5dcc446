//! Walks one rental through the booking core on an in-memory store.
//!
//! ```text
//! WARDROBE_LOG_FORMAT=pretty cargo run -p wardrobe-infra --bin wardrobe-demo
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value as JsonValue;

use wardrobe_catalog::ConditionGrade;
use wardrobe_core::{CategoryId, SupplierId, UserId};
use wardrobe_events::{EventBus, EventEnvelope, InMemoryEventBus};
use wardrobe_infra::{BookingConfig, InMemoryStore, Marketplace, StaticDirectory};
use wardrobe_rentals::DeliveryMethod;

fn main() -> Result<()> {
    wardrobe_observability::init();

    let config = BookingConfig::from_env();
    tracing::info!(config = %serde_json::to_string(&config)?, "booking config");

    let admin = UserId::new();
    let supplier = SupplierId::new();
    let supplier_contact = UserId::new();
    let customer = UserId::new();

    let bus: Arc<InMemoryEventBus<EventEnvelope<JsonValue>>> = Arc::new(InMemoryEventBus::new());
    let events = bus.subscribe();
    let market = Marketplace::new(Arc::new(InMemoryStore::new()), bus, config).with_directory(
        Arc::new(
            StaticDirectory::new()
                .with_admin(admin)
                .with_supplier(supplier, supplier_contact),
        ),
    );

    let cape = market.create_product(
        supplier,
        CategoryId::new(),
        "Velvet opera cape",
        "Floor length, burgundy, silk lined",
        10_000,
    )?;
    for code in ["CAPE-01", "CAPE-02"] {
        market.register_asset(cape.id_typed(), code, ConditionGrade::A)?;
    }

    let free = market.available_count(cape.id_typed(), "2024-06-01", "2024-06-03")?;
    tracing::info!(free, "capes free for the weekend");

    market.add_item(customer, cape.id_typed(), 2, "2024-06-01", "2024-06-03")?;
    let order = market
        .create_order_from_cart(
            customer,
            "2024-06-01",
            "2024-06-03",
            Some(DeliveryMethod::Parcel),
            Some("4 Rehearsal Row".to_string()),
        )
        .context("booking the capes")?;
    let order_id = order.id_typed();
    tracing::info!(%order_id, total = order.total_amount(), "order placed");

    market.request_deposit(order_id)?;
    market.confirm_payment(order_id)?;
    market.start_preparing(order_id)?;
    market.dispatch(order_id)?;
    market.deliver(order_id)?;
    market.collect(order_id)?;
    market.start_inspection(order_id)?;
    market.finish_inspection(order_id, true, None)?;

    let (_, settlements) = market.complete(order_id)?;
    for settlement in &settlements {
        market.confirm_settlement(settlement.id_typed())?;
        let paid = market.mark_settlement_paid(settlement.id_typed(), Some("DEMO-0001".to_string()))?;
        tracing::info!(
            settlement_id = %paid.id_typed(),
            gross = paid.gross_amount(),
            platform_fee = paid.platform_fee_amount(),
            supplier_amount = paid.supplier_amount(),
            "supplier paid"
        );
    }

    let published = events.drain();
    tracing::info!(count = published.len(), "domain events published");
    Ok(())
}
