//! Marketplace services.
//!
//! [`Marketplace`] is the application facade over the domain crates: it loads
//! aggregates from a [`Store`], runs commands through them, commits with
//! optimistic concurrency, publishes the resulting events and fires
//! notifications. Operations are split by concern across the submodules.
//!
//! ```text
//! caller ──▶ Marketplace ──▶ aggregate.handle/apply ──▶ Store (versioned write)
//!                  │                                        │
//!                  └──────── Notifier (best effort) ◀───────┴──▶ EventBus
//! ```

mod availability;
mod booking;
mod cart;
mod catalog;
mod issues;
mod lifecycle;
mod settlement;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use wardrobe_core::{
    Aggregate, AggregateRoot, Clock, DomainError, ExpectedVersion, OrderId, ProductId,
    SystemClock, UserId, execute,
};
use wardrobe_events::{Event, EventBus, EventEnvelope};
use wardrobe_rentals::Order;

use crate::config::BookingConfig;
use crate::error::ServiceResult;
use crate::locks::KeyedLocks;
use crate::notify::{Directory, LogNotifier, Notification, NotificationKind, Notifier, StaticDirectory};
use crate::publish::publish_committed;
use crate::store::{Store, StoreResult};

pub(crate) const PRODUCT_AGGREGATE: &str = "catalog.product";
pub(crate) const ASSET_AGGREGATE: &str = "catalog.asset";
pub(crate) const CART_AGGREGATE: &str = "rentals.cart";
pub(crate) const ORDER_AGGREGATE: &str = "rentals.order";
pub(crate) const SETTLEMENT_AGGREGATE: &str = "settlement.settlement";

/// Booking core of the rental marketplace.
pub struct Marketplace<S, B> {
    store: Arc<S>,
    bus: B,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    directory: Arc<dyn Directory>,
    config: BookingConfig,
    product_locks: KeyedLocks<ProductId>,
}

impl<S, B> Marketplace<S, B>
where
    S: Store,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Wall clock, log-only notifications and an empty directory; replace them
    /// with the `with_*` builders.
    pub fn new(store: Arc<S>, bus: B, config: BookingConfig) -> Self {
        Self {
            store,
            bus,
            clock: Arc::new(SystemClock),
            notifier: Arc::new(LogNotifier),
            directory: Arc::new(StaticDirectory::new()),
            config,
            product_locks: KeyedLocks::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_directory(mut self, directory: Arc<dyn Directory>) -> Self {
        self.directory = directory;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn config(&self) -> &BookingConfig {
        &self.config
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Decide, evolve, persist, publish.
    ///
    /// `save` receives the aggregate after the events were applied and the
    /// version it had before; nothing is saved or published when the command
    /// produced no events.
    fn commit<A>(
        &self,
        aggregate_type: &'static str,
        aggregate: &mut A,
        command: &A::Command,
        save: impl FnOnce(&A, ExpectedVersion) -> StoreResult<()>,
    ) -> ServiceResult<Vec<A::Event>>
    where
        A: Aggregate<Error = DomainError>,
        A::Id: Into<Uuid>,
        A::Event: Event + Serialize,
    {
        let before = aggregate.version();
        let events = execute(aggregate, command)?;
        if events.is_empty() {
            return Ok(events);
        }

        let expected = if before == 0 {
            ExpectedVersion::NoStream
        } else {
            ExpectedVersion::Exact(before)
        };
        save(aggregate, expected)?;

        let aggregate_id: Uuid = aggregate.id().clone().into();
        publish_committed(&self.bus, aggregate_type, aggregate_id, before, &events);
        Ok(events)
    }

    fn load_order(&self, order_id: OrderId) -> ServiceResult<Order> {
        self.store
            .order(order_id)?
            .ok_or_else(|| DomainError::not_found("order", order_id).into())
    }

    fn notify(
        &self,
        user: UserId,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        related_id: Option<Uuid>,
    ) {
        let notification = Notification {
            user,
            kind,
            title: title.into(),
            message: message.into(),
            related_id,
        };
        if let Err(e) = self.notifier.notify(notification) {
            tracing::warn!(%user, kind = kind.as_str(), "notification failed: {e}");
        }
    }

    fn notify_admins(
        &self,
        kind: NotificationKind,
        title: &str,
        message: &str,
        related_id: Option<Uuid>,
    ) {
        for admin in self.directory.admins() {
            self.notify(admin, kind, title, message, related_id);
        }
    }
}
