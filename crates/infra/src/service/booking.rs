//! Turning a cart into an order.
//!
//! The search for free assets and the commit run under the locks of every
//! product in the cart. `insert_order` re-checks the assignment against
//! committed rentals anyway, so a writer that bypasses the locks still cannot
//! double-book an asset.
//!
//! The cart is re-read and emptied inside the same locked section, so a second
//! checkout of the same cart finds it already emptied.

use serde_json::Value as JsonValue;

use wardrobe_core::{
    AggregateRoot, DateRange, DomainError, OrderId, ProductId, RentalId, UserId, parse_date,
};
use wardrobe_events::{EventBus, EventEnvelope};
use wardrobe_rentals::{
    AssetPlanner, Cart, CartCommand, ClearCart, DeliveryMethod, Order, OrderCommand, PlaceOrder,
    RentalLine,
};

use super::{CART_AGGREGATE, Marketplace, ORDER_AGGREGATE};
use crate::error::ServiceResult;
use crate::notify::NotificationKind;
use crate::store::Store;

impl<S, B> Marketplace<S, B>
where
    S: Store,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Book everything in the user's cart.
    ///
    /// Every item is priced and reserved on its own dates; `[start, end]` is
    /// the order's overall span and widens to cover items outside it. Each unit
    /// gets its own asset and rental. Any shortage aborts the whole order with
    /// a capacity error and nothing is committed. On success the cart is
    /// emptied and admins are told about the new request.
    #[tracing::instrument(skip(self, shipping_address))]
    pub fn create_order_from_cart(
        &self,
        user_id: UserId,
        start: &str,
        end: &str,
        delivery_method: Option<DeliveryMethod>,
        shipping_address: Option<String>,
    ) -> ServiceResult<Order> {
        let requested = DateRange::strict(parse_date(start)?, parse_date(end)?)?;
        let cart = self
            .store
            .cart_of_user(user_id)?
            .filter(|c| !c.is_empty())
            .ok_or_else(|| DomainError::validation("cart is empty"))?;
        let span = cart
            .items()
            .iter()
            .fold(requested, |span, item| span.union(&item.period));

        let product_ids: Vec<ProductId> = cart.items().iter().map(|i| i.product_id).collect();
        let order = self.product_locks.with_locks(product_ids, || -> ServiceResult<Order> {
            // A checkout that raced us on the same cart already emptied it.
            let current = self.store.cart_of_user(user_id)?.map(|c| c.version());
            if current != Some(cart.version()) {
                return Err(DomainError::conflict("cart changed during checkout").into());
            }
            let order = self.place_order(user_id, &cart, span, delivery_method, shipping_address)?;
            self.empty_checked_out_cart(cart, order.id_typed());
            Ok(order)
        })??;

        let order_id = order.id_typed();
        tracing::info!(
            %order_id,
            %user_id,
            rentals = order.rentals().len(),
            total = order.total_amount(),
            "order placed"
        );

        self.notify_admins(
            NotificationKind::OrderCreated,
            "New rental request",
            &format!("Order {order_id} is waiting for approval"),
            Some(order_id.into()),
        );

        Ok(order)
    }

    fn place_order(
        &self,
        user_id: UserId,
        cart: &Cart,
        span: DateRange,
        delivery_method: Option<DeliveryMethod>,
        shipping_address: Option<String>,
    ) -> ServiceResult<Order> {
        let mut planner = AssetPlanner::new();
        let mut lines = Vec::new();

        for item in cart.items() {
            let product = self.product(item.product_id)?;
            if !product.is_rentable() {
                return Err(DomainError::validation(format!(
                    "product {} is not rentable",
                    item.product_id
                ))
                .into());
            }

            let blocked = item.period.extend_end(self.config.buffer_days)?;
            let assets = self.store.assets_of_product(item.product_id)?;
            let committed = self.rentals_on(&assets)?;
            let picked = planner.pick(&assets, &committed, &blocked, item.quantity);

            let found = u32::try_from(picked.len()).unwrap_or(u32::MAX);
            if found < item.quantity {
                tracing::debug!(
                    product_id = %item.product_id,
                    period = %item.period,
                    requested = item.quantity,
                    found,
                    "not enough free assets"
                );
                return Err(DomainError::capacity(item.product_id, item.quantity, found).into());
            }

            lines.extend(picked.into_iter().map(|asset_id| RentalLine {
                rental_id: RentalId::new(),
                asset_id,
                product_id: item.product_id,
                period: item.period,
                buffer_days: self.config.buffer_days,
                rental_rate: product.base_daily_price(),
            }));
        }

        let now = self.now();
        let order_id = OrderId::new();
        let mut order = Order::empty(order_id);
        let cmd = OrderCommand::PlaceOrder(PlaceOrder {
            order_id,
            user_id,
            period: span,
            delivery_method,
            shipping_address,
            shipping_cost: self.config.shipping.fee(delivery_method),
            lines,
            deposit_deadline_at: now + self.config.deposit_window(),
            occurred_at: now,
        });
        self.commit(ORDER_AGGREGATE, &mut order, &cmd, |o, _| self.store.insert_order(o))
            .inspect_err(|e| {
                if e.is_capacity() {
                    tracing::debug!(%order_id, "lost the race for an asset at commit");
                }
            })?;

        Ok(order)
    }

    /// Clear the cart at the version that was booked.
    fn empty_checked_out_cart(&self, mut cart: Cart, order_id: OrderId) {
        let cart_id = cart.id_typed();
        let cmd = CartCommand::ClearCart(ClearCart {
            cart_id,
            occurred_at: self.now(),
        });
        if let Err(e) = self.commit(CART_AGGREGATE, &mut cart, &cmd, |c, expected| {
            self.store.save_cart(c, expected)
        }) {
            tracing::warn!(%cart_id, %order_id, "cart not cleared after booking: {e}");
        }
    }
}
