//! Order lifecycle after placement.
//!
//! Every operation loads the order, runs one command through the aggregate's
//! transition tables and saves with the version it loaded. A concurrent update
//! of the same order surfaces as a conflict.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use wardrobe_core::{OrderId, UserId};
use wardrobe_events::{EventBus, EventEnvelope};
use wardrobe_rentals::{
    ApproveOrder, CancelOrder, CollectOrder, CompleteOrder, ConfirmPayment, DeliverOrder,
    DispatchOrder, ExpireOrder, FailPayment, FinishInspection, MarkRefunded, Order, OrderCommand,
    OrderEvent, RejectOrder, RequestDeposit, StartInspection, StartPreparing,
};
use wardrobe_settlement::Settlement;

use super::{Marketplace, ORDER_AGGREGATE};
use crate::error::ServiceResult;
use crate::notify::NotificationKind;
use crate::store::Store;

impl<S, B> Marketplace<S, B>
where
    S: Store,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn order(&self, order_id: OrderId) -> ServiceResult<Order> {
        self.load_order(order_id)
    }

    pub fn orders_of_user(&self, user_id: UserId) -> ServiceResult<Vec<Order>> {
        Ok(self.store.orders_of_user(user_id)?)
    }

    fn advance(
        &self,
        order_id: OrderId,
        build: impl FnOnce(DateTime<Utc>) -> OrderCommand,
    ) -> ServiceResult<(Order, Vec<OrderEvent>)> {
        let mut order = self.load_order(order_id)?;
        let cmd = build(self.now());
        let events = self.commit(ORDER_AGGREGATE, &mut order, &cmd, |o, expected| {
            self.store.save_order(o, expected)
        })?;

        tracing::info!(
            %order_id,
            fulfillment = %order.fulfillment_status(),
            payment = %order.payment_status(),
            "order updated"
        );
        Ok((order, events))
    }

    fn notify_customer(&self, order: &Order, kind: NotificationKind, title: &str, message: String) {
        if let Some(user) = order.user_id() {
            self.notify(user, kind, title, message, Some(order.id_typed().into()));
        }
    }

    /// Ask the customer for the deposit transfer.
    #[tracing::instrument(skip(self))]
    pub fn request_deposit(&self, order_id: OrderId) -> ServiceResult<Order> {
        let (order, _) = self.advance(order_id, |occurred_at| {
            OrderCommand::RequestDeposit(RequestDeposit {
                order_id,
                occurred_at,
            })
        })?;
        Ok(order)
    }

    #[tracing::instrument(skip(self))]
    pub fn approve(&self, order_id: OrderId, approved_by: UserId) -> ServiceResult<Order> {
        let (order, _) = self.advance(order_id, |occurred_at| {
            OrderCommand::ApproveOrder(ApproveOrder {
                order_id,
                approved_by,
                occurred_at,
            })
        })?;
        self.notify_customer(
            &order,
            NotificationKind::OrderApproved,
            "Order approved",
            format!("Your order {order_id} is confirmed"),
        );
        Ok(order)
    }

    /// Record the customer's transfer. Confirms the order while it is still
    /// open; on a called-off order the money is only recorded (and owed back).
    #[tracing::instrument(skip(self))]
    pub fn confirm_payment(&self, order_id: OrderId) -> ServiceResult<Order> {
        let (order, events) = self.advance(order_id, |occurred_at| {
            OrderCommand::ConfirmPayment(ConfirmPayment {
                order_id,
                occurred_at,
            })
        })?;
        let confirmed = events
            .iter()
            .any(|e| matches!(e, OrderEvent::PaymentConfirmed(p) if p.confirms_order));
        if confirmed {
            self.notify_customer(
                &order,
                NotificationKind::OrderApproved,
                "Payment received",
                format!("We received your payment, order {order_id} is confirmed"),
            );
        }
        Ok(order)
    }

    #[tracing::instrument(skip(self))]
    pub fn fail_payment(&self, order_id: OrderId, reason: &str) -> ServiceResult<Order> {
        let (order, _) = self.advance(order_id, |occurred_at| {
            OrderCommand::FailPayment(FailPayment {
                order_id,
                reason: reason.to_string(),
                occurred_at,
            })
        })?;
        Ok(order)
    }

    #[tracing::instrument(skip(self))]
    pub fn reject(&self, order_id: OrderId, reason: &str) -> ServiceResult<Order> {
        let (order, _) = self.advance(order_id, |occurred_at| {
            OrderCommand::RejectOrder(RejectOrder {
                order_id,
                reason: reason.to_string(),
                occurred_at,
            })
        })?;
        self.notify_customer(
            &order,
            NotificationKind::OrderRejected,
            "Order rejected",
            format!("Your order {order_id} was rejected: {reason}"),
        );
        Ok(order)
    }

    /// Expire an unpaid order once its deposit deadline has passed.
    #[tracing::instrument(skip(self))]
    pub fn expire(&self, order_id: OrderId) -> ServiceResult<Order> {
        let (order, _) = self.advance(order_id, |occurred_at| {
            OrderCommand::ExpireOrder(ExpireOrder {
                order_id,
                occurred_at,
            })
        })?;
        self.notify_customer(
            &order,
            NotificationKind::OrderExpired,
            "Order expired",
            format!("No deposit arrived in time, order {order_id} has expired"),
        );
        Ok(order)
    }

    /// Expire every overdue order. Meant for an external scheduler; one order
    /// failing does not stop the sweep.
    pub fn expire_overdue(&self) -> ServiceResult<Vec<OrderId>> {
        let overdue = self.store.overdue_orders(self.now())?;
        let mut expired = Vec::with_capacity(overdue.len());

        for order in overdue {
            let order_id = order.id_typed();
            match self.expire(order_id) {
                Ok(_) => expired.push(order_id),
                Err(e) => tracing::warn!(%order_id, "overdue order not expired: {e}"),
            }
        }

        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "overdue orders expired");
        }
        Ok(expired)
    }

    pub fn start_preparing(&self, order_id: OrderId) -> ServiceResult<Order> {
        let (order, _) = self.advance(order_id, |occurred_at| {
            OrderCommand::StartPreparing(StartPreparing {
                order_id,
                occurred_at,
            })
        })?;
        Ok(order)
    }

    #[tracing::instrument(skip(self))]
    pub fn dispatch(&self, order_id: OrderId) -> ServiceResult<Order> {
        let (order, _) = self.advance(order_id, |occurred_at| {
            OrderCommand::DispatchOrder(DispatchOrder {
                order_id,
                occurred_at,
            })
        })?;
        self.notify_customer(
            &order,
            NotificationKind::OrderDispatched,
            "Order on its way",
            format!("Order {order_id} has been dispatched"),
        );
        Ok(order)
    }

    #[tracing::instrument(skip(self))]
    pub fn deliver(&self, order_id: OrderId) -> ServiceResult<Order> {
        let (order, _) = self.advance(order_id, |occurred_at| {
            OrderCommand::DeliverOrder(DeliverOrder {
                order_id,
                occurred_at,
            })
        })?;
        self.notify_customer(
            &order,
            NotificationKind::OrderDelivered,
            "Order delivered",
            format!("Order {order_id} was delivered, enjoy"),
        );
        Ok(order)
    }

    /// The items came back from the customer.
    #[tracing::instrument(skip(self))]
    pub fn collect(&self, order_id: OrderId) -> ServiceResult<Order> {
        let (order, _) = self.advance(order_id, |occurred_at| {
            OrderCommand::CollectOrder(CollectOrder {
                order_id,
                occurred_at,
            })
        })?;
        Ok(order)
    }

    pub fn start_inspection(&self, order_id: OrderId) -> ServiceResult<Order> {
        let (order, _) = self.advance(order_id, |occurred_at| {
            OrderCommand::StartInspection(StartInspection {
                order_id,
                occurred_at,
            })
        })?;
        Ok(order)
    }

    #[tracing::instrument(skip(self, notes))]
    pub fn finish_inspection(
        &self,
        order_id: OrderId,
        passed: bool,
        notes: Option<String>,
    ) -> ServiceResult<Order> {
        let (order, _) = self.advance(order_id, |occurred_at| {
            OrderCommand::FinishInspection(FinishInspection {
                order_id,
                passed,
                notes,
                occurred_at,
            })
        })?;
        Ok(order)
    }

    /// Close the order and open the supplier settlements for it.
    ///
    /// If settlement creation fails the order stays completed;
    /// [`Marketplace::create_settlements_for_order`] can be run again.
    #[tracing::instrument(skip(self))]
    pub fn complete(&self, order_id: OrderId) -> ServiceResult<(Order, Vec<Settlement>)> {
        let (order, _) = self.advance(order_id, |occurred_at| {
            OrderCommand::CompleteOrder(CompleteOrder {
                order_id,
                occurred_at,
            })
        })?;
        let settlements = self.create_settlements_for_order(order_id)?;
        Ok((order, settlements))
    }

    /// Customer cancellation, priced by the configured refund policy.
    #[tracing::instrument(skip(self, reason))]
    pub fn cancel(&self, order_id: OrderId, user_id: UserId, reason: &str) -> ServiceResult<Order> {
        let policy = self.config.refund;
        let (order, _) = self.advance(order_id, |occurred_at| {
            OrderCommand::CancelOrder(CancelOrder {
                order_id,
                user_id,
                reason: reason.to_string(),
                policy,
                occurred_at,
            })
        })?;

        let refund = order.refund_due();
        self.notify_customer(
            &order,
            NotificationKind::OrderCanceled,
            "Order canceled",
            format!("Order {order_id} was canceled, refund due: {refund}"),
        );
        self.notify_admins(
            NotificationKind::OrderCanceled,
            "Order canceled by customer",
            &format!("Order {order_id} was canceled: {reason}"),
            Some(order_id.into()),
        );
        Ok(order)
    }

    /// Record that the money owed on a called-off order went back.
    #[tracing::instrument(skip(self))]
    pub fn mark_refunded(&self, order_id: OrderId) -> ServiceResult<Order> {
        let (order, _) = self.advance(order_id, |occurred_at| {
            OrderCommand::MarkRefunded(MarkRefunded {
                order_id,
                occurred_at,
            })
        })?;
        Ok(order)
    }
}
