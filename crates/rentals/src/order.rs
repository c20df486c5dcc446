use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use wardrobe_core::{Aggregate, AggregateRoot, DateRange, DomainError, OrderId, RentalId, UserId};
use wardrobe_events::Event;

use crate::pricing::{DeliveryMethod, PaymentMethod};
use crate::refund::{RefundPolicy, RefundQuote};
use crate::rental::{Rental, RentalLine};
use crate::status::{
    FulfillmentAction, FulfillmentStatus, PaymentAction, PaymentStatus, RentalAction, RentalStatus,
};

/// Cancellation record, filled when the customer cancels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    pub canceled_at: DateTime<Utc>,
    pub reason: String,
    pub refund: RefundQuote,
}

/// Aggregate root: Order (owns its rentals; one rental per reserved asset).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    user_id: Option<UserId>,
    period: Option<DateRange>,
    delivery_method: Option<DeliveryMethod>,
    shipping_address: Option<String>,
    shipping_cost: i64,
    total_amount: i64,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    fulfillment_status: FulfillmentStatus,
    rentals: Vec<Rental>,
    created_at: Option<DateTime<Utc>>,
    deposit_deadline_at: Option<DateTime<Utc>>,
    approved_at: Option<DateTime<Utc>>,
    approved_by: Option<UserId>,
    payment_confirmed_at: Option<DateTime<Utc>>,
    dispatched_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    returned_at: Option<DateTime<Utc>>,
    inspected_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    rejection_reason: Option<String>,
    cancellation: Option<Cancellation>,
    refunded_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Order {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            user_id: None,
            period: None,
            delivery_method: None,
            shipping_address: None,
            shipping_cost: 0,
            total_amount: 0,
            payment_method: PaymentMethod::BankTransfer,
            payment_status: PaymentStatus::Pending,
            fulfillment_status: FulfillmentStatus::Requested,
            rentals: Vec::new(),
            created_at: None,
            deposit_deadline_at: None,
            approved_at: None,
            approved_by: None,
            payment_confirmed_at: None,
            dispatched_at: None,
            delivered_at: None,
            returned_at: None,
            inspected_at: None,
            completed_at: None,
            rejection_reason: None,
            cancellation: None,
            refunded_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    /// Overall span requested at checkout.
    pub fn period(&self) -> Option<DateRange> {
        self.period
    }

    pub fn delivery_method(&self) -> Option<DeliveryMethod> {
        self.delivery_method
    }

    pub fn shipping_address(&self) -> Option<&str> {
        self.shipping_address.as_deref()
    }

    pub fn shipping_cost(&self) -> i64 {
        self.shipping_cost
    }

    pub fn total_amount(&self) -> i64 {
        self.total_amount
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn fulfillment_status(&self) -> FulfillmentStatus {
        self.fulfillment_status
    }

    pub fn rentals(&self) -> &[Rental] {
        &self.rentals
    }

    pub fn rental(&self, rental_id: RentalId) -> Option<&Rental> {
        self.rentals.iter().find(|r| r.id_typed() == rental_id)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn deposit_deadline_at(&self) -> Option<DateTime<Utc>> {
        self.deposit_deadline_at
    }

    pub fn approved_at(&self) -> Option<DateTime<Utc>> {
        self.approved_at
    }

    pub fn approved_by(&self) -> Option<UserId> {
        self.approved_by
    }

    pub fn payment_confirmed_at(&self) -> Option<DateTime<Utc>> {
        self.payment_confirmed_at
    }

    pub fn dispatched_at(&self) -> Option<DateTime<Utc>> {
        self.dispatched_at
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    pub fn returned_at(&self) -> Option<DateTime<Utc>> {
        self.returned_at
    }

    pub fn inspected_at(&self) -> Option<DateTime<Utc>> {
        self.inspected_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    pub fn cancellation(&self) -> Option<&Cancellation> {
        self.cancellation.as_ref()
    }

    pub fn refunded_at(&self) -> Option<DateTime<Utc>> {
        self.refunded_at
    }

    /// What goes back to the customer once the order is called off: the
    /// cancellation quote, or everything for a rejected order.
    pub fn refund_due(&self) -> i64 {
        self.cancellation
            .as_ref()
            .map_or(self.total_amount, |c| c.refund.refund_amount)
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Sum of all rental line amounts, shipping excluded.
    pub fn rentals_subtotal(&self) -> i64 {
        self.rentals.iter().map(Rental::amount).sum()
    }

    /// Open, unpaid and past its deposit deadline at `now`.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.fulfillment_status.is_open()
            && self.payment_status == PaymentStatus::Pending
            && self.deposit_deadline_at.is_some_and(|deadline| now > deadline)
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: PlaceOrder.
///
/// Assets are already assigned by the caller; the order validates the lines,
/// builds the rentals and prices the whole thing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub period: DateRange,
    pub delivery_method: Option<DeliveryMethod>,
    pub shipping_address: Option<String>,
    pub shipping_cost: i64,
    pub lines: Vec<RentalLine>,
    pub deposit_deadline_at: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RequestDeposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDeposit {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApproveOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveOrder {
    pub order_id: OrderId,
    pub approved_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConfirmPayment (bank transfer received).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmPayment {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: FailPayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailPayment {
    pub order_id: OrderId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectOrder {
    pub order_id: OrderId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ExpireOrder (deposit deadline passed without payment).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpireOrder {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: StartPreparing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartPreparing {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DispatchOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchOrder {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeliverOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverOrder {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CollectOrder (goods are back from the customer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectOrder {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: StartInspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartInspection {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: FinishInspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishInspection {
    pub order_id: OrderId,
    pub passed: bool,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CompleteOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteOrder {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelOrder (customer-initiated).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrder {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub reason: String,
    pub policy: RefundPolicy,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkRefunded (refund transfer sent).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkRefunded {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    PlaceOrder(PlaceOrder),
    RequestDeposit(RequestDeposit),
    ApproveOrder(ApproveOrder),
    ConfirmPayment(ConfirmPayment),
    FailPayment(FailPayment),
    RejectOrder(RejectOrder),
    ExpireOrder(ExpireOrder),
    StartPreparing(StartPreparing),
    DispatchOrder(DispatchOrder),
    DeliverOrder(DeliverOrder),
    CollectOrder(CollectOrder),
    StartInspection(StartInspection),
    FinishInspection(FinishInspection),
    CompleteOrder(CompleteOrder),
    CancelOrder(CancelOrder),
    MarkRefunded(MarkRefunded),
}

/// Event: OrderPlaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub period: DateRange,
    pub delivery_method: Option<DeliveryMethod>,
    pub shipping_address: Option<String>,
    pub shipping_cost: i64,
    pub payment_method: PaymentMethod,
    pub total_amount: i64,
    pub rentals: Vec<Rental>,
    pub deposit_deadline_at: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DepositRequested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositRequested {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderApproved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderApproved {
    pub order_id: OrderId,
    pub approved_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentConfirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmed {
    pub order_id: OrderId,
    /// The payment also moved fulfillment (and the rentals) to `confirmed`.
    pub confirms_order: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentFailed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFailed {
    pub order_id: OrderId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderRejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRejected {
    pub order_id: OrderId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderExpired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderExpired {
    pub order_id: OrderId,
    pub payment_expired: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PreparationStarted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparationStarted {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderDispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDispatched {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderDelivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDelivered {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderCollected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCollected {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InspectionStarted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionStarted {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InspectionFinished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionFinished {
    pub order_id: OrderId,
    pub passed: bool,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderCompleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCompleted {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderCanceled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCanceled {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub reason: String,
    pub refund: RefundQuote,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RefundIssued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundIssued {
    pub order_id: OrderId,
    pub refund_amount: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderPlaced(OrderPlaced),
    DepositRequested(DepositRequested),
    OrderApproved(OrderApproved),
    PaymentConfirmed(PaymentConfirmed),
    PaymentFailed(PaymentFailed),
    OrderRejected(OrderRejected),
    OrderExpired(OrderExpired),
    PreparationStarted(PreparationStarted),
    OrderDispatched(OrderDispatched),
    OrderDelivered(OrderDelivered),
    OrderCollected(OrderCollected),
    InspectionStarted(InspectionStarted),
    InspectionFinished(InspectionFinished),
    OrderCompleted(OrderCompleted),
    OrderCanceled(OrderCanceled),
    RefundIssued(RefundIssued),
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "rentals.order.placed",
            OrderEvent::DepositRequested(_) => "rentals.order.deposit_requested",
            OrderEvent::OrderApproved(_) => "rentals.order.approved",
            OrderEvent::PaymentConfirmed(_) => "rentals.order.payment_confirmed",
            OrderEvent::PaymentFailed(_) => "rentals.order.payment_failed",
            OrderEvent::OrderRejected(_) => "rentals.order.rejected",
            OrderEvent::OrderExpired(_) => "rentals.order.expired",
            OrderEvent::PreparationStarted(_) => "rentals.order.preparing",
            OrderEvent::OrderDispatched(_) => "rentals.order.dispatched",
            OrderEvent::OrderDelivered(_) => "rentals.order.delivered",
            OrderEvent::OrderCollected(_) => "rentals.order.collected",
            OrderEvent::InspectionStarted(_) => "rentals.order.inspection_started",
            OrderEvent::InspectionFinished(_) => "rentals.order.inspection_finished",
            OrderEvent::OrderCompleted(_) => "rentals.order.completed",
            OrderEvent::OrderCanceled(_) => "rentals.order.canceled",
            OrderEvent::RefundIssued(_) => "rentals.order.refunded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderPlaced(e) => e.occurred_at,
            OrderEvent::DepositRequested(e) => e.occurred_at,
            OrderEvent::OrderApproved(e) => e.occurred_at,
            OrderEvent::PaymentConfirmed(e) => e.occurred_at,
            OrderEvent::PaymentFailed(e) => e.occurred_at,
            OrderEvent::OrderRejected(e) => e.occurred_at,
            OrderEvent::OrderExpired(e) => e.occurred_at,
            OrderEvent::PreparationStarted(e) => e.occurred_at,
            OrderEvent::OrderDispatched(e) => e.occurred_at,
            OrderEvent::OrderDelivered(e) => e.occurred_at,
            OrderEvent::OrderCollected(e) => e.occurred_at,
            OrderEvent::InspectionStarted(e) => e.occurred_at,
            OrderEvent::InspectionFinished(e) => e.occurred_at,
            OrderEvent::OrderCompleted(e) => e.occurred_at,
            OrderEvent::OrderCanceled(e) => e.occurred_at,
            OrderEvent::RefundIssued(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::OrderPlaced(e) => {
                self.id = e.order_id;
                self.user_id = Some(e.user_id);
                self.period = Some(e.period);
                self.delivery_method = e.delivery_method;
                self.shipping_address = e.shipping_address.clone();
                self.shipping_cost = e.shipping_cost;
                self.payment_method = e.payment_method;
                self.total_amount = e.total_amount;
                self.rentals = e.rentals.clone();
                self.payment_status = PaymentStatus::Pending;
                self.fulfillment_status = FulfillmentStatus::Requested;
                self.created_at = Some(e.occurred_at);
                self.deposit_deadline_at = Some(e.deposit_deadline_at);
                self.created = true;
            }
            OrderEvent::DepositRequested(_) => {
                self.fulfillment_status = FulfillmentStatus::HoldPendingPay;
                self.set_rentals(RentalStatus::HoldPendingPay);
            }
            OrderEvent::OrderApproved(e) => {
                self.confirm(e.occurred_at);
                self.approved_by = Some(e.approved_by);
            }
            OrderEvent::PaymentConfirmed(e) => {
                self.payment_status = PaymentStatus::Confirmed;
                self.payment_confirmed_at = Some(e.occurred_at);
                if e.confirms_order {
                    self.confirm(e.occurred_at);
                }
            }
            OrderEvent::PaymentFailed(_) => {
                self.payment_status = PaymentStatus::Failed;
            }
            OrderEvent::OrderRejected(e) => {
                self.fulfillment_status = FulfillmentStatus::Rejected;
                self.rejection_reason = Some(e.reason.clone());
                self.set_rentals(RentalStatus::Rejected);
            }
            OrderEvent::OrderExpired(e) => {
                self.fulfillment_status = FulfillmentStatus::Expired;
                if e.payment_expired {
                    self.payment_status = PaymentStatus::Expired;
                }
                self.set_rentals(RentalStatus::Expired);
            }
            OrderEvent::PreparationStarted(_) => {
                self.fulfillment_status = FulfillmentStatus::Preparing;
            }
            OrderEvent::OrderDispatched(e) => {
                self.fulfillment_status = FulfillmentStatus::Dispatched;
                self.dispatched_at = Some(e.occurred_at);
                self.set_rentals(RentalStatus::Rented);
            }
            OrderEvent::OrderDelivered(e) => {
                self.fulfillment_status = FulfillmentStatus::Delivered;
                self.delivered_at = Some(e.occurred_at);
            }
            OrderEvent::OrderCollected(e) => {
                self.fulfillment_status = FulfillmentStatus::Returned;
                self.returned_at = Some(e.occurred_at);
                self.set_rentals(RentalStatus::Returned);
            }
            OrderEvent::InspectionStarted(_) => {
                self.fulfillment_status = FulfillmentStatus::Inspecting;
            }
            OrderEvent::InspectionFinished(e) => {
                self.fulfillment_status = if e.passed {
                    FulfillmentStatus::InspectionPassed
                } else {
                    FulfillmentStatus::InspectionFailed
                };
                self.inspected_at = Some(e.occurred_at);
                self.set_rentals(RentalStatus::Inspected);
            }
            OrderEvent::OrderCompleted(e) => {
                self.completed_at = Some(e.occurred_at);
                self.set_rentals(RentalStatus::Completed);
            }
            OrderEvent::OrderCanceled(e) => {
                self.fulfillment_status = FulfillmentStatus::Canceled;
                self.cancellation = Some(Cancellation {
                    canceled_at: e.occurred_at,
                    reason: e.reason.clone(),
                    refund: e.refund,
                });
                for rental in &mut self.rentals {
                    rental.set_status(RentalStatus::Canceled);
                    rental.set_cancel_reason(&e.reason);
                }
            }
            OrderEvent::RefundIssued(e) => {
                self.payment_status = PaymentStatus::Refunded;
                self.refunded_at = Some(e.occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::PlaceOrder(cmd) => self.handle_place(cmd),
            OrderCommand::RequestDeposit(cmd) => self.handle_request_deposit(cmd),
            OrderCommand::ApproveOrder(cmd) => self.handle_approve(cmd),
            OrderCommand::ConfirmPayment(cmd) => self.handle_confirm_payment(cmd),
            OrderCommand::FailPayment(cmd) => self.handle_fail_payment(cmd),
            OrderCommand::RejectOrder(cmd) => self.handle_reject(cmd),
            OrderCommand::ExpireOrder(cmd) => self.handle_expire(cmd),
            OrderCommand::StartPreparing(cmd) => self.handle_start_preparing(cmd),
            OrderCommand::DispatchOrder(cmd) => self.handle_dispatch(cmd),
            OrderCommand::DeliverOrder(cmd) => self.handle_deliver(cmd),
            OrderCommand::CollectOrder(cmd) => self.handle_collect(cmd),
            OrderCommand::StartInspection(cmd) => self.handle_start_inspection(cmd),
            OrderCommand::FinishInspection(cmd) => self.handle_finish_inspection(cmd),
            OrderCommand::CompleteOrder(cmd) => self.handle_complete(cmd),
            OrderCommand::CancelOrder(cmd) => self.handle_cancel(cmd),
            OrderCommand::MarkRefunded(cmd) => self.handle_mark_refunded(cmd),
        }
    }
}

impl Order {
    fn confirm(&mut self, at: DateTime<Utc>) {
        self.fulfillment_status = FulfillmentStatus::Confirmed;
        self.approved_at = Some(at);
        self.set_rentals(RentalStatus::Confirmed);
    }

    fn set_rentals(&mut self, status: RentalStatus) {
        for rental in &mut self.rentals {
            rental.set_status(status);
        }
    }

    fn ensure_order(&self, order_id: OrderId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("order", order_id));
        }
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    /// Checks the fulfillment move and, when given, the matching move for every rental.
    fn ensure_step(
        &self,
        order_id: OrderId,
        action: FulfillmentAction,
        rentals: Option<RentalAction>,
    ) -> Result<(), DomainError> {
        self.ensure_order(order_id)?;
        self.fulfillment_status.next(action)?;
        if let Some(rental_action) = rentals {
            for rental in &self.rentals {
                rental.check(rental_action)?;
            }
        }
        Ok(())
    }

    fn handle_place(&self, cmd: &PlaceOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("order already exists"));
        }
        if cmd.period.start() >= cmd.period.end() {
            return Err(DomainError::validation(format!(
                "order start date {} must be before end date {}",
                cmd.period.start(),
                cmd.period.end()
            )));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("order needs at least one rental"));
        }
        if let Some(line) = cmd.lines.iter().find(|l| !cmd.period.contains(&l.period)) {
            return Err(DomainError::validation(format!(
                "rental dates {} fall outside the order span {}",
                line.period, cmd.period
            )));
        }
        if cmd.shipping_cost < 0 {
            return Err(DomainError::validation("shipping cost cannot be negative"));
        }

        let rentals = cmd
            .lines
            .iter()
            .map(|line| Rental::book(cmd.order_id, line))
            .collect::<Result<Vec<_>, _>>()?;

        for (i, a) in rentals.iter().enumerate() {
            if rentals[i + 1..].iter().any(|b| a.collides_with(b)) {
                return Err(DomainError::invariant(format!(
                    "asset {} assigned twice for overlapping dates",
                    a.asset_id()
                )));
            }
        }

        let total_amount = rentals
            .iter()
            .try_fold(cmd.shipping_cost, |acc, r| acc.checked_add(r.amount()))
            .ok_or_else(|| DomainError::validation("order total overflows"))?;

        Ok(vec![OrderEvent::OrderPlaced(OrderPlaced {
            order_id: cmd.order_id,
            user_id: cmd.user_id,
            period: cmd.period,
            delivery_method: cmd.delivery_method,
            shipping_address: cmd.shipping_address.clone(),
            shipping_cost: cmd.shipping_cost,
            payment_method: PaymentMethod::BankTransfer,
            total_amount,
            rentals,
            deposit_deadline_at: cmd.deposit_deadline_at,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_request_deposit(&self, cmd: &RequestDeposit) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_step(
            cmd.order_id,
            FulfillmentAction::RequestDeposit,
            Some(RentalAction::HoldForPayment),
        )?;
        Ok(vec![OrderEvent::DepositRequested(DepositRequested {
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &ApproveOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_step(cmd.order_id, FulfillmentAction::Confirm, Some(RentalAction::Confirm))?;
        Ok(vec![OrderEvent::OrderApproved(OrderApproved {
            order_id: cmd.order_id,
            approved_by: cmd.approved_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_confirm_payment(&self, cmd: &ConfirmPayment) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_order(cmd.order_id)?;
        self.payment_status.next(PaymentAction::Confirm)?;

        // Payment on an order still waiting for a decision confirms it too. A
        // transfer landing after cancel/reject only records the money, which is
        // then owed back.
        let confirms_order = self.fulfillment_status.is_open();
        if confirms_order {
            self.ensure_step(cmd.order_id, FulfillmentAction::Confirm, Some(RentalAction::Confirm))?;
        }

        Ok(vec![OrderEvent::PaymentConfirmed(PaymentConfirmed {
            order_id: cmd.order_id,
            confirms_order,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_fail_payment(&self, cmd: &FailPayment) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_order(cmd.order_id)?;
        self.payment_status.next(PaymentAction::Fail)?;
        Ok(vec![OrderEvent::PaymentFailed(PaymentFailed {
            order_id: cmd.order_id,
            reason: cmd.reason.trim().to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject(&self, cmd: &RejectOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("rejection needs a reason"));
        }
        self.ensure_step(cmd.order_id, FulfillmentAction::Reject, Some(RentalAction::Reject))?;
        Ok(vec![OrderEvent::OrderRejected(OrderRejected {
            order_id: cmd.order_id,
            reason: cmd.reason.trim().to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_expire(&self, cmd: &ExpireOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_step(cmd.order_id, FulfillmentAction::Expire, Some(RentalAction::Expire))?;
        let deadline_passed = self
            .deposit_deadline_at
            .is_some_and(|deadline| cmd.occurred_at > deadline);
        if !deadline_passed {
            return Err(DomainError::invariant("deposit deadline has not passed yet"));
        }
        let payment_expired = self.payment_status.next(PaymentAction::Expire).is_ok();
        Ok(vec![OrderEvent::OrderExpired(OrderExpired {
            order_id: cmd.order_id,
            payment_expired,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_start_preparing(&self, cmd: &StartPreparing) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_step(cmd.order_id, FulfillmentAction::Prepare, None)?;
        Ok(vec![OrderEvent::PreparationStarted(PreparationStarted {
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_dispatch(&self, cmd: &DispatchOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_step(cmd.order_id, FulfillmentAction::Dispatch, Some(RentalAction::HandOut))?;
        Ok(vec![OrderEvent::OrderDispatched(OrderDispatched {
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_deliver(&self, cmd: &DeliverOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_step(cmd.order_id, FulfillmentAction::Deliver, None)?;
        Ok(vec![OrderEvent::OrderDelivered(OrderDelivered {
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_collect(&self, cmd: &CollectOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_step(cmd.order_id, FulfillmentAction::Collect, Some(RentalAction::TakeBack))?;
        Ok(vec![OrderEvent::OrderCollected(OrderCollected {
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_start_inspection(&self, cmd: &StartInspection) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_step(cmd.order_id, FulfillmentAction::StartInspection, None)?;
        Ok(vec![OrderEvent::InspectionStarted(InspectionStarted {
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_finish_inspection(&self, cmd: &FinishInspection) -> Result<Vec<OrderEvent>, DomainError> {
        let action = if cmd.passed {
            FulfillmentAction::PassInspection
        } else {
            FulfillmentAction::FailInspection
        };
        self.ensure_step(cmd.order_id, action, Some(RentalAction::Inspect))?;
        Ok(vec![OrderEvent::InspectionFinished(InspectionFinished {
            order_id: cmd.order_id,
            passed: cmd.passed,
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_complete(&self, cmd: &CompleteOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_order(cmd.order_id)?;
        match self.fulfillment_status {
            FulfillmentStatus::InspectionPassed | FulfillmentStatus::InspectionFailed => {}
            other => return Err(DomainError::transition("order", other, "complete")),
        }
        for rental in &self.rentals {
            rental.check(RentalAction::Complete)?;
        }
        Ok(vec![OrderEvent::OrderCompleted(OrderCompleted {
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_order(cmd.order_id)?;
        if self.user_id != Some(cmd.user_id) {
            return Err(DomainError::Unauthorized);
        }
        self.ensure_step(cmd.order_id, FulfillmentAction::Cancel, Some(RentalAction::Cancel))?;

        let ordered_at = self.created_at.unwrap_or(cmd.occurred_at);
        let refund = cmd.policy.quote(self.total_amount, ordered_at, cmd.occurred_at);

        Ok(vec![OrderEvent::OrderCanceled(OrderCanceled {
            order_id: cmd.order_id,
            user_id: cmd.user_id,
            reason: cmd.reason.trim().to_string(),
            refund,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_refunded(&self, cmd: &MarkRefunded) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_order(cmd.order_id)?;
        if !self.fulfillment_status.is_aborted() {
            return Err(DomainError::transition("order", self.fulfillment_status, "refund"));
        }
        self.payment_status.next(PaymentAction::Refund)?;
        Ok(vec![OrderEvent::RefundIssued(RefundIssued {
            order_id: cmd.order_id,
            refund_amount: self.refund_due(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
