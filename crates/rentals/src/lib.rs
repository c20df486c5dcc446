//! Rentals domain module: carts, orders and the rentals they own.
//!
//! Business rules only (no IO, no storage). Asset assignment is computed by the
//! caller with [`availability::AssetPlanner`]; the order aggregate validates and
//! prices the result.

pub mod availability;
pub mod cart;
pub mod issue;
pub mod order;
pub mod pricing;
pub mod refund;
pub mod rental;
pub mod status;

pub use availability::{
    AssetPlanner, BlockSource, BlockedInterval, available_count, blocked_asset_ids,
    blocked_intervals,
};
pub use cart::{
    AddItem, Cart, CartCommand, CartEvent, CartItem, ClearCart, OpenCart, RemoveItem,
    UpdateQuantity,
};
pub use issue::{IssueKind, IssueReport, IssueSeverity, IssueStatus, RentalIssue};
pub use order::{
    ApproveOrder, CancelOrder, Cancellation, CollectOrder, CompleteOrder, ConfirmPayment,
    DeliverOrder, DispatchOrder, ExpireOrder, FailPayment, FinishInspection, MarkRefunded, Order,
    OrderCommand, OrderEvent, PlaceOrder, RejectOrder, RequestDeposit, StartInspection,
    StartPreparing,
};
pub use pricing::{DeliveryMethod, PaymentMethod, ShippingRates, line_amount};
pub use refund::{RefundPolicy, RefundQuote};
pub use rental::{Rental, RentalLine};
pub use status::{
    FulfillmentAction, FulfillmentStatus, PaymentAction, PaymentStatus, RentalAction, RentalStatus,
};
