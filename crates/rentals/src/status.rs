//! Status tracks for orders and rentals.
//!
//! Each track has one transition table: an action names the states it may start
//! from and the state it lands in. Every other move is a state error.

use serde::{Deserialize, Serialize};

use wardrobe_core::{DomainError, DomainResult};

/// Payment lifecycle (manual bank transfer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Confirmed,
    Failed,
    Expired,
    Refunded,
}

/// Order-level physical-delivery lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentStatus {
    Requested,
    #[serde(rename = "hold_pendingpay")]
    HoldPendingPay,
    Confirmed,
    Preparing,
    Dispatched,
    Delivered,
    Returned,
    Inspecting,
    InspectionPassed,
    InspectionFailed,
    Rejected,
    Canceled,
    Expired,
}

/// Per line-item (per asset) lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RentalStatus {
    Requested,
    #[serde(rename = "hold_pendingpay")]
    HoldPendingPay,
    Confirmed,
    Rented,
    Returned,
    Inspected,
    Completed,
    Canceled,
    Rejected,
    Expired,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Confirmed => "confirmed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Expired => "expired",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn next(self, action: PaymentAction) -> DomainResult<PaymentStatus> {
        let (from, to) = action.rule();
        if from.contains(&self) {
            Ok(to)
        } else {
            Err(DomainError::transition("payment", self, action.as_str()))
        }
    }
}

impl FulfillmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FulfillmentStatus::Requested => "requested",
            FulfillmentStatus::HoldPendingPay => "hold_pendingpay",
            FulfillmentStatus::Confirmed => "confirmed",
            FulfillmentStatus::Preparing => "preparing",
            FulfillmentStatus::Dispatched => "dispatched",
            FulfillmentStatus::Delivered => "delivered",
            FulfillmentStatus::Returned => "returned",
            FulfillmentStatus::Inspecting => "inspecting",
            FulfillmentStatus::InspectionPassed => "inspection_passed",
            FulfillmentStatus::InspectionFailed => "inspection_failed",
            FulfillmentStatus::Rejected => "rejected",
            FulfillmentStatus::Canceled => "canceled",
            FulfillmentStatus::Expired => "expired",
        }
    }

    /// Still waiting on an admin decision or a deposit; the only states a
    /// customer can cancel from.
    pub fn is_open(self) -> bool {
        match self {
            FulfillmentStatus::Requested | FulfillmentStatus::HoldPendingPay => true,
            FulfillmentStatus::Confirmed
            | FulfillmentStatus::Preparing
            | FulfillmentStatus::Dispatched
            | FulfillmentStatus::Delivered
            | FulfillmentStatus::Returned
            | FulfillmentStatus::Inspecting
            | FulfillmentStatus::InspectionPassed
            | FulfillmentStatus::InspectionFailed
            | FulfillmentStatus::Rejected
            | FulfillmentStatus::Canceled
            | FulfillmentStatus::Expired => false,
        }
    }

    /// Ended without the goods ever leaving.
    pub fn is_aborted(self) -> bool {
        match self {
            FulfillmentStatus::Rejected | FulfillmentStatus::Canceled | FulfillmentStatus::Expired => true,
            FulfillmentStatus::Requested
            | FulfillmentStatus::HoldPendingPay
            | FulfillmentStatus::Confirmed
            | FulfillmentStatus::Preparing
            | FulfillmentStatus::Dispatched
            | FulfillmentStatus::Delivered
            | FulfillmentStatus::Returned
            | FulfillmentStatus::Inspecting
            | FulfillmentStatus::InspectionPassed
            | FulfillmentStatus::InspectionFailed => false,
        }
    }

    pub fn next(self, action: FulfillmentAction) -> DomainResult<FulfillmentStatus> {
        let (from, to) = action.rule();
        if from.contains(&self) {
            Ok(to)
        } else {
            Err(DomainError::transition("order", self, action.as_str()))
        }
    }
}

impl RentalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RentalStatus::Requested => "requested",
            RentalStatus::HoldPendingPay => "hold_pendingpay",
            RentalStatus::Confirmed => "confirmed",
            RentalStatus::Rented => "rented",
            RentalStatus::Returned => "returned",
            RentalStatus::Inspected => "inspected",
            RentalStatus::Completed => "completed",
            RentalStatus::Canceled => "canceled",
            RentalStatus::Rejected => "rejected",
            RentalStatus::Expired => "expired",
        }
    }

    /// Canonical blocking set, shared by catalog browsing, cart validation,
    /// booking and the store's commit-time re-check.
    pub fn is_blocking(self) -> bool {
        match self {
            RentalStatus::Requested
            | RentalStatus::HoldPendingPay
            | RentalStatus::Confirmed
            | RentalStatus::Rented => true,
            RentalStatus::Returned
            | RentalStatus::Inspected
            | RentalStatus::Completed
            | RentalStatus::Canceled
            | RentalStatus::Rejected
            | RentalStatus::Expired => false,
        }
    }

    /// Counts towards revenue (excluded once the booking was called off).
    pub fn is_billable(self) -> bool {
        match self {
            RentalStatus::Canceled | RentalStatus::Rejected | RentalStatus::Expired => false,
            RentalStatus::Requested
            | RentalStatus::HoldPendingPay
            | RentalStatus::Confirmed
            | RentalStatus::Rented
            | RentalStatus::Returned
            | RentalStatus::Inspected
            | RentalStatus::Completed => true,
        }
    }

    pub fn next(self, action: RentalAction) -> DomainResult<RentalStatus> {
        let (from, to) = action.rule();
        if from.contains(&self) {
            Ok(to)
        } else {
            Err(DomainError::transition("rental", self, action.as_str()))
        }
    }
}

macro_rules! impl_display {
    ($($t:ty),*) => {
        $(
            impl core::fmt::Display for $t {
                fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )*
    };
}

impl_display!(PaymentStatus, FulfillmentStatus, RentalStatus);

/// Moves on the payment track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentAction {
    Confirm,
    Fail,
    Expire,
    Refund,
}

impl PaymentAction {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentAction::Confirm => "confirm payment for",
            PaymentAction::Fail => "fail payment for",
            PaymentAction::Expire => "expire payment for",
            PaymentAction::Refund => "refund",
        }
    }

    /// (allowed source states, target state)
    pub fn rule(self) -> (&'static [PaymentStatus], PaymentStatus) {
        use PaymentStatus as S;
        match self {
            PaymentAction::Confirm => (&[S::Pending], S::Confirmed),
            PaymentAction::Fail => (&[S::Pending], S::Failed),
            PaymentAction::Expire => (&[S::Pending], S::Expired),
            PaymentAction::Refund => (&[S::Confirmed], S::Refunded),
        }
    }
}

/// Moves on the fulfillment track.
///
/// `Confirm` is the single way into `confirmed`, whether the trigger is an admin
/// approval or a confirmed bank transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FulfillmentAction {
    RequestDeposit,
    Confirm,
    Reject,
    Expire,
    Cancel,
    Prepare,
    Dispatch,
    Deliver,
    Collect,
    StartInspection,
    PassInspection,
    FailInspection,
}

impl FulfillmentAction {
    pub fn as_str(self) -> &'static str {
        match self {
            FulfillmentAction::RequestDeposit => "request deposit for",
            FulfillmentAction::Confirm => "confirm",
            FulfillmentAction::Reject => "reject",
            FulfillmentAction::Expire => "expire",
            FulfillmentAction::Cancel => "cancel",
            FulfillmentAction::Prepare => "prepare",
            FulfillmentAction::Dispatch => "dispatch",
            FulfillmentAction::Deliver => "deliver",
            FulfillmentAction::Collect => "collect",
            FulfillmentAction::StartInspection => "start inspection of",
            FulfillmentAction::PassInspection => "pass inspection of",
            FulfillmentAction::FailInspection => "fail inspection of",
        }
    }

    /// (allowed source states, target state)
    pub fn rule(self) -> (&'static [FulfillmentStatus], FulfillmentStatus) {
        use FulfillmentStatus as S;
        const OPEN: &[FulfillmentStatus] = &[S::Requested, S::HoldPendingPay];
        match self {
            FulfillmentAction::RequestDeposit => (&[S::Requested], S::HoldPendingPay),
            FulfillmentAction::Confirm => (OPEN, S::Confirmed),
            FulfillmentAction::Reject => (OPEN, S::Rejected),
            FulfillmentAction::Expire => (OPEN, S::Expired),
            FulfillmentAction::Cancel => (OPEN, S::Canceled),
            FulfillmentAction::Prepare => (&[S::Confirmed], S::Preparing),
            FulfillmentAction::Dispatch => (&[S::Confirmed, S::Preparing], S::Dispatched),
            FulfillmentAction::Deliver => (&[S::Dispatched], S::Delivered),
            FulfillmentAction::Collect => (&[S::Delivered], S::Returned),
            FulfillmentAction::StartInspection => (&[S::Returned], S::Inspecting),
            FulfillmentAction::PassInspection => (&[S::Inspecting], S::InspectionPassed),
            FulfillmentAction::FailInspection => (&[S::Inspecting], S::InspectionFailed),
        }
    }
}

/// Moves on the rental track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RentalAction {
    HoldForPayment,
    Confirm,
    Reject,
    Expire,
    Cancel,
    HandOut,
    TakeBack,
    Inspect,
    Complete,
}

impl RentalAction {
    pub fn as_str(self) -> &'static str {
        match self {
            RentalAction::HoldForPayment => "hold",
            RentalAction::Confirm => "confirm",
            RentalAction::Reject => "reject",
            RentalAction::Expire => "expire",
            RentalAction::Cancel => "cancel",
            RentalAction::HandOut => "hand out",
            RentalAction::TakeBack => "take back",
            RentalAction::Inspect => "inspect",
            RentalAction::Complete => "complete",
        }
    }

    /// (allowed source states, target state)
    pub fn rule(self) -> (&'static [RentalStatus], RentalStatus) {
        use RentalStatus as S;
        const OPEN: &[RentalStatus] = &[S::Requested, S::HoldPendingPay];
        match self {
            RentalAction::HoldForPayment => (&[S::Requested], S::HoldPendingPay),
            RentalAction::Confirm => (OPEN, S::Confirmed),
            RentalAction::Reject => (OPEN, S::Rejected),
            RentalAction::Expire => (OPEN, S::Expired),
            RentalAction::Cancel => (OPEN, S::Canceled),
            RentalAction::HandOut => (&[S::Confirmed], S::Rented),
            RentalAction::TakeBack => (&[S::Rented], S::Returned),
            RentalAction::Inspect => (&[S::Returned], S::Inspected),
            RentalAction::Complete => (&[S::Inspected], S::Completed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persisted_spellings_match_storage_contract() {
        assert_eq!(
            serde_json::to_string(&FulfillmentStatus::HoldPendingPay).unwrap(),
            "\"hold_pendingpay\""
        );
        assert_eq!(
            serde_json::to_string(&FulfillmentStatus::InspectionPassed).unwrap(),
            "\"inspection_passed\""
        );
        assert_eq!(
            serde_json::to_string(&RentalStatus::HoldPendingPay).unwrap(),
            "\"hold_pendingpay\""
        );
        assert_eq!(serde_json::to_string(&PaymentStatus::Refunded).unwrap(), "\"refunded\"");
    }

    #[test]
    fn as_str_agrees_with_serde() {
        for status in [
            FulfillmentStatus::Requested,
            FulfillmentStatus::HoldPendingPay,
            FulfillmentStatus::InspectionFailed,
            FulfillmentStatus::Expired,
        ] {
            assert_eq!(
                serde_json::to_string(&status).unwrap(),
                format!("\"{}\"", status.as_str())
            );
        }
    }

    #[test]
    fn blocking_set_is_exactly_the_pre_return_states() {
        let blocking: Vec<_> = [
            RentalStatus::Requested,
            RentalStatus::HoldPendingPay,
            RentalStatus::Confirmed,
            RentalStatus::Rented,
            RentalStatus::Returned,
            RentalStatus::Inspected,
            RentalStatus::Completed,
            RentalStatus::Canceled,
            RentalStatus::Rejected,
            RentalStatus::Expired,
        ]
        .into_iter()
        .filter(|s| s.is_blocking())
        .collect();
        assert_eq!(
            blocking,
            vec![
                RentalStatus::Requested,
                RentalStatus::HoldPendingPay,
                RentalStatus::Confirmed,
                RentalStatus::Rented
            ]
        );
    }

    #[test]
    fn happy_path_walks_the_fulfillment_table() {
        let mut status = FulfillmentStatus::Requested;
        for action in [
            FulfillmentAction::RequestDeposit,
            FulfillmentAction::Confirm,
            FulfillmentAction::Prepare,
            FulfillmentAction::Dispatch,
            FulfillmentAction::Deliver,
            FulfillmentAction::Collect,
            FulfillmentAction::StartInspection,
            FulfillmentAction::PassInspection,
        ] {
            status = status.next(action).unwrap();
        }
        assert_eq!(status, FulfillmentStatus::InspectionPassed);
    }

    #[test]
    fn cancel_is_refused_once_dispatched() {
        let err = FulfillmentStatus::Dispatched
            .next(FulfillmentAction::Cancel)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid transition: cannot cancel order in status 'dispatched'"
        );
    }

    #[test]
    fn payment_refund_requires_confirmed_payment() {
        assert!(PaymentStatus::Pending.next(PaymentAction::Refund).is_err());
        assert_eq!(
            PaymentStatus::Confirmed.next(PaymentAction::Refund).unwrap(),
            PaymentStatus::Refunded
        );
    }

    #[test]
    fn rental_cannot_skip_inspection() {
        assert!(RentalStatus::Returned.next(RentalAction::Complete).is_err());
        assert_eq!(
            RentalStatus::Inspected.next(RentalAction::Complete).unwrap(),
            RentalStatus::Completed
        );
    }

    #[test]
    fn terminal_states_accept_no_action() {
        let actions = [
            FulfillmentAction::RequestDeposit,
            FulfillmentAction::Confirm,
            FulfillmentAction::Reject,
            FulfillmentAction::Expire,
            FulfillmentAction::Cancel,
            FulfillmentAction::Prepare,
            FulfillmentAction::Dispatch,
            FulfillmentAction::Deliver,
            FulfillmentAction::Collect,
            FulfillmentAction::StartInspection,
            FulfillmentAction::PassInspection,
            FulfillmentAction::FailInspection,
        ];
        for terminal in [
            FulfillmentStatus::Rejected,
            FulfillmentStatus::Canceled,
            FulfillmentStatus::Expired,
            FulfillmentStatus::InspectionPassed,
            FulfillmentStatus::InspectionFailed,
        ] {
            for action in actions {
                assert!(terminal.next(action).is_err(), "{terminal} accepted {action:?}");
            }
        }
    }
}
