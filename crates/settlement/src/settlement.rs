use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use wardrobe_core::{
    Aggregate, AggregateRoot, DomainError, IssueId, OrderId, RentalId, SettlementId, SupplierId,
};
use wardrobe_events::Event;

use crate::split::FeeSplit;

/// What the payout is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementKind {
    /// Supplier's share of completed rentals.
    Rental,
    /// Extra charge collected for damage, delay or loss.
    Issue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementStatus {
    Pending,
    Confirmed,
    Paid,
}

impl SettlementStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SettlementStatus::Pending => "pending",
            SettlementStatus::Confirmed => "confirmed",
            SettlementStatus::Paid => "paid",
        }
    }
}

impl core::fmt::Display for SettlementStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate root: Settlement (one supplier payout).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    id: SettlementId,
    supplier_id: Option<SupplierId>,
    order_id: Option<OrderId>,
    rental_id: Option<RentalId>,
    issue_id: Option<IssueId>,
    kind: SettlementKind,
    split: FeeSplit,
    status: SettlementStatus,
    created_at: Option<DateTime<Utc>>,
    settlement_date: Option<DateTime<Utc>>,
    paid_at: Option<DateTime<Utc>>,
    payment_reference: Option<String>,
    version: u64,
    created: bool,
}

impl Settlement {
    pub fn empty(id: SettlementId) -> Self {
        Self {
            id,
            supplier_id: None,
            order_id: None,
            rental_id: None,
            issue_id: None,
            kind: SettlementKind::Rental,
            split: FeeSplit {
                gross_amount: 0,
                platform_fee_percent: 0,
                platform_fee_amount: 0,
                supplier_amount: 0,
            },
            status: SettlementStatus::Pending,
            created_at: None,
            settlement_date: None,
            paid_at: None,
            payment_reference: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> SettlementId {
        self.id
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn order_id(&self) -> Option<OrderId> {
        self.order_id
    }

    pub fn rental_id(&self) -> Option<RentalId> {
        self.rental_id
    }

    pub fn issue_id(&self) -> Option<IssueId> {
        self.issue_id
    }

    pub fn kind(&self) -> SettlementKind {
        self.kind
    }

    pub fn split(&self) -> FeeSplit {
        self.split
    }

    pub fn gross_amount(&self) -> i64 {
        self.split.gross_amount
    }

    pub fn platform_fee_amount(&self) -> i64 {
        self.split.platform_fee_amount
    }

    pub fn supplier_amount(&self) -> i64 {
        self.split.supplier_amount
    }

    pub fn status(&self) -> SettlementStatus {
        self.status
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn settlement_date(&self) -> Option<DateTime<Utc>> {
        self.settlement_date
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    pub fn payment_reference(&self) -> Option<&str> {
        self.payment_reference.as_deref()
    }

    pub fn is_created(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for Settlement {
    type Id = SettlementId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenSettlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenSettlement {
    pub settlement_id: SettlementId,
    pub supplier_id: SupplierId,
    pub order_id: OrderId,
    pub rental_id: Option<RentalId>,
    pub issue_id: Option<IssueId>,
    pub kind: SettlementKind,
    pub gross_amount: i64,
    /// Ignored for issue settlements, which carry no fee.
    pub platform_fee_percent: u8,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConfirmSettlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmSettlement {
    pub settlement_id: SettlementId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkSettlementPaid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkSettlementPaid {
    pub settlement_id: SettlementId,
    pub payment_reference: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementCommand {
    OpenSettlement(OpenSettlement),
    ConfirmSettlement(ConfirmSettlement),
    MarkSettlementPaid(MarkSettlementPaid),
}

/// Event: SettlementOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementOpened {
    pub settlement_id: SettlementId,
    pub supplier_id: SupplierId,
    pub order_id: OrderId,
    pub rental_id: Option<RentalId>,
    pub issue_id: Option<IssueId>,
    pub kind: SettlementKind,
    pub split: FeeSplit,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SettlementConfirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementConfirmed {
    pub settlement_id: SettlementId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SettlementPaid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementPaid {
    pub settlement_id: SettlementId,
    pub supplier_amount: i64,
    pub payment_reference: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementEvent {
    SettlementOpened(SettlementOpened),
    SettlementConfirmed(SettlementConfirmed),
    SettlementPaid(SettlementPaid),
}

impl Event for SettlementEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SettlementEvent::SettlementOpened(_) => "settlement.opened",
            SettlementEvent::SettlementConfirmed(_) => "settlement.confirmed",
            SettlementEvent::SettlementPaid(_) => "settlement.paid",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SettlementEvent::SettlementOpened(e) => e.occurred_at,
            SettlementEvent::SettlementConfirmed(e) => e.occurred_at,
            SettlementEvent::SettlementPaid(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Settlement {
    type Command = SettlementCommand;
    type Event = SettlementEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SettlementEvent::SettlementOpened(e) => {
                self.id = e.settlement_id;
                self.supplier_id = Some(e.supplier_id);
                self.order_id = Some(e.order_id);
                self.rental_id = e.rental_id;
                self.issue_id = e.issue_id;
                self.kind = e.kind;
                self.split = e.split;
                self.status = SettlementStatus::Pending;
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            SettlementEvent::SettlementConfirmed(e) => {
                self.status = SettlementStatus::Confirmed;
                self.settlement_date = Some(e.occurred_at);
            }
            SettlementEvent::SettlementPaid(e) => {
                self.status = SettlementStatus::Paid;
                self.paid_at = Some(e.occurred_at);
                self.payment_reference = e.payment_reference.clone();
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SettlementCommand::OpenSettlement(cmd) => self.handle_open(cmd),
            SettlementCommand::ConfirmSettlement(cmd) => self.handle_confirm(cmd),
            SettlementCommand::MarkSettlementPaid(cmd) => self.handle_mark_paid(cmd),
        }
    }
}

impl Settlement {
    fn ensure_settlement(&self, settlement_id: SettlementId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("settlement", settlement_id));
        }
        if self.id != settlement_id {
            return Err(DomainError::invariant("settlement_id mismatch"));
        }
        Ok(())
    }

    fn handle_open(&self, cmd: &OpenSettlement) -> Result<Vec<SettlementEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("settlement already exists"));
        }
        let split = match cmd.kind {
            SettlementKind::Rental => FeeSplit::new(cmd.gross_amount, cmd.platform_fee_percent)?,
            SettlementKind::Issue => {
                if cmd.issue_id.is_none() {
                    return Err(DomainError::validation("issue settlement needs an issue id"));
                }
                FeeSplit::pass_through(cmd.gross_amount)?
            }
        };
        if split.gross_amount == 0 {
            return Err(DomainError::validation("nothing to settle"));
        }

        Ok(vec![SettlementEvent::SettlementOpened(SettlementOpened {
            settlement_id: cmd.settlement_id,
            supplier_id: cmd.supplier_id,
            order_id: cmd.order_id,
            rental_id: cmd.rental_id,
            issue_id: cmd.issue_id,
            kind: cmd.kind,
            split,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_confirm(&self, cmd: &ConfirmSettlement) -> Result<Vec<SettlementEvent>, DomainError> {
        self.ensure_settlement(cmd.settlement_id)?;
        match self.status {
            SettlementStatus::Pending => Ok(vec![SettlementEvent::SettlementConfirmed(
                SettlementConfirmed {
                    settlement_id: cmd.settlement_id,
                    occurred_at: cmd.occurred_at,
                },
            )]),
            SettlementStatus::Confirmed | SettlementStatus::Paid => {
                Err(DomainError::transition("settlement", self.status, "confirm"))
            }
        }
    }

    fn handle_mark_paid(&self, cmd: &MarkSettlementPaid) -> Result<Vec<SettlementEvent>, DomainError> {
        self.ensure_settlement(cmd.settlement_id)?;
        match self.status {
            SettlementStatus::Confirmed => Ok(vec![SettlementEvent::SettlementPaid(SettlementPaid {
                settlement_id: cmd.settlement_id,
                supplier_amount: self.split.supplier_amount,
                payment_reference: cmd.payment_reference.clone(),
                occurred_at: cmd.occurred_at,
            })]),
            SettlementStatus::Pending | SettlementStatus::Paid => {
                Err(DomainError::transition("settlement", self.status, "pay"))
            }
        }
    }
}
