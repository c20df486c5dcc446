//! Supplier payouts.

use serde_json::Value as JsonValue;

use wardrobe_core::{
    DomainError, IssueId, OrderId, ProductId, RentalId, SettlementId, SupplierId, execute,
};
use wardrobe_events::{EventBus, EventEnvelope};
use wardrobe_settlement::{
    ConfirmSettlement, MarkSettlementPaid, OpenSettlement, Settlement, SettlementCommand,
    SettlementKind, gross_by_supplier,
};

use super::{Marketplace, SETTLEMENT_AGGREGATE};
use crate::error::{ServiceError, ServiceResult, StoreError};
use crate::notify::NotificationKind;
use crate::publish::publish_committed;
use crate::store::Store;

impl<S, B> Marketplace<S, B>
where
    S: Store,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// One rental settlement per supplier of a completed order.
    ///
    /// Rentals that were called off earn nothing. Refused once the order
    /// already has rental settlements.
    #[tracing::instrument(skip(self))]
    pub fn create_settlements_for_order(&self, order_id: OrderId) -> ServiceResult<Vec<Settlement>> {
        let order = self.load_order(order_id)?;
        if !order.is_completed() {
            return Err(DomainError::invariant(format!(
                "order {order_id} is not completed"
            ))
            .into());
        }

        let mut earnings = Vec::new();
        for rental in order.rentals().iter().filter(|r| r.status().is_billable()) {
            let supplier_id = self.supplier_of(rental.product_id())?;
            earnings.push((supplier_id, rental.amount()));
        }
        let per_supplier = gross_by_supplier(earnings)?;

        let now = self.now();
        let mut opened = Vec::with_capacity(per_supplier.len());
        for (supplier_id, gross_amount) in per_supplier {
            if gross_amount == 0 {
                continue;
            }
            let settlement_id = SettlementId::new();
            let mut settlement = Settlement::empty(settlement_id);
            let cmd = SettlementCommand::OpenSettlement(OpenSettlement {
                settlement_id,
                supplier_id,
                order_id,
                rental_id: None,
                issue_id: None,
                kind: SettlementKind::Rental,
                gross_amount,
                platform_fee_percent: self.config.platform_fee_percent,
                occurred_at: now,
            });
            let events = execute(&mut settlement, &cmd)?;
            opened.push((settlement, events));
        }

        let settlements: Vec<Settlement> = opened.iter().map(|(s, _)| s.clone()).collect();
        self.store
            .insert_order_settlements(order_id, &settlements)
            .map_err(|e| match e {
                StoreError::Duplicate(_) => ServiceError::Domain(DomainError::conflict(format!(
                    "settlements for order {order_id} already exist"
                ))),
                other => other.into(),
            })?;

        for (settlement, events) in &opened {
            publish_committed(
                &self.bus,
                SETTLEMENT_AGGREGATE,
                settlement.id_typed().into(),
                0,
                events,
            );
            self.announce_settlement(settlement);
        }
        tracing::info!(%order_id, count = settlements.len(), "order settlements opened");
        Ok(settlements)
    }

    /// Settlement for an extra charge on one rental; the whole amount goes to
    /// the supplier.
    #[tracing::instrument(skip(self))]
    pub fn create_issue_settlement(
        &self,
        rental_id: RentalId,
        issue_id: IssueId,
        amount: i64,
    ) -> ServiceResult<Settlement> {
        let order = self
            .store
            .order_of_rental(rental_id)?
            .ok_or_else(|| DomainError::not_found("rental", rental_id))?;
        let rental = order
            .rental(rental_id)
            .ok_or_else(|| DomainError::not_found("rental", rental_id))?;
        let supplier_id = self.supplier_of(rental.product_id())?;

        let settlement_id = SettlementId::new();
        let mut settlement = Settlement::empty(settlement_id);
        let cmd = SettlementCommand::OpenSettlement(OpenSettlement {
            settlement_id,
            supplier_id,
            order_id: order.id_typed(),
            rental_id: Some(rental_id),
            issue_id: Some(issue_id),
            kind: SettlementKind::Issue,
            gross_amount: amount,
            platform_fee_percent: 0,
            occurred_at: self.now(),
        });
        self.commit(SETTLEMENT_AGGREGATE, &mut settlement, &cmd, |s, expected| {
            self.store.save_settlement(s, expected)
        })?;

        self.announce_settlement(&settlement);
        tracing::info!(%settlement_id, %rental_id, amount, "issue settlement opened");
        Ok(settlement)
    }

    pub fn settlement(&self, settlement_id: SettlementId) -> ServiceResult<Settlement> {
        self.store
            .settlement(settlement_id)?
            .ok_or_else(|| DomainError::not_found("settlement", settlement_id).into())
    }

    pub fn settlements_of_order(&self, order_id: OrderId) -> ServiceResult<Vec<Settlement>> {
        Ok(self.store.settlements_of_order(order_id)?)
    }

    pub fn settlements_of_supplier(&self, supplier_id: SupplierId) -> ServiceResult<Vec<Settlement>> {
        Ok(self.store.settlements_of_supplier(supplier_id)?)
    }

    #[tracing::instrument(skip(self))]
    pub fn confirm_settlement(&self, settlement_id: SettlementId) -> ServiceResult<Settlement> {
        let mut settlement = self.settlement(settlement_id)?;
        let cmd = SettlementCommand::ConfirmSettlement(ConfirmSettlement {
            settlement_id,
            occurred_at: self.now(),
        });
        self.save_settlement_change(&mut settlement, &cmd)?;
        tracing::info!(%settlement_id, "settlement confirmed");
        Ok(settlement)
    }

    #[tracing::instrument(skip(self))]
    pub fn mark_settlement_paid(
        &self,
        settlement_id: SettlementId,
        payment_reference: Option<String>,
    ) -> ServiceResult<Settlement> {
        let mut settlement = self.settlement(settlement_id)?;
        let cmd = SettlementCommand::MarkSettlementPaid(MarkSettlementPaid {
            settlement_id,
            payment_reference,
            occurred_at: self.now(),
        });
        self.save_settlement_change(&mut settlement, &cmd)?;
        tracing::info!(%settlement_id, amount = settlement.supplier_amount(), "settlement paid");
        Ok(settlement)
    }

    fn save_settlement_change(
        &self,
        settlement: &mut Settlement,
        cmd: &SettlementCommand,
    ) -> ServiceResult<()> {
        self.commit(SETTLEMENT_AGGREGATE, settlement, cmd, |s, expected| {
            self.store.save_settlement(s, expected)
        })?;
        Ok(())
    }

    fn supplier_of(&self, product_id: ProductId) -> ServiceResult<SupplierId> {
        self.product(product_id)?
            .supplier_id()
            .ok_or_else(|| DomainError::invariant(format!("product {product_id} has no supplier")).into())
    }

    fn announce_settlement(&self, settlement: &Settlement) {
        let Some(supplier_id) = settlement.supplier_id() else {
            return;
        };
        match self.directory.supplier_contact(supplier_id) {
            Some(contact) => self.notify(
                contact,
                NotificationKind::SettlementReady,
                "Settlement ready",
                format!(
                    "A {} settlement of {} is ready for you",
                    match settlement.kind() {
                        SettlementKind::Rental => "rental",
                        SettlementKind::Issue => "damage",
                    },
                    settlement.supplier_amount()
                ),
                Some(settlement.id_typed().into()),
            ),
            None => tracing::warn!(%supplier_id, "supplier has no contact to notify"),
        }
    }
}
