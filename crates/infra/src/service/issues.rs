//! Damage, delay and loss reports on rentals.

use serde_json::Value as JsonValue;

use wardrobe_core::{DomainError, IssueId, OrderId, RentalId, UserId};
use wardrobe_events::{EventBus, EventEnvelope};
use wardrobe_rentals::{IssueKind, IssueReport, IssueSeverity, RentalIssue};
use wardrobe_settlement::Settlement;

use super::Marketplace;
use crate::error::ServiceResult;
use crate::notify::NotificationKind;
use crate::store::Store;

impl<S, B> Marketplace<S, B>
where
    S: Store,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Open an issue on a rental. A positive charge books an issue settlement
    /// for the rental's supplier right away.
    #[tracing::instrument(skip(self, description))]
    pub fn report_issue(
        &self,
        rental_id: RentalId,
        kind: IssueKind,
        severity: IssueSeverity,
        description: &str,
        additional_charge: i64,
        reported_by: UserId,
    ) -> ServiceResult<(RentalIssue, Option<Settlement>)> {
        let order = self
            .store
            .order_of_rental(rental_id)?
            .ok_or_else(|| DomainError::not_found("rental", rental_id))?;

        let issue = RentalIssue::report(
            IssueReport {
                rental_id,
                order_id: order.id_typed(),
                kind,
                severity,
                description: description.to_string(),
                additional_charge,
                reported_by,
            },
            self.now(),
        )?;
        // An issue is only stored once its charge is booked.
        let settlement = if issue.has_charge() {
            Some(self.create_issue_settlement(rental_id, issue.id, issue.additional_charge)?)
        } else {
            None
        };
        self.store.save_issue(&issue)?;
        tracing::info!(issue_id = %issue.id, %rental_id, ?kind, ?severity, "issue reported");

        self.notify_admins(
            NotificationKind::IssueReported,
            "Rental issue reported",
            &format!("{kind:?} reported on rental {rental_id}: {}", issue.description),
            Some(issue.id.into()),
        );

        Ok((issue, settlement))
    }

    pub fn issue(&self, issue_id: IssueId) -> ServiceResult<RentalIssue> {
        self.store
            .issue(issue_id)?
            .ok_or_else(|| DomainError::not_found("issue", issue_id).into())
    }

    pub fn issues_of_order(&self, order_id: OrderId) -> ServiceResult<Vec<RentalIssue>> {
        Ok(self.store.issues_of_order(order_id)?)
    }

    pub fn resolve_issue(&self, issue_id: IssueId, note: &str) -> ServiceResult<RentalIssue> {
        let mut issue = self.issue(issue_id)?;
        issue.resolve(note, self.now())?;
        self.store.save_issue(&issue)?;
        tracing::info!(%issue_id, "issue resolved");
        Ok(issue)
    }

    pub fn waive_issue(&self, issue_id: IssueId, note: &str) -> ServiceResult<RentalIssue> {
        let mut issue = self.issue(issue_id)?;
        issue.waive(note, self.now())?;
        self.store.save_issue(&issue)?;
        tracing::info!(%issue_id, "issue waived");
        Ok(issue)
    }
}
