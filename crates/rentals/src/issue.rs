//! Damage, delay and loss reports raised against a rental.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use wardrobe_core::{DomainError, DomainResult, Entity, IssueId, OrderId, RentalId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueKind {
    Damage,
    Delay,
    Loss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueStatus {
    Open,
    Resolved,
    Waived,
}

impl IssueStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueStatus::Open => "open",
            IssueStatus::Resolved => "resolved",
            IssueStatus::Waived => "waived",
        }
    }
}

impl core::fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for [`RentalIssue::report`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueReport {
    pub rental_id: RentalId,
    pub order_id: OrderId,
    pub kind: IssueKind,
    pub severity: IssueSeverity,
    pub description: String,
    /// Extra amount billed to the customer, passed on to the supplier in full.
    pub additional_charge: i64,
    pub reported_by: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalIssue {
    pub id: IssueId,
    pub rental_id: RentalId,
    pub order_id: OrderId,
    pub kind: IssueKind,
    pub severity: IssueSeverity,
    pub description: String,
    pub additional_charge: i64,
    pub status: IssueStatus,
    pub reported_by: UserId,
    pub reported_at: DateTime<Utc>,
    pub resolution_note: Option<String>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl RentalIssue {
    pub fn report(report: IssueReport, at: DateTime<Utc>) -> DomainResult<Self> {
        if report.description.trim().is_empty() {
            return Err(DomainError::validation("issue needs a description"));
        }
        if report.additional_charge < 0 {
            return Err(DomainError::validation("additional charge cannot be negative"));
        }
        Ok(Self {
            id: IssueId::new(),
            rental_id: report.rental_id,
            order_id: report.order_id,
            kind: report.kind,
            severity: report.severity,
            description: report.description.trim().to_string(),
            additional_charge: report.additional_charge,
            status: IssueStatus::Open,
            reported_by: report.reported_by,
            reported_at: at,
            resolution_note: None,
            closed_at: None,
        })
    }

    pub fn has_charge(&self) -> bool {
        self.additional_charge > 0
    }

    pub fn resolve(&mut self, note: impl Into<String>, at: DateTime<Utc>) -> DomainResult<()> {
        self.close(IssueStatus::Resolved, "resolve", note.into(), at)
    }

    pub fn waive(&mut self, note: impl Into<String>, at: DateTime<Utc>) -> DomainResult<()> {
        self.close(IssueStatus::Waived, "waive", note.into(), at)
    }

    fn close(
        &mut self,
        to: IssueStatus,
        action: &'static str,
        note: String,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        if self.status != IssueStatus::Open {
            return Err(DomainError::transition("issue", self.status, action));
        }
        self.status = to;
        self.resolution_note = Some(note.trim().to_string()).filter(|n| !n.is_empty());
        self.closed_at = Some(at);
        Ok(())
    }
}

impl Entity for RentalIssue {
    type Id = IssueId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
