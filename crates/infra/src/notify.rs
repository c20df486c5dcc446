//! Outbound notifications and the identity lookups they need.
//!
//! Delivery is fire-and-forget: a failed notification is logged and never
//! fails the operation that triggered it.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use wardrobe_core::{SupplierId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderCreated,
    OrderApproved,
    OrderRejected,
    OrderExpired,
    OrderDispatched,
    OrderDelivered,
    OrderCanceled,
    SettlementReady,
    IssueReported,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::OrderCreated => "order_created",
            NotificationKind::OrderApproved => "order_approved",
            NotificationKind::OrderRejected => "order_rejected",
            NotificationKind::OrderExpired => "order_expired",
            NotificationKind::OrderDispatched => "order_dispatched",
            NotificationKind::OrderDelivered => "order_delivered",
            NotificationKind::OrderCanceled => "order_canceled",
            NotificationKind::SettlementReady => "settlement_ready",
            NotificationKind::IssueReported => "issue_reported",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub user: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// Order, settlement or issue the notification is about.
    pub related_id: Option<Uuid>,
}

#[derive(Debug, Clone, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Who to tell: platform admins and the contact user of each supplier.
pub trait Directory: Send + Sync {
    fn admins(&self) -> Vec<UserId>;
    fn supplier_contact(&self, supplier_id: SupplierId) -> Option<UserId>;
}

/// Logs notifications instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        tracing::info!(
            user = %notification.user,
            kind = notification.kind.as_str(),
            title = %notification.title,
            "notification"
        );
        Ok(())
    }
}

/// Keeps every notification in memory; can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    failing: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose every delivery fails.
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn sent_of_kind(&self, kind: NotificationKind) -> Vec<Notification> {
        self.sent().into_iter().filter(|n| n.kind == kind).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        if self.failing {
            return Err(NotifyError("notifier is down".to_string()));
        }
        self.sent
            .lock()
            .map_err(|_| NotifyError("recorder lock poisoned".to_string()))?
            .push(notification);
        Ok(())
    }
}

/// Fixed directory, configured up front.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    admins: Vec<UserId>,
    suppliers: HashMap<SupplierId, UserId>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_admin(mut self, admin: UserId) -> Self {
        self.admins.push(admin);
        self
    }

    pub fn with_supplier(mut self, supplier_id: SupplierId, contact: UserId) -> Self {
        self.suppliers.insert(supplier_id, contact);
        self
    }
}

impl Directory for StaticDirectory {
    fn admins(&self) -> Vec<UserId> {
        self.admins.clone()
    }

    fn supplier_contact(&self, supplier_id: SupplierId) -> Option<UserId> {
        self.suppliers.get(&supplier_id).copied()
    }
}
