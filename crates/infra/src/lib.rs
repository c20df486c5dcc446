//! Infrastructure and application services for the booking core.
//!
//! - [`store`]: storage traits and the in-memory implementation.
//! - [`service::Marketplace`]: every booking operation, wired to a store, an
//!   event bus, a clock and the notification service.
//! - [`config`], [`error`], [`notify`], [`publish`], [`locks`]: the plumbing.

pub mod config;
pub mod error;
pub mod locks;
pub mod notify;
pub mod publish;
pub mod service;
pub mod store;

mod integration_tests;

pub use config::BookingConfig;
pub use error::{ErrorKind, ServiceError, ServiceResult, StoreError};
pub use locks::KeyedLocks;
pub use notify::{
    Directory, LogNotifier, Notification, NotificationKind, Notifier, NotifyError,
    RecordingNotifier, StaticDirectory,
};
pub use publish::publish_committed;
pub use service::Marketplace;
pub use store::{
    CartStore, CatalogStore, InMemoryStore, IssueStore, OrderStore, SettlementStore, Store,
    StoreResult,
};
