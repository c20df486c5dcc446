//! Settlement domain module: supplier payouts and the platform's cut.
//!
//! Business rules only (no IO, no storage).

pub mod settlement;
pub mod split;

pub use settlement::{
    ConfirmSettlement, MarkSettlementPaid, OpenSettlement, Settlement, SettlementCommand,
    SettlementEvent, SettlementKind, SettlementStatus,
};
pub use split::{FeeSplit, gross_by_supplier};
