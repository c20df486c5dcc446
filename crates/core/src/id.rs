//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $t:ident, $name:literal) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $t(Uuid);

        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
            /// for determinism.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s)
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

uuid_id!(
    /// Identifier of a user (customer, admin or supplier account).
    UserId,
    "UserId"
);
uuid_id!(
    /// Identifier of a supplier (owner of products, receiver of settlements).
    SupplierId,
    "SupplierId"
);
uuid_id!(CategoryId, "CategoryId");
uuid_id!(
    /// Identifier of a catalog product.
    ProductId,
    "ProductId"
);
uuid_id!(
    /// Identifier of one physical copy of a product.
    AssetId,
    "AssetId"
);
uuid_id!(BlockedPeriodId, "BlockedPeriodId");
uuid_id!(CartId, "CartId");
uuid_id!(CartItemId, "CartItemId");
uuid_id!(OrderId, "OrderId");
uuid_id!(RentalId, "RentalId");
uuid_id!(IssueId, "IssueId");
uuid_id!(SettlementId, "SettlementId");
