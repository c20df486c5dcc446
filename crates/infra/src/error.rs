//! Infrastructure and service-level errors.

use thiserror::Error;

use wardrobe_core::{AssetId, DateRange, DomainError, ProductId};

/// Storage failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Stale write (optimistic concurrency).
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    /// Commit-time re-check found a blocking rental on the same asset.
    #[error("asset {asset_id} of product {product_id} is already booked around {interval}")]
    Overlap {
        asset_id: AssetId,
        product_id: ProductId,
        interval: DateRange,
    },

    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl StoreError {
    pub(crate) fn poisoned() -> Self {
        StoreError::Storage("lock poisoned".to_string())
    }
}

/// Coarse error category for callers that map to transport status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Capacity,
    NotFound,
    State,
    Conflict,
    Unauthorized,
    Internal,
}

/// Error returned by every service operation.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            // Losing the commit-time race is the same outcome as a failed count.
            StoreError::Overlap { product_id, .. } => {
                ServiceError::Domain(DomainError::capacity(product_id, 1, 0))
            }
            StoreError::Concurrency(msg) => ServiceError::Domain(DomainError::Conflict(msg)),
            other => ServiceError::Store(other),
        }
    }
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Domain(err) => match err {
                DomainError::Validation(_) | DomainError::InvalidId(_) => ErrorKind::Validation,
                DomainError::InsufficientCapacity { .. } => ErrorKind::Capacity,
                DomainError::NotFound { .. } => ErrorKind::NotFound,
                DomainError::InvalidTransition { .. } | DomainError::InvariantViolation(_) => {
                    ErrorKind::State
                }
                DomainError::Conflict(_) => ErrorKind::Conflict,
                DomainError::Unauthorized => ErrorKind::Unauthorized,
            },
            ServiceError::Store(StoreError::Duplicate(_)) => ErrorKind::Conflict,
            ServiceError::Store(_) => ErrorKind::Internal,
        }
    }

    pub fn http_status(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::Unauthorized => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Capacity | ErrorKind::Conflict => 409,
            ErrorKind::State => 422,
            ErrorKind::Internal => 500,
        }
    }

    pub fn is_capacity(&self) -> bool {
        self.kind() == ErrorKind::Capacity
    }

    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            ServiceError::Domain(err) => Some(err),
            ServiceError::Store(_) => None,
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_surfaces_as_capacity() {
        let product = ProductId::new();
        let err: ServiceError = StoreError::Overlap {
            asset_id: AssetId::new(),
            product_id: product,
            interval: DateRange::parse("2024-06-01", "2024-06-04").unwrap(),
        }
        .into();
        assert!(err.is_capacity());
        assert_eq!(err.http_status(), 409);
    }

    #[test]
    fn status_codes_follow_kind() {
        let cases = [
            (ServiceError::from(DomainError::validation("bad date")), 400),
            (ServiceError::from(DomainError::Unauthorized), 403),
            (ServiceError::from(DomainError::not_found("order", "x")), 404),
            (ServiceError::from(DomainError::transition("order", "dispatched", "cancel")), 422),
            (ServiceError::from(StoreError::Concurrency("stale".into())), 409),
            (ServiceError::from(StoreError::poisoned()), 500),
        ];
        for (err, status) in cases {
            assert_eq!(err.http_status(), status, "{err}");
        }
    }
}
