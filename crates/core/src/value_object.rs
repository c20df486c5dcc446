//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attributes. A `DateRange`
/// from 2024-06-01 to 2024-06-03 is the same range wherever it appears; a `Rental`
/// covering that range is an entity with its own identity.
///
/// To "modify" a value object, build a new one (e.g. `DateRange::extend_end`).
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
