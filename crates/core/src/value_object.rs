//! Value object trait: equality by value, not identity.

/// Marker trait for immutable domain values compared by their attributes.
///
/// A value object has no identity: two instances with equal values are the
/// same value (`Money::new(100)` is `Money::new(100)`, wherever it came
/// from). Contrast with [`crate::Entity`], where identity persists across
/// attribute changes.
///
/// Implementors must be cheap to copy/clone and never mutated in place; to
/// "change" one, construct a new value.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
