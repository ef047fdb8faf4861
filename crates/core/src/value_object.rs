//! Value object trait: equality by value, not identity.
//!
//! Value objects are domain objects with **no identity** - they are defined
//! entirely by their attribute values. Two value objects with the same values
//! are considered equal.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. To "modify" one,
/// create a new one with the new values. `Money` is the canonical example: two
/// amounts of 10.01 USD are interchangeable, while two group members with the
/// same name are not.
///
/// The trait requires:
/// - **Clone**: value objects are cheap to copy (they're values, not references)
/// - **PartialEq**: compared by their attribute values
/// - **Debug**: debuggable (helpful for logging, testing)
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
