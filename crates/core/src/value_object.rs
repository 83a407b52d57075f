//! Values compared by content.

/// Marker for immutable, identity-less values.
///
/// `Money { 10000, USD }` equals any other `Money { 10000, USD }`. Operations that
/// "change" a value return a new one.
pub trait ValueObject: Copy + PartialEq + core::fmt::Debug {}
