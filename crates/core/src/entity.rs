//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug + core::fmt::Display;

    /// Human-readable entity kind, used in not-found reporting.
    const KIND: &'static str;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;
}
