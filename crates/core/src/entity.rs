//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Storages, categories, items and transaction records are all entities: two
/// values with the same identifier describe the same row, whatever their fields say.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
