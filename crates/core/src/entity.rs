//! Things with identity: accounts and ledger entries.

/// A domain object identified by id rather than by its field values.
///
/// Stores key their rows by [`Entity::id`]; two snapshots of the same account with
/// different balances are still the same entity.
pub trait Entity {
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> Self::Id;
}
