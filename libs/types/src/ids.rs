//! Identifier types for marketplace entities
//!
//! Principals use UUID v7 so that they sort by creation time. Listings and
//! sale records are addressed by their position in the ledger's append-only
//! collections, so their identifiers are plain sequence numbers.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of a principal (the marketplace owner or a buyer)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(Uuid);

impl AccountId {
    /// Create a new AccountId with current timestamp
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create from existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get inner UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a listing in the "items for sale" collection
///
/// Invariant: a listing's id always equals its index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListingId(u64);

impl ListingId {
    pub const fn new(index: u64) -> Self {
        Self(index)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Index into the listing collection, if it fits the platform's `usize`.
    pub fn index(&self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listing#{}", self.0)
    }
}

impl From<u64> for ListingId {
    fn from(index: u64) -> Self {
        Self(index)
    }
}

/// Position of a sale record in the "sold items" collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SaleId(u64);

impl SaleId {
    pub const fn new(index: u64) -> Self {
        Self(index)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn index(&self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }
}

impl fmt::Display for SaleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sale#{}", self.0)
    }
}

impl From<u64> for SaleId {
    fn from(index: u64) -> Self {
        Self(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_id_creation() {
        let id1 = AccountId::new();
        let id2 = AccountId::new();
        assert_ne!(id1, id2, "AccountIds should be unique");
    }

    #[test]
    fn test_account_id_serialization() {
        let id = AccountId::new();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: AccountId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn test_listing_id_is_transparent() {
        let id = ListingId::new(7);
        assert_eq!(serde_json::to_string(&id).unwrap(), "7");
        assert_eq!(id.index(), Some(7));
        assert_eq!(id.to_string(), "listing#7");
    }

    #[test]
    fn test_sale_id_from_u64() {
        let id: SaleId = 3u64.into();
        assert_eq!(id.value(), 3);
        assert_eq!(id.to_string(), "sale#3");
    }
}
