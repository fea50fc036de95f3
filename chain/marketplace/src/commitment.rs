//! State commitment — snapshots of committed ledger state and their digests
//!
//! A snapshot is a full copy of both collections and both indexes. Its digest
//! is SHA-256 over the canonical JSON encoding; the indexes are ordered maps so
//! equal states always hash equally.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use types::ids::AccountId;
use types::listing::Listing;
use types::sale::SaleRecord;

/// Point-in-time copy of the committed ledger state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub listings: Vec<Listing>,
    pub sales: Vec<SaleRecord>,
    pub active_types: BTreeMap<String, bool>,
    pub buyers: BTreeMap<String, Vec<AccountId>>,
    pub paused: bool,
}

impl LedgerSnapshot {
    /// SHA-256 of the snapshot's canonical encoding.
    pub fn digest(&self) -> [u8; 32] {
        // Serializing plain structs, vectors and string-keyed maps cannot fail.
        let encoded = serde_json::to_vec(self).unwrap_or_default();
        compute_hash(&encoded)
    }

    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest())
    }
}

/// Compute a SHA-256 hash of arbitrary data.
pub fn compute_hash(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}
