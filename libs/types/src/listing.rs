//! Listings: entries in the "items for sale" collection

use crate::ids::{AccountId, ListingId};
use crate::numeric::{Amount, Quantity, Step};
use serde::{Deserialize, Serialize};

/// A batch of units of one item type offered by the marketplace owner.
///
/// Invariants:
/// - `id` equals the listing's index in the ledger
/// - `price` is fixed at creation
/// - at most one listing exists per `item_type`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub item_type: String,
    pub owner: AccountId,
    /// Units still available for purchase
    pub quantity: Quantity,
    /// Unit price in the smallest value unit
    pub price: Amount,
    /// Kept for parity with sale records; refund windows are tracked per record, so this stays zero
    pub last_sale_step: Step,
}

impl Listing {
    pub fn new(
        id: ListingId,
        item_type: impl Into<String>,
        owner: AccountId,
        quantity: Quantity,
        price: Amount,
    ) -> Self {
        Self {
            id,
            item_type: item_type.into(),
            owner,
            quantity,
            price,
            last_sale_step: 0,
        }
    }

    /// True when the stored id matches the slot it was read from.
    pub fn is_at_index(&self, index: usize) -> bool {
        self.id.index() == Some(index)
    }

    /// True when `requested` units can be taken from this listing.
    pub fn has_stock(&self, requested: Quantity) -> bool {
        requested <= self.quantity
    }
}
