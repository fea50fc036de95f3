//! Ledger events
//!
//! Events are immutable records emitted by committed operations. They are
//! observable by embedders but never consumed by the ledger itself. Refunds
//! and top-up purchases emit nothing.

use serde::{Deserialize, Serialize};
use types::ids::{AccountId, ListingId, SaleId};
use types::numeric::{Amount, Quantity};

/// A new listing was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemListed {
    pub listing_id: ListingId,
    pub item_type: String,
    pub owner: AccountId,
    pub quantity: Quantity,
    pub price: Amount,
}

/// Stock was added to an existing listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityAdded {
    pub listing_id: ListingId,
    pub owner: AccountId,
    pub amount_added: Quantity,
}

/// A first-time purchase created a new sale record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSold {
    pub sale_id: SaleId,
    pub buyer: AccountId,
    pub quantity: Quantity,
    pub price: Amount,
}

/// Enum wrapper for all ledger events, enabling uniform handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    ItemListed(ItemListed),
    QuantityAdded(QuantityAdded),
    ItemSold(ItemSold),
}

impl LedgerEvent {
    pub fn label(&self) -> &'static str {
        match self {
            LedgerEvent::ItemListed(_) => "item_listed",
            LedgerEvent::QuantityAdded(_) => "quantity_added",
            LedgerEvent::ItemSold(_) => "item_sold",
        }
    }
}
