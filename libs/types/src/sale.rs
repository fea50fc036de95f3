//! Sale records: independent ownership records created by purchases

use crate::ids::{AccountId, ListingId, SaleId};
use crate::numeric::{window_deadline, Amount, Quantity, Step};
use serde::{Deserialize, Serialize};

/// Units of an item type held by one buyer.
///
/// `price` is locked in by the original purchase and never changes; top-ups
/// and refunds only move `quantity`. Refund eligibility is measured from
/// `last_sale_step`, which every quantity-increasing action refreshes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub id: SaleId,
    /// Listing the record was originally bought from
    pub listing_id: ListingId,
    pub item_type: String,
    /// The buyer holding these units
    pub owner: AccountId,
    pub quantity: Quantity,
    pub price: Amount,
    pub last_sale_step: Step,
}

impl SaleRecord {
    pub fn new(
        id: SaleId,
        listing_id: ListingId,
        item_type: impl Into<String>,
        owner: AccountId,
        quantity: Quantity,
        price: Amount,
        step: Step,
    ) -> Self {
        Self {
            id,
            listing_id,
            item_type: item_type.into(),
            owner,
            quantity,
            price,
            last_sale_step: step,
        }
    }

    pub fn is_at_index(&self, index: usize) -> bool {
        self.id.index() == Some(index)
    }

    pub fn is_owned_by(&self, account: &AccountId) -> bool {
        self.owner == *account
    }

    /// Last step at which a refund is still accepted.
    pub fn refund_deadline(&self, window: Step) -> Step {
        window_deadline(self.last_sale_step, window)
    }

    /// Refunds are accepted up to and including the deadline step.
    pub fn is_refundable_at(&self, current_step: Step, window: Step) -> bool {
        current_step <= self.refund_deadline(window)
    }
}
