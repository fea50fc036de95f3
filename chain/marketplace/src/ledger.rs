//! Ledger — listings, sale records, first-purchase gate and windowed refunds
//!
//! The engine owns two append-only collections (listings and sale records)
//! and two indexes (active item types and per-type buyer history).
//!
//! Every operation validates all of its preconditions first, then calls the
//! settlement collaborator, then mutates. A failed call therefore leaves the
//! collections, the indexes and the event log exactly as they were.
//!
//! All state-changing operations check, in order:
//! 1. Pause state
//! 2. Access control (owner-only operations)
//! 3. Existence of the referenced listing / sale record
//! 4. Arguments (quantities, payment, stock)
//! 5. Relationship of the caller to the entity
//! 6. Refund window (refunds only)

use std::collections::BTreeMap;

use tracing::{debug, info, warn};
use types::ids::{AccountId, ListingId, SaleId};
use types::listing::Listing;
use types::numeric::{checked_cost, Amount, Quantity, Step};
use types::sale::SaleRecord;

use crate::commitment::LedgerSnapshot;
use crate::config::LedgerConfig;
use crate::errors::{ConfigError, LedgerError};
use crate::events::{ItemListed, ItemSold, LedgerEvent, QuantityAdded};
use crate::security::{Authorizer, OwnerAccess, PauseGuard};
use crate::settlement::Settlement;

/// The marketplace ledger engine.
#[derive(Debug)]
pub struct Ledger<S, A = OwnerAccess> {
    /// Items for sale; `listings[i].id == i`
    listings: Vec<Listing>,
    /// Sold items; `sales[i].id == i`
    sales: Vec<SaleRecord>,
    /// Item types that have ever been listed (never cleared)
    active_types: BTreeMap<String, bool>,
    /// First-time buyers per item type, in purchase order
    buyers: BTreeMap<String, Vec<AccountId>>,
    refund_window: Step,
    pause_guard: PauseGuard,
    access: A,
    settlement: S,
    /// Emitted events log (append-only)
    events: Vec<LedgerEvent>,
}

impl<S: Settlement> Ledger<S, OwnerAccess> {
    /// Create a ledger owned by `config.owner`.
    ///
    /// Fails if the configuration does not validate.
    pub fn new(config: LedgerConfig, settlement: S) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut ledger = Self::with_authorizer(
            OwnerAccess::new(config.owner),
            settlement,
            config.refund_window,
        );
        if config.start_paused {
            ledger.pause_guard.pause();
        }
        Ok(ledger)
    }
}

impl<S: Settlement, A: Authorizer> Ledger<S, A> {
    /// Create a ledger with a custom authorization collaborator.
    pub fn with_authorizer(access: A, settlement: S, refund_window: Step) -> Self {
        info!(owner = %access.owner(), refund_window, "Ledger initialized");
        Self {
            listings: Vec::new(),
            sales: Vec::new(),
            active_types: BTreeMap::new(),
            buyers: BTreeMap::new(),
            refund_window,
            pause_guard: PauseGuard::default(),
            access,
            settlement,
            events: Vec::new(),
        }
    }

    // ───────────────────────── Listings ─────────────────────────

    /// List a new item type. Owner-only; one listing per item type, ever.
    ///
    /// Emits `ItemListed`.
    pub fn create_listing(
        &mut self,
        caller: &AccountId,
        item_type: &str,
        price: Amount,
        quantity: Quantity,
    ) -> Result<ListingId, LedgerError> {
        let result = self.try_create_listing(caller, item_type, price, quantity);
        log_rejection("create_listing", caller, &result);
        result
    }

    fn try_create_listing(
        &mut self,
        caller: &AccountId,
        item_type: &str,
        price: Amount,
        quantity: Quantity,
    ) -> Result<ListingId, LedgerError> {
        self.check_not_paused()?;
        self.check_owner(caller)?;

        if self.is_active(item_type) {
            return Err(LedgerError::ItemTypeActive {
                item_type: item_type.to_string(),
            });
        }
        if price == 0 {
            return Err(LedgerError::ZeroPrice);
        }
        if quantity == 0 {
            return Err(LedgerError::ZeroQuantity);
        }

        let listing_id = ListingId::new(self.listings.len() as u64);
        self.listings
            .push(Listing::new(listing_id, item_type, *caller, quantity, price));
        self.active_types.insert(item_type.to_string(), true);

        info!(%listing_id, item_type, quantity, price, "Item listed");
        self.events.push(LedgerEvent::ItemListed(ItemListed {
            listing_id,
            item_type: item_type.to_string(),
            owner: *caller,
            quantity,
            price,
        }));
        Ok(listing_id)
    }

    /// Restock an existing listing. Owner-only.
    ///
    /// Emits `QuantityAdded`.
    pub fn add_quantity(
        &mut self,
        caller: &AccountId,
        listing_id: ListingId,
        amount: Quantity,
    ) -> Result<ListingId, LedgerError> {
        let result = self.try_add_quantity(caller, listing_id, amount);
        log_rejection("add_quantity", caller, &result);
        result
    }

    fn try_add_quantity(
        &mut self,
        caller: &AccountId,
        listing_id: ListingId,
        amount: Quantity,
    ) -> Result<ListingId, LedgerError> {
        self.check_not_paused()?;
        self.check_owner(caller)?;
        let index = self.listing_index(listing_id)?;

        if amount == 0 {
            return Err(LedgerError::ZeroQuantity);
        }
        let new_quantity = self.listings[index]
            .quantity
            .checked_add(amount)
            .ok_or(LedgerError::Overflow {
                what: "listing quantity",
            })?;

        self.listings[index].quantity = new_quantity;

        info!(%listing_id, amount, quantity = new_quantity, "Quantity added");
        self.events.push(LedgerEvent::QuantityAdded(QuantityAdded {
            listing_id,
            owner: *caller,
            amount_added: amount,
        }));
        Ok(listing_id)
    }

    // ───────────────────────── Purchases ─────────────────────────

    /// First-time purchase of `item_type` by `caller`.
    ///
    /// A principal can complete this at most once per item type, whichever
    /// listing they buy from. Captures `price × quantity` through settlement
    /// and emits `ItemSold`.
    pub fn buy(
        &mut self,
        caller: &AccountId,
        listing_id: ListingId,
        item_type: &str,
        quantity: Quantity,
        payment: Amount,
        current_step: Step,
    ) -> Result<SaleId, LedgerError> {
        let result = self.try_buy(caller, listing_id, item_type, quantity, payment, current_step);
        log_rejection("buy", caller, &result);
        result
    }

    fn try_buy(
        &mut self,
        caller: &AccountId,
        listing_id: ListingId,
        item_type: &str,
        quantity: Quantity,
        payment: Amount,
        current_step: Step,
    ) -> Result<SaleId, LedgerError> {
        self.check_not_paused()?;
        let index = self.listing_index(listing_id)?;
        let listing = &self.listings[index];

        if listing.item_type != item_type {
            return Err(LedgerError::ItemTypeMismatch {
                listing_id,
                expected: listing.item_type.clone(),
                provided: item_type.to_string(),
            });
        }
        let cost = check_purchase(listing, quantity, payment)?;
        if listing.owner == *caller {
            return Err(LedgerError::OwnerCannotBuy { listing_id });
        }
        if self.has_purchased(item_type, caller) {
            return Err(LedgerError::AlreadyPurchased {
                item_type: item_type.to_string(),
            });
        }

        self.settlement.capture(caller, cost)?;

        let listing = &mut self.listings[index];
        listing.quantity -= quantity;
        let price = listing.price;
        let remaining = listing.quantity;

        let sale_id = SaleId::new(self.sales.len() as u64);
        self.sales.push(SaleRecord::new(
            sale_id,
            listing_id,
            item_type,
            *caller,
            quantity,
            price,
            current_step,
        ));
        self.buyers
            .entry(item_type.to_string())
            .or_default()
            .push(*caller);

        info!(
            %listing_id,
            %sale_id,
            buyer = %caller,
            quantity,
            cost,
            remaining,
            step = current_step,
            "Item sold"
        );
        self.events.push(LedgerEvent::ItemSold(ItemSold {
            sale_id,
            buyer: *caller,
            quantity,
            price,
        }));
        Ok(sale_id)
    }

    /// Top up an existing sale record from its origin listing.
    ///
    /// Bypasses the first-purchase gate: the caller already owns the record.
    /// Refreshes the record's refund window. The record keeps its original
    /// price; the cost is charged at the listing's price.
    pub fn buy_more(
        &mut self,
        caller: &AccountId,
        listing_id: ListingId,
        sale_id: SaleId,
        quantity: Quantity,
        payment: Amount,
        current_step: Step,
    ) -> Result<(), LedgerError> {
        let result =
            self.try_buy_more(caller, listing_id, sale_id, quantity, payment, current_step);
        log_rejection("buy_more", caller, &result);
        result
    }

    fn try_buy_more(
        &mut self,
        caller: &AccountId,
        listing_id: ListingId,
        sale_id: SaleId,
        quantity: Quantity,
        payment: Amount,
        current_step: Step,
    ) -> Result<(), LedgerError> {
        self.check_not_paused()?;
        let listing_index = self.listing_index(listing_id)?;
        let sale_index = self.sale_index(sale_id)?;
        let cost = check_purchase(&self.listings[listing_index], quantity, payment)?;
        let sale = &self.sales[sale_index];

        if !sale.is_owned_by(caller) {
            return Err(LedgerError::NotRecordOwner { sale_id });
        }
        if sale.listing_id != listing_id {
            return Err(LedgerError::ListingMismatch {
                sale_id,
                origin: sale.listing_id,
                provided: listing_id,
            });
        }
        let new_held = sale
            .quantity
            .checked_add(quantity)
            .ok_or(LedgerError::Overflow {
                what: "sale record quantity",
            })?;

        self.settlement.capture(caller, cost)?;

        self.listings[listing_index].quantity -= quantity;
        let sale = &mut self.sales[sale_index];
        sale.quantity = new_held;
        sale.last_sale_step = current_step;

        info!(
            %listing_id,
            %sale_id,
            buyer = %caller,
            quantity,
            cost,
            held = new_held,
            step = current_step,
            "Sale record topped up"
        );
        Ok(())
    }

    // ───────────────────────── Refunds ─────────────────────────

    /// Return `quantity` units of a sale record to `listing_id` and pay the
    /// caller `record.price × quantity`.
    ///
    /// Accepted while `current_step <= last_sale_step + refund_window`.
    /// `listing_id` is only checked for existence; it need not be the
    /// record's origin listing. Emits no event.
    pub fn request_refund(
        &mut self,
        caller: &AccountId,
        listing_id: ListingId,
        sale_id: SaleId,
        quantity: Quantity,
        current_step: Step,
    ) -> Result<(), LedgerError> {
        let result = self.try_request_refund(caller, listing_id, sale_id, quantity, current_step);
        log_rejection("request_refund", caller, &result);
        result
    }

    fn try_request_refund(
        &mut self,
        caller: &AccountId,
        listing_id: ListingId,
        sale_id: SaleId,
        quantity: Quantity,
        current_step: Step,
    ) -> Result<(), LedgerError> {
        self.check_not_paused()?;
        let sale_index = self.sale_index(sale_id)?;
        let listing_index = self.listing_index(listing_id)?;
        let sale = &self.sales[sale_index];

        if quantity == 0 {
            return Err(LedgerError::ZeroQuantity);
        }
        if quantity > sale.quantity {
            return Err(LedgerError::RefundExceedsHolding {
                sale_id,
                requested: quantity,
                held: sale.quantity,
            });
        }
        if !sale.is_owned_by(caller) {
            return Err(LedgerError::NotRecordOwner { sale_id });
        }
        if !sale.is_refundable_at(current_step, self.refund_window) {
            return Err(LedgerError::RefundWindowExpired {
                sale_id,
                deadline: sale.refund_deadline(self.refund_window),
                current: current_step,
            });
        }
        let restocked = self.listings[listing_index]
            .quantity
            .checked_add(quantity)
            .ok_or(LedgerError::Overflow {
                what: "listing quantity",
            })?;
        let payout = checked_cost(sale.price, quantity).ok_or(LedgerError::Overflow {
            what: "refund amount",
        })?;

        self.settlement.pay_out(caller, payout)?;

        self.listings[listing_index].quantity = restocked;
        let sale = &mut self.sales[sale_index];
        sale.quantity -= quantity;

        info!(
            %listing_id,
            %sale_id,
            buyer = %caller,
            quantity,
            payout,
            held = sale.quantity,
            step = current_step,
            "Refund processed"
        );
        Ok(())
    }

    // ───────────────────────── Pause ─────────────────────────

    /// Suspend all mutating operations. Owner-only.
    pub fn pause(&mut self, caller: &AccountId) -> Result<(), LedgerError> {
        self.check_owner(caller)?;
        self.pause_guard.pause();
        info!("Ledger paused");
        Ok(())
    }

    /// Resume mutating operations. Owner-only.
    pub fn unpause(&mut self, caller: &AccountId) -> Result<(), LedgerError> {
        self.check_owner(caller)?;
        self.pause_guard.unpause();
        info!("Ledger unpaused");
        Ok(())
    }

    pub fn is_paused(&self) -> bool {
        self.pause_guard.is_paused()
    }

    // ───────────────────────── Queries ─────────────────────────

    pub fn listing_count(&self) -> usize {
        self.listings.len()
    }

    pub fn sale_count(&self) -> usize {
        self.sales.len()
    }

    pub fn listings(&self) -> &[Listing] {
        &self.listings
    }

    pub fn sales(&self) -> &[SaleRecord] {
        &self.sales
    }

    pub fn listing(&self, listing_id: ListingId) -> Result<&Listing, LedgerError> {
        let index = self.listing_index(listing_id)?;
        Ok(&self.listings[index])
    }

    pub fn sale(&self, sale_id: SaleId) -> Result<&SaleRecord, LedgerError> {
        let index = self.sale_index(sale_id)?;
        Ok(&self.sales[index])
    }

    /// True once `item_type` has been listed; never reverts.
    pub fn is_active(&self, item_type: &str) -> bool {
        self.active_types.get(item_type).copied().unwrap_or(false)
    }

    /// Principals that completed a first purchase of `item_type`, in order.
    pub fn buyers(&self, item_type: &str) -> &[AccountId] {
        self.buyers
            .get(item_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_purchased(&self, item_type: &str, account: &AccountId) -> bool {
        self.buyers(item_type).contains(account)
    }

    /// Last step at which `sale_id` can still be refunded.
    pub fn refund_deadline(&self, sale_id: SaleId) -> Result<Step, LedgerError> {
        Ok(self.sale(sale_id)?.refund_deadline(self.refund_window))
    }

    pub fn refund_window(&self) -> Step {
        self.refund_window
    }

    pub fn owner(&self) -> AccountId {
        self.access.owner()
    }

    pub fn settlement(&self) -> &S {
        &self.settlement
    }

    /// Copy of the full committed state.
    pub fn snapshot(&self) -> LedgerSnapshot {
        debug!(
            listings = self.listings.len(),
            sales = self.sales.len(),
            "Building ledger snapshot"
        );
        LedgerSnapshot {
            listings: self.listings.clone(),
            sales: self.sales.clone(),
            active_types: self.active_types.clone(),
            buyers: self.buyers.clone(),
            paused: self.pause_guard.is_paused(),
        }
    }

    /// SHA-256 digest of the committed state.
    pub fn state_digest(&self) -> [u8; 32] {
        self.snapshot().digest()
    }

    // ───────────────────────── Events ─────────────────────────

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    /// Drain all events (consume and clear).
    pub fn drain_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }

    // ───────────────────────── Internal Guards ─────────────────────────

    fn check_not_paused(&self) -> Result<(), LedgerError> {
        if self.pause_guard.is_paused() {
            return Err(LedgerError::Paused);
        }
        Ok(())
    }

    fn check_owner(&self, caller: &AccountId) -> Result<(), LedgerError> {
        if !self.access.is_owner(caller) {
            return Err(LedgerError::Unauthorized);
        }
        Ok(())
    }

    /// Resolve a listing id to its slot, rejecting out-of-range ids, slots
    /// whose stored id disagrees, and listings whose type is not active.
    fn listing_index(&self, listing_id: ListingId) -> Result<usize, LedgerError> {
        let not_found = LedgerError::ListingNotFound { listing_id };
        let index = listing_id.index().ok_or_else(|| not_found.clone())?;
        let listing = self.listings.get(index).ok_or_else(|| not_found.clone())?;
        if !listing.is_at_index(index) || !self.is_active(&listing.item_type) {
            return Err(not_found);
        }
        Ok(index)
    }

    fn sale_index(&self, sale_id: SaleId) -> Result<usize, LedgerError> {
        let not_found = LedgerError::SaleNotFound { sale_id };
        let index = sale_id.index().ok_or_else(|| not_found.clone())?;
        let sale = self.sales.get(index).ok_or_else(|| not_found.clone())?;
        if !sale.is_at_index(index) {
            return Err(not_found);
        }
        Ok(index)
    }
}

/// Shared purchase checks: positive quantity, sufficient payment, enough stock.
/// Returns the cost to capture.
fn check_purchase(
    listing: &Listing,
    quantity: Quantity,
    payment: Amount,
) -> Result<Amount, LedgerError> {
    if quantity == 0 {
        return Err(LedgerError::ZeroQuantity);
    }
    let cost = checked_cost(listing.price, quantity).ok_or(LedgerError::Overflow {
        what: "purchase cost",
    })?;
    if payment < cost {
        return Err(LedgerError::InsufficientPayment {
            required: cost,
            provided: payment,
        });
    }
    if !listing.has_stock(quantity) {
        return Err(LedgerError::InsufficientStock {
            listing_id: listing.id,
            requested: quantity,
            available: listing.quantity,
        });
    }
    Ok(cost)
}

fn log_rejection<T>(operation: &'static str, caller: &AccountId, result: &Result<T, LedgerError>) {
    if let Err(err) = result {
        warn!(operation, %caller, kind = ?err.kind(), error = %err, "Operation rejected");
    }
}
