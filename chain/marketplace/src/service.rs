//! Single-writer service around the ledger
//!
//! [`SharedLedger`] serializes every call (reads included) through one mutex
//! and stamps time-sensitive operations with the step read from its
//! [`StepSource`] while the lock is held, so step order follows commit order.
//!
//! A call made from the thread that is already executing an operation, for
//! example a settlement callback reaching back into the service, is rejected
//! with `LedgerError::Reentrancy` instead of deadlocking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tracing::{debug, warn};
use types::ids::{AccountId, ListingId, SaleId};
use types::listing::Listing;
use types::numeric::{Amount, Quantity, Step};
use types::sale::SaleRecord;

use crate::commitment::LedgerSnapshot;
use crate::errors::LedgerError;
use crate::events::LedgerEvent;
use crate::ledger::Ledger;
use crate::security::{Authorizer, OwnerAccess, ReentrancyGuard};
use crate::settlement::Settlement;

/// Step-counter collaborator: supplies the current monotonic step.
pub trait StepSource {
    fn current_step(&self) -> Step;
}

/// Step counter advanced explicitly by the embedder.
#[derive(Debug, Default)]
pub struct ManualStepSource {
    step: AtomicU64,
}

impl ManualStepSource {
    pub fn new(start: Step) -> Self {
        Self {
            step: AtomicU64::new(start),
        }
    }

    /// Advance by `steps` and return the new value. Saturates at `Step::MAX`.
    pub fn advance(&self, steps: Step) -> Step {
        let previous = self
            .step
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |step| {
                Some(step.saturating_add(steps))
            })
            .unwrap_or_else(|step| step);
        previous.saturating_add(steps)
    }

    pub fn set(&self, step: Step) {
        self.step.store(step, Ordering::SeqCst);
    }
}

impl StepSource for ManualStepSource {
    fn current_step(&self) -> Step {
        self.step.load(Ordering::SeqCst)
    }
}

/// Mutex-guarded ledger shared between threads.
#[derive(Debug)]
pub struct SharedLedger<S, C, A = OwnerAccess> {
    state: Mutex<Ledger<S, A>>,
    steps: C,
    guard: ReentrancyGuard,
}

impl<S: Settlement, C: StepSource, A: Authorizer> SharedLedger<S, C, A> {
    pub fn new(ledger: Ledger<S, A>, steps: C) -> Self {
        Self {
            state: Mutex::new(ledger),
            steps,
            guard: ReentrancyGuard::new(),
        }
    }

    pub fn step_source(&self) -> &C {
        &self.steps
    }

    /// Run `op` as one serialized transaction with the current step.
    fn transact<T>(
        &self,
        op: impl FnOnce(&mut Ledger<S, A>, Step) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        if self.guard.is_held_by_current_thread() {
            warn!("Reentrant ledger call rejected");
            return Err(LedgerError::Reentrancy);
        }
        let mut ledger = self.state.lock().map_err(|_| LedgerError::Poisoned)?;
        // Declared after the lock so it is released first.
        let _token = self.guard.enter();
        let step = self.steps.current_step();
        debug!(step, "Ledger transaction started");
        op(&mut ledger, step)
    }

    // ───────────────────────── Mutations ─────────────────────────

    pub fn create_listing(
        &self,
        caller: &AccountId,
        item_type: &str,
        price: Amount,
        quantity: Quantity,
    ) -> Result<ListingId, LedgerError> {
        self.transact(|ledger, _| ledger.create_listing(caller, item_type, price, quantity))
    }

    pub fn add_quantity(
        &self,
        caller: &AccountId,
        listing_id: ListingId,
        amount: Quantity,
    ) -> Result<ListingId, LedgerError> {
        self.transact(|ledger, _| ledger.add_quantity(caller, listing_id, amount))
    }

    pub fn buy(
        &self,
        caller: &AccountId,
        listing_id: ListingId,
        item_type: &str,
        quantity: Quantity,
        payment: Amount,
    ) -> Result<SaleId, LedgerError> {
        self.transact(|ledger, step| {
            ledger.buy(caller, listing_id, item_type, quantity, payment, step)
        })
    }

    pub fn buy_more(
        &self,
        caller: &AccountId,
        listing_id: ListingId,
        sale_id: SaleId,
        quantity: Quantity,
        payment: Amount,
    ) -> Result<(), LedgerError> {
        self.transact(|ledger, step| {
            ledger.buy_more(caller, listing_id, sale_id, quantity, payment, step)
        })
    }

    pub fn request_refund(
        &self,
        caller: &AccountId,
        listing_id: ListingId,
        sale_id: SaleId,
        quantity: Quantity,
    ) -> Result<(), LedgerError> {
        self.transact(|ledger, step| {
            ledger.request_refund(caller, listing_id, sale_id, quantity, step)
        })
    }

    pub fn pause(&self, caller: &AccountId) -> Result<(), LedgerError> {
        self.transact(|ledger, _| ledger.pause(caller))
    }

    pub fn unpause(&self, caller: &AccountId) -> Result<(), LedgerError> {
        self.transact(|ledger, _| ledger.unpause(caller))
    }

    pub fn drain_events(&self) -> Result<Vec<LedgerEvent>, LedgerError> {
        self.transact(|ledger, _| Ok(ledger.drain_events()))
    }

    // ───────────────────────── Queries ─────────────────────────

    pub fn listing_count(&self) -> Result<usize, LedgerError> {
        self.transact(|ledger, _| Ok(ledger.listing_count()))
    }

    pub fn sale_count(&self) -> Result<usize, LedgerError> {
        self.transact(|ledger, _| Ok(ledger.sale_count()))
    }

    pub fn listings(&self) -> Result<Vec<Listing>, LedgerError> {
        self.transact(|ledger, _| Ok(ledger.listings().to_vec()))
    }

    pub fn sales(&self) -> Result<Vec<SaleRecord>, LedgerError> {
        self.transact(|ledger, _| Ok(ledger.sales().to_vec()))
    }

    pub fn listing(&self, listing_id: ListingId) -> Result<Listing, LedgerError> {
        self.transact(|ledger, _| ledger.listing(listing_id).cloned())
    }

    pub fn sale(&self, sale_id: SaleId) -> Result<SaleRecord, LedgerError> {
        self.transact(|ledger, _| ledger.sale(sale_id).cloned())
    }

    pub fn snapshot(&self) -> Result<LedgerSnapshot, LedgerError> {
        self.transact(|ledger, _| Ok(ledger.snapshot()))
    }

    pub fn state_digest(&self) -> Result<[u8; 32], LedgerError> {
        self.transact(|ledger, _| Ok(ledger.state_digest()))
    }

    /// Inspect the settlement collaborator under the ledger lock.
    pub fn with_settlement<T>(&self, inspect: impl FnOnce(&S) -> T) -> Result<T, LedgerError> {
        self.transact(|ledger, _| Ok(inspect(ledger.settlement())))
    }

    /// Consume the service and return the ledger.
    pub fn into_inner(self) -> Result<Ledger<S, A>, LedgerError> {
        self.state.into_inner().map_err(|_| LedgerError::Poisoned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::errors::SettlementError;
    use crate::settlement::Treasury;
    use std::sync::{Arc, Weak};

    fn setup(start: Step) -> (SharedLedger<Treasury, ManualStepSource>, AccountId) {
        let owner = AccountId::new();
        let ledger = Ledger::new(LedgerConfig::new(owner), Treasury::new()).unwrap();
        (SharedLedger::new(ledger, ManualStepSource::new(start)), owner)
    }

    #[test]
    fn test_manual_step_source() {
        let steps = ManualStepSource::new(10);
        assert_eq!(steps.current_step(), 10);
        assert_eq!(steps.advance(5), 15);
        steps.set(3);
        assert_eq!(steps.current_step(), 3);
    }

    #[test]
    fn test_manual_step_source_saturates() {
        let steps = ManualStepSource::new(Step::MAX - 1);
        assert_eq!(steps.advance(5), Step::MAX);
        assert_eq!(steps.advance(1), Step::MAX);
        assert_eq!(steps.current_step(), Step::MAX);
    }

    #[test]
    fn test_buy_stamps_current_step() {
        let (service, owner) = setup(100);
        let buyer = AccountId::new();
        let listing = service.create_listing(&owner, "widget", 10, 5).unwrap();
        let sale_id = service.buy(&buyer, listing, "widget", 2, 20).unwrap();
        assert_eq!(service.sale(sale_id).unwrap().last_sale_step, 100);
    }

    #[test]
    fn test_refund_window_follows_step_source() {
        let (service, owner) = setup(100);
        let buyer = AccountId::new();
        let listing = service.create_listing(&owner, "widget", 10, 5).unwrap();
        let sale_id = service.buy(&buyer, listing, "widget", 2, 20).unwrap();

        service.step_source().set(199);
        service.request_refund(&buyer, listing, sale_id, 1).unwrap();
        assert_eq!(service.listing(listing).unwrap().quantity, 4);

        service.step_source().set(201);
        let result = service.request_refund(&buyer, listing, sale_id, 1);
        assert!(matches!(result, Err(LedgerError::RefundWindowExpired { .. })));
    }

    #[test]
    fn test_queries_return_committed_copies() {
        let (service, owner) = setup(0);
        service.create_listing(&owner, "widget", 10, 5).unwrap();
        let listings = service.listings().unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(service.listing_count().unwrap(), 1);
        assert_eq!(service.sale_count().unwrap(), 0);
        assert!(service.sales().unwrap().is_empty());
        assert_eq!(service.snapshot().unwrap().listings, listings);
        assert_eq!(service.drain_events().unwrap().len(), 1);
        assert!(service.drain_events().unwrap().is_empty());
    }

    #[test]
    fn test_with_settlement() {
        let (service, owner) = setup(0);
        let buyer = AccountId::new();
        let listing = service.create_listing(&owner, "widget", 10, 5).unwrap();
        service.buy(&buyer, listing, "widget", 1, 10).unwrap();
        assert_eq!(service.with_settlement(|t| t.balance()).unwrap(), 10);
    }

    type Callback = Box<dyn Fn() -> Result<usize, LedgerError> + Send>;

    /// Settlement whose capture calls back into the service.
    struct CallbackSettlement {
        callback: Arc<Mutex<Option<Callback>>>,
        observed: Arc<Mutex<Vec<Result<usize, LedgerError>>>>,
    }

    impl Settlement for CallbackSettlement {
        fn capture(&mut self, _payer: &AccountId, _amount: Amount) -> Result<(), SettlementError> {
            if let Some(callback) = self.callback.lock().unwrap().as_ref() {
                let outcome = callback();
                self.observed.lock().unwrap().push(outcome);
            }
            Ok(())
        }

        fn pay_out(&mut self, _recipient: &AccountId, _amount: Amount) -> Result<(), SettlementError> {
            Ok(())
        }
    }

    #[test]
    fn test_reentrant_call_rejected() {
        let owner = AccountId::new();
        let buyer = AccountId::new();
        let callback: Arc<Mutex<Option<Callback>>> = Arc::new(Mutex::new(None));
        let observed = Arc::new(Mutex::new(Vec::new()));
        let settlement = CallbackSettlement {
            callback: Arc::clone(&callback),
            observed: Arc::clone(&observed),
        };
        let ledger = Ledger::new(LedgerConfig::new(owner), settlement).unwrap();
        let service = Arc::new(SharedLedger::new(ledger, ManualStepSource::new(1)));

        let weak: Weak<SharedLedger<CallbackSettlement, ManualStepSource>> = Arc::downgrade(&service);
        *callback.lock().unwrap() = Some(Box::new(move || match weak.upgrade() {
            Some(service) => service.listing_count(),
            None => Ok(0),
        }));

        let listing = service.create_listing(&owner, "widget", 10, 5).unwrap();
        service.buy(&buyer, listing, "widget", 1, 10).unwrap();

        assert_eq!(
            observed.lock().unwrap().as_slice(),
            &[Err(LedgerError::Reentrancy)]
        );
        // The guard is released after the outer call completes.
        assert_eq!(service.listing_count().unwrap(), 1);
    }

    #[test]
    fn test_into_inner() {
        let (service, owner) = setup(0);
        service.create_listing(&owner, "widget", 10, 5).unwrap();
        let ledger = service.into_inner().unwrap();
        assert_eq!(ledger.listing_count(), 1);
    }
}
