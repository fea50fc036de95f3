//! Shared security primitives for the ledger
//!
//! Owner-only access control, the pause switch, and the reentrancy guard used
//! by the single-writer service.

use std::sync::{Mutex, PoisonError};
use std::thread::{self, ThreadId};

use tracing::debug;
use types::ids::AccountId;

/// Authorization collaborator: decides whether a caller holds the owner privilege.
pub trait Authorizer {
    fn is_owner(&self, caller: &AccountId) -> bool;

    /// The privileged principal recorded as owner on new listings.
    fn owner(&self) -> AccountId;
}

/// Single-owner access control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerAccess {
    owner: AccountId,
}

impl OwnerAccess {
    pub fn new(owner: AccountId) -> Self {
        Self { owner }
    }
}

impl Authorizer for OwnerAccess {
    fn is_owner(&self, caller: &AccountId) -> bool {
        *caller == self.owner
    }

    fn owner(&self) -> AccountId {
        self.owner
    }
}

/// Composable pause modifier.
///
/// When paused, mutating operations must be rejected.
#[derive(Debug, Clone, Default)]
pub struct PauseGuard {
    paused: bool,
}

impl PauseGuard {
    pub fn new(paused: bool) -> Self {
        Self { paused }
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn unpause(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

/// Reentrancy guard keyed by the thread currently executing an operation.
///
/// Contending threads simply queue on the state lock; only the thread that is
/// already inside an operation is refused, so a callback that calls back into
/// the ledger fails fast instead of deadlocking.
#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    holder: Mutex<Option<ThreadId>>,
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the calling thread is already inside a guarded operation.
    pub fn is_held_by_current_thread(&self) -> bool {
        let holder = self.holder.lock().unwrap_or_else(PoisonError::into_inner);
        *holder == Some(thread::current().id())
    }

    /// Mark the calling thread as the executor until the token is dropped.
    ///
    /// Must only be called while holding the ledger's state lock.
    pub fn enter(&self) -> GuardToken<'_> {
        let id = thread::current().id();
        *self.holder.lock().unwrap_or_else(PoisonError::into_inner) = Some(id);
        debug!(thread = ?id, "Reentrancy guard acquired");
        GuardToken { guard: self }
    }

    pub fn is_locked(&self) -> bool {
        self.holder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

/// Releases the [`ReentrancyGuard`] on drop, including during unwinding.
#[derive(Debug)]
pub struct GuardToken<'a> {
    guard: &'a ReentrancyGuard,
}

impl Drop for GuardToken<'_> {
    fn drop(&mut self) {
        *self
            .guard
            .holder
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    // --- OwnerAccess tests ---

    #[test]
    fn test_owner_access() {
        let owner = AccountId::new();
        let access = OwnerAccess::new(owner);
        assert!(access.is_owner(&owner));
        assert!(!access.is_owner(&AccountId::new()));
        assert_eq!(access.owner(), owner);
    }

    // --- PauseGuard tests ---

    #[test]
    fn test_pause_guard() {
        let mut pg = PauseGuard::default();
        assert!(!pg.is_paused());
        pg.pause();
        assert!(pg.is_paused());
        pg.unpause();
        assert!(!pg.is_paused());
    }

    #[test]
    fn test_pause_guard_starts_paused() {
        assert!(PauseGuard::new(true).is_paused());
    }

    // --- ReentrancyGuard tests ---

    #[test]
    fn test_reentrancy_guard_enter_release() {
        let guard = ReentrancyGuard::new();
        assert!(!guard.is_locked());
        {
            let _token = guard.enter();
            assert!(guard.is_locked());
            assert!(guard.is_held_by_current_thread());
        }
        assert!(!guard.is_locked());
        assert!(!guard.is_held_by_current_thread());
    }

    #[test]
    fn test_reentrancy_guard_other_thread_not_holder() {
        let guard = Arc::new(ReentrancyGuard::new());
        let _token = guard.enter();

        let remote = Arc::clone(&guard);
        let held_elsewhere = std::thread::spawn(move || remote.is_held_by_current_thread())
            .join()
            .unwrap();
        assert!(!held_elsewhere, "Only the executing thread counts as reentrant");
        assert!(guard.is_held_by_current_thread());
    }
}
