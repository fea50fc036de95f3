//! Settlement — value movement between the marketplace and its buyers
//!
//! The ledger decides *what* must move; a [`Settlement`] implementation moves
//! it. The ledger calls the collaborator after validation and before any
//! mutation, so a refused transfer aborts the operation with no effect.
//!
//! [`Treasury`] is the in-memory implementation: captured payments accrue to
//! the marketplace treasury and refunds are paid out of it.

use std::collections::HashMap;

use tracing::debug;
use types::ids::AccountId;
use types::numeric::Amount;

use crate::errors::SettlementError;

/// Settlement collaborator contract.
pub trait Settlement {
    /// Capture `amount` from `payer` for a purchase. Only the computed cost is
    /// captured; any excess attached by the caller is not the ledger's concern.
    fn capture(&mut self, payer: &AccountId, amount: Amount) -> Result<(), SettlementError>;

    /// Move `amount` to `recipient` (refund payout).
    fn pay_out(&mut self, recipient: &AccountId, amount: Amount) -> Result<(), SettlementError>;
}

impl<S: Settlement + ?Sized> Settlement for Box<S> {
    fn capture(&mut self, payer: &AccountId, amount: Amount) -> Result<(), SettlementError> {
        (**self).capture(payer, amount)
    }

    fn pay_out(&mut self, recipient: &AccountId, amount: Amount) -> Result<(), SettlementError> {
        (**self).pay_out(recipient, amount)
    }
}

/// Marketplace treasury with per-account accounting.
///
/// `balance` is what the marketplace currently holds; `captured` and
/// `paid_out` are running totals per counterparty.
#[derive(Debug, Clone, Default)]
pub struct Treasury {
    balance: Amount,
    captured: HashMap<AccountId, Amount>,
    paid_out: HashMap<AccountId, Amount>,
}

impl Treasury {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treasury seeded with an opening balance.
    pub fn with_balance(balance: Amount) -> Self {
        Self {
            balance,
            ..Self::default()
        }
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }

    /// Total captured from `account` across all purchases.
    pub fn captured_from(&self, account: &AccountId) -> Amount {
        self.captured.get(account).copied().unwrap_or(0)
    }

    /// Total refunded to `account`.
    pub fn paid_to(&self, account: &AccountId) -> Amount {
        self.paid_out.get(account).copied().unwrap_or(0)
    }
}

impl Settlement for Treasury {
    fn capture(&mut self, payer: &AccountId, amount: Amount) -> Result<(), SettlementError> {
        let new_balance = self
            .balance
            .checked_add(amount)
            .ok_or(SettlementError::Overflow)?;
        let new_total = self
            .captured_from(payer)
            .checked_add(amount)
            .ok_or(SettlementError::Overflow)?;

        self.captured.insert(*payer, new_total);
        self.balance = new_balance;
        debug!(%payer, amount, balance = self.balance, "Payment captured");
        Ok(())
    }

    fn pay_out(&mut self, recipient: &AccountId, amount: Amount) -> Result<(), SettlementError> {
        if self.balance < amount {
            return Err(SettlementError::InsufficientFunds {
                required: amount,
                available: self.balance,
            });
        }
        let new_total = self
            .paid_to(recipient)
            .checked_add(amount)
            .ok_or(SettlementError::Overflow)?;

        self.paid_out.insert(*recipient, new_total);
        self.balance -= amount;
        debug!(%recipient, amount, balance = self.balance, "Refund paid out");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_accumulates() {
        let mut treasury = Treasury::new();
        let buyer = AccountId::new();
        treasury.capture(&buyer, 20).unwrap();
        treasury.capture(&buyer, 5).unwrap();
        assert_eq!(treasury.balance(), 25);
        assert_eq!(treasury.captured_from(&buyer), 25);
    }

    #[test]
    fn test_pay_out_debits_balance() {
        let mut treasury = Treasury::with_balance(30);
        let buyer = AccountId::new();
        treasury.pay_out(&buyer, 10).unwrap();
        assert_eq!(treasury.balance(), 20);
        assert_eq!(treasury.paid_to(&buyer), 10);
    }

    #[test]
    fn test_pay_out_insufficient() {
        let mut treasury = Treasury::with_balance(5);
        let buyer = AccountId::new();
        let result = treasury.pay_out(&buyer, 10);
        assert_eq!(
            result,
            Err(SettlementError::InsufficientFunds {
                required: 10,
                available: 5
            })
        );
        assert_eq!(treasury.balance(), 5);
        assert_eq!(treasury.paid_to(&buyer), 0);
    }

    #[test]
    fn test_capture_overflow_leaves_balance() {
        let mut treasury = Treasury::with_balance(Amount::MAX);
        let buyer = AccountId::new();
        assert_eq!(treasury.capture(&buyer, 1), Err(SettlementError::Overflow));
        assert_eq!(treasury.balance(), Amount::MAX);
        assert_eq!(treasury.captured_from(&buyer), 0);
    }

    #[test]
    fn test_boxed_settlement() {
        let mut boxed: Box<dyn Settlement> = Box::new(Treasury::new());
        assert!(boxed.capture(&AccountId::new(), 1).is_ok());
    }
}
