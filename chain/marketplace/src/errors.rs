//! Ledger error types
//!
//! Every rejection is detected before any mutation. Variants carry the values
//! that caused the rejection; [`LedgerError::kind`] folds them into the coarse
//! taxonomy callers branch on.

use thiserror::Error;
use types::ids::{ListingId, SaleId};
use types::numeric::{Amount, Quantity, Step};

/// Coarse error classes a caller can branch on programmatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller lacks the owner privilege
    Unauthorized,
    /// Caller lacks the required relationship to the entity
    Forbidden,
    /// Zero amounts, insufficient funds or stock, mismatched references
    InvalidArgument,
    /// Id out of range or identity mismatch on lookup
    NotFound,
    /// Refund window elapsed
    Expired,
    /// Operation not allowed in the current ledger state
    InvalidState,
    /// The settlement collaborator refused the transfer
    Settlement,
}

/// Settlement-specific errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettlementError {
    #[error("Insufficient treasury funds: required {required}, available {available}")]
    InsufficientFunds { required: Amount, available: Amount },

    #[error("Arithmetic overflow in settlement balance")]
    Overflow,

    #[error("Settlement rejected: {reason}")]
    Rejected { reason: String },
}

/// Errors returned by ledger operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Unauthorized: caller is not the marketplace owner")]
    Unauthorized,

    #[error("Item type already listed: {item_type}")]
    ItemTypeActive { item_type: String },

    #[error("Ledger is paused")]
    Paused,

    #[error("Reentrant call rejected: an operation is already executing on this thread")]
    Reentrancy,

    #[error("Ledger state lock poisoned by a panicked operation")]
    Poisoned,

    #[error("Price must be positive")]
    ZeroPrice,

    #[error("Quantity must be positive")]
    ZeroQuantity,

    #[error("Insufficient payment: required {required}, provided {provided}")]
    InsufficientPayment { required: Amount, provided: Amount },

    #[error("Insufficient stock on {listing_id}: requested {requested}, available {available}")]
    InsufficientStock {
        listing_id: ListingId,
        requested: Quantity,
        available: Quantity,
    },

    #[error("Refund exceeds holding on {sale_id}: requested {requested}, held {held}")]
    RefundExceedsHolding {
        sale_id: SaleId,
        requested: Quantity,
        held: Quantity,
    },

    #[error("Item type {provided} does not match {listing_id} ({expected})")]
    ItemTypeMismatch {
        listing_id: ListingId,
        expected: String,
        provided: String,
    },

    #[error("{sale_id} was not bought from {provided} (origin {origin})")]
    ListingMismatch {
        sale_id: SaleId,
        origin: ListingId,
        provided: ListingId,
    },

    #[error("Arithmetic overflow computing {what}")]
    Overflow { what: &'static str },

    #[error("Listing not found: {listing_id}")]
    ListingNotFound { listing_id: ListingId },

    #[error("Sale record not found: {sale_id}")]
    SaleNotFound { sale_id: SaleId },

    #[error("Forbidden: caller does not own {sale_id}")]
    NotRecordOwner { sale_id: SaleId },

    #[error("Forbidden: listing owner cannot buy from {listing_id}")]
    OwnerCannotBuy { listing_id: ListingId },

    #[error("Forbidden: caller already purchased item type {item_type}")]
    AlreadyPurchased { item_type: String },

    #[error("Refund window expired for {sale_id}: deadline step {deadline}, current step {current}")]
    RefundWindowExpired {
        sale_id: SaleId,
        deadline: Step,
        current: Step,
    },

    #[error("Settlement error: {0}")]
    Settlement(#[from] SettlementError),
}

impl LedgerError {
    /// Coarse class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Unauthorized => ErrorKind::Unauthorized,
            LedgerError::NotRecordOwner { .. }
            | LedgerError::OwnerCannotBuy { .. }
            | LedgerError::AlreadyPurchased { .. } => ErrorKind::Forbidden,
            LedgerError::ZeroPrice
            | LedgerError::ZeroQuantity
            | LedgerError::InsufficientPayment { .. }
            | LedgerError::InsufficientStock { .. }
            | LedgerError::RefundExceedsHolding { .. }
            | LedgerError::ItemTypeMismatch { .. }
            | LedgerError::ListingMismatch { .. }
            | LedgerError::Overflow { .. } => ErrorKind::InvalidArgument,
            LedgerError::ListingNotFound { .. } | LedgerError::SaleNotFound { .. } => {
                ErrorKind::NotFound
            }
            LedgerError::RefundWindowExpired { .. } => ErrorKind::Expired,
            LedgerError::ItemTypeActive { .. }
            | LedgerError::Paused
            | LedgerError::Reentrancy
            | LedgerError::Poisoned => ErrorKind::InvalidState,
            LedgerError::Settlement(_) => ErrorKind::Settlement,
        }
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Refund window must be positive")]
    ZeroRefundWindow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_payment_display() {
        let err = LedgerError::InsufficientPayment {
            required: 20,
            provided: 19,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient payment: required 20, provided 19"
        );
    }

    #[test]
    fn test_refund_expired_display() {
        let err = LedgerError::RefundWindowExpired {
            sale_id: SaleId::new(0),
            deadline: 200,
            current: 201,
        };
        assert!(err.to_string().contains("sale#0"));
        assert!(err.to_string().contains("201"));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(LedgerError::Unauthorized.kind(), ErrorKind::Unauthorized);
        assert_eq!(
            LedgerError::ItemTypeActive {
                item_type: "widget".to_string()
            }
            .kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            LedgerError::AlreadyPurchased {
                item_type: "widget".to_string()
            }
            .kind(),
            ErrorKind::Forbidden
        );
        assert_eq!(
            LedgerError::ListingNotFound {
                listing_id: ListingId::new(9)
            }
            .kind(),
            ErrorKind::NotFound
        );
        assert_eq!(LedgerError::ZeroQuantity.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_ledger_error_from_settlement() {
        let settlement_err = SettlementError::Overflow;
        let ledger_err: LedgerError = settlement_err.into();
        assert!(matches!(ledger_err, LedgerError::Settlement(_)));
        assert_eq!(ledger_err.kind(), ErrorKind::Settlement);
    }

    #[test]
    fn test_config_error_from_json() {
        let parse_err = serde_json::from_str::<u64>("not json").unwrap_err();
        let err: ConfigError = parse_err.into();
        assert!(err.to_string().starts_with("Invalid configuration JSON"));
    }
}
