//! Types library for the marketplace ledger
//!
//! Shared definitions used by the ledger engine and anything embedding it.
//!
//! # Modules
//! - `ids`: Identifiers (AccountId, ListingId, SaleId)
//! - `numeric`: Integer units (Quantity, Amount, Step) and checked helpers
//! - `listing`: Items for sale
//! - `sale`: Per-buyer ownership records

pub mod ids;
pub mod numeric;
pub mod listing;
pub mod sale;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::numeric::*;
    pub use crate::listing::*;
    pub use crate::sale::*;
}
