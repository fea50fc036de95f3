//! Single-Owner Marketplace Ledger
//!
//! Bookkeeping engine for a marketplace with one privileged lister: listings,
//! per-buyer sale records, a once-per-item-type first-purchase gate, and
//! partial refunds within a window measured in ledger steps.
//!
//! # Modules
//! - `errors`: Ledger, settlement and configuration error types
//! - `events`: Notifications emitted by committed operations
//! - `security`: Owner access control, pause switch, reentrancy guard
//! - `settlement`: Settlement collaborator and the in-memory treasury
//! - `config`: Ledger configuration
//! - `commitment`: State snapshots and SHA-256 digests
//! - `ledger`: The ledger engine
//! - `service`: Mutex-guarded single-writer service and step sources

pub mod errors;
pub mod events;
pub mod security;
pub mod settlement;
pub mod config;
pub mod commitment;
pub mod ledger;
pub mod service;

pub use config::LedgerConfig;
pub use errors::{ErrorKind, LedgerError};
pub use ledger::Ledger;
pub use service::SharedLedger;

/// Ledger ABI version — frozen after release
pub const LEDGER_ABI_VERSION: &str = "1.0.0";
