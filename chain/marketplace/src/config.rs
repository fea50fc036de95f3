//! Ledger configuration

use serde::{Deserialize, Serialize};
use types::ids::AccountId;
use types::numeric::Step;

use crate::errors::ConfigError;

/// Number of steps after the latest purchase during which refunds are accepted.
pub const DEFAULT_REFUND_WINDOW: Step = 100;

/// Ledger configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// The privileged principal allowed to list and restock items
    pub owner: AccountId,
    /// Refund window in steps, inclusive of the deadline step
    #[serde(default = "default_refund_window")]
    pub refund_window: Step,
    /// Start with mutations suspended until the owner unpauses
    #[serde(default)]
    pub start_paused: bool,
}

fn default_refund_window() -> Step {
    DEFAULT_REFUND_WINDOW
}

impl LedgerConfig {
    /// Configuration with the default refund window.
    pub fn new(owner: AccountId) -> Self {
        Self {
            owner,
            refund_window: DEFAULT_REFUND_WINDOW,
            start_paused: false,
        }
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: LedgerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refund_window == 0 {
            return Err(ConfigError::ZeroRefundWindow);
        }
        Ok(())
    }
}
