//! Outbound value transfer seam
//!
//! The engine never moves value itself. Payouts are handed to a
//! `ValueTransfer` implementation supplied by the ledger substrate.

use std::collections::HashMap;

use parking_lot::Mutex;
use thiserror::Error;

use crate::models::{Amount, Identity};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("recipient {0} rejected the transfer")]
    Rejected(Identity),
    #[error("transfer backend unavailable: {0}")]
    Unavailable(String),
}

pub trait ValueTransfer: Send + Sync {
    fn pay(&self, to: &Identity, amount: Amount) -> Result<(), TransferError>;
}

/// In-process account book used by the demo server and tests.
#[derive(Default)]
pub struct InMemoryAccounts {
    balances: Mutex<HashMap<Identity, Amount>>,
}

impl InMemoryAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, account: &Identity) -> Amount {
        self.balances.lock().get(account).copied().unwrap_or(0)
    }
}

impl ValueTransfer for InMemoryAccounts {
    fn pay(&self, to: &Identity, amount: Amount) -> Result<(), TransferError> {
        *self.balances.lock().entry(to.clone()).or_insert(0) += amount;
        Ok(())
    }
}
