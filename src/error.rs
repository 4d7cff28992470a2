//! Error taxonomy for the coordination engine

use thiserror::Error;

/// Errors returned synchronously to the immediate caller.
///
/// Each variant carries a stable numeric code so that clients can match on it
/// without parsing the message.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuretyError {
    #[error("caller lacks the required role or identity")]
    Unauthorized = 1,
    #[error("system is paused")]
    SystemPaused = 2,
    #[error("airline is already registered")]
    AlreadyRegistered = 3,
    #[error("airline has not cleared the admission vote")]
    NotEligible = 4,
    #[error("deposit is below the minimum funding amount")]
    InsufficientFunds = 5,
    #[error("flight status is already resolved")]
    FlightResolved = 6,
    #[error("premium exceeds the per-policy cap")]
    CapExceeded = 7,
    #[error("oracle registration fee not met")]
    InsufficientFee = 8,
    #[error("flight is not registered")]
    UnknownFlight = 9,
    #[error("oracle request does not exist")]
    UnknownRequest = 10,
    #[error("amount must be greater than zero")]
    InvalidAmount = 11,
    #[error("status code cannot be reported")]
    InvalidStatusCode = 12,
    #[error("value transfer to the recipient failed")]
    TransferFailed = 13,
    #[error("amount would overflow the ledger totals")]
    LedgerOverflow = 14,
}

impl SuretyError {
    pub fn code(self) -> u32 {
        self as u32
    }
}

pub type Result<T> = std::result::Result<T, SuretyError>;
