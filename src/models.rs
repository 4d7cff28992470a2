//! Data models shared by the registries, the coordinator and the HTTP layer

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Value amounts are expressed in stroops.
pub type Amount = u64;

/// One whole unit of value (10^7 stroops).
pub const UNIT: Amount = 10_000_000;

/// Caller identity as authenticated by the ledger substrate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

/// Deterministic flight identifier: sha256(airline, designator, epoch), hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlightKey(String);

impl FlightKey {
    pub fn derive(airline: &Identity, designator: &str, epoch: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(airline.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(designator.as_bytes());
        hasher.update(epoch.to_be_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FlightKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for FlightKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Oracle request identifier: sha256(flight key, timestamp), hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn derive(flight_key: &FlightKey, timestamp: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(flight_key.as_str().as_bytes());
        hasher.update(timestamp.to_be_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Flight status codes, numbered the way oracles report them on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    Unknown = 0,
    OnTime = 10,
    LateAirline = 20,
    LateWeather = 30,
    LateTechnical = 40,
    LateOther = 50,
}

impl StatusCode {
    pub const ALL: [StatusCode; 6] = [
        StatusCode::Unknown,
        StatusCode::OnTime,
        StatusCode::LateAirline,
        StatusCode::LateWeather,
        StatusCode::LateTechnical,
        StatusCode::LateOther,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.code() == code)
    }

    pub fn is_resolved(self) -> bool {
        self != StatusCode::Unknown
    }

    /// Only airline-caused delays make a policy claimable.
    pub fn pays_out(self) -> bool {
        self == StatusCode::LateAirline
    }
}

/// Airline membership state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AirlineStatus {
    Unregistered,
    Queued,
    Registered,
}

/// Flight as seen by the read surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightInfo {
    pub key: FlightKey,
    pub airline: Identity,
    pub designator: String,
    pub status: StatusCode,
    pub registered_at: chrono::DateTime<chrono::Utc>,
}

/// Result of a claim check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimStatus {
    pub available: bool,
    pub amount: Amount,
}

/// Snapshot of the pooled value held by the engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTotals {
    pub airline_funding: Amount,
    pub premiums: Amount,
    pub paid_out: Amount,
    pub held: Amount,
    pub oracle_fees: Amount,
}

/// Generic API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}
