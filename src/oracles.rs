//! Oracle registration and status consensus
//!
//! Each oracle holds three index slots drawn at registration. A request
//! collects reports per status code; the first code whose reporter set
//! reaches the quorum wins, and the request is then closed for good.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{Result, SuretyError};
use crate::events::{EventFeed, SuretyEvent};
use crate::flights::{ConsensusSeal, FlightRegistry, StatusAuthority};
use crate::gate::OperationalGate;
use crate::models::{Amount, FlightKey, Identity, RequestId, StatusCode};
use crate::treasury::Treasury;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OracleRegistration {
    pub identity: Identity,
    pub indexes: [u8; 3],
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug)]
struct OracleRequest {
    id: RequestId,
    flight_key: FlightKey,
    timestamp: u64,
    responses: HashMap<StatusCode, HashSet<Identity>>,
    /// Every oracle that has reported, whatever it reported.
    reporters: HashSet<Identity>,
    resolved: Option<StatusCode>,
    opened_at: DateTime<Utc>,
}

/// Read-only view of an oracle request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestSnapshot {
    pub id: RequestId,
    pub flight_key: FlightKey,
    pub timestamp: u64,
    pub tallies: Vec<(StatusCode, usize)>,
    pub resolved: Option<StatusCode>,
    pub opened_at: DateTime<Utc>,
}

impl OracleRequest {
    fn snapshot(&self) -> RequestSnapshot {
        let mut tallies: Vec<(StatusCode, usize)> = self
            .responses
            .iter()
            .map(|(status, reporters)| (*status, reporters.len()))
            .collect();
        tallies.sort();

        RequestSnapshot {
            id: self.id.clone(),
            flight_key: self.flight_key.clone(),
            timestamp: self.timestamp,
            tallies,
            resolved: self.resolved,
            opened_at: self.opened_at,
        }
    }
}

pub struct OracleConsensus {
    config: Arc<EngineConfig>,
    gate: Arc<OperationalGate>,
    flights: Arc<FlightRegistry>,
    treasury: Arc<Treasury>,
    events: Arc<EventFeed>,
    rng: Mutex<StdRng>,
    oracles: RwLock<HashMap<Identity, OracleRegistration>>,
    requests: RwLock<HashMap<RequestId, Arc<Mutex<OracleRequest>>>>,
}

impl OracleConsensus {
    pub fn new(
        config: Arc<EngineConfig>,
        gate: Arc<OperationalGate>,
        flights: Arc<FlightRegistry>,
        treasury: Arc<Treasury>,
        events: Arc<EventFeed>,
    ) -> Self {
        Self::with_rng(config, gate, flights, treasury, events, StdRng::from_entropy())
    }

    /// Same as `new` with a caller-supplied generator for index draws.
    pub fn with_rng(
        config: Arc<EngineConfig>,
        gate: Arc<OperationalGate>,
        flights: Arc<FlightRegistry>,
        treasury: Arc<Treasury>,
        events: Arc<EventFeed>,
        rng: StdRng,
    ) -> Self {
        Self {
            config,
            gate,
            flights,
            treasury,
            events,
            rng: Mutex::new(rng),
            oracles: RwLock::new(HashMap::new()),
            requests: RwLock::new(HashMap::new()),
        }
    }

    pub fn registration_fee(&self) -> Amount {
        self.config.oracle_registration_fee
    }

    /// Registers `identity` and draws its three indexes. Registering again
    /// replaces the previous draw.
    pub fn register_oracle(&self, identity: &Identity, fee: Amount, caller: &Identity) -> Result<[u8; 3]> {
        self.gate.require_operational()?;

        if caller != identity {
            return Err(SuretyError::Unauthorized);
        }
        if fee < self.config.oracle_registration_fee {
            warn!(oracle = %identity, fee, required = self.config.oracle_registration_fee, "oracle registration fee not met");
            return Err(SuretyError::InsufficientFee);
        }

        let indexes = self.draw_indexes();
        let mut oracles = self.oracles.write();
        self.treasury.credit_oracle_fee(fee)?;
        let replaced = oracles
            .insert(
                identity.clone(),
                OracleRegistration {
                    identity: identity.clone(),
                    indexes,
                    registered_at: Utc::now(),
                },
            )
            .is_some();

        info!(oracle = %identity, ?indexes, replaced, "oracle registered");
        self.events.publish(SuretyEvent::OracleRegistered {
            oracle: identity.clone(),
            indexes,
        });

        Ok(indexes)
    }

    pub fn indexes_of(&self, oracle: &Identity) -> Option<[u8; 3]> {
        self.oracles.read().get(oracle).map(|registration| registration.indexes)
    }

    pub fn oracle_count(&self) -> usize {
        self.oracles.read().len()
    }

    /// Opens the request for (flight, timestamp), or returns the one already open.
    pub fn request_status(&self, flight_key: &FlightKey, timestamp: u64, caller: &Identity) -> Result<RequestId> {
        self.gate.require_operational()?;

        match self.flights.status_of(flight_key) {
            None => return Err(SuretyError::UnknownFlight),
            Some(status) if status.is_resolved() => return Err(SuretyError::FlightResolved),
            Some(_) => {}
        }

        let id = RequestId::derive(flight_key, timestamp);
        let mut requests = self.requests.write();
        if requests.contains_key(&id) {
            debug!(request = %id, "status request already open");
            return Ok(id);
        }

        requests.insert(
            id.clone(),
            Arc::new(Mutex::new(OracleRequest {
                id: id.clone(),
                flight_key: flight_key.clone(),
                timestamp,
                responses: HashMap::new(),
                reporters: HashSet::new(),
                resolved: None,
                opened_at: Utc::now(),
            })),
        );

        info!(request = %id, %flight_key, timestamp, requested_by = %caller, "oracle status request opened");
        self.events.publish(SuretyEvent::OracleRequest {
            request_id: id.clone(),
            flight_key: flight_key.clone(),
            timestamp,
        });

        Ok(id)
    }

    /// Records a report from `caller` through one of its index slots.
    ///
    /// Returns `false` without error for late reports on a resolved request
    /// and for repeat reports from the same oracle. A report arriving after
    /// the flight was settled elsewhere closes the request with the flight's
    /// status and also returns `false`.
    pub fn submit_response(
        &self,
        request_id: &RequestId,
        index: u8,
        status: StatusCode,
        caller: &Identity,
    ) -> Result<bool> {
        self.gate.require_operational()?;

        if !status.is_resolved() {
            return Err(SuretyError::InvalidStatusCode);
        }
        match self.indexes_of(caller) {
            Some(indexes) if indexes.contains(&index) => {}
            Some(_) => {
                warn!(oracle = %caller, index, "response rejected: index not assigned to oracle");
                return Err(SuretyError::Unauthorized);
            }
            None => {
                warn!(oracle = %caller, "response rejected: oracle not registered");
                return Err(SuretyError::Unauthorized);
            }
        }

        let entry = self
            .requests
            .read()
            .get(request_id)
            .cloned()
            .ok_or(SuretyError::UnknownRequest)?;
        let mut request = entry.lock();

        if let Some(resolved) = request.resolved {
            debug!(request = %request_id, oracle = %caller, ?resolved, "late response ignored");
            return Ok(false);
        }
        if request.reporters.contains(caller) {
            debug!(request = %request_id, oracle = %caller, "repeat response ignored");
            return Ok(false);
        }

        // The flight may have been settled by another request or by the
        // administrator; this request is then moot.
        let current = self.flights.status_of(&request.flight_key);
        if let Some(settled) = current.filter(|status| status.is_resolved()) {
            Self::close(&mut request, settled, caller);
            return Ok(false);
        }

        let count = request.responses.get(&status).map_or(0, HashSet::len) + 1;
        let reaches_quorum = count >= self.config.oracle_quorum;

        // Push to the flight before touching the tally so a rejected
        // resolution leaves the tally unchanged.
        if reaches_quorum {
            let pushed = self.flights.set_status(
                &request.flight_key,
                status,
                StatusAuthority::Consensus(ConsensusSeal::new()),
            );
            if let Err(SuretyError::FlightResolved) = pushed {
                let settled = self.flights.status_of(&request.flight_key).unwrap_or(status);
                Self::close(&mut request, settled, caller);
                return Ok(false);
            }
            pushed?;
        }

        request.reporters.insert(caller.clone());
        request
            .responses
            .entry(status)
            .or_default()
            .insert(caller.clone());

        debug!(request = %request_id, oracle = %caller, ?status, count, "oracle response recorded");
        self.events.publish(SuretyEvent::OracleReport {
            request_id: request_id.clone(),
            oracle: caller.clone(),
            status,
        });

        if reaches_quorum {
            request.resolved = Some(status);
            info!(request = %request_id, flight_key = %request.flight_key, ?status, "oracle consensus reached");
        }

        Ok(true)
    }

    fn close(request: &mut OracleRequest, settled: StatusCode, caller: &Identity) {
        request.resolved = Some(settled);
        debug!(request = %request.id, oracle = %caller, ?settled, "flight settled elsewhere; request closed");
    }

    pub fn request(&self, request_id: &RequestId) -> Option<RequestSnapshot> {
        self.requests
            .read()
            .get(request_id)
            .map(|entry| entry.lock().snapshot())
    }

    fn draw_indexes(&self) -> [u8; 3] {
        let range = self.config.oracle_index_range;
        let mut rng = self.rng.lock();
        [
            rng.gen_range(0..range),
            rng.gen_range(0..range),
            rng.gen_range(0..range),
        ]
    }
}
