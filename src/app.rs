//! Coordinator façade
//!
//! `FlightSuretyApp` owns the four registries and the shared gate, treasury
//! and event feed. It is the only entry point the HTTP layer and the demo
//! services use.

use std::sync::Arc;

use rand::rngs::StdRng;
use tokio::sync::broadcast;
use tracing::info;
use uuid::Uuid;

use crate::airlines::{Admission, AirlineRecord, AirlineRegistry};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::events::{EventEnvelope, EventFeed};
use crate::flights::{FlightRegistry, StatusAuthority};
use crate::gate::OperationalGate;
use crate::insurance::{InsuranceLedger, Policy};
use crate::models::{
    AirlineStatus, Amount, ClaimStatus, FlightInfo, FlightKey, Identity, LedgerTotals, RequestId,
    StatusCode,
};
use crate::oracles::{OracleConsensus, RequestSnapshot};
use crate::settlement::ValueTransfer;
use crate::treasury::Treasury;

pub struct FlightSuretyApp {
    config: Arc<EngineConfig>,
    events: Arc<EventFeed>,
    gate: Arc<OperationalGate>,
    treasury: Arc<Treasury>,
    airlines: Arc<AirlineRegistry>,
    flights: Arc<FlightRegistry>,
    insurance: InsuranceLedger,
    oracles: OracleConsensus,
}

impl FlightSuretyApp {
    pub fn new(config: EngineConfig, transfer: Arc<dyn ValueTransfer>) -> Self {
        Self::build(config, transfer, None)
    }

    /// Builds the engine with a fixed generator for oracle index draws.
    pub fn with_rng(config: EngineConfig, transfer: Arc<dyn ValueTransfer>, rng: StdRng) -> Self {
        Self::build(config, transfer, Some(rng))
    }

    fn build(config: EngineConfig, transfer: Arc<dyn ValueTransfer>, rng: Option<StdRng>) -> Self {
        let config = Arc::new(config);
        let events = Arc::new(EventFeed::new(config.event_capacity));
        let gate = Arc::new(OperationalGate::new(config.admin.clone(), events.clone()));
        let treasury = Arc::new(Treasury::new());

        let airlines = Arc::new(AirlineRegistry::new(
            &config,
            gate.clone(),
            treasury.clone(),
            events.clone(),
        ));
        let flights = Arc::new(FlightRegistry::new(
            config.flight_epoch,
            gate.clone(),
            airlines.clone(),
            events.clone(),
        ));
        let insurance = InsuranceLedger::new(
            config.clone(),
            gate.clone(),
            flights.clone(),
            treasury.clone(),
            events.clone(),
            transfer,
        );
        let oracles = match rng {
            Some(rng) => OracleConsensus::with_rng(
                config.clone(),
                gate.clone(),
                flights.clone(),
                treasury.clone(),
                events.clone(),
                rng,
            ),
            None => OracleConsensus::new(
                config.clone(),
                gate.clone(),
                flights.clone(),
                treasury.clone(),
                events.clone(),
            ),
        };

        info!(
            admin = %config.admin,
            genesis = %config.genesis_airline,
            quorum = config.oracle_quorum,
            "flight surety engine initialised"
        );

        Self {
            config,
            events,
            gate,
            treasury,
            airlines,
            flights,
            insurance,
            oracles,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.events.subscribe()
    }

    // ===== Operational gate =====

    pub fn is_operational(&self) -> bool {
        self.gate.is_operational()
    }

    pub fn set_operational(&self, operational: bool, caller: &Identity) -> Result<()> {
        self.gate.set_operational(operational, caller)
    }

    // ===== Airlines =====

    pub fn register_airline(&self, candidate: &Identity, caller: &Identity) -> Result<Admission> {
        self.airlines.register_airline(candidate, caller)
    }

    pub fn fund(&self, airline: &Identity, amount: Amount, caller: &Identity) -> Result<bool> {
        self.airlines.fund(airline, amount, caller)
    }

    pub fn is_registered(&self, airline: &Identity) -> bool {
        self.airlines.is_registered(airline)
    }

    pub fn is_queued(&self, airline: &Identity) -> bool {
        self.airlines.is_queued(airline)
    }

    pub fn airline_status(&self, airline: &Identity) -> AirlineStatus {
        self.airlines.status(airline)
    }

    pub fn airline(&self, airline: &Identity) -> Option<AirlineRecord> {
        self.airlines.airline(airline)
    }

    // ===== Flights =====

    pub fn register_flight(&self, airline: &Identity, designator: &str, caller: &Identity) -> Result<FlightKey> {
        self.flights.register_flight(airline, designator, caller)
    }

    pub fn flight_key(&self, airline: &Identity, designator: &str) -> FlightKey {
        self.flights.key_for(airline, designator)
    }

    pub fn flight(&self, key: &FlightKey) -> Option<FlightInfo> {
        self.flights.flight(key)
    }

    pub fn flight_list(&self) -> Vec<FlightInfo> {
        self.flights.flight_list()
    }

    pub fn flights_for(&self, airline: &Identity) -> Vec<FlightInfo> {
        self.flights.flights_for(airline)
    }

    /// Administrator override of a flight status.
    pub fn override_flight_status(&self, key: &FlightKey, status: StatusCode, caller: &Identity) -> Result<bool> {
        self.flights
            .set_status(key, status, StatusAuthority::Admin(caller.clone()))
    }

    // ===== Insurance =====

    pub fn buy_policy(
        &self,
        flight_key: &FlightKey,
        customer: &Identity,
        premium: Amount,
        caller: &Identity,
    ) -> Result<Uuid> {
        self.insurance.buy_policy(flight_key, customer, premium, caller)
    }

    pub fn check_claim(&self, customer: &Identity, caller: &Identity) -> Result<ClaimStatus> {
        self.insurance.check_claim(customer, caller)
    }

    pub fn withdraw(&self, customer: &Identity, caller: &Identity) -> Result<Amount> {
        self.insurance.withdraw(customer, caller)
    }

    pub fn policies_of(&self, customer: &Identity) -> Vec<Policy> {
        self.insurance.policies_of(customer)
    }

    /// Flights the customer holds policies on, in purchase order.
    pub fn customer_flights(&self, customer: &Identity) -> Vec<FlightInfo> {
        self.insurance
            .customer_flights(customer)
            .iter()
            .filter_map(|key| self.flights.flight(key))
            .collect()
    }

    // ===== Oracles =====

    pub fn registration_fee(&self) -> Amount {
        self.oracles.registration_fee()
    }

    pub fn register_oracle(&self, oracle: &Identity, fee: Amount, caller: &Identity) -> Result<[u8; 3]> {
        self.oracles.register_oracle(oracle, fee, caller)
    }

    pub fn indexes_of(&self, oracle: &Identity) -> Option<[u8; 3]> {
        self.oracles.indexes_of(oracle)
    }

    pub fn request_status(&self, flight_key: &FlightKey, timestamp: u64, caller: &Identity) -> Result<RequestId> {
        self.oracles.request_status(flight_key, timestamp, caller)
    }

    /// Opens a status request for a flight named by airline and designator.
    pub fn fetch_flight_status(
        &self,
        airline: &Identity,
        designator: &str,
        timestamp: u64,
        caller: &Identity,
    ) -> Result<RequestId> {
        let key = self.flights.key_for(airline, designator);
        self.oracles.request_status(&key, timestamp, caller)
    }

    pub fn submit_response(
        &self,
        request_id: &RequestId,
        index: u8,
        status: StatusCode,
        caller: &Identity,
    ) -> Result<bool> {
        self.oracles.submit_response(request_id, index, status, caller)
    }

    pub fn oracle_request(&self, request_id: &RequestId) -> Option<RequestSnapshot> {
        self.oracles.request(request_id)
    }

    // ===== Ledger =====

    pub fn held_balance(&self) -> Amount {
        self.treasury.held()
    }

    pub fn ledger_totals(&self) -> LedgerTotals {
        self.treasury.totals()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::SuretyError;
    use crate::models::UNIT;
    use crate::settlement::InMemoryAccounts;
    use rand::SeedableRng;

    fn app() -> FlightSuretyApp {
        FlightSuretyApp::with_rng(
            EngineConfig::default(),
            Arc::new(InMemoryAccounts::new()),
            StdRng::seed_from_u64(11),
        )
    }

    #[test]
    fn test_pause_blocks_mutations_but_not_reads() {
        let app = app();
        let admin = app.config().admin.clone();
        let genesis = app.config().genesis_airline.clone();

        assert_eq!(
            app.set_operational(false, &genesis),
            Err(SuretyError::Unauthorized)
        );
        app.set_operational(false, &admin).unwrap();
        assert!(!app.is_operational());

        assert_eq!(
            app.fund(&genesis, 10 * UNIT, &genesis),
            Err(SuretyError::SystemPaused)
        );
        assert!(app.flight_list().is_empty());
        assert_eq!(app.held_balance(), 0);

        app.set_operational(true, &admin).unwrap();
        assert_eq!(app.fund(&genesis, 10 * UNIT, &genesis), Ok(true));
        assert_eq!(app.held_balance(), 10 * UNIT);
    }

    #[test]
    fn test_fetch_flight_status_matches_request_status() {
        let app = app();
        let genesis = app.config().genesis_airline.clone();
        app.fund(&genesis, 10 * UNIT, &genesis).unwrap();
        let key = app.register_flight(&genesis, "ND1309", &genesis).unwrap();

        let customer = Identity::from("GCUSTOMER");
        let fetched = app
            .fetch_flight_status(&genesis, "ND1309", 1_700_000_000, &customer)
            .unwrap();
        let requested = app.request_status(&key, 1_700_000_000, &customer).unwrap();
        assert_eq!(fetched, requested);

        assert_eq!(
            app.fetch_flight_status(&genesis, "XX0000", 1, &customer),
            Err(SuretyError::UnknownFlight)
        );
    }

    #[test]
    fn test_customer_flights_resolve_to_flight_info() {
        let app = app();
        let genesis = app.config().genesis_airline.clone();
        app.fund(&genesis, 10 * UNIT, &genesis).unwrap();
        let first = app.register_flight(&genesis, "ND1300", &genesis).unwrap();
        let second = app.register_flight(&genesis, "ND1301", &genesis).unwrap();

        let customer = Identity::from("GCUSTOMER");
        app.buy_policy(&second, &customer, UNIT / 2, &customer).unwrap();
        app.buy_policy(&first, &customer, UNIT / 2, &customer).unwrap();
        app.buy_policy(&second, &customer, UNIT / 4, &customer).unwrap();

        let keys: Vec<FlightKey> = app
            .customer_flights(&customer)
            .into_iter()
            .map(|flight| flight.key)
            .collect();
        assert_eq!(keys, vec![second, first]);
        assert_eq!(app.policies_of(&customer).len(), 3);
    }
}
