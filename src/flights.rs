//! Flight registry
//!
//! Flights are keyed by `sha256(airline, designator, epoch)` and never
//! deleted. A flight's status leaves `Unknown` exactly once through oracle
//! consensus; afterwards only the administrator may change it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::airlines::AirlineRegistry;
use crate::error::{Result, SuretyError};
use crate::events::{EventFeed, SuretyEvent};
use crate::gate::OperationalGate;
use crate::models::{FlightInfo, FlightKey, Identity, StatusCode};

#[derive(Debug)]
pub(crate) struct Flight {
    key: FlightKey,
    airline: Identity,
    designator: String,
    status: StatusCode,
    /// Set once the administrator has replaced a resolved status.
    overridden: bool,
    registered_at: DateTime<Utc>,
}

impl Flight {
    pub(crate) fn status(&self) -> StatusCode {
        self.status
    }

    fn info(&self) -> FlightInfo {
        FlightInfo {
            key: self.key.clone(),
            airline: self.airline.clone(),
            designator: self.designator.clone(),
            status: self.status,
            registered_at: self.registered_at,
        }
    }
}

/// Proof that a status update comes from an accepted oracle consensus.
/// Only the consensus component can mint one.
#[derive(Debug)]
pub struct ConsensusSeal(());

impl ConsensusSeal {
    pub(crate) fn new() -> Self {
        Self(())
    }
}

/// Who is writing a flight status
#[derive(Debug)]
pub enum StatusAuthority {
    Consensus(ConsensusSeal),
    Admin(Identity),
}

#[derive(Default)]
struct FlightTable {
    by_key: HashMap<FlightKey, Arc<Mutex<Flight>>>,
    order: Vec<FlightKey>,
}

pub struct FlightRegistry {
    epoch: u64,
    gate: Arc<OperationalGate>,
    airlines: Arc<AirlineRegistry>,
    events: Arc<EventFeed>,
    table: RwLock<FlightTable>,
}

impl FlightRegistry {
    pub fn new(
        epoch: u64,
        gate: Arc<OperationalGate>,
        airlines: Arc<AirlineRegistry>,
        events: Arc<EventFeed>,
    ) -> Self {
        Self {
            epoch,
            gate,
            airlines,
            events,
            table: RwLock::new(FlightTable::default()),
        }
    }

    pub fn key_for(&self, airline: &Identity, designator: &str) -> FlightKey {
        FlightKey::derive(airline, designator, self.epoch)
    }

    /// Registers a flight for `airline`. Registering the same flight again
    /// returns the existing key.
    pub fn register_flight(
        &self,
        airline: &Identity,
        designator: &str,
        caller: &Identity,
    ) -> Result<FlightKey> {
        self.gate.require_operational()?;

        if caller != airline || !self.airlines.is_registered(airline) {
            warn!(%airline, %caller, designator, "register_flight rejected");
            return Err(SuretyError::Unauthorized);
        }

        let key = self.key_for(airline, designator);
        let mut table = self.table.write();
        if table.by_key.contains_key(&key) {
            debug!(%key, designator, "flight already registered");
            return Ok(key);
        }

        let flight = Flight {
            key: key.clone(),
            airline: airline.clone(),
            designator: designator.to_string(),
            status: StatusCode::Unknown,
            overridden: false,
            registered_at: Utc::now(),
        };
        table.by_key.insert(key.clone(), Arc::new(Mutex::new(flight)));
        table.order.push(key.clone());

        info!(%key, %airline, designator, "flight registered");
        self.events.publish(SuretyEvent::FlightRegistered {
            flight_key: key.clone(),
            airline: airline.clone(),
            designator: designator.to_string(),
        });

        Ok(key)
    }

    /// Writes a resolved status. Returns `false` when the flight already had
    /// this status.
    ///
    /// Consensus never replaces a resolved status. The administrator may
    /// replace one once per flight; a second differing override is
    /// `FlightResolved`.
    pub fn set_status(
        &self,
        key: &FlightKey,
        status: StatusCode,
        authority: StatusAuthority,
    ) -> Result<bool> {
        self.gate.require_operational()?;

        if !status.is_resolved() {
            return Err(SuretyError::InvalidStatusCode);
        }
        if let StatusAuthority::Admin(caller) = &authority {
            self.gate.require_admin(caller)?;
        }

        let entry = self.entry(key).ok_or(SuretyError::UnknownFlight)?;
        let mut flight = entry.lock();

        if flight.status == status {
            return Ok(false);
        }

        match authority {
            StatusAuthority::Consensus(_) if flight.status.is_resolved() => {
                warn!(%key, current = ?flight.status, proposed = ?status, "consensus cannot overwrite a resolved flight");
                return Err(SuretyError::FlightResolved);
            }
            StatusAuthority::Consensus(_) => {
                info!(%key, ?status, "flight status resolved by oracle consensus");
            }
            StatusAuthority::Admin(caller) if flight.status.is_resolved() => {
                if flight.overridden {
                    warn!(%key, current = ?flight.status, proposed = ?status, admin = %caller, "flight status already overridden");
                    return Err(SuretyError::FlightResolved);
                }
                flight.overridden = true;
                info!(%key, previous = ?flight.status, ?status, admin = %caller, "flight status overridden by administrator");
            }
            StatusAuthority::Admin(caller) => {
                info!(%key, ?status, admin = %caller, "flight status set by administrator");
            }
        }

        flight.status = status;
        self.events.publish(SuretyEvent::FlightStatusResolved {
            flight_key: key.clone(),
            status,
        });

        Ok(true)
    }

    pub fn flight(&self, key: &FlightKey) -> Option<FlightInfo> {
        self.entry(key).map(|entry| entry.lock().info())
    }

    pub fn status_of(&self, key: &FlightKey) -> Option<StatusCode> {
        self.entry(key).map(|entry| entry.lock().status)
    }

    /// All flights in registration order.
    pub fn flight_list(&self) -> Vec<FlightInfo> {
        let table = self.table.read();
        table
            .order
            .iter()
            .filter_map(|key| table.by_key.get(key))
            .map(|entry| entry.lock().info())
            .collect()
    }

    pub fn flights_for(&self, airline: &Identity) -> Vec<FlightInfo> {
        self.flight_list()
            .into_iter()
            .filter(|flight| flight.airline == *airline)
            .collect()
    }

    /// Runs `f` while holding the flight's lock, so that callers can make
    /// their own change conditional on the flight status.
    pub(crate) fn with_flight<R>(&self, key: &FlightKey, f: impl FnOnce(&Flight) -> R) -> Option<R> {
        let entry = self.entry(key)?;
        let flight = entry.lock();
        Some(f(&flight))
    }

    fn entry(&self, key: &FlightKey) -> Option<Arc<Mutex<Flight>>> {
        self.table.read().by_key.get(key).cloned()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::EngineConfig;
    use crate::models::UNIT;
    use crate::treasury::Treasury;

    struct Fixture {
        flights: FlightRegistry,
        config: EngineConfig,
        events: Arc<EventFeed>,
    }

    fn setup() -> Fixture {
        let config = EngineConfig::default();
        let events = Arc::new(EventFeed::new(64));
        let gate = Arc::new(OperationalGate::new(config.admin.clone(), events.clone()));
        let airlines = Arc::new(AirlineRegistry::new(
            &config,
            gate.clone(),
            Arc::new(Treasury::new()),
            events.clone(),
        ));
        let genesis = config.genesis_airline.clone();
        airlines.fund(&genesis, 10 * UNIT, &genesis).unwrap();

        let flights = FlightRegistry::new(config.flight_epoch, gate, airlines, events.clone());
        Fixture {
            flights,
            config,
            events,
        }
    }

    #[test]
    fn test_register_flight_is_idempotent() {
        let f = setup();
        let airline = f.config.genesis_airline.clone();

        let first = f.flights.register_flight(&airline, "ND1300", &airline).unwrap();
        let published = f.events.published();
        let second = f.flights.register_flight(&airline, "ND1300", &airline).unwrap();

        assert_eq!(first, second);
        assert_eq!(f.events.published(), published);
        assert_eq!(f.flights.flight_list().len(), 1);
        assert_eq!(f.flights.status_of(&first), Some(StatusCode::Unknown));
    }

    #[test]
    fn test_register_flight_requires_owner() {
        let f = setup();
        let airline = f.config.genesis_airline.clone();
        assert_eq!(
            f.flights
                .register_flight(&airline, "ND1300", &Identity::from("GSOMEONE")),
            Err(SuretyError::Unauthorized)
        );

        let unregistered = Identity::from("GAIRLINE9");
        assert_eq!(
            f.flights.register_flight(&unregistered, "ND1300", &unregistered),
            Err(SuretyError::Unauthorized)
        );
    }

    #[test]
    fn test_listing_keeps_registration_order() {
        let f = setup();
        let airline = f.config.genesis_airline.clone();
        for designator in ["ND1302", "ND1300", "ND1301"] {
            f.flights.register_flight(&airline, designator, &airline).unwrap();
        }

        let designators: Vec<String> = f
            .flights
            .flights_for(&airline)
            .into_iter()
            .map(|flight| flight.designator)
            .collect();
        assert_eq!(designators, vec!["ND1302", "ND1300", "ND1301"]);
        assert!(f.flights.flights_for(&Identity::from("GOTHER")).is_empty());
    }

    #[test]
    fn test_consensus_sets_status_once() {
        let f = setup();
        let airline = f.config.genesis_airline.clone();
        let key = f.flights.register_flight(&airline, "ND1300", &airline).unwrap();

        let changed = f
            .flights
            .set_status(&key, StatusCode::LateAirline, StatusAuthority::Consensus(ConsensusSeal::new()))
            .unwrap();
        assert!(changed);

        let again = f
            .flights
            .set_status(&key, StatusCode::LateAirline, StatusAuthority::Consensus(ConsensusSeal::new()))
            .unwrap();
        assert!(!again);

        assert_eq!(
            f.flights.set_status(
                &key,
                StatusCode::OnTime,
                StatusAuthority::Consensus(ConsensusSeal::new())
            ),
            Err(SuretyError::FlightResolved)
        );
        assert_eq!(f.flights.status_of(&key), Some(StatusCode::LateAirline));
    }

    #[test]
    fn test_admin_override() {
        let f = setup();
        let airline = f.config.genesis_airline.clone();
        let key = f.flights.register_flight(&airline, "ND1300", &airline).unwrap();
        f.flights
            .set_status(&key, StatusCode::OnTime, StatusAuthority::Consensus(ConsensusSeal::new()))
            .unwrap();

        assert_eq!(
            f.flights.set_status(
                &key,
                StatusCode::LateAirline,
                StatusAuthority::Admin(Identity::from("GSTRANGER"))
            ),
            Err(SuretyError::Unauthorized)
        );

        let admin = f.config.admin.clone();
        assert_eq!(
            f.flights
                .set_status(&key, StatusCode::LateAirline, StatusAuthority::Admin(admin.clone())),
            Ok(true)
        );
        assert_eq!(
            f.flights
                .set_status(&key, StatusCode::LateAirline, StatusAuthority::Admin(admin)),
            Ok(false)
        );
        assert_eq!(f.flights.status_of(&key), Some(StatusCode::LateAirline));
    }

    #[test]
    fn test_admin_overrides_a_resolved_flight_once() {
        let f = setup();
        let airline = f.config.genesis_airline.clone();
        let key = f.flights.register_flight(&airline, "ND1300", &airline).unwrap();
        let admin = f.config.admin.clone();
        f.flights
            .set_status(&key, StatusCode::OnTime, StatusAuthority::Consensus(ConsensusSeal::new()))
            .unwrap();

        assert_eq!(
            f.flights
                .set_status(&key, StatusCode::LateAirline, StatusAuthority::Admin(admin.clone())),
            Ok(true)
        );
        for status in [StatusCode::OnTime, StatusCode::LateWeather] {
            assert_eq!(
                f.flights
                    .set_status(&key, status, StatusAuthority::Admin(admin.clone())),
                Err(SuretyError::FlightResolved)
            );
        }
        assert_eq!(
            f.flights
                .set_status(&key, StatusCode::LateAirline, StatusAuthority::Admin(admin)),
            Ok(false)
        );
        assert_eq!(f.flights.status_of(&key), Some(StatusCode::LateAirline));
    }

    #[test]
    fn test_admin_resolution_of_unknown_flight_leaves_override_available() {
        let f = setup();
        let airline = f.config.genesis_airline.clone();
        let key = f.flights.register_flight(&airline, "ND1300", &airline).unwrap();
        let admin = f.config.admin.clone();

        assert_eq!(
            f.flights
                .set_status(&key, StatusCode::OnTime, StatusAuthority::Admin(admin.clone())),
            Ok(true)
        );
        assert_eq!(
            f.flights
                .set_status(&key, StatusCode::LateTechnical, StatusAuthority::Admin(admin.clone())),
            Ok(true)
        );
        assert_eq!(
            f.flights
                .set_status(&key, StatusCode::OnTime, StatusAuthority::Admin(admin)),
            Err(SuretyError::FlightResolved)
        );
    }

    #[test]
    fn test_set_status_rejects_unknown() {
        let f = setup();
        let airline = f.config.genesis_airline.clone();
        let key = f.flights.register_flight(&airline, "ND1300", &airline).unwrap();
        assert_eq!(
            f.flights
                .set_status(&key, StatusCode::Unknown, StatusAuthority::Admin(f.config.admin.clone())),
            Err(SuretyError::InvalidStatusCode)
        );
        assert_eq!(
            f.flights.set_status(
                &FlightKey::from("missing".to_string()),
                StatusCode::OnTime,
                StatusAuthority::Admin(f.config.admin.clone())
            ),
            Err(SuretyError::UnknownFlight)
        );
    }
}
