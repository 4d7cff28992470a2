use tracing::info;

use crate::app::FlightSuretyApp;
use crate::error::Result;
use crate::models::{FlightKey, Identity};

const DEMO_AIRLINES: [&str; 3] = ["GAIRLINE1", "GAIRLINE2", "GAIRLINE3"];

/// (airline index, designator); index 0 is the genesis airline.
const DEMO_FLIGHTS: [(usize, &str); 4] = [(1, "ND1300"), (2, "ND1301"), (1, "ND1302"), (3, "ND1303")];

/// Identities created by `seed_demo`
#[derive(Debug, Clone, Default)]
pub struct DemoRoster {
    pub airlines: Vec<Identity>,
    pub flights: Vec<FlightKey>,
    pub oracles: Vec<Identity>,
}

/// Registers and funds the founding airlines, a handful of flights and
/// `oracle_count` oracles so that a fresh server has something to show.
pub fn seed_demo(engine: &FlightSuretyApp, oracle_count: usize) -> Result<DemoRoster> {
    let config = engine.config();
    let genesis = config.genesis_airline.clone();
    let stake = config.min_funding;

    // Genesis must be Registered before it can propose, so it funds first.
    engine.fund(&genesis, stake, &genesis)?;
    let mut airlines = vec![genesis.clone()];
    for address in DEMO_AIRLINES {
        let airline = Identity::from(address);
        engine.register_airline(&airline, &genesis)?;
        engine.fund(&airline, stake, &airline)?;
        airlines.push(airline);
    }
    info!(count = airlines.len(), "demo airlines registered");

    let mut flights = Vec::with_capacity(DEMO_FLIGHTS.len());
    for (owner, designator) in DEMO_FLIGHTS {
        let airline = &airlines[owner];
        flights.push(engine.register_flight(airline, designator, airline)?);
    }
    info!(count = flights.len(), "demo flights registered");

    let fee = engine.registration_fee();
    let mut oracles = Vec::with_capacity(oracle_count);
    for n in 1..=oracle_count {
        let oracle = Identity::new(format!("GORACLE{n}"));
        engine.register_oracle(&oracle, fee, &oracle)?;
        oracles.push(oracle);
    }
    info!(count = oracles.len(), "demo oracles registered");

    Ok(DemoRoster {
        airlines,
        flights,
        oracles,
    })
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::config::EngineConfig;
    use crate::models::UNIT;
    use crate::settlement::InMemoryAccounts;

    #[test]
    fn test_seed_demo_populates_engine() {
        let engine = FlightSuretyApp::new(EngineConfig::default(), Arc::new(InMemoryAccounts::new()));
        let roster = seed_demo(&engine, 5).unwrap();

        assert_eq!(roster.airlines.len(), 4);
        assert!(roster.airlines.iter().all(|airline| engine.is_registered(airline)));
        assert_eq!(engine.flight_list().len(), 4);
        assert_eq!(engine.flights_for(&Identity::from("GAIRLINE1")).len(), 2);
        assert_eq!(roster.oracles.len(), 5);
        assert_eq!(engine.held_balance(), 40 * UNIT);
        assert_eq!(engine.ledger_totals().oracle_fees, 5 * UNIT);
    }
}
