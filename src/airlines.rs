//! Airline membership registry
//!
//! Lifecycle: proposed (`Queued`, collecting votes) → cleared → funded
//! (`Registered`). The first `founding_airlines` admissions clear without a
//! vote; later candidates need `ceil(registered / 2)` distinct votes from
//! registered airlines.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{Result, SuretyError};
use crate::events::{EventFeed, SuretyEvent};
use crate::gate::OperationalGate;
use crate::models::{AirlineStatus, Amount, Identity};
use crate::treasury::Treasury;

#[derive(Debug)]
struct Airline {
    identity: Identity,
    status: AirlineStatus,
    has_funded: bool,
    /// Distinct registered airlines that voted for this candidate.
    votes: HashSet<Identity>,
    /// Admission vote passed (or founding slot taken); only funding remains.
    cleared: bool,
    funding: Amount,
}

impl Airline {
    fn candidate(identity: Identity) -> Self {
        Self {
            identity,
            status: AirlineStatus::Unregistered,
            has_funded: false,
            votes: HashSet::new(),
            cleared: false,
            funding: 0,
        }
    }

    fn record(&self) -> AirlineRecord {
        AirlineRecord {
            identity: self.identity.clone(),
            status: self.status,
            has_funded: self.has_funded,
            votes: self.votes.len(),
            cleared: self.cleared,
            funding: self.funding,
        }
    }
}

/// Read-only view of an airline
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AirlineRecord {
    pub identity: Identity,
    pub status: AirlineStatus,
    pub has_funded: bool,
    pub votes: usize,
    pub cleared: bool,
    pub funding: Amount,
}

/// Outcome of a `register_airline` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The candidate may now fund to become registered.
    Cleared,
    /// More votes are needed.
    Pending { votes: usize, required: usize },
}

#[derive(Debug, Default)]
struct Membership {
    /// Candidates that cleared admission, funded or not.
    admitted: usize,
    registered: usize,
}

pub struct AirlineRegistry {
    founding_airlines: usize,
    min_funding: Amount,
    gate: Arc<OperationalGate>,
    treasury: Arc<Treasury>,
    events: Arc<EventFeed>,
    airlines: RwLock<HashMap<Identity, Arc<Mutex<Airline>>>>,
    membership: Mutex<Membership>,
}

impl AirlineRegistry {
    /// Creates the registry with the genesis airline already cleared for funding.
    pub fn new(
        config: &EngineConfig,
        gate: Arc<OperationalGate>,
        treasury: Arc<Treasury>,
        events: Arc<EventFeed>,
    ) -> Self {
        let genesis = config.genesis_airline.clone();
        let mut seed = Airline::candidate(genesis.clone());
        seed.status = AirlineStatus::Queued;
        seed.cleared = true;

        let mut airlines = HashMap::new();
        airlines.insert(genesis.clone(), Arc::new(Mutex::new(seed)));

        info!(airline = %genesis, "genesis airline seeded");

        Self {
            founding_airlines: config.founding_airlines,
            min_funding: config.min_funding,
            gate,
            treasury,
            events,
            airlines: RwLock::new(airlines),
            membership: Mutex::new(Membership {
                admitted: 1,
                registered: 0,
            }),
        }
    }

    /// Proposes or votes for `candidate` on behalf of `caller`.
    ///
    /// A repeat vote from the same caller is a no-op that reports the
    /// current tally.
    pub fn register_airline(&self, candidate: &Identity, caller: &Identity) -> Result<Admission> {
        self.gate.require_operational()?;

        if !self.is_registered(caller) {
            warn!(%caller, %candidate, "register_airline rejected: caller is not a funded airline");
            return Err(SuretyError::Unauthorized);
        }

        let entry = self.entry_or_insert(candidate);
        let mut airline = entry.lock();

        match airline.status {
            AirlineStatus::Registered => return Err(SuretyError::AlreadyRegistered),
            _ if airline.cleared => {
                debug!(%candidate, "candidate already cleared; awaiting funding");
                return Ok(Admission::Cleared);
            }
            _ => {}
        }

        let mut membership = self.membership.lock();
        let newly_queued = airline.status == AirlineStatus::Unregistered;
        airline.status = AirlineStatus::Queued;

        if membership.admitted < self.founding_airlines {
            airline.cleared = true;
            membership.admitted += 1;
            info!(%candidate, sponsor = %caller, admitted = membership.admitted, "founding airline admitted");
            self.events.publish(SuretyEvent::AirlineQueued {
                airline: candidate.clone(),
                sponsor: Some(caller.clone()),
            });
            return Ok(Admission::Cleared);
        }

        let required = Self::quorum(membership.registered);

        if *candidate == *caller || !airline.votes.insert(caller.clone()) {
            debug!(%candidate, voter = %caller, "duplicate vote ignored");
            return Ok(Admission::Pending {
                votes: airline.votes.len(),
                required,
            });
        }

        let votes = airline.votes.len();
        if newly_queued {
            self.events.publish(SuretyEvent::AirlineQueued {
                airline: candidate.clone(),
                sponsor: Some(caller.clone()),
            });
        }
        self.events.publish(SuretyEvent::AirlineVoted {
            airline: candidate.clone(),
            voter: caller.clone(),
            votes,
            required,
        });

        if votes >= required {
            airline.cleared = true;
            membership.admitted += 1;
            info!(%candidate, votes, required, "airline cleared admission vote");
            Ok(Admission::Cleared)
        } else {
            info!(%candidate, votes, required, "vote recorded");
            Ok(Admission::Pending { votes, required })
        }
    }

    /// Deposits the stake for `airline`. Exactly `min_funding` is taken into
    /// the pool; any excess stays with the payer. Returns `false` when the
    /// airline had already funded, in which case nothing is credited.
    pub fn fund(&self, airline: &Identity, amount: Amount, caller: &Identity) -> Result<bool> {
        self.gate.require_operational()?;

        let entry = self
            .airlines
            .read()
            .get(airline)
            .cloned()
            .ok_or(SuretyError::NotEligible)?;
        let mut record = entry.lock();

        if record.has_funded {
            debug!(%airline, %caller, "airline already funded; deposit ignored");
            return Ok(false);
        }
        if !record.cleared {
            warn!(%airline, votes = record.votes.len(), "fund rejected: admission vote not passed");
            return Err(SuretyError::NotEligible);
        }
        if amount < self.min_funding {
            warn!(%airline, amount, minimum = self.min_funding, "fund rejected: deposit too small");
            return Err(SuretyError::InsufficientFunds);
        }

        let stake = self.min_funding;
        let mut membership = self.membership.lock();
        self.treasury.credit_funding(stake)?;
        record.has_funded = true;
        record.funding = stake;
        record.status = AirlineStatus::Registered;
        membership.registered += 1;
        drop(membership);

        info!(%airline, payer = %caller, stake, declined = amount - stake, "airline funded and registered");
        self.events.publish(SuretyEvent::AirlineRegistered {
            airline: airline.clone(),
            funding: stake,
        });

        Ok(true)
    }

    pub fn is_registered(&self, identity: &Identity) -> bool {
        self.status(identity) == AirlineStatus::Registered
    }

    pub fn is_queued(&self, identity: &Identity) -> bool {
        self.status(identity) == AirlineStatus::Queued
    }

    pub fn status(&self, identity: &Identity) -> AirlineStatus {
        self.airlines
            .read()
            .get(identity)
            .map(|entry| entry.lock().status)
            .unwrap_or(AirlineStatus::Unregistered)
    }

    pub fn airline(&self, identity: &Identity) -> Option<AirlineRecord> {
        self.airlines
            .read()
            .get(identity)
            .map(|entry| entry.lock().record())
    }

    pub fn registered_count(&self) -> usize {
        self.membership.lock().registered
    }

    /// Votes needed to clear a non-founding candidate right now.
    pub fn required_votes(&self) -> usize {
        Self::quorum(self.registered_count())
    }

    fn quorum(registered: usize) -> usize {
        registered.div_ceil(2).max(1)
    }

    fn entry_or_insert(&self, identity: &Identity) -> Arc<Mutex<Airline>> {
        if let Some(entry) = self.airlines.read().get(identity) {
            return entry.clone();
        }
        self.airlines
            .write()
            .entry(identity.clone())
            .or_insert_with(|| Arc::new(Mutex::new(Airline::candidate(identity.clone()))))
            .clone()
    }
}
