//! Insurance ledger
//!
//! Policies are grouped into one book per customer. The book lock serialises
//! purchases, claim checks and withdrawals of the same customer; the flight
//! lock is taken inside it when a purchase depends on the flight status.
//! Payouts are pull-based: nothing is paid until the customer withdraws.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{Result, SuretyError};
use crate::events::{EventFeed, SuretyEvent};
use crate::flights::FlightRegistry;
use crate::gate::OperationalGate;
use crate::models::{Amount, ClaimStatus, FlightKey, Identity};
use crate::settlement::ValueTransfer;
use crate::treasury::Treasury;

/// A single purchased policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Policy {
    pub id: Uuid,
    pub flight_key: FlightKey,
    pub customer: Identity,
    pub premium: Amount,
    pub claimed: bool,
    pub purchased_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct PolicyBook {
    policies: Vec<Policy>,
}

pub struct InsuranceLedger {
    config: Arc<EngineConfig>,
    gate: Arc<OperationalGate>,
    flights: Arc<FlightRegistry>,
    treasury: Arc<Treasury>,
    events: Arc<EventFeed>,
    transfer: Arc<dyn ValueTransfer>,
    books: RwLock<HashMap<Identity, Arc<Mutex<PolicyBook>>>>,
}

impl InsuranceLedger {
    pub fn new(
        config: Arc<EngineConfig>,
        gate: Arc<OperationalGate>,
        flights: Arc<FlightRegistry>,
        treasury: Arc<Treasury>,
        events: Arc<EventFeed>,
        transfer: Arc<dyn ValueTransfer>,
    ) -> Self {
        Self {
            config,
            gate,
            flights,
            treasury,
            events,
            transfer,
            books: RwLock::new(HashMap::new()),
        }
    }

    pub fn buy_policy(
        &self,
        flight_key: &FlightKey,
        customer: &Identity,
        premium: Amount,
        caller: &Identity,
    ) -> Result<Uuid> {
        self.gate.require_operational()?;

        if caller != customer {
            return Err(SuretyError::Unauthorized);
        }
        if premium == 0 {
            return Err(SuretyError::InvalidAmount);
        }
        if premium > self.config.max_premium {
            warn!(%customer, premium, cap = self.config.max_premium, "premium over cap");
            return Err(SuretyError::CapExceeded);
        }
        if self.flights.status_of(flight_key).is_none() {
            return Err(SuretyError::UnknownFlight);
        }

        let book = self.book_or_insert(customer);
        let mut book = book.lock();

        // Hold the flight lock so the purchase cannot interleave with a resolution.
        self.flights
            .with_flight(flight_key, |flight| {
                if flight.status().is_resolved() {
                    warn!(%flight_key, %customer, status = ?flight.status(), "purchase rejected: flight resolved");
                    return Err(SuretyError::FlightResolved);
                }

                let policy = Policy {
                    id: Uuid::new_v4(),
                    flight_key: flight_key.clone(),
                    customer: customer.clone(),
                    premium,
                    claimed: false,
                    purchased_at: Utc::now(),
                };
                let id = policy.id;
                self.treasury.credit_premium(premium)?;
                book.policies.push(policy);

                info!(%flight_key, %customer, premium, policy = %id, "policy purchased");
                self.events.publish(SuretyEvent::PolicyPurchased {
                    flight_key: flight_key.clone(),
                    customer: customer.clone(),
                    premium,
                });
                Ok(id)
            })
            .unwrap_or(Err(SuretyError::UnknownFlight))
    }

    /// Reports what `withdraw` would pay right now. Changes no state.
    pub fn check_claim(&self, customer: &Identity, caller: &Identity) -> Result<ClaimStatus> {
        if caller != customer {
            return Err(SuretyError::Unauthorized);
        }

        let amount = match self.book(customer) {
            Some(book) => self.claimable(&book.lock()).1,
            None => 0,
        };
        let status = ClaimStatus {
            available: amount > 0,
            amount,
        };

        debug!(%customer, available = status.available, amount, "claim checked");
        self.events.publish(SuretyEvent::ClaimChecked {
            customer: customer.clone(),
            available: status.available,
            amount,
        });
        Ok(status)
    }

    /// Pays out every claimable policy of `customer` exactly once.
    ///
    /// The held balance is reserved before the transfer and restored if the
    /// transfer fails; policies are only marked claimed after it succeeds.
    pub fn withdraw(&self, customer: &Identity, caller: &Identity) -> Result<Amount> {
        self.gate.require_operational()?;

        if caller != customer {
            return Err(SuretyError::Unauthorized);
        }

        let Some(book) = self.book(customer) else {
            return Ok(0);
        };
        let mut book = book.lock();

        let (claimable, amount) = self.claimable(&book);
        if amount == 0 {
            debug!(%customer, "nothing to withdraw");
            return Ok(0);
        }

        self.treasury.debit_payout(amount)?;
        if let Err(err) = self.transfer.pay(customer, amount) {
            self.treasury.restore_payout(amount);
            warn!(%customer, amount, error = %err, "payout transfer failed; policies left unclaimed");
            return Err(SuretyError::TransferFailed);
        }

        for index in claimable {
            book.policies[index].claimed = true;
        }

        info!(%customer, amount, held = self.treasury.held(), "payout withdrawn");
        self.events.publish(SuretyEvent::PayoutWithdrawn {
            customer: customer.clone(),
            amount,
        });

        Ok(amount)
    }

    pub fn policies_of(&self, customer: &Identity) -> Vec<Policy> {
        self.book(customer)
            .map(|book| book.lock().policies.clone())
            .unwrap_or_default()
    }

    /// Distinct flights the customer holds policies on, in purchase order.
    pub fn customer_flights(&self, customer: &Identity) -> Vec<FlightKey> {
        let mut keys: Vec<FlightKey> = Vec::new();
        for policy in self.policies_of(customer) {
            if !keys.contains(&policy.flight_key) {
                keys.push(policy.flight_key);
            }
        }
        keys
    }

    /// Indexes of unclaimed policies on airline-delayed flights, and their payout.
    fn claimable(&self, book: &PolicyBook) -> (Vec<usize>, Amount) {
        let mut statuses = HashMap::new();
        let mut indexes = Vec::new();
        let mut amount: Amount = 0;

        for (index, policy) in book.policies.iter().enumerate() {
            if policy.claimed {
                continue;
            }
            let status = *statuses
                .entry(policy.flight_key.clone())
                .or_insert_with(|| self.flights.status_of(&policy.flight_key));
            if status.is_some_and(|status| status.pays_out()) {
                indexes.push(index);
                amount += self.config.payout_for(policy.premium);
            }
        }

        (indexes, amount)
    }

    fn book(&self, customer: &Identity) -> Option<Arc<Mutex<PolicyBook>>> {
        self.books.read().get(customer).cloned()
    }

    fn book_or_insert(&self, customer: &Identity) -> Arc<Mutex<PolicyBook>> {
        if let Some(book) = self.book(customer) {
            return book;
        }
        self.books
            .write()
            .entry(customer.clone())
            .or_default()
            .clone()
    }
}
