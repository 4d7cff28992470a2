//! Held balance of the insurance pool
//!
//! The pool is a single shared counter. Callers mutate it only while holding
//! the entity lock of the operation that moves the value, and the treasury
//! lock itself is always the last one taken. Credits are checked before any
//! counter moves, so a rejected credit leaves the totals untouched.

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{Result, SuretyError};
use crate::models::{Amount, LedgerTotals};

#[derive(Default)]
pub struct Treasury {
    totals: Mutex<LedgerTotals>,
}

fn add(counter: Amount, amount: Amount) -> Result<Amount> {
    counter.checked_add(amount).ok_or_else(|| {
        warn!(counter, amount, "ledger credit would overflow");
        SuretyError::LedgerOverflow
    })
}

impl Treasury {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn totals(&self) -> LedgerTotals {
        *self.totals.lock()
    }

    pub fn held(&self) -> Amount {
        self.totals.lock().held
    }

    pub(crate) fn credit_funding(&self, amount: Amount) -> Result<()> {
        let mut totals = self.totals.lock();
        let airline_funding = add(totals.airline_funding, amount)?;
        let held = add(totals.held, amount)?;
        totals.airline_funding = airline_funding;
        totals.held = held;
        debug!(amount, held, "airline funding credited");
        Ok(())
    }

    pub(crate) fn credit_premium(&self, amount: Amount) -> Result<()> {
        let mut totals = self.totals.lock();
        let premiums = add(totals.premiums, amount)?;
        let held = add(totals.held, amount)?;
        totals.premiums = premiums;
        totals.held = held;
        debug!(amount, held, "premium credited");
        Ok(())
    }

    /// Oracle registration fees are collected outside the held balance.
    pub(crate) fn credit_oracle_fee(&self, amount: Amount) -> Result<()> {
        let mut totals = self.totals.lock();
        totals.oracle_fees = add(totals.oracle_fees, amount)?;
        Ok(())
    }

    pub(crate) fn debit_payout(&self, amount: Amount) -> Result<()> {
        let mut totals = self.totals.lock();
        if totals.held < amount {
            return Err(SuretyError::InsufficientFunds);
        }
        let paid_out = add(totals.paid_out, amount)?;
        totals.held -= amount;
        totals.paid_out = paid_out;
        debug!(amount, held = totals.held, "payout debited");
        Ok(())
    }

    /// Reverses a `debit_payout` whose transfer did not go through.
    pub(crate) fn restore_payout(&self, amount: Amount) {
        let mut totals = self.totals.lock();
        totals.held = totals.held.saturating_add(amount);
        totals.paid_out = totals.paid_out.saturating_sub(amount);
        debug!(amount, held = totals.held, "payout reservation restored");
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::models::UNIT;

    #[test]
    fn test_held_tracks_inflows_and_payouts() {
        let treasury = Treasury::new();
        treasury.credit_funding(10 * UNIT).unwrap();
        treasury.credit_premium(UNIT).unwrap();
        treasury.credit_oracle_fee(UNIT).unwrap();
        assert_eq!(treasury.held(), 11 * UNIT);

        treasury.debit_payout(UNIT + UNIT / 2).unwrap();
        let totals = treasury.totals();
        assert_eq!(totals.held, 9 * UNIT + UNIT / 2);
        assert_eq!(totals.paid_out, UNIT + UNIT / 2);
        assert_eq!(totals.oracle_fees, UNIT);
        assert_eq!(
            totals.held,
            totals.airline_funding + totals.premiums - totals.paid_out
        );
    }

    #[test]
    fn test_payout_cannot_overdraw() {
        let treasury = Treasury::new();
        treasury.credit_premium(UNIT).unwrap();
        assert_eq!(treasury.debit_payout(2 * UNIT), Err(SuretyError::InsufficientFunds));
        assert_eq!(treasury.held(), UNIT);
    }

    #[test]
    fn test_restore_undoes_debit() {
        let treasury = Treasury::new();
        treasury.credit_funding(10 * UNIT).unwrap();
        treasury.debit_payout(UNIT).unwrap();
        treasury.restore_payout(UNIT);
        assert_eq!(treasury.totals().held, 10 * UNIT);
        assert_eq!(treasury.totals().paid_out, 0);
    }

    #[test]
    fn test_overflowing_credit_is_rejected_without_change() {
        let treasury = Treasury::new();
        treasury.credit_funding(Amount::MAX - UNIT).unwrap();

        assert_eq!(treasury.credit_premium(2 * UNIT), Err(SuretyError::LedgerOverflow));
        assert_eq!(treasury.credit_funding(2 * UNIT), Err(SuretyError::LedgerOverflow));
        let totals = treasury.totals();
        assert_eq!(totals.held, Amount::MAX - UNIT);
        assert_eq!(totals.premiums, 0);
        assert_eq!(totals.airline_funding, Amount::MAX - UNIT);

        treasury.credit_oracle_fee(Amount::MAX).unwrap();
        assert_eq!(treasury.credit_oracle_fee(1), Err(SuretyError::LedgerOverflow));
        assert_eq!(treasury.totals().oracle_fees, Amount::MAX);
    }
}
