use std::env;

use crate::models::{Amount, Identity, UNIT};

use super::{parse_or, ConfigError};

/// Design constants of the engine. Amounts are in stroops.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    pub admin: Identity,
    pub genesis_airline: Identity,
    pub min_funding: Amount,
    pub max_premium: Amount,
    /// Payout multiplier as a ratio, 3/2 by default.
    pub payout_numerator: Amount,
    pub payout_denominator: Amount,
    pub oracle_registration_fee: Amount,
    pub oracle_quorum: usize,
    pub oracle_index_range: u8,
    /// Airlines admitted without a vote, the genesis airline included.
    pub founding_airlines: usize,
    pub flight_epoch: u64,
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            admin: Identity::new("GADMIN"),
            genesis_airline: Identity::new("GAIRLINE0"),
            min_funding: 10 * UNIT,
            max_premium: UNIT,
            payout_numerator: 3,
            payout_denominator: 2,
            oracle_registration_fee: UNIT,
            oracle_quorum: 3,
            oracle_index_range: 10,
            founding_airlines: 4,
            flight_epoch: 0,
            event_capacity: 1024,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            admin: lookup("ADMIN_ADDRESS")
                .filter(|value| !value.trim().is_empty())
                .map(Identity::new)
                .unwrap_or(defaults.admin),
            genesis_airline: lookup("GENESIS_AIRLINE")
                .filter(|value| !value.trim().is_empty())
                .map(Identity::new)
                .unwrap_or(defaults.genesis_airline),
            min_funding: parse_or(&lookup, "MIN_FUNDING", defaults.min_funding)?,
            max_premium: parse_or(&lookup, "MAX_PREMIUM", defaults.max_premium)?,
            payout_numerator: defaults.payout_numerator,
            payout_denominator: defaults.payout_denominator,
            oracle_registration_fee: parse_or(
                &lookup,
                "ORACLE_REGISTRATION_FEE",
                defaults.oracle_registration_fee,
            )?,
            oracle_quorum: parse_or(&lookup, "ORACLE_QUORUM", defaults.oracle_quorum)?,
            oracle_index_range: parse_or(
                &lookup,
                "ORACLE_INDEX_RANGE",
                defaults.oracle_index_range,
            )?,
            founding_airlines: parse_or(
                &lookup,
                "FOUNDING_AIRLINES",
                defaults.founding_airlines,
            )?,
            flight_epoch: parse_or(&lookup, "FLIGHT_EPOCH", defaults.flight_epoch)?,
            event_capacity: parse_or(&lookup, "EVENT_CAPACITY", defaults.event_capacity)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.min_funding == 0 {
            return Err(ConfigError::Zero("MIN_FUNDING"));
        }
        if self.max_premium == 0 {
            return Err(ConfigError::Zero("MAX_PREMIUM"));
        }
        if self.oracle_quorum == 0 {
            return Err(ConfigError::Zero("ORACLE_QUORUM"));
        }
        if self.oracle_index_range == 0 {
            return Err(ConfigError::Zero("ORACLE_INDEX_RANGE"));
        }
        if self.founding_airlines == 0 {
            return Err(ConfigError::Zero("FOUNDING_AIRLINES"));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Zero("EVENT_CAPACITY"));
        }
        Ok(())
    }

    /// Payout owed for a premium on an airline-caused delay.
    pub fn payout_for(&self, premium: Amount) -> Amount {
        premium.saturating_mul(self.payout_numerator) / self.payout_denominator
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = EngineConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.min_funding, 10 * UNIT);
        assert_eq!(config.payout_for(UNIT), UNIT + UNIT / 2);
    }

    #[test]
    fn test_overrides_from_env() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            ("ADMIN_ADDRESS", "GOWNER"),
            ("ORACLE_QUORUM", "5"),
            ("FLIGHT_EPOCH", " 20240101 "),
        ]))
        .unwrap();
        assert_eq!(config.admin, Identity::new("GOWNER"));
        assert_eq!(config.oracle_quorum, 5);
        assert_eq!(config.flight_epoch, 20240101);
    }

    #[test]
    fn test_rejects_bad_values() {
        let err = EngineConfig::from_lookup(lookup_from(&[("MIN_FUNDING", "ten")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                name: "MIN_FUNDING",
                value: "ten".to_string()
            }
        );

        let err = EngineConfig::from_lookup(lookup_from(&[("ORACLE_QUORUM", "0")])).unwrap_err();
        assert_eq!(err, ConfigError::Zero("ORACLE_QUORUM"));
    }
}
