use std::env;

use super::{parse_or, ConfigError};

/// Settings for the HTTP read surface and the demo harness.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub seed_demo: bool,
    pub demo_oracles: usize,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(Self {
            port: parse_or(&lookup, "PORT", 3001)?,
            cors_allowed_origins,
            seed_demo: parse_or(&lookup, "SEED_DEMO", false)?,
            demo_oracles: parse_or(&lookup, "DEMO_ORACLES", 20)?,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_server_defaults() {
        let config = ServerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.port, 3001);
        assert_eq!(config.cors_allowed_origins, vec!["http://localhost:3000"]);
        assert!(!config.seed_demo);
    }

    #[test]
    fn test_cors_list_is_split() {
        let config = ServerConfig::from_lookup(|name| match name {
            "CORS_ALLOWED_ORIGINS" => Some("http://a.test, http://b.test,".to_string()),
            "SEED_DEMO" => Some("true".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.cors_allowed_origins, vec!["http://a.test", "http://b.test"]);
        assert!(config.seed_demo);
    }
}
