//! Service configuration.
//!
//! Configuration is loaded from environment variables with fallback to defaults.
//!
//! | Variable                     | Default     | Meaning                              |
//! |------------------------------|-------------|--------------------------------------|
//! | `TILL_DB_PATH`               | `till.db`   | SQLite database file                 |
//! | `TILL_DB_MAX_CONNECTIONS`    | `5`         | Pool size                            |
//! | `TILL_REDIS_URL`             | unset       | Shared status cache; in-process if unset |
//! | `TILL_STATUS_CACHE_TTL_SECS` | `120`       | Status snapshot lifetime             |
//! | `TILL_RECENT_TRANSACTIONS`   | `10`        | Entries per register on the dashboard |
//! | `TILL_UTC_OFFSET_MINUTES`    | `330`       | Outlet local time for "today"        |
//! | `TILL_RETIRED_DENOMINATIONS` | empty       | Face values refused in counts, e.g. `2000` |
//! | `TILL_OUTLETS`               | unset       | Known outlet ids; any outlet if unset |

use chrono::{FixedOffset, Offset, Utc};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use till_core::{Denomination, DenominationSet, DEFAULT_RECENT_TRANSACTIONS};

/// Default offset: India Standard Time.
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 330;

/// Register engine configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// SQLite database file
    pub database_path: PathBuf,

    /// Maximum pooled connections
    pub db_max_connections: u32,

    /// Redis connection string (optional)
    pub redis_url: Option<String>,

    /// Lifetime of a cached outlet snapshot
    pub status_cache_ttl: Duration,

    /// Ledger entries shown per register on the dashboard
    pub recent_transactions: usize,

    /// Outlet local time, used for "today" on the dashboard
    pub utc_offset: FixedOffset,

    /// Face values no longer accepted in drawer counts
    pub retired_denominations: Vec<Denomination>,

    /// Known outlets; `None` accepts every outlet
    pub outlets: Option<Vec<String>>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            database_path: PathBuf::from("till.db"),
            db_max_connections: 5,
            redis_url: None,
            status_cache_ttl: Duration::from_secs(120),
            recent_transactions: DEFAULT_RECENT_TRANSACTIONS,
            utc_offset: ist(),
            retired_denominations: Vec::new(),
            outlets: None,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup (environment, map, ...).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ServiceConfig::default();

        let utc_offset_minutes: i32 = parse_or(&lookup, "TILL_UTC_OFFSET_MINUTES", DEFAULT_UTC_OFFSET_MINUTES)?;
        let utc_offset = utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| ConfigError::InvalidValue("TILL_UTC_OFFSET_MINUTES".to_string()))?;

        let config = ServiceConfig {
            database_path: lookup("TILL_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),

            db_max_connections: parse_or(&lookup, "TILL_DB_MAX_CONNECTIONS", defaults.db_max_connections)?,

            redis_url: lookup("TILL_REDIS_URL").filter(|url| !url.trim().is_empty()),

            status_cache_ttl: Duration::from_secs(parse_or(
                &lookup,
                "TILL_STATUS_CACHE_TTL_SECS",
                defaults.status_cache_ttl.as_secs(),
            )?),

            recent_transactions: parse_or(&lookup, "TILL_RECENT_TRANSACTIONS", defaults.recent_transactions)?,

            utc_offset,

            retired_denominations: match lookup("TILL_RETIRED_DENOMINATIONS") {
                Some(raw) => parse_denominations(&raw)?,
                None => Vec::new(),
            },

            outlets: lookup("TILL_OUTLETS").map(|raw| split_list(&raw).map(str::to_string).collect()),
        };

        if config.db_max_connections == 0 {
            return Err(ConfigError::InvalidValue("TILL_DB_MAX_CONNECTIONS".to_string()));
        }

        Ok(config)
    }

    /// Denominations accepted in drawer counts.
    pub fn denomination_set(&self) -> DenominationSet {
        self.retired_denominations
            .iter()
            .fold(DenominationSet::standard(), |set, retired| set.without(*retired))
    }
}

fn ist() -> FixedOffset {
    FixedOffset::east_opt(DEFAULT_UTC_OFFSET_MINUTES * 60).unwrap_or_else(|| Utc.fix())
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|item| !item.is_empty())
}

fn parse_denominations(raw: &str) -> Result<Vec<Denomination>, ConfigError> {
    split_list(raw)
        .map(|item| {
            item.parse::<i64>()
                .ok()
                .and_then(Denomination::from_face_major)
                .ok_or_else(|| ConfigError::InvalidValue("TILL_RETIRED_DENOMINATIONS".to_string()))
        })
        .collect()
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.database_path, PathBuf::from("till.db"));
        assert_eq!(config.recent_transactions, DEFAULT_RECENT_TRANSACTIONS);
        assert_eq!(config.utc_offset.local_minus_utc(), 330 * 60);
        assert!(config.redis_url.is_none());
        assert!(config.outlets.is_none());
        assert_eq!(config.denomination_set(), DenominationSet::standard());
    }

    #[test]
    fn test_overrides() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("TILL_DB_PATH", "/var/lib/till/till.db"),
            ("TILL_DB_MAX_CONNECTIONS", "8"),
            ("TILL_REDIS_URL", "redis://127.0.0.1/"),
            ("TILL_STATUS_CACHE_TTL_SECS", "30"),
            ("TILL_UTC_OFFSET_MINUTES", "-300"),
            ("TILL_RETIRED_DENOMINATIONS", "2000, 1"),
            ("TILL_OUTLETS", "outlet-1, outlet-2,"),
        ]))
        .unwrap();

        assert_eq!(config.db_max_connections, 8);
        assert_eq!(config.status_cache_ttl, Duration::from_secs(30));
        assert_eq!(config.utc_offset.local_minus_utc(), -300 * 60);
        assert_eq!(
            config.outlets,
            Some(vec!["outlet-1".to_string(), "outlet-2".to_string()])
        );

        let set = config.denomination_set();
        assert!(!set.accepts(Denomination::Note2000));
        assert!(!set.accepts(Denomination::Coin1));
        assert!(set.accepts(Denomination::Note500));
    }

    #[test]
    fn test_invalid_values() {
        assert!(ServiceConfig::from_lookup(lookup(&[("TILL_DB_MAX_CONNECTIONS", "many")])).is_err());
        assert!(ServiceConfig::from_lookup(lookup(&[("TILL_DB_MAX_CONNECTIONS", "0")])).is_err());
        assert!(ServiceConfig::from_lookup(lookup(&[("TILL_RETIRED_DENOMINATIONS", "3")])).is_err());
        assert!(ServiceConfig::from_lookup(lookup(&[("TILL_UTC_OFFSET_MINUTES", "100000")])).is_err());
    }

    #[test]
    fn test_utc_offset_bounds() {
        for minutes in ["1440", "-1440", "99999999", "-2147483648", "2147483647"] {
            let result = ServiceConfig::from_lookup(lookup(&[("TILL_UTC_OFFSET_MINUTES", minutes)]));
            assert!(
                matches!(result, Err(ConfigError::InvalidValue(ref key)) if key == "TILL_UTC_OFFSET_MINUTES"),
                "{minutes}"
            );
        }

        let config = ServiceConfig::from_lookup(lookup(&[("TILL_UTC_OFFSET_MINUTES", "-1439")])).unwrap();
        assert_eq!(config.utc_offset.local_minus_utc(), -1439 * 60);
    }
}
