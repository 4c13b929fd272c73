//! Settings map and per-folder configuration
//!
//! Folders receive an opaque name-to-value map once, at construction.
//! Parsing happens eagerly there; a bad value is a configuration error
//! before any network activity. Loading the map (CLI flags, environment)
//! is the caller's concern.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::retry::{
    DEFAULT_BASE_RETRY_DELAY, DEFAULT_MAX_RETRIES, DEFAULT_MAX_RETRY_DELAY, RetryPolicy,
};

pub const DEFAULT_CONTEXT_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Immutable setting-name to string-value mapping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings(HashMap<String, String>);

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    fn parsed<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.0.get(key) {
            None => Ok(default),
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|err| Error::config(key, format!("unable to parse '{raw}': {err}"))),
        }
    }

    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool> {
        self.parsed(key, default)
    }

    pub fn u32_or(&self, key: &str, default: u32) -> Result<u32> {
        self.parsed(key, default)
    }

    pub fn usize_or(&self, key: &str, default: usize) -> Result<usize> {
        self.parsed(key, default)
    }

    /// Duration given in whole seconds.
    pub fn duration_secs_or(&self, key: &str, default: Duration) -> Result<Duration> {
        Ok(match self.0.get(key) {
            None => default,
            Some(_) => Duration::from_secs(self.parsed(key, 0u64)?),
        })
    }

    /// Duration given in milliseconds.
    pub fn duration_ms_or(&self, key: &str, default: Duration) -> Result<Duration> {
        Ok(match self.0.get(key) {
            None => default,
            Some(_) => Duration::from_millis(self.parsed(key, 0u64)?),
        })
    }
}

impl<K, V> FromIterator<(K, V)> for Settings
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl From<HashMap<String, String>> for Settings {
    fn from(map: HashMap<String, String>) -> Self {
        Self(map)
    }
}

/// The setting names one adapter recognizes.
///
/// Adapters without a chunk protocol leave `max_chunk_size` unset.
#[derive(Debug, Clone, Copy)]
pub struct SettingKeys {
    pub context_timeout: &'static str,
    pub normalize_prefix: &'static str,
    pub max_retries: &'static str,
    pub base_retry_delay: &'static str,
    pub max_retry_delay: &'static str,
    pub max_chunk_size: Option<&'static str>,
}

/// Per-folder tuning, fixed at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderConfig {
    /// Bounds every operation's cancellation signal.
    pub context_timeout: Duration,
    /// Selects the path-join mode; never changed after construction.
    pub normalize_prefix: bool,
    pub retry: RetryPolicy,
    pub max_chunk_size: usize,
}

impl FolderConfig {
    pub fn from_settings(
        settings: &Settings,
        keys: &SettingKeys,
        default_chunk_size: usize,
    ) -> Result<Self> {
        Ok(Self {
            context_timeout: settings
                .duration_secs_or(keys.context_timeout, DEFAULT_CONTEXT_TIMEOUT)?,
            normalize_prefix: settings.bool_or(keys.normalize_prefix, true)?,
            retry: RetryPolicy {
                max_retries: settings.u32_or(keys.max_retries, DEFAULT_MAX_RETRIES)?,
                base_delay: settings
                    .duration_ms_or(keys.base_retry_delay, DEFAULT_BASE_RETRY_DELAY)?,
                max_delay: settings.duration_ms_or(keys.max_retry_delay, DEFAULT_MAX_RETRY_DELAY)?,
            },
            max_chunk_size: match keys.max_chunk_size {
                Some(key) => settings.usize_or(key, default_chunk_size)?,
                None => default_chunk_size,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYS: SettingKeys = SettingKeys {
        context_timeout: "X_CONTEXT_TIMEOUT",
        normalize_prefix: "X_NORMALIZE_PREFIX",
        max_retries: "X_MAX_RETRIES",
        base_retry_delay: "X_BASE_RETRY_DELAY",
        max_retry_delay: "X_MAX_RETRY_DELAY",
        max_chunk_size: Some("X_MAX_CHUNK_SIZE"),
    };

    #[test]
    fn test_defaults_apply_when_unset() {
        let config = FolderConfig::from_settings(&Settings::new(), &KEYS, 20 << 20).unwrap();

        assert_eq!(config.context_timeout, Duration::from_secs(3600));
        assert!(config.normalize_prefix);
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.max_chunk_size, 20 << 20);
    }

    #[test]
    fn test_overrides_parse() {
        let settings = Settings::from_iter([
            ("X_CONTEXT_TIMEOUT", "120"),
            ("X_NORMALIZE_PREFIX", "false"),
            ("X_MAX_RETRIES", "3"),
            ("X_BASE_RETRY_DELAY", "50"),
            ("X_MAX_RETRY_DELAY", "2000"),
            ("X_MAX_CHUNK_SIZE", "1048576"),
        ]);
        let config = FolderConfig::from_settings(&settings, &KEYS, 20 << 20).unwrap();

        assert_eq!(config.context_timeout, Duration::from_secs(120));
        assert!(!config.normalize_prefix);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.base_delay, Duration::from_millis(50));
        assert_eq!(config.retry.max_delay, Duration::from_millis(2000));
        assert_eq!(config.max_chunk_size, 1 << 20);
    }

    #[test]
    fn test_unparsable_boolean_fails_fast() {
        let settings = Settings::from_iter([("X_NORMALIZE_PREFIX", "yes please")]);
        let err = FolderConfig::from_settings(&settings, &KEYS, 1024).unwrap_err();

        match err {
            Error::Config { key, .. } => assert_eq!(key, "X_NORMALIZE_PREFIX"),
            other => panic!("expected Config error, got {other}"),
        }
    }

    #[test]
    fn test_unparsable_number_fails_fast() {
        let settings = Settings::from_iter([("X_MAX_RETRIES", "many")]);
        assert!(FolderConfig::from_settings(&settings, &KEYS, 1024).is_err());
    }
}
