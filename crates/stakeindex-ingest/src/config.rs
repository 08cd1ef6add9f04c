//! Indexer configuration loaded from environment variables.

use std::time::Duration;

/// Runtime behaviour of the indexer and replay driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerConfig {
    /// Fail protocol events that arrive before `StakingInitialized`.
    ///
    /// When `false`, appliers skip protocol counter updates if the singleton
    /// is missing instead of halting the pipeline.
    pub require_initialized: bool,

    /// Attempts after the first for events failing with a retryable error.
    pub max_retries: u32,

    /// Base delay between retries; doubled on every attempt.
    pub retry_backoff: Duration,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            require_initialized: true,
            max_retries: 3,
            retry_backoff: Duration::from_millis(100),
        }
    }
}

impl IndexerConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional:
    /// - `STAKEINDEX_REQUIRE_INITIALIZED`: `true`/`false` (default: true)
    /// - `STAKEINDEX_MAX_RETRIES`: retry attempts for storage failures (default: 3)
    /// - `STAKEINDEX_RETRY_BACKOFF_MS`: base retry delay in ms (default: 100)
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let require_initialized = match std::env::var("STAKEINDEX_REQUIRE_INITIALIZED") {
            Ok(v) => parse_bool(&v).ok_or_else(|| {
                anyhow::anyhow!("STAKEINDEX_REQUIRE_INITIALIZED must be true or false, got '{v}'")
            })?,
            Err(_) => defaults.require_initialized,
        };

        let max_retries = match std::env::var("STAKEINDEX_MAX_RETRIES") {
            Ok(v) => v
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("STAKEINDEX_MAX_RETRIES must be an integer, got '{v}'"))?,
            Err(_) => defaults.max_retries,
        };

        let retry_backoff = match std::env::var("STAKEINDEX_RETRY_BACKOFF_MS") {
            Ok(v) => Duration::from_millis(v.trim().parse().map_err(|_| {
                anyhow::anyhow!("STAKEINDEX_RETRY_BACKOFF_MS must be an integer, got '{v}'")
            })?),
            Err(_) => defaults.retry_backoff,
        };

        tracing::info!(
            require_initialized,
            max_retries,
            retry_backoff_ms = retry_backoff.as_millis() as u64,
            "indexer configuration loaded"
        );

        Ok(Self {
            require_initialized,
            max_retries,
            retry_backoff,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize config tests that manipulate env vars.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const ENV_KEYS: &[&str] = &[
        "STAKEINDEX_REQUIRE_INITIALIZED",
        "STAKEINDEX_MAX_RETRIES",
        "STAKEINDEX_RETRY_BACKOFF_MS",
    ];

    /// Run `f` with exactly `vars` set among the indexer keys.
    fn with_env_vars<F: FnOnce()>(vars: &[(&str, &str)], f: F) {
        let _guard = ENV_MUTEX.lock().unwrap();

        let saved: Vec<_> = ENV_KEYS
            .iter()
            .map(|k| (*k, std::env::var(k).ok()))
            .collect();

        // SAFETY: Serialized by mutex; only test code touches these vars.
        unsafe {
            for k in ENV_KEYS {
                std::env::remove_var(k);
            }
            for (k, v) in vars {
                std::env::set_var(k, v);
            }
        }

        f();

        // SAFETY: Restoring the saved env state.
        unsafe {
            for (k, v) in &saved {
                match v {
                    Some(val) => std::env::set_var(k, val),
                    None => std::env::remove_var(k),
                }
            }
        }
    }

    #[test]
    fn config_defaults() {
        with_env_vars(&[], || {
            let config = IndexerConfig::from_env().unwrap();
            assert_eq!(config, IndexerConfig::default());
            assert!(config.require_initialized);
            assert_eq!(config.max_retries, 3);
            assert_eq!(config.retry_backoff, Duration::from_millis(100));
        });
    }

    #[test]
    fn config_custom_values() {
        with_env_vars(
            &[
                ("STAKEINDEX_REQUIRE_INITIALIZED", "false"),
                ("STAKEINDEX_MAX_RETRIES", "7"),
                ("STAKEINDEX_RETRY_BACKOFF_MS", "25"),
            ],
            || {
                let config = IndexerConfig::from_env().unwrap();
                assert!(!config.require_initialized);
                assert_eq!(config.max_retries, 7);
                assert_eq!(config.retry_backoff, Duration::from_millis(25));
            },
        );
    }

    #[test]
    fn config_bool_spellings() {
        with_env_vars(&[("STAKEINDEX_REQUIRE_INITIALIZED", " Off ")], || {
            assert!(!IndexerConfig::from_env().unwrap().require_initialized);
        });
        with_env_vars(&[("STAKEINDEX_REQUIRE_INITIALIZED", "YES")], || {
            assert!(IndexerConfig::from_env().unwrap().require_initialized);
        });
    }

    #[test]
    fn config_rejects_invalid_values() {
        with_env_vars(&[("STAKEINDEX_REQUIRE_INITIALIZED", "maybe")], || {
            assert!(IndexerConfig::from_env().is_err());
        });
        with_env_vars(&[("STAKEINDEX_MAX_RETRIES", "-1")], || {
            assert!(IndexerConfig::from_env().is_err());
        });
        with_env_vars(&[("STAKEINDEX_RETRY_BACKOFF_MS", "soon")], || {
            assert!(IndexerConfig::from_env().is_err());
        });
    }
}
