//! Store configuration, populated from environment variables.

use std::time::Duration;

/// Runtime configuration for a graph store.
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `SPANGRAPH_DB` | (absent = in-memory) | Path to the SQLite database file |
/// | `SPANGRAPH_WRITE_RETRIES` | `3` | Retries for a write transaction that hit lock contention |
/// | `SPANGRAPH_RETRY_BACKOFF_MS` | `25` | Base backoff between retries; grows linearly per attempt |
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    /// `None` means use an in-memory graph (data is lost on exit).
    pub db_path: Option<String>,

    pub retry: RetryPolicy,
}

/// How a provider retries write transactions that fail transiently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_millis(25),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based). Saturates at
    /// [`Duration::MAX`].
    pub fn delay(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl StoreConfig {
    /// Populate config from environment variables, applying defaults where
    /// absent or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = RetryPolicy::default();

        let max_retries = lookup("SPANGRAPH_WRITE_RETRIES")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(defaults.max_retries);

        let backoff = lookup("SPANGRAPH_RETRY_BACKOFF_MS")
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.backoff);

        Self {
            db_path: lookup("SPANGRAPH_DB").filter(|p| !p.is_empty()),
            retry: RetryPolicy {
                max_retries,
                backoff,
            },
        }
    }
}
