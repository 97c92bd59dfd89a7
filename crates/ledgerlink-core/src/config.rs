//! Configuration for codecs and the resilience layer
//!
//! Everything is passed to constructors explicitly; nothing here reads the
//! environment. Durations are stored as milliseconds so the JSON file stays
//! readable.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use crate::constants::MAX_ID_LENGTH;
use crate::{parse_address, EntityClass, Error, Result};

/// Per-class identifier and contract settings
#[derive(Clone, Serialize, Deserialize)]
pub struct ClassConfig {
    pub class: EntityClass,
    /// Contract holding entities of this class
    pub contract: String,
    /// Secret mixed into every opaque id; changing it invalidates all issued ids
    pub salt: String,
    /// Exclusive upper bound of the reverse lookup. Must stay above the
    /// number of entities the contract has ever created.
    pub search_bound: u64,
    /// Hex characters kept from the digest
    #[serde(default = "default_id_length")]
    pub id_length: usize,
    /// Precompute the reverse mapping at startup
    #[serde(default)]
    pub reverse_index: bool,
    /// Check for truncated-hash collisions at startup
    #[serde(default)]
    pub verify_collisions: bool,
}

fn default_id_length() -> usize {
    12
}

impl fmt::Debug for ClassConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassConfig")
            .field("class", &self.class)
            .field("contract", &self.contract)
            .field("salt", &"<redacted>")
            .field("search_bound", &self.search_bound)
            .field("id_length", &self.id_length)
            .field("reverse_index", &self.reverse_index)
            .field("verify_collisions", &self.verify_collisions)
            .finish()
    }
}

/// Retry, pacing, batching and caching settings for ledger calls
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Total attempts per request, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay_ms: u64,
    /// Growth factor between retries (1.0 keeps the delay constant)
    pub backoff_multiplier: f64,
    /// Upper bound on a single retry delay
    pub max_delay_ms: u64,
    /// Random spread applied to each delay, 0.0..=1.0
    pub jitter: f64,
    /// Lifetime of a cached read; 0 disables caching
    pub cache_ttl_ms: u64,
    /// Maximum cached responses
    pub cache_capacity: usize,
    /// Reads per remote batch call
    pub batch_size: usize,
    /// Pause between consecutive batches of one submission
    pub inter_batch_delay_ms: u64,
    /// Remote invocations per second across all callers; 0 disables pacing
    pub requests_per_second: u32,
    /// Invocations allowed back to back before pacing kicks in
    pub burst: u32,
    /// Remote invocations allowed in flight at once
    pub max_in_flight: usize,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            backoff_multiplier: 1.0,
            max_delay_ms: 10_000,
            jitter: 0.2,
            cache_ttl_ms: 10_000,
            cache_capacity: 10_000,
            batch_size: 20,
            inter_batch_delay_ms: 200,
            requests_per_second: 10,
            burst: 5,
            max_in_flight: 4,
        }
    }
}

impl ResilienceConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn inter_batch_delay(&self) -> Duration {
        Duration::from_millis(self.inter_batch_delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::InvalidConfig("max_attempts must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be at least 1".into()));
        }
        if self.max_in_flight == 0 {
            return Err(Error::InvalidConfig("max_in_flight must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(Error::InvalidConfig(format!(
                "jitter must be within 0.0..=1.0, got {}",
                self.jitter
            )));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(Error::InvalidConfig(format!(
                "backoff_multiplier must be >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(Error::InvalidConfig(
                "max_delay_ms must not be smaller than base_delay_ms".into(),
            ));
        }
        if self.requests_per_second > 0 && self.burst == 0 {
            return Err(Error::InvalidConfig(
                "burst must be at least 1 when requests_per_second is set".into(),
            ));
        }
        Ok(())
    }
}

/// Top-level configuration file
#[derive(Clone, Serialize, Deserialize)]
pub struct LedgerLinkConfig {
    /// JSON-RPC endpoint of the ledger
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    pub classes: Vec<ClassConfig>,
    /// Salt for timestamped ids, when that scheme is in use
    #[serde(default)]
    pub timestamp_salt: Option<String>,
    #[serde(default)]
    pub resilience: ResilienceConfig,
}

fn default_rpc_url() -> String {
    "http://localhost:8545".to_string()
}

impl LedgerLinkConfig {
    /// Load configuration from a JSON file and validate it
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    pub fn class(&self, class: EntityClass) -> Option<&ClassConfig> {
        self.classes.iter().find(|c| c.class == class)
    }

    pub fn validate(&self) -> Result<()> {
        if self.classes.is_empty() {
            return Err(Error::InvalidConfig("no entity classes configured".into()));
        }

        let mut seen = HashSet::new();
        for class in &self.classes {
            if !seen.insert(class.class) {
                return Err(Error::DuplicateClass(class.class));
            }
            if class.salt.is_empty() {
                return Err(Error::InvalidConfig(format!("{}: salt must not be empty", class.class)));
            }
            if class.search_bound == 0 {
                return Err(Error::InvalidConfig(format!(
                    "{}: search_bound must be at least 1",
                    class.class
                )));
            }
            if class.id_length == 0 || class.id_length > MAX_ID_LENGTH {
                return Err(Error::InvalidConfig(format!(
                    "{}: id_length must be in 1..={}",
                    class.class, MAX_ID_LENGTH
                )));
            }
            parse_address(&class.contract)?;
        }

        if matches!(&self.timestamp_salt, Some(salt) if salt.is_empty()) {
            return Err(Error::InvalidConfig("timestamp_salt must not be empty".into()));
        }

        self.resilience.validate()
    }
}

impl fmt::Debug for LedgerLinkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerLinkConfig")
            .field("rpc_url", &self.rpc_url)
            .field("classes", &self.classes)
            .field("timestamp_salt", &self.timestamp_salt.as_ref().map(|_| "<redacted>"))
            .field("resilience", &self.resilience)
            .finish()
    }
}
