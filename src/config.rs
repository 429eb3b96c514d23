use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::dnssec::SigningPolicy;
use crate::error::ConfigError;
use crate::response::SignFailurePolicy;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SignerConfig {
    /// Key basename; `<key_file>.key` and `<key_file>.private` are read
    pub key_file: Option<PathBuf>,

    /// TTL recorded in every RRSIG
    pub original_ttl: u32,

    /// Seconds between inception and expiration
    pub signature_validity_secs: u64,

    /// Seconds inception is backdated to tolerate slow resolver clocks
    pub inception_skew_secs: u64,

    /// Cached signatures this close to expiration are replaced
    pub refresh_margin_secs: u64,

    /// Maximum number of cached signatures
    pub cache_capacity: usize,

    /// How often stale signatures are swept from the cache
    pub sweep_interval_secs: u64,

    /// TTL of synthesized NSEC records
    pub negative_ttl: u32,

    pub failure_policy: SignFailurePolicy,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            key_file: None,
            original_ttl: 3600,
            signature_validity_secs: 7 * 24 * 3600,
            inception_skew_secs: 3 * 3600,
            refresh_margin_secs: 24 * 3600,
            cache_capacity: 10_000,
            sweep_interval_secs: 300,
            negative_ttl: 300,
            failure_policy: SignFailurePolicy::ServFail,
        }
    }
}

impl SignerConfig {
    /// Defaults overridden by `DNSSEC_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key_file) = lookup("DNSSEC_KEY_FILE") {
            self.key_file = Some(PathBuf::from(key_file));
        }

        if let Some(ttl) = lookup("DNSSEC_ORIGINAL_TTL") {
            self.original_ttl = parse_env("DNSSEC_ORIGINAL_TTL", &ttl)?;
        }

        if let Some(validity) = lookup("DNSSEC_SIGNATURE_VALIDITY") {
            self.signature_validity_secs = parse_env("DNSSEC_SIGNATURE_VALIDITY", &validity)?;
        }

        if let Some(skew) = lookup("DNSSEC_INCEPTION_SKEW") {
            self.inception_skew_secs = parse_env("DNSSEC_INCEPTION_SKEW", &skew)?;
        }

        if let Some(margin) = lookup("DNSSEC_REFRESH_MARGIN") {
            self.refresh_margin_secs = parse_env("DNSSEC_REFRESH_MARGIN", &margin)?;
        }

        if let Some(capacity) = lookup("DNSSEC_CACHE_CAPACITY") {
            self.cache_capacity = parse_env("DNSSEC_CACHE_CAPACITY", &capacity)?;
        }

        if let Some(interval) = lookup("DNSSEC_SWEEP_INTERVAL") {
            self.sweep_interval_secs = parse_env("DNSSEC_SWEEP_INTERVAL", &interval)?;
        }

        if let Some(ttl) = lookup("DNSSEC_NEGATIVE_TTL") {
            self.negative_ttl = parse_env("DNSSEC_NEGATIVE_TTL", &ttl)?;
        }

        if let Some(policy) = lookup("DNSSEC_FAILURE_POLICY") {
            self.failure_policy = policy
                .parse()
                .map_err(|e: String| ConfigError::invalid("DNSSEC_FAILURE_POLICY", e))?;
        }

        Ok(())
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(text).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.signature_validity_secs == 0 {
            return Err(ConfigError::invalid(
                "signature_validity_secs",
                "must be greater than 0",
            ));
        }

        if self.signature_validity_secs >= 1 << 31 {
            return Err(ConfigError::invalid(
                "signature_validity_secs",
                "must be below 2^31 seconds",
            ));
        }

        // Inception is backdated by the skew, so a fresh signature has
        // validity - skew seconds left and must outlive the refresh margin.
        if self
            .refresh_margin_secs
            .saturating_add(self.inception_skew_secs)
            >= self.signature_validity_secs
        {
            return Err(ConfigError::invalid(
                "refresh_margin_secs",
                "refresh margin plus inception skew must be smaller than the signature validity",
            ));
        }

        if self.cache_capacity == 0 {
            return Err(ConfigError::invalid("cache_capacity", "must be greater than 0"));
        }

        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::invalid(
                "sweep_interval_secs",
                "must be greater than 0",
            ));
        }

        Ok(())
    }

    pub fn signing_policy(&self) -> SigningPolicy {
        SigningPolicy {
            original_ttl: self.original_ttl,
            validity: Duration::from_secs(self.signature_validity_secs),
            inception_skew: Duration::from_secs(self.inception_skew_secs),
            refresh_margin: Duration::from_secs(self.refresh_margin_secs),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn parse_env<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::invalid(field, format!("not a number: {}", value)))
}
