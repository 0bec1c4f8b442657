//! Observer configuration
//!
//! Loaded from TOML with kebab-case keys; every field has a default, so an
//! empty document is a valid configuration.
//!
//! ```toml
//! sample-rate = 0.25
//! threshold-ms = 200
//! where-function-allow-list = ["lower", "date"]
//!
//! [cache]
//! spec = "maximumSize=500,expireAfterWrite=30m"
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SqlScopeConfig {
    pub enabled: bool,
    /// Fraction of eligible statements analyzed, in `[0, 1]`
    pub sample_rate: f64,
    /// Statements must run strictly longer than this to be analyzed
    pub threshold_ms: u64,
    /// Analyze every sampled statement regardless of execution time
    pub explain_all: bool,
    /// Run analysis on the worker pool instead of inline
    pub async_analysis: bool,
    pub pool_size: usize,
    pub queue_capacity: usize,
    pub overflow_policy: OverflowPolicy,
    /// Functions permitted on columns in WHERE clauses
    pub where_function_allow_list: Vec<String>,
    pub rules: RuleToggles,
    pub cache: CacheConfig,
}

impl Default for SqlScopeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_rate: 1.0,
            threshold_ms: 100,
            explain_all: false,
            async_analysis: true,
            pool_size: 2,
            queue_capacity: 100,
            overflow_policy: OverflowPolicy::default(),
            where_function_allow_list: Vec::new(),
            rules: RuleToggles::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl SqlScopeConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(path = %path.display(), "loaded sqlscope config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.sample_rate) {
            return Err(ConfigError::invalid(
                "sample-rate",
                format!("{} is outside [0, 1]", self.sample_rate),
            ));
        }
        if self.pool_size == 0 {
            return Err(ConfigError::invalid("pool-size", "must be at least 1"));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::invalid("queue-capacity", "must be at least 1"));
        }
        self.cache.resolve()?;
        Ok(())
    }

    /// The allow-list, trimmed and upper-cased
    pub fn allowed_functions(&self) -> Vec<String> {
        self.where_function_allow_list
            .iter()
            .map(|name| name.trim().to_uppercase())
            .filter(|name| !name.is_empty())
            .collect()
    }
}

/// What `observe` does when the analysis queue is full
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Log a warning and drop the analysis; the host call is unaffected
    #[default]
    Log,
    /// Return the overflow error to the host
    Propagate,
}

/// Toggles for the dialect-agnostic rule families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RuleToggles {
    pub select: bool,
    pub where_clause: bool,
    pub join: bool,
    pub limit: bool,
    pub common: bool,
}

impl Default for RuleToggles {
    fn default() -> Self {
        Self {
            select: true,
            where_clause: true,
            join: true,
            limit: true,
            common: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CacheConfig {
    pub enabled: bool,
    /// Compact `maximumSize=N,expireAfterWrite=1h,recordStats` form; wins over
    /// the individual keys when non-empty
    pub spec: String,
    pub max_size: u64,
    pub ttl: String,
    pub record_stats: bool,
    /// Strip comments and collapse whitespace before keying
    pub normalize_key: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            spec: "maximumSize=1000,expireAfterWrite=1h,recordStats".to_string(),
            max_size: 1000,
            ttl: "1h".to_string(),
            record_stats: true,
            normalize_key: false,
        }
    }
}

/// Resolved cache limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSpec {
    pub max_size: usize,
    pub expire_after_write: Option<Duration>,
    pub record_stats: bool,
}

impl CacheConfig {
    pub fn resolve(&self) -> Result<CacheSpec, ConfigError> {
        let spec = if self.spec.trim().is_empty() {
            CacheSpec {
                max_size: self.max_size as usize,
                expire_after_write: if self.ttl.trim().is_empty() {
                    None
                } else {
                    Some(parse_duration(&self.ttl).map_err(|m| ConfigError::invalid("cache.ttl", m))?)
                },
                record_stats: self.record_stats,
            }
        } else {
            parse_cache_spec(&self.spec)?
        };
        if spec.max_size == 0 {
            return Err(ConfigError::invalid("cache", "maximum size must be at least 1"));
        }
        Ok(spec)
    }
}

fn parse_cache_spec(spec: &str) -> Result<CacheSpec, ConfigError> {
    let invalid = |message: String| ConfigError::invalid("cache.spec", message);
    let mut resolved = CacheSpec {
        max_size: 1000,
        expire_after_write: None,
        record_stats: false,
    };

    for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = match part.split_once('=') {
            Some((key, value)) => (key.trim(), Some(value.trim())),
            None => (part, None),
        };
        match (key, value) {
            ("maximumSize", Some(value)) => {
                resolved.max_size = value
                    .parse()
                    .map_err(|_| invalid(format!("maximumSize `{value}` is not a number")))?;
            }
            ("expireAfterWrite", Some(value)) => {
                resolved.expire_after_write = Some(parse_duration(value).map_err(invalid)?);
            }
            ("recordStats", None) => resolved.record_stats = true,
            _ => return Err(invalid(format!("unsupported entry `{part}`"))),
        }
    }
    Ok(resolved)
}

/// Parse `<n><unit>` with unit `ms`, `s`, `m`, `h` or `d`
pub fn parse_duration(text: &str) -> Result<Duration, String> {
    let text = text.trim();
    let split = text
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| format!("duration `{text}` has no unit"))?;
    let (amount, unit) = text.split_at(split);
    let amount: u64 = amount
        .parse()
        .map_err(|_| format!("duration `{text}` has no amount"))?;
    let seconds_per_unit = match unit {
        "ms" => return Ok(Duration::from_millis(amount)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 60 * 60 * 24,
        other => return Err(format!("unknown duration unit `{other}` in `{text}`")),
    };
    amount
        .checked_mul(seconds_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration `{text}` is too large"))
}
