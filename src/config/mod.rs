//! Configuration management.

pub mod tuning;

pub use tuning::Tuning;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API keys and contact details for upstream services
    #[serde(default)]
    pub api_keys: ApiKeys,

    /// Which source adapters to register
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Ranked-result caching
    #[serde(default)]
    pub cache: CacheConfig,

    /// Rate limiting settings
    #[serde(default)]
    pub rate_limits: RateLimitConfig,

    /// Retrieval and ranking policy values
    #[serde(default)]
    pub tuning: Tuning,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_keys: ApiKeys::default(),
            sources: SourcesConfig::default(),
            cache: CacheConfig::default(),
            rate_limits: RateLimitConfig::default(),
            tuning: Tuning::default(),
        }
    }
}

/// API keys for external services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeys {
    /// NCBI API key (optional, raises the E-utilities rate limit)
    #[serde(default)]
    pub ncbi: Option<String>,

    /// Semantic Scholar API key (optional, for higher rate limits)
    #[serde(default)]
    pub semantic_scholar: Option<String>,

    /// Contact email sent to services that ask for one (OpenAlex polite pool)
    #[serde(default)]
    pub contact_email: Option<String>,
}

impl Default for ApiKeys {
    fn default() -> Self {
        Self {
            ncbi: std::env::var("NCBI_API_KEY").ok(),
            semantic_scholar: std::env::var("SEMANTIC_SCHOLAR_API_KEY").ok(),
            contact_email: std::env::var("LITSCOUT_CONTACT_EMAIL").ok(),
        }
    }
}

/// Which source adapters are registered at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_true")]
    pub pubmed: bool,

    #[serde(default = "default_true")]
    pub openalex: bool,

    #[serde(default = "default_true")]
    pub semantic_scholar: bool,

    #[serde(default = "default_true")]
    pub biorxiv: bool,

    #[serde(default = "default_true")]
    pub medrxiv: bool,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            pubmed: true,
            openalex: true,
            semantic_scholar: true,
            biorxiv: true,
            medrxiv: true,
        }
    }
}

/// Caching of ranked result sets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether caching is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// How long a ranked result set stays valid
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: default_cache_ttl(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cache_ttl() -> u64 {
    900
}

/// Per-source request budgets (requests per second)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// NCBI E-utilities allow 3 rps without an API key, 10 with one
    #[serde(default = "default_pubmed_rps")]
    pub pubmed_rps: u32,

    #[serde(default = "default_openalex_rps")]
    pub openalex_rps: u32,

    #[serde(default = "default_semantic_rps")]
    pub semantic_scholar_rps: u32,

    #[serde(default = "default_preprint_rps")]
    pub biorxiv_rps: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            pubmed_rps: default_pubmed_rps(),
            openalex_rps: default_openalex_rps(),
            semantic_scholar_rps: default_semantic_rps(),
            biorxiv_rps: default_preprint_rps(),
        }
    }
}

fn default_pubmed_rps() -> u32 {
    3
}

fn default_openalex_rps() -> u32 {
    10
}

fn default_semantic_rps() -> u32 {
    1
}

fn default_preprint_rps() -> u32 {
    1
}

/// Load configuration from a file, with environment overrides
pub fn load_config(path: &PathBuf) -> Result<Config, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path.as_path()))
        .add_source(config::Environment::with_prefix("LITSCOUT"))
        .build()?;

    settings.try_deserialize()
}

/// Get the default configuration (from env vars or defaults)
pub fn get_config() -> Config {
    Config::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.sources.pubmed);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl_seconds, 900);
        assert_eq!(config.rate_limits.pubmed_rps, 3);
    }

    #[test]
    fn test_default_tuning() {
        let tuning = Tuning::default();
        assert_eq!(tuning.relevance_floor_primary, 0.35);
        assert_eq!(tuning.relevance_floor_secondary, 0.25);
        assert_eq!(tuning.relevance_floor_preprint, 0.40);
        assert_eq!(tuning.widen_threshold, 20);
        assert_eq!(tuning.citation_percentile, 0.95);
        assert!(tuning.per_source_limit_multi > tuning.per_source_limit);
    }
}
