//! Utility modules supporting the search pipeline.
//!
//! - [`merge_duplicates`]: fold duplicate records across sources into one per article
//! - [`HttpClient`]: HTTP client with built-in rate limiting
//! - [`RateLimitedRequestBuilder`]: builder for rate-limited HTTP requests
//! - [`QueryCache`], [`MemoryCache`], [`NoopCache`]: caching of ranked result sets
//! - [`query_signature`]: cache key derivation for a search request
//! - [`RetryConfig`], [`with_retry`]: retry with exponential backoff on transient errors
//! - [`normalize_title`], [`contains_phrase`], [`count_phrase`]: text matching primitives
//!
//! # HTTP client with rate limiting
//!
//! ```rust,no_run
//! use litscout::utils::HttpClient;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new()?.with_rate_limit(3);
//! let response = client.get("https://api.example.com").send().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Retry with backoff
//!
//! ```rust,no_run
//! use litscout::sources::SourceError;
//! use litscout::utils::{source_retry_config, with_retry};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), SourceError> {
//! let body = with_retry(source_retry_config(), || async {
//!     Ok::<_, SourceError>("response".to_string())
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

mod cache;
mod dedup;
mod http;
mod retry;
mod text;

pub use cache::{query_signature, CacheResult, CacheStats, MemoryCache, NoopCache, QueryCache};
pub use dedup::merge_duplicates;
pub use http::{HttpClient, RateLimitedRequestBuilder};
pub use retry::{source_retry_config, with_retry, RetryConfig, TransientError};
pub use text::{
    contains_phrase, content_words, count_phrase, find_phrase, is_stopword, normalize_title,
    phrase_positions, words,
};
