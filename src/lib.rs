//! # litscout
//!
//! Multi-source search and ranking over the scholarly and clinical
//! literature. One query fans out to PubMed, OpenAlex, Semantic Scholar,
//! bioRxiv, and medRxiv; the merged results are deduplicated, gated for
//! topicality, scored, and returned as one ranked page.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures (PublicationRecord, SearchRequest, ranked results)
//! - [`query`]: Intent detection, concept extraction, and retrieval-plan construction
//! - [`sources`]: Source adapters with an extensible trait-based architecture
//! - [`search`]: The engine: tiered retrieval, gating, scoring, ranking, pagination
//! - [`enrich`]: Optional enrichment hooks (citation metrics, summaries, personalization)
//! - [`utils`]: HTTP client, deduplication, caching, and text matching
//! - [`config`]: Configuration management
//!
//! ## Example
//!
//! ```rust,no_run
//! use litscout::{Config, SearchEngine, SearchRequest};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = SearchEngine::new(&Config::default())?;
//! let page = engine
//!     .search(&SearchRequest::new("migraine prophylaxis in adolescents").years("2018-"))
//!     .await?;
//! for item in &page.items {
//!     println!("{:.3}  {}", item.final_score, item.record.title);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod enrich;
pub mod models;
pub mod query;
pub mod search;
pub mod sources;
pub mod utils;

// Re-export the types most callers need
pub use config::{load_config, Config};
pub use models::{PublicationRecord, RankedPage, ScoredRecord, SearchRequest, SortBy};
pub use search::{SearchEngine, SearchError};
pub use sources::{Source, SourceRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
