//! Source adapters with a trait-based plugin architecture.
//!
//! This module defines the [`Source`] trait that every upstream adapter
//! implements. New sources are added by implementing the trait and
//! registering them with the [`SourceRegistry`]; sources can be enabled
//! or disabled at runtime through [`SourcesConfig`](crate::config::SourcesConfig)
//! or `LITSCOUT_SOURCES_*` environment variables.
//!
//! Adapters normalize their native schema into [`PublicationRecord`] and
//! drop upstream records that lack a usable title. Transport failures are
//! reported as [`SourceError`]; the retrieval layer decides whether a
//! failed source degrades the response or aborts it.

mod biorxiv;
mod openalex;
mod pubmed;
mod registry;
mod semantic;

pub mod mock;

pub use biorxiv::PreprintSource;
pub use mock::MockSource;
pub use openalex::OpenAlexSource;
pub use pubmed::PubMedSource;
pub use registry::{SourceCapabilities, SourceRegistry};
pub use semantic::SemanticScholarSource;

use crate::models::{DateRange, Identifier, PublicationRecord};
use async_trait::async_trait;

/// The search a single source receives: one query string in whatever
/// dialect the retrieval layer chose for it, plus shared constraints.
#[derive(Debug, Clone)]
pub struct SourceQuery {
    /// Query text: a boolean string for sources that understand one,
    /// plain text for the rest
    pub text: String,

    /// Publication-year window
    pub date_range: DateRange,

    /// Maximum records to return
    pub limit: usize,

    /// Ask the source for newest-first ordering where it supports it
    pub newest_first: bool,
}

impl SourceQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            date_range: DateRange::default(),
            limit: 30,
            newest_first: false,
        }
    }

    pub fn date_range(mut self, range: DateRange) -> Self {
        self.date_range = range;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    pub fn newest_first(mut self, newest_first: bool) -> Self {
        self.newest_first = newest_first;
        self
    }
}

/// What one source returned for one query
#[derive(Debug, Clone, Default)]
pub struct SourceResponse {
    pub records: Vec<PublicationRecord>,

    /// Upstream's own total hit count, when it reports one. This is the
    /// tier-widening signal: it reflects how many records matched, not
    /// how many were returned.
    pub total_count: Option<usize>,
}

impl SourceResponse {
    pub fn new(records: Vec<PublicationRecord>) -> Self {
        Self { records, total_count: None }
    }

    pub fn with_total(mut self, total: usize) -> Self {
        self.total_count = Some(total);
        self
    }

    /// Matched count: upstream's total when reported, else the number
    /// of records actually returned.
    pub fn matched(&self) -> usize {
        self.total_count.unwrap_or(self.records.len())
    }
}

/// The Source trait defines the interface for all upstream adapters.
///
/// # Implementing a New Source
///
/// 1. Create a struct that implements `Source`
/// 2. Implement `id`, `name`, and `search`
/// 3. Declare capabilities so retrieval knows which query dialect to send
/// 4. Register it with [`SourceRegistry`]
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this source (registry key, e.g. "pubmed")
    fn id(&self) -> &str;

    /// Human-readable name of this source
    fn name(&self) -> &str;

    /// Describe the capabilities of this source
    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
    }

    /// Whether this source supports search
    fn supports_search(&self) -> bool {
        self.capabilities().contains(SourceCapabilities::SEARCH)
    }

    /// Whether this source understands fielded boolean query syntax
    fn supports_boolean(&self) -> bool {
        self.capabilities().contains(SourceCapabilities::BOOLEAN_QUERY)
    }

    /// Whether this source can filter by publication date server-side
    fn supports_date_filter(&self) -> bool {
        self.capabilities().contains(SourceCapabilities::DATE_FILTER)
    }

    /// Whether this source can resolve publication identifiers
    fn supports_lookup(&self) -> bool {
        self.capabilities().contains(SourceCapabilities::IDENTIFIER_LOOKUP)
    }

    /// Search for records matching the query
    async fn search(&self, _query: &SourceQuery) -> Result<SourceResponse, SourceError> {
        Err(SourceError::NotImplemented)
    }

    /// Resolve a publication identifier to its record(s)
    async fn lookup(&self, _id: &Identifier) -> Result<Vec<PublicationRecord>, SourceError> {
        Err(SourceError::NotImplemented)
    }
}

/// Errors that can occur when interacting with a source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The requested operation is not implemented for this source
    #[error("Operation not implemented for this source")]
    NotImplemented,

    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(String),

    /// Parsing error (XML, JSON)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimit,

    /// Record or source not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// API error from the source
    #[error("API error: {0}")]
    Api(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Network(format!("request timed out: {}", err))
        } else if err.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS) {
            SourceError::RateLimit
        } else {
            SourceError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}

impl From<quick_xml::DeError> for SourceError {
    fn from(err: quick_xml::DeError) -> Self {
        SourceError::Parse(format!("XML: {}", err))
    }
}
