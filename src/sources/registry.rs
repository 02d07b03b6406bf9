//! Registry for managing source adapters.

use std::collections::HashMap;
use std::sync::Arc;

use super::{
    biorxiv::PreprintSource, openalex::OpenAlexSource, pubmed::PubMedSource,
    semantic::SemanticScholarSource, Source, SourceError,
};
use crate::config::Config;

bitflags::bitflags! {
    /// Capabilities that a source can support
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SourceCapabilities: u32 {
        const SEARCH = 1 << 0;
        /// Understands fielded boolean query syntax (tiered retrieval)
        const BOOLEAN_QUERY = 1 << 1;
        /// Can filter by publication date server-side
        const DATE_FILTER = 1 << 2;
        /// Can resolve publication identifiers (PMID, DOI, ...)
        const IDENTIFIER_LOOKUP = 1 << 3;
        /// Provides citation counts on search results
        const CITATION_METRICS = 1 << 4;
    }
}

/// Registry of all available sources.
///
/// Iteration order is always sorted by source id, so fan-out, merging,
/// and logging are deterministic run to run.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    sources: HashMap<String, Arc<dyn Source>>,
}

impl SourceRegistry {
    /// Create an empty registry
    pub fn empty() -> Self {
        Self { sources: HashMap::new() }
    }

    /// Create a registry with the sources enabled in `config`
    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        let mut registry = Self::empty();

        if config.sources.pubmed {
            registry.register(Arc::new(PubMedSource::new(config)?));
        }
        if config.sources.openalex {
            registry.register(Arc::new(OpenAlexSource::new(config)?));
        }
        if config.sources.semantic_scholar {
            registry.register(Arc::new(SemanticScholarSource::new(config)?));
        }
        if config.sources.biorxiv {
            registry.register(Arc::new(PreprintSource::biorxiv(config)?));
        }
        if config.sources.medrxiv {
            registry.register(Arc::new(PreprintSource::medrxiv(config)?));
        }

        Ok(registry)
    }

    /// Register a source, replacing any existing source with the same id
    pub fn register(&mut self, source: Arc<dyn Source>) {
        self.sources.insert(source.id().to_string(), source);
    }

    /// Get a source by id
    pub fn get(&self, id: &str) -> Option<&Arc<dyn Source>> {
        self.sources.get(id)
    }

    /// Get a source by id, returning an error if not found
    pub fn get_required(&self, id: &str) -> Result<&Arc<dyn Source>, SourceError> {
        self.get(id)
            .ok_or_else(|| SourceError::NotFound(format!("Source '{}' not registered", id)))
    }

    /// All registered sources, sorted by id
    pub fn all(&self) -> Vec<&Arc<dyn Source>> {
        let mut sources: Vec<_> = self.sources.values().collect();
        sources.sort_by(|a, b| a.id().cmp(b.id()));
        sources
    }

    /// All registered source ids, sorted
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<_> = self.sources.keys().map(|s| s.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    /// Sources that support a specific capability, sorted by id
    pub fn with_capability(&self, capability: SourceCapabilities) -> Vec<&Arc<dyn Source>> {
        self.all()
            .into_iter()
            .filter(|s| s.capabilities().contains(capability))
            .collect()
    }

    /// Sources that support search
    pub fn searchable(&self) -> Vec<&Arc<dyn Source>> {
        self.with_capability(SourceCapabilities::SEARCH)
    }

    /// Sources that understand fielded boolean queries
    pub fn boolean_capable(&self) -> Vec<&Arc<dyn Source>> {
        self.with_capability(SourceCapabilities::BOOLEAN_QUERY)
    }

    /// Sources that can resolve publication identifiers
    pub fn lookup_capable(&self) -> Vec<&Arc<dyn Source>> {
        self.with_capability(SourceCapabilities::IDENTIFIER_LOOKUP)
    }

    /// Check if a source exists
    pub fn has(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    /// Number of registered sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::from_config(&Config::default()).unwrap_or_else(|_| Self::empty())
    }
}
