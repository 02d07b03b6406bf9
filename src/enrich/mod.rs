//! Enrichment hooks applied around ranking.
//!
//! Three of these run only on the page window after ranking (citation
//! metrics, plain-language summaries, read flags); affinity runs during
//! scoring because the personalization match feeds the composite score.
//! Every hook is optional and every failure degrades to "no enrichment",
//! never to a failed search.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::models::PublicationRecord;
use crate::sources::SourceError;

/// Citation data for one record, fetched from a metrics provider
#[derive(Debug, Clone, Copy, Default)]
pub struct CitationInfo {
    pub citation_count: Option<u32>,
    pub influence_metric: Option<f64>,
}

/// Bulk citation-metrics lookup, keyed by each record's primary id
#[async_trait]
pub trait CitationMetrics: Send + Sync + std::fmt::Debug {
    async fn metrics_for(
        &self,
        records: &[PublicationRecord],
    ) -> Result<HashMap<String, CitationInfo>, SourceError>;
}

/// Plain-language summary generation for a single record
#[async_trait]
pub trait Summarizer: Send + Sync + std::fmt::Debug {
    /// Returns `None` when no summary can be produced
    async fn summarize(&self, record: &PublicationRecord) -> Option<String>;
}

/// Personalization hook: how strongly a record matches a caller profile.
///
/// Scores are 0.0 to 1.0. Returning `None` means the provider knows
/// nothing about this profile/record pair and the match component of the
/// composite score stays zero.
pub trait AffinityProvider: Send + Sync + std::fmt::Debug {
    fn match_score(&self, profile: &str, record: &PublicationRecord) -> Option<f64>;
}

/// Tracks which records the caller has already seen
pub trait ReadLedger: Send + Sync + std::fmt::Debug {
    fn is_read(&self, record: &PublicationRecord) -> bool;
}

/// The enrichment providers a search engine carries. All optional.
#[derive(Debug, Default)]
pub struct Enrichers {
    pub metrics: Option<std::sync::Arc<dyn CitationMetrics>>,
    pub summarizer: Option<std::sync::Arc<dyn Summarizer>>,
    pub affinity: Option<std::sync::Arc<dyn AffinityProvider>>,
    pub read_ledger: Option<std::sync::Arc<dyn ReadLedger>>,
}

impl Enrichers {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_metrics(mut self, metrics: std::sync::Arc<dyn CitationMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_summarizer(mut self, summarizer: std::sync::Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn with_affinity(mut self, affinity: std::sync::Arc<dyn AffinityProvider>) -> Self {
        self.affinity = Some(affinity);
        self
    }

    pub fn with_read_ledger(mut self, ledger: std::sync::Arc<dyn ReadLedger>) -> Self {
        self.read_ledger = Some(ledger);
        self
    }
}

/// In-memory affinity table, mainly for tests and small deployments
#[derive(Debug, Default)]
pub struct StaticAffinity {
    scores: HashMap<(String, String), f64>,
}

impl StaticAffinity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a match score for a (profile, record primary id) pair
    pub fn set(mut self, profile: &str, record_id: &str, score: f64) -> Self {
        self.scores
            .insert((profile.to_string(), record_id.to_string()), score.clamp(0.0, 1.0));
        self
    }
}

impl AffinityProvider for StaticAffinity {
    fn match_score(&self, profile: &str, record: &PublicationRecord) -> Option<f64> {
        self.scores
            .get(&(profile.to_string(), record.primary_id().to_string()))
            .copied()
    }
}

/// In-memory read ledger keyed by record primary id
#[derive(Debug, Default)]
pub struct MemoryReadLedger {
    read: RwLock<HashSet<String>>,
}

impl MemoryReadLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_read(&self, record_id: &str) {
        if let Ok(mut read) = self.read.write() {
            read.insert(record_id.to_string());
        }
    }
}

impl ReadLedger for MemoryReadLedger {
    fn is_read(&self, record: &PublicationRecord) -> bool {
        self.read
            .read()
            .map(|set| set.contains(record.primary_id()))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RecordBuilder, SourceId};

    fn record(id: &str) -> PublicationRecord {
        RecordBuilder::new(id, "Title", "https://example.com", SourceId::PubMed).build()
    }

    #[test]
    fn test_static_affinity() {
        let affinity = StaticAffinity::new()
            .set("cardiology", "123", 0.8)
            .set("cardiology", "456", 1.7);

        assert_eq!(affinity.match_score("cardiology", &record("123")), Some(0.8));
        // scores are clamped into range
        assert_eq!(affinity.match_score("cardiology", &record("456")), Some(1.0));
        assert_eq!(affinity.match_score("oncology", &record("123")), None);
    }

    #[test]
    fn test_memory_read_ledger() {
        let ledger = MemoryReadLedger::new();
        assert!(!ledger.is_read(&record("123")));

        ledger.mark_read("123");
        assert!(ledger.is_read(&record("123")));

        // ledger keys on primary id, which prefers the DOI
        let with_doi = RecordBuilder::new("999", "T", "u", SourceId::OpenAlex)
            .doi("10.1/x")
            .build();
        ledger.mark_read("10.1/x");
        assert!(ledger.is_read(&with_doi));
    }
}
