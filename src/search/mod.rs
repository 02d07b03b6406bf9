//! Search orchestration: one request in, one ranked page out.
//!
//! The topical pipeline is retrieve, dedup, gate, score, rank, paginate.
//! Identifier queries skip the topical stages and resolve directly
//! against lookup-capable sources. Ranked batches are cached whole and
//! pages are sliced out per request, so changing the page number never
//! re-runs retrieval; the page-window enrichments (plain summaries, read
//! flags) run on the slice only.

mod gate;
mod rank;
mod relevance;
mod retrieval;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use crate::config::{Config, Tuning};
use crate::enrich::Enrichers;
use crate::models::{
    ExposureMatch, Identifier, PublicationRecord, QueryKind, QueryPlan, RankedBatch, RankedPage,
    ScoredRecord, SearchRequest, SortBy,
};
use crate::query::build_plan;
use crate::sources::{SemanticScholarSource, SourceError, SourceRegistry};
use crate::utils::{merge_duplicates, query_signature, CacheResult, MemoryCache, NoopCache, QueryCache};

/// Errors a search can surface to the caller.
///
/// Degraded outcomes (a source down, metrics unavailable) are not errors;
/// they produce a poorer ranked page and a warning in the logs.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The query was empty or whitespace
    #[error("query is empty")]
    EmptyQuery,

    /// No source with the needed capability is enabled
    #[error("no sources are enabled")]
    NoSources,

    /// Every queried source failed, so an empty result would be
    /// indistinguishable from a real "no matches"
    #[error("all sources failed")]
    AllSourcesFailed,
}

impl SearchError {
    /// Whether retrying the same request later could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, SearchError::AllSourcesFailed)
    }
}

/// Multi-source publication search engine.
///
/// Holds the source registry, the ranked-batch cache, and the optional
/// enrichment providers. One engine serves many concurrent searches.
#[derive(Debug)]
pub struct SearchEngine {
    registry: SourceRegistry,
    cache: Arc<dyn QueryCache>,
    enrichers: Enrichers,
    tuning: Tuning,
}

impl SearchEngine {
    /// Build an engine from configuration: sources per the enabled set,
    /// cache per the cache settings, and Semantic Scholar wired in as the
    /// citation-metrics provider when that source is enabled.
    pub fn new(config: &Config) -> Result<Self, SourceError> {
        let registry = SourceRegistry::from_config(config)?;
        let cache: Arc<dyn QueryCache> = if config.cache.enabled {
            Arc::new(MemoryCache::new(config.cache.ttl_seconds))
        } else {
            Arc::new(NoopCache)
        };
        let mut enrichers = Enrichers::none();
        if config.sources.semantic_scholar {
            enrichers = enrichers.with_metrics(Arc::new(SemanticScholarSource::new(config)?));
        }
        Ok(Self { registry, cache, enrichers, tuning: config.tuning.clone() })
    }

    /// Build an engine from explicit parts
    pub fn with_parts(
        registry: SourceRegistry,
        cache: Arc<dyn QueryCache>,
        enrichers: Enrichers,
        tuning: Tuning,
    ) -> Self {
        Self { registry, cache, enrichers, tuning }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Run one search request through the full pipeline.
    pub async fn search(&self, request: &SearchRequest) -> Result<RankedPage, SearchError> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let signature = query_signature(request);
        if let CacheResult::Hit(batch) = self.cache.get(&signature) {
            tracing::debug!(signature = %signature, "serving ranked batch from cache");
            return Ok(self.finish_page(&batch, request).await);
        }

        let plan = build_plan(query);
        tracing::debug!(
            query = %plan.raw,
            multi = plan.is_multi_concept(),
            tier1 = %plan.primary_tier1,
            "built retrieval plan"
        );

        let batch = match &plan.intent.kind {
            QueryKind::Identifier(id) => self.lookup_batch(id).await?,
            _ => self.search_batch(&plan, request).await?,
        };

        self.cache.set(&signature, &batch);
        Ok(self.finish_page(&batch, request).await)
    }

    /// Topical path: gather, merge, gate, score, rank.
    async fn search_batch(
        &self,
        plan: &QueryPlan,
        request: &SearchRequest,
    ) -> Result<RankedBatch, SearchError> {
        let raw = retrieval::gather(&self.registry, plan, request, &self.tuning).await?;
        if raw.is_empty() {
            tracing::info!(query = %plan.raw, "no records from any source");
            return Ok(RankedBatch::empty());
        }

        let merged = merge_duplicates(raw);
        let gated = gate::partition(merged, plan);

        let mut main: Vec<ScoredRecord> = gated
            .main
            .into_iter()
            .filter_map(|(record, exposure)| self.score_one(record, plan, exposure, request))
            .collect();

        // decided before ranking, against the gated size
        let append_fallback =
            main.len() < self.tuning.fallback_threshold && !gated.fallback.is_empty();
        let mut fallback: Vec<ScoredRecord> = if append_fallback {
            gated
                .fallback
                .into_iter()
                .filter_map(|record| self.score_one(record, plan, ExposureMatch::Weak, request))
                .collect()
        } else {
            Vec::new()
        };

        self.apply_citation_metrics(&mut main).await;
        self.apply_citation_metrics(&mut fallback).await;

        let as_of = Utc::now().date_naive();
        let wants_recent = plan.intent.wants_recent;
        rank::rank(&mut main, wants_recent, self.tuning.citation_percentile, as_of);
        if !fallback.is_empty() {
            // ranked separately so no weak-exposure record outranks a
            // strong one
            rank::rank(&mut fallback, wants_recent, self.tuning.citation_percentile, as_of);
            tracing::info!(
                main = main.len(),
                fallback = fallback.len(),
                "thin result set, appending weak-exposure fallback"
            );
            main.extend(fallback);
        }

        if matches!(request.sort, SortBy::Date) {
            rank::sort_by_date(&mut main);
        }

        Ok(batch_of(main))
    }

    /// Identifier path: resolve against lookup-capable sources in id
    /// order, first resolver wins. A definite "not found" from a source
    /// counts as a successful answer.
    async fn lookup_batch(&self, id: &Identifier) -> Result<RankedBatch, SearchError> {
        let resolvers = self.registry.lookup_capable();
        if resolvers.is_empty() {
            return Err(SearchError::NoSources);
        }

        let mut records: Vec<PublicationRecord> = Vec::new();
        let mut any_success = false;
        for source in resolvers {
            match source.lookup(id).await {
                Ok(found) => {
                    any_success = true;
                    if !found.is_empty() {
                        tracing::debug!(
                            source = source.id(),
                            count = found.len(),
                            "identifier resolved"
                        );
                        records.extend(found);
                        break;
                    }
                }
                Err(SourceError::NotFound(_)) | Err(SourceError::NotImplemented) => {
                    any_success = true;
                }
                Err(error) => {
                    tracing::warn!(source = source.id(), %error, "identifier lookup failed");
                }
            }
        }
        if !any_success {
            return Err(SearchError::AllSourcesFailed);
        }

        let mut scored: Vec<ScoredRecord> = merge_duplicates(records)
            .into_iter()
            .map(|record| {
                let mut item = ScoredRecord::new(record);
                // an exact identifier match is maximally relevant
                item.relevance = 1.0;
                item
            })
            .collect();

        self.apply_citation_metrics(&mut scored).await;
        rank::rank(&mut scored, false, self.tuning.citation_percentile, Utc::now().date_naive());

        Ok(batch_of(scored))
    }

    /// Score one gated record; drops it when below its source-class floor.
    fn score_one(
        &self,
        record: PublicationRecord,
        plan: &QueryPlan,
        exposure: ExposureMatch,
        request: &SearchRequest,
    ) -> Option<ScoredRecord> {
        let outcome = relevance::score_record(&record, plan, exposure);
        if !relevance::passes_floor(&outcome, &record, &self.tuning) {
            tracing::debug!(
                title = %record.title,
                relevance = outcome.relevance,
                "below relevance floor"
            );
            return None;
        }

        let match_score = self.affinity_for(&record, request);
        let mut scored = ScoredRecord::new(record);
        scored.relevance = outcome.relevance;
        scored.title_strength = outcome.title_strength;
        scored.exposure = exposure;
        scored.match_score = match_score;
        Some(scored)
    }

    fn affinity_for(&self, record: &PublicationRecord, request: &SearchRequest) -> f64 {
        match (&self.enrichers.affinity, &request.profile) {
            (Some(provider), Some(profile)) => provider
                .match_score(profile, record)
                .map_or(0.0, |score| score.clamp(0.0, 1.0)),
            _ => 0.0,
        }
    }

    /// Overwrite citation fields from the metrics provider, when one is
    /// wired. Provider data wins over whatever the source reported.
    async fn apply_citation_metrics(&self, bucket: &mut [ScoredRecord]) {
        let provider = match &self.enrichers.metrics {
            Some(provider) => provider,
            None => return,
        };
        if bucket.is_empty() {
            return;
        }

        let records: Vec<PublicationRecord> = bucket.iter().map(|s| s.record.clone()).collect();
        match provider.metrics_for(&records).await {
            Ok(metrics) => {
                for scored in bucket.iter_mut() {
                    if let Some(info) = metrics.get(scored.record.primary_id()) {
                        if info.citation_count.is_some() {
                            scored.record.citation_count = info.citation_count;
                        }
                        if info.influence_metric.is_some() {
                            scored.record.influence_metric = info.influence_metric;
                        }
                    }
                }
            }
            Err(error) => {
                tracing::warn!(%error, "citation metrics lookup failed, ranking without enrichment");
            }
        }
    }

    /// Slice the requested page and run the page-window enrichments.
    async fn finish_page(&self, batch: &RankedBatch, request: &SearchRequest) -> RankedPage {
        let mut page = batch.page(request.page, request.page_size);

        if let Some(summarizer) = &self.enrichers.summarizer {
            for item in page.items.iter_mut() {
                if item.plain_summary.is_none() {
                    item.plain_summary = summarizer.summarize(&item.record).await;
                }
            }
        }
        if let Some(ledger) = &self.enrichers.read_ledger {
            for item in page.items.iter_mut() {
                item.already_read = ledger.is_read(&item.record);
            }
        }
        page
    }
}

fn batch_of(records: Vec<ScoredRecord>) -> RankedBatch {
    let mut source_counts: HashMap<String, usize> = HashMap::new();
    for scored in &records {
        *source_counts.entry(scored.record.source.id().to_string()).or_default() += 1;
    }
    RankedBatch { records, source_counts }
}
