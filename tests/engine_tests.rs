//! End-to-end tests for the search pipeline over scripted mock sources:
//! fan-out and tier widening, cross-source merging, topic gating, ranking,
//! pagination, and enrichment hooks. No test touches the network.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;

use litscout::config::Tuning;
use litscout::enrich::{CitationInfo, CitationMetrics, Enrichers, StaticAffinity};
use litscout::models::{
    ExposureMatch, PublicationRecord, RankedPage, RecordBuilder, SearchRequest, SortBy, SourceId,
};
use litscout::query::build_plan;
use litscout::search::{SearchEngine, SearchError};
use litscout::sources::mock::{make_record, MockSource};
use litscout::sources::{Source, SourceCapabilities, SourceError, SourceRegistry, SourceResponse};
use litscout::utils::{MemoryCache, NoopCache, QueryCache};

/// Engine over the given mocks with no caching or enrichment.
fn engine_of(sources: &[&Arc<MockSource>]) -> SearchEngine {
    engine_with(sources, Arc::new(NoopCache), Enrichers::none())
}

/// Engine over the given mocks with an explicit cache and enrichers.
/// Run with `RUST_LOG=litscout=debug` to see the pipeline's own logs.
fn engine_with(
    sources: &[&Arc<MockSource>],
    cache: Arc<dyn QueryCache>,
    enrichers: Enrichers,
) -> SearchEngine {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let mut registry = SourceRegistry::empty();
    for source in sources {
        registry.register(Arc::clone(source) as Arc<dyn Source>);
    }
    SearchEngine::with_parts(registry, cache, enrichers, Tuning::default())
}

fn cited(id: &str, title: &str, source: SourceId, citations: u32) -> PublicationRecord {
    RecordBuilder::new(id, title, format!("http://example.com/{}", id), source)
        .citation_count(citations)
        .build()
}

fn ids(page: &RankedPage) -> Vec<String> {
    page.items.iter().map(|s| s.record.id.clone()).collect()
}

/// The same request against the same sources ranks identically every time,
/// even when every record is fetched fresh.
#[tokio::test]
async fn test_ranked_output_is_deterministic() {
    let pubmed = Arc::new(MockSource::new("pubmed"));
    pubmed.set_records(vec![
        cited("d1", "Migraine trigger diary study", SourceId::PubMed, 12),
        cited("d2", "Migraine aura imaging findings", SourceId::PubMed, 180),
        cited("d3", "Migraine comorbidity survey", SourceId::PubMed, 40),
    ]);
    let openalex = Arc::new(MockSource::new("openalex"));
    openalex.set_records(vec![
        cited("d4", "Migraine genetics consortium report", SourceId::OpenAlex, 95),
        cited("d5", "Migraine prevalence estimates", SourceId::OpenAlex, 7),
    ]);
    let engine = engine_of(&[&pubmed, &openalex]);

    let first = engine.search(&SearchRequest::new("migraine")).await.unwrap();
    let second = engine.search(&SearchRequest::new("migraine")).await.unwrap();

    assert_eq!(first.total_count, 5);
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(pubmed.call_count(), 2);
}

/// The same paper surfaced by two sources collapses into one record that
/// keeps the richer metadata and backfills the rest.
#[tokio::test]
async fn test_cross_source_duplicates_merge() {
    let pubmed = Arc::new(MockSource::new("pubmed"));
    pubmed.set_records(vec![RecordBuilder::new(
        "1111",
        "Aspirin for Migraine Prevention",
        "https://pubmed.ncbi.nlm.nih.gov/1111/",
        SourceId::PubMed,
    )
    .abstract_text("Aspirin reduced attack frequency in adults.")
    .journal("Headache")
    .published(2021, 4, 1)
    .doi("10.1234/asp.1")
    .major_subjects(vec!["Migraine Disorders".to_string()])
    .build()]);
    let openalex = Arc::new(MockSource::new("openalex"));
    openalex.set_records(vec![RecordBuilder::new(
        "W22",
        "Aspirin for migraine prevention",
        "https://openalex.org/W22",
        SourceId::OpenAlex,
    )
    .doi("10.1234/ASP.1")
    .citation_count(77)
    .build()]);
    let engine = engine_of(&[&pubmed, &openalex]);

    let page = engine.search(&SearchRequest::new("migraine")).await.unwrap();

    assert_eq!(page.total_count, 1);
    let merged = &page.items[0].record;
    assert_eq!(merged.id, "1111");
    assert_eq!(merged.source, SourceId::PubMed);
    assert_eq!(merged.citation_count, Some(77));
    assert!(!merged.abstract_text.is_empty());
    assert_eq!(page.source_counts.get("pubmed"), Some(&1));
    assert!(page.source_counts.get("openalex").is_none());
}

/// A pasted title resolves to the exact paper ahead of partial matches.
#[tokio::test]
async fn test_pasted_title_ranks_exact_match_first() {
    let pasted = "Aerobic Exercise for Reducing Migraine Burden: A Systematic Review";
    let pubmed = Arc::new(MockSource::new("pubmed"));
    pubmed.set_records(vec![
        make_record(
            "partial",
            "Reducing migraine burden with aerobic exercise in adults",
            SourceId::PubMed,
        ),
        make_record("exact", pasted, SourceId::PubMed),
    ]);
    let engine = engine_of(&[&pubmed]);

    let page = engine.search(&SearchRequest::new(pasted)).await.unwrap();

    assert_eq!(page.total_count, 2);
    assert_eq!(page.items[0].record.id, "exact");
    assert!(page.items[0].relevance > 0.99);
    assert_eq!(page.items[1].record.id, "partial");
}

/// Records that only mention the topic in passing are gated out entirely.
#[tokio::test]
async fn test_abstract_only_mentions_are_gated_out() {
    let pubmed = Arc::new(MockSource::new("pubmed"));
    pubmed.set_records(vec![
        make_record("hit", "Migraine prevalence in Europe", SourceId::PubMed),
        RecordBuilder::new(
            "miss",
            "Chronic pain management strategies",
            "http://example.com/miss",
            SourceId::PubMed,
        )
        .abstract_text("Patients with migraine were excluded from enrollment.")
        .build(),
    ]);
    let engine = engine_of(&[&pubmed]);

    let page = engine.search(&SearchRequest::new("migraine")).await.unwrap();

    assert_eq!(page.total_count, 1);
    assert_eq!(page.items[0].record.id, "hit");
}

/// One absurdly cited record cannot flatten scoring for the rest of the
/// batch: the p95 denominator comes from the moderate records.
#[tokio::test]
async fn test_citation_outlier_does_not_crush_moderate_records() {
    let pubmed = Arc::new(MockSource::new("pubmed"));
    let mut records: Vec<PublicationRecord> = (0u32..24)
        .map(|i| {
            cited(
                &format!("p{}", i),
                &format!("Migraine cohort {}", i),
                SourceId::PubMed,
                i % 11,
            )
        })
        .collect();
    records.push(cited("viral", "Migraine cohort landmark", SourceId::PubMed, 1_000_000));
    pubmed.set_records(records);
    let engine = engine_of(&[&pubmed]);

    let page = engine
        .search(&SearchRequest::new("migraine").page_size(100))
        .await
        .unwrap();

    assert_eq!(page.total_count, 25);
    let score_of = |id: &str| {
        page.items
            .iter()
            .find(|s| s.record.id == id)
            .map(|s| s.citation_score)
            .unwrap()
    };
    // Ten citations already saturates; the million-citation paper gains
    // nothing beyond that and the low-cited papers keep their spread.
    assert!(score_of("viral") > 0.999);
    assert!((score_of("p10") - score_of("viral")).abs() < 1e-9);
    assert!(score_of("p1") > 0.25);
    assert!(score_of("p10") - score_of("p1") > 0.3);
}

/// With equal topical relevance, the heavily cited record ranks first.
#[tokio::test]
async fn test_higher_cited_record_wins_at_equal_relevance() {
    let pubmed = Arc::new(MockSource::new("pubmed"));
    pubmed.set_records(vec![
        cited("modest", "Diabetes management overview", SourceId::PubMed, 50),
        cited("landmark", "Diabetes management guidelines", SourceId::PubMed, 5000),
    ]);
    let engine = engine_of(&[&pubmed]);

    let page = engine.search(&SearchRequest::new("diabetes")).await.unwrap();

    assert_eq!(ids(&page), vec!["landmark", "modest"]);
    assert!(page.items[0].citation_score > 0.999);
    assert!(page.items[0].final_score > page.items[1].final_score);
}

/// One failing source degrades to the healthy ones instead of erroring.
#[tokio::test]
async fn test_failed_source_degrades_gracefully() {
    let pubmed = Arc::new(MockSource::new("pubmed"));
    pubmed.push_error(SourceError::Network("connection reset".to_string()));
    let openalex = Arc::new(MockSource::new("openalex"));
    openalex.set_records(vec![make_record(
        "o1",
        "Migraine genetics consortium report",
        SourceId::OpenAlex,
    )]);
    let engine = engine_of(&[&pubmed, &openalex]);

    let page = engine.search(&SearchRequest::new("migraine")).await.unwrap();

    assert_eq!(page.total_count, 1);
    assert_eq!(page.items[0].record.id, "o1");
    assert!(page.source_counts.get("pubmed").is_none());
}

/// Sources that return nothing yield an empty page; sources that all fail
/// yield a retryable error. The two outcomes never blur.
#[tokio::test]
async fn test_empty_and_failed_are_distinguishable() {
    let quiet_a = Arc::new(MockSource::new("pubmed"));
    let quiet_b = Arc::new(MockSource::new("openalex"));
    let engine = engine_of(&[&quiet_a, &quiet_b]);
    let page = engine.search(&SearchRequest::new("migraine")).await.unwrap();
    assert_eq!(page.total_count, 0);
    assert!(page.items.is_empty());
    assert!(!page.has_more);

    let broken_a = Arc::new(MockSource::new("pubmed"));
    broken_a.push_error(SourceError::Network("dns failure".to_string()));
    let broken_b = Arc::new(MockSource::new("openalex"));
    broken_b.push_error(SourceError::RateLimit);
    let engine = engine_of(&[&broken_a, &broken_b]);
    let err = engine.search(&SearchRequest::new("migraine")).await.unwrap_err();
    assert!(matches!(err, SearchError::AllSourcesFailed));
    assert!(err.is_retryable());
}

/// A narrow strict tier triggers the widened tier on the boolean-capable
/// source, and both tiers merge with the plain-text fan-out.
#[tokio::test]
async fn test_tiered_widening_merges_both_tiers() {
    let primary = Arc::new(
        MockSource::new("pubmed")
            .with_capabilities(SourceCapabilities::SEARCH | SourceCapabilities::BOOLEAN_QUERY),
    );
    let tier1: Vec<PublicationRecord> = ["alpha", "beta", "gamma"]
        .iter()
        .map(|tag| {
            make_record(
                &format!("t1-{}", tag),
                &format!("Mold exposure and migraine cohort {}", tag),
                SourceId::PubMed,
            )
        })
        .collect();
    primary.push_response(SourceResponse::new(tier1).with_total(3));
    let tier2: Vec<PublicationRecord> = (0..40)
        .map(|i| {
            make_record(
                &format!("t2-{}", i),
                &format!("Mold exposure and migraine trial {}", i),
                SourceId::PubMed,
            )
        })
        .collect();
    primary.push_response(SourceResponse::new(tier2));
    let secondary = Arc::new(MockSource::new("openalex"));
    secondary.set_records(vec![
        make_record("o1", "Mold exposure and migraine survey one", SourceId::OpenAlex),
        make_record("o2", "Mold exposure and migraine survey two", SourceId::OpenAlex),
    ]);
    let engine = engine_of(&[&primary, &secondary]);

    let query = "migraine and mold exposure";
    let page = engine
        .search(&SearchRequest::new(query).page_size(100))
        .await
        .unwrap();

    let plan = build_plan(query);
    let calls = primary.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].text, plan.primary_tier1);
    assert_eq!(calls[1].text, plan.primary_tier2);
    assert_eq!(secondary.calls()[0].text, plan.broad_text);

    assert_eq!(page.total_count, 45);
    let returned: HashSet<String> = ids(&page).into_iter().collect();
    assert!(returned.contains("t1-alpha"));
    assert!(returned.contains("t2-39"));
    assert!(returned.contains("o1"));
}

/// When strong matches are thin, weak-exposure records are appended after
/// them rather than interleaved.
#[tokio::test]
async fn test_weak_exposure_fallback_appended_after_main() {
    let weak_abstract = "This prospective cohort followed adults living in rental \
        apartments across three winters, recording attack diaries, indoor humidity, \
        and ventilation habits. Participants logged headache days weekly and \
        documented visible dampness in living areas. Statistical models adjusted \
        for season, income, and building age. A secondary questionnaire item asked \
        about perceived mold exposure at home.";
    let pubmed = Arc::new(MockSource::new("pubmed"));
    pubmed.set_records(vec![
        make_record("s1", "Mold exposure and migraine: a cohort analysis", SourceId::PubMed),
        make_record("s2", "Mold exposure and migraine risk in adults", SourceId::PubMed),
        RecordBuilder::new(
            "w1",
            "Migraine burden in damp housing cohort one",
            "http://example.com/w1",
            SourceId::PubMed,
        )
        .abstract_text(weak_abstract)
        .build(),
        RecordBuilder::new(
            "w2",
            "Migraine burden in damp housing cohort two",
            "http://example.com/w2",
            SourceId::PubMed,
        )
        .abstract_text(weak_abstract)
        .build(),
    ]);
    let engine = engine_of(&[&pubmed]);

    let page = engine
        .search(&SearchRequest::new("migraine and mold exposure"))
        .await
        .unwrap();

    assert_eq!(ids(&page), vec!["s1", "s2", "w1", "w2"]);
    assert_eq!(page.items[0].exposure, ExposureMatch::Strong);
    assert_eq!(page.items[1].exposure, ExposureMatch::Strong);
    assert_eq!(page.items[2].exposure, ExposureMatch::Weak);
    assert_eq!(page.items[3].exposure, ExposureMatch::Weak);
}

/// Successive pages tile the ranked set without gaps or duplicates, and the
/// whole walk costs a single upstream fetch.
#[tokio::test]
async fn test_pages_concatenate_without_gaps_or_duplicates() {
    let pubmed = Arc::new(MockSource::new("pubmed"));
    pubmed.set_records(
        (0u32..12)
            .map(|i| {
                cited(
                    &format!("r{}", i),
                    &format!("Migraine cohort {}", i),
                    SourceId::PubMed,
                    (i + 1) * 50,
                )
            })
            .collect(),
    );
    let engine = engine_with(&[&pubmed], Arc::new(MemoryCache::new(300)), Enrichers::none());

    let mut seen: Vec<String> = Vec::new();
    for page_no in 1usize..=3 {
        let page = engine
            .search(&SearchRequest::new("migraine").page(page_no).page_size(5))
            .await
            .unwrap();
        assert_eq!(page.total_count, 12);
        assert_eq!(page.page, page_no);
        assert_eq!(page.has_more, page_no < 3);
        seen.extend(ids(&page));
    }

    let expected: Vec<String> = (0..12).rev().map(|i| format!("r{}", i)).collect();
    assert_eq!(seen, expected);
    assert_eq!(pubmed.call_count(), 1);
}

/// A caller profile lifts its known-relevant record over an otherwise
/// tied one; without the profile the tie stands.
#[tokio::test]
async fn test_affinity_profile_reorders_ties() {
    let pubmed = Arc::new(MockSource::new("pubmed"));
    pubmed.set_records(vec![
        make_record("m1", "Migraine study alpha", SourceId::PubMed),
        make_record("m2", "Migraine study beta", SourceId::PubMed),
    ]);
    let affinity = StaticAffinity::new().set("alice", "m2", 1.0);
    let engine = engine_with(
        &[&pubmed],
        Arc::new(NoopCache),
        Enrichers::none().with_affinity(Arc::new(affinity)),
    );

    let plain = engine.search(&SearchRequest::new("migraine")).await.unwrap();
    assert_eq!(ids(&plain), vec!["m1", "m2"]);
    assert!(plain.items[0].match_score.abs() < 1e-9);

    let personal = engine
        .search(&SearchRequest::new("migraine").profile("alice"))
        .await
        .unwrap();
    assert_eq!(ids(&personal), vec!["m2", "m1"]);
    assert!(personal.items[0].match_score > 0.999);
}

/// Date sort puts newest first and undated records last.
#[tokio::test]
async fn test_date_sort_newest_first() {
    let pubmed = Arc::new(MockSource::new("pubmed"));
    pubmed.set_records(vec![
        RecordBuilder::new(
            "mid",
            "Migraine care survey",
            "http://example.com/mid",
            SourceId::PubMed,
        )
        .published(2019, 5, 1)
        .build(),
        RecordBuilder::new(
            "new",
            "Migraine care update",
            "http://example.com/new",
            SourceId::PubMed,
        )
        .published(2023, 5, 1)
        .build(),
        make_record("undated", "Migraine care notes", SourceId::PubMed),
    ]);
    let engine = engine_of(&[&pubmed]);

    let page = engine
        .search(&SearchRequest::new("migraine").sort(SortBy::Date))
        .await
        .unwrap();

    assert_eq!(ids(&page), vec!["new", "mid", "undated"]);
}

/// Recency-seeking queries reward the newer of two equal matches.
#[tokio::test]
async fn test_recent_query_prefers_newer_records() {
    let pubmed = Arc::new(MockSource::new("pubmed"));
    pubmed.set_records(vec![
        RecordBuilder::new(
            "older",
            "Migraine treatments reviewed",
            "http://example.com/older",
            SourceId::PubMed,
        )
        .published(2012, 3, 1)
        .build(),
        RecordBuilder::new(
            "recent",
            "Migraine treatments compared",
            "http://example.com/recent",
            SourceId::PubMed,
        )
        .published(2024, 3, 1)
        .build(),
    ]);
    let engine = engine_of(&[&pubmed]);

    let page = engine
        .search(&SearchRequest::new("latest migraine treatments"))
        .await
        .unwrap();

    assert_eq!(ids(&page), vec!["recent", "older"]);
    assert!(page.items[0].recency > page.items[1].recency);
}

/// Metrics stub returning a fixed map regardless of input.
#[derive(Debug)]
struct FixedMetrics(HashMap<String, CitationInfo>);

#[async_trait]
impl CitationMetrics for FixedMetrics {
    async fn metrics_for(
        &self,
        _records: &[PublicationRecord],
    ) -> Result<HashMap<String, CitationInfo>, SourceError> {
        Ok(self.0.clone())
    }
}

/// A metrics provider's citation counts override what the sources reported.
#[tokio::test]
async fn test_metrics_provider_overrides_source_counts() {
    let pubmed = Arc::new(MockSource::new("pubmed"));
    pubmed.set_records(vec![
        cited("m1", "Migraine prophylaxis trial", SourceId::PubMed, 4000),
        cited("m2", "Migraine prophylaxis cohort", SourceId::PubMed, 3),
    ]);
    let mut metrics = HashMap::new();
    metrics.insert(
        "m2".to_string(),
        CitationInfo { citation_count: Some(5000), influence_metric: None },
    );
    let engine = engine_with(
        &[&pubmed],
        Arc::new(NoopCache),
        Enrichers::none().with_metrics(Arc::new(FixedMetrics(metrics))),
    );

    let page = engine.search(&SearchRequest::new("migraine")).await.unwrap();

    assert_eq!(ids(&page), vec!["m2", "m1"]);
    assert_eq!(page.items[0].record.citation_count, Some(5000));
}

/// An identifier query resolves through lookup and never runs a search.
#[tokio::test]
async fn test_identifier_query_skips_search() {
    let resolver = Arc::new(
        MockSource::new("openalex").with_capabilities(
            SourceCapabilities::SEARCH | SourceCapabilities::IDENTIFIER_LOOKUP,
        ),
    );
    resolver.set_lookup_records(vec![RecordBuilder::new(
        "W123",
        "Association of Migraine With Stroke Risk",
        "https://openalex.org/W123",
        SourceId::OpenAlex,
    )
    .doi("10.1001/jama.2020.1585")
    .published(2020, 6, 1)
    .build()]);
    let engine = engine_of(&[&resolver]);

    let page = engine
        .search(&SearchRequest::new("10.1001/jama.2020.1585"))
        .await
        .unwrap();

    assert_eq!(page.total_count, 1);
    assert_eq!(page.items[0].record.id, "W123");
    assert!((page.items[0].relevance - 1.0).abs() < 1e-9);
    assert_eq!(resolver.call_count(), 0);
}
