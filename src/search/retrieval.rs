//! Tiered retrieval and source fan-out.
//!
//! Multi-concept queries run a strict-then-widened pair of fielded
//! queries against the boolean-capable primary source, while every other
//! source gets the plain broad form concurrently. The widened tier is
//! skipped when the strict tier already matched enough volume. A failed
//! source degrades to an empty contribution; only all sources failing
//! aborts the search.

use std::sync::Arc;

use futures_util::future::join_all;

use crate::config::Tuning;
use crate::models::{DateRange, PublicationRecord, QueryPlan, SearchRequest, SortBy};
use crate::sources::{Source, SourceError, SourceQuery, SourceRegistry, SourceResponse};

use super::SearchError;

/// Constraints shared by every branch query in one search.
pub(crate) struct QueryShape {
    limit: usize,
    date_range: DateRange,
    newest_first: bool,
}

impl QueryShape {
    pub(crate) fn new(plan: &QueryPlan, request: &SearchRequest, tuning: &Tuning) -> Self {
        let limit = if plan.is_multi_concept() {
            // gating will thin the batch, so over-fetch
            tuning.per_source_limit_multi
        } else {
            tuning.per_source_limit
        };
        Self {
            limit,
            date_range: request.date_range,
            newest_first: plan.intent.wants_recent || matches!(request.sort, SortBy::Date),
        }
    }

    fn query(&self, text: &str) -> SourceQuery {
        SourceQuery::new(text)
            .date_range(self.date_range)
            .limit(self.limit)
            .newest_first(self.newest_first)
    }
}

/// Collect raw records from every searchable source.
pub(crate) async fn gather(
    registry: &SourceRegistry,
    plan: &QueryPlan,
    request: &SearchRequest,
    tuning: &Tuning,
) -> Result<Vec<PublicationRecord>, SearchError> {
    let searchable = registry.searchable();
    if searchable.is_empty() {
        return Err(SearchError::NoSources);
    }
    let shape = QueryShape::new(plan, request, tuning);

    let primary = if plan.is_multi_concept() {
        searchable.iter().copied().find(|s| s.supports_boolean()).map(Arc::clone)
    } else {
        None
    };

    match primary {
        Some(primary) => tiered(&searchable, primary, plan, &shape, tuning).await,
        None => fan_out_all(&searchable, plan, &shape).await,
    }
}

/// Strict tier against the primary, widening only when too narrow, with
/// the broad fan-out running over the remaining sources.
async fn tiered(
    searchable: &[&Arc<dyn Source>],
    primary: Arc<dyn Source>,
    plan: &QueryPlan,
    shape: &QueryShape,
    tuning: &Tuning,
) -> Result<Vec<PublicationRecord>, SearchError> {
    let mut records = Vec::new();
    let mut any_success = false;

    match primary.search(&shape.query(&plan.primary_tier1)).await {
        Ok(response) => {
            any_success = true;
            let matched = response.matched();
            records.extend(response.records);
            if matched >= tuning.widen_threshold {
                tracing::info!(
                    source = primary.id(),
                    matched,
                    "tier-1 volume sufficient, skipping tier 2"
                );
            } else {
                tracing::info!(
                    source = primary.id(),
                    matched,
                    threshold = tuning.widen_threshold,
                    "tier-1 too narrow, widening"
                );
                match primary.search(&shape.query(&plan.primary_tier2)).await {
                    Ok(widened) => records.extend(widened.records),
                    Err(error) => {
                        tracing::warn!(source = primary.id(), %error, "tier-2 widening failed");
                    }
                }
            }
        }
        Err(error) => {
            tracing::warn!(
                source = primary.id(),
                %error,
                "primary source failed, relying on fan-out"
            );
        }
    }

    let branches: Vec<(Arc<dyn Source>, SourceQuery)> = searchable
        .iter()
        .copied()
        .filter(|s| s.id() != primary.id())
        .map(|s| (Arc::clone(s), shape.query(&plan.broad_text)))
        .collect();
    merge_outcomes(run_branches(branches).await, &mut records, &mut any_success);

    if !any_success {
        return Err(SearchError::AllSourcesFailed);
    }
    Ok(records)
}

/// Single-concept path: one concurrent pass over every source. Sources
/// that understand fielded syntax get the widened fielded form, the rest
/// get plain text.
async fn fan_out_all(
    searchable: &[&Arc<dyn Source>],
    plan: &QueryPlan,
    shape: &QueryShape,
) -> Result<Vec<PublicationRecord>, SearchError> {
    let branches: Vec<(Arc<dyn Source>, SourceQuery)> = searchable
        .iter()
        .copied()
        .map(|source| {
            let text = if source.supports_boolean() {
                &plan.primary_tier2
            } else {
                &plan.broad_text
            };
            (Arc::clone(source), shape.query(text))
        })
        .collect();

    let mut records = Vec::new();
    let mut any_success = false;
    merge_outcomes(run_branches(branches).await, &mut records, &mut any_success);

    if !any_success {
        return Err(SearchError::AllSourcesFailed);
    }
    Ok(records)
}

/// Run branch queries concurrently. A panicked branch is logged and
/// dropped like a failed one.
async fn run_branches(
    branches: Vec<(Arc<dyn Source>, SourceQuery)>,
) -> Vec<(String, Result<SourceResponse, SourceError>)> {
    let tasks: Vec<_> = branches
        .into_iter()
        .map(|(source, query)| {
            tokio::spawn(async move {
                let id = source.id().to_string();
                let outcome = source.search(&query).await;
                (id, outcome)
            })
        })
        .collect();

    let mut outcomes = Vec::new();
    for joined in join_all(tasks).await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(error) => tracing::warn!(%error, "search branch panicked"),
        }
    }
    outcomes
}

fn merge_outcomes(
    outcomes: Vec<(String, Result<SourceResponse, SourceError>)>,
    records: &mut Vec<PublicationRecord>,
    any_success: &mut bool,
) {
    for (id, outcome) in outcomes {
        match outcome {
            Ok(response) => {
                *any_success = true;
                tracing::debug!(source = %id, count = response.records.len(), "source responded");
                records.extend(response.records);
            }
            Err(error) => {
                tracing::warn!(source = %id, %error, "source degraded to empty");
            }
        }
    }
}
