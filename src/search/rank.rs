//! Composite ranking over the scored batch.
//!
//! Citation impact is normalized against the batch's 95th-percentile
//! count through a log curve, so one runaway outlier cannot flatten
//! everyone else. Recency is range-normalized against the oldest record
//! present. The final ordering quantizes composite scores to milli
//! units and settles ties on relevance, title strength, then influence.

use std::cmp::Ordering;

use chrono::NaiveDate;

use crate::config::tuning::{
    FINAL_WEIGHTS, FINAL_WEIGHTS_RECENT, INFLUENCE_CITATION_SHARE, INFLUENCE_EXTERNAL_SHARE,
};
use crate::models::ScoredRecord;

/// Score citation impact, recency, and the composite, then sort.
pub(crate) fn rank(
    records: &mut [ScoredRecord],
    wants_recent: bool,
    citation_percentile: f64,
    as_of: NaiveDate,
) {
    apply_citation_scores(records, citation_percentile);
    apply_recency_scores(records, as_of);
    apply_final_scores(records, wants_recent);
    sort_ranked(records);
}

fn apply_citation_scores(records: &mut [ScoredRecord], percentile: f64) {
    let reference = percentile_citations(records, percentile);
    let denominator = (1.0 + reference as f64).log10();

    let max_external = records
        .iter()
        .filter_map(|s| s.record.influence_metric)
        .fold(0.0, f64::max);

    for scored in records.iter_mut() {
        let citations = scored.record.citation_count.unwrap_or(0);
        scored.citation_score = if denominator > 0.0 {
            ((1.0 + citations as f64).log10() / denominator).clamp(0.0, 1.0)
        } else {
            0.0
        };
        scored.influence = match scored.record.influence_metric {
            Some(metric) if max_external > 0.0 => {
                INFLUENCE_CITATION_SHARE * scored.citation_score
                    + INFLUENCE_EXTERNAL_SHARE * (metric / max_external).clamp(0.0, 1.0)
            }
            _ => scored.citation_score,
        };
    }
}

/// Nearest-rank percentile of the batch's citation counts
fn percentile_citations(records: &[ScoredRecord], percentile: f64) -> u32 {
    let mut counts: Vec<u32> = records
        .iter()
        .map(|s| s.record.citation_count.unwrap_or(0))
        .collect();
    if counts.is_empty() {
        return 0;
    }
    counts.sort_unstable();
    let rank = ((counts.len() as f64) * percentile).ceil() as usize;
    counts[rank.clamp(1, counts.len()) - 1]
}

fn apply_recency_scores(records: &mut [ScoredRecord], as_of: NaiveDate) {
    let raw: Vec<Option<f64>> = records
        .iter()
        .map(|s| {
            s.record
                .age_years(as_of)
                .map(|age| 1.0 / (1.0 + age.max(0.0)))
        })
        .collect();

    let mut min = f64::MAX;
    let mut max = f64::MIN;
    for value in raw.iter().flatten() {
        min = min.min(*value);
        max = max.max(*value);
    }

    for (scored, value) in records.iter_mut().zip(raw) {
        scored.recency = match value {
            Some(v) if max > min => (v - min) / (max - min),
            // every dated record shares one age
            Some(_) => 1.0,
            // undated records never win on recency
            None => 0.0,
        };
    }
}

fn apply_final_scores(records: &mut [ScoredRecord], wants_recent: bool) {
    let weights = if wants_recent { FINAL_WEIGHTS_RECENT } else { FINAL_WEIGHTS };
    for scored in records.iter_mut() {
        scored.final_score = weights[0] * scored.match_score
            + weights[1] * scored.relevance
            + weights[2] * scored.influence
            + weights[3] * scored.recency;
    }
}

fn compare_ranked(a: &ScoredRecord, b: &ScoredRecord) -> Ordering {
    b.final_milli()
        .cmp(&a.final_milli())
        .then_with(|| b.relevance.partial_cmp(&a.relevance).unwrap_or(Ordering::Equal))
        .then_with(|| b.title_strength.cmp(&a.title_strength))
        .then_with(|| b.influence.partial_cmp(&a.influence).unwrap_or(Ordering::Equal))
}

/// Stable sort, so insertion order settles whatever the tie-breaks leave.
pub(crate) fn sort_ranked(records: &mut [ScoredRecord]) {
    records.sort_by(compare_ranked);
}

/// Ordering for `SortBy::Date`: newest first, undated last, composite
/// order settling ties.
pub(crate) fn sort_by_date(records: &mut [ScoredRecord]) {
    records.sort_by(|a, b| {
        match (a.record.publication_date(), b.record.publication_date()) {
            (Some(da), Some(db)) => db.cmp(&da).then_with(|| compare_ranked(a, b)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => compare_ranked(a, b),
        }
    });
}
