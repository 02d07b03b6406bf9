//! Scored and ranked result types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::record::PublicationRecord;

/// How strongly a record matches the query's exposure/intervention terms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExposureMatch {
    /// Query has no exposure terms, or the record was never gated on them
    #[default]
    None,
    /// Exposure terms appear only incidentally
    Weak,
    /// Exposure terms appear in the title, subjects, or prominently in the abstract
    Strong,
}

/// How many of the query's concept groups appear in the record title:
/// 2 = both core and modifier, 1 = one of them, 0 = neither (or the
/// query was not multi-concept).
pub type TitleStrength = u8;

/// A record with its per-stage scores attached
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub record: PublicationRecord,

    /// Topical relevance in [0, 1]
    pub relevance: f64,

    /// Citation impact in [0, 1] after percentile normalization
    pub citation_score: f64,

    /// Influence score in [0, 1] (citation score, optionally blended)
    pub influence: f64,

    /// Recency score in [0, 1]
    pub recency: f64,

    /// Personalization affinity in [0, 1], zero when no provider is wired
    pub match_score: f64,

    /// Composite used for ordering
    pub final_score: f64,

    /// Title strength for tie-breaking
    pub title_strength: TitleStrength,

    /// Exposure-match grade from the concept gate
    pub exposure: ExposureMatch,

    /// One-sentence plain-language summary, when a summarizer is wired
    pub plain_summary: Option<String>,

    /// Caller has already read this record, per the read ledger
    pub already_read: bool,
}

impl ScoredRecord {
    pub fn new(record: PublicationRecord) -> Self {
        Self {
            record,
            relevance: 0.0,
            citation_score: 0.0,
            influence: 0.0,
            recency: 0.0,
            match_score: 0.0,
            final_score: 0.0,
            title_strength: 0,
            exposure: ExposureMatch::None,
            plain_summary: None,
            already_read: false,
        }
    }

    /// Composite score quantized to milli units, the resolution at which
    /// two scores count as tied.
    pub fn final_milli(&self) -> i64 {
        (self.final_score * 1000.0).round() as i64
    }
}

/// A fully ranked result set, before pagination.
///
/// This is what the query cache stores: one entry per query signature,
/// sliced into pages on the way out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedBatch {
    pub records: Vec<ScoredRecord>,
    /// Post-dedup record count per source id
    pub source_counts: HashMap<String, usize>,
}

impl RankedBatch {
    pub fn empty() -> Self {
        Self { records: Vec::new(), source_counts: HashMap::new() }
    }

    /// Slice one page out of the ranked set
    pub fn page(&self, page: usize, page_size: usize) -> RankedPage {
        let page = page.max(1);
        let total_count = self.records.len();
        let start = (page - 1).saturating_mul(page_size);
        let items = if start >= total_count {
            Vec::new()
        } else {
            self.records[start..(start + page_size).min(total_count)].to_vec()
        };
        RankedPage {
            has_more: start + items.len() < total_count,
            items,
            total_count,
            page,
            page_size,
            source_counts: self.source_counts.clone(),
        }
    }
}

/// One page of ranked results, as returned to the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedPage {
    pub items: Vec<ScoredRecord>,
    pub total_count: usize,
    pub page: usize,
    pub page_size: usize,
    pub has_more: bool,
    pub source_counts: HashMap<String, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::SourceId;

    fn scored(id: &str) -> ScoredRecord {
        ScoredRecord::new(PublicationRecord::new(
            id.into(),
            format!("Title {id}"),
            "https://example.com".into(),
            SourceId::PubMed,
        ))
    }

    #[test]
    fn test_pagination_slices() {
        let batch = RankedBatch {
            records: (0..25).map(|i| scored(&i.to_string())).collect(),
            source_counts: HashMap::new(),
        };

        let first = batch.page(1, 10);
        assert_eq!(first.items.len(), 10);
        assert_eq!(first.total_count, 25);
        assert!(first.has_more);
        assert_eq!(first.items[0].record.id, "0");

        let last = batch.page(3, 10);
        assert_eq!(last.items.len(), 5);
        assert!(!last.has_more);
        assert_eq!(last.items[0].record.id, "20");

        let beyond = batch.page(4, 10);
        assert!(beyond.items.is_empty());
        assert!(!beyond.has_more);
        assert_eq!(beyond.total_count, 25);
    }

    #[test]
    fn test_final_milli_quantization() {
        let mut a = scored("a");
        let mut b = scored("b");
        a.final_score = 0.8204;
        b.final_score = 0.8198;
        // both round to 820: tied at milli resolution
        assert_eq!(a.final_milli(), b.final_milli());

        a.final_score = 0.8215;
        assert!(a.final_milli() > b.final_milli());
    }
}
