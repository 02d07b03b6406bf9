//! Retrieval and ranking policy values.
//!
//! The thresholds in [`Tuning`] are empirically tuned rather than derived,
//! so they stay overridable through configuration. The weights below are
//! part of the scoring contract and are fixed.

use serde::{Deserialize, Serialize};

/// Overridable retrieval and ranking thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tuning {
    /// Minimum relevance for records from the primary source
    #[serde(default = "default_floor_primary")]
    pub relevance_floor_primary: f64,

    /// Minimum relevance for records from other indexed sources
    #[serde(default = "default_floor_secondary")]
    pub relevance_floor_secondary: f64,

    /// Minimum relevance for preprint records
    #[serde(default = "default_floor_preprint")]
    pub relevance_floor_preprint: f64,

    /// Tier-1 result count at which retrieval widens to other sources
    /// without re-querying the primary one
    #[serde(default = "default_widen_threshold")]
    pub widen_threshold: usize,

    /// Main result count under which the weak-exposure fallback bucket
    /// is appended to the ranked output
    #[serde(default = "default_fallback_threshold")]
    pub fallback_threshold: usize,

    /// Percentile against which citation counts are normalized
    #[serde(default = "default_citation_percentile")]
    pub citation_percentile: f64,

    /// Per-source candidate ceiling for single-concept queries
    #[serde(default = "default_per_source_limit")]
    pub per_source_limit: usize,

    /// Per-source candidate ceiling for multi-concept queries; gating
    /// discards more of these, so retrieval gathers more
    #[serde(default = "default_per_source_limit_multi")]
    pub per_source_limit_multi: usize,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            relevance_floor_primary: default_floor_primary(),
            relevance_floor_secondary: default_floor_secondary(),
            relevance_floor_preprint: default_floor_preprint(),
            widen_threshold: default_widen_threshold(),
            fallback_threshold: default_fallback_threshold(),
            citation_percentile: default_citation_percentile(),
            per_source_limit: default_per_source_limit(),
            per_source_limit_multi: default_per_source_limit_multi(),
        }
    }
}

fn default_floor_primary() -> f64 {
    0.35
}

fn default_floor_secondary() -> f64 {
    0.25
}

fn default_floor_preprint() -> f64 {
    0.40
}

fn default_widen_threshold() -> usize {
    20
}

fn default_fallback_threshold() -> usize {
    20
}

fn default_citation_percentile() -> f64 {
    0.95
}

fn default_per_source_limit() -> usize {
    30
}

fn default_per_source_limit_multi() -> usize {
    50
}

/// Field weights for per-term relevance matching
pub const TITLE_WEIGHT: f64 = 0.45;
pub const SUBJECTS_WEIGHT: f64 = 0.25;
pub const KEYWORDS_WEIGHT: f64 = 0.15;
pub const ABSTRACT_WEIGHT: f64 = 0.15;

/// Title-emphasis score bands
pub const EMPHASIS_ALL_TITLE: f64 = 0.96;
pub const EMPHASIS_STRONG_LOW: f64 = 0.825;
pub const EMPHASIS_STRONG_HIGH: f64 = 0.9;
pub const EMPHASIS_PRESENT_LOW: f64 = 0.5;
pub const EMPHASIS_PRESENT_HIGH: f64 = 0.75;

/// Soft boost for a strong exposure match on multi-concept queries
pub const EXPOSURE_BOOST: f64 = 0.08;

/// Boost for non-primary records whose relevance already clears
/// [`CROSS_SOURCE_MIN`], compensating for their thinner metadata
pub const CROSS_SOURCE_BOOST: f64 = 0.06;
pub const CROSS_SOURCE_MIN: f64 = 0.35;

/// Composite weights over (match, relevance, influence, recency)
pub const FINAL_WEIGHTS: [f64; 4] = [0.35, 0.35, 0.25, 0.05];
pub const FINAL_WEIGHTS_RECENT: [f64; 4] = [0.30, 0.30, 0.20, 0.20];

/// Blend shares when an external influence metric is present
pub const INFLUENCE_CITATION_SHARE: f64 = 0.7;
pub const INFLUENCE_EXTERNAL_SHARE: f64 = 0.3;

/// Strong abstract match: at least this many occurrences of a term
pub const STRONG_ABSTRACT_OCCURRENCES: usize = 2;

/// ...or one occurrence within this leading fraction of the abstract
pub const EARLY_ABSTRACT_FRACTION: f64 = 0.25;

/// ...or within this many bytes after a section marker such as
/// "Background:" or "Objective:"
pub const MARKER_WINDOW: usize = 160;

/// Content-word count at which a non-question query is treated as a
/// pasted article title
pub const TITLE_PASTE_MIN_WORDS: usize = 7;
