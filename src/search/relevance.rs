//! Topical relevance scoring.
//!
//! Two estimators run per record and the higher one wins: a field-weighted
//! match over all extracted terms, and a title-emphasis heuristic driven by
//! where the terms land. An exact-phrase hit overrides both. Soft boosts
//! and the per-source floors are applied on top.

use crate::config::tuning::{
    ABSTRACT_WEIGHT, CROSS_SOURCE_BOOST, CROSS_SOURCE_MIN, EMPHASIS_ALL_TITLE,
    EMPHASIS_PRESENT_HIGH, EMPHASIS_PRESENT_LOW, EMPHASIS_STRONG_HIGH, EMPHASIS_STRONG_LOW,
    EXPOSURE_BOOST, KEYWORDS_WEIGHT, SUBJECTS_WEIGHT, TITLE_WEIGHT,
};
use crate::config::Tuning;
use crate::models::{
    ExposureMatch, PublicationRecord, QueryPlan, SourceClass, Term, TitleStrength,
};
use crate::utils::contains_phrase;

/// Everything the scorer decides about one record
#[derive(Debug, Clone, Copy)]
pub(crate) struct RelevanceOutcome {
    pub relevance: f64,
    pub exact_phrase: bool,
    pub title_strength: TitleStrength,
}

pub(crate) fn score_record(
    record: &PublicationRecord,
    plan: &QueryPlan,
    exposure: ExposureMatch,
) -> RelevanceOutcome {
    let terms: Vec<&Term> = plan.all_terms().collect();

    let mut relevance = field_weighted_score(record, &terms).max(title_emphasis_score(record, &terms));

    let exact_phrase = exact_phrase_match(record, &plan.raw);
    if exact_phrase {
        relevance = 1.0;
    }

    if plan.is_multi_concept() && exposure == ExposureMatch::Strong {
        relevance = (relevance + EXPOSURE_BOOST).min(1.0);
    }
    if !record.source.is_primary() && relevance >= CROSS_SOURCE_MIN {
        relevance = (relevance + CROSS_SOURCE_BOOST).min(1.0);
    }

    RelevanceOutcome {
        relevance,
        exact_phrase,
        title_strength: title_strength(record, plan),
    }
}

/// Per-source relevance floor. An exact-phrase match always passes.
pub(crate) fn passes_floor(
    outcome: &RelevanceOutcome,
    record: &PublicationRecord,
    tuning: &Tuning,
) -> bool {
    if outcome.exact_phrase {
        return true;
    }
    let floor = match record.source.class() {
        SourceClass::Primary => tuning.relevance_floor_primary,
        SourceClass::Secondary => tuning.relevance_floor_secondary,
        SourceClass::Preprint => tuning.relevance_floor_preprint,
    };
    outcome.relevance >= floor
}

fn matches_text(text: &str, term: &Term) -> bool {
    term.forms().any(|form| contains_phrase(text, form))
}

fn matches_list(items: &[String], term: &Term) -> bool {
    items
        .iter()
        .any(|item| term.forms().any(|form| contains_phrase(item, form)))
}

/// Sum of the field weights where this term appears
fn per_term_score(record: &PublicationRecord, term: &Term) -> f64 {
    let mut score = 0.0;
    if matches_text(&record.title, term) {
        score += TITLE_WEIGHT;
    }
    if matches_list(&record.major_subjects, term) {
        score += SUBJECTS_WEIGHT;
    }
    if matches_list(&record.keywords, term) {
        score += KEYWORDS_WEIGHT;
    }
    if matches_text(&record.abstract_text, term) {
        score += ABSTRACT_WEIGHT;
    }
    score
}

/// max(average across terms, best single term): one strong title hit is
/// never diluted by many absent terms
fn field_weighted_score(record: &PublicationRecord, terms: &[&Term]) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }
    let mut sum = 0.0;
    let mut best = 0.0f64;
    for term in terms {
        let score = per_term_score(record, term);
        sum += score;
        best = best.max(score);
    }
    best.max(sum / terms.len() as f64)
}

/// Score bands driven by how many terms landed in the title:
/// everything in title+keywords scores highest, then all-present with a
/// title majority, then all-present anywhere. Partial presence scales
/// the band value down linearly.
fn title_emphasis_score(record: &PublicationRecord, terms: &[&Term]) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }
    let n = terms.len() as f64;

    let mut in_title = 0usize;
    let mut in_title_or_keywords = 0usize;
    let mut present = 0usize;
    for term in terms {
        let title = matches_text(&record.title, term);
        let keywords = matches_list(&record.keywords, term);
        if title {
            in_title += 1;
        }
        if title || keywords {
            in_title_or_keywords += 1;
        }
        if title
            || keywords
            || matches_list(&record.major_subjects, term)
            || matches_text(&record.abstract_text, term)
        {
            present += 1;
        }
    }
    if present == 0 {
        return 0.0;
    }

    let title_share = in_title as f64 / n;
    let all_present_value = if in_title_or_keywords == terms.len() {
        EMPHASIS_ALL_TITLE
    } else if title_share >= 0.5 {
        EMPHASIS_STRONG_LOW
            + (title_share - 0.5) / 0.5 * (EMPHASIS_STRONG_HIGH - EMPHASIS_STRONG_LOW)
    } else {
        EMPHASIS_PRESENT_LOW + title_share / 0.5 * (EMPHASIS_PRESENT_HIGH - EMPHASIS_PRESENT_LOW)
    };

    if present == terms.len() {
        all_present_value
    } else {
        all_present_value * present as f64 / n
    }
}

/// Raw query found verbatim, case and punctuation folded, in the
/// record's text fields
fn exact_phrase_match(record: &PublicationRecord, raw: &str) -> bool {
    contains_phrase(&record.title, raw)
        || contains_phrase(&record.abstract_text, raw)
        || record.keywords.iter().any(|k| contains_phrase(k, raw))
}

/// 2 = both concept groups in the title, 1 = one of them, 0 = neither
/// or not a multi-concept query
pub(crate) fn title_strength(record: &PublicationRecord, plan: &QueryPlan) -> TitleStrength {
    if !plan.is_multi_concept() {
        return 0;
    }
    let topic = plan
        .core_terms
        .iter()
        .chain(plan.rare_terms.iter())
        .any(|term| matches_text(&record.title, term));
    let modifier = plan
        .modifier_terms
        .iter()
        .any(|term| matches_text(&record.title, term));
    topic as u8 + modifier as u8
}
