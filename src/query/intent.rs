//! Query intent detection.
//!
//! Classifies a raw query before any concept extraction happens:
//! identifier lookups bypass the topical pipeline entirely, pasted
//! titles become title-constrained searches, everything else is a topic.

use crate::config::tuning::TITLE_PASTE_MIN_WORDS;
use crate::models::{normalize_doi, Identifier, Intent, QueryKind};
use crate::utils::{content_words, words};

/// Classify a raw query
pub fn detect_intent(query: &str) -> Intent {
    let trimmed = query.trim();

    if let Some(identifier) = detect_identifier(trimmed) {
        return Intent {
            kind: QueryKind::Identifier(identifier),
            wants_recent: false,
        };
    }

    let wants_recent = has_recency_cue(trimmed);

    // A long paste that is not phrased as a question is almost always an
    // article title dropped into the search box
    if !is_question(trimmed) && content_words(trimmed).len() >= TITLE_PASTE_MIN_WORDS {
        return Intent {
            kind: QueryKind::TitlePaste,
            wants_recent,
        };
    }

    Intent {
        kind: QueryKind::Topic,
        wants_recent,
    }
}

/// Recognize a query that consists of nothing but a publication identifier
pub fn detect_identifier(query: &str) -> Option<Identifier> {
    let q = query.trim();
    if q.split_whitespace().count() != 1 {
        return None;
    }

    if regex::Regex::new(r"^\d{7,8}$").ok()?.is_match(q) {
        return Some(Identifier::Pmid(q.to_string()));
    }
    if let Some(caps) = regex::Regex::new(r"(?i)^pmc(\d+)$").ok()?.captures(q) {
        return Some(Identifier::Pmcid(format!("PMC{}", &caps[1])));
    }
    if regex::Regex::new(r"(?i)^nct\d{8}$").ok()?.is_match(q) {
        return Some(Identifier::TrialRegistration(q.to_uppercase()));
    }
    if let Some(doi) = normalize_doi(q) {
        return Some(Identifier::Doi(doi));
    }

    None
}

fn is_question(query: &str) -> bool {
    if query.trim_end().ends_with('?') {
        return true;
    }
    let first = words(query).into_iter().next().unwrap_or_default();
    matches!(
        first.as_str(),
        "what"
            | "which"
            | "how"
            | "why"
            | "when"
            | "who"
            | "does"
            | "do"
            | "is"
            | "are"
            | "can"
            | "should"
    )
}

fn has_recency_cue(query: &str) -> bool {
    words(query).iter().any(|w| {
        matches!(
            w.as_str(),
            "latest" | "newest" | "recent" | "recently" | "new" | "current"
        )
    })
}
