//! Retrieval plan construction.
//!
//! Turns a raw query into a [`QueryPlan`]: concept groups for gating and
//! scoring, plus the boolean strings each retrieval tier sends upstream.
//! Tier 1 is the narrowest form (every concept group plus a bare
//! specificity phrase), tier 2 drops the specificity phrase but keeps
//! synonym expansion, and the broad text is what non-boolean sources get.

use crate::models::{Intent, QueryKind, QueryPlan, Term};
use crate::query::concepts::extract_concepts;
use crate::query::intent::detect_intent;
use crate::utils::content_words;

/// Build the retrieval plan for a raw query
pub fn build_plan(raw: &str) -> QueryPlan {
    let trimmed = raw.trim();
    let intent = detect_intent(trimmed);

    if matches!(intent.kind, QueryKind::Identifier(_)) {
        return identifier_plan(trimmed, intent);
    }
    if has_field_tags(trimmed) {
        return passthrough_plan(trimmed, intent);
    }
    match intent.kind {
        QueryKind::TitlePaste => title_paste_plan(trimmed, intent),
        _ => topic_plan(trimmed, intent),
    }
}

/// Queries carrying explicit field-scoped syntax like `migraine[tiab]`
/// are passed to the primary source untouched.
fn has_field_tags(query: &str) -> bool {
    regex::Regex::new(r"\[[a-zA-Z ]+\]")
        .map(|re| re.is_match(query))
        .unwrap_or(false)
}

fn identifier_plan(raw: &str, intent: Intent) -> QueryPlan {
    QueryPlan {
        raw: raw.to_string(),
        intent,
        core_terms: Vec::new(),
        modifier_terms: Vec::new(),
        rare_terms: Vec::new(),
        has_field_tags: false,
        primary_tier1: raw.to_string(),
        primary_tier2: raw.to_string(),
        broad_text: raw.to_string(),
    }
}

fn passthrough_plan(raw: &str, intent: Intent) -> QueryPlan {
    // gate and scorer still need terms to work with, so the tagged
    // query's content words become the core group
    let stripped = strip_field_syntax(raw);
    let core_terms: Vec<Term> = content_words(&stripped)
        .into_iter()
        .map(Term::new)
        .collect();

    QueryPlan {
        raw: raw.to_string(),
        intent,
        core_terms,
        modifier_terms: Vec::new(),
        rare_terms: Vec::new(),
        has_field_tags: true,
        primary_tier1: raw.to_string(),
        primary_tier2: raw.to_string(),
        broad_text: stripped,
    }
}

/// Remove field tags and boolean scaffolding so only searchable text is left
fn strip_field_syntax(query: &str) -> String {
    let untagged = regex::Regex::new(r"\[[a-zA-Z ]+\]")
        .map(|re| re.replace_all(query, " ").into_owned())
        .unwrap_or_else(|_| query.to_string());

    untagged
        .split_whitespace()
        .filter(|w| !matches!(*w, "AND" | "OR" | "NOT"))
        .collect::<Vec<_>>()
        .join(" ")
        .replace(['(', ')', '"'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_paste_plan(raw: &str, intent: Intent) -> QueryPlan {
    let tokens = content_words(raw);
    let tier1 = tokens
        .iter()
        .map(|t| format!("{t}[ti]"))
        .collect::<Vec<_>>()
        .join(" AND ");
    let broad_text = tokens.join(" ");
    let core_terms: Vec<Term> = tokens.into_iter().map(Term::new).collect();

    QueryPlan {
        raw: raw.to_string(),
        intent,
        core_terms,
        modifier_terms: Vec::new(),
        rare_terms: Vec::new(),
        has_field_tags: false,
        primary_tier2: tier1.clone(),
        primary_tier1: tier1,
        broad_text,
    }
}

fn topic_plan(raw: &str, intent: Intent) -> QueryPlan {
    let groups = extract_concepts(raw);

    let mut clauses: Vec<String> = Vec::new();
    for term in groups.core.iter().chain(groups.modifier.iter()) {
        clauses.push(group_clause(term));
    }

    let tier2 = if clauses.is_empty() {
        raw.to_string()
    } else {
        clauses.join(" AND ")
    };

    // tier 1 additionally pins the most specific phrase, unexpanded
    let specificity = groups.rare.first().or_else(|| {
        groups
            .modifier
            .iter()
            .max_by_key(|t| (t.word_count(), t.text.len()))
    });
    let tier1 = match specificity {
        Some(term) if !clauses.is_empty() => format!("{tier2} AND \"{}\"", term.text),
        _ => tier2.clone(),
    };

    let broad_text = broad_text(&groups, raw);

    QueryPlan {
        raw: raw.to_string(),
        intent,
        core_terms: groups.core,
        modifier_terms: groups.modifier,
        rare_terms: groups.rare,
        has_field_tags: false,
        primary_tier1: tier1,
        primary_tier2: tier2,
        broad_text,
    }
}

/// One concept group as a boolean clause with its variants OR'ed in
fn group_clause(term: &Term) -> String {
    let forms: Vec<String> = term.forms().map(|f| format!("\"{f}\"")).collect();
    if forms.len() == 1 {
        forms.into_iter().next().unwrap_or_default()
    } else {
        format!("({})", forms.join(" OR "))
    }
}

/// Plain text for sources without boolean syntax: canonical concept
/// texts in extraction order, falling back to the query's content words.
fn broad_text(groups: &crate::query::concepts::ConceptGroups, raw: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for term in groups.core.iter().chain(groups.modifier.iter()) {
        if !parts.contains(&term.text.as_str()) {
            parts.push(&term.text);
        }
    }
    for term in &groups.rare {
        if !parts.contains(&term.text.as_str()) {
            parts.push(&term.text);
        }
    }

    if parts.is_empty() {
        let words = content_words(raw);
        if words.is_empty() {
            raw.to_string()
        } else {
            words.join(" ")
        }
    } else {
        parts.join(" ")
    }
}
