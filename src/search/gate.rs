//! Topical concept gate.
//!
//! Retrieval is recall-oriented, so the gathered batch always contains
//! records that merely brush against the query. The gate removes those
//! using high-signal fields before scoring starts. Multi-concept queries
//! are gated on both concept groups; records whose modifier terms appear
//! only incidentally are not dropped outright but held in a fallback
//! bucket the engine appends when the main result set runs thin.

use crate::config::tuning::{
    EARLY_ABSTRACT_FRACTION, MARKER_WINDOW, STRONG_ABSTRACT_OCCURRENCES,
};
use crate::models::{ExposureMatch, PublicationRecord, QueryPlan, Term};
use crate::utils::{contains_phrase, find_phrase, phrase_positions};

/// Section headers whose leading sentences state what a paper is about
const SECTION_MARKERS: &[&str] = &[
    "background",
    "objective",
    "objectives",
    "aim",
    "aims",
    "purpose",
    "introduction",
];

/// Gate verdict for one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GateDecision {
    /// Topical; carries its exposure grade into scoring
    Pass(ExposureMatch),
    /// Modifier terms appear only incidentally: held for the fallback bucket
    Fallback,
    /// Topically unrelated
    Drop,
}

/// The gathered batch split by gate verdict
#[derive(Debug, Default)]
pub(crate) struct GatedBatch {
    pub main: Vec<(PublicationRecord, ExposureMatch)>,
    pub fallback: Vec<PublicationRecord>,
}

pub(crate) fn partition(records: Vec<PublicationRecord>, plan: &QueryPlan) -> GatedBatch {
    let mut batch = GatedBatch::default();
    for record in records {
        match gate_record(&record, plan) {
            GateDecision::Pass(exposure) => batch.main.push((record, exposure)),
            GateDecision::Fallback => batch.fallback.push(record),
            GateDecision::Drop => {
                tracing::debug!(title = %record.title, "gated out as off-topic");
            }
        }
    }
    batch
}

pub(crate) fn gate_record(record: &PublicationRecord, plan: &QueryPlan) -> GateDecision {
    if plan.is_multi_concept() {
        multi_concept_gate(record, plan)
    } else {
        single_concept_gate(record, plan)
    }
}

/// Single-concept: at least one core term must appear in title, major
/// subjects, or keywords. Abstract-only mentions do not qualify.
fn single_concept_gate(record: &PublicationRecord, plan: &QueryPlan) -> GateDecision {
    let terms: Vec<&Term> = if plan.core_terms.is_empty() {
        plan.all_terms().collect()
    } else {
        plan.core_terms.iter().collect()
    };
    if terms.is_empty() {
        return GateDecision::Pass(ExposureMatch::None);
    }
    if terms.iter().any(|term| field_presence(record, term)) {
        GateDecision::Pass(ExposureMatch::None)
    } else {
        GateDecision::Drop
    }
}

/// Multi-concept: the topic side (core or rare) must strong-match, and
/// the modifier side grades the record: strong-match passes, a bare
/// mention is held back, no mention drops.
fn multi_concept_gate(record: &PublicationRecord, plan: &QueryPlan) -> GateDecision {
    let topic_strong = plan
        .core_terms
        .iter()
        .chain(plan.rare_terms.iter())
        .any(|term| strong_match(record, term));
    if !topic_strong {
        return GateDecision::Drop;
    }

    if plan.modifier_terms.iter().any(|term| strong_match(record, term)) {
        return GateDecision::Pass(ExposureMatch::Strong);
    }
    if plan.modifier_terms.iter().any(|term| mentioned(record, term)) {
        return GateDecision::Fallback;
    }
    GateDecision::Drop
}

/// Term appears in title, keywords, or major subject headings
fn field_presence(record: &PublicationRecord, term: &Term) -> bool {
    term.forms().any(|form| {
        contains_phrase(&record.title, form)
            || record.keywords.iter().any(|k| contains_phrase(k, form))
            || record.major_subjects.iter().any(|s| contains_phrase(s, form))
    })
}

fn strong_match(record: &PublicationRecord, term: &Term) -> bool {
    field_presence(record, term) || strong_abstract_match(&record.abstract_text, term)
}

fn mentioned(record: &PublicationRecord, term: &Term) -> bool {
    field_presence(record, term)
        || term
            .forms()
            .any(|form| contains_phrase(&record.abstract_text, form))
}

/// A term matches the abstract strongly when it recurs, appears early,
/// or sits right after a section marker ("Background:", "Objective:").
fn strong_abstract_match(abstract_text: &str, term: &Term) -> bool {
    if abstract_text.is_empty() {
        return false;
    }
    let early_cutoff = (abstract_text.len() as f64 * EARLY_ABSTRACT_FRACTION) as usize;

    for form in term.forms() {
        let positions = phrase_positions(abstract_text, form);
        let Some(&first) = positions.first() else {
            continue;
        };
        if positions.len() >= STRONG_ABSTRACT_OCCURRENCES {
            return true;
        }
        if first <= early_cutoff {
            return true;
        }
        let after_marker = SECTION_MARKERS.iter().any(|marker| {
            find_phrase(abstract_text, marker)
                .is_some_and(|at| first > at && first - at <= MARKER_WINDOW)
        });
        if after_marker {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Intent, QueryKind, RecordBuilder, SourceId};

    fn plan(core: &[&str], modifier: &[&str]) -> QueryPlan {
        QueryPlan {
            raw: "test".into(),
            intent: Intent { kind: QueryKind::Topic, wants_recent: false },
            core_terms: core.iter().map(|t| Term::new(*t)).collect(),
            modifier_terms: modifier.iter().map(|t| Term::new(*t)).collect(),
            rare_terms: Vec::new(),
            has_field_tags: false,
            primary_tier1: String::new(),
            primary_tier2: String::new(),
            broad_text: String::new(),
        }
    }

    fn record(title: &str) -> RecordBuilder {
        RecordBuilder::new("1", title, "u", SourceId::PubMed)
    }

    // long enough that a single trailing mention is neither early nor
    // near a section marker
    const FILLER: &str = "Methods were registered in advance. Participants \
        were recruited from three outpatient clinics and followed for twelve \
        months with monthly paper diaries. Statistical analysis used mixed \
        effects models adjusted for age and sex. Attrition was low across \
        all study arms and data quality checks passed.";

    #[test]
    fn test_single_concept_requires_high_signal_field() {
        let plan = plan(&["migraine"], &[]);

        let in_title = record("Migraine in adolescents").build();
        assert_eq!(gate_record(&in_title, &plan), GateDecision::Pass(ExposureMatch::None));

        let in_subjects = record("Recurrent headache disorders")
            .major_subjects(vec!["Migraine Disorders".into()])
            .build();
        assert_eq!(gate_record(&in_subjects, &plan), GateDecision::Pass(ExposureMatch::None));

        let abstract_only = record("Recurrent headache disorders")
            .abstract_text("We discuss migraine briefly.")
            .build();
        assert_eq!(gate_record(&abstract_only, &plan), GateDecision::Drop);
    }

    #[test]
    fn test_multi_concept_strong_both_sides_passes() {
        let plan = plan(&["migraine"], &["mold"]);
        let record = record("Mold exposure and migraine frequency").build();
        assert_eq!(
            gate_record(&record, &plan),
            GateDecision::Pass(ExposureMatch::Strong)
        );
    }

    #[test]
    fn test_multi_concept_weak_modifier_goes_to_fallback() {
        let plan = plan(&["migraine"], &["mold"]);
        let record = record("Environmental triggers of migraine")
            .abstract_text(&format!("{} One patient also reported mold.", FILLER))
            .build();
        assert_eq!(gate_record(&record, &plan), GateDecision::Fallback);
    }

    #[test]
    fn test_multi_concept_no_modifier_mention_drops() {
        let plan = plan(&["migraine"], &["mold"]);
        let record = record("Exercise and migraine")
            .abstract_text("Aerobic training reduced attack frequency.")
            .build();
        assert_eq!(gate_record(&record, &plan), GateDecision::Drop);
    }

    #[test]
    fn test_multi_concept_off_topic_drops() {
        let plan = plan(&["migraine"], &["mold"]);
        let record = record("Mold remediation in commercial buildings")
            .abstract_text("Mold growth was surveyed across sites. Mold species varied.")
            .build();
        assert_eq!(gate_record(&record, &plan), GateDecision::Drop);
    }

    #[test]
    fn test_strong_abstract_by_repetition() {
        let term = Term::new("mold");
        let text = format!("{} Mold was measured twice. Indoor mold varied.", FILLER);
        assert!(strong_abstract_match(&text, &term));
    }

    #[test]
    fn test_strong_abstract_by_early_position() {
        let term = Term::new("mold");
        let text = format!("Indoor mold was the main exposure studied. {}", FILLER);
        assert!(strong_abstract_match(&text, &term));
    }

    #[test]
    fn test_strong_abstract_by_section_marker() {
        let term = Term::new("mold");
        let text = format!("{} Objective: to quantify mold exposure.", FILLER);
        assert!(strong_abstract_match(&text, &term));
    }

    #[test]
    fn test_weak_abstract_single_late_mention() {
        let term = Term::new("mold");
        let text = format!("{} One patient also reported mold.", FILLER);
        assert!(!strong_abstract_match(&text, &term));
    }

    #[test]
    fn test_variant_forms_count_for_the_gate() {
        let plan = QueryPlan {
            core_terms: vec![Term::with_variants("migraine", vec!["migraines".into()])],
            ..plan(&[], &[])
        };
        let record = record("Do migraines run in families?").build();
        assert_eq!(gate_record(&record, &plan), GateDecision::Pass(ExposureMatch::None));
    }

    #[test]
    fn test_empty_term_sets_pass_everything() {
        let plan = plan(&[], &[]);
        let record = record("Anything at all").build();
        assert_eq!(gate_record(&record, &plan), GateDecision::Pass(ExposureMatch::None));
    }

    #[test]
    fn test_partition_buckets() {
        let plan = plan(&["migraine"], &["mold"]);
        let records = vec![
            record("Mold exposure and migraine frequency").build(),
            RecordBuilder::new("2", "Environmental triggers of migraine", "u", SourceId::PubMed)
                .abstract_text(&format!("{} One patient also reported mold.", FILLER))
                .build(),
            RecordBuilder::new("3", "Crop rotation yields", "u", SourceId::PubMed).build(),
        ];

        let batch = partition(records, &plan);
        assert_eq!(batch.main.len(), 1);
        assert_eq!(batch.main[0].1, ExposureMatch::Strong);
        assert_eq!(batch.fallback.len(), 1);
    }
}
