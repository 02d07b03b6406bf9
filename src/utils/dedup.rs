//! Cross-source merging of duplicate records.
//!
//! A single article routinely comes back from several sources (and from
//! several query tiers of the same source). Duplicates are folded into
//! one record per article in a single O(n) pass over hash indexes.

use std::collections::HashMap;

use crate::models::PublicationRecord;
use crate::utils::text::normalize_title;

/// Merge duplicate records, keeping each article's first position.
///
/// Identity rules:
/// - matching DOIs always mean the same article
/// - records that both carry DOIs which differ are different articles,
///   even with identical titles (preprint vs published version)
/// - otherwise a matching normalized title means the same article
///
/// When a pair merges, the richer record's content wins the slot and its
/// missing fields are backfilled from the other, so merging never loses
/// an abstract, DOI, or citation count that either copy had.
pub fn merge_duplicates(records: Vec<PublicationRecord>) -> Vec<PublicationRecord> {
    if records.len() <= 1 {
        return records;
    }

    let mut merged: Vec<PublicationRecord> = Vec::with_capacity(records.len());
    let mut doi_index: HashMap<String, usize> = HashMap::new();
    let mut title_index: HashMap<String, usize> = HashMap::new();

    for record in records {
        let title_key = normalize_title(&record.title);

        // DOI match is the strongest signal
        if let Some(at) = record.doi.as_ref().and_then(|d| doi_index.get(d)).copied() {
            combine(&mut merged[at], record);
            continue;
        }

        if let Some(&at) = title_index.get(&title_key) {
            let conflicting_dois = merged[at].doi.is_some()
                && record.doi.is_some()
                && merged[at].doi != record.doi;
            if !conflicting_dois {
                combine(&mut merged[at], record);
                // the slot may have gained a DOI through the merge
                if let Some(doi) = merged[at].doi.clone() {
                    doi_index.entry(doi).or_insert(at);
                }
                continue;
            }
        }

        let at = merged.len();
        if let Some(doi) = record.doi.clone() {
            doi_index.insert(doi, at);
        }
        title_index.entry(title_key).or_insert(at);
        merged.push(record);
    }

    merged
}

/// Fold `incoming` into the slot at `existing`: the richer of the two
/// wins, then gaps are filled from the other.
fn combine(existing: &mut PublicationRecord, incoming: PublicationRecord) {
    if richness(&incoming) > richness(existing) {
        let donor = std::mem::replace(existing, incoming);
        backfill(existing, &donor);
    } else {
        backfill(existing, &incoming);
    }
}

/// How much usable metadata a record carries. Abstract text and major
/// subject headings weigh double since gating and scoring lean on them.
fn richness(record: &PublicationRecord) -> u32 {
    let mut score = 0;
    if !record.abstract_text.trim().is_empty() {
        score += 2;
    }
    if !record.major_subjects.is_empty() {
        score += 2;
    }
    if record.doi.is_some() {
        score += 1;
    }
    if record.year.is_some() {
        score += 1;
    }
    if record.journal.is_some() {
        score += 1;
    }
    if !record.authors.is_empty() {
        score += 1;
    }
    if !record.keywords.is_empty() {
        score += 1;
    }
    if record.citation_count.is_some() {
        score += 1;
    }
    if record.influence_metric.is_some() {
        score += 1;
    }
    score
}

fn backfill(base: &mut PublicationRecord, donor: &PublicationRecord) {
    if base.doi.is_none() {
        base.doi = donor.doi.clone();
    }
    if base.abstract_text.trim().is_empty() {
        base.abstract_text = donor.abstract_text.clone();
    }
    if base.year.is_none() {
        base.year = donor.year;
        base.month = donor.month;
        base.day = donor.day;
    }
    if base.journal.is_none() {
        base.journal = donor.journal.clone();
    }
    if base.authors.is_empty() {
        base.authors = donor.authors.clone();
    }
    if base.keywords.is_empty() {
        base.keywords = donor.keywords.clone();
    }
    if base.major_subjects.is_empty() {
        base.major_subjects = donor.major_subjects.clone();
    }
    if base.citation_count.is_none() {
        base.citation_count = donor.citation_count;
    }
    if base.influence_metric.is_none() {
        base.influence_metric = donor.influence_metric;
    }
}
