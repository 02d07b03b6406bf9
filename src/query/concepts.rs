//! Concept extraction for topical queries.
//!
//! Splits a query into core (condition/topic), modifier
//! (exposure/intervention), and rare (highly specific) term groups.
//! Classification is heuristic and errs toward missing a term rather
//! than inventing one: a dropped synonym costs recall, a wrong synonym
//! poisons the concept gate.

use crate::models::Term;
use crate::utils::{is_stopword, words};

/// Extracted concept groups
#[derive(Debug, Clone, Default)]
pub struct ConceptGroups {
    pub core: Vec<Term>,
    pub modifier: Vec<Term>,
    pub rare: Vec<Term>,
}

/// Words that join concepts without carrying meaning of their own
const LINKERS: &[&str] = &[
    "and", "in", "on", "for", "with", "among", "during", "vs", "versus", "between", "or",
    "after", "to",
];

/// Meta words about the search itself, never part of a concept
const META_WORDS: &[&str] = &[
    "latest", "newest", "recent", "recently", "current", "new", "emerging", "advances",
    "advance", "update", "updates", "evidence", "overview", "summary", "studies", "study",
    "research", "literature", "articles", "papers",
];

const DISEASE_SUFFIXES: &[&str] = &[
    "itis", "osis", "oma", "emia", "aemia", "pathy", "algia", "plegia", "phobia", "penia",
    "iasis",
];

const DISEASE_WORDS: &[&str] = &[
    "disease", "diseases", "disorder", "disorders", "syndrome", "cancer", "carcinoma",
    "tumor", "tumour", "infection", "infections", "injury", "injuries", "pain", "headache",
    "headaches", "migraine", "migraines", "diabetes", "asthma", "copd", "depression",
    "anxiety", "obesity", "hypertension", "stroke", "dementia", "alzheimer", "parkinson",
    "arthritis", "osteoporosis", "insomnia", "fatigue", "mortality", "deficiency", "failure",
    "covid", "influenza", "sepsis", "fibrosis", "eczema", "allergy", "allergies",
];

const EXPOSURE_MARKERS: &[&str] = &[
    "exposure", "exposed", "intake", "consumption", "usage", "therapy", "therapies",
    "treatment", "treatments", "intervention", "interventions", "training", "exercise",
    "activity", "diet", "dietary", "supplementation", "supplement", "supplements", "smoking",
    "vaping", "alcohol", "vaccination", "vaccine", "vaccines", "screening", "surgery",
    "medication", "medications", "drug", "drugs", "dose", "rehabilitation", "management",
    "prevention", "prophylaxis", "inhibitor", "inhibitors", "agonist", "agonists", "mold",
    "mould", "pollution", "pollutants", "radiation", "stress", "yoga", "meditation",
    "caffeine",
];

const POPULATION_WORDS: &[&str] = &[
    "adults", "adult", "children", "child", "adolescents", "adolescent", "elderly", "older",
    "aged", "women", "men", "female", "male", "patients", "pregnancy", "pregnant", "infants",
    "infant", "seniors", "population", "populations", "people",
];

const DRUG_SUFFIXES: &[&str] = &[
    "mab", "nib", "ciclib", "vastatin", "statin", "sartan", "pril", "olol", "azole", "mycin",
    "cycline", "dronate", "gliptin", "gliflozin", "lukast", "setron", "triptan", "cept",
    "parib", "zumab", "tide",
];

/// Nouns whose trailing "s" is not a plural
const UNCOUNTABLE: &[&str] = &[
    "diabetes", "herpes", "rabies", "scabies", "measles", "mumps", "caries", "series",
    "species", "pertussis",
];

/// Curated synonym variants. Entries are deliberately narrow: each
/// variant must be something an indexer would use for the same concept.
const SYNONYMS: &[(&str, &[&str])] = &[
    ("migraine", &["migraines", "migraine headache"]),
    ("headache", &["headaches", "cephalalgia"]),
    ("exercise", &["physical activity", "exercise training"]),
    ("mold", &["mould", "molds", "indoor fungi"]),
    ("mold exposure", &["mould exposure", "mold", "indoor fungi"]),
    ("diabetes", &["diabetes mellitus", "diabetic"]),
    ("hypertension", &["high blood pressure", "hypertensive"]),
    ("heart attack", &["myocardial infarction"]),
    ("obesity", &["obese"]),
    ("depression", &["depressive disorder", "depressive symptoms"]),
    ("cancer", &["neoplasm", "neoplasms", "carcinoma"]),
    ("smoking", &["cigarette smoking", "tobacco use"]),
    ("vitamin d", &["cholecalciferol", "25-hydroxyvitamin d"]),
    ("covid", &["covid-19", "sars-cov-2"]),
    ("alzheimer", &["alzheimer disease", "alzheimer's disease"]),
    ("treatments", &["treatment", "therapy"]),
    ("sleep", &["sleep quality", "sleep duration"]),
];

/// Extract concept groups from a topical query
pub fn extract_concepts(query: &str) -> ConceptGroups {
    let lowered = query.to_lowercase();

    // Directional phrasing assigns sides outright: in "effect of A on B",
    // A is the exposure and B the condition
    let directional = regex::Regex::new(
        r"(?i)\b(?:effect|effects|impact|influence|role|association)s?\s+of\s+(.+?)\s+(?:on|in|upon)\s+(.+)$",
    )
    .ok();
    if let Some(caps) = directional.and_then(|re| re.captures(&lowered).map(|c| (c[1].to_string(), c[2].to_string()))) {
        let (exposure_side, condition_side) = caps;
        let mut groups = ConceptGroups::default();
        for segment in split_segments(&exposure_side) {
            if matches!(classify_segment(&segment), SegmentKind::Population) {
                continue;
            }
            push_term(&mut groups.modifier, &segment);
            collect_rare(&mut groups.rare, &segment);
        }
        for segment in split_segments(&condition_side) {
            if matches!(classify_segment(&segment), SegmentKind::Population) {
                continue;
            }
            push_term(&mut groups.core, &segment);
            collect_rare(&mut groups.rare, &segment);
        }
        if !groups.core.is_empty() {
            return groups;
        }
    }

    let mut groups = ConceptGroups::default();
    for segment in split_segments(&lowered) {
        collect_rare(&mut groups.rare, &segment);
        match classify_segment(&segment) {
            SegmentKind::Core => push_term(&mut groups.core, &segment),
            SegmentKind::Modifier => push_term(&mut groups.modifier, &segment),
            SegmentKind::Mixed => {
                // "migraine treatments" carries both a condition and an
                // intervention in one segment; split it
                let (exposure, rest): (Vec<String>, Vec<String>) = words(&segment)
                    .into_iter()
                    .partition(|t| EXPOSURE_MARKERS.contains(&t.as_str()) || is_drug_like(t));
                if !rest.is_empty() {
                    push_term(&mut groups.core, &rest.join(" "));
                }
                if !exposure.is_empty() {
                    push_term(&mut groups.modifier, &exposure.join(" "));
                }
            }
            SegmentKind::Population => {}
            SegmentKind::Undecided => {
                // first unclassified segment anchors the topic
                if groups.core.is_empty() {
                    push_term(&mut groups.core, &segment);
                } else {
                    push_term(&mut groups.modifier, &segment);
                }
            }
        }
    }

    groups
}

/// Accepted surface forms for a concept: curated synonyms plus the
/// singular/plural counterpart of the last word.
pub fn expand_variants(text: &str) -> Vec<String> {
    let canonical = text.to_lowercase();
    let mut variants: Vec<String> = Vec::new();

    for (key, forms) in SYNONYMS {
        if *key == canonical {
            variants.extend(forms.iter().map(|s| s.to_string()));
        }
    }

    if let Some(flipped) = flip_plural(&canonical) {
        if !variants.contains(&flipped) {
            variants.push(flipped);
        }
    }

    variants.retain(|v| *v != canonical);
    variants
}

fn flip_plural(text: &str) -> Option<String> {
    let (head, last) = match text.rsplit_once(' ') {
        Some((head, last)) => (Some(head), last),
        None => (None, text),
    };

    if UNCOUNTABLE.contains(&last) || last.ends_with("sis") || last.ends_with("us") || last.ends_with("ss") {
        return None;
    }

    let flipped = if let Some(stem) = last.strip_suffix("ies") {
        format!("{stem}y")
    } else if let Some(stem) = last.strip_suffix('s') {
        stem.to_string()
    } else if last.ends_with('y') && last.len() > 2 {
        format!("{}ies", &last[..last.len() - 1])
    } else {
        format!("{last}s")
    };

    if flipped.len() < 3 {
        return None;
    }
    Some(match head {
        Some(head) => format!("{head} {flipped}"),
        None => flipped,
    })
}

enum SegmentKind {
    Core,
    Modifier,
    /// Contains both a condition and an exposure term
    Mixed,
    Population,
    Undecided,
}

fn classify_segment(segment: &str) -> SegmentKind {
    let tokens = words(segment);

    let disease = tokens.iter().any(|t| {
        DISEASE_WORDS.contains(&t.as_str())
            || (t.len() > 5 && DISEASE_SUFFIXES.iter().any(|s| t.ends_with(s)))
    });
    let exposure = tokens
        .iter()
        .any(|t| EXPOSURE_MARKERS.contains(&t.as_str()) || is_drug_like(t));

    match (disease, exposure) {
        (true, true) => SegmentKind::Mixed,
        (true, false) => SegmentKind::Core,
        (false, true) => SegmentKind::Modifier,
        (false, false) => {
            if !tokens.is_empty() && tokens.iter().all(|t| POPULATION_WORDS.contains(&t.as_str()))
            {
                SegmentKind::Population
            } else {
                SegmentKind::Undecided
            }
        }
    }
}

/// Split a query into concept segments at linker words, dropping
/// stopwords and meta words inside each segment.
fn split_segments(text: &str) -> Vec<String> {
    let mut segments: Vec<String> = Vec::new();
    let mut current: Vec<String> = Vec::new();

    for word in words(text) {
        if LINKERS.contains(&word.as_str()) {
            if !current.is_empty() {
                segments.push(current.join(" "));
                current.clear();
            }
            continue;
        }
        if is_stopword(&word) || META_WORDS.contains(&word.as_str()) {
            continue;
        }
        current.push(word);
    }
    if !current.is_empty() {
        segments.push(current.join(" "));
    }

    segments
}

/// Tokens that look highly specific: drug-like names and code-style
/// identifiers (gene symbols, receptor names) with mixed letters/digits.
fn collect_rare(rare: &mut Vec<Term>, segment: &str) {
    for token in words(segment) {
        let code_like = token.len() >= 3
            && token.chars().any(|c| c.is_alphabetic())
            && token.chars().any(|c| c.is_numeric());
        if (code_like || is_drug_like(&token)) && !rare.iter().any(|t| t.text == token) {
            rare.push(Term::new(token));
        }
    }
}

fn is_drug_like(token: &str) -> bool {
    token.len() >= 6
        && token.chars().all(|c| c.is_alphabetic())
        && DRUG_SUFFIXES.iter().any(|s| token.ends_with(s))
        && !EXPOSURE_MARKERS.contains(&token)
        && !DISEASE_WORDS.contains(&token)
}

fn push_term(group: &mut Vec<Term>, segment: &str) {
    let text = segment.trim();
    if text.is_empty() || group.iter().any(|t| t.text == text) {
        return;
    }
    group.push(Term::with_variants(text, expand_variants(text)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multi_concept_split() {
        let groups = extract_concepts("migraine and mold exposure");
        assert_eq!(groups.core.len(), 1);
        assert_eq!(groups.core[0].text, "migraine");
        assert_eq!(groups.modifier.len(), 1);
        assert_eq!(groups.modifier[0].text, "mold exposure");
    }

    #[test]
    fn test_directional_pattern() {
        let groups = extract_concepts("what is the effect of exercise on migraine frequency?");
        assert!(groups.modifier.iter().any(|t| t.text.contains("exercise")));
        assert!(groups.core.iter().any(|t| t.text.contains("migraine")));
    }

    #[test]
    fn test_single_concept() {
        let groups = extract_concepts("diabetes");
        assert_eq!(groups.core.len(), 1);
        assert_eq!(groups.core[0].text, "diabetes");
        assert!(groups.modifier.is_empty());
    }

    #[test]
    fn test_population_segment_dropped() {
        let groups = extract_concepts("diabetes management in older adults");
        assert!(groups.core.iter().any(|t| t.text.contains("diabetes")));
        assert!(!groups
            .core
            .iter()
            .chain(groups.modifier.iter())
            .any(|t| t.text.contains("adults")));
    }

    #[test]
    fn test_mixed_segment_split() {
        let groups = extract_concepts("migraine treatments");
        assert!(groups.core.iter().any(|t| t.text == "migraine"));
        assert!(groups.modifier.iter().any(|t| t.text == "treatments"));
    }

    #[test]
    fn test_rare_terms_detected() {
        let groups = extract_concepts("effect of erenumab on chronic migraine");
        assert!(groups.rare.iter().any(|t| t.text == "erenumab"));
        assert!(groups.modifier.iter().any(|t| t.text == "erenumab"));

        let groups = extract_concepts("sglt2 inhibitors and heart failure");
        assert!(groups.rare.iter().any(|t| t.text == "sglt2"));
        assert!(groups.core.iter().any(|t| t.text.contains("failure")));
    }

    #[test]
    fn test_disease_suffix_classification() {
        let groups = extract_concepts("yoga for endometriosis");
        assert!(groups.core.iter().any(|t| t.text == "endometriosis"));
        assert!(groups.modifier.iter().any(|t| t.text == "yoga"));
    }

    #[test]
    fn test_meta_words_excluded() {
        let groups = extract_concepts("latest evidence on migraine treatments");
        assert!(groups.core.iter().any(|t| t.text == "migraine"));
        assert!(!groups
            .core
            .iter()
            .chain(groups.modifier.iter())
            .any(|t| t.text.contains("latest") || t.text.contains("evidence")));
    }

    #[test]
    fn test_variant_expansion() {
        let variants = expand_variants("migraine");
        assert!(variants.contains(&"migraines".to_string()));
        assert!(variants.contains(&"migraine headache".to_string()));

        // plural flip applies to the last word of a phrase
        let variants = expand_variants("mold exposure");
        assert!(variants.contains(&"mold exposures".to_string()));

        // irregular nouns are left alone
        assert!(expand_variants("diabetes").iter().all(|v| v != "diabete"));
    }
}
