//! Text normalization and phrase matching shared by dedup, gating,
//! and scoring.
//!
//! All matching is case-insensitive and punctuation-insensitive: text is
//! tokenized into lowercase alphanumeric words, so "low-dose" and
//! "Low Dose" compare equal and "dose" never matches inside "overdose".

/// Normalize a title for identity comparison: lowercase, strip
/// punctuation, collapse whitespace.
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercase alphanumeric words of `text`, with the byte offset where
/// each starts in the original string.
fn tokens(text: &str) -> Vec<(String, usize)> {
    let mut out = Vec::new();
    let mut word = String::new();
    let mut word_start = 0;
    for (i, c) in text.char_indices() {
        if c.is_alphanumeric() {
            if word.is_empty() {
                word_start = i;
            }
            word.extend(c.to_lowercase());
        } else if !word.is_empty() {
            out.push((std::mem::take(&mut word), word_start));
        }
    }
    if !word.is_empty() {
        out.push((word, word_start));
    }
    out
}

/// Lowercase alphanumeric words of `text`
pub fn words(text: &str) -> Vec<String> {
    tokens(text).into_iter().map(|(w, _)| w).collect()
}

/// Byte offsets of every word-boundary occurrence of `phrase` in `text`
pub fn phrase_positions(text: &str, phrase: &str) -> Vec<usize> {
    let needle = words(phrase);
    if needle.is_empty() {
        return Vec::new();
    }
    let toks = tokens(text);
    if toks.len() < needle.len() {
        return Vec::new();
    }

    let mut positions = Vec::new();
    for start in 0..=(toks.len() - needle.len()) {
        if needle
            .iter()
            .enumerate()
            .all(|(k, word)| toks[start + k].0 == *word)
        {
            positions.push(toks[start].1);
        }
    }
    positions
}

/// Count word-boundary occurrences of `phrase` in `text`
pub fn count_phrase(text: &str, phrase: &str) -> usize {
    phrase_positions(text, phrase).len()
}

/// Whether `phrase` occurs in `text` on word boundaries
pub fn contains_phrase(text: &str, phrase: &str) -> bool {
    !phrase_positions(text, phrase).is_empty()
}

/// Byte offset of the first word-boundary occurrence of `phrase`
pub fn find_phrase(text: &str, phrase: &str) -> Option<usize> {
    phrase_positions(text, phrase).into_iter().next()
}

/// Function words ignored when counting content words or extracting
/// concepts from a query.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "been", "between", "by", "can", "do", "does",
    "during", "for", "from", "has", "have", "how", "i", "if", "in", "into", "is", "it", "its",
    "more", "most", "my", "not", "of", "on", "or", "our", "over", "should", "such", "than",
    "that", "the", "their", "there", "these", "this", "those", "to", "under", "use", "versus",
    "vs", "was", "we", "were", "what", "when", "which", "while", "who", "why", "will", "with",
];

/// Whether `word` (already lowercased) is a function word
pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

/// Lowercase words of `text` with function words removed
pub fn content_words(text: &str) -> Vec<String> {
    words(text)
        .into_iter()
        .filter(|w| !is_stopword(w))
        .collect()
}
