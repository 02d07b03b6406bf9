//! Publication record model shared by all source adapters.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The upstream service a record came from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    PubMed,
    OpenAlex,
    SemanticScholar,
    BioRxiv,
    MedRxiv,
    #[serde(untagged)]
    Other(String),
}

/// Coarse source class used for per-source relevance floors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceClass {
    /// The primary indexed-literature source
    Primary,
    /// Any non-primary, non-preprint source
    Secondary,
    /// Preprint servers (held to a higher relevance floor)
    Preprint,
}

impl SourceId {
    /// Returns the display name of the source
    pub fn name(&self) -> &str {
        match self {
            SourceId::PubMed => "PubMed",
            SourceId::OpenAlex => "OpenAlex",
            SourceId::SemanticScholar => "Semantic Scholar",
            SourceId::BioRxiv => "bioRxiv",
            SourceId::MedRxiv => "medRxiv",
            SourceId::Other(s) => s,
        }
    }

    /// Returns the source identifier (for registry keys and diagnostics)
    pub fn id(&self) -> &str {
        match self {
            SourceId::PubMed => "pubmed",
            SourceId::OpenAlex => "openalex",
            SourceId::SemanticScholar => "semantic",
            SourceId::BioRxiv => "biorxiv",
            SourceId::MedRxiv => "medrxiv",
            SourceId::Other(s) => s,
        }
    }

    /// Class of this source for threshold purposes
    pub fn class(&self) -> SourceClass {
        match self {
            SourceId::PubMed => SourceClass::Primary,
            SourceId::BioRxiv | SourceId::MedRxiv => SourceClass::Preprint,
            _ => SourceClass::Secondary,
        }
    }

    /// Whether this is the primary indexed-literature source
    pub fn is_primary(&self) -> bool {
        self.class() == SourceClass::Primary
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Normalize a DOI: strip resolver prefixes, lowercase.
///
/// Returns `None` for anything that does not look like a DOI after
/// normalization, so malformed upstream values never become identity keys.
pub fn normalize_doi(raw: &str) -> Option<String> {
    let mut s = raw.trim();
    for prefix in ["https://doi.org/", "http://doi.org/", "https://dx.doi.org/", "doi:"] {
        if let Some(rest) = strip_prefix_ignore_case(s, prefix) {
            s = rest;
            break;
        }
    }
    let s = s.trim();
    if s.is_empty() || !s.starts_with("10.") {
        return None;
    }
    Some(s.to_lowercase())
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    // get() rejects a split inside a multi-byte char, not just short input
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

/// A publication record from any source, normalized into a shared shape
///
/// Adapters map their native schema into this struct; downstream stages
/// (dedup, gating, scoring, ranking) never branch on source-specific shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicationRecord {
    /// Source-native identifier (PMID, OpenAlex ID, S2 paper ID, DOI, ...)
    pub id: String,

    /// Record title
    pub title: String,

    /// Plain-text abstract (already reconstructed from any non-linear form)
    pub abstract_text: String,

    /// Author display names
    pub authors: Vec<String>,

    /// Journal or venue name
    pub journal: Option<String>,

    /// Publication year
    pub year: Option<i32>,

    /// Publication month (1-12)
    pub month: Option<u32>,

    /// Publication day of month
    pub day: Option<u32>,

    /// Normalized DOI (lowercase, no resolver prefix)
    pub doi: Option<String>,

    /// Record page URL
    pub url: String,

    /// Source where the record was found
    pub source: SourceId,

    /// Citation count, when the source provides one
    pub citation_count: Option<u32>,

    /// Source-provided influence metric (e.g. influential citation count)
    pub influence_metric: Option<f64>,

    /// Author or indexer keywords
    pub keywords: Vec<String>,

    /// Major subject headings (curated indexing terms, e.g. MeSH major topics)
    pub major_subjects: Vec<String>,
}

impl PublicationRecord {
    /// Create a new record with required fields
    pub fn new(id: String, title: String, url: String, source: SourceId) -> Self {
        Self {
            id,
            title,
            abstract_text: String::new(),
            authors: Vec::new(),
            journal: None,
            year: None,
            month: None,
            day: None,
            doi: None,
            url,
            source,
            citation_count: None,
            influence_metric: None,
            keywords: Vec::new(),
            major_subjects: Vec::new(),
        }
    }

    /// Returns the primary identifier for this record (DOI if available, else id)
    pub fn primary_id(&self) -> &str {
        self.doi.as_deref().unwrap_or(&self.id)
    }

    /// Publication date, defaulting missing month/day to January 1st
    pub fn publication_date(&self) -> Option<NaiveDate> {
        let year = self.year?;
        NaiveDate::from_ymd_opt(year, self.month.unwrap_or(1), self.day.unwrap_or(1))
    }

    /// Age in years relative to `as_of`, `None` when undated
    pub fn age_years(&self, as_of: NaiveDate) -> Option<f64> {
        let date = self.publication_date()?;
        let days = (as_of - date).num_days().max(0);
        Some(days as f64 / 365.25)
    }
}

/// Builder for constructing PublicationRecord objects
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    record: PublicationRecord,
}

impl RecordBuilder {
    /// Create a new builder with required fields
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        source: SourceId,
    ) -> Self {
        Self {
            record: PublicationRecord::new(id.into(), title.into(), url.into(), source),
        }
    }

    /// Set abstract text
    pub fn abstract_text(mut self, text: impl Into<String>) -> Self {
        self.record.abstract_text = text.into();
        self
    }

    /// Set authors
    pub fn authors(mut self, authors: Vec<String>) -> Self {
        self.record.authors = authors;
        self
    }

    /// Set journal/venue
    pub fn journal(mut self, journal: impl Into<String>) -> Self {
        self.record.journal = Some(journal.into());
        self
    }

    /// Set publication date parts; month/day may be zero for "unknown"
    pub fn published(mut self, year: i32, month: u32, day: u32) -> Self {
        self.record.year = Some(year);
        self.record.month = (month > 0).then_some(month);
        self.record.day = (day > 0).then_some(day);
        self
    }

    /// Set publication year only
    pub fn year(mut self, year: i32) -> Self {
        self.record.year = Some(year);
        self
    }

    /// Set the publication date from an ISO "YYYY-MM-DD" string; partial
    /// values keep whatever parses (a bare "2021" sets the year only)
    pub fn published_iso(mut self, date: &str) -> Self {
        let mut parts = date.trim().splitn(3, '-');
        let year = parts.next().and_then(|y| y.parse().ok());
        let month = parts.next().and_then(|m| m.parse().ok());
        let day = parts.next().and_then(|d| d.parse().ok());
        if let Some(year) = year {
            self.record.year = Some(year);
            self.record.month = month.filter(|m| (1..=12).contains(m));
            self.record.day = day.filter(|d| (1..=31).contains(d));
        }
        self
    }

    /// Set DOI; the value is normalized, junk is discarded
    pub fn doi(mut self, doi: impl AsRef<str>) -> Self {
        self.record.doi = normalize_doi(doi.as_ref());
        self
    }

    /// Set citation count
    pub fn citation_count(mut self, count: u32) -> Self {
        self.record.citation_count = Some(count);
        self
    }

    /// Set external influence metric
    pub fn influence_metric(mut self, value: f64) -> Self {
        self.record.influence_metric = Some(value);
        self
    }

    /// Set keywords
    pub fn keywords(mut self, keywords: Vec<String>) -> Self {
        self.record.keywords = keywords;
        self
    }

    /// Set major subject headings
    pub fn major_subjects(mut self, subjects: Vec<String>) -> Self {
        self.record.major_subjects = subjects;
        self
    }

    /// Build the PublicationRecord
    pub fn build(self) -> PublicationRecord {
        self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_builder() {
        let record = RecordBuilder::new(
            "34567890",
            "Exercise and Migraine Frequency",
            "https://pubmed.ncbi.nlm.nih.gov/34567890/",
            SourceId::PubMed,
        )
        .authors(vec!["Jane Doe".into(), "John Smith".into()])
        .abstract_text("Background: migraines are common.")
        .doi("10.1234/test.1234")
        .published(2021, 6, 15)
        .citation_count(42)
        .major_subjects(vec!["Migraine Disorders".into()])
        .build();

        assert_eq!(record.id, "34567890");
        assert_eq!(record.doi, Some("10.1234/test.1234".to_string()));
        assert_eq!(record.citation_count, Some(42));
        assert_eq!(record.year, Some(2021));
    }

    #[test]
    fn test_published_iso() {
        let record = RecordBuilder::new("1", "T", "u", SourceId::OpenAlex)
            .published_iso("2021-06-15")
            .build();
        assert_eq!((record.year, record.month, record.day), (Some(2021), Some(6), Some(15)));

        let year_only = RecordBuilder::new("2", "T", "u", SourceId::OpenAlex)
            .published_iso("2021")
            .build();
        assert_eq!((year_only.year, year_only.month), (Some(2021), None));

        let junk = RecordBuilder::new("3", "T", "u", SourceId::OpenAlex)
            .published_iso("n/a")
            .build();
        assert_eq!(junk.year, None);
    }

    #[test]
    fn test_normalize_doi() {
        assert_eq!(
            normalize_doi("https://doi.org/10.1234/ABC.5"),
            Some("10.1234/abc.5".to_string())
        );
        assert_eq!(normalize_doi("doi:10.1101/2024.01.01"), Some("10.1101/2024.01.01".to_string()));
        assert_eq!(normalize_doi("  10.99/x  "), Some("10.99/x".to_string()));
        assert_eq!(normalize_doi(""), None);
        assert_eq!(normalize_doi("not-a-doi"), None);
        assert_eq!(normalize_doi("https://doi.org/"), None);
        // non-ASCII input whose bytes straddle a prefix length must not panic
        assert_eq!(normalize_doi("0123456789abcdeé"), None);
    }

    #[test]
    fn test_primary_id() {
        let with_doi = RecordBuilder::new("1234", "T", "https://example.com", SourceId::OpenAlex)
            .doi("10.1234/test")
            .build();
        assert_eq!(with_doi.primary_id(), "10.1234/test");

        let without_doi =
            PublicationRecord::new("1234".into(), "T".into(), "https://example.com".into(), SourceId::OpenAlex);
        assert_eq!(without_doi.primary_id(), "1234");
    }

    #[test]
    fn test_age_years() {
        let record = RecordBuilder::new("1", "T", "u", SourceId::PubMed)
            .published(2020, 1, 1)
            .build();
        let as_of = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let age = record.age_years(as_of).unwrap();
        assert!((age - 4.0).abs() < 0.01);

        let undated = RecordBuilder::new("2", "T", "u", SourceId::PubMed).build();
        assert!(undated.age_years(as_of).is_none());
    }

    #[test]
    fn test_source_class() {
        assert_eq!(SourceId::PubMed.class(), SourceClass::Primary);
        assert_eq!(SourceId::OpenAlex.class(), SourceClass::Secondary);
        assert_eq!(SourceId::SemanticScholar.class(), SourceClass::Secondary);
        assert_eq!(SourceId::BioRxiv.class(), SourceClass::Preprint);
        assert_eq!(SourceId::Other("mock".into()).class(), SourceClass::Secondary);
    }
}
