//! Search request and query-plan types.

use serde::{Deserialize, Serialize};

/// Sort order requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Relevance,
    Date,
}

/// Inclusive publication-year window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub from_year: Option<i32>,
    pub to_year: Option<i32>,
}

impl DateRange {
    /// Parse a year filter string.
    ///
    /// Supported forms: "2020" (single year), "2018-2022" (range),
    /// "2010-" (from), "-2015" (until). Returns `None` for anything else.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }
        if let Some((from, to)) = s.split_once('-') {
            let from_year = if from.trim().is_empty() { None } else { Some(from.trim().parse().ok()?) };
            let to_year = if to.trim().is_empty() { None } else { Some(to.trim().parse().ok()?) };
            if from_year.is_none() && to_year.is_none() {
                return None;
            }
            if let (Some(f), Some(t)) = (from_year, to_year) {
                if f > t {
                    return None;
                }
            }
            Some(DateRange { from_year, to_year })
        } else {
            let year: i32 = s.parse().ok()?;
            Some(DateRange { from_year: Some(year), to_year: Some(year) })
        }
    }

    pub fn is_empty(&self) -> bool {
        self.from_year.is_none() && self.to_year.is_none()
    }

    /// Whether `year` falls inside the window (unbounded ends pass)
    pub fn contains(&self, year: i32) -> bool {
        self.from_year.map_or(true, |f| year >= f) && self.to_year.map_or(true, |t| year <= t)
    }
}

/// A search request as received from the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Free-text query
    pub query: String,

    /// Optional publication-year window
    #[serde(default)]
    pub date_range: DateRange,

    /// Requested ordering
    #[serde(default)]
    pub sort: SortBy,

    /// 1-based result page
    #[serde(default = "default_page")]
    pub page: usize,

    /// Results per page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Opaque personalization profile key, when the deployment has one
    #[serde(default)]
    pub profile: Option<String>,
}

fn default_page() -> usize {
    1
}

fn default_page_size() -> usize {
    10
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            date_range: DateRange::default(),
            sort: SortBy::default(),
            page: default_page(),
            page_size: default_page_size(),
            profile: None,
        }
    }

    /// Set the year window from a filter string ("2018-2022", "2010-", "-2015", "2020")
    pub fn years(mut self, filter: &str) -> Self {
        if let Some(range) = DateRange::parse(filter) {
            self.date_range = range;
        }
        self
    }

    pub fn date_range(mut self, range: DateRange) -> Self {
        self.date_range = range;
        self
    }

    pub fn sort(mut self, sort: SortBy) -> Self {
        self.sort = sort;
        self
    }

    pub fn page(mut self, page: usize) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = size.clamp(1, 100);
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }
}

/// A concept term with its accepted surface variants.
///
/// Matching any variant counts as matching the term, so synonym expansion
/// widens recall without inflating per-term presence ratios.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    /// Canonical form as extracted from the query
    pub text: String,
    /// Alternate surface forms (synonyms, singular/plural, hyphen variants)
    pub variants: Vec<String>,
}

impl Term {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), variants: Vec::new() }
    }

    pub fn with_variants(text: impl Into<String>, variants: Vec<String>) -> Self {
        Self { text: text.into(), variants }
    }

    /// All surface forms, canonical first
    pub fn forms(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.text.as_str()).chain(self.variants.iter().map(|s| s.as_str()))
    }

    /// Word count of the canonical form
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// A recognized publication identifier pasted as the whole query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Identifier {
    Pmid(String),
    Pmcid(String),
    Doi(String),
    TrialRegistration(String),
}

impl Identifier {
    pub fn value(&self) -> &str {
        match self {
            Identifier::Pmid(s)
            | Identifier::Pmcid(s)
            | Identifier::Doi(s)
            | Identifier::TrialRegistration(s) => s,
        }
    }
}

/// What kind of query the caller typed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryKind {
    /// A bare identifier (PMID, PMCID, DOI, trial registration number)
    Identifier(Identifier),
    /// A pasted article title (long, title-cased, no question cues)
    TitlePaste,
    /// An ordinary topical query
    Topic,
}

/// Detected intent for a query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub kind: QueryKind,
    /// Caller signalled a preference for recent work ("latest", "recent", ...)
    pub wants_recent: bool,
}

/// Everything retrieval and scoring need to know about one query.
///
/// Built once per request by the query analyzer and shared read-only by
/// the retrieval, gating, and scoring stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryPlan {
    /// The raw query as typed
    pub raw: String,

    /// Detected intent
    pub intent: Intent,

    /// Core subject terms (conditions, outcomes, populations)
    pub core_terms: Vec<Term>,

    /// Modifier terms (interventions, exposures, study qualifiers)
    pub modifier_terms: Vec<Term>,

    /// Rare or highly specific terms, used to sharpen the strictest tier
    pub rare_terms: Vec<Term>,

    /// Query contained explicit field tags and is passed through untouched
    pub has_field_tags: bool,

    /// Strictest query string for the primary source
    pub primary_tier1: String,

    /// Widened query string for the primary source (and plain-text fan-out)
    pub primary_tier2: String,

    /// Plain text sent to secondary sources
    pub broad_text: String,
}

impl QueryPlan {
    /// A plan is multi-concept when it has both core and modifier terms;
    /// gating and tiered retrieval only engage for multi-concept queries.
    pub fn is_multi_concept(&self) -> bool {
        !self.core_terms.is_empty() && !self.modifier_terms.is_empty()
    }

    /// All extracted terms across groups
    pub fn all_terms(&self) -> impl Iterator<Item = &Term> {
        self.core_terms
            .iter()
            .chain(self.modifier_terms.iter())
            .chain(self.rare_terms.iter())
    }

    /// The term chosen to sharpen tier 1: first rare term, else the
    /// longest modifier term by word count.
    pub fn specificity_term(&self) -> Option<&Term> {
        self.rare_terms.first().or_else(|| {
            self.modifier_terms
                .iter()
                .max_by_key(|t| (t.word_count(), t.text.len()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_range_parse() {
        assert_eq!(
            DateRange::parse("2018-2022"),
            Some(DateRange { from_year: Some(2018), to_year: Some(2022) })
        );
        assert_eq!(
            DateRange::parse("2010-"),
            Some(DateRange { from_year: Some(2010), to_year: None })
        );
        assert_eq!(
            DateRange::parse("-2015"),
            Some(DateRange { from_year: None, to_year: Some(2015) })
        );
        assert_eq!(
            DateRange::parse("2020"),
            Some(DateRange { from_year: Some(2020), to_year: Some(2020) })
        );
        assert_eq!(DateRange::parse(""), None);
        assert_eq!(DateRange::parse("-"), None);
        assert_eq!(DateRange::parse("2022-2018"), None);
        assert_eq!(DateRange::parse("abc"), None);
    }

    #[test]
    fn test_date_range_contains() {
        let range = DateRange::parse("2018-2022").unwrap();
        assert!(range.contains(2018));
        assert!(range.contains(2022));
        assert!(!range.contains(2017));
        assert!(!range.contains(2023));

        let open = DateRange::parse("2010-").unwrap();
        assert!(open.contains(2024));
        assert!(!open.contains(2009));
    }

    #[test]
    fn test_request_builder() {
        let req = SearchRequest::new("statin therapy outcomes")
            .years("2018-2022")
            .sort(SortBy::Date)
            .page(2)
            .page_size(25);
        assert_eq!(req.date_range.from_year, Some(2018));
        assert_eq!(req.sort, SortBy::Date);
        assert_eq!(req.page, 2);
        assert_eq!(req.page_size, 25);
    }

    #[test]
    fn test_page_size_clamped() {
        let req = SearchRequest::new("x").page_size(500).page(0);
        assert_eq!(req.page_size, 100);
        assert_eq!(req.page, 1);
    }

    #[test]
    fn test_term_forms() {
        let term = Term::with_variants("migraine", vec!["migraines".into(), "migraine headache".into()]);
        let forms: Vec<&str> = term.forms().collect();
        assert_eq!(forms, vec!["migraine", "migraines", "migraine headache"]);
    }

    #[test]
    fn test_specificity_term_prefers_rare() {
        let plan = QueryPlan {
            raw: String::new(),
            intent: Intent { kind: QueryKind::Topic, wants_recent: false },
            core_terms: vec![Term::new("migraine")],
            modifier_terms: vec![Term::new("aerobic exercise"), Term::new("yoga")],
            rare_terms: vec![Term::new("erenumab")],
            has_field_tags: false,
            primary_tier1: String::new(),
            primary_tier2: String::new(),
            broad_text: String::new(),
        };
        assert_eq!(plan.specificity_term().unwrap().text, "erenumab");
        assert!(plan.is_multi_concept());

        let no_rare = QueryPlan { rare_terms: vec![], ..plan };
        assert_eq!(no_rare.specificity_term().unwrap().text, "aerobic exercise");
    }
}
