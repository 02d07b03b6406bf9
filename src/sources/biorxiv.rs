//! bioRxiv/medRxiv preprint source adapter.
//!
//! Both servers expose the same details API behind different hostnames,
//! so one implementation covers the pair. The API has no text search of
//! its own: it pages through postings by date window, and query matching
//! happens client-side against title and abstract.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;

use crate::config::Config;
use crate::models::{DateRange, PublicationRecord, RecordBuilder, SourceId};
use crate::sources::{Source, SourceCapabilities, SourceError, SourceQuery, SourceResponse};
use crate::utils::{contains_phrase, content_words, source_retry_config, with_retry, HttpClient};

const BIORXIV_API_BASE: &str = "https://api.biorxiv.org";

/// Upper bound on postings scanned per search
const SCAN_CAP: usize = 500;

/// Window applied when the request carries no date range
const DEFAULT_WINDOW_DAYS: i64 = 730;

/// Earliest posting date the details route can return
const ARCHIVE_FLOOR: &str = "2013-01-01";

/// Which preprint server this adapter talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServerType {
    BioRxiv,
    MedRxiv,
}

impl ServerType {
    fn name(&self) -> &'static str {
        match self {
            ServerType::BioRxiv => "biorxiv",
            ServerType::MedRxiv => "medrxiv",
        }
    }

    fn display_name(&self) -> &'static str {
        match self {
            ServerType::BioRxiv => "bioRxiv",
            ServerType::MedRxiv => "medRxiv",
        }
    }

    fn source_id(&self) -> SourceId {
        match self {
            ServerType::BioRxiv => SourceId::BioRxiv,
            ServerType::MedRxiv => SourceId::MedRxiv,
        }
    }
}

/// Shared bioRxiv/medRxiv preprint source
#[derive(Debug, Clone)]
pub struct PreprintSource {
    client: Arc<HttpClient>,
    server: ServerType,
    base_url: String,
}

impl PreprintSource {
    /// Create a bioRxiv source from configuration
    pub fn biorxiv(config: &Config) -> Result<Self, SourceError> {
        Self::new(ServerType::BioRxiv, config)
    }

    /// Create a medRxiv source from configuration
    pub fn medrxiv(config: &Config) -> Result<Self, SourceError> {
        Self::new(ServerType::MedRxiv, config)
    }

    fn new(server: ServerType, config: &Config) -> Result<Self, SourceError> {
        Ok(Self {
            client: Arc::new(HttpClient::new()?.with_rate_limit(config.rate_limits.biorxiv_rps)),
            server,
            base_url: BIORXIV_API_BASE.to_string(),
        })
    }

    /// Point the adapter at a different endpoint (for testing)
    #[allow(dead_code)]
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, SourceError> {
        Ok(Self {
            client: Arc::new(HttpClient::new()?),
            server: ServerType::BioRxiv,
            base_url: base_url.into(),
        })
    }

    async fn fetch_page(
        &self,
        from: &str,
        to: &str,
        cursor: usize,
    ) -> Result<DetailsResponse, SourceError> {
        let url = format!(
            "{}/details/{}/{}/{}/{}",
            self.base_url,
            self.server.name(),
            from,
            to,
            cursor
        );
        let client = Arc::clone(&self.client);
        let display_name = self.server.display_name();

        let body = with_retry(source_retry_config(), || {
            let client = Arc::clone(&client);
            let url = url.clone();
            async move {
                let response = client.get(&url).send().await?;
                let status = response.status();
                if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    return Err(SourceError::RateLimit);
                }
                if !status.is_success() {
                    return Err(SourceError::Api(format!(
                        "{} API returned status: {}",
                        display_name, status
                    )));
                }
                response
                    .text()
                    .await
                    .map_err(|e| SourceError::Network(format!("failed to read response: {}", e)))
            }
        })
        .await?;

        Ok(serde_json::from_str(&body)?)
    }

    fn parse_posting(&self, posting: Posting) -> Option<PublicationRecord> {
        let title = posting
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        let Some(title) = title else {
            tracing::debug!(doi = ?posting.doi, "dropping preprint posting without title");
            return None;
        };
        let doi = posting
            .doi
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        let Some(doi) = doi else {
            tracing::debug!(title = %title, "dropping preprint posting without DOI");
            return None;
        };

        let url = format!(
            "https://www.{}.org/content/{}v{}",
            self.server.name(),
            doi,
            posting.version.as_deref().unwrap_or("1")
        );

        let authors: Vec<String> = posting
            .authors
            .unwrap_or_default()
            .split(';')
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();

        let mut builder = RecordBuilder::new(doi.clone(), title, url, self.server.source_id())
            .doi(doi)
            .authors(authors)
            .abstract_text(posting.r#abstract.unwrap_or_default());

        if let Some(date) = posting.date.as_deref().filter(|d| !d.trim().is_empty()) {
            builder = builder.published_iso(date);
        }
        if let Some(category) = posting.category.filter(|c| !c.trim().is_empty()) {
            builder = builder.keywords(vec![category]);
        }

        Some(builder.build())
    }

    fn matches_query(record: &PublicationRecord, terms: &[String]) -> bool {
        if terms.is_empty() {
            return true;
        }
        let haystack = format!("{} {}", record.title, record.abstract_text);
        terms.iter().all(|term| contains_phrase(&haystack, term))
    }
}

/// The details route needs concrete dates at both ends
fn date_window(range: &DateRange) -> (String, String) {
    let today = Utc::now().date_naive();
    let from = match range.from_year {
        Some(year) => format!("{:04}-01-01", year),
        None if range.to_year.is_some() => ARCHIVE_FLOOR.to_string(),
        None => (today - Duration::days(DEFAULT_WINDOW_DAYS))
            .format("%Y-%m-%d")
            .to_string(),
    };
    let to = match range.to_year {
        Some(year) => format!("{:04}-12-31", year),
        None => today.format("%Y-%m-%d").to_string(),
    };
    (from, to)
}

#[async_trait]
impl Source for PreprintSource {
    fn id(&self) -> &str {
        self.server.name()
    }

    fn name(&self) -> &str {
        self.server.display_name()
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH | SourceCapabilities::DATE_FILTER
    }

    async fn search(&self, query: &SourceQuery) -> Result<SourceResponse, SourceError> {
        let (from, to) = date_window(&query.date_range);
        let terms = content_words(&query.text);

        let mut matches = Vec::new();
        let mut cursor = 0usize;
        let mut window_total: Option<usize> = None;

        loop {
            let page = self.fetch_page(&from, &to, cursor).await?;
            if let Some(total) = page.messages.first().and_then(|m| m.total) {
                window_total = Some(total);
            }
            let count = page.collection.len();
            if count == 0 {
                break;
            }
            cursor += count;

            for posting in page.collection {
                if let Some(record) = self.parse_posting(posting) {
                    if Self::matches_query(&record, &terms) {
                        matches.push(record);
                    }
                }
            }

            if matches.len() >= query.limit || cursor >= SCAN_CAP {
                break;
            }
            if window_total.is_some_and(|total| cursor >= total) {
                break;
            }
        }

        if query.newest_first {
            matches.sort_by(|a, b| b.publication_date().cmp(&a.publication_date()));
        }
        matches.truncate(query.limit);

        // the window total counts every posting in the interval, not
        // matches, so the match count here is just what the scan found
        Ok(SourceResponse::new(matches))
    }
}

// ===== bioRxiv/medRxiv API types =====

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    #[serde(default)]
    collection: Vec<Posting>,
    #[serde(default)]
    messages: Vec<StatusMessage>,
}

#[derive(Debug, Deserialize)]
struct StatusMessage {
    total: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct Posting {
    doi: Option<String>,
    title: Option<String>,
    authors: Option<String>,
    date: Option<String>,
    category: Option<String>,
    version: Option<String>,
    r#abstract: Option<String>,
}
