//! Semantic Scholar source adapter.
//!
//! Besides search, this adapter is the citation-metrics provider: the
//! Graph API's batch endpoint resolves DOIs and PMIDs in one request,
//! which is how the page window gets citation counts filled in.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Config;
use crate::enrich::{CitationInfo, CitationMetrics};
use crate::models::{DateRange, PublicationRecord, RecordBuilder, SourceId};
use crate::sources::{
    Source, SourceCapabilities, SourceError, SourceQuery, SourceResponse,
};
use crate::utils::{source_retry_config, with_retry, HttpClient};

const SEMANTIC_API_BASE: &str = "https://api.semanticscholar.org/graph/v1";

const SEARCH_FIELDS: &str = "title,abstract,year,publicationDate,venue,url,citationCount,influentialCitationCount,externalIds,authors";
const BATCH_FIELDS: &str = "citationCount,influentialCitationCount";

/// Semantic Scholar source
///
/// An API key raises the shared public rate limit to a dedicated one.
#[derive(Debug, Clone)]
pub struct SemanticScholarSource {
    client: Arc<HttpClient>,
    api_key: Option<String>,
    base_url: String,
}

impl SemanticScholarSource {
    /// Create a new Semantic Scholar source from configuration
    pub fn new(config: &Config) -> Result<Self, SourceError> {
        Ok(Self {
            client: Arc::new(
                HttpClient::new()?.with_rate_limit(config.rate_limits.semantic_scholar_rps),
            ),
            api_key: config.api_keys.semantic_scholar.clone(),
            base_url: SEMANTIC_API_BASE.to_string(),
        })
    }

    /// Point the adapter at a different endpoint (for testing)
    #[allow(dead_code)]
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, SourceError> {
        Ok(Self {
            client: Arc::new(HttpClient::new()?),
            api_key: None,
            base_url: base_url.into(),
        })
    }

    fn build_search_params(query: &SourceQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("query", query.text.clone()),
            ("limit", query.limit.to_string()),
            ("fields", SEARCH_FIELDS.to_string()),
        ];
        if let Some(year) = year_param(&query.date_range) {
            params.push(("year", year));
        }
        params
    }

    async fn read_body(response: reqwest::Response) -> Result<String, SourceError> {
        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::RateLimit);
        }
        if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            return Err(SourceError::Api("Semantic Scholar unavailable".to_string()));
        }
        if !status.is_success() {
            return Err(SourceError::Api(format!(
                "Semantic Scholar returned status: {}",
                status
            )));
        }
        response
            .text()
            .await
            .map_err(|e| SourceError::Network(format!("failed to read response: {}", e)))
    }

    fn parse_paper(paper: S2Paper) -> Option<PublicationRecord> {
        let title = paper
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        let Some(title) = title else {
            tracing::debug!(paper = ?paper.paper_id, "dropping Semantic Scholar record without title");
            return None;
        };

        let id = paper.paper_id.unwrap_or_default();
        let doi = paper.external_ids.and_then(|e| e.doi);
        let url = paper.url.unwrap_or_else(|| {
            doi.as_deref()
                .map(|d| format!("https://doi.org/{}", d))
                .unwrap_or_default()
        });

        let authors: Vec<String> = paper.authors.into_iter().filter_map(|a| a.name).collect();

        let mut builder = RecordBuilder::new(id, title, url, SourceId::SemanticScholar)
            .authors(authors)
            .abstract_text(paper.r#abstract.unwrap_or_default());

        if let Some(doi) = doi {
            builder = builder.doi(doi);
        }
        if let Some(date) = paper.publication_date.as_deref().filter(|d| !d.trim().is_empty()) {
            builder = builder.published_iso(date);
        } else if let Some(year) = paper.year {
            builder = builder.year(year);
        }
        if let Some(count) = paper.citation_count {
            builder = builder.citation_count(count);
        }
        if let Some(influential) = paper.influential_citation_count {
            builder = builder.influence_metric(influential as f64);
        }
        if let Some(venue) = paper.venue.filter(|v| !v.trim().is_empty()) {
            builder = builder.journal(venue);
        }

        Some(builder.build())
    }

    /// External id the batch endpoint understands for a record, if any
    fn batch_id(record: &PublicationRecord) -> Option<String> {
        if let Some(doi) = &record.doi {
            return Some(format!("DOI:{}", doi));
        }
        match record.source {
            SourceId::SemanticScholar => Some(record.id.clone()),
            SourceId::PubMed => Some(format!("PMID:{}", record.id)),
            _ => None,
        }
    }
}

/// Semantic Scholar takes a single `year` parameter in "from-to" form
fn year_param(range: &DateRange) -> Option<String> {
    match (range.from_year, range.to_year) {
        (None, None) => None,
        (Some(from), Some(to)) if from == to => Some(from.to_string()),
        (from, to) => Some(format!(
            "{}-{}",
            from.map(|y| y.to_string()).unwrap_or_default(),
            to.map(|y| y.to_string()).unwrap_or_default()
        )),
    }
}

#[async_trait]
impl Source for SemanticScholarSource {
    fn id(&self) -> &str {
        "semantic"
    }

    fn name(&self) -> &str {
        "Semantic Scholar"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
            | SourceCapabilities::DATE_FILTER
            | SourceCapabilities::CITATION_METRICS
    }

    async fn search(&self, query: &SourceQuery) -> Result<SourceResponse, SourceError> {
        let url = format!("{}/paper/search", self.base_url);
        let params = Self::build_search_params(query);
        let client = Arc::clone(&self.client);
        let api_key = self.api_key.clone();

        let body = with_retry(source_retry_config(), || {
            let client = Arc::clone(&client);
            let url = url.clone();
            let params = params.clone();
            let api_key = api_key.clone();
            async move {
                let mut request = client.get(&url).query(&params);
                if let Some(key) = &api_key {
                    request = request.header("x-api-key", key);
                }
                let response = request.send().await?;
                Self::read_body(response).await
            }
        })
        .await?;

        let data: S2SearchResponse = serde_json::from_str(&body)?;

        let records: Vec<PublicationRecord> = data
            .data
            .into_iter()
            .filter_map(Self::parse_paper)
            .collect();

        let mut response = SourceResponse::new(records);
        if let Some(total) = data.total {
            response = response.with_total(total);
        }
        Ok(response)
    }
}

#[async_trait]
impl CitationMetrics for SemanticScholarSource {
    async fn metrics_for(
        &self,
        records: &[PublicationRecord],
    ) -> Result<HashMap<String, CitationInfo>, SourceError> {
        let mut ids = Vec::new();
        let mut keys = Vec::new();
        for record in records {
            if let Some(external) = Self::batch_id(record) {
                ids.push(external);
                keys.push(record.primary_id().to_string());
            }
        }
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let url = format!("{}/paper/batch", self.base_url);
        let request_body = serde_json::json!({ "ids": ids });
        let client = Arc::clone(&self.client);
        let api_key = self.api_key.clone();

        let body = with_retry(source_retry_config(), || {
            let client = Arc::clone(&client);
            let url = url.clone();
            let request_body = request_body.clone();
            let api_key = api_key.clone();
            async move {
                let mut request = client
                    .post(&url)
                    .query(&[("fields", BATCH_FIELDS)])
                    .json(&request_body);
                if let Some(key) = &api_key {
                    request = request.header("x-api-key", key);
                }
                let response = request.send().await?;
                Self::read_body(response).await
            }
        })
        .await?;

        // the response array aligns with the request ids; unresolved
        // entries come back as null
        let papers: Vec<Option<BatchPaper>> = serde_json::from_str(&body)?;

        let mut metrics = HashMap::new();
        for (key, paper) in keys.into_iter().zip(papers) {
            let Some(paper) = paper else { continue };
            metrics.insert(
                key,
                CitationInfo {
                    citation_count: paper.citation_count,
                    influence_metric: paper.influential_citation_count.map(|c| c as f64),
                },
            );
        }
        Ok(metrics)
    }
}

// ===== Semantic Scholar API types =====

#[derive(Debug, Deserialize)]
struct S2SearchResponse {
    total: Option<usize>,
    #[serde(default)]
    data: Vec<S2Paper>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct S2Paper {
    paper_id: Option<String>,
    title: Option<String>,
    r#abstract: Option<String>,
    year: Option<i32>,
    publication_date: Option<String>,
    venue: Option<String>,
    url: Option<String>,
    citation_count: Option<u32>,
    influential_citation_count: Option<u32>,
    external_ids: Option<ExternalIds>,
    #[serde(default)]
    authors: Vec<S2Author>,
}

#[derive(Debug, Deserialize)]
struct ExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2Author {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchPaper {
    citation_count: Option<u32>,
    influential_citation_count: Option<u32>,
}
