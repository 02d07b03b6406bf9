//! OpenAlex source adapter.
//!
//! OpenAlex stores abstracts as an inverted index (word to positions),
//! so the adapter reconstructs plain text before handing records on.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Config;
use crate::models::{Identifier, PublicationRecord, RecordBuilder, SourceId};
use crate::sources::{
    Source, SourceCapabilities, SourceError, SourceQuery, SourceResponse,
};
use crate::utils::{source_retry_config, with_retry, HttpClient};

const OPENALEX_API_BASE: &str = "https://api.openalex.org";

/// OpenAlex source
///
/// A contact email puts requests in OpenAlex's polite pool, which has
/// better rate limits than the anonymous pool.
#[derive(Debug, Clone)]
pub struct OpenAlexSource {
    client: Arc<HttpClient>,
    email: Option<String>,
    base_url: String,
}

impl OpenAlexSource {
    /// Create a new OpenAlex source from configuration
    pub fn new(config: &Config) -> Result<Self, SourceError> {
        Ok(Self {
            client: Arc::new(HttpClient::new()?.with_rate_limit(config.rate_limits.openalex_rps)),
            email: config.api_keys.contact_email.clone(),
            base_url: OPENALEX_API_BASE.to_string(),
        })
    }

    /// Point the adapter at a different endpoint (for testing)
    #[allow(dead_code)]
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, SourceError> {
        Ok(Self {
            client: Arc::new(HttpClient::new()?),
            email: None,
            base_url: base_url.into(),
        })
    }

    fn build_search_params(&self, query: &SourceQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("search", query.text.clone()),
            ("per-page", query.limit.to_string()),
            ("page", "1".to_string()),
        ];

        let mut filters = Vec::new();
        if let Some(from) = query.date_range.from_year {
            filters.push(format!("from_publication_date:{}-01-01", from));
        }
        if let Some(to) = query.date_range.to_year {
            filters.push(format!("to_publication_date:{}-12-31", to));
        }
        if !filters.is_empty() {
            params.push(("filter", filters.join(",")));
        }

        if query.newest_first {
            params.push(("sort", "publication_date:desc".to_string()));
        }
        if let Some(email) = &self.email {
            params.push(("mailto", email.clone()));
        }

        params
    }

    async fn get_body(
        &self,
        url: String,
        params: Vec<(&'static str, String)>,
    ) -> Result<String, SourceError> {
        let client = Arc::clone(&self.client);
        with_retry(source_retry_config(), || {
            let client = Arc::clone(&client);
            let url = url.clone();
            let params = params.clone();
            async move {
                let response = client.get(&url).query(&params).send().await?;
                let status = response.status();
                if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    return Err(SourceError::RateLimit);
                }
                if status == reqwest::StatusCode::NOT_FOUND {
                    return Err(SourceError::NotFound("OpenAlex record not found".to_string()));
                }
                if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
                    return Err(SourceError::Api("OpenAlex unavailable".to_string()));
                }
                if !status.is_success() {
                    return Err(SourceError::Api(format!(
                        "OpenAlex returned status: {}",
                        status
                    )));
                }
                response
                    .text()
                    .await
                    .map_err(|e| SourceError::Network(format!("failed to read response: {}", e)))
            }
        })
        .await
    }

    fn parse_work(work: Work) -> Option<PublicationRecord> {
        let title = work
            .title
            .or(work.display_name)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        let Some(title) = title else {
            tracing::debug!(work = ?work.id, "dropping OpenAlex record without title");
            return None;
        };

        let full_id = work.id.unwrap_or_default();
        let id = full_id.rsplit('/').next().unwrap_or(&full_id).to_string();
        let url = if full_id.is_empty() { String::new() } else { full_id.clone() };

        let authors: Vec<String> = work
            .authorships
            .iter()
            .filter_map(|a| a.author.as_ref()?.display_name.clone())
            .collect();

        let abstract_text = work
            .abstract_inverted_index
            .as_ref()
            .map(reconstruct_abstract)
            .unwrap_or_default();

        let journal = work
            .primary_location
            .as_ref()
            .and_then(|l| l.source.as_ref())
            .and_then(|s| s.display_name.clone());

        let keywords: Vec<String> = work
            .keywords
            .iter()
            .filter_map(|k| k.display_name.clone())
            .collect();

        let mut builder = RecordBuilder::new(id, title, url, SourceId::OpenAlex)
            .authors(authors)
            .abstract_text(abstract_text)
            .keywords(keywords);

        if let Some(doi) = work.doi {
            builder = builder.doi(doi);
        }
        if let Some(date) = work.publication_date.as_deref().filter(|d| !d.trim().is_empty()) {
            builder = builder.published_iso(date);
        } else if let Some(year) = work.publication_year {
            builder = builder.year(year);
        }
        if let Some(count) = work.cited_by_count {
            builder = builder.citation_count(count);
        }
        if let Some(journal) = journal {
            builder = builder.journal(journal);
        }

        Some(builder.build())
    }
}

/// Rebuild abstract text from OpenAlex's word-to-positions index
fn reconstruct_abstract(index: &HashMap<String, Vec<usize>>) -> String {
    let mut positions: Vec<(usize, &str)> = Vec::new();
    for (word, offsets) in index {
        for &pos in offsets {
            positions.push((pos, word.as_str()));
        }
    }
    positions.sort_unstable_by_key(|(pos, _)| *pos);
    positions
        .into_iter()
        .map(|(_, word)| word)
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl Source for OpenAlexSource {
    fn id(&self) -> &str {
        "openalex"
    }

    fn name(&self) -> &str {
        "OpenAlex"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
            | SourceCapabilities::DATE_FILTER
            | SourceCapabilities::IDENTIFIER_LOOKUP
    }

    async fn search(&self, query: &SourceQuery) -> Result<SourceResponse, SourceError> {
        let url = format!("{}/works", self.base_url);
        let body = self.get_body(url, self.build_search_params(query)).await?;
        let data: WorksResponse = serde_json::from_str(&body)?;

        let records: Vec<PublicationRecord> = data
            .results
            .into_iter()
            .filter_map(Self::parse_work)
            .collect();

        let mut response = SourceResponse::new(records);
        if let Some(count) = data.meta.and_then(|m| m.count) {
            response = response.with_total(count);
        }
        Ok(response)
    }

    async fn lookup(&self, id: &Identifier) -> Result<Vec<PublicationRecord>, SourceError> {
        let Identifier::Doi(doi) = id else {
            return Err(SourceError::NotImplemented);
        };

        let url = format!("{}/works/doi:{}", self.base_url, urlencoding::encode(doi));
        let mut params = Vec::new();
        if let Some(email) = &self.email {
            params.push(("mailto", email.clone()));
        }

        let body = self.get_body(url, params).await?;
        let work: Work = serde_json::from_str(&body)?;

        Self::parse_work(work)
            .map(|record| vec![record])
            .ok_or_else(|| SourceError::NotFound(format!("no usable record for DOI {}", doi)))
    }
}

// ===== OpenAlex API types =====

#[derive(Debug, Deserialize)]
struct WorksResponse {
    #[serde(default)]
    results: Vec<Work>,
    meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
struct Meta {
    count: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct Work {
    id: Option<String>,
    title: Option<String>,
    display_name: Option<String>,
    publication_year: Option<i32>,
    publication_date: Option<String>,
    doi: Option<String>,
    cited_by_count: Option<u32>,
    abstract_inverted_index: Option<HashMap<String, Vec<usize>>>,
    #[serde(default)]
    authorships: Vec<Authorship>,
    primary_location: Option<Location>,
    #[serde(default)]
    keywords: Vec<Keyword>,
}

#[derive(Debug, Deserialize)]
struct Authorship {
    author: Option<AuthorInfo>,
}

#[derive(Debug, Deserialize)]
struct AuthorInfo {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Location {
    source: Option<LocationSource>,
}

#[derive(Debug, Deserialize)]
struct LocationSource {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Keyword {
    display_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORK_JSON: &str = r#"{
        "id": "https://openalex.org/W2741809807",
        "title": "Exercise interventions in chronic migraine",
        "publication_year": 2021,
        "publication_date": "2021-06-15",
        "doi": "https://doi.org/10.1177/0333102421",
        "cited_by_count": 93,
        "abstract_inverted_index": {
            "Exercise": [0],
            "reduces": [1],
            "migraine": [2, 5],
            "frequency": [3],
            "in": [4],
            "patients.": [6]
        },
        "authorships": [
            {"author": {"display_name": "Jane Doe"}},
            {"author": {"display_name": "John Smith"}}
        ],
        "primary_location": {"source": {"display_name": "Cephalalgia"}},
        "keywords": [{"display_name": "Migraine"}, {"display_name": "Aerobic exercise"}]
    }"#;

    #[test]
    fn test_reconstruct_abstract() {
        let mut index = HashMap::new();
        index.insert("migraine".to_string(), vec![2]);
        index.insert("Exercise".to_string(), vec![0]);
        index.insert("reduces".to_string(), vec![1]);

        assert_eq!(reconstruct_abstract(&index), "Exercise reduces migraine");
    }

    #[test]
    fn test_parse_work() {
        let work: Work = serde_json::from_str(WORK_JSON).unwrap();
        let record = OpenAlexSource::parse_work(work).unwrap();

        assert_eq!(record.id, "W2741809807");
        assert_eq!(record.title, "Exercise interventions in chronic migraine");
        assert_eq!(record.doi.as_deref(), Some("10.1177/0333102421"));
        assert_eq!(record.year, Some(2021));
        assert_eq!(record.month, Some(6));
        assert_eq!(record.day, Some(15));
        assert_eq!(record.citation_count, Some(93));
        assert_eq!(record.journal.as_deref(), Some("Cephalalgia"));
        assert_eq!(
            record.abstract_text,
            "Exercise reduces migraine frequency in migraine patients."
        );
        assert_eq!(record.keywords, vec!["Migraine", "Aerobic exercise"]);
    }

    #[test]
    fn test_parse_work_drops_untitled() {
        let work: Work = serde_json::from_str(r#"{"id": "https://openalex.org/W1"}"#).unwrap();
        assert!(OpenAlexSource::parse_work(work).is_none());
    }

    #[test]
    fn test_build_search_params_with_dates() {
        let source = OpenAlexSource::with_base_url("http://localhost").unwrap();
        let query = SourceQuery::new("migraine mold exposure")
            .limit(30)
            .date_range(crate::models::DateRange::parse("2018-2022").unwrap());

        let params = source.build_search_params(&query);
        assert!(params.contains(&(
            "filter",
            "from_publication_date:2018-01-01,to_publication_date:2022-12-31".to_string()
        )));
        assert!(params.contains(&("per-page", "30".to_string())));
    }

    #[tokio::test]
    async fn test_search_end_to_end() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/works")
            .match_query(mockito::Matcher::UrlEncoded(
                "search".into(),
                "migraine mold exposure".into(),
            ))
            .with_status(200)
            .with_body(format!(
                r#"{{"results": [{}], "meta": {{"count": 230}}}}"#,
                WORK_JSON
            ))
            .create_async()
            .await;

        let source = OpenAlexSource::with_base_url(server.url()).unwrap();
        let response = source
            .search(&SourceQuery::new("migraine mold exposure"))
            .await
            .unwrap();

        assert_eq!(response.total_count, Some(230));
        assert_eq!(response.records.len(), 1);
        assert_eq!(response.records[0].source, SourceId::OpenAlex);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_lookup_by_doi() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock(
                "GET",
                mockito::Matcher::Regex(r"^/works/doi:.*".to_string()),
            )
            .with_status(200)
            .with_body(WORK_JSON)
            .create_async()
            .await;

        let source = OpenAlexSource::with_base_url(server.url()).unwrap();
        let records = source
            .lookup(&Identifier::Doi("10.1177/0333102421".to_string()))
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].doi.as_deref(), Some("10.1177/0333102421"));
        mock.assert_async().await;
    }
}
