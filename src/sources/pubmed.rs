//! PubMed source adapter using the NCBI E-utilities API.
//!
//! Search is a two-step esearch/efetch round trip: esearch resolves the
//! boolean query to PMIDs and the upstream hit count, efetch returns the
//! article XML those PMIDs describe. The esearch count is what tiered
//! retrieval uses to decide whether a tier is too narrow.

use async_trait::async_trait;
use quick_xml::de::from_str;
use serde::Deserialize;
use std::sync::Arc;

use crate::config::Config;
use crate::models::{Identifier, PublicationRecord, RecordBuilder, SourceId};
use crate::sources::{
    Source, SourceCapabilities, SourceError, SourceQuery, SourceResponse,
};
use crate::utils::{source_retry_config, with_retry, HttpClient};

const EUTILS_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// PubMed source
///
/// Uses the NCBI E-utilities API. An API key raises the request budget
/// from 3 to 10 requests per second.
#[derive(Debug, Clone)]
pub struct PubMedSource {
    client: Arc<HttpClient>,
    api_key: Option<String>,
    base_url: String,
}

impl PubMedSource {
    /// Create a new PubMed source from configuration
    pub fn new(config: &Config) -> Result<Self, SourceError> {
        Ok(Self {
            client: Arc::new(HttpClient::new()?.with_rate_limit(config.rate_limits.pubmed_rps)),
            api_key: config.api_keys.ncbi.clone(),
            base_url: EUTILS_BASE.to_string(),
        })
    }

    /// Point the adapter at a different E-utilities endpoint (for testing)
    #[allow(dead_code)]
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, SourceError> {
        Ok(Self {
            client: Arc::new(HttpClient::new()?),
            api_key: None,
            base_url: base_url.into(),
        })
    }

    /// E-utilities esearch parameters for a search query
    fn build_search_params(&self, query: &SourceQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("db", "pubmed".to_string()),
            ("term", query.text.clone()),
            ("retmax", query.limit.to_string()),
            ("retmode", "xml".to_string()),
        ];

        if query.newest_first {
            params.push(("sort", "pub_date".to_string()));
        }

        if !query.date_range.is_empty() {
            // E-utilities requires both ends when either date bound is set
            let from = query.date_range.from_year.unwrap_or(1800);
            let to = query.date_range.to_year.unwrap_or(3000);
            params.push(("datetype", "pdat".to_string()));
            params.push(("mindate", format!("{}/01/01", from)));
            params.push(("maxdate", format!("{}/12/31", to)));
        }

        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }

        params
    }

    fn lookup_params(&self, term: &str) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("db", "pubmed".to_string()),
            ("term", term.to_string()),
            ("retmax", "5".to_string()),
            ("retmode", "xml".to_string()),
        ];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }
        params
    }

    async fn run_esearch(
        &self,
        params: Vec<(&'static str, String)>,
    ) -> Result<(Vec<String>, Option<usize>), SourceError> {
        let url = format!("{}/esearch.fcgi", self.base_url);
        let client = Arc::clone(&self.client);

        let xml = with_retry(source_retry_config(), || {
            let client = Arc::clone(&client);
            let url = url.clone();
            let params = params.clone();
            async move {
                let response = client.get(&url).query(&params).send().await?;
                Self::read_body(response).await
            }
        })
        .await?;

        Self::parse_search_response(&xml)
    }

    /// Fetch full article records for a set of PMIDs
    async fn fetch_records(&self, ids: &[String]) -> Result<Vec<PublicationRecord>, SourceError> {
        let mut params = vec![
            ("db", "pubmed".to_string()),
            ("id", ids.join(",")),
            ("retmode", "xml".to_string()),
        ];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }

        let url = format!("{}/efetch.fcgi", self.base_url);
        let client = Arc::clone(&self.client);

        let xml = with_retry(source_retry_config(), || {
            let client = Arc::clone(&client);
            let url = url.clone();
            let params = params.clone();
            async move {
                let response = client.get(&url).query(&params).send().await?;
                Self::read_body(response).await
            }
        })
        .await?;

        Self::parse_fetch_response(&xml)
    }

    async fn read_body(response: reqwest::Response) -> Result<String, SourceError> {
        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::RateLimit);
        }
        if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            return Err(SourceError::Api("PubMed unavailable".to_string()));
        }
        if !status.is_success() {
            return Err(SourceError::Api(format!("PubMed returned status: {}", status)));
        }
        response
            .text()
            .await
            .map_err(|e| SourceError::Network(format!("failed to read response: {}", e)))
    }

    /// Parse an esearch response into (PMIDs, upstream hit count)
    fn parse_search_response(xml: &str) -> Result<(Vec<String>, Option<usize>), SourceError> {
        #[derive(Debug, Deserialize)]
        #[allow(non_snake_case)]
        struct ESearchResult {
            Count: Option<String>,
            IdList: Option<IdList>,
        }

        #[derive(Debug, Deserialize)]
        struct IdList {
            #[serde(rename = "Id", default)]
            ids: Vec<String>,
        }

        let result: ESearchResult = from_str(xml)
            .map_err(|e| SourceError::Parse(format!("PubMed search XML: {}", e)))?;

        let total = result.Count.as_deref().and_then(|c| c.parse().ok());
        Ok((result.IdList.map(|l| l.ids).unwrap_or_default(), total))
    }

    /// Parse an efetch response into publication records.
    ///
    /// Articles without a title are dropped here; every later stage
    /// assumes a non-empty title.
    fn parse_fetch_response(xml: &str) -> Result<Vec<PublicationRecord>, SourceError> {
        #[derive(Debug, Deserialize)]
        #[allow(non_snake_case)]
        struct PubmedArticleSet {
            #[serde(rename = "PubmedArticle", default)]
            articles: Vec<PubmedArticle>,
        }

        #[derive(Debug, Deserialize)]
        #[allow(non_snake_case)]
        struct PubmedArticle {
            MedlineCitation: Option<MedlineCitation>,
            PubmedData: Option<PubmedData>,
        }

        #[derive(Debug, Deserialize)]
        #[allow(non_snake_case)]
        struct MedlineCitation {
            PMID: Option<TextNode>,
            Article: Option<Article>,
            MeshHeadingList: Option<MeshHeadingList>,
            #[serde(rename = "KeywordList", default)]
            keyword_lists: Vec<KeywordList>,
        }

        #[derive(Debug, Deserialize)]
        #[allow(non_snake_case)]
        struct Article {
            Journal: Option<Journal>,
            ArticleTitle: Option<TextNode>,
            Abstract: Option<Abstract>,
            AuthorList: Option<AuthorList>,
            #[serde(rename = "ELocationID", default)]
            elocation_ids: Vec<ELocationId>,
        }

        #[derive(Debug, Deserialize)]
        #[allow(non_snake_case)]
        struct Journal {
            Title: Option<TextNode>,
            JournalIssue: Option<JournalIssue>,
        }

        #[derive(Debug, Deserialize)]
        #[allow(non_snake_case)]
        struct JournalIssue {
            PubDate: Option<PubDate>,
        }

        #[derive(Debug, Deserialize)]
        #[allow(non_snake_case)]
        struct PubDate {
            Year: Option<String>,
            Month: Option<String>,
            Day: Option<String>,
            MedlineDate: Option<String>,
        }

        #[derive(Debug, Deserialize)]
        #[allow(non_snake_case)]
        struct Abstract {
            #[serde(rename = "AbstractText", default)]
            sections: Vec<AbstractText>,
        }

        #[derive(Debug, Deserialize)]
        struct AbstractText {
            #[serde(rename = "@Label")]
            label: Option<String>,
            #[serde(rename = "$text")]
            text: Option<String>,
        }

        #[derive(Debug, Deserialize)]
        #[allow(non_snake_case)]
        struct AuthorList {
            #[serde(rename = "Author", default)]
            authors: Vec<Author>,
        }

        #[derive(Debug, Deserialize)]
        #[allow(non_snake_case)]
        struct Author {
            LastName: Option<TextNode>,
            ForeName: Option<TextNode>,
            CollectiveName: Option<TextNode>,
        }

        #[derive(Debug, Deserialize)]
        #[allow(non_snake_case)]
        struct MeshHeadingList {
            #[serde(rename = "MeshHeading", default)]
            headings: Vec<MeshHeading>,
        }

        #[derive(Debug, Deserialize)]
        #[allow(non_snake_case)]
        struct MeshHeading {
            DescriptorName: Option<DescriptorName>,
        }

        #[derive(Debug, Deserialize)]
        struct DescriptorName {
            #[serde(rename = "@MajorTopicYN")]
            major: Option<String>,
            #[serde(rename = "$text")]
            name: Option<String>,
        }

        #[derive(Debug, Deserialize)]
        struct KeywordList {
            #[serde(rename = "Keyword", default)]
            keywords: Vec<TextNode>,
        }

        #[derive(Debug, Deserialize)]
        struct ELocationId {
            #[serde(rename = "@EIdType")]
            id_type: Option<String>,
            #[serde(rename = "$text")]
            value: Option<String>,
        }

        #[derive(Debug, Deserialize)]
        #[allow(non_snake_case)]
        struct PubmedData {
            ArticleIdList: Option<ArticleIdList>,
        }

        #[derive(Debug, Deserialize)]
        struct ArticleIdList {
            #[serde(rename = "ArticleId", default)]
            ids: Vec<ArticleId>,
        }

        #[derive(Debug, Deserialize)]
        struct ArticleId {
            #[serde(rename = "@IdType")]
            id_type: Option<String>,
            #[serde(rename = "$text")]
            value: Option<String>,
        }

        #[derive(Debug, Deserialize)]
        struct TextNode {
            #[serde(rename = "$text")]
            text: Option<String>,
        }

        impl TextNode {
            fn get(&self) -> Option<&str> {
                self.text.as_deref().map(str::trim).filter(|s| !s.is_empty())
            }
        }

        let result: PubmedArticleSet = from_str(xml)
            .map_err(|e| SourceError::Parse(format!("PubMed fetch XML: {}", e)))?;

        let mut records = Vec::new();

        for entry in result.articles {
            let citation = match entry.MedlineCitation {
                Some(c) => c,
                None => continue,
            };
            let pmid = citation
                .PMID
                .as_ref()
                .and_then(|p| p.get())
                .unwrap_or_default()
                .to_string();

            let article = match citation.Article {
                Some(a) => a,
                None => continue,
            };
            let title = match article.ArticleTitle.as_ref().and_then(|t| t.get()) {
                Some(t) => t.to_string(),
                None => {
                    tracing::debug!(pmid = %pmid, "dropping PubMed record without title");
                    continue;
                }
            };

            let authors: Vec<String> = article
                .AuthorList
                .as_ref()
                .map(|list| {
                    list.authors
                        .iter()
                        .filter_map(|a| {
                            if let Some(collective) = a.CollectiveName.as_ref().and_then(|c| c.get()) {
                                return Some(collective.to_string());
                            }
                            let fore = a.ForeName.as_ref().and_then(|f| f.get()).unwrap_or("");
                            let last = a.LastName.as_ref().and_then(|l| l.get()).unwrap_or("");
                            let name = format!("{} {}", fore, last).trim().to_string();
                            (!name.is_empty()).then_some(name)
                        })
                        .collect()
                })
                .unwrap_or_default();

            // structured abstracts keep their section labels so markers
            // like "BACKGROUND:" survive into the plain text
            let abstract_text = article
                .Abstract
                .as_ref()
                .map(|ab| {
                    ab.sections
                        .iter()
                        .filter_map(|s| {
                            let text = s.text.as_deref()?.trim();
                            if text.is_empty() {
                                return None;
                            }
                            Some(match s.label.as_deref() {
                                Some(label) => format!("{}: {}", label, text),
                                None => text.to_string(),
                            })
                        })
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .unwrap_or_default();

            let pub_date = article
                .Journal
                .as_ref()
                .and_then(|j| j.JournalIssue.as_ref())
                .and_then(|ji| ji.PubDate.as_ref());
            let year = pub_date.and_then(|pd| {
                pd.Year
                    .as_deref()
                    .and_then(|y| y.parse().ok())
                    .or_else(|| medline_year(pd.MedlineDate.as_deref()?))
            });
            let month = pub_date.and_then(|pd| month_number(pd.Month.as_deref()?));
            let day = pub_date.and_then(|pd| pd.Day.as_deref()?.parse().ok());

            let journal = article
                .Journal
                .as_ref()
                .and_then(|j| j.Title.as_ref())
                .and_then(|t| t.get())
                .map(String::from);

            let mut keywords: Vec<String> = citation
                .keyword_lists
                .iter()
                .flat_map(|list| list.keywords.iter())
                .filter_map(|k| k.get().map(String::from))
                .collect();

            let mut major_subjects = Vec::new();
            for heading in citation
                .MeshHeadingList
                .as_ref()
                .map(|l| l.headings.as_slice())
                .unwrap_or_default()
            {
                let Some(descriptor) = &heading.DescriptorName else { continue };
                let Some(name) = descriptor.name.as_deref().map(str::trim).filter(|s| !s.is_empty())
                else {
                    continue;
                };
                if descriptor.major.as_deref() == Some("Y") {
                    major_subjects.push(name.to_string());
                } else {
                    // minor headings still count as indexer keywords
                    keywords.push(name.to_string());
                }
            }

            let doi = entry
                .PubmedData
                .as_ref()
                .and_then(|pd| pd.ArticleIdList.as_ref())
                .and_then(|list| {
                    list.ids
                        .iter()
                        .find(|id| id.id_type.as_deref() == Some("doi"))
                        .and_then(|id| id.value.clone())
                })
                .or_else(|| {
                    article
                        .elocation_ids
                        .iter()
                        .find(|e| e.id_type.as_deref() == Some("doi"))
                        .and_then(|e| e.value.clone())
                });

            let url = format!("https://pubmed.ncbi.nlm.nih.gov/{}/", pmid);
            let mut builder = RecordBuilder::new(pmid, title, url, SourceId::PubMed)
                .authors(authors)
                .abstract_text(abstract_text)
                .keywords(keywords)
                .major_subjects(major_subjects);
            if let Some(doi) = doi {
                builder = builder.doi(doi);
            }
            if let Some(year) = year {
                builder = builder.published(year, month.unwrap_or(0), day.unwrap_or(0));
            }
            if let Some(journal) = journal {
                builder = builder.journal(journal);
            }

            records.push(builder.build());
        }

        Ok(records)
    }
}

/// PubMed months come as numbers or English abbreviations
fn month_number(s: &str) -> Option<u32> {
    if let Ok(n) = s.parse::<u32>() {
        return (1..=12).contains(&n).then_some(n);
    }
    let name = s.get(..3)?.to_ascii_lowercase();
    let n = match name.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(n)
}

/// MedlineDate values like "2020 Jan-Feb" or "2019-2020 Winter" start
/// with the year
fn medline_year(s: &str) -> Option<i32> {
    s.trim().get(..4)?.parse().ok()
}

#[async_trait]
impl Source for PubMedSource {
    fn id(&self) -> &str {
        "pubmed"
    }

    fn name(&self) -> &str {
        "PubMed"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
            | SourceCapabilities::BOOLEAN_QUERY
            | SourceCapabilities::DATE_FILTER
            | SourceCapabilities::IDENTIFIER_LOOKUP
    }

    async fn search(&self, query: &SourceQuery) -> Result<SourceResponse, SourceError> {
        let (ids, total) = self.run_esearch(self.build_search_params(query)).await?;

        if ids.is_empty() {
            return Ok(SourceResponse::new(Vec::new()).with_total(total.unwrap_or(0)));
        }

        let records = self.fetch_records(&ids).await?;
        let total = total.unwrap_or(records.len());
        Ok(SourceResponse::new(records).with_total(total))
    }

    async fn lookup(&self, id: &Identifier) -> Result<Vec<PublicationRecord>, SourceError> {
        let pmids = match id {
            Identifier::Pmid(pmid) => vec![pmid.clone()],
            Identifier::Doi(doi) => {
                self.run_esearch(self.lookup_params(&format!("{}[doi]", doi)))
                    .await?
                    .0
            }
            // PubMed's query engine resolves bare PMC ids
            Identifier::Pmcid(pmcid) => self.run_esearch(self.lookup_params(pmcid)).await?.0,
            Identifier::TrialRegistration(nct) => {
                self.run_esearch(self.lookup_params(&format!("{}[si]", nct)))
                    .await?
                    .0
            }
        };

        if pmids.is_empty() {
            return Err(SourceError::NotFound(format!(
                "PubMed has no record for {}",
                id.value()
            )));
        }

        self.fetch_records(&pmids).await
    }
}
