//! Mock source for testing purposes.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::models::{Identifier, PublicationRecord, RecordBuilder, SourceId};
use crate::sources::{Source, SourceCapabilities, SourceError, SourceQuery, SourceResponse};

/// A mock source that returns scripted responses and logs every call.
///
/// Scripted responses are consumed in order; once the script runs out,
/// searches fall back to the steady record set (empty by default).
#[derive(Debug)]
pub struct MockSource {
    id: String,
    name: String,
    capabilities: SourceCapabilities,
    scripted: Mutex<VecDeque<Result<SourceResponse, SourceError>>>,
    steady: Mutex<Vec<PublicationRecord>>,
    lookup_records: Mutex<Vec<PublicationRecord>>,
    calls: Mutex<Vec<SourceQuery>>,
}

impl MockSource {
    /// Create a new mock source with the given registry id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: "Mock Source".to_string(),
            capabilities: SourceCapabilities::SEARCH,
            scripted: Mutex::new(VecDeque::new()),
            steady: Mutex::new(Vec::new()),
            lookup_records: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Override the advertised capabilities.
    pub fn with_capabilities(mut self, capabilities: SourceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Queue a one-shot search response, consumed before steady records.
    pub fn push_response(&self, response: SourceResponse) {
        self.scripted.lock().unwrap().push_back(Ok(response));
    }

    /// Queue a one-shot search failure.
    pub fn push_error(&self, error: SourceError) {
        self.scripted.lock().unwrap().push_back(Err(error));
    }

    /// Set the records returned whenever the script queue is empty.
    pub fn set_records(&self, records: Vec<PublicationRecord>) {
        *self.steady.lock().unwrap() = records;
    }

    /// Set the records returned by identifier lookup.
    pub fn set_lookup_records(&self, records: Vec<PublicationRecord>) {
        *self.lookup_records.lock().unwrap() = records;
    }

    /// Every search query this source has received, in order.
    pub fn calls(&self) -> Vec<SourceQuery> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Source for MockSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> SourceCapabilities {
        self.capabilities
    }

    async fn search(&self, query: &SourceQuery) -> Result<SourceResponse, SourceError> {
        self.calls.lock().unwrap().push(query.clone());
        if let Some(scripted) = self.scripted.lock().unwrap().pop_front() {
            return scripted;
        }
        Ok(SourceResponse::new(self.steady.lock().unwrap().clone()))
    }

    async fn lookup(&self, id: &Identifier) -> Result<Vec<PublicationRecord>, SourceError> {
        let records = self.lookup_records.lock().unwrap().clone();
        if records.is_empty() {
            return Err(SourceError::NotFound(id.value().to_string()));
        }
        Ok(records)
    }
}

/// Helper to create a mock record for testing.
pub fn make_record(id: &str, title: &str, source: SourceId) -> PublicationRecord {
    RecordBuilder::new(id, title, format!("http://example.com/{}", id), source).build()
}
