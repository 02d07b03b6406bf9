//! Core data models for publication records, queries, and ranked results.

mod query;
mod record;
mod scored;

pub use query::{
    DateRange, Identifier, Intent, QueryKind, QueryPlan, SearchRequest, SortBy, Term,
};
pub use record::{normalize_doi, PublicationRecord, RecordBuilder, SourceClass, SourceId};
pub use scored::{ExposureMatch, RankedBatch, RankedPage, ScoredRecord, TitleStrength};
