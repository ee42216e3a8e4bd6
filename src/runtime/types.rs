use crate::index::{DocumentType, SlugMapEntry};
use crate::references::STATUTE_PREFIX;
use crate::sections::ParsedSection;
use crate::types::{CrossReferenceEdge, SectionUpsertStats, SourceDocument};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One page of documents that carry markup, ordered by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentQuery {
    /// Only documents with an id greater than this.
    pub after_id: Option<String>,
    pub take: usize,
    /// Empty means every document.
    pub identifiers: Vec<String>,
    pub doc_type: Option<DocumentType>,
    /// Only statutes numbered in this year or later.
    pub year_min: Option<u16>,
}

impl DocumentQuery {
    /// Lowest identifier admitted by `year_min`. Statute identifiers sort by
    /// year since the year is always four digits.
    pub fn identifier_floor(&self) -> Option<String> {
        self.year_min
            .map(|year| format!("{STATUTE_PREFIX} {year:04}:"))
    }
}

#[async_trait]
pub trait CorpusProvider: Send + Sync {
    async fn load_index_entries(&self) -> Result<Vec<SlugMapEntry>, String>;
}

#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch_documents(&self, query: &DocumentQuery) -> Result<Vec<SourceDocument>, String>;
    async fn update_html(&self, document_id: &str, html: &str) -> Result<(), String>;
}

#[async_trait]
pub trait CrossReferenceStore: Send + Sync {
    /// Atomically swap the outbound `REFERENCES` edges of `source_id` for
    /// `edges`. Edges of other types are kept.
    async fn replace_references(
        &self,
        source_id: &str,
        edges: &[CrossReferenceEdge],
    ) -> Result<usize, String>;
    async fn references_from(&self, source_id: &str) -> Result<Vec<CrossReferenceEdge>, String>;
}

#[async_trait]
pub trait SectionStore: Send + Sync {
    async fn documents_with_sections(&self) -> Result<HashSet<String>, String>;
    /// Create or update all sections of one document in a single transaction.
    async fn upsert_sections(
        &self,
        document_id: &str,
        sections: &[ParsedSection],
    ) -> Result<SectionUpsertStats, String>;
    async fn sections_for(&self, document_id: &str) -> Result<Vec<ParsedSection>, String>;
}
