#![allow(dead_code)]
use async_trait::async_trait;
use legal_xref::index::{DocumentIndex, DocumentType, SlugMapEntry};
use legal_xref::runtime::sqlite::{NewDocument, SqliteStore};
use legal_xref::runtime::types::CrossReferenceStore;
use legal_xref::types::CrossReferenceEdge;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub fn entry(identifier: &str, slug: &str, doc_type: DocumentType, title: &str) -> SlugMapEntry {
    SlugMapEntry {
        identifier: identifier.to_string(),
        slug: slug.to_string(),
        doc_type,
        title: title.to_string(),
        id: format!("id-{slug}"),
    }
}

pub fn default_entries() -> Vec<SlugMapEntry> {
    vec![
        entry(
            "STATUTE 1982:673",
            "arbetstidslag-1982-673",
            DocumentType::Statute,
            "Arbetstidslag (1982:673)",
        ),
        entry(
            "STATUTE 2012:295",
            "some-law-2012-295",
            DocumentType::Statute,
            "Lag (2012:295)",
        ),
        entry(
            "AFS 2001:1",
            "afs-2001-1",
            DocumentType::AgencyRegulation,
            "Systematiskt arbetsmiljöarbete",
        ),
        entry(
            "AD 2019 nr 45",
            "ad-2019-nr-45",
            DocumentType::CourtCaseAd,
            "AD 2019 nr 45",
        ),
        entry(
            "NJA 2020 s. 45",
            "nja-2020-s-45",
            DocumentType::CourtCaseHd,
            "NJA 2020 s. 45",
        ),
    ]
}

pub fn default_index() -> DocumentIndex {
    DocumentIndex::from_entries(default_entries())
}

pub fn document(
    id: &str,
    identifier: &str,
    doc_type: DocumentType,
    html: Option<&str>,
) -> NewDocument {
    NewDocument {
        id: id.to_string(),
        identifier: identifier.to_string(),
        slug: id.to_string(),
        doc_type,
        title: format!("Title of {identifier}"),
        html_content: html.map(str::to_string),
        full_text: None,
    }
}

/// In-memory store with one row per entry of [`default_entries`], no markup.
pub fn seeded_store() -> SqliteStore {
    let store = SqliteStore::open_in_memory().unwrap();
    for entry in default_entries() {
        store
            .insert_document(&NewDocument {
                id: entry.id.clone(),
                identifier: entry.identifier.clone(),
                slug: entry.slug.clone(),
                doc_type: entry.doc_type,
                title: entry.title.clone(),
                html_content: None,
                full_text: None,
            })
            .unwrap();
    }
    store
}

/// Records every replace call; optionally fails them all.
#[derive(Clone, Default)]
pub struct MockReferenceStore {
    pub calls: Arc<Mutex<Vec<(String, Vec<CrossReferenceEdge>)>>>,
    pub stored: Arc<Mutex<HashMap<String, Vec<CrossReferenceEdge>>>>,
    pub fail: bool,
}

impl MockReferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl CrossReferenceStore for MockReferenceStore {
    async fn replace_references(
        &self,
        source_id: &str,
        edges: &[CrossReferenceEdge],
    ) -> Result<usize, String> {
        self.calls
            .lock()
            .unwrap()
            .push((source_id.to_string(), edges.to_vec()));
        if self.fail {
            return Err("store unavailable".to_string());
        }
        self.stored
            .lock()
            .unwrap()
            .insert(source_id.to_string(), edges.to_vec());
        Ok(edges.len())
    }

    async fn references_from(&self, source_id: &str) -> Result<Vec<CrossReferenceEdge>, String> {
        Ok(self
            .stored
            .lock()
            .unwrap()
            .get(source_id)
            .cloned()
            .unwrap_or_default())
    }
}
