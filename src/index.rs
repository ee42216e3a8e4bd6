use crate::references::{normalize_identifier, CourtId};
use crate::runtime::types::CorpusProvider;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    Statute,
    StatuteAmendment,
    AgencyRegulation,
    CourtCaseHd,
    CourtCaseHfd,
    CourtCaseAd,
    CourtCaseHovr,
    CourtCaseMod,
    CourtCaseMig,
    EuRegulation,
    EuDirective,
}

impl DocumentType {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentType::Statute => "STATUTE",
            DocumentType::StatuteAmendment => "STATUTE_AMENDMENT",
            DocumentType::AgencyRegulation => "AGENCY_REGULATION",
            DocumentType::CourtCaseHd => "COURT_CASE_HD",
            DocumentType::CourtCaseHfd => "COURT_CASE_HFD",
            DocumentType::CourtCaseAd => "COURT_CASE_AD",
            DocumentType::CourtCaseHovr => "COURT_CASE_HOVR",
            DocumentType::CourtCaseMod => "COURT_CASE_MOD",
            DocumentType::CourtCaseMig => "COURT_CASE_MIG",
            DocumentType::EuRegulation => "EU_REGULATION",
            DocumentType::EuDirective => "EU_DIRECTIVE",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "STATUTE" => Ok(DocumentType::Statute),
            "STATUTE_AMENDMENT" => Ok(DocumentType::StatuteAmendment),
            "AGENCY_REGULATION" => Ok(DocumentType::AgencyRegulation),
            "COURT_CASE_HD" => Ok(DocumentType::CourtCaseHd),
            "COURT_CASE_HFD" => Ok(DocumentType::CourtCaseHfd),
            "COURT_CASE_AD" => Ok(DocumentType::CourtCaseAd),
            "COURT_CASE_HOVR" => Ok(DocumentType::CourtCaseHovr),
            "COURT_CASE_MOD" => Ok(DocumentType::CourtCaseMod),
            "COURT_CASE_MIG" => Ok(DocumentType::CourtCaseMig),
            "EU_REGULATION" => Ok(DocumentType::EuRegulation),
            "EU_DIRECTIVE" => Ok(DocumentType::EuDirective),
            other => Err(format!("Unknown document type: {other}")),
        }
    }

    /// The court a court-case type belongs to.
    pub fn court(self) -> Option<CourtId> {
        match self {
            DocumentType::CourtCaseHd => Some(CourtId::Hd),
            DocumentType::CourtCaseHfd => Some(CourtId::Hfd),
            DocumentType::CourtCaseAd => Some(CourtId::Ad),
            DocumentType::CourtCaseHovr => Some(CourtId::Hovr),
            DocumentType::CourtCaseMod => Some(CourtId::Mod),
            DocumentType::CourtCaseMig => Some(CourtId::Mig),
            _ => None,
        }
    }

    pub fn court_case(court: CourtId) -> Self {
        match court {
            CourtId::Hd => DocumentType::CourtCaseHd,
            CourtId::Hfd => DocumentType::CourtCaseHfd,
            CourtId::Ad => DocumentType::CourtCaseAd,
            CourtId::Hovr => DocumentType::CourtCaseHovr,
            CourtId::Mod => DocumentType::CourtCaseMod,
            CourtId::Mig => DocumentType::CourtCaseMig,
        }
    }
}

/// Public path of a document, e.g. `/lagar/{slug}` or `/rattsfall/hd/{slug}`.
pub fn document_path(doc_type: DocumentType, slug: &str) -> String {
    match doc_type {
        DocumentType::Statute => format!("/lagar/{slug}"),
        DocumentType::StatuteAmendment => format!("/lagar/andringar/{slug}"),
        DocumentType::AgencyRegulation => format!("/foreskrifter/{slug}"),
        DocumentType::EuRegulation => format!("/eu/forordning/{slug}"),
        DocumentType::EuDirective => format!("/eu/direktiv/{slug}"),
        court_case => {
            let court = court_case.court().map(CourtId::as_str).unwrap_or_default();
            format!("/rattsfall/{court}/{slug}")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlugMapEntry {
    pub identifier: String,
    pub slug: String,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub title: String,
    pub id: String,
}

/// Identifier lookup over a corpus snapshot. Built once per batch and only
/// read afterwards.
#[derive(Debug, Clone, Default)]
pub struct DocumentIndex {
    entries: HashMap<String, SlugMapEntry>,
}

impl DocumentIndex {
    /// Later entries with the same normalized identifier replace earlier ones.
    pub fn from_entries(entries: impl IntoIterator<Item = SlugMapEntry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|entry| (normalize_identifier(&entry.identifier), entry))
            .collect();
        Self { entries }
    }

    pub async fn build(provider: &dyn CorpusProvider) -> Result<Self, String> {
        let entries = provider.load_index_entries().await?;
        let index = Self::from_entries(entries);
        tracing::info!("[Linkify] Document index built with {} entries", index.len());
        Ok(index)
    }

    pub fn get(&self, identifier: &str) -> Option<&SlugMapEntry> {
        self.entries.get(&normalize_identifier(identifier))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
