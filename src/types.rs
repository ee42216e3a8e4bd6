use serde::{Deserialize, Serialize};

pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Linkify,
    Sections,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Linkify => "linkify",
            JobKind::Sections => "sections",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobConfig {
    pub job: JobKind,
    pub callback_base: String,
    pub callback_token: String,
    #[serde(default)]
    pub identifiers: Option<Vec<String>>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub resume: bool,
    #[serde(default)]
    pub batch_size: Option<usize>,
    /// Section job only: skip statutes issued before this year.
    #[serde(default)]
    pub year_min: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkifyOptions {
    pub batch_size: usize,
    pub limit: Option<usize>,
    pub dry_run: bool,
    /// Restrict the run to these document identifiers.
    pub identifiers: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionJobOptions {
    pub batch_size: usize,
    pub limit: Option<usize>,
    pub dry_run: bool,
    /// Skip documents that already have sections.
    pub resume: bool,
    pub identifiers: Vec<String>,
    pub year_min: Option<u16>,
}

impl JobConfig {
    pub fn linkify_options(&self) -> LinkifyOptions {
        LinkifyOptions {
            batch_size: self.effective_batch_size(),
            limit: self.limit,
            dry_run: self.dry_run,
            identifiers: self.identifiers.clone().unwrap_or_default(),
        }
    }

    pub fn section_options(&self) -> SectionJobOptions {
        SectionJobOptions {
            batch_size: self.effective_batch_size(),
            limit: self.limit,
            dry_run: self.dry_run,
            resume: self.resume,
            identifiers: self.identifiers.clone().unwrap_or_default(),
            year_min: self.year_min,
        }
    }

    fn effective_batch_size(&self) -> usize {
        self.batch_size
            .filter(|size| *size > 0)
            .unwrap_or(DEFAULT_BATCH_SIZE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceType {
    /// Citations found in document text. The only type linkification writes.
    References,
    Cites,
    Implements,
    Amends,
}

impl ReferenceType {
    pub fn as_str(self) -> &'static str {
        match self {
            ReferenceType::References => "REFERENCES",
            ReferenceType::Cites => "CITES",
            ReferenceType::Implements => "IMPLEMENTS",
            ReferenceType::Amends => "AMENDS",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "REFERENCES" => Ok(ReferenceType::References),
            "CITES" => Ok(ReferenceType::Cites),
            "IMPLEMENTS" => Ok(ReferenceType::Implements),
            "AMENDS" => Ok(ReferenceType::Amends),
            other => Err(format!("Unknown reference type: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossReferenceEdge {
    pub source_document_id: String,
    pub target_document_id: String,
    pub reference_type: ReferenceType,
    pub context: Option<String>,
}

/// A stored document as the batch jobs see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDocument {
    pub id: String,
    pub identifier: String,
    pub html_content: String,
    pub full_text: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionUpsertStats {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}
